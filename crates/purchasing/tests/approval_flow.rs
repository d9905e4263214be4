//! End-to-end approval workflow: authorization policy + notifications on top
//! of the purchase-order state machine.

use chrono::Utc;

use orderflow_auth::{Permission, Principal, PrincipalId, Role, TenantMembership};
use orderflow_core::{Aggregate, AggregateId, DomainError, TenantId, UserId};
use orderflow_notify::{InMemoryNotifier, MailTemplate, NotifyError};
use orderflow_purchasing::{
    AddLine, ApprovalLevel, ApprovalWorkflow, CreatePurchaseOrder, PurchaseOrder,
    PurchaseOrderCommand, PurchaseOrderId, PurchaseOrderStatus, StaticApproverDirectory,
};

fn principal(tenant_id: TenantId, perms: Vec<&'static str>) -> Principal {
    Principal {
        principal_id: PrincipalId::new(),
        user_id: UserId::new(),
        active_tenant_id: tenant_id,
        membership: TenantMembership {
            tenant_id,
            roles: vec![Role::new("approver")],
            permissions: perms.into_iter().map(Permission::new).collect(),
        },
    }
}

fn directory() -> StaticApproverDirectory {
    StaticApproverDirectory::new()
        .with_level(
            ApprovalLevel::Level1,
            vec!["l1@example.com".to_string()],
        )
        .with_level(
            ApprovalLevel::Level2,
            vec!["l2a@example.com".to_string(), "l2b@example.com".to_string()],
        )
}

fn draft_order(tenant_id: TenantId, total: i64) -> PurchaseOrder {
    let order_id = PurchaseOrderId::new(AggregateId::new());
    let mut order = PurchaseOrder::empty(order_id);
    let events = order
        .handle(&PurchaseOrderCommand::CreatePurchaseOrder(
            CreatePurchaseOrder {
                tenant_id,
                order_id,
                reference: "PO0042".to_string(),
                supplier_id: orderflow_parties::PartyId::new(AggregateId::new()),
                requester: UserId::new(),
                requester_email: Some("requester@example.com".to_string()),
                occurred_at: Utc::now(),
            },
        ))
        .unwrap();
    for e in &events {
        order.apply(e);
    }
    let events = order
        .handle(&PurchaseOrderCommand::AddLine(AddLine {
            tenant_id,
            order_id,
            product_id: orderflow_products::ProductId::new(AggregateId::new()),
            quantity: 1,
            unit_price: total,
            occurred_at: Utc::now(),
        }))
        .unwrap();
    for e in &events {
        order.apply(e);
    }
    order
}

#[test]
fn level1_only_order_confirms_after_single_approval() {
    let tenant_id = TenantId::new();
    let notifier = InMemoryNotifier::new();
    let dir = directory();
    let workflow = ApprovalWorkflow::new(&notifier, &dir);

    // 15,000.00 → level 1 scope.
    let mut order = draft_order(tenant_id, 1_500_000);
    workflow.submit(&mut order, Utc::now()).unwrap();
    assert_eq!(order.status(), PurchaseOrderStatus::ToApprove);

    // Level-1 group got the request.
    let mails = notifier.sent_mails();
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0].template, MailTemplate::ApprovalRequest);
    assert_eq!(mails[0].recipients, vec!["l1@example.com".to_string()]);
    assert_eq!(mails[0].context.get("level"), Some("Level 1"));

    let approver = principal(tenant_id, vec!["purchasing.approve.level1"]);
    workflow
        .approve_level1(&approver, &mut order, Utc::now())
        .unwrap();
    // Level 2 skipped entirely.
    assert_eq!(order.status(), PurchaseOrderStatus::Confirmed);
    assert_eq!(notifier.sent_mails().len(), 1);
}

#[test]
fn level2_order_notifies_next_group_and_needs_second_signoff() {
    let tenant_id = TenantId::new();
    let notifier = InMemoryNotifier::new();
    let dir = directory();
    let workflow = ApprovalWorkflow::new(&notifier, &dir);

    let mut order = draft_order(tenant_id, 5_000_000);
    workflow.submit(&mut order, Utc::now()).unwrap();

    let l1 = principal(tenant_id, vec!["purchasing.approve.level1"]);
    workflow.approve_level1(&l1, &mut order, Utc::now()).unwrap();
    assert_eq!(order.status(), PurchaseOrderStatus::ApprovedLevel1);

    let mails = notifier.sent_mails();
    assert_eq!(mails.len(), 2);
    assert_eq!(mails[1].context.get("level"), Some("Level 2"));
    assert_eq!(mails[1].recipients.len(), 2);

    let l2 = principal(tenant_id, vec!["purchasing.approve.level2"]);
    workflow.approve_level2(&l2, &mut order, Utc::now()).unwrap();
    assert_eq!(order.status(), PurchaseOrderStatus::Confirmed);
    assert!(order.level2_approval().is_some());
}

#[test]
fn approval_without_group_membership_is_refused() {
    let tenant_id = TenantId::new();
    let notifier = InMemoryNotifier::new();
    let dir = directory();
    let workflow = ApprovalWorkflow::new(&notifier, &dir);

    let mut order = draft_order(tenant_id, 1_500_000);
    workflow.submit(&mut order, Utc::now()).unwrap();

    let outsider = principal(tenant_id, vec!["sales.order.write"]);
    let err = workflow
        .approve_level1(&outsider, &mut order, Utc::now())
        .unwrap_err();
    match err {
        DomainError::Unauthorized(msg) => assert!(msg.contains("Level 1")),
        other => panic!("expected unauthorized, got {other:?}"),
    }
    // Nothing moved.
    assert_eq!(order.status(), PurchaseOrderStatus::ToApprove);
}

#[test]
fn rejection_emails_the_requester_and_is_terminal() {
    let tenant_id = TenantId::new();
    let notifier = InMemoryNotifier::new();
    let dir = directory();
    let workflow = ApprovalWorkflow::new(&notifier, &dir);

    let mut order = draft_order(tenant_id, 1_500_000);
    workflow.submit(&mut order, Utc::now()).unwrap();

    let manager = principal(tenant_id, vec!["purchasing.approve.level1"]);
    workflow.reject(&manager, &mut order, Utc::now()).unwrap();
    assert_eq!(order.status(), PurchaseOrderStatus::Rejected);
    assert_eq!(order.rejected_by(), Some(manager.user_id));

    let mails = notifier.sent_mails();
    let rejection = mails
        .iter()
        .find(|m| m.template == MailTemplate::RejectionNotice)
        .expect("rejection notice sent");
    assert_eq!(rejection.recipients, vec!["requester@example.com".to_string()]);
}

#[test]
fn notification_failure_never_blocks_the_transition() {
    let tenant_id = TenantId::new();
    let notifier = InMemoryNotifier::new();
    notifier.fail_with(NotifyError::TemplateMissing(MailTemplate::ApprovalRequest));
    let dir = directory();
    let workflow = ApprovalWorkflow::new(&notifier, &dir);

    let mut order = draft_order(tenant_id, 1_500_000);
    workflow.submit(&mut order, Utc::now()).unwrap();
    assert_eq!(order.status(), PurchaseOrderStatus::ToApprove);

    let approver = principal(tenant_id, vec!["purchasing.approve.level1"]);
    workflow
        .approve_level1(&approver, &mut order, Utc::now())
        .unwrap();
    assert_eq!(order.status(), PurchaseOrderStatus::Confirmed);
    assert!(notifier.sent_mails().is_empty());
}

#[test]
fn empty_approver_group_is_logged_and_skipped() {
    let tenant_id = TenantId::new();
    let notifier = InMemoryNotifier::new();
    let dir = StaticApproverDirectory::new(); // nobody anywhere
    let workflow = ApprovalWorkflow::new(&notifier, &dir);

    let mut order = draft_order(tenant_id, 1_500_000);
    workflow.submit(&mut order, Utc::now()).unwrap();
    assert_eq!(order.status(), PurchaseOrderStatus::ToApprove);
    assert!(notifier.sent_mails().is_empty());
}
