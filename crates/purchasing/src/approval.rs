//! Tiered approval workflow over the purchase-order aggregate.
//!
//! The aggregate decides transitions; this service wraps every record action
//! with the authorization policy and best-effort notifications. Notification
//! failures are logged and swallowed, they never block a transition.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use orderflow_auth::{authorize, Permission, Principal};
use orderflow_core::{Aggregate, DomainError, DomainResult};
use orderflow_notify::{MailTemplate, NotificationContext, NotificationService};

use crate::order::{
    ApprovalLevel, ApproveLevel1, ApproveLevel2, PurchaseOrder, PurchaseOrderCommand,
    PurchaseOrderEvent, PurchaseOrderStatus, Reject, SubmitForConfirmation,
};

/// Policy table: which permission an approval tier requires.
///
/// `Auto` needs nobody's sign-off.
pub fn required_permission(level: ApprovalLevel) -> Option<Permission> {
    match level {
        ApprovalLevel::Auto => None,
        ApprovalLevel::Level1 => Some(Permission::new("purchasing.approve.level1")),
        ApprovalLevel::Level2 => Some(Permission::new("purchasing.approve.level2")),
    }
}

/// Resolves an approval tier to the email addresses of its approver group.
pub trait ApproverDirectory {
    fn approver_emails(&self, level: ApprovalLevel) -> Vec<String>;
}

/// Static directory backed by a map (tests, single-company setups).
#[derive(Debug, Default)]
pub struct StaticApproverDirectory {
    emails: HashMap<ApprovalLevel, Vec<String>>,
}

impl StaticApproverDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: ApprovalLevel, emails: Vec<String>) -> Self {
        self.emails.insert(level, emails);
        self
    }
}

impl ApproverDirectory for StaticApproverDirectory {
    fn approver_emails(&self, level: ApprovalLevel) -> Vec<String> {
        self.emails.get(&level).cloned().unwrap_or_default()
    }
}

/// Orchestrates submit/approve/reject record actions.
pub struct ApprovalWorkflow<'a> {
    notifier: &'a dyn NotificationService,
    directory: &'a dyn ApproverDirectory,
}

impl<'a> ApprovalWorkflow<'a> {
    pub fn new(notifier: &'a dyn NotificationService, directory: &'a dyn ApproverDirectory) -> Self {
        Self { notifier, directory }
    }

    /// The confirm button: auto orders confirm outright, the rest move to
    /// `ToApprove` and the level-1 approvers are notified.
    pub fn submit(&self, order: &mut PurchaseOrder, now: DateTime<Utc>) -> DomainResult<()> {
        let tenant_id = order.tenant_id().ok_or_else(DomainError::not_found)?;
        let cmd = PurchaseOrderCommand::SubmitForConfirmation(SubmitForConfirmation {
            tenant_id,
            order_id: order.id_typed(),
            occurred_at: now,
        });
        let events = dispatch(order, cmd)?;

        if events
            .iter()
            .any(|e| matches!(e, PurchaseOrderEvent::SubmittedForApproval(_)))
        {
            self.post_note(
                order,
                &format!(
                    "Purchase order {} is submitted for {} approval.",
                    order.reference(),
                    ApprovalLevel::Level1
                ),
            );
            self.notify_approvers(order, ApprovalLevel::Level1);
        } else {
            info!(order = %order.reference(), "purchase order auto-confirmed");
        }
        Ok(())
    }

    /// Level-1 sign-off. Finalizes level-1-only orders, otherwise advances to
    /// `ApprovedLevel1` and notifies the level-2 group.
    pub fn approve_level1(
        &self,
        principal: &Principal,
        order: &mut PurchaseOrder,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.check_approver(principal, ApprovalLevel::Level1)?;

        let tenant_id = order.tenant_id().ok_or_else(DomainError::not_found)?;
        let cmd = PurchaseOrderCommand::ApproveLevel1(ApproveLevel1 {
            tenant_id,
            order_id: order.id_typed(),
            approver: principal.user_id,
            occurred_at: now,
        });
        dispatch(order, cmd)?;

        if order.status() == PurchaseOrderStatus::Confirmed {
            self.post_note(
                order,
                &format!(
                    "Purchase order {} approved and confirmed by Level 1 approver.",
                    order.reference()
                ),
            );
        } else {
            self.post_note(
                order,
                &format!(
                    "Purchase order {} approved at Level 1. Waiting for Level 2 approval.",
                    order.reference()
                ),
            );
            self.notify_approvers(order, ApprovalLevel::Level2);
        }
        Ok(())
    }

    /// Level-2 sign-off; always finalizes.
    pub fn approve_level2(
        &self,
        principal: &Principal,
        order: &mut PurchaseOrder,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.check_approver(principal, ApprovalLevel::Level2)?;

        let tenant_id = order.tenant_id().ok_or_else(DomainError::not_found)?;
        let cmd = PurchaseOrderCommand::ApproveLevel2(ApproveLevel2 {
            tenant_id,
            order_id: order.id_typed(),
            approver: principal.user_id,
            occurred_at: now,
        });
        dispatch(order, cmd)?;

        self.post_note(
            order,
            &format!(
                "Purchase order {} approved and confirmed by Level 2 approver.",
                order.reference()
            ),
        );
        Ok(())
    }

    /// Reject a pending order and send the requester a rejection notice.
    pub fn reject(
        &self,
        principal: &Principal,
        order: &mut PurchaseOrder,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let tenant_id = order.tenant_id().ok_or_else(DomainError::not_found)?;
        let cmd = PurchaseOrderCommand::Reject(Reject {
            tenant_id,
            order_id: order.id_typed(),
            rejected_by: principal.user_id,
            occurred_at: now,
        });
        dispatch(order, cmd)?;

        match order.requester_email() {
            Some(email) => {
                let context = NotificationContext::new()
                    .with("order", order.reference())
                    .with("rejected_by", principal.user_id.to_string());
                if let Err(err) = self.notifier.send_mail(
                    &[email.to_string()],
                    MailTemplate::RejectionNotice,
                    &context,
                ) {
                    warn!(order = %order.reference(), %err, "failed to send rejection notice");
                }
            }
            None => {
                warn!(order = %order.reference(), "requester has no email, skipping rejection notice");
            }
        }
        Ok(())
    }

    fn check_approver(&self, principal: &Principal, level: ApprovalLevel) -> DomainResult<()> {
        let Some(permission) = required_permission(level) else {
            return Ok(());
        };
        authorize(principal, &permission).map_err(|_| {
            DomainError::unauthorized(format!("you don't have access to {level} approval"))
        })
    }

    fn notify_approvers(&self, order: &PurchaseOrder, level: ApprovalLevel) {
        let emails = self.directory.approver_emails(level);
        if emails.is_empty() {
            warn!(order = %order.reference(), %level, "no approver emails found, skipping notification");
            return;
        }

        let context = NotificationContext::new()
            .with("order", order.reference())
            .with("level", level.to_string())
            .with("amount_total", order.amount_total().to_string());
        if let Err(err) = self
            .notifier
            .send_mail(&emails, MailTemplate::ApprovalRequest, &context)
        {
            warn!(order = %order.reference(), %level, %err, "failed to send approval notification");
        } else {
            info!(order = %order.reference(), %level, "approval notification sent");
        }
    }

    fn post_note(&self, order: &PurchaseOrder, body: &str) {
        if let Err(err) = self.notifier.post_note(order.reference(), body) {
            warn!(order = %order.reference(), %err, "failed to post timeline note");
        }
    }
}

/// Run a command against the aggregate and fold the emitted events back in.
fn dispatch(
    order: &mut PurchaseOrder,
    cmd: PurchaseOrderCommand,
) -> DomainResult<Vec<PurchaseOrderEvent>> {
    let events = order.handle(&cmd)?;
    for event in &events {
        order.apply(event);
    }
    Ok(events)
}
