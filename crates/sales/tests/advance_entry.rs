//! Order confirmation and the advance-payment ledger entry it generates.

use chrono::{NaiveDate, Utc};

use orderflow_accounting::{Account, AccountKind, CompanySettings, Ledger, LedgerId};
use orderflow_core::{Aggregate, AggregateId, DomainError, TenantId};
use orderflow_notify::{InMemoryNotifier, NoopNotifier, NotifyError};
use orderflow_parties::{Customer, PartyId};
use orderflow_products::ProductId;
use orderflow_sales::{
    confirm_order, create_advance_entry, view_advance_entry, AddLine, CreateSalesOrder, LineKind,
    SalesOrder, SalesOrderCommand, SalesOrderId, SalesOrderStatus,
};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

fn run(order: &mut SalesOrder, cmd: SalesOrderCommand) {
    let events = order.handle(&cmd).unwrap();
    for e in &events {
        order.apply(e);
    }
}

fn draft_order(tenant_id: TenantId, advance: i64) -> SalesOrder {
    let order_id = SalesOrderId::new(AggregateId::new());
    let mut order = SalesOrder::empty(order_id);
    run(
        &mut order,
        SalesOrderCommand::CreateSalesOrder(CreateSalesOrder {
            tenant_id,
            order_id,
            reference: "SO0042".to_string(),
            customer_id: PartyId::new(AggregateId::new()),
            order_date: today(),
            advance_payment: advance,
            occurred_at: Utc::now(),
        }),
    );
    run(
        &mut order,
        SalesOrderCommand::AddLine(AddLine {
            tenant_id,
            order_id,
            kind: LineKind::Product,
            product_id: Some(ProductId::new(AggregateId::new())),
            description: "widget".to_string(),
            quantity: 2,
            unit_price: 60_000,
            occurred_at: Utc::now(),
        }),
    );
    order
}

fn configured_customer() -> Customer {
    let mut customer = Customer::new(PartyId::new(AggregateId::new()), "Acme Ltd");
    customer.receivable_account = Some(Account::new(
        "1100",
        "Accounts Receivable",
        AccountKind::Asset,
    ));
    customer
}

fn configured_settings() -> CompanySettings {
    let mut settings = CompanySettings::new();
    settings
        .set_advance_account(Account::new(
            "2300",
            "Advances Received",
            AccountKind::Liability,
        ))
        .unwrap();
    settings
}

#[test]
fn confirmation_posts_a_balanced_advance_entry_and_links_it() {
    let tenant_id = TenantId::new();
    let mut order = draft_order(tenant_id, 30_000);
    let customer = configured_customer();
    let settings = configured_settings();
    let mut ledger = Ledger::empty(LedgerId::new(AggregateId::new()));
    let notifier = InMemoryNotifier::new();

    let entry_id = confirm_order(
        &mut order,
        &customer,
        &settings,
        &mut ledger,
        &notifier,
        today(),
        Utc::now(),
    )
    .unwrap()
    .expect("advance entry generated");

    assert_eq!(order.status(), SalesOrderStatus::Confirmed);
    assert_eq!(order.advance_entry_id(), Some(entry_id));

    let entry = view_advance_entry(&order, &ledger).unwrap();
    assert_eq!(entry.reference, "Advance for SO0042");
    assert_eq!(entry.partner_id, Some(customer.id.0));
    assert_eq!(entry.entry_date, today());
    assert_eq!(entry.lines.len(), 2);
    assert_eq!(entry.debit_total(), 30_000);
    assert_eq!(entry.credit_total(), 30_000);

    let debit = entry.lines.iter().find(|l| l.is_debit).unwrap();
    let credit = entry.lines.iter().find(|l| !l.is_debit).unwrap();
    assert_eq!(debit.account.code, "1100");
    assert_eq!(credit.account.code, "2300");
    assert_eq!(debit.label, "Advance Payment - SO0042");
    assert_eq!(credit.label, "Advance Payment - SO0042");

    // Timeline note on the order.
    let notes = notifier.notes();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].subject_ref, "SO0042");
}

#[test]
fn order_without_advance_confirms_with_no_ledger_activity() {
    let tenant_id = TenantId::new();
    let mut order = draft_order(tenant_id, 0);
    let customer = Customer::new(PartyId::new(AggregateId::new()), "Acme Ltd");
    let settings = CompanySettings::new(); // unconfigured is fine here
    let mut ledger = Ledger::empty(LedgerId::new(AggregateId::new()));

    let result = confirm_order(
        &mut order,
        &customer,
        &settings,
        &mut ledger,
        &NoopNotifier,
        today(),
        Utc::now(),
    )
    .unwrap();

    assert_eq!(result, None);
    assert_eq!(order.status(), SalesOrderStatus::Confirmed);
    assert!(ledger.entries().is_empty());
    assert!(view_advance_entry(&order, &ledger).is_err());
}

#[test]
fn generating_the_entry_twice_returns_the_same_entry() {
    let tenant_id = TenantId::new();
    let mut order = draft_order(tenant_id, 30_000);
    let customer = configured_customer();
    let settings = configured_settings();
    let mut ledger = Ledger::empty(LedgerId::new(AggregateId::new()));

    let first = confirm_order(
        &mut order,
        &customer,
        &settings,
        &mut ledger,
        &NoopNotifier,
        today(),
        Utc::now(),
    )
    .unwrap()
    .unwrap();

    let second = create_advance_entry(
        &mut order,
        &customer,
        &settings,
        &mut ledger,
        &NoopNotifier,
        today(),
        Utc::now(),
    )
    .unwrap();

    assert_eq!(first, second);
    assert_eq!(ledger.entries().len(), 1);
}

#[test]
fn missing_advance_account_blocks_confirmation_entirely() {
    let tenant_id = TenantId::new();
    let mut order = draft_order(tenant_id, 30_000);
    let customer = configured_customer();
    let settings = CompanySettings::new();
    let mut ledger = Ledger::empty(LedgerId::new(AggregateId::new()));

    let err = confirm_order(
        &mut order,
        &customer,
        &settings,
        &mut ledger,
        &NoopNotifier,
        today(),
        Utc::now(),
    )
    .unwrap_err();

    assert!(matches!(err, DomainError::Configuration(_)));
    // Nothing moved: order still draft, ledger empty.
    assert_eq!(order.status(), SalesOrderStatus::Draft);
    assert_eq!(order.advance_entry_id(), None);
    assert!(ledger.entries().is_empty());
}

#[test]
fn missing_receivable_account_names_the_customer() {
    let tenant_id = TenantId::new();
    let mut order = draft_order(tenant_id, 30_000);
    let customer = Customer::new(PartyId::new(AggregateId::new()), "Globex Inc");
    let settings = configured_settings();
    let mut ledger = Ledger::empty(LedgerId::new(AggregateId::new()));

    let err = confirm_order(
        &mut order,
        &customer,
        &settings,
        &mut ledger,
        &NoopNotifier,
        today(),
        Utc::now(),
    )
    .unwrap_err();

    match err {
        DomainError::Configuration(msg) => assert!(msg.contains("Globex Inc")),
        other => panic!("expected configuration error, got {other:?}"),
    }
    assert_eq!(order.status(), SalesOrderStatus::Draft);
}

#[test]
fn note_failure_never_unwinds_the_posted_entry() {
    let tenant_id = TenantId::new();
    let mut order = draft_order(tenant_id, 30_000);
    let customer = configured_customer();
    let settings = configured_settings();
    let mut ledger = Ledger::empty(LedgerId::new(AggregateId::new()));
    let notifier = InMemoryNotifier::new();
    notifier.fail_with(NotifyError::Send("smtp down".to_string()));

    let entry_id = confirm_order(
        &mut order,
        &customer,
        &settings,
        &mut ledger,
        &notifier,
        today(),
        Utc::now(),
    )
    .unwrap()
    .unwrap();

    assert_eq!(order.advance_entry_id(), Some(entry_id));
    assert_eq!(ledger.entries().len(), 1);
    assert!(notifier.notes().is_empty());
}
