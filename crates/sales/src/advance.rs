//! Advance-payment ledger entries.
//!
//! Confirming an order that carries an advance posts one balanced journal
//! entry: debit the customer's receivable account, credit the company's
//! advance-received liability account. The order keeps the posted entry id so
//! the entry can be opened again later and is never generated twice.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};

use orderflow_accounting::{
    CompanySettings, JournalCommand, JournalEntryLine, Ledger, PostJournalEntry, PostedEntry,
};
use orderflow_core::{Aggregate, DomainError, DomainResult};
use orderflow_notify::NotificationService;
use orderflow_parties::Customer;

use crate::order::{ConfirmOrder, RecordAdvanceEntry, SalesOrder, SalesOrderCommand};

/// Confirm a draft order, then generate its advance entry when an advance
/// payment was captured. Orders without an advance confirm without touching
/// the ledger.
pub fn confirm_order(
    order: &mut SalesOrder,
    customer: &Customer,
    settings: &CompanySettings,
    ledger: &mut Ledger,
    notifier: &dyn NotificationService,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> DomainResult<Option<uuid::Uuid>> {
    let tenant_id = order.tenant_id().ok_or_else(DomainError::not_found)?;

    // Fail on missing account configuration before any state moves, so a
    // half-confirmed order never exists.
    if order.advance_payment() > 0 {
        customer.receivable_account()?;
        settings.advance_account()?;
    }

    let cmd = SalesOrderCommand::ConfirmOrder(ConfirmOrder {
        tenant_id,
        order_id: order.id_typed(),
        occurred_at: now,
    });
    let events = order.handle(&cmd)?;
    for event in &events {
        order.apply(event);
    }
    info!(order = %order.reference(), "sales order confirmed");

    if order.advance_payment() > 0 {
        create_advance_entry(order, customer, settings, ledger, notifier, today, now).map(Some)
    } else {
        Ok(None)
    }
}

/// Post the advance-payment journal entry for a confirmed order and link it.
///
/// Idempotent: an order that already holds an entry id returns it unchanged.
/// The entry is two lines for the full advance amount, debiting the
/// customer's receivable and crediting the advance-received liability, with
/// the customer as partner.
pub fn create_advance_entry(
    order: &mut SalesOrder,
    customer: &Customer,
    settings: &CompanySettings,
    ledger: &mut Ledger,
    notifier: &dyn NotificationService,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> DomainResult<uuid::Uuid> {
    if let Some(existing) = order.advance_entry_id() {
        return Ok(existing);
    }

    let tenant_id = order.tenant_id().ok_or_else(DomainError::not_found)?;
    let amount = order.advance_payment();
    if amount <= 0 {
        return Err(DomainError::invariant(
            "order carries no advance payment to post",
        ));
    }

    let receivable = customer.receivable_account()?.clone();
    let advance_account = settings.advance_account()?.clone();
    let entry_id = uuid::Uuid::now_v7();

    // Validate the order-side transition before posting, so a refused link
    // (wrong status) leaves the ledger untouched.
    let record_cmd = SalesOrderCommand::RecordAdvanceEntry(RecordAdvanceEntry {
        tenant_id,
        order_id: order.id_typed(),
        entry_id,
        occurred_at: now,
    });
    let record_events = order.handle(&record_cmd)?;

    let label = format!("Advance Payment - {}", order.reference());
    let post_cmd = JournalCommand::PostJournalEntry(PostJournalEntry {
        tenant_id,
        ledger_id: ledger.id_typed(),
        entry_id,
        reference: format!("Advance for {}", order.reference()),
        partner_id: Some(customer.id.0),
        lines: vec![
            JournalEntryLine {
                account: receivable,
                label: label.clone(),
                amount,
                is_debit: true,
            },
            JournalEntryLine {
                account: advance_account,
                label,
                amount,
                is_debit: false,
            },
        ],
        entry_date: today,
        occurred_at: now,
    });
    let ledger_events = ledger.handle(&post_cmd)?;
    for event in &ledger_events {
        ledger.apply(event);
    }
    for event in &record_events {
        order.apply(event);
    }
    info!(order = %order.reference(), %entry_id, amount, "advance payment entry posted");

    // Timeline note is best-effort; a notification failure never unwinds a
    // posted entry.
    if let Err(err) = notifier.post_note(
        order.reference(),
        &format!("Advance payment entry created: Advance for {}", order.reference()),
    ) {
        warn!(order = %order.reference(), %err, "failed to post advance entry note");
    }

    Ok(entry_id)
}

/// Look up the advance entry linked to an order.
///
/// [`DomainError::NotFound`] both when the order has no linked entry and when
/// the link points at an entry the ledger does not hold.
pub fn view_advance_entry<'a>(order: &SalesOrder, ledger: &'a Ledger) -> DomainResult<&'a PostedEntry> {
    let entry_id = order.advance_entry_id().ok_or_else(DomainError::not_found)?;
    ledger.find_entry(entry_id).ok_or_else(DomainError::not_found)
}
