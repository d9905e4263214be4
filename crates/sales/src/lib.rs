//! Sales module: orders, tiered discount rules, advance-payment entries.
//!
//! The aggregate in [`order`] is the pure state machine; [`discount`] holds
//! the rule definitions and the matcher; [`advance`] generates the paired
//! advance-payment ledger entry on confirmation.

pub mod advance;
pub mod discount;
pub mod order;

pub use advance::{confirm_order, create_advance_entry, view_advance_entry};
pub use discount::{
    apply_best_discount, best_rule, DiscountRule, DiscountRuleId, RuleBook, MAX_DISCOUNT_BPS,
};
pub use order::{
    AddLine, ApplyDiscount, ConfirmOrder, CreateSalesOrder, LineKind, OrderLine, RecordAdvanceEntry,
    SalesOrder, SalesOrderCommand, SalesOrderEvent, SalesOrderId, SalesOrderStatus, UpdateLine,
};
