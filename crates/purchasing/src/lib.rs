//! Purchasing module (purchase orders with tiered approval, event-sourced).
//!
//! The aggregate in [`order`] contains the pure state machine; the workflow
//! service in [`approval`] layers authorization and best-effort notification
//! on top of it.

pub mod approval;
pub mod order;

pub use approval::{ApprovalWorkflow, ApproverDirectory, StaticApproverDirectory};
pub use order::{
    AddLine, ApprovalLevel, ApprovalRecord, ApproveLevel1, ApproveLevel2, CreatePurchaseOrder,
    LineItem, OrderConfirmed, OrderRejected, PurchaseOrder, PurchaseOrderCommand,
    PurchaseOrderCreated, PurchaseOrderEvent, PurchaseOrderId, PurchaseOrderStatus, Reject,
    SubmitForConfirmation,
};
