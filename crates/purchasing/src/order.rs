use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orderflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError, DomainEvent, TenantId, UserId};
use orderflow_parties::PartyId;
use orderflow_products::ProductId;

/// Below or at this total (cents) an order confirms without approval.
pub const AUTO_APPROVE_LIMIT: i64 = 500_000;
/// Totals above [`AUTO_APPROVE_LIMIT`] up to and including this need level 1.
pub const LEVEL1_LIMIT: i64 = 2_000_000;

/// Purchase order identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseOrderId(pub AggregateId);

impl PurchaseOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PurchaseOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Approval tier required for a purchase order, derived from its total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalLevel {
    Auto,
    Level1,
    Level2,
}

impl ApprovalLevel {
    /// Classify an order total (cents). Boundaries are inclusive on the low
    /// side of each tier: 5,000.00 is still auto, 20,000.00 is still level 1.
    pub fn for_amount(total: i64) -> Self {
        if total <= AUTO_APPROVE_LIMIT {
            ApprovalLevel::Auto
        } else if total <= LEVEL1_LIMIT {
            ApprovalLevel::Level1
        } else {
            ApprovalLevel::Level2
        }
    }
}

impl core::fmt::Display for ApprovalLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ApprovalLevel::Auto => f.write_str("auto"),
            ApprovalLevel::Level1 => f.write_str("Level 1"),
            ApprovalLevel::Level2 => f.write_str("Level 2"),
        }
    }
}

/// Purchase order status lifecycle.
///
/// Transitions only move forward (Draft → ToApprove → ApprovedLevel1 →
/// Confirmed) or to the terminal `Rejected` state from a pending status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Draft,
    ToApprove,
    ApprovedLevel1,
    Confirmed,
    Rejected,
}

impl PurchaseOrderStatus {
    /// Pending statuses are the only ones a rejection may come from.
    pub fn is_pending_approval(self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::ToApprove | PurchaseOrderStatus::ApprovedLevel1
        )
    }
}

/// Purchase order line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    /// Unit price in cents.
    pub unit_price: i64,
}

impl LineItem {
    pub fn total(&self) -> i64 {
        self.quantity * self.unit_price
    }
}

/// Who signed off at an approval level, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub approver: UserId,
    pub approved_at: DateTime<Utc>,
}

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    tenant_id: Option<TenantId>,
    reference: String,
    supplier_id: Option<PartyId>,
    requester: Option<UserId>,
    requester_email: Option<String>,
    status: PurchaseOrderStatus,
    lines: Vec<LineItem>,
    /// Level captured when the order was submitted for approval.
    required_level: Option<ApprovalLevel>,
    level1_approval: Option<ApprovalRecord>,
    level2_approval: Option<ApprovalRecord>,
    rejected_by: Option<UserId>,
    rejected_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl PurchaseOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchaseOrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            reference: String::new(),
            supplier_id: None,
            requester: None,
            requester_email: None,
            status: PurchaseOrderStatus::Draft,
            lines: Vec::new(),
            required_level: None,
            level1_approval: None,
            level2_approval: None,
            rejected_by: None,
            rejected_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn supplier_id(&self) -> Option<PartyId> {
        self.supplier_id
    }

    pub fn requester(&self) -> Option<UserId> {
        self.requester
    }

    pub fn requester_email(&self) -> Option<&str> {
        self.requester_email.as_deref()
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    /// Order total in cents (sum of line totals).
    pub fn amount_total(&self) -> i64 {
        self.lines.iter().map(LineItem::total).sum()
    }

    /// Approval tier the current total requires.
    ///
    /// Pure function of `amount_total`, so it is always in sync with line
    /// edits. Once submitted, the tier captured at submission time governs
    /// the workflow (`required_level_at_submission`).
    pub fn required_level(&self) -> ApprovalLevel {
        ApprovalLevel::for_amount(self.amount_total())
    }

    pub fn required_level_at_submission(&self) -> Option<ApprovalLevel> {
        self.required_level
    }

    pub fn level1_approval(&self) -> Option<&ApprovalRecord> {
        self.level1_approval.as_ref()
    }

    pub fn level2_approval(&self) -> Option<&ApprovalRecord> {
        self.level2_approval.as_ref()
    }

    pub fn rejected_by(&self) -> Option<UserId> {
        self.rejected_by
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchaseOrder {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub reference: String,
    pub supplier_id: PartyId,
    pub requester: UserId,
    pub requester_email: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLine (only allowed in Draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLine {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitForConfirmation (the "confirm" button).
///
/// Auto-tier orders confirm immediately; the others move to `ToApprove`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitForConfirmation {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveLevel1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveLevel1 {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub approver: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveLevel2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveLevel2 {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub approver: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Reject (allowed from any pending status).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reject {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub rejected_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderCommand {
    CreatePurchaseOrder(CreatePurchaseOrder),
    AddLine(AddLine),
    SubmitForConfirmation(SubmitForConfirmation),
    ApproveLevel1(ApproveLevel1),
    ApproveLevel2(ApproveLevel2),
    Reject(Reject),
}

/// Event: PurchaseOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderCreated {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub reference: String,
    pub supplier_id: PartyId,
    pub requester: UserId,
    pub requester_email: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAdded {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SubmittedForApproval (carries the tier the total required).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedForApproval {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub required_level: ApprovalLevel,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ApprovedAtLevel1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovedAtLevel1 {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub approver: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ApprovedAtLevel2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovedAtLevel2 {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub approver: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderConfirmed (final sign-off, or auto-approval at submit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmed {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderRejected (terminal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRejected {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub rejected_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderEvent {
    PurchaseOrderCreated(PurchaseOrderCreated),
    LineAdded(LineAdded),
    SubmittedForApproval(SubmittedForApproval),
    ApprovedAtLevel1(ApprovedAtLevel1),
    ApprovedAtLevel2(ApprovedAtLevel2),
    OrderConfirmed(OrderConfirmed),
    OrderRejected(OrderRejected),
}

impl DomainEvent for PurchaseOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(_) => "purchasing.order.created",
            PurchaseOrderEvent::LineAdded(_) => "purchasing.order.line_added",
            PurchaseOrderEvent::SubmittedForApproval(_) => "purchasing.order.submitted",
            PurchaseOrderEvent::ApprovedAtLevel1(_) => "purchasing.order.approved_level1",
            PurchaseOrderEvent::ApprovedAtLevel2(_) => "purchasing.order.approved_level2",
            PurchaseOrderEvent::OrderConfirmed(_) => "purchasing.order.confirmed",
            PurchaseOrderEvent::OrderRejected(_) => "purchasing.order.rejected",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => e.occurred_at,
            PurchaseOrderEvent::LineAdded(e) => e.occurred_at,
            PurchaseOrderEvent::SubmittedForApproval(e) => e.occurred_at,
            PurchaseOrderEvent::ApprovedAtLevel1(e) => e.occurred_at,
            PurchaseOrderEvent::ApprovedAtLevel2(e) => e.occurred_at,
            PurchaseOrderEvent::OrderConfirmed(e) => e.occurred_at,
            PurchaseOrderEvent::OrderRejected(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseOrderCommand;
    type Event = PurchaseOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => {
                self.id = e.order_id;
                self.tenant_id = Some(e.tenant_id);
                self.reference = e.reference.clone();
                self.supplier_id = Some(e.supplier_id);
                self.requester = Some(e.requester);
                self.requester_email = e.requester_email.clone();
                self.status = PurchaseOrderStatus::Draft;
                self.lines.clear();
                self.created = true;
            }
            PurchaseOrderEvent::LineAdded(e) => {
                self.lines.push(LineItem {
                    line_no: e.line_no,
                    product_id: e.product_id,
                    quantity: e.quantity,
                    unit_price: e.unit_price,
                });
            }
            PurchaseOrderEvent::SubmittedForApproval(e) => {
                self.status = PurchaseOrderStatus::ToApprove;
                self.required_level = Some(e.required_level);
            }
            PurchaseOrderEvent::ApprovedAtLevel1(e) => {
                self.status = PurchaseOrderStatus::ApprovedLevel1;
                self.level1_approval = Some(ApprovalRecord {
                    approver: e.approver,
                    approved_at: e.occurred_at,
                });
            }
            PurchaseOrderEvent::ApprovedAtLevel2(e) => {
                self.level2_approval = Some(ApprovalRecord {
                    approver: e.approver,
                    approved_at: e.occurred_at,
                });
            }
            PurchaseOrderEvent::OrderConfirmed(_) => {
                self.status = PurchaseOrderStatus::Confirmed;
            }
            PurchaseOrderEvent::OrderRejected(e) => {
                self.status = PurchaseOrderStatus::Rejected;
                self.rejected_by = Some(e.rejected_by);
                self.rejected_at = Some(e.occurred_at);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseOrderCommand::CreatePurchaseOrder(cmd) => self.handle_create(cmd),
            PurchaseOrderCommand::AddLine(cmd) => self.handle_add_line(cmd),
            PurchaseOrderCommand::SubmitForConfirmation(cmd) => self.handle_submit(cmd),
            PurchaseOrderCommand::ApproveLevel1(cmd) => self.handle_approve_level1(cmd),
            PurchaseOrderCommand::ApproveLevel2(cmd) => self.handle_approve_level2(cmd),
            PurchaseOrderCommand::Reject(cmd) => self.handle_reject(cmd),
        }
    }
}

impl PurchaseOrder {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_order_id(&self, order_id: PurchaseOrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(&self, tenant_id: TenantId, order_id: PurchaseOrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(tenant_id)?;
        self.ensure_order_id(order_id)
    }

    fn handle_create(
        &self,
        cmd: &CreatePurchaseOrder,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase order already exists"));
        }
        if cmd.reference.trim().is_empty() {
            return Err(DomainError::validation("order reference must not be empty"));
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderCreated(
            PurchaseOrderCreated {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                reference: cmd.reference.clone(),
                supplier_id: cmd.supplier_id,
                requester: cmd.requester,
                requester_email: cmd.requester_email.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_add_line(&self, cmd: &AddLine) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;

        if self.status != PurchaseOrderStatus::Draft {
            return Err(DomainError::invariant(
                "cannot modify purchase order once submitted",
            ));
        }
        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if cmd.unit_price < 0 {
            return Err(DomainError::validation("unit price must not be negative"));
        }

        let next_line_no = (self.lines.len() as u32) + 1;
        Ok(vec![PurchaseOrderEvent::LineAdded(LineAdded {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            line_no: next_line_no,
            product_id: cmd.product_id,
            quantity: cmd.quantity,
            unit_price: cmd.unit_price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit(
        &self,
        cmd: &SubmitForConfirmation,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;

        if self.status != PurchaseOrderStatus::Draft {
            return Err(DomainError::invariant(
                "only draft purchase orders can be submitted",
            ));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation(
                "cannot submit purchase order without lines",
            ));
        }

        let level = self.required_level();
        match level {
            ApprovalLevel::Auto => Ok(vec![PurchaseOrderEvent::OrderConfirmed(OrderConfirmed {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                occurred_at: cmd.occurred_at,
            })]),
            ApprovalLevel::Level1 | ApprovalLevel::Level2 => {
                Ok(vec![PurchaseOrderEvent::SubmittedForApproval(
                    SubmittedForApproval {
                        tenant_id: cmd.tenant_id,
                        order_id: cmd.order_id,
                        required_level: level,
                        occurred_at: cmd.occurred_at,
                    },
                )])
            }
        }
    }

    fn handle_approve_level1(
        &self,
        cmd: &ApproveLevel1,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;

        if self.status != PurchaseOrderStatus::ToApprove {
            return Err(DomainError::invariant(
                "level 1 approval requires a purchase order waiting for approval",
            ));
        }

        let mut events = vec![PurchaseOrderEvent::ApprovedAtLevel1(ApprovedAtLevel1 {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            approver: cmd.approver,
            occurred_at: cmd.occurred_at,
        })];

        // A level-1-only order is final after the first sign-off.
        if self.required_level == Some(ApprovalLevel::Level1) {
            events.push(PurchaseOrderEvent::OrderConfirmed(OrderConfirmed {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_approve_level2(
        &self,
        cmd: &ApproveLevel2,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;

        // Sequential sign-off: level 2 always comes after level 1.
        if self.status != PurchaseOrderStatus::ApprovedLevel1 {
            return Err(DomainError::invariant(
                "level 2 approval requires a level 1 approved purchase order",
            ));
        }

        Ok(vec![
            PurchaseOrderEvent::ApprovedAtLevel2(ApprovedAtLevel2 {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                approver: cmd.approver,
                occurred_at: cmd.occurred_at,
            }),
            PurchaseOrderEvent::OrderConfirmed(OrderConfirmed {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                occurred_at: cmd.occurred_at,
            }),
        ])
    }

    fn handle_reject(&self, cmd: &Reject) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;

        // State never regresses: a confirmed (or already rejected) order
        // cannot be rejected.
        if !self.status.is_pending_approval() {
            return Err(DomainError::invariant(
                "only purchase orders pending approval can be rejected",
            ));
        }

        Ok(vec![PurchaseOrderEvent::OrderRejected(OrderRejected {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            rejected_by: cmd.rejected_by,
            occurred_at: cmd.occurred_at,
        })])
    }
}
