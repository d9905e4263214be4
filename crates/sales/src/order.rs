use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use orderflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError, DomainEvent, TenantId};
use orderflow_parties::PartyId;
use orderflow_products::ProductId;

use crate::discount::{DiscountRuleId, MAX_DISCOUNT_BPS};

/// Sales order identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SalesOrderId(pub AggregateId);

impl SalesOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SalesOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Sales order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalesOrderStatus {
    Draft,
    Confirmed,
}

/// Kind of order line. Section and note lines are display-only: they never
/// carry money and are excluded from every aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Product,
    Section,
    Note,
}

impl LineKind {
    pub fn is_display(self) -> bool {
        matches!(self, LineKind::Section | LineKind::Note)
    }
}

/// Order line: product, quantity, unit price, applied discount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_no: u32,
    pub kind: LineKind,
    /// Present on product lines, absent on display lines.
    pub product_id: Option<ProductId>,
    pub description: String,
    pub quantity: i64,
    /// Unit price in cents.
    pub unit_price: i64,
    /// Discount in basis points (0..=10_000), written by the rule matcher.
    pub discount_bps: u32,
}

impl OrderLine {
    /// Gross amount before discount (zero for display lines).
    pub fn gross(&self) -> i64 {
        if self.kind.is_display() {
            0
        } else {
            self.quantity * self.unit_price
        }
    }

    /// Line total after discount.
    pub fn total(&self) -> i64 {
        let gross = self.gross();
        gross - gross * self.discount_bps as i64 / MAX_DISCOUNT_BPS as i64
    }
}

/// Aggregate root: SalesOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesOrder {
    id: SalesOrderId,
    tenant_id: Option<TenantId>,
    reference: String,
    customer_id: Option<PartyId>,
    order_date: Option<NaiveDate>,
    status: SalesOrderStatus,
    lines: Vec<OrderLine>,
    /// Advance received from the customer, in cents. Never negative.
    advance_payment: i64,
    /// At most one advance ledger entry per order.
    advance_entry_id: Option<uuid::Uuid>,
    applied_discount_rule_id: Option<DiscountRuleId>,
    discount_bps: u32,
    version: u64,
    created: bool,
}

impl SalesOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: SalesOrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            reference: String::new(),
            customer_id: None,
            order_date: None,
            status: SalesOrderStatus::Draft,
            lines: Vec::new(),
            advance_payment: 0,
            advance_entry_id: None,
            applied_discount_rule_id: None,
            discount_bps: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SalesOrderId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn customer_id(&self) -> Option<PartyId> {
        self.customer_id
    }

    pub fn order_date(&self) -> Option<NaiveDate> {
        self.order_date
    }

    pub fn status(&self) -> SalesOrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn advance_payment(&self) -> i64 {
        self.advance_payment
    }

    pub fn advance_entry_id(&self) -> Option<uuid::Uuid> {
        self.advance_entry_id
    }

    pub fn applied_discount_rule_id(&self) -> Option<DiscountRuleId> {
        self.applied_discount_rule_id
    }

    pub fn discount_bps(&self) -> u32 {
        self.discount_bps
    }

    /// Pre-discount subtotal of product lines, in cents.
    ///
    /// This is the figure the discount matcher ranges over.
    pub fn subtotal(&self) -> i64 {
        self.lines.iter().map(OrderLine::gross).sum()
    }

    /// Post-discount total of product lines, in cents.
    pub fn amount_total(&self) -> i64 {
        self.lines.iter().map(OrderLine::total).sum()
    }

    pub fn is_modifiable(&self) -> bool {
        matches!(self.status, SalesOrderStatus::Draft)
    }
}

impl AggregateRoot for SalesOrder {
    type Id = SalesOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateSalesOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSalesOrder {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub reference: String,
    pub customer_id: PartyId,
    pub order_date: NaiveDate,
    /// Advance received from the customer, in cents.
    pub advance_payment: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLine {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub kind: LineKind,
    pub product_id: Option<ProductId>,
    pub description: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateLine (edit of the tracked fields: product, quantity, price).
///
/// Callers must re-run the discount matcher afterwards; recomputation is an
/// explicit step, not a hidden trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateLine {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub line_no: u32,
    pub product_id: Option<ProductId>,
    pub quantity: i64,
    pub unit_price: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApplyDiscount (outcome of the rule matcher).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyDiscount {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub rule_id: Option<DiscountRuleId>,
    pub discount_bps: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmOrder {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordAdvanceEntry (link the posted ledger entry to the order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordAdvanceEntry {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub entry_id: uuid::Uuid,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesOrderCommand {
    CreateSalesOrder(CreateSalesOrder),
    AddLine(AddLine),
    UpdateLine(UpdateLine),
    ApplyDiscount(ApplyDiscount),
    ConfirmOrder(ConfirmOrder),
    RecordAdvanceEntry(RecordAdvanceEntry),
}

/// Event: SalesOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderCreated {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub reference: String,
    pub customer_id: PartyId,
    pub order_date: NaiveDate,
    pub advance_payment: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAdded {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub line_no: u32,
    pub kind: LineKind,
    pub product_id: Option<ProductId>,
    pub description: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineUpdated {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub line_no: u32,
    pub product_id: Option<ProductId>,
    pub quantity: i64,
    pub unit_price: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DiscountApplied (or cleared, when `rule_id` is `None`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountApplied {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub rule_id: Option<DiscountRuleId>,
    pub discount_bps: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmed {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AdvanceEntryRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceEntryRecorded {
    pub tenant_id: TenantId,
    pub order_id: SalesOrderId,
    pub entry_id: uuid::Uuid,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesOrderEvent {
    SalesOrderCreated(SalesOrderCreated),
    LineAdded(LineAdded),
    LineUpdated(LineUpdated),
    DiscountApplied(DiscountApplied),
    OrderConfirmed(OrderConfirmed),
    AdvanceEntryRecorded(AdvanceEntryRecorded),
}

impl DomainEvent for SalesOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SalesOrderEvent::SalesOrderCreated(_) => "sales.order.created",
            SalesOrderEvent::LineAdded(_) => "sales.order.line_added",
            SalesOrderEvent::LineUpdated(_) => "sales.order.line_updated",
            SalesOrderEvent::DiscountApplied(_) => "sales.order.discount_applied",
            SalesOrderEvent::OrderConfirmed(_) => "sales.order.confirmed",
            SalesOrderEvent::AdvanceEntryRecorded(_) => "sales.order.advance_entry_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SalesOrderEvent::SalesOrderCreated(e) => e.occurred_at,
            SalesOrderEvent::LineAdded(e) => e.occurred_at,
            SalesOrderEvent::LineUpdated(e) => e.occurred_at,
            SalesOrderEvent::DiscountApplied(e) => e.occurred_at,
            SalesOrderEvent::OrderConfirmed(e) => e.occurred_at,
            SalesOrderEvent::AdvanceEntryRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SalesOrder {
    type Command = SalesOrderCommand;
    type Event = SalesOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SalesOrderEvent::SalesOrderCreated(e) => {
                self.id = e.order_id;
                self.tenant_id = Some(e.tenant_id);
                self.reference = e.reference.clone();
                self.customer_id = Some(e.customer_id);
                self.order_date = Some(e.order_date);
                self.advance_payment = e.advance_payment;
                self.status = SalesOrderStatus::Draft;
                self.lines.clear();
                self.created = true;
            }
            SalesOrderEvent::LineAdded(e) => {
                self.lines.push(OrderLine {
                    line_no: e.line_no,
                    kind: e.kind,
                    product_id: e.product_id,
                    description: e.description.clone(),
                    quantity: e.quantity,
                    unit_price: e.unit_price,
                    discount_bps: 0,
                });
            }
            SalesOrderEvent::LineUpdated(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == e.line_no) {
                    line.product_id = e.product_id;
                    line.quantity = e.quantity;
                    line.unit_price = e.unit_price;
                }
            }
            SalesOrderEvent::DiscountApplied(e) => {
                self.applied_discount_rule_id = e.rule_id;
                self.discount_bps = e.discount_bps;
                for line in self.lines.iter_mut().filter(|l| !l.kind.is_display()) {
                    line.discount_bps = e.discount_bps;
                }
            }
            SalesOrderEvent::OrderConfirmed(_) => {
                self.status = SalesOrderStatus::Confirmed;
            }
            SalesOrderEvent::AdvanceEntryRecorded(e) => {
                self.advance_entry_id = Some(e.entry_id);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SalesOrderCommand::CreateSalesOrder(cmd) => self.handle_create(cmd),
            SalesOrderCommand::AddLine(cmd) => self.handle_add_line(cmd),
            SalesOrderCommand::UpdateLine(cmd) => self.handle_update_line(cmd),
            SalesOrderCommand::ApplyDiscount(cmd) => self.handle_apply_discount(cmd),
            SalesOrderCommand::ConfirmOrder(cmd) => self.handle_confirm(cmd),
            SalesOrderCommand::RecordAdvanceEntry(cmd) => self.handle_record_advance(cmd),
        }
    }
}

impl SalesOrder {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_exists(&self, tenant_id: TenantId, order_id: SalesOrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(tenant_id)?;
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_modifiable(&self) -> Result<(), DomainError> {
        if !self.is_modifiable() {
            return Err(DomainError::invariant(
                "cannot modify sales order once confirmed",
            ));
        }
        Ok(())
    }

    fn check_line_fields(kind: LineKind, product_id: Option<ProductId>, quantity: i64, unit_price: i64) -> Result<(), DomainError> {
        if kind.is_display() {
            return Ok(());
        }
        if product_id.is_none() {
            return Err(DomainError::validation("product line requires a product"));
        }
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if unit_price < 0 {
            return Err(DomainError::validation("unit price must not be negative"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateSalesOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("sales order already exists"));
        }
        if cmd.reference.trim().is_empty() {
            return Err(DomainError::validation("order reference must not be empty"));
        }
        if cmd.advance_payment < 0 {
            return Err(DomainError::validation(
                "advance payment must not be negative",
            ));
        }

        Ok(vec![SalesOrderEvent::SalesOrderCreated(SalesOrderCreated {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            reference: cmd.reference.clone(),
            customer_id: cmd.customer_id,
            order_date: cmd.order_date,
            advance_payment: cmd.advance_payment,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_line(&self, cmd: &AddLine) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;
        self.ensure_modifiable()?;
        Self::check_line_fields(cmd.kind, cmd.product_id, cmd.quantity, cmd.unit_price)?;

        let (quantity, unit_price) = if cmd.kind.is_display() {
            (0, 0)
        } else {
            (cmd.quantity, cmd.unit_price)
        };

        let next_line_no = (self.lines.len() as u32) + 1;
        Ok(vec![SalesOrderEvent::LineAdded(LineAdded {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            line_no: next_line_no,
            kind: cmd.kind,
            product_id: cmd.product_id,
            description: cmd.description.clone(),
            quantity,
            unit_price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_line(&self, cmd: &UpdateLine) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;
        self.ensure_modifiable()?;

        let line = self
            .lines
            .iter()
            .find(|l| l.line_no == cmd.line_no)
            .ok_or_else(DomainError::not_found)?;
        if line.kind.is_display() {
            return Err(DomainError::validation(
                "display lines carry no product, quantity, or price",
            ));
        }
        Self::check_line_fields(line.kind, cmd.product_id, cmd.quantity, cmd.unit_price)?;

        Ok(vec![SalesOrderEvent::LineUpdated(LineUpdated {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            line_no: cmd.line_no,
            product_id: cmd.product_id,
            quantity: cmd.quantity,
            unit_price: cmd.unit_price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_apply_discount(&self, cmd: &ApplyDiscount) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;
        self.ensure_modifiable()?;

        if cmd.discount_bps > MAX_DISCOUNT_BPS {
            return Err(DomainError::validation("discount exceeds 100%"));
        }
        if cmd.rule_id.is_none() && cmd.discount_bps != 0 {
            return Err(DomainError::validation(
                "discount without a matching rule must be zero",
            ));
        }

        Ok(vec![SalesOrderEvent::DiscountApplied(DiscountApplied {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            rule_id: cmd.rule_id,
            discount_bps: cmd.discount_bps,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &ConfirmOrder) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;

        if self.status != SalesOrderStatus::Draft {
            return Err(DomainError::invariant(
                "only draft sales orders can be confirmed",
            ));
        }

        Ok(vec![SalesOrderEvent::OrderConfirmed(OrderConfirmed {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_advance(
        &self,
        cmd: &RecordAdvanceEntry,
    ) -> Result<Vec<SalesOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;

        if self.status != SalesOrderStatus::Confirmed {
            return Err(DomainError::invariant(
                "advance entries are recorded on confirmed orders only",
            ));
        }
        if self.advance_entry_id.is_some() {
            return Err(DomainError::conflict(
                "an advance entry is already recorded for this order",
            ));
        }

        Ok(vec![SalesOrderEvent::AdvanceEntryRecorded(
            AdvanceEntryRecorded {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                entry_id: cmd.entry_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}
