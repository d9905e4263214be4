use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use orderflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError, DomainEvent, TenantId};

use crate::account::Account;

/// One side of a journal entry (immutable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryLine {
    pub account: Account,
    /// Line label, e.g. "Advance Payment - SO0042".
    pub label: String,
    /// Positive amount in smallest currency unit (cents).
    pub amount: i64,
    /// true = debit, false = credit.
    pub is_debit: bool,
}

/// Ledger identifier (aggregate id).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerId(pub AggregateId);

impl LedgerId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for LedgerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A journal entry that has been posted to the ledger.
///
/// Posted entries are immutable facts; there is no draft stage at this layer,
/// the generators post balanced entries in one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedEntry {
    pub entry_id: uuid::Uuid,
    /// Free-form reference, e.g. "Advance for SO0042".
    pub reference: String,
    /// Counterparty, when the entry relates to one (customer/supplier id).
    pub partner_id: Option<AggregateId>,
    pub lines: Vec<JournalEntryLine>,
    pub entry_date: NaiveDate,
}

impl PostedEntry {
    pub fn debit_total(&self) -> i64 {
        self.lines
            .iter()
            .filter(|l| l.is_debit)
            .map(|l| l.amount)
            .sum()
    }

    pub fn credit_total(&self) -> i64 {
        self.lines
            .iter()
            .filter(|l| !l.is_debit)
            .map(|l| l.amount)
            .sum()
    }
}

/// Aggregate root: Ledger (double-entry journal).
///
/// The ledger keeps the posted entries it has accepted so callers can look an
/// entry up again by id (the "view entry" record action). Balances are a
/// projection concern and are not maintained here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    id: LedgerId,
    tenant_id: Option<TenantId>,
    entries: Vec<PostedEntry>,
    version: u64,
    created: bool,
}

impl Ledger {
    /// Empty aggregate for rehydration.
    pub fn empty(id: LedgerId) -> Self {
        Self {
            id,
            tenant_id: None,
            entries: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> LedgerId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn entries(&self) -> &[PostedEntry] {
        &self.entries
    }

    pub fn find_entry(&self, entry_id: uuid::Uuid) -> Option<&PostedEntry> {
        self.entries.iter().find(|e| e.entry_id == entry_id)
    }
}

impl AggregateRoot for Ledger {
    type Id = LedgerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PostJournalEntry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostJournalEntry {
    pub tenant_id: TenantId,
    pub ledger_id: LedgerId,
    pub entry_id: uuid::Uuid,
    pub reference: String,
    pub partner_id: Option<AggregateId>,
    pub lines: Vec<JournalEntryLine>,
    pub entry_date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalCommand {
    PostJournalEntry(PostJournalEntry),
}

/// Event: JournalEntryPosted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryPosted {
    pub tenant_id: TenantId,
    pub ledger_id: LedgerId,
    pub entry: PostedEntry,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    JournalEntryPosted(JournalEntryPosted),
}

impl DomainEvent for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::JournalEntryPosted(_) => "accounting.ledger.journal_entry_posted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::JournalEntryPosted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Ledger {
    type Command = JournalCommand;
    type Event = LedgerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LedgerEvent::JournalEntryPosted(e) => {
                self.id = e.ledger_id;
                if self.tenant_id.is_none() {
                    self.tenant_id = Some(e.tenant_id);
                    self.created = true;
                }
                self.entries.push(e.entry.clone());
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            JournalCommand::PostJournalEntry(cmd) => self.handle_post(cmd),
        }
    }
}

impl Ledger {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn handle_post(&self, cmd: &PostJournalEntry) -> Result<Vec<LedgerEvent>, DomainError> {
        self.ensure_tenant(cmd.tenant_id)?;

        if self.find_entry(cmd.entry_id).is_some() {
            return Err(DomainError::conflict("journal entry already posted"));
        }

        if cmd.lines.is_empty() {
            return Err(DomainError::validation("journal entry must have lines"));
        }

        let mut debit_total: i128 = 0;
        let mut credit_total: i128 = 0;

        for line in &cmd.lines {
            if line.amount <= 0 {
                return Err(DomainError::validation("amount must be positive"));
            }
            if line.is_debit {
                debit_total += line.amount as i128;
            } else {
                credit_total += line.amount as i128;
            }
        }

        if debit_total != credit_total {
            return Err(DomainError::invariant("debits must equal credits"));
        }

        Ok(vec![LedgerEvent::JournalEntryPosted(JournalEntryPosted {
            tenant_id: cmd.tenant_id,
            ledger_id: cmd.ledger_id,
            entry: PostedEntry {
                entry_id: cmd.entry_id,
                reference: cmd.reference.clone(),
                partner_id: cmd.partner_id,
                lines: cmd.lines.clone(),
                entry_date: cmd.entry_date,
            },
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountKind;
    use orderflow_core::AggregateId;
    use proptest::prelude::*;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_ledger_id() -> LedgerId {
        LedgerId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn test_account(code: &str, kind: AccountKind) -> Account {
        Account::new(code, code, kind)
    }

    fn balanced_lines(amount: i64) -> Vec<JournalEntryLine> {
        vec![
            JournalEntryLine {
                account: test_account("1100", AccountKind::Asset),
                label: "debit side".to_string(),
                amount,
                is_debit: true,
            },
            JournalEntryLine {
                account: test_account("2300", AccountKind::Liability),
                label: "credit side".to_string(),
                amount,
                is_debit: false,
            },
        ]
    }

    fn post_cmd(
        tenant_id: TenantId,
        ledger_id: LedgerId,
        entry_id: uuid::Uuid,
        lines: Vec<JournalEntryLine>,
    ) -> PostJournalEntry {
        PostJournalEntry {
            tenant_id,
            ledger_id,
            entry_id,
            reference: "Advance for SO0001".to_string(),
            partner_id: Some(AggregateId::new()),
            lines,
            entry_date: test_date(),
            occurred_at: test_time(),
        }
    }

    #[test]
    fn balanced_entry_is_posted() {
        let ledger = Ledger::empty(test_ledger_id());
        let tenant_id = test_tenant_id();
        let ledger_id = test_ledger_id();
        let lines = balanced_lines(10_000);

        let cmd = post_cmd(tenant_id, ledger_id, uuid::Uuid::now_v7(), lines.clone());
        let events = ledger
            .handle(&JournalCommand::PostJournalEntry(cmd))
            .unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            LedgerEvent::JournalEntryPosted(e) => {
                assert_eq!(e.tenant_id, tenant_id);
                assert_eq!(e.ledger_id, ledger_id);
                assert_eq!(e.entry.lines, lines);
                assert_eq!(e.entry.debit_total(), e.entry.credit_total());
            }
        }
    }

    #[test]
    fn unbalanced_entry_is_rejected() {
        let ledger = Ledger::empty(test_ledger_id());
        let mut lines = balanced_lines(10_000);
        lines[1].amount = 9_000;

        let cmd = post_cmd(test_tenant_id(), test_ledger_id(), uuid::Uuid::now_v7(), lines);
        let err = ledger
            .handle(&JournalCommand::PostJournalEntry(cmd))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) if msg.contains("debits must equal credits") => {}
            other => panic!("expected invariant violation, got {other:?}"),
        }
    }

    #[test]
    fn reposting_the_same_entry_id_conflicts() {
        let tenant_id = test_tenant_id();
        let ledger_id = test_ledger_id();
        let mut ledger = Ledger::empty(ledger_id);
        let entry_id = uuid::Uuid::now_v7();

        let cmd = post_cmd(tenant_id, ledger_id, entry_id, balanced_lines(5_000));
        let events = ledger
            .handle(&JournalCommand::PostJournalEntry(cmd.clone()))
            .unwrap();
        for e in &events {
            ledger.apply(e);
        }
        assert!(ledger.find_entry(entry_id).is_some());

        let err = ledger
            .handle(&JournalCommand::PostJournalEntry(cmd))
            .unwrap_err();
        match err {
            DomainError::Conflict(msg) if msg.contains("already posted") => {}
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: for any sequence of balanced entries, the sum of debits
        /// minus credits across the whole ledger is zero.
        #[test]
        fn posted_ledger_always_balances(
            amounts in prop::collection::vec(1i64..1_000_000i64, 1..10)
        ) {
            let tenant_id = test_tenant_id();
            let ledger_id = test_ledger_id();
            let mut ledger = Ledger::empty(ledger_id);

            for amount in amounts {
                let cmd = post_cmd(tenant_id, ledger_id, uuid::Uuid::now_v7(), balanced_lines(amount));
                let events = ledger.handle(&JournalCommand::PostJournalEntry(cmd)).unwrap();
                for e in &events {
                    ledger.apply(e);
                }
            }

            let mut total: i128 = 0;
            for entry in ledger.entries() {
                total += entry.debit_total() as i128;
                total -= entry.credit_total() as i128;
            }

            prop_assert_eq!(total, 0);
        }
    }
}
