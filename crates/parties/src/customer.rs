use serde::{Deserialize, Serialize};

use orderflow_accounting::Account;
use orderflow_core::{AggregateId, DomainError, DomainResult, Entity};

/// Party identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(pub AggregateId);

impl PartyId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PartyId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Identifier of a customer grouping tag.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupTagId(pub AggregateId);

impl GroupTagId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for GroupTagId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A customer grouping tag (e.g. "Wholesale", "VIP").
///
/// Discount rules may be scoped to one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupTag {
    pub id: GroupTagId,
    pub name: String,
}

impl Entity for GroupTag {
    type Id = GroupTagId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Customer record.
///
/// Carries the fields the rule modules read: grouping tags for discount-rule
/// scoping, the receivable account for advance-payment entries, and the
/// contact email used for rejection notices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: PartyId,
    pub name: String,
    pub email: Option<String>,
    pub tags: Vec<GroupTagId>,
    pub receivable_account: Option<Account>,
}

impl Customer {
    pub fn new(id: PartyId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: None,
            tags: Vec::new(),
            receivable_account: None,
        }
    }

    pub fn has_tag(&self, tag: GroupTagId) -> bool {
        self.tags.contains(&tag)
    }

    /// The customer's receivable account, or a configuration error naming
    /// the customer.
    pub fn receivable_account(&self) -> DomainResult<&Account> {
        self.receivable_account.as_ref().ok_or_else(|| {
            DomainError::configuration(format!(
                "no receivable account is set for customer {}",
                self.name
            ))
        })
    }
}

impl Entity for Customer {
    type Id = PartyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderflow_accounting::AccountKind;

    #[test]
    fn missing_receivable_account_is_a_configuration_error() {
        let customer = Customer::new(PartyId::new(AggregateId::new()), "Acme Ltd");
        match customer.receivable_account() {
            Err(DomainError::Configuration(msg)) => assert!(msg.contains("Acme Ltd")),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn tags_are_matched_by_id() {
        let tag = GroupTagId::new(AggregateId::new());
        let mut customer = Customer::new(PartyId::new(AggregateId::new()), "Acme Ltd");
        assert!(!customer.has_tag(tag));
        customer.tags.push(tag);
        assert!(customer.has_tag(tag));
    }

    #[test]
    fn configured_receivable_account_is_returned() {
        let mut customer = Customer::new(PartyId::new(AggregateId::new()), "Acme Ltd");
        customer.receivable_account = Some(Account::new(
            "1100",
            "Accounts Receivable",
            AccountKind::Asset,
        ));
        assert_eq!(customer.receivable_account().unwrap().code, "1100");
    }
}
