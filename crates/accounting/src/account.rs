use serde::{Deserialize, Serialize};

use orderflow_core::ValueObject;

/// High-level account kind (determines normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

/// Account identifier + metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub code: String, // e.g. "1100"
    pub name: String, // e.g. "Accounts Receivable"
    pub kind: AccountKind,
}

impl Account {
    pub fn new(code: impl Into<String>, name: impl Into<String>, kind: AccountKind) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            kind,
        }
    }
}

impl ValueObject for Account {}
