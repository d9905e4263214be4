//! Company-level accounting configuration.

use serde::{Deserialize, Serialize};

use orderflow_core::{DomainError, DomainResult};

use crate::account::{Account, AccountKind};

/// Accounting settings scoped to one company.
///
/// The advance-received account is where customer advance payments are parked
/// as a liability until earned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanySettings {
    advance_account: Option<Account>,
}

impl CompanySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the advance-received account. Must be a liability account.
    pub fn set_advance_account(&mut self, account: Account) -> DomainResult<()> {
        if account.kind != AccountKind::Liability {
            return Err(DomainError::validation(
                "advance received account must be a liability account",
            ));
        }
        self.advance_account = Some(account);
        Ok(())
    }

    /// The configured advance-received account, or a configuration error.
    pub fn advance_account(&self) -> DomainResult<&Account> {
        self.advance_account.as_ref().ok_or_else(|| {
            DomainError::configuration(
                "no advance received account is configured in accounting settings",
            )
        })
    }
}
