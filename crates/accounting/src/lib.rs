//! Accounting module (double-entry ledger, event-sourced).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod account;
pub mod company;
pub mod journal;

pub use account::{Account, AccountKind};
pub use company::CompanySettings;
pub use journal::{
    JournalCommand, JournalEntryLine, JournalEntryPosted, Ledger, LedgerEvent, LedgerId,
    PostJournalEntry, PostedEntry,
};
