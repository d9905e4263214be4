//! Parties module (customers and their grouping tags).
//!
//! Plain entities: these records are inputs to the rule modules, not
//! workflows of their own.

pub mod customer;

pub use customer::{Customer, GroupTag, GroupTagId, PartyId};
