//! `orderflow-auth` — pure authorization boundary.
//!
//! This crate is intentionally decoupled from transport and storage: callers
//! resolve a [`Principal`] however they like (session, token, test fixture)
//! and the domain services check it with [`authorize`].

pub mod authorize;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{authorize, AuthzError, Principal};
pub use permissions::Permission;
pub use principal::{PrincipalId, TenantMembership};
pub use roles::Role;
