//! Products module (catalog records read by the rule modules).

pub mod product;

pub use product::{Category, CategoryId, Product, ProductId};
