use serde::{Deserialize, Serialize};

use orderflow_core::{AggregateId, Entity};

/// Product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Product category identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub AggregateId);

impl CategoryId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CategoryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Product category (used as a profitability-report filter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Product record.
///
/// `standard_cost` is the per-unit replenishment cost used for margin
/// computation; `list_price` is the default sales price. Both in cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub category: Option<Category>,
    pub list_price: i64,
    pub standard_cost: i64,
}

impl Product {
    pub fn new(id: ProductId, sku: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            sku: sku.into(),
            name: name.into(),
            category: None,
            list_price: 0,
            standard_cost: 0,
        }
    }

    pub fn category_id(&self) -> Option<CategoryId> {
        self.category.as_ref().map(|c| c.id)
    }

    pub fn category_name(&self) -> Option<&str> {
        self.category.as_ref().map(|c| c.name.as_str())
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
