//! Per-order revenue/cost/margin aggregation.
//!
//! The report is ephemeral: it is computed over already-loaded records and
//! never persisted. Revenue comes from the order lines (post-discount), cost
//! from the product's standard cost, margin is the difference.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use orderflow_core::{DomainError, DomainResult};
use orderflow_parties::{Customer, PartyId};
use orderflow_products::{CategoryId, Product};
use orderflow_sales::{SalesOrder, SalesOrderStatus};

/// Report parameters. Empty filter vectors mean "all".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitabilityQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub customers: Vec<PartyId>,
    pub categories: Vec<CategoryId>,
}

impl ProfitabilityQuery {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            customers: Vec::new(),
            categories: Vec::new(),
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.end_date < self.start_date {
            return Err(DomainError::validation(
                "end date must be greater than or equal to start date",
            ));
        }
        Ok(())
    }
}

/// One order's aggregated figures. Amounts in cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitabilityRow {
    pub sno: u32,
    pub order: String,
    pub customer: String,
    pub date: NaiveDate,
    /// Sorted, comma-joined category names of the contributing lines.
    pub category: String,
    pub revenue: i64,
    pub cost: i64,
    pub margin: i64,
}

/// The synthesized TOTAL figures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitabilityTotals {
    pub revenue: i64,
    pub cost: i64,
    pub margin: i64,
}

/// The screen-renderable report: data rows in order discovery order plus the
/// totals, with the resolved filter labels for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitabilityReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// "All Customers" when the query had no customer filter.
    pub customer_filter: String,
    /// "All Categories" when the query had no category filter.
    pub category_filter: String,
    pub rows: Vec<ProfitabilityRow>,
    pub totals: ProfitabilityTotals,
}

/// Aggregate the query over the given records.
///
/// Only confirmed orders inside the date range count, display lines never
/// contribute, and with a category filter only lines of a filtered category
/// do. Orders left with zero revenue and zero cost are dropped.
pub fn build_report(
    query: &ProfitabilityQuery,
    orders: &[SalesOrder],
    customers: &[Customer],
    products: &[Product],
) -> DomainResult<ProfitabilityReport> {
    query.validate()?;

    let customer_name = |id: PartyId| {
        customers
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.clone())
            .unwrap_or_default()
    };

    let mut rows = Vec::new();
    let mut totals = ProfitabilityTotals::default();

    for order in orders {
        if order.status() != SalesOrderStatus::Confirmed {
            continue;
        }
        let Some(order_date) = order.order_date() else {
            continue;
        };
        if order_date < query.start_date || order_date > query.end_date {
            continue;
        }
        let Some(customer_id) = order.customer_id() else {
            continue;
        };
        if !query.customers.is_empty() && !query.customers.contains(&customer_id) {
            continue;
        }

        let mut revenue = 0i64;
        let mut cost = 0i64;
        let mut categories = BTreeSet::new();

        for line in order.lines() {
            if line.kind.is_display() {
                continue;
            }
            let product = line
                .product_id
                .and_then(|id| products.iter().find(|p| p.id == id));
            let category_id = product.and_then(Product::category_id);
            if !query.categories.is_empty()
                && !category_id.is_some_and(|id| query.categories.contains(&id))
            {
                continue;
            }

            revenue += line.total();
            cost += product.map_or(0, |p| p.standard_cost) * line.quantity;
            if let Some(name) = product.and_then(Product::category_name) {
                categories.insert(name.to_string());
            }
        }

        if revenue == 0 && cost == 0 {
            continue;
        }

        let margin = revenue - cost;
        totals.revenue += revenue;
        totals.cost += cost;
        totals.margin += margin;

        let category = if categories.is_empty() {
            "Uncategorized".to_string()
        } else {
            categories.into_iter().collect::<Vec<_>>().join(", ")
        };

        rows.push(ProfitabilityRow {
            sno: rows.len() as u32 + 1,
            order: order.reference().to_string(),
            customer: customer_name(customer_id),
            date: order_date,
            category,
            revenue,
            cost,
            margin,
        });
    }

    Ok(ProfitabilityReport {
        start_date: query.start_date,
        end_date: query.end_date,
        customer_filter: filter_label(
            query.customers.iter().filter_map(|id| {
                customers
                    .iter()
                    .find(|c| c.id == *id)
                    .map(|c| c.name.as_str())
            }),
            "All Customers",
        ),
        category_filter: filter_label(
            query.categories.iter().filter_map(|id| {
                products
                    .iter()
                    .find_map(|p| p.category.as_ref().filter(|c| c.id == *id))
                    .map(|c| c.name.as_str())
            }),
            "All Categories",
        ),
        rows,
        totals,
    })
}

fn filter_label<'a>(names: impl Iterator<Item = &'a str>, all: &str) -> String {
    let joined = names.collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        all.to_string()
    } else {
        joined
    }
}
