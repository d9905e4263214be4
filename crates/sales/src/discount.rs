//! Tiered discount rules and the best-fit matcher.
//!
//! Matching is an explicit recomputation step: callers run
//! [`apply_best_discount`] after creating an order or editing a tracked line
//! field (product, quantity, unit price). Nothing recomputes behind the
//! caller's back.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use orderflow_core::{Aggregate, AggregateId, DomainError, DomainResult, Entity};
use orderflow_parties::GroupTagId;

use crate::order::{ApplyDiscount, SalesOrder, SalesOrderCommand, SalesOrderEvent};

/// 100% expressed in basis points.
pub const MAX_DISCOUNT_BPS: u32 = 10_000;

/// Discount rule identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscountRuleId(pub AggregateId);

impl DiscountRuleId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for DiscountRuleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A range + validity + tag scoped percentage discount definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountRule {
    pub id: DiscountRuleId,
    pub name: String,
    /// Inclusive subtotal range, in cents.
    pub min_amount: i64,
    pub max_amount: i64,
    /// Discount in basis points, (0, 10_000].
    pub discount_bps: u32,
    /// When set, the rule only applies to customers carrying this tag.
    pub customer_group: Option<GroupTagId>,
    /// Inclusive validity window.
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
    /// Tie-break anchor: earlier rules win among equal candidates.
    pub created_at: DateTime<Utc>,
}

impl DiscountRule {
    /// Build a rule, enforcing the range/percent/window validations.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: DiscountRuleId,
        name: impl Into<String>,
        min_amount: i64,
        max_amount: i64,
        discount_bps: u32,
        customer_group: Option<GroupTagId>,
        valid_from: NaiveDate,
        valid_to: NaiveDate,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if max_amount < min_amount {
            return Err(DomainError::validation(
                "maximum amount must be greater than or equal to minimum amount",
            ));
        }
        if max_amount <= 0 {
            return Err(DomainError::validation("maximum amount must be greater than 0"));
        }
        if discount_bps == 0 || discount_bps > MAX_DISCOUNT_BPS {
            return Err(DomainError::validation(
                "discount must be greater than 0 and less than or equal to 100%",
            ));
        }
        if valid_from > valid_to {
            return Err(DomainError::validation(
                "valid to must be greater than or equal to valid from",
            ));
        }
        Ok(Self {
            id,
            name: name.into(),
            min_amount,
            max_amount,
            discount_bps,
            customer_group,
            valid_from,
            valid_to,
            created_at,
        })
    }

    /// Width of the amount range; narrower rules win ties.
    pub fn range_width(&self) -> i64 {
        self.max_amount - self.min_amount
    }

    /// Whether this rule applies to the given subtotal, customer tags, and
    /// date. Range and window boundaries are inclusive. An untagged rule only
    /// matches an order whose customer has no tags at all.
    pub fn matches(&self, subtotal: i64, tags: &[GroupTagId], today: NaiveDate) -> bool {
        if subtotal < self.min_amount || subtotal > self.max_amount {
            return false;
        }
        if today < self.valid_from || today > self.valid_to {
            return false;
        }
        match self.customer_group {
            Some(group) => tags.contains(&group),
            None => tags.is_empty(),
        }
    }
}

impl Entity for DiscountRule {
    type Id = DiscountRuleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Pick the best-fit rule for a subtotal.
///
/// Best = highest discount. Ties are pinned deterministically: the narrower
/// amount range wins, then the earlier `created_at`.
pub fn best_rule<'a>(
    rules: &'a [DiscountRule],
    subtotal: i64,
    tags: &[GroupTagId],
    today: NaiveDate,
) -> Option<&'a DiscountRule> {
    rules
        .iter()
        .filter(|r| r.matches(subtotal, tags, today))
        .fold(None, |best: Option<&DiscountRule>, candidate| match best {
            None => Some(candidate),
            Some(current) => {
                let better = candidate.discount_bps > current.discount_bps
                    || (candidate.discount_bps == current.discount_bps
                        && (candidate.range_width() < current.range_width()
                            || (candidate.range_width() == current.range_width()
                                && candidate.created_at < current.created_at)));
                if better { Some(candidate) } else { Some(current) }
            }
        })
}

/// The set of configured discount rules.
///
/// Deleting a rule still referenced by an order is a referential-integrity
/// violation; callers pass an `in_use` predicate over their loaded orders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleBook {
    rules: Vec<DiscountRule>,
}

impl RuleBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rules(&self) -> &[DiscountRule] {
        &self.rules
    }

    pub fn get(&self, id: DiscountRuleId) -> Option<&DiscountRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn insert(&mut self, rule: DiscountRule) -> DomainResult<()> {
        if self.get(rule.id).is_some() {
            return Err(DomainError::conflict("discount rule already exists"));
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Remove a rule. `in_use` reports whether any sale order still
    /// references the rule id.
    pub fn remove(
        &mut self,
        id: DiscountRuleId,
        in_use: impl Fn(DiscountRuleId) -> bool,
    ) -> DomainResult<DiscountRule> {
        let pos = self
            .rules
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(DomainError::not_found)?;
        if in_use(id) {
            return Err(DomainError::validation(
                "cannot delete a discount rule that is used in a sale order",
            ));
        }
        Ok(self.rules.remove(pos))
    }
}

/// Re-run the matcher for an order and apply the outcome.
///
/// Selects the best-fit rule for the order's current subtotal and the
/// customer's tags, then applies its percentage to every product line; with
/// no match the discount resets to zero and the rule reference clears.
/// Returns the applied rule id, if any.
pub fn apply_best_discount(
    order: &mut SalesOrder,
    rules: &RuleBook,
    customer_tags: &[GroupTagId],
    today: NaiveDate,
    now: DateTime<Utc>,
) -> DomainResult<Option<DiscountRuleId>> {
    let tenant_id = order.tenant_id().ok_or_else(DomainError::not_found)?;
    let subtotal = order.subtotal();
    let best = best_rule(rules.rules(), subtotal, customer_tags, today);

    let (rule_id, discount_bps) = match best {
        Some(rule) => (Some(rule.id), rule.discount_bps),
        None => (None, 0),
    };
    debug!(order = %order.reference(), subtotal, ?rule_id, discount_bps, "discount recomputed");

    let cmd = SalesOrderCommand::ApplyDiscount(ApplyDiscount {
        tenant_id,
        order_id: order.id_typed(),
        rule_id,
        discount_bps,
        occurred_at: now,
    });
    let events = order.handle(&cmd)?;
    for event in &events {
        order.apply(event);
    }
    debug_assert!(matches!(
        events.as_slice(),
        [SalesOrderEvent::DiscountApplied(_)]
    ));

    Ok(rule_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rule(
        min: i64,
        max: i64,
        bps: u32,
        group: Option<GroupTagId>,
        created_offset_secs: i64,
    ) -> DiscountRule {
        DiscountRule::new(
            DiscountRuleId::new(AggregateId::new()),
            format!("{bps}bps {min}..{max}"),
            min,
            max,
            bps,
            group,
            date(2025, 1, 1),
            date(2025, 12, 31),
            DateTime::<Utc>::from_timestamp(1_700_000_000 + created_offset_secs, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn validation_rejects_bad_ranges_percentages_and_windows() {
        let id = DiscountRuleId::new(AggregateId::new());
        let from = date(2025, 1, 1);
        let to = date(2025, 12, 31);
        let now = Utc::now();

        assert!(DiscountRule::new(id, "r", 100, 50, 500, None, from, to, now).is_err());
        assert!(DiscountRule::new(id, "r", -10, 0, 500, None, from, to, now).is_err());
        assert!(DiscountRule::new(id, "r", 0, 100, 0, None, from, to, now).is_err());
        assert!(DiscountRule::new(id, "r", 0, 100, 10_001, None, from, to, now).is_err());
        assert!(DiscountRule::new(id, "r", 0, 100, 500, None, to, from, now).is_err());
        assert!(DiscountRule::new(id, "r", 0, 100, 10_000, None, from, to, now).is_ok());
    }

    #[test]
    fn boundary_subtotals_match_inclusively() {
        let r = rule(100_000, 500_000, 1_000, None, 0);
        let today = date(2025, 6, 1);
        assert!(!r.matches(99_999, &[], today));
        assert!(r.matches(100_000, &[], today));
        assert!(r.matches(500_000, &[], today));
        assert!(!r.matches(500_001, &[], today));
    }

    #[test]
    fn validity_window_is_inclusive_and_excludes_outside_dates() {
        let r = rule(0, 1_000_000, 1_000, None, 0);
        assert!(r.matches(500, &[], date(2025, 1, 1)));
        assert!(r.matches(500, &[], date(2025, 12, 31)));
        assert!(!r.matches(500, &[], date(2024, 12, 31)));
        assert!(!r.matches(500, &[], date(2026, 1, 1)));
    }

    #[test]
    fn tagged_rule_requires_the_tag_and_untagged_rule_requires_none() {
        let tag = GroupTagId::new(AggregateId::new());
        let other = GroupTagId::new(AggregateId::new());
        let tagged = rule(0, 1_000_000, 1_000, Some(tag), 0);
        let untagged = rule(0, 1_000_000, 1_000, None, 0);
        let today = date(2025, 6, 1);

        assert!(tagged.matches(500, &[tag], today));
        assert!(!tagged.matches(500, &[other], today));
        assert!(!tagged.matches(500, &[], today));

        assert!(untagged.matches(500, &[], today));
        assert!(!untagged.matches(500, &[tag], today));
    }

    #[test]
    fn highest_discount_wins_among_overlapping_rules() {
        // Overlap at 1,000 (10.00): 10% vs 15%.
        let rules = vec![
            rule(0, 100_000, 1_000, None, 0),
            rule(50_000, 200_000, 1_500, None, 1),
        ];
        let best = best_rule(&rules, 100_000, &[], date(2025, 6, 1)).unwrap();
        assert_eq!(best.discount_bps, 1_500);
    }

    #[test]
    fn equal_discounts_break_ties_on_narrower_range_then_age() {
        let wide = rule(0, 1_000_000, 1_500, None, 0);
        let narrow = rule(40_000, 60_000, 1_500, None, 5);
        let rules = [wide.clone(), narrow.clone()];
        let best = best_rule(&rules, 50_000, &[], date(2025, 6, 1)).unwrap();
        assert_eq!(best.id, narrow.id);

        let twin_a = rule(0, 100_000, 1_500, None, 0);
        let twin_b = rule(0, 100_000, 1_500, None, 10);
        let twins = [twin_b.clone(), twin_a.clone()];
        let best = best_rule(&twins, 50_000, &[], date(2025, 6, 1)).unwrap();
        assert_eq!(best.id, twin_a.id, "earlier created_at wins");
    }

    #[test]
    fn rulebook_blocks_deleting_an_in_use_rule() {
        let mut book = RuleBook::new();
        let r = rule(0, 100_000, 1_000, None, 0);
        let id = r.id;
        book.insert(r).unwrap();

        let err = book.remove(id, |_| true).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(book.get(id).is_some());

        book.remove(id, |_| false).unwrap();
        assert!(book.get(id).is_none());
    }

    #[test]
    fn removing_a_missing_rule_is_not_found() {
        let mut book = RuleBook::new();
        let err = book
            .remove(DiscountRuleId::new(AggregateId::new()), |_| false)
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    proptest! {
        /// Property: whatever the overlap structure, the selected rule always
        /// carries the maximum discount among all matching rules.
        #[test]
        fn selected_rule_has_max_discount_among_matches(
            specs in prop::collection::vec(
                (0i64..50_000, 1i64..100_000, 1u32..=10_000),
                1..12
            ),
            subtotal in 0i64..150_000
        ) {
            let today = date(2025, 6, 1);
            let rules: Vec<DiscountRule> = specs
                .into_iter()
                .enumerate()
                .map(|(i, (min, width, bps))| rule(min, min + width, bps, None, i as i64))
                .collect();

            let max_matching = rules
                .iter()
                .filter(|r| r.matches(subtotal, &[], today))
                .map(|r| r.discount_bps)
                .max();

            let selected = best_rule(&rules, subtotal, &[], today);
            prop_assert_eq!(selected.map(|r| r.discount_bps), max_matching);
        }
    }
}
