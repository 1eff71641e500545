//! Quantity reconciliation planning.
//!
//! Every ledger mutation translates into one or two signed deltas against
//! `SparePart::quantity`. This module decides *which* deltas apply and
//! whether they are allowed; the infra engine applies them inside a
//! transaction that holds the affected part rows locked.
//!
//! ## Revising a stock-out
//!
//! ```text
//! same part       quantity += original.quantity - revised.quantity
//! part changed    original part  += original.quantity
//!                 revised part   -= revised.quantity
//! ```

use smis_core::{DomainError, DomainResult, SparePartId};

use crate::ledger::{NewStockIn, NewStockOut, StockOutEntry, StockOutRevision};
use crate::part::{MAX_QUANTITY, SparePart};

/// A signed change to one part's on-hand quantity.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct QuantityDelta {
    pub spare_part_id: SparePartId,
    pub delta: i64,
}

impl QuantityDelta {
    pub fn new(spare_part_id: SparePartId, delta: i64) -> Self {
        Self {
            spare_part_id,
            delta,
        }
    }
}

/// Check that `on_hand + delta.delta` stays within `0..=MAX_QUANTITY`.
pub fn ensure_capacity(on_hand: i64, delta: QuantityDelta) -> DomainResult<()> {
    match on_hand.checked_add(delta.delta) {
        Some(next) if next < 0 => Err(DomainError::insufficient_stock(
            on_hand,
            delta.delta.saturating_neg(),
        )),
        Some(next) if next <= MAX_QUANTITY => Ok(()),
        _ => Err(DomainError::validation(format!(
            "on-hand quantity cannot exceed {MAX_QUANTITY} (have {on_hand}, adding {})",
            delta.delta
        ))),
    }
}

/// Delta for a stock-in against the locked `part`: `+quantity`.
pub fn receipt(part: &SparePart, entry: &NewStockIn) -> DomainResult<QuantityDelta> {
    debug_assert_eq!(part.id, entry.spare_part_id);
    let delta = QuantityDelta::new(part.id, entry.quantity);
    ensure_capacity(part.quantity, delta)?;
    Ok(delta)
}

/// Delta for a stock-out against the locked `part`: `-quantity`.
///
/// Rejected before anything is applied when the part cannot cover it.
pub fn withdrawal(part: &SparePart, entry: &NewStockOut) -> DomainResult<QuantityDelta> {
    debug_assert_eq!(part.id, entry.spare_part_id);
    if part.quantity < entry.quantity {
        return Err(DomainError::insufficient_stock(part.quantity, entry.quantity));
    }
    Ok(QuantityDelta::new(part.id, -entry.quantity))
}

/// Delta that undoes a stock-out: `+quantity` on its part.
pub fn reversal(entry: &StockOutEntry) -> QuantityDelta {
    QuantityDelta::new(entry.spare_part_id, entry.quantity)
}

/// Compensating adjustments for replacing `original` with a revision.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RevisionPlan {
    /// Same part, same quantity: only price/date change.
    Unchanged,
    /// Same part, quantity changed: one net delta.
    Adjust {
        delta: QuantityDelta,
        original_quantity: i64,
        revised_quantity: i64,
    },
    /// Part changed: restore the original part, withdraw from the new one.
    Reassign {
        restore: QuantityDelta,
        withdraw: QuantityDelta,
    },
}

impl RevisionPlan {
    /// Deltas in application order.
    pub fn deltas(&self) -> Vec<QuantityDelta> {
        match *self {
            RevisionPlan::Unchanged => Vec::new(),
            RevisionPlan::Adjust { delta, .. } => vec![delta],
            RevisionPlan::Reassign { restore, withdraw } => vec![restore, withdraw],
        }
    }

    /// Parts whose rows must be locked, ascending (a stable lock order).
    pub fn parts(&self, original: &StockOutEntry) -> Vec<SparePartId> {
        let mut parts = match *self {
            RevisionPlan::Reassign { restore, withdraw } => {
                vec![restore.spare_part_id, withdraw.spare_part_id]
            }
            _ => vec![original.spare_part_id],
        };
        parts.sort();
        parts.dedup();
        parts
    }

    /// Reject the plan if it would leave the withdrawing part below zero, or
    /// push a restocked part above `MAX_QUANTITY`.
    ///
    /// `on_hand` reports the current (locked) quantity of a part.
    pub fn ensure_stock_covers(&self, on_hand: impl Fn(SparePartId) -> Option<i64>) -> DomainResult<()> {
        match *self {
            RevisionPlan::Unchanged => Ok(()),
            RevisionPlan::Adjust {
                delta,
                original_quantity,
                revised_quantity,
            } => {
                let current = on_hand(delta.spare_part_id)
                    .ok_or_else(|| DomainError::not_found("spare part"))?;
                match ensure_capacity(current, delta) {
                    Err(DomainError::InsufficientStock { .. }) => Err(DomainError::insufficient_stock(
                        current + original_quantity,
                        revised_quantity,
                    )),
                    other => other,
                }
            }
            RevisionPlan::Reassign { restore, withdraw } => {
                let target = on_hand(withdraw.spare_part_id)
                    .ok_or_else(|| DomainError::not_found("spare part"))?;
                ensure_capacity(target, withdraw)?;
                let source = on_hand(restore.spare_part_id)
                    .ok_or_else(|| DomainError::not_found("spare part"))?;
                ensure_capacity(source, restore)
            }
        }
    }
}

/// Plan the compensating deltas for revising `original`.
pub fn plan_revision(original: &StockOutEntry, revision: &StockOutRevision) -> RevisionPlan {
    if original.spare_part_id == revision.spare_part_id {
        let diff = original.quantity - revision.quantity;
        if diff == 0 {
            return RevisionPlan::Unchanged;
        }
        return RevisionPlan::Adjust {
            delta: QuantityDelta::new(original.spare_part_id, diff),
            original_quantity: original.quantity,
            revised_quantity: revision.quantity,
        };
    }

    RevisionPlan::Reassign {
        restore: reversal(original),
        withdraw: QuantityDelta::new(revision.spare_part_id, -revision.quantity),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use smis_core::StockOutId;

    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()
    }

    fn part(quantity: i64) -> SparePart {
        SparePart {
            id: SparePartId::new(),
            name: "Oil filter".to_string(),
            category: "Engine".to_string(),
            quantity,
            unit_price: dec!(7.25),
        }
    }

    fn entry(part_id: SparePartId, quantity: i64) -> StockOutEntry {
        StockOutEntry {
            id: StockOutId::new(),
            spare_part_id: part_id,
            quantity,
            unit_price: dec!(7.25),
            date: day(),
        }
    }

    fn revision(part_id: SparePartId, quantity: i64) -> StockOutRevision {
        StockOutRevision {
            spare_part_id: part_id,
            quantity,
            unit_price: dec!(8),
            date: day(),
        }
    }

    #[test]
    fn withdrawal_within_stock_is_negative_delta() {
        let p = part(10);
        let out = NewStockOut {
            spare_part_id: p.id,
            quantity: 6,
            unit_price: dec!(1),
            date: day(),
        };
        assert_eq!(withdrawal(&p, &out).unwrap(), QuantityDelta::new(p.id, -6));
    }

    #[test]
    fn withdrawal_of_exact_stock_is_allowed() {
        let p = part(6);
        let out = NewStockOut {
            spare_part_id: p.id,
            quantity: 6,
            unit_price: dec!(1),
            date: day(),
        };
        assert!(withdrawal(&p, &out).is_ok());
    }

    #[test]
    fn withdrawal_beyond_stock_reports_available_and_requested() {
        let p = part(4);
        let out = NewStockOut {
            spare_part_id: p.id,
            quantity: 6,
            unit_price: dec!(1),
            date: day(),
        };
        assert_eq!(
            withdrawal(&p, &out),
            Err(DomainError::insufficient_stock(4, 6))
        );
    }

    #[test]
    fn receipt_raises_quantity() {
        let p = part(4);
        let input = NewStockIn {
            spare_part_id: p.id,
            quantity: 6,
            date: day(),
        };
        assert_eq!(receipt(&p, &input).unwrap(), QuantityDelta::new(p.id, 6));
    }

    #[test]
    fn receipt_past_capacity_is_rejected() {
        let p = part(1);
        let input = NewStockIn {
            spare_part_id: p.id,
            quantity: MAX_QUANTITY,
            date: day(),
        };
        assert!(matches!(receipt(&p, &input), Err(DomainError::Validation(_))));
    }

    #[test]
    fn capacity_check_never_overflows() {
        let id = SparePartId::new();
        assert!(matches!(
            ensure_capacity(i64::MAX, QuantityDelta::new(id, i64::MAX)),
            Err(DomainError::Validation(_))
        ));
        assert_eq!(
            ensure_capacity(3, QuantityDelta::new(id, -5)),
            Err(DomainError::insufficient_stock(3, 5))
        );
        assert!(ensure_capacity(MAX_QUANTITY - 1, QuantityDelta::new(id, 1)).is_ok());
    }

    #[test]
    fn reassignment_restoring_past_capacity_is_rejected() {
        let a = part(MAX_QUANTITY);
        let b = part(20);
        let original = entry(a.id, 5);
        let plan = plan_revision(&original, &revision(b.id, 5));
        let quantities = BTreeMap::from([(a.id, MAX_QUANTITY), (b.id, 20)]);
        let err = plan
            .ensure_stock_covers(|id| quantities.get(&id).copied())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn identical_revision_plans_nothing() {
        let p = part(10);
        let original = entry(p.id, 5);
        let plan = plan_revision(&original, &revision(p.id, 5));
        assert_eq!(plan, RevisionPlan::Unchanged);
        assert!(plan.deltas().is_empty());
    }

    #[test]
    fn same_part_increase_is_single_negative_delta() {
        // Part at 10 with a live entry of 5 (baseline 15); editing to 8 leaves 7.
        let p = part(10);
        let original = entry(p.id, 5);
        let plan = plan_revision(&original, &revision(p.id, 8));
        assert_eq!(plan.deltas(), vec![QuantityDelta::new(p.id, -3)]);
        assert_eq!(p.quantity + plan.deltas()[0].delta, 7);
    }

    #[test]
    fn same_part_decrease_returns_stock() {
        let p = part(10);
        let original = entry(p.id, 5);
        let plan = plan_revision(&original, &revision(p.id, 2));
        assert_eq!(plan.deltas(), vec![QuantityDelta::new(p.id, 3)]);
    }

    #[test]
    fn reassignment_restores_then_withdraws() {
        let a = part(10);
        let b = part(20);
        let original = entry(a.id, 5);
        let plan = plan_revision(&original, &revision(b.id, 5));
        assert_eq!(
            plan.deltas(),
            vec![QuantityDelta::new(a.id, 5), QuantityDelta::new(b.id, -5)]
        );

        let mut parts = plan.parts(&original);
        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(parts, expected);
        parts.dedup();
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn same_part_increase_beyond_stock_is_rejected() {
        let p = part(2);
        let original = entry(p.id, 5);
        let plan = plan_revision(&original, &revision(p.id, 8));
        let err = plan.ensure_stock_covers(|_| Some(2)).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock(7, 8));
    }

    #[test]
    fn reassignment_to_short_part_is_rejected() {
        let a = part(10);
        let b = part(3);
        let original = entry(a.id, 5);
        let plan = plan_revision(&original, &revision(b.id, 5));
        let quantities = BTreeMap::from([(a.id, 10), (b.id, 3)]);
        let err = plan
            .ensure_stock_covers(|id| quantities.get(&id).copied())
            .unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock(3, 5));
    }

    #[test]
    fn reassignment_to_unknown_part_is_not_found() {
        let a = part(10);
        let original = entry(a.id, 5);
        let plan = plan_revision(&original, &revision(SparePartId::new(), 1));
        let err = plan
            .ensure_stock_covers(|id| (id == a.id).then_some(10))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    /// Minimal ledger model: applies planned deltas and tracks live entries.
    #[derive(Debug)]
    struct Model {
        opening: BTreeMap<SparePartId, i64>,
        parts: BTreeMap<SparePartId, SparePart>,
        received: BTreeMap<SparePartId, i64>,
        live_out: BTreeMap<StockOutId, StockOutEntry>,
    }

    impl Model {
        fn new(openings: &[i64]) -> Self {
            let mut opening = BTreeMap::new();
            let mut parts = BTreeMap::new();
            for q in openings {
                let p = part(*q);
                opening.insert(p.id, *q);
                parts.insert(p.id, p);
            }
            Self {
                opening,
                parts,
                received: BTreeMap::new(),
                live_out: BTreeMap::new(),
            }
        }

        fn part_at(&self, index: usize) -> SparePartId {
            *self.parts.keys().nth(index % self.parts.len()).unwrap()
        }

        fn apply(&mut self, delta: QuantityDelta) {
            self.parts.get_mut(&delta.spare_part_id).unwrap().quantity += delta.delta;
        }

        fn step(&mut self, op: &Op) {
            match *op {
                Op::In { part, quantity } => {
                    let spare_part_id = self.part_at(part);
                    let input = NewStockIn {
                        spare_part_id,
                        quantity,
                        date: day(),
                    };
                    let current = self.parts[&spare_part_id].clone();
                    self.apply(receipt(&current, &input).unwrap());
                    *self.received.entry(spare_part_id).or_default() += quantity;
                }
                Op::Out { part, quantity } => {
                    let spare_part_id = self.part_at(part);
                    let input = NewStockOut {
                        spare_part_id,
                        quantity,
                        unit_price: Decimal::ONE,
                        date: day(),
                    };
                    let current = self.parts[&spare_part_id].clone();
                    if let Ok(delta) = withdrawal(&current, &input) {
                        self.apply(delta);
                        let e = input.into_entry(StockOutId::new());
                        self.live_out.insert(e.id, e);
                    }
                }
                Op::Revise { entry, part, quantity } => {
                    let Some(original) = self.live_out.values().nth(entry % self.live_out.len().max(1)).cloned()
                    else {
                        return;
                    };
                    let rev = revision(self.part_at(part), quantity);
                    let plan = plan_revision(&original, &rev);
                    let parts = &self.parts;
                    if plan.ensure_stock_covers(|id| parts.get(&id).map(|p| p.quantity)).is_ok() {
                        for d in plan.deltas() {
                            self.apply(d);
                        }
                        self.live_out.insert(original.id, rev.apply_to(&original));
                    }
                }
                Op::Remove { entry } => {
                    let Some(original) = self.live_out.values().nth(entry % self.live_out.len().max(1)).cloned()
                    else {
                        return;
                    };
                    self.apply(reversal(&original));
                    self.live_out.remove(&original.id);
                }
            }
        }

        fn expected(&self, id: SparePartId) -> i64 {
            let out: i64 = self
                .live_out
                .values()
                .filter(|e| e.spare_part_id == id)
                .map(|e| e.quantity)
                .sum();
            self.opening[&id] + self.received.get(&id).copied().unwrap_or(0) - out
        }
    }

    #[derive(Debug, Clone)]
    enum Op {
        In { part: usize, quantity: i64 },
        Out { part: usize, quantity: i64 },
        Revise { entry: usize, part: usize, quantity: i64 },
        Remove { entry: usize },
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..3, 1i64..50).prop_map(|(part, quantity)| Op::In { part, quantity }),
            (0usize..3, 1i64..50).prop_map(|(part, quantity)| Op::Out { part, quantity }),
            (0usize..8, 0usize..3, 1i64..50)
                .prop_map(|(entry, part, quantity)| Op::Revise { entry, part, quantity }),
            (0usize..8).prop_map(|entry| Op::Remove { entry }),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: after any sequence of planned mutations, each part's
        /// quantity equals opening + received - live withdrawals, and never
        /// drops below zero.
        #[test]
        fn planned_deltas_preserve_ledger_consistency(
            openings in prop::collection::vec(0i64..40, 3),
            ops in prop::collection::vec(op(), 1..40),
        ) {
            let mut model = Model::new(&openings);
            for op in &ops {
                model.step(op);
                for (id, p) in &model.parts {
                    prop_assert!(p.quantity >= 0);
                    prop_assert_eq!(p.quantity, model.expected(*id));
                }
            }
        }
    }
}
