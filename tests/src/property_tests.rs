//! Property-Based Tests for the Settlement Rules
//!
//! These tests verify the invariants of the three calculators:
//! - Décompte exactness (covered + remainder == billed)
//! - Exemption and zero-amount behavior
//! - Reconciler never accepts more than the remaining balance
//! - Zero requests never change state
//! - Aggregation is order independent
//!
//! Uses proptest for randomized property testing with shrinking.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use settlement_core::{PrestationKind, PrestationLine};

/// Build a prestation line from generated integers (amounts in cents)
pub fn generated_line(index: usize, patient: u8, billed_cents: i64, paid_cents: i64) -> PrestationLine {
    PrestationLine::new(
        format!("P{}", index),
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        format!("BEN-{}", patient),
        "generated",
        PrestationKind::Consultation,
        Decimal::new(billed_cents, 2),
        Decimal::new(paid_cents, 2),
    )
}

#[cfg(test)]
mod coverage_properties {
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use settlement_core::compute_coverage;

    proptest! {
        #[test]
        fn prop_covered_plus_remainder_is_billed(
            billed_cents in 0i64..10_000_000_000,
            percent_tenths in 0i64..=1000,
            exempt in any::<bool>(),
        ) {
            let d = compute_coverage(
                Decimal::new(billed_cents, 2),
                Decimal::new(percent_tenths, 1),
                exempt,
            );
            prop_assert_eq!(d.covered_amount + d.patient_remainder, d.billed_amount);
            prop_assert!(d.covered_amount >= Decimal::ZERO);
            prop_assert!(d.patient_remainder >= Decimal::ZERO);
            prop_assert_eq!(d.covered_amount.fract(), Decimal::ZERO);
        }

        #[test]
        fn prop_exempt_owes_nothing(
            billed in 0i64..1_000_000_000,
            percent in -500i64..500,
        ) {
            let d = compute_coverage(Decimal::from(billed), Decimal::from(percent), true);
            prop_assert_eq!(d.patient_remainder, Decimal::ZERO);
            prop_assert_eq!(d.covered_amount, d.billed_amount);
        }

        #[test]
        fn prop_zero_billed_is_zero(percent in -500i64..500, exempt in any::<bool>()) {
            let d = compute_coverage(Decimal::ZERO, Decimal::from(percent), exempt);
            prop_assert_eq!(d.covered_amount, Decimal::ZERO);
            prop_assert_eq!(d.patient_remainder, Decimal::ZERO);
        }

        #[test]
        fn prop_percent_always_in_range(percent in any::<i32>()) {
            let d = compute_coverage(Decimal::from(1000), Decimal::from(percent), false);
            prop_assert!(d.coverage_percent >= Decimal::ZERO);
            prop_assert!(d.coverage_percent <= Decimal::ONE_HUNDRED);
        }

        #[test]
        fn prop_covered_monotonic_in_percent(
            billed in 0i64..1_000_000,
            low in 0i64..=100,
            high in 0i64..=100,
        ) {
            let (low, high) = if low <= high { (low, high) } else { (high, low) };
            let a = compute_coverage(Decimal::from(billed), Decimal::from(low), false);
            let b = compute_coverage(Decimal::from(billed), Decimal::from(high), false);
            prop_assert!(a.covered_amount <= b.covered_amount);
        }
    }
}

#[cfg(test)]
mod reconciler_properties {
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use settlement_core::{reconcile, ExecutionRequest, PrescriptionLineItem};

    proptest! {
        #[test]
        fn prop_accepted_never_exceeds_remaining(
            prescribed in 0u32..1000,
            previous in 0u32..1200,
            requested in 0u32..2000,
        ) {
            let out = reconcile(ExecutionRequest {
                prescribed_quantity: prescribed,
                previously_executed_quantity: previous,
                requested_quantity: requested,
            });
            let remaining = prescribed.saturating_sub(previous);
            prop_assert!(out.accepted_quantity <= remaining);
            prop_assert!(out.accepted_quantity <= requested);
            prop_assert!(out.new_previously_executed_quantity <= prescribed);
        }

        #[test]
        fn prop_zero_request_never_changes_state(
            prescribed in 0u32..1000,
            previous in 0u32..1000,
        ) {
            let previous = previous.min(prescribed);
            let out = reconcile(ExecutionRequest {
                prescribed_quantity: prescribed,
                previously_executed_quantity: previous,
                requested_quantity: 0,
            });
            prop_assert_eq!(out.accepted_quantity, 0);
            prop_assert_eq!(out.new_previously_executed_quantity, previous);
        }

        #[test]
        fn prop_line_never_over_executed(
            prescribed in 0u32..100,
            requests in proptest::collection::vec(0u32..40, 0..20),
        ) {
            let when = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
            let mut line = PrescriptionLineItem::new("L1", "item", "u", prescribed, Decimal::ONE);
            for q in requests {
                line.execute("tester", when, q);
                prop_assert!(line.previously_executed_quantity <= prescribed);
            }
            let audited: u32 = line.executions.iter().map(|e| e.quantity).sum();
            prop_assert_eq!(audited, line.previously_executed_quantity);
            prop_assert!(line.executions.iter().all(|e| e.quantity > 0));
        }
    }
}

#[cfg(test)]
mod aggregator_properties {
    use super::generated_line;
    use proptest::prelude::*;
    use settlement_core::{aggregate, PrestationLine};

    fn lines_strategy() -> impl Strategy<Value = Vec<(u8, i64, i64)>> {
        proptest::collection::vec((0u8..20, 0i64..10_000_000, 0i64..10_000_000), 0..50)
    }

    fn to_lines(raw: Vec<(u8, i64, i64)>) -> Vec<PrestationLine> {
        raw.iter()
            .enumerate()
            .map(|(i, (p, b, paid))| generated_line(i, *p, *b, *paid))
            .collect()
    }

    proptest! {
        #[test]
        fn prop_aggregate_is_order_independent(
            (lines, shuffled) in lines_strategy()
                .prop_map(to_lines)
                .prop_flat_map(|lines| (Just(lines.clone()), Just(lines).prop_shuffle())),
        ) {
            prop_assert_eq!(aggregate(&lines), aggregate(&shuffled));
        }

        #[test]
        fn prop_to_claim_is_billed_minus_paid(lines in lines_strategy().prop_map(to_lines)) {
            let totals = aggregate(&lines);
            prop_assert_eq!(totals.total_to_claim, totals.total_billed - totals.total_already_paid);
            prop_assert!(totals.total_already_paid <= totals.total_billed);
            prop_assert!(totals.distinct_patient_count <= lines.len());
        }
    }
}
