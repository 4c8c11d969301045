//! Coverage Décompte
//!
//! Splits a billed amount into the share covered by the insurer (tiers
//! payant) and the remainder owed by the patient.
//!
//! # Rules
//!
//! - Exempt beneficiaries are covered in full
//! - Otherwise `covered = billed × percent / 100`
//! - `remainder = billed − covered`
//!
//! The billed amount and the covered share are rounded half up to a whole
//! currency unit; the remainder is the exact difference, so
//! `covered + remainder == billed` always holds.

use crate::{lenient, money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Input of the calculator, as posted by a consultation form
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageRequest {
    #[serde(default, deserialize_with = "lenient::amount")]
    pub billed_amount: Decimal,
    #[serde(default, deserialize_with = "lenient::percent")]
    pub coverage_percent: Decimal,
    #[serde(default)]
    pub is_exempt: bool,
}

impl CoverageRequest {
    pub fn new(billed_amount: Decimal, coverage_percent: Decimal, is_exempt: bool) -> Self {
        Self {
            billed_amount,
            coverage_percent,
            is_exempt,
        }
    }

    /// Run the calculator
    pub fn decide(&self) -> CoverageDecision {
        compute_coverage(self.billed_amount, self.coverage_percent, self.is_exempt)
    }
}

/// Décompte of one billed amount
///
/// Derived on every view, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageDecision {
    /// Billed amount after sanitizing and rounding
    pub billed_amount: Decimal,
    /// Percentage actually applied, in [0, 100]
    pub coverage_percent: Decimal,
    pub is_exempt: bool,
    /// Share paid by the insurer
    pub covered_amount: Decimal,
    /// Share left to the patient
    pub patient_remainder: Decimal,
}

impl CoverageDecision {
    /// Nothing left for the patient to pay
    pub fn is_fully_covered(&self) -> bool {
        self.patient_remainder.is_zero()
    }
}

/// Compute the décompte of a billed amount
///
/// # Arguments
/// * `billed_amount` - Amount billed; negative values are treated as 0
/// * `coverage_percent` - Insurer share; clamped to [0, 100]
/// * `is_exempt` - Exempt beneficiaries (exonérés) owe nothing
pub fn compute_coverage(
    billed_amount: Decimal,
    coverage_percent: Decimal,
    is_exempt: bool,
) -> CoverageDecision {
    let billed = money::whole_units(billed_amount);
    let percent = money::clamp_percent(coverage_percent);

    let covered = if is_exempt {
        billed
    } else {
        money::share(billed, percent)
    };
    let remainder = billed - covered;

    debug!(%billed, %percent, is_exempt, %covered, %remainder, "coverage computed");

    CoverageDecision {
        billed_amount: billed,
        coverage_percent: percent,
        is_exempt,
        covered_amount: covered,
        patient_remainder: remainder,
    }
}

/// Billed amount of `quantity` units at `unit_price`
pub fn line_cost(unit_price: Decimal, quantity: u32) -> Decimal {
    money::extend(unit_price, quantity)
}
