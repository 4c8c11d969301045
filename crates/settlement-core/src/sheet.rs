//! Feuille de prise en charge
//!
//! Assembles the coverage sheet of a consultation: beneficiary, provider,
//! the acts performed and the décompte of each act. Rendering is left to
//! the caller; this module only produces the figures.
//!
//! Sheet totals are sums of per-act rounded figures, so covered + remainder
//! equals billed on the sheet as well as on every line.

use crate::coverage::{compute_coverage, line_cost, CoverageDecision};
use crate::{lenient, money};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Insured patient (bénéficiaire)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beneficiary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub insurance_number: Option<String>,
    /// Exonéré: chronic illness or other full-coverage status
    #[serde(default)]
    pub is_exempt: bool,
}

/// One act on the sheet
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetAct {
    #[serde(default)]
    pub code: Option<String>,
    pub label: String,
    #[serde(default = "one", deserialize_with = "lenient::quantity")]
    pub quantity: u32,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub unit_price: Decimal,
}

fn one() -> u32 {
    1
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetLine {
    pub act: SheetAct,
    pub decision: CoverageDecision,
}

/// Sheet totals
///
/// Accumulation saturates instead of overflowing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageTotals {
    pub billed: Decimal,
    pub covered: Decimal,
    pub remainder: Decimal,
}

impl AddAssign for CoverageTotals {
    fn add_assign(&mut self, other: Self) {
        self.billed = money::add(self.billed, other.billed);
        self.covered = money::add(self.covered, other.covered);
        self.remainder = money::add(self.remainder, other.remainder);
    }
}

impl From<&CoverageDecision> for CoverageTotals {
    fn from(d: &CoverageDecision) -> Self {
        Self {
            billed: d.billed_amount,
            covered: d.covered_amount,
            remainder: d.patient_remainder,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoverageSheet {
    pub beneficiary: Beneficiary,
    pub provider: String,
    pub date: NaiveDate,
    pub coverage_percent: Decimal,
    pub lines: Vec<SheetLine>,
    pub totals: CoverageTotals,
}

impl CoverageSheet {
    pub fn build(
        beneficiary: Beneficiary,
        provider: impl Into<String>,
        date: NaiveDate,
        coverage_percent: Decimal,
        acts: Vec<SheetAct>,
    ) -> Self {
        let mut totals = CoverageTotals::default();
        let mut applied_percent = None;

        let lines: Vec<SheetLine> = acts
            .into_iter()
            .map(|act| {
                let billed = line_cost(act.unit_price, act.quantity);
                let decision = compute_coverage(billed, coverage_percent, beneficiary.is_exempt);
                applied_percent.get_or_insert(decision.coverage_percent);
                totals += CoverageTotals::from(&decision);
                SheetLine { act, decision }
            })
            .collect();

        // an empty sheet still shows the clamped rate
        let coverage_percent = applied_percent
            .unwrap_or_else(|| compute_coverage(Decimal::ZERO, coverage_percent, false).coverage_percent);

        Self {
            beneficiary,
            provider: provider.into(),
            date,
            coverage_percent,
            lines,
            totals,
        }
    }
}
