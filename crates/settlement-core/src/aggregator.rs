//! Settlement Aggregation
//!
//! Folds billed prestation lines into the totals claimed from a payer during
//! a règlement. Lines arrive already filtered by payer and period.
//!
//! The fold is order independent: any permutation of the same lines yields
//! identical totals.

use crate::{lenient, money};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Family of a billed act
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PrestationKind {
    Consultation,
    Pharmacy,
    Laboratory,
    Imaging,
    Hospitalization,
    Dental,
    Optical,
    Nursing,
    Other(String),
}

/// One billed act or prescription line
///
/// Deserialized lines go through [`PrestationLine::new`], so the paid
/// amount is bounded by the billed amount however the record was stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredPrestationLine")]
pub struct PrestationLine {
    pub id: String,
    pub date: NaiveDate,
    pub patient_id: String,
    pub patient_name: String,
    #[serde(rename = "type")]
    pub kind: PrestationKind,
    pub billed_amount: Decimal,
    /// Never above `billed_amount`
    pub already_paid_amount: Decimal,
}

/// Wire shape of a prestation line, before normalization
#[derive(Deserialize)]
struct StoredPrestationLine {
    id: String,
    date: NaiveDate,
    patient_id: String,
    patient_name: String,
    #[serde(rename = "type")]
    kind: PrestationKind,
    #[serde(default, deserialize_with = "lenient::amount")]
    billed_amount: Decimal,
    #[serde(default, deserialize_with = "lenient::amount")]
    already_paid_amount: Decimal,
}

impl From<StoredPrestationLine> for PrestationLine {
    fn from(raw: StoredPrestationLine) -> Self {
        PrestationLine::new(
            raw.id,
            raw.date,
            raw.patient_id,
            raw.patient_name,
            raw.kind,
            raw.billed_amount,
            raw.already_paid_amount,
        )
    }
}

impl PrestationLine {
    pub fn new(
        id: impl Into<String>,
        date: NaiveDate,
        patient_id: impl Into<String>,
        patient_name: impl Into<String>,
        kind: PrestationKind,
        billed_amount: Decimal,
        already_paid_amount: Decimal,
    ) -> Self {
        let id = id.into();
        let billed = money::sanitize_amount(billed_amount);
        let mut paid = money::sanitize_amount(already_paid_amount);
        if paid > billed {
            warn!(line = %id, %billed, %paid, "paid amount above billed, clamping");
            paid = billed;
        }
        Self {
            id,
            date,
            patient_id: patient_id.into(),
            patient_name: patient_name.into(),
            kind,
            billed_amount: billed,
            already_paid_amount: paid,
        }
    }

    /// Billed amount, never negative
    pub fn billed(&self) -> Decimal {
        money::sanitize_amount(self.billed_amount)
    }

    /// Paid amount, bounded by the billed amount
    pub fn paid(&self) -> Decimal {
        money::sanitize_amount(self.already_paid_amount).min(self.billed())
    }

    /// Amount still to claim on this line
    pub fn outstanding(&self) -> Decimal {
        self.billed() - self.paid()
    }
}

/// Totals of a règlement
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementTotals {
    pub total_billed: Decimal,
    pub total_already_paid: Decimal,
    pub total_to_claim: Decimal,
    pub distinct_patient_count: usize,
}

/// Totals for one act family
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindTotals {
    pub kind: PrestationKind,
    pub line_count: usize,
    pub totals: SettlementTotals,
}

#[derive(Default)]
struct Accumulator<'a> {
    billed: Decimal,
    paid: Decimal,
    lines: usize,
    patients: BTreeSet<&'a str>,
}

impl<'a> Accumulator<'a> {
    fn add(&mut self, line: &'a PrestationLine) {
        self.billed = money::add(self.billed, line.billed());
        self.paid = money::add(self.paid, line.paid());
        self.lines += 1;
        self.patients.insert(line.patient_id.as_str());
    }

    fn totals(&self) -> SettlementTotals {
        SettlementTotals {
            total_billed: self.billed,
            total_already_paid: self.paid,
            total_to_claim: self.billed - self.paid,
            distinct_patient_count: self.patients.len(),
        }
    }
}

/// Sum a set of prestation lines
pub fn aggregate<'a, I>(lines: I) -> SettlementTotals
where
    I: IntoIterator<Item = &'a PrestationLine>,
{
    let mut acc = Accumulator::default();
    for line in lines {
        acc.add(line);
    }
    let totals = acc.totals();
    debug!(
        lines = acc.lines,
        billed = %totals.total_billed,
        to_claim = %totals.total_to_claim,
        "settlement aggregated"
    );
    totals
}

/// Totals per act family, ordered by family
pub fn breakdown_by_kind<'a, I>(lines: I) -> Vec<KindTotals>
where
    I: IntoIterator<Item = &'a PrestationLine>,
{
    let mut groups: BTreeMap<&'a PrestationKind, Accumulator<'a>> = BTreeMap::new();
    for line in lines {
        groups.entry(&line.kind).or_default().add(line);
    }
    groups
        .into_iter()
        .map(|(kind, acc)| KindTotals {
            kind: kind.clone(),
            line_count: acc.lines,
            totals: acc.totals(),
        })
        .collect()
}
