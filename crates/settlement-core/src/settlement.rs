//! Règlement Pipeline
//!
//! Sequential settlement of a payer's prestations over a period:
//!
//! 1. validate the batch
//! 2. fetch lines from a [`PrestationSource`]
//! 3. keep the selected lines dated inside the period
//! 4. aggregate totals and the per-act breakdown
//! 5. optionally issue an [`Invoice`]
//!
//! Batches are ephemeral; only the invoice they produce is meant to be kept.

use crate::aggregator::{aggregate, breakdown_by_kind, KindTotals, PrestationKind, PrestationLine, SettlementTotals};
use crate::config::SettlementConfig;
use crate::validation;
use crate::SettlementError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Lines a payer is asked to settle for a period
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementBatch {
    pub payer_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    /// Empty selection means every line of the period
    #[serde(default)]
    pub selected_line_ids: Vec<String>,
}

impl SettlementBatch {
    pub fn new(payer_id: impl Into<String>, period_start: NaiveDate, period_end: NaiveDate) -> Self {
        Self {
            payer_id: payer_id.into(),
            period_start,
            period_end,
            selected_line_ids: Vec::new(),
        }
    }

    pub fn with_lines<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_line_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<(), SettlementError> {
        if self.period_end < self.period_start {
            return Err(SettlementError::InvalidPeriod {
                start: self.period_start,
                end: self.period_end,
            });
        }
        validation::validate_batch(self).into_result()
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.period_start && date <= self.period_end
    }

    /// Keep the selected lines inside the period
    ///
    /// Returns the kept lines and the selected ids that matched nothing.
    pub fn select<'a>(&self, lines: &'a [PrestationLine]) -> (Vec<&'a PrestationLine>, Vec<String>) {
        let in_period = lines.iter().filter(|l| self.covers(l.date));

        if self.selected_line_ids.is_empty() {
            return (in_period.collect(), Vec::new());
        }

        let wanted: HashSet<&str> = self.selected_line_ids.iter().map(String::as_str).collect();
        let kept: Vec<&PrestationLine> = in_period.filter(|l| wanted.contains(l.id.as_str())).collect();
        let found: HashSet<&str> = kept.iter().map(|l| l.id.as_str()).collect();
        let missing = self
            .selected_line_ids
            .iter()
            .filter(|id| !found.contains(id.as_str()))
            .cloned()
            .collect();

        (kept, missing)
    }
}

/// Data-access seam for prestation lines
///
/// Implementations run the payer/period query; the pipeline never touches
/// storage directly.
pub trait PrestationSource {
    fn prestations(
        &self,
        payer_id: &str,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<Vec<PrestationLine>, SettlementError>;
}

/// Source backed by lines held in memory, keyed by payer
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InMemorySource {
    by_payer: BTreeMap<String, Vec<PrestationLine>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, payer_id: impl Into<String>, line: PrestationLine) {
        self.by_payer.entry(payer_id.into()).or_default().push(line);
    }

    pub fn with_lines<I>(mut self, payer_id: &str, lines: I) -> Self
    where
        I: IntoIterator<Item = PrestationLine>,
    {
        self.by_payer
            .entry(payer_id.to_string())
            .or_default()
            .extend(lines);
        self
    }

    pub fn payers(&self) -> impl Iterator<Item = &str> {
        self.by_payer.keys().map(String::as_str)
    }
}

impl PrestationSource for InMemorySource {
    fn prestations(
        &self,
        payer_id: &str,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<Vec<PrestationLine>, SettlementError> {
        Ok(self
            .by_payer
            .get(payer_id)
            .map(|lines| {
                lines
                    .iter()
                    .filter(|l| l.date >= period_start && l.date <= period_end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl<S: PrestationSource + ?Sized> PrestationSource for &S {
    fn prestations(
        &self,
        payer_id: &str,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<Vec<PrestationLine>, SettlementError> {
        (**self).prestations(payer_id, period_start, period_end)
    }
}

/// Result of settling a batch
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SettlementReport {
    pub payer_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub lines: Vec<PrestationLine>,
    pub totals: SettlementTotals,
    pub breakdown: Vec<KindTotals>,
    /// Selected ids the source did not return for this payer and period
    pub missing_line_ids: Vec<String>,
}

/// One billed line on an invoice
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub line_id: String,
    pub date: NaiveDate,
    pub patient_name: String,
    #[serde(rename = "type")]
    pub kind: PrestationKind,
    pub billed_amount: Decimal,
    pub already_paid_amount: Decimal,
    pub amount_to_claim: Decimal,
}

/// Invoice addressed to a payer for a settled batch
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub number: String,
    pub payer_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub issued_on: NaiveDate,
    pub currency: String,
    pub lines: Vec<InvoiceLine>,
    pub totals: SettlementTotals,
}

/// Format an invoice number: `PREFIX-PAYER-YYYYMM-SEQ`
pub fn invoice_number(prefix: &str, payer_id: &str, period_end: NaiveDate, sequence: u32) -> String {
    format!("{}-{}-{}-{:04}", prefix, payer_id, period_end.format("%Y%m"), sequence)
}

/// Fetch → select → aggregate
pub struct SettlementPipeline<S: PrestationSource> {
    source: S,
    config: SettlementConfig,
}

impl<S: PrestationSource> SettlementPipeline<S> {
    pub fn new(source: S, config: SettlementConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    /// Settle a batch
    pub fn run(&self, batch: &SettlementBatch) -> Result<SettlementReport, SettlementError> {
        batch.validate()?;

        let fetched = self
            .source
            .prestations(&batch.payer_id, batch.period_start, batch.period_end)?;
        validation::validate_prestation_lines(&fetched).into_result()?;
        debug!(payer = %batch.payer_id, fetched = fetched.len(), "prestations fetched");

        let (selected, missing_line_ids) = batch.select(&fetched);
        if !missing_line_ids.is_empty() {
            warn!(
                payer = %batch.payer_id,
                missing = ?missing_line_ids,
                "selected lines not found for payer and period"
            );
        }

        let totals = aggregate(selected.iter().copied());
        let breakdown = breakdown_by_kind(selected.iter().copied());

        info!(
            payer = %batch.payer_id,
            lines = selected.len(),
            to_claim = %totals.total_to_claim,
            "settlement computed"
        );

        Ok(SettlementReport {
            payer_id: batch.payer_id.clone(),
            period_start: batch.period_start,
            period_end: batch.period_end,
            lines: selected.into_iter().cloned().collect(),
            totals,
            breakdown,
            missing_line_ids,
        })
    }

    /// Issue the invoice for a settled report
    pub fn invoice(&self, report: &SettlementReport, issued_on: NaiveDate, sequence: u32) -> Invoice {
        let lines = report
            .lines
            .iter()
            .map(|l| InvoiceLine {
                line_id: l.id.clone(),
                date: l.date,
                patient_name: l.patient_name.clone(),
                kind: l.kind.clone(),
                billed_amount: l.billed(),
                already_paid_amount: l.paid(),
                amount_to_claim: l.outstanding(),
            })
            .collect();

        Invoice {
            number: invoice_number(
                &self.config.invoice_prefix,
                &report.payer_id,
                report.period_end,
                sequence,
            ),
            payer_id: report.payer_id.clone(),
            period_start: report.period_start,
            period_end: report.period_end,
            issued_on,
            currency: self.config.currency.clone(),
            lines,
            totals: report.totals.clone(),
        }
    }
}
