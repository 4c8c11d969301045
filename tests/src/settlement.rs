//! Règlement Tests
//!
//! Tests for payer settlement: period filtering, line selection, per-act
//! breakdown and invoice issue.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use settlement_core::{InMemorySource, PrestationKind, PrestationLine};

pub fn march(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

pub fn prestation(
    id: &str,
    day: u32,
    patient: &str,
    kind: PrestationKind,
    billed: i64,
    paid: i64,
) -> PrestationLine {
    PrestationLine::new(
        id,
        march(day),
        patient,
        format!("Bénéficiaire {}", patient),
        kind,
        Decimal::from(billed),
        Decimal::from(paid),
    )
}

/// Two payers, a month of activity
pub fn create_test_source() -> InMemorySource {
    InMemorySource::new()
        .with_lines(
            "CNAS",
            vec![
                prestation("C-01", 1, "BEN-1", PrestationKind::Consultation, 1000, 500),
                prestation("C-02", 4, "BEN-2", PrestationKind::Pharmacy, 2000, 0),
                prestation("C-03", 9, "BEN-1", PrestationKind::Laboratory, 3000, 1000),
                prestation("C-04", 18, "BEN-3", PrestationKind::Imaging, 15000, 3000),
                prestation("C-05", 29, "BEN-2", PrestationKind::Pharmacy, 850, 850),
            ],
        )
        .with_lines(
            "CASNOS",
            vec![prestation("S-01", 12, "BEN-7", PrestationKind::Dental, 4000, 1200)],
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use settlement_core::{
        aggregate, PrestationSource, SettlementBatch, SettlementConfig, SettlementError,
        SettlementPipeline,
    };

    fn pipeline() -> SettlementPipeline<InMemorySource> {
        SettlementPipeline::new(create_test_source(), SettlementConfig::default())
    }

    // ========== AGGREGATION SCENARIO ==========

    #[test]
    fn test_three_line_scenario() {
        let lines = [
            prestation("A", 1, "BEN-1", PrestationKind::Consultation, 1000, 500),
            prestation("B", 2, "BEN-2", PrestationKind::Consultation, 2000, 0),
            prestation("C", 3, "BEN-3", PrestationKind::Consultation, 3000, 1000),
        ];
        let totals = aggregate(&lines);
        assert_eq!(totals.total_billed, Decimal::from(6000));
        assert_eq!(totals.total_already_paid, Decimal::from(1500));
        assert_eq!(totals.total_to_claim, Decimal::from(4500));
        assert_eq!(totals.distinct_patient_count, 3);
    }

    // ========== PIPELINE ==========

    #[test]
    fn test_monthly_settlement() {
        let report = pipeline()
            .run(&SettlementBatch::new("CNAS", march(1), march(31)))
            .unwrap();

        assert_eq!(report.lines.len(), 5);
        assert_eq!(report.totals.total_billed, Decimal::from(21850));
        assert_eq!(report.totals.total_already_paid, Decimal::from(5350));
        assert_eq!(report.totals.total_to_claim, Decimal::from(16500));
        assert_eq!(report.totals.distinct_patient_count, 3);
        assert!(report.missing_line_ids.is_empty());
    }

    #[test]
    fn test_first_fortnight() {
        let report = pipeline()
            .run(&SettlementBatch::new("CNAS", march(1), march(15)))
            .unwrap();
        let ids: Vec<&str> = report.lines.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["C-01", "C-02", "C-03"]);
    }

    #[test]
    fn test_breakdown_sums_to_totals() {
        let report = pipeline()
            .run(&SettlementBatch::new("CNAS", march(1), march(31)))
            .unwrap();

        let billed: Decimal = report.breakdown.iter().map(|k| k.totals.total_billed).sum();
        let to_claim: Decimal = report.breakdown.iter().map(|k| k.totals.total_to_claim).sum();
        let lines: usize = report.breakdown.iter().map(|k| k.line_count).sum();
        assert_eq!(billed, report.totals.total_billed);
        assert_eq!(to_claim, report.totals.total_to_claim);
        assert_eq!(lines, report.lines.len());

        let pharmacy = report
            .breakdown
            .iter()
            .find(|k| k.kind == PrestationKind::Pharmacy)
            .unwrap();
        // C-05 was fully paid at the counter
        assert_eq!(pharmacy.totals.total_to_claim, Decimal::from(2000));
    }

    #[test]
    fn test_selection_outside_period_is_missing() {
        let batch = SettlementBatch::new("CNAS", march(1), march(10)).with_lines(["C-01", "C-04"]);
        let report = pipeline().run(&batch).unwrap();
        assert_eq!(report.lines.len(), 1);
        assert_eq!(report.missing_line_ids, vec!["C-04".to_string()]);
    }

    #[test]
    fn test_other_payer_lines_never_leak() {
        let batch = SettlementBatch::new("CNAS", march(1), march(31)).with_lines(["S-01"]);
        let report = pipeline().run(&batch).unwrap();
        assert!(report.lines.is_empty());
        assert_eq!(report.totals.total_billed, Decimal::ZERO);
    }

    #[test]
    fn test_invalid_period() {
        let err = pipeline()
            .run(&SettlementBatch::new("CNAS", march(20), march(10)))
            .unwrap_err();
        assert!(matches!(err, SettlementError::InvalidPeriod { .. }));
    }

    // ========== CUSTOM SOURCE ==========

    struct FailingSource;

    impl PrestationSource for FailingSource {
        fn prestations(
            &self,
            _payer_id: &str,
            _period_start: NaiveDate,
            _period_end: NaiveDate,
        ) -> Result<Vec<PrestationLine>, SettlementError> {
            Err(SettlementError::Source("connection refused".to_string()))
        }
    }

    #[test]
    fn test_source_error_propagates() {
        let err = SettlementPipeline::new(FailingSource, SettlementConfig::default())
            .run(&SettlementBatch::new("CNAS", march(1), march(31)))
            .unwrap_err();
        assert_eq!(err.to_string(), "Prestation source error: connection refused");
    }

    // ========== INVOICE ==========

    #[test]
    fn test_invoice_matches_report() {
        let p = pipeline();
        let report = p.run(&SettlementBatch::new("CASNOS", march(1), march(31))).unwrap();
        let invoice = p.invoice(&report, march(31), 1);

        assert_eq!(invoice.number, "FAC-CASNOS-202403-0001");
        assert_eq!(invoice.lines.len(), 1);
        assert_eq!(invoice.lines[0].amount_to_claim, Decimal::from(2800));
        assert_eq!(invoice.totals, report.totals);
    }

    #[test]
    fn test_invoice_json_shape() {
        let p = pipeline();
        let report = p.run(&SettlementBatch::new("CASNOS", march(1), march(31))).unwrap();
        let v = serde_json::to_value(p.invoice(&report, march(31), 1)).unwrap();
        assert_eq!(v["lines"][0]["type"], "Dental");
        assert_eq!(v["period_end"], "2024-03-31");
    }
}
