//! Coverage Décompte Tests
//!
//! Tests for the insurer/patient split shown on consultation forms and
//! coverage sheets.

use serde_json::{json, Value};

/// Consultation form payload as posted by the front desk
pub fn consultation_form(billed: Value, percent: Value, exempt: bool) -> Value {
    json!({
        "billed_amount": billed,
        "coverage_percent": percent,
        "is_exempt": exempt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use settlement_core::{compute_coverage, CoverageRequest};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn decide(form: Value) -> settlement_core::CoverageDecision {
        let request: CoverageRequest = serde_json::from_value(form).unwrap();
        request.decide()
    }

    // ========== SCENARIOS ==========

    #[test]
    fn test_eighty_percent_scenario() {
        let d = compute_coverage(dec("10000"), dec("80"), false);
        assert_eq!(d.covered_amount, dec("8000"));
        assert_eq!(d.patient_remainder, dec("2000"));
    }

    #[test]
    fn test_exempt_scenario() {
        let d = compute_coverage(dec("5000"), dec("0"), true);
        assert_eq!(d.covered_amount, dec("5000"));
        assert_eq!(d.patient_remainder, Decimal::ZERO);
    }

    #[test]
    fn test_common_rates() {
        // Usual tiers: 80% general, 100% chronic, 70% optical/dental
        let cases = [("80", "1200", "300"), ("100", "1500", "0"), ("70", "1050", "450")];
        for (percent, covered, remainder) in cases {
            let d = compute_coverage(dec("1500"), dec(percent), false);
            assert_eq!(d.covered_amount, dec(covered), "rate {}", percent);
            assert_eq!(d.patient_remainder, dec(remainder), "rate {}", percent);
        }
    }

    // ========== FORM INPUT SANITIZING ==========

    #[test]
    fn test_form_with_string_amounts() {
        let d = decide(consultation_form(json!("10 000"), json!("80"), false));
        assert_eq!(d.covered_amount, dec("8000"));
    }

    #[test]
    fn test_form_with_empty_amount() {
        let d = decide(consultation_form(json!(""), json!(80), false));
        assert_eq!(d.billed_amount, Decimal::ZERO);
        assert_eq!(d.covered_amount, Decimal::ZERO);
        assert_eq!(d.patient_remainder, Decimal::ZERO);
    }

    #[test]
    fn test_form_with_negative_amount() {
        let d = decide(consultation_form(json!(-1500), json!(80), false));
        assert_eq!(d.billed_amount, Decimal::ZERO);
    }

    #[test]
    fn test_form_with_out_of_range_percent() {
        let d = decide(consultation_form(json!(2000), json!(250), false));
        assert_eq!(d.coverage_percent, Decimal::ONE_HUNDRED);
        assert_eq!(d.patient_remainder, Decimal::ZERO);
    }

    #[test]
    fn test_form_missing_fields() {
        let d = decide(json!({}));
        assert_eq!(d.billed_amount, Decimal::ZERO);
        assert!(!d.is_exempt);
    }

    // ========== ROUNDING ==========

    #[test]
    fn test_cents_round_half_up() {
        // 1234.5 -> 1235; 1235 × 65% = 802.75 -> 803
        let d = compute_coverage(dec("1234.5"), dec("65"), false);
        assert_eq!(d.billed_amount, dec("1235"));
        assert_eq!(d.covered_amount, dec("803"));
        assert_eq!(d.patient_remainder, dec("432"));
    }

    #[test]
    fn test_decision_serializes_amounts_as_numbers() {
        let d = compute_coverage(dec("10000"), dec("80"), false);
        let v = serde_json::to_value(d).unwrap();
        assert_eq!(v["covered_amount"].as_f64(), Some(8000.0));
        assert_eq!(v["patient_remainder"].as_f64(), Some(2000.0));
    }
}
