//! Input validation for settlement records
//!
//! Provides validators for:
//! - Settlement batches (payer, period)
//! - Prestation lines returned by a source (ids, duplicates)
//! - Prescriptions (ids, duplicate lines)
//!
//! Numeric fields are never validated here; they are sanitized on the way
//! in (see [`crate::lenient`]).

use crate::aggregator::PrestationLine;
use crate::reconciler::Prescription;
use crate::settlement::SettlementBatch;
use crate::SettlementError;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Validation error with detailed context
#[derive(Clone, Debug, Display, Serialize, Deserialize)]
#[display(fmt = "{}: {} ({})", field, message, code)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub code: ValidationErrorCode,
}

/// Specific validation error codes for programmatic handling
#[derive(Clone, Debug, Display, Serialize, Deserialize, PartialEq, Eq)]
pub enum ValidationErrorCode {
    Required,
    InvalidFormat,
    OutOfRange,
    DuplicateValue,
    InvalidReference,
}

/// Validation result that can accumulate multiple errors
#[derive(Clone, Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add_error(&mut self, field: &str, message: &str, code: ValidationErrorCode) {
        self.errors.push(ValidationError {
            field: field.to_string(),
            message: message.to_string(),
            code,
        });
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_code(&self, code: &ValidationErrorCode) -> bool {
        self.errors.iter().any(|e| &e.code == code)
    }

    pub fn into_result(self) -> Result<(), SettlementError> {
        if self.is_valid() {
            Ok(())
        } else {
            let messages: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
            Err(SettlementError::Validation(messages.join("; ")))
        }
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
    }
}

/// Validate a settlement batch
///
/// Batch must have:
/// - A payer id
/// - A period that does not end before it starts
/// - No blank or repeated selected line ids
pub fn validate_batch(batch: &SettlementBatch) -> ValidationResult {
    let mut result = ValidationResult::new();

    if batch.payer_id.trim().is_empty() {
        result.add_error("payer_id", "Payer is required", ValidationErrorCode::Required);
    }

    if batch.period_end < batch.period_start {
        result.add_error(
            "period_end",
            &format!(
                "Period ends ({}) before it starts ({})",
                batch.period_end, batch.period_start
            ),
            ValidationErrorCode::OutOfRange,
        );
    }

    let mut seen = HashSet::new();
    for id in &batch.selected_line_ids {
        if id.trim().is_empty() {
            result.add_error(
                "selected_line_ids",
                "Selected line id is blank",
                ValidationErrorCode::InvalidFormat,
            );
        } else if !seen.insert(id.as_str()) {
            result.add_error(
                "selected_line_ids",
                &format!("Line {} selected twice", id),
                ValidationErrorCode::DuplicateValue,
            );
        }
    }

    result
}

/// Validate a single prestation line
pub fn validate_prestation_line(line: &PrestationLine) -> ValidationResult {
    let mut result = ValidationResult::new();

    if line.id.trim().is_empty() {
        result.add_error("id", "Prestation line id is required", ValidationErrorCode::Required);
        return result;
    }
    if line.patient_id.trim().is_empty() {
        result.add_error(
            "patient_id",
            &format!("Line {} has no patient", line.id),
            ValidationErrorCode::InvalidReference,
        );
    }

    result
}

/// Validate prestation lines returned by a source
pub fn validate_prestation_lines(lines: &[PrestationLine]) -> ValidationResult {
    let mut result = ValidationResult::new();
    let mut seen = HashSet::new();

    for line in lines {
        result.merge(validate_prestation_line(line));
        if !line.id.trim().is_empty() && !seen.insert(line.id.as_str()) {
            result.add_error(
                "id",
                &format!("Line {} appears twice", line.id),
                ValidationErrorCode::DuplicateValue,
            );
        }
    }

    result
}

/// Validate a prescription before execution
pub fn validate_prescription(prescription: &Prescription) -> ValidationResult {
    let mut result = ValidationResult::new();

    if prescription.id.trim().is_empty() {
        result.add_error("id", "Prescription id is required", ValidationErrorCode::Required);
    }
    if prescription.patient_id.trim().is_empty() {
        result.add_error("patient_id", "Patient is required", ValidationErrorCode::Required);
    }
    if prescription.lines.is_empty() {
        result.add_error("lines", "Prescription has no lines", ValidationErrorCode::Required);
    }

    let mut seen = HashSet::new();
    for line in &prescription.lines {
        if line.id.trim().is_empty() {
            result.add_error("lines.id", "Line id is required", ValidationErrorCode::Required);
        } else if !seen.insert(line.id.as_str()) {
            result.add_error(
                "lines.id",
                &format!("Line {} appears twice", line.id),
                ValidationErrorCode::DuplicateValue,
            );
        }
    }

    result
}
