//! Settlement Core - Health-Center Billing Rules
//!
//! Pure Rust implementation of the financial rules behind a health-center
//! back office: the coverage décompte printed on a "feuille de prise en
//! charge", partial execution of prescription lines, and the règlement
//! totals claimed from a payer.
//!
//! # Features
//!
//! - Coverage décompte (insurer share / patient remainder) with exemption
//! - Prescription line execution tracking with an audit trail
//! - Settlement totals and per-act breakdown for a payer and period
//! - Invoice generation from a settlement batch
//! - Coverage sheet assembly for printable documents
//!
//! Every calculator is a synchronous pure function over typed records;
//! data access is delegated to a [`PrestationSource`].
//!
//! # Example
//!
//! ```rust
//! use rust_decimal::Decimal;
//! use settlement_core::compute_coverage;
//!
//! let decision = compute_coverage(Decimal::from(10_000), Decimal::from(80), false);
//!
//! assert_eq!(decision.covered_amount, Decimal::from(8_000));
//! assert_eq!(decision.patient_remainder, Decimal::from(2_000));
//! ```

pub mod aggregator;
pub mod config;
pub mod coverage;
pub mod lenient;
pub mod money;
pub mod reconciler;
pub mod settlement;
pub mod sheet;
pub mod validation;

// Re-export commonly used types for convenience
pub use aggregator::{aggregate, breakdown_by_kind, KindTotals, PrestationKind, PrestationLine, SettlementTotals};
pub use config::SettlementConfig;
pub use coverage::{compute_coverage, line_cost, CoverageDecision, CoverageRequest};
pub use reconciler::{
    reconcile, ExecutionOutcome, ExecutionRecord, ExecutionRequest, ExecutionState,
    ExecutionStatus, LineExecution, Prescription, PrescriptionExecution, PrescriptionLineItem,
};
pub use settlement::{
    InMemorySource, Invoice, InvoiceLine, PrestationSource, SettlementBatch, SettlementPipeline,
    SettlementReport,
};
pub use sheet::{Beneficiary, CoverageSheet, CoverageTotals, SheetAct, SheetLine};

use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur around the settlement pipeline
///
/// The calculators themselves never fail: bad numbers are sanitized and
/// out-of-range requests are clamped. Errors only come from batch
/// validation, the data source, and configuration loading.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// Settlement period ends before it starts
    #[error("Invalid period: {start} is after {end}")]
    InvalidPeriod { start: NaiveDate, end: NaiveDate },

    /// Record or batch failed validation
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The prestation source could not answer the query
    #[error("Prestation source error: {0}")]
    Source(String),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
