//! Prescription Execution Reconciliation
//!
//! Tracks, per prescription line, the prescribed quantity against what has
//! already been dispensed or performed. A pharmacy or lab may execute a line
//! in several passes; every accepted pass is appended to the line's audit
//! trail.
//!
//! # Line lifecycle
//!
//! ```text
//! NotStarted ──(0 < qty < remaining)──> PartiallyExecuted
//!     │                                        │
//!     └──────(cumulative == prescribed)────────┴──> FullyExecuted
//! ```
//!
//! Requests above the remaining balance are clamped, never rejected.
//! Executing a finished line is a no-op reported as `AlreadyComplete`.

use crate::validation::{self, ValidationResult};
use crate::{lenient, money, SettlementError};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Execution progress of a prescription line
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionState {
    NotStarted,
    PartiallyExecuted,
    FullyExecuted,
}

impl ExecutionState {
    /// Derive the state from quantities
    ///
    /// A line with nothing prescribed is complete from the start.
    pub fn from_quantities(prescribed: u32, executed: u32) -> Self {
        if executed >= prescribed {
            ExecutionState::FullyExecuted
        } else if executed == 0 {
            ExecutionState::NotStarted
        } else {
            ExecutionState::PartiallyExecuted
        }
    }
}

/// What happened to an execution request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Whole requested quantity accepted
    Accepted,
    /// Request exceeded the remaining balance and was clamped
    PartiallyAccepted { requested: u32, accepted: u32 },
    /// Line was already fully executed; nothing changed
    AlreadyComplete,
    /// Zero quantity requested; nothing changed
    NothingRequested,
}

/// Raw reconciliation input
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    #[serde(default, deserialize_with = "lenient::quantity")]
    pub prescribed_quantity: u32,
    #[serde(default, deserialize_with = "lenient::quantity")]
    pub previously_executed_quantity: u32,
    #[serde(default, deserialize_with = "lenient::quantity")]
    pub requested_quantity: u32,
}

/// Reconciliation result
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub accepted_quantity: u32,
    pub new_previously_executed_quantity: u32,
    pub state: ExecutionState,
    pub status: ExecutionStatus,
}

impl ExecutionOutcome {
    /// Whether the request changed anything
    pub fn is_noop(&self) -> bool {
        self.accepted_quantity == 0
    }
}

/// Reconcile one execution request against a line's balance
pub fn reconcile(request: ExecutionRequest) -> ExecutionOutcome {
    let prescribed = request.prescribed_quantity;
    let previous = if request.previously_executed_quantity > prescribed {
        warn!(
            prescribed,
            previous = request.previously_executed_quantity,
            "executed quantity above prescription, clamping"
        );
        prescribed
    } else {
        request.previously_executed_quantity
    };
    let remaining = prescribed - previous;

    if remaining == 0 {
        return ExecutionOutcome {
            accepted_quantity: 0,
            new_previously_executed_quantity: previous,
            state: ExecutionState::FullyExecuted,
            status: ExecutionStatus::AlreadyComplete,
        };
    }

    let requested = request.requested_quantity;
    if requested == 0 {
        return ExecutionOutcome {
            accepted_quantity: 0,
            new_previously_executed_quantity: previous,
            state: ExecutionState::from_quantities(prescribed, previous),
            status: ExecutionStatus::NothingRequested,
        };
    }

    let accepted = requested.min(remaining);
    let status = if accepted < requested {
        warn!(requested, remaining, "execution request above remaining balance, clamping");
        ExecutionStatus::PartiallyAccepted { requested, accepted }
    } else {
        ExecutionStatus::Accepted
    };
    let executed = previous + accepted;

    debug!(prescribed, previous, accepted, executed, "execution reconciled");

    ExecutionOutcome {
        accepted_quantity: accepted,
        new_previously_executed_quantity: executed,
        state: ExecutionState::from_quantities(prescribed, executed),
        status,
    }
}

/// Audit entry for one accepted execution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub who: String,
    pub when: DateTime<Utc>,
    pub quantity: u32,
}

/// A single prescribed item (drug, lab test, nursing act)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionLineItem {
    pub id: String,
    pub label: String,
    /// Dispensing unit (boîte, flacon, séance...)
    #[serde(default)]
    pub unit: String,
    #[serde(default, deserialize_with = "lenient::quantity")]
    pub prescribed_quantity: u32,
    #[serde(default, deserialize_with = "lenient::quantity")]
    pub previously_executed_quantity: u32,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub unit_price: Decimal,
    /// Append-only audit trail
    #[serde(default)]
    pub executions: Vec<ExecutionRecord>,
}

impl PrescriptionLineItem {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        unit: impl Into<String>,
        prescribed_quantity: u32,
        unit_price: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            unit: unit.into(),
            prescribed_quantity,
            previously_executed_quantity: 0,
            unit_price: money::sanitize_amount(unit_price),
            executions: Vec::new(),
        }
    }

    /// Start from a quantity executed before tracking began (clamped)
    pub fn with_previously_executed(mut self, quantity: u32) -> Self {
        self.previously_executed_quantity = quantity.min(self.prescribed_quantity);
        self
    }

    /// Executed quantity, bounded by the prescription
    pub fn executed_quantity(&self) -> u32 {
        self.previously_executed_quantity.min(self.prescribed_quantity)
    }

    pub fn remaining_quantity(&self) -> u32 {
        self.prescribed_quantity - self.executed_quantity()
    }

    pub fn state(&self) -> ExecutionState {
        ExecutionState::from_quantities(self.prescribed_quantity, self.executed_quantity())
    }

    pub fn is_complete(&self) -> bool {
        self.state() == ExecutionState::FullyExecuted
    }

    /// Value already executed
    pub fn executed_value(&self) -> Decimal {
        money::extend(self.unit_price, self.executed_quantity())
    }

    /// Value still to be executed
    pub fn remaining_value(&self) -> Decimal {
        money::extend(self.unit_price, self.remaining_quantity())
    }

    /// Post an execution event
    ///
    /// Accepted quantities update the executed total and are recorded in
    /// the audit trail. A fully executed line is left untouched.
    pub fn execute(&mut self, who: &str, when: DateTime<Utc>, requested: u32) -> ExecutionOutcome {
        let outcome = reconcile(ExecutionRequest {
            prescribed_quantity: self.prescribed_quantity,
            previously_executed_quantity: self.previously_executed_quantity,
            requested_quantity: requested,
        });

        if !outcome.is_noop() {
            self.previously_executed_quantity = outcome.new_previously_executed_quantity;
            self.executions.push(ExecutionRecord {
                who: who.to_string(),
                when,
                quantity: outcome.accepted_quantity,
            });
            info!(
                line = %self.id,
                who,
                quantity = outcome.accepted_quantity,
                state = ?outcome.state,
                "prescription line executed"
            );
        }

        outcome
    }
}

/// A prescription (ordonnance) and its lines
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: String,
    pub patient_id: String,
    pub prescriber_id: String,
    pub prescribed_on: NaiveDate,
    pub lines: Vec<PrescriptionLineItem>,
}

/// Outcome for one line of a multi-line execution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineExecution {
    pub line_id: String,
    pub outcome: ExecutionOutcome,
}

/// Summary of executing several lines in one pass
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionExecution {
    pub prescription_id: String,
    pub lines: Vec<LineExecution>,
    /// Requested line ids that do not belong to the prescription
    pub unknown_lines: Vec<String>,
    pub state: ExecutionState,
    /// Value of the quantities accepted in this pass
    pub executed_value: Decimal,
}

impl Prescription {
    /// Aggregate state over all lines
    pub fn state(&self) -> ExecutionState {
        let states: Vec<ExecutionState> = self.lines.iter().map(|l| l.state()).collect();
        if states.iter().all(|s| *s == ExecutionState::FullyExecuted) {
            ExecutionState::FullyExecuted
        } else if states.iter().all(|s| *s == ExecutionState::NotStarted) {
            ExecutionState::NotStarted
        } else {
            ExecutionState::PartiallyExecuted
        }
    }

    pub fn validate(&self) -> ValidationResult {
        validation::validate_prescription(self)
    }

    /// Execute several lines in one pass, by one actor
    ///
    /// Requests naming unknown lines are reported back, not applied.
    /// Fails only when the prescription itself is malformed.
    pub fn execute_all(
        &mut self,
        who: &str,
        when: DateTime<Utc>,
        requests: &[(String, u32)],
    ) -> Result<PrescriptionExecution, SettlementError> {
        self.validate().into_result()?;

        let index: HashMap<String, usize> = self
            .lines
            .iter()
            .enumerate()
            .map(|(i, l)| (l.id.clone(), i))
            .collect();

        let mut lines = Vec::with_capacity(requests.len());
        let mut unknown_lines = Vec::new();
        let mut executed_value = Decimal::ZERO;

        for (line_id, quantity) in requests {
            match index.get(line_id) {
                Some(&i) => {
                    let line = &mut self.lines[i];
                    let outcome = line.execute(who, when, *quantity);
                    executed_value = money::add(
                        executed_value,
                        money::extend(line.unit_price, outcome.accepted_quantity),
                    );
                    lines.push(LineExecution {
                        line_id: line_id.clone(),
                        outcome,
                    });
                }
                None => {
                    warn!(prescription = %self.id, line = %line_id, "unknown prescription line");
                    unknown_lines.push(line_id.clone());
                }
            }
        }

        Ok(PrescriptionExecution {
            prescription_id: self.id.clone(),
            lines,
            unknown_lines,
            state: self.state(),
            executed_value,
        })
    }
}
