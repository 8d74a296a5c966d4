//! Consumption engine: attendance policy and session validation.
//!
//! Turns "N lessons attended" into calls on the contract ledger. The
//! ledger mutation itself is always [`LedgerService::consume`]; this layer
//! decides whether a roster entry mutates the ledger at all and checks the
//! session against the teacher and location directory.
//!
//! [`LedgerService::consume`]: crate::ledger::LedgerService::consume

use std::future::Future;

use lessonbook_shared::config::AttendanceConfig;
use lessonbook_shared::types::{ContractId, LocationId};

use super::types::{
    AttendanceDecision, AttendanceNote, AttendanceStatus, BatchConsumeInput, BatchFailure,
    BatchOutcome, ConsumptionType, RosterEntry, SessionInfo,
};
use crate::catalog::TeacherInfo;
use crate::ledger::LedgerError;

/// Stateless consumption service.
pub struct ConsumptionService;

impl ConsumptionService {
    /// Maps an attendance status to a ledger action under the given policy.
    ///
    /// ATTENDED, MAKEUP and TRIAL always consume. ABSENT and LEAVE consume
    /// (as an absence deduction) only when the policy says so; otherwise
    /// they are noted without touching the ledger.
    #[must_use]
    pub const fn decide(
        status: AttendanceStatus,
        lessons: u32,
        policy: &AttendanceConfig,
    ) -> AttendanceDecision {
        let consumption_type = match status {
            AttendanceStatus::Attended => ConsumptionType::Normal,
            AttendanceStatus::Makeup => ConsumptionType::Makeup,
            AttendanceStatus::Trial => ConsumptionType::Trial,
            AttendanceStatus::Absent if policy.deduct_on_absence => {
                ConsumptionType::AbsenceDeduction
            }
            AttendanceStatus::Leave if policy.deduct_on_leave => {
                ConsumptionType::AbsenceDeduction
            }
            AttendanceStatus::Absent | AttendanceStatus::Leave => {
                return AttendanceDecision::Note;
            }
        };
        AttendanceDecision::Consume {
            consumption_type,
            lessons,
        }
    }

    /// Validates session metadata against the teacher directory.
    ///
    /// # Errors
    ///
    /// - `ZeroLessons` when the session charges no lessons
    /// - `TeacherInactive` for an inactive teacher
    pub fn validate_session(
        session: &SessionInfo,
        teacher: &TeacherInfo,
    ) -> Result<(), LedgerError> {
        if session.lessons == 0 {
            return Err(LedgerError::ZeroLessons);
        }
        if !teacher.active {
            return Err(LedgerError::TeacherInactive(teacher.id.into_inner()));
        }
        Ok(())
    }

    /// Ensures the session takes place at the contract's campus.
    ///
    /// # Errors
    ///
    /// `LocationMismatch` when the locations differ.
    pub fn validate_location(
        contract_location: LocationId,
        session_location: LocationId,
    ) -> Result<(), LedgerError> {
        if contract_location == session_location {
            Ok(())
        } else {
            Err(LedgerError::LocationMismatch {
                expected: contract_location.into_inner(),
                actual: session_location.into_inner(),
            })
        }
    }

    /// Builds the audit note for a non-consuming roster entry.
    #[must_use]
    pub fn note(entry: &RosterEntry, session: &SessionInfo) -> AttendanceNote {
        AttendanceNote {
            contract_id: entry.contract_id,
            status: entry.status,
            lesson_date: session.lesson_date,
            teacher_id: session.teacher_id,
        }
    }

    /// Processes a roster entry by entry.
    ///
    /// `apply` performs one student's consumption (in its own transaction
    /// when backed by storage). An error from one entry is recorded in
    /// `failed` and processing continues with the next entry.
    pub async fn run_batch<R, F, Fut>(
        input: &BatchConsumeInput,
        policy: &AttendanceConfig,
        mut apply: F,
    ) -> BatchOutcome<R>
    where
        F: FnMut(RosterEntry, ConsumptionType, u32) -> Fut,
        Fut: Future<Output = Result<R, LedgerError>>,
    {
        let mut outcome = BatchOutcome::default();
        for entry in &input.entries {
            match Self::decide(entry.status, input.session.lessons, policy) {
                AttendanceDecision::Note => {
                    outcome.noted.push(Self::note(entry, &input.session));
                }
                AttendanceDecision::Consume {
                    consumption_type,
                    lessons,
                } => match apply(*entry, consumption_type, lessons).await {
                    Ok(record) => outcome.succeeded.push(record),
                    Err(err) => outcome.failed.push(Self::failure(entry.contract_id, &err)),
                },
            }
        }
        outcome
    }

    /// Converts a ledger error into a batch failure entry.
    #[must_use]
    pub fn failure(contract_id: ContractId, error: &LedgerError) -> BatchFailure {
        BatchFailure {
            contract_id,
            error_code: error.error_code().to_string(),
            category: error.category(),
            message: error.to_string(),
        }
    }
}
