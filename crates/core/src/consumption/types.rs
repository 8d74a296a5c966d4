//! Consumption engine domain types.

use std::fmt;

use chrono::NaiveDate;
use lessonbook_shared::ErrorCategory;
use lessonbook_shared::types::{ContractId, LocationId, OperatorId, TeacherId};
use serde::{Deserialize, Serialize};

/// Attendance reported for one student in one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    /// Student attended.
    Attended,
    /// Student attended a makeup session.
    Makeup,
    /// Trial lesson.
    Trial,
    /// Excused absence.
    Leave,
    /// Unexcused absence.
    Absent,
}

impl AttendanceStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Attended => "ATTENDED",
            Self::Makeup => "MAKEUP",
            Self::Trial => "TRIAL",
            Self::Leave => "LEAVE",
            Self::Absent => "ABSENT",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why lessons were consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsumptionType {
    /// Regular attended lesson.
    #[default]
    Normal,
    /// Lesson charged for an absence or leave.
    AbsenceDeduction,
    /// Makeup lesson.
    Makeup,
    /// Trial lesson.
    Trial,
}

impl ConsumptionType {
    /// Returns the string representation of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::AbsenceDeduction => "ABSENCE_DEDUCTION",
            Self::Makeup => "MAKEUP",
            Self::Trial => "TRIAL",
        }
    }
}

/// The teaching session lessons are recorded against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Teacher who taught the session.
    pub teacher_id: TeacherId,
    /// Campus the session took place at.
    pub location_id: LocationId,
    /// Date of the session.
    pub lesson_date: NaiveDate,
    /// Lessons charged per attending student.
    pub lessons: u32,
    /// Acting staff member.
    pub operator: OperatorId,
    /// Free-form note.
    #[serde(default)]
    pub remark: Option<String>,
}

/// Input for a single consumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumeInput {
    /// Contract to consume from.
    pub contract_id: ContractId,
    /// Reason for the consumption.
    #[serde(default)]
    pub consumption_type: ConsumptionType,
    /// Session details.
    pub session: SessionInfo,
}

/// One student on a roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Student's contract.
    pub contract_id: ContractId,
    /// Reported attendance.
    pub status: AttendanceStatus,
}

/// Input for a roster (batch) consumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConsumeInput {
    /// Session shared by every entry.
    pub session: SessionInfo,
    /// One entry per student.
    pub entries: Vec<RosterEntry>,
}

/// What to do with one roster entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceDecision {
    /// Mutate the ledger.
    Consume {
        /// Consumption type to record.
        consumption_type: ConsumptionType,
        /// Lessons to consume.
        lessons: u32,
    },
    /// Leave the ledger untouched and emit an audit note.
    Note,
}

/// Audit note for attendance that did not consume lessons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceNote {
    /// Student's contract.
    pub contract_id: ContractId,
    /// Reported attendance.
    pub status: AttendanceStatus,
    /// Session date.
    pub lesson_date: NaiveDate,
    /// Teacher of the session.
    pub teacher_id: TeacherId,
}

/// A roster entry that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    /// Student's contract.
    pub contract_id: ContractId,
    /// Fine-grained error code.
    pub error_code: String,
    /// Taxonomy category.
    pub category: ErrorCategory,
    /// Human-readable message.
    pub message: String,
}

/// Per-student results of a roster consumption.
///
/// Failures never abort the batch; every entry lands in exactly one list.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome<R> {
    /// Consumption records created.
    pub succeeded: Vec<R>,
    /// Attendance recorded without a ledger mutation.
    pub noted: Vec<AttendanceNote>,
    /// Entries that failed.
    pub failed: Vec<BatchFailure>,
}

impl<R> Default for BatchOutcome<R> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            noted: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<R> BatchOutcome<R> {
    /// Number of entries processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.noted.len() + self.failed.len()
    }

    /// True when no entry failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
