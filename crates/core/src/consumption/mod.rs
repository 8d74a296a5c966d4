//! Consumption engine.
//!
//! Single, typed and roster (batch) consumption on top of the contract
//! ledger. Roster entries are processed independently: one student's
//! failure never rolls back another student's lesson.

pub mod service;
pub mod types;

pub use service::ConsumptionService;
pub use types::{
    AttendanceDecision, AttendanceNote, AttendanceStatus, BatchConsumeInput, BatchFailure,
    BatchOutcome, ConsumeInput, ConsumptionType, RosterEntry, SessionInfo,
};
