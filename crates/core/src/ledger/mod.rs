//! Contract ledger.
//!
//! This module owns the per-contract invariants:
//! - `used + remain (+ refunded) == total`
//! - `unearned` equals the canonical liability of the remaining lessons
//! - no negative balances
//! - status transitions ACTIVE → COMPLETED → ACTIVE, ACTIVE → TERMINATED
//!
//! Consumption and refund orchestration call into [`LedgerService`]; they
//! never adjust contract balances themselves.

pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use error::LedgerError;
pub use service::LedgerService;
pub use types::{
    ConsumptionOutcome, ConsumptionStatus, ContractSnapshot, ContractState, ContractStatus,
    CreateContractInput, InvariantReport, LedgerDelta, LiabilitySummary, NewContract,
    PaymentInput, PaymentMethod, PaymentOutcome, PaymentType, RevocationOutcome,
    TerminationOutcome,
};
