//! Refund workflow.
//!
//! A staged approval/settlement state machine:
//! PENDING → {APPROVED, REJECTED, CANCELLED}, APPROVED → COMPLETED.
//! At most one case per contract may be PENDING or APPROVED at a time.

pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use error::RefundError;
pub use service::RefundService;
pub use types::{
    ApproveRefundInput, CompleteRefundInput, NewRefundCase, RefundAction, RefundCaseState,
    RefundQuote, RefundStatus, RefundType, RequestRefundInput,
};
