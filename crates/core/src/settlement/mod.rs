//! Daily settlement.
//!
//! A settlement is an immutable per-location snapshot of one business day's
//! cash movements and consumptions. Each `(date, location)` settles once.

pub mod error;
pub mod service;
pub mod types;

pub use error::SettlementError;
pub use service::SettlementService;
pub use types::{
    CashFlowDirection, CashFlowEvent, CashFlowSource, ConsumptionFact, DayBounds, SettleInput,
    SettlementReport, SettlementTotals,
};
