//! Repository abstractions for data access.
//!
//! Repositories load state, hand it to the stateless services in
//! `lessonbook-core`, and persist the result in one transaction. Contract
//! rows are locked with `SELECT ... FOR UPDATE` and written back with a
//! version check; retryable conflicts are retried up to
//! `ledger.max_retries` times. Ledger events are published after commit.

pub mod catalog;
pub mod consumption;
pub mod contract;
pub mod forecast;
pub mod refund;
pub mod settlement;

mod convert;
mod retry;
mod sequence;

use std::fmt;
use std::sync::Arc;

use chrono_tz::Tz;
use lessonbook_core::events::{EventSink, TracingEventSink};
use lessonbook_shared::config::AttendanceConfig;
use lessonbook_shared::{AppConfig, AppError};

pub use catalog::{CatalogRepository, NewCustomer, NewLocation, NewPackage, NewTeacher};
pub use consumption::{ConsumeResult, ConsumptionRepository, RevokeInput, RevokeResult};
pub use contract::{ContractDetail, ContractFilter, ContractRepository, PaymentResult};
pub use forecast::ForecastRepository;
pub use refund::{CompleteResult, RefundRepository};
pub use settlement::{SettlementRange, SettlementRepository};

/// Settings and collaborators shared by the ledger repositories.
#[derive(Clone)]
pub struct LedgerContext {
    /// Attempts after the first for retryable conflicts.
    pub max_retries: u32,
    /// Timezone business dates and settlement days are computed in.
    pub timezone: Tz,
    /// Absence and leave deduction policy.
    pub attendance: AttendanceConfig,
    /// Receives events after commit.
    pub events: Arc<dyn EventSink>,
}

impl LedgerContext {
    /// Builds the context from application configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown business timezone.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Ok(Self {
            max_retries: config.ledger.max_retries,
            timezone: config.ledger.timezone()?,
            attendance: config.attendance,
            events: Arc::new(TracingEventSink),
        })
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }
}

impl Default for LedgerContext {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timezone: chrono_tz::Asia::Shanghai,
            attendance: AttendanceConfig::default(),
            events: Arc::new(TracingEventSink),
        }
    }
}

impl fmt::Debug for LedgerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerContext")
            .field("max_retries", &self.max_retries)
            .field("timezone", &self.timezone)
            .field("attendance", &self.attendance)
            .finish_non_exhaustive()
    }
}
