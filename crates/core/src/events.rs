//! Ledger events and the sink they are published to.
//!
//! Events are published after the owning transaction commits. A sink failure
//! is logged and swallowed: it never undoes a committed ledger change.

use async_trait::async_trait;
use chrono::NaiveDate;
use lessonbook_shared::types::{
    ConsumptionId, ContractId, LocationId, Money, PaymentId, RefundCaseId, SettlementId,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::consumption::AttendanceStatus;

/// Something that happened to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEvent {
    /// A contract was signed.
    ContractCreated {
        /// Contract.
        contract_id: ContractId,
        /// Business number.
        contract_no: String,
        /// Location.
        location_id: LocationId,
        /// Discounted value.
        contract_value: Money,
    },
    /// A payment was recorded.
    PaymentApplied {
        /// Contract.
        contract_id: ContractId,
        /// Payment.
        payment_id: PaymentId,
        /// Amount received.
        amount: Money,
    },
    /// Lessons were consumed.
    LessonsConsumed {
        /// Contract.
        contract_id: ContractId,
        /// Consumption record.
        consumption_id: ConsumptionId,
        /// Lessons deducted.
        lessons: u32,
        /// Liability recognized.
        amount: Money,
    },
    /// A consumption was reversed.
    ConsumptionRevoked {
        /// Contract.
        contract_id: ContractId,
        /// Consumption record.
        consumption_id: ConsumptionId,
        /// Lessons restored.
        lessons: u32,
        /// Liability restored.
        amount: Money,
    },
    /// A non-deducting attendance was recorded.
    AttendanceNoted {
        /// Contract.
        contract_id: ContractId,
        /// Attendance status.
        status: AttendanceStatus,
        /// Lesson date.
        lesson_date: NaiveDate,
    },
    /// A refund was requested.
    RefundRequested {
        /// Refund case.
        refund_id: RefundCaseId,
        /// Contract.
        contract_id: ContractId,
        /// Payable amount at request time.
        payable_amount: Money,
    },
    /// A refund was approved.
    RefundApproved {
        /// Refund case.
        refund_id: RefundCaseId,
        /// Contract.
        contract_id: ContractId,
        /// Amount approved for payout.
        approved_amount: Money,
    },
    /// A refund was rejected.
    RefundRejected {
        /// Refund case.
        refund_id: RefundCaseId,
        /// Contract.
        contract_id: ContractId,
    },
    /// A refund was paid out and the contract terminated.
    RefundCompleted {
        /// Refund case.
        refund_id: RefundCaseId,
        /// Contract.
        contract_id: ContractId,
        /// Amount paid out.
        amount: Money,
    },
    /// A pending refund was withdrawn.
    RefundCancelled {
        /// Refund case.
        refund_id: RefundCaseId,
        /// Contract.
        contract_id: ContractId,
    },
    /// A business day was settled.
    DaySettled {
        /// Report.
        settlement_id: SettlementId,
        /// Location.
        location_id: LocationId,
        /// Business date.
        date: NaiveDate,
    },
}

impl LedgerEvent {
    /// Stable event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ContractCreated { .. } => "CONTRACT_CREATED",
            Self::PaymentApplied { .. } => "PAYMENT_APPLIED",
            Self::LessonsConsumed { .. } => "LESSONS_CONSUMED",
            Self::ConsumptionRevoked { .. } => "CONSUMPTION_REVOKED",
            Self::AttendanceNoted { .. } => "ATTENDANCE_NOTED",
            Self::RefundRequested { .. } => "REFUND_REQUESTED",
            Self::RefundApproved { .. } => "REFUND_APPROVED",
            Self::RefundRejected { .. } => "REFUND_REJECTED",
            Self::RefundCompleted { .. } => "REFUND_COMPLETED",
            Self::RefundCancelled { .. } => "REFUND_CANCELLED",
            Self::DaySettled { .. } => "DAY_SETTLED",
        }
    }

    /// Contract the event concerns, if any.
    #[must_use]
    pub const fn contract_id(&self) -> Option<ContractId> {
        match self {
            Self::ContractCreated { contract_id, .. }
            | Self::PaymentApplied { contract_id, .. }
            | Self::LessonsConsumed { contract_id, .. }
            | Self::ConsumptionRevoked { contract_id, .. }
            | Self::AttendanceNoted { contract_id, .. }
            | Self::RefundRequested { contract_id, .. }
            | Self::RefundApproved { contract_id, .. }
            | Self::RefundRejected { contract_id, .. }
            | Self::RefundCompleted { contract_id, .. }
            | Self::RefundCancelled { contract_id, .. } => Some(*contract_id),
            Self::DaySettled { .. } => None,
        }
    }
}

/// Event delivery failure.
#[derive(Debug, Error)]
pub enum EventError {
    /// The sink could not accept the event.
    #[error("Event delivery failed: {0}")]
    Delivery(String),
}

/// Destination for ledger events (audit log, notifications).
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Delivers one event.
    async fn publish(&self, event: &LedgerEvent) -> Result<(), EventError>;
}

/// Writes events as structured `tracing` records.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn publish(&self, event: &LedgerEvent) -> Result<(), EventError> {
        let payload =
            serde_json::to_string(event).map_err(|e| EventError::Delivery(e.to_string()))?;
        info!(
            target: "lessonbook::events",
            event = event.name(),
            contract_id = ?event.contract_id(),
            %payload,
            "ledger event"
        );
        Ok(())
    }
}

/// Publishes committed events, logging and discarding delivery failures.
pub async fn publish_all(sink: &dyn EventSink, events: &[LedgerEvent]) {
    for event in events {
        if let Err(error) = sink.publish(event).await {
            warn!(event = event.name(), %error, "Failed to publish ledger event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<&'static str>>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn publish(&self, event: &LedgerEvent) -> Result<(), EventError> {
            if self.fail_on == Some(event.name()) {
                return Err(EventError::Delivery("sink offline".to_string()));
            }
            self.seen.lock().unwrap().push(event.name());
            Ok(())
        }
    }

    fn events() -> Vec<LedgerEvent> {
        let contract_id = ContractId::new();
        vec![
            LedgerEvent::RefundApproved {
                refund_id: RefundCaseId::new(),
                contract_id,
                approved_amount: Money::new(dec!(3600)),
            },
            LedgerEvent::RefundCompleted {
                refund_id: RefundCaseId::new(),
                contract_id,
                amount: Money::new(dec!(3600)),
            },
            LedgerEvent::DaySettled {
                settlement_id: SettlementId::new(),
                location_id: LocationId::new(),
                date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            },
        ]
    }

    #[tokio::test]
    async fn test_publish_all_continues_after_failure() {
        let sink = RecordingSink {
            fail_on: Some("REFUND_APPROVED"),
            ..RecordingSink::default()
        };
        publish_all(&sink, &events()).await;
        assert_eq!(
            *sink.seen.lock().unwrap(),
            vec!["REFUND_COMPLETED", "DAY_SETTLED"]
        );
    }

    #[tokio::test]
    async fn test_tracing_sink_accepts_events() {
        for event in events() {
            assert!(TracingEventSink.publish(&event).await.is_ok());
        }
    }

    #[test]
    fn test_serialized_shape() {
        let event = LedgerEvent::PaymentApplied {
            contract_id: ContractId::new(),
            payment_id: PaymentId::new(),
            amount: Money::new(dec!(4800.00)),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PAYMENT_APPLIED");
        assert_eq!(json["amount"], "4800.00");
        assert!(event.contract_id().is_some());
    }
}
