//! Refund workflow domain types.

use std::fmt;

use chrono::{DateTime, Utc};
use lessonbook_shared::types::{ContractId, Money, OperatorId, RefundCaseId};
use serde::{Deserialize, Serialize};

use crate::ledger::PaymentMethod;

/// Refund case status.
///
/// The valid transitions are:
/// - Pending → Approved (approve)
/// - Pending → Rejected (reject)
/// - Pending → Cancelled (cancel)
/// - Approved → Completed (complete)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundStatus {
    /// Awaiting approval.
    Pending,
    /// Approved, awaiting payout.
    Approved,
    /// Rejected (terminal).
    Rejected,
    /// Paid out, contract terminated (terminal).
    Completed,
    /// Withdrawn before approval (terminal).
    Cancelled,
}

impl RefundStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parses a status from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            "COMPLETED" => Some(Self::Completed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Returns true while the case blocks another request for its contract.
    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::Pending | Self::Approved)
    }

    /// Returns true if no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of refund.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundType {
    /// Customer leaves and is paid out.
    #[default]
    Normal,
    /// Remaining value moves to another contract.
    Transfer,
    /// Contract ended by the business.
    Terminate,
}

impl RefundType {
    /// Returns the string representation of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Transfer => "TRANSFER",
            Self::Terminate => "TERMINATE",
        }
    }
}

/// Refund math for a contract at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundQuote {
    /// Contract quoted.
    pub contract_id: ContractId,
    /// Remaining lessons.
    pub remain_lessons: u32,
    /// Contract unit price.
    pub unit_price: Money,
    /// Value of the remaining lessons.
    pub refundable_amount: Money,
    /// Penalty withheld.
    pub deduction: Money,
    /// `refundable_amount - deduction`.
    pub payable_amount: Money,
}

/// Input for requesting a refund.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRefundInput {
    /// Contract to refund.
    pub contract_id: ContractId,
    /// Kind of refund.
    #[serde(default)]
    pub refund_type: RefundType,
    /// Why the customer wants a refund.
    pub reason: String,
    /// Penalty withheld.
    #[serde(default)]
    pub deduction: Money,
    /// Staff member filing the request.
    pub requested_by: OperatorId,
}

/// Approval decision on a pending case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveRefundInput {
    /// `true` approves, `false` rejects.
    pub approved: bool,
    /// Approver's remark; required on rejection.
    #[serde(default)]
    pub remark: Option<String>,
    /// Payable override, within `[0, refundable]`.
    #[serde(default)]
    pub adjusted_amount: Option<Money>,
    /// Approver.
    pub approver: OperatorId,
}

/// Payout details for an approved case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRefundInput {
    /// How the money was returned.
    pub method: PaymentMethod,
    /// Destination account, if any.
    #[serde(default)]
    pub account: Option<String>,
    /// Staff member who paid out.
    pub completed_by: OperatorId,
}

/// The fields of a refund case that drive the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundCaseState {
    /// Case id.
    pub id: RefundCaseId,
    /// Contract refunded.
    pub contract_id: ContractId,
    /// Current status.
    pub status: RefundStatus,
    /// Refundable amount captured at request time.
    pub refundable_amount: Money,
    /// Payable amount captured at request time.
    pub payable_amount: Money,
    /// Amount fixed at approval, if approved.
    pub approved_amount: Option<Money>,
}

/// A refund case ready to persist.
#[derive(Debug, Clone)]
pub struct NewRefundCase {
    /// Case id.
    pub id: RefundCaseId,
    /// Request data.
    pub input: RequestRefundInput,
    /// Math snapshotted at request time.
    pub quote: RefundQuote,
    /// Always `Pending`.
    pub status: RefundStatus,
    /// When the request was filed.
    pub requested_at: DateTime<Utc>,
}

/// A validated state transition with its audit data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundAction {
    /// Pending → Approved.
    Approve {
        /// New status.
        new_status: RefundStatus,
        /// Amount to pay out.
        approved_amount: Money,
        /// Approver.
        approved_by: OperatorId,
        /// Approval time.
        approved_at: DateTime<Utc>,
        /// Approver's remark.
        remark: Option<String>,
    },
    /// Pending → Rejected.
    Reject {
        /// New status.
        new_status: RefundStatus,
        /// Approver.
        rejected_by: OperatorId,
        /// Rejection time.
        rejected_at: DateTime<Utc>,
        /// Mandatory remark.
        remark: String,
    },
    /// Approved → Completed.
    Complete {
        /// New status.
        new_status: RefundStatus,
        /// Amount paid out.
        amount: Money,
        /// Payout method.
        method: PaymentMethod,
        /// Destination account.
        account: Option<String>,
        /// Staff member who paid out.
        completed_by: OperatorId,
        /// Payout time.
        completed_at: DateTime<Utc>,
    },
    /// Pending → Cancelled.
    Cancel {
        /// New status.
        new_status: RefundStatus,
        /// Staff member who cancelled.
        cancelled_by: OperatorId,
        /// Cancellation time.
        cancelled_at: DateTime<Utc>,
    },
}

impl RefundAction {
    /// Returns the status after this action.
    #[must_use]
    pub const fn new_status(&self) -> RefundStatus {
        match self {
            Self::Approve { new_status, .. }
            | Self::Reject { new_status, .. }
            | Self::Complete { new_status, .. }
            | Self::Cancel { new_status, .. } => *new_status,
        }
    }
}
