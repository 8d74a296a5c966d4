//! Refund repository: the refund case lifecycle.
//!
//! Completion terminates the contract and writes the cash outflow in the
//! same transaction as the status change.

use chrono::Utc;
use lessonbook_core::events::{LedgerEvent, publish_all};
use lessonbook_core::ledger::{LedgerError, LedgerService};
use lessonbook_core::refund::{
    ApproveRefundInput, CompleteRefundInput, RefundAction, RefundError, RefundQuote,
    RefundService, RequestRefundInput,
};
use lessonbook_core::sequence::{SequencePrefix, business_date};
use lessonbook_core::settlement::{CashFlowEvent, CashFlowSource};
use lessonbook_shared::types::{ContractId, LocationId, Money, OperatorId, RefundCaseId};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use serde::Serialize;
use tracing::info;

use super::LedgerContext;
use super::contract::{lock_contract, record_cash_flow, save_state};
use super::convert::{contract_state, lessons_column, refund_case_state};
use super::retry::with_retry;
use super::sequence::next_number;
use crate::entities::sea_orm_active_enums::RefundStatus;
use crate::entities::{contracts, refund_cases};

/// A completed refund and the terminated contract.
#[derive(Debug, Clone, Serialize)]
pub struct CompleteResult {
    /// Refund case, now COMPLETED.
    pub refund: refund_cases::Model,
    /// Contract, now TERMINATED.
    pub contract: contracts::Model,
    /// Liability removed from the ledger.
    pub released_liability: Money,
    /// Whether this call wrote the cash outflow.
    pub cash_flow_recorded: bool,
}

fn refund_db_error(err: DbErr) -> RefundError {
    if let Some(SqlErr::UniqueConstraintViolation(_)) = err.sql_err() {
        return RefundError::ConcurrentModification;
    }
    match err {
        DbErr::RecordNotUpdated => RefundError::ConcurrentModification,
        other => RefundError::Database(other.to_string()),
    }
}

/// Refund repository.
#[derive(Debug, Clone)]
pub struct RefundRepository {
    db: DatabaseConnection,
    ctx: LedgerContext,
}

impl RefundRepository {
    /// Creates a new refund repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, ctx: LedgerContext) -> Self {
        Self { db, ctx }
    }

    /// Quotes a refund without changing anything.
    pub async fn preview(
        &self,
        contract_id: ContractId,
        deduction: Money,
    ) -> Result<RefundQuote, RefundError> {
        let model = contracts::Entity::find_by_id(contract_id.into_inner())
            .one(&self.db)
            .await
            .map_err(refund_db_error)?
            .ok_or(LedgerError::ContractNotFound(contract_id.into_inner()))?;
        RefundService::preview(&contract_state(&model)?, deduction)
    }

    /// Opens a refund case.
    ///
    /// A concurrent request for the same contract trips the in-flight unique
    /// index; the retry then sees the winner and fails with `ConflictingRequest`.
    pub async fn request(
        &self,
        input: RequestRefundInput,
    ) -> Result<refund_cases::Model, RefundError> {
        let input = &input;
        let case = with_retry(self.ctx.max_retries, "request_refund", move || {
            self.request_once(input)
        })
        .await?;

        info!(
            refund_id = %case.id,
            refund_no = %case.refund_no,
            contract_id = %case.contract_id,
            payable_amount = %case.payable_amount,
            "Refund requested"
        );
        publish_all(
            self.ctx.events.as_ref(),
            &[LedgerEvent::RefundRequested {
                refund_id: RefundCaseId::from_uuid(case.id),
                contract_id: ContractId::from_uuid(case.contract_id),
                payable_amount: Money::new(case.payable_amount),
            }],
        )
        .await;

        Ok(case)
    }

    async fn request_once(
        &self,
        input: &RequestRefundInput,
    ) -> Result<refund_cases::Model, RefundError> {
        let txn = self.db.begin().await.map_err(refund_db_error)?;

        let model = lock_contract(&txn, input.contract_id).await?;
        let state = contract_state(&model)?;
        let in_flight = refund_cases::Entity::find()
            .filter(refund_cases::Column::ContractId.eq(model.id))
            .filter(
                refund_cases::Column::Status.is_in([RefundStatus::Pending, RefundStatus::Approved]),
            )
            .one(&txn)
            .await
            .map_err(refund_db_error)?
            .map(|case| RefundCaseId::from_uuid(case.id));

        let new_case = RefundService::request(&state, in_flight, input.clone())?;
        let refund_no = next_number(
            &txn,
            SequencePrefix::Refund,
            business_date(new_case.requested_at, self.ctx.timezone),
        )
        .await
        .map_err(refund_db_error)?
        .to_string();

        let quote = &new_case.quote;
        let case = refund_cases::ActiveModel {
            id: Set(new_case.id.into_inner()),
            refund_no: Set(refund_no),
            contract_id: Set(model.id),
            refund_type: Set(new_case.input.refund_type.into()),
            status: Set(new_case.status.into()),
            remain_lessons: Set(lessons_column(quote.remain_lessons)?),
            unit_price: Set(quote.unit_price.amount()),
            refundable_amount: Set(quote.refundable_amount.amount()),
            deduction: Set(quote.deduction.amount()),
            payable_amount: Set(quote.payable_amount.amount()),
            approved_amount: Set(None),
            reason: Set(new_case.input.reason.trim().to_string()),
            requested_by: Set(new_case.input.requested_by.into_inner()),
            requested_at: Set(new_case.requested_at.into()),
            approved_by: Set(None),
            approved_at: Set(None),
            approval_remark: Set(None),
            completed_by: Set(None),
            completed_at: Set(None),
            payout_method: Set(None),
            payout_account: Set(None),
            cancelled_by: Set(None),
            cancelled_at: Set(None),
            updated_at: Set(new_case.requested_at.into()),
        }
        .insert(&txn)
        .await
        .map_err(refund_db_error)?;

        txn.commit().await.map_err(refund_db_error)?;
        Ok(case)
    }

    /// Approves or rejects a pending case.
    ///
    /// Approval also locks the contract and requires it to still be active.
    /// Rejection never touches the contract.
    pub async fn approve(
        &self,
        id: RefundCaseId,
        input: ApproveRefundInput,
    ) -> Result<refund_cases::Model, RefundError> {
        let txn = self.db.begin().await.map_err(refund_db_error)?;

        let case = lock_case(&txn, id).await?;
        if input.approved {
            let model = lock_contract(&txn, ContractId::from_uuid(case.contract_id)).await?;
            RefundService::ensure_refundable(&contract_state(&model)?)?;
        }
        let action = RefundService::approve(&refund_case_state(&case), input)?;
        let case = apply_action(case, &action)
            .update(&txn)
            .await
            .map_err(refund_db_error)?;

        txn.commit().await.map_err(refund_db_error)?;

        let refund_id = RefundCaseId::from_uuid(case.id);
        let contract_id = ContractId::from_uuid(case.contract_id);
        let event = match action {
            RefundAction::Approve {
                approved_amount, ..
            } => LedgerEvent::RefundApproved {
                refund_id,
                contract_id,
                approved_amount,
            },
            _ => LedgerEvent::RefundRejected {
                refund_id,
                contract_id,
            },
        };
        info!(refund_id = %id, status = ?case.status, "Refund reviewed");
        publish_all(self.ctx.events.as_ref(), &[event]).await;

        Ok(case)
    }

    /// Pays out an approved case and terminates the contract.
    pub async fn complete(
        &self,
        id: RefundCaseId,
        input: CompleteRefundInput,
    ) -> Result<CompleteResult, RefundError> {
        let input = &input;
        let result = with_retry(self.ctx.max_retries, "complete_refund", move || {
            self.complete_once(id, input)
        })
        .await?;

        info!(
            refund_id = %id,
            contract_id = %result.contract.id,
            amount = ?result.refund.approved_amount,
            released_liability = %result.released_liability,
            "Refund completed, contract terminated"
        );
        let amount = result
            .refund
            .approved_amount
            .unwrap_or(result.refund.payable_amount);
        publish_all(
            self.ctx.events.as_ref(),
            &[LedgerEvent::RefundCompleted {
                refund_id: id,
                contract_id: ContractId::from_uuid(result.contract.id),
                amount: Money::new(amount),
            }],
        )
        .await;

        Ok(result)
    }

    async fn complete_once(
        &self,
        id: RefundCaseId,
        input: &CompleteRefundInput,
    ) -> Result<CompleteResult, RefundError> {
        let txn = self.db.begin().await.map_err(refund_db_error)?;

        let case = lock_case(&txn, id).await?;
        let action = RefundService::complete(&refund_case_state(&case), input.clone())?;
        let RefundAction::Complete {
            amount,
            completed_at,
            ..
        } = &action
        else {
            return Err(RefundError::Internal(
                "completion produced a different action".to_string(),
            ));
        };

        let model = lock_contract(&txn, ContractId::from_uuid(case.contract_id)).await?;
        let termination = LedgerService::terminate(&contract_state(&model)?)?;
        let contract = if termination.already_terminated {
            model
        } else {
            save_state(&txn, &model, &termination.after).await?
        };

        let outflow = CashFlowEvent::from_source(
            CashFlowSource::Refund,
            case.id,
            *amount,
            LocationId::from_uuid(contract.location_id),
            *completed_at,
        );
        let cash_flow_recorded = record_cash_flow(&txn, &outflow, contract.id).await?;

        let refund = apply_action(case, &action)
            .update(&txn)
            .await
            .map_err(refund_db_error)?;

        txn.commit().await.map_err(refund_db_error)?;

        Ok(CompleteResult {
            refund,
            contract,
            released_liability: termination.released_liability,
            cash_flow_recorded,
        })
    }

    /// Withdraws a pending case.
    pub async fn cancel(
        &self,
        id: RefundCaseId,
        cancelled_by: OperatorId,
    ) -> Result<refund_cases::Model, RefundError> {
        let txn = self.db.begin().await.map_err(refund_db_error)?;

        let case = lock_case(&txn, id).await?;
        let action = RefundService::cancel(&refund_case_state(&case), cancelled_by)?;
        let case = apply_action(case, &action)
            .update(&txn)
            .await
            .map_err(refund_db_error)?;

        txn.commit().await.map_err(refund_db_error)?;

        info!(refund_id = %id, "Refund cancelled");
        publish_all(
            self.ctx.events.as_ref(),
            &[LedgerEvent::RefundCancelled {
                refund_id: id,
                contract_id: ContractId::from_uuid(case.contract_id),
            }],
        )
        .await;

        Ok(case)
    }

    /// Gets a refund case by id.
    pub async fn get(&self, id: RefundCaseId) -> Result<refund_cases::Model, RefundError> {
        refund_cases::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(refund_db_error)?
            .ok_or(RefundError::CaseNotFound(id.into_inner()))
    }

    /// Lists a contract's refund cases, newest first.
    pub async fn list_for_contract(
        &self,
        contract_id: ContractId,
    ) -> Result<Vec<refund_cases::Model>, RefundError> {
        refund_cases::Entity::find()
            .filter(refund_cases::Column::ContractId.eq(contract_id.into_inner()))
            .order_by_desc(refund_cases::Column::RequestedAt)
            .all(&self.db)
            .await
            .map_err(refund_db_error)
    }
}

async fn lock_case<C: sea_orm::ConnectionTrait>(
    conn: &C,
    id: RefundCaseId,
) -> Result<refund_cases::Model, RefundError> {
    refund_cases::Entity::find_by_id(id.into_inner())
        .lock_exclusive()
        .one(conn)
        .await
        .map_err(refund_db_error)?
        .ok_or(RefundError::CaseNotFound(id.into_inner()))
}

fn apply_action(case: refund_cases::Model, action: &RefundAction) -> refund_cases::ActiveModel {
    let mut active: refund_cases::ActiveModel = case.into();
    active.status = Set(action.new_status().into());

    match action {
        RefundAction::Approve {
            approved_amount,
            approved_by,
            approved_at,
            remark,
            ..
        } => {
            active.approved_amount = Set(Some(approved_amount.amount()));
            active.approved_by = Set(Some(approved_by.into_inner()));
            active.approved_at = Set(Some((*approved_at).into()));
            active.approval_remark = Set(remark.clone());
        }
        RefundAction::Reject {
            rejected_by,
            rejected_at,
            remark,
            ..
        } => {
            active.approved_by = Set(Some(rejected_by.into_inner()));
            active.approved_at = Set(Some((*rejected_at).into()));
            active.approval_remark = Set(Some(remark.clone()));
        }
        RefundAction::Complete {
            method,
            account,
            completed_by,
            completed_at,
            ..
        } => {
            active.payout_method = Set(Some((*method).into()));
            active.payout_account = Set(account.clone());
            active.completed_by = Set(Some(completed_by.into_inner()));
            active.completed_at = Set(Some((*completed_at).into()));
        }
        RefundAction::Cancel {
            cancelled_by,
            cancelled_at,
            ..
        } => {
            active.cancelled_by = Set(Some(cancelled_by.into_inner()));
            active.cancelled_at = Set(Some((*cancelled_at).into()));
        }
    }

    active.updated_at = Set(Utc::now().into());
    active
}
