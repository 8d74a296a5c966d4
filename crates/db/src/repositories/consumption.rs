//! Consumption repository: single and roster consumption, revocation.

use chrono::Utc;
use lessonbook_core::consumption::{
    BatchConsumeInput, BatchOutcome, ConsumeInput, ConsumptionService, ConsumptionType,
    SessionInfo,
};
use lessonbook_core::events::{LedgerEvent, publish_all};
use lessonbook_core::ledger::{LedgerError, LedgerService};
use lessonbook_core::sequence::{SequencePrefix, business_date};
use lessonbook_shared::types::{ConsumptionId, ContractId, LocationId, Money, OperatorId};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::LedgerContext;
use super::catalog::CatalogRepository;
use super::contract::{lock_contract, save_state};
use super::convert::{contract_state, ledger_db_error, ledger_delta, lessons_column};
use super::retry::with_retry;
use super::sequence::next_number;
use crate::entities::sea_orm_active_enums::{ConsumptionStatus, RefundStatus};
use crate::entities::{consumption_records, contracts, refund_cases};

/// A consumption record and the contract after it.
#[derive(Debug, Clone, Serialize)]
pub struct ConsumeResult {
    /// Consumption record.
    pub record: consumption_records::Model,
    /// Contract after consumption.
    pub contract: contracts::Model,
    /// Whether this consumption used up the last lesson.
    pub completed: bool,
}

/// Input for revoking a consumption.
#[derive(Debug, Clone, Deserialize)]
pub struct RevokeInput {
    /// Operator revoking the record.
    pub operator: OperatorId,
    /// Why the lesson is reversed.
    #[serde(default)]
    pub reason: Option<String>,
}

/// A revoked record and the restored contract.
#[derive(Debug, Clone, Serialize)]
pub struct RevokeResult {
    /// Record, now REVOKED.
    pub record: consumption_records::Model,
    /// Contract after restoration.
    pub contract: contracts::Model,
    /// Lessons returned to the contract.
    pub restored_lessons: u32,
    /// Liability restored from the stored delta.
    pub restored_amount: Money,
    /// Whether a completed contract became active again.
    pub reopened: bool,
    /// Adjustment applied to snap the balance back to canonical, if any.
    pub reconciliation: Option<Money>,
}

/// Consumption repository.
#[derive(Debug, Clone)]
pub struct ConsumptionRepository {
    db: DatabaseConnection,
    ctx: LedgerContext,
}

impl ConsumptionRepository {
    /// Creates a new consumption repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, ctx: LedgerContext) -> Self {
        Self { db, ctx }
    }

    /// Consumes lessons from one contract.
    ///
    /// Refused with `RefundAwaitingPayout` while the contract has an approved
    /// refund: those lessons are already promised back to the customer.
    pub async fn consume(&self, input: ConsumeInput) -> Result<ConsumeResult, LedgerError> {
        let teacher = CatalogRepository::teacher(&self.db, input.session.teacher_id).await?;
        ConsumptionService::validate_session(&input.session, &teacher)?;

        self.consume_entry(
            input.contract_id,
            input.consumption_type,
            input.session.lessons,
            &input.session,
        )
        .await
    }

    /// Processes a class roster.
    ///
    /// The session is validated once; an invalid session fails the whole call.
    /// After that every student commits separately and failures are collected.
    pub async fn consume_batch(
        &self,
        input: BatchConsumeInput,
    ) -> Result<BatchOutcome<ConsumeResult>, LedgerError> {
        let teacher = CatalogRepository::teacher(&self.db, input.session.teacher_id).await?;
        ConsumptionService::validate_session(&input.session, &teacher)?;

        let session = &input.session;
        let outcome = ConsumptionService::run_batch(
            &input,
            &self.ctx.attendance,
            move |entry, consumption_type, lessons| {
                self.consume_entry(entry.contract_id, consumption_type, lessons, session)
            },
        )
        .await;

        for failure in &outcome.failed {
            warn!(
                contract_id = %failure.contract_id,
                error_code = %failure.error_code,
                message = %failure.message,
                "Roster entry failed"
            );
        }
        info!(
            teacher_id = %session.teacher_id,
            lesson_date = %session.lesson_date,
            succeeded = outcome.succeeded.len(),
            noted = outcome.noted.len(),
            failed = outcome.failed.len(),
            "Roster processed"
        );

        let notes: Vec<LedgerEvent> = outcome
            .noted
            .iter()
            .map(|note| LedgerEvent::AttendanceNoted {
                contract_id: note.contract_id,
                status: note.status,
                lesson_date: note.lesson_date,
            })
            .collect();
        publish_all(self.ctx.events.as_ref(), &notes).await;

        Ok(outcome)
    }

    async fn consume_entry(
        &self,
        contract_id: ContractId,
        consumption_type: ConsumptionType,
        lessons: u32,
        session: &SessionInfo,
    ) -> Result<ConsumeResult, LedgerError> {
        let result = with_retry(self.ctx.max_retries, "consume", move || {
            self.consume_once(contract_id, consumption_type, lessons, session)
        })
        .await?;

        info!(
            contract_id = %contract_id,
            consumption_no = %result.record.consumption_no,
            lessons,
            amount = %result.record.amount,
            completed = result.completed,
            "Lessons consumed"
        );
        publish_all(
            self.ctx.events.as_ref(),
            &[LedgerEvent::LessonsConsumed {
                contract_id,
                consumption_id: ConsumptionId::from_uuid(result.record.id),
                lessons,
                amount: Money::new(result.record.amount),
            }],
        )
        .await;

        Ok(result)
    }

    async fn consume_once(
        &self,
        contract_id: ContractId,
        consumption_type: ConsumptionType,
        lessons: u32,
        session: &SessionInfo,
    ) -> Result<ConsumeResult, LedgerError> {
        let txn = self.db.begin().await.map_err(ledger_db_error)?;

        let model = lock_contract(&txn, contract_id).await?;
        ConsumptionService::validate_location(
            LocationId::from_uuid(model.location_id),
            session.location_id,
        )?;
        let approved_refund = refund_cases::Entity::find()
            .filter(refund_cases::Column::ContractId.eq(model.id))
            .filter(refund_cases::Column::Status.eq(RefundStatus::Approved))
            .one(&txn)
            .await
            .map_err(ledger_db_error)?;
        if let Some(case) = approved_refund {
            return Err(LedgerError::RefundAwaitingPayout(case.id));
        }

        let state = contract_state(&model)?;
        let outcome = LedgerService::consume(&state, lessons, session.lesson_date)?;
        let contract = save_state(&txn, &model, &outcome.after).await?;

        let now = Utc::now();
        let consumption_no =
            next_number(&txn, SequencePrefix::Consumption, business_date(now, self.ctx.timezone))
                .await
                .map_err(ledger_db_error)?
                .to_string();

        let delta = &outcome.delta;
        let record = consumption_records::ActiveModel {
            id: Set(ConsumptionId::new().into_inner()),
            consumption_no: Set(consumption_no),
            contract_id: Set(contract.id),
            consumption_type: Set(consumption_type.into()),
            teacher_id: Set(session.teacher_id.into_inner()),
            location_id: Set(session.location_id.into_inner()),
            lesson_date: Set(session.lesson_date),
            lessons: Set(lessons_column(delta.lessons)?),
            unit_price: Set(delta.unit_price.amount()),
            amount: Set(delta.amount.amount()),
            rounding_residue: Set(delta.rounding_residue.amount()),
            remain_before: Set(lessons_column(delta.remain_before)?),
            remain_after: Set(lessons_column(delta.remain_after)?),
            unearned_before: Set(delta.unearned_before.amount()),
            unearned_after: Set(delta.unearned_after.amount()),
            status: Set(ConsumptionStatus::Normal),
            remark: Set(session.remark.clone()),
            created_by: Set(session.operator.into_inner()),
            created_at: Set(now.into()),
            revoked_by: Set(None),
            revoked_at: Set(None),
            revoke_reason: Set(None),
        }
        .insert(&txn)
        .await
        .map_err(ledger_db_error)?;

        txn.commit().await.map_err(ledger_db_error)?;

        Ok(ConsumeResult {
            record,
            contract,
            completed: outcome.completed,
        })
    }

    /// Reverses a consumption by applying its stored delta.
    pub async fn revoke(
        &self,
        id: ConsumptionId,
        input: RevokeInput,
    ) -> Result<RevokeResult, LedgerError> {
        let input = &input;
        let result = with_retry(self.ctx.max_retries, "revoke", move || {
            self.revoke_once(id, input)
        })
        .await?;

        if let Some(adjustment) = result.reconciliation {
            warn!(
                consumption_id = %id,
                contract_id = %result.contract.id,
                adjustment = %adjustment,
                "Revocation reconciled unearned balance to canonical liability"
            );
        }
        info!(
            consumption_id = %id,
            contract_id = %result.contract.id,
            restored_lessons = result.restored_lessons,
            restored_amount = %result.restored_amount,
            reopened = result.reopened,
            "Consumption revoked"
        );
        publish_all(
            self.ctx.events.as_ref(),
            &[LedgerEvent::ConsumptionRevoked {
                contract_id: ContractId::from_uuid(result.contract.id),
                consumption_id: id,
                lessons: result.restored_lessons,
                amount: result.restored_amount,
            }],
        )
        .await;

        Ok(result)
    }

    async fn revoke_once(
        &self,
        id: ConsumptionId,
        input: &RevokeInput,
    ) -> Result<RevokeResult, LedgerError> {
        let txn = self.db.begin().await.map_err(ledger_db_error)?;

        let record = consumption_records::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(ledger_db_error)?
            .ok_or(LedgerError::ConsumptionNotFound(id.into_inner()))?;

        let model = lock_contract(&txn, ContractId::from_uuid(record.contract_id)).await?;
        let state = contract_state(&model)?;
        let delta = ledger_delta(&record)?;
        let outcome = LedgerService::revoke(&state, id, record.status.into(), &delta)?;
        let contract = save_state(&txn, &model, &outcome.after).await?;

        let mut active: consumption_records::ActiveModel = record.into();
        active.status = Set(ConsumptionStatus::Revoked);
        active.revoked_by = Set(Some(input.operator.into_inner()));
        active.revoked_at = Set(Some(Utc::now().into()));
        active.revoke_reason = Set(input.reason.clone());
        let record = active.update(&txn).await.map_err(ledger_db_error)?;

        txn.commit().await.map_err(ledger_db_error)?;

        Ok(RevokeResult {
            record,
            contract,
            restored_lessons: outcome.restored_lessons,
            restored_amount: outcome.restored_amount,
            reopened: outcome.reopened,
            reconciliation: outcome.reconciliation,
        })
    }

    /// Gets a consumption record by id.
    pub async fn get(&self, id: ConsumptionId) -> Result<consumption_records::Model, LedgerError> {
        consumption_records::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(ledger_db_error)?
            .ok_or(LedgerError::ConsumptionNotFound(id.into_inner()))
    }

    /// Lists a contract's consumption records, oldest first.
    pub async fn list_for_contract(
        &self,
        contract_id: ContractId,
    ) -> Result<Vec<consumption_records::Model>, LedgerError> {
        consumption_records::Entity::find()
            .filter(consumption_records::Column::ContractId.eq(contract_id.into_inner()))
            .order_by_asc(consumption_records::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(ledger_db_error)
    }
}
