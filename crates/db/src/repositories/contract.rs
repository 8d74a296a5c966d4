//! Contract repository: signing, payments and ledger reads.

use chrono::{DateTime, NaiveDate, Utc};
use lessonbook_core::events::{LedgerEvent, publish_all};
use lessonbook_core::ledger::{
    ContractState, ContractStatus as CoreContractStatus, CreateContractInput, InvariantReport,
    LedgerError, LedgerService, LiabilitySummary, PaymentInput, PaymentMethod as CorePaymentMethod,
    PaymentOutcome,
};
use lessonbook_core::sequence::{SequencePrefix, business_date};
use lessonbook_core::settlement::{CashFlowEvent, CashFlowSource};
use lessonbook_shared::types::{
    ContractId, CustomerId, LocationId, Money, OperatorId, PageRequest, PageResponse, PaymentId,
};
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::LedgerContext;
use super::catalog::CatalogRepository;
use super::convert::{contract_state, ledger_db_error, lessons_column};
use super::retry::with_retry;
use super::sequence::next_number;
use crate::entities::sea_orm_active_enums::ContractStatus;
use crate::entities::{cash_flow_events, contracts, payment_records};

/// A signed contract with the payment taken at signing, if any.
#[derive(Debug, Clone, Serialize)]
pub struct ContractDetail {
    /// Contract row.
    pub contract: contracts::Model,
    /// Payment recorded together with the contract.
    pub initial_payment: Option<payment_records::Model>,
}

/// A payment and the contract it was applied to.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentResult {
    /// Payment row.
    pub payment: payment_records::Model,
    /// Contract after the payment.
    pub contract: contracts::Model,
}

/// Filter for listing contracts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContractFilter {
    /// Only this customer's contracts.
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    /// Only contracts sold at this location.
    #[serde(default)]
    pub location_id: Option<LocationId>,
    /// Only contracts in this status.
    #[serde(default)]
    pub status: Option<CoreContractStatus>,
}

/// Contract repository.
#[derive(Debug, Clone)]
pub struct ContractRepository {
    db: DatabaseConnection,
    ctx: LedgerContext,
}

impl ContractRepository {
    /// Creates a new contract repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, ctx: LedgerContext) -> Self {
        Self { db, ctx }
    }

    /// Signs a contract, optionally recording an initial payment in the same transaction.
    pub async fn create(&self, input: CreateContractInput) -> Result<ContractDetail, LedgerError> {
        let txn = self.db.begin().await.map_err(ledger_db_error)?;

        let package = CatalogRepository::package(&txn, input.package_id).await?;
        let customer = CatalogRepository::customer(&txn, input.customer_id).await?;
        let location = CatalogRepository::location(&txn, input.location_id).await?;
        let new = LedgerService::create_contract(&input, &package, &customer, &location)?;

        let (state, payment) = match &input.initial_payment {
            Some(payment) => {
                let outcome = LedgerService::apply_payment(&new.state, payment)?;
                (outcome.after.clone(), Some((outcome, payment.method)))
            }
            None => (new.state.clone(), None),
        };

        let now = Utc::now();
        let today = business_date(now, self.ctx.timezone);
        let contract_no = next_number(&txn, SequencePrefix::Contract, today)
            .await
            .map_err(ledger_db_error)?
            .to_string();
        let snapshot = serde_json::to_value(&new.snapshot)
            .map_err(|e| LedgerError::Internal(e.to_string()))?;

        let contract = contracts::ActiveModel {
            id: Set(state.id.into_inner()),
            contract_no: Set(contract_no),
            customer_id: Set(new.customer_id.into_inner()),
            package_id: Set(new.package_id.into_inner()),
            location_id: Set(new.location_id.into_inner()),
            total_lessons: Set(lessons_column(state.total_lessons)?),
            used_lessons: Set(lessons_column(state.used_lessons)?),
            remain_lessons: Set(lessons_column(state.remain_lessons)?),
            refunded_lessons: Set(lessons_column(state.refunded_lessons)?),
            original_price: Set(new.original_price.amount()),
            discount: Set(new.discount.amount()),
            contract_value: Set(state.contract_value.amount()),
            unit_price: Set(state.unit_price.amount()),
            paid_amount: Set(state.paid_amount.amount()),
            unearned: Set(state.unearned.amount()),
            status: Set(state.status.into()),
            start_date: Set(new.start_date),
            end_date: Set(state.end_date),
            snapshot: Set(snapshot),
            version: Set(state.version),
            created_by: Set(input.operator.into_inner()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await
        .map_err(ledger_db_error)?;

        let initial_payment = match payment {
            Some((outcome, method)) => Some(
                insert_payment(&txn, &contract, &outcome, method, input.operator, now, today)
                    .await?,
            ),
            None => None,
        };

        txn.commit().await.map_err(ledger_db_error)?;

        info!(
            contract_id = %contract.id,
            contract_no = %contract.contract_no,
            contract_value = %contract.contract_value,
            "Contract signed"
        );

        let mut events = vec![LedgerEvent::ContractCreated {
            contract_id: state.id,
            contract_no: contract.contract_no.clone(),
            location_id: new.location_id,
            contract_value: state.contract_value,
        }];
        if let Some(payment) = &initial_payment {
            events.push(payment_event(payment));
        }
        publish_all(self.ctx.events.as_ref(), &events).await;

        Ok(ContractDetail {
            contract,
            initial_payment,
        })
    }

    /// Records money received against a contract.
    pub async fn apply_payment(
        &self,
        contract_id: ContractId,
        input: PaymentInput,
        operator: OperatorId,
    ) -> Result<PaymentResult, LedgerError> {
        let input = &input;
        let result = with_retry(self.ctx.max_retries, "apply_payment", move || {
            self.apply_payment_once(contract_id, input, operator)
        })
        .await?;

        info!(
            contract_id = %contract_id,
            payment_no = %result.payment.payment_no,
            amount = %result.payment.amount,
            "Payment applied"
        );
        publish_all(self.ctx.events.as_ref(), &[payment_event(&result.payment)]).await;

        Ok(result)
    }

    async fn apply_payment_once(
        &self,
        contract_id: ContractId,
        input: &PaymentInput,
        operator: OperatorId,
    ) -> Result<PaymentResult, LedgerError> {
        let txn = self.db.begin().await.map_err(ledger_db_error)?;

        let model = lock_contract(&txn, contract_id).await?;
        let state = contract_state(&model)?;
        let outcome = LedgerService::apply_payment(&state, input)?;
        let contract = save_state(&txn, &model, &outcome.after).await?;

        let now = Utc::now();
        let today = business_date(now, self.ctx.timezone);
        let payment =
            insert_payment(&txn, &contract, &outcome, input.method, operator, now, today).await?;

        txn.commit().await.map_err(ledger_db_error)?;
        Ok(PaymentResult { payment, contract })
    }

    /// Gets a contract by id.
    pub async fn get(&self, id: ContractId) -> Result<contracts::Model, LedgerError> {
        contracts::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(ledger_db_error)?
            .ok_or(LedgerError::ContractNotFound(id.into_inner()))
    }

    /// Gets a contract by its business number.
    pub async fn get_by_number(&self, contract_no: &str) -> Result<contracts::Model, LedgerError> {
        contracts::Entity::find()
            .filter(contracts::Column::ContractNo.eq(contract_no))
            .one(&self.db)
            .await
            .map_err(ledger_db_error)?
            .ok_or_else(|| LedgerError::ContractNumberNotFound(contract_no.to_string()))
    }

    /// Lists contracts, newest first.
    pub async fn list(
        &self,
        filter: &ContractFilter,
        page: &PageRequest,
    ) -> Result<PageResponse<contracts::Model>, LedgerError> {
        let page = page.normalized();

        let mut query = contracts::Entity::find();
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(contracts::Column::CustomerId.eq(customer_id.into_inner()));
        }
        if let Some(location_id) = filter.location_id {
            query = query.filter(contracts::Column::LocationId.eq(location_id.into_inner()));
        }
        if let Some(status) = filter.status {
            query = query.filter(contracts::Column::Status.eq(ContractStatus::from(status)));
        }

        let total = query
            .clone()
            .count(&self.db)
            .await
            .map_err(ledger_db_error)?;
        let data = query
            .order_by_desc(contracts::Column::CreatedAt)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(ledger_db_error)?;

        Ok(PageResponse::new(data, page.page, page.per_page, total))
    }

    /// Lists a contract's payments in the order they were received.
    pub async fn list_payments(
        &self,
        contract_id: ContractId,
    ) -> Result<Vec<payment_records::Model>, LedgerError> {
        self.get(contract_id).await?;
        payment_records::Entity::find()
            .filter(payment_records::Column::ContractId.eq(contract_id.into_inner()))
            .order_by_asc(payment_records::Column::PaidAt)
            .all(&self.db)
            .await
            .map_err(ledger_db_error)
    }

    /// Outstanding liability over active contracts, optionally for one location.
    pub async fn liability_summary(
        &self,
        location_id: Option<LocationId>,
    ) -> Result<LiabilitySummary, LedgerError> {
        liability_summary(&self.db, location_id).await
    }

    /// Checks the stored contract against the ledger invariants.
    pub async fn check_invariants(&self, id: ContractId) -> Result<InvariantReport, LedgerError> {
        let model = self.get(id).await?;
        let report = LedgerService::check_invariants(&contract_state(&model)?);
        if !report.is_valid() {
            warn!(
                contract_id = %id,
                drift = %report.drift,
                "Contract violates ledger invariants"
            );
        }
        Ok(report)
    }
}

/// Loads a contract row and locks it until the transaction ends.
pub(crate) async fn lock_contract<C: ConnectionTrait>(
    conn: &C,
    id: ContractId,
) -> Result<contracts::Model, LedgerError> {
    contracts::Entity::find_by_id(id.into_inner())
        .lock_exclusive()
        .one(conn)
        .await
        .map_err(ledger_db_error)?
        .ok_or(LedgerError::ContractNotFound(id.into_inner()))
}

/// Writes a new contract state, guarded by the version it was read at.
pub(crate) async fn save_state<C: ConnectionTrait>(
    conn: &C,
    model: &contracts::Model,
    after: &ContractState,
) -> Result<contracts::Model, LedgerError> {
    let mut active: contracts::ActiveModel = model.clone().into();
    active.used_lessons = Set(lessons_column(after.used_lessons)?);
    active.remain_lessons = Set(lessons_column(after.remain_lessons)?);
    active.refunded_lessons = Set(lessons_column(after.refunded_lessons)?);
    active.paid_amount = Set(after.paid_amount.amount());
    active.unearned = Set(after.unearned.amount());
    active.status = Set(after.status.into());
    active.version = Set(after.version);
    active.updated_at = Set(Utc::now().into());

    let updated = contracts::Entity::update(active)
        .filter(contracts::Column::Version.eq(model.version))
        .exec(conn)
        .await
        .map_err(ledger_db_error)?;

    debug!(
        contract_id = %updated.id,
        version = updated.version,
        remain_lessons = updated.remain_lessons,
        unearned = %updated.unearned,
        "Contract state saved"
    );
    Ok(updated)
}

/// Appends a cash flow event. A second event for the same source is ignored.
///
/// Returns whether a row was written.
pub(crate) async fn record_cash_flow<C: ConnectionTrait>(
    conn: &C,
    event: &CashFlowEvent,
    contract_id: Uuid,
) -> Result<bool, LedgerError> {
    let active = cash_flow_events::ActiveModel {
        id: Set(event.id.into_inner()),
        source_type: Set(event.source_type.into()),
        source_id: Set(event.source_id),
        direction: Set(event.direction.into()),
        amount: Set(event.amount.amount()),
        contract_id: Set(contract_id),
        location_id: Set(event.location_id.into_inner()),
        occurred_at: Set(event.occurred_at.into()),
    };

    let written = cash_flow_events::Entity::insert(active)
        .on_conflict(
            OnConflict::columns([
                cash_flow_events::Column::SourceType,
                cash_flow_events::Column::SourceId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await
        .map_err(ledger_db_error)?;

    Ok(written > 0)
}

pub(crate) async fn liability_summary<C: ConnectionTrait>(
    conn: &C,
    location_id: Option<LocationId>,
) -> Result<LiabilitySummary, LedgerError> {
    #[derive(Debug, FromQueryResult)]
    struct SummaryRow {
        contract_count: i64,
        total_unearned: Decimal,
        total_remain_lessons: i64,
    }

    let row = SummaryRow::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        r"
        SELECT
            COUNT(*)::BIGINT AS contract_count,
            COALESCE(SUM(unearned), 0) AS total_unearned,
            COALESCE(SUM(remain_lessons), 0)::BIGINT AS total_remain_lessons
        FROM contracts
        WHERE status = 'ACTIVE'
          AND ($1::uuid IS NULL OR location_id = $1)
        ",
        [location_id.map(LocationId::into_inner).into()],
    ))
    .one(conn)
    .await
    .map_err(ledger_db_error)?;

    Ok(row.map_or_else(LiabilitySummary::default, |row| LiabilitySummary {
        contract_count: u64::try_from(row.contract_count).unwrap_or_default(),
        total_unearned: Money::new(row.total_unearned),
        total_remain_lessons: u64::try_from(row.total_remain_lessons).unwrap_or_default(),
    }))
}

async fn insert_payment<C: ConnectionTrait>(
    conn: &C,
    contract: &contracts::Model,
    outcome: &PaymentOutcome,
    method: CorePaymentMethod,
    operator: OperatorId,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> Result<payment_records::Model, LedgerError> {
    let payment_no = next_number(conn, SequencePrefix::Payment, today)
        .await
        .map_err(ledger_db_error)?
        .to_string();

    let payment = payment_records::ActiveModel {
        id: Set(PaymentId::new().into_inner()),
        payment_no: Set(payment_no),
        contract_id: Set(contract.id),
        amount: Set(outcome.amount.amount()),
        method: Set(method.into()),
        payment_type: Set(outcome.payment_type.into()),
        paid_at: Set(now.into()),
        created_by: Set(operator.into_inner()),
        created_at: Set(now.into()),
    }
    .insert(conn)
    .await
    .map_err(ledger_db_error)?;

    let cash_flow = CashFlowEvent::from_source(
        CashFlowSource::Payment,
        payment.id,
        outcome.amount,
        LocationId::from_uuid(contract.location_id),
        now,
    );
    record_cash_flow(conn, &cash_flow, contract.id).await?;

    Ok(payment)
}

fn payment_event(payment: &payment_records::Model) -> LedgerEvent {
    LedgerEvent::PaymentApplied {
        contract_id: ContractId::from_uuid(payment.contract_id),
        payment_id: PaymentId::from_uuid(payment.id),
        amount: Money::new(payment.amount),
    }
}
