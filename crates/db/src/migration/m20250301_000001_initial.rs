//! Initial database migration.
//!
//! Creates the enums, reference tables, ledger tables, cash flow log,
//! settlement and forecast tables, plus the guard triggers.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: REFERENCE DATA (read-only to the ledger)
        // ============================================================
        db.execute_unprepared(REFERENCE_SQL).await?;

        // ============================================================
        // PART 3: SEQUENCES
        // ============================================================
        db.execute_unprepared(SEQUENCES_SQL).await?;

        // ============================================================
        // PART 4: CONTRACT LEDGER
        // ============================================================
        db.execute_unprepared(CONTRACTS_SQL).await?;
        db.execute_unprepared(PAYMENT_RECORDS_SQL).await?;
        db.execute_unprepared(CONSUMPTION_RECORDS_SQL).await?;

        // ============================================================
        // PART 5: REFUNDS & CASH FLOW
        // ============================================================
        db.execute_unprepared(REFUND_CASES_SQL).await?;
        db.execute_unprepared(CASH_FLOW_EVENTS_SQL).await?;

        // ============================================================
        // PART 6: SETTLEMENT & FORECAST
        // ============================================================
        db.execute_unprepared(SETTLEMENT_REPORTS_SQL).await?;
        db.execute_unprepared(FORECAST_OVERRIDES_SQL).await?;

        // ============================================================
        // PART 7: TRIGGERS & FUNCTIONS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
CREATE TYPE contract_status AS ENUM ('ACTIVE', 'COMPLETED', 'TERMINATED');

CREATE TYPE payment_method AS ENUM ('CASH', 'CARD', 'BANK_TRANSFER', 'ONLINE', 'OTHER');

CREATE TYPE payment_type AS ENUM ('INITIAL_SIGN', 'INSTALLMENT', 'RENEWAL');

CREATE TYPE consumption_type AS ENUM ('NORMAL', 'ABSENCE_DEDUCTION', 'MAKEUP', 'TRIAL');

CREATE TYPE consumption_status AS ENUM ('NORMAL', 'REVOKED');

CREATE TYPE refund_status AS ENUM (
    'PENDING',
    'APPROVED',
    'REJECTED',
    'COMPLETED',
    'CANCELLED'
);

CREATE TYPE refund_type AS ENUM ('NORMAL', 'TRANSFER', 'TERMINATE');

CREATE TYPE cash_flow_source AS ENUM ('PAYMENT', 'REFUND');

CREATE TYPE cash_flow_direction AS ENUM ('INFLOW', 'OUTFLOW');
";

const REFERENCE_SQL: &str = r"
CREATE TABLE locations (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE teachers (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE customers (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    phone VARCHAR(32),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE packages (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    total_lessons INTEGER NOT NULL,
    total_price NUMERIC(19, 2) NOT NULL,
    validity_days INTEGER NOT NULL,
    on_sale BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_package_lessons CHECK (total_lessons >= 0),
    CONSTRAINT chk_package_price CHECK (total_price >= 0),
    CONSTRAINT chk_package_validity CHECK (validity_days >= 0)
);
";

const SEQUENCES_SQL: &str = r"
-- One counter per prefix per business day, advanced with INSERT ... ON CONFLICT
CREATE TABLE business_sequences (
    prefix VARCHAR(8) NOT NULL,
    seq_date DATE NOT NULL,
    value BIGINT NOT NULL,
    PRIMARY KEY (prefix, seq_date),
    CONSTRAINT chk_sequence_positive CHECK (value > 0)
);
";

const CONTRACTS_SQL: &str = r"
CREATE TABLE contracts (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    contract_no VARCHAR(32) NOT NULL UNIQUE,
    customer_id UUID NOT NULL REFERENCES customers(id),
    package_id UUID NOT NULL REFERENCES packages(id),
    location_id UUID NOT NULL REFERENCES locations(id),

    total_lessons INTEGER NOT NULL,
    used_lessons INTEGER NOT NULL DEFAULT 0,
    remain_lessons INTEGER NOT NULL,
    refunded_lessons INTEGER NOT NULL DEFAULT 0,

    original_price NUMERIC(19, 2) NOT NULL,
    discount NUMERIC(19, 2) NOT NULL DEFAULT 0,
    contract_value NUMERIC(19, 2) NOT NULL,
    unit_price NUMERIC(19, 4) NOT NULL,
    paid_amount NUMERIC(19, 2) NOT NULL DEFAULT 0,
    unearned NUMERIC(19, 2) NOT NULL,

    status contract_status NOT NULL DEFAULT 'ACTIVE',
    start_date DATE NOT NULL,
    end_date DATE NOT NULL,
    snapshot JSONB NOT NULL,
    version BIGINT NOT NULL DEFAULT 0,

    created_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT chk_lessons_balanced
        CHECK (used_lessons + remain_lessons + refunded_lessons = total_lessons),
    CONSTRAINT chk_lessons_non_negative
        CHECK (used_lessons >= 0 AND remain_lessons >= 0 AND refunded_lessons >= 0),
    CONSTRAINT chk_refunded_only_when_terminated
        CHECK (refunded_lessons = 0 OR status = 'TERMINATED'),
    CONSTRAINT chk_amounts_non_negative
        CHECK (unearned >= 0 AND paid_amount >= 0 AND contract_value >= 0),
    CONSTRAINT chk_discount CHECK (discount >= 0 AND discount <= original_price),
    CONSTRAINT chk_paid_within_value CHECK (paid_amount <= contract_value)
);

CREATE INDEX idx_contracts_customer ON contracts(customer_id, created_at DESC);
CREATE INDEX idx_contracts_location_status ON contracts(location_id, status);
";

const PAYMENT_RECORDS_SQL: &str = r"
CREATE TABLE payment_records (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    payment_no VARCHAR(32) NOT NULL UNIQUE,
    contract_id UUID NOT NULL REFERENCES contracts(id),
    amount NUMERIC(19, 2) NOT NULL,
    method payment_method NOT NULL,
    payment_type payment_type NOT NULL,
    paid_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    created_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_payment_positive CHECK (amount > 0)
);

CREATE INDEX idx_payment_records_contract ON payment_records(contract_id, paid_at);
";

const CONSUMPTION_RECORDS_SQL: &str = r"
CREATE TABLE consumption_records (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    consumption_no VARCHAR(32) NOT NULL UNIQUE,
    contract_id UUID NOT NULL REFERENCES contracts(id),
    consumption_type consumption_type NOT NULL DEFAULT 'NORMAL',
    teacher_id UUID NOT NULL REFERENCES teachers(id),
    location_id UUID NOT NULL REFERENCES locations(id),
    lesson_date DATE NOT NULL,
    lessons INTEGER NOT NULL,

    -- Exact ledger delta, replayed in reverse on revocation
    unit_price NUMERIC(19, 4) NOT NULL,
    amount NUMERIC(19, 2) NOT NULL,
    rounding_residue NUMERIC(19, 2) NOT NULL DEFAULT 0,
    remain_before INTEGER NOT NULL,
    remain_after INTEGER NOT NULL,
    unearned_before NUMERIC(19, 2) NOT NULL,
    unearned_after NUMERIC(19, 2) NOT NULL,

    status consumption_status NOT NULL DEFAULT 'NORMAL',
    remark TEXT,
    created_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    revoked_by UUID,
    revoked_at TIMESTAMPTZ,
    revoke_reason TEXT,

    CONSTRAINT chk_consumption_lessons CHECK (lessons > 0),
    CONSTRAINT chk_consumption_delta CHECK (remain_before - remain_after = lessons),
    CONSTRAINT chk_revocation_fields CHECK (
        (status = 'REVOKED') = (revoked_at IS NOT NULL)
    )
);

CREATE INDEX idx_consumption_records_contract ON consumption_records(contract_id, created_at);
CREATE INDEX idx_consumption_records_location_created ON consumption_records(location_id, created_at);
CREATE INDEX idx_consumption_records_location_revoked ON consumption_records(location_id, revoked_at)
    WHERE revoked_at IS NOT NULL;
CREATE INDEX idx_consumption_records_lesson_date ON consumption_records(lesson_date)
    WHERE status = 'NORMAL';
";

const REFUND_CASES_SQL: &str = r"
CREATE TABLE refund_cases (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    refund_no VARCHAR(32) NOT NULL UNIQUE,
    contract_id UUID NOT NULL REFERENCES contracts(id),
    refund_type refund_type NOT NULL DEFAULT 'NORMAL',
    status refund_status NOT NULL DEFAULT 'PENDING',

    -- Quote captured at request time
    remain_lessons INTEGER NOT NULL,
    unit_price NUMERIC(19, 4) NOT NULL,
    refundable_amount NUMERIC(19, 2) NOT NULL,
    deduction NUMERIC(19, 2) NOT NULL DEFAULT 0,
    payable_amount NUMERIC(19, 2) NOT NULL,
    approved_amount NUMERIC(19, 2),
    reason TEXT NOT NULL,

    requested_by UUID NOT NULL,
    requested_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    approved_by UUID,
    approved_at TIMESTAMPTZ,
    approval_remark TEXT,
    completed_by UUID,
    completed_at TIMESTAMPTZ,
    payout_method payment_method,
    payout_account VARCHAR(255),
    cancelled_by UUID,
    cancelled_at TIMESTAMPTZ,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    CONSTRAINT chk_refund_amounts CHECK (
        deduction >= 0 AND payable_amount >= 0 AND payable_amount <= refundable_amount
    ),
    CONSTRAINT chk_approved_amount CHECK (
        approved_amount IS NULL OR (approved_amount >= 0 AND approved_amount <= refundable_amount)
    )
);

CREATE INDEX idx_refund_cases_contract ON refund_cases(contract_id, requested_at DESC);

-- At most one in-flight refund per contract
CREATE UNIQUE INDEX uq_refund_cases_in_flight ON refund_cases(contract_id)
    WHERE status IN ('PENDING', 'APPROVED');
";

const CASH_FLOW_EVENTS_SQL: &str = r"
CREATE TABLE cash_flow_events (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    source_type cash_flow_source NOT NULL,
    source_id UUID NOT NULL,
    direction cash_flow_direction NOT NULL,
    amount NUMERIC(19, 2) NOT NULL,
    contract_id UUID NOT NULL REFERENCES contracts(id),
    location_id UUID NOT NULL REFERENCES locations(id),
    occurred_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_cash_flow_amount CHECK (amount >= 0),
    CONSTRAINT uq_cash_flow_source UNIQUE (source_type, source_id)
);

CREATE INDEX idx_cash_flow_events_location_time ON cash_flow_events(location_id, occurred_at);
CREATE INDEX idx_cash_flow_events_time ON cash_flow_events(occurred_at);
";

const SETTLEMENT_REPORTS_SQL: &str = r"
CREATE TABLE settlement_reports (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    settle_date DATE NOT NULL,
    location_id UUID NOT NULL REFERENCES locations(id),
    payment_count BIGINT NOT NULL DEFAULT 0,
    payment_total NUMERIC(19, 2) NOT NULL DEFAULT 0,
    refund_count BIGINT NOT NULL DEFAULT 0,
    refund_total NUMERIC(19, 2) NOT NULL DEFAULT 0,
    net_cash NUMERIC(19, 2) NOT NULL DEFAULT 0,
    consumption_count BIGINT NOT NULL DEFAULT 0,
    lessons_consumed BIGINT NOT NULL DEFAULT 0,
    recognized_revenue NUMERIC(19, 2) NOT NULL DEFAULT 0,
    revoked_count BIGINT NOT NULL DEFAULT 0,
    settled_by UUID NOT NULL,
    settled_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_settlement_day UNIQUE (settle_date, location_id)
);
";

const FORECAST_OVERRIDES_SQL: &str = r"
-- location_id is the nil UUID for ledger-wide overrides
CREATE TABLE forecast_overrides (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    period_key VARCHAR(8) NOT NULL,
    location_id UUID NOT NULL,
    inflow NUMERIC(19, 2),
    outflow NUMERIC(19, 2),
    revenue NUMERIC(19, 2),
    reason TEXT,
    locked BOOLEAN NOT NULL DEFAULT false,
    updated_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_forecast_override UNIQUE (period_key, location_id),
    CONSTRAINT chk_period_key CHECK (period_key ~ '^[0-9]{4}-W[0-9]{2}$')
);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: prevent_mutation
-- Cash flow events and settlement reports are append-only
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_mutation()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION '% is append-only', TG_TABLE_NAME;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_cash_flow_events_immutable
BEFORE UPDATE OR DELETE ON cash_flow_events
FOR EACH ROW
EXECUTE FUNCTION prevent_mutation();

CREATE TRIGGER trg_settlement_reports_immutable
BEFORE UPDATE OR DELETE ON settlement_reports
FOR EACH ROW
EXECUTE FUNCTION prevent_mutation();

-- ============================================================
-- FUNCTION: prevent_terminated_reopen
-- Nothing leaves TERMINATED
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_terminated_reopen()
RETURNS TRIGGER AS $$
BEGIN
    IF OLD.status = 'TERMINATED' AND NEW.status <> 'TERMINATED' THEN
        RAISE EXCEPTION 'Contract % is terminated', OLD.id;
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_contracts_terminated_final
BEFORE UPDATE ON contracts
FOR EACH ROW
EXECUTE FUNCTION prevent_terminated_reopen();

-- ============================================================
-- FUNCTION: touch_updated_at
-- ============================================================
CREATE OR REPLACE FUNCTION touch_updated_at()
RETURNS TRIGGER AS $$
BEGIN
    NEW.updated_at = now();
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_contracts_updated_at
BEFORE UPDATE ON contracts
FOR EACH ROW
EXECUTE FUNCTION touch_updated_at();

CREATE TRIGGER trg_refund_cases_updated_at
BEFORE UPDATE ON refund_cases
FOR EACH ROW
EXECUTE FUNCTION touch_updated_at();

CREATE TRIGGER trg_forecast_overrides_updated_at
BEFORE UPDATE ON forecast_overrides
FOR EACH ROW
EXECUTE FUNCTION touch_updated_at();
";

const DROP_ALL_SQL: &str = r"
-- ============================================================
-- DROP ALL: Rollback migration
-- Order matters due to foreign key constraints
-- ============================================================
DROP TABLE IF EXISTS forecast_overrides CASCADE;
DROP TABLE IF EXISTS settlement_reports CASCADE;
DROP TABLE IF EXISTS cash_flow_events CASCADE;
DROP TABLE IF EXISTS refund_cases CASCADE;
DROP TABLE IF EXISTS consumption_records CASCADE;
DROP TABLE IF EXISTS payment_records CASCADE;
DROP TABLE IF EXISTS contracts CASCADE;
DROP TABLE IF EXISTS business_sequences CASCADE;
DROP TABLE IF EXISTS packages CASCADE;
DROP TABLE IF EXISTS customers CASCADE;
DROP TABLE IF EXISTS teachers CASCADE;
DROP TABLE IF EXISTS locations CASCADE;

DROP FUNCTION IF EXISTS prevent_mutation() CASCADE;
DROP FUNCTION IF EXISTS prevent_terminated_reopen() CASCADE;
DROP FUNCTION IF EXISTS touch_updated_at() CASCADE;

DROP TYPE IF EXISTS cash_flow_direction;
DROP TYPE IF EXISTS cash_flow_source;
DROP TYPE IF EXISTS refund_type;
DROP TYPE IF EXISTS refund_status;
DROP TYPE IF EXISTS consumption_status;
DROP TYPE IF EXISTS consumption_type;
DROP TYPE IF EXISTS payment_type;
DROP TYPE IF EXISTS payment_method;
DROP TYPE IF EXISTS contract_status;
";
