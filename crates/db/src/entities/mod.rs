//! `SeaORM` entity definitions.

pub mod prelude;

pub mod cash_flow_events;
pub mod consumption_records;
pub mod contracts;
pub mod customers;
pub mod forecast_overrides;
pub mod locations;
pub mod packages;
pub mod payment_records;
pub mod refund_cases;
pub mod sea_orm_active_enums;
pub mod settlement_reports;
pub mod teachers;
