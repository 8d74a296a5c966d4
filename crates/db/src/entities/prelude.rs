//! Entity re-exports.

pub use super::cash_flow_events::Entity as CashFlowEvents;
pub use super::consumption_records::Entity as ConsumptionRecords;
pub use super::contracts::Entity as Contracts;
pub use super::customers::Entity as Customers;
pub use super::forecast_overrides::Entity as ForecastOverrides;
pub use super::locations::Entity as Locations;
pub use super::packages::Entity as Packages;
pub use super::payment_records::Entity as PaymentRecords;
pub use super::refund_cases::Entity as RefundCases;
pub use super::settlement_reports::Entity as SettlementReports;
pub use super::teachers::Entity as Teachers;
