//! `SeaORM` Entity for forecast_overrides table.
//!
//! `location_id` holds the nil UUID for overrides that apply ledger-wide.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "forecast_overrides")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub period_key: String,
    pub location_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))", nullable)]
    pub inflow: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))", nullable)]
    pub outflow: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))", nullable)]
    pub revenue: Option<Decimal>,
    #[sea_orm(column_type = "Text", nullable)]
    pub reason: Option<String>,
    pub locked: bool,
    pub updated_by: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
