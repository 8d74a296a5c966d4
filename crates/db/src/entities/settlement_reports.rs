//! `SeaORM` Entity for settlement_reports table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "settlement_reports")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub settle_date: Date,
    pub location_id: Uuid,
    pub payment_count: i64,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub payment_total: Decimal,
    pub refund_count: i64,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub refund_total: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub net_cash: Decimal,
    pub consumption_count: i64,
    pub lessons_consumed: i64,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub recognized_revenue: Decimal,
    pub revoked_count: i64,
    pub settled_by: Uuid,
    pub settled_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::locations::Entity",
        from = "Column::LocationId",
        to = "super::locations::Column::Id"
    )]
    Locations,
}

impl Related<super::locations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Locations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
