//! `SeaORM` Entity for consumption_records table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{ConsumptionStatus, ConsumptionType};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "consumption_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub consumption_no: String,
    pub contract_id: Uuid,
    pub consumption_type: ConsumptionType,
    pub teacher_id: Uuid,
    pub location_id: Uuid,
    pub lesson_date: Date,
    pub lessons: i32,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub unit_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub rounding_residue: Decimal,
    pub remain_before: i32,
    pub remain_after: i32,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub unearned_before: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub unearned_after: Decimal,
    pub status: ConsumptionStatus,
    #[sea_orm(column_type = "Text", nullable)]
    pub remark: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub revoked_by: Option<Uuid>,
    pub revoked_at: Option<DateTimeWithTimeZone>,
    #[sea_orm(column_type = "Text", nullable)]
    pub revoke_reason: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::contracts::Entity",
        from = "Column::ContractId",
        to = "super::contracts::Column::Id"
    )]
    Contracts,
    #[sea_orm(
        belongs_to = "super::teachers::Entity",
        from = "Column::TeacherId",
        to = "super::teachers::Column::Id"
    )]
    Teachers,
}

impl Related<super::contracts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Contracts.def()
    }
}

impl Related<super::teachers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Teachers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
