//! `SeaORM` Entity for contracts table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::ContractStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "contracts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub contract_no: String,
    pub customer_id: Uuid,
    pub package_id: Uuid,
    pub location_id: Uuid,
    pub total_lessons: i32,
    pub used_lessons: i32,
    pub remain_lessons: i32,
    pub refunded_lessons: i32,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub original_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub discount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub contract_value: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub unit_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub paid_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub unearned: Decimal,
    pub status: ContractStatus,
    pub start_date: Date,
    pub end_date: Date,
    #[sea_orm(column_type = "JsonBinary")]
    pub snapshot: Json,
    pub version: i64,
    pub created_by: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customers::Entity",
        from = "Column::CustomerId",
        to = "super::customers::Column::Id"
    )]
    Customers,
    #[sea_orm(
        belongs_to = "super::packages::Entity",
        from = "Column::PackageId",
        to = "super::packages::Column::Id"
    )]
    Packages,
    #[sea_orm(
        belongs_to = "super::locations::Entity",
        from = "Column::LocationId",
        to = "super::locations::Column::Id"
    )]
    Locations,
    #[sea_orm(has_many = "super::payment_records::Entity")]
    PaymentRecords,
    #[sea_orm(has_many = "super::consumption_records::Entity")]
    ConsumptionRecords,
    #[sea_orm(has_many = "super::refund_cases::Entity")]
    RefundCases,
}

impl Related<super::customers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customers.def()
    }
}

impl Related<super::packages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Packages.def()
    }
}

impl Related<super::locations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Locations.def()
    }
}

impl Related<super::payment_records::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentRecords.def()
    }
}

impl Related<super::consumption_records::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ConsumptionRecords.def()
    }
}

impl Related<super::refund_cases::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RefundCases.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
