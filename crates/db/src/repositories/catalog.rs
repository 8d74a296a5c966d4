//! Read-only reference data: packages, customers, locations and teachers.
//!
//! The ledger only reads these tables. The write methods exist for the
//! development seeder and tests.

use chrono::Utc;
use lessonbook_core::catalog::{CustomerInfo, LocationInfo, PackageInfo, TeacherInfo};
use lessonbook_core::ledger::LedgerError;
use lessonbook_shared::types::{CustomerId, LocationId, Money, PackageId, TeacherId};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryOrder, Set,
};
use uuid::Uuid;

use super::convert::{customer_info, ledger_db_error, lessons_column, location_info, package_info, teacher_info};
use crate::entities::{customers, locations, packages, teachers};

/// Input for a catalog package.
#[derive(Debug, Clone)]
pub struct NewPackage {
    /// Display name.
    pub name: String,
    /// Lessons sold.
    pub total_lessons: u32,
    /// List price.
    pub total_price: Money,
    /// Days the contract stays valid.
    pub validity_days: u32,
    /// Whether new contracts may be signed.
    pub on_sale: bool,
}

/// Input for a customer.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    /// Display name.
    pub name: String,
    /// Contact phone.
    pub phone: Option<String>,
}

/// Input for a location.
#[derive(Debug, Clone)]
pub struct NewLocation {
    /// Display name.
    pub name: String,
    /// Whether the campus is open.
    pub active: bool,
}

/// Input for a teacher.
#[derive(Debug, Clone)]
pub struct NewTeacher {
    /// Display name.
    pub name: String,
    /// Whether the teacher may record lessons.
    pub active: bool,
}

/// Repository for catalog and directory lookups.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    db: DatabaseConnection,
}

impl CatalogRepository {
    /// Creates a new catalog repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Loads a package inside an open transaction.
    pub(crate) async fn package<C: ConnectionTrait>(
        conn: &C,
        id: PackageId,
    ) -> Result<PackageInfo, LedgerError> {
        let model = packages::Entity::find_by_id(id.into_inner())
            .one(conn)
            .await
            .map_err(ledger_db_error)?
            .ok_or(LedgerError::PackageNotFound(id.into_inner()))?;
        package_info(&model)
    }

    pub(crate) async fn customer<C: ConnectionTrait>(
        conn: &C,
        id: CustomerId,
    ) -> Result<CustomerInfo, LedgerError> {
        customers::Entity::find_by_id(id.into_inner())
            .one(conn)
            .await
            .map_err(ledger_db_error)?
            .map(|model| customer_info(&model))
            .ok_or(LedgerError::CustomerNotFound(id.into_inner()))
    }

    pub(crate) async fn location<C: ConnectionTrait>(
        conn: &C,
        id: LocationId,
    ) -> Result<LocationInfo, LedgerError> {
        locations::Entity::find_by_id(id.into_inner())
            .one(conn)
            .await
            .map_err(ledger_db_error)?
            .map(|model| location_info(&model))
            .ok_or(LedgerError::LocationNotFound(id.into_inner()))
    }

    pub(crate) async fn teacher<C: ConnectionTrait>(
        conn: &C,
        id: TeacherId,
    ) -> Result<TeacherInfo, LedgerError> {
        teachers::Entity::find_by_id(id.into_inner())
            .one(conn)
            .await
            .map_err(ledger_db_error)?
            .map(|model| teacher_info(&model))
            .ok_or(LedgerError::TeacherNotFound(id.into_inner()))
    }

    /// Looks up a location.
    pub async fn find_location(&self, id: LocationId) -> Result<LocationInfo, LedgerError> {
        Self::location(&self.db, id).await
    }

    /// Lists all packages, newest first.
    pub async fn list_packages(&self) -> Result<Vec<PackageInfo>, LedgerError> {
        packages::Entity::find()
            .order_by_desc(packages::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(ledger_db_error)?
            .iter()
            .map(package_info)
            .collect()
    }

    /// Lists all locations by name.
    pub async fn list_locations(&self) -> Result<Vec<LocationInfo>, LedgerError> {
        Ok(locations::Entity::find()
            .order_by_asc(locations::Column::Name)
            .all(&self.db)
            .await
            .map_err(ledger_db_error)?
            .iter()
            .map(location_info)
            .collect())
    }

    /// Inserts a package.
    pub async fn create_package(&self, input: NewPackage) -> Result<PackageInfo, LedgerError> {
        let model = packages::ActiveModel {
            id: Set(Uuid::now_v7()),
            name: Set(input.name),
            total_lessons: Set(lessons_column(input.total_lessons)?),
            total_price: Set(input.total_price.round_cents().amount()),
            validity_days: Set(lessons_column(input.validity_days)?),
            on_sale: Set(input.on_sale),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.db)
        .await
        .map_err(ledger_db_error)?;
        package_info(&model)
    }

    /// Inserts a customer.
    pub async fn create_customer(&self, input: NewCustomer) -> Result<CustomerInfo, DbErr> {
        let model = customers::ActiveModel {
            id: Set(Uuid::now_v7()),
            name: Set(input.name),
            phone: Set(input.phone),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.db)
        .await?;
        Ok(customer_info(&model))
    }

    /// Inserts a location.
    pub async fn create_location(&self, input: NewLocation) -> Result<LocationInfo, DbErr> {
        let model = locations::ActiveModel {
            id: Set(Uuid::now_v7()),
            name: Set(input.name),
            active: Set(input.active),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.db)
        .await?;
        Ok(location_info(&model))
    }

    /// Inserts a teacher.
    pub async fn create_teacher(&self, input: NewTeacher) -> Result<TeacherInfo, DbErr> {
        let model = teachers::ActiveModel {
            id: Set(Uuid::now_v7()),
            name: Set(input.name),
            active: Set(input.active),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.db)
        .await?;
        Ok(teacher_info(&model))
    }
}
