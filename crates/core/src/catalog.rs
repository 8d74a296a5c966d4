//! Read-only reference data supplied by the catalog and directory services.
//!
//! The ledger never mutates these; it only checks them when a contract is
//! signed or a lesson is recorded.

use lessonbook_shared::types::{CustomerId, LocationId, Money, PackageId, TeacherId};
use serde::{Deserialize, Serialize};

/// A sellable lesson block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Package id.
    pub id: PackageId,
    /// Display name.
    pub name: String,
    /// Lessons included.
    pub total_lessons: u32,
    /// List price of the whole block.
    pub total_price: Money,
    /// Days the lessons stay usable after the start date.
    pub validity_days: u32,
    /// Whether the package may currently be sold.
    pub on_sale: bool,
}

/// A customer (student account).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    /// Customer id.
    pub id: CustomerId,
    /// Display name.
    pub name: String,
}

/// A campus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationInfo {
    /// Location id.
    pub id: LocationId,
    /// Display name.
    pub name: String,
    /// Inactive campuses accept no new contracts or lessons.
    pub active: bool,
}

/// A teacher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherInfo {
    /// Teacher id.
    pub id: TeacherId,
    /// Display name.
    pub name: String,
    /// Inactive teachers cannot record lessons.
    pub active: bool,
}
