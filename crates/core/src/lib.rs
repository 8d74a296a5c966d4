//! Core business logic for Lessonbook.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Services take the current state as input and return the next state plus the
//! records to persist; the database layer wraps each call in a transaction.
//!
//! # Modules
//!
//! - `sequence` - Human-readable business numbers
//! - `catalog` - Read-only package, customer, location and teacher views
//! - `ledger` - Contract ledger and its invariants
//! - `consumption` - Lesson consumption and roster attendance
//! - `refund` - Refund approval workflow
//! - `forecast` - Rolling weekly cash-flow forecast
//! - `settlement` - Daily per-location settlement
//! - `events` - Ledger events and the event sink

pub mod catalog;
pub mod consumption;
pub mod events;
pub mod forecast;
pub mod ledger;
pub mod refund;
pub mod sequence;
pub mod settlement;
