//! Shared types, errors, and configuration for Lessonbook.
//!
//! This crate provides common types used across all other crates:
//! - Money type with decimal precision and half-up rounding
//! - Typed IDs for type-safe entity references
//! - Pagination types for list endpoints
//! - The error taxonomy shared by every ledger component
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{AppError, AppResult, ErrorCategory};
