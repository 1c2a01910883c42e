//! # Reverie Core
//!
//! Shared building blocks for the Reverie personalization platform.
//!
//! This crate provides the error taxonomy, configuration loading, database
//! pooling, and numeric utilities consumed by the engine crate.
//!
//! ## Modules
//!
//! - `error`: Error types and handling
//! - `config`: Configuration loading and validation
//! - `database`: Shared PostgreSQL connection pool
//! - `math`: Linear-algebra utilities for the ridge models
//! - `retry`: Bounded retry with exponential backoff

pub mod config;
pub mod database;
pub mod error;
pub mod math;
pub mod retry;

// Re-export commonly used types
pub use config::{load_dotenv, BanditConfig, ConfigLoader, DatabaseConfig, ServiceConfig};
pub use database::{DatabasePool, PoolStats};
pub use error::ReverieError;
pub use math::{cholesky_solve, dot};
pub use retry::{retry_with_backoff, RetryPolicy};

/// Result type alias for Reverie operations
pub type Result<T> = std::result::Result<T, ReverieError>;
