//! PaperDesk Common Library
//!
//! Everything the gateway needs to run the journal's paper workflow:
//! - Domain model and workflow state machine
//! - Submission, reviewer assignment and decision workflow
//! - Paper and user persistence (PostgreSQL and in-memory)
//! - Blob storage and mail notifications
//! - Error types, configuration, authentication, metrics

pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod metrics;
pub mod notify;
pub mod storage;
pub mod store;
pub mod workflow;

// Re-export commonly used types
pub use auth::{Caller, JwtManager, Role, UserRecord};
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};
pub use workflow::{Outcome, Workflow, WorkflowSettings};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
