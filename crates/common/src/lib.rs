//! Compare QA Common Library
//!
//! Shared data model, configuration and error types for the Compare QA
//! harness.

pub mod config;
pub mod error;
pub mod types;

pub use config::ProjectConfig;
pub use error::{Error, Result};
pub use types::*;

/// Compare QA version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

