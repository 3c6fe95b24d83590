//! Stocklens Common Library
//!
//! Shared error handling and logging setup for the stocklens workspace.
//!
//! # Overview
//!
//! This crate provides the pieces every workspace member needs:
//!
//! - **Error Handling**: the shared [`StocklensError`] type and `Result` alias
//! - **Logging**: centralized `tracing` initialization with console/file output
//!
//! # Example
//!
//! ```no_run
//! use stocklens_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("stocklens started");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{Result, StocklensError};
