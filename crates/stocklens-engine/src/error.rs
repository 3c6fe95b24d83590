//! Engine error types

use thiserror::Error;

/// Errors produced by the transformation and analysis engines
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid CSV: {0}")]
    InvalidCsv(String),

    #[error("No data to analyze")]
    EmptyDataset,
}
