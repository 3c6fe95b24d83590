//! Stocklens Engine
//!
//! Pure, stateless data engines for the stocklens pipeline:
//!
//! - [`frame`]: the in-memory tabular representation and CSV loader
//! - [`transform`]: the cleaning/transformation pipeline (deduplication,
//!   column normalization, type inference, encoding, scaling, date parsing,
//!   derived features, summary statistics)
//! - [`analysis`]: inventory-specific EDA metrics (stock status,
//!   distributions, alerts, valuations)
//!
//! Nothing in this crate performs I/O beyond consuming the byte buffer it is
//! handed; identical input always produces identical output.

pub mod analysis;
pub mod error;
pub mod frame;
pub mod transform;

pub use error::EngineError;
pub use frame::{load_csv, Frame};
pub use transform::{transform_dataset, TransformationResult};
