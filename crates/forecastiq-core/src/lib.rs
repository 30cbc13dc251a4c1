//! ForecastIQ core: shared error type and configuration.

pub mod config;
pub mod error;

pub use config::{DataPaths, ForecastIqConfig, SearchConfig};
pub use error::{Error, Result};
