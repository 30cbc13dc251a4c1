//! Forecast types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest forecast, in months, a single request may ask for.
pub const MAX_HORIZON: usize = 120;

/// Failures while turning an uploaded series into a forecast.
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Invalid month label '{0}', expected e.g. Jan-24")]
    InvalidMonth(String),

    #[error("Duplicate month in series: {0}")]
    DuplicateMonth(String),

    #[error("Invalid sales value for {month}: {value}")]
    InvalidValue { month: String, value: f64 },

    #[error("Series is empty")]
    EmptySeries,

    #[error("Forecast horizon must be 1 to {max} months, got {0}", max = MAX_HORIZON)]
    InvalidHorizon(usize),

    #[error("Forecast month out of range")]
    MonthOverflow,

    #[error("Failed to render forecast: {0}")]
    Render(#[from] serde_json::Error),
}

/// One row of the uploaded monthly history (`Month`, `Sales Qty`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesObservation {
    /// Month label in `Mon-YY` form, e.g. `Jan-24`.
    pub month: String,
    #[serde(rename = "salesQty")]
    pub sales_qty: f64,
}

/// A single forecast month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Month label in `Mon-YYYY` form, e.g. `Jan-2026`.
    pub month: String,
    #[serde(rename = "salesQty")]
    pub sales_qty: i64,
}

const FORECAST_PREAMBLE: &str = "\
You are a precise forecasting and historical sales assistant. Use the forecast data provided below and, when available, the historical context provided at answer time.
DO:
- Answer based only on the forecast data and the historical data
- Follow up accurately using past messages
DO NOT:
- Hallucinate or invent values
Sales Forecast:
";

/// Forecast computed for one uploaded dataset, with its prompt rendering.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastSet {
    pub points: Vec<ForecastPoint>,
    #[serde(skip)]
    block: String,
}

impl ForecastSet {
    /// Wrap computed points and render the forecast prompt block once.
    pub fn from_points(points: Vec<ForecastPoint>) -> Result<Self, ForecastError> {
        let block = format!(
            "{}{}",
            FORECAST_PREAMBLE,
            serde_json::to_string_pretty(&points)?
        );
        Ok(Self { points, block })
    }

    /// Text placed at the top of the system prompt in forecast modes.
    pub fn prompt_block(&self) -> &str {
        &self.block
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
