//! Forecasting collaborator: monthly sales series in, forecast points out.
//!
//! The conversation core only consumes the rendered [`ForecastSet`]; the
//! model behind [`Forecaster`] is replaceable.

pub mod model;
pub mod series;
pub mod types;

pub use model::{Forecaster, SeasonalNaiveForecaster};
pub use series::{format_forecast_month, parse_month_label, HistoricalSeries};
pub use types::*;
