//! Forecasting models.

use chrono::Months;
use tracing::debug;

use crate::series::{format_forecast_month, HistoricalSeries};
use crate::types::{ForecastError, ForecastPoint, MAX_HORIZON};

/// A model that projects a monthly series forward.
pub trait Forecaster: Send + Sync {
    /// Short identifier used in logs and status output.
    fn name(&self) -> &str;

    /// Forecast `horizon` months following the last observation, where
    /// `horizon` is in `1..=MAX_HORIZON`.
    fn forecast(
        &self,
        series: &HistoricalSeries,
        horizon: usize,
    ) -> Result<Vec<ForecastPoint>, ForecastError>;
}

/// Repeats the value observed one season earlier.
///
/// With less than one full season of history the last value is carried
/// forward instead.
pub struct SeasonalNaiveForecaster {
    season: usize,
}

impl SeasonalNaiveForecaster {
    pub fn new(season: usize) -> Self {
        Self {
            season: season.max(1),
        }
    }
}

impl Default for SeasonalNaiveForecaster {
    fn default() -> Self {
        Self::new(12)
    }
}

impl Forecaster for SeasonalNaiveForecaster {
    fn name(&self) -> &str {
        "seasonal-naive"
    }

    fn forecast(
        &self,
        series: &HistoricalSeries,
        horizon: usize,
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        if horizon == 0 || horizon > MAX_HORIZON {
            return Err(ForecastError::InvalidHorizon(horizon));
        }
        let last_month = series.last_month().ok_or(ForecastError::EmptySeries)?;
        let values = series.values();
        let n = values.len();

        let mut points = Vec::new();
        for step in 1..=horizon {
            let value = if n >= self.season {
                values[n - self.season + (step - 1) % self.season]
            } else {
                values[n - 1]
            };
            let offset = u32::try_from(step).map_err(|_| ForecastError::MonthOverflow)?;
            let month = last_month
                .checked_add_months(Months::new(offset))
                .ok_or(ForecastError::MonthOverflow)?;
            points.push(ForecastPoint {
                month: format_forecast_month(month),
                sales_qty: value.trunc() as i64,
            });
        }

        debug!(
            "{} forecast: {} points from {} observations",
            self.name(),
            points.len(),
            n
        );
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SalesObservation;

    fn series(labels_values: &[(&str, f64)]) -> HistoricalSeries {
        let obs: Vec<SalesObservation> = labels_values
            .iter()
            .map(|(m, v)| SalesObservation {
                month: m.to_string(),
                sales_qty: *v,
            })
            .collect();
        HistoricalSeries::from_observations(&obs).unwrap()
    }

    fn two_years() -> HistoricalSeries {
        let months = [
            "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
        ];
        let mut rows = Vec::new();
        for (yi, yy) in ["23", "24"].iter().enumerate() {
            for (mi, m) in months.iter().enumerate() {
                rows.push((format!("{}-{}", m, yy), (yi * 100 + mi) as f64 + 0.9));
            }
        }
        let borrowed: Vec<(&str, f64)> = rows.iter().map(|(m, v)| (m.as_str(), *v)).collect();
        series(&borrowed)
    }

    #[test]
    fn test_seasonal_repeat() {
        let f = SeasonalNaiveForecaster::default();
        let points = f.forecast(&two_years(), 3).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].month, "Jan-2025");
        assert_eq!(points[0].sales_qty, 100);
        assert_eq!(points[2].month, "Mar-2025");
        assert_eq!(points[2].sales_qty, 102);
    }

    #[test]
    fn test_horizon_wraps_season() {
        let f = SeasonalNaiveForecaster::default();
        let points = f.forecast(&two_years(), 13).unwrap();
        assert_eq!(points[12].month, "Jan-2026");
        assert_eq!(points[12].sales_qty, points[0].sales_qty);
    }

    #[test]
    fn test_short_history_carries_last_value() {
        let f = SeasonalNaiveForecaster::default();
        let s = series(&[("Nov-24", 10.0), ("Dec-24", 42.5)]);
        let points = f.forecast(&s, 2).unwrap();
        assert_eq!(points[0].month, "Jan-2025");
        assert_eq!(points[0].sales_qty, 42);
        assert_eq!(points[1].sales_qty, 42);
    }

    #[test]
    fn test_zero_horizon() {
        let f = SeasonalNaiveForecaster::default();
        let s = series(&[("Jan-24", 1.0)]);
        assert!(matches!(f.forecast(&s, 0), Err(ForecastError::InvalidHorizon(0))));
    }

    #[test]
    fn test_horizon_upper_bound() {
        let f = SeasonalNaiveForecaster::default();
        let s = series(&[("Jan-24", 1.0)]);
        assert_eq!(f.forecast(&s, MAX_HORIZON).unwrap().len(), MAX_HORIZON);
        assert!(matches!(
            f.forecast(&s, MAX_HORIZON + 1),
            Err(ForecastError::InvalidHorizon(_))
        ));
        let err = f.forecast(&s, usize::MAX).unwrap_err();
        assert!(err.to_string().contains("1 to 120 months"));
    }
}
