//! Monthly sales series parsing.

use chrono::{Datelike, NaiveDate};

use crate::types::{ForecastError, SalesObservation};

/// Parse an upload month label such as `Jan-24` (or `Jan-2024`) to the first
/// day of that month.
pub fn parse_month_label(label: &str) -> Result<NaiveDate, ForecastError> {
    let padded = format!("01-{}", label.trim());
    NaiveDate::parse_from_str(&padded, "%d-%b-%y")
        .or_else(|_| NaiveDate::parse_from_str(&padded, "%d-%b-%Y"))
        .map_err(|_| ForecastError::InvalidMonth(label.to_string()))
}

/// Render a forecast month label, e.g. `Jan-2026`.
pub fn format_forecast_month(month: NaiveDate) -> String {
    month.format("%b-%Y").to_string()
}

/// Chronologically ordered monthly history.
#[derive(Debug, Clone)]
pub struct HistoricalSeries {
    months: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl HistoricalSeries {
    /// Parse, validate and sort uploaded observations.
    pub fn from_observations(observations: &[SalesObservation]) -> Result<Self, ForecastError> {
        if observations.is_empty() {
            return Err(ForecastError::EmptySeries);
        }

        let mut rows = Vec::with_capacity(observations.len());
        for obs in observations {
            let month = parse_month_label(&obs.month)?;
            if !obs.sales_qty.is_finite() {
                return Err(ForecastError::InvalidValue {
                    month: obs.month.clone(),
                    value: obs.sales_qty,
                });
            }
            rows.push((month, obs.sales_qty));
        }
        rows.sort_by_key(|(month, _)| *month);

        for pair in rows.windows(2) {
            if pair[0].0 == pair[1].0 {
                let m = pair[0].0;
                return Err(ForecastError::DuplicateMonth(format!(
                    "{}-{}",
                    m.format("%b"),
                    m.year()
                )));
            }
        }

        let (months, values) = rows.into_iter().unzip();
        Ok(Self { months, values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Most recent month in the series.
    pub fn last_month(&self) -> Option<NaiveDate> {
        self.months.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(month: &str, qty: f64) -> SalesObservation {
        SalesObservation {
            month: month.into(),
            sales_qty: qty,
        }
    }

    #[test]
    fn test_parse_month_label() {
        let d = parse_month_label("Jan-24").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let d = parse_month_label("Dec-2023").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2023, 12, 1).unwrap());
        assert!(parse_month_label("2024-01").is_err());
        assert!(parse_month_label("").is_err());
    }

    #[test]
    fn test_format_forecast_month() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_eq!(format_forecast_month(d), "Mar-2026");
    }

    #[test]
    fn test_series_sorted() {
        let series = HistoricalSeries::from_observations(&[
            obs("Mar-24", 3.0),
            obs("Jan-24", 1.0),
            obs("Feb-24", 2.0),
        ])
        .unwrap();
        assert_eq!(series.values(), &[1.0, 2.0, 3.0]);
        assert_eq!(
            series.last_month(),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
    }

    #[test]
    fn test_series_rejects_bad_input() {
        assert!(matches!(
            HistoricalSeries::from_observations(&[]),
            Err(ForecastError::EmptySeries)
        ));
        assert!(matches!(
            HistoricalSeries::from_observations(&[obs("Jan-24", 1.0), obs("Jan-24", 2.0)]),
            Err(ForecastError::DuplicateMonth(_))
        ));
        assert!(matches!(
            HistoricalSeries::from_observations(&[obs("Jan-24", f64::NAN)]),
            Err(ForecastError::InvalidValue { .. })
        ));
        assert!(matches!(
            HistoricalSeries::from_observations(&[obs("Month 1", 1.0)]),
            Err(ForecastError::InvalidMonth(_))
        ));
    }
}
