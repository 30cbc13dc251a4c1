//! Forecast routes: upload a monthly sales series, read the stored forecast.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use forecastiq_forecast::{ForecastSet, HistoricalSeries, SalesObservation};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use super::error_json;
use crate::state::AppState;

const DEFAULT_HORIZON: usize = 12;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/forecast", post(upload).get(get_forecast))
}

#[derive(Debug, Deserialize)]
struct ForecastRequest {
    observations: Vec<SalesObservation>,
    #[serde(default = "default_horizon")]
    horizon: usize,
}

fn default_horizon() -> usize {
    DEFAULT_HORIZON
}

async fn upload(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ForecastRequest>,
) -> (StatusCode, Json<Value>) {
    let points = HistoricalSeries::from_observations(&req.observations)
        .and_then(|series| state.forecaster.forecast(&series, req.horizon));
    let points = match points {
        Ok(points) => points,
        Err(e) => {
            warn!("Forecast rejected: {}", e);
            return error_json(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    let forecast = match ForecastSet::from_points(points) {
        Ok(forecast) => forecast,
        Err(e) => return error_json(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };

    let body = json!({
        "model": state.forecaster.name(),
        "horizon": req.horizon,
        "observations": req.observations.len(),
        "forecast": forecast.points,
    });
    state.session.lock().set_forecast(forecast);

    (StatusCode::OK, Json(body))
}

async fn get_forecast(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let session = state.session.lock();
    match session.forecast() {
        Some(forecast) => (
            StatusCode::OK,
            Json(json!({ "forecast": forecast.points })),
        ),
        None => error_json(StatusCode::NOT_FOUND, "No forecast has been computed yet"),
    }
}
