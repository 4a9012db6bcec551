use crate::{error::ApiError, AppState};
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct StatsResponse {
    pub total: i64,
    pub failed: i64,
    pub success_rate: String,
    pub average_processing_time_seconds: f64,
}

/// `GET /api/stats` — aggregate over every completed record.
pub async fn read(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state.library.lock().get_processing_stats()?;

    let (success_rate, average_processing_time_seconds) = if stats.total == 0 {
        ("0%".to_string(), 0.0)
    } else {
        (
            format!(
                "{}%",
                (1.0 - stats.failed as f64 / stats.total as f64) * 100.0
            ),
            stats.total_processing_time_seconds / stats.total as f64,
        )
    };

    Ok(Json(StatsResponse {
        total: stats.total,
        failed: stats.failed,
        success_rate,
        average_processing_time_seconds,
    }))
}
