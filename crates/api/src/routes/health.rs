use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub online_users: usize,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let online_users = state
        .hub()
        .online_users()
        .map(|users| users.len())
        .unwrap_or_default();

    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        online_users,
    })
}
