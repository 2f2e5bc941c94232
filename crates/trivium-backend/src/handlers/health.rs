use std::sync::Arc;

use axum::{Json, extract::State};
use trivium::data::{HealthResponse, HealthStatus, ServiceInfo, UptimeInfo};
use trivium::log;

/// Render an uptime as a compact human string, largest unit first.
fn format_uptime(seconds: i64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    let secs = seconds % 60;

    match (days, hours, minutes) {
        (0, 0, 0) => format!("{secs}s"),
        (0, 0, _) => format!("{minutes}m {secs}s"),
        (0, _, _) => format!("{hours}h {minutes}m {secs}s"),
        _ => format!("{days}d {hours}h {minutes}m {secs}s"),
    }
}

pub async fn get(State(state): State<Arc<crate::AppState>>) -> Json<HealthResponse> {
    let now = chrono::Utc::now();
    let seconds = (now - state.started_at).num_seconds().max(0);

    let health_response = HealthResponse {
        status: HealthStatus::Healthy,
        timestamp: now.to_rfc3339(),
        started_at: state.started_at.to_rfc3339(),
        uptime: UptimeInfo {
            seconds,
            human: format_uptime(seconds),
        },
        services: ServiceInfo {
            sessions: "up".to_string(),
            active_sessions: state.store.session_count().await,
        },
    };

    log::debug!("Health check: {:?}", health_response);

    Json(health_response)
}
