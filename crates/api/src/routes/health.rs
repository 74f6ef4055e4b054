use crate::{create_success_response, HealthCheck, ServiceHealth};
use axum::{extract::State, routing::get, Json, Router};
use bearmobile_common::ApiResponse;
use bearmobile_core::SupportCore;
use serde_json::json;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::debug;

static STARTED: OnceLock<Instant> = OnceLock::new();

fn uptime_secs() -> u64 {
    STARTED.get_or_init(Instant::now).elapsed().as_secs()
}

pub fn routes() -> Router<Arc<SupportCore>> {
    uptime_secs();
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/live", get(liveness_check))
}

async fn health_check(State(core): State<Arc<SupportCore>>) -> Json<ApiResponse<HealthCheck>> {
    debug!("Health check requested");

    let health = HealthCheck {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: uptime_secs(),
        services: ServiceHealth {
            cache_entries: core.cache.len().await,
            active_sessions: core.sessions.read().await.active_session_count().await,
            tools: core.orchestrator.tool_count(),
        },
    };

    create_success_response(health)
}

// Readiness: the agent has tools to call
async fn readiness_check(State(core): State<Arc<SupportCore>>) -> Json<serde_json::Value> {
    debug!("Readiness check requested");

    let tools_ready = core.orchestrator.tool_count() > 0;
    Json(json!({
        "status": if tools_ready { "ready" } else { "not_ready" },
        "timestamp": chrono::Utc::now(),
        "checks": {
            "tools": if tools_ready { "ready" } else { "not_ready" },
            "cache": "ready"
        }
    }))
}

/// Counters for the cache and session store, served at `/metrics`.
pub async fn metrics(State(core): State<Arc<SupportCore>>) -> Json<serde_json::Value> {
    Json(json!({
        "timestamp": chrono::Utc::now(),
        "uptime_seconds": uptime_secs(),
        "cache": {
            "entries": core.cache.len().await,
            "similarity_threshold": core.cache.config().similarity_threshold,
            "max_entries": core.cache.config().max_entries
        },
        "sessions": {
            "active_count": core.sessions.read().await.active_session_count().await
        },
        "tools": core.orchestrator.tool_count()
    }))
}

async fn liveness_check() -> Json<serde_json::Value> {
    debug!("Liveness check requested");

    Json(json!({
        "status": "alive",
        "timestamp": chrono::Utc::now(),
        "uptime_seconds": uptime_secs()
    }))
}
