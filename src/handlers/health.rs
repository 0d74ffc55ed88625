// src/handlers/health.rs

use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use chrono::Utc;
use serde_json::json;

use crate::{db::Database, services::explainer::Explainer};

/// Liveness plus a live database check.
pub async fn health(
    State(db): State<Database>,
    State(explainer): State<Arc<dyn Explainer>>,
) -> impl IntoResponse {
    let database = if db.ping().await { "ok" } else { "unavailable" };
    let explainer = if explainer.is_configured() {
        "configured"
    } else {
        "not configured"
    };

    Json(json!({
        "status": "ok",
        "timestamp": Utc::now(),
        "services": {
            "explainer": explainer,
            "database": database,
        }
    }))
}
