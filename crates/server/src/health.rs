use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use deplo_queue::{ListenerSnapshot, ListenerStatus};
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    listener: Arc<ListenerStatus>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub listener: HealthCheck,
    pub deliveries: ListenerSnapshot,
    pub checked_at: String,
}

pub fn router(listener: Arc<ListenerStatus>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { listener })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    listener_status: Arc<ListenerStatus>,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(listener_status)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let snapshot = state.listener.snapshot();
    let listener = if snapshot.connected {
        HealthCheck { status: "ready", detail: "queue consumer connected".to_string() }
    } else {
        HealthCheck { status: "degraded", detail: "queue consumer disconnected".to_string() }
    };
    let ready = snapshot.connected;

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "deplo-server runtime initialized".to_string(),
        },
        listener,
        deliveries: snapshot,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}
