use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use idsfeed_schema::ConnectionEvent;

use crate::metrics::encode_metrics;
use crate::publisher::FeedPublisher;
use crate::state::ConnectionState;
use crate::stats::{FeedStats, StatsSnapshot};

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub feed: String,
    pub state: ConnectionState,
    pub connected: bool,
    pub buffered: usize,
    pub stats: StatsSnapshot,
}

/// Live window, newest first
#[derive(Serialize)]
pub struct EventsResponse {
    pub state: ConnectionState,
    pub count: usize,
    pub events: Vec<ConnectionEvent>,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

/// Shared state for health endpoints
#[derive(Clone)]
pub struct ServerState {
    pub feed_name: String,
    pub publisher: Arc<FeedPublisher>,
    pub stats: Arc<FeedStats>,
}

impl ServerState {
    pub fn new(
        feed_name: impl Into<String>,
        publisher: Arc<FeedPublisher>,
        stats: Arc<FeedStats>,
    ) -> Self {
        Self {
            feed_name: feed_name.into(),
            publisher,
            stats,
        }
    }

    fn health_response(&self, status: &str) -> HealthResponse {
        let update = self.publisher.current();
        HealthResponse {
            status: status.to_string(),
            feed: self.feed_name.clone(),
            connected: update.state.is_connected(),
            state: update.state,
            buffered: update.events.len(),
            stats: self.stats.snapshot(),
        }
    }
}

/// Health endpoint - always returns 200 if server is running
async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(state.health_response("ok"))
}

/// Ready endpoint - returns 200 only when connected to the classifier
async fn ready(State(state): State<ServerState>) -> (StatusCode, Json<HealthResponse>) {
    if state.publisher.state().is_connected() {
        (StatusCode::OK, Json(state.health_response("ready")))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(state.health_response("not_ready")),
        )
    }
}

/// Prometheus text exposition
async fn metrics() -> impl IntoResponse {
    match encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain")],
            e.to_string(),
        ),
    }
}

/// Current live window, newest first
async fn events(
    State(state): State<ServerState>,
    Query(query): Query<EventsQuery>,
) -> Json<EventsResponse> {
    let update = state.publisher.current();
    let limit = query.limit.unwrap_or(usize::MAX);
    let events: Vec<ConnectionEvent> = update.newest_first().take(limit).cloned().collect();
    Json(EventsResponse {
        state: update.state,
        count: events.len(),
        events,
    })
}

/// Create the health server router
pub fn create_router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        .route("/events", get(events))
        .with_state(state)
}

/// Run the health server
pub async fn run_server(addr: SocketAddr, state: ServerState) -> std::io::Result<()> {
    let app = create_router(state);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
