use std::sync::Arc;

use serde::Deserialize;
use shuttle_axum::axum::{
    extract::{Query, State},
    response::Html,
    routing::get,
    Json, Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::render::{self, GroupView, DEFAULT_UPCOMING_LIMIT};
use crate::store::{EventStore, Snapshot};

pub const SNAPSHOT_GENERATION_HEADER: &str = "x-snapshot-generation";
pub const DEFAULT_ASSETS_DIR: &str = "assets";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<EventStore>,
}

impl AppState {
    pub fn new(store: Arc<EventStore>) -> Self {
        Self { store }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(|| async { "OK" }))
        .route("/api/events", get(all_events))
        .route("/api/upcoming", get(upcoming))
        .nest_service("/assets", ServeDir::new(DEFAULT_ASSETS_DIR))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// Snapshot plus its generation, read under one lock.
fn current(state: &AppState) -> (Arc<Snapshot>, [(&'static str, String); 1]) {
    let (snap, generation) = state.store.read_with_generation();
    (
        snap.unwrap_or_default(),
        [(SNAPSHOT_GENERATION_HEADER, generation.to_string())],
    )
}

async fn index(State(state): State<AppState>) -> ([(&'static str, String); 1], Html<String>) {
    let (snap, headers) = current(&state);
    (headers, Html(render::render_index(&snap)))
}

async fn all_events(State(state): State<AppState>) -> ([(&'static str, String); 1], Json<Snapshot>) {
    let (snap, headers) = current(&state);
    (headers, Json(Snapshot::clone(&snap)))
}

#[derive(Deserialize)]
struct UpcomingQuery {
    #[serde(default)]
    limit: Option<usize>,
}

async fn upcoming(
    State(state): State<AppState>,
    Query(q): Query<UpcomingQuery>,
) -> ([(&'static str, String); 1], Json<Vec<GroupView>>) {
    let (snap, headers) = current(&state);
    let limit = q.limit.unwrap_or(DEFAULT_UPCOMING_LIMIT);
    (headers, Json(render::upcoming(&snap, limit)))
}
