use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::event::Event;
use crate::reconcile::EventStore;
use crate::regions::{Region, Regions};

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn EventStore>,
    regions: Regions,
}

impl AppState {
    pub fn new(store: Arc<dyn EventStore>, regions: Regions) -> Self {
        Self { store, regions }
    }
}

/// Read-only routes over the reconciled store.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/regions", get(list_regions))
        .route("/events", get(list_events))
        .route("/events/{id}", get(get_event))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

struct ApiError(anyhow::Error);

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %format!("{:#}", self.0), "store read failed");
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", self.0)).into_response()
    }
}

async fn list_regions(State(state): State<AppState>) -> Json<Vec<Region>> {
    Json(state.regions.all().copied().collect())
}

#[derive(Debug, Default, serde::Deserialize)]
struct EventsQuery {
    #[serde(default)]
    region: Option<String>,
}

/// Latest revision of every stored event, newest publish time first.
async fn list_events(
    State(state): State<AppState>,
    Query(q): Query<EventsQuery>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let mut events = state.store.list_unique_events(&[]).await?;
    if let Some(region) = q.region.as_deref() {
        events.retain(|e| e.region == region);
    }
    events.sort_by(|a, b| {
        b.publish_time
            .cmp(&a.publish_time)
            .then_with(|| a.id.cmp(&b.id))
    });
    Ok(Json(events))
}

async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let found = state.store.list_unique_events(&[id]).await?;
    Ok(match found.into_iter().find(|e| e.id == id) {
        Some(evt) => Json(evt).into_response(),
        None => (StatusCode::NOT_FOUND, "event not found").into_response(),
    })
}
