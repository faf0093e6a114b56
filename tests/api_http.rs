// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /regions
// - GET /events (latest revision, newest first, region filter)
// - GET /events/{id} (hit, miss, malformed id)

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use police_feed::api::{self, AppState};
use police_feed::event::Event;
use police_feed::reconcile::EventCreator;
use police_feed::regions::Regions;
use police_feed::store::MemoryEventStore;

const BODY_LIMIT: usize = 1024 * 1024;

fn ev(slug: &str, title: &str, region: &str, minutes: i64, revision: u32) -> Event {
    let at = Utc.with_ymd_and_hms(2023, 2, 15, 12, 0, 0).unwrap() + Duration::minutes(minutes);
    let mut e = Event::new(
        format!("https://polisen.se/aktuellt/handelser/{slug}/"),
        title,
        "",
        region,
        at,
        at,
    );
    e.revision = revision;
    e
}

async fn test_router(events: &[Event]) -> Router {
    let store = Arc::new(MemoryEventStore::new());
    store.create_events(events).await.unwrap();
    api::router(AppState::new(store, Regions::default()))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

#[tokio::test]
async fn health_returns_ok() {
    let (status, body) = get(test_router(&[]).await, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");
}

#[tokio::test]
async fn regions_lists_all_with_names() {
    let (status, body) = get(test_router(&[]).await, "/regions").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    let arr = v.as_array().expect("array");
    assert_eq!(arr.len(), 21);
    assert!(arr
        .iter()
        .any(|r| r["id"] == "jonkoping" && r["name"] == "Jönköping"));
}

#[tokio::test]
async fn events_are_latest_and_newest_first() {
    let app = test_router(&[
        ev("a", "a-old", "skane", 0, 1),
        ev("a", "a-new", "skane", 0, 2),
        ev("b", "b", "halland", 30, 1),
    ])
    .await;

    let (status, body) = get(app, "/events").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    let titles: Vec<&str> = v
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["b", "a-new"]);
    assert_eq!(v[1]["revision"], 2);
    assert_eq!(v[1]["content_hash"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn events_can_be_filtered_by_region() {
    let app = test_router(&[ev("a", "a", "skane", 0, 1), ev("b", "b", "halland", 0, 1)]).await;
    let (_, body) = get(app, "/events?region=halland").await;
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v.as_array().unwrap().len(), 1);
    assert_eq!(v[0]["region"], "halland");
}

#[tokio::test]
async fn single_event_hit_and_miss() {
    let a = ev("a", "a", "skane", 0, 1);
    let app = test_router(&[a.clone()]).await;

    let (status, body) = get(app.clone(), &format!("/events/{}", a.id)).await;
    assert_eq!(status, StatusCode::OK);
    let got: Event = serde_json::from_slice(&body).unwrap();
    assert_eq!(got, a);

    let (status, _) = get(app.clone(), &format!("/events/{}", uuid::Uuid::nil())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(app, "/events/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
