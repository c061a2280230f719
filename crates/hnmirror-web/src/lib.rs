//! JSON read API and sync lifecycle endpoints.
//!
//! Pure passthrough over the store plus start/stop/status for the engine;
//! nothing here triggers sync work on its own.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use hnmirror_core::Category;
use hnmirror_storage::ItemStore;
use hnmirror_sync::SyncEngine;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

pub const CRATE_NAME: &str = "hnmirror-web";

const DEFAULT_LIST_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ItemStore>,
    pub engine: Arc<SyncEngine>,
}

#[derive(Debug, Deserialize, Default)]
struct ListQuery {
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
struct SyncStatus {
    running: bool,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/item/{id}", get(item_handler))
        .route("/stories/{category}", get(stories_handler))
        .route("/sync/start", post(sync_start_handler))
        .route("/sync/stop", post(sync_stop_handler))
        .route("/sync/status", get(sync_status_handler))
        .with_state(Arc::new(state))
}

/// Binds the listener and serves until ctrl-c, then stops the engine.
pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let engine = Arc::clone(&state.engine);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    engine.stop().await?;
    Ok(())
}

async fn index_handler() -> Response {
    Json(serde_json::json!({
        "name": "hnmirror",
        "description": "Hacker News mirror",
        "version": env!("CARGO_PKG_VERSION"),
    }))
    .into_response()
}

async fn item_handler(State(state): State<Arc<AppState>>, Path(id): Path<u64>) -> Response {
    match state.store.get(id).await {
        Ok(Some(item)) => Json(item).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("no stored item with id {id}"),
        ),
        Err(err) => server_error(err),
    }
}

async fn stories_handler(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
    Query(query): Query<ListQuery>,
) -> Response {
    let category: Category = match category.parse() {
        Ok(category) => category,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, err.to_string()),
    };

    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 500);
    match state.store.list_category(category, limit).await {
        Ok(items) => Json(items).into_response(),
        Err(err) => server_error(err),
    }
}

async fn sync_start_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.engine.start().await {
        Ok(()) => sync_status(&state),
        Err(err) => server_error(err),
    }
}

async fn sync_stop_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.engine.stop().await {
        Ok(()) => sync_status(&state),
        Err(err) => server_error(err),
    }
}

async fn sync_status_handler(State(state): State<Arc<AppState>>) -> Response {
    sync_status(&state)
}

fn sync_status(state: &AppState) -> Response {
    Json(SyncStatus {
        running: state.engine.is_running(),
    })
    .into_response()
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn server_error(err: impl std::fmt::Display) -> Response {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use hnmirror_core::Item;
    use hnmirror_storage::MemoryItemStore;
    use hnmirror_sync::{FeedClient, FeedClientConfig};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn test_state() -> AppState {
        let store = Arc::new(MemoryItemStore::new());
        for (id, category) in [(10u64, Category::Top), (20, Category::Top), (30, Category::Best)]
        {
            let mut item = Item::new(id).with_flag(category);
            item.title = Some(format!("story {id}"));
            store.upsert(item).await.unwrap();
        }

        let feed = FeedClient::new(FeedClientConfig {
            base_url: "http://127.0.0.1:1/v0".to_string(),
            ..FeedClientConfig::default()
        })
        .unwrap();
        let store: Arc<dyn ItemStore> = store;
        let engine = Arc::new(SyncEngine::new(
            Arc::new(feed),
            Arc::clone(&store),
            Duration::from_secs(3600),
        ));
        AppState { store, engine }
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn index_reports_service_info() {
        let app = app(test_state().await);
        let (status, body) = get_json(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "hnmirror");
    }

    #[tokio::test]
    async fn item_lookup_finds_stored_item() {
        let app = app(test_state().await);
        let (status, body) = get_json(app, "/item/10").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 10);
        assert_eq!(body["isTop"], true);
    }

    #[tokio::test]
    async fn missing_item_is_404_with_error_body() {
        let app = app(test_state().await);
        let (status, body) = get_json(app, "/item/404404").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("404404"));
    }

    #[tokio::test]
    async fn category_listing_is_newest_first() {
        let app = app(test_state().await);
        let (status, body) = get_json(app, "/stories/top").await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<u64> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![20, 10]);
    }

    #[tokio::test]
    async fn category_listing_honors_limit() {
        let app = app(test_state().await);
        let (status, body) = get_json(app, "/stories/top?limit=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_category_is_rejected_not_coerced() {
        let app = app(test_state().await);
        let (status, body) = get_json(app, "/stories/front").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("front"));
    }

    #[tokio::test]
    async fn sync_status_starts_idle() {
        let app = app(test_state().await);
        let (status, body) = get_json(app, "/sync/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["running"], false);
    }
}
