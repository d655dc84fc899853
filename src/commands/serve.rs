use std::net::SocketAddr;

use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::error::ApiError;
use crate::paste::PasteStore;
use crate::types::api::{CreatePaste, PasteView};
use crate::App;

pub async fn run(app: App) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], app.config.port));

    let router = Router::new()
        .route("/pastes", post(create_paste).get(read_paste_by_query))
        .route("/p/:id", get(read_paste))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(app.config.max_body_size))
        .layer(TraceLayer::new_for_http())
        .route_layer(NormalizePathLayer::trim_trailing_slash())
        .with_state(app);

    info!("listening on {addr}");

    axum::Server::bind(&addr)
        .serve(router.into_make_service())
        .await?;

    Ok(())
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

async fn create_paste(
    State(mut pastes): State<PasteStore>,
    Json(body): Json<CreatePaste>,
) -> crate::ApiResult<impl IntoResponse> {
    let created = pastes
        .create(
            body.content.as_deref().unwrap_or(""),
            body.ttl_seconds,
            body.max_views,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Deserialize)]
struct ReadParams {
    id: Option<String>,
}

async fn read_paste_by_query(
    State(config): State<Config>,
    State(mut pastes): State<PasteStore>,
    Query(params): Query<ReadParams>,
    headers: HeaderMap,
) -> crate::ApiResult<Json<PasteView>> {
    let id = params
        .id
        .ok_or_else(|| ApiError::InvalidArgument("id required".to_string()))?;
    read_inner(&config, &mut pastes, &id, &headers).await
}

async fn read_paste(
    State(config): State<Config>,
    State(mut pastes): State<PasteStore>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> crate::ApiResult<Json<PasteView>> {
    read_inner(&config, &mut pastes, &id, &headers).await
}

async fn read_inner(
    config: &Config,
    pastes: &mut PasteStore,
    id: &str,
    headers: &HeaderMap,
) -> crate::ApiResult<Json<PasteView>> {
    let view = match test_now(config, headers) {
        Some(now) => pastes.read_at(id, now).await?,
        None => pastes.read(id).await?,
    };
    Ok(Json(view))
}

/// Override for "current time" in epoch milliseconds, honored only when test
/// mode is configured. Unparseable values fall back to the wall clock.
fn test_now(config: &Config, headers: &HeaderMap) -> Option<DateTime<Utc>> {
    if !config.test_mode {
        return None;
    }
    headers
        .get("x-test-now-ms")?
        .to_str()
        .ok()?
        .parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}
