//! HTTP API: a thin router over the store and the processor.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info};
use url::Url;

use crate::app::{AppContext, FreshetError, Result};
use crate::domain::{Feed, SearchHit};
use crate::processor;
use crate::store::Store;

pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", get(landing_handler))
        .route(
            "/feeds",
            get(list_feeds_handler)
                .post(subscribe_handler)
                .delete(unsubscribe_handler),
        )
        .route("/items", get(search_items_handler))
        .with_state(ctx)
}

/// Bind the listener and serve until the process exits.
pub async fn serve(ctx: Arc<AppContext>) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], ctx.config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("listening on http://{addr}");

    axum::serve(listener, router(ctx)).await?;
    Ok(())
}

async fn landing_handler() -> Html<&'static str> {
    Html(include_str!("../../static/index.html"))
}

async fn list_feeds_handler(
    State(ctx): State<Arc<AppContext>>,
) -> std::result::Result<Json<Vec<Feed>>, ApiError> {
    Ok(Json(ctx.store.list_feeds()?))
}

#[derive(Deserialize)]
struct FeedParams {
    url: String,
}

#[derive(Serialize)]
struct SubscribeResponse {
    feed: Feed,
    items_inserted: usize,
}

async fn subscribe_handler(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<FeedParams>,
) -> std::result::Result<Json<SubscribeResponse>, ApiError> {
    let url = params.url.trim();
    Url::parse(url).map_err(|_| ApiError::bad_request(format!("invalid url: {url}")))?;

    match processor::process_feed(&ctx, url, Some(url)).await? {
        Some(outcome) => {
            let feed = ctx
                .store
                .get_feed(&outcome.feed_url)?
                .ok_or_else(|| ApiError::internal("feed row missing after processing"))?;
            Ok(Json(SubscribeResponse {
                feed,
                items_inserted: outcome.inserted,
            }))
        }
        None => Err(ApiError::bad_request(format!(
            "could not fetch or parse feed: {url}"
        ))),
    }
}

async fn unsubscribe_handler(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<FeedParams>,
) -> std::result::Result<StatusCode, ApiError> {
    let url = params.url.trim();
    if ctx.store.delete_feed(url)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("no such feed: {url}")))
    }
}

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn search_items_handler(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<SearchParams>,
) -> std::result::Result<Json<Vec<SearchHit>>, ApiError> {
    let (limit, offset) = page_bounds(params.limit, params.offset);
    let query = params.q.unwrap_or_default();
    let query = query.trim();

    let hits = if query.is_empty() {
        ctx.store.recent_items(limit, offset)?
    } else {
        ctx.store.search_items(query, limit, offset)?
    };
    Ok(Json(hits))
}

fn page_bounds(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (limit.unwrap_or(20).clamp(1, 100), offset.unwrap_or(0).max(0))
}

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<FreshetError> for ApiError {
    fn from(e: FreshetError) -> Self {
        error!(error = %e, "request failed");
        Self::internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
