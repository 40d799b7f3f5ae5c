//! HTTP route handlers.

use std::future::Future;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use futures::channel::{mpsc, oneshot};
use futures::stream::{self, StreamExt};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::planner::{CancelHandle, SearchControl, SearchError, SearchEvent};

use super::dto::*;
use super::state::AppState;

/// Content type of streamed search responses.
const NDJSON: &str = "application/x-ndjson";

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/search/one-way", post(search_one_way))
        .route("/search/return", post(search_return))
        .route("/cache/searches", get(cached_searches))
        .route("/cache/searches/:key", delete(mark_refresh))
        .route("/cache", delete(clear_cache))
        .route("/routes/refresh", post(refresh_routes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Search one way, streaming events as they happen.
async fn search_one_way(
    State(state): State<AppState>,
    Json(body): Json<OneWaySearchRequest>,
) -> Result<Response, AppError> {
    let request = body
        .to_request()
        .map_err(|message| AppError::BadRequest { message })?;

    let planner = state.planner.clone();
    stream_search(move |mut control| async move {
        planner
            .search_one_way(&request, &mut control)
            .await
            .map(|_| ())
    })
    .await
}

/// Search the way back for an outbound itinerary.
async fn search_return(
    State(state): State<AppState>,
    Json(body): Json<ReturnSearchRequest>,
) -> Result<Response, AppError> {
    let request = body
        .to_request()
        .map_err(|message| AppError::BadRequest { message })?;
    let force_refresh = body.force_refresh;

    let planner = state.planner.clone();
    stream_search(move |mut control| async move {
        control.set_force_refresh(force_refresh);
        planner
            .search_return(&request, &mut control)
            .await
            .map(|_| ())
    })
    .await
}

/// List cached searches.
async fn cached_searches(State(state): State<AppState>) -> Json<CachedSearchesResponse> {
    Json(CachedSearchesResponse {
        searches: state.planner.cached_searches(),
    })
}

/// Mark a cached search for refresh.
async fn mark_refresh(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.planner.mark_refresh(&key)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound {
            message: format!("No cached search {key}"),
        })
    }
}

/// Drop every cached entry.
async fn clear_cache(State(state): State<AppState>) -> Result<Json<ClearCacheResponse>, AppError> {
    let removed = state.planner.clear_cache()?;
    Ok(Json(ClearCacheResponse { removed }))
}

/// Drop the cached route map.
async fn refresh_routes(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.planner.refresh_routes()?;
    Ok(StatusCode::NO_CONTENT)
}

/// Cancels the search when the response body is dropped, which is how a
/// client disconnect shows up.
struct CancelOnDrop(CancelHandle);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Run a search in the background and stream its events as NDJSON.
///
/// A search that fails before emitting anything is answered with an error
/// status instead of a stream. Later failures end the stream with a
/// `failed` event.
async fn stream_search<F, Fut>(search: F) -> Result<Response, AppError>
where
    F: FnOnce(SearchControl) -> Fut,
    Fut: Future<Output = Result<(), SearchError>> + Send + 'static,
{
    let (events_tx, mut events) = mpsc::unbounded::<SearchEvent>();
    let (done_tx, done) = oneshot::channel::<Result<(), SearchError>>();

    let cancel = CancelHandle::new();
    let guard = CancelOnDrop(cancel.clone());
    let task = search(SearchControl::new(Arc::new(events_tx)).with_cancel(cancel));
    tokio::spawn(async move {
        let result = task.await;
        let _ = done_tx.send(result);
    });

    let Some(first) = events.next().await else {
        return match done.await {
            Ok(Err(e)) => Err(AppError::from(e)),
            _ => Err(AppError::Internal {
                message: "search ended without reporting".to_string(),
            }),
        };
    };

    let failure = stream::once(done).filter_map(|result| async move {
        match result {
            Ok(Err(e)) => {
                warn!(error = %e, "Search failed mid-stream");
                Some(SearchEvent::Failed {
                    error: e.to_string(),
                })
            }
            _ => None,
        }
    });
    let events = stream::once(async move { first })
        .chain(events)
        .chain(failure)
        .boxed();

    let lines = stream::unfold((events, guard), |(mut events, guard)| async move {
        let event = events.next().await?;
        Some((encode_line(&event), (events, guard)))
    });

    Ok(([(header::CONTENT_TYPE, NDJSON)], Body::from_stream(lines)).into_response())
}

fn encode_line(event: &SearchEvent) -> Result<Bytes, serde_json::Error> {
    let mut line = serde_json::to_vec(event)?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    Conflict { message: String },
    TooManyRequests { message: String },
    BadGateway { message: String },
    Internal { message: String },
}

impl From<SearchError> for AppError {
    fn from(e: SearchError) -> Self {
        let message = e.to_string();
        match e {
            SearchError::InvalidRequest(_) | SearchError::NoDirectRoute { .. } => {
                AppError::BadRequest { message }
            }
            SearchError::NoRouteData(_) => AppError::NotFound { message },
            SearchError::SessionUnavailable(_) => AppError::Conflict { message },
            SearchError::RateLimited => AppError::TooManyRequests { message },
            SearchError::Availability { .. } | SearchError::RouteFetch(_) => {
                AppError::BadGateway { message }
            }
            SearchError::Cache(_) => AppError::Internal { message },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
            AppError::Conflict { message } => (StatusCode::CONFLICT, message),
            AppError::TooManyRequests { message } => (StatusCode::TOO_MANY_REQUESTS, message),
            AppError::BadGateway { message } => (StatusCode::BAD_GATEWAY, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        if status.is_server_error() {
            error!(%status, %message, "Request failed");
        } else {
            warn!(%status, %message, "Request rejected");
        }

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
