//! HTTP surface for the sighting API.
//!
//! One handler is mounted at `/` and `/api`; everything past the extractors
//! lives in [`dispatch`].

pub mod dispatch;
pub mod envelope;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::{AccessGate, SESSION_COOKIE};
use crate::config::Config;
use crate::error::Result;
use crate::storage::{FlatFileStore, SightingStore};

pub use dispatch::{dispatch, Action, ApiRequest, Reply};
pub use envelope::{Envelope, Status};

/// Default request body limit.
const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared state handed to every request.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The sighting store.
    pub store: Arc<dyn SightingStore>,
    /// The access gate.
    pub gate: Arc<AccessGate>,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

impl AppState {
    /// Wrap a store and a gate.
    #[must_use]
    pub fn new(store: Arc<dyn SightingStore>, gate: AccessGate) -> Self {
        Self {
            store,
            gate: Arc::new(gate),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Build the state described by a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the data file's directory cannot be created.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = FlatFileStore::open(config.data_file())?;
        let mut state = Self::new(Arc::new(store), AccessGate::from_config(config));
        state.max_body_bytes = config.server.max_body_bytes;
        Ok(state)
    }
}

#[derive(Debug, Deserialize)]
struct ActionQuery {
    action: Option<String>,
}

/// Build the router.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let limit = state.max_body_bytes;
    Router::new()
        .route("/", any(api))
        .route("/api", any(api))
        .layer(DefaultBodyLimit::max(limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn api(
    State(state): State<AppState>,
    method: Method,
    query: Option<Query<ActionQuery>>,
    headers: HeaderMap,
    body: Bytes,
) -> Reply {
    let request = ApiRequest {
        action: query.and_then(|Query(query)| query.action),
        method,
        session: session_cookie(&headers),
        body: body.to_vec(),
    };
    dispatch(&state, request).await
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.envelope)).into_response();
        if let Some(cookie) = self.set_cookie {
            match HeaderValue::from_str(&cookie) {
                Ok(value) => {
                    response.headers_mut().insert(header::SET_COOKIE, value);
                }
                Err(e) => warn!("Dropping unencodable cookie: {e}"),
            }
        }
        response
    }
}

/// Pull the session token out of the `Cookie` header(s).
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

/// Serve on an already-bound listener until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn run<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Bind `addr` and serve until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("critterlog listening on {}", listener.local_addr()?);
    run(listener, state, shutdown_signal()).await?;
    info!("critterlog stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
