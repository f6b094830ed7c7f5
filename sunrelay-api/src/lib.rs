use axum::{
    Json, Router,
    body::Body,
    extract::{Request, State, rejection::JsonRejection},
    http::{Response, StatusCode, header},
    middleware::{self, Next},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::fmt::{self, Display};
use std::io;
use std::net::{AddrParseError, IpAddr, Ipv4Addr, SocketAddr};
use std::path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::watch::Receiver;
use tower_http::trace::TraceLayer;
use tracing::{
    Span, debug_span,
    field::{Empty, display},
    info, instrument,
};

mod error;

pub use error::ApiError;

use sunrelay_control as control;
use sunrelay_model as model;
use sunrelay_remote as remote;
use sunrelay_store as store;
use sunrelay_util as util;

use crate::control::{InvalidCommand, RelayController, RelayError};
use crate::model::ChannelId;
use crate::remote::Poller;
use crate::store::TelemetryStore;
use crate::util::json::deserialize_lenient_i64;
use crate::util::types::ApiKey;

pub enum Listener {
    Tcp(TcpListener),
    Unix(UnixListener),
}

impl Listener {
    /// Bind to the given local address
    pub async fn bind(address: &LocalAddress) -> io::Result<Self> {
        match address {
            LocalAddress::Tcp(socket_addr) => Ok(Listener::Tcp(TcpListener::bind(socket_addr).await?)),
            LocalAddress::Unix(path) => Ok(Listener::Unix(UnixListener::bind(path)?)),
        }
    }
}

/// Local API listen address
#[derive(Clone, Debug)]
pub enum LocalAddress {
    Tcp(SocketAddr),
    Unix(path::PathBuf),
}

impl Display for LocalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalAddress::Tcp(socket_addr) => socket_addr.fmt(f),
            LocalAddress::Unix(path) => path.as_path().display().fmt(f),
        }
    }
}

impl FromStr for LocalAddress {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<SocketAddr>()
            .map(LocalAddress::Tcp)
            .or_else(|_| Ok(LocalAddress::Unix(path::Path::new(s).to_path_buf())))
    }
}

impl Default for LocalAddress {
    fn default() -> Self {
        LocalAddress::Tcp(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            5000,
        ))
    }
}

/// Shared state of the request handlers
#[derive(Clone)]
pub struct ApiState {
    pub channel_id: ChannelId,
    pub store: Arc<TelemetryStore>,
    pub poller: Arc<Poller>,
    pub relay: RelayController,

    /// Bearer token required on `/api/iot` routes. Routes are open if not set
    pub access_token: Option<ApiKey>,
}

/// Start the API
///
/// Receives a listener already bound to the right address and serves
/// requests until `shutdown` turns true, then waits for in flight requests
/// to complete.
#[instrument(name = "api", skip_all, err)]
pub async fn start(
    listener: Listener,
    state: ApiState,
    mut shutdown: Receiver<bool>,
) -> io::Result<()> {
    let api_span = Span::current();

    let iot = Router::new()
        .route("/fetch-seed-data", get(fetch_seed_data))
        .route("/toggle-relay", post(toggle_relay))
        .route("/latest-data", get(latest_data))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    let app = Router::new()
        .route("/ping", get(|| async { "OK" }))
        .nest("/api/iot", iot);

    // Enable tracing
    let app = app.layer(
        TraceLayer::new_for_http()
            .make_span_with(move |request: &Request<Body>| {
                debug_span!(parent: &api_span, "request",
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                    status = Empty,
                )
            })
            .on_response(|response: &Response<Body>, _: Duration, span: &Span| {
                span.record("status", display(response.status()));
            }),
    );

    // Assign state
    let app = app.with_state(state);

    let shutdown = async move {
        // a dropped sender also means shutdown
        let _ = shutdown.wait_for(|stop| *stop).await;
        info!("shutting down");
    };

    info!("ready");

    match listener {
        Listener::Tcp(listener) => {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
        }
        Listener::Unix(listener) => {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
        }
    }
}

/// Check the `Authorization: Bearer <token>` header against the configured
/// access token
async fn require_bearer(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Result<Response<Body>, ApiError> {
    let Some(expected) = &state.access_token else {
        return Ok(next.run(request).await);
    };

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or_else(|| {
            ApiError::new(StatusCode::UNAUTHORIZED, "Access denied. No token provided.")
        })?;

    if !expected.matches(token) {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Invalid token."));
    }

    Ok(next.run(request).await)
}

/// Handle `GET /api/iot/fetch-seed-data`
///
/// Polls the provider right away and returns the resulting channel state
async fn fetch_seed_data(
    State(state): State<ApiState>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let channel = state.poller.poll_now().await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Data saved successfully",
            "data": channel,
        })),
    ))
}

#[derive(Deserialize, Debug)]
struct ToggleRequest {
    #[serde(default, deserialize_with = "deserialize_lenient_i64")]
    field: Option<i64>,

    #[serde(default, deserialize_with = "deserialize_lenient_i64")]
    value: Option<i64>,
}

/// Handle `POST /api/iot/toggle-relay`
///
/// Responds once the command has been written, has settled and was merged
/// into the store
async fn toggle_relay(
    State(state): State<ApiState>,
    body: Result<Json<ToggleRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) =
        body.map_err(|rejection| ApiError::new(StatusCode::BAD_REQUEST, rejection.body_text()))?;

    let (Some(field), Some(value)) = (request.field, request.value) else {
        return Err(RelayError::from(InvalidCommand::Missing).into());
    };

    let outcome = state.relay.toggle(field, value).await?;
    Ok(Json(json!({
        "message": format!("Relay flag updated successfully for {}", outcome.field),
        "field": outcome.field.to_string(),
        "value": outcome.value,
        "entryId": outcome.entry_id,
        "data": outcome.fields,
    })))
}

/// Handle `GET /api/iot/latest-data`
async fn latest_data(State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    let (channel, feed) = state.store.latest(state.channel_id)?;
    Ok(Json(json!({
        "message": "Latest data retrieved successfully",
        "channel": channel,
        "feed": feed,
    })))
}
