//! Moderator control surface and spectator feeds.
//!
//! - `GET /ctr?act=...`: moderator commands, answered with `0` (applied)
//!   or `1` (rejected); `act=get_name` answers `{"stat":0,"data":[...]}`
//! - `GET /msg`: WebSocket live-result feed
//! - `GET /config`: WebSocket configuration feed
//!
//! Each feed socket gets the current snapshot first, then every push.
//! Every response allows any origin; the moderator and spectator pages are
//! served from elsewhere.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use buzzer_core::{ControlCommand, Environment};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::{hub::Feed, state::SharedState};

/// Body for an applied command.
const APPLIED: &str = "0";
/// Body for a rejected or malformed command.
const REJECTED: &str = "1";

/// Build the control router.
pub fn create_router<E: Environment>(state: Arc<SharedState<E>>) -> Router {
    Router::new()
        .route("/ctr", get(control_handler::<E>))
        .route("/msg", get(live_feed_handler::<E>))
        .route("/config", get(config_feed_handler::<E>))
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

/// Query string of `/ctr`.
#[derive(Debug, Default, Deserialize)]
pub struct ControlQuery {
    /// Action name
    pub act: Option<String>,
    /// Numeric value for the `modt`, `modt2` and `modgap` actions
    pub val: Option<String>,
    /// Participant id for `name`
    pub id: Option<String>,
    /// Participant name for `name`
    pub name: Option<String>,
}

/// A parsed `/ctr` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    /// Forward to the controller
    Command(ControlCommand),
    /// Read the participant names
    GetNames,
}

/// Reply body of `act=get_name`.
#[derive(Debug, Serialize)]
struct NamesReply {
    stat: u8,
    data: Vec<Option<String>>,
}

/// Parse a decimal parameter. Signs, spaces and empty strings are rejected.
fn parse_number<T: std::str::FromStr>(value: Option<&str>) -> Option<T> {
    let value = value?;
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

impl ControlRequest {
    /// Map a query string to a request. `None` if it is unknown or malformed.
    pub fn parse(query: &ControlQuery) -> Option<Self> {
        let val = query.val.as_deref();
        let command = match query.act.as_deref()? {
            "start" => ControlCommand::Start,
            "reset" => ControlCommand::Reset,
            "pause" => ControlCommand::Pause,
            "continue" | "resume" => ControlCommand::Resume,
            "modt" => ControlCommand::SetCountdownMs(parse_number(val)?),
            "modt2" => ControlCommand::SetOpenMs(parse_number(val)?),
            "modgap" => ControlCommand::SetClockToleranceMs(parse_number(val)?),
            "name" => ControlCommand::SetName {
                id: parse_number(query.id.as_deref())?,
                name: query.name.clone()?,
            },
            "get_name" => return Some(Self::GetNames),
            _ => return None,
        };
        Some(Self::Command(command))
    }
}

/// Handler for `GET /ctr`.
async fn control_handler<E: Environment>(
    State(state): State<Arc<SharedState<E>>>,
    Query(query): Query<ControlQuery>,
) -> Response {
    let Some(request) = ControlRequest::parse(&query) else {
        tracing::warn!(act = ?query.act, val = ?query.val, "Malformed control request");
        return REJECTED.into_response();
    };

    match request {
        ControlRequest::GetNames => {
            Json(NamesReply { stat: 0, data: state.names().await }).into_response()
        },
        ControlRequest::Command(command) => match state.apply(command).await {
            Ok(()) => APPLIED.into_response(),
            Err(_) => REJECTED.into_response(),
        },
    }
}

/// Handler for `GET /msg`.
async fn live_feed_handler<E: Environment>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<SharedState<E>>>,
) -> Response {
    ws.on_upgrade(move |socket| run_feed(socket, state, Feed::Live))
}

/// Handler for `GET /config`.
async fn config_feed_handler<E: Environment>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<SharedState<E>>>,
) -> Response {
    ws.on_upgrade(move |socket| run_feed(socket, state, Feed::Config))
}

/// Forward one feed to a spectator socket until either side goes away.
async fn run_feed<E: Environment>(mut socket: WebSocket, state: Arc<SharedState<E>>, feed: Feed) {
    let (initial, mut subscription) = match state.subscribe(feed).await {
        Ok(subscribed) => subscribed,
        Err(error) => {
            tracing::error!(feed = feed.as_str(), %error, "Failed to subscribe");
            return;
        },
    };
    let pool = state.hub().pool(feed);
    tracing::info!(feed = feed.as_str(), subscriber = subscription.id, "Spectator connected");

    if socket.send(Message::Text(initial.to_string().into())).await.is_ok() {
        loop {
            tokio::select! {
                pushed = subscription.receiver.recv() => {
                    let Some(text) = pushed else { break };
                    if socket.send(Message::Text(text.to_string().into())).await.is_err() {
                        break;
                    }
                },
                incoming = socket.recv() => match incoming {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {},
                },
            }
        }
    }

    pool.unsubscribe(subscription.id);
    tracing::info!(feed = feed.as_str(), subscriber = subscription.id, "Spectator disconnected");
}
