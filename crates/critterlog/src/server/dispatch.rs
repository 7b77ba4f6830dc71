//! Action routing for the sighting API.
//!
//! A request names its operation in the `action` query parameter. The
//! dispatcher resolves that name and the HTTP method to exactly one store or
//! gate operation, and turns whatever happens into an [`Envelope`].

use axum::http::{Method, StatusCode};
use serde_json::{Map, Value};
use tracing::{debug, error};

use super::envelope::{error_status, Envelope};
use super::AppState;
use crate::auth::SESSION_COOKIE;
use crate::error::{Error, ErrorKind, Result};
use crate::sighting::NewSighting;

/// The operations the API exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Exchange the shared password for a session.
    Login,
    /// Drop the session.
    Logout,
    /// List every sighting.
    GetSightings,
    /// Log a new sighting.
    AddSighting,
    /// Delete sightings by their `time` key.
    DeleteSighting,
    /// Delete every sighting.
    MassDeleteSightings,
}

impl Action {
    /// Resolve an action name from the query string.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "login" => Some(Self::Login),
            "logout" => Some(Self::Logout),
            "get_sightings" => Some(Self::GetSightings),
            "add_sighting" => Some(Self::AddSighting),
            "delete_sighting" => Some(Self::DeleteSighting),
            "mass_delete_sightings" => Some(Self::MassDeleteSightings),
            _ => None,
        }
    }

    /// Check whether this action may be invoked with `method`.
    #[must_use]
    pub fn accepts(self, method: &Method) -> bool {
        match self {
            Self::Logout => true,
            Self::GetSightings => method == Method::GET,
            Self::Login | Self::AddSighting | Self::DeleteSighting | Self::MassDeleteSightings => {
                method == Method::POST
            }
        }
    }

    /// Check whether this action needs an authenticated caller.
    #[must_use]
    pub fn is_protected(self) -> bool {
        !matches!(self, Self::Login | Self::Logout)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::GetSightings => "get_sightings",
            Self::AddSighting => "add_sighting",
            Self::DeleteSighting => "delete_sighting",
            Self::MassDeleteSightings => "mass_delete_sightings",
        };
        f.write_str(name)
    }
}

/// Everything the dispatcher needs from an HTTP request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Raw `action` query parameter.
    pub action: Option<String>,
    /// HTTP method.
    pub method: Method,
    /// Session token from the cookie, if any.
    pub session: Option<String>,
    /// Raw request body.
    pub body: Vec<u8>,
}

/// What to send back: an envelope, its status code and maybe a cookie.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response body.
    pub envelope: Envelope,
    /// `Set-Cookie` header value, for login and logout.
    pub set_cookie: Option<String>,
}

impl Reply {
    fn ok(envelope: Envelope) -> Self {
        Self {
            status: StatusCode::OK,
            envelope,
            set_cookie: None,
        }
    }

    fn error(err: &Error) -> Self {
        let kind = err.kind();
        if kind == ErrorKind::IoFailure {
            error!("{err}");
        } else {
            debug!("Request rejected ({kind}): {err}");
        }
        Self {
            status: error_status(kind),
            envelope: Envelope::from_error(err),
            set_cookie: None,
        }
    }

    fn with_cookie(mut self, cookie: String) -> Self {
        self.set_cookie = Some(cookie);
        self
    }
}

/// Route one request to its operation.
pub async fn dispatch(state: &AppState, request: ApiRequest) -> Reply {
    let Some(action_name) = request.action.as_deref() else {
        return Reply::error(&Error::InvalidRequest);
    };
    let action = Action::parse(action_name);
    let body = parse_body(&request.body);

    match action {
        Some(Action::Login) if request.method == Method::POST => return login(state, &body),
        Some(Action::Logout) => return logout(),
        _ => {}
    }

    let ctx = state.gate.context(request.session.as_deref());
    if let Err(err) = state.gate.authorize(ctx) {
        return Reply::error(&err);
    }

    let result = match action {
        Some(action) if action.is_protected() && action.accepts(&request.method) => {
            run(state, action, body).await
        }
        _ => Err(Error::InvalidRequest),
    };

    match result {
        Ok(envelope) => Reply::ok(envelope),
        Err(err) => Reply::error(&err),
    }
}

fn login(state: &AppState, body: &Map<String, Value>) -> Reply {
    let password = body.get("password").and_then(Value::as_str).unwrap_or("");
    match state.gate.login(password) {
        Ok(token) => {
            let cookie = format!(
                "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
                state.gate.session_ttl().as_secs()
            );
            Reply::ok(Envelope::success("Login successful.")).with_cookie(cookie)
        }
        Err(err) => Reply::error(&err),
    }
}

fn logout() -> Reply {
    let cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    Reply::ok(Envelope::success("Logged out.")).with_cookie(cookie)
}

async fn run(state: &AppState, action: Action, body: Map<String, Value>) -> Result<Envelope> {
    let store = state.store.clone();

    match action {
        Action::GetSightings => {
            let sightings = blocking(move || store.list()).await?;
            Ok(Envelope::with_data(serde_json::to_value(sightings)?))
        }
        Action::AddSighting => {
            let candidate: NewSighting = serde_json::from_value(Value::Object(body))?;
            blocking(move || store.append(candidate)).await?;
            Ok(Envelope::success("Sighting added."))
        }
        Action::DeleteSighting => {
            let key = match body.get("time") {
                Some(Value::String(key)) if !key.is_empty() => key.clone(),
                _ => return Err(Error::validation("Missing sighting time.")),
            };
            blocking(move || store.delete_by_key(&key)).await?;
            Ok(Envelope::success("Sighting deleted."))
        }
        Action::MassDeleteSightings => {
            state
                .gate
                .confirm_mass_delete(body.get("password").and_then(Value::as_str))?;
            blocking(move || store.clear_all()).await?;
            Ok(Envelope::success("All sightings deleted."))
        }
        Action::Login | Action::Logout => Err(Error::InvalidRequest),
    }
}

/// Run a store operation on the blocking pool.
async fn blocking<T, F>(op: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| Error::internal(format!("store task failed: {e}")))?
}

/// Parse a JSON object body. Anything else reads as an empty object, so the
/// action reports its required fields as missing.
fn parse_body(body: &[u8]) -> Map<String, Value> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}
