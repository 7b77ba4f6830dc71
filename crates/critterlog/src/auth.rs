//! Access gate for the sighting API.
//!
//! Callers are either [`AuthContext::Anonymous`] or
//! [`AuthContext::Authenticated`]. A successful [`AccessGate::login`] issues a
//! session token which the HTTP layer stores in a cookie; each request turns
//! that cookie back into an `AuthContext` and hands it to the protected
//! operations explicitly.
//!
//! ## Token Format
//!
//! `<issued_at>.<mac>` where `issued_at` is Unix seconds and `mac` is the hex
//! BLAKE3 keyed hash of the decimal `issued_at`. Tokens are stateless: the
//! server keeps no session table, and logging out clears the cookie.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "critterlog_session";

/// Context string for deriving the MAC key from a configured secret.
const KEY_CONTEXT: &str = "critterlog 2024-05 session cookie v1";

/// Whether the current caller has logged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthContext {
    /// No valid session.
    #[default]
    Anonymous,
    /// A valid session, or authentication is disabled.
    Authenticated,
}

impl AuthContext {
    /// Check whether the caller is authenticated.
    #[must_use]
    pub fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

/// A signed session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// The token text, as stored in the cookie.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Password checks and session signing.
#[derive(Clone)]
pub struct AccessGate {
    /// Shared login password; `None` disables authentication entirely.
    password: Option<String>,
    /// Extra confirmation secret for clearing the store.
    mass_delete_password: Option<String>,
    /// Key for the session MAC.
    key: [u8; 32],
    /// How long a session stays valid.
    session_ttl: Duration,
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate")
            .field("enabled", &self.password.is_some())
            .field("mass_delete_gated", &self.mass_delete_password.is_some())
            .field("session_ttl", &self.session_ttl)
            .finish_non_exhaustive()
    }
}

impl AccessGate {
    /// Create a gate requiring `password` to log in.
    #[must_use]
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            mass_delete_password: None,
            key: rand::random(),
            session_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Create a gate that lets every caller through.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            password: None,
            mass_delete_password: None,
            key: rand::random(),
            session_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Build a gate from the `[auth]` configuration section.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut gate = if config.auth.enabled {
            Self::new(config.auth.password.clone().unwrap_or_default())
        } else {
            Self::disabled()
        };
        if let Some(secret) = &config.auth.session_secret {
            gate = gate.with_session_secret(secret);
        }
        if let Some(password) = &config.auth.mass_delete_password {
            gate = gate.with_mass_delete_password(password.clone());
        }
        gate.with_session_ttl(config.session_ttl())
    }

    /// Require an extra password for clearing the store.
    #[must_use]
    pub fn with_mass_delete_password(mut self, password: impl Into<String>) -> Self {
        self.mass_delete_password = Some(password.into());
        self
    }

    /// Derive the session key from a stable secret.
    #[must_use]
    pub fn with_session_secret(mut self, secret: &str) -> Self {
        self.key = blake3::derive_key(KEY_CONTEXT, secret.as_bytes());
        self
    }

    /// Set the session lifetime.
    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Check whether login is required at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.password.is_some()
    }

    /// Session lifetime.
    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Check the shared password and issue a session token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCredentials`] if the password does not match
    /// exactly.
    pub fn login(&self, password: &str) -> Result<SessionToken> {
        if let Some(expected) = &self.password {
            if !constant_time_eq(expected.as_bytes(), password.as_bytes()) {
                warn!("Rejected login with an invalid password");
                return Err(Error::InvalidCredentials);
            }
        }
        info!("Login successful");
        Ok(self.issue_at(unix_now()))
    }

    /// Resolve a session token (from the cookie) into an [`AuthContext`].
    #[must_use]
    pub fn context(&self, token: Option<&str>) -> AuthContext {
        if !self.is_enabled() {
            return AuthContext::Authenticated;
        }
        match token {
            Some(token) if self.verify_at(token, unix_now()) => AuthContext::Authenticated,
            Some(_) => {
                debug!("Ignoring invalid or expired session token");
                AuthContext::Anonymous
            }
            None => AuthContext::Anonymous,
        }
    }

    /// Require an authenticated caller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] for anonymous callers.
    pub fn authorize(&self, ctx: AuthContext) -> Result<()> {
        if ctx.is_authenticated() || !self.is_enabled() {
            Ok(())
        } else {
            Err(Error::unauthorized("Authentication required."))
        }
    }

    /// Check the mass-delete confirmation password, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] if a mass-delete password is configured
    /// and `password` does not match it.
    pub fn confirm_mass_delete(&self, password: Option<&str>) -> Result<()> {
        let Some(expected) = &self.mass_delete_password else {
            return Ok(());
        };
        match password {
            Some(given) if constant_time_eq(expected.as_bytes(), given.as_bytes()) => Ok(()),
            _ => {
                warn!("Rejected mass delete with an invalid password");
                Err(Error::unauthorized("Invalid mass delete password."))
            }
        }
    }

    fn issue_at(&self, issued_at: u64) -> SessionToken {
        SessionToken(format!("{issued_at}.{}", self.mac(issued_at).to_hex()))
    }

    fn verify_at(&self, token: &str, now: u64) -> bool {
        let Some((issued, mac)) = token.split_once('.') else {
            return false;
        };
        let Ok(issued_at) = issued.parse::<u64>() else {
            return false;
        };
        let Ok(given) = blake3::Hash::from_hex(mac) else {
            return false;
        };
        // blake3::Hash equality is constant-time.
        if given != self.mac(issued_at) {
            return false;
        }
        issued_at <= now && now - issued_at < self.session_ttl.as_secs()
    }

    fn mac(&self, issued_at: u64) -> blake3::Hash {
        blake3::keyed_hash(&self.key, issued_at.to_string().as_bytes())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    blake3::hash(a) == blake3::hash(b)
}
