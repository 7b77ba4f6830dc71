//! `critterlog` - A small service that keeps a log of geotagged wildlife sightings
//!
//! Sightings live in one newline-delimited JSON file. This library provides the
//! record model, the flat-file store, the password gate, and the JSON API that
//! routes client actions to the store.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod sighting;
pub mod storage;

pub use auth::{AccessGate, AuthContext};
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use logging::init_logging;
pub use sighting::{Category, NewSighting, Sighting};
pub use storage::{FlatFileStore, SightingStore, StoreStats};
