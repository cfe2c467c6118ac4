//! # Stockfish Session
//!
//! Drives a Stockfish process over its text protocol. Commands from any
//! number of callers are queued and written one at a time; each caller gets
//! the slice of output that answers its own command.
//!
//! The text side (command lines, option schema, reply parsers) lives in the
//! `uci_protocol` crate.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod mock_engine;
pub mod platform;
pub mod process;
pub mod session;

pub use config::{load_engine_options, ConfigError, SessionConfig};
pub use dispatcher::{Completion, SessionState};
pub use error::{Result, SessionError};
pub use process::{ProcessAdapter, TokioProcess};
pub use session::Session;
