use crate::config::ConfigError;
use std::time::Duration;
use thiserror::Error;
use uci_protocol::ProtocolError;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Cannot perform commands after the session was closed (quit, kill or engine exit)")]
    SessionClosed,

    #[error("Failed to spawn engine: {0}")]
    Spawn(std::io::Error),

    #[error("Engine process terminated before the command completed")]
    ProcessTerminated,

    #[error("No reply within {0:?}")]
    Timeout(Duration),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Search finished without a bestmove line: {0:?}")]
    MissingBestMove(String),
}
