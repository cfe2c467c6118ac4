use crate::options::EngineOption;
use crate::search::{PositionSpec, SearchOptions};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Unknown engine option: {0}")]
    UnknownOption(String),

    #[error("Invalid value for option '{name}': {reason}")]
    InvalidOptionValue { name: String, reason: String },
}

/// Reply to `isready`.
pub const READY_OK: &str = "readyok";

/// Commands sent to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetOption(EngineOption),
    IsReady,
    Position(PositionSpec),
    Go {
        search: SearchOptions,
        /// Append scalar limits (depth, time controls, ...) to the line.
        with_limits: bool,
    },
    Stop,
    /// Print the static evaluation breakdown.
    Eval,
    /// Print the board diagram.
    Display,
    UciNewGame,
    Quit,
}

impl Command {
    /// Whether a caller has something to wait for: engine output, or for
    /// `quit` the engine's exit.
    pub fn expects_reply(&self) -> bool {
        matches!(
            self,
            Command::IsReady | Command::Go { .. } | Command::Eval | Command::Display | Command::Quit
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetOption(option) => {
                write!(f, "setoption name {} value {}", option.name(), option.value())
            }
            Command::IsReady => write!(f, "isready"),
            Command::Position(spec) => write!(f, "{}", spec.to_command()),
            Command::Go { search, with_limits } => {
                if *with_limits {
                    write!(f, "{}", search.to_command_with_limits())
                } else {
                    write!(f, "{}", search.to_command())
                }
            }
            Command::Stop => write!(f, "stop"),
            Command::Eval => write!(f, "eval"),
            Command::Display => write!(f, "d"),
            Command::UciNewGame => write!(f, "ucinewgame"),
            Command::Quit => write!(f, "quit"),
        }
    }
}

/// True once a complete `readyok` line has arrived.
pub fn ready_ok_received(text: &str) -> bool {
    text.split_inclusive('\n')
        .filter(|line| line.ends_with('\n'))
        .any(|line| line.trim() == READY_OK)
}
