//! # UCI Protocol
//!
//! Text side of talking to a Stockfish process.
//!
//! This crate provides:
//! - Command line builders (`setoption`, `position`, `go`, ...)
//! - Option and search parameter schemas
//! - Parsers for the engine's structured replies (`eval` table, `d` diagram)
//!
//! Nothing here performs I/O; see the `stockfish-session` crate for the
//! process side.
//!
//! ## Example Usage
//!
//! ```rust
//! use uci_protocol::{Board, Command, PositionSpec};
//!
//! let line = Command::Position(PositionSpec::startpos().with_moves(["e2e4"])).to_string();
//! assert_eq!(line, "position startpos moves e2e4");
//!
//! let board = Board::parse("| k |\n\nFen: 8/8/8/8/8/8/8/k7 w - - 0 1\nKey: 0\nCheckers: ");
//! assert_eq!(board.pieces, vec![vec!["k".to_string()]]);
//! ```

pub mod board;
pub mod eval;
pub mod options;
pub mod parser;
pub mod protocol;
pub mod search;

// Re-export commonly used types
pub use board::Board;
pub use eval::{Evaluation, PhaseScore, TermBreakdown};
pub use options::{AnalysisContempt, EngineOption, EngineOptions};
pub use protocol::{Command, ProtocolError};
pub use search::{BestMove, PositionSpec, SearchOptions, StartPosition};
