//! Position setup and search parameters, plus parsing of the search result.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Token that introduces the search result line.
pub const BEST_MOVE: &str = "bestmove";

const STARTPOS: &str = "startpos";

static BEST_MOVE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"bestmove\s+(\S+)(?:\s+ponder\s+(\S+))?").expect("static pattern")
});

/// Where a position starts from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StartPosition {
    #[default]
    StartPos,
    Fen(String),
}

impl From<&str> for StartPosition {
    /// `"startpos"` selects the standard start; anything else is taken as FEN.
    fn from(start: &str) -> Self {
        if start.trim() == STARTPOS {
            StartPosition::StartPos
        } else {
            StartPosition::Fen(start.trim().to_string())
        }
    }
}

/// A start position followed by the moves played from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionSpec {
    pub start: StartPosition,
    pub moves: Vec<String>,
}

impl PositionSpec {
    pub fn startpos() -> Self {
        Self::default()
    }

    pub fn fen(fen: impl Into<String>) -> Self {
        Self {
            start: StartPosition::Fen(fen.into()),
            moves: Vec::new(),
        }
    }

    pub fn with_moves<I, S>(mut self, moves: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.moves = moves.into_iter().map(Into::into).collect();
        self
    }

    /// The `position` command line.
    pub fn to_command(&self) -> String {
        let mut command = match &self.start {
            StartPosition::StartPos => format!("position {}", STARTPOS),
            StartPosition::Fen(fen) => format!("position fen {}", fen),
        };
        if !self.moves.is_empty() {
            command.push_str(" moves ");
            command.push_str(&self.moves.join(" "));
        }
        command
    }
}

/// Parameters of a `go` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub depth: Option<u32>,
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub winc: Option<u64>,
    pub binc: Option<u64>,
    pub movestogo: Option<u32>,
    pub nodes: Option<u64>,
    pub mate: Option<u32>,
    pub movetime: Option<u64>,
    pub infinite: bool,
    pub ponder: bool,
    pub searchmoves: Option<Vec<String>>,
}

impl SearchOptions {
    pub fn depth(depth: u32) -> Self {
        Self {
            depth: Some(depth),
            ..Default::default()
        }
    }

    pub fn infinite() -> Self {
        Self {
            infinite: true,
            ..Default::default()
        }
    }

    /// The scalar limit tokens, e.g. `["wtime 1000", "depth 3"]`.
    pub fn limit_tokens(&self) -> Vec<String> {
        let limits: [(&str, Option<u64>); 9] = [
            ("wtime", self.wtime),
            ("btime", self.btime),
            ("winc", self.winc),
            ("binc", self.binc),
            ("movestogo", self.movestogo.map(u64::from)),
            ("depth", self.depth.map(u64::from)),
            ("nodes", self.nodes),
            ("mate", self.mate.map(u64::from)),
            ("movetime", self.movetime),
        ];
        limits
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| format!("{} {}", name, v)))
            .collect()
    }

    /// The `go` command line.
    ///
    /// Scalar limits are computed but never sent; only `infinite`, `ponder`
    /// and `searchmoves` reach the engine. Use
    /// [`SearchOptions::to_command_with_limits`] to send them as well.
    pub fn to_command(&self) -> String {
        let limits = self.limit_tokens();
        if !limits.is_empty() {
            log::debug!("Search limits not sent to engine: {}", limits.join(" "));
        }
        self.build(Vec::new())
    }

    /// The `go` command line including every scalar limit.
    pub fn to_command_with_limits(&self) -> String {
        self.build(self.limit_tokens())
    }

    // `searchmoves` consumes the rest of the line, so it is always last.
    fn build(&self, mut tokens: Vec<String>) -> String {
        if self.infinite {
            tokens.push("infinite".to_string());
        }
        if self.ponder {
            tokens.push("ponder".to_string());
        }
        if let Some(moves) = self.searchmoves.as_ref().filter(|m| !m.is_empty()) {
            tokens.push(format!("searchmoves {}", moves.join(" ")));
        }

        let mut command = String::from("go");
        for token in tokens {
            command.push(' ');
            command.push_str(&token);
        }
        command
    }
}

/// Result of a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BestMove {
    pub best_move: String,
    pub ponder: Option<String>,
}

impl BestMove {
    /// Extract the result from the last `bestmove` line of a search transcript.
    pub fn parse(response: &str) -> Option<Self> {
        let line = response
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()?;
        let captures = BEST_MOVE_LINE.captures(line)?;
        Some(Self {
            best_move: captures[1].to_string(),
            ponder: captures.get(2).map(|m| m.as_str().to_string()),
        })
    }
}

/// True once a complete `bestmove` line has arrived.
pub fn best_move_received(text: &str) -> bool {
    text.split_inclusive('\n')
        .filter(|line| line.ends_with('\n'))
        .any(|line| line.trim_start().starts_with(BEST_MOVE))
}
