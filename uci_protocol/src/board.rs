//! Parser for the `d` (display) command.

use crate::parser::{lines, parse_labeled, split_first_section, split_trim};
use serde::Serialize;

pub const FEN_LABEL: &str = "Fen";
pub const KEY_LABEL: &str = "Key";
/// Last label the engine prints, used to detect the end of the reply.
pub const CHECKERS_LABEL: &str = "Checkers";

const BORDER: char = '|';

/// Board state as reported by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Board {
    pub fen: String,
    pub key: String,
    /// Squares of pieces giving check, space separated. Empty when not in check.
    pub checkers: String,
    /// Rows of the diagram from the eighth rank down; empty squares are `""`.
    pub pieces: Vec<Vec<String>>,
}

impl Board {
    /// Parse a `d` reply: the diagram, a blank line, then labeled metadata.
    ///
    /// Missing labels leave the corresponding field empty.
    pub fn parse(response: &str) -> Self {
        let (grid, metadata) = split_first_section(response);
        let mut labels = parse_labeled(metadata);

        let mut take = |label: &str| {
            labels.remove(label).unwrap_or_else(|| {
                log::debug!("Board reply has no '{}' line", label);
                String::new()
            })
        };

        Self {
            fen: take(FEN_LABEL),
            key: take(KEY_LABEL),
            checkers: take(CHECKERS_LABEL),
            pieces: parse_grid(grid),
        }
    }
}

/// Parse the ASCII diagram into rows of cell tokens.
///
/// Only lines with an interior space are rows; rule lines such as
/// `+---+---+` are skipped.
pub fn parse_grid(grid: &str) -> Vec<Vec<String>> {
    lines(grid)
        .into_iter()
        .filter(|line| line.contains(' '))
        .map(|line| {
            split_trim(line.trim_matches(BORDER), "|")
                .into_iter()
                .map(str::to_string)
                .collect()
        })
        .collect()
}
