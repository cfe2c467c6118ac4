//! Parser for the `eval` command's term breakdown table.
//!
//! The engine prints something like:
//!
//! ```text
//!      Term    |    White    |    Black    |    Total
//!              |   MG    EG  |   MG    EG  |   MG    EG
//!  ------------+-------------+-------------+------------
//!     Material |   ----  ---- |   ----  ---- |   0.00  0.00
//!     Mobility |  -0.46 -0.52 |  -0.46 -0.52 |   0.00  0.00
//!  ------------+-------------+-------------+------------
//!        Total |   ----  ---- |   ----  ---- |   0.13  0.22
//!
//! Total evaluation: 0.13 (white side)
//! ```

use crate::parser::{parse_labeled, sections, split_trim};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;

/// Label of the line carrying the final score.
pub const TOTAL_EVALUATION_LABEL: &str = "Total evaluation";

/// Token printed in place of a value that does not apply to a term.
pub const PLACEHOLDER: &str = "----";

const FIELD_DELIMITER: &str = "|";

static DIVIDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*-+(\+-+)+\s*$").expect("static pattern"));

static LEADING_DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-+]?\d+(\.\d+)?").expect("static pattern"));

/// Midgame and endgame values of one table cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PhaseScore {
    pub mg: Option<f64>,
    pub eg: Option<f64>,
}

/// Category name (`White`, `Black`, `Total`) to its phase values.
pub type TermBreakdown = HashMap<String, PhaseScore>;

/// Parsed output of the `eval` command.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evaluation {
    /// Term name to its per-category breakdown.
    pub detailed: HashMap<String, TermBreakdown>,
    /// Final score in pawns from white's point of view, if one was printed.
    pub score: Option<f64>,
}

impl Evaluation {
    /// Parse a complete `eval` reply: the table, a blank line, then metadata.
    pub fn parse(response: &str) -> Self {
        let mut blocks = sections(response).into_iter().filter(|b| !b.is_empty());
        let table = blocks.next().unwrap_or_default();
        let metadata = blocks.collect::<Vec<_>>().join("\n");

        let mut detailed = HashMap::new();
        merge_table(&mut detailed, table);

        let total_line = parse_labeled(&metadata)
            .remove(TOTAL_EVALUATION_LABEL)
            .or_else(|| parse_labeled(response).remove(TOTAL_EVALUATION_LABEL));
        let score = match total_line {
            Some(line) => parse_total_score(&line),
            None => {
                log::debug!("No '{}' line in eval reply", TOTAL_EVALUATION_LABEL);
                None
            }
        };

        Self { detailed, score }
    }
}

/// Parse one value token. The placeholder and anything non-numeric are absent.
fn parse_value(token: Option<&str>) -> Option<f64> {
    match token {
        Some(PLACEHOLDER) | None => None,
        Some(token) => token.parse().ok(),
    }
}

/// Positions of the MG and EG values inside one category column.
#[derive(Debug, Clone, Copy)]
struct PhaseColumns {
    mg: usize,
    eg: usize,
}

impl PhaseColumns {
    fn from_sub_labels(cell: Option<&str>) -> Self {
        let labels: Vec<&str> = cell.map(|c| c.split_whitespace().collect()).unwrap_or_default();
        let position = |name: &str, fallback: usize| {
            labels
                .iter()
                .position(|l| l.eq_ignore_ascii_case(name))
                .unwrap_or(fallback)
        };
        Self {
            mg: position("MG", 0),
            eg: position("EG", 1),
        }
    }
}

/// Parse `table` and merge its rows into `detailed`.
///
/// Categories parsed for a term are merged into any existing entry for that
/// term, so merging the same table twice leaves `detailed` unchanged.
pub fn merge_table(detailed: &mut HashMap<String, TermBreakdown>, table: &str) {
    let mut rows = table.lines().filter(|l| !l.trim().is_empty());

    let (Some(category_header), Some(phase_header)) = (rows.next(), rows.next()) else {
        log::debug!("Eval table is missing its header lines");
        return;
    };

    let header = split_trim(category_header, FIELD_DELIMITER);
    let categories: Vec<&str> = header.iter().skip(1).copied().filter(|c| !c.is_empty()).collect();
    if categories.is_empty() {
        log::debug!("Eval table header has no categories: {:?}", category_header);
        return;
    }

    let phase_cells = split_trim(phase_header, FIELD_DELIMITER);
    let columns: Vec<PhaseColumns> = (0..categories.len())
        .map(|i| PhaseColumns::from_sub_labels(phase_cells.get(i + 1).copied()))
        .collect();

    for row in rows {
        if DIVIDER.is_match(row) {
            continue;
        }

        let fields = split_trim(row, FIELD_DELIMITER);
        let term = fields[0];
        if term.is_empty() {
            continue;
        }

        let mut parsed = TermBreakdown::new();
        for (i, (category, cols)) in categories.iter().zip(&columns).enumerate() {
            let Some(cell) = fields.get(i + 1) else {
                break;
            };
            let tokens: Vec<&str> = cell.split_whitespace().collect();
            parsed.insert(
                category.to_string(),
                PhaseScore {
                    mg: parse_value(tokens.get(cols.mg).copied()),
                    eg: parse_value(tokens.get(cols.eg).copied()),
                },
            );
        }

        detailed.entry(term.to_string()).or_default().extend(parsed);
    }
}

/// Parse the numeric prefix of a `Total evaluation` value, e.g. `0.13 (white side)`.
pub fn parse_total_score(value: &str) -> Option<f64> {
    let value = value.trim();
    let value = value
        .strip_prefix(TOTAL_EVALUATION_LABEL)
        .and_then(|rest| rest.trim_start().strip_prefix(':'))
        .unwrap_or(value)
        .trim_start();
    LEADING_DECIMAL
        .find(value)
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "      Term    |    White    |    Black    |    Total
              |   MG    EG  |   MG    EG  |   MG    EG
 ------------+-------------+-------------+------------
     Material |   ----  ---- |   ----  ---- |   0.00  0.00
    Imbalance |   ----  ---- |   ----  ---- |   0.00  0.00
  Initiative |   ----  ---- |   ----  ---- |   0.00 -0.06
        Pawns |   0.35 -0.04 |   0.35 -0.04 |   0.00  0.00
      Knights |  -0.05 -0.06 |  -0.05 -0.06 |   0.00  0.00
     Mobility |  -0.46 -0.52 |  -0.46 -0.52 |   0.00  0.00
      Threats |   0.00  0.00 |   0.00  0.00 |   0.00  0.00
 ------------+-------------+-------------+------------
        Total |   ----  ---- |   ----  ---- |   0.13  0.22

Total evaluation: 0.13 (white side)
";

    #[test]
    fn test_parse_sample_transcript() {
        let evaluation = Evaluation::parse(SAMPLE.trim());

        assert_eq!(evaluation.score, Some(0.13));
        assert_eq!(evaluation.detailed.len(), 8);

        let mobility = &evaluation.detailed["Mobility"];
        assert_eq!(mobility["White"], PhaseScore { mg: Some(-0.46), eg: Some(-0.52) });
        assert_eq!(mobility["Black"], PhaseScore { mg: Some(-0.46), eg: Some(-0.52) });
        assert_eq!(mobility["Total"], PhaseScore { mg: Some(0.0), eg: Some(0.0) });

        let total = &evaluation.detailed["Total"];
        assert_eq!(total["White"], PhaseScore { mg: None, eg: None });
        assert_eq!(total["Total"], PhaseScore { mg: Some(0.13), eg: Some(0.22) });

        assert_eq!(evaluation.detailed["Initiative"]["Total"].eg, Some(-0.06));
        assert_eq!(evaluation.detailed["Pawns"]["White"].mg, Some(0.35));
    }

    #[test]
    fn test_dividers_are_not_terms() {
        let evaluation = Evaluation::parse(SAMPLE);
        assert!(evaluation.detailed.keys().all(|k| !k.starts_with('-')));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let table = sections(SAMPLE)[0];
        let mut detailed = HashMap::new();
        merge_table(&mut detailed, table);
        let once = detailed.clone();
        merge_table(&mut detailed, table);
        assert_eq!(detailed, once);
    }

    #[test]
    fn test_merge_adds_new_categories_to_existing_terms() {
        let mut detailed = HashMap::new();
        merge_table(&mut detailed, "Term | White\n | MG EG\nMobility | 1.00 2.00");
        merge_table(&mut detailed, "Term | Black\n | MG EG\nMobility | 3.00 ----");

        let mobility = &detailed["Mobility"];
        assert_eq!(mobility["White"], PhaseScore { mg: Some(1.0), eg: Some(2.0) });
        assert_eq!(mobility["Black"], PhaseScore { mg: Some(3.0), eg: None });
    }

    #[test]
    fn test_sub_label_order_is_respected() {
        let mut detailed = HashMap::new();
        merge_table(&mut detailed, "Term | White\n | EG MG\nPawns | 1.50 0.25");
        assert_eq!(
            detailed["Pawns"]["White"],
            PhaseScore { mg: Some(0.25), eg: Some(1.5) }
        );
    }

    #[test]
    fn test_non_numeric_tokens_are_absent() {
        let mut detailed = HashMap::new();
        merge_table(&mut detailed, "Term | White\n | MG EG\nSpace | n/a 0.5");
        assert_eq!(detailed["Space"]["White"], PhaseScore { mg: None, eg: Some(0.5) });
    }

    #[test]
    fn test_parse_total_score() {
        assert_eq!(parse_total_score("0.13 (white side)"), Some(0.13));
        assert_eq!(parse_total_score("-1.25 (white side)"), Some(-1.25));
        assert_eq!(parse_total_score("+2 (white side)"), Some(2.0));
        assert_eq!(parse_total_score("Total evaluation: 0.50 (white side)"), Some(0.5));
        assert_eq!(parse_total_score("none (in check)"), None);
        assert_eq!(parse_total_score(""), None);
    }

    #[test]
    fn test_malformed_reply_degrades_to_empty() {
        let evaluation = Evaluation::parse("garbage without structure");
        assert!(evaluation.detailed.is_empty());
        assert_eq!(evaluation.score, None);

        let in_check = Evaluation::parse("Total evaluation: none (in check)");
        assert!(in_check.detailed.is_empty());
        assert_eq!(in_check.score, None);
    }
}
