//! Engine options understood by `setoption`.

use crate::protocol::ProtocolError;
use serde_json::Value;
use std::path::PathBuf;
use std::str::FromStr;
use strum::{Display, EnumString};

/// Values accepted by the `Analysis Contempt` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum AnalysisContempt {
    Off,
    White,
    Black,
    Both,
}

/// A single engine option with its typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineOption {
    DebugLogFile(PathBuf),
    Contempt(i32),
    AnalysisContempt(AnalysisContempt),
    Threads(u32),
    /// Hash table size in MB.
    Hash(u32),
    Ponder(bool),
    MultiPv(u32),
    SkillLevel(i32),
    /// Milliseconds.
    MoveOverhead(u32),
    /// Milliseconds.
    MinimumThinkingTime(u32),
    SlowMover(u32),
    NodesTime(u32),
    UciChess960(bool),
    UciAnalyseMode(bool),
    UciLimitStrength(bool),
    UciElo(u32),
    SyzygyPath(PathBuf),
    SyzygyProbeDepth(u32),
    Syzygy50MoveRule(bool),
    SyzygyProbeLimit(u32),
}

/// Every option name, in the order the engine lists them.
pub const OPTION_NAMES: [&str; 20] = [
    "Debug Log File",
    "Contempt",
    "Analysis Contempt",
    "Threads",
    "Hash",
    "Ponder",
    "MultiPV",
    "Skill Level",
    "Move Overhead",
    "Minimum Thinking Time",
    "Slow Mover",
    "nodestime",
    "UCI_Chess960",
    "UCI_AnalyseMode",
    "UCI_LimitStrength",
    "UCI_Elo",
    "SyzygyPath",
    "SyzygyProbeDepth",
    "Syzygy50MoveRule",
    "SyzygyProbeLimit",
];

impl EngineOption {
    /// The option name as used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            EngineOption::DebugLogFile(_) => "Debug Log File",
            EngineOption::Contempt(_) => "Contempt",
            EngineOption::AnalysisContempt(_) => "Analysis Contempt",
            EngineOption::Threads(_) => "Threads",
            EngineOption::Hash(_) => "Hash",
            EngineOption::Ponder(_) => "Ponder",
            EngineOption::MultiPv(_) => "MultiPV",
            EngineOption::SkillLevel(_) => "Skill Level",
            EngineOption::MoveOverhead(_) => "Move Overhead",
            EngineOption::MinimumThinkingTime(_) => "Minimum Thinking Time",
            EngineOption::SlowMover(_) => "Slow Mover",
            EngineOption::NodesTime(_) => "nodestime",
            EngineOption::UciChess960(_) => "UCI_Chess960",
            EngineOption::UciAnalyseMode(_) => "UCI_AnalyseMode",
            EngineOption::UciLimitStrength(_) => "UCI_LimitStrength",
            EngineOption::UciElo(_) => "UCI_Elo",
            EngineOption::SyzygyPath(_) => "SyzygyPath",
            EngineOption::SyzygyProbeDepth(_) => "SyzygyProbeDepth",
            EngineOption::Syzygy50MoveRule(_) => "Syzygy50MoveRule",
            EngineOption::SyzygyProbeLimit(_) => "SyzygyProbeLimit",
        }
    }

    /// The option value as used on the wire.
    pub fn value(&self) -> String {
        match self {
            EngineOption::DebugLogFile(path) | EngineOption::SyzygyPath(path) => {
                path.display().to_string()
            }
            EngineOption::Contempt(v) | EngineOption::SkillLevel(v) => v.to_string(),
            EngineOption::AnalysisContempt(v) => v.to_string(),
            EngineOption::Threads(v)
            | EngineOption::Hash(v)
            | EngineOption::MultiPv(v)
            | EngineOption::MoveOverhead(v)
            | EngineOption::MinimumThinkingTime(v)
            | EngineOption::SlowMover(v)
            | EngineOption::NodesTime(v)
            | EngineOption::UciElo(v)
            | EngineOption::SyzygyProbeDepth(v)
            | EngineOption::SyzygyProbeLimit(v) => v.to_string(),
            EngineOption::Ponder(v)
            | EngineOption::UciChess960(v)
            | EngineOption::UciAnalyseMode(v)
            | EngineOption::UciLimitStrength(v)
            | EngineOption::Syzygy50MoveRule(v) => v.to_string(),
        }
    }

    /// Build an option from its wire name and textual value.
    pub fn parse(name: &str, value: &str) -> Result<Self, ProtocolError> {
        let value = value.trim();
        let option = match name {
            "Debug Log File" => EngineOption::DebugLogFile(PathBuf::from(value)),
            "Contempt" => EngineOption::Contempt(number(name, value)?),
            "Analysis Contempt" => EngineOption::AnalysisContempt(
                AnalysisContempt::from_str(value).map_err(|e| invalid(name, e))?,
            ),
            "Threads" => EngineOption::Threads(number(name, value)?),
            "Hash" => EngineOption::Hash(number(name, value)?),
            "Ponder" => EngineOption::Ponder(boolean(name, value)?),
            "MultiPV" => EngineOption::MultiPv(number(name, value)?),
            "Skill Level" => EngineOption::SkillLevel(number(name, value)?),
            "Move Overhead" => EngineOption::MoveOverhead(number(name, value)?),
            "Minimum Thinking Time" => EngineOption::MinimumThinkingTime(number(name, value)?),
            "Slow Mover" => EngineOption::SlowMover(number(name, value)?),
            "nodestime" => EngineOption::NodesTime(number(name, value)?),
            "UCI_Chess960" => EngineOption::UciChess960(boolean(name, value)?),
            "UCI_AnalyseMode" => EngineOption::UciAnalyseMode(boolean(name, value)?),
            "UCI_LimitStrength" => EngineOption::UciLimitStrength(boolean(name, value)?),
            "UCI_Elo" => EngineOption::UciElo(number(name, value)?),
            "SyzygyPath" => EngineOption::SyzygyPath(PathBuf::from(value)),
            "SyzygyProbeDepth" => EngineOption::SyzygyProbeDepth(number(name, value)?),
            "Syzygy50MoveRule" => EngineOption::Syzygy50MoveRule(boolean(name, value)?),
            "SyzygyProbeLimit" => EngineOption::SyzygyProbeLimit(number(name, value)?),
            _ => return Err(ProtocolError::UnknownOption(name.to_string())),
        };
        Ok(option)
    }

    /// Build an option from its wire name and a JSON string, number or boolean.
    pub fn from_json(name: &str, value: &Value) -> Result<Self, ProtocolError> {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => return Err(invalid(name, format!("unsupported JSON value {}", other))),
        };
        Self::parse(name, &text)
    }
}

fn invalid(name: &str, reason: impl ToString) -> ProtocolError {
    ProtocolError::InvalidOptionValue {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn number<T: FromStr>(name: &str, value: &str) -> Result<T, ProtocolError>
where
    T::Err: ToString,
{
    value.parse().map_err(|e: T::Err| invalid(name, e))
}

fn boolean(name: &str, value: &str) -> Result<bool, ProtocolError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(invalid(name, format!("expected true or false, got '{}'", other))),
    }
}

/// An ordered set of options, applied in insertion order.
///
/// Setting an option that is already present replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineOptions {
    options: Vec<EngineOption>,
}

impl EngineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`EngineOptions::set`].
    pub fn with(mut self, option: EngineOption) -> Self {
        self.set(option);
        self
    }

    pub fn set(&mut self, option: EngineOption) {
        match self.options.iter_mut().find(|o| o.name() == option.name()) {
            Some(existing) => *existing = option,
            None => self.options.push(option),
        }
    }

    pub fn get(&self, name: &str) -> Option<&EngineOption> {
        self.options.iter().find(|o| o.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EngineOption> {
        self.options.iter()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Build options from a JSON object keyed by option name.
    pub fn from_json_value(value: &Value) -> Result<Self, ProtocolError> {
        let object = value.as_object().ok_or_else(|| ProtocolError::InvalidOptionValue {
            name: "<options>".to_string(),
            reason: "expected a JSON object".to_string(),
        })?;

        let mut options = Self::new();
        for (name, value) in object {
            options.set(EngineOption::from_json(name, value)?);
        }
        Ok(options)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(json).map_err(|e| ProtocolError::InvalidOptionValue {
            name: "<options>".to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json_value(&value)
    }
}

impl FromIterator<EngineOption> for EngineOptions {
    fn from_iter<I: IntoIterator<Item = EngineOption>>(iter: I) -> Self {
        let mut options = Self::new();
        for option in iter {
            options.set(option);
        }
        options
    }
}

impl<'a> IntoIterator for &'a EngineOptions {
    type Item = &'a EngineOption;
    type IntoIter = std::slice::Iter<'a, EngineOption>;

    fn into_iter(self) -> Self::IntoIter {
        self.options.iter()
    }
}
