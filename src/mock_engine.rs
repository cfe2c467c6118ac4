//! In-memory stand-in for a Stockfish process.
//!
//! `MockEngine` answers the commands the session sends with canned
//! Stockfish 11 transcripts, so the whole stack can be exercised without an
//! engine binary. Replies can be split into arbitrarily small chunks to
//! exercise response buffering.

use crate::process::ProcessAdapter;
use log::{debug, warn};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::io;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uci_protocol::options::OPTION_NAMES;

pub const MOCK_BANNER: &str =
    "Stockfish 11 64 POPCNT by T. Romstad, M. Costalba, J. Kiiski, G. Linscott";
pub const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
pub const E4_FEN: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";
pub const STARTPOS_KEY: &str = "8F8F01D4562F59FB";
pub const MOCK_BEST_MOVE: &str = "bestmove e2e4 ponder e7e5";

/// `eval` output for the start position.
pub const EVAL_TRANSCRIPT: &str = "      Term    |    White    |    Black    |    Total
              |   MG    EG  |   MG    EG  |   MG    EG
 ------------+-------------+-------------+------------
     Material |   ----  ---- |   ----  ---- |   0.00  0.00
    Imbalance |   ----  ---- |   ----  ---- |   0.00  0.00
  Initiative |   ----  ---- |   ----  ---- |   0.00 -0.06
        Pawns |   0.35 -0.04 |   0.35 -0.04 |   0.00  0.00
      Knights |  -0.05 -0.06 |  -0.05 -0.06 |   0.00  0.00
      Bishops |   0.00 -0.30 |   0.00 -0.30 |   0.00  0.00
        Rooks |  -0.26  0.00 |  -0.26  0.00 |   0.00  0.00
       Queens |   0.00  0.00 |   0.00  0.00 |   0.00  0.00
     Mobility |  -0.46 -0.52 |  -0.46 -0.52 |   0.00  0.00
  King safety |   0.91 -0.06 |   0.91 -0.06 |   0.00  0.00
      Threats |   0.00  0.00 |   0.00  0.00 |   0.00  0.00
       Passed |   0.00  0.00 |   0.00  0.00 |   0.00  0.00
        Space |   0.33  0.00 |   0.33  0.00 |   0.00  0.00
 ------------+-------------+-------------+------------
        Total |   ----  ---- |   ----  ---- |   0.13  0.22

Total evaluation: 0.13 (white side)
";

const INFO_LINE: &str =
    "info depth 1 seldepth 1 multipv 1 score cp 116 nodes 20 nps 20000 tbhits 0 time 1 pv e2e4\n";

enum Output {
    Text(String),
    Exit,
}

/// Scripted engine implementing [`ProcessAdapter`].
pub struct MockEngine {
    outbox_tx: mpsc::UnboundedSender<Output>,
    outbox: mpsc::UnboundedReceiver<Output>,
    written: Arc<Mutex<Vec<String>>>,
    chunk_size: Option<usize>,
    transitions: HashMap<(String, String), String>,
    fen: String,
    searching: bool,
    exited: bool,
}

/// Test-side view of a [`MockEngine`] after it has been handed to a session.
#[derive(Clone)]
pub struct MockHandle {
    outbox: mpsc::UnboundedSender<Output>,
    written: Arc<Mutex<Vec<String>>>,
    chunk_size: Option<usize>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// A mock that greets with [`MOCK_BANNER`] and knows the move `e2e4`.
    pub fn new() -> Self {
        let (outbox_tx, outbox) = mpsc::unbounded_channel();
        let mut engine = Self {
            outbox_tx,
            outbox,
            written: Arc::new(Mutex::new(Vec::new())),
            chunk_size: None,
            transitions: HashMap::new(),
            fen: STARTPOS_FEN.to_string(),
            searching: false,
            exited: false,
        }
        .with_move(STARTPOS_FEN, "e2e4", E4_FEN);
        engine.emit(&format!("{}\n", MOCK_BANNER));
        engine
    }

    /// Split every reply (except the banner) into chunks of at most `size` characters.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size.max(1));
        self
    }

    /// Teach the mock that `mv` played from `from` leads to `to`.
    pub fn with_move(mut self, from: &str, mv: &str, to: &str) -> Self {
        self.transitions
            .insert((from.to_string(), mv.to_string()), to.to_string());
        self
    }

    pub fn handle(&self) -> MockHandle {
        MockHandle {
            outbox: self.outbox_tx.clone(),
            written: self.written.clone(),
            chunk_size: self.chunk_size,
        }
    }

    fn emit(&mut self, text: &str) {
        send_chunks(&self.outbox_tx, text, self.chunk_size);
    }

    fn respond(&mut self, line: &str) {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("isready") => self.emit("readyok\n"),
            Some("setoption") => {
                let name = option_name(line);
                if !OPTION_NAMES.contains(&name.as_str()) {
                    self.emit(&format!("No such option: {}\n", name));
                }
            }
            Some("position") => self.set_position(tokens.collect()),
            Some("ucinewgame") => self.fen = STARTPOS_FEN.to_string(),
            Some("d") => {
                let reply = display(&self.fen);
                self.emit(&reply);
            }
            Some("eval") => self.emit(EVAL_TRANSCRIPT),
            Some("go") => {
                self.emit(INFO_LINE);
                if line.split_whitespace().any(|t| t == "infinite") {
                    self.searching = true;
                } else {
                    self.emit(&format!("{}\n", MOCK_BEST_MOVE));
                }
            }
            Some("stop") => {
                if self.searching {
                    self.searching = false;
                    self.emit(&format!("{}\n", MOCK_BEST_MOVE));
                }
            }
            Some("quit") => {
                let _ = self.outbox_tx.send(Output::Exit);
            }
            Some(_) => self.emit(&format!("Unknown command: {}\n", line)),
            None => {}
        }
    }

    fn set_position(&mut self, tokens: Vec<&str>) {
        let (start, moves) = match tokens.iter().position(|t| *t == "moves") {
            Some(i) => (&tokens[..i], &tokens[i + 1..]),
            None => (&tokens[..], &[][..]),
        };

        let mut fen = match start {
            ["startpos"] => STARTPOS_FEN.to_string(),
            ["fen", fields @ ..] if !fields.is_empty() => fields.join(" "),
            _ => {
                warn!("Mock engine ignoring malformed position: {:?}", tokens);
                return;
            }
        };

        for mv in moves {
            match self.transitions.get(&(fen.clone(), mv.to_string())) {
                Some(next) => fen = next.clone(),
                None => debug!("Mock engine does not know {} from {}", mv, fen),
            }
        }
        self.fen = fen;
    }
}

impl MockHandle {
    /// Every line the session has written so far, without terminators.
    pub fn written(&self) -> Vec<String> {
        self.written
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    /// Push unsolicited output, as if the engine printed it.
    pub fn emit(&self, text: &str) {
        send_chunks(&self.outbox, text, self.chunk_size);
    }

    /// Close the output stream, as if the engine crashed.
    pub fn exit(&self) {
        let _ = self.outbox.send(Output::Exit);
    }
}

#[async_trait::async_trait]
impl ProcessAdapter for MockEngine {
    async fn write(&mut self, text: &str) -> io::Result<()> {
        if self.exited {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock engine exited"));
        }
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Ok(mut written) = self.written.lock() {
                written.push(line.to_string());
            }
            self.respond(line);
        }
        Ok(())
    }

    async fn next_chunk(&mut self) -> Option<String> {
        if self.exited {
            return None;
        }
        match self.outbox.recv().await {
            Some(Output::Text(text)) => Some(text),
            Some(Output::Exit) | None => {
                self.exited = true;
                None
            }
        }
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.exited = true;
        Ok(())
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        Ok(Some(0))
    }
}

fn send_chunks(outbox: &mpsc::UnboundedSender<Output>, text: &str, chunk_size: Option<usize>) {
    let chunks: Vec<String> = match chunk_size {
        Some(size) => text
            .chars()
            .collect::<Vec<_>>()
            .chunks(size)
            .map(|c| c.iter().collect())
            .collect(),
        None => vec![text.to_string()],
    };
    for chunk in chunks {
        let _ = outbox.send(Output::Text(chunk));
    }
}

/// The option name in `setoption name <Name> value <Value>`.
fn option_name(line: &str) -> String {
    let after_name = line.split_once(" name ").map(|(_, rest)| rest).unwrap_or_default();
    match after_name.split_once(" value ") {
        Some((name, _)) => name.trim().to_string(),
        None => after_name.trim().to_string(),
    }
}

/// The `d` reply for `fen`.
fn display(fen: &str) -> String {
    const RULE: &str = " +---+---+---+---+---+---+---+---+\n";

    let mut out = format!("\n{}", RULE);
    let placement = fen.split_whitespace().next().unwrap_or_default();
    for rank in placement.split('/') {
        out.push_str(" |");
        for c in rank.chars() {
            match c.to_digit(10) {
                Some(empty) => (0..empty).for_each(|_| out.push_str("   |")),
                None => out.push_str(&format!(" {} |", c)),
            }
        }
        out.push('\n');
        out.push_str(RULE);
    }

    let key = if fen == STARTPOS_FEN {
        STARTPOS_KEY.to_string()
    } else {
        let mut hasher = DefaultHasher::new();
        fen.hash(&mut hasher);
        format!("{:016X}", hasher.finish())
    };
    out.push_str(&format!("\nFen: {}\nKey: {}\nCheckers: \n", fen, key));
    out
}
