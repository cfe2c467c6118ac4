//! High-level engine session.
//!
//! Every operation builds one or more protocol commands, queues them on the
//! dispatcher and parses the reply. Operations from concurrent callers are
//! executed strictly in the order they were queued.
//!
//! ```rust,no_run
//! use stockfish_session::{Session, SessionConfig};
//! use uci_protocol::{EngineOption, EngineOptions, PositionSpec, SearchOptions};
//!
//! # async fn run() -> stockfish_session::Result<()> {
//! let options = EngineOptions::new().with(EngineOption::Threads(2));
//! let session = Session::launch(SessionConfig::new("/usr/games/stockfish"), options).await?;
//!
//! session.position(&PositionSpec::startpos().with_moves(["e2e4"])).await?;
//! let board = session.board().await?;
//! let best = session.search(&SearchOptions::depth(10)).await?;
//! println!("{} -> {}", board.fen, best.best_move);
//!
//! session.quit().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::{load_engine_options, SessionConfig};
use crate::dispatcher::{Completion, DispatchHandle, PendingReply, SessionState};
use crate::error::{Result, SessionError};
use crate::process::{ProcessAdapter, TokioProcess};
use log::{debug, info};
use std::path::Path;
use uci_protocol::board::CHECKERS_LABEL;
use uci_protocol::eval::TOTAL_EVALUATION_LABEL;
use uci_protocol::parser::stops_after_label;
use uci_protocol::protocol::ready_ok_received;
use uci_protocol::search::best_move_received;
use uci_protocol::{
    BestMove, Board, Command, EngineOption, EngineOptions, Evaluation, PositionSpec,
    SearchOptions,
};

/// A connection to one engine process.
pub struct Session {
    dispatcher: DispatchHandle,
    config: SessionConfig,
}

impl Session {
    /// Spawn the configured engine and apply `options`.
    ///
    /// Returns as soon as the process is running. The banner wait and the
    /// option commands are already queued, so every later operation runs
    /// after them.
    pub async fn launch(config: SessionConfig, options: EngineOptions) -> Result<Self> {
        let process = TokioProcess::spawn(&config.engine_path).map_err(SessionError::Spawn)?;
        Self::with_adapter(process, config, options)
    }

    /// Launch with configuration from the environment (and `.env`), applying
    /// the options in `options_file` when given.
    pub async fn from_env(options_file: Option<&Path>) -> Result<Self> {
        let config = SessionConfig::from_env()?;
        let options = match options_file {
            Some(path) => load_engine_options(path)?,
            None => EngineOptions::new(),
        };
        Self::launch(config, options).await
    }

    /// Drive an already running process. Must be called within a tokio runtime.
    pub fn with_adapter<P>(process: P, config: SessionConfig, options: EngineOptions) -> Result<Self>
    where
        P: ProcessAdapter + 'static,
    {
        let dispatcher = DispatchHandle::spawn(process, config.command_timeout);
        let session = Self { dispatcher, config };

        let banner = session.config.banner.clone();
        debug!("Waiting for engine banner containing '{}'", banner);
        session.dispatcher.enqueue(
            None,
            Completion::when(move |text| banner_received(text, &banner)),
        )?;
        session.queue_options(&options)?;

        Ok(session)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.dispatcher.state()
    }

    pub fn is_closed(&self) -> bool {
        self.dispatcher.is_closed()
    }

    /// Commands queued or in flight that have not resolved yet.
    pub fn pending(&self) -> usize {
        self.dispatcher.pending()
    }

    /// Send any command and wait until `done` accepts the accumulated output.
    pub async fn send_raw<F>(&self, command: &str, done: F) -> Result<String>
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.dispatcher
            .enqueue(Some(command.to_string()), Completion::when(done))?
            .wait()
            .await
    }

    fn queue_command(&self, command: Command, completion: Completion) -> Result<PendingReply> {
        debug_assert_eq!(
            command.expects_reply(),
            matches!(completion, Completion::Await(_)),
            "completion does not fit '{}'",
            command
        );
        self.dispatcher.enqueue(Some(command.to_string()), completion)
    }

    /// Queue one `setoption` per option, then an `isready` that completes once
    /// the engine has applied them all.
    fn queue_options(&self, options: &EngineOptions) -> Result<PendingReply> {
        for option in options {
            self.queue_command(Command::SetOption(option.clone()), Completion::FireAndForget)?;
        }
        self.queue_command(Command::IsReady, Completion::when(ready_ok_received))
    }

    /// Apply engine options in order and wait for the engine to confirm.
    pub async fn setoptions(&self, options: &EngineOptions) -> Result<()> {
        self.queue_options(options)?.wait().await?;
        info!("⚙️ Applied {} engine option(s)", options.len());
        Ok(())
    }

    /// Set one option given by its protocol name and textual value, e.g.
    /// `("Skill Level", "10")`. Unknown names and bad values are rejected
    /// before anything is sent.
    pub async fn setoption(&self, name: &str, value: &str) -> Result<()> {
        let option = EngineOption::parse(name, value)?;
        self.setoptions(&EngineOptions::new().with(option)).await
    }

    /// Wait until the engine has processed everything sent so far.
    pub async fn ready(&self) -> Result<()> {
        self.queue_command(Command::IsReady, Completion::when(ready_ok_received))?
            .wait()
            .await?;
        Ok(())
    }

    /// Set the position to search or inspect.
    pub async fn position(&self, spec: &PositionSpec) -> Result<()> {
        self.queue_command(Command::Position(spec.clone()), Completion::FireAndForget)?
            .wait()
            .await?;
        Ok(())
    }

    /// Run a search and return the engine's chosen move.
    ///
    /// Unless `emit_search_limits` is configured, depth, node and time limits
    /// are not sent; the search then only ends on its own or via [`Session::stop`].
    pub async fn search(&self, options: &SearchOptions) -> Result<BestMove> {
        let command = Command::Go {
            search: options.clone(),
            with_limits: self.config.emit_search_limits,
        };
        let transcript = self
            .queue_command(command, Completion::when(best_move_received))?
            .wait()
            .await?;
        BestMove::parse(&transcript).ok_or(SessionError::MissingBestMove(transcript))
    }

    /// Tell a running search to finish now. Sent immediately, ahead of
    /// anything queued.
    pub fn stop(&self) -> Result<()> {
        debug!("🛑 Stopping search");
        self.dispatcher.stop()
    }

    /// Static evaluation of the current position.
    pub async fn eval(&self) -> Result<Evaluation> {
        let response = self
            .queue_command(
                Command::Eval,
                Completion::when(stops_after_label(TOTAL_EVALUATION_LABEL)),
            )?
            .wait()
            .await?;
        Ok(Evaluation::parse(&response))
    }

    /// The current board as the engine sees it.
    pub async fn board(&self) -> Result<Board> {
        let response = self
            .queue_command(
                Command::Display,
                Completion::when(stops_after_label(CHECKERS_LABEL)),
            )?
            .wait()
            .await?;
        Ok(Board::parse(&response))
    }

    /// Signal that the next position belongs to a new game. The engine may
    /// ignore this.
    pub async fn newgame(&self) -> Result<()> {
        self.queue_command(Command::UciNewGame, Completion::FireAndForget)?
            .wait()
            .await?;
        Ok(())
    }

    /// Ask the engine to exit and close the session once it has.
    pub async fn quit(&self) -> Result<()> {
        self.dispatcher.expect_exit();
        let reply = self.queue_command(Command::Quit, Completion::when(|_| true))?;

        let result = match reply.wait().await {
            // The engine exiting is exactly what was asked for.
            Ok(_) | Err(SessionError::ProcessTerminated) => Ok(()),
            Err(e) => Err(e),
        };
        self.dispatcher.close();
        info!("👋 Session closed");
        result
    }

    /// Close the session and terminate the engine immediately.
    ///
    /// Pending commands are abandoned; a warning names how many.
    pub fn kill(&self) {
        self.dispatcher.kill();
    }
}

/// True once a complete line containing `banner` has arrived.
fn banner_received(text: &str, banner: &str) -> bool {
    text.split_inclusive('\n')
        .filter(|line| line.ends_with('\n'))
        .any(|line| line.contains(banner))
}
