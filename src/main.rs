use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use stockfish_session::platform::null_device_path;
use stockfish_session::{load_engine_options, Session, SessionConfig};
use uci_protocol::{BestMove, EngineOption, EngineOptions, PositionSpec, SearchOptions};

#[derive(Parser, Debug)]
#[command(author, version, about = "Query a Stockfish engine from the command line", long_about = None)]
struct Cli {
    /// Engine executable (overrides STOCKFISH_PATH)
    #[arg(long, global = true)]
    engine: Option<PathBuf>,

    /// JSON file of engine options, e.g. {"Threads": 2, "Hash": 64}
    #[arg(long, global = true)]
    options: Option<PathBuf>,

    /// Give up on a command after this many milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Point the engine's debug log at the null device
    #[arg(long, global = true, default_value = "false")]
    discard_debug_log: bool,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Static evaluation of a position
    Eval(PositionArgs),
    /// Print the board as the engine sees it
    Board(PositionArgs),
    /// Search for the best move
    Go(GoArgs),
}

#[derive(Args, Debug)]
struct PositionArgs {
    /// Start from this FEN instead of the initial position
    #[arg(long)]
    fen: Option<String>,

    /// Moves played from the start position, in long algebraic notation
    #[arg(long, num_args = 1.., value_delimiter = ' ')]
    moves: Vec<String>,
}

#[derive(Args, Debug)]
struct GoArgs {
    #[command(flatten)]
    position: PositionArgs,

    #[arg(long)]
    depth: Option<u32>,

    #[arg(long)]
    movetime: Option<u64>,

    /// Search without limits and send `stop` after this many milliseconds
    #[arg(long)]
    infinite_ms: Option<u64>,

    /// Only consider these moves
    #[arg(long, num_args = 1.., value_delimiter = ' ')]
    searchmoves: Vec<String>,

    /// Send depth/movetime to the engine (they are omitted by default)
    #[arg(long, default_value = "false")]
    emit_limits: bool,
}

impl PositionArgs {
    fn to_spec(&self) -> PositionSpec {
        let start = match &self.fen {
            Some(fen) => PositionSpec::fen(fen.clone()),
            None => PositionSpec::startpos(),
        };
        start.with_moves(self.moves.iter().cloned())
    }
}

#[derive(Serialize)]
struct SearchReport {
    fen: String,
    #[serde(flatten)]
    best: BestMove,
}

fn session_config(cli: &Cli) -> Result<SessionConfig> {
    let mut config = SessionConfig::from_env().context("Failed to load configuration")?;
    if let Some(engine) = &cli.engine {
        config.engine_path = engine.clone();
    }
    if let Some(ms) = cli.timeout_ms {
        config.command_timeout = Some(Duration::from_millis(ms));
    }
    if let Action::Go(go) = &cli.command {
        config.emit_search_limits |= go.emit_limits;
    }
    Ok(config)
}

fn engine_options(cli: &Cli) -> Result<EngineOptions> {
    let mut options = match &cli.options {
        Some(path) => load_engine_options(path)?,
        None => EngineOptions::new(),
    };
    if cli.discard_debug_log {
        options.set(EngineOption::DebugLogFile(null_device_path()));
    }
    Ok(options)
}

async fn run(session: &Session, action: &Action) -> Result<String> {
    let json = match action {
        Action::Eval(position) => {
            session.position(&position.to_spec()).await?;
            serde_json::to_string_pretty(&session.eval().await?)?
        }
        Action::Board(position) => {
            session.position(&position.to_spec()).await?;
            serde_json::to_string_pretty(&session.board().await?)?
        }
        Action::Go(go) => {
            session.position(&go.position.to_spec()).await?;
            let fen = session.board().await?.fen;

            let search = SearchOptions {
                depth: go.depth,
                movetime: go.movetime,
                infinite: go.infinite_ms.is_some(),
                searchmoves: (!go.searchmoves.is_empty()).then(|| go.searchmoves.clone()),
                ..Default::default()
            };
            let best = match go.infinite_ms {
                Some(ms) => {
                    let pending = session.search(&search);
                    tokio::pin!(pending);
                    tokio::select! {
                        result = &mut pending => result?,
                        _ = tokio::time::sleep(Duration::from_millis(ms)) => {
                            session.stop()?;
                            pending.await?
                        }
                    }
                }
                None => session.search(&search).await?,
            };
            serde_json::to_string_pretty(&SearchReport { fen, best })?
        }
    };
    Ok(json)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = session_config(&cli)?;
    let options = engine_options(&cli)?;
    log::info!("🚀 Starting engine at {}", config.engine_path.display());

    let session = Session::launch(config, options)
        .await
        .context("Failed to start engine")?;

    let result = run(&session, &cli.command).await;
    if let Err(e) = session.quit().await {
        log::warn!("⚠️ Engine did not quit cleanly: {}", e);
        session.kill();
    }

    println!("{}", result?);
    Ok(())
}
