//! # Real Engine Tests
//!
//! Run the session against an actual Stockfish binary. They run automatically
//! when `STOCKFISH_PATH` points at an executable (directly or via `.env`) and
//! skip gracefully otherwise.
//!
//! ```bash
//! STOCKFISH_PATH=/usr/games/stockfish cargo test --test engine_tests
//! ```
//!
//! Written against Stockfish 11; `eval` output and the `d` display
//! changed in later releases.

use serial_test::serial;
use std::time::Duration;
use stockfish_session::config::ENGINE_PATH_VAR;
use stockfish_session::{Session, SessionConfig, SessionError};
use tokio::time::timeout;
use uci_protocol::{EngineOption, EngineOptions, PositionSpec, SearchOptions};

const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
const E4_FEN: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";

/// Engine configuration, or `None` (with a message) when no engine is available.
fn engine_config() -> Option<SessionConfig> {
    let _ = env_logger::builder().is_test(true).try_init();

    let config = match SessionConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            println!("⏭️  Skipping engine test - invalid configuration: {}", e);
            return None;
        }
    };
    if std::env::var(ENGINE_PATH_VAR).is_err() || !config.engine_path.is_file() {
        println!("⏭️  Skipping engine test - {} not set to an engine binary", ENGINE_PATH_VAR);
        return None;
    }
    Some(SessionConfig {
        command_timeout: Some(Duration::from_secs(30)),
        ..config
    })
}

async fn start(config: SessionConfig, options: EngineOptions) -> Session {
    Session::launch(config, options)
        .await
        .expect("failed to launch engine")
}

#[tokio::test]
#[serial]
async fn test_engine_board_and_eval() {
    let Some(config) = engine_config() else {
        return;
    };
    let session = start(config, EngineOptions::new()).await;

    session.position(&PositionSpec::startpos()).await.unwrap();
    assert_eq!(session.board().await.unwrap().fen, STARTPOS_FEN);

    let score = session.eval().await.unwrap().score.expect("no total evaluation");
    assert!(score > 0.0, "start position should favour white, got {}", score);

    session
        .position(&PositionSpec::startpos().with_moves(["e2e4"]))
        .await
        .unwrap();
    assert_eq!(session.board().await.unwrap().fen, E4_FEN);

    session.quit().await.unwrap();
    assert!(matches!(session.eval().await, Err(SessionError::SessionClosed)));
}

#[tokio::test]
#[serial]
async fn test_engine_searches() {
    let Some(config) = engine_config() else {
        return;
    };
    let session = start(
        SessionConfig {
            emit_search_limits: true,
            ..config
        },
        EngineOptions::new().with(EngineOption::Threads(1)).with(EngineOption::Hash(16)),
    )
    .await;

    let best = session.search(&SearchOptions::depth(1)).await.unwrap();
    assert_eq!(best.best_move.len(), 4, "unexpected move {:?}", best.best_move);

    let options = SearchOptions::infinite();
    let search = session.search(&options);
    tokio::pin!(search);
    assert!(timeout(Duration::from_millis(200), &mut search).await.is_err());
    session.stop().unwrap();
    let best = timeout(Duration::from_secs(1), search).await.unwrap().unwrap();
    assert_eq!(best.best_move.len(), 4);

    session.quit().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_engine_kill() {
    let Some(config) = engine_config() else {
        return;
    };
    let session = start(config, EngineOptions::new()).await;
    session.ready().await.unwrap();

    session.kill();
    assert!(session.is_closed());
    assert!(matches!(session.board().await, Err(SessionError::SessionClosed)));
}
