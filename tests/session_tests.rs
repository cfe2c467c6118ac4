//! # Session Tests
//!
//! Drive the full session stack (dispatcher, parsers, high-level operations)
//! against the scripted [`MockEngine`], so they run without an engine binary.
//!
//! ```bash
//! cargo test --test session_tests
//! RUST_LOG=debug cargo test --test session_tests -- --nocapture
//! ```

use std::path::PathBuf;
use std::time::Duration;
use stockfish_session::mock_engine::{MockEngine, E4_FEN, STARTPOS_FEN, STARTPOS_KEY};
use stockfish_session::{Session, SessionConfig, SessionError, SessionState};
use tokio::time::timeout;
use uci_protocol::{AnalysisContempt, EngineOption, EngineOptions, PositionSpec, SearchOptions};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn session_with(engine: MockEngine) -> Session {
    init_logging();
    Session::with_adapter(engine, SessionConfig::default(), EngineOptions::new())
        .expect("mock session should start")
}

/// Every option the engine understands, with a harmless value.
fn full_option_map() -> EngineOptions {
    [
        EngineOption::DebugLogFile(PathBuf::from("/dev/null")),
        EngineOption::Contempt(24),
        EngineOption::AnalysisContempt(AnalysisContempt::Both),
        EngineOption::Threads(1),
        EngineOption::Hash(16),
        EngineOption::Ponder(false),
        EngineOption::MultiPv(1),
        EngineOption::SkillLevel(20),
        EngineOption::MoveOverhead(30),
        EngineOption::MinimumThinkingTime(20),
        EngineOption::SlowMover(84),
        EngineOption::NodesTime(0),
        EngineOption::UciChess960(false),
        EngineOption::UciAnalyseMode(false),
        EngineOption::UciLimitStrength(false),
        EngineOption::UciElo(1350),
        EngineOption::SyzygyPath(PathBuf::from("<empty>")),
        EngineOption::SyzygyProbeDepth(1),
        EngineOption::Syzygy50MoveRule(true),
        EngineOption::SyzygyProbeLimit(7),
    ]
    .into_iter()
    .collect()
}

#[tokio::test]
async fn test_concurrent_callers_are_written_in_enqueue_order() {
    let engine = MockEngine::new();
    let mock = engine.handle();
    let session = session_with(engine);

    let e4 = PositionSpec::startpos().with_moves(["e2e4"]);
    let (position, board, eval, ready) = tokio::join!(
        session.position(&e4),
        session.board(),
        session.eval(),
        session.ready(),
    );
    position.unwrap();
    assert_eq!(board.unwrap().fen, E4_FEN);
    assert!(eval.unwrap().score.is_some());
    ready.unwrap();

    assert_eq!(
        mock.written(),
        ["isready", "position startpos moves e2e4", "d", "eval", "isready"]
    );
    assert_eq!(session.pending(), 0);
}

#[tokio::test]
async fn test_eval_of_start_position_is_positive() {
    let session = session_with(MockEngine::new());

    let evaluation = session.eval().await.unwrap();
    let score = evaluation.score.expect("total evaluation missing");
    assert!(score > 0.0, "expected a positive score, got {}", score);

    let mobility = &evaluation.detailed["Mobility"];
    assert_eq!(mobility["White"].mg, Some(-0.46));
    assert_eq!(evaluation.detailed["Material"]["White"].mg, None);
}

#[tokio::test]
async fn test_board_reports_position() {
    let session = session_with(MockEngine::new());

    session.position(&PositionSpec::default()).await.unwrap();
    let board = session.board().await.unwrap();
    assert_eq!(board.fen, STARTPOS_FEN);
    assert_eq!(board.key, STARTPOS_KEY);
    assert_eq!(board.checkers, "");
    assert_eq!(board.pieces.len(), 8);
    assert_eq!(board.pieces[0][0], "r");

    let custom = "8/8/8/4k3/8/8/8/4K3 w - - 0 1";
    session.position(&PositionSpec::fen(custom)).await.unwrap();
    assert_eq!(session.board().await.unwrap().fen, custom);

    session
        .position(&PositionSpec::startpos().with_moves(["e2e4"]))
        .await
        .unwrap();
    assert_eq!(session.board().await.unwrap().fen, E4_FEN);
}

#[tokio::test]
async fn test_operations_after_quit_fail() {
    let session = session_with(MockEngine::new());
    session.quit().await.unwrap();

    assert!(session.is_closed());
    assert_eq!(session.state(), SessionState::Closed);
    assert!(matches!(session.eval().await, Err(SessionError::SessionClosed)));
    assert!(matches!(session.stop(), Err(SessionError::SessionClosed)));
    assert!(matches!(session.quit().await, Err(SessionError::SessionClosed)));
}

#[tokio::test]
async fn test_depth_search_returns_move() {
    let engine = MockEngine::new();
    let mock = engine.handle();
    let session = session_with(engine);

    let best = session.search(&SearchOptions::depth(1)).await.unwrap();
    assert_eq!(best.best_move.len(), 4);
    assert_eq!(best.best_move, "e2e4");
    assert_eq!(best.ponder.as_deref(), Some("e7e5"));

    // Scalar limits are not sent unless explicitly enabled.
    assert_eq!(mock.written().last().map(String::as_str), Some("go"));
}

#[tokio::test]
async fn test_search_limits_sent_when_enabled() {
    init_logging();
    let engine = MockEngine::new();
    let mock = engine.handle();
    let config = SessionConfig {
        emit_search_limits: true,
        ..Default::default()
    };
    let session = Session::with_adapter(engine, config, EngineOptions::new()).unwrap();

    session.search(&SearchOptions::depth(3)).await.unwrap();
    assert_eq!(mock.written().last().map(String::as_str), Some("go depth 3"));
}

#[tokio::test]
async fn test_infinite_search_resolves_only_after_stop() {
    let session = session_with(MockEngine::new());

    let options = SearchOptions::infinite();
    let search = session.search(&options);
    tokio::pin!(search);
    assert!(
        timeout(Duration::from_millis(100), &mut search).await.is_err(),
        "infinite search resolved without stop"
    );
    assert_eq!(session.state(), SessionState::Busy);

    session.stop().unwrap();
    let best = timeout(Duration::from_millis(100), search)
        .await
        .expect("search did not resolve promptly after stop")
        .unwrap();
    assert_eq!(best.best_move, "e2e4");
}

#[tokio::test]
async fn test_full_option_map_keeps_start_position() {
    let engine = MockEngine::new();
    let mock = engine.handle();
    let session = session_with(engine);

    let options = full_option_map();
    session.setoptions(&options).await.unwrap();
    assert_eq!(session.board().await.unwrap().fen, STARTPOS_FEN);

    let written = mock.written();
    let setoptions: Vec<_> = written.iter().filter(|l| l.starts_with("setoption")).collect();
    assert_eq!(setoptions.len(), options.len());
    assert_eq!(setoptions[0], "setoption name Debug Log File value /dev/null");
    assert_eq!(setoptions[2], "setoption name Analysis Contempt value Both");
}

#[tokio::test]
async fn test_replies_split_into_small_chunks() {
    for size in [1, 3, 7] {
        let session = session_with(MockEngine::new().with_chunk_size(size));

        let evaluation = session.eval().await.unwrap();
        assert_eq!(evaluation.score, Some(0.13), "chunk size {}", size);

        session
            .position(&PositionSpec::startpos().with_moves(["e2e4"]))
            .await
            .unwrap();
        assert_eq!(session.board().await.unwrap().fen, E4_FEN, "chunk size {}", size);

        let best = session.search(&SearchOptions::depth(1)).await.unwrap();
        assert_eq!(best.best_move, "e2e4", "chunk size {}", size);
    }
}

#[tokio::test]
async fn test_unexpected_exit_fails_pending_and_later_commands() {
    let engine = MockEngine::new();
    let mock = engine.handle();
    let session = session_with(engine);
    session.ready().await.unwrap();

    let (reply, _) = tokio::join!(
        session.send_raw("noop", |text| text.contains("never printed")),
        async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            mock.exit();
        }
    );

    assert!(matches!(reply, Err(SessionError::ProcessTerminated)));
    assert!(matches!(session.board().await, Err(SessionError::SessionClosed)));
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(session.pending(), 0);
}

#[tokio::test]
async fn test_kill_abandons_running_search() {
    let session = session_with(MockEngine::new());

    let options = SearchOptions::infinite();
    let (search, _) = tokio::join!(session.search(&options), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.kill();
    });

    assert!(matches!(search, Err(SessionError::ProcessTerminated)));
    assert!(session.is_closed());
    assert!(matches!(session.eval().await, Err(SessionError::SessionClosed)));

    // Killing twice is harmless.
    session.kill();
}

#[tokio::test]
async fn test_unsolicited_output_reaches_next_command() {
    let engine = MockEngine::new();
    let mock = engine.handle();
    let session = session_with(engine);
    session.ready().await.unwrap();

    mock.emit("info string NNUE disabled\n");
    let reply = session
        .send_raw("isready", |text| text.contains("readyok\n"))
        .await
        .unwrap();
    assert_eq!(reply, "info string NNUE disabled\nreadyok");
}

#[tokio::test]
async fn test_command_timeout_reports_to_caller() {
    init_logging();
    let config = SessionConfig {
        command_timeout: Some(Duration::from_millis(50)),
        ..Default::default()
    };
    let session = Session::with_adapter(MockEngine::new(), config, EngineOptions::new()).unwrap();

    let result = session.search(&SearchOptions::infinite()).await;
    assert!(matches!(result, Err(SessionError::Timeout(_))));

    // The search is still running in the engine; stop it and carry on.
    session.stop().unwrap();
    assert_eq!(session.board().await.unwrap().fen, STARTPOS_FEN);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_startup_never_stalls_on_multi_thread_runtime() {
    init_logging();
    for attempt in 0..200 {
        let session =
            Session::with_adapter(MockEngine::new(), SessionConfig::default(), EngineOptions::new())
                .unwrap();
        timeout(Duration::from_secs(1), session.ready())
            .await
            .unwrap_or_else(|_| panic!("session stuck in {:?} on attempt {}", session.state(), attempt))
            .unwrap();
        session.kill();
    }
}
