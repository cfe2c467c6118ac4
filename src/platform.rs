//! Per-platform defaults.

use std::path::PathBuf;

/// Terminator appended to every command written to the engine.
#[cfg(windows)]
pub const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
pub const LINE_ENDING: &str = "\n";

/// Where the engine binary is expected when no path is configured.
pub fn default_engine_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("./stockfish-win/engine.exe")
    } else {
        PathBuf::from("./stockfish/engine")
    }
}

/// A path that discards writes, e.g. for the `Debug Log File` option.
pub fn null_device_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("NUL")
    } else {
        PathBuf::from("/dev/null")
    }
}
