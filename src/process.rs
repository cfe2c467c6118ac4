//! The engine process as seen by the dispatcher.

use log::{debug, info, warn};
use std::io;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;

const READ_BUFFER_SIZE: usize = 4096;

/// A running engine: line input, chunked output, and termination.
#[async_trait::async_trait]
pub trait ProcessAdapter: Send {
    /// Write raw text to the engine's input.
    async fn write(&mut self, text: &str) -> io::Result<()>;

    /// Next piece of output, at whatever granularity it arrived.
    /// `None` once the output stream has closed.
    ///
    /// Must be cancel-safe: the dispatcher polls it inside `select!`.
    async fn next_chunk(&mut self) -> Option<String>;

    /// Forcefully stop the process. Does not wait for it to exit.
    fn terminate(&mut self) -> io::Result<()>;

    /// Wait for the process to exit and return its exit code, if any.
    async fn wait(&mut self) -> io::Result<Option<i32>>;
}

/// An engine executable spawned with piped stdin/stdout.
pub struct TokioProcess {
    child: Child,
    stdin: ChildStdin,
    output: mpsc::UnboundedReceiver<String>,
}

impl TokioProcess {
    pub fn spawn(path: &Path) -> io::Result<Self> {
        info!("🚀 Spawning engine: {}", path.display());

        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "engine stdin not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "engine stdout not piped"))?;

        let (tx, output) = mpsc::unbounded_channel();
        tokio::spawn(forward_output(stdout, tx));

        debug!("Engine started with pid {:?}", child.id());
        Ok(Self {
            child,
            stdin,
            output,
        })
    }
}

#[async_trait::async_trait]
impl ProcessAdapter for TokioProcess {
    async fn write(&mut self, text: &str) -> io::Result<()> {
        self.stdin.write_all(text.as_bytes()).await?;
        self.stdin.flush().await
    }

    async fn next_chunk(&mut self) -> Option<String> {
        self.output.recv().await
    }

    fn terminate(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }

    async fn wait(&mut self) -> io::Result<Option<i32>> {
        Ok(self.child.wait().await?.code())
    }
}

/// Read stdout until EOF, forwarding decoded text chunks.
async fn forward_output(mut stdout: ChildStdout, tx: mpsc::UnboundedSender<String>) {
    let mut buf = [0u8; READ_BUFFER_SIZE];
    let mut decoder = Utf8Decoder::default();

    loop {
        match stdout.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let text = decoder.decode(&buf[..n]);
                if !text.is_empty() && tx.send(text).is_err() {
                    debug!("Output receiver dropped, stopping reader");
                    return;
                }
            }
            Err(e) => {
                warn!("⚠️ Error reading engine output: {}", e);
                break;
            }
        }
    }

    let rest = decoder.finish();
    if !rest.is_empty() {
        let _ = tx.send(rest);
    }
    debug!("Engine output stream closed");
}

/// Decodes UTF-8 across read boundaries, holding back incomplete sequences.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let complete = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            // Only a truncated sequence at the end; keep it for the next read.
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.pending.len(),
        };
        let rest = self.pending.split_off(complete);
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending = rest;
        text
    }

    fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }
}
