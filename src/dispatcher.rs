//! Command queue and dispatcher.
//!
//! A single task owns the engine process, the FIFO of pending commands and
//! the response buffer. Callers talk to it through a [`DispatchHandle`]:
//! commands go in over one channel, out-of-band signals (`stop`, kill) over
//! another, and each awaited command gets its own oneshot reply.
//!
//! Only the head of the queue is ever written to the engine. An awaited
//! command stays active until its completion check accepts the accumulated
//! output; a fire-and-forget command resolves as soon as it is written.

use crate::error::{Result, SessionError};
use crate::platform::LINE_ENDING;
use crate::process::ProcessAdapter;
use log::{debug, error, info, trace, warn};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

/// Completion check over everything received since the command was sent.
pub type Predicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// How a queued command completes.
pub enum Completion {
    /// Wait until the predicate accepts the accumulated output.
    Await(Predicate),
    /// Resolve with an empty reply as soon as the command is written.
    FireAndForget,
}

impl Completion {
    pub fn when<F>(predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Completion::Await(Box::new(predicate))
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the engine's startup banner.
    Starting,
    /// Nothing in flight.
    Idle,
    /// An awaited command is active.
    Busy,
    /// Quit, killed, or the engine exited. Terminal.
    Closed,
}

struct QueueEntry {
    command: Option<String>,
    completion: Completion,
    reply: oneshot::Sender<String>,
}

struct ActiveEntry {
    predicate: Predicate,
    reply: oneshot::Sender<String>,
}

enum Control {
    Stop,
    Kill,
}

#[derive(Debug, Default)]
struct Shared {
    closed: AtomicBool,
    quitting: AtomicBool,
    pending: AtomicUsize,
}

/// Output accumulated for the active command.
#[derive(Debug, Default)]
struct ResponseBuffer {
    text: String,
}

impl ResponseBuffer {
    /// Append `chunk` and check it against `predicate`. On a match the trimmed
    /// contents are returned and the buffer is cleared.
    fn feed(&mut self, chunk: &str, predicate: &Predicate) -> Option<String> {
        self.text.push_str(chunk);
        self.check(predicate)
    }

    /// Check what is already buffered against a newly active `predicate`.
    /// An empty buffer never matches.
    fn check(&mut self, predicate: &Predicate) -> Option<String> {
        if !self.text.is_empty() && predicate(&self.text) {
            let captured = self.text.trim().to_string();
            self.text.clear();
            Some(captured)
        } else {
            None
        }
    }

    /// Keep output that arrived while nothing was waiting for it.
    fn push(&mut self, chunk: &str) {
        self.text.push_str(chunk);
    }
}

/// A reply that has been queued but not yet delivered.
pub struct PendingReply {
    rx: oneshot::Receiver<String>,
    timeout: Option<Duration>,
}

impl PendingReply {
    /// Wait for the reply. Fire-and-forget commands resolve with `""`.
    pub async fn wait(self) -> Result<String> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.rx)
                .await
                .map_err(|_| SessionError::Timeout(limit))?
                .map_err(|_| SessionError::ProcessTerminated),
            None => self.rx.await.map_err(|_| SessionError::ProcessTerminated),
        }
    }
}

/// Caller side of the dispatcher.
pub struct DispatchHandle {
    requests: mpsc::UnboundedSender<QueueEntry>,
    control: mpsc::UnboundedSender<Control>,
    state: watch::Receiver<SessionState>,
    shared: Arc<Shared>,
    timeout: Option<Duration>,
}

impl DispatchHandle {
    /// Start a dispatcher task driving `process`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<P>(process: P, timeout: Option<Duration>) -> Self
    where
        P: ProcessAdapter + 'static,
    {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Starting);
        let shared = Arc::new(Shared::default());

        let dispatcher = Dispatcher {
            process,
            requests: requests_rx,
            control: control_rx,
            queue: VecDeque::new(),
            active: None,
            buffer: ResponseBuffer::default(),
            state: state_tx,
            shared: shared.clone(),
            started: false,
        };
        tokio::spawn(dispatcher.run());

        Self {
            requests: requests_tx,
            control: control_tx,
            state: state_rx,
            shared,
            timeout,
        }
    }

    /// Queue `command` (or a pure wait when `None`).
    ///
    /// Fails immediately with [`SessionError::SessionClosed`] once the session
    /// is closed; the command is never queued in that case.
    pub fn enqueue(&self, command: Option<String>, completion: Completion) -> Result<PendingReply> {
        if self.is_closed() {
            return Err(SessionError::SessionClosed);
        }

        let (reply, rx) = oneshot::channel();
        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        let entry = QueueEntry {
            command,
            completion,
            reply,
        };
        if self.requests.send(entry).is_err() {
            self.shared.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(SessionError::SessionClosed);
        }

        Ok(PendingReply {
            rx,
            timeout: self.timeout,
        })
    }

    /// Write `stop` straight to the engine, bypassing the queue.
    pub fn stop(&self) -> Result<()> {
        if self.is_closed() {
            return Err(SessionError::SessionClosed);
        }
        self.control
            .send(Control::Stop)
            .map_err(|_| SessionError::SessionClosed)
    }

    /// Close the session and terminate the engine without waiting.
    pub fn kill(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            debug!("kill() on an already closed session");
            return;
        }

        let pending = self.pending();
        if pending > 0 {
            warn!(
                "⚠️ Killing engine with {} pending command(s); they will not complete",
                pending
            );
        }
        info!("🔪 Killing engine");

        if self.control.send(Control::Kill).is_err() {
            debug!("Dispatcher already stopped");
        }
    }

    /// Note that the engine is expected to exit; its exit is then not reported
    /// as unexpected.
    pub fn expect_exit(&self) {
        self.shared.quitting.store(true, Ordering::SeqCst);
    }

    /// Mark the session closed; later commands fail with `SessionClosed`.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Commands queued or in flight that have not resolved yet.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> SessionState {
        if self.is_closed() {
            SessionState::Closed
        } else {
            *self.state.borrow()
        }
    }
}

/// Why the dispatcher stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shutdown {
    /// The engine's output stream closed.
    Exited,
    /// `kill()` was called.
    Killed,
    /// Every handle was dropped.
    Dropped,
}

struct Dispatcher<P: ProcessAdapter> {
    process: P,
    requests: mpsc::UnboundedReceiver<QueueEntry>,
    control: mpsc::UnboundedReceiver<Control>,
    queue: VecDeque<QueueEntry>,
    active: Option<ActiveEntry>,
    buffer: ResponseBuffer,
    state: watch::Sender<SessionState>,
    shared: Arc<Shared>,
    /// Set once the first awaited entry (the startup banner) resolves.
    started: bool,
}

impl<P: ProcessAdapter> Dispatcher<P> {
    async fn run(mut self) {
        let reason = loop {
            self.advance().await;

            tokio::select! {
                biased;

                Some(control) = self.control.recv() => match control {
                    Control::Stop => self.write_line("stop").await,
                    Control::Kill => break Shutdown::Killed,
                },
                request = self.requests.recv() => match request {
                    Some(entry) => self.queue.push_back(entry),
                    None => break Shutdown::Dropped,
                },
                chunk = self.process.next_chunk() => match chunk {
                    Some(chunk) => self.on_output(&chunk),
                    None => break Shutdown::Exited,
                },
            }
        };

        self.shutdown(reason).await;
    }

    /// Activate queued entries until one is waiting on output.
    async fn advance(&mut self) {
        while self.active.is_none() {
            let Some(entry) = self.queue.pop_front() else {
                break;
            };

            if let Some(command) = &entry.command {
                self.write_line(command).await;
            }

            match entry.completion {
                Completion::FireAndForget => {
                    let _ = entry.reply.send(String::new());
                    self.shared.pending.fetch_sub(1, Ordering::SeqCst);
                }
                Completion::Await(predicate) => {
                    let active = ActiveEntry {
                        predicate,
                        reply: entry.reply,
                    };
                    // Output that arrived while idle may already complete it.
                    match self.buffer.check(&active.predicate) {
                        Some(captured) => self.resolve(active, captured),
                        None => self.active = Some(active),
                    }
                }
            }
        }
        self.publish_state();
    }

    async fn write_line(&mut self, command: &str) {
        debug!("📤 {}", command);
        let line = format!("{}{}", command, LINE_ENDING);
        if let Err(e) = self.process.write(&line).await {
            // The output stream will close shortly and end the session.
            error!("❌ Failed to write '{}' to engine: {}", command, e);
        }
    }

    fn on_output(&mut self, chunk: &str) {
        trace!("📥 {:?}", chunk);
        match self.active.take() {
            Some(active) => match self.buffer.feed(chunk, &active.predicate) {
                Some(captured) => self.resolve(active, captured),
                None => self.active = Some(active),
            },
            None => self.buffer.push(chunk),
        }
    }

    fn resolve(&mut self, active: ActiveEntry, captured: String) {
        trace!("Reply complete:\n{}", captured);
        if active.reply.send(captured).is_err() {
            debug!("Reply dropped by caller (timed out or cancelled)");
        }
        self.shared.pending.fetch_sub(1, Ordering::SeqCst);
        if !self.started {
            info!("✅ Engine ready");
            self.started = true;
        }
    }

    fn publish_state(&self) {
        let state = if !self.started {
            SessionState::Starting
        } else if self.active.is_some() {
            SessionState::Busy
        } else {
            SessionState::Idle
        };
        self.state.send_replace(state);
    }

    async fn shutdown(&mut self, reason: Shutdown) {
        self.shared.closed.store(true, Ordering::SeqCst);

        match reason {
            Shutdown::Exited => {
                // Last chance to match: some checks need a trailing line terminator.
                if let Some(active) = self.active.take() {
                    match self.buffer.feed("\n", &active.predicate) {
                        Some(captured) => self.resolve(active, captured),
                        None => self.active = Some(active),
                    }
                }
            }
            Shutdown::Killed | Shutdown::Dropped => {
                if let Err(e) = self.process.terminate() {
                    debug!("Terminate failed (engine already gone?): {}", e);
                }
            }
        }

        let abandoned = self.abandon_all();
        let status = self.process.wait().await;
        let expected = reason != Shutdown::Exited || self.shared.quitting.load(Ordering::SeqCst);

        match (expected, status) {
            (true, Ok(code)) => info!("👋 Engine exited ({:?}, code {:?})", reason, code),
            (true, Err(e)) => debug!("Could not collect engine exit status: {}", e),
            (false, status) => warn!(
                "⚠️ Engine process terminated unexpectedly ({:?}); {} command(s) abandoned",
                status, abandoned
            ),
        }

        self.state.send_replace(SessionState::Closed);
    }

    /// Drop every unresolved entry; their callers see `ProcessTerminated`.
    fn abandon_all(&mut self) -> usize {
        self.requests.close();
        let mut abandoned = usize::from(self.active.take().is_some()) + self.queue.len();
        self.queue.clear();
        while self.requests.try_recv().is_ok() {
            abandoned += 1;
        }
        self.shared.pending.fetch_sub(abandoned, Ordering::SeqCst);
        abandoned
    }
}
