//! Progress Stream Monitor: tracks one long-running server operation through
//! a one-way server-to-client event stream.
//!
//! One monitor per operation identifier. The per-operation endpoint is
//! parameterized by a [`ProgressEndpoint`] (path template + provisional
//! total-step default) so every operation kind shares a single state
//! machine. Inbound events carry `{sandboxId, step, totalSteps, status,
//! message, detail?, timestamp}` and drive the session status:
//!
//! ```text
//! Idle --stream open--> Pending --update--> InProgress --> Completed | Error
//!   ^                                                                     |
//!   +------------------------------ reset() ------------------------------+
//! ```
//!
//! `Completed` is entered only on an event with `status == "completed"` AND
//! `step == totalSteps`; a `completed` step event short of the final step is
//! an interim per-step completion and maps to `InProgress`. Terminal states
//! ignore all further events until an explicit [`reset`](ProgressMonitor::reset).
//!
//! A transport close without a terminal event leaves the status unchanged
//! and only clears the stream-connected flag; the caller decides how to
//! interpret the ambiguity.

use crate::models::{ProgressEvent, StepStatus};
use futures_util::StreamExt;
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;

/// Lifecycle status of a progress session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    /// No stream observation yet, or after `reset()`.
    Idle,
    /// Stream opened, no step event received yet.
    Pending,
    /// At least one non-terminal step event received.
    InProgress,
    /// Operation finished successfully. Terminal.
    Completed,
    /// Operation failed. Terminal.
    Error,
}

impl ProgressStatus {
    /// `Completed` and `Error` admit no further transitions except `reset()`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Point-in-time view of a progress session.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    /// Session lifecycle status.
    pub status: ProgressStatus,
    /// Latest reported step index.
    pub step: u32,
    /// Latest reported total step count (provisional until the first event).
    pub total_steps: u32,
    /// Latest human-readable message.
    pub message: String,
    /// Latest detail string, if any.
    pub detail: Option<String>,
    /// Whether the one-way stream is currently open.
    pub stream_connected: bool,
}

impl ProgressSnapshot {
    /// Completion percentage in `[0, 100]`, derived from the latest
    /// step/total pair on read rather than stored.
    pub fn progress(&self) -> u8 {
        if self.total_steps == 0 {
            return 0;
        }
        let pct = (f64::from(self.step) / f64::from(self.total_steps) * 100.0).round();
        pct.clamp(0.0, 100.0) as u8
    }
}

/// Endpoint template for one kind of long-running operation.
///
/// Unifies the per-operation-kind streams behind a single monitor: the
/// template carries the URL shape and the provisional step count shown
/// before the first event corrects it.
#[derive(Debug, Clone)]
pub struct ProgressEndpoint {
    path_template: String,
    default_total_steps: u32,
}

impl ProgressEndpoint {
    /// Create an endpoint from a path template containing an `{id}`
    /// placeholder and a provisional total-step count.
    pub fn new(path_template: impl Into<String>, default_total_steps: u32) -> Self {
        Self {
            path_template: path_template.into(),
            default_total_steps,
        }
    }

    /// Progress of syncing an existing sandbox.
    pub fn sandbox_sync() -> Self {
        Self::new("/api/sandboxes/{id}/sync/progress", 5)
    }

    /// Progress of creating a Power Apps sandbox (keyed by temporary id).
    pub fn sandbox_creation() -> Self {
        Self::new("/api/sandboxes/powerapps/creation/{id}/progress", 7)
    }

    /// Provisional total-step count used before the first event arrives.
    pub fn default_total_steps(&self) -> u32 {
        self.default_total_steps
    }

    /// Resolve the full stream URL for one operation.
    ///
    /// One-way streams cannot carry custom headers, so the credential rides
    /// as a query parameter. The credential is passed in explicitly by the
    /// caller; a stale or absent one still opens the stream, and authorization
    /// failure arrives through the stream's own error channel.
    fn url_for(&self, base_url: &str, operation_id: &str, credential: Option<&str>) -> String {
        let path = self.path_template.replace("{id}", operation_id);
        let mut url = format!("{}{}", base_url.trim_end_matches('/'), path);
        if let Some(token) = credential {
            url.push_str("?token=");
            url.extend(url::form_urlencoded::byte_serialize(token.as_bytes()));
        }
        url
    }
}

/// Hooks fired as a progress session advances.
///
/// `on_complete` and `on_error` fire at most once per session (a `reset()`
/// starts a new session). All hooks receive the snapshot taken right after
/// the transition.
#[derive(Clone, Default)]
pub struct ProgressHandlers {
    on_update: Option<Arc<dyn Fn(ProgressSnapshot) + Send + Sync>>,
    on_complete: Option<Arc<dyn Fn(ProgressSnapshot) + Send + Sync>>,
    on_error: Option<Arc<dyn Fn(ProgressSnapshot) + Send + Sync>>,
}

impl ProgressHandlers {
    /// Create empty hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback fired on every applied non-terminal update.
    pub fn on_update(mut self, f: impl Fn(ProgressSnapshot) + Send + Sync + 'static) -> Self {
        self.on_update = Some(Arc::new(f));
        self
    }

    /// Register a callback fired exactly once when the operation completes.
    pub fn on_complete(mut self, f: impl Fn(ProgressSnapshot) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Arc::new(f));
        self
    }

    /// Register a callback fired exactly once when the operation errors.
    pub fn on_error(mut self, f: impl Fn(ProgressSnapshot) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }
}

/// Outcome of applying one inbound event to the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    /// Event ignored (session already terminal).
    Ignored,
    /// Non-terminal update recorded.
    Updated,
    /// Session reached `Completed`.
    Completed,
    /// Session reached `Error`.
    Errored,
}

/// Mutable session state shared between the monitor handle and the reader task.
#[derive(Debug)]
struct SessionState {
    status: ProgressStatus,
    step: u32,
    total_steps: u32,
    default_total_steps: u32,
    message: String,
    detail: Option<String>,
    stream_connected: bool,
}

impl SessionState {
    fn new(default_total_steps: u32) -> Self {
        Self {
            status: ProgressStatus::Idle,
            step: 0,
            total_steps: default_total_steps,
            default_total_steps,
            message: String::new(),
            detail: None,
            stream_connected: false,
        }
    }

    /// Transport-level "open" signal.
    fn on_open(&mut self) {
        self.stream_connected = true;
        if self.status == ProgressStatus::Idle {
            self.status = ProgressStatus::Pending;
        }
    }

    /// Transport-level close/error without a terminal event: status stays
    /// as-is, only the connected flag flips.
    fn on_stream_closed(&mut self) {
        self.stream_connected = false;
    }

    /// Apply one inbound step event.
    fn apply(&mut self, event: &ProgressEvent) -> Applied {
        if self.status.is_terminal() {
            return Applied::Ignored;
        }

        // Record the payload verbatim; the latest totalSteps always wins.
        self.step = event.step;
        self.total_steps = event.total_steps;
        self.message = event.message.clone();
        self.detail = event.detail.clone();

        match event.status {
            StepStatus::Error => {
                self.status = ProgressStatus::Error;
                Applied::Errored
            },
            // Exact terminal guard: a "completed" step short of the final
            // step is an interim per-step completion, not the end.
            StepStatus::Completed if event.step == event.total_steps => {
                self.status = ProgressStatus::Completed;
                Applied::Completed
            },
            _ => {
                self.status = ProgressStatus::InProgress;
                Applied::Updated
            },
        }
    }

    /// Re-initialize to `Idle` without touching the underlying stream.
    fn reset(&mut self) {
        self.status = ProgressStatus::Idle;
        self.step = 0;
        self.total_steps = self.default_total_steps;
        self.message.clear();
        self.detail = None;
    }

    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            status: self.status,
            step: self.step,
            total_steps: self.total_steps,
            message: self.message.clone(),
            detail: self.detail.clone(),
            stream_connected: self.stream_connected,
        }
    }
}

// Hooks run outside the lock, so poisoning can only come from a panic during
// plain field updates; recover the guard.
fn lock_write(lock: &RwLock<SessionState>) -> std::sync::RwLockWriteGuard<'_, SessionState> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock_read(lock: &RwLock<SessionState>) -> std::sync::RwLockReadGuard<'_, SessionState> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Observes one long-running operation through its one-way event stream.
///
/// [`open`](Self::open) is the only way to start a stream and each monitor
/// owns exactly one; switching to a new operation identifier means closing
/// (dropping) the old monitor and opening a new one, so no two live streams
/// exist for the same logical caller. Dropping the monitor closes the stream
/// immediately.
pub struct ProgressMonitor {
    operation_id: String,
    state: Arc<RwLock<SessionState>>,
    task: JoinHandle<()>,
}

impl ProgressMonitor {
    /// Open the one-way stream for `operation_id` and start tracking it.
    ///
    /// Never fails: stream-establishment problems surface as a session that
    /// never leaves `Idle` (with `stream_connected == false`), mirroring how
    /// the duplex channel absorbs transport failures.
    pub fn open(
        base_url: &str,
        endpoint: &ProgressEndpoint,
        operation_id: &str,
        credential: Option<&str>,
        handlers: ProgressHandlers,
    ) -> Self {
        let state = Arc::new(RwLock::new(SessionState::new(endpoint.default_total_steps)));
        let url = endpoint.url_for(base_url, operation_id, credential);
        let task = tokio::spawn(stream_task(url, state.clone(), handlers));
        Self {
            operation_id: operation_id.to_string(),
            state,
            task,
        }
    }

    /// The operation identifier this monitor observes.
    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// Current view of the session.
    pub fn snapshot(&self) -> ProgressSnapshot {
        lock_read(&self.state).snapshot()
    }

    /// Session lifecycle status.
    pub fn status(&self) -> ProgressStatus {
        lock_read(&self.state).status
    }

    /// Whether the one-way stream is currently open.
    pub fn is_stream_connected(&self) -> bool {
        lock_read(&self.state).stream_connected
    }

    /// Return the session to `Idle`, clearing step, message, and detail.
    ///
    /// Does not close or reopen the underlying stream; the caller decides
    /// whether to keep observing.
    pub fn reset(&self) {
        lock_write(&self.state).reset();
    }

    /// Close the stream immediately. No pending events are drained; the
    /// server-side operation itself is not cancelled.
    pub fn close(&self) {
        self.task.abort();
        lock_write(&self.state).on_stream_closed();
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        self.close();
    }
}

/// Background reader: opens the SSE response and feeds the state machine.
async fn stream_task(url: String, state: Arc<RwLock<SessionState>>, handlers: ProgressHandlers) {
    // No client-side read timeout: absence of events is tolerated
    // indefinitely; liveness comes from transport open/error/close alone.
    let client = reqwest::Client::new();
    let response = match client
        .get(&url)
        .header("Accept", "text/event-stream")
        .send()
        .await
    {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            log::warn!(
                "[sync-link] Progress stream rejected: HTTP {}",
                response.status(),
            );
            return;
        },
        Err(e) => {
            log::warn!("[sync-link] Progress stream open failed: {}", e);
            return;
        },
    };

    {
        let mut session = lock_write(&state);
        session.on_open();
    }

    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                log::warn!("[sync-link] Progress stream error: {}", e);
                break;
            },
        };
        buffer.extend_from_slice(&chunk);

        while let Some(raw) = drain_event(&mut buffer) {
            let Some(data) = sse_data(&raw) else {
                continue;
            };
            match serde_json::from_str::<ProgressEvent>(&data) {
                Ok(event) => {
                    let (applied, snapshot) = {
                        let mut session = lock_write(&state);
                        let applied = session.apply(&event);
                        (applied, session.snapshot())
                    };
                    // Hooks fire outside the lock.
                    match applied {
                        Applied::Updated => {
                            if let Some(cb) = &handlers.on_update {
                                cb(snapshot);
                            }
                        },
                        Applied::Completed => {
                            if let Some(cb) = &handlers.on_complete {
                                cb(snapshot);
                            }
                        },
                        Applied::Errored => {
                            if let Some(cb) = &handlers.on_error {
                                cb(snapshot);
                            }
                        },
                        Applied::Ignored => {},
                    }
                },
                Err(e) => {
                    log::warn!("[sync-link] Dropping malformed progress event: {}", e);
                },
            }
        }
    }

    lock_write(&state).on_stream_closed();
}

/// Pop the next complete SSE event off the front of `buffer`.
///
/// Events end at a blank line; both LF and CRLF delimited streams occur in
/// the wild. Bytes are decoded only once an event is complete, so a
/// multi-byte character split across chunk reads never corrupts.
fn drain_event(buffer: &mut Vec<u8>) -> Option<String> {
    let (end, delimiter_len) = find_event_boundary(buffer)?;
    let raw = String::from_utf8_lossy(&buffer[..end]).into_owned();
    buffer.drain(..end + delimiter_len);
    Some(raw)
}

fn find_event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    for i in 0..buffer.len() {
        if buffer[i..].starts_with(b"\n\n") {
            return Some((i, 2));
        }
        if buffer[i..].starts_with(b"\r\n\r\n") {
            return Some((i, 4));
        }
    }
    None
}

/// Extract the concatenated `data:` payload from one raw SSE event block.
fn sse_data(raw: &str) -> Option<String> {
    let mut data = String::new();
    for line in raw.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.trim_start());
        }
        // `event:`/`id:`/comment lines carry nothing we need.
    }
    if data.is_empty() {
        None
    } else {
        Some(data)
    }
}
