use serde::{Deserialize, Serialize};

/// Per-step status carried by progress stream events.
///
/// Distinct from the session-level
/// [`ProgressStatus`](crate::progress::ProgressStatus): a step may report
/// `completed` while the overall operation is still running (interim
/// per-step completion).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    /// Step is queued but has not started.
    Pending,
    /// Step is currently running.
    InProgress,
    /// Step (or the whole operation, when `step == totalSteps`) finished.
    Completed,
    /// The operation failed at this step.
    Error,
}

/// One message on a per-operation progress stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Identifier of the sandbox the operation runs against.
    pub sandbox_id: String,
    /// Current step index (1-based).
    pub step: u32,
    /// Total step count. May change between events; the latest value wins.
    pub total_steps: u32,
    /// Status of the reported step.
    pub status: StepStatus,
    /// Human-readable description of the current step.
    pub message: String,
    /// Optional additional detail (e.g. the entity being processed).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Server-side timestamp (ISO 8601).
    pub timestamp: String,
}
