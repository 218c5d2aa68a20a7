//! AI image workflow: submit a prompt, poll until terminal, commit the result.
//!
//! DESIGN
//! ======
//! `Idle -> Submitted -> Polling -> {Completed | Failed}`.
//!
//! The observable state lives in a `tokio::sync::watch` channel carrying a
//! [`WorkflowSnapshot`]. Every submission (and every cancel) bumps the
//! snapshot's `generation`. The polling task is spawned with the generation
//! it belongs to and:
//!
//! - waits for its next tick *or* a generation change, whichever comes
//!   first, and exits on the latter;
//! - applies a probe result only through `update_if_current`, which checks
//!   the generation and mutates in one `send_if_modified` call.
//!
//! Transport requests are never cancelled. A probe that was already in
//! flight when a newer prompt arrived still completes; its response is
//! logged and discarded. At most one polling loop per workflow does work
//! at any time.
//!
//! ERROR HANDLING
//! ==============
//! Submission errors return the workflow to `Idle`. Probe transport errors
//! and server-reported failures end in `Failed`. A `COMPLETED` status with no
//! URLs is an anomaly: surfaced, request cleared, back to `Idle`. Nothing is
//! retried.

#[cfg(test)]
#[path = "image_gen_test.rs"]
mod image_gen_test;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{ApiError, CardApi, ImageStatusReport, ProbeStatus};
use crate::card::{CardField, CardId, ValidationError};
use crate::config::PollPolicy;
use crate::error::EngineError;

pub const UNKNOWN_FAILURE: &str = "Unknown error.";
pub const NO_URLS_MESSAGE: &str = "No image URLs returned.";
pub const RECEIVED_MESSAGE: &str = "AI Generated Image has been received.";

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    #[default]
    Idle,
    Submitted,
    Polling,
    Completed,
    Failed,
}

/// Server-side lifecycle of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRequest {
    pub request_id: String,
    pub status: ImageStatus,
    /// Populated only when `status` is `Completed`.
    pub result_urls: Vec<String>,
    /// Present only when `status` is `Failed`.
    pub error: Option<String>,
}

impl ImageRequest {
    fn pending(request_id: String) -> Self {
        Self { request_id, status: ImageStatus::Pending, result_urls: Vec::new(), error: None }
    }

    fn completed(request_id: String, result_urls: Vec<String>) -> Self {
        Self { request_id, status: ImageStatus::Completed, result_urls, error: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Info,
    Error,
    Anomaly,
}

/// A message for the user, dismissible by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
}

impl Alert {
    fn new(kind: AlertKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkflowSnapshot {
    pub generation: u64,
    pub state: WorkflowState,
    pub card_id: Option<CardId>,
    pub request: Option<ImageRequest>,
    pub alert: Option<Alert>,
}

impl WorkflowSnapshot {
    /// First result URL of a completed request.
    #[must_use]
    pub fn result(&self) -> Option<&str> {
        if self.state != WorkflowState::Completed {
            return None;
        }
        self.request.as_ref()?.result_urls.first().map(String::as_str)
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, WorkflowState::Completed | WorkflowState::Failed | WorkflowState::Idle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The server resolved the request synchronously.
    Completed(Vec<String>),
    /// A polling loop was started.
    Polling { request_id: String },
    /// A newer submission or a cancel arrived while this one was in flight.
    Superseded,
}

type Shared = Arc<watch::Sender<WorkflowSnapshot>>;

/// Apply `f` only if `generation` is still live. Returns whether it applied.
fn update_if_current(shared: &Shared, generation: u64, f: impl FnOnce(&mut WorkflowSnapshot)) -> bool {
    shared.send_if_modified(|snapshot| {
        if snapshot.generation != generation {
            return false;
        }
        f(snapshot);
        true
    })
}

// =============================================================================
// WORKFLOW
// =============================================================================

pub struct ImageWorkflow {
    api: Arc<dyn CardApi>,
    policy: PollPolicy,
    shared: Shared,
}

impl ImageWorkflow {
    #[must_use]
    pub fn new(api: Arc<dyn CardApi>, policy: PollPolicy) -> Self {
        let (tx, _) = watch::channel(WorkflowSnapshot::default());
        Self { api, policy, shared: Arc::new(tx) }
    }

    #[must_use]
    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.shared.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<WorkflowSnapshot> {
        self.shared.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> WorkflowState {
        self.shared.borrow().state
    }

    /// Submit `prompt` for `card_id`, superseding any live request.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Validation`] for a blank prompt; nothing is sent.
    /// - [`EngineError::Api`] when the submission fails; the workflow is
    ///   back to `Idle` with an error alert.
    pub async fn submit(&self, prompt: &str, card_id: CardId) -> Result<SubmitOutcome, EngineError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ValidationError { missing_fields: vec![CardField::Prompt] }.into());
        }

        let mut generation = 0;
        self.shared.send_modify(|s| {
            s.generation += 1;
            generation = s.generation;
            s.state = WorkflowState::Submitted;
            s.card_id = Some(card_id);
            s.request = None;
            s.alert = None;
        });
        info!(generation, card_id, "submitting image prompt");

        let submission = match self.api.submit_image(prompt, card_id).await {
            Ok(submission) => submission,
            Err(e) => {
                warn!(generation, error = %e, "image submission failed");
                let message = e.to_string();
                update_if_current(&self.shared, generation, |s| {
                    s.state = WorkflowState::Idle;
                    s.alert = Some(Alert::new(AlertKind::Error, message));
                });
                return Err(e.into());
            }
        };

        let request_id = submission.request_id;
        match submission.image_urls.filter(|urls| !urls.is_empty()) {
            Some(urls) => {
                let applied = update_if_current(&self.shared, generation, |s| {
                    s.state = WorkflowState::Completed;
                    s.request = Some(ImageRequest::completed(request_id.clone(), urls.clone()));
                    s.alert = Some(Alert::new(AlertKind::Info, RECEIVED_MESSAGE));
                });
                if !applied {
                    return Ok(SubmitOutcome::Superseded);
                }
                info!(generation, %request_id, "image resolved synchronously");
                Ok(SubmitOutcome::Completed(urls))
            }
            None => {
                let applied = update_if_current(&self.shared, generation, |s| {
                    s.state = WorkflowState::Polling;
                    s.request = Some(ImageRequest::pending(request_id.clone()));
                });
                if !applied {
                    return Ok(SubmitOutcome::Superseded);
                }
                info!(generation, %request_id, "polling for image");
                tokio::spawn(poll_loop(
                    Arc::clone(&self.api),
                    Arc::clone(&self.shared),
                    self.policy,
                    generation,
                    request_id.clone(),
                ));
                Ok(SubmitOutcome::Polling { request_id })
            }
        }
    }

    /// Stop any live polling and return to `Idle`. In-flight probes finish
    /// but their responses are discarded.
    pub fn cancel(&self) {
        self.shared.send_if_modified(|s| {
            if s.state == WorkflowState::Idle && s.request.is_none() {
                return false;
            }
            s.generation += 1;
            s.state = WorkflowState::Idle;
            s.request = None;
            s.alert = None;
            debug!(generation = s.generation, "image workflow cancelled");
            true
        });
    }

    /// Take the first result URL of a completed request and return to
    /// `Idle`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidState`] unless the workflow is
    /// `Completed`.
    pub fn take_result(&self) -> Result<String, EngineError> {
        let mut taken = None;
        self.shared.send_if_modified(|s| {
            let Some(url) = s.result().map(str::to_owned) else {
                return false;
            };
            taken = Some(url);
            s.state = WorkflowState::Idle;
            s.request = None;
            s.alert = None;
            true
        });
        taken.ok_or(EngineError::InvalidState("no completed image to commit"))
    }

    /// Drop the current alert.
    pub fn dismiss_alert(&self) {
        self.shared.send_if_modified(|s| s.alert.take().is_some());
    }
}

impl Drop for ImageWorkflow {
    fn drop(&mut self) {
        self.cancel();
    }
}

// =============================================================================
// POLLING
// =============================================================================

/// What one probe did to the loop.
enum Step {
    Continue,
    Stop,
}

/// Resolves once the live generation differs from `generation`, or the
/// workflow is gone.
async fn superseded(rx: &mut watch::Receiver<WorkflowSnapshot>, generation: u64) {
    loop {
        if rx.borrow_and_update().generation != generation {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn poll_loop(api: Arc<dyn CardApi>, shared: Shared, policy: PollPolicy, generation: u64, request_id: String) {
    let mut rx = shared.subscribe();
    let mut delay = policy.interval;
    let mut attempts: u32 = 0;

    loop {
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = superseded(&mut rx, generation) => {
                debug!(generation, %request_id, "polling stopped by newer generation");
                return;
            }
        }

        attempts += 1;
        let result = api.image_status(&request_id).await;
        let mut step = Step::Stop;
        let applied = update_if_current(&shared, generation, |s| {
            step = apply_probe(s, result);
        });
        if !applied {
            info!(generation, %request_id, "discarding stale probe response");
            return;
        }
        if matches!(step, Step::Stop) {
            return;
        }

        if policy.exhausted(attempts) {
            warn!(generation, %request_id, attempts, "image polling gave up");
            update_if_current(&shared, generation, |s| {
                let message = format!("image generation timed out after {attempts} status checks");
                fail(s, message);
            });
            return;
        }
        delay = policy.next_delay(delay);
    }
}

fn apply_probe(s: &mut WorkflowSnapshot, result: Result<ImageStatusReport, ApiError>) -> Step {
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            warn!(error = %e, "image status probe failed");
            fail(s, format!("An error occurred while checking the image generation status: {e}"));
            return Step::Stop;
        }
    };

    match report.status {
        ProbeStatus::Completed => {
            let urls = report.image_urls.unwrap_or_default();
            if urls.is_empty() {
                warn!("image request completed without URLs");
                s.state = WorkflowState::Idle;
                s.request = None;
                s.alert = Some(Alert::new(AlertKind::Anomaly, NO_URLS_MESSAGE));
            } else {
                info!(count = urls.len(), "image generation completed");
                if let Some(request) = s.request.as_mut() {
                    request.status = ImageStatus::Completed;
                    request.result_urls = urls;
                }
                s.state = WorkflowState::Completed;
                s.alert = Some(Alert::new(AlertKind::Info, RECEIVED_MESSAGE));
            }
            Step::Stop
        }
        ProbeStatus::Failed => {
            let error = report.error.unwrap_or_else(|| UNKNOWN_FAILURE.to_owned());
            fail(s, error);
            Step::Stop
        }
        ProbeStatus::Pending | ProbeStatus::InProgress => {
            if let Some(request) = s.request.as_mut() {
                request.status = if report.status == ProbeStatus::Pending {
                    ImageStatus::Pending
                } else {
                    ImageStatus::InProgress
                };
            }
            Step::Continue
        }
        ProbeStatus::Other => {
            debug!("unrecognized image status; still polling");
            Step::Continue
        }
    }
}

fn fail(s: &mut WorkflowSnapshot, error: String) {
    warn!(%error, "image generation failed");
    s.alert = Some(Alert::new(AlertKind::Error, format!("Image generation failed: {error}")));
    if let Some(request) = s.request.as_mut() {
        request.status = ImageStatus::Failed;
        request.error = Some(error);
    }
    s.state = WorkflowState::Failed;
}

/// Wait until the workflow leaves `Submitted`/`Polling`.
///
/// # Errors
///
/// Returns [`EngineError::Anomaly`] if the request completed without any
/// image URLs, and [`EngineError::InvalidState`] if the wait times out or
/// the workflow is dropped first.
pub async fn wait_terminal(
    rx: &mut watch::Receiver<WorkflowSnapshot>,
    timeout: Option<Duration>,
) -> Result<WorkflowSnapshot, EngineError> {
    let wait = rx.wait_for(WorkflowSnapshot::is_terminal);
    let snapshot = match timeout {
        Some(limit) => tokio::time::timeout(limit, wait)
            .await
            .map_err(|_| EngineError::InvalidState("timed out waiting for the image"))?,
        None => wait.await,
    };
    let snapshot = snapshot
        .map(|s| s.clone())
        .map_err(|_| EngineError::InvalidState("image workflow closed"))?;
    match &snapshot.alert {
        Some(Alert { kind: AlertKind::Anomaly, message }) => Err(EngineError::Anomaly(message.clone())),
        _ => Ok(snapshot),
    }
}
