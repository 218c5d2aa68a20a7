use std::sync::Arc;

use tokio::sync::Notify;
use tokio::time::sleep;

use super::*;
use crate::api::ImageSubmission;
use crate::test_helpers::{MockApi, report, server_error};

const TICK: Duration = Duration::from_millis(3000);

fn workflow(api: &Arc<MockApi>) -> ImageWorkflow {
    ImageWorkflow::new(api.clone(), PollPolicy::default())
}

async fn just_after(d: Duration) {
    sleep(d + Duration::from_millis(1)).await;
}

// =============================================================
// submit
// =============================================================

#[tokio::test(start_paused = true)]
async fn blank_prompt_is_rejected_without_network() {
    let api = MockApi::new();
    let wf = workflow(&api);

    let err = wf.submit("   ", 7).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(ref v) if v.missing_fields == vec![CardField::Prompt]));
    assert_eq!(MockApi::count(&api.submit_calls), 0);
    assert_eq!(wf.state(), WorkflowState::Idle);
}

#[tokio::test(start_paused = true)]
async fn immediate_urls_skip_polling() {
    let api = MockApi::new();
    api.push_submission(Ok(ImageSubmission { request_id: "req-now".into(), image_urls: Some(vec!["now.png".into()]) }));
    let wf = workflow(&api);

    let outcome = wf.submit("a dragon", 7).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Completed(vec!["now.png".into()]));
    assert_eq!(wf.state(), WorkflowState::Completed);
    assert_eq!(wf.snapshot().result(), Some("now.png"));

    sleep(TICK * 3).await;
    assert_eq!(MockApi::count(&api.status_calls), 0);
}

#[tokio::test(start_paused = true)]
async fn empty_immediate_urls_fall_back_to_polling() {
    let api = MockApi::new();
    api.push_submission(Ok(ImageSubmission { request_id: "req-9".into(), image_urls: Some(Vec::new()) }));
    let wf = workflow(&api);

    let outcome = wf.submit("a dragon", 7).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Polling { request_id: "req-9".into() });
    assert_eq!(wf.state(), WorkflowState::Polling);
}

#[tokio::test(start_paused = true)]
async fn submission_error_returns_to_idle() {
    let api = MockApi::new();
    api.push_submission(Err(server_error(500, "Image quota exceeded")));
    let wf = workflow(&api);

    let err = wf.submit("a dragon", 7).await.unwrap_err();
    assert_eq!(err.to_string(), "Image quota exceeded");
    let snap = wf.snapshot();
    assert_eq!(snap.state, WorkflowState::Idle);
    assert_eq!(snap.alert.map(|a| a.kind), Some(AlertKind::Error));
}

#[tokio::test(start_paused = true)]
async fn submit_sends_trimmed_prompt() {
    let api = MockApi::new();
    let wf = workflow(&api);
    wf.submit("  a dragon  ", 7).await.unwrap();
    assert_eq!(*api.submitted_prompts.lock().unwrap(), vec![("a dragon".to_owned(), 7)]);
}

// =============================================================
// polling
// =============================================================

#[tokio::test(start_paused = true)]
async fn polls_until_completed() {
    let api = MockApi::new();
    api.push_status("req-1", Ok(report(ProbeStatus::InProgress, None, None)));
    api.push_status("req-1", Ok(report(ProbeStatus::Completed, Some(vec!["dragon.png", "alt.png"]), None)));
    let wf = workflow(&api);

    wf.submit("a dragon", 7).await.unwrap();
    assert_eq!(MockApi::count(&api.status_calls), 0);

    just_after(TICK).await;
    let snap = wf.snapshot();
    assert_eq!(snap.state, WorkflowState::Polling);
    assert_eq!(snap.request.map(|r| r.status), Some(ImageStatus::InProgress));

    sleep(TICK).await;
    let snap = wf.snapshot();
    assert_eq!(snap.state, WorkflowState::Completed);
    assert_eq!(snap.request.unwrap().result_urls, vec!["dragon.png", "alt.png"]);

    sleep(TICK * 5).await;
    assert_eq!(MockApi::count(&api.status_calls), 2);
}

#[tokio::test(start_paused = true)]
async fn unknown_statuses_keep_polling() {
    let api = MockApi::new();
    for _ in 0..10 {
        api.push_status("req-1", Ok(report(ProbeStatus::Other, None, None)));
    }
    let wf = workflow(&api);
    wf.submit("a dragon", 7).await.unwrap();

    just_after(TICK * 12).await;
    assert_eq!(wf.state(), WorkflowState::Polling);
    assert_eq!(MockApi::count(&api.status_calls), 12);
}

#[tokio::test(start_paused = true)]
async fn completed_without_urls_is_an_anomaly() {
    let api = MockApi::new();
    api.push_status("req-1", Ok(report(ProbeStatus::Completed, Some(vec![]), None)));
    let wf = workflow(&api);
    wf.submit("a dragon", 7).await.unwrap();

    just_after(TICK).await;
    let snap = wf.snapshot();
    assert_eq!(snap.state, WorkflowState::Idle);
    assert!(snap.request.is_none());
    assert_eq!(snap.alert.map(|a| a.kind), Some(AlertKind::Anomaly));

    sleep(TICK * 3).await;
    assert_eq!(MockApi::count(&api.status_calls), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_status_records_error() {
    let api = MockApi::new();
    api.push_status("req-1", Ok(report(ProbeStatus::Failed, None, Some("NSFW prompt"))));
    let wf = workflow(&api);
    wf.submit("a dragon", 7).await.unwrap();

    just_after(TICK).await;
    let snap = wf.snapshot();
    assert_eq!(snap.state, WorkflowState::Failed);
    let request = snap.request.unwrap();
    assert_eq!(request.status, ImageStatus::Failed);
    assert_eq!(request.error.as_deref(), Some("NSFW prompt"));
    assert_eq!(snap.alert.unwrap().message, "Image generation failed: NSFW prompt");
}

#[tokio::test(start_paused = true)]
async fn failed_status_without_message_uses_default() {
    let api = MockApi::new();
    api.push_status("req-1", Ok(report(ProbeStatus::Failed, None, None)));
    let wf = workflow(&api);
    wf.submit("a dragon", 7).await.unwrap();

    just_after(TICK).await;
    assert_eq!(wf.snapshot().request.unwrap().error.as_deref(), Some(UNKNOWN_FAILURE));
}

#[tokio::test(start_paused = true)]
async fn probe_transport_error_stops_polling() {
    let api = MockApi::new();
    api.push_status("req-1", Err(ApiError::Request("connection reset".into())));
    let wf = workflow(&api);
    wf.submit("a dragon", 7).await.unwrap();

    just_after(TICK).await;
    assert_eq!(wf.state(), WorkflowState::Failed);
    sleep(TICK * 3).await;
    assert_eq!(MockApi::count(&api.status_calls), 1);
}

#[tokio::test(start_paused = true)]
async fn bounded_policy_gives_up_with_backoff() {
    let api = MockApi::new();
    let policy = PollPolicy {
        interval: Duration::from_millis(1000),
        max_attempts: Some(3),
        backoff: 2.0,
        max_interval: Duration::from_millis(5000),
    };
    let wf = ImageWorkflow::new(api.clone(), policy);
    wf.submit("a dragon", 7).await.unwrap();

    // probes at 1000, 3000 and 7000
    sleep(Duration::from_millis(6999)).await;
    assert_eq!(MockApi::count(&api.status_calls), 2);
    assert_eq!(wf.state(), WorkflowState::Polling);

    sleep(Duration::from_millis(2)).await;
    assert_eq!(MockApi::count(&api.status_calls), 3);
    let snap = wf.snapshot();
    assert_eq!(snap.state, WorkflowState::Failed);
    assert!(snap.request.unwrap().error.unwrap().contains("timed out after 3"));
}

// =============================================================
// supersession
// =============================================================

#[tokio::test(start_paused = true)]
async fn second_submit_stops_first_loop_before_it_probes() {
    let api = MockApi::new();
    let wf = workflow(&api);

    wf.submit("a dragon", 7).await.unwrap();
    sleep(Duration::from_millis(1000)).await;
    let outcome = wf.submit("a phoenix", 7).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Polling { request_id: "req-2".into() });

    just_after(TICK).await;
    assert_eq!(api.probed_ids(), vec!["req-2"]);
    sleep(TICK * 2).await;
    assert!(api.probed_ids().iter().all(|id| id == "req-2"));
}

#[tokio::test(start_paused = true)]
async fn stale_probe_response_is_discarded() {
    let api = MockApi::new();
    let gate = Arc::new(Notify::new());
    api.gate_status(gate.clone());
    api.push_status("req-1", Ok(report(ProbeStatus::Completed, Some(vec!["old.png"]), None)));
    api.push_status("req-2", Ok(report(ProbeStatus::Completed, Some(vec!["new.png"]), None)));
    let wf = workflow(&api);

    wf.submit("a dragon", 7).await.unwrap();
    just_after(TICK).await;
    // The first probe is now parked inside the API call.
    assert_eq!(api.probed_ids(), vec!["req-1"]);

    api.clear_status_gate();
    wf.submit("a phoenix", 7).await.unwrap();
    gate.notify_one();
    sleep(Duration::from_millis(10)).await;

    let snap = wf.snapshot();
    assert_eq!(snap.state, WorkflowState::Polling);
    assert_eq!(snap.request.as_ref().map(|r| r.request_id.as_str()), Some("req-2"));
    assert_eq!(snap.request.map(|r| r.status), Some(ImageStatus::Pending));

    sleep(TICK).await;
    let snap = wf.snapshot();
    assert_eq!(snap.state, WorkflowState::Completed);
    assert_eq!(snap.result(), Some("new.png"));
    assert_eq!(api.probed_ids(), vec!["req-1", "req-2"]);
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_polling() {
    let api = MockApi::new();
    let wf = workflow(&api);
    wf.submit("a dragon", 7).await.unwrap();

    wf.cancel();
    assert_eq!(wf.state(), WorkflowState::Idle);
    sleep(TICK * 3).await;
    assert_eq!(MockApi::count(&api.status_calls), 0);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_workflow_stops_polling() {
    let api = MockApi::new();
    let wf = workflow(&api);
    wf.submit("a dragon", 7).await.unwrap();
    drop(wf);

    sleep(TICK * 3).await;
    assert_eq!(MockApi::count(&api.status_calls), 0);
}

// =============================================================
// take_result
// =============================================================

#[tokio::test(start_paused = true)]
async fn take_result_only_from_completed() {
    let api = MockApi::new();
    api.push_submission(Ok(ImageSubmission {
        request_id: "req-now".into(),
        image_urls: Some(vec!["first.png".into(), "second.png".into()]),
    }));
    let wf = workflow(&api);

    assert!(matches!(wf.take_result(), Err(EngineError::InvalidState(_))));

    wf.submit("a dragon", 7).await.unwrap();
    assert_eq!(wf.take_result().unwrap(), "first.png");
    let snap = wf.snapshot();
    assert_eq!(snap.state, WorkflowState::Idle);
    assert!(snap.request.is_none());
    assert!(wf.take_result().is_err());
}

#[tokio::test(start_paused = true)]
async fn wait_terminal_returns_completed_snapshot() {
    let api = MockApi::new();
    api.push_status("req-1", Ok(report(ProbeStatus::Completed, Some(vec!["dragon.png"]), None)));
    let wf = workflow(&api);
    let mut rx = wf.subscribe();
    wf.submit("a dragon", 7).await.unwrap();

    let snap = wait_terminal(&mut rx, None).await.unwrap();
    assert_eq!(snap.result(), Some("dragon.png"));
}

#[tokio::test(start_paused = true)]
async fn wait_terminal_reports_missing_urls_as_anomaly() {
    let api = MockApi::new();
    api.push_status("req-1", Ok(report(ProbeStatus::Completed, None, None)));
    let wf = workflow(&api);
    let mut rx = wf.subscribe();
    wf.submit("a dragon", 7).await.unwrap();

    let err = wait_terminal(&mut rx, None).await.unwrap_err();
    assert!(matches!(&err, EngineError::Anomaly(m) if m == NO_URLS_MESSAGE));
    assert!(!err.is_silent());
}

#[tokio::test(start_paused = true)]
async fn huge_backoff_keeps_polling_at_cap() {
    let api = MockApi::new();
    let policy = PollPolicy {
        interval: Duration::from_millis(1000),
        max_attempts: None,
        backoff: 1e20,
        max_interval: Duration::from_millis(5000),
    };
    let wf = ImageWorkflow::new(api.clone(), policy);
    wf.submit("a dragon", 7).await.unwrap();

    // probes at 1000, 6000 and 11000
    sleep(Duration::from_millis(11_001)).await;
    assert_eq!(MockApi::count(&api.status_calls), 3);
    assert_eq!(wf.state(), WorkflowState::Polling);
}

// =============================================================
// alerts
// =============================================================

#[tokio::test(start_paused = true)]
async fn dismiss_alert_clears_only_the_alert() {
    let api = MockApi::new();
    api.push_status("req-1", Ok(report(ProbeStatus::Failed, None, Some("GPU on fire"))));
    let wf = workflow(&api);
    let mut rx = wf.subscribe();
    wf.submit("a dragon", 7).await.unwrap();
    just_after(TICK).await;
    assert_eq!(wf.snapshot().alert.map(|a| a.kind), Some(AlertKind::Error));

    rx.borrow_and_update();
    wf.dismiss_alert();
    assert!(rx.has_changed().unwrap());
    let snap = wf.snapshot();
    assert!(snap.alert.is_none());
    assert_eq!(snap.state, WorkflowState::Failed);

    rx.borrow_and_update();
    wf.dismiss_alert();
    assert!(!rx.has_changed().unwrap());
}
