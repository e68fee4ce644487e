mod common;

use common::*;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use veo_lro::{GenAiClient, JobError, OperationHandle, OperationPoller, PollOutcome};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Answers "still running" a fixed number of times, then "done".
struct RunningThenDone {
    calls: AtomicUsize,
    running: usize,
    finished: serde_json::Value,
}

impl wiremock::Respond for RunningThenDone {
    fn respond(&self, _request: &wiremock::Request) -> ResponseTemplate {
        let count = self.calls.fetch_add(1, Ordering::SeqCst);
        let body = if count < self.running {
            json!({ "name": OPERATION_NAME, "done": false })
        } else {
            self.finished.clone()
        };
        ResponseTemplate::new(200).set_body_json(body)
    }
}

async fn poller_for(server: &MockServer, finished: serde_json::Value) -> OperationPoller {
    Mock::given(method("GET"))
        .and(path(format!("/v1beta/{OPERATION_NAME}")))
        .respond_with(RunningThenDone {
            calls: AtomicUsize::new(0),
            running: 2,
            finished,
        })
        .mount(server)
        .await;

    let client = GenAiClient::new_with_url("test_api_key".to_string(), &server.uri(), MODEL).unwrap();
    OperationPoller::new(Arc::new(client), &fast_config())
}

fn handle() -> OperationHandle {
    OperationHandle(OPERATION_NAME.to_string())
}

#[tokio::test]
async fn polls_until_done_and_ticks_between_queries() {
    let server = MockServer::start().await;
    let poller = poller_for(&server, finished_operation("X")).await;

    let mut ticks = Vec::new();
    let outcome = poller
        .poll_until_done(&handle(), |polls| ticks.push(polls), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, PollOutcome::Done("X".to_string()));
    assert_eq!(ticks, vec![1, 2]);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn finished_without_video_is_missing_artifact() {
    let server = MockServer::start().await;
    let poller = poller_for(&server, json!({ "name": OPERATION_NAME, "done": true })).await;

    let err = poller
        .poll_until_done(&handle(), |_| {}, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err, JobError::MissingArtifact);
}

#[tokio::test]
async fn finished_with_error_is_operation_error() {
    let server = MockServer::start().await;
    let poller = poller_for(
        &server,
        json!({
            "name": OPERATION_NAME,
            "done": true,
            "error": { "code": 13, "message": "internal error" }
        }),
    )
    .await;

    let err = poller
        .poll_until_done(&handle(), |_| {}, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        JobError::OperationError {
            message: "internal error".into()
        }
    );
}

#[tokio::test]
async fn cancelled_token_prevents_any_query() {
    let server = MockServer::start().await;
    let poller = poller_for(&server, finished_operation("X")).await;
    let token = CancellationToken::new();
    token.cancel();

    let outcome = poller.poll_until_done(&handle(), |_| {}, &token).await.unwrap();

    assert_eq!(outcome, PollOutcome::Cancelled);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn submit_returns_operation_name() {
    let server = MockServer::start().await;
    mount_submit(&server).await;
    let client = GenAiClient::new_with_url("test_api_key".to_string(), &server.uri(), MODEL).unwrap();
    let poller = OperationPoller::new(Arc::new(client), &fast_config());

    let handle = poller.submit(&seed_input()).await.unwrap();

    assert_eq!(handle.as_str(), OPERATION_NAME);
}

#[tokio::test]
async fn submit_rejection_is_submission_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "Unsupported aspect ratio", "status": "INVALID_ARGUMENT" }
        })))
        .mount(&server)
        .await;
    let client = GenAiClient::new_with_url("test_api_key".to_string(), &server.uri(), MODEL).unwrap();
    let poller = OperationPoller::new(Arc::new(client), &fast_config());

    let err = poller.submit(&seed_input()).await.unwrap_err();

    assert_eq!(
        err,
        JobError::SubmissionFailed {
            message: "Unsupported aspect ratio".into()
        }
    );
}
