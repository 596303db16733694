// Copyright 2024-2025 Golem Cloud
//
// Licensed under the Golem Source License v1.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://license.golem.cloud/LICENSE
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::cluster::{two_connected_clusters, TestCluster};
use crate::fakes::DecisionPollBehavior;
use assert2::check;
use cascade_common::model::error::ServiceError;
use cascade_common::model::TaskList;
use cascade_frontend_service::model::*;
use cascade_frontend_service::service::WorkflowService;
use std::time::Duration;
use test_r::test;

fn poll_request(domain: &str) -> PollForDecisionTaskRequest {
    PollForDecisionTaskRequest {
        domain: domain.to_string(),
        task_list: TaskList {
            name: "orders-tl".to_string(),
            kind: Default::default(),
        },
        identity: Some("worker-1".to_string()),
        binary_checksum: None,
    }
}

#[test]
async fn canceled_poll_notifies_matching_and_returns_a_benign_empty_reply() {
    let (a, _b) = two_connected_clusters();
    a.register_domain("orders", false, "A").await;

    let ctx = CallContext::with_deadline(Duration::from_secs(2));
    let cancellation = ctx.cancellation.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancellation.cancel();
    });

    let response = a
        .services
        .workflow_service
        .poll_for_decision_task(&ctx, poll_request("orders"))
        .await
        .unwrap();

    // the client already gave up; it must not be charged an error
    check!(response == PollForDecisionTaskResponse::empty());

    // the detached cleanup reaches matching even though the caller is gone
    tokio::time::timeout(Duration::from_secs(2), a.matching.cancel_seen.notified())
        .await
        .expect("cancel_outstanding_poll was invoked");
    let canceled = a.matching.canceled_polls();
    check!(canceled.len() == 1);
    check!(canceled[0].1 == TaskListType::Decision);
    check!(canceled[0].2 == "orders-tl");
}

#[test]
async fn polls_require_a_deadline_within_the_long_poll_window() {
    let (a, _b) = two_connected_clusters();
    a.register_domain("orders", false, "A").await;

    let no_deadline = CallContext::default();
    let error = a
        .services
        .workflow_service
        .poll_for_decision_task(&no_deadline, poll_request("orders"))
        .await
        .unwrap_err();
    check!(matches!(error, ServiceError::BadRequest(_)));

    let too_short = CallContext::with_deadline(Duration::from_millis(5));
    let error = a
        .services
        .workflow_service
        .poll_for_decision_task(&too_short, poll_request("orders"))
        .await
        .unwrap_err();
    check!(matches!(error, ServiceError::BadRequest(_)));
}

#[test]
async fn delivered_tasks_are_passed_through() {
    let (a, _b) = two_connected_clusters();
    a.register_domain("orders", false, "A").await;

    let task = PollForDecisionTaskResponse {
        task_token: Some(b"token".to_vec()),
        started_event_id: Some(3),
        ..PollForDecisionTaskResponse::default()
    };
    a.matching
        .push_decision_poll(DecisionPollBehavior::Respond(Box::new(task.clone())));

    let response = a
        .services
        .workflow_service
        .poll_for_decision_task(
            &CallContext::with_deadline(Duration::from_secs(2)),
            poll_request("orders"),
        )
        .await
        .unwrap();
    check!(response == task);
}

#[test]
async fn poll_timeout_returns_the_empty_no_task_response() {
    let (a, _b) = two_connected_clusters();
    a.register_domain("orders", false, "A").await;

    // no queued behavior: the fake waits out the server-side long poll
    let response = a
        .services
        .workflow_service
        .poll_for_decision_task(
            &CallContext::with_deadline(Duration::from_millis(200)),
            poll_request("orders"),
        )
        .await
        .unwrap();
    check!(response == PollForDecisionTaskResponse::empty());
    check!(a.matching.canceled_polls().is_empty());
}
