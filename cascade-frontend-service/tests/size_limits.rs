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
use crate::fakes::event;
use assert2::check;
use cascade_common::model::error::ServiceError;
use cascade_common::model::history::EventType;
use cascade_common::model::tokens::TaskToken;
use cascade_common::model::{DomainMetadata, TaskList};
use cascade_frontend_service::model::*;
use cascade_frontend_service::service::WorkflowService;
use test_r::test;

// the test cluster config sets the error threshold to 1024 bytes
const ERROR_LIMIT: usize = 1024;

async fn workflow_with_token(
    cluster: &crate::cluster::TestCluster,
) -> (DomainMetadata, TaskToken) {
    let domain = cluster.register_domain("orders", false, "A").await;
    let run_id = cluster.history.seed_workflow(
        &domain.info.id,
        "w1",
        vec![event(1, EventType::WorkflowExecutionStarted)],
        true,
    );
    let token = TaskToken::new(
        domain.info.id.clone(),
        "w1".to_string(),
        run_id,
        5,
        1,
        "charge-card".to_string(),
        "PaymentActivity".to_string(),
    );
    (domain, token)
}

#[test]
async fn oversized_activity_result_fails_the_activity_instead_of_completing_it() {
    let (a, _b) = two_connected_clusters();
    let (_domain, token) = workflow_with_token(&a).await;

    let request = RespondActivityTaskCompletedRequest {
        task_token: token.encode().unwrap(),
        result: Some(vec![0u8; ERROR_LIMIT + 1]),
        identity: Some("worker-1".to_string()),
    };
    // the call itself succeeds; the worker is done either way
    a.services
        .workflow_service
        .respond_activity_task_completed(&TestCluster::ctx(), request)
        .await
        .unwrap();

    check!(a.history.activity_completions().is_empty());
    let failures = a.history.activity_failures();
    check!(failures.len() == 1);
    check!(failures[0].0 == "result exceeds limit");
    check!(failures[0].1 == ERROR_LIMIT);
}

#[test]
async fn oversized_heartbeat_fails_the_activity_and_requests_cancel() {
    let (a, _b) = two_connected_clusters();
    let (_domain, token) = workflow_with_token(&a).await;

    let request = RecordActivityTaskHeartbeatRequest {
        task_token: token.encode().unwrap(),
        details: Some(vec![0u8; ERROR_LIMIT + 1]),
        identity: None,
    };
    let response = a
        .services
        .workflow_service
        .record_activity_task_heartbeat(&TestCluster::ctx(), request)
        .await
        .unwrap();

    // success-shaped reply telling the worker to stop, plus the failure
    check!(response.cancel_requested);
    let failures = a.history.activity_failures();
    check!(failures.len() == 1);
    check!(failures[0].0 == "heartbeat details exceed limit");
}

#[test]
async fn oversized_failure_details_are_truncated_and_accepted() {
    let (a, _b) = two_connected_clusters();
    let (_domain, token) = workflow_with_token(&a).await;

    let request = RespondActivityTaskFailedRequest {
        task_token: token.encode().unwrap(),
        reason: Some("business error".to_string()),
        details: Some(vec![0u8; ERROR_LIMIT * 2]),
        identity: None,
    };
    a.services
        .workflow_service
        .respond_activity_task_failed(&TestCluster::ctx(), request)
        .await
        .unwrap();

    let failures = a.history.activity_failures();
    check!(failures.len() == 1);
    check!(failures[0].0 == "business error");
    check!(failures[0].1 == ERROR_LIMIT);
}

#[test]
async fn oversized_start_input_fails_the_call() {
    let (a, _b) = two_connected_clusters();
    a.register_domain("orders", false, "A").await;

    let request = StartWorkflowExecutionRequest {
        domain: "orders".to_string(),
        workflow_id: "w1".to_string(),
        workflow_type: WorkflowType {
            name: "ProcessOrder".to_string(),
        },
        task_list: TaskList {
            name: "orders-tl".to_string(),
            kind: Default::default(),
        },
        input: Some(vec![0u8; ERROR_LIMIT + 1]),
        execution_start_to_close_timeout_seconds: 60,
        task_start_to_close_timeout_seconds: 10,
        identity: None,
        request_id: "r1".to_string(),
        workflow_id_reuse_policy: None,
        retry_policy: None,
        cron_schedule: None,
        memo: None,
        search_attributes: None,
        delay_start_seconds: None,
    };
    let error = a
        .services
        .workflow_service
        .start_workflow_execution(&TestCluster::ctx(), request)
        .await
        .unwrap_err();
    check!(matches!(error, ServiceError::BadRequest(_)));
    check!(a.history.call_count("start_workflow_execution") == 0);
}

#[test]
async fn oversized_query_answer_is_converted_into_a_query_failure() {
    let (a, _b) = two_connected_clusters();
    let (_domain, token) = workflow_with_token(&a).await;

    let request = RespondQueryTaskCompletedRequest {
        task_token: token.encode().unwrap(),
        completed_type: QueryTaskCompletedType::Completed,
        query_result: Some(vec![0u8; ERROR_LIMIT + 1]),
        error_message: None,
    };
    a.services
        .workflow_service
        .respond_query_task_completed(&TestCluster::ctx(), request)
        .await
        .unwrap();

    let responses = a.matching.query_responses();
    check!(responses.len() == 1);
    check!(responses[0].completed_type == QueryTaskCompletedType::Failed);
    check!(responses[0].query_result.is_none());
    check!(responses[0].error_message.is_some());
}

#[test]
async fn oversized_decision_payload_force_fails_the_decision() {
    let (a, _b) = two_connected_clusters();
    let (_domain, token) = workflow_with_token(&a).await;

    let request = RespondDecisionTaskCompletedRequest {
        task_token: token.encode().unwrap(),
        decisions: vec![Decision {
            decision_type: DecisionType::RecordMarker,
            attributes: serde_json::json!({
                "markerName": "blob",
                "details": "x".repeat(ERROR_LIMIT + 1),
            }),
        }],
        execution_context: None,
        identity: None,
        sticky_attributes: None,
        return_new_decision_task: false,
        force_create_new_decision_task: false,
        binary_checksum: None,
    };
    let error = a
        .services
        .workflow_service
        .respond_decision_task_completed(&TestCluster::ctx(), request)
        .await
        .unwrap_err();

    check!(matches!(error, ServiceError::BadRequest(_)));
    check!(a.history.call_count("respond_decision_task_failed") == 1);
    check!(a.history.call_count("respond_decision_task_completed") == 0);
}

#[test]
async fn tokens_are_rehydrated_against_the_domain_cache() {
    let (a, _b) = two_connected_clusters();
    // a token whose embedded domain id does not exist locally is rejected
    let token = TaskToken::new(
        cascade_common::model::DomainId::new_v4(),
        "w1".to_string(),
        cascade_common::model::RunId::new_v4(),
        5,
        1,
        "a1".to_string(),
        "T".to_string(),
    );
    let request = RespondActivityTaskCompletedRequest {
        task_token: token.encode().unwrap(),
        result: None,
        identity: None,
    };
    let error = a
        .services
        .workflow_service
        .respond_activity_task_completed(&TestCluster::ctx(), request)
        .await
        .unwrap_err();
    check!(matches!(error, ServiceError::EntityNotFound(_)));
}
