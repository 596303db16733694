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

use crate::cluster::TestCluster;
use crate::fakes::event;
use assert2::check;
use cascade_common::model::error::ServiceError;
use cascade_common::model::history::{EventType, History, TransientDecisionInfo};
use cascade_common::model::tokens::HistoryContinuationToken;
use cascade_common::model::{
    ArchivalStatus, HistoryEventFilterType, RunId, WorkflowExecution,
};
use cascade_frontend_service::model::*;
use cascade_frontend_service::service::WorkflowService;
use std::time::Duration;
use test_r::test;

fn history_request(workflow_id: &str) -> GetWorkflowExecutionHistoryRequest {
    GetWorkflowExecutionHistoryRequest {
        domain: "orders".to_string(),
        execution: WorkflowExecution {
            workflow_id: workflow_id.to_string(),
            run_id: None,
        },
        maximum_page_size: None,
        next_page_token: None,
        wait_for_new_event: false,
        history_event_filter_type: HistoryEventFilterType::AllEvent,
        skip_archival: false,
    }
}

fn closed_workflow_events(count: i64) -> Vec<cascade_common::model::history::HistoryEvent> {
    (1..=count)
        .map(|id| {
            let event_type = if id == 1 {
                EventType::WorkflowExecutionStarted
            } else if id == count {
                EventType::WorkflowExecutionCompleted
            } else {
                EventType::ActivityTaskScheduled
            };
            event(id, event_type)
        })
        .collect()
}

#[test]
async fn paged_reads_concatenate_without_gaps_or_duplicates() {
    let (a, _b) = crate::cluster::two_connected_clusters();
    let domain = a.register_domain("orders", false, "A").await;
    a.history
        .seed_workflow(&domain.info.id, "w1", closed_workflow_events(10), false);

    let mut collected = Vec::new();
    let mut request = history_request("w1");
    request.maximum_page_size = Some(3);

    let mut pages = 0;
    loop {
        let response = a
            .services
            .workflow_service
            .get_workflow_execution_history(&TestCluster::ctx(), request.clone())
            .await
            .unwrap();
        collected.extend(response.history.unwrap().events);
        pages += 1;
        match response.next_page_token {
            Some(token) => request.next_page_token = Some(token),
            None => break,
        }
        assert!(pages < 20, "paging does not terminate");
    }

    let ids: Vec<i64> = collected.iter().map(|e| e.event_id).collect();
    check!(ids == (1..=10).collect::<Vec<i64>>());
    check!(pages > 1);
}

#[test]
async fn close_event_only_long_poll_returns_exactly_the_close_event() {
    let (a, _b) = crate::cluster::two_connected_clusters();
    let domain = a.register_domain("orders", false, "A").await;
    a.history.seed_workflow(
        &domain.info.id,
        "w1",
        vec![event(1, EventType::WorkflowExecutionStarted)],
        true,
    );

    let history = a.history.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        history.append_events(
            "w1",
            vec![
                event(2, EventType::DecisionTaskScheduled),
                event(3, EventType::DecisionTaskStarted),
                event(4, EventType::DecisionTaskCompleted),
            ],
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        history.complete_workflow("w1");
    });

    let mut request = history_request("w1");
    request.wait_for_new_event = true;
    request.history_event_filter_type = HistoryEventFilterType::CloseEvent;

    let response = a
        .services
        .workflow_service
        .get_workflow_execution_history(&TestCluster::ctx(), request)
        .await
        .unwrap();

    let events = response.history.unwrap().events;
    check!(events.len() == 1);
    check!(events[0].event_type == EventType::WorkflowExecutionCompleted);
    check!(response.next_page_token.is_none());
}

#[test]
async fn continuation_token_with_wrong_run_id_is_rejected() {
    let (a, _b) = crate::cluster::two_connected_clusters();
    let domain = a.register_domain("orders", false, "A").await;
    a.history
        .seed_workflow(&domain.info.id, "w1", closed_workflow_events(10), false);

    let mut request = history_request("w1");
    request.maximum_page_size = Some(3);
    let response = a
        .services
        .workflow_service
        .get_workflow_execution_history(&TestCluster::ctx(), request.clone())
        .await
        .unwrap();

    request.next_page_token = response.next_page_token;
    request.execution.run_id = Some(RunId::new_v4());
    let error = a
        .services
        .workflow_service
        .get_workflow_execution_history(&TestCluster::ctx(), request)
        .await
        .unwrap_err();
    check!(matches!(error, ServiceError::BadRequest(_)));
}

#[test]
async fn token_encoding_round_trips() {
    let token = HistoryContinuationToken::new(
        RunId::new_v4(),
        1,
        42,
        false,
        b"cursor".to_vec(),
        None,
        b"branch".to_vec(),
    );
    let decoded = HistoryContinuationToken::decode(&token.encode().unwrap()).unwrap();
    check!(decoded == token);
}

#[test]
async fn transient_decision_events_are_appended_to_the_final_page() {
    let (a, _b) = crate::cluster::two_connected_clusters();
    let domain = a.register_domain("orders", false, "A").await;
    let run_id = a
        .history
        .seed_workflow(&domain.info.id, "w1", closed_workflow_events(10), false);

    let token = HistoryContinuationToken::new(
        run_id,
        1,
        11,
        false,
        Vec::new(),
        Some(TransientDecisionInfo {
            scheduled_event: event(11, EventType::DecisionTaskScheduled),
            started_event: event(12, EventType::DecisionTaskStarted),
        }),
        b"branch-w1".to_vec(),
    );

    let mut request = history_request("w1");
    request.next_page_token = Some(token.encode().unwrap());
    let response = a
        .services
        .workflow_service
        .get_workflow_execution_history(&TestCluster::ctx(), request)
        .await
        .unwrap();

    let events = response.history.unwrap().events;
    check!(events.len() == 12);
    check!(events[10].event_id == 11);
    check!(events[10].event_type == EventType::DecisionTaskScheduled);
    check!(events[11].event_id == 12);
    check!(response.next_page_token.is_none());
}

#[test]
async fn misplaced_transient_decision_events_fail_the_read() {
    let (a, _b) = crate::cluster::two_connected_clusters();
    let domain = a.register_domain("orders", false, "A").await;
    let run_id = a
        .history
        .seed_workflow(&domain.info.id, "w1", closed_workflow_events(10), false);

    let token = HistoryContinuationToken::new(
        run_id,
        1,
        11,
        false,
        Vec::new(),
        Some(TransientDecisionInfo {
            scheduled_event: event(99, EventType::DecisionTaskScheduled),
            started_event: event(100, EventType::DecisionTaskStarted),
        }),
        b"branch-w1".to_vec(),
    );

    let mut request = history_request("w1");
    request.next_page_token = Some(token.encode().unwrap());
    let error = a
        .services
        .workflow_service
        .get_workflow_execution_history(&TestCluster::ctx(), request)
        .await
        .unwrap_err();
    check!(matches!(error, ServiceError::Internal(_)));
}

#[test]
async fn retained_out_history_falls_back_to_the_archival_store() {
    let (mut a, _b) = crate::cluster::two_connected_clusters();
    a.set_archival(true);

    let request = RegisterDomainRequest {
        name: "orders".to_string(),
        description: None,
        owner_email: None,
        workflow_execution_retention_period_in_days: 7,
        data: None,
        clusters: None,
        active_cluster_name: Some(cascade_common::model::ClusterName::from("A")),
        is_global_domain: false,
        history_archival_status: Some(ArchivalStatus::Enabled),
        history_archival_uri: Some("fakestore://history".to_string()),
        visibility_archival_status: None,
        visibility_archival_uri: None,
        security_token: None,
    };
    a.services
        .workflow_service
        .register_domain(&TestCluster::ctx(), request)
        .await
        .unwrap();

    // nothing in live history, two batches in the archive
    a.archiver.seed(
        "w1",
        vec![
            History {
                events: vec![
                    event(1, EventType::WorkflowExecutionStarted),
                    event(2, EventType::DecisionTaskScheduled),
                ],
            },
            History {
                events: vec![event(3, EventType::WorkflowExecutionCompleted)],
            },
        ],
    );

    let mut request = history_request("w1");
    request.execution.run_id = Some(RunId::new_v4());
    let response = a
        .services
        .workflow_service
        .get_workflow_execution_history(&TestCluster::ctx(), request)
        .await
        .unwrap();

    check!(response.archived);
    let ids: Vec<i64> = response
        .history
        .unwrap()
        .events
        .iter()
        .map(|e| e.event_id)
        .collect();
    check!(ids == vec![1, 2, 3]);
}

#[test]
async fn without_archival_the_read_reports_the_retention_period() {
    let (a, _b) = crate::cluster::two_connected_clusters();
    a.register_domain("orders", false, "A").await;

    let error = a
        .services
        .workflow_service
        .get_workflow_execution_history(&TestCluster::ctx(), history_request("w-gone"))
        .await
        .unwrap_err();

    match error {
        ServiceError::EntityNotFound(message) => {
            check!(message.contains("retention period"));
        }
        other => panic!("expected entity-not-found, got {other:?}"),
    }
}
