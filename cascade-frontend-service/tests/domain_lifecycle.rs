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
use assert2::check;
use cascade_common::model::error::ServiceError;
use cascade_common::model::{ClusterName, QueryConsistencyLevel, TaskList};
use cascade_frontend_service::clients::metadata::MetadataStore;
use cascade_frontend_service::model::*;
use cascade_frontend_service::service::WorkflowService;
use test_r::test;

fn start_request(domain: &str, workflow_id: &str) -> StartWorkflowExecutionRequest {
    StartWorkflowExecutionRequest {
        domain: domain.to_string(),
        workflow_id: workflow_id.to_string(),
        workflow_type: WorkflowType {
            name: "ProcessOrder".to_string(),
        },
        task_list: TaskList {
            name: "orders-tl".to_string(),
            kind: Default::default(),
        },
        input: Some(b"{}".to_vec()),
        execution_start_to_close_timeout_seconds: 60,
        task_start_to_close_timeout_seconds: 10,
        identity: Some("test-worker".to_string()),
        request_id: "r1".to_string(),
        workflow_id_reuse_policy: None,
        retry_policy: None,
        cron_schedule: None,
        memo: None,
        search_attributes: None,
        delay_start_seconds: None,
    }
}

#[test]
async fn registered_global_domain_becomes_visible_on_both_clusters() {
    let (a, b) = two_connected_clusters();

    a.register_domain("orders", true, "A").await;
    b.apply_domain_replication_from(&a).await;

    for cluster in [&a, &b] {
        let listed = cluster
            .services
            .workflow_service
            .list_domains(&TestCluster::ctx(), ListDomainsRequest::default())
            .await
            .unwrap();
        let domain = listed
            .domains
            .iter()
            .find(|domain| domain.info.name == "orders")
            .expect("domain is listed");
        check!(domain.replication_config.active_cluster_name == ClusterName::from("A"));
    }
}

#[test]
async fn failover_with_unanimous_versions_mints_a_newer_version() {
    let (a, b) = two_connected_clusters();

    let registered = a.register_domain("orders", true, "A").await;
    b.apply_domain_replication_from(&a).await;

    let mut update = UpdateDomainRequest::new("orders");
    update.active_cluster_name = Some(ClusterName::from("B"));
    update.failover_timeout_seconds = Some(30);
    let updated = a
        .services
        .workflow_service
        .update_domain(&TestCluster::ctx(), update)
        .await
        .unwrap()
        .domain;

    check!(updated.replication_config.active_cluster_name == ClusterName::from("B"));
    check!(updated.failover_version > registered.failover_version);
    // the new version is owned by B (initial 2, increment 10)
    check!(updated.failover_version % 10 == 2);
    check!(updated.failover_end_time.is_some());
    check!(updated.previous_failover_version == registered.failover_version);
}

#[test]
async fn graceful_failover_is_rejected_on_version_disagreement() {
    let (a, b) = two_connected_clusters();

    a.register_domain("orders", true, "A").await;
    b.apply_domain_replication_from(&a).await;

    // B lags behind: simulate an unreplicated failover by bumping only B
    let mut on_b = b.store.get_domain_by_name("orders").await.unwrap().unwrap();
    on_b.failover_version += 10;
    b.store.update_domain(&on_b).await.unwrap();

    let mut update = UpdateDomainRequest::new("orders");
    update.active_cluster_name = Some(ClusterName::from("B"));
    update.failover_timeout_seconds = Some(30);
    let error = a
        .services
        .workflow_service
        .update_domain(&TestCluster::ctx(), update)
        .await
        .unwrap_err();

    check!(error == ServiceError::bad_request("Concurrent failover is not allowed"));
}

#[test]
async fn start_on_passive_cluster_is_forwarded_to_the_active_one() {
    let (a, b) = two_connected_clusters();

    a.register_domain("orders", true, "B").await;
    b.apply_domain_replication_from(&a).await;

    let response = a
        .services
        .workflow_service
        .start_workflow_execution(&TestCluster::ctx(), start_request("orders", "w1"))
        .await
        .unwrap();

    // exactly one cross-cluster call: B's history saw the start, A's did not
    check!(b.history.call_count("start_workflow_execution") == 1);
    check!(a.history.call_count("start_workflow_execution") == 0);
    check!(b.history.run_id_of("w1") == response.run_id);
}

#[test]
async fn start_on_active_cluster_stays_local() {
    let (a, b) = two_connected_clusters();

    a.register_domain("orders", true, "A").await;
    b.apply_domain_replication_from(&a).await;

    a.services
        .workflow_service
        .start_workflow_execution(&TestCluster::ctx(), start_request("orders", "w1"))
        .await
        .unwrap();

    check!(a.history.call_count("start_workflow_execution") == 1);
    check!(b.history.call_count("start_workflow_execution") == 0);
}

#[test]
async fn eventually_consistent_queries_never_cross_clusters() {
    let (a, b) = two_connected_clusters();

    a.register_domain("orders", true, "B").await;
    b.apply_domain_replication_from(&a).await;
    a.history
        .seed_workflow(&a.store.get_domain_by_name("orders").await.unwrap().unwrap().info.id, "w1", vec![crate::fakes::event(1, cascade_common::model::history::EventType::WorkflowExecutionStarted)], true);

    let request = QueryWorkflowRequest {
        domain: "orders".to_string(),
        execution: cascade_common::model::WorkflowExecution {
            workflow_id: "w1".to_string(),
            run_id: None,
        },
        query: WorkflowQuery {
            query_type: "status".to_string(),
            query_args: None,
        },
        query_consistency_level: Some(QueryConsistencyLevel::Eventual),
    };
    a.services
        .workflow_service
        .query_workflow(&TestCluster::ctx(), request.clone())
        .await
        .unwrap();
    check!(a.history.call_count("query_workflow") == 1);
    check!(b.history.call_count("query_workflow") == 0);

    // a strongly consistent query goes where the domain is active
    let strong = QueryWorkflowRequest {
        query_consistency_level: Some(QueryConsistencyLevel::Strong),
        ..request
    };
    b.history.seed_workflow(
        &b.store
            .get_domain_by_name("orders")
            .await
            .unwrap()
            .unwrap()
            .info
            .id,
        "w1",
        vec![crate::fakes::event(
            1,
            cascade_common::model::history::EventType::WorkflowExecutionStarted,
        )],
        true,
    );
    a.services
        .workflow_service
        .query_workflow(&TestCluster::ctx(), strong)
        .await
        .unwrap();
    check!(b.history.call_count("query_workflow") == 1);
}

#[test]
async fn deprecated_domains_reject_new_workflows() {
    let (a, _b) = two_connected_clusters();
    a.register_domain("orders", false, "A").await;

    a.services
        .workflow_service
        .deprecate_domain(
            &TestCluster::ctx(),
            DeprecateDomainRequest {
                name: "orders".to_string(),
                security_token: None,
            },
        )
        .await
        .unwrap();

    let error = a
        .services
        .workflow_service
        .start_workflow_execution(&TestCluster::ctx(), start_request("orders", "w1"))
        .await
        .unwrap_err();
    check!(matches!(error, ServiceError::BadRequest(_)));
}

#[test]
async fn unknown_domains_surface_as_entity_not_found() {
    let (a, _b) = two_connected_clusters();
    let error = a
        .services
        .workflow_service
        .start_workflow_execution(&TestCluster::ctx(), start_request("nope", "w1"))
        .await
        .unwrap_err();
    check!(matches!(error, ServiceError::EntityNotFound(_)));
}
