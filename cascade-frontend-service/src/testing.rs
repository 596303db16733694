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

//! Fixtures shared by the unit and integration tests.

pub use crate::clients::metadata::InMemoryMetadataStore;

use crate::clients::frontend::RemoteFrontendClient;
use crate::model::*;
use crate::service::{AdminService, WorkflowService};
use cascade_common::model::error::ServiceError;
use cascade_common::model::{
    ArchivalConfig, BadBinaries, ClusterName, DomainConfiguration, DomainId, DomainInfo,
    DomainMetadata, DomainReplicationConfig, DomainStatus,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub fn sample_domain(name: &str, is_global: bool) -> DomainMetadata {
    sample_domain_in(name, is_global, "primary", &["primary", "secondary"])
}

pub fn sample_domain_in(
    name: &str,
    is_global: bool,
    active: &str,
    clusters: &[&str],
) -> DomainMetadata {
    DomainMetadata {
        info: DomainInfo {
            id: DomainId::new_v4(),
            name: name.to_string(),
            status: DomainStatus::Registered,
            description: format!("test domain {name}"),
            owner_email: "owner@example.com".to_string(),
            data: HashMap::new(),
        },
        config: DomainConfiguration {
            retention_days: 7,
            history_archival: ArchivalConfig::default(),
            visibility_archival: ArchivalConfig::default(),
            bad_binaries: BadBinaries::default(),
        },
        replication_config: DomainReplicationConfig {
            active_cluster_name: ClusterName::from(active),
            clusters: clusters.iter().map(|c| ClusterName::from(*c)).collect(),
        },
        config_version: 0,
        failover_version: 1,
        previous_failover_version: 0,
        failover_end_time: None,
        is_global_domain: is_global,
        last_updated_time: Utc::now(),
        notification_version: 0,
    }
}

/// A "remote" frontend backed by another in-process service stack. Calls
/// arrive there on a fresh context, exactly like a forwarded request would.
pub struct LocalFrontendClient {
    workflow: Arc<dyn WorkflowService>,
    admin: Arc<dyn AdminService>,
}

impl LocalFrontendClient {
    pub fn new(workflow: Arc<dyn WorkflowService>, admin: Arc<dyn AdminService>) -> Self {
        Self { workflow, admin }
    }

    fn ctx() -> CallContext {
        CallContext::with_deadline(Duration::from_secs(70))
    }
}

#[async_trait]
impl RemoteFrontendClient for LocalFrontendClient {
    async fn start_workflow_execution(
        &self,
        request: StartWorkflowExecutionRequest,
    ) -> Result<StartWorkflowExecutionResponse, ServiceError> {
        self.workflow
            .start_workflow_execution(&Self::ctx(), request)
            .await
    }

    async fn signal_workflow_execution(
        &self,
        request: SignalWorkflowExecutionRequest,
    ) -> Result<(), ServiceError> {
        self.workflow
            .signal_workflow_execution(&Self::ctx(), request)
            .await
    }

    async fn signal_with_start_workflow_execution(
        &self,
        request: SignalWithStartWorkflowExecutionRequest,
    ) -> Result<StartWorkflowExecutionResponse, ServiceError> {
        self.workflow
            .signal_with_start_workflow_execution(&Self::ctx(), request)
            .await
    }

    async fn request_cancel_workflow_execution(
        &self,
        request: RequestCancelWorkflowExecutionRequest,
    ) -> Result<(), ServiceError> {
        self.workflow
            .request_cancel_workflow_execution(&Self::ctx(), request)
            .await
    }

    async fn terminate_workflow_execution(
        &self,
        request: TerminateWorkflowExecutionRequest,
    ) -> Result<(), ServiceError> {
        self.workflow
            .terminate_workflow_execution(&Self::ctx(), request)
            .await
    }

    async fn reset_workflow_execution(
        &self,
        request: ResetWorkflowExecutionRequest,
    ) -> Result<ResetWorkflowExecutionResponse, ServiceError> {
        self.workflow
            .reset_workflow_execution(&Self::ctx(), request)
            .await
    }

    async fn query_workflow(
        &self,
        request: QueryWorkflowRequest,
    ) -> Result<QueryWorkflowResponse, ServiceError> {
        self.workflow.query_workflow(&Self::ctx(), request).await
    }

    async fn poll_for_decision_task(
        &self,
        request: PollForDecisionTaskRequest,
    ) -> Result<PollForDecisionTaskResponse, ServiceError> {
        self.workflow
            .poll_for_decision_task(&Self::ctx(), request)
            .await
    }

    async fn poll_for_activity_task(
        &self,
        request: PollForActivityTaskRequest,
    ) -> Result<PollForActivityTaskResponse, ServiceError> {
        self.workflow
            .poll_for_activity_task(&Self::ctx(), request)
            .await
    }

    async fn respond_decision_task_completed(
        &self,
        request: RespondDecisionTaskCompletedRequest,
    ) -> Result<RespondDecisionTaskCompletedResponse, ServiceError> {
        self.workflow
            .respond_decision_task_completed(&Self::ctx(), request)
            .await
    }

    async fn respond_decision_task_failed(
        &self,
        request: RespondDecisionTaskFailedRequest,
    ) -> Result<(), ServiceError> {
        self.workflow
            .respond_decision_task_failed(&Self::ctx(), request)
            .await
    }

    async fn respond_query_task_completed(
        &self,
        request: RespondQueryTaskCompletedRequest,
    ) -> Result<(), ServiceError> {
        self.workflow
            .respond_query_task_completed(&Self::ctx(), request)
            .await
    }

    async fn respond_activity_task_completed(
        &self,
        request: RespondActivityTaskCompletedRequest,
    ) -> Result<(), ServiceError> {
        self.workflow
            .respond_activity_task_completed(&Self::ctx(), request)
            .await
    }

    async fn respond_activity_task_completed_by_id(
        &self,
        request: RespondActivityTaskCompletedByIdRequest,
    ) -> Result<(), ServiceError> {
        self.workflow
            .respond_activity_task_completed_by_id(&Self::ctx(), request)
            .await
    }

    async fn respond_activity_task_failed(
        &self,
        request: RespondActivityTaskFailedRequest,
    ) -> Result<(), ServiceError> {
        self.workflow
            .respond_activity_task_failed(&Self::ctx(), request)
            .await
    }

    async fn respond_activity_task_failed_by_id(
        &self,
        request: RespondActivityTaskFailedByIdRequest,
    ) -> Result<(), ServiceError> {
        self.workflow
            .respond_activity_task_failed_by_id(&Self::ctx(), request)
            .await
    }

    async fn respond_activity_task_canceled(
        &self,
        request: RespondActivityTaskCanceledRequest,
    ) -> Result<(), ServiceError> {
        self.workflow
            .respond_activity_task_canceled(&Self::ctx(), request)
            .await
    }

    async fn respond_activity_task_canceled_by_id(
        &self,
        request: RespondActivityTaskCanceledByIdRequest,
    ) -> Result<(), ServiceError> {
        self.workflow
            .respond_activity_task_canceled_by_id(&Self::ctx(), request)
            .await
    }

    async fn record_activity_task_heartbeat(
        &self,
        request: RecordActivityTaskHeartbeatRequest,
    ) -> Result<RecordActivityTaskHeartbeatResponse, ServiceError> {
        self.workflow
            .record_activity_task_heartbeat(&Self::ctx(), request)
            .await
    }

    async fn record_activity_task_heartbeat_by_id(
        &self,
        request: RecordActivityTaskHeartbeatByIdRequest,
    ) -> Result<RecordActivityTaskHeartbeatResponse, ServiceError> {
        self.workflow
            .record_activity_task_heartbeat_by_id(&Self::ctx(), request)
            .await
    }

    async fn describe_domain(
        &self,
        request: DescribeDomainRequest,
    ) -> Result<DescribeDomainResponse, ServiceError> {
        self.workflow.describe_domain(&Self::ctx(), request).await
    }

    async fn get_workflow_execution_raw_history_v2(
        &self,
        request: GetWorkflowExecutionRawHistoryV2Request,
    ) -> Result<GetWorkflowExecutionRawHistoryV2Response, ServiceError> {
        self.admin
            .get_workflow_execution_raw_history_v2(&Self::ctx(), request)
            .await
    }
}

