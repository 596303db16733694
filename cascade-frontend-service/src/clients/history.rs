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

use crate::model::{
    DescribeWorkflowExecutionRequest, DescribeWorkflowExecutionResponse, QueryWorkflowRequest,
    QueryWorkflowResponse, RecordActivityTaskHeartbeatResponse,
    RequestCancelWorkflowExecutionRequest, ResetWorkflowExecutionRequest,
    RespondDecisionTaskCompletedResponse, SignalWithStartWorkflowExecutionRequest,
    SignalWorkflowExecutionRequest, StartWorkflowExecutionRequest,
    TerminateWorkflowExecutionRequest,
};
use cascade_common::model::history::{HistoryEvent, VersionHistories, VersionHistoryItem};
use cascade_common::model::tokens::TaskToken;
use cascade_common::model::{
    ClusterName, DataBlob, DomainId, ReplicationMessages, ReplicationTask, RunId,
    WorkflowExecution,
};
use cascade_common::SafeDisplay;
use async_trait::async_trait;
use rustc_hash::FxHasher;
use std::hash::Hasher;

/// Stable mapping from workflow id to the owning history shard. The hash must
/// agree across all frontends of a cluster, so it uses a fixed algorithm
/// rather than the std randomized one.
pub fn shard_for(workflow_id: &str, number_of_shards: i32) -> i32 {
    let mut hasher = FxHasher::default();
    hasher.write(workflow_id.as_bytes());
    (hasher.finish() % number_of_shards.max(1) as u64) as i32
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollMutableStateRequest {
    pub domain_id: DomainId,
    pub execution: WorkflowExecution,
    /// Long-polls until the run's next event id passes this value; the end
    /// sentinel waits for workflow close.
    pub expected_next_event_id: Option<i64>,
    pub current_branch_token: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollMutableStateResponse {
    pub run_id: RunId,
    pub current_branch_token: Vec<u8>,
    pub last_first_event_id: i64,
    pub next_event_id: i64,
    pub is_workflow_running: bool,
    pub version_histories: VersionHistories,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadHistoryBranchRequest {
    pub domain_id: DomainId,
    pub branch_token: Vec<u8>,
    /// Inclusive lower bound
    pub min_event_id: i64,
    /// Exclusive upper bound
    pub max_event_id: i64,
    pub page_size: i32,
    pub next_page_token: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadHistoryBranchResponse {
    pub events: Vec<HistoryEvent>,
    pub next_page_token: Vec<u8>,
    pub size: i64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadRawHistoryBranchResponse {
    pub batches: Vec<DataBlob>,
    pub next_page_token: Vec<u8>,
    pub size: i64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HistoryClientError {
    #[error("Entity not found: {0}")]
    EntityNotFound(String),
    #[error("Workflow execution already started")]
    ExecutionAlreadyStarted {
        start_request_id: String,
        run_id: RunId,
    },
    #[error("Cancellation already requested for workflow {0}")]
    CancellationAlreadyRequested(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Workflow events are missing, resend required")]
    RetryTask {
        run_id: RunId,
        start_event_id: Option<i64>,
        start_event_version: Option<i64>,
        end_event_id: Option<i64>,
        end_event_version: Option<i64>,
    },
    #[error("History host unavailable: {0}")]
    Unavailable(String),
    #[error("Internal history service error: {0}")]
    Internal(String),
}

impl HistoryClientError {
    pub fn is_retriable(error: &HistoryClientError) -> bool {
        matches!(error, HistoryClientError::Unavailable(_))
    }
}

impl SafeDisplay for HistoryClientError {
    fn to_safe_string(&self) -> String {
        self.to_string()
    }
}

impl From<HistoryClientError> for cascade_common::model::error::ServiceError {
    fn from(value: HistoryClientError) -> Self {
        use cascade_common::model::error::ServiceError;
        match value {
            HistoryClientError::EntityNotFound(message) => ServiceError::EntityNotFound(message),
            HistoryClientError::ExecutionAlreadyStarted {
                start_request_id,
                run_id,
            } => ServiceError::ExecutionAlreadyStarted {
                message: format!("Workflow execution is already running with run id {run_id}"),
                start_request_id,
                run_id,
            },
            HistoryClientError::CancellationAlreadyRequested(workflow_id) => {
                ServiceError::CancellationAlreadyRequested(workflow_id)
            }
            HistoryClientError::QueryFailed(message) => ServiceError::QueryFailed(message),
            HistoryClientError::RetryTask { .. } => {
                ServiceError::Internal(value.to_string())
            }
            HistoryClientError::Unavailable(message) => ServiceError::ServiceBusy(message),
            HistoryClientError::Internal(message) => ServiceError::Internal(message),
        }
    }
}

/// Contract of the history tier as consumed by the frontend. Callers resolve
/// the owning shard with [`shard_for`] and pass it explicitly; cross-shard
/// fan-out operations take the shard list instead.
#[async_trait]
pub trait HistoryClient: Send + Sync {
    async fn start_workflow_execution(
        &self,
        shard_id: i32,
        domain_id: &DomainId,
        request: &StartWorkflowExecutionRequest,
    ) -> Result<RunId, HistoryClientError>;

    async fn signal_workflow_execution(
        &self,
        shard_id: i32,
        domain_id: &DomainId,
        request: &SignalWorkflowExecutionRequest,
    ) -> Result<(), HistoryClientError>;

    async fn signal_with_start_workflow_execution(
        &self,
        shard_id: i32,
        domain_id: &DomainId,
        request: &SignalWithStartWorkflowExecutionRequest,
    ) -> Result<RunId, HistoryClientError>;

    async fn request_cancel_workflow_execution(
        &self,
        shard_id: i32,
        domain_id: &DomainId,
        request: &RequestCancelWorkflowExecutionRequest,
    ) -> Result<(), HistoryClientError>;

    async fn terminate_workflow_execution(
        &self,
        shard_id: i32,
        domain_id: &DomainId,
        request: &TerminateWorkflowExecutionRequest,
    ) -> Result<(), HistoryClientError>;

    async fn reset_workflow_execution(
        &self,
        shard_id: i32,
        domain_id: &DomainId,
        request: &ResetWorkflowExecutionRequest,
    ) -> Result<RunId, HistoryClientError>;

    async fn describe_workflow_execution(
        &self,
        shard_id: i32,
        domain_id: &DomainId,
        request: &DescribeWorkflowExecutionRequest,
    ) -> Result<DescribeWorkflowExecutionResponse, HistoryClientError>;

    async fn query_workflow(
        &self,
        shard_id: i32,
        domain_id: &DomainId,
        request: &QueryWorkflowRequest,
    ) -> Result<QueryWorkflowResponse, HistoryClientError>;

    async fn refresh_workflow_tasks(
        &self,
        shard_id: i32,
        domain_id: &DomainId,
        execution: &WorkflowExecution,
    ) -> Result<(), HistoryClientError>;

    async fn respond_decision_task_completed(
        &self,
        shard_id: i32,
        token: &TaskToken,
        decisions_blob_size: usize,
        request_binary_checksum: Option<String>,
    ) -> Result<RespondDecisionTaskCompletedResponse, HistoryClientError>;

    async fn respond_decision_task_failed(
        &self,
        shard_id: i32,
        token: &TaskToken,
        cause: Option<String>,
        details: Option<Vec<u8>>,
    ) -> Result<(), HistoryClientError>;

    async fn respond_activity_task_completed(
        &self,
        shard_id: i32,
        token: &TaskToken,
        result: Option<Vec<u8>>,
        identity: Option<String>,
    ) -> Result<(), HistoryClientError>;

    async fn respond_activity_task_failed(
        &self,
        shard_id: i32,
        token: &TaskToken,
        reason: Option<String>,
        details: Option<Vec<u8>>,
        identity: Option<String>,
    ) -> Result<(), HistoryClientError>;

    async fn respond_activity_task_canceled(
        &self,
        shard_id: i32,
        token: &TaskToken,
        details: Option<Vec<u8>>,
        identity: Option<String>,
    ) -> Result<(), HistoryClientError>;

    async fn record_activity_task_heartbeat(
        &self,
        shard_id: i32,
        token: &TaskToken,
        details: Option<Vec<u8>>,
        identity: Option<String>,
    ) -> Result<RecordActivityTaskHeartbeatResponse, HistoryClientError>;

    /// Resolves an activity addressed by id to its task token.
    async fn resolve_activity_task(
        &self,
        shard_id: i32,
        domain_id: &DomainId,
        workflow_id: &str,
        run_id: Option<&RunId>,
        activity_id: &str,
    ) -> Result<TaskToken, HistoryClientError>;

    async fn poll_mutable_state(
        &self,
        shard_id: i32,
        request: &PollMutableStateRequest,
    ) -> Result<PollMutableStateResponse, HistoryClientError>;

    async fn read_history_branch(
        &self,
        shard_id: i32,
        request: &ReadHistoryBranchRequest,
    ) -> Result<ReadHistoryBranchResponse, HistoryClientError>;

    async fn read_raw_history_branch(
        &self,
        shard_id: i32,
        request: &ReadHistoryBranchRequest,
    ) -> Result<ReadRawHistoryBranchResponse, HistoryClientError>;

    async fn reapply_events(
        &self,
        shard_id: i32,
        domain_id: &DomainId,
        execution: &WorkflowExecution,
        events: DataBlob,
    ) -> Result<(), HistoryClientError>;

    async fn replicate_events_v2(
        &self,
        shard_id: i32,
        domain_id: &DomainId,
        workflow_id: &str,
        run_id: &RunId,
        version_history_items: Vec<VersionHistoryItem>,
        events: DataBlob,
    ) -> Result<(), HistoryClientError>;

    async fn read_dlq_messages(
        &self,
        shard_id: i32,
        source_cluster: &ClusterName,
        inclusive_end_message_id: Option<i64>,
        page_size: i32,
        next_page_token: Option<Vec<u8>>,
    ) -> Result<(Vec<ReplicationTask>, Option<Vec<u8>>), HistoryClientError>;

    async fn purge_dlq_messages(
        &self,
        shard_id: i32,
        source_cluster: &ClusterName,
        inclusive_end_message_id: Option<i64>,
    ) -> Result<(), HistoryClientError>;

    async fn merge_dlq_messages(
        &self,
        shard_id: i32,
        source_cluster: &ClusterName,
        inclusive_end_message_id: Option<i64>,
        page_size: i32,
        next_page_token: Option<Vec<u8>>,
    ) -> Result<Option<Vec<u8>>, HistoryClientError>;

    async fn get_replication_messages(
        &self,
        shard_id: i32,
        cluster: &ClusterName,
        last_retrieved_message_id: i64,
    ) -> Result<ReplicationMessages, HistoryClientError>;

    /// Fetches the DLQ'd replication tasks matching the given (workflow,
    /// task id) references from the owning shard.
    async fn get_dlq_replication_messages(
        &self,
        shard_id: i32,
        task_infos: &[crate::model::ReplicationTaskInfo],
    ) -> Result<Vec<ReplicationTask>, HistoryClientError>;
}

#[cfg(test)]
mod tests {
    use test_r::test;

    use super::shard_for;

    #[test]
    fn shard_routing_is_stable_and_in_range() {
        for workflow_id in ["w1", "order-workflow", "", "☃"] {
            let shard = shard_for(workflow_id, 16);
            assert_eq!(shard, shard_for(workflow_id, 16));
            assert!((0..16).contains(&shard));
        }
    }

    #[test]
    fn single_shard_deployments_always_route_to_zero() {
        assert_eq!(shard_for("anything", 1), 0);
        assert_eq!(shard_for("anything", 0), 0);
    }
}
