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

//! Null backends for standalone operation: every call answers "unavailable"
//! so clients back off and retry, while the domain surface and health probes
//! stay fully functional.

use crate::clients::archival::{
    ArchivalError, GetArchivedHistoryRequest, GetArchivedHistoryResponse, HistoryArchiver,
    QueryArchivedVisibilityRequest, VisibilityArchiver,
};
use crate::clients::history::{
    HistoryClient, HistoryClientError, PollMutableStateRequest, PollMutableStateResponse,
    ReadHistoryBranchRequest, ReadHistoryBranchResponse, ReadRawHistoryBranchResponse,
};
use crate::clients::matching::{MatchingClient, MatchingClientError};
use crate::clients::visibility::{VisibilityError, VisibilityManager};
use crate::model::*;
use cascade_common::model::history::VersionHistoryItem;
use cascade_common::model::tokens::TaskToken;
use cascade_common::model::{
    ClusterName, DataBlob, DomainId, IndexedValueType, ReplicationMessages, ReplicationTask,
    RunId, TaskList, WorkflowExecution,
};
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

const NOT_CONNECTED: &str = "backend tier is not connected in this deployment";

pub struct UnconnectedHistoryClient;

#[async_trait]
impl HistoryClient for UnconnectedHistoryClient {
    async fn start_workflow_execution(
        &self,
        _shard_id: i32,
        _domain_id: &DomainId,
        _request: &StartWorkflowExecutionRequest,
    ) -> Result<RunId, HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn signal_workflow_execution(
        &self,
        _shard_id: i32,
        _domain_id: &DomainId,
        _request: &SignalWorkflowExecutionRequest,
    ) -> Result<(), HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn signal_with_start_workflow_execution(
        &self,
        _shard_id: i32,
        _domain_id: &DomainId,
        _request: &SignalWithStartWorkflowExecutionRequest,
    ) -> Result<RunId, HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn request_cancel_workflow_execution(
        &self,
        _shard_id: i32,
        _domain_id: &DomainId,
        _request: &RequestCancelWorkflowExecutionRequest,
    ) -> Result<(), HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn terminate_workflow_execution(
        &self,
        _shard_id: i32,
        _domain_id: &DomainId,
        _request: &TerminateWorkflowExecutionRequest,
    ) -> Result<(), HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn reset_workflow_execution(
        &self,
        _shard_id: i32,
        _domain_id: &DomainId,
        _request: &ResetWorkflowExecutionRequest,
    ) -> Result<RunId, HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn describe_workflow_execution(
        &self,
        _shard_id: i32,
        _domain_id: &DomainId,
        _request: &DescribeWorkflowExecutionRequest,
    ) -> Result<DescribeWorkflowExecutionResponse, HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn query_workflow(
        &self,
        _shard_id: i32,
        _domain_id: &DomainId,
        _request: &QueryWorkflowRequest,
    ) -> Result<QueryWorkflowResponse, HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn refresh_workflow_tasks(
        &self,
        _shard_id: i32,
        _domain_id: &DomainId,
        _execution: &WorkflowExecution,
    ) -> Result<(), HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn respond_decision_task_completed(
        &self,
        _shard_id: i32,
        _token: &TaskToken,
        _decisions_blob_size: usize,
        _request_binary_checksum: Option<String>,
    ) -> Result<RespondDecisionTaskCompletedResponse, HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn respond_decision_task_failed(
        &self,
        _shard_id: i32,
        _token: &TaskToken,
        _cause: Option<String>,
        _details: Option<Vec<u8>>,
    ) -> Result<(), HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn respond_activity_task_completed(
        &self,
        _shard_id: i32,
        _token: &TaskToken,
        _result: Option<Vec<u8>>,
        _identity: Option<String>,
    ) -> Result<(), HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn respond_activity_task_failed(
        &self,
        _shard_id: i32,
        _token: &TaskToken,
        _reason: Option<String>,
        _details: Option<Vec<u8>>,
        _identity: Option<String>,
    ) -> Result<(), HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn respond_activity_task_canceled(
        &self,
        _shard_id: i32,
        _token: &TaskToken,
        _details: Option<Vec<u8>>,
        _identity: Option<String>,
    ) -> Result<(), HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn record_activity_task_heartbeat(
        &self,
        _shard_id: i32,
        _token: &TaskToken,
        _details: Option<Vec<u8>>,
        _identity: Option<String>,
    ) -> Result<RecordActivityTaskHeartbeatResponse, HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn resolve_activity_task(
        &self,
        _shard_id: i32,
        _domain_id: &DomainId,
        _workflow_id: &str,
        _run_id: Option<&RunId>,
        _activity_id: &str,
    ) -> Result<TaskToken, HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn poll_mutable_state(
        &self,
        _shard_id: i32,
        _request: &PollMutableStateRequest,
    ) -> Result<PollMutableStateResponse, HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn read_history_branch(
        &self,
        _shard_id: i32,
        _request: &ReadHistoryBranchRequest,
    ) -> Result<ReadHistoryBranchResponse, HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn read_raw_history_branch(
        &self,
        _shard_id: i32,
        _request: &ReadHistoryBranchRequest,
    ) -> Result<ReadRawHistoryBranchResponse, HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn reapply_events(
        &self,
        _shard_id: i32,
        _domain_id: &DomainId,
        _execution: &WorkflowExecution,
        _events: DataBlob,
    ) -> Result<(), HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn replicate_events_v2(
        &self,
        _shard_id: i32,
        _domain_id: &DomainId,
        _workflow_id: &str,
        _run_id: &RunId,
        _version_history_items: Vec<VersionHistoryItem>,
        _events: DataBlob,
    ) -> Result<(), HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn read_dlq_messages(
        &self,
        _shard_id: i32,
        _source_cluster: &ClusterName,
        _inclusive_end_message_id: Option<i64>,
        _page_size: i32,
        _next_page_token: Option<Vec<u8>>,
    ) -> Result<(Vec<ReplicationTask>, Option<Vec<u8>>), HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn purge_dlq_messages(
        &self,
        _shard_id: i32,
        _source_cluster: &ClusterName,
        _inclusive_end_message_id: Option<i64>,
    ) -> Result<(), HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn merge_dlq_messages(
        &self,
        _shard_id: i32,
        _source_cluster: &ClusterName,
        _inclusive_end_message_id: Option<i64>,
        _page_size: i32,
        _next_page_token: Option<Vec<u8>>,
    ) -> Result<Option<Vec<u8>>, HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn get_replication_messages(
        &self,
        _shard_id: i32,
        _cluster: &ClusterName,
        _last_retrieved_message_id: i64,
    ) -> Result<ReplicationMessages, HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn get_dlq_replication_messages(
        &self,
        _shard_id: i32,
        _task_infos: &[ReplicationTaskInfo],
    ) -> Result<Vec<ReplicationTask>, HistoryClientError> {
        Err(HistoryClientError::Unavailable(NOT_CONNECTED.to_string()))
    }
}

pub struct UnconnectedMatchingClient;

#[async_trait]
impl MatchingClient for UnconnectedMatchingClient {
    async fn poll_for_decision_task(
        &self,
        _poller_id: Uuid,
        _domain_id: &DomainId,
        _request: &PollForDecisionTaskRequest,
        _timeout: Duration,
    ) -> Result<PollForDecisionTaskResponse, MatchingClientError> {
        Err(MatchingClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn poll_for_activity_task(
        &self,
        _poller_id: Uuid,
        _domain_id: &DomainId,
        _request: &PollForActivityTaskRequest,
        _timeout: Duration,
    ) -> Result<PollForActivityTaskResponse, MatchingClientError> {
        Err(MatchingClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn respond_query_task_completed(
        &self,
        _domain_id: &DomainId,
        _request: &RespondQueryTaskCompletedRequest,
    ) -> Result<(), MatchingClientError> {
        Err(MatchingClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn describe_task_list(
        &self,
        _domain_id: &DomainId,
        _request: &DescribeTaskListRequest,
    ) -> Result<DescribeTaskListResponse, MatchingClientError> {
        Err(MatchingClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn list_task_list_partitions(
        &self,
        _domain_id: &DomainId,
        _request: &ListTaskListPartitionsRequest,
    ) -> Result<ListTaskListPartitionsResponse, MatchingClientError> {
        Err(MatchingClientError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn cancel_outstanding_poll(
        &self,
        _domain_id: &DomainId,
        _poller_id: Uuid,
        _task_list_type: TaskListType,
        _task_list: &TaskList,
    ) -> Result<(), MatchingClientError> {
        Ok(())
    }
}

pub struct UnconnectedVisibilityManager;

#[async_trait]
impl VisibilityManager for UnconnectedVisibilityManager {
    async fn list_open_workflow_executions(
        &self,
        _domain_id: &DomainId,
        _request: &ListOpenWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, VisibilityError> {
        Err(VisibilityError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn list_closed_workflow_executions(
        &self,
        _domain_id: &DomainId,
        _request: &ListClosedWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, VisibilityError> {
        Err(VisibilityError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn list_workflow_executions(
        &self,
        _domain_id: &DomainId,
        _request: &ListWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, VisibilityError> {
        Err(VisibilityError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn scan_workflow_executions(
        &self,
        _domain_id: &DomainId,
        _request: &ListWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, VisibilityError> {
        Err(VisibilityError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn count_workflow_executions(
        &self,
        _domain_id: &DomainId,
        _request: &CountWorkflowExecutionsRequest,
    ) -> Result<CountWorkflowExecutionsResponse, VisibilityError> {
        Err(VisibilityError::Unavailable(NOT_CONNECTED.to_string()))
    }

    async fn add_search_attribute(
        &self,
        _key: &str,
        _value_type: IndexedValueType,
    ) -> Result<(), VisibilityError> {
        Err(VisibilityError::Unavailable(NOT_CONNECTED.to_string()))
    }
}

pub struct UnconnectedHistoryArchiver;

#[async_trait]
impl HistoryArchiver for UnconnectedHistoryArchiver {
    async fn get(
        &self,
        _uri: &str,
        _request: GetArchivedHistoryRequest,
    ) -> Result<GetArchivedHistoryResponse, ArchivalError> {
        Err(ArchivalError::Internal(NOT_CONNECTED.to_string()))
    }
}

pub struct UnconnectedVisibilityArchiver;

#[async_trait]
impl VisibilityArchiver for UnconnectedVisibilityArchiver {
    async fn query(
        &self,
        _uri: &str,
        _request: QueryArchivedVisibilityRequest,
    ) -> Result<ListWorkflowExecutionsResponse, ArchivalError> {
        Err(ArchivalError::Internal(NOT_CONNECTED.to_string()))
    }
}
