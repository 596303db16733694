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

use cascade_common::model::history::{History, VersionHistory};
use cascade_common::model::{
    ArchivalStatus, BadBinaries, ClusterName, DataBlob, DomainId, DomainMetadata,
    HistoryEventFilterType, HostInfo, IndexedValueType, QueryConsistencyLevel, QueueType,
    ReplicationMessages, ReplicationTask, RunId, ServiceRole, TaskList, WorkflowExecution,
    WorkflowIdReusePolicy,
};
use chrono::{DateTime, Utc};
use poem_openapi::{Enum, Object};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Per-request context assembled by the API layer: the client's deadline,
/// the cancellation signal of the incoming connection, and the SDK identity
/// and capability headers.
#[derive(Clone, Debug)]
pub struct CallContext {
    pub deadline: Option<Instant>,
    pub cancellation: CancellationToken,
    pub client_impl: Option<String>,
    pub feature_version: Option<String>,
    pub features: ClientFeatureFlags,
}

impl Default for CallContext {
    fn default() -> Self {
        Self {
            deadline: None,
            cancellation: CancellationToken::new(),
            client_impl: None,
            feature_version: None,
            features: ClientFeatureFlags::default(),
        }
    }
}

impl CallContext {
    pub fn with_deadline(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            ..Self::default()
        }
    }

    pub fn remaining_time(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_canceled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Feature capabilities advertised by the client SDK, parsed from the
/// features header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientFeatureFlags {
    pub raw_history_query: bool,
}

impl ClientFeatureFlags {
    pub fn parse(header: &str) -> Self {
        let mut flags = Self::default();
        for feature in header.split(',') {
            if feature.trim() == "raw-history-query" {
                flags.raw_history_query = true;
            }
        }
        flags
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct WorkflowType {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct ActivityType {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct Memo {
    pub fields: HashMap<String, Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct SearchAttributes {
    pub indexed_fields: HashMap<String, Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Object)]
pub struct HealthcheckResponse {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Object)]
pub struct VersionInfo {
    pub version: String,
}

// --- Domain surface ---------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct RegisterDomainRequest {
    pub name: String,
    pub description: Option<String>,
    pub owner_email: Option<String>,
    pub workflow_execution_retention_period_in_days: i32,
    pub data: Option<HashMap<String, String>>,
    pub clusters: Option<Vec<ClusterName>>,
    pub active_cluster_name: Option<ClusterName>,
    #[oai(default)]
    #[serde(default)]
    pub is_global_domain: bool,
    pub history_archival_status: Option<ArchivalStatus>,
    pub history_archival_uri: Option<String>,
    pub visibility_archival_status: Option<ArchivalStatus>,
    pub visibility_archival_uri: Option<String>,
    pub security_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct RegisterDomainResponse {
    pub domain: DomainMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct DescribeDomainRequest {
    pub name: Option<String>,
    pub uuid: Option<DomainId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct DescribeDomainResponse {
    pub domain: DomainMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct ListDomainsRequest {
    pub page_size: Option<i32>,
    pub next_page_token: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct ListDomainsResponse {
    pub domains: Vec<DomainMetadata>,
    pub next_page_token: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct UpdateDomainRequest {
    pub name: String,
    pub description: Option<String>,
    pub owner_email: Option<String>,
    pub data: Option<HashMap<String, String>>,
    pub workflow_execution_retention_period_in_days: Option<i32>,
    pub bad_binaries: Option<BadBinaries>,
    pub history_archival_status: Option<ArchivalStatus>,
    pub history_archival_uri: Option<String>,
    pub visibility_archival_status: Option<ArchivalStatus>,
    pub visibility_archival_uri: Option<String>,
    pub active_cluster_name: Option<ClusterName>,
    pub clusters: Option<Vec<ClusterName>>,
    /// Present iff the failover should be graceful; bounds the drain window
    pub failover_timeout_seconds: Option<i32>,
    pub security_token: Option<String>,
}

impl UpdateDomainRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            owner_email: None,
            data: None,
            workflow_execution_retention_period_in_days: None,
            bad_binaries: None,
            history_archival_status: None,
            history_archival_uri: None,
            visibility_archival_status: None,
            visibility_archival_uri: None,
            active_cluster_name: None,
            clusters: None,
            failover_timeout_seconds: None,
            security_token: None,
        }
    }

    /// A request is a failover iff it sets the active cluster.
    pub fn is_failover_request(&self) -> bool {
        self.active_cluster_name.is_some()
    }

    pub fn is_graceful_failover_request(&self) -> bool {
        self.is_failover_request() && self.failover_timeout_seconds.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct UpdateDomainResponse {
    pub domain: DomainMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct DeprecateDomainRequest {
    pub name: String,
    pub security_token: Option<String>,
}

// --- Workflow mutations -----------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct StartWorkflowExecutionRequest {
    pub domain: String,
    pub workflow_id: String,
    pub workflow_type: WorkflowType,
    pub task_list: TaskList,
    pub input: Option<Vec<u8>>,
    pub execution_start_to_close_timeout_seconds: i32,
    pub task_start_to_close_timeout_seconds: i32,
    pub identity: Option<String>,
    pub request_id: String,
    pub workflow_id_reuse_policy: Option<WorkflowIdReusePolicy>,
    pub retry_policy: Option<RetryPolicy>,
    pub cron_schedule: Option<String>,
    pub memo: Option<Memo>,
    pub search_attributes: Option<SearchAttributes>,
    pub delay_start_seconds: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct RetryPolicy {
    pub initial_interval_in_seconds: i32,
    pub backoff_coefficient: f64,
    pub maximum_interval_in_seconds: i32,
    pub maximum_attempts: i32,
    pub expiration_interval_in_seconds: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct StartWorkflowExecutionResponse {
    pub run_id: RunId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct SignalWorkflowExecutionRequest {
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
    pub signal_name: String,
    pub input: Option<Vec<u8>>,
    pub identity: Option<String>,
    pub request_id: Option<String>,
    pub control: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct SignalWithStartWorkflowExecutionRequest {
    pub domain: String,
    pub workflow_id: String,
    pub workflow_type: WorkflowType,
    pub task_list: TaskList,
    pub input: Option<Vec<u8>>,
    pub execution_start_to_close_timeout_seconds: i32,
    pub task_start_to_close_timeout_seconds: i32,
    pub identity: Option<String>,
    pub request_id: Option<String>,
    pub workflow_id_reuse_policy: Option<WorkflowIdReusePolicy>,
    pub signal_name: String,
    pub signal_input: Option<Vec<u8>>,
    pub control: Option<Vec<u8>>,
    pub retry_policy: Option<RetryPolicy>,
    pub cron_schedule: Option<String>,
    pub memo: Option<Memo>,
    pub search_attributes: Option<SearchAttributes>,
    pub delay_start_seconds: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct RequestCancelWorkflowExecutionRequest {
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
    pub identity: Option<String>,
    pub request_id: Option<String>,
    pub cause: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct TerminateWorkflowExecutionRequest {
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
    pub reason: Option<String>,
    pub details: Option<Vec<u8>>,
    pub identity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct ResetWorkflowExecutionRequest {
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
    pub reason: Option<String>,
    pub decision_finish_event_id: i64,
    pub request_id: String,
    #[oai(default)]
    #[serde(default)]
    pub skip_signal_reapply: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct ResetWorkflowExecutionResponse {
    pub run_id: RunId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct RefreshWorkflowTasksRequest {
    pub domain: String,
    pub workflow_execution: WorkflowExecution,
}

// --- Query / describe -------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct WorkflowQuery {
    pub query_type: String,
    pub query_args: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct QueryWorkflowRequest {
    pub domain: String,
    pub execution: WorkflowExecution,
    pub query: WorkflowQuery,
    pub query_consistency_level: Option<QueryConsistencyLevel>,
}

impl QueryWorkflowRequest {
    pub fn consistency_level(&self) -> QueryConsistencyLevel {
        self.query_consistency_level.unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct QueryRejected {
    pub close_status: Option<WorkflowExecutionCloseStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct QueryWorkflowResponse {
    pub query_result: Option<Vec<u8>>,
    pub query_rejected: Option<QueryRejected>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Enum,
)]
pub enum WorkflowExecutionCloseStatus {
    Completed,
    Failed,
    Canceled,
    Terminated,
    ContinuedAsNew,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct DescribeWorkflowExecutionRequest {
    pub domain: String,
    pub execution: WorkflowExecution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct WorkflowExecutionInfo {
    pub execution: WorkflowExecution,
    pub workflow_type: WorkflowType,
    pub start_time: Option<DateTime<Utc>>,
    pub close_time: Option<DateTime<Utc>>,
    pub close_status: Option<WorkflowExecutionCloseStatus>,
    pub history_length: i64,
    pub search_attributes: Option<SearchAttributes>,
    pub memo: Option<Memo>,
    pub task_list: String,
    pub is_cron: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct DescribeWorkflowExecutionResponse {
    pub workflow_execution_info: WorkflowExecutionInfo,
    pub pending_activity_count: i32,
    pub pending_children_count: i32,
}

// --- History read -----------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct GetWorkflowExecutionHistoryRequest {
    pub domain: String,
    pub execution: WorkflowExecution,
    pub maximum_page_size: Option<i32>,
    pub next_page_token: Option<Vec<u8>>,
    /// Long-poll: suspend until new events are available (or the deadline)
    #[oai(default)]
    #[serde(default)]
    pub wait_for_new_event: bool,
    #[oai(default)]
    #[serde(default)]
    pub history_event_filter_type: HistoryEventFilterType,
    #[oai(default)]
    #[serde(default)]
    pub skip_archival: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct GetWorkflowExecutionHistoryResponse {
    pub history: Option<History>,
    pub raw_history: Option<Vec<DataBlob>>,
    pub next_page_token: Option<Vec<u8>>,
    #[oai(default)]
    #[serde(default)]
    pub archived: bool,
}

// --- Task delivery ----------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct PollForDecisionTaskRequest {
    pub domain: String,
    pub task_list: TaskList,
    pub identity: Option<String>,
    pub binary_checksum: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct PollForDecisionTaskResponse {
    pub task_token: Option<Vec<u8>>,
    pub workflow_execution: Option<WorkflowExecution>,
    pub workflow_type: Option<WorkflowType>,
    pub previous_started_event_id: Option<i64>,
    pub started_event_id: Option<i64>,
    pub attempt: Option<i64>,
    pub backlog_count_hint: Option<i64>,
    pub history: Option<History>,
    pub next_page_token: Option<Vec<u8>>,
    pub query: Option<WorkflowQuery>,
}

impl PollForDecisionTaskResponse {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct PollForActivityTaskRequest {
    pub domain: String,
    pub task_list: TaskList,
    pub identity: Option<String>,
    pub task_list_metadata: Option<TaskListMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct TaskListMetadata {
    pub max_tasks_per_second: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct PollForActivityTaskResponse {
    pub task_token: Option<Vec<u8>>,
    pub workflow_execution: Option<WorkflowExecution>,
    pub activity_id: Option<String>,
    pub activity_type: Option<ActivityType>,
    pub input: Option<Vec<u8>>,
    pub scheduled_timestamp: Option<i64>,
    pub started_timestamp: Option<i64>,
    pub schedule_to_close_timeout_seconds: Option<i32>,
    pub start_to_close_timeout_seconds: Option<i32>,
    pub heartbeat_timeout_seconds: Option<i32>,
    pub attempt: Option<i32>,
    pub heartbeat_details: Option<Vec<u8>>,
    pub workflow_type: Option<WorkflowType>,
    pub workflow_domain: Option<String>,
}

impl PollForActivityTaskResponse {
    pub fn empty() -> Self {
        Self::default()
    }
}

// --- Worker response callbacks ----------------------------------------------

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Enum,
)]
pub enum DecisionType {
    ScheduleActivityTask,
    RequestCancelActivityTask,
    StartTimer,
    CompleteWorkflowExecution,
    FailWorkflowExecution,
    CancelTimer,
    CancelWorkflowExecution,
    RequestCancelExternalWorkflowExecution,
    RecordMarker,
    ContinueAsNewWorkflowExecution,
    StartChildWorkflowExecution,
    SignalExternalWorkflowExecution,
    UpsertWorkflowSearchAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct Decision {
    pub decision_type: DecisionType,
    pub attributes: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct StickyExecutionAttributes {
    pub worker_task_list: TaskList,
    pub schedule_to_start_timeout_seconds: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct RespondDecisionTaskCompletedRequest {
    pub task_token: Vec<u8>,
    pub decisions: Vec<Decision>,
    pub execution_context: Option<Vec<u8>>,
    pub identity: Option<String>,
    pub sticky_attributes: Option<StickyExecutionAttributes>,
    #[oai(default)]
    #[serde(default)]
    pub return_new_decision_task: bool,
    #[oai(default)]
    #[serde(default)]
    pub force_create_new_decision_task: bool,
    pub binary_checksum: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct RespondDecisionTaskCompletedResponse {
    pub decision_task: Option<PollForDecisionTaskResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct RespondDecisionTaskFailedRequest {
    pub task_token: Vec<u8>,
    pub cause: Option<String>,
    pub details: Option<Vec<u8>>,
    pub identity: Option<String>,
    pub binary_checksum: Option<String>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Enum,
)]
pub enum QueryTaskCompletedType {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct RespondQueryTaskCompletedRequest {
    pub task_token: Vec<u8>,
    pub completed_type: QueryTaskCompletedType,
    pub query_result: Option<Vec<u8>>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct RespondActivityTaskCompletedRequest {
    pub task_token: Vec<u8>,
    pub result: Option<Vec<u8>>,
    pub identity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct RespondActivityTaskCompletedByIdRequest {
    pub domain: String,
    pub workflow_id: String,
    pub run_id: Option<RunId>,
    pub activity_id: String,
    pub result: Option<Vec<u8>>,
    pub identity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct RespondActivityTaskFailedRequest {
    pub task_token: Vec<u8>,
    pub reason: Option<String>,
    pub details: Option<Vec<u8>>,
    pub identity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct RespondActivityTaskFailedByIdRequest {
    pub domain: String,
    pub workflow_id: String,
    pub run_id: Option<RunId>,
    pub activity_id: String,
    pub reason: Option<String>,
    pub details: Option<Vec<u8>>,
    pub identity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct RespondActivityTaskCanceledRequest {
    pub task_token: Vec<u8>,
    pub details: Option<Vec<u8>>,
    pub identity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct RespondActivityTaskCanceledByIdRequest {
    pub domain: String,
    pub workflow_id: String,
    pub run_id: Option<RunId>,
    pub activity_id: String,
    pub details: Option<Vec<u8>>,
    pub identity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct RecordActivityTaskHeartbeatRequest {
    pub task_token: Vec<u8>,
    pub details: Option<Vec<u8>>,
    pub identity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct RecordActivityTaskHeartbeatByIdRequest {
    pub domain: String,
    pub workflow_id: String,
    pub run_id: Option<RunId>,
    pub activity_id: String,
    pub details: Option<Vec<u8>>,
    pub identity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct RecordActivityTaskHeartbeatResponse {
    #[oai(default)]
    #[serde(default)]
    pub cancel_requested: bool,
}

// --- Task lists -------------------------------------------------------------

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Enum,
)]
pub enum TaskListType {
    Decision,
    Activity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct DescribeTaskListRequest {
    pub domain: String,
    pub task_list: TaskList,
    pub task_list_type: TaskListType,
    #[oai(default)]
    #[serde(default)]
    pub include_task_list_status: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct PollerInfo {
    pub identity: String,
    pub last_access_time: Option<DateTime<Utc>>,
    pub rate_per_second: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct TaskListStatus {
    pub backlog_count_hint: i64,
    pub read_level: i64,
    pub ack_level: i64,
    pub rate_per_second: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct DescribeTaskListResponse {
    pub pollers: Vec<PollerInfo>,
    pub task_list_status: Option<TaskListStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct ListTaskListPartitionsRequest {
    pub domain: String,
    pub task_list: TaskList,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct TaskListPartitionMetadata {
    pub key: String,
    pub owner_host_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct ListTaskListPartitionsResponse {
    pub activity_task_list_partitions: Vec<TaskListPartitionMetadata>,
    pub decision_task_list_partitions: Vec<TaskListPartitionMetadata>,
}

// --- Visibility -------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct StartTimeFilter {
    pub earliest_time: Option<DateTime<Utc>>,
    pub latest_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct WorkflowExecutionFilter {
    pub workflow_id: String,
    pub run_id: Option<RunId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct WorkflowTypeFilter {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct ListOpenWorkflowExecutionsRequest {
    pub domain: String,
    pub maximum_page_size: Option<i32>,
    pub next_page_token: Option<Vec<u8>>,
    pub start_time_filter: Option<StartTimeFilter>,
    pub execution_filter: Option<WorkflowExecutionFilter>,
    pub type_filter: Option<WorkflowTypeFilter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct ListClosedWorkflowExecutionsRequest {
    pub domain: String,
    pub maximum_page_size: Option<i32>,
    pub next_page_token: Option<Vec<u8>>,
    pub start_time_filter: Option<StartTimeFilter>,
    pub execution_filter: Option<WorkflowExecutionFilter>,
    pub type_filter: Option<WorkflowTypeFilter>,
    pub status_filter: Option<WorkflowExecutionCloseStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct ListWorkflowExecutionsResponse {
    pub executions: Vec<WorkflowExecutionInfo>,
    pub next_page_token: Option<Vec<u8>>,
}

/// Query-string based list/scan/count, also used for archived visibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct ListWorkflowExecutionsRequest {
    pub domain: String,
    pub page_size: Option<i32>,
    pub next_page_token: Option<Vec<u8>>,
    pub query: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct CountWorkflowExecutionsRequest {
    pub domain: String,
    pub query: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct CountWorkflowExecutionsResponse {
    pub count: i64,
}

// --- Meta -------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct SupportedClientVersions {
    pub go_sdk: String,
    pub java_sdk: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct GetClusterInfoResponse {
    pub supported_client_versions: SupportedClientVersions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct GetSearchAttributesResponse {
    pub keys: HashMap<String, IndexedValueType>,
}

// --- Admin surface ----------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct RingInfo {
    pub role: ServiceRole,
    pub member_count: i32,
    pub members: Vec<HostInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct MembershipInfo {
    pub current_host: Option<HostInfo>,
    pub reachable_members: Vec<String>,
    pub rings: Vec<RingInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct DescribeClusterResponse {
    pub membership_info: MembershipInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct GetWorkflowExecutionRawHistoryV2Request {
    pub domain: String,
    pub execution: WorkflowExecution,
    pub start_event_id: Option<i64>,
    pub start_event_version: Option<i64>,
    pub end_event_id: Option<i64>,
    pub end_event_version: Option<i64>,
    pub maximum_page_size: Option<i32>,
    pub next_page_token: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct GetWorkflowExecutionRawHistoryV2Response {
    pub next_page_token: Option<Vec<u8>>,
    pub history_batches: Vec<DataBlob>,
    pub version_history: Option<VersionHistory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct ReadDlqMessagesRequest {
    pub queue_type: QueueType,
    pub shard_id: Option<i32>,
    pub source_cluster: Option<ClusterName>,
    pub inclusive_end_message_id: Option<i64>,
    pub maximum_page_size: Option<i32>,
    pub next_page_token: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct ReadDlqMessagesResponse {
    pub queue_type: Option<QueueType>,
    pub replication_tasks: Vec<ReplicationTask>,
    pub next_page_token: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct PurgeDlqMessagesRequest {
    pub queue_type: QueueType,
    pub shard_id: Option<i32>,
    pub source_cluster: Option<ClusterName>,
    pub inclusive_end_message_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct MergeDlqMessagesRequest {
    pub queue_type: QueueType,
    pub shard_id: Option<i32>,
    pub source_cluster: Option<ClusterName>,
    pub inclusive_end_message_id: Option<i64>,
    pub maximum_page_size: Option<i32>,
    pub next_page_token: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct MergeDlqMessagesResponse {
    pub next_page_token: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct ResendReplicationTasksRequest {
    pub domain_id: DomainId,
    pub workflow_id: String,
    pub run_id: RunId,
    pub remote_cluster: ClusterName,
    pub start_event_id: Option<i64>,
    pub start_event_version: Option<i64>,
    pub end_event_id: Option<i64>,
    pub end_event_version: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct AddSearchAttributeRequest {
    pub search_attribute: HashMap<String, IndexedValueType>,
    pub security_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct ReplicationToken {
    pub shard_id: i32,
    pub last_retrieved_message_id: i64,
    pub last_processed_message_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct GetReplicationMessagesRequest {
    pub tokens: Vec<ReplicationToken>,
    pub cluster_name: ClusterName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct GetReplicationMessagesResponse {
    pub shard_messages: HashMap<String, ReplicationMessages>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct GetDlqReplicationMessagesRequest {
    pub task_infos: Vec<ReplicationTaskInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct ReplicationTaskInfo {
    pub domain_id: DomainId,
    pub workflow_id: String,
    pub run_id: RunId,
    pub task_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct GetDlqReplicationMessagesResponse {
    pub replication_tasks: Vec<ReplicationTask>,
}

/// The two cursors are separate so prefetching (`last_retrieved`) never
/// truncates work the consumer has not processed yet (`last_processed`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct GetDomainReplicationMessagesRequest {
    pub cluster_name: ClusterName,
    pub last_retrieved_message_id: Option<i64>,
    pub last_processed_message_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct GetDomainReplicationMessagesResponse {
    pub messages: ReplicationMessages,
}

#[cfg(test)]
mod tests {
    use test_r::test;

    use super::*;

    #[test]
    fn feature_flags_are_parsed_from_the_header() {
        assert!(!ClientFeatureFlags::parse("").raw_history_query);
        assert!(ClientFeatureFlags::parse("raw-history-query").raw_history_query);
        assert!(ClientFeatureFlags::parse("other, raw-history-query").raw_history_query);
    }

    #[test]
    fn update_request_failover_classification() {
        let mut request = UpdateDomainRequest::new("test");
        assert!(!request.is_failover_request());

        request.active_cluster_name = Some(ClusterName::from("B"));
        assert!(request.is_failover_request());
        assert!(!request.is_graceful_failover_request());

        request.failover_timeout_seconds = Some(30);
        assert!(request.is_graceful_failover_request());
    }

    #[test]
    fn wire_types_round_trip_through_json() {
        let request = StartWorkflowExecutionRequest {
            domain: "orders".to_string(),
            workflow_id: "order-1".to_string(),
            workflow_type: WorkflowType {
                name: "ProcessOrder".to_string(),
            },
            task_list: TaskList {
                name: "orders-tl".to_string(),
                kind: Default::default(),
            },
            input: Some(vec![1, 2, 3]),
            execution_start_to_close_timeout_seconds: 60,
            task_start_to_close_timeout_seconds: 10,
            identity: Some("worker-1".to_string()),
            request_id: "req-1".to_string(),
            workflow_id_reuse_policy: None,
            retry_policy: None,
            cron_schedule: None,
            memo: None,
            search_attributes: None,
            delay_start_seconds: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        let decoded: StartWorkflowExecutionRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, request);
    }
}
