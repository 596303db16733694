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

pub mod access_control;
pub mod admin;
pub mod domain;
pub mod domain_cache;
pub mod history;
pub mod rate_limiter;
pub mod redirection;
pub mod resender;
pub mod validation;
pub mod workflow;

use crate::model::*;
use cascade_common::model::error::ServiceError;
use async_trait::async_trait;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::error;

/// Health as reported to load balancers. `Warming` keeps traffic away during
/// cold start; `ShuttingDown` is the first phase of the drain sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Warming,
    Serving,
    ShuttingDown,
}

#[derive(Default)]
pub struct LifecycleState {
    state: AtomicU8,
    rejecting: AtomicU8,
}

impl LifecycleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn health(&self) -> HealthState {
        match self.state.load(Ordering::Acquire) {
            0 => HealthState::Warming,
            1 => HealthState::Serving,
            _ => HealthState::ShuttingDown,
        }
    }

    pub fn set_health(&self, health: HealthState) {
        let value = match health {
            HealthState::Warming => 0,
            HealthState::Serving => 1,
            HealthState::ShuttingDown => 2,
        };
        self.state.store(value, Ordering::Release);
    }

    /// Rejecting starts in drain phase three, after peers had a chance to
    /// stop routing to this instance.
    pub fn start_rejecting(&self) {
        self.rejecting.store(1, Ordering::Release);
    }

    pub fn is_rejecting(&self) -> bool {
        self.rejecting.load(Ordering::Acquire) != 0
    }
}

/// Recovers a panic in a handler and converts it into an internal failure
/// tagged with the call site, so one bad request cannot take the process
/// down with it.
pub async fn with_panic_capture<T, F>(api: &'static str, future: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(api, panic = message, "Recovered panic in API handler");
            Err(ServiceError::Internal(format!(
                "panic in {api}: {message}"
            )))
        }
    }
}

/// The end-user RPC surface of the frontend. The default implementation is
/// the workflow handler; the DC-redirection and access-control wrappers
/// implement the same trait and nest around it.
#[async_trait]
pub trait WorkflowService: Send + Sync {
    async fn register_domain(
        &self,
        ctx: &CallContext,
        request: RegisterDomainRequest,
    ) -> Result<RegisterDomainResponse, ServiceError>;

    async fn describe_domain(
        &self,
        ctx: &CallContext,
        request: DescribeDomainRequest,
    ) -> Result<DescribeDomainResponse, ServiceError>;

    async fn list_domains(
        &self,
        ctx: &CallContext,
        request: ListDomainsRequest,
    ) -> Result<ListDomainsResponse, ServiceError>;

    async fn update_domain(
        &self,
        ctx: &CallContext,
        request: UpdateDomainRequest,
    ) -> Result<UpdateDomainResponse, ServiceError>;

    async fn deprecate_domain(
        &self,
        ctx: &CallContext,
        request: DeprecateDomainRequest,
    ) -> Result<(), ServiceError>;

    async fn start_workflow_execution(
        &self,
        ctx: &CallContext,
        request: StartWorkflowExecutionRequest,
    ) -> Result<StartWorkflowExecutionResponse, ServiceError>;

    async fn signal_workflow_execution(
        &self,
        ctx: &CallContext,
        request: SignalWorkflowExecutionRequest,
    ) -> Result<(), ServiceError>;

    async fn signal_with_start_workflow_execution(
        &self,
        ctx: &CallContext,
        request: SignalWithStartWorkflowExecutionRequest,
    ) -> Result<StartWorkflowExecutionResponse, ServiceError>;

    async fn request_cancel_workflow_execution(
        &self,
        ctx: &CallContext,
        request: RequestCancelWorkflowExecutionRequest,
    ) -> Result<(), ServiceError>;

    async fn terminate_workflow_execution(
        &self,
        ctx: &CallContext,
        request: TerminateWorkflowExecutionRequest,
    ) -> Result<(), ServiceError>;

    async fn reset_workflow_execution(
        &self,
        ctx: &CallContext,
        request: ResetWorkflowExecutionRequest,
    ) -> Result<ResetWorkflowExecutionResponse, ServiceError>;

    async fn refresh_workflow_tasks(
        &self,
        ctx: &CallContext,
        request: RefreshWorkflowTasksRequest,
    ) -> Result<(), ServiceError>;

    async fn describe_workflow_execution(
        &self,
        ctx: &CallContext,
        request: DescribeWorkflowExecutionRequest,
    ) -> Result<DescribeWorkflowExecutionResponse, ServiceError>;

    async fn query_workflow(
        &self,
        ctx: &CallContext,
        request: QueryWorkflowRequest,
    ) -> Result<QueryWorkflowResponse, ServiceError>;

    async fn get_workflow_execution_history(
        &self,
        ctx: &CallContext,
        request: GetWorkflowExecutionHistoryRequest,
    ) -> Result<GetWorkflowExecutionHistoryResponse, ServiceError>;

    async fn poll_for_decision_task(
        &self,
        ctx: &CallContext,
        request: PollForDecisionTaskRequest,
    ) -> Result<PollForDecisionTaskResponse, ServiceError>;

    async fn poll_for_activity_task(
        &self,
        ctx: &CallContext,
        request: PollForActivityTaskRequest,
    ) -> Result<PollForActivityTaskResponse, ServiceError>;

    async fn respond_decision_task_completed(
        &self,
        ctx: &CallContext,
        request: RespondDecisionTaskCompletedRequest,
    ) -> Result<RespondDecisionTaskCompletedResponse, ServiceError>;

    async fn respond_decision_task_failed(
        &self,
        ctx: &CallContext,
        request: RespondDecisionTaskFailedRequest,
    ) -> Result<(), ServiceError>;

    async fn respond_query_task_completed(
        &self,
        ctx: &CallContext,
        request: RespondQueryTaskCompletedRequest,
    ) -> Result<(), ServiceError>;

    async fn respond_activity_task_completed(
        &self,
        ctx: &CallContext,
        request: RespondActivityTaskCompletedRequest,
    ) -> Result<(), ServiceError>;

    async fn respond_activity_task_completed_by_id(
        &self,
        ctx: &CallContext,
        request: RespondActivityTaskCompletedByIdRequest,
    ) -> Result<(), ServiceError>;

    async fn respond_activity_task_failed(
        &self,
        ctx: &CallContext,
        request: RespondActivityTaskFailedRequest,
    ) -> Result<(), ServiceError>;

    async fn respond_activity_task_failed_by_id(
        &self,
        ctx: &CallContext,
        request: RespondActivityTaskFailedByIdRequest,
    ) -> Result<(), ServiceError>;

    async fn respond_activity_task_canceled(
        &self,
        ctx: &CallContext,
        request: RespondActivityTaskCanceledRequest,
    ) -> Result<(), ServiceError>;

    async fn respond_activity_task_canceled_by_id(
        &self,
        ctx: &CallContext,
        request: RespondActivityTaskCanceledByIdRequest,
    ) -> Result<(), ServiceError>;

    async fn record_activity_task_heartbeat(
        &self,
        ctx: &CallContext,
        request: RecordActivityTaskHeartbeatRequest,
    ) -> Result<RecordActivityTaskHeartbeatResponse, ServiceError>;

    async fn record_activity_task_heartbeat_by_id(
        &self,
        ctx: &CallContext,
        request: RecordActivityTaskHeartbeatByIdRequest,
    ) -> Result<RecordActivityTaskHeartbeatResponse, ServiceError>;

    async fn describe_task_list(
        &self,
        ctx: &CallContext,
        request: DescribeTaskListRequest,
    ) -> Result<DescribeTaskListResponse, ServiceError>;

    async fn list_task_list_partitions(
        &self,
        ctx: &CallContext,
        request: ListTaskListPartitionsRequest,
    ) -> Result<ListTaskListPartitionsResponse, ServiceError>;

    async fn list_open_workflow_executions(
        &self,
        ctx: &CallContext,
        request: ListOpenWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, ServiceError>;

    async fn list_closed_workflow_executions(
        &self,
        ctx: &CallContext,
        request: ListClosedWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, ServiceError>;

    async fn list_workflow_executions(
        &self,
        ctx: &CallContext,
        request: ListWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, ServiceError>;

    async fn scan_workflow_executions(
        &self,
        ctx: &CallContext,
        request: ListWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, ServiceError>;

    async fn count_workflow_executions(
        &self,
        ctx: &CallContext,
        request: CountWorkflowExecutionsRequest,
    ) -> Result<CountWorkflowExecutionsResponse, ServiceError>;

    async fn list_archived_workflow_executions(
        &self,
        ctx: &CallContext,
        request: ListWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, ServiceError>;

    async fn get_cluster_info(&self, ctx: &CallContext)
        -> Result<GetClusterInfoResponse, ServiceError>;

    async fn get_search_attributes(
        &self,
        ctx: &CallContext,
    ) -> Result<GetSearchAttributesResponse, ServiceError>;
}

/// The operator RPC surface. Bypasses DC-redirection entirely.
#[async_trait]
pub trait AdminService: Send + Sync {
    async fn describe_cluster(
        &self,
        ctx: &CallContext,
    ) -> Result<DescribeClusterResponse, ServiceError>;

    async fn get_workflow_execution_raw_history_v2(
        &self,
        ctx: &CallContext,
        request: GetWorkflowExecutionRawHistoryV2Request,
    ) -> Result<GetWorkflowExecutionRawHistoryV2Response, ServiceError>;

    async fn read_dlq_messages(
        &self,
        ctx: &CallContext,
        request: ReadDlqMessagesRequest,
    ) -> Result<ReadDlqMessagesResponse, ServiceError>;

    async fn purge_dlq_messages(
        &self,
        ctx: &CallContext,
        request: PurgeDlqMessagesRequest,
    ) -> Result<(), ServiceError>;

    async fn merge_dlq_messages(
        &self,
        ctx: &CallContext,
        request: MergeDlqMessagesRequest,
    ) -> Result<MergeDlqMessagesResponse, ServiceError>;

    async fn resend_replication_tasks(
        &self,
        ctx: &CallContext,
        request: ResendReplicationTasksRequest,
    ) -> Result<(), ServiceError>;

    async fn add_search_attribute(
        &self,
        ctx: &CallContext,
        request: AddSearchAttributeRequest,
    ) -> Result<(), ServiceError>;

    async fn get_replication_messages(
        &self,
        ctx: &CallContext,
        request: GetReplicationMessagesRequest,
    ) -> Result<GetReplicationMessagesResponse, ServiceError>;

    async fn get_dlq_replication_messages(
        &self,
        ctx: &CallContext,
        request: GetDlqReplicationMessagesRequest,
    ) -> Result<GetDlqReplicationMessagesResponse, ServiceError>;

    async fn get_domain_replication_messages(
        &self,
        ctx: &CallContext,
        request: GetDomainReplicationMessagesRequest,
    ) -> Result<GetDomainReplicationMessagesResponse, ServiceError>;
}

#[cfg(test)]
mod tests {
    use test_r::test;

    use super::*;

    #[test]
    async fn panics_become_internal_errors_with_the_call_site() {
        let result: Result<(), ServiceError> =
            with_panic_capture("start_workflow_execution", async { panic!("boom") }).await;
        match result {
            Err(ServiceError::Internal(message)) => {
                assert!(message.contains("start_workflow_execution"));
                assert!(message.contains("boom"));
            }
            other => panic!("expected internal error, got {other:?}"),
        }
    }

    #[test]
    async fn non_panicking_futures_pass_through() {
        let result = with_panic_capture("op", async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }
}
