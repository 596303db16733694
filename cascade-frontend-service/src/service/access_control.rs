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

use crate::model::*;
use crate::service::{AdminService, WorkflowService};
use cascade_common::model::error::ServiceError;
use async_trait::async_trait;
use lazy_static::lazy_static;
use prometheus::{
    histogram_opts, register_counter_vec, register_histogram_vec, CounterVec, HistogramVec,
};
use std::sync::Arc;
use std::time::Instant;

lazy_static! {
    static ref AUTHORIZATION_SECONDS: HistogramVec = register_histogram_vec!(
        histogram_opts!(
            "authorization_seconds",
            "Authorization decision latency",
            cascade_common::metrics::DEFAULT_TIME_BUCKETS.to_vec()
        ),
        &["api"]
    )
    .unwrap();
    static ref AUTHORIZATION_DENIED_TOTAL: CounterVec = register_counter_vec!(
        "authorization_denied_total",
        "Denied requests by operation",
        &["api"]
    )
    .unwrap();
    static ref AUTHORIZATION_ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "authorization_errors_total",
        "Authorizer failures by operation",
        &["api"]
    )
    .unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthAttributes {
    pub api: &'static str,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Allow,
    Deny,
}

/// Pluggable attribute-based authorizer. The default implementation allows
/// everything; deployments plug their own policy engine in.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, attributes: &AuthAttributes) -> Result<AuthDecision, String>;
}

pub struct NoopAuthorizer;

#[async_trait]
impl Authorizer for NoopAuthorizer {
    async fn authorize(&self, _attributes: &AuthAttributes) -> Result<AuthDecision, String> {
        Ok(AuthDecision::Allow)
    }
}

/// Wraps both RPC surfaces with per-call authorization. Token-identified
/// respond calls and heartbeats are exempt: the task token is the
/// capability. Cluster-info is exempt as a bootstrap probe.
pub struct AccessControlledService {
    workflow: Arc<dyn WorkflowService>,
    admin: Arc<dyn AdminService>,
    authorizer: Arc<dyn Authorizer>,
}

impl AccessControlledService {
    pub fn new(
        workflow: Arc<dyn WorkflowService>,
        admin: Arc<dyn AdminService>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            workflow,
            admin,
            authorizer,
        }
    }

    async fn check(&self, api: &'static str, domain: Option<&str>) -> Result<(), ServiceError> {
        let attributes = AuthAttributes {
            api,
            domain: domain.map(|d| d.to_string()),
        };
        let start = Instant::now();
        let decision = self.authorizer.authorize(&attributes).await;
        AUTHORIZATION_SECONDS
            .with_label_values(&[api])
            .observe(start.elapsed().as_secs_f64());

        match decision {
            Ok(AuthDecision::Allow) => Ok(()),
            Ok(AuthDecision::Deny) => {
                AUTHORIZATION_DENIED_TOTAL.with_label_values(&[api]).inc();
                Err(ServiceError::bad_request("Request unauthorized"))
            }
            Err(error) => {
                AUTHORIZATION_ERRORS_TOTAL.with_label_values(&[api]).inc();
                Err(ServiceError::Internal(format!(
                    "Authorizer failed for {api}: {error}"
                )))
            }
        }
    }
}

macro_rules! authorized {
    ($self:ident, $ctx:ident, $request:ident, $api:literal, $method:ident, $domain:expr) => {{
        $self.check($api, $domain).await?;
        $self.workflow.$method($ctx, $request).await
    }};
}

macro_rules! authorized_admin {
    ($self:ident, $ctx:ident, $request:ident, $api:literal, $method:ident, $domain:expr) => {{
        $self.check($api, $domain).await?;
        $self.admin.$method($ctx, $request).await
    }};
}

#[async_trait]
impl WorkflowService for AccessControlledService {
    async fn register_domain(
        &self,
        ctx: &CallContext,
        request: RegisterDomainRequest,
    ) -> Result<RegisterDomainResponse, ServiceError> {
        authorized!(
            self,
            ctx,
            request,
            "register_domain",
            register_domain,
            Some(&request.name)
        )
    }

    async fn describe_domain(
        &self,
        ctx: &CallContext,
        request: DescribeDomainRequest,
    ) -> Result<DescribeDomainResponse, ServiceError> {
        authorized!(
            self,
            ctx,
            request,
            "describe_domain",
            describe_domain,
            request.name.as_deref()
        )
    }

    async fn list_domains(
        &self,
        ctx: &CallContext,
        request: ListDomainsRequest,
    ) -> Result<ListDomainsResponse, ServiceError> {
        authorized!(self, ctx, request, "list_domains", list_domains, None)
    }

    async fn update_domain(
        &self,
        ctx: &CallContext,
        request: UpdateDomainRequest,
    ) -> Result<UpdateDomainResponse, ServiceError> {
        authorized!(
            self,
            ctx,
            request,
            "update_domain",
            update_domain,
            Some(&request.name)
        )
    }

    async fn deprecate_domain(
        &self,
        ctx: &CallContext,
        request: DeprecateDomainRequest,
    ) -> Result<(), ServiceError> {
        authorized!(
            self,
            ctx,
            request,
            "deprecate_domain",
            deprecate_domain,
            Some(&request.name)
        )
    }

    async fn start_workflow_execution(
        &self,
        ctx: &CallContext,
        request: StartWorkflowExecutionRequest,
    ) -> Result<StartWorkflowExecutionResponse, ServiceError> {
        authorized!(
            self,
            ctx,
            request,
            "start_workflow_execution",
            start_workflow_execution,
            Some(&request.domain)
        )
    }

    async fn signal_workflow_execution(
        &self,
        ctx: &CallContext,
        request: SignalWorkflowExecutionRequest,
    ) -> Result<(), ServiceError> {
        authorized!(
            self,
            ctx,
            request,
            "signal_workflow_execution",
            signal_workflow_execution,
            Some(&request.domain)
        )
    }

    async fn signal_with_start_workflow_execution(
        &self,
        ctx: &CallContext,
        request: SignalWithStartWorkflowExecutionRequest,
    ) -> Result<StartWorkflowExecutionResponse, ServiceError> {
        authorized!(
            self,
            ctx,
            request,
            "signal_with_start_workflow_execution",
            signal_with_start_workflow_execution,
            Some(&request.domain)
        )
    }

    async fn request_cancel_workflow_execution(
        &self,
        ctx: &CallContext,
        request: RequestCancelWorkflowExecutionRequest,
    ) -> Result<(), ServiceError> {
        authorized!(
            self,
            ctx,
            request,
            "request_cancel_workflow_execution",
            request_cancel_workflow_execution,
            Some(&request.domain)
        )
    }

    async fn terminate_workflow_execution(
        &self,
        ctx: &CallContext,
        request: TerminateWorkflowExecutionRequest,
    ) -> Result<(), ServiceError> {
        authorized!(
            self,
            ctx,
            request,
            "terminate_workflow_execution",
            terminate_workflow_execution,
            Some(&request.domain)
        )
    }

    async fn reset_workflow_execution(
        &self,
        ctx: &CallContext,
        request: ResetWorkflowExecutionRequest,
    ) -> Result<ResetWorkflowExecutionResponse, ServiceError> {
        authorized!(
            self,
            ctx,
            request,
            "reset_workflow_execution",
            reset_workflow_execution,
            Some(&request.domain)
        )
    }

    async fn refresh_workflow_tasks(
        &self,
        ctx: &CallContext,
        request: RefreshWorkflowTasksRequest,
    ) -> Result<(), ServiceError> {
        authorized!(
            self,
            ctx,
            request,
            "refresh_workflow_tasks",
            refresh_workflow_tasks,
            Some(&request.domain)
        )
    }

    async fn describe_workflow_execution(
        &self,
        ctx: &CallContext,
        request: DescribeWorkflowExecutionRequest,
    ) -> Result<DescribeWorkflowExecutionResponse, ServiceError> {
        authorized!(
            self,
            ctx,
            request,
            "describe_workflow_execution",
            describe_workflow_execution,
            Some(&request.domain)
        )
    }

    async fn query_workflow(
        &self,
        ctx: &CallContext,
        request: QueryWorkflowRequest,
    ) -> Result<QueryWorkflowResponse, ServiceError> {
        authorized!(
            self,
            ctx,
            request,
            "query_workflow",
            query_workflow,
            Some(&request.domain)
        )
    }

    async fn get_workflow_execution_history(
        &self,
        ctx: &CallContext,
        request: GetWorkflowExecutionHistoryRequest,
    ) -> Result<GetWorkflowExecutionHistoryResponse, ServiceError> {
        authorized!(
            self,
            ctx,
            request,
            "get_workflow_execution_history",
            get_workflow_execution_history,
            Some(&request.domain)
        )
    }

    async fn poll_for_decision_task(
        &self,
        ctx: &CallContext,
        request: PollForDecisionTaskRequest,
    ) -> Result<PollForDecisionTaskResponse, ServiceError> {
        authorized!(
            self,
            ctx,
            request,
            "poll_for_decision_task",
            poll_for_decision_task,
            Some(&request.domain)
        )
    }

    async fn poll_for_activity_task(
        &self,
        ctx: &CallContext,
        request: PollForActivityTaskRequest,
    ) -> Result<PollForActivityTaskResponse, ServiceError> {
        authorized!(
            self,
            ctx,
            request,
            "poll_for_activity_task",
            poll_for_activity_task,
            Some(&request.domain)
        )
    }

    // the task token is the capability on the respond and heartbeat paths

    async fn respond_decision_task_completed(
        &self,
        ctx: &CallContext,
        request: RespondDecisionTaskCompletedRequest,
    ) -> Result<RespondDecisionTaskCompletedResponse, ServiceError> {
        self.workflow.respond_decision_task_completed(ctx, request).await
    }

    async fn respond_decision_task_failed(
        &self,
        ctx: &CallContext,
        request: RespondDecisionTaskFailedRequest,
    ) -> Result<(), ServiceError> {
        self.workflow.respond_decision_task_failed(ctx, request).await
    }

    async fn respond_query_task_completed(
        &self,
        ctx: &CallContext,
        request: RespondQueryTaskCompletedRequest,
    ) -> Result<(), ServiceError> {
        self.workflow.respond_query_task_completed(ctx, request).await
    }

    async fn respond_activity_task_completed(
        &self,
        ctx: &CallContext,
        request: RespondActivityTaskCompletedRequest,
    ) -> Result<(), ServiceError> {
        self.workflow
            .respond_activity_task_completed(ctx, request)
            .await
    }

    async fn respond_activity_task_completed_by_id(
        &self,
        ctx: &CallContext,
        request: RespondActivityTaskCompletedByIdRequest,
    ) -> Result<(), ServiceError> {
        self.workflow
            .respond_activity_task_completed_by_id(ctx, request)
            .await
    }

    async fn respond_activity_task_failed(
        &self,
        ctx: &CallContext,
        request: RespondActivityTaskFailedRequest,
    ) -> Result<(), ServiceError> {
        self.workflow.respond_activity_task_failed(ctx, request).await
    }

    async fn respond_activity_task_failed_by_id(
        &self,
        ctx: &CallContext,
        request: RespondActivityTaskFailedByIdRequest,
    ) -> Result<(), ServiceError> {
        self.workflow
            .respond_activity_task_failed_by_id(ctx, request)
            .await
    }

    async fn respond_activity_task_canceled(
        &self,
        ctx: &CallContext,
        request: RespondActivityTaskCanceledRequest,
    ) -> Result<(), ServiceError> {
        self.workflow
            .respond_activity_task_canceled(ctx, request)
            .await
    }

    async fn respond_activity_task_canceled_by_id(
        &self,
        ctx: &CallContext,
        request: RespondActivityTaskCanceledByIdRequest,
    ) -> Result<(), ServiceError> {
        self.workflow
            .respond_activity_task_canceled_by_id(ctx, request)
            .await
    }

    async fn record_activity_task_heartbeat(
        &self,
        ctx: &CallContext,
        request: RecordActivityTaskHeartbeatRequest,
    ) -> Result<RecordActivityTaskHeartbeatResponse, ServiceError> {
        self.workflow
            .record_activity_task_heartbeat(ctx, request)
            .await
    }

    async fn record_activity_task_heartbeat_by_id(
        &self,
        ctx: &CallContext,
        request: RecordActivityTaskHeartbeatByIdRequest,
    ) -> Result<RecordActivityTaskHeartbeatResponse, ServiceError> {
        self.workflow
            .record_activity_task_heartbeat_by_id(ctx, request)
            .await
    }

    async fn describe_task_list(
        &self,
        ctx: &CallContext,
        request: DescribeTaskListRequest,
    ) -> Result<DescribeTaskListResponse, ServiceError> {
        authorized!(
            self,
            ctx,
            request,
            "describe_task_list",
            describe_task_list,
            Some(&request.domain)
        )
    }

    async fn list_task_list_partitions(
        &self,
        ctx: &CallContext,
        request: ListTaskListPartitionsRequest,
    ) -> Result<ListTaskListPartitionsResponse, ServiceError> {
        authorized!(
            self,
            ctx,
            request,
            "list_task_list_partitions",
            list_task_list_partitions,
            Some(&request.domain)
        )
    }

    async fn list_open_workflow_executions(
        &self,
        ctx: &CallContext,
        request: ListOpenWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, ServiceError> {
        authorized!(
            self,
            ctx,
            request,
            "list_open_workflow_executions",
            list_open_workflow_executions,
            Some(&request.domain)
        )
    }

    async fn list_closed_workflow_executions(
        &self,
        ctx: &CallContext,
        request: ListClosedWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, ServiceError> {
        authorized!(
            self,
            ctx,
            request,
            "list_closed_workflow_executions",
            list_closed_workflow_executions,
            Some(&request.domain)
        )
    }

    async fn list_workflow_executions(
        &self,
        ctx: &CallContext,
        request: ListWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, ServiceError> {
        authorized!(
            self,
            ctx,
            request,
            "list_workflow_executions",
            list_workflow_executions,
            Some(&request.domain)
        )
    }

    async fn scan_workflow_executions(
        &self,
        ctx: &CallContext,
        request: ListWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, ServiceError> {
        authorized!(
            self,
            ctx,
            request,
            "scan_workflow_executions",
            scan_workflow_executions,
            Some(&request.domain)
        )
    }

    async fn count_workflow_executions(
        &self,
        ctx: &CallContext,
        request: CountWorkflowExecutionsRequest,
    ) -> Result<CountWorkflowExecutionsResponse, ServiceError> {
        authorized!(
            self,
            ctx,
            request,
            "count_workflow_executions",
            count_workflow_executions,
            Some(&request.domain)
        )
    }

    async fn list_archived_workflow_executions(
        &self,
        ctx: &CallContext,
        request: ListWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, ServiceError> {
        authorized!(
            self,
            ctx,
            request,
            "list_archived_workflow_executions",
            list_archived_workflow_executions,
            Some(&request.domain)
        )
    }

    async fn get_cluster_info(
        &self,
        ctx: &CallContext,
    ) -> Result<GetClusterInfoResponse, ServiceError> {
        // bootstrap probe, exempt
        self.workflow.get_cluster_info(ctx).await
    }

    async fn get_search_attributes(
        &self,
        ctx: &CallContext,
    ) -> Result<GetSearchAttributesResponse, ServiceError> {
        self.check("get_search_attributes", None).await?;
        self.workflow.get_search_attributes(ctx).await
    }
}

#[async_trait]
impl AdminService for AccessControlledService {
    async fn describe_cluster(
        &self,
        ctx: &CallContext,
    ) -> Result<DescribeClusterResponse, ServiceError> {
        self.check("describe_cluster", None).await?;
        self.admin.describe_cluster(ctx).await
    }

    async fn get_workflow_execution_raw_history_v2(
        &self,
        ctx: &CallContext,
        request: GetWorkflowExecutionRawHistoryV2Request,
    ) -> Result<GetWorkflowExecutionRawHistoryV2Response, ServiceError> {
        authorized_admin!(
            self,
            ctx,
            request,
            "get_workflow_execution_raw_history_v2",
            get_workflow_execution_raw_history_v2,
            Some(&request.domain)
        )
    }

    async fn read_dlq_messages(
        &self,
        ctx: &CallContext,
        request: ReadDlqMessagesRequest,
    ) -> Result<ReadDlqMessagesResponse, ServiceError> {
        authorized_admin!(
            self,
            ctx,
            request,
            "read_dlq_messages",
            read_dlq_messages,
            None
        )
    }

    async fn purge_dlq_messages(
        &self,
        ctx: &CallContext,
        request: PurgeDlqMessagesRequest,
    ) -> Result<(), ServiceError> {
        authorized_admin!(
            self,
            ctx,
            request,
            "purge_dlq_messages",
            purge_dlq_messages,
            None
        )
    }

    async fn merge_dlq_messages(
        &self,
        ctx: &CallContext,
        request: MergeDlqMessagesRequest,
    ) -> Result<MergeDlqMessagesResponse, ServiceError> {
        authorized_admin!(
            self,
            ctx,
            request,
            "merge_dlq_messages",
            merge_dlq_messages,
            None
        )
    }

    async fn resend_replication_tasks(
        &self,
        ctx: &CallContext,
        request: ResendReplicationTasksRequest,
    ) -> Result<(), ServiceError> {
        authorized_admin!(
            self,
            ctx,
            request,
            "resend_replication_tasks",
            resend_replication_tasks,
            None
        )
    }

    async fn add_search_attribute(
        &self,
        ctx: &CallContext,
        request: AddSearchAttributeRequest,
    ) -> Result<(), ServiceError> {
        authorized_admin!(
            self,
            ctx,
            request,
            "add_search_attribute",
            add_search_attribute,
            None
        )
    }

    async fn get_replication_messages(
        &self,
        ctx: &CallContext,
        request: GetReplicationMessagesRequest,
    ) -> Result<GetReplicationMessagesResponse, ServiceError> {
        authorized_admin!(
            self,
            ctx,
            request,
            "get_replication_messages",
            get_replication_messages,
            None
        )
    }

    async fn get_dlq_replication_messages(
        &self,
        ctx: &CallContext,
        request: GetDlqReplicationMessagesRequest,
    ) -> Result<GetDlqReplicationMessagesResponse, ServiceError> {
        authorized_admin!(
            self,
            ctx,
            request,
            "get_dlq_replication_messages",
            get_dlq_replication_messages,
            None
        )
    }

    async fn get_domain_replication_messages(
        &self,
        ctx: &CallContext,
        request: GetDomainReplicationMessagesRequest,
    ) -> Result<GetDomainReplicationMessagesResponse, ServiceError> {
        authorized_admin!(
            self,
            ctx,
            request,
            "get_domain_replication_messages",
            get_domain_replication_messages,
            None
        )
    }
}
