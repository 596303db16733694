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

use crate::clients::frontend::RemoteFrontendClient;
use crate::model::*;
use crate::service::domain_cache::DomainCache;
use crate::service::WorkflowService;
use cascade_common::model::error::ServiceError;
use cascade_common::model::tokens::TaskToken;
use cascade_common::model::{ClusterName, QueryConsistencyLevel};
use async_trait::async_trait;
use lazy_static::lazy_static;
use prometheus::{
    histogram_opts, register_counter_vec, register_histogram_vec, CounterVec, HistogramVec,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

lazy_static! {
    static ref REDIRECTION_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "dc_redirection_requests_total",
        "API requests by operation and target cluster",
        &["api", "target_cluster"]
    )
    .unwrap();
    static ref REDIRECTION_FAILURES_TOTAL: CounterVec = register_counter_vec!(
        "dc_redirection_failures_total",
        "Failed API requests by operation and target cluster",
        &["api", "target_cluster"]
    )
    .unwrap();
    static ref REDIRECTION_SECONDS: HistogramVec = register_histogram_vec!(
        histogram_opts!(
            "dc_redirection_seconds",
            "API request latency by operation and target cluster",
            cascade_common::metrics::DEFAULT_TIME_BUCKETS.to_vec()
        ),
        &["api", "target_cluster"]
    )
    .unwrap();
}

/// Which calls may leave the cluster. `NoForwarding` pins everything local
/// (single-cluster deployments); `SelectedApisForwarding` forwards the
/// mutating and task-delivery operations of domains that are active
/// elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RedirectionPolicy {
    NoForwarding,
    #[default]
    SelectedApisForwarding,
}

/// Wraps the workflow handler and routes each call either to it or to the
/// active cluster's frontend, based on the domain's replication metadata.
pub struct DcRedirectionService {
    inner: Arc<dyn WorkflowService>,
    remote_frontends: HashMap<ClusterName, Arc<dyn RemoteFrontendClient>>,
    domain_cache: Arc<DomainCache>,
    current_cluster: ClusterName,
    policy: RedirectionPolicy,
}

impl DcRedirectionService {
    pub fn new(
        inner: Arc<dyn WorkflowService>,
        remote_frontends: HashMap<ClusterName, Arc<dyn RemoteFrontendClient>>,
        domain_cache: Arc<DomainCache>,
        current_cluster: ClusterName,
        policy: RedirectionPolicy,
    ) -> Self {
        Self {
            inner,
            remote_frontends,
            domain_cache,
            current_cluster,
            policy,
        }
    }

    async fn target_for_domain_name(&self, name: &str) -> Result<ClusterName, ServiceError> {
        if self.policy == RedirectionPolicy::NoForwarding {
            return Ok(self.current_cluster.clone());
        }
        let domain = self.domain_cache.get_required_by_name(name).await?;
        if domain.is_active_in(&self.current_cluster) {
            Ok(self.current_cluster.clone())
        } else {
            Ok(domain.active_cluster().clone())
        }
    }

    async fn target_for_token(&self, token_bytes: &[u8]) -> Result<ClusterName, ServiceError> {
        if self.policy == RedirectionPolicy::NoForwarding {
            return Ok(self.current_cluster.clone());
        }
        let token = TaskToken::decode(token_bytes)?;
        let domain = self.domain_cache.get_required_by_id(&token.domain_id).await?;
        if domain.is_active_in(&self.current_cluster) {
            Ok(self.current_cluster.clone())
        } else {
            Ok(domain.active_cluster().clone())
        }
    }

    fn remote(
        &self,
        cluster: &ClusterName,
    ) -> Result<Arc<dyn RemoteFrontendClient>, ServiceError> {
        self.remote_frontends.get(cluster).cloned().ok_or_else(|| {
            ServiceError::Internal(format!(
                "No frontend client configured for cluster {cluster}"
            ))
        })
    }

    async fn record<T, F>(
        &self,
        api: &'static str,
        target: &ClusterName,
        call: F,
    ) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        let start = Instant::now();
        REDIRECTION_REQUESTS_TOTAL
            .with_label_values(&[api, &target.0])
            .inc();
        let result = call.await;
        REDIRECTION_SECONDS
            .with_label_values(&[api, &target.0])
            .observe(start.elapsed().as_secs_f64());
        if result.is_err() {
            REDIRECTION_FAILURES_TOTAL
                .with_label_values(&[api, &target.0])
                .inc();
        }
        result
    }

    fn is_local(&self, target: &ClusterName) -> bool {
        *target == self.current_cluster
    }
}

macro_rules! redirect_by_domain {
    ($self:ident, $ctx:ident, $request:ident, $api:literal, $method:ident) => {{
        let target = $self.target_for_domain_name(&$request.domain).await?;
        if $self.is_local(&target) {
            $self
                .record($api, &target, $self.inner.$method($ctx, $request))
                .await
        } else {
            let remote = $self.remote(&target)?;
            $self.record($api, &target, remote.$method($request)).await
        }
    }};
}

macro_rules! redirect_by_token {
    ($self:ident, $ctx:ident, $request:ident, $api:literal, $method:ident) => {{
        let target = $self.target_for_token(&$request.task_token).await?;
        if $self.is_local(&target) {
            $self
                .record($api, &target, $self.inner.$method($ctx, $request))
                .await
        } else {
            let remote = $self.remote(&target)?;
            $self.record($api, &target, remote.$method($request)).await
        }
    }};
}

macro_rules! local_only {
    ($self:ident, $ctx:ident, $request:ident, $api:literal, $method:ident) => {{
        let target = $self.current_cluster.clone();
        $self
            .record($api, &target, $self.inner.$method($ctx, $request))
            .await
    }};
}

#[async_trait]
impl WorkflowService for DcRedirectionService {
    // domain CRUD and cluster metadata are never forwarded

    async fn register_domain(
        &self,
        ctx: &CallContext,
        request: RegisterDomainRequest,
    ) -> Result<RegisterDomainResponse, ServiceError> {
        local_only!(self, ctx, request, "register_domain", register_domain)
    }

    async fn describe_domain(
        &self,
        ctx: &CallContext,
        request: DescribeDomainRequest,
    ) -> Result<DescribeDomainResponse, ServiceError> {
        local_only!(self, ctx, request, "describe_domain", describe_domain)
    }

    async fn list_domains(
        &self,
        ctx: &CallContext,
        request: ListDomainsRequest,
    ) -> Result<ListDomainsResponse, ServiceError> {
        local_only!(self, ctx, request, "list_domains", list_domains)
    }

    async fn update_domain(
        &self,
        ctx: &CallContext,
        request: UpdateDomainRequest,
    ) -> Result<UpdateDomainResponse, ServiceError> {
        local_only!(self, ctx, request, "update_domain", update_domain)
    }

    async fn deprecate_domain(
        &self,
        ctx: &CallContext,
        request: DeprecateDomainRequest,
    ) -> Result<(), ServiceError> {
        local_only!(self, ctx, request, "deprecate_domain", deprecate_domain)
    }

    async fn start_workflow_execution(
        &self,
        ctx: &CallContext,
        request: StartWorkflowExecutionRequest,
    ) -> Result<StartWorkflowExecutionResponse, ServiceError> {
        redirect_by_domain!(
            self,
            ctx,
            request,
            "start_workflow_execution",
            start_workflow_execution
        )
    }

    async fn signal_workflow_execution(
        &self,
        ctx: &CallContext,
        request: SignalWorkflowExecutionRequest,
    ) -> Result<(), ServiceError> {
        redirect_by_domain!(
            self,
            ctx,
            request,
            "signal_workflow_execution",
            signal_workflow_execution
        )
    }

    async fn signal_with_start_workflow_execution(
        &self,
        ctx: &CallContext,
        request: SignalWithStartWorkflowExecutionRequest,
    ) -> Result<StartWorkflowExecutionResponse, ServiceError> {
        redirect_by_domain!(
            self,
            ctx,
            request,
            "signal_with_start_workflow_execution",
            signal_with_start_workflow_execution
        )
    }

    async fn request_cancel_workflow_execution(
        &self,
        ctx: &CallContext,
        request: RequestCancelWorkflowExecutionRequest,
    ) -> Result<(), ServiceError> {
        redirect_by_domain!(
            self,
            ctx,
            request,
            "request_cancel_workflow_execution",
            request_cancel_workflow_execution
        )
    }

    async fn terminate_workflow_execution(
        &self,
        ctx: &CallContext,
        request: TerminateWorkflowExecutionRequest,
    ) -> Result<(), ServiceError> {
        redirect_by_domain!(
            self,
            ctx,
            request,
            "terminate_workflow_execution",
            terminate_workflow_execution
        )
    }

    async fn reset_workflow_execution(
        &self,
        ctx: &CallContext,
        request: ResetWorkflowExecutionRequest,
    ) -> Result<ResetWorkflowExecutionResponse, ServiceError> {
        redirect_by_domain!(
            self,
            ctx,
            request,
            "reset_workflow_execution",
            reset_workflow_execution
        )
    }

    async fn refresh_workflow_tasks(
        &self,
        ctx: &CallContext,
        request: RefreshWorkflowTasksRequest,
    ) -> Result<(), ServiceError> {
        // refresh acts on local shards regardless of where the domain is
        // active
        local_only!(
            self,
            ctx,
            request,
            "refresh_workflow_tasks",
            refresh_workflow_tasks
        )
    }

    async fn describe_workflow_execution(
        &self,
        ctx: &CallContext,
        request: DescribeWorkflowExecutionRequest,
    ) -> Result<DescribeWorkflowExecutionResponse, ServiceError> {
        local_only!(
            self,
            ctx,
            request,
            "describe_workflow_execution",
            describe_workflow_execution
        )
    }

    async fn query_workflow(
        &self,
        ctx: &CallContext,
        request: QueryWorkflowRequest,
    ) -> Result<QueryWorkflowResponse, ServiceError> {
        // only strongly consistent queries are worth a cross-cluster hop; an
        // eventually consistent read from the passive side is acceptable and
        // faster
        let target = match request.consistency_level() {
            QueryConsistencyLevel::Strong => {
                self.target_for_domain_name(&request.domain).await?
            }
            QueryConsistencyLevel::Eventual => self.current_cluster.clone(),
        };
        if self.is_local(&target) {
            self.record("query_workflow", &target, self.inner.query_workflow(ctx, request))
                .await
        } else {
            let remote = self.remote(&target)?;
            self.record("query_workflow", &target, remote.query_workflow(request))
                .await
        }
    }

    async fn get_workflow_execution_history(
        &self,
        ctx: &CallContext,
        request: GetWorkflowExecutionHistoryRequest,
    ) -> Result<GetWorkflowExecutionHistoryResponse, ServiceError> {
        local_only!(
            self,
            ctx,
            request,
            "get_workflow_execution_history",
            get_workflow_execution_history
        )
    }

    async fn poll_for_decision_task(
        &self,
        ctx: &CallContext,
        request: PollForDecisionTaskRequest,
    ) -> Result<PollForDecisionTaskResponse, ServiceError> {
        redirect_by_domain!(
            self,
            ctx,
            request,
            "poll_for_decision_task",
            poll_for_decision_task
        )
    }

    async fn poll_for_activity_task(
        &self,
        ctx: &CallContext,
        request: PollForActivityTaskRequest,
    ) -> Result<PollForActivityTaskResponse, ServiceError> {
        redirect_by_domain!(
            self,
            ctx,
            request,
            "poll_for_activity_task",
            poll_for_activity_task
        )
    }

    async fn respond_decision_task_completed(
        &self,
        ctx: &CallContext,
        request: RespondDecisionTaskCompletedRequest,
    ) -> Result<RespondDecisionTaskCompletedResponse, ServiceError> {
        redirect_by_token!(
            self,
            ctx,
            request,
            "respond_decision_task_completed",
            respond_decision_task_completed
        )
    }

    async fn respond_decision_task_failed(
        &self,
        ctx: &CallContext,
        request: RespondDecisionTaskFailedRequest,
    ) -> Result<(), ServiceError> {
        redirect_by_token!(
            self,
            ctx,
            request,
            "respond_decision_task_failed",
            respond_decision_task_failed
        )
    }

    async fn respond_query_task_completed(
        &self,
        ctx: &CallContext,
        request: RespondQueryTaskCompletedRequest,
    ) -> Result<(), ServiceError> {
        redirect_by_token!(
            self,
            ctx,
            request,
            "respond_query_task_completed",
            respond_query_task_completed
        )
    }

    async fn respond_activity_task_completed(
        &self,
        ctx: &CallContext,
        request: RespondActivityTaskCompletedRequest,
    ) -> Result<(), ServiceError> {
        redirect_by_token!(
            self,
            ctx,
            request,
            "respond_activity_task_completed",
            respond_activity_task_completed
        )
    }

    async fn respond_activity_task_completed_by_id(
        &self,
        ctx: &CallContext,
        request: RespondActivityTaskCompletedByIdRequest,
    ) -> Result<(), ServiceError> {
        redirect_by_domain!(
            self,
            ctx,
            request,
            "respond_activity_task_completed_by_id",
            respond_activity_task_completed_by_id
        )
    }

    async fn respond_activity_task_failed(
        &self,
        ctx: &CallContext,
        request: RespondActivityTaskFailedRequest,
    ) -> Result<(), ServiceError> {
        redirect_by_token!(
            self,
            ctx,
            request,
            "respond_activity_task_failed",
            respond_activity_task_failed
        )
    }

    async fn respond_activity_task_failed_by_id(
        &self,
        ctx: &CallContext,
        request: RespondActivityTaskFailedByIdRequest,
    ) -> Result<(), ServiceError> {
        redirect_by_domain!(
            self,
            ctx,
            request,
            "respond_activity_task_failed_by_id",
            respond_activity_task_failed_by_id
        )
    }

    async fn respond_activity_task_canceled(
        &self,
        ctx: &CallContext,
        request: RespondActivityTaskCanceledRequest,
    ) -> Result<(), ServiceError> {
        redirect_by_token!(
            self,
            ctx,
            request,
            "respond_activity_task_canceled",
            respond_activity_task_canceled
        )
    }

    async fn respond_activity_task_canceled_by_id(
        &self,
        ctx: &CallContext,
        request: RespondActivityTaskCanceledByIdRequest,
    ) -> Result<(), ServiceError> {
        redirect_by_domain!(
            self,
            ctx,
            request,
            "respond_activity_task_canceled_by_id",
            respond_activity_task_canceled_by_id
        )
    }

    async fn record_activity_task_heartbeat(
        &self,
        ctx: &CallContext,
        request: RecordActivityTaskHeartbeatRequest,
    ) -> Result<RecordActivityTaskHeartbeatResponse, ServiceError> {
        redirect_by_token!(
            self,
            ctx,
            request,
            "record_activity_task_heartbeat",
            record_activity_task_heartbeat
        )
    }

    async fn record_activity_task_heartbeat_by_id(
        &self,
        ctx: &CallContext,
        request: RecordActivityTaskHeartbeatByIdRequest,
    ) -> Result<RecordActivityTaskHeartbeatResponse, ServiceError> {
        redirect_by_domain!(
            self,
            ctx,
            request,
            "record_activity_task_heartbeat_by_id",
            record_activity_task_heartbeat_by_id
        )
    }

    async fn describe_task_list(
        &self,
        ctx: &CallContext,
        request: DescribeTaskListRequest,
    ) -> Result<DescribeTaskListResponse, ServiceError> {
        local_only!(self, ctx, request, "describe_task_list", describe_task_list)
    }

    async fn list_task_list_partitions(
        &self,
        ctx: &CallContext,
        request: ListTaskListPartitionsRequest,
    ) -> Result<ListTaskListPartitionsResponse, ServiceError> {
        local_only!(
            self,
            ctx,
            request,
            "list_task_list_partitions",
            list_task_list_partitions
        )
    }

    async fn list_open_workflow_executions(
        &self,
        ctx: &CallContext,
        request: ListOpenWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, ServiceError> {
        local_only!(
            self,
            ctx,
            request,
            "list_open_workflow_executions",
            list_open_workflow_executions
        )
    }

    async fn list_closed_workflow_executions(
        &self,
        ctx: &CallContext,
        request: ListClosedWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, ServiceError> {
        local_only!(
            self,
            ctx,
            request,
            "list_closed_workflow_executions",
            list_closed_workflow_executions
        )
    }

    async fn list_workflow_executions(
        &self,
        ctx: &CallContext,
        request: ListWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, ServiceError> {
        local_only!(
            self,
            ctx,
            request,
            "list_workflow_executions",
            list_workflow_executions
        )
    }

    async fn scan_workflow_executions(
        &self,
        ctx: &CallContext,
        request: ListWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, ServiceError> {
        local_only!(
            self,
            ctx,
            request,
            "scan_workflow_executions",
            scan_workflow_executions
        )
    }

    async fn count_workflow_executions(
        &self,
        ctx: &CallContext,
        request: CountWorkflowExecutionsRequest,
    ) -> Result<CountWorkflowExecutionsResponse, ServiceError> {
        local_only!(
            self,
            ctx,
            request,
            "count_workflow_executions",
            count_workflow_executions
        )
    }

    async fn list_archived_workflow_executions(
        &self,
        ctx: &CallContext,
        request: ListWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, ServiceError> {
        local_only!(
            self,
            ctx,
            request,
            "list_archived_workflow_executions",
            list_archived_workflow_executions
        )
    }

    async fn get_cluster_info(
        &self,
        ctx: &CallContext,
    ) -> Result<GetClusterInfoResponse, ServiceError> {
        self.inner.get_cluster_info(ctx).await
    }

    async fn get_search_attributes(
        &self,
        ctx: &CallContext,
    ) -> Result<GetSearchAttributesResponse, ServiceError> {
        self.inner.get_search_attributes(ctx).await
    }
}
