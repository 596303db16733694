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

use crate::clients::archival::{QueryArchivedVisibilityRequest, VisibilityArchiver};
use crate::clients::history::{shard_for, HistoryClient};
use crate::clients::matching::{MatchingClient, MatchingClientError};
use crate::clients::visibility::VisibilityManager;
use crate::config::{ClientVersionsConfig, ClusterArchivalConfig, TimeoutsConfig};
use crate::dynamic_config::DynamicConfig;
use crate::model::*;
use crate::service::domain::DomainService;
use crate::service::domain_cache::DomainCache;
use crate::service::history::HistoryReadService;
use crate::service::rate_limiter::{Admission, RequestRateLimiter};
use crate::service::validation::{truncate_payload, RequestValidator, SizeCheck};
use crate::service::{LifecycleState, WorkflowService};
use cascade_common::model::error::ServiceError;
use cascade_common::model::tokens::TaskToken;
use cascade_common::model::{DomainMetadata, TaskList};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

const REASON_RESULT_EXCEEDS_LIMIT: &str = "result exceeds limit";
const REASON_HEARTBEAT_EXCEEDS_LIMIT: &str = "heartbeat details exceed limit";
const REASON_CANCEL_DETAILS_EXCEED_LIMIT: &str = "cancel details exceed limit";
const DECISION_FAIL_CAUSE_FORCE_CLOSE: &str = "FORCE_CLOSE_DECISION";

/// The workflow API handler: validates, rate-limits, size-checks and routes
/// every end-user operation to the owning backend tier.
pub struct WorkflowServiceDefault {
    lifecycle: Arc<LifecycleState>,
    domain_cache: Arc<DomainCache>,
    domain_service: Arc<dyn DomainService>,
    history_client: Arc<dyn HistoryClient>,
    matching_client: Arc<dyn MatchingClient>,
    visibility: Arc<dyn VisibilityManager>,
    visibility_archiver: Arc<dyn VisibilityArchiver>,
    history_read: HistoryReadService,
    rate_limiter: Arc<RequestRateLimiter>,
    validator: RequestValidator,
    dynamic_config: Arc<dyn DynamicConfig>,
    archival: ClusterArchivalConfig,
    client_versions: ClientVersionsConfig,
    timeouts: TimeoutsConfig,
    number_of_shards: i32,
}

impl WorkflowServiceDefault {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        lifecycle: Arc<LifecycleState>,
        domain_cache: Arc<DomainCache>,
        domain_service: Arc<dyn DomainService>,
        history_client: Arc<dyn HistoryClient>,
        matching_client: Arc<dyn MatchingClient>,
        visibility: Arc<dyn VisibilityManager>,
        visibility_archiver: Arc<dyn VisibilityArchiver>,
        history_read: HistoryReadService,
        rate_limiter: Arc<RequestRateLimiter>,
        validator: RequestValidator,
        dynamic_config: Arc<dyn DynamicConfig>,
        archival: ClusterArchivalConfig,
        client_versions: ClientVersionsConfig,
        timeouts: TimeoutsConfig,
        number_of_shards: i32,
    ) -> Self {
        Self {
            lifecycle,
            domain_cache,
            domain_service,
            history_client,
            matching_client,
            visibility,
            visibility_archiver,
            history_read,
            rate_limiter,
            validator,
            dynamic_config,
            archival,
            client_versions,
            timeouts,
            number_of_shards,
        }
    }

    fn ensure_accepting(&self) -> Result<(), ServiceError> {
        if self.lifecycle.is_rejecting() {
            Err(ServiceError::ShuttingDown)
        } else {
            Ok(())
        }
    }

    fn check_client_version(&self, ctx: &CallContext) -> Result<(), ServiceError> {
        if !self.client_versions.check_enabled {
            return Ok(());
        }
        let (Some(client_impl), Some(feature_version)) = (&ctx.client_impl, &ctx.feature_version)
        else {
            return Ok(());
        };
        let minimum = match client_impl.as_str() {
            "go-sdk" => &self.client_versions.min_go_sdk,
            "java-sdk" => &self.client_versions.min_java_sdk,
            _ => return Ok(()),
        };
        if version_less_than(feature_version, minimum) {
            return Err(ServiceError::ClientVersionNotSupported {
                feature: "base".to_string(),
                client_impl: client_impl.clone(),
                supported_versions: format!(">={minimum}"),
            });
        }
        Ok(())
    }

    async fn resolve_domain(&self, name: &str) -> Result<Arc<DomainMetadata>, ServiceError> {
        self.domain_cache.get_required_by_name(name).await
    }

    fn reject_deprecated(&self, domain: &DomainMetadata) -> Result<(), ServiceError> {
        if domain.is_deprecated() {
            Err(ServiceError::BadRequest(format!(
                "Domain {} is deprecated",
                domain.info.name
            )))
        } else {
            Ok(())
        }
    }

    fn throttle(&self, domain: &str, admission: Admission) -> Result<(), ServiceError> {
        self.rate_limiter.allow(domain, admission)
    }

    /// Decodes a task token and re-resolves its domain from the cache; the
    /// domain id inside the token is a routing hint, not a credential.
    async fn token_domain(
        &self,
        token_bytes: &[u8],
    ) -> Result<(TaskToken, Arc<DomainMetadata>), ServiceError> {
        let token = TaskToken::decode(token_bytes)?;
        let domain = self.domain_cache.get_required_by_id(&token.domain_id).await?;
        Ok((token, domain))
    }

    fn shard_of(&self, workflow_id: &str) -> i32 {
        shard_for(workflow_id, self.number_of_shards)
    }

    /// Poll deadline: the context must carry one, it must be long enough to
    /// be a meaningful long poll, and it is capped by the server-side limit.
    fn long_poll_budget(&self, ctx: &CallContext) -> Result<Duration, ServiceError> {
        let remaining = ctx.remaining_time().ok_or_else(|| {
            ServiceError::bad_request("Context deadline is not set for long poll request")
        })?;
        if remaining < self.timeouts.min_long_poll_timeout {
            return Err(ServiceError::bad_request(
                "Context deadline is too short for long poll request",
            ));
        }
        Ok(remaining.min(self.timeouts.long_poll_timeout))
    }

    /// The cleanup notification runs on a detached context: propagating the
    /// client's cancellation would cancel the cleanup itself.
    fn cancel_outstanding_poll_detached(
        &self,
        domain_id: cascade_common::model::DomainId,
        poller_id: Uuid,
        task_list_type: TaskListType,
        task_list: TaskList,
    ) {
        let matching = self.matching_client.clone();
        let timeout = self.timeouts.default_call_timeout;
        tokio::spawn(async move {
            let result = tokio::time::timeout(
                timeout,
                matching.cancel_outstanding_poll(&domain_id, poller_id, task_list_type, &task_list),
            )
            .await;
            match result {
                Ok(Err(err)) => warn!(%poller_id, "cancel_outstanding_poll failed: {err}"),
                Err(_) => warn!(%poller_id, "cancel_outstanding_poll timed out"),
                Ok(Ok(())) => {}
            }
        });
    }

    /// Replaces an over-limit activity response with a synthesized failure
    /// carrying a fixed reason and the payload truncated to the error limit.
    async fn fail_activity_over_limit(
        &self,
        shard_id: i32,
        token: &TaskToken,
        domain_name: &str,
        reason: &str,
        payload: Option<Vec<u8>>,
        identity: Option<String>,
    ) -> Result<(), ServiceError> {
        let mut details = payload;
        truncate_payload(&mut details, self.validator.error_limit(domain_name));
        self.history_client
            .respond_activity_task_failed(shard_id, token, Some(reason.to_string()), details, identity)
            .await
            .map_err(ServiceError::from)
    }
}

fn version_less_than(version: &str, minimum: &str) -> bool {
    let parse = |v: &str| -> Vec<u64> {
        v.trim_start_matches('v')
            .split('.')
            .map(|part| part.parse::<u64>().unwrap_or(0))
            .collect()
    };
    parse(version) < parse(minimum)
}

#[async_trait]
impl WorkflowService for WorkflowServiceDefault {
    async fn register_domain(
        &self,
        ctx: &CallContext,
        request: RegisterDomainRequest,
    ) -> Result<RegisterDomainResponse, ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.name)?;
        self.throttle(&request.name, Admission::Enforce)?;
        let domain = self.domain_service.register_domain(request).await?;
        Ok(RegisterDomainResponse { domain })
    }

    async fn describe_domain(
        &self,
        ctx: &CallContext,
        request: DescribeDomainRequest,
    ) -> Result<DescribeDomainResponse, ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        let domain = self.domain_service.describe_domain(&request).await?;
        Ok(DescribeDomainResponse { domain })
    }

    async fn list_domains(
        &self,
        ctx: &CallContext,
        request: ListDomainsRequest,
    ) -> Result<ListDomainsResponse, ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        let (domains, next_page_token) = self.domain_service.list_domains(&request).await?;
        Ok(ListDomainsResponse {
            domains,
            next_page_token,
        })
    }

    async fn update_domain(
        &self,
        ctx: &CallContext,
        request: UpdateDomainRequest,
    ) -> Result<UpdateDomainResponse, ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.name)?;
        self.throttle(&request.name, Admission::Enforce)?;
        let domain = self.domain_service.update_domain(request).await?;
        Ok(UpdateDomainResponse { domain })
    }

    async fn deprecate_domain(
        &self,
        ctx: &CallContext,
        request: DeprecateDomainRequest,
    ) -> Result<(), ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.name)?;
        self.throttle(&request.name, Admission::Enforce)?;
        self.domain_service.deprecate_domain(request).await?;
        Ok(())
    }

    async fn start_workflow_execution(
        &self,
        ctx: &CallContext,
        request: StartWorkflowExecutionRequest,
    ) -> Result<StartWorkflowExecutionResponse, ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.domain)?;
        self.validator.validate_id("WorkflowId", &request.workflow_id)?;
        self.validator
            .validate_id("WorkflowType", &request.workflow_type.name)?;
        self.validator.validate_task_list(&request.task_list)?;
        self.validator.validate_positive(
            "ExecutionStartToCloseTimeoutSeconds",
            request.execution_start_to_close_timeout_seconds,
        )?;
        self.validator.validate_positive(
            "TaskStartToCloseTimeoutSeconds",
            request.task_start_to_close_timeout_seconds,
        )?;
        self.validator.validate_id("RequestId", &request.request_id)?;
        self.validator
            .validate_optional_id("Identity", request.identity.as_ref())?;
        if let Some(attributes) = &request.search_attributes {
            self.validator
                .validate_search_attributes(&request.domain, attributes)?;
        }

        self.throttle(&request.domain, Admission::Enforce)?;

        if self.validator.check_payload_size(
            "start_workflow_execution",
            &request.domain,
            request.input.as_ref(),
        ) == SizeCheck::Error
        {
            return Err(ServiceError::bad_request("Input exceeds size limit"));
        }

        let domain = self.resolve_domain(&request.domain).await?;
        self.reject_deprecated(&domain)?;

        let shard_id = self.shard_of(&request.workflow_id);
        let run_id = self
            .history_client
            .start_workflow_execution(shard_id, &domain.info.id, &request)
            .await?;
        Ok(StartWorkflowExecutionResponse { run_id })
    }

    async fn signal_workflow_execution(
        &self,
        ctx: &CallContext,
        request: SignalWorkflowExecutionRequest,
    ) -> Result<(), ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.domain)?;
        self.validator
            .validate_id("WorkflowId", &request.workflow_execution.workflow_id)?;
        self.validator.validate_id("SignalName", &request.signal_name)?;
        self.throttle(&request.domain, Admission::Enforce)?;

        if self.validator.check_payload_size(
            "signal_workflow_execution",
            &request.domain,
            request.input.as_ref(),
        ) == SizeCheck::Error
        {
            return Err(ServiceError::bad_request("Signal input exceeds size limit"));
        }

        let domain = self.resolve_domain(&request.domain).await?;
        self.reject_deprecated(&domain)?;

        let shard_id = self.shard_of(&request.workflow_execution.workflow_id);
        self.history_client
            .signal_workflow_execution(shard_id, &domain.info.id, &request)
            .await?;
        Ok(())
    }

    async fn signal_with_start_workflow_execution(
        &self,
        ctx: &CallContext,
        request: SignalWithStartWorkflowExecutionRequest,
    ) -> Result<StartWorkflowExecutionResponse, ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.domain)?;
        self.validator.validate_id("WorkflowId", &request.workflow_id)?;
        self.validator
            .validate_id("WorkflowType", &request.workflow_type.name)?;
        self.validator.validate_task_list(&request.task_list)?;
        self.validator.validate_id("SignalName", &request.signal_name)?;
        self.validator.validate_positive(
            "ExecutionStartToCloseTimeoutSeconds",
            request.execution_start_to_close_timeout_seconds,
        )?;
        self.validator.validate_positive(
            "TaskStartToCloseTimeoutSeconds",
            request.task_start_to_close_timeout_seconds,
        )?;
        if let Some(attributes) = &request.search_attributes {
            self.validator
                .validate_search_attributes(&request.domain, attributes)?;
        }

        self.throttle(&request.domain, Admission::Enforce)?;

        let input_check = self.validator.check_payload_size(
            "signal_with_start_workflow_execution",
            &request.domain,
            request.input.as_ref(),
        );
        let signal_check = self.validator.check_payload_size(
            "signal_with_start_workflow_execution",
            &request.domain,
            request.signal_input.as_ref(),
        );
        if input_check == SizeCheck::Error || signal_check == SizeCheck::Error {
            return Err(ServiceError::bad_request("Input exceeds size limit"));
        }

        let domain = self.resolve_domain(&request.domain).await?;
        self.reject_deprecated(&domain)?;

        let shard_id = self.shard_of(&request.workflow_id);
        let run_id = self
            .history_client
            .signal_with_start_workflow_execution(shard_id, &domain.info.id, &request)
            .await?;
        Ok(StartWorkflowExecutionResponse { run_id })
    }

    async fn request_cancel_workflow_execution(
        &self,
        ctx: &CallContext,
        request: RequestCancelWorkflowExecutionRequest,
    ) -> Result<(), ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.domain)?;
        self.validator
            .validate_id("WorkflowId", &request.workflow_execution.workflow_id)?;
        self.throttle(&request.domain, Admission::Enforce)?;

        let domain = self.resolve_domain(&request.domain).await?;
        let shard_id = self.shard_of(&request.workflow_execution.workflow_id);
        self.history_client
            .request_cancel_workflow_execution(shard_id, &domain.info.id, &request)
            .await?;
        Ok(())
    }

    async fn terminate_workflow_execution(
        &self,
        ctx: &CallContext,
        request: TerminateWorkflowExecutionRequest,
    ) -> Result<(), ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.domain)?;
        self.validator
            .validate_id("WorkflowId", &request.workflow_execution.workflow_id)?;
        self.throttle(&request.domain, Admission::Enforce)?;

        let domain = self.resolve_domain(&request.domain).await?;
        let shard_id = self.shard_of(&request.workflow_execution.workflow_id);
        self.history_client
            .terminate_workflow_execution(shard_id, &domain.info.id, &request)
            .await?;
        Ok(())
    }

    async fn reset_workflow_execution(
        &self,
        ctx: &CallContext,
        request: ResetWorkflowExecutionRequest,
    ) -> Result<ResetWorkflowExecutionResponse, ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.domain)?;
        self.validator
            .validate_id("WorkflowId", &request.workflow_execution.workflow_id)?;
        self.validator.validate_id("RequestId", &request.request_id)?;
        self.throttle(&request.domain, Admission::Enforce)?;

        let domain = self.resolve_domain(&request.domain).await?;
        let shard_id = self.shard_of(&request.workflow_execution.workflow_id);
        let run_id = self
            .history_client
            .reset_workflow_execution(shard_id, &domain.info.id, &request)
            .await?;
        Ok(ResetWorkflowExecutionResponse { run_id })
    }

    async fn refresh_workflow_tasks(
        &self,
        ctx: &CallContext,
        request: RefreshWorkflowTasksRequest,
    ) -> Result<(), ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.domain)?;
        self.validator
            .validate_id("WorkflowId", &request.workflow_execution.workflow_id)?;
        self.throttle(&request.domain, Admission::Enforce)?;

        let domain = self.resolve_domain(&request.domain).await?;
        let shard_id = self.shard_of(&request.workflow_execution.workflow_id);
        self.history_client
            .refresh_workflow_tasks(shard_id, &domain.info.id, &request.workflow_execution)
            .await?;
        Ok(())
    }

    async fn describe_workflow_execution(
        &self,
        ctx: &CallContext,
        request: DescribeWorkflowExecutionRequest,
    ) -> Result<DescribeWorkflowExecutionResponse, ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.domain)?;
        self.validator
            .validate_id("WorkflowId", &request.execution.workflow_id)?;
        self.throttle(&request.domain, Admission::Enforce)?;

        let domain = self.resolve_domain(&request.domain).await?;
        let shard_id = self.shard_of(&request.execution.workflow_id);
        Ok(self
            .history_client
            .describe_workflow_execution(shard_id, &domain.info.id, &request)
            .await?)
    }

    async fn query_workflow(
        &self,
        ctx: &CallContext,
        request: QueryWorkflowRequest,
    ) -> Result<QueryWorkflowResponse, ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.domain)?;
        self.validator
            .validate_id("WorkflowId", &request.execution.workflow_id)?;
        self.validator
            .validate_id("QueryType", &request.query.query_type)?;
        if self.dynamic_config.disallow_query(&request.domain) {
            return Err(ServiceError::QueryDisallowedForDomain(
                request.domain.clone(),
            ));
        }
        self.throttle(&request.domain, Admission::Enforce)?;

        if self.validator.check_payload_size(
            "query_workflow",
            &request.domain,
            request.query.query_args.as_ref(),
        ) == SizeCheck::Error
        {
            return Err(ServiceError::bad_request("Query args exceed size limit"));
        }

        let domain = self.resolve_domain(&request.domain).await?;
        let shard_id = self.shard_of(&request.execution.workflow_id);
        Ok(self
            .history_client
            .query_workflow(shard_id, &domain.info.id, &request)
            .await?)
    }

    async fn get_workflow_execution_history(
        &self,
        ctx: &CallContext,
        request: GetWorkflowExecutionHistoryRequest,
    ) -> Result<GetWorkflowExecutionHistoryResponse, ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.domain)?;
        self.validator
            .validate_id("WorkflowId", &request.execution.workflow_id)?;
        if request.wait_for_new_event {
            self.long_poll_budget(ctx)?;
        }
        self.throttle(&request.domain, Admission::Enforce)?;

        let domain = self.resolve_domain(&request.domain).await?;
        self.history_read
            .get_history(ctx, &domain, &request, ctx.features.raw_history_query)
            .await
    }

    async fn poll_for_decision_task(
        &self,
        ctx: &CallContext,
        request: PollForDecisionTaskRequest,
    ) -> Result<PollForDecisionTaskResponse, ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.domain)?;
        self.validator.validate_task_list(&request.task_list)?;
        self.validator
            .validate_identity_soft("poll_for_decision_task", request.identity.as_ref());
        let poll_timeout = self.long_poll_budget(ctx)?;
        self.throttle(&request.domain, Admission::Enforce)?;

        let domain = self.resolve_domain(&request.domain).await?;
        let poller_id = Uuid::new_v4();

        let poll = self.matching_client.poll_for_decision_task(
            poller_id,
            &domain.info.id,
            &request,
            poll_timeout,
        );

        let result = tokio::select! {
            _ = ctx.cancellation.cancelled() => Err(MatchingClientError::PollCanceled),
            result = poll => result,
        };

        match result {
            Ok(response) => {
                self.validator
                    .validate_identity_soft("poll_for_decision_task", request.identity.as_ref());
                Ok(response)
            }
            Err(MatchingClientError::PollCanceled) => {
                // the client gave up; unblock matching and reply benignly
                self.cancel_outstanding_poll_detached(
                    domain.info.id.clone(),
                    poller_id,
                    TaskListType::Decision,
                    request.task_list.clone(),
                );
                Ok(PollForDecisionTaskResponse::empty())
            }
            Err(err) if ctx.is_canceled() => {
                warn!("poll_for_decision_task failed after cancellation: {err}");
                self.cancel_outstanding_poll_detached(
                    domain.info.id.clone(),
                    poller_id,
                    TaskListType::Decision,
                    request.task_list.clone(),
                );
                Ok(PollForDecisionTaskResponse::empty())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn poll_for_activity_task(
        &self,
        ctx: &CallContext,
        request: PollForActivityTaskRequest,
    ) -> Result<PollForActivityTaskResponse, ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.domain)?;
        self.validator.validate_task_list(&request.task_list)?;
        self.validator
            .validate_identity_soft("poll_for_activity_task", request.identity.as_ref());
        let poll_timeout = self.long_poll_budget(ctx)?;
        self.throttle(&request.domain, Admission::Enforce)?;

        let domain = self.resolve_domain(&request.domain).await?;
        let poller_id = Uuid::new_v4();

        let poll = self.matching_client.poll_for_activity_task(
            poller_id,
            &domain.info.id,
            &request,
            poll_timeout,
        );

        let result = tokio::select! {
            _ = ctx.cancellation.cancelled() => Err(MatchingClientError::PollCanceled),
            result = poll => result,
        };

        match result {
            Ok(response) => {
                self.validator
                    .validate_identity_soft("poll_for_activity_task", request.identity.as_ref());
                Ok(response)
            }
            Err(MatchingClientError::PollCanceled) => {
                self.cancel_outstanding_poll_detached(
                    domain.info.id.clone(),
                    poller_id,
                    TaskListType::Activity,
                    request.task_list.clone(),
                );
                Ok(PollForActivityTaskResponse::empty())
            }
            Err(err) if ctx.is_canceled() => {
                warn!("poll_for_activity_task failed after cancellation: {err}");
                self.cancel_outstanding_poll_detached(
                    domain.info.id.clone(),
                    poller_id,
                    TaskListType::Activity,
                    request.task_list.clone(),
                );
                Ok(PollForActivityTaskResponse::empty())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn respond_decision_task_completed(
        &self,
        ctx: &CallContext,
        request: RespondDecisionTaskCompletedRequest,
    ) -> Result<RespondDecisionTaskCompletedResponse, ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        let (token, domain) = self.token_domain(&request.task_token).await?;
        self.throttle(&domain.info.name, Admission::CountOnly)?;
        self.validator
            .validate_identity_soft("respond_decision_task_completed", request.identity.as_ref());
        if let Some(sticky) = &request.sticky_attributes {
            self.validator.validate_task_list(&sticky.worker_task_list)?;
        }

        let shard_id = self.shard_of(&token.workflow_id);
        let domain_name = &domain.info.name;

        // decisions that carry user payloads are bounded individually; an
        // oversized decision forces the decision task to fail so the
        // workflow does not get stuck repeating it
        for decision in &request.decisions {
            let payload_size = serde_json::to_vec(&decision.attributes)
                .map(|bytes| bytes.len())
                .unwrap_or(0);
            let checked = matches!(
                decision.decision_type,
                DecisionType::RecordMarker
                    | DecisionType::ScheduleActivityTask
                    | DecisionType::StartChildWorkflowExecution
                    | DecisionType::SignalExternalWorkflowExecution
                    | DecisionType::ContinueAsNewWorkflowExecution
                    | DecisionType::CompleteWorkflowExecution
                    | DecisionType::FailWorkflowExecution
                    | DecisionType::UpsertWorkflowSearchAttributes
            );
            if checked
                && self.validator.check_size(
                    "respond_decision_task_completed",
                    domain_name,
                    payload_size,
                ) == SizeCheck::Error
            {
                self.history_client
                    .respond_decision_task_failed(
                        shard_id,
                        &token,
                        Some(DECISION_FAIL_CAUSE_FORCE_CLOSE.to_string()),
                        None,
                    )
                    .await?;
                return Err(ServiceError::bad_request(
                    "Decision result exceeds size limit",
                ));
            }
        }

        let total_size = serde_json::to_vec(&request.decisions)
            .map(|bytes| bytes.len())
            .unwrap_or(0);

        Ok(self
            .history_client
            .respond_decision_task_completed(
                shard_id,
                &token,
                total_size,
                request.binary_checksum.clone(),
            )
            .await?)
    }

    async fn respond_decision_task_failed(
        &self,
        ctx: &CallContext,
        mut request: RespondDecisionTaskFailedRequest,
    ) -> Result<(), ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        let (token, domain) = self.token_domain(&request.task_token).await?;
        self.throttle(&domain.info.name, Admission::CountOnly)?;

        // over-limit details are truncated in place and the failure accepted
        if self.validator.check_payload_size(
            "respond_decision_task_failed",
            &domain.info.name,
            request.details.as_ref(),
        ) == SizeCheck::Error
        {
            truncate_payload(
                &mut request.details,
                self.validator.error_limit(&domain.info.name),
            );
        }

        let shard_id = self.shard_of(&token.workflow_id);
        self.history_client
            .respond_decision_task_failed(shard_id, &token, request.cause, request.details)
            .await?;
        Ok(())
    }

    async fn respond_query_task_completed(
        &self,
        ctx: &CallContext,
        mut request: RespondQueryTaskCompletedRequest,
    ) -> Result<(), ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        let (_token, domain) = self.token_domain(&request.task_token).await?;
        self.throttle(&domain.info.name, Admission::CountOnly)?;

        // an oversized query answer is converted into a query failure
        if self.validator.check_payload_size(
            "respond_query_task_completed",
            &domain.info.name,
            request.query_result.as_ref(),
        ) == SizeCheck::Error
        {
            request.completed_type = QueryTaskCompletedType::Failed;
            request.query_result = None;
            request.error_message = Some("query result size exceeds limit".to_string());
        }

        self.matching_client
            .respond_query_task_completed(&domain.info.id, &request)
            .await?;
        Ok(())
    }

    async fn respond_activity_task_completed(
        &self,
        ctx: &CallContext,
        request: RespondActivityTaskCompletedRequest,
    ) -> Result<(), ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        let (token, domain) = self.token_domain(&request.task_token).await?;
        self.throttle(&domain.info.name, Admission::CountOnly)?;
        self.validator
            .validate_identity_soft("respond_activity_task_completed", request.identity.as_ref());

        let shard_id = self.shard_of(&token.workflow_id);
        if self.validator.check_payload_size(
            "respond_activity_task_completed",
            &domain.info.name,
            request.result.as_ref(),
        ) == SizeCheck::Error
        {
            // the completion is not recorded; the activity fails instead
            return self
                .fail_activity_over_limit(
                    shard_id,
                    &token,
                    &domain.info.name,
                    REASON_RESULT_EXCEEDS_LIMIT,
                    request.result,
                    request.identity,
                )
                .await;
        }

        self.history_client
            .respond_activity_task_completed(shard_id, &token, request.result, request.identity)
            .await?;
        Ok(())
    }

    async fn respond_activity_task_completed_by_id(
        &self,
        ctx: &CallContext,
        request: RespondActivityTaskCompletedByIdRequest,
    ) -> Result<(), ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.domain)?;
        self.validator.validate_id("WorkflowId", &request.workflow_id)?;
        self.validator.validate_id("ActivityId", &request.activity_id)?;
        self.throttle(&request.domain, Admission::CountOnly)?;

        let domain = self.resolve_domain(&request.domain).await?;
        let shard_id = self.shard_of(&request.workflow_id);
        let token = self
            .history_client
            .resolve_activity_task(
                shard_id,
                &domain.info.id,
                &request.workflow_id,
                request.run_id.as_ref(),
                &request.activity_id,
            )
            .await?;

        if self.validator.check_payload_size(
            "respond_activity_task_completed_by_id",
            &domain.info.name,
            request.result.as_ref(),
        ) == SizeCheck::Error
        {
            return self
                .fail_activity_over_limit(
                    shard_id,
                    &token,
                    &domain.info.name,
                    REASON_RESULT_EXCEEDS_LIMIT,
                    request.result,
                    request.identity,
                )
                .await;
        }

        self.history_client
            .respond_activity_task_completed(shard_id, &token, request.result, request.identity)
            .await?;
        Ok(())
    }

    async fn respond_activity_task_failed(
        &self,
        ctx: &CallContext,
        mut request: RespondActivityTaskFailedRequest,
    ) -> Result<(), ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        let (token, domain) = self.token_domain(&request.task_token).await?;
        self.throttle(&domain.info.name, Admission::CountOnly)?;

        if self.validator.check_payload_size(
            "respond_activity_task_failed",
            &domain.info.name,
            request.details.as_ref(),
        ) == SizeCheck::Error
        {
            truncate_payload(
                &mut request.details,
                self.validator.error_limit(&domain.info.name),
            );
        }

        let shard_id = self.shard_of(&token.workflow_id);
        self.history_client
            .respond_activity_task_failed(
                shard_id,
                &token,
                request.reason,
                request.details,
                request.identity,
            )
            .await?;
        Ok(())
    }

    async fn respond_activity_task_failed_by_id(
        &self,
        ctx: &CallContext,
        mut request: RespondActivityTaskFailedByIdRequest,
    ) -> Result<(), ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.domain)?;
        self.validator.validate_id("WorkflowId", &request.workflow_id)?;
        self.validator.validate_id("ActivityId", &request.activity_id)?;
        self.throttle(&request.domain, Admission::CountOnly)?;

        let domain = self.resolve_domain(&request.domain).await?;
        let shard_id = self.shard_of(&request.workflow_id);
        let token = self
            .history_client
            .resolve_activity_task(
                shard_id,
                &domain.info.id,
                &request.workflow_id,
                request.run_id.as_ref(),
                &request.activity_id,
            )
            .await?;

        if self.validator.check_payload_size(
            "respond_activity_task_failed_by_id",
            &domain.info.name,
            request.details.as_ref(),
        ) == SizeCheck::Error
        {
            truncate_payload(
                &mut request.details,
                self.validator.error_limit(&domain.info.name),
            );
        }

        self.history_client
            .respond_activity_task_failed(
                shard_id,
                &token,
                request.reason,
                request.details,
                request.identity,
            )
            .await?;
        Ok(())
    }

    async fn respond_activity_task_canceled(
        &self,
        ctx: &CallContext,
        request: RespondActivityTaskCanceledRequest,
    ) -> Result<(), ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        let (token, domain) = self.token_domain(&request.task_token).await?;
        self.throttle(&domain.info.name, Admission::CountOnly)?;

        let shard_id = self.shard_of(&token.workflow_id);
        if self.validator.check_payload_size(
            "respond_activity_task_canceled",
            &domain.info.name,
            request.details.as_ref(),
        ) == SizeCheck::Error
        {
            return self
                .fail_activity_over_limit(
                    shard_id,
                    &token,
                    &domain.info.name,
                    REASON_CANCEL_DETAILS_EXCEED_LIMIT,
                    request.details,
                    request.identity,
                )
                .await;
        }

        self.history_client
            .respond_activity_task_canceled(shard_id, &token, request.details, request.identity)
            .await?;
        Ok(())
    }

    async fn respond_activity_task_canceled_by_id(
        &self,
        ctx: &CallContext,
        request: RespondActivityTaskCanceledByIdRequest,
    ) -> Result<(), ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.domain)?;
        self.validator.validate_id("WorkflowId", &request.workflow_id)?;
        self.validator.validate_id("ActivityId", &request.activity_id)?;
        self.throttle(&request.domain, Admission::CountOnly)?;

        let domain = self.resolve_domain(&request.domain).await?;
        let shard_id = self.shard_of(&request.workflow_id);
        let token = self
            .history_client
            .resolve_activity_task(
                shard_id,
                &domain.info.id,
                &request.workflow_id,
                request.run_id.as_ref(),
                &request.activity_id,
            )
            .await?;

        if self.validator.check_payload_size(
            "respond_activity_task_canceled_by_id",
            &domain.info.name,
            request.details.as_ref(),
        ) == SizeCheck::Error
        {
            return self
                .fail_activity_over_limit(
                    shard_id,
                    &token,
                    &domain.info.name,
                    REASON_CANCEL_DETAILS_EXCEED_LIMIT,
                    request.details,
                    request.identity,
                )
                .await;
        }

        self.history_client
            .respond_activity_task_canceled(shard_id, &token, request.details, request.identity)
            .await?;
        Ok(())
    }

    async fn record_activity_task_heartbeat(
        &self,
        ctx: &CallContext,
        request: RecordActivityTaskHeartbeatRequest,
    ) -> Result<RecordActivityTaskHeartbeatResponse, ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        let (token, domain) = self.token_domain(&request.task_token).await?;
        self.throttle(&domain.info.name, Admission::CountOnly)?;

        let shard_id = self.shard_of(&token.workflow_id);
        if self.validator.check_payload_size(
            "record_activity_task_heartbeat",
            &domain.info.name,
            request.details.as_ref(),
        ) == SizeCheck::Error
        {
            // the activity is failed, and the worker is told to stop
            // heartbeating through a success-shaped cancel-requested reply
            self.fail_activity_over_limit(
                shard_id,
                &token,
                &domain.info.name,
                REASON_HEARTBEAT_EXCEEDS_LIMIT,
                request.details,
                request.identity,
            )
            .await?;
            return Ok(RecordActivityTaskHeartbeatResponse {
                cancel_requested: true,
            });
        }

        Ok(self
            .history_client
            .record_activity_task_heartbeat(shard_id, &token, request.details, request.identity)
            .await?)
    }

    async fn record_activity_task_heartbeat_by_id(
        &self,
        ctx: &CallContext,
        request: RecordActivityTaskHeartbeatByIdRequest,
    ) -> Result<RecordActivityTaskHeartbeatResponse, ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.domain)?;
        self.validator.validate_id("WorkflowId", &request.workflow_id)?;
        self.validator.validate_id("ActivityId", &request.activity_id)?;
        self.throttle(&request.domain, Admission::CountOnly)?;

        let domain = self.resolve_domain(&request.domain).await?;
        let shard_id = self.shard_of(&request.workflow_id);
        let token = self
            .history_client
            .resolve_activity_task(
                shard_id,
                &domain.info.id,
                &request.workflow_id,
                request.run_id.as_ref(),
                &request.activity_id,
            )
            .await?;

        if self.validator.check_payload_size(
            "record_activity_task_heartbeat_by_id",
            &domain.info.name,
            request.details.as_ref(),
        ) == SizeCheck::Error
        {
            self.fail_activity_over_limit(
                shard_id,
                &token,
                &domain.info.name,
                REASON_HEARTBEAT_EXCEEDS_LIMIT,
                request.details,
                request.identity,
            )
            .await?;
            return Ok(RecordActivityTaskHeartbeatResponse {
                cancel_requested: true,
            });
        }

        Ok(self
            .history_client
            .record_activity_task_heartbeat(shard_id, &token, request.details, request.identity)
            .await?)
    }

    async fn describe_task_list(
        &self,
        ctx: &CallContext,
        request: DescribeTaskListRequest,
    ) -> Result<DescribeTaskListResponse, ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.domain)?;
        self.validator.validate_task_list(&request.task_list)?;
        self.throttle(&request.domain, Admission::Enforce)?;

        let domain = self.resolve_domain(&request.domain).await?;
        Ok(self
            .matching_client
            .describe_task_list(&domain.info.id, &request)
            .await?)
    }

    async fn list_task_list_partitions(
        &self,
        ctx: &CallContext,
        request: ListTaskListPartitionsRequest,
    ) -> Result<ListTaskListPartitionsResponse, ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.domain)?;
        self.validator.validate_task_list(&request.task_list)?;
        self.throttle(&request.domain, Admission::Enforce)?;

        let domain = self.resolve_domain(&request.domain).await?;
        Ok(self
            .matching_client
            .list_task_list_partitions(&domain.info.id, &request)
            .await?)
    }

    async fn list_open_workflow_executions(
        &self,
        ctx: &CallContext,
        request: ListOpenWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.domain)?;
        self.validate_visibility_page_size(&request.domain, request.maximum_page_size)?;
        self.throttle(&request.domain, Admission::Enforce)?;

        let domain = self.resolve_domain(&request.domain).await?;
        Ok(self
            .visibility
            .list_open_workflow_executions(&domain.info.id, &request)
            .await?)
    }

    async fn list_closed_workflow_executions(
        &self,
        ctx: &CallContext,
        request: ListClosedWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.domain)?;
        self.validate_visibility_page_size(&request.domain, request.maximum_page_size)?;
        self.throttle(&request.domain, Admission::Enforce)?;

        let domain = self.resolve_domain(&request.domain).await?;
        Ok(self
            .visibility
            .list_closed_workflow_executions(&domain.info.id, &request)
            .await?)
    }

    async fn list_workflow_executions(
        &self,
        ctx: &CallContext,
        request: ListWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.domain)?;
        self.validate_visibility_page_size(&request.domain, request.page_size)?;
        self.throttle(&request.domain, Admission::Enforce)?;

        let domain = self.resolve_domain(&request.domain).await?;
        Ok(self
            .visibility
            .list_workflow_executions(&domain.info.id, &request)
            .await?)
    }

    async fn scan_workflow_executions(
        &self,
        ctx: &CallContext,
        request: ListWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.domain)?;
        self.validate_visibility_page_size(&request.domain, request.page_size)?;
        self.throttle(&request.domain, Admission::Enforce)?;

        let domain = self.resolve_domain(&request.domain).await?;
        Ok(self
            .visibility
            .scan_workflow_executions(&domain.info.id, &request)
            .await?)
    }

    async fn count_workflow_executions(
        &self,
        ctx: &CallContext,
        request: CountWorkflowExecutionsRequest,
    ) -> Result<CountWorkflowExecutionsResponse, ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.domain)?;
        self.throttle(&request.domain, Admission::Enforce)?;

        let domain = self.resolve_domain(&request.domain).await?;
        Ok(self
            .visibility
            .count_workflow_executions(&domain.info.id, &request)
            .await?)
    }

    async fn list_archived_workflow_executions(
        &self,
        ctx: &CallContext,
        request: ListWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        self.validator.validate_domain_name(&request.domain)?;
        self.validate_visibility_page_size(&request.domain, request.page_size)?;
        self.throttle(&request.domain, Admission::Enforce)?;

        let domain = self.resolve_domain(&request.domain).await?;
        if !self.archival.visibility_enabled
            || !domain.config.visibility_archival.is_enabled()
        {
            return Err(ServiceError::bad_request(
                "Cluster or domain is not configured for visibility archival",
            ));
        }

        let page_size = request
            .page_size
            .filter(|size| *size > 0)
            .unwrap_or_else(|| self.dynamic_config.visibility_max_page_size(&request.domain));
        Ok(self
            .visibility_archiver
            .query(
                &domain.config.visibility_archival.uri,
                QueryArchivedVisibilityRequest {
                    domain_id: domain.info.id.clone(),
                    page_size,
                    next_page_token: request.next_page_token.clone(),
                    query: request.query.clone().unwrap_or_default(),
                },
            )
            .await?)
    }

    async fn get_cluster_info(
        &self,
        _ctx: &CallContext,
    ) -> Result<GetClusterInfoResponse, ServiceError> {
        Ok(GetClusterInfoResponse {
            supported_client_versions: SupportedClientVersions {
                go_sdk: self.client_versions.min_go_sdk.clone(),
                java_sdk: self.client_versions.min_java_sdk.clone(),
            },
        })
    }

    async fn get_search_attributes(
        &self,
        ctx: &CallContext,
    ) -> Result<GetSearchAttributesResponse, ServiceError> {
        self.ensure_accepting()?;
        self.check_client_version(ctx)?;
        Ok(GetSearchAttributesResponse {
            keys: self.dynamic_config.valid_search_attributes(),
        })
    }
}

impl WorkflowServiceDefault {
    fn validate_visibility_page_size(
        &self,
        domain: &str,
        page_size: Option<i32>,
    ) -> Result<(), ServiceError> {
        let max = self.dynamic_config.visibility_max_page_size(domain);
        match page_size {
            Some(size) if size > max => Err(ServiceError::BadRequest(format!(
                "Page size {size} exceeds the maximum of {max}"
            ))),
            _ => Ok(()),
        }
    }

}

#[cfg(test)]
mod tests {
    use test_r::test;

    use super::version_less_than;

    #[test]
    fn version_comparison_is_numeric_per_component() {
        assert!(version_less_than("1.4.9", "1.5.0"));
        assert!(!version_less_than("1.5.0", "1.5.0"));
        assert!(!version_less_than("1.10.0", "1.5.0"));
        assert!(version_less_than("v0.9", "1.0.0"));
    }
}
