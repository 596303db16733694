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

use crate::api::{call_context, ApiError, ApiResult, ApiTags, CancelOnDisconnect};
use crate::config::TimeoutsConfig;
use crate::model::*;
use crate::service::{with_panic_capture, WorkflowService};
use cascade_common::model::error::ServiceError;
use cascade_common::model::Empty;
use cascade_common::recorded_http_api_request;
use poem_openapi::payload::Json;
use poem_openapi::OpenApi;
use std::sync::Arc;
use tracing::Instrument;

pub struct WorkflowApi {
    pub service: Arc<dyn WorkflowService>,
    pub timeouts: TimeoutsConfig,
}

#[OpenApi(prefix_path = "/v1", tag = ApiTags::Workflow)]
impl WorkflowApi {
    /// Start workflow execution
    #[oai(
        path = "/workflow/start",
        method = "post",
        operation_id = "start_workflow_execution"
    )]
    async fn start_workflow_execution(
        &self,
        raw: &poem::Request,
        request: Json<StartWorkflowExecutionRequest>,
    ) -> ApiResult<Json<StartWorkflowExecutionResponse>> {
        let record = recorded_http_api_request!(
            "start_workflow_execution",
            domain = request.0.domain,
            workflow_id = request.0.workflow_id
        );
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "start_workflow_execution",
            self.service.start_workflow_execution(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// Signal workflow execution
    #[oai(
        path = "/workflow/signal",
        method = "post",
        operation_id = "signal_workflow_execution"
    )]
    async fn signal_workflow_execution(
        &self,
        raw: &poem::Request,
        request: Json<SignalWorkflowExecutionRequest>,
    ) -> ApiResult<Json<Empty>> {
        let record = recorded_http_api_request!(
            "signal_workflow_execution",
            domain = request.0.domain,
            workflow_id = request.0.workflow_execution.workflow_id,
            signal_name = request.0.signal_name
        );
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "signal_workflow_execution",
            self.service.signal_workflow_execution(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record
            .result(response)
            .map(|_| Json(Empty::default()))
            .map_err(ApiError::from)
    }

    /// Signal workflow execution, starting it first if it is not running
    #[oai(
        path = "/workflow/signal-with-start",
        method = "post",
        operation_id = "signal_with_start_workflow_execution"
    )]
    async fn signal_with_start_workflow_execution(
        &self,
        raw: &poem::Request,
        request: Json<SignalWithStartWorkflowExecutionRequest>,
    ) -> ApiResult<Json<StartWorkflowExecutionResponse>> {
        let record = recorded_http_api_request!(
            "signal_with_start_workflow_execution",
            domain = request.0.domain,
            workflow_id = request.0.workflow_id
        );
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "signal_with_start_workflow_execution",
            self.service
                .signal_with_start_workflow_execution(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// Request cancellation of a workflow execution
    #[oai(
        path = "/workflow/request-cancel",
        method = "post",
        operation_id = "request_cancel_workflow_execution"
    )]
    async fn request_cancel_workflow_execution(
        &self,
        raw: &poem::Request,
        request: Json<RequestCancelWorkflowExecutionRequest>,
    ) -> ApiResult<Json<Empty>> {
        let record = recorded_http_api_request!(
            "request_cancel_workflow_execution",
            domain = request.0.domain,
            workflow_id = request.0.workflow_execution.workflow_id
        );
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "request_cancel_workflow_execution",
            self.service
                .request_cancel_workflow_execution(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record
            .result(response)
            .map(|_| Json(Empty::default()))
            .map_err(ApiError::from)
    }

    /// Terminate workflow execution
    #[oai(
        path = "/workflow/terminate",
        method = "post",
        operation_id = "terminate_workflow_execution"
    )]
    async fn terminate_workflow_execution(
        &self,
        raw: &poem::Request,
        request: Json<TerminateWorkflowExecutionRequest>,
    ) -> ApiResult<Json<Empty>> {
        let record = recorded_http_api_request!(
            "terminate_workflow_execution",
            domain = request.0.domain,
            workflow_id = request.0.workflow_execution.workflow_id
        );
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "terminate_workflow_execution",
            self.service.terminate_workflow_execution(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record
            .result(response)
            .map(|_| Json(Empty::default()))
            .map_err(ApiError::from)
    }

    /// Reset workflow execution to an earlier decision
    #[oai(
        path = "/workflow/reset",
        method = "post",
        operation_id = "reset_workflow_execution"
    )]
    async fn reset_workflow_execution(
        &self,
        raw: &poem::Request,
        request: Json<ResetWorkflowExecutionRequest>,
    ) -> ApiResult<Json<ResetWorkflowExecutionResponse>> {
        let record = recorded_http_api_request!(
            "reset_workflow_execution",
            domain = request.0.domain,
            workflow_id = request.0.workflow_execution.workflow_id
        );
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "reset_workflow_execution",
            self.service.reset_workflow_execution(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// Refresh the transfer and timer tasks of a workflow execution
    #[oai(
        path = "/workflow/refresh-tasks",
        method = "post",
        operation_id = "refresh_workflow_tasks"
    )]
    async fn refresh_workflow_tasks(
        &self,
        raw: &poem::Request,
        request: Json<RefreshWorkflowTasksRequest>,
    ) -> ApiResult<Json<Empty>> {
        let record = recorded_http_api_request!(
            "refresh_workflow_tasks",
            domain = request.0.domain,
            workflow_id = request.0.workflow_execution.workflow_id
        );
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "refresh_workflow_tasks",
            self.service.refresh_workflow_tasks(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record
            .result(response)
            .map(|_| Json(Empty::default()))
            .map_err(ApiError::from)
    }

    /// Describe workflow execution
    #[oai(
        path = "/workflow/describe",
        method = "post",
        operation_id = "describe_workflow_execution"
    )]
    async fn describe_workflow_execution(
        &self,
        raw: &poem::Request,
        request: Json<DescribeWorkflowExecutionRequest>,
    ) -> ApiResult<Json<DescribeWorkflowExecutionResponse>> {
        let record = recorded_http_api_request!(
            "describe_workflow_execution",
            domain = request.0.domain,
            workflow_id = request.0.execution.workflow_id
        );
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "describe_workflow_execution",
            self.service.describe_workflow_execution(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// Query workflow execution state
    #[oai(
        path = "/workflow/query",
        method = "post",
        operation_id = "query_workflow"
    )]
    async fn query_workflow(
        &self,
        raw: &poem::Request,
        request: Json<QueryWorkflowRequest>,
    ) -> ApiResult<Json<QueryWorkflowResponse>> {
        let record = recorded_http_api_request!(
            "query_workflow",
            domain = request.0.domain,
            workflow_id = request.0.execution.workflow_id,
            query_type = request.0.query.query_type
        );
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "query_workflow",
            self.service.query_workflow(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// Read workflow execution history
    ///
    /// Paged via an opaque continuation token. Can long-poll for new events
    /// or wait for the close event only; runs detached so a client
    /// disconnect is observed as a cancellation.
    #[oai(
        path = "/workflow/history",
        method = "post",
        operation_id = "get_workflow_execution_history"
    )]
    async fn get_workflow_execution_history(
        &self,
        raw: &poem::Request,
        request: Json<GetWorkflowExecutionHistoryRequest>,
    ) -> ApiResult<Json<GetWorkflowExecutionHistoryResponse>> {
        let record = recorded_http_api_request!(
            "get_workflow_execution_history",
            domain = request.0.domain,
            workflow_id = request.0.execution.workflow_id
        );
        let ctx = call_context(raw, &self.timeouts);
        let guard = CancelOnDisconnect(ctx.cancellation.clone());
        let service = self.service.clone();
        let handle = tokio::spawn(
            async move {
                with_panic_capture(
                    "get_workflow_execution_history",
                    service.get_workflow_execution_history(&ctx, request.0),
                )
                .await
            }
            .instrument(record.span.clone()),
        );
        let response = handle
            .await
            .unwrap_or_else(|join_error| Err(ServiceError::internal(join_error)));
        drop(guard);
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// Cluster metadata for connecting clients
    #[oai(
        path = "/cluster/info",
        method = "get",
        operation_id = "get_cluster_info"
    )]
    async fn get_cluster_info(
        &self,
        raw: &poem::Request,
    ) -> ApiResult<Json<GetClusterInfoResponse>> {
        let record = recorded_http_api_request!("get_cluster_info",);
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture("get_cluster_info", self.service.get_cluster_info(&ctx))
            .instrument(record.span.clone())
            .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// The registered search attribute keys and their value types
    #[oai(
        path = "/cluster/search-attributes",
        method = "get",
        operation_id = "get_search_attributes"
    )]
    async fn get_search_attributes(
        &self,
        raw: &poem::Request,
    ) -> ApiResult<Json<GetSearchAttributesResponse>> {
        let record = recorded_http_api_request!("get_search_attributes",);
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "get_search_attributes",
            self.service.get_search_attributes(&ctx),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }
}
