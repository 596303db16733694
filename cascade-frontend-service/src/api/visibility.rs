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

use crate::api::{call_context, ApiError, ApiResult, ApiTags};
use crate::config::TimeoutsConfig;
use crate::model::*;
use crate::service::{with_panic_capture, WorkflowService};
use cascade_common::recorded_http_api_request;
use poem_openapi::payload::Json;
use poem_openapi::OpenApi;
use std::sync::Arc;
use tracing::Instrument;

pub struct VisibilityApi {
    pub service: Arc<dyn WorkflowService>,
    pub timeouts: TimeoutsConfig,
}

#[OpenApi(prefix_path = "/v1/visibility", tag = ApiTags::Visibility)]
impl VisibilityApi {
    /// List open workflow executions
    #[oai(
        path = "/list-open",
        method = "post",
        operation_id = "list_open_workflow_executions"
    )]
    async fn list_open_workflow_executions(
        &self,
        raw: &poem::Request,
        request: Json<ListOpenWorkflowExecutionsRequest>,
    ) -> ApiResult<Json<ListWorkflowExecutionsResponse>> {
        let record =
            recorded_http_api_request!("list_open_workflow_executions", domain = request.0.domain);
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "list_open_workflow_executions",
            self.service.list_open_workflow_executions(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// List closed workflow executions
    #[oai(
        path = "/list-closed",
        method = "post",
        operation_id = "list_closed_workflow_executions"
    )]
    async fn list_closed_workflow_executions(
        &self,
        raw: &poem::Request,
        request: Json<ListClosedWorkflowExecutionsRequest>,
    ) -> ApiResult<Json<ListWorkflowExecutionsResponse>> {
        let record = recorded_http_api_request!(
            "list_closed_workflow_executions",
            domain = request.0.domain
        );
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "list_closed_workflow_executions",
            self.service.list_closed_workflow_executions(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// List workflow executions matching a visibility query
    #[oai(
        path = "/list",
        method = "post",
        operation_id = "list_workflow_executions"
    )]
    async fn list_workflow_executions(
        &self,
        raw: &poem::Request,
        request: Json<ListWorkflowExecutionsRequest>,
    ) -> ApiResult<Json<ListWorkflowExecutionsResponse>> {
        let record =
            recorded_http_api_request!("list_workflow_executions", domain = request.0.domain);
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "list_workflow_executions",
            self.service.list_workflow_executions(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// Scan workflow executions without a stable sort order
    #[oai(
        path = "/scan",
        method = "post",
        operation_id = "scan_workflow_executions"
    )]
    async fn scan_workflow_executions(
        &self,
        raw: &poem::Request,
        request: Json<ListWorkflowExecutionsRequest>,
    ) -> ApiResult<Json<ListWorkflowExecutionsResponse>> {
        let record =
            recorded_http_api_request!("scan_workflow_executions", domain = request.0.domain);
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "scan_workflow_executions",
            self.service.scan_workflow_executions(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// Count workflow executions matching a visibility query
    #[oai(
        path = "/count",
        method = "post",
        operation_id = "count_workflow_executions"
    )]
    async fn count_workflow_executions(
        &self,
        raw: &poem::Request,
        request: Json<CountWorkflowExecutionsRequest>,
    ) -> ApiResult<Json<CountWorkflowExecutionsResponse>> {
        let record =
            recorded_http_api_request!("count_workflow_executions", domain = request.0.domain);
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "count_workflow_executions",
            self.service.count_workflow_executions(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// List archived workflow executions
    #[oai(
        path = "/list-archived",
        method = "post",
        operation_id = "list_archived_workflow_executions"
    )]
    async fn list_archived_workflow_executions(
        &self,
        raw: &poem::Request,
        request: Json<ListWorkflowExecutionsRequest>,
    ) -> ApiResult<Json<ListWorkflowExecutionsResponse>> {
        let record = recorded_http_api_request!(
            "list_archived_workflow_executions",
            domain = request.0.domain
        );
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "list_archived_workflow_executions",
            self.service
                .list_archived_workflow_executions(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }
}
