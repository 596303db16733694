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

pub struct TaskApi {
    pub service: Arc<dyn WorkflowService>,
    pub timeouts: TimeoutsConfig,
}

#[OpenApi(prefix_path = "/v1/tasks", tag = ApiTags::Task)]
impl TaskApi {
    /// Long-poll for a decision task
    ///
    /// Runs detached: if the caller disconnects, the outstanding poll at the
    /// matching tier is canceled on a fresh context.
    #[oai(
        path = "/poll/decision",
        method = "post",
        operation_id = "poll_for_decision_task"
    )]
    async fn poll_for_decision_task(
        &self,
        raw: &poem::Request,
        request: Json<PollForDecisionTaskRequest>,
    ) -> ApiResult<Json<PollForDecisionTaskResponse>> {
        let record = recorded_http_api_request!(
            "poll_for_decision_task",
            domain = request.0.domain,
            task_list = request.0.task_list.name
        );
        let ctx = call_context(raw, &self.timeouts);
        let guard = CancelOnDisconnect(ctx.cancellation.clone());
        let service = self.service.clone();
        let handle = tokio::spawn(
            async move {
                with_panic_capture(
                    "poll_for_decision_task",
                    service.poll_for_decision_task(&ctx, request.0),
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

    /// Long-poll for an activity task
    #[oai(
        path = "/poll/activity",
        method = "post",
        operation_id = "poll_for_activity_task"
    )]
    async fn poll_for_activity_task(
        &self,
        raw: &poem::Request,
        request: Json<PollForActivityTaskRequest>,
    ) -> ApiResult<Json<PollForActivityTaskResponse>> {
        let record = recorded_http_api_request!(
            "poll_for_activity_task",
            domain = request.0.domain,
            task_list = request.0.task_list.name
        );
        let ctx = call_context(raw, &self.timeouts);
        let guard = CancelOnDisconnect(ctx.cancellation.clone());
        let service = self.service.clone();
        let handle = tokio::spawn(
            async move {
                with_panic_capture(
                    "poll_for_activity_task",
                    service.poll_for_activity_task(&ctx, request.0),
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

    /// Complete a decision task
    #[oai(
        path = "/respond/decision/completed",
        method = "post",
        operation_id = "respond_decision_task_completed"
    )]
    async fn respond_decision_task_completed(
        &self,
        raw: &poem::Request,
        request: Json<RespondDecisionTaskCompletedRequest>,
    ) -> ApiResult<Json<RespondDecisionTaskCompletedResponse>> {
        let record = recorded_http_api_request!("respond_decision_task_completed",);
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "respond_decision_task_completed",
            self.service.respond_decision_task_completed(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// Fail a decision task
    #[oai(
        path = "/respond/decision/failed",
        method = "post",
        operation_id = "respond_decision_task_failed"
    )]
    async fn respond_decision_task_failed(
        &self,
        raw: &poem::Request,
        request: Json<RespondDecisionTaskFailedRequest>,
    ) -> ApiResult<Json<Empty>> {
        let record = recorded_http_api_request!("respond_decision_task_failed",);
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "respond_decision_task_failed",
            self.service.respond_decision_task_failed(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record
            .result(response)
            .map(|_| Json(Empty::default()))
            .map_err(ApiError::from)
    }

    /// Answer a workflow query delivered on a decision task
    #[oai(
        path = "/respond/query/completed",
        method = "post",
        operation_id = "respond_query_task_completed"
    )]
    async fn respond_query_task_completed(
        &self,
        raw: &poem::Request,
        request: Json<RespondQueryTaskCompletedRequest>,
    ) -> ApiResult<Json<Empty>> {
        let record = recorded_http_api_request!("respond_query_task_completed",);
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "respond_query_task_completed",
            self.service.respond_query_task_completed(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record
            .result(response)
            .map(|_| Json(Empty::default()))
            .map_err(ApiError::from)
    }

    /// Complete an activity task
    #[oai(
        path = "/respond/activity/completed",
        method = "post",
        operation_id = "respond_activity_task_completed"
    )]
    async fn respond_activity_task_completed(
        &self,
        raw: &poem::Request,
        request: Json<RespondActivityTaskCompletedRequest>,
    ) -> ApiResult<Json<Empty>> {
        let record = recorded_http_api_request!("respond_activity_task_completed",);
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "respond_activity_task_completed",
            self.service.respond_activity_task_completed(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record
            .result(response)
            .map(|_| Json(Empty::default()))
            .map_err(ApiError::from)
    }

    /// Complete an activity task addressed by ids instead of a task token
    #[oai(
        path = "/respond/activity/completed-by-id",
        method = "post",
        operation_id = "respond_activity_task_completed_by_id"
    )]
    async fn respond_activity_task_completed_by_id(
        &self,
        raw: &poem::Request,
        request: Json<RespondActivityTaskCompletedByIdRequest>,
    ) -> ApiResult<Json<Empty>> {
        let record = recorded_http_api_request!(
            "respond_activity_task_completed_by_id",
            domain = request.0.domain,
            workflow_id = request.0.workflow_id,
            activity_id = request.0.activity_id
        );
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "respond_activity_task_completed_by_id",
            self.service
                .respond_activity_task_completed_by_id(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record
            .result(response)
            .map(|_| Json(Empty::default()))
            .map_err(ApiError::from)
    }

    /// Fail an activity task
    #[oai(
        path = "/respond/activity/failed",
        method = "post",
        operation_id = "respond_activity_task_failed"
    )]
    async fn respond_activity_task_failed(
        &self,
        raw: &poem::Request,
        request: Json<RespondActivityTaskFailedRequest>,
    ) -> ApiResult<Json<Empty>> {
        let record = recorded_http_api_request!("respond_activity_task_failed",);
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "respond_activity_task_failed",
            self.service.respond_activity_task_failed(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record
            .result(response)
            .map(|_| Json(Empty::default()))
            .map_err(ApiError::from)
    }

    /// Fail an activity task addressed by ids
    #[oai(
        path = "/respond/activity/failed-by-id",
        method = "post",
        operation_id = "respond_activity_task_failed_by_id"
    )]
    async fn respond_activity_task_failed_by_id(
        &self,
        raw: &poem::Request,
        request: Json<RespondActivityTaskFailedByIdRequest>,
    ) -> ApiResult<Json<Empty>> {
        let record = recorded_http_api_request!(
            "respond_activity_task_failed_by_id",
            domain = request.0.domain,
            workflow_id = request.0.workflow_id,
            activity_id = request.0.activity_id
        );
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "respond_activity_task_failed_by_id",
            self.service
                .respond_activity_task_failed_by_id(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record
            .result(response)
            .map(|_| Json(Empty::default()))
            .map_err(ApiError::from)
    }

    /// Report an activity task as canceled
    #[oai(
        path = "/respond/activity/canceled",
        method = "post",
        operation_id = "respond_activity_task_canceled"
    )]
    async fn respond_activity_task_canceled(
        &self,
        raw: &poem::Request,
        request: Json<RespondActivityTaskCanceledRequest>,
    ) -> ApiResult<Json<Empty>> {
        let record = recorded_http_api_request!("respond_activity_task_canceled",);
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "respond_activity_task_canceled",
            self.service.respond_activity_task_canceled(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record
            .result(response)
            .map(|_| Json(Empty::default()))
            .map_err(ApiError::from)
    }

    /// Report an activity task as canceled, addressed by ids
    #[oai(
        path = "/respond/activity/canceled-by-id",
        method = "post",
        operation_id = "respond_activity_task_canceled_by_id"
    )]
    async fn respond_activity_task_canceled_by_id(
        &self,
        raw: &poem::Request,
        request: Json<RespondActivityTaskCanceledByIdRequest>,
    ) -> ApiResult<Json<Empty>> {
        let record = recorded_http_api_request!(
            "respond_activity_task_canceled_by_id",
            domain = request.0.domain,
            workflow_id = request.0.workflow_id,
            activity_id = request.0.activity_id
        );
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "respond_activity_task_canceled_by_id",
            self.service
                .respond_activity_task_canceled_by_id(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record
            .result(response)
            .map(|_| Json(Empty::default()))
            .map_err(ApiError::from)
    }

    /// Record an activity heartbeat
    #[oai(
        path = "/heartbeat",
        method = "post",
        operation_id = "record_activity_task_heartbeat"
    )]
    async fn record_activity_task_heartbeat(
        &self,
        raw: &poem::Request,
        request: Json<RecordActivityTaskHeartbeatRequest>,
    ) -> ApiResult<Json<RecordActivityTaskHeartbeatResponse>> {
        let record = recorded_http_api_request!("record_activity_task_heartbeat",);
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "record_activity_task_heartbeat",
            self.service.record_activity_task_heartbeat(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// Record an activity heartbeat, addressed by ids
    #[oai(
        path = "/heartbeat-by-id",
        method = "post",
        operation_id = "record_activity_task_heartbeat_by_id"
    )]
    async fn record_activity_task_heartbeat_by_id(
        &self,
        raw: &poem::Request,
        request: Json<RecordActivityTaskHeartbeatByIdRequest>,
    ) -> ApiResult<Json<RecordActivityTaskHeartbeatResponse>> {
        let record = recorded_http_api_request!(
            "record_activity_task_heartbeat_by_id",
            domain = request.0.domain,
            workflow_id = request.0.workflow_id,
            activity_id = request.0.activity_id
        );
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "record_activity_task_heartbeat_by_id",
            self.service
                .record_activity_task_heartbeat_by_id(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// Describe a task list
    #[oai(
        path = "/task-list/describe",
        method = "post",
        operation_id = "describe_task_list"
    )]
    async fn describe_task_list(
        &self,
        raw: &poem::Request,
        request: Json<DescribeTaskListRequest>,
    ) -> ApiResult<Json<DescribeTaskListResponse>> {
        let record = recorded_http_api_request!(
            "describe_task_list",
            domain = request.0.domain,
            task_list = request.0.task_list.name
        );
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "describe_task_list",
            self.service.describe_task_list(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// List the partitions of a task list and their owners
    #[oai(
        path = "/task-list/partitions",
        method = "post",
        operation_id = "list_task_list_partitions"
    )]
    async fn list_task_list_partitions(
        &self,
        raw: &poem::Request,
        request: Json<ListTaskListPartitionsRequest>,
    ) -> ApiResult<Json<ListTaskListPartitionsResponse>> {
        let record = recorded_http_api_request!(
            "list_task_list_partitions",
            domain = request.0.domain,
            task_list = request.0.task_list.name
        );
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "list_task_list_partitions",
            self.service.list_task_list_partitions(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }
}
