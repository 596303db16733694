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
use crate::service::{with_panic_capture, AdminService};
use cascade_common::model::Empty;
use cascade_common::recorded_http_api_request;
use poem_openapi::payload::Json;
use poem_openapi::OpenApi;
use std::sync::Arc;
use tracing::Instrument;

/// Operator surface; bypasses DC-redirection by construction.
pub struct AdminApi {
    pub service: Arc<dyn AdminService>,
    pub timeouts: TimeoutsConfig,
}

#[OpenApi(prefix_path = "/admin/v1", tag = ApiTags::Admin)]
impl AdminApi {
    /// Walk the membership rings of all service roles
    #[oai(
        path = "/cluster/describe",
        method = "get",
        operation_id = "describe_cluster"
    )]
    async fn describe_cluster(
        &self,
        raw: &poem::Request,
    ) -> ApiResult<Json<DescribeClusterResponse>> {
        let record = recorded_http_api_request!("describe_cluster",);
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture("describe_cluster", self.service.describe_cluster(&ctx))
            .instrument(record.span.clone())
            .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// Paged raw history read over a specific version history branch
    #[oai(
        path = "/workflow/raw-history-v2",
        method = "post",
        operation_id = "get_workflow_execution_raw_history_v2"
    )]
    async fn get_workflow_execution_raw_history_v2(
        &self,
        raw: &poem::Request,
        request: Json<GetWorkflowExecutionRawHistoryV2Request>,
    ) -> ApiResult<Json<GetWorkflowExecutionRawHistoryV2Response>> {
        let record = recorded_http_api_request!(
            "get_workflow_execution_raw_history_v2",
            domain = request.0.domain,
            workflow_id = request.0.execution.workflow_id
        );
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "get_workflow_execution_raw_history_v2",
            self.service
                .get_workflow_execution_raw_history_v2(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// Read messages from a replication or domain DLQ
    #[oai(path = "/dlq/read", method = "post", operation_id = "read_dlq_messages")]
    async fn read_dlq_messages(
        &self,
        raw: &poem::Request,
        request: Json<ReadDlqMessagesRequest>,
    ) -> ApiResult<Json<ReadDlqMessagesResponse>> {
        let record = recorded_http_api_request!("read_dlq_messages",);
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "read_dlq_messages",
            self.service.read_dlq_messages(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// Drop messages from a DLQ up to the given message id
    #[oai(
        path = "/dlq/purge",
        method = "post",
        operation_id = "purge_dlq_messages"
    )]
    async fn purge_dlq_messages(
        &self,
        raw: &poem::Request,
        request: Json<PurgeDlqMessagesRequest>,
    ) -> ApiResult<Json<Empty>> {
        let record = recorded_http_api_request!("purge_dlq_messages",);
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "purge_dlq_messages",
            self.service.purge_dlq_messages(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record
            .result(response)
            .map(|_| Json(Empty::default()))
            .map_err(ApiError::from)
    }

    /// Re-enqueue DLQ messages onto their source queue
    #[oai(
        path = "/dlq/merge",
        method = "post",
        operation_id = "merge_dlq_messages"
    )]
    async fn merge_dlq_messages(
        &self,
        raw: &poem::Request,
        request: Json<MergeDlqMessagesRequest>,
    ) -> ApiResult<Json<MergeDlqMessagesResponse>> {
        let record = recorded_http_api_request!("merge_dlq_messages",);
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "merge_dlq_messages",
            self.service.merge_dlq_messages(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// Replay one workflow's history from a remote cluster into this one
    #[oai(
        path = "/replication/resend",
        method = "post",
        operation_id = "resend_replication_tasks"
    )]
    async fn resend_replication_tasks(
        &self,
        raw: &poem::Request,
        request: Json<ResendReplicationTasksRequest>,
    ) -> ApiResult<Json<Empty>> {
        let record = recorded_http_api_request!(
            "resend_replication_tasks",
            workflow_id = request.0.workflow_id,
            remote_cluster = request.0.remote_cluster
        );
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "resend_replication_tasks",
            self.service.resend_replication_tasks(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record
            .result(response)
            .map(|_| Json(Empty::default()))
            .map_err(ApiError::from)
    }

    /// Register new search attributes
    ///
    /// Extends the dynamic whitelist and the visibility index mapping. Once
    /// added, attributes can be neither removed nor retyped.
    #[oai(
        path = "/search-attributes",
        method = "post",
        operation_id = "add_search_attribute"
    )]
    async fn add_search_attribute(
        &self,
        raw: &poem::Request,
        request: Json<AddSearchAttributeRequest>,
    ) -> ApiResult<Json<Empty>> {
        let record = recorded_http_api_request!("add_search_attribute",);
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "add_search_attribute",
            self.service.add_search_attribute(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record
            .result(response)
            .map(|_| Json(Empty::default()))
            .map_err(ApiError::from)
    }

    /// Pull per-shard replication messages for a consuming cluster
    #[oai(
        path = "/replication/messages",
        method = "post",
        operation_id = "get_replication_messages"
    )]
    async fn get_replication_messages(
        &self,
        raw: &poem::Request,
        request: Json<GetReplicationMessagesRequest>,
    ) -> ApiResult<Json<GetReplicationMessagesResponse>> {
        let record = recorded_http_api_request!(
            "get_replication_messages",
            cluster = request.0.cluster_name
        );
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "get_replication_messages",
            self.service.get_replication_messages(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// Fetch DLQ'd replication tasks by workflow reference
    #[oai(
        path = "/replication/dlq-messages",
        method = "post",
        operation_id = "get_dlq_replication_messages"
    )]
    async fn get_dlq_replication_messages(
        &self,
        raw: &poem::Request,
        request: Json<GetDlqReplicationMessagesRequest>,
    ) -> ApiResult<Json<GetDlqReplicationMessagesResponse>> {
        let record = recorded_http_api_request!("get_dlq_replication_messages",);
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "get_dlq_replication_messages",
            self.service.get_dlq_replication_messages(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// Pull domain replication messages for a consuming cluster
    #[oai(
        path = "/replication/domain-messages",
        method = "post",
        operation_id = "get_domain_replication_messages"
    )]
    async fn get_domain_replication_messages(
        &self,
        raw: &poem::Request,
        request: Json<GetDomainReplicationMessagesRequest>,
    ) -> ApiResult<Json<GetDomainReplicationMessagesResponse>> {
        let record = recorded_http_api_request!(
            "get_domain_replication_messages",
            cluster = request.0.cluster_name
        );
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "get_domain_replication_messages",
            self.service.get_domain_replication_messages(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }
}
