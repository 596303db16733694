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
use cascade_common::model::Empty;
use cascade_common::recorded_http_api_request;
use poem_openapi::payload::Json;
use poem_openapi::OpenApi;
use std::sync::Arc;
use tracing::Instrument;

pub struct DomainApi {
    pub service: Arc<dyn WorkflowService>,
    pub timeouts: TimeoutsConfig,
}

#[OpenApi(prefix_path = "/v1/domain", tag = ApiTags::Domain)]
impl DomainApi {
    /// Register domain
    ///
    /// Creates a new domain. A global domain immediately starts replicating
    /// to its configured clusters.
    #[oai(path = "/register", method = "post", operation_id = "register_domain")]
    async fn register_domain(
        &self,
        raw: &poem::Request,
        request: Json<RegisterDomainRequest>,
    ) -> ApiResult<Json<RegisterDomainResponse>> {
        let record = recorded_http_api_request!("register_domain", domain = request.0.name);
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "register_domain",
            self.service.register_domain(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// Describe domain
    #[oai(path = "/describe", method = "post", operation_id = "describe_domain")]
    async fn describe_domain(
        &self,
        raw: &poem::Request,
        request: Json<DescribeDomainRequest>,
    ) -> ApiResult<Json<DescribeDomainResponse>> {
        let record = recorded_http_api_request!(
            "describe_domain",
            name = request.0.name,
            uuid = request.0.uuid
        );
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "describe_domain",
            self.service.describe_domain(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// List domains
    #[oai(path = "/list", method = "post", operation_id = "list_domains")]
    async fn list_domains(
        &self,
        raw: &poem::Request,
        request: Json<ListDomainsRequest>,
    ) -> ApiResult<Json<ListDomainsResponse>> {
        let record = recorded_http_api_request!("list_domains",);
        let ctx = call_context(raw, &self.timeouts);
        let response =
            with_panic_capture("list_domains", self.service.list_domains(&ctx, request.0))
                .instrument(record.span.clone())
                .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// Update domain
    ///
    /// Configuration changes and failovers share this entry point; a request
    /// that sets the active cluster is a failover.
    #[oai(path = "/update", method = "post", operation_id = "update_domain")]
    async fn update_domain(
        &self,
        raw: &poem::Request,
        request: Json<UpdateDomainRequest>,
    ) -> ApiResult<Json<UpdateDomainResponse>> {
        let record = recorded_http_api_request!("update_domain", domain = request.0.name);
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "update_domain",
            self.service.update_domain(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record.result(response).map(Json).map_err(ApiError::from)
    }

    /// Deprecate domain
    ///
    /// Terminal but not a delete: running workflows finish, new starts are
    /// rejected.
    #[oai(path = "/deprecate", method = "post", operation_id = "deprecate_domain")]
    async fn deprecate_domain(
        &self,
        raw: &poem::Request,
        request: Json<DeprecateDomainRequest>,
    ) -> ApiResult<Json<Empty>> {
        let record = recorded_http_api_request!("deprecate_domain", domain = request.0.name);
        let ctx = call_context(raw, &self.timeouts);
        let response = with_panic_capture(
            "deprecate_domain",
            self.service.deprecate_domain(&ctx, request.0),
        )
        .instrument(record.span.clone())
        .await;
        record
            .result(response)
            .map(|_| Json(Empty::default()))
            .map_err(ApiError::from)
    }
}
