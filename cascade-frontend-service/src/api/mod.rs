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

use crate::config::TimeoutsConfig;
use crate::model::{CallContext, ClientFeatureFlags};
use crate::service::{AdminService, LifecycleState, WorkflowService};
use cascade_common::metrics::api::TraceErrorKind;
use cascade_common::model::error::{ErrorBody, ErrorsBody, ServiceError};
use cascade_common::SafeDisplay;
use poem_openapi::payload::Json;
use poem_openapi::{ApiResponse, OpenApiService, Tags};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

mod admin;
mod domain;
mod healthcheck;
mod task;
mod visibility;
mod workflow;

pub use healthcheck::HealthcheckApi;

/// Identity of the calling SDK, e.g. `go-sdk`
pub const CLIENT_IMPL_HEADER: &str = "cascade-client-name";
/// SDK feature version used by the minimum-version gate
pub const FEATURE_VERSION_HEADER: &str = "cascade-client-feature-version";
/// Comma separated capability flags, e.g. `raw-history-query`
pub const CLIENT_FEATURES_HEADER: &str = "cascade-client-features";
/// Per-call deadline in milliseconds; defaults differ per operation kind
pub const REQUEST_TIMEOUT_HEADER: &str = "cascade-request-timeout-ms";

#[derive(Tags)]
pub enum ApiTags {
    Domain,
    Workflow,
    Task,
    Visibility,
    Admin,
    HealthCheck,
}

#[derive(ApiResponse, Debug, Clone)]
pub enum ApiError {
    /// Invalid request, returning with a list of issues detected in the request
    #[oai(status = 400)]
    BadRequest(Json<ErrorsBody>),
    /// Entity not found
    #[oai(status = 404)]
    NotFound(Json<ErrorBody>),
    /// Conflicting state: already exists, already requested, or quota
    #[oai(status = 409)]
    Conflict(Json<ErrorBody>),
    /// The call exceeded its deadline
    #[oai(status = 408)]
    RequestTimeout(Json<ErrorBody>),
    /// Rate limited or draining; retry against this or another instance
    #[oai(status = 503)]
    ServiceUnavailable(Json<ErrorBody>),
    /// Internal server error
    #[oai(status = 500)]
    InternalError(Json<ErrorBody>),
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        let message = value.to_safe_string();
        match value {
            ServiceError::BadRequest(_)
            | ServiceError::QueryFailed(_)
            | ServiceError::QueryDisallowedForDomain(_)
            | ServiceError::DomainNotActive { .. }
            | ServiceError::ClientVersionNotSupported { .. } => {
                ApiError::BadRequest(Json(ErrorsBody {
                    errors: vec![message],
                }))
            }
            ServiceError::EntityNotFound(_) => {
                ApiError::NotFound(Json(ErrorBody { error: message }))
            }
            ServiceError::DomainAlreadyExists(_)
            | ServiceError::ExecutionAlreadyStarted { .. }
            | ServiceError::CancellationAlreadyRequested(_)
            | ServiceError::LimitExceeded(_) => {
                ApiError::Conflict(Json(ErrorBody { error: message }))
            }
            ServiceError::Deadline(_) => {
                ApiError::RequestTimeout(Json(ErrorBody { error: message }))
            }
            ServiceError::ServiceBusy(_) | ServiceError::ShuttingDown => {
                ApiError::ServiceUnavailable(Json(ErrorBody { error: message }))
            }
            ServiceError::Internal(_) => {
                ApiError::InternalError(Json(ErrorBody { error: message }))
            }
        }
    }
}

impl TraceErrorKind for ApiError {
    fn trace_error_kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::NotFound(_) => "NotFound",
            ApiError::Conflict(_) => "Conflict",
            ApiError::RequestTimeout(_) => "RequestTimeout",
            ApiError::ServiceUnavailable(_) => "ServiceUnavailable",
            ApiError::InternalError(_) => "InternalError",
        }
    }

    fn is_expected(&self) -> bool {
        !matches!(self, ApiError::InternalError(_))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Builds the per-request context from the capability and deadline headers.
pub(crate) fn call_context(request: &poem::Request, timeouts: &TimeoutsConfig) -> CallContext {
    let header = |name: &str| {
        request
            .header(name)
            .map(|value| value.to_string())
            .filter(|value| !value.is_empty())
    };

    let timeout = header(REQUEST_TIMEOUT_HEADER)
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(timeouts.default_call_timeout);

    CallContext {
        deadline: Some(Instant::now() + timeout),
        cancellation: CancellationToken::new(),
        client_impl: header(CLIENT_IMPL_HEADER),
        feature_version: header(FEATURE_VERSION_HEADER),
        features: header(CLIENT_FEATURES_HEADER)
            .map(|value| ClientFeatureFlags::parse(&value))
            .unwrap_or_default(),
    }
}

/// Cancels the context when the request future is dropped, which is how a
/// client disconnect manifests here. Long-poll handlers run in a spawned
/// task so they can observe the cancellation and do their cleanup.
pub(crate) struct CancelOnDisconnect(pub CancellationToken);

impl Drop for CancelOnDisconnect {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

pub type Apis = (
    domain::DomainApi,
    workflow::WorkflowApi,
    task::TaskApi,
    visibility::VisibilityApi,
    admin::AdminApi,
    HealthcheckApi,
);

pub fn make_open_api_service(
    workflow_service: Arc<dyn WorkflowService>,
    admin_service: Arc<dyn AdminService>,
    lifecycle: Arc<LifecycleState>,
    timeouts: TimeoutsConfig,
) -> OpenApiService<Apis, ()> {
    OpenApiService::new(
        (
            domain::DomainApi {
                service: workflow_service.clone(),
                timeouts: timeouts.clone(),
            },
            workflow::WorkflowApi {
                service: workflow_service.clone(),
                timeouts: timeouts.clone(),
            },
            task::TaskApi {
                service: workflow_service.clone(),
                timeouts: timeouts.clone(),
            },
            visibility::VisibilityApi {
                service: workflow_service,
                timeouts: timeouts.clone(),
            },
            admin::AdminApi {
                service: admin_service,
                timeouts,
            },
            HealthcheckApi { lifecycle },
        ),
        "Cascade Frontend API",
        "1.0",
    )
}
