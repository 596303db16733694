use crate::api::ApiTags;
use crate::model::{HealthcheckResponse, VersionInfo};
use crate::service::{HealthState, LifecycleState};
use crate::VERSION;
use poem_openapi::payload::Json;
use poem_openapi::*;
use std::sync::Arc;

/// Load balancers key off this endpoint: non-200 both during warmup and
/// during the drain sequence.
pub struct HealthcheckApi {
    pub lifecycle: Arc<LifecycleState>,
}

#[derive(ApiResponse)]
pub enum HealthcheckApiResponse {
    #[oai(status = 200)]
    Healthy(Json<HealthcheckResponse>),
    #[oai(status = 503)]
    Unavailable(Json<HealthcheckResponse>),
}

#[OpenApi(prefix_path = "/", tag = ApiTags::HealthCheck)]
impl HealthcheckApi {
    #[oai(path = "/healthcheck", method = "get", operation_id = "healthcheck")]
    async fn healthcheck(&self) -> HealthcheckApiResponse {
        match self.lifecycle.health() {
            HealthState::Serving => HealthcheckApiResponse::Healthy(Json(HealthcheckResponse {
                status: "ok".to_string(),
            })),
            HealthState::Warming => {
                HealthcheckApiResponse::Unavailable(Json(HealthcheckResponse {
                    status: "warming-up".to_string(),
                }))
            }
            HealthState::ShuttingDown => {
                HealthcheckApiResponse::Unavailable(Json(HealthcheckResponse {
                    status: "shutting-down".to_string(),
                }))
            }
        }
    }

    #[oai(path = "/version", method = "get", operation_id = "version")]
    async fn version(&self) -> Json<VersionInfo> {
        Json(VersionInfo {
            version: VERSION.to_string(),
        })
    }
}
