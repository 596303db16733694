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

use crate::metrics::api::TraceErrorKind;
use crate::model::{ClusterName, RunId};
use crate::SafeDisplay;
use poem_openapi::Object;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Object)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Object)]
pub struct ErrorsBody {
    pub errors: Vec<String>,
}

/// The closed set of error kinds transported on the wire. Everything a
/// handler can fail with is classified into one of these; unknown errors
/// become `Internal` and their detail stays in the logs only.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Entity not found: {0}")]
    EntityNotFound(String),
    #[error("Domain already exists: {0}")]
    DomainAlreadyExists(String),
    #[error("Workflow execution already started: {message}")]
    ExecutionAlreadyStarted {
        message: String,
        start_request_id: String,
        run_id: RunId,
    },
    #[error("Cancellation already requested for workflow {0}")]
    CancellationAlreadyRequested(String),
    #[error("Query failed: {0}")]
    QueryFailed(String),
    #[error("Queries are disallowed for domain {0}")]
    QueryDisallowedForDomain(String),
    #[error(
        "Domain {domain} is active in cluster {active_cluster}, while the current cluster is {current_cluster}"
    )]
    DomainNotActive {
        domain: String,
        current_cluster: ClusterName,
        active_cluster: ClusterName,
    },
    #[error("Service is busy: {0}")]
    ServiceBusy(String),
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),
    #[error(
        "Client version is not supported: feature {feature} requires version {supported_versions} for {client_impl}"
    )]
    ClientVersionNotSupported {
        feature: String,
        client_impl: String,
        supported_versions: String,
    },
    #[error("Service is shutting down")]
    ShuttingDown,
    #[error("Deadline exceeded: {0}")]
    Deadline(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn entity_not_found(message: impl Into<String>) -> Self {
        Self::EntityNotFound(message.into())
    }

    pub fn internal(error: impl std::fmt::Display) -> Self {
        Self::Internal(error.to_string())
    }

    pub fn service_busy(message: impl Into<String>) -> Self {
        Self::ServiceBusy(message.into())
    }

    /// True for outcomes caused by the request itself; false for faults of
    /// the service or its collaborators.
    pub fn is_expected(&self) -> bool {
        !matches!(self, ServiceError::Internal(_))
    }

    pub fn is_retriable(error: &ServiceError) -> bool {
        matches!(
            error,
            ServiceError::ServiceBusy(_) | ServiceError::ShuttingDown | ServiceError::Internal(_)
        )
    }
}

impl SafeDisplay for ServiceError {
    fn to_safe_string(&self) -> String {
        match self {
            // the detail of internal failures is logged, not returned
            ServiceError::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl TraceErrorKind for ServiceError {
    fn trace_error_kind(&self) -> &'static str {
        match self {
            ServiceError::BadRequest(_) => "BadRequest",
            ServiceError::EntityNotFound(_) => "EntityNotFound",
            ServiceError::DomainAlreadyExists(_) => "DomainAlreadyExists",
            ServiceError::ExecutionAlreadyStarted { .. } => "ExecutionAlreadyStarted",
            ServiceError::CancellationAlreadyRequested(_) => "CancellationAlreadyRequested",
            ServiceError::QueryFailed(_) => "QueryFailed",
            ServiceError::QueryDisallowedForDomain(_) => "QueryDisallowedForDomain",
            ServiceError::DomainNotActive { .. } => "DomainNotActive",
            ServiceError::ServiceBusy(_) => "ServiceBusy",
            ServiceError::LimitExceeded(_) => "LimitExceeded",
            ServiceError::ClientVersionNotSupported { .. } => "ClientVersionNotSupported",
            ServiceError::ShuttingDown => "ShuttingDown",
            ServiceError::Deadline(_) => "Deadline",
            ServiceError::Internal(_) => "InternalError",
        }
    }

    fn is_expected(&self) -> bool {
        ServiceError::is_expected(self)
    }
}

#[cfg(test)]
mod tests {
    use test_r::test;

    use super::*;

    #[test]
    fn internal_errors_are_flattened_on_the_wire() {
        let error = ServiceError::internal("connection refused to 10.0.0.3:7933");
        assert_eq!(error.to_safe_string(), "Internal error");
        assert!(error.to_string().contains("connection refused"));
    }

    #[test]
    fn client_errors_keep_their_message() {
        let error = ServiceError::bad_request("WorkflowId is not set on request");
        assert_eq!(
            error.to_safe_string(),
            "Bad request: WorkflowId is not set on request"
        );
    }
}
