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

use crate::model::{
    CountWorkflowExecutionsRequest, CountWorkflowExecutionsResponse,
    ListClosedWorkflowExecutionsRequest, ListOpenWorkflowExecutionsRequest,
    ListWorkflowExecutionsRequest, ListWorkflowExecutionsResponse,
};
use cascade_common::model::{DomainId, IndexedValueType};
use cascade_common::SafeDisplay;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VisibilityError {
    #[error("Invalid visibility query: {0}")]
    InvalidQuery(String),
    #[error("Visibility store unavailable: {0}")]
    Unavailable(String),
    #[error("Internal visibility error: {0}")]
    Internal(String),
}

impl SafeDisplay for VisibilityError {
    fn to_safe_string(&self) -> String {
        self.to_string()
    }
}

impl From<VisibilityError> for cascade_common::model::error::ServiceError {
    fn from(value: VisibilityError) -> Self {
        use cascade_common::model::error::ServiceError;
        match value {
            VisibilityError::InvalidQuery(message) => ServiceError::BadRequest(message),
            VisibilityError::Unavailable(message) => ServiceError::ServiceBusy(message),
            VisibilityError::Internal(message) => ServiceError::Internal(message),
        }
    }
}

/// Contract of the visibility index. Ranking and indexing happen behind this
/// interface; the frontend only validates and forwards.
#[async_trait]
pub trait VisibilityManager: Send + Sync {
    async fn list_open_workflow_executions(
        &self,
        domain_id: &DomainId,
        request: &ListOpenWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, VisibilityError>;

    async fn list_closed_workflow_executions(
        &self,
        domain_id: &DomainId,
        request: &ListClosedWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, VisibilityError>;

    async fn list_workflow_executions(
        &self,
        domain_id: &DomainId,
        request: &ListWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, VisibilityError>;

    async fn scan_workflow_executions(
        &self,
        domain_id: &DomainId,
        request: &ListWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, VisibilityError>;

    async fn count_workflow_executions(
        &self,
        domain_id: &DomainId,
        request: &CountWorkflowExecutionsRequest,
    ) -> Result<CountWorkflowExecutionsResponse, VisibilityError>;

    /// Registers a new search attribute in the index mapping, creating the
    /// index if it does not exist yet.
    async fn add_search_attribute(
        &self,
        key: &str,
        value_type: IndexedValueType,
    ) -> Result<(), VisibilityError>;
}
