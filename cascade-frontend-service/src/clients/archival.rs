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

use crate::model::ListWorkflowExecutionsResponse;
use cascade_common::model::history::History;
use cascade_common::model::{DomainId, RunId};
use cascade_common::SafeDisplay;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArchivalError {
    #[error("History not found in archive: {0}")]
    NotFound(String),
    #[error("Invalid archival URI: {0}")]
    InvalidUri(String),
    #[error("Archival store error: {0}")]
    Internal(String),
}

impl SafeDisplay for ArchivalError {
    fn to_safe_string(&self) -> String {
        self.to_string()
    }
}

impl From<ArchivalError> for cascade_common::model::error::ServiceError {
    fn from(value: ArchivalError) -> Self {
        use cascade_common::model::error::ServiceError;
        match value {
            ArchivalError::NotFound(message) => ServiceError::EntityNotFound(message),
            ArchivalError::InvalidUri(message) => ServiceError::BadRequest(message),
            ArchivalError::Internal(message) => ServiceError::Internal(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetArchivedHistoryRequest {
    pub domain_id: DomainId,
    pub domain_name: String,
    pub workflow_id: String,
    pub run_id: RunId,
    pub page_size: i32,
    pub next_page_token: Option<Vec<u8>>,
}

/// Events come back already grouped into the batches they were archived in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GetArchivedHistoryResponse {
    pub history_batches: Vec<History>,
    pub next_page_token: Option<Vec<u8>>,
}

#[async_trait]
pub trait HistoryArchiver: Send + Sync {
    async fn get(
        &self,
        uri: &str,
        request: GetArchivedHistoryRequest,
    ) -> Result<GetArchivedHistoryResponse, ArchivalError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryArchivedVisibilityRequest {
    pub domain_id: DomainId,
    pub page_size: i32,
    pub next_page_token: Option<Vec<u8>>,
    pub query: String,
}

#[async_trait]
pub trait VisibilityArchiver: Send + Sync {
    async fn query(
        &self,
        uri: &str,
        request: QueryArchivedVisibilityRequest,
    ) -> Result<ListWorkflowExecutionsResponse, ArchivalError>;
}
