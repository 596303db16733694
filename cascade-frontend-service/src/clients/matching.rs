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
    DescribeTaskListRequest, DescribeTaskListResponse, ListTaskListPartitionsRequest,
    ListTaskListPartitionsResponse, PollForActivityTaskRequest, PollForActivityTaskResponse,
    PollForDecisionTaskRequest, PollForDecisionTaskResponse, RespondQueryTaskCompletedRequest,
    TaskListType,
};
use cascade_common::model::{DomainId, TaskList};
use cascade_common::SafeDisplay;
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatchingClientError {
    #[error("Entity not found: {0}")]
    EntityNotFound(String),
    #[error("Matching host unavailable: {0}")]
    Unavailable(String),
    #[error("Internal matching service error: {0}")]
    Internal(String),
    #[error("Poll was canceled")]
    PollCanceled,
}

impl MatchingClientError {
    pub fn is_retriable(error: &MatchingClientError) -> bool {
        matches!(error, MatchingClientError::Unavailable(_))
    }
}

impl SafeDisplay for MatchingClientError {
    fn to_safe_string(&self) -> String {
        self.to_string()
    }
}

impl From<MatchingClientError> for cascade_common::model::error::ServiceError {
    fn from(value: MatchingClientError) -> Self {
        use cascade_common::model::error::ServiceError;
        match value {
            MatchingClientError::EntityNotFound(message) => ServiceError::EntityNotFound(message),
            MatchingClientError::Unavailable(message) => ServiceError::ServiceBusy(message),
            MatchingClientError::Internal(message) => ServiceError::Internal(message),
            MatchingClientError::PollCanceled => {
                ServiceError::Deadline("poll was canceled".to_string())
            }
        }
    }
}

/// Contract of the matching (task queue) tier. Poll calls block server-side
/// up to `timeout`; `poller_id` identifies the outstanding poll so a client
/// that gave up can be unblocked with `cancel_outstanding_poll`.
#[async_trait]
pub trait MatchingClient: Send + Sync {
    async fn poll_for_decision_task(
        &self,
        poller_id: Uuid,
        domain_id: &DomainId,
        request: &PollForDecisionTaskRequest,
        timeout: Duration,
    ) -> Result<PollForDecisionTaskResponse, MatchingClientError>;

    async fn poll_for_activity_task(
        &self,
        poller_id: Uuid,
        domain_id: &DomainId,
        request: &PollForActivityTaskRequest,
        timeout: Duration,
    ) -> Result<PollForActivityTaskResponse, MatchingClientError>;

    async fn respond_query_task_completed(
        &self,
        domain_id: &DomainId,
        request: &RespondQueryTaskCompletedRequest,
    ) -> Result<(), MatchingClientError>;

    async fn describe_task_list(
        &self,
        domain_id: &DomainId,
        request: &DescribeTaskListRequest,
    ) -> Result<DescribeTaskListResponse, MatchingClientError>;

    async fn list_task_list_partitions(
        &self,
        domain_id: &DomainId,
        request: &ListTaskListPartitionsRequest,
    ) -> Result<ListTaskListPartitionsResponse, MatchingClientError>;

    async fn cancel_outstanding_poll(
        &self,
        domain_id: &DomainId,
        poller_id: Uuid,
        task_list_type: TaskListType,
        task_list: &TaskList,
    ) -> Result<(), MatchingClientError>;
}
