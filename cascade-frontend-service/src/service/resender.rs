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

use crate::clients::frontend::RemoteFrontendClient;
use crate::clients::history::{shard_for, HistoryClient, HistoryClientError};
use crate::model::GetWorkflowExecutionRawHistoryV2Request;
use cascade_common::model::error::ServiceError;
use cascade_common::model::history::VersionHistoryItem;
use cascade_common::model::{DataBlob, WorkflowExecution, WorkflowKey};
use async_recursion::async_recursion;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_PAGE_SIZE: i32 = 100;
const MAX_ANCESTOR_DEPTH: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum ReplicateError {
    /// Applying the events requires an earlier run's range first
    RetryableAncestor {
        workflow: WorkflowKey,
        start_event_id: Option<i64>,
        start_event_version: Option<i64>,
        end_event_id: Option<i64>,
        end_event_version: Option<i64>,
    },
    Fatal(String),
}

/// Destination of resent history pages.
#[async_trait]
pub trait ReplicationSink: Send + Sync {
    async fn replicate_events(
        &self,
        workflow: &WorkflowKey,
        version_history_items: &[VersionHistoryItem],
        events: &DataBlob,
    ) -> Result<(), ReplicateError>;
}

/// Sink that re-applies events through the local history tier.
pub struct HistoryReplicationSink {
    history_client: Arc<dyn HistoryClient>,
    number_of_shards: i32,
}

impl HistoryReplicationSink {
    pub fn new(history_client: Arc<dyn HistoryClient>, number_of_shards: i32) -> Self {
        Self {
            history_client,
            number_of_shards,
        }
    }
}

#[async_trait]
impl ReplicationSink for HistoryReplicationSink {
    async fn replicate_events(
        &self,
        workflow: &WorkflowKey,
        version_history_items: &[VersionHistoryItem],
        events: &DataBlob,
    ) -> Result<(), ReplicateError> {
        let shard_id = shard_for(&workflow.workflow_id, self.number_of_shards);
        match self
            .history_client
            .replicate_events_v2(
                shard_id,
                &workflow.domain_id,
                &workflow.workflow_id,
                &workflow.run_id,
                version_history_items.to_vec(),
                events.clone(),
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(HistoryClientError::RetryTask {
                run_id,
                start_event_id,
                start_event_version,
                end_event_id,
                end_event_version,
            }) => Err(ReplicateError::RetryableAncestor {
                workflow: WorkflowKey {
                    domain_id: workflow.domain_id.clone(),
                    workflow_id: workflow.workflow_id.clone(),
                    run_id,
                },
                start_event_id,
                start_event_version,
                end_event_id,
                end_event_version,
            }),
            Err(other) => Err(ReplicateError::Fatal(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionCheckResult {
    Healthy,
    Corrupted,
    Unknown,
}

/// Optional pre-flight check: skip resending a run whose local state is
/// already healthy, and queue corrupted rows for repair.
#[async_trait]
pub trait InvariantChecker: Send + Sync {
    async fn check_execution(&self, workflow: &WorkflowKey) -> ExecutionCheckResult;
    async fn submit_for_fix(&self, workflow: &WorkflowKey);
}

/// Pages raw history out of a remote cluster's admin API and feeds it to a
/// replication sink, recursing into missing ancestor ranges when the sink
/// asks for them.
pub struct HistoryResender {
    remote: Arc<dyn RemoteFrontendClient>,
    sink: Arc<dyn ReplicationSink>,
    invariant_checker: Option<Arc<dyn InvariantChecker>>,
    page_size: i32,
}

impl HistoryResender {
    pub fn new(
        remote: Arc<dyn RemoteFrontendClient>,
        sink: Arc<dyn ReplicationSink>,
        invariant_checker: Option<Arc<dyn InvariantChecker>>,
    ) -> Self {
        Self {
            remote,
            sink,
            invariant_checker,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub async fn resend_workflow(
        &self,
        domain_name: &str,
        workflow: &WorkflowKey,
        start_event_id: Option<i64>,
        start_event_version: Option<i64>,
        end_event_id: Option<i64>,
        end_event_version: Option<i64>,
    ) -> Result<(), ServiceError> {
        self.resend_range(
            domain_name,
            workflow,
            start_event_id,
            start_event_version,
            end_event_id,
            end_event_version,
            0,
        )
        .await
    }

    #[async_recursion]
    #[allow(clippy::too_many_arguments)]
    async fn resend_range(
        &self,
        domain_name: &str,
        workflow: &WorkflowKey,
        start_event_id: Option<i64>,
        start_event_version: Option<i64>,
        end_event_id: Option<i64>,
        end_event_version: Option<i64>,
        depth: usize,
    ) -> Result<(), ServiceError> {
        if let Some(checker) = &self.invariant_checker {
            match checker.check_execution(workflow).await {
                ExecutionCheckResult::Healthy => {
                    info!(%workflow, "Skipping resend, local execution is healthy");
                    return Ok(());
                }
                ExecutionCheckResult::Corrupted => {
                    warn!(%workflow, "Local execution is corrupted, submitting for fix");
                    checker.submit_for_fix(workflow).await;
                }
                ExecutionCheckResult::Unknown => {}
            }
        }

        let mut next_page_token = None;
        loop {
            let response = self
                .remote
                .get_workflow_execution_raw_history_v2(GetWorkflowExecutionRawHistoryV2Request {
                    domain: domain_name.to_string(),
                    execution: WorkflowExecution {
                        workflow_id: workflow.workflow_id.clone(),
                        run_id: Some(workflow.run_id.clone()),
                    },
                    start_event_id,
                    start_event_version,
                    end_event_id,
                    end_event_version,
                    maximum_page_size: Some(self.page_size),
                    next_page_token,
                })
                .await?;

            let items = response
                .version_history
                .map(|history| history.items)
                .unwrap_or_default();

            for batch in &response.history_batches {
                self.apply_batch(domain_name, workflow, &items, batch, depth)
                    .await?;
            }

            match response.next_page_token {
                Some(token) => next_page_token = Some(token),
                None => break,
            }
        }

        Ok(())
    }

    async fn apply_batch(
        &self,
        domain_name: &str,
        workflow: &WorkflowKey,
        items: &[VersionHistoryItem],
        batch: &DataBlob,
        depth: usize,
    ) -> Result<(), ServiceError> {
        match self.sink.replicate_events(workflow, items, batch).await {
            Ok(()) => Ok(()),
            Err(ReplicateError::RetryableAncestor {
                workflow: ancestor,
                start_event_id,
                start_event_version,
                end_event_id,
                end_event_version,
            }) if depth < MAX_ANCESTOR_DEPTH => {
                info!(%ancestor, "Resending missing ancestor range first");
                self.resend_range(
                    domain_name,
                    &ancestor,
                    start_event_id,
                    start_event_version,
                    end_event_id,
                    end_event_version,
                    depth + 1,
                )
                .await?;
                // the dependency is in place now; this batch gets one retry
                match self.sink.replicate_events(workflow, items, batch).await {
                    Ok(()) => Ok(()),
                    Err(err) => Err(ServiceError::Internal(format!(
                        "replication still failing after ancestor resend: {err:?}"
                    ))),
                }
            }
            Err(ReplicateError::RetryableAncestor { .. }) => Err(ServiceError::Internal(
                "ancestor resend recursion limit reached".to_string(),
            )),
            Err(ReplicateError::Fatal(message)) => Err(ServiceError::Internal(message)),
        }
    }
}
