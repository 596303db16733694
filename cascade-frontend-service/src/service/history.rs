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

use crate::clients::archival::{GetArchivedHistoryRequest, HistoryArchiver};
use crate::clients::history::{
    shard_for, HistoryClient, HistoryClientError, PollMutableStateRequest,
    PollMutableStateResponse, ReadHistoryBranchRequest,
};
use crate::config::ClusterArchivalConfig;
use crate::dynamic_config::DynamicConfig;
use crate::model::{
    CallContext, GetWorkflowExecutionHistoryRequest, GetWorkflowExecutionHistoryResponse,
};
use cascade_common::model::error::ServiceError;
use cascade_common::model::history::{History, HistoryEvent, END_EVENT_ID, FIRST_EVENT_ID};
use cascade_common::model::tokens::HistoryContinuationToken;
use cascade_common::model::{DataBlob, DomainMetadata, HistoryEventFilterType};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// The continuation-token state machine behind
/// `get_workflow_execution_history`, including the long-poll re-poll of
/// mutable state and the transparent switch to the archival store once live
/// history has been retained out.
pub struct HistoryReadService {
    history_client: Arc<dyn HistoryClient>,
    history_archiver: Arc<dyn HistoryArchiver>,
    archival: ClusterArchivalConfig,
    dynamic_config: Arc<dyn DynamicConfig>,
    number_of_shards: i32,
    long_poll_timeout: Duration,
}

impl HistoryReadService {
    pub fn new(
        history_client: Arc<dyn HistoryClient>,
        history_archiver: Arc<dyn HistoryArchiver>,
        archival: ClusterArchivalConfig,
        dynamic_config: Arc<dyn DynamicConfig>,
        number_of_shards: i32,
        long_poll_timeout: Duration,
    ) -> Self {
        Self {
            history_client,
            history_archiver,
            archival,
            dynamic_config,
            number_of_shards,
            long_poll_timeout,
        }
    }

    pub async fn get_history(
        &self,
        ctx: &CallContext,
        domain: &DomainMetadata,
        request: &GetWorkflowExecutionHistoryRequest,
        raw_history_supported: bool,
    ) -> Result<GetWorkflowExecutionHistoryResponse, ServiceError> {
        let domain_name = &domain.info.name;
        let max_page_size = self.dynamic_config.history_max_page_size(domain_name);
        let page_size = request
            .maximum_page_size
            .filter(|size| *size > 0)
            .unwrap_or(max_page_size)
            .min(max_page_size);

        let close_event_only =
            request.history_event_filter_type == HistoryEventFilterType::CloseEvent;
        let shard_id = shard_for(&request.execution.workflow_id, self.number_of_shards);
        let send_raw = raw_history_supported
            && self.dynamic_config.send_raw_workflow_history(domain_name);

        let mut token = if let Some(bytes) = &request.next_page_token {
            let mut token = HistoryContinuationToken::decode(bytes)?;
            if let Some(run_id) = &request.execution.run_id {
                if *run_id != token.run_id {
                    return Err(ServiceError::bad_request(
                        "Invalid continuation token: run id does not match request",
                    ));
                }
            }

            // a read that switched to the archival store stays there
            if let Some(archival_token) = token.archival_token.take() {
                return self
                    .read_from_archival(domain, request, page_size, Some(archival_token))
                    .await;
            }

            // a long-poll continuation whose previous page exhausted the
            // cursor re-polls for the next event range
            let window_exhausted = token.persistence_token.is_empty()
                && token.first_event_id >= token.next_event_id;
            if request.wait_for_new_event && token.is_workflow_running && window_exhausted {
                let state = match self
                    .poll_mutable_state(
                        ctx,
                        shard_id,
                        domain,
                        request,
                        true,
                        if close_event_only {
                            END_EVENT_ID
                        } else {
                            token.next_event_id
                        },
                    )
                    .await
                {
                    Ok(state) => state,
                    Err(HistoryClientError::EntityNotFound(_)) => {
                        return self.read_from_archival(domain, request, page_size, None).await;
                    }
                    Err(err) => return Err(err.into()),
                };
                token.first_event_id = if close_event_only {
                    state.last_first_event_id
                } else {
                    token.next_event_id
                };
                token.next_event_id = state.next_event_id;
                token.is_workflow_running = state.is_workflow_running;
                token.branch_token = state.current_branch_token;
            }
            token
        } else {
            // initial page: learn the run's shape from mutable state
            let state = match self
                .poll_mutable_state(
                    ctx,
                    shard_id,
                    domain,
                    request,
                    close_event_only && request.wait_for_new_event,
                    END_EVENT_ID,
                )
                .await
            {
                Ok(state) => state,
                Err(HistoryClientError::EntityNotFound(_)) => {
                    return self.read_from_archival(domain, request, page_size, None).await;
                }
                Err(err) => return Err(err.into()),
            };

            let first_event_id = if close_event_only {
                state.last_first_event_id
            } else {
                FIRST_EVENT_ID
            };
            HistoryContinuationToken::new(
                state.run_id.clone(),
                first_event_id,
                state.next_event_id,
                state.is_workflow_running,
                Vec::new(),
                None,
                state.current_branch_token.clone(),
            )
        };

        if close_event_only && token.is_workflow_running {
            // nothing to return yet; the echoed token lets the client poll on
            let next_page_token = Some(token.encode()?);
            return Ok(GetWorkflowExecutionHistoryResponse {
                history: Some(History::default()),
                raw_history: None,
                next_page_token,
                archived: false,
            });
        }

        let (history, raw_history) = if send_raw {
            let (batches, next_persistence_token) = self
                .read_raw_page(shard_id, domain, &token, page_size)
                .await?;
            token.persistence_token = next_persistence_token;
            (None, Some(batches))
        } else {
            let (events, next_persistence_token) = self
                .read_full_page(shard_id, domain, &token, page_size)
                .await?;
            token.persistence_token = next_persistence_token;
            (Some(History { events }), None)
        };

        let window_done = token.persistence_token.is_empty();
        if window_done {
            token.first_event_id = token.next_event_id;
        }

        let final_page = window_done && !token.is_workflow_running;
        let history = match history {
            Some(mut history) if final_page => {
                if let Some(transient) = token.transient_decision.take() {
                    self.append_transient_decision(&mut history, &token, transient)?;
                }
                if close_event_only {
                    // exactly the close event
                    history.events.retain(|event| event.event_type.is_close_event());
                }
                Some(history)
            }
            other => other,
        };

        let next_page_token = if final_page {
            None
        } else {
            Some(token.encode()?)
        };

        Ok(GetWorkflowExecutionHistoryResponse {
            history,
            raw_history,
            next_page_token,
            archived: false,
        })
    }

    /// Long-polls mutable state when `wait` is set, bounded by the caller's
    /// deadline and the long-poll cap; otherwise a plain fetch.
    async fn poll_mutable_state(
        &self,
        ctx: &CallContext,
        shard_id: i32,
        domain: &DomainMetadata,
        request: &GetWorkflowExecutionHistoryRequest,
        wait: bool,
        expected_next_event_id: i64,
    ) -> Result<PollMutableStateResponse, HistoryClientError> {
        let poll_request = PollMutableStateRequest {
            domain_id: domain.info.id.clone(),
            execution: request.execution.clone(),
            expected_next_event_id: wait.then_some(expected_next_event_id),
            current_branch_token: None,
        };

        if !wait {
            return self
                .history_client
                .poll_mutable_state(shard_id, &poll_request)
                .await;
        }

        let budget = ctx
            .remaining_time()
            .unwrap_or(self.long_poll_timeout)
            .min(self.long_poll_timeout);
        match tokio::time::timeout(
            budget,
            self.history_client.poll_mutable_state(shard_id, &poll_request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                // wait expired; answer with the current state instead
                let plain = PollMutableStateRequest {
                    expected_next_event_id: None,
                    ..poll_request
                };
                self.history_client.poll_mutable_state(shard_id, &plain).await
            }
        }
    }

    /// Reads one full page of decoded events, verifying completeness: events
    /// must be contiguous starting at the expected first event id, and a
    /// non-final page must not come back empty.
    async fn read_full_page(
        &self,
        shard_id: i32,
        domain: &DomainMetadata,
        token: &HistoryContinuationToken,
        page_size: i32,
    ) -> Result<(Vec<HistoryEvent>, Vec<u8>), ServiceError> {
        let fresh_window = token.persistence_token.is_empty();
        if fresh_window && token.first_event_id >= token.next_event_id {
            return Ok((Vec::new(), Vec::new()));
        }

        let read_request = ReadHistoryBranchRequest {
            domain_id: domain.info.id.clone(),
            branch_token: token.branch_token.clone(),
            min_event_id: token.first_event_id,
            max_event_id: token.next_event_id,
            page_size,
            next_page_token: token.persistence_token.clone(),
        };
        let response = self
            .history_client
            .read_history_branch(shard_id, &read_request)
            .await
            .map_err(ServiceError::from)?;

        if response.events.is_empty() && !response.next_page_token.is_empty() {
            return Err(ServiceError::internal(format!(
                "incomplete history: got empty page reading [{}, {}) of workflow {}",
                token.first_event_id, token.next_event_id, token.run_id
            )));
        }

        if let Some(first) = response.events.first() {
            if fresh_window && first.event_id != token.first_event_id {
                return Err(ServiceError::internal(format!(
                    "incomplete history: expected first event id {}, got {}",
                    token.first_event_id, first.event_id
                )));
            }
            let mut expected = first.event_id;
            for event in &response.events {
                if event.event_id != expected {
                    return Err(ServiceError::internal(format!(
                        "incomplete history: expected event id {expected}, got {}",
                        event.event_id
                    )));
                }
                expected += 1;
            }
        }

        Ok((response.events, response.next_page_token))
    }

    async fn read_raw_page(
        &self,
        shard_id: i32,
        domain: &DomainMetadata,
        token: &HistoryContinuationToken,
        page_size: i32,
    ) -> Result<(Vec<DataBlob>, Vec<u8>), ServiceError> {
        if token.persistence_token.is_empty() && token.first_event_id >= token.next_event_id {
            return Ok((Vec::new(), Vec::new()));
        }

        let read_request = ReadHistoryBranchRequest {
            domain_id: domain.info.id.clone(),
            branch_token: token.branch_token.clone(),
            min_event_id: token.first_event_id,
            max_event_id: token.next_event_id,
            page_size,
            next_page_token: token.persistence_token.clone(),
        };
        let response = self
            .history_client
            .read_raw_history_branch(shard_id, &read_request)
            .await
            .map_err(ServiceError::from)?;
        Ok((response.batches, response.next_page_token))
    }

    /// The transient decision's synthesized scheduled/started events belong
    /// at the exact tail of the history; anything else means the token and
    /// the run state diverged.
    fn append_transient_decision(
        &self,
        history: &mut History,
        token: &HistoryContinuationToken,
        transient: cascade_common::model::history::TransientDecisionInfo,
    ) -> Result<(), ServiceError> {
        if transient.scheduled_event.event_id != token.next_event_id
            || transient.started_event.event_id != token.next_event_id + 1
        {
            return Err(ServiceError::internal(format!(
                "transient decision events out of place: scheduled={}, started={}, expected next={}",
                transient.scheduled_event.event_id,
                transient.started_event.event_id,
                token.next_event_id
            )));
        }
        history.events.push(transient.scheduled_event);
        history.events.push(transient.started_event);
        Ok(())
    }

    /// Live history is gone; serve from the archival store when both the
    /// cluster and the domain have history archival enabled. The archiver's
    /// own cursor travels wrapped inside the continuation token.
    async fn read_from_archival(
        &self,
        domain: &DomainMetadata,
        request: &GetWorkflowExecutionHistoryRequest,
        page_size: i32,
        archival_page_token: Option<Vec<u8>>,
    ) -> Result<GetWorkflowExecutionHistoryResponse, ServiceError> {
        let archival_enabled = !request.skip_archival
            && self.archival.history_enabled
            && domain.config.history_archival.is_enabled();
        if !archival_enabled {
            return Err(ServiceError::EntityNotFound(
                "Workflow history not found: it may have passed the retention period".to_string(),
            ));
        }

        let run_id = request.execution.run_id.clone().ok_or_else(|| {
            ServiceError::bad_request("RunId is required to read archived history")
        })?;

        let archived = self
            .history_archiver
            .get(
                &domain.config.history_archival.uri,
                GetArchivedHistoryRequest {
                    domain_id: domain.info.id.clone(),
                    domain_name: domain.info.name.clone(),
                    workflow_id: request.execution.workflow_id.clone(),
                    run_id: run_id.clone(),
                    page_size,
                    next_page_token: archival_page_token,
                },
            )
            .await
            .map_err(ServiceError::from)?;

        let mut events = Vec::new();
        for batch in archived.history_batches {
            events.extend(batch.events);
        }
        if events.is_empty() && archived.next_page_token.is_none() {
            warn!(
                workflow_id = %request.execution.workflow_id,
                "Archived history read returned no events"
            );
        }

        let next_page_token = match archived.next_page_token {
            Some(inner) => {
                let mut token = HistoryContinuationToken::new(
                    run_id,
                    0,
                    0,
                    false,
                    Vec::new(),
                    None,
                    Vec::new(),
                );
                token.archival_token = Some(inner);
                Some(token.encode()?)
            }
            None => None,
        };

        Ok(GetWorkflowExecutionHistoryResponse {
            history: Some(History { events }),
            raw_history: None,
            next_page_token,
            archived: true,
        })
    }
}
