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
use crate::clients::history::{shard_for, HistoryClient, PollMutableStateRequest, ReadHistoryBranchRequest};
use crate::clients::membership::MembershipMonitor;
use crate::clients::replication_queue::{ReplicationQueue, ReplicationQueueError};
use crate::clients::visibility::VisibilityManager;
use crate::config::AdminConfig;
use crate::dynamic_config::DynamicConfig;
use crate::model::*;
use crate::service::domain_cache::DomainCache;
use crate::service::resender::{HistoryReplicationSink, HistoryResender};
use crate::service::AdminService;
use cascade_common::config::RetryConfig;
use cascade_common::model::error::ServiceError;
use cascade_common::model::history::{VersionHistories, VersionHistory, VersionHistoryItem, FIRST_EVENT_ID};
use cascade_common::model::tokens::RawHistoryContinuationToken;
use cascade_common::model::{ClusterName, QueueType, ReplicationTask, ServiceRole, WorkflowKey};
use cascade_common::retries::with_retries;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use strum::IntoEnumIterator;

const DOMAIN_REPLICATION_PAGE_SIZE: i32 = 100;

/// Operator-facing surface: cross-region history re-replication, DLQ
/// draining, raw history paging and cluster introspection. Never routed
/// through DC-redirection.
pub struct AdminServiceDefault {
    history_client: Arc<dyn HistoryClient>,
    replication_queue: Arc<dyn ReplicationQueue>,
    domain_cache: Arc<DomainCache>,
    membership: Arc<dyn MembershipMonitor>,
    visibility: Arc<dyn VisibilityManager>,
    dynamic_config: Arc<dyn DynamicConfig>,
    remote_frontends: HashMap<ClusterName, Arc<dyn RemoteFrontendClient>>,
    admin: AdminConfig,
    dlq_retries: RetryConfig,
    number_of_shards: i32,
}

impl AdminServiceDefault {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        history_client: Arc<dyn HistoryClient>,
        replication_queue: Arc<dyn ReplicationQueue>,
        domain_cache: Arc<DomainCache>,
        membership: Arc<dyn MembershipMonitor>,
        visibility: Arc<dyn VisibilityManager>,
        dynamic_config: Arc<dyn DynamicConfig>,
        remote_frontends: HashMap<ClusterName, Arc<dyn RemoteFrontendClient>>,
        admin: AdminConfig,
        dlq_retries: RetryConfig,
        number_of_shards: i32,
    ) -> Self {
        Self {
            history_client,
            replication_queue,
            domain_cache,
            membership,
            visibility,
            dynamic_config,
            remote_frontends,
            admin,
            dlq_retries,
            number_of_shards,
        }
    }

    fn check_security_token(&self, token: Option<&String>) -> Result<(), ServiceError> {
        match &self.admin.security_token {
            None => Ok(()),
            Some(required) if token == Some(required) => Ok(()),
            Some(_) => Err(ServiceError::bad_request("Invalid security token")),
        }
    }

    fn replication_shard(&self, shard_id: Option<i32>) -> Result<i32, ServiceError> {
        shard_id.ok_or_else(|| {
            ServiceError::bad_request("ShardId is required for replication queue operations")
        })
    }

    fn replication_source(
        &self,
        source_cluster: Option<ClusterName>,
    ) -> Result<ClusterName, ServiceError> {
        source_cluster.ok_or_else(|| {
            ServiceError::bad_request("SourceCluster is required for replication queue operations")
        })
    }

    /// Resolves the effective (start, end) items and the branch to read for
    /// a first raw-history page. Both bounds are exclusive. An unset start
    /// clips to just before the branch's first event, an unset end to just
    /// past its last. A bound living on another branch re-targets the read;
    /// a start on a different branch than the target begins at their lowest
    /// common ancestor.
    fn resolve_raw_history_range(
        &self,
        request: &GetWorkflowExecutionRawHistoryV2Request,
        version_histories: &VersionHistories,
    ) -> Result<(i64, i64, i64, i64, usize), ServiceError> {
        let current_index = version_histories.current_version_history_index as usize;

        let (end_event_id, end_event_version, target_index) =
            match (request.end_event_id, request.end_event_version) {
                (Some(id), Some(version)) => {
                    let last_included = VersionHistoryItem::new(id - 1, version);
                    let (index, _) = version_histories
                        .find_first_containing(&last_included)
                        .ok_or_else(|| {
                            ServiceError::bad_request(
                                "End event is not found in any version history branch",
                            )
                        })?;
                    (id, version, index)
                }
                (None, None) => {
                    let current = version_histories
                        .current()
                        .map_err(ServiceError::internal)?;
                    let last = current.last_item().map_err(ServiceError::internal)?;
                    (last.event_id + 1, last.version, current_index)
                }
                _ => {
                    return Err(ServiceError::bad_request(
                        "End event id and version must be set together",
                    ))
                }
            };

        let target_branch = &version_histories.histories[target_index];

        let (start_event_id, start_event_version) =
            match (request.start_event_id, request.start_event_version) {
                (Some(id), Some(version)) => {
                    let item = VersionHistoryItem::new(id, version);
                    if target_branch.contains_item(&item) {
                        (id, version)
                    } else {
                        let (_, start_branch) = version_histories
                            .find_first_containing(&item)
                            .ok_or_else(|| {
                                ServiceError::bad_request(
                                    "Start event is not found in any version history branch",
                                )
                            })?;
                        let lca = start_branch
                            .find_lca_item(target_branch)
                            .map_err(ServiceError::internal)?;
                        (lca.event_id, lca.version)
                    }
                }
                (None, None) => {
                    let first = target_branch.first_item().map_err(ServiceError::internal)?;
                    (FIRST_EVENT_ID - 1, first.version)
                }
                _ => {
                    return Err(ServiceError::bad_request(
                        "Start event id and version must be set together",
                    ))
                }
            };

        if start_event_id >= end_event_id {
            return Err(ServiceError::bad_request(
                "Invalid event range: start must lie before end",
            ));
        }

        Ok((
            start_event_id,
            start_event_version,
            end_event_id,
            end_event_version,
            target_index,
        ))
    }

    fn validate_raw_history_token(
        request: &GetWorkflowExecutionRawHistoryV2Request,
        token: &RawHistoryContinuationToken,
    ) -> Result<(), ServiceError> {
        let run_id_matches = request
            .execution
            .run_id
            .as_ref()
            .map(|run_id| *run_id == token.run_id)
            .unwrap_or(false);
        let fields_match = request.domain == token.domain_name
            && request.execution.workflow_id == token.workflow_id
            && run_id_matches
            && request
                .start_event_id
                .map(|id| id == token.start_event_id)
                .unwrap_or(true)
            && request
                .start_event_version
                .map(|version| version == token.start_event_version)
                .unwrap_or(true)
            && request
                .end_event_id
                .map(|id| id == token.end_event_id)
                .unwrap_or(true)
            && request
                .end_event_version
                .map(|version| version == token.end_event_version)
                .unwrap_or(true);
        if fields_match {
            Ok(())
        } else {
            Err(ServiceError::bad_request(
                "Invalid continuation token: request does not match the paged read",
            ))
        }
    }
}

#[async_trait]
impl AdminService for AdminServiceDefault {
    async fn describe_cluster(
        &self,
        _ctx: &CallContext,
    ) -> Result<DescribeClusterResponse, ServiceError> {
        let mut rings = Vec::new();
        for role in ServiceRole::iter() {
            let members = self.membership.members(role);
            rings.push(RingInfo {
                role,
                member_count: members.len() as i32,
                members,
            });
        }

        let reachable_members = self
            .membership
            .members(ServiceRole::Frontend)
            .into_iter()
            .map(|host| host.identity)
            .collect();

        Ok(DescribeClusterResponse {
            membership_info: MembershipInfo {
                current_host: Some(self.membership.current_host()),
                reachable_members,
                rings,
            },
        })
    }

    async fn get_workflow_execution_raw_history_v2(
        &self,
        _ctx: &CallContext,
        request: GetWorkflowExecutionRawHistoryV2Request,
    ) -> Result<GetWorkflowExecutionRawHistoryV2Response, ServiceError> {
        if request.domain.is_empty() {
            return Err(ServiceError::bad_request("Domain is not set on request"));
        }
        if request.execution.workflow_id.is_empty() {
            return Err(ServiceError::bad_request("WorkflowId is not set on request"));
        }
        let page_size = request.maximum_page_size.filter(|size| *size > 0).unwrap_or(
            self.dynamic_config.history_max_page_size(&request.domain),
        );

        let domain = self
            .domain_cache
            .get_required_by_name(&request.domain)
            .await?;
        let shard_id = shard_for(&request.execution.workflow_id, self.number_of_shards);

        let mut token = match &request.next_page_token {
            Some(bytes) => {
                let token = RawHistoryContinuationToken::decode(bytes)?;
                Self::validate_raw_history_token(&request, &token)?;
                token
            }
            None => {
                let run_id = request.execution.run_id.clone().ok_or_else(|| {
                    ServiceError::bad_request("RunId is required for raw history reads")
                })?;
                let state = self
                    .history_client
                    .poll_mutable_state(
                        shard_id,
                        &PollMutableStateRequest {
                            domain_id: domain.info.id.clone(),
                            execution: request.execution.clone(),
                            expected_next_event_id: None,
                            current_branch_token: None,
                        },
                    )
                    .await
                    .map_err(ServiceError::from)?;

                let (start_event_id, start_event_version, end_event_id, end_event_version, target) =
                    self.resolve_raw_history_range(&request, &state.version_histories)?;

                let mut version_histories = state.version_histories.clone();
                version_histories.current_version_history_index = target as i32;

                // exclusive-exclusive: adjacent bounds mean an empty read
                if start_event_id + 1 == end_event_id {
                    return Ok(GetWorkflowExecutionRawHistoryV2Response {
                        next_page_token: None,
                        history_batches: Vec::new(),
                        version_history: version_histories.current().ok().cloned(),
                    });
                }

                RawHistoryContinuationToken::new(
                    request.domain.clone(),
                    request.execution.workflow_id.clone(),
                    run_id,
                    start_event_id,
                    start_event_version,
                    end_event_id,
                    end_event_version,
                    Vec::new(),
                    version_histories,
                )
            }
        };

        let target_branch: VersionHistory = token
            .version_histories
            .current()
            .map_err(ServiceError::internal)?
            .clone();

        let response = self
            .history_client
            .read_raw_history_branch(
                shard_id,
                &ReadHistoryBranchRequest {
                    domain_id: domain.info.id.clone(),
                    branch_token: target_branch.branch_token.clone(),
                    min_event_id: token.start_event_id + 1,
                    max_event_id: token.end_event_id,
                    page_size,
                    next_page_token: token.persistence_token.clone(),
                },
            )
            .await
            .map_err(ServiceError::from)?;

        token.persistence_token = response.next_page_token.clone();
        let next_page_token = if response.next_page_token.is_empty() {
            None
        } else {
            Some(token.encode()?)
        };

        Ok(GetWorkflowExecutionRawHistoryV2Response {
            next_page_token,
            history_batches: response.batches,
            version_history: Some(target_branch),
        })
    }

    async fn read_dlq_messages(
        &self,
        _ctx: &CallContext,
        request: ReadDlqMessagesRequest,
    ) -> Result<ReadDlqMessagesResponse, ServiceError> {
        let page_size = request.maximum_page_size.filter(|s| *s > 0).unwrap_or(100);
        let (replication_tasks, next_page_token) = match request.queue_type {
            QueueType::Replication => {
                let shard_id = self.replication_shard(request.shard_id)?;
                let source = self.replication_source(request.source_cluster.clone())?;
                self.history_client
                    .read_dlq_messages(
                        shard_id,
                        &source,
                        request.inclusive_end_message_id,
                        page_size,
                        request.next_page_token.clone(),
                    )
                    .await
                    .map_err(ServiceError::from)?
            }
            QueueType::Domain => {
                self.with_dlq_retries("read", &request, |request| {
                    let queue = self.replication_queue.clone();
                    let end = request.inclusive_end_message_id;
                    let token = request.next_page_token.clone();
                    Box::pin(async move { queue.read_dlq_messages(end, page_size, token).await })
                })
                .await?
            }
        };
        Ok(ReadDlqMessagesResponse {
            queue_type: Some(request.queue_type),
            replication_tasks,
            next_page_token,
        })
    }

    async fn purge_dlq_messages(
        &self,
        _ctx: &CallContext,
        request: PurgeDlqMessagesRequest,
    ) -> Result<(), ServiceError> {
        match request.queue_type {
            QueueType::Replication => {
                let shard_id = self.replication_shard(request.shard_id)?;
                let source = self.replication_source(request.source_cluster.clone())?;
                self.history_client
                    .purge_dlq_messages(shard_id, &source, request.inclusive_end_message_id)
                    .await
                    .map_err(ServiceError::from)
            }
            QueueType::Domain => {
                self.with_dlq_retries("purge", &request, |request| {
                    let queue = self.replication_queue.clone();
                    let end = request.inclusive_end_message_id;
                    Box::pin(async move { queue.purge_dlq_messages(end).await })
                })
                .await
            }
        }
    }

    async fn merge_dlq_messages(
        &self,
        _ctx: &CallContext,
        request: MergeDlqMessagesRequest,
    ) -> Result<MergeDlqMessagesResponse, ServiceError> {
        let page_size = request.maximum_page_size.filter(|s| *s > 0).unwrap_or(100);
        let next_page_token = match request.queue_type {
            QueueType::Replication => {
                let shard_id = self.replication_shard(request.shard_id)?;
                let source = self.replication_source(request.source_cluster.clone())?;
                self.history_client
                    .merge_dlq_messages(
                        shard_id,
                        &source,
                        request.inclusive_end_message_id,
                        page_size,
                        request.next_page_token.clone(),
                    )
                    .await
                    .map_err(ServiceError::from)?
            }
            QueueType::Domain => {
                self.with_dlq_retries("merge", &request, |request| {
                    let queue = self.replication_queue.clone();
                    let end = request.inclusive_end_message_id;
                    let token = request.next_page_token.clone();
                    Box::pin(async move { queue.merge_dlq_messages(end, page_size, token).await })
                })
                .await?
            }
        };
        Ok(MergeDlqMessagesResponse { next_page_token })
    }

    async fn resend_replication_tasks(
        &self,
        _ctx: &CallContext,
        request: ResendReplicationTasksRequest,
    ) -> Result<(), ServiceError> {
        let remote = self
            .remote_frontends
            .get(&request.remote_cluster)
            .cloned()
            .ok_or_else(|| {
                ServiceError::BadRequest(format!(
                    "Cluster {} is not configured",
                    request.remote_cluster
                ))
            })?;

        let domain = self
            .domain_cache
            .get_required_by_id(&request.domain_id)
            .await?;

        let sink = Arc::new(HistoryReplicationSink::new(
            self.history_client.clone(),
            self.number_of_shards,
        ));
        let resender = HistoryResender::new(remote, sink, None);

        resender
            .resend_workflow(
                &domain.info.name,
                &WorkflowKey {
                    domain_id: request.domain_id.clone(),
                    workflow_id: request.workflow_id.clone(),
                    run_id: request.run_id.clone(),
                },
                request.start_event_id,
                request.start_event_version,
                request.end_event_id,
                request.end_event_version,
            )
            .await
    }

    async fn add_search_attribute(
        &self,
        _ctx: &CallContext,
        request: AddSearchAttributeRequest,
    ) -> Result<(), ServiceError> {
        self.check_security_token(request.security_token.as_ref())?;
        if request.search_attribute.is_empty() {
            return Err(ServiceError::bad_request(
                "SearchAttributes are not set on request",
            ));
        }

        // the whitelist is extended first; once a key is registered it can
        // be neither removed nor retyped
        for (key, value_type) in &request.search_attribute {
            self.dynamic_config
                .add_search_attribute(key, *value_type)
                .map_err(ServiceError::BadRequest)?;
        }

        for (key, value_type) in &request.search_attribute {
            self.visibility
                .add_search_attribute(key, *value_type)
                .await
                .map_err(|err| {
                    ServiceError::Internal(format!(
                        "Failed to update visibility mapping for {key}: {err}"
                    ))
                })?;
        }
        Ok(())
    }

    async fn get_replication_messages(
        &self,
        _ctx: &CallContext,
        request: GetReplicationMessagesRequest,
    ) -> Result<GetReplicationMessagesResponse, ServiceError> {
        let mut shard_messages = HashMap::new();
        for token in &request.tokens {
            let messages = self
                .history_client
                .get_replication_messages(
                    token.shard_id,
                    &request.cluster_name,
                    token.last_retrieved_message_id,
                )
                .await
                .map_err(ServiceError::from)?;
            shard_messages.insert(token.shard_id.to_string(), messages);
        }
        Ok(GetReplicationMessagesResponse { shard_messages })
    }

    async fn get_dlq_replication_messages(
        &self,
        _ctx: &CallContext,
        request: GetDlqReplicationMessagesRequest,
    ) -> Result<GetDlqReplicationMessagesResponse, ServiceError> {
        // group the references by owning shard and fetch per shard
        let mut by_shard: HashMap<i32, Vec<ReplicationTaskInfo>> = HashMap::new();
        for info in request.task_infos {
            let shard_id = shard_for(&info.workflow_id, self.number_of_shards);
            by_shard.entry(shard_id).or_default().push(info);
        }

        let mut replication_tasks: Vec<ReplicationTask> = Vec::new();
        for (shard_id, infos) in by_shard {
            let tasks = self
                .history_client
                .get_dlq_replication_messages(shard_id, &infos)
                .await
                .map_err(ServiceError::from)?;
            replication_tasks.extend(tasks);
        }
        replication_tasks.sort_by_key(|task| task.message_id);
        Ok(GetDlqReplicationMessagesResponse { replication_tasks })
    }

    async fn get_domain_replication_messages(
        &self,
        _ctx: &CallContext,
        request: GetDomainReplicationMessagesRequest,
    ) -> Result<GetDomainReplicationMessagesResponse, ServiceError> {
        let messages = self
            .replication_queue
            .get_replication_messages(
                &request.cluster_name,
                request.last_retrieved_message_id.unwrap_or(-1),
                request.last_processed_message_id.unwrap_or(-1),
                DOMAIN_REPLICATION_PAGE_SIZE,
            )
            .await
            .map_err(|err| ServiceError::internal(err))?;
        Ok(GetDomainReplicationMessagesResponse { messages })
    }
}

impl AdminServiceDefault {
    /// Bounded retry for the local domain DLQ operations; only transient
    /// queue errors are retried.
    async fn with_dlq_retries<'a, In, T, F>(
        &self,
        op: &'static str,
        input: &'a In,
        action: F,
    ) -> Result<T, ServiceError>
    where
        In: Sync,
        F: for<'b> Fn(
            &'b In,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<T, ReplicationQueueError>> + 'b + Send>,
        >,
    {
        with_retries(
            "domain-dlq",
            op,
            None,
            &self.dlq_retries,
            input,
            action,
            ReplicationQueueError::is_retriable,
        )
        .await
        .map_err(|err| ServiceError::internal(err))
    }
}
