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

use crate::clients::archival::{HistoryArchiver, VisibilityArchiver};
use crate::clients::frontend::RemoteFrontendClient;
use crate::clients::history::HistoryClient;
use crate::clients::matching::MatchingClient;
use crate::clients::membership::MembershipMonitor;
use crate::clients::metadata::MetadataStore;
use crate::clients::replication_queue::ReplicationQueue;
use crate::clients::visibility::VisibilityManager;
use crate::config::FrontendServiceConfig;
use crate::dynamic_config::{ConfiguredDynamicConfig, DynamicConfig};
use crate::service::access_control::{AccessControlledService, Authorizer};
use crate::service::admin::AdminServiceDefault;
use crate::service::domain::DomainServiceDefault;
use crate::service::domain_cache::DomainCache;
use crate::service::history::HistoryReadService;
use crate::service::rate_limiter::RequestRateLimiter;
use crate::service::redirection::DcRedirectionService;
use crate::service::validation::RequestValidator;
use crate::service::workflow::WorkflowServiceDefault;
use crate::service::{AdminService, LifecycleState, WorkflowService};
use cascade_common::model::ClusterName;
use std::collections::HashMap;
use std::sync::Arc;

/// The backend tiers and policies the frontend composes over. Everything in
/// here is a contract; the binary and the tests decide what stands behind
/// each one.
pub struct Collaborators {
    pub metadata_store: Arc<dyn MetadataStore>,
    pub history_client: Arc<dyn HistoryClient>,
    pub matching_client: Arc<dyn MatchingClient>,
    pub visibility: Arc<dyn VisibilityManager>,
    pub history_archiver: Arc<dyn HistoryArchiver>,
    pub visibility_archiver: Arc<dyn VisibilityArchiver>,
    pub replication_queue: Arc<dyn ReplicationQueue>,
    pub membership: Arc<dyn MembershipMonitor>,
    pub remote_frontends: HashMap<ClusterName, Arc<dyn RemoteFrontendClient>>,
    pub authorizer: Arc<dyn Authorizer>,
}

#[derive(Clone)]
pub struct Services {
    pub lifecycle: Arc<LifecycleState>,
    pub domain_cache: Arc<DomainCache>,
    pub domain_service: Arc<DomainServiceDefault>,
    pub workflow_service: Arc<dyn WorkflowService>,
    pub admin_service: Arc<dyn AdminService>,
    pub dynamic_config: Arc<dyn DynamicConfig>,
}

impl Services {
    pub fn new(config: &FrontendServiceConfig, collaborators: Collaborators) -> Self {
        let lifecycle = Arc::new(LifecycleState::new());

        let dynamic_config: Arc<dyn DynamicConfig> = Arc::new(ConfiguredDynamicConfig::new(
            config.limits.clone(),
            config.rate_limits.clone(),
        ));

        let domain_cache = Arc::new(DomainCache::new(collaborators.metadata_store.clone()));

        let domain_service = Arc::new(DomainServiceDefault::new(
            collaborators.metadata_store.clone(),
            domain_cache.clone(),
            collaborators.replication_queue.clone(),
            collaborators.remote_frontends.clone(),
            config.cluster.clone(),
            config.domain_defaults.clone(),
            config.admin.clone(),
            dynamic_config.clone(),
            config.timeouts.default_call_timeout,
        ));

        let rate_limiter = Arc::new(RequestRateLimiter::new(
            dynamic_config.clone(),
            collaborators.membership.clone(),
            config.rate_limits.burst_ratio,
        ));

        let history_read = HistoryReadService::new(
            collaborators.history_client.clone(),
            collaborators.history_archiver.clone(),
            config.archival.clone(),
            dynamic_config.clone(),
            config.cluster.number_of_history_shards,
            config.timeouts.long_poll_timeout,
        );

        let workflow_handler: Arc<dyn WorkflowService> = Arc::new(WorkflowServiceDefault::new(
            lifecycle.clone(),
            domain_cache.clone(),
            domain_service.clone(),
            collaborators.history_client.clone(),
            collaborators.matching_client.clone(),
            collaborators.visibility.clone(),
            collaborators.visibility_archiver.clone(),
            history_read,
            rate_limiter,
            RequestValidator::new(config.limits.clone(), dynamic_config.clone()),
            dynamic_config.clone(),
            config.archival.clone(),
            config.client_versions.clone(),
            config.timeouts.clone(),
            config.cluster.number_of_history_shards,
        ));

        let redirected: Arc<dyn WorkflowService> = Arc::new(DcRedirectionService::new(
            workflow_handler,
            collaborators.remote_frontends.clone(),
            domain_cache.clone(),
            config.cluster.current_cluster_name(),
            config.cluster.redirection_policy,
        ));

        let admin_handler: Arc<dyn AdminService> = Arc::new(AdminServiceDefault::new(
            collaborators.history_client,
            collaborators.replication_queue,
            domain_cache.clone(),
            collaborators.membership,
            collaborators.visibility,
            dynamic_config.clone(),
            collaborators.remote_frontends,
            config.admin.clone(),
            config.timeouts.dlq_retries.clone(),
            config.cluster.number_of_history_shards,
        ));

        let access_controlled = Arc::new(AccessControlledService::new(
            redirected,
            admin_handler,
            collaborators.authorizer,
        ));

        Self {
            lifecycle,
            domain_cache,
            domain_service,
            workflow_service: access_controlled.clone(),
            admin_service: access_controlled,
            dynamic_config,
        }
    }
}
