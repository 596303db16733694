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

//! One frontend service stack per simulated cluster, with in-memory
//! collaborators and in-process "remote" frontends between clusters.

use crate::fakes::{
    FakeHistoryArchiver, FakeHistoryClient, FakeMatchingClient, FakeVisibilityArchiver,
    FakeVisibilityManager,
};
use cascade_common::model::{ClusterName, DomainMetadata, HostInfo, ReplicationTaskAttributes};
use cascade_frontend_service::bootstrap::{Collaborators, Services};
use cascade_frontend_service::clients::frontend::RemoteFrontendClient;
use cascade_frontend_service::clients::membership::StaticMembershipMonitor;
use cascade_frontend_service::clients::metadata::InMemoryMetadataStore;
use cascade_frontend_service::clients::replication_queue::{
    InMemoryReplicationQueue, ReplicationQueue,
};
use cascade_frontend_service::config::{
    AdminConfig, ClusterConfig, ClusterTopologyConfig, FrontendServiceConfig, LimitsConfig,
    TimeoutsConfig,
};
use cascade_frontend_service::model::*;
use cascade_frontend_service::service::access_control::NoopAuthorizer;
use cascade_frontend_service::service::WorkflowService;
use cascade_frontend_service::testing::LocalFrontendClient;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub struct TestCluster {
    pub name: ClusterName,
    pub config: FrontendServiceConfig,
    pub services: Services,
    pub store: Arc<InMemoryMetadataStore>,
    pub queue: Arc<InMemoryReplicationQueue>,
    pub history: Arc<FakeHistoryClient>,
    pub matching: Arc<FakeMatchingClient>,
    pub visibility: Arc<FakeVisibilityManager>,
    pub archiver: Arc<FakeHistoryArchiver>,
    pub membership: Arc<StaticMembershipMonitor>,
}

pub fn test_config(current_cluster: &str) -> FrontendServiceConfig {
    let mut clusters = HashMap::new();
    clusters.insert(
        "A".to_string(),
        ClusterConfig {
            enabled: true,
            initial_failover_version: 1,
            frontend: Default::default(),
        },
    );
    clusters.insert(
        "B".to_string(),
        ClusterConfig {
            enabled: true,
            initial_failover_version: 2,
            frontend: Default::default(),
        },
    );

    FrontendServiceConfig {
        cluster: ClusterTopologyConfig {
            current_cluster: current_cluster.to_string(),
            failover_version_increment: 10,
            number_of_history_shards: 4,
            redirection_policy: Default::default(),
            clusters,
        },
        limits: LimitsConfig {
            blob_size_warn_limit: 256,
            blob_size_error_limit: 1024,
            ..LimitsConfig::default()
        },
        admin: AdminConfig {
            security_token: None,
            enable_global_domains: true,
        },
        timeouts: TimeoutsConfig {
            default_call_timeout: Duration::from_secs(2),
            long_poll_timeout: Duration::from_secs(5),
            min_long_poll_timeout: Duration::from_millis(50),
            ..TimeoutsConfig::default()
        },
        ..FrontendServiceConfig::default()
    }
}

impl TestCluster {
    pub fn new(name: &str) -> Self {
        Self::with_remotes(name, HashMap::new())
    }

    pub fn with_remotes(
        name: &str,
        remote_frontends: HashMap<ClusterName, Arc<dyn RemoteFrontendClient>>,
    ) -> Self {
        let config = test_config(name);
        let store = Arc::new(InMemoryMetadataStore::new());
        let queue = Arc::new(InMemoryReplicationQueue::new());
        let history = Arc::new(FakeHistoryClient::new());
        let matching = Arc::new(FakeMatchingClient::new());
        let visibility = Arc::new(FakeVisibilityManager::default());
        let archiver = Arc::new(FakeHistoryArchiver::default());
        let membership = Arc::new(StaticMembershipMonitor::new(HostInfo {
            identity: format!("frontend-{name}-0"),
        }));

        let services = Services::new(
            &config,
            Collaborators {
                metadata_store: store.clone(),
                history_client: history.clone(),
                matching_client: matching.clone(),
                visibility: visibility.clone(),
                history_archiver: archiver.clone(),
                visibility_archiver: Arc::new(FakeVisibilityArchiver),
                replication_queue: queue.clone(),
                membership: membership.clone(),
                remote_frontends,
                authorizer: Arc::new(NoopAuthorizer),
            },
        );

        Self {
            name: ClusterName::from(name),
            config,
            services,
            store,
            queue,
            history,
            matching,
            visibility,
            archiver,
            membership,
        }
    }

    pub fn remote_client(&self) -> Arc<dyn RemoteFrontendClient> {
        Arc::new(LocalFrontendClient::new(
            self.services.workflow_service.clone(),
            self.services.admin_service.clone(),
        ))
    }

    pub fn rebuild_with_remotes(
        &mut self,
        remote_frontends: HashMap<ClusterName, Arc<dyn RemoteFrontendClient>>,
    ) {
        self.services = Services::new(
            &self.config,
            Collaborators {
                metadata_store: self.store.clone(),
                history_client: self.history.clone(),
                matching_client: self.matching.clone(),
                visibility: self.visibility.clone(),
                history_archiver: self.archiver.clone(),
                visibility_archiver: Arc::new(FakeVisibilityArchiver),
                replication_queue: self.queue.clone(),
                membership: self.membership.clone(),
                remote_frontends,
                authorizer: Arc::new(NoopAuthorizer),
            },
        );
    }

    pub fn set_archival(&mut self, history_enabled: bool) {
        self.config.archival.history_enabled = history_enabled;
        self.rebuild_with_remotes(HashMap::new());
    }

    pub fn ctx() -> CallContext {
        CallContext::with_deadline(Duration::from_secs(10))
    }

    pub async fn register_domain(
        &self,
        name: &str,
        is_global: bool,
        active: &str,
    ) -> DomainMetadata {
        let request = RegisterDomainRequest {
            name: name.to_string(),
            description: Some(format!("test domain {name}")),
            owner_email: None,
            workflow_execution_retention_period_in_days: 7,
            data: None,
            clusters: is_global.then(|| vec![ClusterName::from("A"), ClusterName::from("B")]),
            active_cluster_name: Some(ClusterName::from(active)),
            is_global_domain: is_global,
            history_archival_status: None,
            history_archival_uri: None,
            visibility_archival_status: None,
            visibility_archival_uri: None,
            security_token: None,
        };
        self.services
            .workflow_service
            .register_domain(&Self::ctx(), request)
            .await
            .expect("register domain")
            .domain
    }

    /// Simulates the domain replication consumer: pulls this cluster's
    /// pending domain messages through the admin surface of `source` and
    /// applies them to the local metadata store.
    pub async fn apply_domain_replication_from(&self, source: &TestCluster) {
        let messages = source
            .queue
            .get_replication_messages(&self.name, -1, -1, 100)
            .await
            .expect("replication messages");
        for task in messages.replication_tasks {
            if let ReplicationTaskAttributes::Domain(attributes) = task.attributes {
                self.store.seed(attributes.domain.clone()).await;
                self.services
                    .domain_cache
                    .publish(Arc::new(attributes.domain));
            }
        }
    }
}

pub fn two_connected_clusters() -> (TestCluster, TestCluster) {
    let mut a = TestCluster::new("A");
    let mut b = TestCluster::new("B");

    let a_remote = a.remote_client();
    let mut b_remotes: HashMap<ClusterName, Arc<dyn RemoteFrontendClient>> = HashMap::new();
    b_remotes.insert(ClusterName::from("A"), a_remote);
    b.rebuild_with_remotes(b_remotes);

    let b_remote = b.remote_client();
    let mut a_remotes: HashMap<ClusterName, Arc<dyn RemoteFrontendClient>> = HashMap::new();
    a_remotes.insert(ClusterName::from("B"), b_remote);
    a.rebuild_with_remotes(a_remotes);

    (a, b)
}
