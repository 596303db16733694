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
use crate::clients::metadata::{MetadataStore, MetadataStoreError};
use crate::clients::replication_queue::{ReplicationQueue, ReplicationQueueError};
use crate::config::{AdminConfig, ClusterTopologyConfig, DomainDefaultsConfig};
use crate::dynamic_config::DynamicConfig;
use crate::model::{
    DeprecateDomainRequest, DescribeDomainRequest, ListDomainsRequest, RegisterDomainRequest,
    UpdateDomainRequest,
};
use crate::service::domain_cache::DomainCache;
use cascade_common::model::history::EMPTY_VERSION;
use cascade_common::model::{
    ArchivalConfig, BadBinaries, ClusterName, DomainConfiguration, DomainId, DomainInfo,
    DomainMetadata, DomainOperation, DomainReplicationConfig, DomainStatus, DomainTaskAttributes,
    ReplicationTaskAttributes,
};
use cascade_common::SafeDisplay;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use futures::future::join_all;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainServiceError {
    #[error("Domain {0} already exists")]
    AlreadyExists(String),
    #[error("Domain {0} does not exist")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("Concurrent failover is not allowed")]
    ConcurrentFailover,
    #[error("Internal domain service error: {0}")]
    Internal(String),
}

impl SafeDisplay for DomainServiceError {
    fn to_safe_string(&self) -> String {
        match self {
            DomainServiceError::Internal(_) => "Internal domain service error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<DomainServiceError> for cascade_common::model::error::ServiceError {
    fn from(value: DomainServiceError) -> Self {
        use cascade_common::model::error::ServiceError;
        match value {
            DomainServiceError::AlreadyExists(name) => ServiceError::DomainAlreadyExists(name),
            DomainServiceError::NotFound(name) => {
                ServiceError::EntityNotFound(format!("Domain {name} does not exist"))
            }
            DomainServiceError::Validation(message) => ServiceError::BadRequest(message),
            DomainServiceError::ConcurrentFailover => {
                ServiceError::bad_request("Concurrent failover is not allowed")
            }
            DomainServiceError::Internal(message) => ServiceError::Internal(message),
        }
    }
}

impl From<MetadataStoreError> for DomainServiceError {
    fn from(value: MetadataStoreError) -> Self {
        DomainServiceError::Internal(value.to_string())
    }
}

impl From<ReplicationQueueError> for DomainServiceError {
    fn from(value: ReplicationQueueError) -> Self {
        DomainServiceError::Internal(value.to_string())
    }
}

#[async_trait]
pub trait DomainService: Send + Sync {
    async fn register_domain(
        &self,
        request: RegisterDomainRequest,
    ) -> Result<DomainMetadata, DomainServiceError>;

    async fn describe_domain(
        &self,
        request: &DescribeDomainRequest,
    ) -> Result<DomainMetadata, DomainServiceError>;

    async fn list_domains(
        &self,
        request: &ListDomainsRequest,
    ) -> Result<(Vec<DomainMetadata>, Option<Vec<u8>>), DomainServiceError>;

    async fn update_domain(
        &self,
        request: UpdateDomainRequest,
    ) -> Result<DomainMetadata, DomainServiceError>;

    async fn deprecate_domain(
        &self,
        request: DeprecateDomainRequest,
    ) -> Result<(), DomainServiceError>;

    /// One failover-watcher tick: commits every graceful failover whose
    /// drain window has passed. Returns the number of committed domains.
    async fn commit_expired_failovers(&self) -> Result<usize, DomainServiceError>;
}

pub struct DomainServiceDefault {
    store: Arc<dyn MetadataStore>,
    cache: Arc<DomainCache>,
    replication_queue: Arc<dyn ReplicationQueue>,
    remote_frontends: HashMap<ClusterName, Arc<dyn RemoteFrontendClient>>,
    topology: ClusterTopologyConfig,
    defaults: DomainDefaultsConfig,
    admin: AdminConfig,
    dynamic_config: Arc<dyn DynamicConfig>,
    quorum_timeout: Duration,
}

impl DomainServiceDefault {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn MetadataStore>,
        cache: Arc<DomainCache>,
        replication_queue: Arc<dyn ReplicationQueue>,
        remote_frontends: HashMap<ClusterName, Arc<dyn RemoteFrontendClient>>,
        topology: ClusterTopologyConfig,
        defaults: DomainDefaultsConfig,
        admin: AdminConfig,
        dynamic_config: Arc<dyn DynamicConfig>,
        quorum_timeout: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            replication_queue,
            remote_frontends,
            topology,
            defaults,
            admin,
            dynamic_config,
            quorum_timeout,
        }
    }

    fn check_security_token(&self, token: Option<&String>) -> Result<(), DomainServiceError> {
        match &self.admin.security_token {
            None => Ok(()),
            Some(required) if token == Some(required) => Ok(()),
            Some(_) => Err(DomainServiceError::Validation(
                "Invalid security token".to_string(),
            )),
        }
    }

    fn validate_name(&self, name: &str) -> Result<(), DomainServiceError> {
        if name.is_empty() {
            return Err(DomainServiceError::Validation(
                "Domain name is not set on request".to_string(),
            ));
        }
        let valid = name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid || !name.chars().next().unwrap().is_ascii_alphanumeric() {
            return Err(DomainServiceError::Validation(format!(
                "Domain name {name} contains invalid characters"
            )));
        }
        Ok(())
    }

    fn validate_retention(&self, days: i32) -> Result<(), DomainServiceError> {
        if days < self.defaults.min_retention_days || days > self.defaults.max_retention_days {
            return Err(DomainServiceError::Validation(format!(
                "Retention must be between {} and {} days",
                self.defaults.min_retention_days, self.defaults.max_retention_days
            )));
        }
        Ok(())
    }

    fn validate_bad_binaries(&self, binaries: &BadBinaries) -> Result<(), DomainServiceError> {
        let limit = self.dynamic_config.max_bad_binaries("");
        if binaries.binaries.len() > limit {
            return Err(DomainServiceError::Validation(format!(
                "Total number of bad binaries exceeds limit {limit}"
            )));
        }
        Ok(())
    }

    fn validate_clusters(
        &self,
        clusters: &[ClusterName],
        active: &ClusterName,
    ) -> Result<(), DomainServiceError> {
        for cluster in clusters {
            if !self.topology.is_configured(cluster) {
                return Err(DomainServiceError::Validation(format!(
                    "Cluster {cluster} is not configured"
                )));
            }
        }
        if !clusters.contains(active) {
            return Err(DomainServiceError::Validation(format!(
                "Active cluster {active} is not in the cluster list"
            )));
        }
        Ok(())
    }

    async fn replicate(
        &self,
        operation: DomainOperation,
        domain: &DomainMetadata,
    ) -> Result<(), DomainServiceError> {
        // the producer is a no-op when global domains are disabled
        if !self.admin.enable_global_domains || !domain.is_global_domain {
            return Ok(());
        }
        self.replication_queue
            .publish(ReplicationTaskAttributes::Domain(DomainTaskAttributes {
                operation,
                domain: domain.clone(),
            }))
            .await?;
        Ok(())
    }

    /// Fans DescribeDomain out to every configured cluster of the domain and
    /// requires an identical failover version everywhere. Any disagreement
    /// means some failover is still propagating.
    async fn check_failover_quorum(
        &self,
        domain: &DomainMetadata,
    ) -> Result<(), DomainServiceError> {
        let current_cluster = self.topology.current_cluster_name();
        let mut remote_calls = Vec::new();
        let mut clusters = Vec::new();

        for cluster in &domain.replication_config.clusters {
            if *cluster == current_cluster {
                continue;
            }
            let client = self.remote_frontends.get(cluster).cloned().ok_or_else(|| {
                DomainServiceError::Internal(format!(
                    "No frontend client configured for cluster {cluster}"
                ))
            })?;
            let request = DescribeDomainRequest {
                name: Some(domain.info.name.clone()),
                uuid: None,
            };
            clusters.push(cluster.clone());
            remote_calls.push(async move {
                tokio::time::timeout(self.quorum_timeout, client.describe_domain(request)).await
            });
        }

        let responses = join_all(remote_calls).await;

        let mut versions = vec![domain.failover_version];
        for (cluster, response) in clusters.into_iter().zip(responses) {
            match response {
                Ok(Ok(response)) => versions.push(response.domain.failover_version),
                Ok(Err(err)) => {
                    return Err(DomainServiceError::Internal(format!(
                        "DescribeDomain on cluster {cluster} failed: {err}"
                    )))
                }
                Err(_) => {
                    return Err(DomainServiceError::Internal(format!(
                        "DescribeDomain on cluster {cluster} timed out"
                    )))
                }
            }
        }

        if versions.iter().any(|v| *v != versions[0]) {
            return Err(DomainServiceError::ConcurrentFailover);
        }
        Ok(())
    }

    async fn persist_update(
        &self,
        mut domain: DomainMetadata,
        operation: DomainOperation,
    ) -> Result<DomainMetadata, DomainServiceError> {
        domain.notification_version = self.store.get_metadata_version().await?;
        domain.last_updated_time = Utc::now();
        self.store.update_domain(&domain).await?;
        self.replicate(operation, &domain).await?;
        self.cache.publish(Arc::new(domain.clone()));
        Ok(domain)
    }

    pub fn spawn_failover_watcher(
        self: &Arc<Self>,
        interval: Duration,
        jitter: f64,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            loop {
                let jittered = interval.mul_f64(1.0 + rand::rng().random_range(0.0..=jitter));
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(jittered) => {
                        match service.commit_expired_failovers().await {
                            Ok(0) => {}
                            Ok(committed) => info!(committed, "Committed expired graceful failovers"),
                            Err(err) => warn!("Failover watcher tick failed: {err}"),
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl DomainService for DomainServiceDefault {
    async fn register_domain(
        &self,
        request: RegisterDomainRequest,
    ) -> Result<DomainMetadata, DomainServiceError> {
        self.check_security_token(request.security_token.as_ref())?;
        self.validate_name(&request.name)?;
        self.validate_retention(request.workflow_execution_retention_period_in_days)?;

        if request.is_global_domain && !self.admin.enable_global_domains {
            return Err(DomainServiceError::Validation(
                "Global domains are not enabled in this cluster".to_string(),
            ));
        }

        if self.store.get_domain_by_name(&request.name).await?.is_some() {
            return Err(DomainServiceError::AlreadyExists(request.name));
        }

        let current_cluster = self.topology.current_cluster_name();
        let active_cluster = request
            .active_cluster_name
            .clone()
            .unwrap_or_else(|| current_cluster.clone());
        let clusters = match request.clusters.clone() {
            Some(clusters) => clusters,
            None if request.is_global_domain => self.topology.enabled_clusters(),
            None => vec![current_cluster.clone()],
        };
        self.validate_clusters(&clusters, &active_cluster)?;

        let failover_version = if request.is_global_domain {
            self.topology
                .next_failover_version(&active_cluster, EMPTY_VERSION)
                .map_err(DomainServiceError::Validation)?
        } else {
            0
        };

        let domain = DomainMetadata {
            info: DomainInfo {
                id: DomainId::new_v4(),
                name: request.name.clone(),
                status: DomainStatus::Registered,
                description: request.description.unwrap_or_default(),
                owner_email: request.owner_email.unwrap_or_default(),
                data: request.data.unwrap_or_default(),
            },
            config: DomainConfiguration {
                retention_days: request.workflow_execution_retention_period_in_days,
                history_archival: ArchivalConfig {
                    status: request.history_archival_status.unwrap_or_default(),
                    uri: request.history_archival_uri.unwrap_or_default(),
                },
                visibility_archival: ArchivalConfig {
                    status: request.visibility_archival_status.unwrap_or_default(),
                    uri: request.visibility_archival_uri.unwrap_or_default(),
                },
                bad_binaries: BadBinaries::default(),
            },
            replication_config: DomainReplicationConfig {
                active_cluster_name: active_cluster,
                clusters,
            },
            config_version: 0,
            failover_version,
            previous_failover_version: EMPTY_VERSION,
            failover_end_time: None,
            is_global_domain: request.is_global_domain,
            last_updated_time: Utc::now(),
            notification_version: self.store.get_metadata_version().await?,
        };

        // two-step write: primary row first, then the conditional name
        // index; losing the index race rolls the primary row back
        self.store.insert_domain_row(&domain).await?;
        if let Err(err) = self.store.insert_name_index(&request.name, &domain.info.id).await {
            if let Err(cleanup) = self.store.delete_domain_row(&domain.info.id).await {
                warn!(
                    domain = %request.name,
                    "Failed to delete orphaned domain row: {cleanup}"
                );
            }
            return match err {
                MetadataStoreError::ConditionFailed(_) => {
                    Err(DomainServiceError::AlreadyExists(request.name))
                }
                other => Err(other.into()),
            };
        }

        self.replicate(DomainOperation::Create, &domain).await?;
        self.cache.publish(Arc::new(domain.clone()));
        info!(domain = %domain.info.name, id = %domain.info.id, "Registered domain");
        Ok(domain)
    }

    async fn describe_domain(
        &self,
        request: &DescribeDomainRequest,
    ) -> Result<DomainMetadata, DomainServiceError> {
        let domain = match (&request.name, &request.uuid) {
            (Some(name), _) => self.store.get_domain_by_name(name).await?,
            (None, Some(id)) => self.store.get_domain_by_id(id).await?,
            (None, None) => {
                return Err(DomainServiceError::Validation(
                    "One of domain name or uuid must be set on request".to_string(),
                ))
            }
        };
        domain.ok_or_else(|| {
            DomainServiceError::NotFound(
                request
                    .name
                    .clone()
                    .or_else(|| request.uuid.as_ref().map(|id| id.to_string()))
                    .unwrap_or_default(),
            )
        })
    }

    async fn list_domains(
        &self,
        request: &ListDomainsRequest,
    ) -> Result<(Vec<DomainMetadata>, Option<Vec<u8>>), DomainServiceError> {
        let page_size = request.page_size.unwrap_or(100);
        Ok(self
            .store
            .list_domains(page_size, request.next_page_token.clone())
            .await?)
    }

    async fn update_domain(
        &self,
        request: UpdateDomainRequest,
    ) -> Result<DomainMetadata, DomainServiceError> {
        self.check_security_token(request.security_token.as_ref())?;

        let mut domain = self
            .store
            .get_domain_by_name(&request.name)
            .await?
            .ok_or_else(|| DomainServiceError::NotFound(request.name.clone()))?;

        let mut config_changed = false;
        let is_graceful_failover_request = request.is_graceful_failover_request();

        if let Some(description) = request.description {
            domain.info.description = description;
            config_changed = true;
        }
        if let Some(owner_email) = request.owner_email {
            domain.info.owner_email = owner_email;
            config_changed = true;
        }
        if let Some(data) = request.data {
            domain.info.data.extend(data);
            config_changed = true;
        }
        if let Some(retention) = request.workflow_execution_retention_period_in_days {
            self.validate_retention(retention)?;
            domain.config.retention_days = retention;
            config_changed = true;
        }
        if let Some(bad_binaries) = request.bad_binaries {
            self.validate_bad_binaries(&bad_binaries)?;
            domain.config.bad_binaries = bad_binaries;
            config_changed = true;
        }
        if let Some(status) = request.history_archival_status {
            domain.config.history_archival.status = status;
            config_changed = true;
        }
        if let Some(uri) = request.history_archival_uri {
            domain.config.history_archival.uri = uri;
            config_changed = true;
        }
        if let Some(status) = request.visibility_archival_status {
            domain.config.visibility_archival.status = status;
            config_changed = true;
        }
        if let Some(uri) = request.visibility_archival_uri {
            domain.config.visibility_archival.uri = uri;
            config_changed = true;
        }
        if let Some(clusters) = request.clusters.clone() {
            self.validate_clusters(&clusters, domain.active_cluster())?;
            domain.replication_config.clusters = clusters;
            config_changed = true;
        }

        if config_changed {
            domain.config_version += 1;
        }

        if let Some(new_active) = request.active_cluster_name.clone() {
            if !domain.is_global_domain {
                return Err(DomainServiceError::Validation(
                    "Only global domains can fail over".to_string(),
                ));
            }
            if !domain.replication_config.clusters.contains(&new_active) {
                return Err(DomainServiceError::Validation(format!(
                    "Active cluster {new_active} is not in the cluster list"
                )));
            }

            if is_graceful_failover_request {
                if domain.is_failover_in_progress() {
                    return Err(DomainServiceError::ConcurrentFailover);
                }
                self.check_failover_quorum(&domain).await?;

                let timeout = request.failover_timeout_seconds.unwrap_or(0).max(0);
                domain.failover_end_time =
                    Some(Utc::now() + ChronoDuration::seconds(timeout as i64));
                domain.previous_failover_version = domain.failover_version;
            } else {
                // a forced failover supersedes any graceful one in flight
                domain.failover_end_time = None;
                domain.previous_failover_version = EMPTY_VERSION;
            }

            if new_active != domain.replication_config.active_cluster_name {
                domain.failover_version = self
                    .topology
                    .next_failover_version(&new_active, domain.failover_version)
                    .map_err(DomainServiceError::Validation)?;
                domain.replication_config.active_cluster_name = new_active;
            }
        }

        self.persist_update(domain, DomainOperation::Update).await
    }

    async fn deprecate_domain(
        &self,
        request: DeprecateDomainRequest,
    ) -> Result<(), DomainServiceError> {
        self.check_security_token(request.security_token.as_ref())?;

        let mut domain = self
            .store
            .get_domain_by_name(&request.name)
            .await?
            .ok_or_else(|| DomainServiceError::NotFound(request.name.clone()))?;

        domain.info.status = DomainStatus::Deprecated;
        domain.config_version += 1;
        self.persist_update(domain, DomainOperation::Update).await?;
        info!(domain = %request.name, "Deprecated domain");
        Ok(())
    }

    async fn commit_expired_failovers(&self) -> Result<usize, DomainServiceError> {
        let now = Utc::now();
        let mut committed = 0;

        for domain in self.cache.snapshot() {
            let Some(end_time) = domain.failover_end_time else {
                continue;
            };
            if end_time > now {
                continue;
            }

            // re-read the authoritative row; the cache may lag
            let Some(mut fresh) = self.store.get_domain_by_name(&domain.info.name).await? else {
                continue;
            };
            match fresh.failover_end_time {
                Some(end) if end <= now => {
                    fresh.failover_end_time = None;
                    self.persist_update(fresh, DomainOperation::Update).await?;
                    committed += 1;
                }
                _ => {}
            }
        }

        Ok(committed)
    }
}

#[cfg(test)]
mod tests {
    use test_r::test;

    use super::*;
    use crate::clients::replication_queue::InMemoryReplicationQueue;
    use crate::config::ClusterConfig;
    use crate::config::{LimitsConfig, RateLimitsConfig};
    use crate::dynamic_config::ConfiguredDynamicConfig;
    use crate::testing::InMemoryMetadataStore;

    fn topology() -> ClusterTopologyConfig {
        let mut clusters = HashMap::new();
        clusters.insert(
            "primary".to_string(),
            ClusterConfig {
                enabled: true,
                initial_failover_version: 0,
                frontend: Default::default(),
            },
        );
        clusters.insert(
            "secondary".to_string(),
            ClusterConfig {
                enabled: true,
                initial_failover_version: 1,
                frontend: Default::default(),
            },
        );
        ClusterTopologyConfig {
            current_cluster: "primary".to_string(),
            failover_version_increment: 10,
            number_of_history_shards: 4,
            redirection_policy: Default::default(),
            clusters,
        }
    }

    fn service(store: Arc<InMemoryMetadataStore>) -> DomainServiceDefault {
        let cache = Arc::new(DomainCache::new(store.clone()));
        DomainServiceDefault::new(
            store,
            cache,
            Arc::new(InMemoryReplicationQueue::new()),
            HashMap::new(),
            topology(),
            DomainDefaultsConfig::default(),
            AdminConfig {
                security_token: None,
                enable_global_domains: true,
            },
            Arc::new(ConfiguredDynamicConfig::new(
                LimitsConfig::default(),
                RateLimitsConfig::default(),
            )),
            Duration::from_secs(1),
        )
    }

    fn register_request(name: &str, is_global: bool) -> RegisterDomainRequest {
        RegisterDomainRequest {
            name: name.to_string(),
            description: None,
            owner_email: None,
            workflow_execution_retention_period_in_days: 7,
            data: None,
            clusters: None,
            active_cluster_name: None,
            is_global_domain: is_global,
            history_archival_status: None,
            history_archival_uri: None,
            visibility_archival_status: None,
            visibility_archival_uri: None,
            security_token: None,
        }
    }

    #[test]
    async fn register_then_describe_round_trips() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let service = service(store);

        let registered = service
            .register_domain(register_request("orders", true))
            .await
            .unwrap();
        assert_eq!(registered.info.status, DomainStatus::Registered);
        assert_eq!(
            registered.replication_config.active_cluster_name,
            ClusterName::from("primary")
        );

        let described = service
            .describe_domain(&DescribeDomainRequest {
                name: Some("orders".to_string()),
                uuid: None,
            })
            .await
            .unwrap();
        assert_eq!(described.info.id, registered.info.id);
    }

    #[test]
    async fn duplicate_registration_is_rejected() {
        let service = service(Arc::new(InMemoryMetadataStore::new()));
        service
            .register_domain(register_request("orders", false))
            .await
            .unwrap();
        let error = service
            .register_domain(register_request("orders", false))
            .await
            .unwrap_err();
        assert_eq!(error, DomainServiceError::AlreadyExists("orders".to_string()));
    }

    #[test]
    async fn invalid_domain_names_are_rejected() {
        let service = service(Arc::new(InMemoryMetadataStore::new()));
        for name in ["", "has space", "-leading-dash", "weird/chars"] {
            let error = service
                .register_domain(register_request(name, false))
                .await
                .unwrap_err();
            assert!(matches!(error, DomainServiceError::Validation(_)), "{name}");
        }
    }

    #[test]
    async fn retention_bounds_are_enforced() {
        let service = service(Arc::new(InMemoryMetadataStore::new()));
        let mut request = register_request("orders", false);
        request.workflow_execution_retention_period_in_days = 365;
        assert!(matches!(
            service.register_domain(request).await.unwrap_err(),
            DomainServiceError::Validation(_)
        ));
    }

    #[test]
    async fn forced_failover_mints_a_greater_owned_version() {
        let service = service(Arc::new(InMemoryMetadataStore::new()));
        let registered = service
            .register_domain(register_request("orders", true))
            .await
            .unwrap();
        // primary's initial version is 0, increment 10
        assert_eq!(registered.failover_version, 0);

        let mut update = UpdateDomainRequest::new("orders");
        update.active_cluster_name = Some(ClusterName::from("secondary"));
        let updated = service.update_domain(update).await.unwrap();

        assert_eq!(
            updated.replication_config.active_cluster_name,
            ClusterName::from("secondary")
        );
        // smallest version > 0 owned by secondary (initial 1, increment 10)
        assert_eq!(updated.failover_version, 1);
        assert!(updated.failover_end_time.is_none());
    }

    #[test]
    async fn local_domains_cannot_fail_over() {
        let service = service(Arc::new(InMemoryMetadataStore::new()));
        service
            .register_domain(register_request("orders", false))
            .await
            .unwrap();

        let mut update = UpdateDomainRequest::new("orders");
        update.active_cluster_name = Some(ClusterName::from("secondary"));
        assert!(matches!(
            service.update_domain(update).await.unwrap_err(),
            DomainServiceError::Validation(_)
        ));
    }

    #[test]
    async fn graceful_failover_is_rejected_while_one_is_in_flight() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let service = service(store.clone());
        let registered = service
            .register_domain(register_request("orders", true))
            .await
            .unwrap();

        let mut in_flight = registered.clone();
        in_flight.failover_end_time = Some(Utc::now() + ChronoDuration::seconds(60));
        store.update_domain(&in_flight).await.unwrap();

        let mut update = UpdateDomainRequest::new("orders");
        update.active_cluster_name = Some(ClusterName::from("secondary"));
        update.failover_timeout_seconds = Some(30);
        assert_eq!(
            service.update_domain(update).await.unwrap_err(),
            DomainServiceError::ConcurrentFailover
        );
    }

    #[test]
    async fn expired_graceful_failovers_are_committed() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let service = service(store.clone());
        let registered = service
            .register_domain(register_request("orders", true))
            .await
            .unwrap();

        let mut draining = registered.clone();
        draining.failover_end_time = Some(Utc::now() - ChronoDuration::seconds(1));
        store.update_domain(&draining).await.unwrap();
        service.cache.publish(Arc::new(draining));

        assert_eq!(service.commit_expired_failovers().await.unwrap(), 1);
        let fresh = store.get_domain_by_name("orders").await.unwrap().unwrap();
        assert!(fresh.failover_end_time.is_none());

        // nothing left to commit
        assert_eq!(service.commit_expired_failovers().await.unwrap(), 0);
    }

    #[test]
    async fn deprecate_is_terminal_but_not_delete() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let service = service(store.clone());
        service
            .register_domain(register_request("orders", false))
            .await
            .unwrap();

        service
            .deprecate_domain(DeprecateDomainRequest {
                name: "orders".to_string(),
                security_token: None,
            })
            .await
            .unwrap();

        let domain = store.get_domain_by_name("orders").await.unwrap().unwrap();
        assert_eq!(domain.info.status, DomainStatus::Deprecated);
    }

    #[test]
    async fn mutations_emit_replication_messages_for_global_domains() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let cache = Arc::new(DomainCache::new(store.clone()));
        let queue = Arc::new(InMemoryReplicationQueue::new());
        let service = DomainServiceDefault::new(
            store,
            cache,
            queue.clone(),
            HashMap::new(),
            topology(),
            DomainDefaultsConfig::default(),
            AdminConfig {
                security_token: None,
                enable_global_domains: true,
            },
            Arc::new(ConfiguredDynamicConfig::new(
                LimitsConfig::default(),
                RateLimitsConfig::default(),
            )),
            Duration::from_secs(1),
        );

        service
            .register_domain(register_request("orders", true))
            .await
            .unwrap();
        assert_eq!(queue.published_count(), 1);

        // local domains stay silent
        service
            .register_domain(register_request("local-only", false))
            .await
            .unwrap();
        assert_eq!(queue.published_count(), 1);
    }
}
