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

use crate::clients::metadata::{MetadataStore, MetadataStoreError};
use arc_swap::ArcSwap;
use cascade_common::model::error::ServiceError;
use cascade_common::model::{DomainId, DomainMetadata};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const REFRESH_PAGE_SIZE: i32 = 100;

#[derive(Default)]
struct CacheMaps {
    by_name: HashMap<String, Arc<DomainMetadata>>,
    by_id: HashMap<DomainId, Arc<DomainMetadata>>,
}

/// Read-mostly domain cache. Readers take a snapshot per call and never
/// block writers: the maps are replaced wholesale by the background refresh,
/// and individual entries are republished copy-on-write after local
/// mutations.
pub struct DomainCache {
    store: Arc<dyn MetadataStore>,
    maps: ArcSwap<CacheMaps>,
}

impl DomainCache {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self {
            store,
            maps: ArcSwap::from_pointee(CacheMaps::default()),
        }
    }

    pub async fn refresh(&self) -> Result<(), MetadataStoreError> {
        let mut maps = CacheMaps::default();
        let mut page_token = None;
        loop {
            let (domains, next) = self
                .store
                .list_domains(REFRESH_PAGE_SIZE, page_token)
                .await?;
            for domain in domains {
                let entry = Arc::new(domain);
                maps.by_name.insert(entry.info.name.clone(), entry.clone());
                maps.by_id.insert(entry.info.id.clone(), entry);
            }
            match next {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        debug!(domains = maps.by_id.len(), "Refreshed domain cache");
        self.maps.store(Arc::new(maps));
        Ok(())
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<DomainMetadata>> {
        self.maps.load().by_name.get(name).cloned()
    }

    pub fn get_by_id(&self, id: &DomainId) -> Option<Arc<DomainMetadata>> {
        self.maps.load().by_id.get(id).cloned()
    }

    /// Cache read with a store fallback on miss, so a freshly registered
    /// domain is visible before the next refresh tick.
    pub async fn get_required_by_name(
        &self,
        name: &str,
    ) -> Result<Arc<DomainMetadata>, ServiceError> {
        if let Some(domain) = self.get_by_name(name) {
            return Ok(domain);
        }
        match self.store.get_domain_by_name(name).await {
            Ok(Some(domain)) => {
                let entry = Arc::new(domain);
                self.publish(entry.clone());
                Ok(entry)
            }
            Ok(None) => Err(ServiceError::EntityNotFound(format!(
                "Domain {name} does not exist"
            ))),
            Err(err) => Err(ServiceError::internal(err)),
        }
    }

    pub async fn get_required_by_id(
        &self,
        id: &DomainId,
    ) -> Result<Arc<DomainMetadata>, ServiceError> {
        if let Some(domain) = self.get_by_id(id) {
            return Ok(domain);
        }
        match self.store.get_domain_by_id(id).await {
            Ok(Some(domain)) => {
                let entry = Arc::new(domain);
                self.publish(entry.clone());
                Ok(entry)
            }
            Ok(None) => Err(ServiceError::EntityNotFound(format!(
                "Domain {id} does not exist"
            ))),
            Err(err) => Err(ServiceError::internal(err)),
        }
    }

    pub async fn resolve_id(&self, name: &str) -> Result<DomainId, ServiceError> {
        Ok(self.get_required_by_name(name).await?.info.id.clone())
    }

    /// Publishes one entry atomically without waiting for the next refresh.
    pub fn publish(&self, domain: Arc<DomainMetadata>) {
        let current = self.maps.load();
        let mut by_name = current.by_name.clone();
        let mut by_id = current.by_id.clone();
        by_name.insert(domain.info.name.clone(), domain.clone());
        by_id.insert(domain.info.id.clone(), domain);
        self.maps.store(Arc::new(CacheMaps { by_name, by_id }));
    }

    pub fn snapshot(&self) -> Vec<Arc<DomainMetadata>> {
        self.maps.load().by_id.values().cloned().collect()
    }

    pub fn spawn_refresh_loop(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        if let Err(err) = cache.refresh().await {
                            warn!("Domain cache refresh failed: {err}");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use test_r::test;

    use super::*;
    use crate::testing::{sample_domain, InMemoryMetadataStore};

    #[test]
    async fn publish_makes_an_entry_visible_without_refresh() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let cache = DomainCache::new(store);

        assert!(cache.get_by_name("orders").is_none());
        cache.publish(Arc::new(sample_domain("orders", false)));
        assert!(cache.get_by_name("orders").is_some());
    }

    #[test]
    async fn cache_miss_falls_back_to_the_store() {
        let store = Arc::new(InMemoryMetadataStore::new());
        store.seed(sample_domain("orders", false)).await;
        let cache = DomainCache::new(store);

        let domain = cache.get_required_by_name("orders").await.unwrap();
        assert_eq!(domain.info.name, "orders");
        // the fallback also populated the cache
        assert!(cache.get_by_name("orders").is_some());
    }

    #[test]
    async fn missing_domains_surface_as_entity_not_found() {
        let cache = DomainCache::new(Arc::new(InMemoryMetadataStore::new()));
        let error = cache.get_required_by_name("nope").await.unwrap_err();
        assert!(matches!(error, ServiceError::EntityNotFound(_)));
    }

    #[test]
    async fn refresh_replaces_the_snapshot() {
        let store = Arc::new(InMemoryMetadataStore::new());
        store.seed(sample_domain("a", false)).await;
        store.seed(sample_domain("b", true)).await;
        let cache = DomainCache::new(store);

        cache.refresh().await.unwrap();
        assert_eq!(cache.snapshot().len(), 2);
    }
}
