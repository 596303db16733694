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

use cascade_common::model::{DomainId, DomainMetadata};
use cascade_common::SafeDisplay;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetadataStoreError {
    #[error("Domain row already exists: {0}")]
    RowAlreadyExists(String),
    #[error("Condition failed: {0}")]
    ConditionFailed(String),
    #[error("Metadata store unavailable: {0}")]
    Unavailable(String),
    #[error("Internal metadata store error: {0}")]
    Internal(String),
}

impl SafeDisplay for MetadataStoreError {
    fn to_safe_string(&self) -> String {
        self.to_string()
    }
}

/// Contract of the nosql domain metadata store. The store keeps a primary
/// row keyed by domain id plus a name-to-id index row; the index insert is
/// conditional, which is what makes concurrent registrations of the same
/// name safe. The domain handler drives the two rows explicitly so it can
/// roll the primary row back when the index insert loses the race.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// The notification version the next successful write will be stamped
    /// with; reading it does not consume it.
    async fn get_metadata_version(&self) -> Result<i64, MetadataStoreError>;

    async fn insert_domain_row(&self, domain: &DomainMetadata)
        -> Result<(), MetadataStoreError>;

    /// Conditionally claims the name; fails with `ConditionFailed` when the
    /// name already maps to a different id.
    async fn insert_name_index(
        &self,
        name: &str,
        id: &DomainId,
    ) -> Result<(), MetadataStoreError>;

    /// Best-effort cleanup of an orphaned primary row; a background sweeper
    /// tolerates leftovers.
    async fn delete_domain_row(&self, id: &DomainId) -> Result<(), MetadataStoreError>;

    /// Persists the new state and bumps the store's notification version;
    /// `domain.notification_version` must carry the value obtained from
    /// `get_metadata_version`.
    async fn update_domain(&self, domain: &DomainMetadata) -> Result<(), MetadataStoreError>;

    async fn get_domain_by_name(
        &self,
        name: &str,
    ) -> Result<Option<DomainMetadata>, MetadataStoreError>;

    async fn get_domain_by_id(
        &self,
        id: &DomainId,
    ) -> Result<Option<DomainMetadata>, MetadataStoreError>;

    async fn list_domains(
        &self,
        page_size: i32,
        next_page_token: Option<Vec<u8>>,
    ) -> Result<(Vec<DomainMetadata>, Option<Vec<u8>>), MetadataStoreError>;
}

#[derive(Default)]
struct MetadataState {
    rows: HashMap<DomainId, DomainMetadata>,
    names: HashMap<String, DomainId>,
    notification_version: i64,
}

/// Metadata store backed by process memory, with the same two-row shape as
/// the production store: a primary row keyed by id and a conditional
/// name-to-id index. Used by tests and standalone dev deployments.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    state: Mutex<MetadataState>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a complete domain (both rows), for test setup.
    pub async fn seed(&self, domain: DomainMetadata) {
        let mut state = self.state.lock().unwrap();
        state
            .names
            .insert(domain.info.name.clone(), domain.info.id.clone());
        state.notification_version =
            state.notification_version.max(domain.notification_version + 1);
        state.rows.insert(domain.info.id.clone(), domain);
    }

    pub fn row_count(&self) -> usize {
        self.state.lock().unwrap().rows.len()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn get_metadata_version(&self) -> Result<i64, MetadataStoreError> {
        Ok(self.state.lock().unwrap().notification_version)
    }

    async fn insert_domain_row(
        &self,
        domain: &DomainMetadata,
    ) -> Result<(), MetadataStoreError> {
        let mut state = self.state.lock().unwrap();
        if state.rows.contains_key(&domain.info.id) {
            return Err(MetadataStoreError::RowAlreadyExists(
                domain.info.id.to_string(),
            ));
        }
        state.notification_version =
            state.notification_version.max(domain.notification_version + 1);
        state.rows.insert(domain.info.id.clone(), domain.clone());
        Ok(())
    }

    async fn insert_name_index(
        &self,
        name: &str,
        id: &DomainId,
    ) -> Result<(), MetadataStoreError> {
        let mut state = self.state.lock().unwrap();
        match state.names.get(name) {
            Some(existing) if existing != id => Err(MetadataStoreError::ConditionFailed(
                format!("name {name} is already taken"),
            )),
            _ => {
                state.names.insert(name.to_string(), id.clone());
                Ok(())
            }
        }
    }

    async fn delete_domain_row(&self, id: &DomainId) -> Result<(), MetadataStoreError> {
        self.state.lock().unwrap().rows.remove(id);
        Ok(())
    }

    async fn update_domain(&self, domain: &DomainMetadata) -> Result<(), MetadataStoreError> {
        let mut state = self.state.lock().unwrap();
        if !state.rows.contains_key(&domain.info.id) {
            return Err(MetadataStoreError::ConditionFailed(format!(
                "domain {} does not exist",
                domain.info.id
            )));
        }
        state.notification_version =
            state.notification_version.max(domain.notification_version + 1);
        state.rows.insert(domain.info.id.clone(), domain.clone());
        Ok(())
    }

    async fn get_domain_by_name(
        &self,
        name: &str,
    ) -> Result<Option<DomainMetadata>, MetadataStoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .names
            .get(name)
            .and_then(|id| state.rows.get(id))
            .cloned())
    }

    async fn get_domain_by_id(
        &self,
        id: &DomainId,
    ) -> Result<Option<DomainMetadata>, MetadataStoreError> {
        Ok(self.state.lock().unwrap().rows.get(id).cloned())
    }

    async fn list_domains(
        &self,
        page_size: i32,
        next_page_token: Option<Vec<u8>>,
    ) -> Result<(Vec<DomainMetadata>, Option<Vec<u8>>), MetadataStoreError> {
        let state = self.state.lock().unwrap();
        let mut domains: Vec<DomainMetadata> = state.rows.values().cloned().collect();
        domains.sort_by(|a, b| a.info.name.cmp(&b.info.name));

        let offset = match next_page_token {
            None => 0,
            Some(bytes) => String::from_utf8(bytes)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| {
                    MetadataStoreError::Internal("malformed page token".to_string())
                })?,
        };

        let page: Vec<DomainMetadata> = domains
            .iter()
            .skip(offset)
            .take(page_size.max(1) as usize)
            .cloned()
            .collect();
        let next = offset + page.len();
        let token = (next < domains.len()).then(|| next.to_string().into_bytes());
        Ok((page, token))
    }
}
