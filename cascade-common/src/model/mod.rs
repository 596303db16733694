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

pub mod error;
pub mod history;
pub mod tokens;

use crate::model::history::VersionHistoryItem;
use chrono::{DateTime, Utc};
use poem_openapi::{Enum, Object};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[macro_export]
macro_rules! newtype_uuid {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            serde::Serialize,
            serde::Deserialize,
            poem_openapi::NewType,
        )]
        #[serde(transparent)]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            pub fn new_v4() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = uuid::Uuid::parse_str(s)
                    .map_err(|err| format!("Invalid {}: {err}", stringify!($name)))?;
                Ok(Self(uuid))
            }
        }

        impl TryFrom<&str> for $name {
            type Error = String;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

newtype_uuid!(DomainId);
newtype_uuid!(RunId);

/// Name of a Cascade cluster (data center) in the replication topology.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    poem_openapi::NewType,
)]
#[serde(transparent)]
pub struct ClusterName(pub String);

impl ClusterName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl Display for ClusterName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ClusterName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Enum,
)]
pub enum DomainStatus {
    Registered,
    Deprecated,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Enum, Default,
)]
pub enum ArchivalStatus {
    #[default]
    Disabled,
    Enabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct ArchivalConfig {
    pub status: ArchivalStatus,
    pub uri: String,
}

impl ArchivalConfig {
    pub fn is_enabled(&self) -> bool {
        self.status == ArchivalStatus::Enabled && !self.uri.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct BadBinaryInfo {
    pub reason: String,
    pub operator: String,
    pub created_time: DateTime<Utc>,
}

/// Binary checksums banned from making progress in a domain, keyed by
/// checksum. The map is bounded; enforcement happens on domain update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct BadBinaries {
    pub binaries: HashMap<String, BadBinaryInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct DomainReplicationConfig {
    pub active_cluster_name: ClusterName,
    pub clusters: Vec<ClusterName>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct DomainInfo {
    pub id: DomainId,
    pub name: String,
    pub status: DomainStatus,
    pub description: String,
    pub owner_email: String,
    pub data: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct DomainConfiguration {
    pub retention_days: i32,
    pub history_archival: ArchivalConfig,
    pub visibility_archival: ArchivalConfig,
    pub bad_binaries: BadBinaries,
}

/// The complete durable record of a domain. `failover_version` is owned by
/// the active cluster and strictly increases on every active-cluster change;
/// `notification_version` is the cluster-wide monotone stamp assigned on each
/// metadata write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct DomainMetadata {
    pub info: DomainInfo,
    pub config: DomainConfiguration,
    pub replication_config: DomainReplicationConfig,
    pub config_version: i64,
    pub failover_version: i64,
    pub previous_failover_version: i64,
    pub failover_end_time: Option<DateTime<Utc>>,
    pub is_global_domain: bool,
    pub last_updated_time: DateTime<Utc>,
    pub notification_version: i64,
}

impl DomainMetadata {
    pub fn active_cluster(&self) -> &ClusterName {
        &self.replication_config.active_cluster_name
    }

    pub fn is_active_in(&self, cluster: &ClusterName) -> bool {
        !self.is_global_domain || self.active_cluster() == cluster
    }

    pub fn is_deprecated(&self) -> bool {
        self.info.status == DomainStatus::Deprecated
    }

    pub fn is_failover_in_progress(&self) -> bool {
        self.failover_end_time.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub workflow_id: String,
    pub run_id: Option<RunId>,
}

/// Fully resolved reference to a single run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowKey {
    pub domain_id: DomainId,
    pub workflow_id: String,
    pub run_id: RunId,
}

impl Display for WorkflowKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.domain_id, self.workflow_id, self.run_id
        )
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Enum, Default,
)]
pub enum TaskListKind {
    #[default]
    Normal,
    /// Targets a specific worker's cache; the encoded name is exempt from the
    /// raw-name length limit.
    Sticky,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct TaskList {
    pub name: String,
    #[serde(default)]
    #[oai(default)]
    pub kind: TaskListKind,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Enum, Default,
)]
pub enum EncodingType {
    #[default]
    Json,
    Binary,
}

/// A raw, encoded batch of history events as stored by the history tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct DataBlob {
    pub encoding: EncodingType,
    pub data: Vec<u8>,
}

impl DataBlob {
    pub fn json(data: Vec<u8>) -> Self {
        Self {
            encoding: EncodingType::Json,
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Enum, Default,
)]
pub enum QueryConsistencyLevel {
    #[default]
    Eventual,
    Strong,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Enum, Default,
)]
pub enum HistoryEventFilterType {
    #[default]
    AllEvent,
    CloseEvent,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Enum, Default,
)]
pub enum WorkflowIdReusePolicy {
    #[default]
    AllowDuplicateFailedOnly,
    AllowDuplicate,
    RejectDuplicate,
    TerminateIfRunning,
}

/// The four service rings of a Cascade cluster.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Enum,
    strum_macros::EnumIter,
    strum_macros::Display,
)]
pub enum ServiceRole {
    Frontend,
    History,
    Matching,
    Worker,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct HostInfo {
    pub identity: String,
}

/// Value types accepted for search attributes, with their mapping to the
/// visibility backend's native types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Enum,
)]
pub enum IndexedValueType {
    String,
    Keyword,
    Int,
    Double,
    Bool,
    Datetime,
}

impl IndexedValueType {
    pub fn visibility_native_type(&self) -> &'static str {
        match self {
            IndexedValueType::String => "text",
            IndexedValueType::Keyword => "keyword",
            IndexedValueType::Int => "long",
            IndexedValueType::Double => "double",
            IndexedValueType::Bool => "boolean",
            IndexedValueType::Datetime => "date",
        }
    }
}

impl FromStr for IndexedValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "string" => Ok(IndexedValueType::String),
            "keyword" => Ok(IndexedValueType::Keyword),
            "int" => Ok(IndexedValueType::Int),
            "double" => Ok(IndexedValueType::Double),
            "bool" => Ok(IndexedValueType::Bool),
            "datetime" => Ok(IndexedValueType::Datetime),
            _ => Err(format!("Invalid indexed value type: {s}")),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Enum,
)]
pub enum DomainOperation {
    Create,
    Update,
}

/// A durable replication message. Within one source queue `message_id` is
/// strictly increasing; consumers advance an ack-level cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct ReplicationTask {
    pub message_id: i64,
    pub attributes: ReplicationTaskAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct DomainTaskAttributes {
    pub operation: DomainOperation,
    pub domain: DomainMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct HistoryTaskAttributes {
    pub domain_id: DomainId,
    pub workflow_id: String,
    pub run_id: RunId,
    pub events: DataBlob,
    pub version_history_items: Vec<VersionHistoryItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, poem_openapi::Union)]
#[serde(tag = "type")]
#[oai(discriminator_name = "type")]
pub enum ReplicationTaskAttributes {
    Domain(DomainTaskAttributes),
    History(HistoryTaskAttributes),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct ReplicationMessages {
    pub replication_tasks: Vec<ReplicationTask>,
    pub last_retrieved_message_id: i64,
    pub has_more: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Enum)]
pub enum QueueType {
    Replication,
    Domain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Object, Default)]
pub struct Empty {}

#[cfg(test)]
mod tests {
    use test_r::test;

    use super::*;

    #[test]
    fn domain_is_active_locally_when_not_global() {
        let domain = test_domain(false, "other");
        assert!(domain.is_active_in(&ClusterName::from("current")));
    }

    #[test]
    fn global_domain_is_active_only_in_active_cluster() {
        let domain = test_domain(true, "other");
        assert!(!domain.is_active_in(&ClusterName::from("current")));
        assert!(domain.is_active_in(&ClusterName::from("other")));
    }

    #[test]
    fn indexed_value_types_map_to_visibility_native_types() {
        assert_eq!(IndexedValueType::String.visibility_native_type(), "text");
        assert_eq!(IndexedValueType::Int.visibility_native_type(), "long");
        assert_eq!(IndexedValueType::Datetime.visibility_native_type(), "date");
    }

    fn test_domain(is_global: bool, active: &str) -> DomainMetadata {
        DomainMetadata {
            info: DomainInfo {
                id: DomainId::new_v4(),
                name: "test".to_string(),
                status: DomainStatus::Registered,
                description: String::new(),
                owner_email: String::new(),
                data: HashMap::new(),
            },
            config: DomainConfiguration {
                retention_days: 7,
                history_archival: ArchivalConfig::default(),
                visibility_archival: ArchivalConfig::default(),
                bad_binaries: BadBinaries::default(),
            },
            replication_config: DomainReplicationConfig {
                active_cluster_name: ClusterName::from(active),
                clusters: vec![ClusterName::from("current"), ClusterName::from(active)],
            },
            config_version: 0,
            failover_version: 1,
            previous_failover_version: 0,
            failover_end_time: None,
            is_global_domain: is_global,
            last_updated_time: Utc::now(),
            notification_version: 0,
        }
    }
}
