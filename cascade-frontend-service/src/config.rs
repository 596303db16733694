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

use crate::service::redirection::RedirectionPolicy;
use cascade_common::config::{ConfigLoader, RemoteServiceConfig, RetryConfig};
use cascade_common::model::ClusterName;
use cascade_common::tracing::TracingConfig;
use cascade_common::SafeDisplay;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FrontendServiceConfig {
    pub tracing: TracingConfig,
    pub environment: String,
    pub http_port: u16,
    pub cluster: ClusterTopologyConfig,
    pub limits: LimitsConfig,
    pub rate_limits: RateLimitsConfig,
    pub archival: ClusterArchivalConfig,
    pub lifecycle: LifecycleConfig,
    pub timeouts: TimeoutsConfig,
    pub admin: AdminConfig,
    pub domain_defaults: DomainDefaultsConfig,
    pub client_versions: ClientVersionsConfig,
    pub cors_origin_regex: String,
}

impl Default for FrontendServiceConfig {
    fn default() -> Self {
        Self {
            tracing: TracingConfig::local_dev("cascade-frontend-service"),
            environment: "dev".to_string(),
            http_port: 8080,
            cluster: ClusterTopologyConfig::default(),
            limits: LimitsConfig::default(),
            rate_limits: RateLimitsConfig::default(),
            archival: ClusterArchivalConfig::default(),
            lifecycle: LifecycleConfig::default(),
            timeouts: TimeoutsConfig::default(),
            admin: AdminConfig::default(),
            domain_defaults: DomainDefaultsConfig::default(),
            client_versions: ClientVersionsConfig::default(),
            cors_origin_regex: "https://*.golem.cloud".to_string(),
        }
    }
}

/// Minimum SDK versions accepted when the client advertises its
/// implementation; clients that send no version headers are admitted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientVersionsConfig {
    pub check_enabled: bool,
    pub min_go_sdk: String,
    pub min_java_sdk: String,
}

impl Default for ClientVersionsConfig {
    fn default() -> Self {
        Self {
            check_enabled: true,
            min_go_sdk: "1.5.0".to_string(),
            min_java_sdk: "1.5.0".to_string(),
        }
    }
}

impl SafeDisplay for FrontendServiceConfig {
    fn to_safe_string(&self) -> String {
        let mut result = String::new();
        let _ = writeln!(&mut result, "tracing:");
        let _ = writeln!(&mut result, "{}", self.tracing.to_safe_string_indented());
        let _ = writeln!(&mut result, "environment: {}", self.environment);
        let _ = writeln!(&mut result, "HTTP port: {}", self.http_port);
        let _ = writeln!(&mut result, "cluster:");
        let _ = writeln!(&mut result, "{}", self.cluster.to_safe_string_indented());
        let _ = writeln!(&mut result, "lifecycle:");
        let _ = writeln!(&mut result, "{}", self.lifecycle.to_safe_string_indented());
        let _ = writeln!(&mut result, "admin:");
        let _ = writeln!(&mut result, "{}", self.admin.to_safe_string_indented());
        let _ = writeln!(&mut result, "CORS origin regex: {}", self.cors_origin_regex);
        result
    }
}

/// The multi-cluster topology this frontend participates in. Failover
/// versions minted for a cluster are congruent to its initial failover
/// version modulo `failover_version_increment`, which makes the owner of any
/// given version recoverable from the version alone.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterTopologyConfig {
    pub current_cluster: String,
    pub failover_version_increment: i64,
    pub number_of_history_shards: i32,
    #[serde(default)]
    pub redirection_policy: RedirectionPolicy,
    pub clusters: HashMap<String, ClusterConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub enabled: bool,
    pub initial_failover_version: i64,
    pub frontend: RemoteServiceConfig,
}

impl Default for ClusterTopologyConfig {
    fn default() -> Self {
        let mut clusters = HashMap::new();
        clusters.insert(
            "primary".to_string(),
            ClusterConfig {
                enabled: true,
                initial_failover_version: 0,
                frontend: RemoteServiceConfig::default(),
            },
        );
        Self {
            current_cluster: "primary".to_string(),
            failover_version_increment: 10,
            number_of_history_shards: 16,
            redirection_policy: RedirectionPolicy::default(),
            clusters,
        }
    }
}

impl ClusterTopologyConfig {
    pub fn current_cluster_name(&self) -> ClusterName {
        ClusterName::new(self.current_cluster.clone())
    }

    pub fn is_configured(&self, cluster: &ClusterName) -> bool {
        self.clusters
            .get(&cluster.0)
            .map(|c| c.enabled)
            .unwrap_or(false)
    }

    pub fn enabled_clusters(&self) -> Vec<ClusterName> {
        let mut names: Vec<ClusterName> = self
            .clusters
            .iter()
            .filter(|(_, config)| config.enabled)
            .map(|(name, _)| ClusterName::new(name.clone()))
            .collect();
        names.sort();
        names
    }

    pub fn frontend_of(&self, cluster: &ClusterName) -> Option<&RemoteServiceConfig> {
        self.clusters
            .get(&cluster.0)
            .filter(|c| c.enabled)
            .map(|c| &c.frontend)
    }

    /// Smallest failover version greater than `current_version` that belongs
    /// to `cluster`.
    pub fn next_failover_version(
        &self,
        cluster: &ClusterName,
        current_version: i64,
    ) -> Result<i64, String> {
        let config = self
            .clusters
            .get(&cluster.0)
            .filter(|c| c.enabled)
            .ok_or_else(|| format!("Cluster {cluster} is not configured"))?;

        let increment = self.failover_version_increment;
        let mut version =
            (current_version / increment) * increment + config.initial_failover_version;
        if version <= current_version {
            version += increment;
        }
        Ok(version)
    }
}

impl SafeDisplay for ClusterTopologyConfig {
    fn to_safe_string(&self) -> String {
        let mut result = String::new();
        let _ = writeln!(&mut result, "current cluster: {}", self.current_cluster);
        let _ = writeln!(
            &mut result,
            "failover version increment: {}",
            self.failover_version_increment
        );
        for (name, cluster) in &self.clusters {
            let _ = writeln!(
                &mut result,
                "{name}: enabled={} initial-failover-version={} frontend={}:{}",
                cluster.enabled,
                cluster.initial_failover_version,
                cluster.frontend.host,
                cluster.frontend.port
            );
        }
        result
    }
}

/// Static defaults for the request validation limits; the dynamic config
/// layer may override most of them per domain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_domain_name_length: usize,
    pub max_id_length: usize,
    pub max_raw_task_list_name_length: usize,
    pub blob_size_warn_limit: usize,
    pub blob_size_error_limit: usize,
    pub history_max_page_size: i32,
    pub visibility_max_page_size: i32,
    pub search_attributes_key_limit: usize,
    pub search_attributes_value_size_limit: usize,
    pub search_attributes_total_size_limit: usize,
    pub max_bad_binaries: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_domain_name_length: 1000,
            max_id_length: 1000,
            max_raw_task_list_name_length: 1000,
            blob_size_warn_limit: 256 * 1024,
            blob_size_error_limit: 2 * 1024 * 1024,
            history_max_page_size: 1000,
            visibility_max_page_size: 1000,
            search_attributes_key_limit: 100,
            search_attributes_value_size_limit: 2 * 1024,
            search_attributes_total_size_limit: 40 * 1024,
            max_bad_binaries: 10,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitsConfig {
    /// Token refill rate of the per-process bucket
    pub global_rps: f64,
    /// Fleet-wide budget of one domain, divided by the frontend ring size
    pub global_domain_rps: f64,
    /// Upper bound of one domain's rate on this instance
    pub max_domain_rps_per_instance: f64,
    pub burst_ratio: f64,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            global_rps: 1200.0,
            global_domain_rps: 1200.0,
            max_domain_rps_per_instance: 600.0,
            burst_ratio: 2.0,
        }
    }
}

/// Whether this cluster participates in archival at all; the domain record
/// additionally opts in per domain.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct ClusterArchivalConfig {
    pub history_enabled: bool,
    pub visibility_enabled: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LifecycleConfig {
    #[serde(with = "humantime_serde")]
    pub warmup_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub failure_detection_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub drain_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub failover_watcher_interval: Duration,
    pub failover_watcher_jitter: f64,
    #[serde(with = "humantime_serde")]
    pub domain_cache_refresh_interval: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            warmup_interval: Duration::from_secs(30),
            failure_detection_interval: Duration::from_secs(10),
            drain_interval: Duration::from_secs(30),
            failover_watcher_interval: Duration::from_secs(10),
            failover_watcher_jitter: 0.2,
            domain_cache_refresh_interval: Duration::from_secs(10),
        }
    }
}

impl SafeDisplay for LifecycleConfig {
    fn to_safe_string(&self) -> String {
        let mut result = String::new();
        let _ = writeln!(&mut result, "warmup interval: {:?}", self.warmup_interval);
        let _ = writeln!(
            &mut result,
            "failure detection interval: {:?}",
            self.failure_detection_interval
        );
        let _ = writeln!(&mut result, "drain interval: {:?}", self.drain_interval);
        result
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(with = "humantime_serde")]
    pub default_call_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub long_poll_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub min_long_poll_timeout: Duration,
    pub dlq_retries: RetryConfig,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            default_call_timeout: Duration::from_secs(10),
            long_poll_timeout: Duration::from_secs(3 * 60),
            min_long_poll_timeout: Duration::from_secs(10),
            dlq_retries: RetryConfig::max_attempts_5(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AdminConfig {
    /// Required by the operations that change cluster-wide state
    pub security_token: Option<String>,
    pub enable_global_domains: bool,
}

impl SafeDisplay for AdminConfig {
    fn to_safe_string(&self) -> String {
        let mut result = String::new();
        let _ = writeln!(
            &mut result,
            "security token: {}",
            if self.security_token.is_some() {
                "****"
            } else {
                "-"
            }
        );
        let _ = writeln!(
            &mut result,
            "global domains: {}",
            self.enable_global_domains
        );
        result
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DomainDefaultsConfig {
    pub min_retention_days: i32,
    pub max_retention_days: i32,
}

impl Default for DomainDefaultsConfig {
    fn default() -> Self {
        Self {
            min_retention_days: 1,
            max_retention_days: 30,
        }
    }
}

pub fn make_config_loader() -> ConfigLoader<FrontendServiceConfig> {
    ConfigLoader::new(&PathBuf::from("config/frontend-service.toml"))
}

#[cfg(test)]
mod tests {
    use test_r::test;

    use super::*;

    #[test]
    pub fn config_is_loadable() {
        make_config_loader().load().expect("Failed to load config");
    }

    #[test]
    fn next_failover_version_is_strictly_increasing_and_owned() {
        let mut topology = ClusterTopologyConfig::default();
        topology.clusters.insert(
            "secondary".to_string(),
            ClusterConfig {
                enabled: true,
                initial_failover_version: 2,
                frontend: Default::default(),
            },
        );

        // initial version 0, increment 10
        let primary = ClusterName::from("primary");
        let secondary = ClusterName::from("secondary");

        assert_eq!(topology.next_failover_version(&primary, 0).unwrap(), 10);
        assert_eq!(topology.next_failover_version(&secondary, 0).unwrap(), 2);
        assert_eq!(topology.next_failover_version(&secondary, 2).unwrap(), 12);
        assert_eq!(topology.next_failover_version(&primary, 12).unwrap(), 20);

        for current in [0i64, 2, 7, 10, 99, 100] {
            for cluster in [&primary, &secondary] {
                let next = topology.next_failover_version(cluster, current).unwrap();
                assert!(next > current);
                assert_eq!(
                    next % topology.failover_version_increment,
                    topology.clusters[&cluster.0].initial_failover_version
                        % topology.failover_version_increment
                );
            }
        }
    }

    #[test]
    fn unknown_clusters_cannot_mint_failover_versions() {
        let topology = ClusterTopologyConfig::default();
        assert!(topology
            .next_failover_version(&ClusterName::from("nope"), 0)
            .is_err());
    }
}
