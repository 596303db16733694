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

use crate::config::{LimitsConfig, RateLimitsConfig};
use cascade_common::model::IndexedValueType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Typed getters over the settings an operator can change without a restart.
/// Getters with a `domain` parameter may resolve per-domain overrides.
pub trait DynamicConfig: Send + Sync {
    fn global_rps(&self) -> f64;
    fn global_domain_rps(&self, domain: &str) -> f64;
    fn max_domain_rps_per_instance(&self, domain: &str) -> f64;

    fn blob_size_warn_limit(&self, domain: &str) -> usize;
    fn blob_size_error_limit(&self, domain: &str) -> usize;

    fn history_max_page_size(&self, domain: &str) -> i32;
    fn visibility_max_page_size(&self, domain: &str) -> i32;

    /// When set for a domain, history reads return encoded blobs to clients
    /// that advertise raw-history support
    fn send_raw_workflow_history(&self, domain: &str) -> bool;

    fn disallow_query(&self, domain: &str) -> bool;

    fn max_bad_binaries(&self, domain: &str) -> usize;

    fn search_attributes_key_limit(&self, domain: &str) -> usize;
    fn search_attributes_value_size_limit(&self, domain: &str) -> usize;
    fn search_attributes_total_size_limit(&self, domain: &str) -> usize;

    fn valid_search_attributes(&self) -> HashMap<String, IndexedValueType>;

    /// Extends the whitelist; an existing key cannot be removed or retyped.
    fn add_search_attribute(
        &self,
        key: &str,
        value_type: IndexedValueType,
    ) -> Result<(), String>;
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DomainOverrides {
    pub global_domain_rps: Option<f64>,
    pub max_domain_rps_per_instance: Option<f64>,
    pub blob_size_warn_limit: Option<usize>,
    pub blob_size_error_limit: Option<usize>,
    pub send_raw_workflow_history: Option<bool>,
    pub disallow_query: Option<bool>,
}

/// Dynamic config backed by the static service configuration plus an
/// in-process override table. The search-attribute whitelist grows at
/// runtime through the admin surface.
pub struct ConfiguredDynamicConfig {
    limits: LimitsConfig,
    rate_limits: RateLimitsConfig,
    domain_overrides: HashMap<String, DomainOverrides>,
    search_attributes: RwLock<HashMap<String, IndexedValueType>>,
}

impl ConfiguredDynamicConfig {
    pub fn new(limits: LimitsConfig, rate_limits: RateLimitsConfig) -> Self {
        Self::with_overrides(limits, rate_limits, HashMap::new())
    }

    pub fn with_overrides(
        limits: LimitsConfig,
        rate_limits: RateLimitsConfig,
        domain_overrides: HashMap<String, DomainOverrides>,
    ) -> Self {
        let mut search_attributes = HashMap::new();
        for (key, value_type) in [
            ("WorkflowType", IndexedValueType::Keyword),
            ("WorkflowID", IndexedValueType::Keyword),
            ("RunID", IndexedValueType::Keyword),
            ("StartTime", IndexedValueType::Int),
            ("CloseTime", IndexedValueType::Int),
            ("CloseStatus", IndexedValueType::Int),
            ("CustomStringField", IndexedValueType::String),
            ("CustomKeywordField", IndexedValueType::Keyword),
            ("CustomIntField", IndexedValueType::Int),
            ("CustomDoubleField", IndexedValueType::Double),
            ("CustomBoolField", IndexedValueType::Bool),
            ("CustomDatetimeField", IndexedValueType::Datetime),
        ] {
            search_attributes.insert(key.to_string(), value_type);
        }

        Self {
            limits,
            rate_limits,
            domain_overrides,
            search_attributes: RwLock::new(search_attributes),
        }
    }

    fn overrides(&self, domain: &str) -> Option<&DomainOverrides> {
        self.domain_overrides.get(domain)
    }
}

impl DynamicConfig for ConfiguredDynamicConfig {
    fn global_rps(&self) -> f64 {
        self.rate_limits.global_rps
    }

    fn global_domain_rps(&self, domain: &str) -> f64 {
        self.overrides(domain)
            .and_then(|o| o.global_domain_rps)
            .unwrap_or(self.rate_limits.global_domain_rps)
    }

    fn max_domain_rps_per_instance(&self, domain: &str) -> f64 {
        self.overrides(domain)
            .and_then(|o| o.max_domain_rps_per_instance)
            .unwrap_or(self.rate_limits.max_domain_rps_per_instance)
    }

    fn blob_size_warn_limit(&self, domain: &str) -> usize {
        self.overrides(domain)
            .and_then(|o| o.blob_size_warn_limit)
            .unwrap_or(self.limits.blob_size_warn_limit)
    }

    fn blob_size_error_limit(&self, domain: &str) -> usize {
        self.overrides(domain)
            .and_then(|o| o.blob_size_error_limit)
            .unwrap_or(self.limits.blob_size_error_limit)
    }

    fn history_max_page_size(&self, _domain: &str) -> i32 {
        self.limits.history_max_page_size
    }

    fn visibility_max_page_size(&self, _domain: &str) -> i32 {
        self.limits.visibility_max_page_size
    }

    fn send_raw_workflow_history(&self, domain: &str) -> bool {
        self.overrides(domain)
            .and_then(|o| o.send_raw_workflow_history)
            .unwrap_or(false)
    }

    fn disallow_query(&self, domain: &str) -> bool {
        self.overrides(domain)
            .and_then(|o| o.disallow_query)
            .unwrap_or(false)
    }

    fn max_bad_binaries(&self, _domain: &str) -> usize {
        self.limits.max_bad_binaries
    }

    fn search_attributes_key_limit(&self, _domain: &str) -> usize {
        self.limits.search_attributes_key_limit
    }

    fn search_attributes_value_size_limit(&self, _domain: &str) -> usize {
        self.limits.search_attributes_value_size_limit
    }

    fn search_attributes_total_size_limit(&self, _domain: &str) -> usize {
        self.limits.search_attributes_total_size_limit
    }

    fn valid_search_attributes(&self) -> HashMap<String, IndexedValueType> {
        self.search_attributes.read().unwrap().clone()
    }

    fn add_search_attribute(
        &self,
        key: &str,
        value_type: IndexedValueType,
    ) -> Result<(), String> {
        let mut attributes = self.search_attributes.write().unwrap();
        match attributes.get(key) {
            Some(existing) if *existing == value_type => Ok(()),
            Some(existing) => Err(format!(
                "Search attribute {key} already exists with type {existing:?}"
            )),
            None => {
                attributes.insert(key.to_string(), value_type);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use test_r::test;

    use super::*;

    fn config() -> ConfiguredDynamicConfig {
        ConfiguredDynamicConfig::new(LimitsConfig::default(), RateLimitsConfig::default())
    }

    #[test]
    fn overrides_take_precedence_over_defaults() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "noisy".to_string(),
            DomainOverrides {
                global_domain_rps: Some(10.0),
                ..Default::default()
            },
        );
        let config = ConfiguredDynamicConfig::with_overrides(
            LimitsConfig::default(),
            RateLimitsConfig::default(),
            overrides,
        );

        assert_eq!(config.global_domain_rps("noisy"), 10.0);
        assert_eq!(
            config.global_domain_rps("other"),
            RateLimitsConfig::default().global_domain_rps
        );
    }

    #[test]
    fn search_attributes_cannot_be_retyped() {
        let config = config();
        config
            .add_search_attribute("Team", IndexedValueType::Keyword)
            .unwrap();
        // idempotent for the same type
        config
            .add_search_attribute("Team", IndexedValueType::Keyword)
            .unwrap();
        assert!(config
            .add_search_attribute("Team", IndexedValueType::Int)
            .is_err());
    }
}
