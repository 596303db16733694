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

use crate::config::LimitsConfig;
use crate::dynamic_config::DynamicConfig;
use crate::model::SearchAttributes;
use cascade_common::model::error::ServiceError;
use cascade_common::model::{TaskList, TaskListKind};
use lazy_static::lazy_static;
use prometheus::{register_counter_vec, CounterVec};
use std::sync::Arc;
use tracing::warn;

lazy_static! {
    static ref BLOB_SIZE_WARN_TOTAL: CounterVec = register_counter_vec!(
        "blob_size_warn_total",
        "Payloads above the warn threshold, by operation",
        &["operation", "domain"]
    )
    .unwrap();
}

/// Outcome of a payload size check against the two thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeCheck {
    Ok,
    /// Above the warn threshold; a metric and log were emitted
    Warn,
    /// Above the error threshold; the operation's over-limit rule applies
    Error,
}

pub struct RequestValidator {
    limits: LimitsConfig,
    dynamic_config: Arc<dyn DynamicConfig>,
}

impl RequestValidator {
    pub fn new(limits: LimitsConfig, dynamic_config: Arc<dyn DynamicConfig>) -> Self {
        Self {
            limits,
            dynamic_config,
        }
    }

    pub fn error_limit(&self, domain: &str) -> usize {
        self.dynamic_config.blob_size_error_limit(domain)
    }

    pub fn validate_domain_name(&self, name: &str) -> Result<(), ServiceError> {
        if name.is_empty() {
            return Err(ServiceError::bad_request("Domain is not set on request"));
        }
        if name.len() > self.limits.max_domain_name_length {
            return Err(ServiceError::bad_request("Domain name exceeds length limit"));
        }
        Ok(())
    }

    /// Required string identifier: non-empty and within the id length cap.
    pub fn validate_id(&self, field: &str, value: &str) -> Result<(), ServiceError> {
        if value.is_empty() {
            return Err(ServiceError::BadRequest(format!(
                "{field} is not set on request"
            )));
        }
        if value.len() > self.limits.max_id_length {
            return Err(ServiceError::BadRequest(format!(
                "{field} exceeds length limit"
            )));
        }
        Ok(())
    }

    pub fn validate_optional_id(
        &self,
        field: &str,
        value: Option<&String>,
    ) -> Result<(), ServiceError> {
        match value {
            Some(value) if value.len() > self.limits.max_id_length => Err(
                ServiceError::BadRequest(format!("{field} exceeds length limit")),
            ),
            _ => Ok(()),
        }
    }

    pub fn validate_task_list(&self, task_list: &TaskList) -> Result<(), ServiceError> {
        self.validate_id("TaskList", &task_list.name)?;
        // sticky names encode worker affinity and may exceed the raw cap
        if task_list.kind != TaskListKind::Sticky
            && task_list.name.len() > self.limits.max_raw_task_list_name_length
        {
            return Err(ServiceError::bad_request(
                "TaskList name exceeds length limit",
            ));
        }
        Ok(())
    }

    pub fn validate_positive(&self, field: &str, value: i32) -> Result<(), ServiceError> {
        if value <= 0 {
            return Err(ServiceError::BadRequest(format!(
                "A valid {field} is not set on request"
            )));
        }
        Ok(())
    }

    /// The identity field is informational; over-long values are only
    /// logged. Some call paths run this again after dispatch, which is
    /// intentionally preserved as a no-op re-check.
    pub fn validate_identity_soft(&self, operation: &str, identity: Option<&String>) {
        if let Some(identity) = identity {
            if identity.len() > self.limits.max_id_length {
                warn!(operation, "Identity exceeds length limit");
            }
        }
    }

    pub fn check_payload_size(
        &self,
        operation: &'static str,
        domain: &str,
        payload: Option<&Vec<u8>>,
    ) -> SizeCheck {
        self.check_size(operation, domain, payload.map(|p| p.len()).unwrap_or(0))
    }

    pub fn check_size(&self, operation: &'static str, domain: &str, size: usize) -> SizeCheck {
        if size > self.dynamic_config.blob_size_error_limit(domain) {
            warn!(operation, domain, size, "Payload exceeds the error limit");
            SizeCheck::Error
        } else if size > self.dynamic_config.blob_size_warn_limit(domain) {
            BLOB_SIZE_WARN_TOTAL
                .with_label_values(&[operation, domain])
                .inc();
            warn!(operation, domain, size, "Payload exceeds the warn limit");
            SizeCheck::Warn
        } else {
            SizeCheck::Ok
        }
    }

    pub fn validate_search_attributes(
        &self,
        domain: &str,
        attributes: &SearchAttributes,
    ) -> Result<(), ServiceError> {
        let whitelist = self.dynamic_config.valid_search_attributes();
        let fields = &attributes.indexed_fields;

        if fields.len() > self.dynamic_config.search_attributes_key_limit(domain) {
            return Err(ServiceError::bad_request(
                "Number of search attribute keys exceeds limit",
            ));
        }

        let mut total_size = 0;
        for (key, value) in fields {
            if !whitelist.contains_key(key) {
                return Err(ServiceError::BadRequest(format!(
                    "Search attribute {key} is not registered"
                )));
            }
            if value.len() > self.dynamic_config.search_attributes_value_size_limit(domain) {
                return Err(ServiceError::BadRequest(format!(
                    "Value of search attribute {key} exceeds size limit"
                )));
            }
            total_size += key.len() + value.len();
        }

        if total_size > self.dynamic_config.search_attributes_total_size_limit(domain) {
            return Err(ServiceError::bad_request(
                "Total size of search attributes exceeds limit",
            ));
        }
        Ok(())
    }
}

/// Truncates in place to the error threshold; used by the callback paths
/// that accept over-limit payloads instead of failing them.
pub fn truncate_payload(payload: &mut Option<Vec<u8>>, limit: usize) {
    if let Some(bytes) = payload {
        if bytes.len() > limit {
            bytes.truncate(limit);
        }
    }
}

#[cfg(test)]
mod tests {
    use test_r::test;

    use super::*;
    use crate::config::RateLimitsConfig;
    use crate::dynamic_config::ConfiguredDynamicConfig;
    use std::collections::HashMap;

    fn validator() -> RequestValidator {
        let limits = LimitsConfig {
            max_id_length: 10,
            max_raw_task_list_name_length: 12,
            blob_size_warn_limit: 5,
            blob_size_error_limit: 8,
            ..LimitsConfig::default()
        };
        RequestValidator::new(
            limits.clone(),
            Arc::new(ConfiguredDynamicConfig::new(
                limits,
                RateLimitsConfig::default(),
            )),
        )
    }

    #[test]
    fn ids_must_be_present_and_bounded() {
        let v = validator();
        assert!(v.validate_id("WorkflowId", "w1").is_ok());
        assert!(v.validate_id("WorkflowId", "").is_err());
        assert!(v.validate_id("WorkflowId", "12345678901").is_err());
    }

    #[test]
    fn sticky_task_lists_bypass_the_raw_name_cap() {
        let v = RequestValidator::new(
            LimitsConfig {
                max_id_length: 100,
                max_raw_task_list_name_length: 5,
                ..LimitsConfig::default()
            },
            Arc::new(ConfiguredDynamicConfig::new(
                LimitsConfig::default(),
                RateLimitsConfig::default(),
            )),
        );
        let long_name = "sticky-worker-cache-1".to_string();
        assert!(v
            .validate_task_list(&TaskList {
                name: long_name.clone(),
                kind: TaskListKind::Normal,
            })
            .is_err());
        assert!(v
            .validate_task_list(&TaskList {
                name: long_name,
                kind: TaskListKind::Sticky,
            })
            .is_ok());
    }

    #[test]
    fn size_check_classifies_against_both_thresholds() {
        let v = validator();
        assert_eq!(v.check_size("op", "d", 5), SizeCheck::Ok);
        assert_eq!(v.check_size("op", "d", 6), SizeCheck::Warn);
        assert_eq!(v.check_size("op", "d", 8), SizeCheck::Warn);
        assert_eq!(v.check_size("op", "d", 9), SizeCheck::Error);
    }

    #[test]
    fn unregistered_search_attributes_are_rejected() {
        let v = validator();
        let mut fields = HashMap::new();
        fields.insert("NotRegistered".to_string(), vec![1u8]);
        assert!(v
            .validate_search_attributes("d", &SearchAttributes { indexed_fields: fields })
            .is_err());

        let mut fields = HashMap::new();
        fields.insert("CustomStringField".to_string(), vec![1u8]);
        assert!(v
            .validate_search_attributes("d", &SearchAttributes { indexed_fields: fields })
            .is_ok());
    }

    #[test]
    fn truncation_caps_payloads_at_the_limit() {
        let mut payload = Some(vec![0u8; 100]);
        truncate_payload(&mut payload, 8);
        assert_eq!(payload.unwrap().len(), 8);
    }
}
