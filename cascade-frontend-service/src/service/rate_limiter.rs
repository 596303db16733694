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

use crate::clients::membership::MembershipMonitor;
use crate::dynamic_config::DynamicConfig;
use cascade_common::model::error::ServiceError;
use cascade_common::model::ServiceRole;
use lazy_static::lazy_static;
use prometheus::{register_counter_vec, CounterVec};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

lazy_static! {
    static ref RATE_LIMIT_THROTTLED_TOTAL: CounterVec = register_counter_vec!(
        "rate_limit_throttled_total",
        "Requests that exceeded a rate limit, by stage and admission mode",
        &["stage", "enforced"]
    )
    .unwrap();
}

const MICRO: i64 = 1_000_000;

/// Non-blocking token bucket with wait-free accounting: refill and take are
/// both CAS loops over atomics, no lock is held on the admission path.
pub struct TokenBucket {
    rate_bits: AtomicU64,
    burst_micro: AtomicI64,
    tokens_micro: AtomicI64,
    last_refill_micros: AtomicU64,
    epoch: Instant,
}

impl TokenBucket {
    pub fn new(rate_per_second: f64, burst: f64) -> Self {
        let burst_micro = (burst.max(1.0) * MICRO as f64) as i64;
        Self {
            rate_bits: AtomicU64::new(rate_per_second.to_bits()),
            burst_micro: AtomicI64::new(burst_micro),
            tokens_micro: AtomicI64::new(burst_micro),
            last_refill_micros: AtomicU64::new(0),
            epoch: Instant::now(),
        }
    }

    pub fn rate(&self) -> f64 {
        f64::from_bits(self.rate_bits.load(Ordering::Relaxed))
    }

    pub fn set_rate(&self, rate_per_second: f64, burst: f64) {
        self.rate_bits
            .store(rate_per_second.to_bits(), Ordering::Relaxed);
        self.burst_micro
            .store((burst.max(1.0) * MICRO as f64) as i64, Ordering::Relaxed);
    }

    fn refill(&self) {
        let now_micros = self.epoch.elapsed().as_micros() as u64;
        loop {
            let last = self.last_refill_micros.load(Ordering::Acquire);
            if now_micros <= last {
                return;
            }
            if self
                .last_refill_micros
                .compare_exchange(last, now_micros, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let elapsed_micros = (now_micros - last) as f64;
                let add_micro = (elapsed_micros * self.rate()) as i64;
                if add_micro > 0 {
                    let burst = self.burst_micro.load(Ordering::Relaxed);
                    let _ = self.tokens_micro.fetch_update(
                        Ordering::AcqRel,
                        Ordering::Acquire,
                        |tokens| Some((tokens + add_micro).min(burst)),
                    );
                }
                return;
            }
        }
    }

    pub fn try_acquire(&self) -> bool {
        self.refill();
        self.tokens_micro
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |tokens| {
                (tokens >= MICRO).then(|| tokens - MICRO)
            })
            .is_ok()
    }
}

/// How an operation participates in rate limiting. Response callbacks are
/// counted but never rejected; the work they report already happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Enforce,
    CountOnly,
}

/// Two nested token buckets: a per-process global bucket and one bucket per
/// domain whose rate tracks this instance's share of the domain's
/// fleet-wide budget.
pub struct RequestRateLimiter {
    global: TokenBucket,
    per_domain: RwLock<HashMap<String, Arc<TokenBucket>>>,
    dynamic_config: Arc<dyn DynamicConfig>,
    membership: Arc<dyn MembershipMonitor>,
    burst_ratio: f64,
}

impl RequestRateLimiter {
    pub fn new(
        dynamic_config: Arc<dyn DynamicConfig>,
        membership: Arc<dyn MembershipMonitor>,
        burst_ratio: f64,
    ) -> Self {
        let global_rps = dynamic_config.global_rps();
        Self {
            global: TokenBucket::new(global_rps, global_rps * burst_ratio),
            per_domain: RwLock::new(HashMap::new()),
            dynamic_config,
            membership,
            burst_ratio,
        }
    }

    /// This instance's share of a domain's budget:
    /// min(per-instance-cap, max(global-domain-rate / ring-size, 1)).
    /// Every frontend computes its share independently; during membership
    /// churn the admitted total can briefly overshoot, which is tolerated.
    pub fn domain_rate(&self, domain: &str) -> f64 {
        let ring_size = self.membership.ring_size(ServiceRole::Frontend).max(1) as f64;
        let shared = (self.dynamic_config.global_domain_rps(domain) / ring_size).max(1.0);
        self.dynamic_config
            .max_domain_rps_per_instance(domain)
            .min(shared)
    }

    pub fn allow(&self, domain: &str, admission: Admission) -> Result<(), ServiceError> {
        let domain_allowed = self.domain_bucket(domain).try_acquire();
        let global_allowed = self.global.try_acquire();

        if domain_allowed && global_allowed {
            return Ok(());
        }

        let stage = if domain_allowed { "global" } else { "domain" };
        match admission {
            Admission::CountOnly => {
                RATE_LIMIT_THROTTLED_TOTAL
                    .with_label_values(&[stage, "false"])
                    .inc();
                Ok(())
            }
            Admission::Enforce => {
                RATE_LIMIT_THROTTLED_TOTAL
                    .with_label_values(&[stage, "true"])
                    .inc();
                Err(ServiceError::service_busy(format!(
                    "Request rate over limit for domain {domain}"
                )))
            }
        }
    }

    fn domain_bucket(&self, domain: &str) -> Arc<TokenBucket> {
        let rate = self.domain_rate(domain);

        if let Some(bucket) = self.per_domain.read().unwrap().get(domain) {
            // ring size and dynamic config may have changed since creation
            if bucket.rate() != rate {
                bucket.set_rate(rate, rate * self.burst_ratio);
            }
            return bucket.clone();
        }

        let mut buckets = self.per_domain.write().unwrap();
        buckets
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(TokenBucket::new(rate, rate * self.burst_ratio)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use test_r::test;

    use super::*;
    use crate::clients::membership::StaticMembershipMonitor;
    use crate::config::{LimitsConfig, RateLimitsConfig};
    use crate::dynamic_config::ConfiguredDynamicConfig;
    use cascade_common::model::HostInfo;

    fn limiter(global_domain_rps: f64, per_instance_cap: f64, ring_size: usize) -> RequestRateLimiter {
        let rate_limits = RateLimitsConfig {
            global_rps: 10_000.0,
            global_domain_rps,
            max_domain_rps_per_instance: per_instance_cap,
            burst_ratio: 1.0,
        };
        let membership = Arc::new(StaticMembershipMonitor::new(HostInfo {
            identity: "frontend-0".to_string(),
        }));
        membership.set_members(
            ServiceRole::Frontend,
            (0..ring_size)
                .map(|i| HostInfo {
                    identity: format!("frontend-{i}"),
                })
                .collect(),
        );
        RequestRateLimiter::new(
            Arc::new(ConfiguredDynamicConfig::new(
                LimitsConfig::default(),
                rate_limits,
            )),
            membership,
            1.0,
        )
    }

    #[test]
    fn domain_rate_is_the_ring_share_capped_per_instance() {
        assert_eq!(limiter(100.0, 600.0, 2).domain_rate("d"), 50.0);
        assert_eq!(limiter(100.0, 30.0, 2).domain_rate("d"), 30.0);
        // floor of 1 rps regardless of ring size
        assert_eq!(limiter(2.0, 600.0, 64).domain_rate("d"), 1.0);
    }

    #[test]
    fn burst_is_admitted_then_requests_are_throttled() {
        let limiter = limiter(10.0, 10.0, 1);
        let mut admitted = 0;
        for _ in 0..100 {
            if limiter.allow("d", Admission::Enforce).is_ok() {
                admitted += 1;
            }
        }
        // burst ratio 1.0 => roughly one burst worth of tokens
        assert!(admitted >= 10);
        assert!(admitted <= 12);
    }

    #[test]
    fn callbacks_are_never_rejected() {
        let limiter = limiter(1.0, 1.0, 1);
        for _ in 0..100 {
            assert!(limiter.allow("d", Admission::CountOnly).is_ok());
        }
    }

    #[test]
    fn rate_follows_ring_size_changes() {
        let rate_limits = RateLimitsConfig {
            global_rps: 10_000.0,
            global_domain_rps: 100.0,
            max_domain_rps_per_instance: 600.0,
            burst_ratio: 1.0,
        };
        let membership = Arc::new(StaticMembershipMonitor::new(HostInfo {
            identity: "frontend-0".to_string(),
        }));
        let limiter = RequestRateLimiter::new(
            Arc::new(ConfiguredDynamicConfig::new(
                LimitsConfig::default(),
                rate_limits,
            )),
            membership.clone(),
            1.0,
        );

        assert_eq!(limiter.domain_rate("d"), 100.0);
        let _ = limiter.allow("d", Admission::Enforce);

        membership.set_members(
            ServiceRole::Frontend,
            vec![
                HostInfo {
                    identity: "frontend-0".to_string(),
                },
                HostInfo {
                    identity: "frontend-1".to_string(),
                },
            ],
        );
        let _ = limiter.allow("d", Admission::Enforce);
        assert_eq!(
            limiter
                .per_domain
                .read()
                .unwrap()
                .get("d")
                .unwrap()
                .rate(),
            50.0
        );
    }
}
