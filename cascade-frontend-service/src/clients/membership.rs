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

use cascade_common::model::{HostInfo, ServiceRole};
use std::collections::HashMap;
use std::sync::RwLock;

/// View of the cluster membership rings as maintained by the gossip layer.
/// The frontend only consumes it: ring sizes feed the per-domain rate
/// computation and the admin describe-cluster walk.
pub trait MembershipMonitor: Send + Sync {
    fn current_host(&self) -> HostInfo;
    fn members(&self, role: ServiceRole) -> Vec<HostInfo>;

    fn ring_size(&self, role: ServiceRole) -> usize {
        self.members(role).len()
    }
}

/// Membership from static configuration; suitable for tests and deployments
/// without gossip.
pub struct StaticMembershipMonitor {
    current: HostInfo,
    rings: RwLock<HashMap<ServiceRole, Vec<HostInfo>>>,
}

impl StaticMembershipMonitor {
    pub fn new(current: HostInfo) -> Self {
        let mut rings = HashMap::new();
        for role in [
            ServiceRole::Frontend,
            ServiceRole::History,
            ServiceRole::Matching,
            ServiceRole::Worker,
        ] {
            rings.insert(role, vec![current.clone()]);
        }
        Self {
            current,
            rings: RwLock::new(rings),
        }
    }

    pub fn set_members(&self, role: ServiceRole, members: Vec<HostInfo>) {
        self.rings.write().unwrap().insert(role, members);
    }
}

impl MembershipMonitor for StaticMembershipMonitor {
    fn current_host(&self) -> HostInfo {
        self.current.clone()
    }

    fn members(&self, role: ServiceRole) -> Vec<HostInfo> {
        self.rings
            .read()
            .unwrap()
            .get(&role)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use test_r::test;

    use super::*;

    #[test]
    fn ring_size_follows_membership() {
        let monitor = StaticMembershipMonitor::new(HostInfo {
            identity: "frontend-0".to_string(),
        });
        assert_eq!(monitor.ring_size(ServiceRole::Frontend), 1);

        monitor.set_members(
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
        assert_eq!(monitor.ring_size(ServiceRole::Frontend), 2);
    }
}
