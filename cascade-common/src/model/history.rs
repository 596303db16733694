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

use poem_openapi::{Enum, Object};
use serde::{Deserialize, Serialize};

/// Event id of the first event of every run.
pub const FIRST_EVENT_ID: i64 = 1;
/// Placeholder for "no event".
pub const EMPTY_EVENT_ID: i64 = 0;
/// Upper sentinel; also used as the expected-next-event-id of a poll that
/// waits for workflow close.
pub const END_EVENT_ID: i64 = i64::MAX;
/// Placeholder for "no failover version".
pub const EMPTY_VERSION: i64 = -1;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Enum,
)]
pub enum EventType {
    WorkflowExecutionStarted,
    WorkflowExecutionCompleted,
    WorkflowExecutionFailed,
    WorkflowExecutionTimedOut,
    WorkflowExecutionTerminated,
    WorkflowExecutionCanceled,
    WorkflowExecutionContinuedAsNew,
    WorkflowExecutionCancelRequested,
    WorkflowExecutionSignaled,
    DecisionTaskScheduled,
    DecisionTaskStarted,
    DecisionTaskCompleted,
    DecisionTaskFailed,
    DecisionTaskTimedOut,
    ActivityTaskScheduled,
    ActivityTaskStarted,
    ActivityTaskCompleted,
    ActivityTaskFailed,
    ActivityTaskCanceled,
    ActivityTaskCancelRequested,
    ActivityTaskTimedOut,
    TimerStarted,
    TimerFired,
    TimerCanceled,
    MarkerRecorded,
    UpsertWorkflowSearchAttributes,
}

impl EventType {
    pub fn is_close_event(&self) -> bool {
        matches!(
            self,
            EventType::WorkflowExecutionCompleted
                | EventType::WorkflowExecutionFailed
                | EventType::WorkflowExecutionTimedOut
                | EventType::WorkflowExecutionTerminated
                | EventType::WorkflowExecutionCanceled
                | EventType::WorkflowExecutionContinuedAsNew
        )
    }
}

/// A single event of a run's append-only history. `timestamp` is absolute
/// nanoseconds; `version` is the failover version of the cluster that wrote
/// the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct HistoryEvent {
    pub event_id: i64,
    pub timestamp: i64,
    pub version: i64,
    pub event_type: EventType,
    pub attributes: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct History {
    pub events: Vec<HistoryEvent>,
}

/// The transient (not yet persisted) decision attempt of a run. Its
/// scheduled/started events are synthesized at read time and appended to the
/// last page only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct TransientDecisionInfo {
    pub scheduled_event: HistoryEvent,
    pub started_event: HistoryEvent,
}

/// A breakpoint of a run's lineage: all events up to and including
/// `event_id` were written with failover version `version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct VersionHistoryItem {
    pub event_id: i64,
    pub version: i64,
}

impl VersionHistoryItem {
    pub fn new(event_id: i64, version: i64) -> Self {
        Self { event_id, version }
    }
}

/// One branch of a run's history across failovers. Items are strictly
/// increasing in event id and non-decreasing in version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct VersionHistory {
    pub branch_token: Vec<u8>,
    pub items: Vec<VersionHistoryItem>,
}

impl VersionHistory {
    pub fn new(branch_token: Vec<u8>, items: Vec<VersionHistoryItem>) -> Self {
        Self {
            branch_token,
            items,
        }
    }

    pub fn first_item(&self) -> Result<VersionHistoryItem, String> {
        self.items
            .first()
            .copied()
            .ok_or_else(|| "version history is empty".to_string())
    }

    pub fn last_item(&self) -> Result<VersionHistoryItem, String> {
        self.items
            .last()
            .copied()
            .ok_or_else(|| "version history is empty".to_string())
    }

    pub fn last_event_id(&self) -> Result<i64, String> {
        Ok(self.last_item()?.event_id)
    }

    /// True when the given (event id, version) pair lies on this branch.
    pub fn contains_item(&self, item: &VersionHistoryItem) -> bool {
        let mut prev_event_id = EMPTY_EVENT_ID;
        for current in &self.items {
            if current.version == item.version {
                if item.event_id > prev_event_id && item.event_id <= current.event_id {
                    return true;
                }
            } else if current.version > item.version {
                return false;
            }
            prev_event_id = current.event_id;
        }
        false
    }

    /// Lowest common ancestor of this and another branch: scans both item
    /// lists backward; where the versions first match, the common prefix ends
    /// at the smaller of the two event ids.
    pub fn find_lca_item(&self, other: &VersionHistory) -> Result<VersionHistoryItem, String> {
        let mut local_index = self.items.len() as i64 - 1;
        let mut remote_index = other.items.len() as i64 - 1;

        while local_index >= 0 && remote_index >= 0 {
            let local = self.items[local_index as usize];
            let remote = other.items[remote_index as usize];
            if local.version == remote.version {
                return Ok(VersionHistoryItem::new(
                    local.event_id.min(remote.event_id),
                    local.version,
                ));
            }
            if local.version > remote.version {
                local_index -= 1;
            } else {
                remote_index -= 1;
            }
        }

        Err("version histories have no common ancestor".to_string())
    }
}

/// All branches of a run, with the index of the currently active one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object, Default)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct VersionHistories {
    pub current_version_history_index: i32,
    pub histories: Vec<VersionHistory>,
}

impl VersionHistories {
    pub fn new_single(history: VersionHistory) -> Self {
        Self {
            current_version_history_index: 0,
            histories: vec![history],
        }
    }

    pub fn current(&self) -> Result<&VersionHistory, String> {
        self.histories
            .get(self.current_version_history_index as usize)
            .ok_or_else(|| "current version history index out of range".to_string())
    }

    /// First branch (in index order) containing the item; index order makes
    /// the lookup deterministic when multiple branches share a prefix.
    pub fn find_first_containing(
        &self,
        item: &VersionHistoryItem,
    ) -> Option<(usize, &VersionHistory)> {
        self.histories
            .iter()
            .enumerate()
            .find(|(_, history)| history.contains_item(item))
    }
}

#[cfg(test)]
mod tests {
    use test_r::test;

    use super::*;

    fn history(items: &[(i64, i64)]) -> VersionHistory {
        VersionHistory::new(
            vec![],
            items
                .iter()
                .map(|(event_id, version)| VersionHistoryItem::new(*event_id, *version))
                .collect(),
        )
    }

    #[test]
    fn contains_item_respects_item_ranges() {
        let h = history(&[(10, 0), (20, 5)]);
        assert!(h.contains_item(&VersionHistoryItem::new(1, 0)));
        assert!(h.contains_item(&VersionHistoryItem::new(10, 0)));
        assert!(!h.contains_item(&VersionHistoryItem::new(11, 0)));
        assert!(h.contains_item(&VersionHistoryItem::new(11, 5)));
        assert!(h.contains_item(&VersionHistoryItem::new(20, 5)));
        assert!(!h.contains_item(&VersionHistoryItem::new(21, 5)));
        assert!(!h.contains_item(&VersionHistoryItem::new(5, 3)));
    }

    #[test]
    fn lca_is_the_minimum_event_of_the_first_matching_version() {
        let local = history(&[(10, 0), (20, 5), (30, 9)]);
        let remote = history(&[(10, 0), (25, 5), (40, 7)]);
        let lca = local.find_lca_item(&remote).unwrap();
        assert_eq!(lca, VersionHistoryItem::new(20, 5));
    }

    #[test]
    fn lca_is_deterministic_regardless_of_argument_order() {
        let a = history(&[(10, 0), (20, 5), (30, 9)]);
        let b = history(&[(10, 0), (25, 5), (40, 7)]);
        assert_eq!(a.find_lca_item(&b).unwrap(), b.find_lca_item(&a).unwrap());
    }

    #[test]
    fn disjoint_histories_have_no_lca() {
        let a = history(&[(10, 1)]);
        let b = history(&[(10, 2)]);
        assert!(a.find_lca_item(&b).is_err());
    }

    #[test]
    fn find_first_containing_prefers_the_lowest_index() {
        let histories = VersionHistories {
            current_version_history_index: 1,
            histories: vec![history(&[(10, 0)]), history(&[(10, 0), (20, 5)])],
        };
        let (index, _) = histories
            .find_first_containing(&VersionHistoryItem::new(5, 0))
            .unwrap();
        assert_eq!(index, 0);
    }
}
