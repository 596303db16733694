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

use cascade_common::model::{
    ClusterName, ReplicationMessages, ReplicationTask, ReplicationTaskAttributes,
};
use cascade_common::SafeDisplay;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReplicationQueueError {
    #[error("Replication queue unavailable: {0}")]
    Unavailable(String),
    #[error("Internal replication queue error: {0}")]
    Internal(String),
}

impl ReplicationQueueError {
    pub fn is_retriable(error: &ReplicationQueueError) -> bool {
        matches!(error, ReplicationQueueError::Unavailable(_))
    }
}

impl SafeDisplay for ReplicationQueueError {
    fn to_safe_string(&self) -> String {
        self.to_string()
    }
}

/// The durable per-cluster queue carrying domain replication messages, with
/// per-consumer ack levels and a cluster-wide DLQ.
#[async_trait]
pub trait ReplicationQueue: Send + Sync {
    async fn publish(
        &self,
        attributes: ReplicationTaskAttributes,
    ) -> Result<(), ReplicationQueueError>;

    /// `last_retrieved_message_id` paginates, `last_processed_message_id`
    /// advances the consumer's ack level; keeping them separate lets a
    /// consumer prefetch without acking.
    async fn get_replication_messages(
        &self,
        consumer: &ClusterName,
        last_retrieved_message_id: i64,
        last_processed_message_id: i64,
        page_size: i32,
    ) -> Result<ReplicationMessages, ReplicationQueueError>;

    async fn publish_to_dlq(
        &self,
        task: ReplicationTask,
    ) -> Result<(), ReplicationQueueError>;

    async fn read_dlq_messages(
        &self,
        inclusive_end_message_id: Option<i64>,
        page_size: i32,
        next_page_token: Option<Vec<u8>>,
    ) -> Result<(Vec<ReplicationTask>, Option<Vec<u8>>), ReplicationQueueError>;

    async fn purge_dlq_messages(
        &self,
        inclusive_end_message_id: Option<i64>,
    ) -> Result<(), ReplicationQueueError>;

    /// Re-enqueues DLQ messages up to the given id onto the main queue and
    /// deletes them from the DLQ.
    async fn merge_dlq_messages(
        &self,
        inclusive_end_message_id: Option<i64>,
        page_size: i32,
        next_page_token: Option<Vec<u8>>,
    ) -> Result<Option<Vec<u8>>, ReplicationQueueError>;
}

#[derive(Default)]
struct QueueState {
    next_message_id: i64,
    messages: Vec<ReplicationTask>,
    dlq: Vec<ReplicationTask>,
    ack_levels: HashMap<ClusterName, i64>,
}

/// Queue implementation backed by process memory. Used by tests and by
/// single-cluster deployments where nothing consumes the messages.
#[derive(Default)]
pub struct InMemoryReplicationQueue {
    state: Mutex<QueueState>,
}

impl InMemoryReplicationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ack_level(&self, consumer: &ClusterName) -> i64 {
        self.state
            .lock()
            .unwrap()
            .ack_levels
            .get(consumer)
            .copied()
            .unwrap_or(-1)
    }

    pub fn published_count(&self) -> usize {
        self.state.lock().unwrap().messages.len()
    }
}

#[async_trait]
impl ReplicationQueue for InMemoryReplicationQueue {
    async fn publish(
        &self,
        attributes: ReplicationTaskAttributes,
    ) -> Result<(), ReplicationQueueError> {
        let mut state = self.state.lock().unwrap();
        let message_id = state.next_message_id;
        state.next_message_id += 1;
        state.messages.push(ReplicationTask {
            message_id,
            attributes,
        });
        Ok(())
    }

    async fn get_replication_messages(
        &self,
        consumer: &ClusterName,
        last_retrieved_message_id: i64,
        last_processed_message_id: i64,
        page_size: i32,
    ) -> Result<ReplicationMessages, ReplicationQueueError> {
        let mut state = self.state.lock().unwrap();

        let previous_ack = state
            .ack_levels
            .get(consumer)
            .copied()
            .unwrap_or(-1);
        if last_processed_message_id > previous_ack {
            state
                .ack_levels
                .insert(consumer.clone(), last_processed_message_id);
        }

        let tasks: Vec<ReplicationTask> = state
            .messages
            .iter()
            .filter(|task| task.message_id > last_retrieved_message_id)
            .take(page_size.max(0) as usize)
            .cloned()
            .collect();

        let last_retrieved = tasks
            .last()
            .map(|task| task.message_id)
            .unwrap_or(last_retrieved_message_id);
        let has_more = state
            .messages
            .iter()
            .any(|task| task.message_id > last_retrieved);

        Ok(ReplicationMessages {
            replication_tasks: tasks,
            last_retrieved_message_id: last_retrieved,
            has_more,
        })
    }

    async fn publish_to_dlq(
        &self,
        task: ReplicationTask,
    ) -> Result<(), ReplicationQueueError> {
        self.state.lock().unwrap().dlq.push(task);
        Ok(())
    }

    async fn read_dlq_messages(
        &self,
        inclusive_end_message_id: Option<i64>,
        page_size: i32,
        next_page_token: Option<Vec<u8>>,
    ) -> Result<(Vec<ReplicationTask>, Option<Vec<u8>>), ReplicationQueueError> {
        let state = self.state.lock().unwrap();
        let start = decode_offset(next_page_token)?;
        let end = inclusive_end_message_id.unwrap_or(i64::MAX);

        let matching: Vec<&ReplicationTask> = state
            .dlq
            .iter()
            .filter(|task| task.message_id <= end)
            .collect();
        let page: Vec<ReplicationTask> = matching
            .iter()
            .skip(start)
            .take(page_size.max(0) as usize)
            .map(|task| (*task).clone())
            .collect();

        let next = start + page.len();
        let token = (next < matching.len()).then(|| encode_offset(next));
        Ok((page, token))
    }

    async fn purge_dlq_messages(
        &self,
        inclusive_end_message_id: Option<i64>,
    ) -> Result<(), ReplicationQueueError> {
        let end = inclusive_end_message_id.unwrap_or(i64::MAX);
        self.state
            .lock()
            .unwrap()
            .dlq
            .retain(|task| task.message_id > end);
        Ok(())
    }

    async fn merge_dlq_messages(
        &self,
        inclusive_end_message_id: Option<i64>,
        page_size: i32,
        next_page_token: Option<Vec<u8>>,
    ) -> Result<Option<Vec<u8>>, ReplicationQueueError> {
        let end = inclusive_end_message_id.unwrap_or(i64::MAX);
        let start = decode_offset(next_page_token)?;
        let mut state = self.state.lock().unwrap();

        let matching: Vec<ReplicationTask> = state
            .dlq
            .iter()
            .filter(|task| task.message_id <= end)
            .cloned()
            .collect();
        let page: Vec<ReplicationTask> = matching
            .iter()
            .skip(start)
            .take(page_size.max(0) as usize)
            .cloned()
            .collect();

        for task in &page {
            let message_id = state.next_message_id;
            state.next_message_id += 1;
            state.messages.push(ReplicationTask {
                message_id,
                attributes: task.attributes.clone(),
            });
        }
        let merged_ids: Vec<i64> = page.iter().map(|task| task.message_id).collect();
        state.dlq.retain(|task| !merged_ids.contains(&task.message_id));

        let next = start + page.len();
        Ok((next < matching.len()).then(|| encode_offset(next)))
    }
}

fn encode_offset(offset: usize) -> Vec<u8> {
    offset.to_string().into_bytes()
}

fn decode_offset(token: Option<Vec<u8>>) -> Result<usize, ReplicationQueueError> {
    match token {
        None => Ok(0),
        Some(bytes) => String::from_utf8(bytes)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ReplicationQueueError::Internal("malformed page token".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use test_r::test;

    use super::*;
    use cascade_common::model::{DomainOperation, DomainTaskAttributes};

    fn domain_attributes() -> ReplicationTaskAttributes {
        ReplicationTaskAttributes::Domain(DomainTaskAttributes {
            operation: DomainOperation::Create,
            domain: crate::testing::sample_domain("replicated", true),
        })
    }

    #[test]
    async fn message_ids_are_strictly_increasing() {
        let queue = InMemoryReplicationQueue::new();
        for _ in 0..5 {
            queue.publish(domain_attributes()).await.unwrap();
        }
        let messages = queue
            .get_replication_messages(&ClusterName::from("B"), -1, -1, 10)
            .await
            .unwrap();
        let ids: Vec<i64> = messages
            .replication_tasks
            .iter()
            .map(|task| task.message_id)
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert!(!messages.has_more);
    }

    #[test]
    async fn prefetch_does_not_advance_the_ack_level() {
        let queue = InMemoryReplicationQueue::new();
        for _ in 0..3 {
            queue.publish(domain_attributes()).await.unwrap();
        }
        let consumer = ClusterName::from("B");

        // retrieve everything, process nothing
        let messages = queue
            .get_replication_messages(&consumer, 2, -1, 10)
            .await
            .unwrap();
        assert!(messages.replication_tasks.is_empty());
        assert_eq!(queue.ack_level(&consumer), -1);

        // now ack up to 1
        queue
            .get_replication_messages(&consumer, 2, 1, 10)
            .await
            .unwrap();
        assert_eq!(queue.ack_level(&consumer), 1);
    }

    #[test]
    async fn merge_moves_dlq_messages_back_to_the_queue() {
        let queue = InMemoryReplicationQueue::new();
        queue
            .publish_to_dlq(ReplicationTask {
                message_id: 7,
                attributes: domain_attributes(),
            })
            .await
            .unwrap();

        let token = queue.merge_dlq_messages(None, 10, None).await.unwrap();
        assert!(token.is_none());

        let (remaining, _) = queue.read_dlq_messages(None, 10, None).await.unwrap();
        assert!(remaining.is_empty());
        assert_eq!(queue.published_count(), 1);
    }
}
