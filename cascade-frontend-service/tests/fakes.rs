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

//! In-memory collaborators with just enough behavior to drive the frontend
//! end to end.

use cascade_common::model::history::{
    EventType, HistoryEvent, History, VersionHistories, VersionHistory, VersionHistoryItem,
};
use cascade_common::model::tokens::TaskToken;
use cascade_common::model::{
    ClusterName, DataBlob, DomainId, IndexedValueType, ReplicationMessages, ReplicationTask,
    RunId, TaskList, WorkflowExecution,
};
use cascade_frontend_service::clients::archival::{
    ArchivalError, GetArchivedHistoryRequest, GetArchivedHistoryResponse, HistoryArchiver,
    QueryArchivedVisibilityRequest, VisibilityArchiver,
};
use cascade_frontend_service::clients::history::{
    HistoryClient, HistoryClientError, PollMutableStateRequest, PollMutableStateResponse,
    ReadHistoryBranchRequest, ReadHistoryBranchResponse, ReadRawHistoryBranchResponse,
};
use cascade_frontend_service::clients::matching::{MatchingClient, MatchingClientError};
use cascade_frontend_service::clients::visibility::{VisibilityError, VisibilityManager};
use cascade_frontend_service::model::*;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

pub fn event(event_id: i64, event_type: EventType) -> HistoryEvent {
    HistoryEvent {
        event_id,
        timestamp: event_id * 1_000_000,
        version: 1,
        event_type,
        attributes: serde_json::json!({}),
    }
}

fn branch_token_of(workflow_id: &str) -> Vec<u8> {
    format!("branch-{workflow_id}").into_bytes()
}

struct FakeWorkflow {
    #[allow(dead_code)]
    domain_id: DomainId,
    run_id: RunId,
    events: Vec<HistoryEvent>,
    is_running: bool,
    version_histories: Option<VersionHistories>,
    branch_token: Vec<u8>,
}

impl FakeWorkflow {
    fn next_event_id(&self) -> i64 {
        self.events.last().map(|e| e.event_id + 1).unwrap_or(1)
    }

    fn state(&self) -> PollMutableStateResponse {
        let last_event_id = self.next_event_id() - 1;
        let version_histories = self.version_histories.clone().unwrap_or_else(|| {
            VersionHistories::new_single(VersionHistory::new(
                self.branch_token.clone(),
                vec![VersionHistoryItem::new(last_event_id.max(1), 1)],
            ))
        });
        PollMutableStateResponse {
            run_id: self.run_id.clone(),
            current_branch_token: self.branch_token.clone(),
            last_first_event_id: last_event_id.max(1),
            next_event_id: self.next_event_id(),
            is_workflow_running: self.is_running,
            version_histories,
        }
    }
}

#[derive(Default)]
struct HistoryState {
    workflows: HashMap<String, FakeWorkflow>,
    calls: Vec<String>,
    activity_failures: Vec<(String, usize)>,
    activity_completions: Vec<usize>,
    replicated: Vec<(RunId, DataBlob)>,
    replicate_errors: VecDeque<HistoryClientError>,
    dlq: Vec<ReplicationTask>,
}

/// History tier fake: workflows live in a map, histories are real event
/// vectors, mutable-state polls block on a notifier.
#[derive(Default)]
pub struct FakeHistoryClient {
    state: Mutex<HistoryState>,
    changed: Notify,
}

impl FakeHistoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| *call == name)
            .count()
    }

    pub fn activity_failures(&self) -> Vec<(String, usize)> {
        self.state.lock().unwrap().activity_failures.clone()
    }

    pub fn activity_completions(&self) -> Vec<usize> {
        self.state.lock().unwrap().activity_completions.clone()
    }

    pub fn replicated(&self) -> Vec<(RunId, DataBlob)> {
        self.state.lock().unwrap().replicated.clone()
    }

    pub fn push_replicate_error(&self, error: HistoryClientError) {
        self.state
            .lock()
            .unwrap()
            .replicate_errors
            .push_back(error);
    }

    pub fn seed_dlq(&self, tasks: Vec<ReplicationTask>) {
        self.state.lock().unwrap().dlq = tasks;
    }

    pub fn run_id_of(&self, workflow_id: &str) -> RunId {
        self.state.lock().unwrap().workflows[workflow_id]
            .run_id
            .clone()
    }

    /// Appends events to a running workflow and wakes up pollers.
    pub fn append_events(&self, workflow_id: &str, events: Vec<HistoryEvent>) {
        {
            let mut state = self.state.lock().unwrap();
            let workflow = state.workflows.get_mut(workflow_id).expect("workflow");
            workflow.events.extend(events);
        }
        self.changed.notify_waiters();
    }

    /// Closes the workflow with a completion event.
    pub fn complete_workflow(&self, workflow_id: &str) {
        {
            let mut state = self.state.lock().unwrap();
            let workflow = state.workflows.get_mut(workflow_id).expect("workflow");
            let close = event(
                workflow.next_event_id(),
                EventType::WorkflowExecutionCompleted,
            );
            workflow.events.push(close);
            workflow.is_running = false;
        }
        self.changed.notify_waiters();
    }

    pub fn seed_workflow(
        &self,
        domain_id: &DomainId,
        workflow_id: &str,
        events: Vec<HistoryEvent>,
        is_running: bool,
    ) -> RunId {
        let run_id = RunId::new_v4();
        self.state.lock().unwrap().workflows.insert(
            workflow_id.to_string(),
            FakeWorkflow {
                domain_id: domain_id.clone(),
                run_id: run_id.clone(),
                events,
                is_running,
                version_histories: None,
                branch_token: branch_token_of(workflow_id),
            },
        );
        run_id
    }

    fn record(&self, call: &str) {
        self.state.lock().unwrap().calls.push(call.to_string());
    }

    fn snapshot(&self, workflow_id: &str) -> Result<PollMutableStateResponse, HistoryClientError> {
        let state = self.state.lock().unwrap();
        state
            .workflows
            .get(workflow_id)
            .map(|workflow| workflow.state())
            .ok_or_else(|| {
                HistoryClientError::EntityNotFound(format!(
                    "workflow {workflow_id} does not exist"
                ))
            })
    }

    fn events_in_range(&self, workflow_id: &str, min: i64, max: i64) -> Vec<HistoryEvent> {
        let state = self.state.lock().unwrap();
        state
            .workflows
            .get(workflow_id)
            .map(|workflow| {
                workflow
                    .events
                    .iter()
                    .filter(|event| event.event_id >= min && event.event_id < max)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn offset_of(token: &[u8]) -> usize {
    if token.is_empty() {
        0
    } else {
        String::from_utf8_lossy(token).parse().unwrap_or(0)
    }
}

fn offset_token(offset: usize, total: usize) -> Vec<u8> {
    if offset < total {
        offset.to_string().into_bytes()
    } else {
        Vec::new()
    }
}

#[async_trait]
impl HistoryClient for FakeHistoryClient {
    async fn start_workflow_execution(
        &self,
        _shard_id: i32,
        domain_id: &DomainId,
        request: &StartWorkflowExecutionRequest,
    ) -> Result<RunId, HistoryClientError> {
        self.record("start_workflow_execution");
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.workflows.get(&request.workflow_id) {
            if existing.is_running {
                return Err(HistoryClientError::ExecutionAlreadyStarted {
                    start_request_id: request.request_id.clone(),
                    run_id: existing.run_id.clone(),
                });
            }
        }
        let run_id = RunId::new_v4();
        state.workflows.insert(
            request.workflow_id.clone(),
            FakeWorkflow {
                domain_id: domain_id.clone(),
                run_id: run_id.clone(),
                events: vec![event(1, EventType::WorkflowExecutionStarted)],
                is_running: true,
                version_histories: None,
                branch_token: branch_token_of(&request.workflow_id),
            },
        );
        Ok(run_id)
    }

    async fn signal_workflow_execution(
        &self,
        _shard_id: i32,
        _domain_id: &DomainId,
        request: &SignalWorkflowExecutionRequest,
    ) -> Result<(), HistoryClientError> {
        self.record("signal_workflow_execution");
        {
            let mut state = self.state.lock().unwrap();
            let workflow = state
                .workflows
                .get_mut(&request.workflow_execution.workflow_id)
                .ok_or_else(|| {
                    HistoryClientError::EntityNotFound("workflow does not exist".to_string())
                })?;
            let next = workflow.next_event_id();
            workflow
                .events
                .push(event(next, EventType::WorkflowExecutionSignaled));
        }
        self.changed.notify_waiters();
        Ok(())
    }

    async fn signal_with_start_workflow_execution(
        &self,
        shard_id: i32,
        domain_id: &DomainId,
        request: &SignalWithStartWorkflowExecutionRequest,
    ) -> Result<RunId, HistoryClientError> {
        self.record("signal_with_start_workflow_execution");
        let start = StartWorkflowExecutionRequest {
            domain: request.domain.clone(),
            workflow_id: request.workflow_id.clone(),
            workflow_type: request.workflow_type.clone(),
            task_list: request.task_list.clone(),
            input: request.input.clone(),
            execution_start_to_close_timeout_seconds: request
                .execution_start_to_close_timeout_seconds,
            task_start_to_close_timeout_seconds: request.task_start_to_close_timeout_seconds,
            identity: request.identity.clone(),
            request_id: request.request_id.clone().unwrap_or_default(),
            workflow_id_reuse_policy: request.workflow_id_reuse_policy,
            retry_policy: request.retry_policy.clone(),
            cron_schedule: request.cron_schedule.clone(),
            memo: request.memo.clone(),
            search_attributes: request.search_attributes.clone(),
            delay_start_seconds: request.delay_start_seconds,
        };
        match self
            .start_workflow_execution(shard_id, domain_id, &start)
            .await
        {
            Ok(run_id) => Ok(run_id),
            Err(HistoryClientError::ExecutionAlreadyStarted { run_id, .. }) => Ok(run_id),
            Err(other) => Err(other),
        }
    }

    async fn request_cancel_workflow_execution(
        &self,
        _shard_id: i32,
        _domain_id: &DomainId,
        _request: &RequestCancelWorkflowExecutionRequest,
    ) -> Result<(), HistoryClientError> {
        self.record("request_cancel_workflow_execution");
        Ok(())
    }

    async fn terminate_workflow_execution(
        &self,
        _shard_id: i32,
        _domain_id: &DomainId,
        request: &TerminateWorkflowExecutionRequest,
    ) -> Result<(), HistoryClientError> {
        self.record("terminate_workflow_execution");
        let mut state = self.state.lock().unwrap();
        if let Some(workflow) = state
            .workflows
            .get_mut(&request.workflow_execution.workflow_id)
        {
            let next = workflow.next_event_id();
            workflow
                .events
                .push(event(next, EventType::WorkflowExecutionTerminated));
            workflow.is_running = false;
        }
        drop(state);
        self.changed.notify_waiters();
        Ok(())
    }

    async fn reset_workflow_execution(
        &self,
        _shard_id: i32,
        _domain_id: &DomainId,
        request: &ResetWorkflowExecutionRequest,
    ) -> Result<RunId, HistoryClientError> {
        self.record("reset_workflow_execution");
        let mut state = self.state.lock().unwrap();
        let workflow = state
            .workflows
            .get_mut(&request.workflow_execution.workflow_id)
            .ok_or_else(|| {
                HistoryClientError::EntityNotFound("workflow does not exist".to_string())
            })?;
        let new_run_id = RunId::new_v4();
        workflow.run_id = new_run_id.clone();
        Ok(new_run_id)
    }

    async fn describe_workflow_execution(
        &self,
        _shard_id: i32,
        _domain_id: &DomainId,
        request: &DescribeWorkflowExecutionRequest,
    ) -> Result<DescribeWorkflowExecutionResponse, HistoryClientError> {
        self.record("describe_workflow_execution");
        let snapshot = self.snapshot(&request.execution.workflow_id)?;
        Ok(DescribeWorkflowExecutionResponse {
            workflow_execution_info: WorkflowExecutionInfo {
                execution: WorkflowExecution {
                    workflow_id: request.execution.workflow_id.clone(),
                    run_id: Some(snapshot.run_id),
                },
                workflow_type: WorkflowType {
                    name: "FakeWorkflow".to_string(),
                },
                start_time: None,
                close_time: None,
                close_status: None,
                history_length: snapshot.next_event_id - 1,
                search_attributes: None,
                memo: None,
                task_list: "fake".to_string(),
                is_cron: false,
            },
            pending_activity_count: 0,
            pending_children_count: 0,
        })
    }

    async fn query_workflow(
        &self,
        _shard_id: i32,
        _domain_id: &DomainId,
        _request: &QueryWorkflowRequest,
    ) -> Result<QueryWorkflowResponse, HistoryClientError> {
        self.record("query_workflow");
        Ok(QueryWorkflowResponse {
            query_result: Some(b"{}".to_vec()),
            query_rejected: None,
        })
    }

    async fn refresh_workflow_tasks(
        &self,
        _shard_id: i32,
        _domain_id: &DomainId,
        _execution: &WorkflowExecution,
    ) -> Result<(), HistoryClientError> {
        self.record("refresh_workflow_tasks");
        Ok(())
    }

    async fn respond_decision_task_completed(
        &self,
        _shard_id: i32,
        _token: &TaskToken,
        _decisions_blob_size: usize,
        _request_binary_checksum: Option<String>,
    ) -> Result<RespondDecisionTaskCompletedResponse, HistoryClientError> {
        self.record("respond_decision_task_completed");
        Ok(RespondDecisionTaskCompletedResponse::default())
    }

    async fn respond_decision_task_failed(
        &self,
        _shard_id: i32,
        _token: &TaskToken,
        _cause: Option<String>,
        _details: Option<Vec<u8>>,
    ) -> Result<(), HistoryClientError> {
        self.record("respond_decision_task_failed");
        Ok(())
    }

    async fn respond_activity_task_completed(
        &self,
        _shard_id: i32,
        _token: &TaskToken,
        result: Option<Vec<u8>>,
        _identity: Option<String>,
    ) -> Result<(), HistoryClientError> {
        self.record("respond_activity_task_completed");
        self.state
            .lock()
            .unwrap()
            .activity_completions
            .push(result.map(|r| r.len()).unwrap_or(0));
        Ok(())
    }

    async fn respond_activity_task_failed(
        &self,
        _shard_id: i32,
        _token: &TaskToken,
        reason: Option<String>,
        details: Option<Vec<u8>>,
        _identity: Option<String>,
    ) -> Result<(), HistoryClientError> {
        self.record("respond_activity_task_failed");
        self.state.lock().unwrap().activity_failures.push((
            reason.unwrap_or_default(),
            details.map(|d| d.len()).unwrap_or(0),
        ));
        Ok(())
    }

    async fn respond_activity_task_canceled(
        &self,
        _shard_id: i32,
        _token: &TaskToken,
        _details: Option<Vec<u8>>,
        _identity: Option<String>,
    ) -> Result<(), HistoryClientError> {
        self.record("respond_activity_task_canceled");
        Ok(())
    }

    async fn record_activity_task_heartbeat(
        &self,
        _shard_id: i32,
        _token: &TaskToken,
        _details: Option<Vec<u8>>,
        _identity: Option<String>,
    ) -> Result<RecordActivityTaskHeartbeatResponse, HistoryClientError> {
        self.record("record_activity_task_heartbeat");
        Ok(RecordActivityTaskHeartbeatResponse {
            cancel_requested: false,
        })
    }

    async fn resolve_activity_task(
        &self,
        _shard_id: i32,
        domain_id: &DomainId,
        workflow_id: &str,
        run_id: Option<&RunId>,
        activity_id: &str,
    ) -> Result<TaskToken, HistoryClientError> {
        self.record("resolve_activity_task");
        let snapshot = self.snapshot(workflow_id)?;
        Ok(TaskToken::new(
            domain_id.clone(),
            workflow_id.to_string(),
            run_id.cloned().unwrap_or(snapshot.run_id),
            5,
            1,
            activity_id.to_string(),
            "FakeActivity".to_string(),
        ))
    }

    async fn poll_mutable_state(
        &self,
        _shard_id: i32,
        request: &PollMutableStateRequest,
    ) -> Result<PollMutableStateResponse, HistoryClientError> {
        self.record("poll_mutable_state");
        let workflow_id = request.execution.workflow_id.clone();
        match request.expected_next_event_id {
            None => self.snapshot(&workflow_id),
            Some(expected) => loop {
                let notified = self.changed.notified();
                let snapshot = self.snapshot(&workflow_id)?;
                let satisfied = if expected == cascade_common::model::history::END_EVENT_ID {
                    !snapshot.is_workflow_running
                } else {
                    snapshot.next_event_id > expected || !snapshot.is_workflow_running
                };
                if satisfied {
                    break Ok(snapshot);
                }
                notified.await;
            },
        }
    }

    async fn read_history_branch(
        &self,
        _shard_id: i32,
        request: &ReadHistoryBranchRequest,
    ) -> Result<ReadHistoryBranchResponse, HistoryClientError> {
        self.record("read_history_branch");
        let workflow_id = {
            let state = self.state.lock().unwrap();
            state
                .workflows
                .iter()
                .find(|(_, workflow)| workflow.branch_token == request.branch_token)
                .map(|(id, _)| id.clone())
        };
        let Some(workflow_id) = workflow_id else {
            return Err(HistoryClientError::EntityNotFound(
                "no workflow for branch".to_string(),
            ));
        };

        let all = self.events_in_range(&workflow_id, request.min_event_id, request.max_event_id);
        let offset = offset_of(&request.next_page_token);
        let page: Vec<HistoryEvent> = all
            .iter()
            .skip(offset)
            .take(request.page_size.max(1) as usize)
            .cloned()
            .collect();
        let next = offset + page.len();
        let size = page.len() as i64 * 64;
        Ok(ReadHistoryBranchResponse {
            events: page,
            next_page_token: offset_token(next, all.len()),
            size,
        })
    }

    async fn read_raw_history_branch(
        &self,
        shard_id: i32,
        request: &ReadHistoryBranchRequest,
    ) -> Result<ReadRawHistoryBranchResponse, HistoryClientError> {
        let page = self.read_history_branch(shard_id, request).await?;
        let batches = if page.events.is_empty() {
            Vec::new()
        } else {
            vec![DataBlob::json(
                serde_json::to_vec(&History {
                    events: page.events,
                })
                .expect("serializable events"),
            )]
        };
        Ok(ReadRawHistoryBranchResponse {
            batches,
            next_page_token: page.next_page_token,
            size: page.size,
        })
    }

    async fn reapply_events(
        &self,
        _shard_id: i32,
        _domain_id: &DomainId,
        _execution: &WorkflowExecution,
        _events: DataBlob,
    ) -> Result<(), HistoryClientError> {
        self.record("reapply_events");
        Ok(())
    }

    async fn replicate_events_v2(
        &self,
        _shard_id: i32,
        _domain_id: &DomainId,
        _workflow_id: &str,
        run_id: &RunId,
        _version_history_items: Vec<VersionHistoryItem>,
        events: DataBlob,
    ) -> Result<(), HistoryClientError> {
        self.record("replicate_events_v2");
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.replicate_errors.pop_front() {
            return Err(error);
        }
        state.replicated.push((run_id.clone(), events));
        Ok(())
    }

    async fn read_dlq_messages(
        &self,
        _shard_id: i32,
        _source_cluster: &ClusterName,
        inclusive_end_message_id: Option<i64>,
        page_size: i32,
        _next_page_token: Option<Vec<u8>>,
    ) -> Result<(Vec<ReplicationTask>, Option<Vec<u8>>), HistoryClientError> {
        self.record("read_dlq_messages");
        let end = inclusive_end_message_id.unwrap_or(i64::MAX);
        let tasks: Vec<ReplicationTask> = self
            .state
            .lock()
            .unwrap()
            .dlq
            .iter()
            .filter(|task| task.message_id <= end)
            .take(page_size.max(0) as usize)
            .cloned()
            .collect();
        Ok((tasks, None))
    }

    async fn purge_dlq_messages(
        &self,
        _shard_id: i32,
        _source_cluster: &ClusterName,
        inclusive_end_message_id: Option<i64>,
    ) -> Result<(), HistoryClientError> {
        self.record("purge_dlq_messages");
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
        _shard_id: i32,
        _source_cluster: &ClusterName,
        inclusive_end_message_id: Option<i64>,
        _page_size: i32,
        _next_page_token: Option<Vec<u8>>,
    ) -> Result<Option<Vec<u8>>, HistoryClientError> {
        self.record("merge_dlq_messages");
        let end = inclusive_end_message_id.unwrap_or(i64::MAX);
        self.state
            .lock()
            .unwrap()
            .dlq
            .retain(|task| task.message_id > end);
        Ok(None)
    }

    async fn get_replication_messages(
        &self,
        _shard_id: i32,
        _cluster: &ClusterName,
        last_retrieved_message_id: i64,
    ) -> Result<ReplicationMessages, HistoryClientError> {
        self.record("get_replication_messages");
        Ok(ReplicationMessages {
            replication_tasks: Vec::new(),
            last_retrieved_message_id,
            has_more: false,
        })
    }

    async fn get_dlq_replication_messages(
        &self,
        _shard_id: i32,
        task_infos: &[ReplicationTaskInfo],
    ) -> Result<Vec<ReplicationTask>, HistoryClientError> {
        self.record("get_dlq_replication_messages");
        let ids: Vec<i64> = task_infos.iter().map(|info| info.task_id).collect();
        Ok(self
            .state
            .lock()
            .unwrap()
            .dlq
            .iter()
            .filter(|task| ids.contains(&task.message_id))
            .cloned()
            .collect())
    }
}

pub enum DecisionPollBehavior {
    /// Wait out the server-side long poll and return the no-task response
    Block,
    Respond(Box<PollForDecisionTaskResponse>),
    Fail(MatchingClientError),
}

#[derive(Default)]
struct MatchingState {
    decision_polls: VecDeque<DecisionPollBehavior>,
    canceled_polls: Vec<(Uuid, TaskListType, String)>,
    query_responses: Vec<RespondQueryTaskCompletedRequest>,
}

#[derive(Default)]
pub struct FakeMatchingClient {
    state: Mutex<MatchingState>,
    pub cancel_seen: Notify,
}

impl FakeMatchingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_decision_poll(&self, behavior: DecisionPollBehavior) {
        self.state.lock().unwrap().decision_polls.push_back(behavior);
    }

    pub fn canceled_polls(&self) -> Vec<(Uuid, TaskListType, String)> {
        self.state.lock().unwrap().canceled_polls.clone()
    }

    pub fn query_responses(&self) -> Vec<RespondQueryTaskCompletedRequest> {
        self.state.lock().unwrap().query_responses.clone()
    }
}

#[async_trait]
impl MatchingClient for FakeMatchingClient {
    async fn poll_for_decision_task(
        &self,
        _poller_id: Uuid,
        _domain_id: &DomainId,
        _request: &PollForDecisionTaskRequest,
        timeout: Duration,
    ) -> Result<PollForDecisionTaskResponse, MatchingClientError> {
        let behavior = self.state.lock().unwrap().decision_polls.pop_front();
        match behavior {
            Some(DecisionPollBehavior::Respond(response)) => Ok(*response),
            Some(DecisionPollBehavior::Fail(error)) => Err(error),
            Some(DecisionPollBehavior::Block) | None => {
                tokio::time::sleep(timeout).await;
                Ok(PollForDecisionTaskResponse::empty())
            }
        }
    }

    async fn poll_for_activity_task(
        &self,
        _poller_id: Uuid,
        _domain_id: &DomainId,
        _request: &PollForActivityTaskRequest,
        timeout: Duration,
    ) -> Result<PollForActivityTaskResponse, MatchingClientError> {
        tokio::time::sleep(timeout).await;
        Ok(PollForActivityTaskResponse::empty())
    }

    async fn respond_query_task_completed(
        &self,
        _domain_id: &DomainId,
        request: &RespondQueryTaskCompletedRequest,
    ) -> Result<(), MatchingClientError> {
        self.state
            .lock()
            .unwrap()
            .query_responses
            .push(request.clone());
        Ok(())
    }

    async fn describe_task_list(
        &self,
        _domain_id: &DomainId,
        _request: &DescribeTaskListRequest,
    ) -> Result<DescribeTaskListResponse, MatchingClientError> {
        Ok(DescribeTaskListResponse::default())
    }

    async fn list_task_list_partitions(
        &self,
        _domain_id: &DomainId,
        request: &ListTaskListPartitionsRequest,
    ) -> Result<ListTaskListPartitionsResponse, MatchingClientError> {
        let partition = TaskListPartitionMetadata {
            key: request.task_list.name.clone(),
            owner_host_name: Some("matching-0".to_string()),
        };
        Ok(ListTaskListPartitionsResponse {
            activity_task_list_partitions: vec![partition.clone()],
            decision_task_list_partitions: vec![partition],
        })
    }

    async fn cancel_outstanding_poll(
        &self,
        _domain_id: &DomainId,
        poller_id: Uuid,
        task_list_type: TaskListType,
        task_list: &TaskList,
    ) -> Result<(), MatchingClientError> {
        self.state.lock().unwrap().canceled_polls.push((
            poller_id,
            task_list_type,
            task_list.name.clone(),
        ));
        self.cancel_seen.notify_waiters();
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeVisibilityManager {
    pub added_attributes: Mutex<Vec<(String, IndexedValueType)>>,
}

#[async_trait]
impl VisibilityManager for FakeVisibilityManager {
    async fn list_open_workflow_executions(
        &self,
        _domain_id: &DomainId,
        _request: &ListOpenWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, VisibilityError> {
        Ok(ListWorkflowExecutionsResponse::default())
    }

    async fn list_closed_workflow_executions(
        &self,
        _domain_id: &DomainId,
        _request: &ListClosedWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, VisibilityError> {
        Ok(ListWorkflowExecutionsResponse::default())
    }

    async fn list_workflow_executions(
        &self,
        _domain_id: &DomainId,
        _request: &ListWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, VisibilityError> {
        Ok(ListWorkflowExecutionsResponse::default())
    }

    async fn scan_workflow_executions(
        &self,
        _domain_id: &DomainId,
        _request: &ListWorkflowExecutionsRequest,
    ) -> Result<ListWorkflowExecutionsResponse, VisibilityError> {
        Ok(ListWorkflowExecutionsResponse::default())
    }

    async fn count_workflow_executions(
        &self,
        _domain_id: &DomainId,
        _request: &CountWorkflowExecutionsRequest,
    ) -> Result<CountWorkflowExecutionsResponse, VisibilityError> {
        Ok(CountWorkflowExecutionsResponse { count: 0 })
    }

    async fn add_search_attribute(
        &self,
        key: &str,
        value_type: IndexedValueType,
    ) -> Result<(), VisibilityError> {
        self.added_attributes
            .lock()
            .unwrap()
            .push((key.to_string(), value_type));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeHistoryArchiver {
    pub batches: Mutex<HashMap<String, Vec<History>>>,
}

impl FakeHistoryArchiver {
    pub fn seed(&self, workflow_id: &str, batches: Vec<History>) {
        self.batches
            .lock()
            .unwrap()
            .insert(workflow_id.to_string(), batches);
    }
}

#[async_trait]
impl HistoryArchiver for FakeHistoryArchiver {
    async fn get(
        &self,
        _uri: &str,
        request: GetArchivedHistoryRequest,
    ) -> Result<GetArchivedHistoryResponse, ArchivalError> {
        let batches = self.batches.lock().unwrap();
        match batches.get(&request.workflow_id) {
            Some(history_batches) => Ok(GetArchivedHistoryResponse {
                history_batches: history_batches.clone(),
                next_page_token: None,
            }),
            None => Err(ArchivalError::NotFound(format!(
                "workflow {} is not archived",
                request.workflow_id
            ))),
        }
    }
}

#[derive(Default)]
pub struct FakeVisibilityArchiver;

#[async_trait]
impl VisibilityArchiver for FakeVisibilityArchiver {
    async fn query(
        &self,
        _uri: &str,
        _request: QueryArchivedVisibilityRequest,
    ) -> Result<ListWorkflowExecutionsResponse, ArchivalError> {
        Ok(ListWorkflowExecutionsResponse::default())
    }
}
