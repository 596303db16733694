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

use crate::model::history::{TransientDecisionInfo, VersionHistories};
use crate::model::{DomainId, RunId};
use crate::SafeDisplay;
use base64::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Serialization version stamped into every token; decoding rejects anything
/// newer than what this build understands.
pub const TOKEN_VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TokenError {
    #[error("Malformed token: {0}")]
    Malformed(String),
    #[error("Unsupported token version {got}, supported up to {supported}")]
    UnsupportedVersion { got: u16, supported: u16 },
}

impl SafeDisplay for TokenError {
    fn to_safe_string(&self) -> String {
        self.to_string()
    }
}

impl From<TokenError> for crate::model::error::ServiceError {
    fn from(value: TokenError) -> Self {
        crate::model::error::ServiceError::BadRequest(value.to_string())
    }
}

fn version_of(bytes: &[u8]) -> Result<u16, TokenError> {
    #[derive(Deserialize)]
    struct VersionOnly {
        version: u16,
    }
    let version: VersionOnly = serde_json::from_slice(bytes)
        .map_err(|err| TokenError::Malformed(err.to_string()))?;
    Ok(version.version)
}

fn encode_token<T: Serialize>(token: &T) -> Result<Vec<u8>, TokenError> {
    serde_json::to_vec(token).map_err(|err| TokenError::Malformed(err.to_string()))
}

fn decode_token<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, TokenError> {
    let version = version_of(bytes)?;
    if version > TOKEN_VERSION {
        return Err(TokenError::UnsupportedVersion {
            got: version,
            supported: TOKEN_VERSION,
        });
    }
    serde_json::from_slice(bytes).map_err(|err| TokenError::Malformed(err.to_string()))
}

pub fn to_wire(bytes: &[u8]) -> String {
    BASE64_STANDARD.encode(bytes)
}

pub fn from_wire(encoded: &str) -> Result<Vec<u8>, TokenError> {
    BASE64_STANDARD
        .decode(encoded)
        .map_err(|err| TokenError::Malformed(err.to_string()))
}

/// Identifies a single activity or decision attempt handed to a worker. It
/// is returned to the worker as opaque bytes and echoed back on the respond
/// calls. The embedded domain id is a routing hint only and is re-validated
/// against the domain cache; it must not be trusted for authorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskToken {
    version: u16,
    pub domain_id: DomainId,
    pub workflow_id: String,
    pub run_id: RunId,
    pub schedule_id: i64,
    pub schedule_attempt: i64,
    pub activity_id: String,
    pub activity_type: String,
}

impl TaskToken {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        domain_id: DomainId,
        workflow_id: String,
        run_id: RunId,
        schedule_id: i64,
        schedule_attempt: i64,
        activity_id: String,
        activity_type: String,
    ) -> Self {
        Self {
            version: TOKEN_VERSION,
            domain_id,
            workflow_id,
            run_id,
            schedule_id,
            schedule_attempt,
            activity_id,
            activity_type,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, TokenError> {
        encode_token(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TokenError> {
        decode_token(bytes)
    }
}

/// Resume point of a paged `get_workflow_execution_history` read. The echoed
/// (run id, first event id, next event id) triple must match the request on
/// every page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryContinuationToken {
    version: u16,
    pub run_id: RunId,
    pub first_event_id: i64,
    pub next_event_id: i64,
    pub is_workflow_running: bool,
    pub persistence_token: Vec<u8>,
    pub transient_decision: Option<TransientDecisionInfo>,
    pub branch_token: Vec<u8>,
    /// Set once the read switched to the archival store; carries the
    /// archiver's own cursor
    #[serde(default)]
    pub archival_token: Option<Vec<u8>>,
}

impl HistoryContinuationToken {
    pub fn new(
        run_id: RunId,
        first_event_id: i64,
        next_event_id: i64,
        is_workflow_running: bool,
        persistence_token: Vec<u8>,
        transient_decision: Option<TransientDecisionInfo>,
        branch_token: Vec<u8>,
    ) -> Self {
        Self {
            version: TOKEN_VERSION,
            run_id,
            first_event_id,
            next_event_id,
            is_workflow_running,
            persistence_token,
            transient_decision,
            branch_token,
            archival_token: None,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, TokenError> {
        encode_token(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TokenError> {
        decode_token(bytes)
    }
}

/// Resume point of an admin raw-history read over a specific version history
/// branch. All identifying fields must match the request field for field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawHistoryContinuationToken {
    version: u16,
    pub domain_name: String,
    pub workflow_id: String,
    pub run_id: RunId,
    pub start_event_id: i64,
    pub start_event_version: i64,
    pub end_event_id: i64,
    pub end_event_version: i64,
    pub persistence_token: Vec<u8>,
    pub version_histories: VersionHistories,
}

impl RawHistoryContinuationToken {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        domain_name: String,
        workflow_id: String,
        run_id: RunId,
        start_event_id: i64,
        start_event_version: i64,
        end_event_id: i64,
        end_event_version: i64,
        persistence_token: Vec<u8>,
        version_histories: VersionHistories,
    ) -> Self {
        Self {
            version: TOKEN_VERSION,
            domain_name,
            workflow_id,
            run_id,
            start_event_id,
            start_event_version,
            end_event_id,
            end_event_version,
            persistence_token,
            version_histories,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, TokenError> {
        encode_token(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TokenError> {
        decode_token(bytes)
    }
}

#[cfg(test)]
mod tests {
    use test_r::test;

    use super::*;

    fn task_token() -> TaskToken {
        TaskToken::new(
            DomainId::new_v4(),
            "order-workflow-1".to_string(),
            RunId::new_v4(),
            7,
            1,
            "charge-card".to_string(),
            "PaymentActivity".to_string(),
        )
    }

    #[test]
    fn task_token_round_trip_is_identity() {
        let token = task_token();
        let decoded = TaskToken::decode(&token.encode().unwrap()).unwrap();
        assert_eq!(decoded, token);
    }

    #[test]
    fn history_token_round_trip_is_identity() {
        let token = HistoryContinuationToken::new(
            RunId::new_v4(),
            1,
            42,
            true,
            vec![1, 2, 3],
            None,
            vec![9, 9],
        );
        let decoded = HistoryContinuationToken::decode(&token.encode().unwrap()).unwrap();
        assert_eq!(decoded, token);
    }

    #[test]
    fn wire_encoding_round_trip_is_identity() {
        let bytes = task_token().encode().unwrap();
        assert_eq!(from_wire(&to_wire(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn newer_token_versions_are_rejected() {
        let mut json: serde_json::Value =
            serde_json::from_slice(&task_token().encode().unwrap()).unwrap();
        json["version"] = serde_json::json!(99);
        let bytes = serde_json::to_vec(&json).unwrap();
        assert_eq!(
            TaskToken::decode(&bytes),
            Err(TokenError::UnsupportedVersion {
                got: 99,
                supported: TOKEN_VERSION
            })
        );
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            TaskToken::decode(b"not json"),
            Err(TokenError::Malformed(_))
        ));
    }
}
