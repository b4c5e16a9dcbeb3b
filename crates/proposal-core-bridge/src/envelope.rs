//! Wire envelopes.
//!
//! Requests travel as `{"id": <u64>, "request": {"type": "...", ...}}` and are answered by
//! `{"id": <u64>, "ok": bool, "result": <json>, "error": {"reason": "...", "message": "..."}}`.

use crate::error::BridgeError;
use proposal_core::{CommandId, EditCommand, ErrorKind, ReviewError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Operations a remote context can request from a review session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeRequest {
    /// Register proposed edits against the open file.
    RegisterCommands {
        /// Commands to register.
        commands: Vec<EditCommand>,
        /// File the caller believes is open.
        current_file: String,
        /// Scroll the first match into view.
        #[serde(default)]
        should_scroll: bool,
    },
    /// Open another file in the host.
    NavigateToFile {
        /// Path to open.
        file: String,
    },
    /// Apply a pending edit.
    Apply {
        /// Region id.
        id: CommandId,
    },
    /// Remove one region.
    RemoveRegion {
        /// Region id.
        id: CommandId,
    },
    /// Remove every region.
    RemoveAll,
    /// Query a region's status.
    GetStatus {
        /// Region id.
        id: CommandId,
    },
    /// Undo the decision on a region.
    Undo {
        /// Region id.
        id: CommandId,
    },
    /// Re-resolve all regions.
    Refresh,
    /// Read the full content of the open document.
    ReadContent,
}

/// Which timeout budget a request gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutClass {
    /// Edit-style operations.
    Edit,
    /// Bulk content reads.
    BulkRead,
}

impl TimeoutClass {
    /// Resolve the class against configured durations.
    pub fn duration(self, edit: Duration, bulk_read: Duration) -> Duration {
        match self {
            Self::Edit => edit,
            Self::BulkRead => bulk_read,
        }
    }
}

impl BridgeRequest {
    /// Timeout budget for this request.
    pub fn timeout_class(&self) -> TimeoutClass {
        match self {
            Self::ReadContent => TimeoutClass::BulkRead,
            _ => TimeoutClass::Edit,
        }
    }

    /// Wire name of the request type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RegisterCommands { .. } => "register_commands",
            Self::NavigateToFile { .. } => "navigate_to_file",
            Self::Apply { .. } => "apply",
            Self::RemoveRegion { .. } => "remove_region",
            Self::RemoveAll => "remove_all",
            Self::GetStatus { .. } => "get_status",
            Self::Undo { .. } => "undo",
            Self::Refresh => "refresh",
            Self::ReadContent => "read_content",
        }
    }
}

/// A request with its correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Correlation id.
    pub id: u64,
    /// The request.
    pub request: BridgeRequest,
}

/// Machine- and human-readable failure details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureBody {
    /// Machine-readable reason (`snake_case`).
    pub reason: String,
    /// Human-readable message.
    pub message: String,
}

/// The answer to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Correlation id of the request.
    pub id: u64,
    /// Whether the request succeeded.
    pub ok: bool,
    /// Result payload (`null` on failure).
    #[serde(default)]
    pub result: Value,
    /// Failure details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureBody>,
}

/// `snake_case` wire name of an error kind.
pub fn reason_of(kind: ErrorKind) -> String {
    serde_json::to_value(kind)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_else(|| "internal".to_string())
}

impl ResponseEnvelope {
    /// A successful response.
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            id,
            ok: true,
            result,
            error: None,
        }
    }

    /// A failed response.
    pub fn failure(id: u64, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id,
            ok: false,
            result: Value::Null,
            error: Some(FailureBody {
                reason: reason.into(),
                message: message.into(),
            }),
        }
    }

    /// A failed response carrying a review error.
    pub fn from_error(id: u64, err: &ReviewError) -> Self {
        Self::failure(id, reason_of(err.kind()), err.to_string())
    }

    /// The generic failure a request resolves to when its deadline passes.
    pub fn timeout(id: u64, timeout: Duration) -> Self {
        Self::from_error(
            id,
            &ReviewError::RequestTimeout {
                request_id: id,
                timeout_ms: timeout.as_millis() as u64,
            },
        )
    }

    /// The result payload, or the failure as [`BridgeError::Remote`].
    pub fn into_result(self) -> Result<Value, BridgeError> {
        match (self.ok, self.error) {
            (true, _) => Ok(self.result),
            (false, Some(FailureBody { reason, message })) => Err(BridgeError::Remote { reason, message }),
            (false, None) => Err(BridgeError::Remote {
                reason: "internal".to_string(),
                message: "failure without details".to_string(),
            }),
        }
    }

    /// Returns `true` if this is a timeout failure.
    pub fn is_timeout(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(|error| error.reason == reason_of(ErrorKind::RequestTimeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        let envelope = RequestEnvelope {
            id: 7,
            request: BridgeRequest::GetStatus {
                id: CommandId::new("replace-0011"),
            },
        };
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"id": 7, "request": {"type": "get_status", "id": "replace-0011"}})
        );

        let parsed: RequestEnvelope =
            serde_json::from_value(json!({"id": 8, "request": {"type": "remove_all"}})).unwrap();
        assert_eq!(parsed.request, BridgeRequest::RemoveAll);
        assert_eq!(parsed.request.name(), "remove_all");
    }

    #[test]
    fn test_register_defaults_should_scroll() {
        let parsed: BridgeRequest = serde_json::from_value(json!({
            "type": "register_commands",
            "commands": [],
            "current_file": "a.txt"
        }))
        .unwrap();
        let BridgeRequest::RegisterCommands { should_scroll, .. } = parsed else {
            panic!("expected BridgeRequest::RegisterCommands");
        };
        assert!(!should_scroll);
    }

    #[test]
    fn test_timeout_response() {
        let response = ResponseEnvelope::timeout(3, Duration::from_secs(10));
        assert!(response.is_timeout());
        assert!(!response.ok);
        assert_eq!(
            serde_json::to_value(&response).unwrap()["error"]["reason"],
            json!("request_timeout")
        );
    }

    #[test]
    fn test_into_result() {
        let ok = ResponseEnvelope::success(1, json!({"removed": 2}));
        assert_eq!(ok.into_result().unwrap(), json!({"removed": 2}));

        let failed = ResponseEnvelope::failure(2, "unknown_region", "no region nope");
        match failed.into_result() {
            Err(BridgeError::Remote { reason, .. }) => assert_eq!(reason, "unknown_region"),
            other => panic!("expected a remote failure, got {other:?}"),
        }
    }

    #[test]
    fn test_timeout_classes() {
        assert_eq!(BridgeRequest::ReadContent.timeout_class(), TimeoutClass::BulkRead);
        assert_eq!(BridgeRequest::Refresh.timeout_class(), TimeoutClass::Edit);
    }
}
