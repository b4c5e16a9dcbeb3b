//! Error taxonomy shared by the parser, resolver, applier and region manager.
//!
//! Every fallible operation in this crate returns a [`ReviewError`]. Callers that need a
//! machine-readable reason use [`ReviewError::kind`]; the `Display` impl is meant for humans.

use crate::region::RegionStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable error reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A protocol block has not been terminated yet.
    ParseIncomplete,
    /// An insertion anchor (or search text) could not be found.
    AnchorNotFound,
    /// The AFTER anchor ends past the start of the BEFORE anchor.
    AnchorOrderViolation,
    /// A refresh or apply found no match for the search text.
    NoMatchFound,
    /// A regex pattern failed to compile.
    InvalidPattern,
    /// The document surface refused the mutation.
    ApplyFailure,
    /// A cross-context request was not answered in time.
    RequestTimeout,
    /// No region is registered under the given id.
    UnknownRegion,
    /// The requested action is not valid in the region's current state.
    InvalidTransition,
    /// There is nothing to undo for the region.
    UndoUnavailable,
}

/// Errors produced by the review core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReviewError {
    #[error("incomplete protocol block")]
    /// A block is still missing its terminating marker.
    ParseIncomplete,

    #[error("anchor not found: {anchor:?}")]
    /// None of the anchors resolved in the current document.
    AnchorNotFound {
        /// The anchor (or search) text that was looked up.
        anchor: String,
    },

    #[error("AFTER anchor ends at {after_end} but BEFORE anchor starts at {before_start}")]
    /// The anchors resolved in the wrong order.
    AnchorOrderViolation {
        /// End offset of the AFTER anchor.
        after_end: usize,
        /// Start offset of the BEFORE anchor.
        before_start: usize,
    },

    #[error("search text not found: {search:?}")]
    /// The search text no longer occurs in the document.
    NoMatchFound {
        /// The search text or pattern.
        search: String,
    },

    #[error("invalid regex '{pattern}': {message}")]
    /// A regex pattern failed to compile.
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// The compiler message.
        message: String,
    },

    #[error("failed to apply edit: {0}")]
    /// The document surface rejected the mutation list.
    ApplyFailure(String),

    #[error("request {request_id} timed out after {timeout_ms}ms")]
    /// A cross-context request hit its deadline.
    RequestTimeout {
        /// Correlation id of the request.
        request_id: u64,
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    #[error("unknown region: {0}")]
    /// No region is registered under this id.
    UnknownRegion(String),

    #[error("cannot {action} region {id} while it is {status:?}")]
    /// The region is not in a state that allows the action.
    InvalidTransition {
        /// Region id.
        id: String,
        /// Current status.
        status: RegionStatus,
        /// Attempted action.
        action: &'static str,
    },

    #[error("nothing to undo for region {id}: {reason}")]
    /// Undo is not possible (not the most recent accept, or the document changed).
    UndoUnavailable {
        /// Region id.
        id: String,
        /// Why undo was refused.
        reason: String,
    },
}

impl ReviewError {
    /// Returns the machine-readable reason for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ParseIncomplete => ErrorKind::ParseIncomplete,
            Self::AnchorNotFound { .. } => ErrorKind::AnchorNotFound,
            Self::AnchorOrderViolation { .. } => ErrorKind::AnchorOrderViolation,
            Self::NoMatchFound { .. } => ErrorKind::NoMatchFound,
            Self::InvalidPattern { .. } => ErrorKind::InvalidPattern,
            Self::ApplyFailure(_) => ErrorKind::ApplyFailure,
            Self::RequestTimeout { .. } => ErrorKind::RequestTimeout,
            Self::UnknownRegion(_) => ErrorKind::UnknownRegion,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::UndoUnavailable { .. } => ErrorKind::UndoUnavailable,
        }
    }

    /// Returns `true` for errors that mean "the proposal does not resolve yet".
    ///
    /// These never reach the user; region creation is simply skipped.
    pub fn is_unresolved(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::AnchorNotFound | ErrorKind::AnchorOrderViolation | ErrorKind::NoMatchFound
        )
    }
}

/// Errors reported by a [`Surface`](crate::Surface) when a mutation list cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("mutation {from}..{to} is outside the document (length {len})")]
    /// A mutation span does not fit in the document.
    OutOfBounds {
        /// Span start.
        from: usize,
        /// Span end.
        to: usize,
        /// Document length in chars.
        len: usize,
    },

    #[error("mutations overlap at offset {0}")]
    /// Two mutations in the same batch overlap.
    Overlapping(usize),

    #[error("{0}")]
    /// The host refused the edit (read-only buffer, stale file, ...).
    Rejected(String),
}

impl From<SurfaceError> for ReviewError {
    fn from(err: SurfaceError) -> Self {
        Self::ApplyFailure(err.to_string())
    }
}
