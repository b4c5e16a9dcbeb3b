//! Highlight regions: the live record of one proposed edit.

use crate::anchors::MatchPosition;
use crate::error::ReviewError;
use crate::overlay::Overlay;
use crate::protocol::{CommandId, EditCommand};
use serde::{Deserialize, Serialize};

/// Review state of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionStatus {
    /// Waiting for a decision.
    Pending,
    /// The edit was applied to the document.
    Accepted,
    /// The edit was dismissed; the document is untouched.
    Rejected,
    /// An explicit apply failed.
    Error,
}

impl RegionStatus {
    /// Returns `true` once the user (or caller) has decided.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// One proposed edit tracked by the manager, together with the overlays it owns.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightRegion {
    /// Id of the command this region tracks.
    pub id: CommandId,
    /// The command itself.
    pub command: EditCommand,
    /// Start of the primary match (character offset).
    pub from: usize,
    /// End of the primary match (character offset, `from == to` for inserts).
    pub to: usize,
    /// Text currently at `from..to`.
    pub matched_text: String,
    /// Text the command would put at `from..to`.
    pub proposed_text: String,
    /// Overlays currently drawn for this region.
    pub overlays: Vec<Overlay>,
    /// Review state.
    pub status: RegionStatus,
    /// Error of the last failed accept, if any.
    pub last_error: Option<ReviewError>,
}

impl HighlightRegion {
    pub(crate) fn new(command: EditCommand, primary: MatchPosition, proposed_text: String) -> Self {
        Self {
            id: command.id().clone(),
            command,
            from: primary.from,
            to: primary.to,
            matched_text: primary.text,
            proposed_text,
            overlays: Vec::new(),
            status: RegionStatus::Pending,
            last_error: None,
        }
    }

    /// Update the tracked span after a re-resolution.
    pub(crate) fn relocate(&mut self, primary: MatchPosition, proposed_text: String) {
        self.from = primary.from;
        self.to = primary.to;
        self.matched_text = primary.text;
        self.proposed_text = proposed_text;
    }

    /// Returns `true` while the region awaits a decision.
    pub fn is_pending(&self) -> bool {
        self.status == RegionStatus::Pending
    }

    /// Returns `true` if the proposed text equals what is already there.
    pub fn is_noop(&self) -> bool {
        self.matched_text == self.proposed_text
    }
}
