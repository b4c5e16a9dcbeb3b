//! Review session configuration.
//!
//! Every field has a default, so a config file only needs to list what it overrides:
//!
//! ```rust
//! use proposal_core::ReviewConfig;
//!
//! let config = ReviewConfig::from_json_str(r#"{ "basename_fallback": false }"#).unwrap();
//! assert!(!config.basename_fallback);
//! assert_eq!(config.edit_timeout_ms, 10_000);
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for a review session and its cross-context bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Timeout for edit-style requests across the bridge (apply, register, undo, ...).
    pub edit_timeout_ms: u64,
    /// Timeout for bulk content reads across the bridge.
    pub bulk_read_timeout_ms: u64,
    /// Accept a command whose file only shares the basename with the open file.
    pub basename_fallback: bool,
    /// Width of the caret marker drawn for pure insertions.
    pub caret_width: f32,
    /// Opacity of the per-line background overlays.
    pub background_opacity: f32,
    /// Opacity of the changed-token overlays.
    pub changed_token_opacity: f32,
    /// Vertical gap between the anchoring overlay and the popover.
    pub popover_offset: f32,
    /// Width of each popover action button.
    pub popover_button_width: f32,
    /// Height of each popover action button.
    pub popover_button_height: f32,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            edit_timeout_ms: 10_000,
            bulk_read_timeout_ms: 30_000,
            basename_fallback: true,
            caret_width: 2.0,
            background_opacity: 0.15,
            changed_token_opacity: 0.45,
            popover_offset: 4.0,
            popover_button_width: 72.0,
            popover_button_height: 24.0,
        }
    }
}

impl ReviewConfig {
    /// Parse a (partial) JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Edit-request timeout as a [`Duration`].
    pub fn edit_timeout(&self) -> Duration {
        Duration::from_millis(self.edit_timeout_ms)
    }

    /// Bulk-read timeout as a [`Duration`].
    pub fn bulk_read_timeout(&self) -> Duration {
        Duration::from_millis(self.bulk_read_timeout_ms)
    }

    /// Settings for a terminal grid (one unit per cell): one-cell caret and buttons, no gap.
    pub fn for_cell_grid() -> Self {
        Self {
            caret_width: 1.0,
            popover_offset: 0.0,
            popover_button_width: 10.0,
            popover_button_height: 1.0,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_overrides() {
        let config = ReviewConfig::from_json_str(r#"{"caret_width": 1.5}"#).unwrap();
        assert_eq!(config.caret_width, 1.5);
        assert_eq!(config.bulk_read_timeout(), Duration::from_secs(30));
        assert_eq!(config.edit_timeout(), Duration::from_secs(10));
        assert!(config.basename_fallback);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(ReviewConfig::from_json_str(r#"{"caret_width": "wide"}"#).is_err());
    }
}
