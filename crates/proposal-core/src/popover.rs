//! The singleton review popover.
//!
//! A popover is anchored below the lowest overlay of a pending region. It carries a word-level
//! preview of the proposed text and the rectangles of its Accept/Reject buttons, so front-ends
//! can render it and [`crate::InputAdapter`] can hit-test it without knowing the layout rules.

use crate::config::ReviewConfig;
use crate::diff::{WordSegment, compute_diff, compute_word_diff};
use crate::overlay::Overlay;
use crate::protocol::CommandId;
use crate::region::HighlightRegion;
use crate::surface::Rect;
use serde::{Deserialize, Serialize};

/// User decision on a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopoverAction {
    /// Apply the proposed edit.
    Accept,
    /// Dismiss the proposed edit.
    Reject,
    /// Revert the last decision.
    Undo,
}

/// Preview and button geometry for one region.
#[derive(Debug, Clone, PartialEq)]
pub struct Popover {
    /// Region the popover belongs to.
    pub region: CommandId,
    /// Anchor point (bottom-left corner of the lowest overlay).
    pub anchor: (f32, f32),
    /// Bounding box of the popover body.
    pub rect: Rect,
    /// Unchanged text before the edit.
    pub prefix: String,
    /// New-side word segments of the edit.
    pub segments: Vec<WordSegment>,
    /// Unchanged text after the edit.
    pub suffix: String,
    /// Accept button.
    pub accept_button: Rect,
    /// Reject button.
    pub reject_button: Rect,
    /// Error from the last failed accept.
    pub error: Option<String>,
}

impl Popover {
    /// Lay out a popover for `region` below its lowest overlay.
    ///
    /// Returns `None` if the region has no overlays (not visible).
    pub fn build(region: &HighlightRegion, overlays: &[Overlay], config: &ReviewConfig) -> Option<Self> {
        let lowest = overlays.iter().map(|o| o.rect).reduce(|best, rect| {
            if rect.bottom > best.bottom || (rect.bottom == best.bottom && rect.left < best.left) {
                rect
            } else {
                best
            }
        })?;

        let anchor = (lowest.left, lowest.bottom);
        let top = anchor.1 + config.popover_offset;
        let accept_button = Rect::new(
            anchor.0,
            top,
            anchor.0 + config.popover_button_width,
            top + config.popover_button_height,
        );
        let gap = config.popover_offset.max(1.0);
        let reject_button = Rect::new(
            accept_button.right + gap,
            top,
            accept_button.right + gap + config.popover_button_width,
            top + config.popover_button_height,
        );

        let diff = compute_diff(&region.matched_text, &region.proposed_text);
        let words = compute_word_diff(diff.old_diff, diff.new_diff);

        Some(Self {
            region: region.id.clone(),
            anchor,
            rect: Rect::new(anchor.0, top, reject_button.right, reject_button.bottom),
            prefix: diff.common_prefix.to_string(),
            segments: words.new,
            suffix: diff.common_suffix.to_string(),
            accept_button,
            reject_button,
            error: region.last_error.as_ref().map(ToString::to_string),
        })
    }

    /// The button under the point, if any.
    pub fn button_at(&self, x: f32, y: f32) -> Option<PopoverAction> {
        if self.accept_button.contains(x, y) {
            Some(PopoverAction::Accept)
        } else if self.reject_button.contains(x, y) {
            Some(PopoverAction::Reject)
        } else {
            None
        }
    }

    /// Returns `true` if the point is over the popover body.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        self.rect.contains(x, y)
    }

    /// The full proposed text as shown in the preview.
    pub fn preview_text(&self) -> String {
        let mut text = self.prefix.clone();
        for segment in &self.segments {
            text.push_str(&segment.text);
        }
        text.push_str(&self.suffix);
        text
    }
}

/// Singleton popover slot plus pointer tracking.
#[derive(Debug, Default)]
pub(crate) struct PopoverSlot {
    open: Option<Popover>,
    pointer_inside: bool,
}

impl PopoverSlot {
    pub(crate) fn current(&self) -> Option<&Popover> {
        self.open.as_ref()
    }

    pub(crate) fn is_open_for(&self, id: &CommandId) -> bool {
        self.open.as_ref().is_some_and(|p| &p.region == id)
    }

    /// Replace whatever is open. Returns the region of the popover that was closed.
    pub(crate) fn open(&mut self, popover: Popover) -> Option<CommandId> {
        let closed = self.close();
        self.open = Some(popover);
        closed
    }

    pub(crate) fn close(&mut self) -> Option<CommandId> {
        self.pointer_inside = false;
        self.open.take().map(|p| p.region)
    }

    pub(crate) fn set_pointer_inside(&mut self, inside: bool) {
        self.pointer_inside = inside && self.open.is_some();
    }

    pub(crate) fn pointer_inside(&self) -> bool {
        self.pointer_inside
    }

    pub(crate) fn set_error(&mut self, id: &CommandId, error: String) {
        if let Some(popover) = self.open.as_mut().filter(|p| &p.region == id) {
            popover.error = Some(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchors::MatchPosition;
    use crate::overlay::{OverlayId, OverlayKind};
    use crate::protocol::EditCommand;
    use pretty_assertions::assert_eq;

    fn sample_region() -> HighlightRegion {
        HighlightRegion::new(
            EditCommand::replace("a", "big old dog", "big new dog"),
            MatchPosition {
                from: 0,
                to: 11,
                text: "big old dog".to_string(),
            },
            "big new dog".to_string(),
        )
    }

    fn overlay(id: u64, rect: Rect) -> Overlay {
        Overlay {
            id: OverlayId(id),
            region: CommandId::new("r"),
            kind: OverlayKind::Background,
            rect,
            opacity: 0.2,
        }
    }

    #[test]
    fn test_anchor_is_lowest_then_leftmost() {
        let overlays = vec![
            overlay(1, Rect::new(5.0, 0.0, 9.0, 1.0)),
            overlay(2, Rect::new(3.0, 1.0, 8.0, 2.0)),
            overlay(3, Rect::new(1.0, 1.0, 2.0, 2.0)),
        ];
        let config = ReviewConfig::for_cell_grid();
        let popover = Popover::build(&sample_region(), &overlays, &config).unwrap();
        assert_eq!(popover.anchor, (1.0, 2.0));
        assert_eq!(popover.accept_button, Rect::new(1.0, 2.0, 11.0, 3.0));
        assert_eq!(popover.reject_button, Rect::new(12.0, 2.0, 22.0, 3.0));
        assert_eq!(popover.button_at(2.0, 2.5), Some(PopoverAction::Accept));
        assert_eq!(popover.button_at(15.0, 2.5), Some(PopoverAction::Reject));
        assert_eq!(popover.button_at(11.5, 2.5), None);
    }

    #[test]
    fn test_preview_segments() {
        let overlays = vec![overlay(1, Rect::new(4.0, 0.0, 7.0, 1.0))];
        let popover = Popover::build(&sample_region(), &overlays, &ReviewConfig::default()).unwrap();
        assert_eq!(popover.prefix, "big ");
        assert_eq!(popover.suffix, " dog");
        assert_eq!(popover.preview_text(), "big new dog");
        assert!(popover.segments.iter().any(|s| s.is_changed()));
    }

    #[test]
    fn test_no_overlays_no_popover() {
        assert!(Popover::build(&sample_region(), &[], &ReviewConfig::default()).is_none());
    }

    #[test]
    fn test_slot_is_singleton() {
        let overlays = vec![overlay(1, Rect::new(0.0, 0.0, 1.0, 1.0))];
        let config = ReviewConfig::default();
        let first = Popover::build(&sample_region(), &overlays, &config).unwrap();
        let mut second = first.clone();
        second.region = CommandId::new("other");

        let mut slot = PopoverSlot::default();
        assert_eq!(slot.open(first.clone()), None);
        slot.set_pointer_inside(true);
        assert_eq!(slot.open(second), Some(first.region.clone()));
        assert!(!slot.pointer_inside());
        assert!(slot.is_open_for(&CommandId::new("other")));
    }
}
