//! Overlay geometry for highlight regions.
//!
//! A region is drawn as up to three layers, computed from the diff between the text currently
//! at the region and the proposed text:
//!
//! - one [`OverlayKind::Background`] rectangle per visual line spanned by the changed old span,
//! - one [`OverlayKind::ChangedToken`] rectangle per visual line of each changed old-side token,
//!   layered above the background,
//! - or, when nothing is removed (pure insertion), a single [`OverlayKind::InsertionCaret`].
//!
//! Offsets that are not rendered (the provider returns `None`) contribute no geometry, so a
//! region scrolled out of view produces no overlays.

use crate::config::ReviewConfig;
use crate::diff::{changed_ranges, compute_diff, compute_word_diff};
use crate::protocol::CommandId;
use crate::region::HighlightRegion;
use crate::surface::{CoordinateProvider, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Identifier of an overlay, unique within one manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OverlayId(pub u64);

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "overlay#{}", self.0)
    }
}

/// Monotonically increasing overlay id source.
#[derive(Debug, Default)]
pub struct OverlayIdAllocator {
    next: u64,
}

impl OverlayIdAllocator {
    /// Hand out the next id.
    pub fn next_id(&mut self) -> OverlayId {
        self.next += 1;
        OverlayId(self.next)
    }

    /// The most recently allocated id, if any.
    pub fn last(&self) -> Option<OverlayId> {
        (self.next > 0).then_some(OverlayId(self.next))
    }
}

/// Visual layer of an overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayKind {
    /// Low-opacity background over a changed line span.
    Background,
    /// Emphasis over one changed token.
    ChangedToken,
    /// Caret marking a pure insertion point.
    InsertionCaret,
}

/// A positioned rectangle belonging to one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    /// Overlay id.
    pub id: OverlayId,
    /// Owning region.
    pub region: CommandId,
    /// Layer.
    pub kind: OverlayKind,
    /// Position in surface units.
    pub rect: Rect,
    /// Fill opacity in `0.0..=1.0`.
    pub opacity: f32,
}

impl Overlay {
    /// Returns `true` if the point is inside the overlay.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        self.rect.contains(x, y)
    }
}

/// Returns `true` if either end of `from..to` is currently rendered.
pub fn span_visible<P: CoordinateProvider + ?Sized>(provider: &P, from: usize, to: usize) -> bool {
    provider.coords_at_offset(from).is_some() || provider.coords_at_offset(to).is_some()
}

/// One rectangle per visual line covered by the char range `range`.
///
/// Caret rects of every offset in the range (end inclusive) are grouped by their `top`; the end
/// offset only widens a line that already has content, so a span ending in a line break does not
/// spill onto the next line. Zero-width lines get `min_width`.
pub fn line_rects<P: CoordinateProvider + ?Sized>(
    provider: &P,
    range: Range<usize>,
    min_width: f32,
) -> Vec<Rect> {
    let mut rects: Vec<Rect> = Vec::new();
    for offset in range.start..=range.end {
        let Some(caret) = provider.coords_at_offset(offset) else {
            continue;
        };
        match rects.last_mut() {
            Some(line) if line.top == caret.top => {
                line.left = line.left.min(caret.left);
                line.right = line.right.max(caret.right);
            }
            _ if offset == range.end && offset > range.start => {}
            _ => rects.push(caret),
        }
    }

    for rect in &mut rects {
        if rect.width() <= 0.0 {
            rect.right = rect.left + min_width;
        }
    }
    rects
}

/// Compute the overlays for `region` from its matched and proposed text.
///
/// Returns an empty list when the region is not visible.
pub fn build_overlays<P: CoordinateProvider + ?Sized>(
    region: &HighlightRegion,
    provider: &P,
    config: &ReviewConfig,
    ids: &mut OverlayIdAllocator,
) -> Vec<Overlay> {
    let diff = compute_diff(&region.matched_text, &region.proposed_text);
    let start = region.from + diff.prefix_chars();
    let mut overlays = Vec::new();
    let mut push = |kind: OverlayKind, rect: Rect, opacity: f32| {
        overlays.push(Overlay {
            id: ids.next_id(),
            region: region.id.clone(),
            kind,
            rect,
            opacity,
        });
    };

    if diff.is_pure_insertion() {
        if let Some(caret) = provider.coords_at_offset(start) {
            let rect = Rect::new(caret.left, caret.top, caret.left + config.caret_width, caret.bottom);
            push(OverlayKind::InsertionCaret, rect, 1.0);
        }
        return overlays;
    }

    let old_len = diff.old_diff.chars().count();
    for rect in line_rects(provider, start..start + old_len, config.caret_width) {
        push(OverlayKind::Background, rect, config.background_opacity);
    }

    let words = compute_word_diff(diff.old_diff, diff.new_diff);
    for range in changed_ranges(&words.old) {
        let range = start + range.start..start + range.end;
        for rect in line_rects(provider, range, config.caret_width) {
            push(OverlayKind::ChangedToken, rect, config.changed_token_opacity);
        }
    }

    tracing::trace!(region = %region.id, count = overlays.len(), "built overlays");
    overlays
}
