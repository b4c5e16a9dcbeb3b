//! Document surface contract.
//!
//! The review core never owns the document. It reads and mutates it through a [`Surface`]: a
//! mutable character buffer, a [`CoordinateProvider`] mapping offsets to screen rectangles, a
//! scroll capability and the identity of the currently open file.
//!
//! [`BufferSurface`] is a self-contained implementation backed by a [`ropey::Rope`] with
//! monospace grid geometry (one unit per terminal cell, `line_height` units per line). It is what
//! the tests and the terminal front-end use.

use crate::error::SurfaceError;
use ropey::Rope;
use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthChar;

/// An axis-aligned rectangle in surface units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub left: f32,
    /// Top edge.
    pub top: f32,
    /// Right edge.
    pub right: f32,
    /// Bottom edge.
    pub bottom: f32,
}

impl Rect {
    /// Create a rectangle from its edges.
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Width (never negative).
    pub fn width(&self) -> f32 {
        (self.right - self.left).max(0.0)
    }

    /// Height (never negative).
    pub fn height(&self) -> f32 {
        (self.bottom - self.top).max(0.0)
    }

    /// Returns `true` if the point lies inside (edges inclusive).
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }
}

/// A single buffer edit in character offsets: replace `from..to` with `insert_text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutation {
    /// Inclusive start character offset.
    pub from: usize,
    /// Exclusive end character offset (`from == to` for pure insertions).
    pub to: usize,
    /// Replacement text.
    pub insert_text: String,
}

impl Mutation {
    /// Create a mutation.
    pub fn new(from: usize, to: usize, insert_text: impl Into<String>) -> Self {
        Self {
            from,
            to,
            insert_text: insert_text.into(),
        }
    }
}

/// Maps document offsets to screen rectangles.
pub trait CoordinateProvider {
    /// Caret rectangle at `offset`, or `None` if the offset is not currently rendered (scrolled
    /// out of view or out of bounds).
    ///
    /// For an offset on a line, `left == right` is allowed (a zero-width caret).
    fn coords_at_offset(&self, offset: usize) -> Option<Rect>;
}

/// A live, mutable, scrollable document.
pub trait Surface: CoordinateProvider {
    /// Snapshot of the full document text.
    fn current_content(&self) -> String;

    /// Apply all `mutations` as one atomic edit. Either every mutation lands or none does.
    ///
    /// Mutations are expressed against the pre-edit content and must not overlap.
    fn apply_mutations(&mut self, mutations: &[Mutation]) -> Result<(), SurfaceError>;

    /// Scroll so that `offset` is vertically centered.
    fn scroll_to_offset(&mut self, offset: usize);

    /// Identity (path) of the currently open file.
    fn current_open_file(&self) -> String;
}

impl<T: CoordinateProvider + ?Sized> CoordinateProvider for &mut T {
    fn coords_at_offset(&self, offset: usize) -> Option<Rect> {
        (**self).coords_at_offset(offset)
    }
}

impl<T: Surface + ?Sized> Surface for &mut T {
    fn current_content(&self) -> String {
        (**self).current_content()
    }

    fn apply_mutations(&mut self, mutations: &[Mutation]) -> Result<(), SurfaceError> {
        (**self).apply_mutations(mutations)
    }

    fn scroll_to_offset(&mut self, offset: usize) {
        (**self).scroll_to_offset(offset)
    }

    fn current_open_file(&self) -> String {
        (**self).current_open_file()
    }
}

/// Check that `mutations` fit in a document of `len` chars and do not overlap.
///
/// Returns the mutations sorted last-to-first, ready to be applied in order.
pub fn validate_mutations(mutations: &[Mutation], len: usize) -> Result<Vec<&Mutation>, SurfaceError> {
    let mut sorted: Vec<&Mutation> = mutations.iter().collect();
    sorted.sort_by(|a, b| b.from.cmp(&a.from).then(b.to.cmp(&a.to)));

    for m in &sorted {
        if m.from > m.to || m.to > len {
            return Err(SurfaceError::OutOfBounds {
                from: m.from,
                to: m.to,
                len,
            });
        }
    }
    for pair in sorted.windows(2) {
        // pair[0] starts at or after pair[1].
        if pair[1].to > pair[0].from || (pair[1].from == pair[0].from && pair[0].from != pair[0].to)
        {
            return Err(SurfaceError::Overlapping(pair[0].from));
        }
    }
    Ok(sorted)
}

/// Grid metrics for [`BufferSurface`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridMetrics {
    /// Width of one cell.
    pub cell_width: f32,
    /// Height of one line.
    pub line_height: f32,
    /// Tab stop width in cells.
    pub tab_width: usize,
}

impl Default for GridMetrics {
    fn default() -> Self {
        Self {
            cell_width: 1.0,
            line_height: 1.0,
            tab_width: 4,
        }
    }
}

fn cell_width_at(ch: char, cell_offset_in_line: usize, tab_width: usize) -> usize {
    if ch == '\t' {
        let tab_width = tab_width.max(1);
        tab_width - cell_offset_in_line % tab_width
    } else {
        UnicodeWidthChar::width(ch).unwrap_or(1)
    }
}

/// A rope-backed [`Surface`] with a fixed-height viewport over a monospace grid.
///
/// Rectangles are relative to the viewport: line `scroll_top` renders at `top == 0`.
#[derive(Debug, Clone)]
pub struct BufferSurface {
    rope: Rope,
    file: String,
    scroll_top: usize,
    viewport_lines: usize,
    metrics: GridMetrics,
    read_only: bool,
    version: u64,
}

impl BufferSurface {
    /// Create a surface for `file` showing `viewport_lines` lines at a time.
    pub fn new(file: impl Into<String>, text: &str, viewport_lines: usize) -> Self {
        Self {
            rope: Rope::from_str(text),
            file: file.into(),
            scroll_top: 0,
            viewport_lines: viewport_lines.max(1),
            metrics: GridMetrics::default(),
            read_only: false,
            version: 0,
        }
    }

    /// Override the grid metrics.
    pub fn with_metrics(mut self, metrics: GridMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Grid metrics.
    pub fn metrics(&self) -> GridMetrics {
        self.metrics
    }

    /// Document length in chars.
    pub fn char_count(&self) -> usize {
        self.rope.len_chars()
    }

    /// Number of lines (N newlines => N+1 lines).
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Text of `line` without its line break.
    pub fn line_text(&self, line: usize) -> Option<String> {
        if line >= self.rope.len_lines() {
            return None;
        }
        let text = self.rope.line(line).to_string();
        let text = text.strip_suffix('\n').unwrap_or(&text);
        Some(text.strip_suffix('\r').unwrap_or(text).to_string())
    }

    /// Character offset of the start of `line` (clamped).
    pub fn line_to_char(&self, line: usize) -> usize {
        self.rope
            .line_to_char(line.min(self.rope.len_lines().saturating_sub(1)))
    }

    /// First visible line.
    pub fn scroll_top(&self) -> usize {
        self.scroll_top
    }

    /// Number of visible lines.
    pub fn viewport_lines(&self) -> usize {
        self.viewport_lines
    }

    /// Set the first visible line (clamped to the document).
    pub fn set_scroll_top(&mut self, line: usize) {
        self.scroll_top = line.min(self.rope.len_lines().saturating_sub(1));
    }

    /// Scroll by a signed number of lines.
    pub fn scroll_by(&mut self, delta: isize) {
        let target = self.scroll_top.saturating_add_signed(delta);
        self.set_scroll_top(target);
    }

    /// Resize the viewport.
    pub fn set_viewport_lines(&mut self, lines: usize) {
        self.viewport_lines = lines.max(1);
    }

    /// Switch to another file with new content (scroll resets to the top).
    pub fn open(&mut self, file: impl Into<String>, text: &str) {
        self.file = file.into();
        self.rope = Rope::from_str(text);
        self.scroll_top = 0;
        self.version = self.version.wrapping_add(1);
    }

    /// Replace the whole content without changing the open file (an external edit).
    pub fn set_text(&mut self, text: &str) {
        self.rope = Rope::from_str(text);
        self.set_scroll_top(self.scroll_top);
        self.version = self.version.wrapping_add(1);
    }

    /// Make [`Surface::apply_mutations`] fail with [`SurfaceError::Rejected`].
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Incremented on every content change.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Convert a char offset into `(line, column)`, clamped to the document.
    pub fn offset_to_line_col(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.rope.len_chars());
        let line = self.rope.char_to_line(offset);
        (line, offset - self.rope.line_to_char(line))
    }

    /// Visual cell column of `column` chars into `line`.
    pub fn visual_x(&self, line: usize, column: usize) -> usize {
        let mut x = 0usize;
        for ch in self.rope.line(line).chars().take(column) {
            if ch == '\n' || ch == '\r' {
                break;
            }
            x = x.saturating_add(cell_width_at(ch, x, self.metrics.tab_width));
        }
        x
    }

    /// Map a viewport point back to the nearest char offset on that line.
    pub fn offset_at_point(&self, x: f32, y: f32) -> Option<usize> {
        if y < 0.0 {
            return None;
        }
        let row = (y / self.metrics.line_height) as usize;
        if row >= self.viewport_lines {
            return None;
        }
        let line = self.scroll_top + row;
        if line >= self.rope.len_lines() {
            return None;
        }
        let target = (x / self.metrics.cell_width).max(0.0) as usize;
        let line_start = self.rope.line_to_char(line);
        let mut cells = 0usize;
        for (column, ch) in self.rope.line(line).chars().enumerate() {
            if ch == '\n' || ch == '\r' {
                return Some(line_start + column);
            }
            let width = cell_width_at(ch, cells, self.metrics.tab_width);
            if cells + width > target {
                return Some(line_start + column);
            }
            cells += width;
        }
        Some(line_start + self.line_text(line).map(|t| t.chars().count()).unwrap_or(0))
    }
}

impl CoordinateProvider for BufferSurface {
    fn coords_at_offset(&self, offset: usize) -> Option<Rect> {
        if offset > self.rope.len_chars() {
            return None;
        }
        let (line, column) = self.offset_to_line_col(offset);
        if line < self.scroll_top || line >= self.scroll_top + self.viewport_lines {
            return None;
        }
        let x = self.visual_x(line, column) as f32 * self.metrics.cell_width;
        let top = (line - self.scroll_top) as f32 * self.metrics.line_height;
        Some(Rect::new(x, top, x, top + self.metrics.line_height))
    }
}

impl Surface for BufferSurface {
    fn current_content(&self) -> String {
        self.rope.to_string()
    }

    fn apply_mutations(&mut self, mutations: &[Mutation]) -> Result<(), SurfaceError> {
        if self.read_only {
            return Err(SurfaceError::Rejected(format!("{} is read-only", self.file)));
        }
        let sorted = validate_mutations(mutations, self.rope.len_chars())?;
        for m in sorted {
            self.rope.remove(m.from..m.to);
            self.rope.insert(m.from, &m.insert_text);
        }
        self.version = self.version.wrapping_add(1);
        tracing::trace!(count = mutations.len(), version = self.version, "applied mutations");
        Ok(())
    }

    fn scroll_to_offset(&mut self, offset: usize) {
        let (line, _) = self.offset_to_line_col(offset);
        self.set_scroll_top(line.saturating_sub(self.viewport_lines / 2));
    }

    fn current_open_file(&self) -> String {
        self.file.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_coords_follow_scroll() {
        let mut surface = BufferSurface::new("a.txt", "one\ntwo\nthree\nfour", 2);
        assert_eq!(surface.coords_at_offset(5), Some(Rect::new(1.0, 1.0, 1.0, 2.0)));
        assert_eq!(surface.coords_at_offset(8), None);

        surface.set_scroll_top(2);
        assert_eq!(surface.coords_at_offset(5), None);
        assert_eq!(surface.coords_at_offset(8), Some(Rect::new(0.0, 0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_wide_chars_and_tabs() {
        let surface = BufferSurface::new("a", "\t中x", 5);
        // tab -> 4 cells, CJK -> 2 cells
        assert_eq!(surface.coords_at_offset(2).map(|r| r.left), Some(6.0));
        assert_eq!(surface.offset_at_point(5.0, 0.0), Some(1));
        assert_eq!(surface.offset_at_point(6.5, 0.0), Some(2));
    }

    #[test]
    fn test_apply_mutations_is_atomic() {
        let mut surface = BufferSurface::new("a", "hello world", 5);
        let err = surface
            .apply_mutations(&[Mutation::new(0, 5, "HELLO"), Mutation::new(6, 99, "x")])
            .unwrap_err();
        assert!(matches!(err, SurfaceError::OutOfBounds { .. }));
        assert_eq!(surface.current_content(), "hello world");

        surface
            .apply_mutations(&[Mutation::new(0, 5, "bye"), Mutation::new(6, 11, "all")])
            .unwrap();
        assert_eq!(surface.current_content(), "bye all");
    }

    #[test]
    fn test_overlapping_mutations_rejected() {
        let mut surface = BufferSurface::new("a", "abcdef", 5);
        let err = surface
            .apply_mutations(&[Mutation::new(0, 3, "x"), Mutation::new(2, 4, "y")])
            .unwrap_err();
        assert_eq!(err, SurfaceError::Overlapping(2));
    }

    #[test]
    fn test_scroll_to_offset_centers() {
        let text: String = (0..20).map(|i| format!("line {}\n", i)).collect();
        let mut surface = BufferSurface::new("a", &text, 6);
        let offset = surface.line_to_char(10);
        surface.scroll_to_offset(offset);
        assert_eq!(surface.scroll_top(), 7);
    }
}
