//! Frame rendering.

use crate::app::App;
use proposal_core::{
    BufferSurface, Overlay, OverlayKind, Popover, Rect as SurfaceRect, SegmentClass,
};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use unicode_width::UnicodeWidthChar;

const PREVIEW_HEIGHT: u16 = 6;

pub fn render(app: &mut App, frame: &mut Frame) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(PREVIEW_HEIGHT),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", app.file_label()));
    let inner = block.inner(chunks[0]);
    app.set_editor_area(inner);

    frame.render_widget(block, chunks[0]);
    render_document(app, frame, inner);
    render_popover(app, frame, inner);
    render_preview(app, frame, chunks[1]);
    render_status_line(app, frame, chunks[2]);
    render_shortcuts(frame, chunks[3]);
}

fn overlay_style(overlays: &[&Overlay], x: f32, y: f32) -> Option<Style> {
    let kind = overlays
        .iter()
        .filter(|o| o.contains(x, y))
        .map(|o| o.kind)
        .max_by_key(|kind| match kind {
            OverlayKind::Background => 0,
            OverlayKind::ChangedToken => 1,
            OverlayKind::InsertionCaret => 2,
        })?;
    Some(match kind {
        OverlayKind::Background => Style::default().bg(Color::Rgb(60, 50, 20)),
        OverlayKind::ChangedToken => Style::default()
            .bg(Color::Yellow)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD),
        OverlayKind::InsertionCaret => Style::default().bg(Color::Green).fg(Color::Black),
    })
}

fn push_cell(spans: &mut Vec<Span<'static>>, buffer: &mut String, current: &mut Style, style: Style, text: &str) {
    if *current != style && !buffer.is_empty() {
        spans.push(Span::styled(std::mem::take(buffer), *current));
    }
    *current = style;
    buffer.push_str(text);
}

fn document_line(surface: &BufferSurface, overlays: &[&Overlay], row: u16, width: u16) -> Line<'static> {
    let Some(text) = surface.line_text(surface.scroll_top() + usize::from(row)) else {
        return Line::from("");
    };
    let tab_width = surface.metrics().tab_width.max(1);
    let y = f32::from(row) + 0.5;

    let mut spans = Vec::new();
    let mut buffer = String::new();
    let mut current = Style::default();
    let mut x = 0usize;
    let mut scratch = [0u8; 4];

    for ch in text.chars() {
        if x >= usize::from(width) {
            break;
        }
        let style = overlay_style(overlays, x as f32 + 0.5, y).unwrap_or_default();
        if ch == '\t' {
            let cells = tab_width - x % tab_width;
            push_cell(&mut spans, &mut buffer, &mut current, style, &" ".repeat(cells));
            x += cells;
        } else {
            push_cell(&mut spans, &mut buffer, &mut current, style, ch.encode_utf8(&mut scratch));
            x += UnicodeWidthChar::width(ch).unwrap_or(1);
        }
    }

    // Carets and backgrounds past the end of the text.
    let row_right = overlays
        .iter()
        .filter(|o| o.rect.top <= y && y < o.rect.bottom)
        .map(|o| o.rect.right.ceil() as usize)
        .max()
        .unwrap_or(0)
        .min(usize::from(width));
    while x < row_right {
        let style = overlay_style(overlays, x as f32 + 0.5, y).unwrap_or_default();
        push_cell(&mut spans, &mut buffer, &mut current, style, " ");
        x += 1;
    }

    if !buffer.is_empty() {
        spans.push(Span::styled(buffer, current));
    }
    Line::from(spans)
}

fn render_document(app: &App, frame: &mut Frame, area: Rect) {
    let manager = app.manager();
    let overlays = manager.overlays();
    let lines: Vec<Line> = (0..area.height)
        .map(|row| document_line(manager.surface(), &overlays, row, area.width))
        .collect();
    frame.render_widget(Paragraph::new(lines), area);
}

/// Map a surface rectangle into terminal cells, clipped to `bounds`.
fn to_screen(origin: Rect, rect: SurfaceRect, bounds: Rect) -> Option<Rect> {
    let x = origin.x.saturating_add(rect.left.max(0.0) as u16);
    let y = origin.y.saturating_add(rect.top.max(0.0) as u16);
    let width = rect.width().ceil().max(1.0) as u16;
    let height = rect.height().ceil().max(1.0) as u16;
    let screen = Rect::new(x, y, width, height).intersection(bounds);
    (!screen.is_empty()).then_some(screen)
}

fn render_popover(app: &App, frame: &mut Frame, area: Rect) {
    let Some(popover) = app.manager().popover() else {
        return;
    };
    let bounds = frame.area();
    if let Some(body) = to_screen(area, popover.rect, bounds) {
        frame.render_widget(Clear, body);
    }
    for (rect, label, color) in [
        (popover.accept_button, "Accept", Color::Green),
        (popover.reject_button, "Reject", Color::Red),
    ] {
        if let Some(button) = to_screen(area, rect, bounds) {
            let widget = Paragraph::new(label)
                .centered()
                .style(Style::default().bg(color).fg(Color::Black).add_modifier(Modifier::BOLD));
            frame.render_widget(widget, button);
        }
    }
}

/// Preview lines: unchanged context dimmed, changed words highlighted.
fn preview_lines(popover: &Popover) -> Vec<Line<'static>> {
    let dim = Style::default().fg(Color::DarkGray);
    let added = Style::default().fg(Color::Black).bg(Color::Green);

    let mut pieces: Vec<(String, Style)> = vec![(popover.prefix.clone(), dim)];
    for segment in &popover.segments {
        let style = match segment.class {
            SegmentClass::Same => Style::default(),
            SegmentClass::Changed => added,
        };
        pieces.push((segment.text.clone(), style));
    }
    pieces.push((popover.suffix.clone(), dim));

    let mut lines = vec![Line::default()];
    for (text, style) in pieces {
        for (i, part) in text.split('\n').enumerate() {
            if i > 0 {
                lines.push(Line::default());
            }
            if !part.is_empty()
                && let Some(line) = lines.last_mut()
            {
                line.push_span(Span::styled(part.replace('\r', ""), style));
            }
        }
    }
    lines
}

fn render_preview(app: &App, frame: &mut Frame, area: Rect) {
    let manager = app.manager();
    let (title, mut lines) = match manager.popover() {
        Some(popover) => (format!(" Proposal {} ", popover.region), preview_lines(popover)),
        None => (
            " Preview ".to_string(),
            vec![Line::from(Span::styled(
                "Hover a highlight or press Tab to review a proposal",
                Style::default().fg(Color::DarkGray),
            ))],
        ),
    };
    if let Some(error) = manager.popover().and_then(|p| p.error.as_ref()) {
        lines.insert(0, Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))));
    }

    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false });
    frame.render_widget(widget, area);
}

fn render_status_line(app: &App, frame: &mut Frame, area: Rect) {
    let manager = app.manager();
    let surface = manager.surface();
    let modified = if app.is_dirty() { " [+]" } else { "" };
    let streaming = if app.is_streaming() { " | receiving" } else { "" };
    let focus = app
        .focused()
        .map(|id| format!(" | focus {id}"))
        .unwrap_or_default();
    let text = format!(
        " {}{} | line {}/{} | {} pending / {} proposals{}{} | {}",
        app.file_label(),
        modified,
        surface.scroll_top() + 1,
        surface.line_count(),
        manager.pending_ids().len(),
        manager.region_count(),
        streaming,
        focus,
        app.status_message,
    );
    let widget = Paragraph::new(text).style(Style::default().bg(Color::Blue).fg(Color::White));
    frame.render_widget(widget, area);
}

fn render_shortcuts(frame: &mut Frame, area: Rect) {
    let text = " Tab next | a/Enter accept | r reject | u undo | Esc close | ↑↓ PgUp/PgDn scroll | Ctrl+S save | q quit";
    let widget = Paragraph::new(text).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(widget, area);
}
