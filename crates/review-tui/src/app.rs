//! Review session state and input handling.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use proposal_core::{
    BufferSurface, CommandId, HighlightRegionManager, InputAdapter, PointerEvent, PopoverAction,
    ProposalStream, ReviewConfig, ReviewEvent, Surface, SurfaceEvent,
};
use ratatui::layout::Rect;
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};

const WHEEL_LINES: isize = 3;

pub struct App {
    manager: HighlightRegionManager<BufferSurface>,
    input: InputAdapter,
    doc_path: PathBuf,
    file_label: String,
    stream: ProposalStream,
    /// Transcript lines not yet fed to the parser (`--stream`).
    queued: VecDeque<String>,
    focused: Option<CommandId>,
    last_decided: Option<CommandId>,
    events: Receiver<String>,
    saved_version: u64,
    /// Inner editor area from the last frame, in terminal cells.
    editor_area: Rect,
    pub status_message: String,
    pub should_quit: bool,
    confirm_quit: bool,
}

impl App {
    pub fn new(doc_path: PathBuf, text: &str, config: ReviewConfig) -> Self {
        let file_label = doc_path.display().to_string();
        let surface = BufferSurface::new(file_label.clone(), text, 20);
        let saved_version = surface.version();
        let mut manager = HighlightRegionManager::new(surface, config);

        let (tx, events) = mpsc::channel();
        manager.subscribe(move |event| {
            if let Some(message) = describe_event(event) {
                let _ = tx.send(message);
            }
        });

        Self {
            manager,
            input: InputAdapter::new(),
            doc_path,
            file_label,
            stream: ProposalStream::new(),
            queued: VecDeque::new(),
            focused: None,
            last_decided: None,
            events,
            saved_version,
            editor_area: Rect::default(),
            status_message: String::new(),
            should_quit: false,
            confirm_quit: false,
        }
    }

    pub fn manager(&self) -> &HighlightRegionManager<BufferSurface> {
        &self.manager
    }

    pub fn file_label(&self) -> &str {
        &self.file_label
    }

    pub fn focused(&self) -> Option<&CommandId> {
        self.focused.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.manager.surface().version() != self.saved_version
    }

    pub fn is_streaming(&self) -> bool {
        !self.queued.is_empty()
    }

    /// Feed a proposal transcript. With `streaming`, one line is fed per [`App::tick`].
    pub fn load_transcript(&mut self, transcript: &str, streaming: bool) {
        if streaming {
            self.queued
                .extend(transcript.split_inclusive('\n').map(str::to_string));
        } else {
            self.feed(transcript);
        }
    }

    /// Per-frame housekeeping: advance the simulated stream and collect review events.
    pub fn tick(&mut self) {
        if let Some(line) = self.queued.pop_front() {
            self.feed(&line);
        }
        while let Ok(message) = self.events.try_recv() {
            self.status_message = message;
        }
    }

    fn feed(&mut self, chunk: &str) {
        let commands = self.stream.push(chunk);
        if commands.is_empty() {
            return;
        }
        let scroll = self.focused.is_none() && self.manager.popover().is_none();
        let outcome = self
            .manager
            .register_commands(&commands, &self.file_label, scroll);
        for skipped in &outcome.skipped {
            tracing::warn!(id = %skipped.id, reason = ?skipped.reason, "proposal skipped");
        }
        self.status_message = format!(
            "{} new proposal(s), {} skipped",
            outcome.registered,
            outcome.skipped.len()
        );
    }

    /// Record the inner editor area and resize the viewport to match.
    pub fn set_editor_area(&mut self, area: Rect) {
        self.editor_area = area;
        let lines = usize::from(area.height).max(1);
        if self.manager.surface().viewport_lines() != lines {
            self.manager.surface_mut().set_viewport_lines(lines);
            self.input.handle_surface(&mut self.manager, SurfaceEvent::Scrolled);
        }
    }

    pub fn handle_key_event(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.confirm_quit {
            self.confirm_quit = false;
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    if self.save().is_ok() {
                        self.should_quit = true;
                    }
                }
                KeyCode::Char('n') | KeyCode::Char('N') => self.should_quit = true,
                _ => self.status_message.clear(),
            }
            return;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('s') if ctrl => {
                let _ = self.save();
            }
            KeyCode::Char('x') | KeyCode::Char('c') if ctrl => self.request_quit(),
            KeyCode::Char('q') => self.request_quit(),
            KeyCode::Tab => self.focus_next(),
            KeyCode::Char('a') | KeyCode::Enter => self.decide(PopoverAction::Accept),
            KeyCode::Char('r') => self.decide(PopoverAction::Reject),
            KeyCode::Char('u') => self.undo_last(),
            KeyCode::Esc => {
                self.manager.close_popover();
                self.focused = None;
            }
            KeyCode::Up => self.scroll(-1),
            KeyCode::Down => self.scroll(1),
            KeyCode::PageUp => self.scroll(-self.page()),
            KeyCode::PageDown => self.scroll(self.page()),
            KeyCode::Home => {
                self.manager.surface_mut().set_scroll_top(0);
                self.input.handle_surface(&mut self.manager, SurfaceEvent::Scrolled);
            }
            _ => {}
        }
    }

    pub fn handle_mouse_event(&mut self, mouse: MouseEvent) {
        let point = self.to_surface_point(mouse.column, mouse.row);
        let event = match mouse.kind {
            MouseEventKind::Moved | MouseEventKind::Drag(_) => match point {
                Some((x, y)) => PointerEvent::Moved { x, y },
                None => PointerEvent::Left,
            },
            MouseEventKind::Down(MouseButton::Left) => {
                let Some((x, y)) = point else {
                    return;
                };
                PointerEvent::Pressed { x, y }
            }
            MouseEventKind::ScrollUp => {
                self.scroll(-WHEEL_LINES);
                return;
            }
            MouseEventKind::ScrollDown => {
                self.scroll(WHEEL_LINES);
                return;
            }
            _ => return,
        };

        match self.input.handle_pointer(&mut self.manager, event) {
            Ok(Some((action, id))) => {
                if action != PopoverAction::Undo {
                    self.last_decided = Some(id);
                }
                self.focused = None;
            }
            Ok(None) => {}
            Err(err) => self.status_message = err.to_string(),
        }
    }

    fn to_surface_point(&self, column: u16, row: u16) -> Option<(f32, f32)> {
        let area = self.editor_area;
        if column < area.x || row < area.y || column >= area.right() || row >= area.bottom() {
            return None;
        }
        Some((
            f32::from(column - area.x) + 0.5,
            f32::from(row - area.y) + 0.5,
        ))
    }

    fn page(&self) -> isize {
        isize::try_from(self.manager.surface().viewport_lines())
            .unwrap_or(1)
            .saturating_sub(1)
            .max(1)
    }

    fn scroll(&mut self, delta: isize) {
        self.manager.surface_mut().scroll_by(delta);
        self.input.handle_surface(&mut self.manager, SurfaceEvent::Scrolled);
    }

    fn focus_next(&mut self) {
        self.focused = self.manager.focus_next_pending(self.focused.as_ref());
        if self.focused.is_none() {
            self.status_message = "No pending proposals".to_string();
        }
    }

    /// The region a keyboard decision applies to: the open popover, else the focused region.
    fn target(&self) -> Option<CommandId> {
        self.manager
            .popover()
            .map(|popover| popover.region.clone())
            .or_else(|| self.focused.clone())
    }

    fn decide(&mut self, action: PopoverAction) {
        let Some(id) = self.target() else {
            self.status_message = "No proposal selected (Tab to focus one)".to_string();
            return;
        };
        match self.manager.action(action, &id) {
            Ok(()) => {
                let decided = self
                    .manager
                    .status(&id)
                    .is_some_and(|status| status.is_terminal());
                if decided {
                    self.last_decided = Some(id);
                    self.focused = None;
                }
            }
            Err(err) => self.status_message = err.to_string(),
        }
    }

    fn undo_last(&mut self) {
        let Some(id) = self.last_decided.clone() else {
            self.status_message = "Nothing to undo".to_string();
            return;
        };
        match self.manager.undo(&id) {
            Ok(()) => {
                self.last_decided = None;
                self.manager.pointer_enter(&id);
                self.focused = Some(id);
            }
            Err(err) => self.status_message = err.to_string(),
        }
    }

    fn request_quit(&mut self) {
        if self.is_dirty() {
            self.confirm_quit = true;
            self.status_message = "Document modified. Save? (y/n)".to_string();
        } else {
            self.should_quit = true;
        }
    }

    fn save(&mut self) -> io::Result<()> {
        let content = self.manager.surface().current_content();
        match fs::write(&self.doc_path, content) {
            Ok(()) => {
                self.saved_version = self.manager.surface().version();
                self.status_message = format!("Saved {}", self.doc_path.display());
                tracing::info!(path = %self.doc_path.display(), "document saved");
                Ok(())
            }
            Err(err) => {
                self.status_message = format!("Save failed: {err}");
                tracing::warn!(path = %self.doc_path.display(), %err, "save failed");
                Err(err)
            }
        }
    }
}

fn describe_event(event: &ReviewEvent) -> Option<String> {
    let message = match event {
        ReviewEvent::Accepted { id, mutated_count } => {
            format!("Accepted {id} ({mutated_count} change(s))")
        }
        ReviewEvent::Rejected { id } => format!("Rejected {id}"),
        ReviewEvent::Reverted { id } => format!("Reverted {id}"),
        ReviewEvent::ApplyFailed { id, error } => format!("Could not apply {id}: {error}"),
        ReviewEvent::RegionReplaced { id } => format!("Updated {id}"),
        ReviewEvent::RegionDropped { id } => format!("{id} no longer matches the document"),
        _ => return None,
    };
    Some(message)
}
