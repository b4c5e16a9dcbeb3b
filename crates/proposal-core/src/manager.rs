//! Highlight Region Manager
//!
//! Tracks every proposed edit against a live [`Surface`] and drives its review.
//!
//! # Overview
//!
//! The manager owns:
//!
//! - **Region registry**: exactly one [`HighlightRegion`] per command id
//! - **Overlays**: viewport-aware rectangles per region, rebuilt on [`refresh`](HighlightRegionManager::refresh)
//! - **Popover**: a strict singleton with a word-level preview and Accept/Reject buttons
//! - **Undo**: the inverse of the single most recent accept
//! - **Change notifications**: [`ReviewEvent`] callbacks
//!
//! # Example
//!
//! ```rust
//! use proposal_core::{BufferSurface, HighlightRegionManager, PopoverAction, ReviewConfig, Surface};
//! use proposal_core::protocol::parse_commands;
//!
//! let surface = BufferSurface::new("greeting.txt", "Hello world", 10);
//! let mut manager = HighlightRegionManager::new(surface, ReviewConfig::default());
//!
//! let text = "<<<REPLACE>>>\nFILE: greeting.txt\n<<<SEARCH>>>\nworld\n<<<WITH>>>\nthere\n<<<END>>>";
//! let commands = parse_commands(text).commands;
//! let outcome = manager.register_commands(&commands, "greeting.txt", false);
//! assert_eq!(outcome.registered, 1);
//!
//! manager.subscribe(|event| println!("review event: {:?}", event));
//! manager.action(PopoverAction::Accept, commands[0].id()).unwrap();
//! assert_eq!(manager.surface().current_content(), "Hello there");
//! ```

use crate::anchors::{MatchPosition, resolve_command};
use crate::apply::{ApplyReport, apply_command, proposed_text};
use crate::config::ReviewConfig;
use crate::error::{ErrorKind, ReviewError};
use crate::overlay::{Overlay, OverlayId, OverlayIdAllocator, build_overlays, span_visible};
use crate::paths::match_file;
use crate::popover::{Popover, PopoverAction, PopoverSlot};
use crate::protocol::{CommandId, EditCommand};
use crate::region::{HighlightRegion, RegionStatus};
use crate::surface::Surface;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Something observable happened to a region.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewEvent {
    /// A new region was registered.
    RegionCreated {
        /// Region id.
        id: CommandId,
    },
    /// A region was re-registered with a different payload.
    RegionReplaced {
        /// Region id.
        id: CommandId,
    },
    /// A region was removed (explicitly, or because it no longer resolves).
    RegionDropped {
        /// Region id.
        id: CommandId,
    },
    /// Overlays were created for a region.
    OverlaysCreated {
        /// Region id.
        id: CommandId,
        /// New overlay ids.
        overlays: Vec<OverlayId>,
    },
    /// Overlays of a region were torn down.
    OverlaysRemoved {
        /// Region id.
        id: CommandId,
        /// Removed overlay ids.
        overlays: Vec<OverlayId>,
    },
    /// The popover opened on a region.
    PopoverOpened {
        /// Region id.
        id: CommandId,
    },
    /// The popover closed.
    PopoverClosed {
        /// Region id.
        id: CommandId,
    },
    /// An edit was applied.
    Accepted {
        /// Region id.
        id: CommandId,
        /// Number of spans rewritten.
        mutated_count: usize,
    },
    /// An edit was dismissed.
    Rejected {
        /// Region id.
        id: CommandId,
    },
    /// Applying an edit failed.
    ApplyFailed {
        /// Region id.
        id: CommandId,
        /// The failure.
        error: ReviewError,
    },
    /// A decision was undone; the region is pending again.
    Reverted {
        /// Region id.
        id: CommandId,
    },
}

/// Review event callback type.
pub type ReviewEventCallback = Box<dyn FnMut(&ReviewEvent) + Send>;

/// Why a command did not produce a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The command targets another file.
    FileMismatch {
        /// The command's file.
        file: String,
    },
    /// The command does not resolve in the current document.
    Unresolved {
        /// Machine-readable reason.
        kind: ErrorKind,
        /// Human-readable message.
        message: String,
    },
}

/// A command that was not registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedCommand {
    /// Command id.
    pub id: CommandId,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// Result of [`HighlightRegionManager::register_commands`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterOutcome {
    /// Regions created or replaced.
    pub registered: usize,
    /// Commands identical to an existing region (no-ops).
    pub unchanged: usize,
    /// Commands that did not produce a region.
    pub skipped: Vec<SkippedCommand>,
}

impl RegisterOutcome {
    /// Returns `true` if at least one command is tracked after the call.
    pub fn is_success(&self) -> bool {
        self.registered + self.unchanged > 0
    }
}

/// Region registry and review state machine bound to one document surface.
///
/// `S` may be an owned surface or a `&mut` borrow of one.
pub struct HighlightRegionManager<S: Surface> {
    surface: S,
    config: ReviewConfig,
    regions: HashMap<CommandId, HighlightRegion>,
    popover: PopoverSlot,
    overlay_ids: OverlayIdAllocator,
    last_accept: Option<(CommandId, ApplyReport)>,
    callbacks: Vec<ReviewEventCallback>,
}

impl<S: Surface> HighlightRegionManager<S> {
    /// Create a manager over `surface`.
    pub fn new(surface: S, config: ReviewConfig) -> Self {
        Self {
            surface,
            config,
            regions: HashMap::new(),
            popover: PopoverSlot::default(),
            overlay_ids: OverlayIdAllocator::default(),
            last_accept: None,
            callbacks: Vec::new(),
        }
    }

    /// The document surface.
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Mutable access to the surface. Call [`refresh`](Self::refresh) after scrolling or editing.
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Consume the manager and return the surface.
    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Active configuration.
    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    /// Subscribe to review events.
    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&ReviewEvent) + Send + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    fn emit(&mut self, event: ReviewEvent) {
        for callback in &mut self.callbacks {
            callback(&event);
        }
    }

    fn resolve(
        &self,
        content: &str,
        command: &EditCommand,
    ) -> Result<(MatchPosition, String), ReviewError> {
        let primary = resolve_command(content, command)?.primary();
        let proposed = proposed_text(content, command, &primary)?;
        Ok((primary, proposed))
    }

    /// Register proposed edits against the open document.
    ///
    /// Commands for other files are skipped. A command identical to an existing region is a
    /// no-op; a changed payload replaces the region (old overlays are removed first). A command
    /// that no longer resolves drops any region registered under its id. With `should_scroll`,
    /// the first registered match is scrolled into the center of the view.
    pub fn register_commands(
        &mut self,
        commands: &[EditCommand],
        current_file: &str,
        should_scroll: bool,
    ) -> RegisterOutcome {
        let mut outcome = RegisterOutcome::default();
        let open_file = self.surface.current_open_file();
        let file_is_open = match_file(current_file, &open_file, false).is_some();
        if !file_is_open {
            tracing::warn!(current_file, open_file, "registering against a file that is not open");
        }

        let content = self.surface.current_content();
        let mut scroll_target: Option<usize> = None;

        for command in commands {
            let id = command.id().clone();
            if !file_is_open
                || match_file(command.file(), current_file, self.config.basename_fallback).is_none()
            {
                tracing::debug!(%id, file = command.file(), "skipping command for another file");
                outcome.skipped.push(SkippedCommand {
                    id,
                    reason: SkipReason::FileMismatch {
                        file: command.file().to_string(),
                    },
                });
                continue;
            }

            if let Some(existing) = self.regions.get(&id)
                && existing.command == *command
            {
                if existing.is_pending() {
                    scroll_target.get_or_insert(existing.from);
                }
                outcome.unchanged += 1;
                continue;
            }

            let (primary, proposed) = match self.resolve(&content, command) {
                Ok(resolved) => resolved,
                Err(err) => {
                    tracing::debug!(%id, %err, "command does not resolve");
                    if self.regions.contains_key(&id) {
                        self.drop_region(&id);
                    }
                    outcome.skipped.push(SkippedCommand {
                        id,
                        reason: SkipReason::Unresolved {
                            kind: err.kind(),
                            message: err.to_string(),
                        },
                    });
                    continue;
                }
            };

            let replaced = self.regions.contains_key(&id);
            if replaced {
                self.clear_overlays(&id);
                if self.last_accept.as_ref().is_some_and(|(last, _)| last == &id) {
                    self.last_accept = None;
                }
            }

            let region = HighlightRegion::new(command.clone(), primary, proposed);
            scroll_target.get_or_insert(region.from);
            self.regions.insert(id.clone(), region);
            if replaced {
                self.emit(ReviewEvent::RegionReplaced { id: id.clone() });
            } else {
                self.emit(ReviewEvent::RegionCreated { id: id.clone() });
            }
            self.rebuild_overlays(&id);
            outcome.registered += 1;
        }

        if should_scroll && let Some(offset) = scroll_target {
            self.surface.scroll_to_offset(offset);
            self.refresh();
        }

        tracing::debug!(
            registered = outcome.registered,
            unchanged = outcome.unchanged,
            skipped = outcome.skipped.len(),
            "registered commands"
        );
        outcome
    }

    /// Remove one region, tearing down its overlays and popover. Returns `false` if unknown.
    pub fn remove_region(&mut self, id: &CommandId) -> bool {
        if !self.regions.contains_key(id) {
            return false;
        }
        self.drop_region(id);
        true
    }

    /// Remove every region. Returns how many were removed.
    pub fn remove_all(&mut self) -> usize {
        let mut ids: Vec<CommandId> = self.regions.keys().cloned().collect();
        ids.sort();
        for id in &ids {
            self.drop_region(id);
        }
        self.last_accept = None;
        ids.len()
    }

    /// Status of a region, `None` if no region is registered under `id`.
    pub fn status(&self, id: &CommandId) -> Option<RegionStatus> {
        self.regions.get(id).map(|region| region.status)
    }

    /// A region by id.
    pub fn region(&self, id: &CommandId) -> Option<&HighlightRegion> {
        self.regions.get(id)
    }

    /// Number of registered regions (any status).
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Pending region ids in document order.
    pub fn pending_ids(&self) -> Vec<CommandId> {
        let mut pending: Vec<&HighlightRegion> =
            self.regions.values().filter(|r| r.is_pending()).collect();
        pending.sort_by(|a, b| a.from.cmp(&b.from).then_with(|| a.id.cmp(&b.id)));
        pending.into_iter().map(|r| r.id.clone()).collect()
    }

    /// Every live overlay, ordered by id (creation order).
    pub fn overlays(&self) -> Vec<&Overlay> {
        let mut overlays: Vec<&Overlay> =
            self.regions.values().flat_map(|r| r.overlays.iter()).collect();
        overlays.sort_by_key(|o| o.id);
        overlays
    }

    /// The open popover, if any.
    pub fn popover(&self) -> Option<&Popover> {
        self.popover.current()
    }

    /// Re-resolve every pending region against the current document and viewport.
    ///
    /// Regions that no longer resolve are dropped. Overlays are rebuilt for regions with a
    /// visible end; the others keep their record with no overlays.
    pub fn refresh(&mut self) {
        let content = self.surface.current_content();
        let mut pending: Vec<CommandId> = self
            .regions
            .values()
            .filter(|r| r.is_pending())
            .map(|r| r.id.clone())
            .collect();
        pending.sort();

        let mut dropped = 0usize;
        for id in pending {
            let Some(command) = self.regions.get(&id).map(|r| r.command.clone()) else {
                continue;
            };
            match self.resolve(&content, &command) {
                Ok((primary, proposed)) => {
                    self.clear_overlays_keep_popover(&id);
                    if let Some(region) = self.regions.get_mut(&id) {
                        region.relocate(primary, proposed);
                    }
                    self.rebuild_overlays(&id);
                    self.relayout_popover(&id);
                }
                Err(err) => {
                    tracing::debug!(%id, %err, "dropping region that no longer resolves");
                    self.drop_region(&id);
                    dropped += 1;
                }
            }
        }
        tracing::debug!(regions = self.regions.len(), dropped, "refreshed regions");
    }

    /// Apply a pending region's edit on behalf of an external caller.
    ///
    /// Failure is terminal: the region moves to [`RegionStatus::Error`].
    pub fn apply(&mut self, id: &CommandId) -> Result<ApplyReport, ReviewError> {
        let command = self.pending_command(id, "apply")?;
        match apply_command(&mut self.surface, &command) {
            Ok(report) => {
                self.finish_accept(id, report.clone());
                Ok(report)
            }
            Err(err) => {
                tracing::warn!(%id, %err, "apply failed");
                self.clear_overlays(id);
                if let Some(region) = self.regions.get_mut(id) {
                    region.status = RegionStatus::Error;
                    region.last_error = Some(err.clone());
                }
                self.emit(ReviewEvent::ApplyFailed {
                    id: id.clone(),
                    error: err.clone(),
                });
                Err(err)
            }
        }
    }

    /// Handle a popover action on a region.
    ///
    /// A failed Accept leaves the region pending with `last_error` set and its overlays intact.
    pub fn action(&mut self, action: PopoverAction, id: &CommandId) -> Result<(), ReviewError> {
        match action {
            PopoverAction::Accept => {
                let command = self.pending_command(id, "accept")?;
                match apply_command(&mut self.surface, &command) {
                    Ok(report) => {
                        self.finish_accept(id, report);
                        Ok(())
                    }
                    Err(err) => {
                        tracing::warn!(%id, %err, "accept failed");
                        if let Some(region) = self.regions.get_mut(id) {
                            region.last_error = Some(err.clone());
                        }
                        self.popover.set_error(id, err.to_string());
                        self.emit(ReviewEvent::ApplyFailed {
                            id: id.clone(),
                            error: err.clone(),
                        });
                        Err(err)
                    }
                }
            }
            PopoverAction::Reject => {
                self.pending_command(id, "reject")?;
                self.clear_overlays(id);
                if let Some(region) = self.regions.get_mut(id) {
                    region.status = RegionStatus::Rejected;
                    region.last_error = None;
                }
                tracing::info!(%id, "rejected edit");
                self.emit(ReviewEvent::Rejected { id: id.clone() });
                Ok(())
            }
            PopoverAction::Undo => self.undo(id),
        }
    }

    /// Undo the decision on a region and return it to pending.
    ///
    /// An accepted region can only be undone if it was the most recent accept and the document
    /// still holds the text it inserted. A rejected region is re-resolved against the current
    /// document. Once an accept has been reverted the call succeeds: if the region no longer
    /// resolves against the restored document it is dropped instead of returning to pending.
    pub fn undo(&mut self, id: &CommandId) -> Result<(), ReviewError> {
        let Some(region) = self.regions.get(id) else {
            return Err(ReviewError::UnknownRegion(id.to_string()));
        };

        let status = region.status;
        let reverted = match status {
            RegionStatus::Accepted => {
                let Some((_, report)) = self.last_accept.as_ref().filter(|(last, _)| last == id)
                else {
                    return Err(ReviewError::UndoUnavailable {
                        id: id.to_string(),
                        reason: "only the most recent accept can be undone".to_string(),
                    });
                };
                let content = self.surface.current_content();
                if let Some(offset) = report.revert_conflict(&content) {
                    return Err(ReviewError::UndoUnavailable {
                        id: id.to_string(),
                        reason: format!("the document changed at offset {}", offset),
                    });
                }
                self.surface.apply_mutations(&report.inverse)?;
                self.last_accept = None;
                true
            }
            RegionStatus::Rejected => false,
            status => {
                return Err(ReviewError::InvalidTransition {
                    id: id.to_string(),
                    status,
                    action: "undo",
                });
            }
        };

        let content = self.surface.current_content();
        let resolved =
            region_command(&self.regions, id).and_then(|command| self.resolve(&content, &command));
        let (primary, proposed) = match resolved {
            Ok(found) => found,
            Err(err) if reverted => {
                tracing::warn!(%id, %err, "reverted region no longer resolves, dropping it");
                self.emit(ReviewEvent::Reverted { id: id.clone() });
                self.drop_region(id);
                self.refresh();
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        if let Some(region) = self.regions.get_mut(id) {
            region.relocate(primary, proposed);
            region.status = RegionStatus::Pending;
            region.last_error = None;
        }
        tracing::info!(%id, "undid decision");
        self.emit(ReviewEvent::Reverted { id: id.clone() });
        self.refresh();
        Ok(())
    }

    /// The pointer entered a region: open its popover (closing any other).
    ///
    /// Returns `true` if a popover is open on the region afterwards.
    pub fn pointer_enter(&mut self, id: &CommandId) -> bool {
        if self.popover.is_open_for(id) {
            return true;
        }
        let Some(region) = self.regions.get(id).filter(|r| r.is_pending()) else {
            return false;
        };
        let Some(popover) = Popover::build(region, &region.overlays, &self.config) else {
            return false;
        };
        if let Some(closed) = self.popover.open(popover) {
            self.emit(ReviewEvent::PopoverClosed { id: closed });
        }
        self.emit(ReviewEvent::PopoverOpened { id: id.clone() });
        true
    }

    /// The pointer left a region: close its popover unless the pointer moved onto it.
    pub fn pointer_leave(&mut self, id: &CommandId) {
        if self.popover.is_open_for(id) && !self.popover.pointer_inside() {
            self.close_popover();
        }
    }

    /// The pointer moved onto the popover.
    pub fn pointer_enter_popover(&mut self) {
        self.popover.set_pointer_inside(true);
    }

    /// The pointer left the popover: close it.
    pub fn pointer_leave_popover(&mut self) {
        self.popover.set_pointer_inside(false);
        self.close_popover();
    }

    /// Close the popover if one is open.
    pub fn close_popover(&mut self) {
        if let Some(closed) = self.popover.close() {
            self.emit(ReviewEvent::PopoverClosed { id: closed });
        }
    }

    /// Scroll to the next pending region after `after` (document order, wrapping) and open its
    /// popover. Returns the focused id.
    pub fn focus_next_pending(&mut self, after: Option<&CommandId>) -> Option<CommandId> {
        let pending = self.pending_ids();
        let next = match after.and_then(|a| pending.iter().position(|id| id == a)) {
            Some(idx) => pending.get((idx + 1) % pending.len()),
            None => pending.first(),
        }?
        .clone();

        let from = self.regions.get(&next)?.from;
        self.surface.scroll_to_offset(from);
        self.refresh();
        self.pointer_enter(&next);
        Some(next)
    }

    fn pending_command(&self, id: &CommandId, action: &'static str) -> Result<EditCommand, ReviewError> {
        let region = self
            .regions
            .get(id)
            .ok_or_else(|| ReviewError::UnknownRegion(id.to_string()))?;
        if !region.is_pending() {
            return Err(ReviewError::InvalidTransition {
                id: id.to_string(),
                status: region.status,
                action,
            });
        }
        Ok(region.command.clone())
    }

    fn finish_accept(&mut self, id: &CommandId, report: ApplyReport) {
        self.clear_overlays(id);
        if let Some(region) = self.regions.get_mut(id) {
            region.status = RegionStatus::Accepted;
            region.last_error = None;
        }
        let mutated_count = report.mutated_count;
        self.last_accept = Some((id.clone(), report));
        tracing::info!(%id, mutated_count, "accepted edit");
        self.emit(ReviewEvent::Accepted {
            id: id.clone(),
            mutated_count,
        });
        self.refresh();
    }

    fn drop_region(&mut self, id: &CommandId) {
        self.clear_overlays(id);
        if self.regions.remove(id).is_some() {
            if self.last_accept.as_ref().is_some_and(|(last, _)| last == id) {
                self.last_accept = None;
            }
            self.emit(ReviewEvent::RegionDropped { id: id.clone() });
        }
    }

    /// Tear down a region's overlays and its popover.
    fn clear_overlays(&mut self, id: &CommandId) {
        if self.popover.is_open_for(id) {
            self.close_popover();
        }
        self.clear_overlays_keep_popover(id);
    }

    fn clear_overlays_keep_popover(&mut self, id: &CommandId) {
        let removed: Vec<OverlayId> = match self.regions.get_mut(id) {
            Some(region) => region.overlays.drain(..).map(|o| o.id).collect(),
            None => return,
        };
        if !removed.is_empty() {
            self.emit(ReviewEvent::OverlaysRemoved {
                id: id.clone(),
                overlays: removed,
            });
        }
    }

    fn rebuild_overlays(&mut self, id: &CommandId) {
        let Some(region) = self.regions.get(id) else {
            return;
        };
        let overlays = if region.is_pending() && span_visible(&self.surface, region.from, region.to) {
            build_overlays(region, &self.surface, &self.config, &mut self.overlay_ids)
        } else {
            Vec::new()
        };
        if overlays.is_empty() {
            return;
        }

        let created: Vec<OverlayId> = overlays.iter().map(|o| o.id).collect();
        if let Some(region) = self.regions.get_mut(id) {
            region.overlays = overlays;
        }
        self.emit(ReviewEvent::OverlaysCreated {
            id: id.clone(),
            overlays: created,
        });
    }

    /// Keep an open popover attached to its region's new overlays, or close it if none remain.
    fn relayout_popover(&mut self, id: &CommandId) {
        if !self.popover.is_open_for(id) {
            return;
        }
        let relaid = self
            .regions
            .get(id)
            .and_then(|region| Popover::build(region, &region.overlays, &self.config));
        match relaid {
            Some(popover) => {
                let inside = self.popover.pointer_inside();
                self.popover.open(popover);
                self.popover.set_pointer_inside(inside);
            }
            None => self.close_popover(),
        }
    }
}

fn region_command(
    regions: &HashMap<CommandId, HighlightRegion>,
    id: &CommandId,
) -> Result<EditCommand, ReviewError> {
    regions
        .get(id)
        .map(|region| region.command.clone())
        .ok_or_else(|| ReviewError::UnknownRegion(id.to_string()))
}
