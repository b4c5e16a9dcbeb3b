//! Raw pointer and surface events to manager calls.
//!
//! Front-ends forward what they observe; the adapter hit-tests overlays and the popover and calls
//! [`HighlightRegionManager::pointer_enter`], [`HighlightRegionManager::pointer_leave`],
//! [`HighlightRegionManager::action`] or [`HighlightRegionManager::refresh`] accordingly.

use crate::error::ReviewError;
use crate::manager::HighlightRegionManager;
use crate::popover::PopoverAction;
use crate::protocol::CommandId;
use crate::surface::Surface;

/// Pointer input in surface units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    /// The pointer moved to `(x, y)`.
    Moved {
        /// Horizontal position.
        x: f32,
        /// Vertical position.
        y: f32,
    },
    /// A button was pressed at `(x, y)`.
    Pressed {
        /// Horizontal position.
        x: f32,
        /// Vertical position.
        y: f32,
    },
    /// The pointer left the surface.
    Left,
}

/// Changes to the surface that invalidate overlay geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// The viewport scrolled.
    Scrolled,
    /// The document content changed outside the manager.
    ContentChanged,
}

/// Hover tracking between pointer events.
#[derive(Debug, Default)]
pub struct InputAdapter {
    hovered: Option<CommandId>,
    over_popover: bool,
}

impl InputAdapter {
    /// Create an adapter with nothing hovered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Region currently under the pointer.
    pub fn hovered(&self) -> Option<&CommandId> {
        self.hovered.as_ref()
    }

    /// Translate a pointer event. Returns the popover action performed, if any.
    pub fn handle_pointer<S: Surface>(
        &mut self,
        manager: &mut HighlightRegionManager<S>,
        event: PointerEvent,
    ) -> Result<Option<(PopoverAction, CommandId)>, ReviewError> {
        match event {
            PointerEvent::Moved { x, y } => {
                if manager.popover().is_some_and(|p| p.contains(x, y)) {
                    if !self.over_popover {
                        self.over_popover = true;
                        manager.pointer_enter_popover();
                    }
                    return Ok(None);
                }
                if self.over_popover {
                    self.over_popover = false;
                    manager.pointer_leave_popover();
                }
                self.hover(manager, x, y);
                Ok(None)
            }
            PointerEvent::Pressed { x, y } => {
                let Some((action, id)) = manager
                    .popover()
                    .and_then(|p| p.button_at(x, y).map(|action| (action, p.region.clone())))
                else {
                    return Ok(None);
                };
                tracing::debug!(%id, ?action, "popover button pressed");
                self.hovered = None;
                self.over_popover = false;
                manager.action(action, &id)?;
                Ok(Some((action, id)))
            }
            PointerEvent::Left => {
                if let Some(previous) = self.hovered.take() {
                    manager.pointer_leave(&previous);
                }
                if self.over_popover {
                    self.over_popover = false;
                    manager.pointer_leave_popover();
                }
                Ok(None)
            }
        }
    }

    /// Translate a surface event: overlay geometry is recomputed.
    pub fn handle_surface<S: Surface>(
        &mut self,
        manager: &mut HighlightRegionManager<S>,
        event: SurfaceEvent,
    ) {
        tracing::trace!(?event, "surface changed");
        manager.refresh();
        let stale = self
            .hovered
            .as_ref()
            .is_some_and(|id| manager.region(id).is_none_or(|r| r.overlays.is_empty()));
        if stale {
            self.hovered = None;
        }
    }

    fn hover<S: Surface>(&mut self, manager: &mut HighlightRegionManager<S>, x: f32, y: f32) {
        let hit = manager
            .overlays()
            .into_iter()
            .rev()
            .find(|overlay| overlay.contains(x, y))
            .map(|overlay| overlay.region.clone());
        if hit == self.hovered {
            return;
        }
        if let Some(previous) = self.hovered.take() {
            manager.pointer_leave(&previous);
        }
        if let Some(id) = &hit {
            manager.pointer_enter(id);
        }
        self.hovered = hit;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReviewConfig;
    use crate::protocol::EditCommand;
    use crate::region::RegionStatus;
    use crate::surface::BufferSurface;

    fn setup() -> (HighlightRegionManager<BufferSurface>, EditCommand) {
        let surface = BufferSurface::new("a.txt", "Hello world\nsecond line", 10);
        let mut manager = HighlightRegionManager::new(surface, ReviewConfig::for_cell_grid());
        let command = EditCommand::replace("a.txt", "world", "there");
        manager.register_commands(std::slice::from_ref(&command), "a.txt", false);
        (manager, command)
    }

    #[test]
    fn test_hover_opens_and_leaving_closes() {
        let (mut manager, command) = setup();
        let mut input = InputAdapter::new();

        input
            .handle_pointer(&mut manager, PointerEvent::Moved { x: 7.5, y: 0.5 })
            .unwrap();
        assert_eq!(input.hovered(), Some(command.id()));
        assert!(manager.popover().is_some());

        input
            .handle_pointer(&mut manager, PointerEvent::Moved { x: 0.5, y: 5.5 })
            .unwrap();
        assert_eq!(input.hovered(), None);
        assert!(manager.popover().is_none());
    }

    #[test]
    fn test_moving_onto_popover_keeps_it_open() {
        let (mut manager, command) = setup();
        let mut input = InputAdapter::new();
        input
            .handle_pointer(&mut manager, PointerEvent::Moved { x: 7.5, y: 0.5 })
            .unwrap();

        // The popover sits on the row below the overlay.
        input
            .handle_pointer(&mut manager, PointerEvent::Moved { x: 8.5, y: 1.5 })
            .unwrap();
        assert!(manager.popover().is_some());

        let performed = input
            .handle_pointer(&mut manager, PointerEvent::Pressed { x: 8.5, y: 1.5 })
            .unwrap();
        assert_eq!(performed, Some((PopoverAction::Accept, command.id().clone())));
        assert_eq!(manager.status(command.id()), Some(RegionStatus::Accepted));
        assert_eq!(
            manager.surface().current_content(),
            "Hello there\nsecond line"
        );
    }

    #[test]
    fn test_press_outside_popover_is_ignored() {
        let (mut manager, _) = setup();
        let mut input = InputAdapter::new();
        let performed = input
            .handle_pointer(&mut manager, PointerEvent::Pressed { x: 0.5, y: 0.5 })
            .unwrap();
        assert_eq!(performed, None);
    }

    #[test]
    fn test_scrolling_away_clears_hover() {
        let (mut manager, command) = setup();
        let mut input = InputAdapter::new();
        input
            .handle_pointer(&mut manager, PointerEvent::Moved { x: 7.5, y: 0.5 })
            .unwrap();
        assert_eq!(input.hovered(), Some(command.id()));

        manager.surface_mut().set_scroll_top(1);
        input.handle_surface(&mut manager, SurfaceEvent::Scrolled);
        assert_eq!(input.hovered(), None);
        assert!(manager.popover().is_none());
    }
}
