#![warn(missing_docs)]
//! Proposal Core - Headless Review Engine for Generated Edits
//!
//! # Overview
//!
//! `proposal-core` lets an external text generator propose edits to a live document and lets a
//! human accept or reject each one with a diff preview anchored where the edit lands. It never
//! owns the document or draws anything: the host provides a [`Surface`] (content, coordinates,
//! scrolling) and renders the overlays and popover the core computes.
//!
//! # Core Features
//!
//! - **Streaming Protocol Parser**: delimited REPLACE/INSERT blocks, tolerant of partial input
//! - **Two-Pass Diff**: prefix/suffix collapse, then a token-level LCS alignment
//! - **Anchor Resolution**: literal and regex search, AFTER/BEFORE insertion anchors
//! - **Atomic Apply & Undo**: one mutation batch per edit, inverse kept for the last accept
//! - **Viewport-Aware Regions**: overlays rebuilt on refresh, singleton popover, change events
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  HighlightRegionManager + InputAdapter      │  ← Public API
//! ├─────────────────────────────────────────────┤
//! │  Overlay Geometry + Popover                 │  ← Rendering Data
//! ├─────────────────────────────────────────────┤
//! │  Edit Applier (mutations, inverse)          │  ← Document Writes
//! ├─────────────────────────────────────────────┤
//! │  Anchor Resolver                            │  ← Positions
//! ├─────────────────────────────────────────────┤
//! │  Protocol Parser + Diff Engine              │  ← Pure Text
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use proposal_core::{BufferSurface, HighlightRegionManager, PopoverAction, ReviewConfig, Surface};
//! use proposal_core::protocol::ProposalStream;
//!
//! let mut stream = ProposalStream::new();
//! let mut commands = stream.push("I'd change it:\n<<<REPLACE>>>\nFILE: notes.txt\n<<<SEARCH>>>\nteh\n");
//! assert!(commands.is_empty());
//! commands.extend(stream.push("<<<WITH>>>\nthe\n<<<END>>>\n"));
//! assert_eq!(commands.len(), 1);
//!
//! let surface = BufferSurface::new("notes.txt", "teh cat", 20);
//! let mut manager = HighlightRegionManager::new(surface, ReviewConfig::default());
//! manager.register_commands(&commands, "notes.txt", true);
//!
//! let id = commands[0].id().clone();
//! manager.action(PopoverAction::Accept, &id).unwrap();
//! assert_eq!(manager.surface().current_content(), "the cat");
//!
//! manager.undo(&id).unwrap();
//! assert_eq!(manager.surface().current_content(), "teh cat");
//! ```
//!
//! # Module Description
//!
//! - [`protocol`] - edit protocol parsing and streaming
//! - [`diff`] - character and word diffs
//! - [`anchors`] - match positions and insertion points
//! - [`apply`] - mutation planning, application and inversion
//! - [`surface`] - the document contract and a rope-backed implementation
//! - [`overlay`] - overlay geometry
//! - [`popover`] - popover layout and actions
//! - [`manager`] - the region registry and review state machine
//! - [`input`] - pointer and surface event translation

pub mod anchors;
pub mod apply;
pub mod config;
pub mod diff;
pub mod error;
pub mod input;
pub mod manager;
pub mod overlay;
pub mod paths;
pub mod popover;
pub mod protocol;
pub mod region;
pub mod surface;
mod text;

pub use anchors::{MatchPosition, Resolution, find_match_positions, resolve_command, resolve_insertion_point};
pub use apply::{ApplyReport, apply_command, inverse_mutations, plan_mutations, proposed_text};
pub use config::ReviewConfig;
pub use diff::{DiffResult, SegmentClass, WordDiff, WordSegment, compute_diff, compute_word_diff};
pub use error::{ErrorKind, ReviewError, SurfaceError};
pub use input::{InputAdapter, PointerEvent, SurfaceEvent};
pub use manager::{
    HighlightRegionManager, RegisterOutcome, ReviewEvent, ReviewEventCallback, SkipReason,
    SkippedCommand,
};
pub use overlay::{Overlay, OverlayId, OverlayKind};
pub use paths::{FileMatch, match_file};
pub use popover::{Popover, PopoverAction};
pub use protocol::{
    Anchors, CommandId, CommandKind, EditCommand, EditTarget, ParseIssue, ParseOutput,
    ProposalStream, parse_commands,
};
pub use region::{HighlightRegion, RegionStatus};
pub use surface::{BufferSurface, CoordinateProvider, GridMetrics, Mutation, Rect, Surface};
