#![warn(missing_docs)]
//! Proposal Core Bridge - Request/Response Plumbing for Review Sessions
//!
//! # Overview
//!
//! A review session usually lives next to the document it edits, while the generator that
//! produces proposals lives somewhere else. This crate carries JSON request/response envelopes
//! between the two: a [`BridgeClient`] on the generator side and a [`BridgeHost`] that dispatches
//! onto a [`proposal_core::HighlightRegionManager`] on the document side.
//!
//! Every request carries a correlation id. Edit-style requests get the configured edit timeout,
//! bulk content reads get the longer bulk-read timeout. An unanswered request resolves to a
//! `request_timeout` failure and any late answer for it is dropped.
//!
//! # Quick Start
//!
//! ```rust
//! use proposal_core::{BufferSurface, HighlightRegionManager, ReviewConfig};
//! use proposal_core_bridge::{BridgeClient, BridgeHost, BridgeRequest, ChannelTransport};
//!
//! let (client_end, host_end) = ChannelTransport::pair();
//! let config = ReviewConfig::default();
//! let mut client = BridgeClient::new(client_end, &config);
//! let mut host = BridgeHost::new(host_end);
//! let mut manager = HighlightRegionManager::new(BufferSurface::new("a.txt", "abc", 10), config);
//!
//! let id = client.send(BridgeRequest::ReadContent).unwrap();
//! host.pump(&mut manager).unwrap();
//! client.poll().unwrap();
//! let response = client.take_result(id).unwrap();
//! assert_eq!(response.result["content"], "abc");
//! ```

pub mod client;
pub mod envelope;
pub mod error;
pub mod host;
pub mod transport;

pub use client::BridgeClient;
pub use envelope::{BridgeRequest, FailureBody, RequestEnvelope, ResponseEnvelope, TimeoutClass};
pub use error::BridgeError;
pub use host::{BridgeHost, Navigator};
pub use transport::{ChannelTransport, Transport};
