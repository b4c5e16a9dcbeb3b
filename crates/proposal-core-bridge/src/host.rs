//! Answering side of the bridge: dispatches requests onto a region manager.

use crate::envelope::{BridgeRequest, RequestEnvelope, ResponseEnvelope};
use crate::error::BridgeError;
use crate::transport::Transport;
use proposal_core::{HighlightRegionManager, Surface, match_file};
use serde_json::{Value, json};
use std::time::Duration;

/// Opens a file in the host surface. Returns a message on failure.
pub type Navigator<S> = Box<dyn FnMut(&mut S, &str) -> Result<(), String> + Send>;

/// Serves bridge requests against a [`HighlightRegionManager`].
pub struct BridgeHost<T: Transport, S: Surface> {
    transport: T,
    navigator: Option<Navigator<S>>,
}

impl<T: Transport, S: Surface> BridgeHost<T, S> {
    /// Create a host without file navigation support.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            navigator: None,
        }
    }

    /// Install the callback used for `navigate_to_file`.
    pub fn with_navigator<F>(mut self, navigator: F) -> Self
    where
        F: FnMut(&mut S, &str) -> Result<(), String> + Send + 'static,
    {
        self.navigator = Some(Box::new(navigator));
        self
    }

    /// Answer every request that is already waiting. Returns how many were handled.
    pub fn pump(&mut self, manager: &mut HighlightRegionManager<S>) -> Result<usize, BridgeError> {
        let mut handled = 0usize;
        while let Some(message) = self.transport.try_recv()? {
            self.answer(manager, &message)?;
            handled += 1;
        }
        Ok(handled)
    }

    /// Wait up to `timeout` for a request, then answer it and everything queued behind it.
    pub fn pump_blocking(
        &mut self,
        manager: &mut HighlightRegionManager<S>,
        timeout: Duration,
    ) -> Result<usize, BridgeError> {
        let Some(message) = self.transport.recv_timeout(timeout)? else {
            return Ok(0);
        };
        self.answer(manager, &message)?;
        Ok(1 + self.pump(manager)?)
    }

    fn answer(&mut self, manager: &mut HighlightRegionManager<S>, message: &str) -> Result<(), BridgeError> {
        let response = match serde_json::from_str::<RequestEnvelope>(message) {
            Ok(envelope) => self.dispatch(manager, envelope),
            Err(err) => {
                let id = serde_json::from_str::<Value>(message)
                    .ok()
                    .and_then(|value| value.get("id").and_then(Value::as_u64));
                let Some(id) = id else {
                    tracing::warn!(%err, "dropping bridge request without an id");
                    return Ok(());
                };
                ResponseEnvelope::failure(id, "malformed_request", err.to_string())
            }
        };
        self.transport.send(serde_json::to_string(&response)?)
    }

    /// Execute one request and build its response.
    pub fn dispatch(
        &mut self,
        manager: &mut HighlightRegionManager<S>,
        envelope: RequestEnvelope,
    ) -> ResponseEnvelope {
        let RequestEnvelope { id, request } = envelope;
        tracing::debug!(id, request = request.name(), "handling bridge request");

        match request {
            BridgeRequest::RegisterCommands {
                commands,
                current_file,
                should_scroll,
            } => {
                let outcome = manager.register_commands(&commands, &current_file, should_scroll);
                match serde_json::to_value(&outcome) {
                    Ok(result) => ResponseEnvelope::success(id, result),
                    Err(err) => ResponseEnvelope::failure(id, "internal", err.to_string()),
                }
            }
            BridgeRequest::NavigateToFile { file } => {
                let Some(navigator) = self.navigator.as_mut() else {
                    return ResponseEnvelope::failure(id, "unsupported", "host cannot open files");
                };
                let previous = manager.surface().current_open_file();
                if let Err(message) = navigator(manager.surface_mut(), &file) {
                    return ResponseEnvelope::failure(id, "navigation_failed", message);
                }
                let opened = manager.surface().current_open_file();
                if match_file(&previous, &opened, false).is_none() {
                    manager.remove_all();
                }
                ResponseEnvelope::success(id, json!({ "file": opened }))
            }
            BridgeRequest::Apply { id: region } => match manager.apply(&region) {
                Ok(report) => ResponseEnvelope::success(id, json!({ "mutated_count": report.mutated_count })),
                Err(err) => ResponseEnvelope::from_error(id, &err),
            },
            BridgeRequest::RemoveRegion { id: region } => {
                ResponseEnvelope::success(id, json!({ "removed": manager.remove_region(&region) }))
            }
            BridgeRequest::RemoveAll => {
                ResponseEnvelope::success(id, json!({ "removed": manager.remove_all() }))
            }
            BridgeRequest::GetStatus { id: region } => {
                let status = match manager.status(&region) {
                    Some(status) => serde_json::to_value(status).unwrap_or(Value::Null),
                    None => json!("none"),
                };
                ResponseEnvelope::success(id, json!({ "status": status }))
            }
            BridgeRequest::Undo { id: region } => match manager.undo(&region) {
                Ok(()) => ResponseEnvelope::success(id, json!({ "status": "pending" })),
                Err(err) => ResponseEnvelope::from_error(id, &err),
            },
            BridgeRequest::Refresh => {
                manager.refresh();
                ResponseEnvelope::success(id, json!({ "regions": manager.region_count() }))
            }
            BridgeRequest::ReadContent => ResponseEnvelope::success(
                id,
                json!({
                    "file": manager.surface().current_open_file(),
                    "content": manager.surface().current_content(),
                }),
            ),
        }
    }
}
