//! Requesting side of the bridge.
//!
//! The client is poll-driven: [`BridgeClient::send`] returns a correlation id immediately,
//! [`BridgeClient::poll_at`] collects answers and expires overdue requests, and
//! [`BridgeClient::take_result`] hands out finished responses. A request that is not answered
//! before its deadline resolves to a generic `request_timeout` failure; a late answer for it is
//! dropped. Losing the host does not change this: requests still in flight expire on schedule.

use crate::envelope::{BridgeRequest, RequestEnvelope, ResponseEnvelope};
use crate::error::BridgeError;
use crate::transport::Transport;
use proposal_core::ReviewConfig;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct InFlight {
    name: &'static str,
    deadline: Instant,
    timeout: Duration,
}

/// Correlating, timeout-enforcing request sender.
pub struct BridgeClient<T: Transport> {
    transport: T,
    next_id: u64,
    edit_timeout: Duration,
    bulk_read_timeout: Duration,
    in_flight: HashMap<u64, InFlight>,
    completed: HashMap<u64, ResponseEnvelope>,
    disconnected: bool,
}

impl<T: Transport> BridgeClient<T> {
    /// Create a client with the timeouts from `config`.
    pub fn new(transport: T, config: &ReviewConfig) -> Self {
        Self {
            transport,
            next_id: 1,
            edit_timeout: config.edit_timeout(),
            bulk_read_timeout: config.bulk_read_timeout(),
            in_flight: HashMap::new(),
            completed: HashMap::new(),
            disconnected: false,
        }
    }

    /// Send a request and return its correlation id.
    pub fn send(&mut self, request: BridgeRequest) -> Result<u64, BridgeError> {
        self.send_at(request, Instant::now())
    }

    /// Send a request whose deadline is measured from `now`.
    pub fn send_at(&mut self, request: BridgeRequest, now: Instant) -> Result<u64, BridgeError> {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);

        let timeout = request
            .timeout_class()
            .duration(self.edit_timeout, self.bulk_read_timeout);
        let name = request.name();
        let message = serde_json::to_string(&RequestEnvelope { id, request })?;
        self.transport.send(message)?;

        self.in_flight.insert(
            id,
            InFlight {
                name,
                deadline: now + timeout,
                timeout,
            },
        );
        tracing::debug!(id, request = name, ?timeout, "sent bridge request");
        Ok(id)
    }

    /// Collect waiting responses and expire overdue requests. Returns the ids finished by this
    /// call.
    pub fn poll_at(&mut self, now: Instant) -> Result<Vec<u64>, BridgeError> {
        let mut finished = Vec::new();
        loop {
            match self.transport.try_recv() {
                Ok(Some(message)) => {
                    if let Some(id) = self.accept_response(&message) {
                        finished.push(id);
                    }
                }
                Ok(None) => break,
                Err(BridgeError::Disconnected) => {
                    self.mark_disconnected();
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        finished.extend(self.expire(now));
        Ok(finished)
    }

    /// [`poll_at`](Self::poll_at) with the current time.
    pub fn poll(&mut self) -> Result<Vec<u64>, BridgeError> {
        self.poll_at(Instant::now())
    }

    /// Take the finished response for `id`, if any.
    pub fn take_result(&mut self, id: u64) -> Option<ResponseEnvelope> {
        self.completed.remove(&id)
    }

    /// Returns `true` while `id` awaits an answer.
    pub fn is_pending(&self, id: u64) -> bool {
        self.in_flight.contains_key(&id)
    }

    /// Returns `true` once the host end has gone away.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Number of requests awaiting an answer.
    pub fn pending_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Send a request and block until it is answered or times out.
    ///
    /// Responses to other requests that arrive meanwhile are kept for
    /// [`take_result`](Self::take_result). If the host goes away the call still waits out the
    /// deadline and returns the timeout failure.
    pub fn call(&mut self, request: BridgeRequest) -> Result<ResponseEnvelope, BridgeError> {
        let id = self.send(request)?;
        loop {
            if let Some(response) = self.completed.remove(&id) {
                return Ok(response);
            }
            let Some(deadline) = self.in_flight.get(&id).map(|r| r.deadline) else {
                return Err(BridgeError::Disconnected);
            };

            let now = Instant::now();
            if now >= deadline {
                self.expire(now);
                continue;
            }
            if self.disconnected {
                std::thread::sleep(deadline - now);
                continue;
            }
            match self.transport.recv_timeout(deadline - now) {
                Ok(Some(message)) => {
                    self.accept_response(&message);
                }
                Ok(None) => {}
                Err(BridgeError::Disconnected) => self.mark_disconnected(),
                Err(err) => return Err(err),
            }
        }
    }

    fn mark_disconnected(&mut self) {
        if !self.disconnected {
            tracing::warn!(pending = self.in_flight.len(), "bridge host disconnected");
            self.disconnected = true;
        }
    }

    fn accept_response(&mut self, message: &str) -> Option<u64> {
        let response: ResponseEnvelope = match serde_json::from_str(message) {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(%err, "dropping malformed bridge response");
                return None;
            }
        };
        let Some(request) = self.in_flight.remove(&response.id) else {
            tracing::debug!(id = response.id, "dropping response for unknown or expired request");
            return None;
        };
        tracing::debug!(id = response.id, request = request.name, ok = response.ok, "bridge response");
        let id = response.id;
        self.completed.insert(id, response);
        Some(id)
    }

    fn expire(&mut self, now: Instant) -> Vec<u64> {
        let mut expired: Vec<u64> = self
            .in_flight
            .iter()
            .filter(|(_, request)| request.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        expired.sort_unstable();

        for id in &expired {
            if let Some(request) = self.in_flight.remove(id) {
                tracing::warn!(id, request = request.name, timeout = ?request.timeout, "bridge request timed out");
                self.completed
                    .insert(*id, ResponseEnvelope::timeout(*id, request.timeout));
            }
        }
        expired
    }
}
