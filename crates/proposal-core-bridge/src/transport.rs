//! Message transport between the two contexts.

use crate::error::BridgeError;
use std::sync::mpsc;
use std::time::Duration;

/// A bidirectional channel of serialized JSON messages.
pub trait Transport {
    /// Send one message.
    fn send(&self, message: String) -> Result<(), BridgeError>;

    /// Receive one message if one is already waiting.
    fn try_recv(&self) -> Result<Option<String>, BridgeError>;

    /// Block up to `timeout` for one message. `Ok(None)` means the wait timed out.
    fn recv_timeout(&self, timeout: Duration) -> Result<Option<String>, BridgeError>;
}

/// In-process [`Transport`] over `std::sync::mpsc` channels.
#[derive(Debug)]
pub struct ChannelTransport {
    tx: mpsc::Sender<String>,
    rx: mpsc::Receiver<String>,
}

impl ChannelTransport {
    /// Two connected endpoints.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_b) = mpsc::channel();
        let (tx_b, rx_a) = mpsc::channel();
        (Self { tx: tx_a, rx: rx_a }, Self { tx: tx_b, rx: rx_b })
    }
}

impl Transport for ChannelTransport {
    fn send(&self, message: String) -> Result<(), BridgeError> {
        self.tx.send(message).map_err(|_| BridgeError::Disconnected)
    }

    fn try_recv(&self) -> Result<Option<String>, BridgeError> {
        match self.rx.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(mpsc::TryRecvError::Empty) => Ok(None),
            Err(mpsc::TryRecvError::Disconnected) => Err(BridgeError::Disconnected),
        }
    }

    fn recv_timeout(&self, timeout: Duration) -> Result<Option<String>, BridgeError> {
        match self.rx.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(BridgeError::Disconnected),
        }
    }
}
