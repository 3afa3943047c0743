//! Transport port: the ESP3 serial protocol library behind the dongle.
//!
//! Framing, CRC checks and the actual serial IO live behind this trait.
//! The adapter only needs to start it, push frames through it, and watch
//! for the dongle's base id.

use tokio::sync::{mpsc, watch};

use crate::id::EnOceanId;
use crate::packet::{OutboundPacket, Packet};

/// Errors raised by a [`Transport`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The serial device could not be opened.
    #[error("cannot open serial device {path}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The transport has been shut down.
    #[error("transport is closed")]
    Closed,

    /// Reading from or writing to the device failed.
    #[error("serial IO error")]
    Io(#[from] std::io::Error),
}

/// A running ESP3 protocol stack bound to one serial device.
///
/// Implementations are driven from their own reader thread or task; every
/// method here must return without blocking.
pub trait Transport: Send + Sync + 'static {
    /// Open the serial device at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Open`] when the device cannot be opened.
    fn open(path: &str) -> Result<Self, TransportError>
    where
        Self: Sized;

    /// Start reading; every decoded frame is pushed into `inbound`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the reader cannot be started.
    fn start(&self, inbound: mpsc::UnboundedSender<Packet>) -> Result<(), TransportError>;

    /// Write one frame to the dongle.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the frame cannot be written.
    fn send(&self, packet: OutboundPacket) -> Result<(), TransportError>;

    /// Put a frame back on the library's own receive queue.
    fn reinject(&self, packet: Packet);

    /// Ask the dongle for its base id. The answer arrives as a response frame.
    fn request_base_id(&self);

    /// The dongle's base id, `None` until the library has resolved it.
    fn base_id(&self) -> watch::Receiver<Option<EnOceanId>>;

    /// Enable or disable teach-in handling in the library.
    fn set_teach_in(&self, enabled: bool);
}
