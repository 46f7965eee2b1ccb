//! Emitters that hand events to the network layer
//!
//! Both are non-blocking. The membership engine must never stall a tick
//! waiting on delivery.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use earshot_core::StreamEvent;
use earshot_membership::ProtocolEmitter;
use earshot_wire::encode_event;
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::RuntimeConfig;

/// Forwards events unencoded over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl ChannelEmitter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelEmitter { tx }, rx)
    }
}

impl ProtocolEmitter for ChannelEmitter {
    fn emit(&self, event: StreamEvent) {
        if self.tx.send(event).is_err() {
            trace!("event receiver dropped");
        }
    }
}

/// Encodes events as control packets into a bounded channel.
///
/// A full channel drops the packet and counts it. There is no resend: a
/// dropped attach or detach leaves the client's listener set out of step
/// with the server until the stream is destroyed. Size the buffer from
/// `RuntimeConfig::packet_buffer` for the expected burst, or use
/// `ChannelEmitter` where loss is unacceptable.
#[derive(Debug)]
pub struct PacketEmitter {
    tx: mpsc::Sender<Bytes>,
    dropped: AtomicU64,
}

impl PacketEmitter {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(buffer);
        (
            PacketEmitter {
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Emitter buffered by `config.packet_buffer`
    pub fn from_config(config: &RuntimeConfig) -> (Self, mpsc::Receiver<Bytes>) {
        Self::new(config.packet_buffer)
    }

    /// Packets dropped because the channel was full or encoding failed
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl ProtocolEmitter for PacketEmitter {
    fn emit(&self, event: StreamEvent) {
        let packet = match encode_event(&event) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(stream = %event.stream(), error = %e, "failed to encode control packet");
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        match self.tx.try_send(packet) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(stream = %event.stream(), dropped, "packet buffer full, dropping control packet");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                trace!("packet receiver dropped");
            }
        }
    }
}
