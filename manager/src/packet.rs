// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Output of the packets built by the mapping engine (ARP probes)

use bytes::Bytes;
use net::SalPort;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutPacket {
    pub port: SalPort,
    pub frame: Bytes,
}

/// Something that sends frames out of switch ports
pub trait PacketSender: Send + Sync {
    fn transmit(&self, packet: OutPacket);
}

pub struct PacketQueue(mpsc::UnboundedSender<OutPacket>);

impl PacketQueue {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutPacket>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }
}

impl PacketSender for PacketQueue {
    fn transmit(&self, packet: OutPacket) {
        if let Err(e) = self.0.send(packet) {
            warn!("Packet queue is closed: frame to {} dropped", e.0.port);
        }
    }
}
