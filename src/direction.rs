//! Inbound/outbound classification relative to the observed host.

use crate::layers::DecodedFrame;
use crate::record::Direction;

pub struct DirectionClassifier {
    ports: [u16; 2],
}

impl DirectionClassifier {
    pub fn new(tcp_port: u16, ws_port: u16) -> Self {
        Self { ports: [tcp_port, ws_port] }
    }

    /// Returns `None` for traffic that does not involve the observed host.
    ///
    /// When source and destination MAC are equal (loopback capture) the MAC
    /// says nothing, so the NDN ports decide: the side using a listening port
    /// is the local forwarder.
    pub fn classify(&self, wire: &[u8], frame: &DecodedFrame, is_local: impl Fn(&[u8]) -> bool) -> Option<Direction> {
        let src = &wire[frame.link.src.clone()];
        let dst = &wire[frame.link.dst.clone()];
        if src == dst {
            let t = frame.transport.as_ref()?;
            return if self.ports.contains(&t.src_port) {
                Some(Direction::Outbound)
            } else if self.ports.contains(&t.dst_port) {
                Some(Direction::Inbound)
            } else {
                None
            };
        }
        if is_local(src) {
            Some(Direction::Outbound)
        } else if is_local(dst) {
            Some(Direction::Inbound)
        } else {
            None
        }
    }
}
