//! Flow keys that are identical for both directions of a conversation.

use crate::record::Direction;

/// Transport protocol and ports of a segment, as seen on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ports {
    pub proto: u8,
    pub src: u16,
    pub dst: u16,
}

/// Builds `local || remote [|| proto || local port || remote port]`.
///
/// `src` and `dst` are the (already anonymized) addresses in wire order;
/// `direction` decides which of them belongs to the observed host.
pub fn build_flow_key(direction: Direction, src: &[u8], dst: &[u8], ports: Option<Ports>) -> Vec<u8> {
    let (local, remote) = match direction {
        Direction::Outbound => (src, dst),
        Direction::Inbound => (dst, src),
    };
    let mut key = Vec::with_capacity(local.len() + remote.len() + 5);
    key.extend_from_slice(local);
    key.extend_from_slice(remote);
    if let Some(p) = ports {
        let (lport, rport) = match direction {
            Direction::Outbound => (p.src, p.dst),
            Direction::Inbound => (p.dst, p.src),
        };
        key.push(p.proto);
        key.extend_from_slice(&lport.to_be_bytes());
        key.extend_from_slice(&rport.to_be_bytes());
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: [u8; 4] = [10, 0, 0, 1];
    const B: [u8; 4] = [10, 0, 0, 2];

    #[test]
    fn both_directions_match() {
        let out = build_flow_key(Direction::Outbound, &A, &B, Some(Ports { proto: 17, src: 40000, dst: 6363 }));
        let back = build_flow_key(Direction::Inbound, &B, &A, Some(Ports { proto: 17, src: 6363, dst: 40000 }));
        assert_eq!(out, back);
        assert_eq!(out, [10, 0, 0, 1, 10, 0, 0, 2, 17, 0x9c, 0x40, 0x18, 0xdb]);
    }

    #[test]
    fn addresses_only() {
        let mac_a = [2, 0, 0, 0, 0, 1];
        let mac_b = [2, 0, 0, 0, 0, 2];
        let k = build_flow_key(Direction::Inbound, &mac_b, &mac_a, None);
        assert_eq!(k, [mac_a, mac_b].concat());
    }

    #[test]
    fn distinct_conversations_differ() {
        let p = |src| Some(Ports { proto: 6, src, dst: 6363 });
        assert_ne!(build_flow_key(Direction::Outbound, &A, &B, p(40000)), build_flow_key(Direction::Outbound, &A, &B, p(40001)));
    }
}
