//! Stacked header decoding: Ethernet, 802.1Q, IPv4/IPv6, UDP/TCP and NDN.
//!
//! Every layer is located by offsets into the frame so later stages can
//! rewrite addresses and payload in place. Anything unrecognized ends the
//! chain quietly; the caller decides whether what was found is useful.

use std::ops::Range;

use crate::ndn::tlv::decode_element;
use crate::ndn::{tt, Element, NdnMessage};

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_VLAN: u16 = 0x8100;
pub const ETHERTYPE_QINQ: u16 = 0x88a8;
pub const ETHERTYPE_NDN: u16 = 0x8624;
pub const ETHERTYPE_IPV6: u16 = 0x86dd;

pub const IPPROTO_TCP: u8 = 6;
pub const IPPROTO_UDP: u8 = 17;

/// UDP port of NDN multicast faces.
pub const NDN_MULTICAST_UDP_PORT: u16 = 56363;

const ETH_HDR: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerType {
    Ethernet,
    Dot1Q,
    Ipv4,
    Ipv6,
    Udp,
    Tcp,
    NdnTlv,
    NdnMessage,
}

/// Source and destination MAC address locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub src: Range<usize>,
    pub dst: Range<usize>,
}

/// Source and destination IP address locations (4 or 16 bytes each).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub src: Range<usize>,
    pub dst: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transport {
    pub proto: u8,
    pub src_port: u16,
    pub dst_port: u16,
    pub payload: Range<usize>,
}

impl Transport {
    pub fn uses_port(&self, port: u16) -> bool {
        self.src_port == port || self.dst_port == port
    }
}

/// The outermost NDN element and, if it decoded, the message it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ndn {
    pub tlv: Element,
    pub message: Option<NdnMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub layers: Vec<LayerType>,
    pub link: Link,
    pub network: Option<Network>,
    pub transport: Option<Transport>,
    pub ndn: Option<Ndn>,
}

impl DecodedFrame {
    pub fn has(&self, layer: LayerType) -> bool {
        self.layers.contains(&layer)
    }
}

fn be16(f: &[u8], o: usize) -> u16 {
    u16::from_be_bytes([f[o], f[o + 1]])
}

// ─── Decoder ──────────────────────────────────────────────────────────────────

pub struct LayerDecoder {
    tcp_port: u16,
}

impl LayerDecoder {
    /// `tcp_port` is where NDN is expected over TCP and unicast UDP.
    pub fn new(tcp_port: u16) -> Self {
        Self { tcp_port }
    }

    /// Decodes an Ethernet frame. Returns `None` only when there is no
    /// complete Ethernet header.
    pub fn decode(&self, frame: &[u8]) -> Option<DecodedFrame> {
        if frame.len() < ETH_HDR {
            return None;
        }
        let mut d = DecodedFrame {
            layers: vec![LayerType::Ethernet],
            link: Link { dst: 0..6, src: 6..12 },
            network: None,
            transport: None,
            ndn: None,
        };

        let mut ether_type = be16(frame, 12);
        let mut off = ETH_HDR;
        while matches!(ether_type, ETHERTYPE_VLAN | ETHERTYPE_QINQ) {
            if frame.len() < off + 4 {
                return Some(d);
            }
            d.layers.push(LayerType::Dot1Q);
            ether_type = be16(frame, off + 2);
            off += 4;
        }

        match ether_type {
            ETHERTYPE_IPV4 => self.decode_ipv4(frame, off, &mut d),
            ETHERTYPE_IPV6 => self.decode_ipv6(frame, off, &mut d),
            ETHERTYPE_NDN => self.decode_ndn_into(frame, off..frame.len(), &mut d),
            _ => {}
        }
        Some(d)
    }

    /// Decodes an NDN packet that starts exactly at `range.start`, with no
    /// lower layers. Trailing bytes after the first element are ignored.
    pub fn decode_ndn(&self, wire: &[u8], range: Range<usize>) -> Option<Ndn> {
        let tlv = decode_element(wire, range.start, range.end).ok()?;
        if !matches!(tlv.typ, tt::INTEREST | tt::DATA | tt::LP_PACKET) {
            return None;
        }
        let message = NdnMessage::decode(wire, &tlv).ok();
        Some(Ndn { tlv, message })
    }

    fn decode_ndn_into(&self, wire: &[u8], range: Range<usize>, d: &mut DecodedFrame) {
        let Some(ndn) = self.decode_ndn(wire, range) else { return };
        d.layers.push(LayerType::NdnTlv);
        if ndn.message.is_some() {
            d.layers.push(LayerType::NdnMessage);
        }
        d.ndn = Some(ndn);
    }

    fn decode_ipv4(&self, f: &[u8], off: usize, d: &mut DecodedFrame) {
        if f.len() < off + 20 || f[off] >> 4 != 4 {
            return;
        }
        let ihl = ((f[off] & 0x0f) as usize) * 4;
        if ihl < 20 || f.len() < off + ihl {
            return;
        }
        // total length 0 shows up with segmentation offload
        let end = match be16(f, off + 2) as usize {
            0 => f.len(),
            total if total < ihl => return,
            total => (off + total).min(f.len()),
        };
        d.layers.push(LayerType::Ipv4);
        d.network = Some(Network { src: off + 12..off + 16, dst: off + 16..off + 20 });

        // only the first fragment carries the transport header
        if be16(f, off + 6) & 0x1fff != 0 {
            return;
        }
        self.decode_transport(f, f[off + 9], off + ihl, end, d);
    }

    fn decode_ipv6(&self, f: &[u8], off: usize, d: &mut DecodedFrame) {
        if f.len() < off + 40 || f[off] >> 4 != 6 {
            return;
        }
        let end = match be16(f, off + 4) as usize {
            0 => f.len(),
            plen => (off + 40 + plen).min(f.len()),
        };
        d.layers.push(LayerType::Ipv6);
        d.network = Some(Network { src: off + 8..off + 24, dst: off + 24..off + 40 });

        let mut next = f[off + 6];
        let mut pos = off + 40;
        // hop-by-hop, routing, destination options
        while matches!(next, 0 | 43 | 60) {
            if pos + 2 > end {
                return;
            }
            next = f[pos];
            pos += (f[pos + 1] as usize + 1) * 8;
        }
        self.decode_transport(f, next, pos, end, d);
    }

    fn decode_transport(&self, f: &[u8], proto: u8, off: usize, end: usize, d: &mut DecodedFrame) {
        let t = match proto {
            IPPROTO_UDP => {
                if end < off + 8 {
                    return;
                }
                let pend = match be16(f, off + 4) as usize {
                    len if len >= 8 => (off + len).min(end),
                    _ => end,
                };
                d.layers.push(LayerType::Udp);
                Transport { proto, src_port: be16(f, off), dst_port: be16(f, off + 2), payload: off + 8..pend }
            }
            IPPROTO_TCP => {
                if end < off + 20 {
                    return;
                }
                let doff = ((f[off + 12] >> 4) as usize) * 4;
                if doff < 20 || off + doff > end {
                    return;
                }
                d.layers.push(LayerType::Tcp);
                Transport { proto, src_port: be16(f, off), dst_port: be16(f, off + 2), payload: off + doff..end }
            }
            _ => return,
        };

        let ndn_port = match proto {
            IPPROTO_UDP => t.uses_port(self.tcp_port) || t.uses_port(NDN_MULTICAST_UDP_PORT),
            _ => t.uses_port(self.tcp_port),
        };
        let payload = t.payload.clone();
        d.transport = Some(t);
        if ndn_port && !payload.is_empty() {
            self.decode_ndn_into(f, payload, d);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndn::NdnPacket;
    use crate::testutil::*;

    fn decoder() -> LayerDecoder {
        LayerDecoder::new(6363)
    }

    fn interest() -> Vec<u8> {
        interest_tlv(&InterestFields { name: &["a", "b"], can_be_prefix: true, ..Default::default() })
    }

    #[test]
    fn short_frame() {
        assert_eq!(decoder().decode(&[0u8; 13]), None);
    }

    #[test]
    fn udp_interest() {
        let f = udp_frame_out(40000, 6363, &interest());
        let d = decoder().decode(&f).unwrap();
        use LayerType::*;
        assert_eq!(d.layers, [Ethernet, Ipv4, Udp, NdnTlv, NdnMessage]);
        assert_eq!(&f[d.network.as_ref().unwrap().src.clone()], &LOCAL_IP);
        let t = d.transport.unwrap();
        assert_eq!((t.src_port, t.dst_port), (40000, 6363));
        let ndn = d.ndn.unwrap();
        assert_eq!(ndn.tlv.size(), interest().len());
        assert!(matches!(ndn.message.unwrap().packet, NdnPacket::Interest(_)));
    }

    #[test]
    fn udp_multicast_port() {
        let f = udp_frame_out(56363, 56363, &interest());
        assert!(decoder().decode(&f).unwrap().has(LayerType::NdnMessage));
    }

    #[test]
    fn udp_other_port_is_not_ndn() {
        let f = udp_frame_out(40000, 53, &interest());
        let d = decoder().decode(&f).unwrap();
        assert!(d.has(LayerType::Udp));
        assert!(d.ndn.is_none());
    }

    #[test]
    fn ethernet_padding_is_ignored() {
        let mut f = udp_frame_out(6363, 6363, &interest());
        f.extend([0u8; 6]);
        let d = decoder().decode(&f).unwrap();
        assert_eq!(d.transport.as_ref().unwrap().payload.len(), interest().len());
        assert!(d.has(LayerType::NdnMessage));
    }

    #[test]
    fn vlan_tagged_ipv6_tcp() {
        let mut src = [0u8; 16];
        src[0] = 0xfd;
        src[15] = 1;
        let mut dst = src;
        dst[15] = 2;
        // hop-by-hop options header in front of TCP
        let mut l4 = vec![IPPROTO_TCP, 0, 0, 0, 0, 0, 0, 0];
        l4.extend(tcp(6363, 50000, &interest()));
        let l3 = ipv6(src, dst, 0, &l4);
        let mut tagged = vec![0x00, 0x64];
        tagged.extend_from_slice(&ETHERTYPE_IPV6.to_be_bytes());
        tagged.extend(l3);
        let f = eth(REMOTE_MAC, LOCAL_MAC, ETHERTYPE_VLAN, &tagged);
        let d = decoder().decode(&f).unwrap();
        use LayerType::*;
        assert_eq!(d.layers, [Ethernet, Dot1Q, Ipv6, Tcp, NdnTlv, NdnMessage]);
        assert_eq!(f[d.network.unwrap().dst][15], 2);
    }

    #[test]
    fn ndn_over_ethernet() {
        let f = eth(REMOTE_MAC, LOCAL_MAC, ETHERTYPE_NDN, &interest());
        let d = decoder().decode(&f).unwrap();
        assert!(d.network.is_none());
        assert!(d.has(LayerType::NdnMessage));
    }

    #[test]
    fn tcp_segment_not_starting_with_tlv() {
        let mut payload = vec![0xff];
        payload.extend(interest());
        let f = tcp_frame_in(6363, 50000, &payload);
        let d = decoder().decode(&f).unwrap();
        assert!(d.has(LayerType::Tcp));
        assert!(d.ndn.is_none());
    }

    #[test]
    fn non_first_ipv4_fragment_has_no_transport() {
        let mut f = udp_frame_out(40000, 6363, &interest());
        f[ETH_HDR + 6] = 0x00;
        f[ETH_HDR + 7] = 0xb9;
        let d = decoder().decode(&f).unwrap();
        assert!(d.has(LayerType::Ipv4));
        assert!(d.transport.is_none());
    }

    #[test]
    fn ndn_tlv_without_message() {
        let wire = crate::testutil::tlv(tt::INTEREST, &crate::testutil::tlv(tt::NONCE, &[1, 2, 3, 4]));
        let ndn = decoder().decode_ndn(&wire, 0..wire.len()).unwrap();
        assert!(ndn.message.is_none());
        assert_eq!(decoder().decode_ndn(&[0x08, 0x01, 0x00], 0..3), None);
    }
}
