//! Turns a decoded NDN message into record fields and scrubs its payload.

use std::ops::Range;

use crate::ndn::packet::{Data, Fragment, Interest};
use crate::ndn::{nack, tt, IncompleteTlv, Name, NdnMessage, NdnPacket};
use crate::record::{DataAttrs, Detail, InterestAttrs, PacketKind};

/// Record fields derived from one NDN message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed {
    pub kind: PacketKind,
    pub fragmented: bool,
    pub size3: Option<usize>,
    pub name: Option<Name>,
    pub detail: Detail,
}

pub struct NdnPacketParser {
    keep_payload: bool,
}

fn interest_fields(i: Interest) -> (Name, InterestAttrs, Vec<Range<usize>>) {
    let Interest { name, can_be_prefix, must_be_fresh, fw_hint, lifetime, hop_limit, payload } = i;
    (name, InterestAttrs { can_be_prefix, must_be_fresh, fw_hint, lifetime, hop_limit }, payload)
}

fn data_fields(d: Data) -> (Name, DataAttrs, Vec<Range<usize>>) {
    let Data { name, content_type, freshness, final_block, payload } = d;
    (name, DataAttrs { content_type, freshness, final_block }, payload)
}

impl NdnPacketParser {
    /// With `keep_payload` set, application payload and signatures stay in the
    /// buffer; meant for debugging only.
    pub fn new(keep_payload: bool) -> Self {
        Self { keep_payload }
    }

    /// Classifies `msg`, whose ranges point into `wire`, and zeroes its
    /// payload and signature bytes in `wire`.
    pub fn parse(&self, wire: &mut [u8], msg: NdnMessage) -> Parsed {
        match msg.packet {
            NdnPacket::Fragment(f) => self.parse_fragment(wire, f),
            NdnPacket::Interest(i) => self.interest(wire, i, nack::NONE, msg.l3_size, false),
            NdnPacket::Nack { reason, interest } => self.interest(wire, interest, reason, msg.l3_size, false),
            NdnPacket::Data(d) => self.data(wire, d, msg.l3_size, false),
        }
    }

    fn interest(&self, wire: &mut [u8], i: Interest, reason: u8, size3: Option<usize>, fragmented: bool) -> Parsed {
        let (name, attrs, payload) = interest_fields(i);
        self.zero(wire, &payload);
        let (kind, detail) = if reason == nack::NONE {
            (PacketKind::Interest, Detail::Interest(attrs))
        } else {
            (PacketKind::Nack, Detail::Nack { reason, interest: attrs })
        };
        Parsed { kind, fragmented, size3, name: Some(name), detail }
    }

    fn data(&self, wire: &mut [u8], d: Data, size3: Option<usize>, fragmented: bool) -> Parsed {
        let (name, attrs, payload) = data_fields(d);
        self.zero(wire, &payload);
        Parsed { kind: PacketKind::Data, fragmented, size3, name: Some(name), detail: Detail::Data(attrs) }
    }

    /// Only the first fragment holds the start of the network-layer packet;
    /// its header fields are read as far as they go.
    fn parse_fragment(&self, wire: &mut [u8], f: Fragment) -> Parsed {
        let mut size3 = None;
        if f.index == 0 {
            if let Some(partial) = IncompleteTlv::decode(wire, f.payload.clone()) {
                size3 = Some(partial.size);
                match partial.typ {
                    tt::INTEREST => match Interest::decode(wire, partial.value, true) {
                        Ok(i) if !i.name.is_empty() => return self.interest(wire, i, f.nack_reason, size3, true),
                        _ => {}
                    },
                    tt::DATA => match Data::decode(wire, partial.value, true) {
                        Ok(d) if !d.name.is_empty() => return self.data(wire, d, size3, true),
                        _ => {}
                    },
                    _ => {}
                }
            }
        }
        self.zero(wire, &[f.payload]);
        Parsed { kind: PacketKind::Fragment, fragmented: true, size3, name: None, detail: Detail::None }
    }

    fn zero(&self, wire: &mut [u8], ranges: &[Range<usize>]) {
        if self.keep_payload {
            return;
        }
        for r in ranges {
            wire[r.clone()].fill(0);
        }
    }
}
