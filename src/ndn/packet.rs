//! NDNLPv2, Interest, Data and Nack decoding.
//!
//! Every decoder records the byte ranges holding application payload or
//! signature values, so the caller can zero them in the frame buffer.

use std::ops::Range;

use super::name::{Component, Name};
use super::tlv::{decode_element, decode_nni, Element, Elements, TlvError};
use super::{nack, tt};

/// Interest fields kept in records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interest {
    pub name: Name,
    pub can_be_prefix: bool,
    pub must_be_fresh: bool,
    pub fw_hint: Vec<Name>,
    /// InterestLifetime in milliseconds.
    pub lifetime: Option<u64>,
    pub hop_limit: Option<u8>,
    /// ApplicationParameters and InterestSignatureValue bytes.
    pub payload: Vec<Range<usize>>,
}

impl Interest {
    /// Decodes the value of an Interest element.
    ///
    /// With `tolerant` set, decoding stops quietly at the first malformed or
    /// truncated field and keeps whatever was found before it.
    pub fn decode(wire: &[u8], value: Range<usize>, tolerant: bool) -> Result<Self, TlvError> {
        let mut interest = Self::default();
        let mut has_name = false;
        let mut elements = Elements::new(wire, value);
        if tolerant {
            elements = elements.tolerant();
        }
        for ele in elements {
            let ele = ele?;
            if let Err(e) = interest.decode_field(wire, &ele, &mut has_name) {
                if tolerant {
                    break;
                }
                return Err(e);
            }
        }
        if !has_name && !tolerant {
            return Err(TlvError::MissingName);
        }
        Ok(interest)
    }

    fn decode_field(&mut self, wire: &[u8], ele: &Element, has_name: &mut bool) -> Result<(), TlvError> {
        match ele.typ {
            tt::NAME => {
                self.name = Name::decode(wire, ele)?;
                *has_name = true;
            }
            tt::CAN_BE_PREFIX => self.can_be_prefix = true,
            tt::MUST_BE_FRESH => self.must_be_fresh = true,
            tt::FORWARDING_HINT => self.fw_hint = decode_fw_hint(wire, ele)?,
            tt::INTEREST_LIFETIME => self.lifetime = Some(decode_nni(ele.value(wire))?),
            tt::HOP_LIMIT => match ele.value(wire) {
                [h] => self.hop_limit = Some(*h),
                _ => return Err(TlvError::BadNonNegativeInteger),
            },
            tt::APPLICATION_PARAMETERS | tt::INTEREST_SIGNATURE_VALUE => {
                self.payload.push(ele.value.clone());
            }
            _ => {}
        }
        Ok(())
    }
}

fn decode_fw_hint(wire: &[u8], ele: &Element) -> Result<Vec<Name>, TlvError> {
    let mut names = Vec::new();
    for child in ele.children(wire) {
        let child = child?;
        match child.typ {
            tt::NAME => names.push(Name::decode(wire, &child)?),
            // pre-2021 format: Delegation := Preference Name
            tt::DELEGATION => {
                for field in child.children(wire) {
                    let field = field?;
                    if field.typ == tt::NAME {
                        names.push(Name::decode(wire, &field)?);
                    }
                }
            }
            _ => {}
        }
    }
    Ok(names)
}

/// Data fields kept in records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Data {
    pub name: Name,
    pub content_type: Option<u64>,
    /// FreshnessPeriod in milliseconds.
    pub freshness: Option<u64>,
    pub final_block: bool,
    /// Content and SignatureValue bytes.
    pub payload: Vec<Range<usize>>,
}

impl Data {
    /// Decodes the value of a Data element; `tolerant` as in [`Interest::decode`].
    pub fn decode(wire: &[u8], value: Range<usize>, tolerant: bool) -> Result<Self, TlvError> {
        let mut data = Self::default();
        let mut has_name = false;
        let mut final_block_id = None;
        let mut elements = Elements::new(wire, value);
        if tolerant {
            elements = elements.tolerant();
        }
        for ele in elements {
            let ele = ele?;
            let res = match ele.typ {
                tt::NAME => Name::decode(wire, &ele).map(|n| {
                    data.name = n;
                    has_name = true;
                }),
                tt::META_INFO => data.decode_meta_info(wire, &ele).map(|fb| final_block_id = fb),
                tt::CONTENT | tt::SIGNATURE_VALUE => {
                    data.payload.push(ele.value.clone());
                    Ok(())
                }
                _ => Ok(()),
            };
            if let Err(e) = res {
                if tolerant {
                    break;
                }
                return Err(e);
            }
        }
        if !has_name && !tolerant {
            return Err(TlvError::MissingName);
        }
        data.final_block = match (&final_block_id, data.name.last()) {
            (Some(fb), Some(last)) => fb == last,
            _ => false,
        };
        Ok(data)
    }

    fn decode_meta_info(&mut self, wire: &[u8], ele: &Element) -> Result<Option<Component>, TlvError> {
        let mut final_block_id = None;
        for field in ele.children(wire) {
            let field = field?;
            match field.typ {
                tt::CONTENT_TYPE => self.content_type = Some(decode_nni(field.value(wire))?),
                tt::FRESHNESS_PERIOD => self.freshness = Some(decode_nni(field.value(wire))?),
                tt::FINAL_BLOCK_ID => {
                    let comp = decode_element(wire, field.value.start, field.value.end)?;
                    final_block_id = Some(Component { typ: comp.typ, value: comp.value(wire).to_vec() });
                }
                _ => {}
            }
        }
        Ok(final_block_id)
    }
}

/// NDNLPv2 header fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LpHeader {
    pub seq: Option<u64>,
    pub frag_index: u64,
    pub frag_count: u64,
    pub nack_reason: u8,
}

/// One link-layer fragment of a larger network-layer packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub index: u64,
    pub count: u64,
    pub nack_reason: u8,
    /// The LpFragment value: a slice of the fragmented packet.
    pub payload: Range<usize>,
}

/// A classified NDN message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NdnPacket {
    Fragment(Fragment),
    Interest(Interest),
    Data(Data),
    Nack { reason: u8, interest: Interest },
}

/// Result of decoding the outermost NDN element of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdnMessage {
    pub packet: NdnPacket,
    /// Network-layer packet size, unknown for fragments.
    pub l3_size: Option<usize>,
}

impl NdnMessage {
    /// Decodes a bare Interest/Data or an LpPacket.
    pub fn decode(wire: &[u8], outer: &Element) -> Result<Self, TlvError> {
        match outer.typ {
            tt::INTEREST => Ok(Self {
                packet: NdnPacket::Interest(Interest::decode(wire, outer.value.clone(), false)?),
                l3_size: Some(outer.size()),
            }),
            tt::DATA => Ok(Self {
                packet: NdnPacket::Data(Data::decode(wire, outer.value.clone(), false)?),
                l3_size: Some(outer.size()),
            }),
            tt::LP_PACKET => Self::decode_lp(wire, outer),
            t => Err(TlvError::UnexpectedType(t)),
        }
    }

    fn decode_lp(wire: &[u8], outer: &Element) -> Result<Self, TlvError> {
        let mut lp = LpHeader { frag_count: 1, ..LpHeader::default() };
        let mut payload = None;
        for field in outer.children(wire) {
            let field = field?;
            match field.typ {
                tt::LP_SEQUENCE => lp.seq = Some(decode_nni(field.value(wire))?),
                tt::FRAG_INDEX => lp.frag_index = decode_nni(field.value(wire))?,
                tt::FRAG_COUNT => lp.frag_count = decode_nni(field.value(wire))?,
                tt::NACK => {
                    lp.nack_reason = nack::UNSPECIFIED;
                    for reason in field.children(wire) {
                        let reason = reason?;
                        if reason.typ == tt::NACK_REASON {
                            lp.nack_reason = decode_nni(reason.value(wire))?.min(nack::UNSPECIFIED as u64) as u8;
                        }
                    }
                }
                tt::LP_FRAGMENT => payload = Some(field.value.clone()),
                _ => {}
            }
        }
        let payload = payload.ok_or(TlvError::IdlePacket)?;

        if lp.frag_count > 1 {
            return Ok(Self {
                packet: NdnPacket::Fragment(Fragment {
                    index: lp.frag_index,
                    count: lp.frag_count,
                    nack_reason: lp.nack_reason,
                    payload,
                }),
                l3_size: None,
            });
        }

        let l3_size = Some(payload.len());
        let inner = decode_element(wire, payload.start, payload.end)?;
        let packet = match inner.typ {
            tt::INTEREST => {
                let interest = Interest::decode(wire, inner.value, false)?;
                if lp.nack_reason == nack::NONE {
                    NdnPacket::Interest(interest)
                } else {
                    NdnPacket::Nack { reason: lp.nack_reason, interest }
                }
            }
            tt::DATA => NdnPacket::Data(Data::decode(wire, inner.value, false)?),
            t => return Err(TlvError::UnexpectedType(t)),
        };
        Ok(Self { packet, l3_size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{data_tlv, interest_tlv, lp_tlv, name, nni, tlv, InterestFields};

    fn decode(wire: &[u8]) -> Result<NdnMessage, TlvError> {
        let outer = decode_element(wire, 0, wire.len())?;
        NdnMessage::decode(wire, &outer)
    }

    #[test]
    fn bare_interest() {
        let wire = interest_tlv(&InterestFields {
            name: &["a", "b"],
            can_be_prefix: true,
            lifetime: Some(4000),
            hop_limit: Some(32),
            app_params: Some(b"secret"),
            ..Default::default()
        });
        let msg = decode(&wire).unwrap();
        assert_eq!(msg.l3_size, Some(wire.len()));
        let NdnPacket::Interest(i) = msg.packet else { panic!("not an Interest") };
        assert_eq!(i.name.to_string(), "/a/b");
        assert!(i.can_be_prefix);
        assert!(!i.must_be_fresh);
        assert_eq!(i.lifetime, Some(4000));
        assert_eq!(i.hop_limit, Some(32));
        assert_eq!(i.payload.len(), 1);
        assert_eq!(&wire[i.payload[0].clone()], b"secret");
    }

    #[test]
    fn interest_forwarding_hint_both_formats() {
        const PREFERENCE: u32 = 0x1e;
        let mut hint = name(&["h1"]);
        hint.extend(tlv(tt::DELEGATION, &[nni(PREFERENCE, 10), name(&["h2"])].concat()));
        let value = [name(&["x"]), tlv(tt::FORWARDING_HINT, &hint)].concat();
        let wire = tlv(tt::INTEREST, &value);
        let NdnPacket::Interest(i) = decode(&wire).unwrap().packet else { panic!() };
        let hints: Vec<String> = i.fw_hint.iter().map(|n| n.to_string()).collect();
        assert_eq!(hints, ["/h1", "/h2"]);
    }

    #[test]
    fn interest_without_name_is_rejected() {
        let wire = tlv(tt::INTEREST, &tlv(tt::CAN_BE_PREFIX, &[]));
        assert_eq!(decode(&wire), Err(TlvError::MissingName));
    }

    #[test]
    fn data_final_block() {
        let wire = data_tlv(&["file", "seg1"], Some(1), Some(10_000), Some("seg1"), b"hello");
        let NdnPacket::Data(d) = decode(&wire).unwrap().packet else { panic!("not Data") };
        assert_eq!(d.name.to_string(), "/file/seg1");
        assert_eq!(d.content_type, Some(1));
        assert_eq!(d.freshness, Some(10_000));
        assert!(d.final_block);
        assert_eq!(&wire[d.payload[0].clone()], b"hello");
        // Content + SignatureValue
        assert_eq!(d.payload.len(), 2);
    }

    #[test]
    fn data_not_final_block() {
        let wire = data_tlv(&["file", "seg0"], None, None, Some("seg1"), b"");
        let NdnPacket::Data(d) = decode(&wire).unwrap().packet else { panic!("not Data") };
        assert!(!d.final_block);
    }

    #[test]
    fn lp_wrapped_nack() {
        let interest = interest_tlv(&InterestFields { name: &["n"], ..Default::default() });
        let nack = tlv(tt::NACK, &nni(tt::NACK_REASON, nack::NO_ROUTE as u64));
        let wire = lp_tlv(&[nack], &interest);
        let msg = decode(&wire).unwrap();
        assert_eq!(msg.l3_size, Some(interest.len()));
        let NdnPacket::Nack { reason, interest } = msg.packet else { panic!("not a Nack") };
        assert_eq!(reason, nack::NO_ROUTE);
        assert_eq!(interest.name.to_string(), "/n");
    }

    #[test]
    fn nack_without_reason_is_unspecified() {
        let interest = interest_tlv(&InterestFields { name: &["n"], ..Default::default() });
        let wire = lp_tlv(&[tlv(tt::NACK, &[])], &interest);
        let NdnPacket::Nack { reason, .. } = decode(&wire).unwrap().packet else { panic!() };
        assert_eq!(reason, nack::UNSPECIFIED);
    }

    #[test]
    fn lp_fragment() {
        let headers = [nni(tt::LP_SEQUENCE, 7), nni(tt::FRAG_INDEX, 1), nni(tt::FRAG_COUNT, 3)];
        let wire = lp_tlv(&headers, b"middle-of-packet");
        let msg = decode(&wire).unwrap();
        assert_eq!(msg.l3_size, None);
        let NdnPacket::Fragment(f) = msg.packet else { panic!("not a Fragment") };
        assert_eq!((f.index, f.count), (1, 3));
        assert_eq!(&wire[f.payload], b"middle-of-packet");
    }

    #[test]
    fn idle_lp_packet() {
        let wire = tlv(tt::LP_PACKET, &nni(tt::LP_SEQUENCE, 1));
        assert_eq!(decode(&wire), Err(TlvError::IdlePacket));
    }

    #[test]
    fn tolerant_interest_keeps_leading_fields() {
        let full = interest_tlv(&InterestFields {
            name: &["a", "b"],
            must_be_fresh: true,
            app_params: Some(&[0x55; 64]),
            ..Default::default()
        });
        // Chop off the tail of ApplicationParameters.
        let cut = &full[..full.len() - 20];
        let outer = crate::ndn::IncompleteTlv::decode(cut, 0..cut.len()).unwrap();
        let i = Interest::decode(cut, outer.value, true).unwrap();
        assert_eq!(i.name.to_string(), "/a/b");
        assert!(i.must_be_fresh);
        assert_eq!(i.payload.len(), 1);
        assert_eq!(i.payload[0].end, cut.len());
    }
}
