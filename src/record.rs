//! The per-packet record handed to outputs.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Serialize, Serializer};

use crate::input::CaptureInfo;
use crate::ndn::Name;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Received by the observed host.
    Inbound,
    /// Sent by the observed host.
    Outbound,
}

impl Direction {
    fn as_char(self) -> char {
        match self {
            Direction::Inbound => '>',
            Direction::Outbound => '<',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Fragment,
    Interest,
    Data,
    Nack,
}

impl PacketKind {
    fn as_char(self) -> char {
        match self {
            PacketKind::Fragment => 'F',
            PacketKind::Interest => 'I',
            PacketKind::Data => 'D',
            PacketKind::Nack => 'N',
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterestAttrs {
    pub can_be_prefix: bool,
    pub must_be_fresh: bool,
    pub fw_hint: Vec<Name>,
    pub lifetime: Option<u64>,
    pub hop_limit: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataAttrs {
    pub content_type: Option<u64>,
    pub freshness: Option<u64>,
    pub final_block: bool,
}

/// Kind-specific fields; at most one variant applies to a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Detail {
    #[default]
    None,
    Interest(InterestAttrs),
    Data(DataAttrs),
    Nack { reason: u8, interest: InterestAttrs },
}

/// Anonymized frame bytes with their capture metadata.
#[derive(Debug, Clone, Copy)]
pub struct Wire<'a> {
    pub bytes: &'a [u8],
    pub capture: CaptureInfo,
}

/// One observed packet.
///
/// A record without `kind` stands for a transport segment that carried no
/// decodable NDN packet; it exists only so the raw export keeps the segment.
#[derive(Debug, Clone)]
pub struct Record<'a> {
    pub direction: Direction,
    pub kind: Option<PacketKind>,
    /// The packet arrived as the first of several NDNLPv2 fragments.
    pub fragmented: bool,
    /// Capture time, nanoseconds since the Unix epoch.
    pub timestamp: i64,
    pub flow: Vec<u8>,
    /// Size of the outermost NDN element.
    pub size: usize,
    /// Size of the network-layer packet; unknown for bare fragments.
    pub size3: Option<usize>,
    pub name: Option<Name>,
    pub detail: Detail,
    /// Valid only until the next `Reader::read`.
    pub wire: Option<Wire<'a>>,
}

impl<'a> Record<'a> {
    pub fn new(direction: Direction, timestamp: i64, flow: Vec<u8>) -> Self {
        Self {
            direction,
            kind: None,
            fragmented: false,
            timestamp,
            flow,
            size: 0,
            size3: None,
            name: None,
            detail: Detail::None,
            wire: None,
        }
    }

    /// Direction and kind, e.g. `>I` or `<FD` for a first fragment carrying Data.
    pub fn tag(&self) -> String {
        let mut t = String::with_capacity(3);
        t.push(self.direction.as_char());
        match self.kind {
            Some(PacketKind::Fragment) => t.push('F'),
            Some(kind) => {
                if self.fragmented {
                    t.push('F');
                }
                t.push(kind.as_char());
            }
            None => {}
        }
        t
    }

    pub fn nack_reason(&self) -> Option<u8> {
        match self.detail {
            Detail::Nack { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Attaches the frame bytes this record was decoded from.
    pub fn with_wire<'b>(self, wire: Wire<'b>) -> Record<'b> {
        let Record { direction, kind, fragmented, timestamp, flow, size, size3, name, detail, .. } = self;
        Record { direction, kind, fragmented, timestamp, flow, size, size3, name, detail, wire: Some(wire) }
    }
}

// ─── JSON form ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordJson<'r> {
    t: String,
    ts: i64,
    #[serde(serialize_with = "base64_bytes")]
    flow: &'r [u8],
    #[serde(skip_serializing_if = "is_zero")]
    size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    size3: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nack_reason: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    cbp: bool,
    #[serde(skip_serializing_if = "is_false")]
    mbf: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fw_hint: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lifetime: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hop_limit: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    freshness: Option<u64>,
    #[serde(skip_serializing_if = "is_false")]
    final_block: bool,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn nonzero(v: Option<u64>) -> Option<u64> {
    v.filter(|&n| n != 0)
}

fn base64_bytes<S: Serializer>(bytes: &&[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&BASE64.encode(bytes))
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut json = RecordJson {
            t: self.tag(),
            ts: self.timestamp,
            flow: &self.flow,
            size: self.size,
            size3: self.size3,
            nack_reason: self.nack_reason(),
            name: self.name.as_ref().map(|n| n.to_string()),
            cbp: false,
            mbf: false,
            fw_hint: Vec::new(),
            lifetime: None,
            hop_limit: None,
            content_type: None,
            freshness: None,
            final_block: false,
        };
        match &self.detail {
            Detail::Interest(i) | Detail::Nack { interest: i, .. } => {
                json.cbp = i.can_be_prefix;
                json.mbf = i.must_be_fresh;
                json.fw_hint = i.fw_hint.iter().map(|n| n.to_string()).collect();
                json.lifetime = nonzero(i.lifetime);
                json.hop_limit = i.hop_limit;
            }
            Detail::Data(d) => {
                json.content_type = nonzero(d.content_type);
                json.freshness = nonzero(d.freshness);
                json.final_block = d.final_block;
            }
            Detail::None => {}
        }
        json.serialize(s)
    }
}
