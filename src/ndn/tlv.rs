//! NDN TLV primitives: VAR-NUMBER, element iteration, NonNegativeInteger.
//!
//! Decoders work on absolute offsets into the frame buffer, so whatever they
//! find (names, payload ranges) can be mutated in place afterwards.

use std::ops::Range;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TlvError {
    #[error("truncated TLV")]
    Truncated,
    #[error("TLV-TYPE/TLV-LENGTH does not fit")]
    BadVarNum,
    #[error("unexpected TLV-TYPE {0:#x}")]
    UnexpectedType(u32),
    #[error("bad NonNegativeInteger")]
    BadNonNegativeInteger,
    #[error("missing Name")]
    MissingName,
    #[error("LpPacket without fragment")]
    IdlePacket,
}

/// Reads a VAR-NUMBER at `pos`, returning the value and the position after it.
pub fn read_varnum(wire: &[u8], pos: usize) -> Result<(u64, usize), TlvError> {
    let first = *wire.get(pos).ok_or(TlvError::Truncated)?;
    let width = match first {
        0..=252 => return Ok((first as u64, pos + 1)),
        253 => 2,
        254 => 4,
        255 => 8,
    };
    let bytes = wire.get(pos + 1..pos + 1 + width).ok_or(TlvError::Truncated)?;
    let v = bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);
    Ok((v, pos + 1 + width))
}

/// One TLV element located in a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub typ: u32,
    /// Offset of the TLV-TYPE field.
    pub start: usize,
    pub value: Range<usize>,
}

impl Element {
    /// Total encoded size: TLV-TYPE + TLV-LENGTH + TLV-VALUE.
    pub fn size(&self) -> usize {
        self.value.end - self.start
    }

    pub fn length(&self) -> usize {
        self.value.len()
    }

    pub fn value<'a>(&self, wire: &'a [u8]) -> &'a [u8] {
        &wire[self.value.clone()]
    }

    /// Iterates the children of this element.
    pub fn children<'a>(&self, wire: &'a [u8]) -> Elements<'a> {
        Elements::new(wire, self.value.clone())
    }
}

fn read_header(wire: &[u8], pos: usize, end: usize) -> Result<(u32, u64, usize), TlvError> {
    let wire = &wire[..end.min(wire.len())];
    let (typ, pos) = read_varnum(wire, pos)?;
    let (length, pos) = read_varnum(wire, pos)?;
    let typ = u32::try_from(typ).map_err(|_| TlvError::BadVarNum)?;
    Ok((typ, length, pos))
}

/// Decodes the complete element starting at `pos`, bounded by `end`.
pub fn decode_element(wire: &[u8], pos: usize, end: usize) -> Result<Element, TlvError> {
    let end = end.min(wire.len());
    let (typ, length, value_start) = read_header(wire, pos, end)?;
    let length = usize::try_from(length).map_err(|_| TlvError::BadVarNum)?;
    let value_end = value_start.checked_add(length).ok_or(TlvError::BadVarNum)?;
    if value_end > end {
        return Err(TlvError::Truncated);
    }
    Ok(Element { typ, start: pos, value: value_start..value_end })
}

/// Iterator over consecutive elements in `wire[range]`.
///
/// In strict mode a malformed element yields one `Err` and ends the iteration.
/// In tolerant mode (see [`Elements::tolerant`]) an element whose value runs past
/// the end is yielded clipped to the available bytes, then iteration stops; a
/// truncated header just stops.
pub struct Elements<'a> {
    wire: &'a [u8],
    pos: usize,
    end: usize,
    tolerant: bool,
    done: bool,
}

impl<'a> Elements<'a> {
    pub fn new(wire: &'a [u8], range: Range<usize>) -> Self {
        let end = range.end.min(wire.len());
        Self { wire, pos: range.start, end, tolerant: false, done: false }
    }

    pub fn tolerant(mut self) -> Self {
        self.tolerant = true;
        self
    }
}

impl Iterator for Elements<'_> {
    type Item = Result<Element, TlvError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.end {
            return None;
        }
        match decode_element(self.wire, self.pos, self.end) {
            Ok(ele) => {
                self.pos = ele.value.end;
                Some(Ok(ele))
            }
            Err(e) => {
                self.done = true;
                if !self.tolerant {
                    return Some(Err(e));
                }
                let partial = IncompleteTlv::decode(self.wire, self.pos..self.end)?;
                Some(Ok(Element { typ: partial.typ, start: self.pos, value: partial.value }))
            }
        }
    }
}

/// An element whose value may be cut short by the end of the buffer.
///
/// The first fragment of a multi-fragment message holds only the beginning of
/// the network-layer packet. `size` and `length` reflect the declared TLV-LENGTH;
/// `value` covers whatever bytes are actually present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompleteTlv {
    pub typ: u32,
    pub size: usize,
    pub length: usize,
    pub value: Range<usize>,
}

impl IncompleteTlv {
    pub fn decode(wire: &[u8], range: Range<usize>) -> Option<Self> {
        let end = range.end.min(wire.len());
        let (typ, length, value_start) = read_header(wire, range.start, end).ok()?;
        let length = usize::try_from(length).ok()?;
        let size = (value_start - range.start).checked_add(length)?;
        let value_end = value_start.saturating_add(length).min(end);
        Some(Self { typ, size, length, value: value_start..value_end })
    }
}

/// Decodes a NonNegativeInteger (1, 2, 4 or 8 octets, big endian).
pub fn decode_nni(value: &[u8]) -> Result<u64, TlvError> {
    match value.len() {
        1 | 2 | 4 | 8 => Ok(value.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)),
        _ => Err(TlvError::BadNonNegativeInteger),
    }
}
