//! NDN over WebSocket: binary frame extraction and handshake scrubbing.

use std::net::IpAddr;
use std::ops::Range;

use regex::bytes::Regex;
use tracing::{debug, warn};

use crate::anonymizer::Prefix;
use crate::error::Result;

/// FIN set, opcode 2 (binary).
pub const FIN_BINARY: u8 = 0x82;

struct FrameHeader {
    flag_op: u8,
    mask_key: Option<usize>,
    payload: Range<usize>,
}

fn parse_header(wire: &[u8], pos: usize) -> Option<FrameHeader> {
    let flag_op = *wire.get(pos)?;
    let b1 = *wire.get(pos + 1)?;
    let mut p = pos + 2;
    let len = match b1 & 0x7f {
        126 => {
            let b = wire.get(p..p + 2)?;
            p += 2;
            u16::from_be_bytes([b[0], b[1]]) as u64
        }
        127 => {
            let b = wire.get(p..p + 8)?;
            p += 8;
            b.iter().fold(0u64, |acc, &x| (acc << 8) | x as u64)
        }
        n => n as u64,
    };
    let mask_key = if b1 & 0x80 != 0 {
        wire.get(p..p + 4)?;
        p += 4;
        Some(p - 4)
    } else {
        None
    };
    let end = p.checked_add(usize::try_from(len).ok()?)?;
    if end > wire.len() {
        return None;
    }
    Some(FrameHeader { flag_op, mask_key, payload: p..end })
}

/// XORs the payload with the masking key, then clears the key so the
/// rewritten frame stays well-formed.
fn unmask(wire: &mut [u8], key_pos: usize, payload: Range<usize>) {
    let mut key = [0u8; 4];
    key.copy_from_slice(&wire[key_pos..key_pos + 4]);
    if key != [0; 4] {
        for (i, b) in wire[payload].iter_mut().enumerate() {
            *b ^= key[i % 4];
        }
    }
    wire[key_pos..key_pos + 4].fill(0);
}

/// Walks back-to-back WebSocket frames in `wire[segment]` and returns the
/// payload ranges of unfragmented binary frames, unmasked in place.
///
/// A truncated frame ends the walk; frames before it are still returned.
pub fn extract_binary_frames(wire: &mut [u8], segment: Range<usize>) -> Vec<Range<usize>> {
    let end = segment.end.min(wire.len());
    let mut frames = Vec::new();
    let mut pos = segment.start;
    while pos < end {
        let Some(hdr) = parse_header(&wire[..end], pos) else {
            debug!(offset = pos - segment.start, "truncated WebSocket frame");
            break;
        };
        if hdr.flag_op == FIN_BINARY {
            if let Some(key_pos) = hdr.mask_key {
                unmask(wire, key_pos, hdr.payload.clone());
            }
            frames.push(hdr.payload.clone());
        }
        pos = hdr.payload.end;
    }
    frames
}

// ─── X-Forwarded-For ──────────────────────────────────────────────────────────

/// Masks client addresses in the `X-Forwarded-For` headers of a WebSocket
/// upgrade request, in place and without changing the segment length.
pub struct XffScrubber {
    re: Regex,
}

impl XffScrubber {
    pub fn new() -> Result<Self> {
        Ok(Self { re: Regex::new(r"(?im)^x-forwarded-for:([^\r\n]*)\r$")? })
    }

    /// Returns how many headers were rewritten.
    pub fn scrub(&self, payload: &mut [u8]) -> usize {
        if !payload.starts_with(b"GET ") || !payload.ends_with(b"\r\n\r\n") {
            return 0;
        }
        let fields: Vec<Range<usize>> =
            self.re.captures_iter(payload).filter_map(|c| c.get(1)).map(|m| m.range()).collect();
        fields.into_iter().filter(|field| rewrite_field(&mut payload[field.clone()])).count()
    }
}

fn rewrite_field(out: &mut [u8]) -> bool {
    let Some(masked) = mask_addresses(out) else {
        debug!("X-Forwarded-For without parsable address left as is");
        return false;
    };
    if masked.len() > out.len() {
        warn!(field_len = out.len(), masked_len = masked.len(), "masked X-Forwarded-For does not fit, blanking");
        out.fill(b' ');
        return true;
    }
    let pad = out.len() - masked.len();
    out[..pad].fill(b' ');
    out[pad..].copy_from_slice(masked.as_bytes());
    debug!(xff = %masked, "masked X-Forwarded-For");
    true
}

/// Parses a comma-separated address list and masks each entry to /24 or /48.
fn mask_addresses(field: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(field).ok()?;
    let mut out = Vec::new();
    for entry in text.split(',') {
        let ip: IpAddr = entry.trim().parse().ok()?;
        let keep = if ip.is_ipv4() { 24 } else { 48 };
        out.push(Prefix::new(ip, keep)?.addr().to_string());
    }
    Some(out.join(", "))
}
