//! Builders for hand-made frames and NDN packets used across the unit tests.

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::input::{CaptureInfo, CloseHandle, FrameSource};
use crate::ndn::tt;

pub const LOCAL_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];
pub const REMOTE_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x02];
pub const LOCAL_IP: [u8; 4] = [192, 168, 7, 10];
pub const REMOTE_IP: [u8; 4] = [198, 51, 100, 20];

// ─── TLV ──────────────────────────────────────────────────────────────────────

pub fn varnum(v: u64) -> Vec<u8> {
    match v {
        0..=252 => vec![v as u8],
        253..=0xffff => [&[253u8][..], &(v as u16).to_be_bytes()].concat(),
        0x1_0000..=0xffff_ffff => [&[254u8][..], &(v as u32).to_be_bytes()].concat(),
        _ => [&[255u8][..], &v.to_be_bytes()].concat(),
    }
}

pub fn tlv(typ: u32, value: &[u8]) -> Vec<u8> {
    let mut out = varnum(typ as u64);
    out.extend(varnum(value.len() as u64));
    out.extend_from_slice(value);
    out
}

pub fn nni(typ: u32, v: u64) -> Vec<u8> {
    let bytes = v.to_be_bytes();
    let width = match v {
        0..=0xff => 1,
        0x100..=0xffff => 2,
        0x1_0000..=0xffff_ffff => 4,
        _ => 8,
    };
    tlv(typ, &bytes[8 - width..])
}

pub fn name(comps: &[&str]) -> Vec<u8> {
    let value: Vec<u8> = comps.iter().flat_map(|c| tlv(tt::GENERIC_NAME_COMPONENT, c.as_bytes())).collect();
    tlv(tt::NAME, &value)
}

#[derive(Default)]
pub struct InterestFields<'a> {
    pub name: &'a [&'a str],
    pub can_be_prefix: bool,
    pub must_be_fresh: bool,
    pub fw_hint: &'a [&'a str],
    pub lifetime: Option<u64>,
    pub hop_limit: Option<u8>,
    pub app_params: Option<&'a [u8]>,
}

pub fn interest_tlv(f: &InterestFields<'_>) -> Vec<u8> {
    let mut v = name(f.name);
    if f.can_be_prefix {
        v.extend(tlv(tt::CAN_BE_PREFIX, &[]));
    }
    if f.must_be_fresh {
        v.extend(tlv(tt::MUST_BE_FRESH, &[]));
    }
    if !f.fw_hint.is_empty() {
        v.extend(tlv(tt::FORWARDING_HINT, &name(f.fw_hint)));
    }
    v.extend(tlv(tt::NONCE, &[0xa1, 0xb2, 0xc3, 0xd4]));
    if let Some(l) = f.lifetime {
        v.extend(nni(tt::INTEREST_LIFETIME, l));
    }
    if let Some(h) = f.hop_limit {
        v.extend(tlv(tt::HOP_LIMIT, &[h]));
    }
    if let Some(p) = f.app_params {
        v.extend(tlv(tt::APPLICATION_PARAMETERS, p));
    }
    tlv(tt::INTEREST, &v)
}

pub fn data_tlv(
    comps: &[&str],
    content_type: Option<u64>,
    freshness: Option<u64>,
    final_block: Option<&str>,
    content: &[u8],
) -> Vec<u8> {
    let mut meta = Vec::new();
    if let Some(ct) = content_type {
        meta.extend(nni(tt::CONTENT_TYPE, ct));
    }
    if let Some(fp) = freshness {
        meta.extend(nni(tt::FRESHNESS_PERIOD, fp));
    }
    if let Some(fb) = final_block {
        meta.extend(tlv(tt::FINAL_BLOCK_ID, &tlv(tt::GENERIC_NAME_COMPONENT, fb.as_bytes())));
    }
    let mut v = name(comps);
    v.extend(tlv(tt::META_INFO, &meta));
    v.extend(tlv(tt::CONTENT, content));
    v.extend(tlv(tt::SIGNATURE_INFO, &nni(0x1b, 0)));
    v.extend(tlv(tt::SIGNATURE_VALUE, &[0x5a; 32]));
    tlv(tt::DATA, &v)
}

pub fn lp_tlv(headers: &[Vec<u8>], payload: &[u8]) -> Vec<u8> {
    let mut v: Vec<u8> = headers.concat();
    v.extend(tlv(tt::LP_FRAGMENT, payload));
    tlv(tt::LP_PACKET, &v)
}

// ─── Frames ───────────────────────────────────────────────────────────────────

pub fn eth(src: [u8; 6], dst: [u8; 6], ether_type: u16, payload: &[u8]) -> Vec<u8> {
    let mut f = Vec::with_capacity(14 + payload.len());
    f.extend_from_slice(&dst);
    f.extend_from_slice(&src);
    f.extend_from_slice(&ether_type.to_be_bytes());
    f.extend_from_slice(payload);
    f
}

pub fn ipv4(src: [u8; 4], dst: [u8; 4], proto: u8, payload: &[u8]) -> Vec<u8> {
    let mut p = vec![0u8; 20];
    p[0] = 0x45;
    p[2..4].copy_from_slice(&((20 + payload.len()) as u16).to_be_bytes());
    p[8] = 64;
    p[9] = proto;
    p[12..16].copy_from_slice(&src);
    p[16..20].copy_from_slice(&dst);
    p.extend_from_slice(payload);
    p
}

pub fn ipv6(src: [u8; 16], dst: [u8; 16], next: u8, payload: &[u8]) -> Vec<u8> {
    let mut p = vec![0u8; 40];
    p[0] = 0x60;
    p[4..6].copy_from_slice(&(payload.len() as u16).to_be_bytes());
    p[6] = next;
    p[7] = 64;
    p[8..24].copy_from_slice(&src);
    p[24..40].copy_from_slice(&dst);
    p.extend_from_slice(payload);
    p
}

pub fn udp(sport: u16, dport: u16, payload: &[u8]) -> Vec<u8> {
    let mut s = Vec::with_capacity(8 + payload.len());
    s.extend_from_slice(&sport.to_be_bytes());
    s.extend_from_slice(&dport.to_be_bytes());
    s.extend_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
    s.extend_from_slice(&[0, 0]);
    s.extend_from_slice(payload);
    s
}

pub fn tcp(sport: u16, dport: u16, payload: &[u8]) -> Vec<u8> {
    let mut s = vec![0u8; 20];
    s[0..2].copy_from_slice(&sport.to_be_bytes());
    s[2..4].copy_from_slice(&dport.to_be_bytes());
    s[12] = 5 << 4;
    s[13] = 0x18; // PSH|ACK
    s.extend_from_slice(payload);
    s
}

/// Ethernet + IPv4 + UDP frame, outbound from the local host.
pub fn udp_frame_out(sport: u16, dport: u16, payload: &[u8]) -> Vec<u8> {
    eth(LOCAL_MAC, REMOTE_MAC, 0x0800, &ipv4(LOCAL_IP, REMOTE_IP, 17, &udp(sport, dport, payload)))
}

/// Ethernet + IPv4 + TCP frame, inbound to the local host.
pub fn tcp_frame_in(sport: u16, dport: u16, payload: &[u8]) -> Vec<u8> {
    eth(REMOTE_MAC, LOCAL_MAC, 0x0800, &ipv4(REMOTE_IP, LOCAL_IP, 6, &tcp(sport, dport, payload)))
}

pub fn ws_frame(flag_op: u8, mask: Option<[u8; 4]>, payload: &[u8]) -> Vec<u8> {
    let mut f = vec![flag_op];
    let mask_bit = if mask.is_some() { 0x80 } else { 0 };
    match payload.len() {
        0..=125 => f.push(mask_bit | payload.len() as u8),
        126..=0xffff => {
            f.push(mask_bit | 126);
            f.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        }
        n => {
            f.push(mask_bit | 127);
            f.extend_from_slice(&(n as u64).to_be_bytes());
        }
    }
    match mask {
        Some(key) => {
            f.extend_from_slice(&key);
            f.extend(payload.iter().enumerate().map(|(i, b)| b ^ key[i % 4]));
        }
        None => f.extend_from_slice(payload),
    }
    f
}

// ─── Frame source ─────────────────────────────────────────────────────────────

/// In-memory frame source; each frame is stamped one millisecond after the last.
pub struct MemorySource {
    frames: VecDeque<Vec<u8>>,
    local: [u8; 6],
    ts: i64,
    fail_at_end: bool,
    closer: CloseHandle,
}

impl MemorySource {
    pub fn new(frames: Vec<Vec<u8>>) -> Self {
        Self {
            frames: frames.into(),
            local: LOCAL_MAC,
            ts: 1_700_000_000_000_000_000,
            fail_at_end: false,
            closer: CloseHandle::default(),
        }
    }

    /// Report a capture error instead of end-of-stream once the frames run out.
    pub fn failing(mut self) -> Self {
        self.fail_at_end = true;
        self
    }
}

impl FrameSource for MemorySource {
    fn read_frame(&mut self, buf: &mut Vec<u8>) -> Result<Option<CaptureInfo>> {
        if self.closer.is_closed() {
            return Ok(None);
        }
        let Some(frame) = self.frames.pop_front() else {
            if self.fail_at_end {
                return Err(Error::Capture("device went away".into()));
            }
            return Ok(None);
        };
        self.ts += 1_000_000;
        buf.clear();
        buf.extend_from_slice(&frame);
        Ok(Some(CaptureInfo {
            timestamp: self.ts,
            caplen: frame.len() as u32,
            origlen: frame.len() as u32,
            interface: Some(3),
        }))
    }

    fn is_local(&self, mac: &[u8]) -> bool {
        mac == self.local
    }

    fn close_handle(&self) -> CloseHandle {
        self.closer.clone()
    }

    fn name(&self) -> &str {
        "memory"
    }
}
