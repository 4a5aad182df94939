//! Prefix-preserving address anonymization.
//!
//! The leading 24 bits of an IPv4 address, 48 bits of an IPv6 address and 24
//! bits (OUI) of a MAC address are kept; the trailing bits are XOR'ed with a
//! per-process secret. Applying the transform twice restores the input, so a
//! flow stays consistent across packets while the host part stays hidden.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use rand::RngCore;

use crate::error::{Error, Result};

/// Secret bytes consumed per address family: 1 (IPv4) + 10 (IPv6) + 3 (MAC).
pub const SECRET_LEN: usize = 14;

const V4_KEEP: u8 = 24;
const V6_KEEP: u8 = 48;

// ─── Prefixes ─────────────────────────────────────────────────────────────────

/// A CIDR prefix with host bits cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Prefix {
    addr: IpAddr,
    len: u8,
}

impl Prefix {
    /// Returns `None` if `len` exceeds the address width.
    pub fn new(addr: IpAddr, len: u8) -> Option<Self> {
        let addr = match addr {
            IpAddr::V4(a) if len <= 32 => {
                let mask = u32::MAX.checked_shl(32 - len as u32).unwrap_or(0);
                IpAddr::V4(Ipv4Addr::from(u32::from(a) & mask))
            }
            IpAddr::V6(a) if len <= 128 => {
                let mask = u128::MAX.checked_shl(128 - len as u32).unwrap_or(0);
                IpAddr::V6(Ipv6Addr::from(u128::from(a) & mask))
            }
            _ => return None,
        };
        Some(Self { addr, len })
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn len(&self) -> u8 {
        self.len
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        match Self::new(*ip, self.len) {
            Some(p) => p.addr == self.addr,
            None => false,
        }
    }

    /// Shortens the prefix to at most /24 (IPv4) or /48 (IPv6).
    fn widen_to_keep_boundary(self) -> Self {
        let max = if self.addr.is_ipv4() { V4_KEEP } else { V6_KEEP };
        if self.len <= max {
            return self;
        }
        Self::new(self.addr, max).unwrap_or(self)
    }
}

impl FromStr for Prefix {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = s.split_once('/').ok_or_else(|| "missing prefix length".to_string())?;
        let addr: IpAddr = addr.parse().map_err(|e| format!("{e}"))?;
        let len: u8 = len.parse().map_err(|_| format!("bad prefix length {len:?}"))?;
        Self::new(addr, len).ok_or_else(|| format!("prefix length {len} out of range"))
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.len)
    }
}

/// Address prefixes exempted from anonymization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeepSet {
    prefixes: Vec<Prefix>,
}

impl KeepSet {
    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.prefixes.iter().any(|p| p.contains(ip))
    }

    pub fn prefixes(&self) -> &[Prefix] {
        &self.prefixes
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

/// Parses CIDR strings into a keep-set.
///
/// IPv4 prefixes longer than /24 are shortened to /24 and IPv6 prefixes longer
/// than /48 to /48, because anonymization never touches bits above those
/// boundaries anyway.
pub fn parse_keep_set<S: AsRef<str>>(input: &[S]) -> Result<KeepSet> {
    let mut prefixes = Vec::with_capacity(input.len());
    for (index, s) in input.iter().enumerate() {
        let s = s.as_ref();
        let p: Prefix = s.trim().parse().map_err(|reason| Error::InvalidPrefix {
            index,
            input: s.to_string(),
            reason,
        })?;
        prefixes.push(p.widen_to_keep_boundary());
    }
    prefixes.sort();
    prefixes.dedup();
    Ok(KeepSet { prefixes })
}

// ─── Anonymizer ───────────────────────────────────────────────────────────────

/// Anonymizes IP and MAC addresses in place.
pub struct Anonymizer {
    keep: KeepSet,
    keep_mac: bool,
    secret: [u8; SECRET_LEN],
}

impl Anonymizer {
    /// Creates an anonymizer with a fresh random secret.
    pub fn new(keep: KeepSet, keep_mac: bool) -> Self {
        let mut secret = [0u8; SECRET_LEN];
        rand::thread_rng().fill_bytes(&mut secret);
        Self::with_secret(keep, keep_mac, secret)
    }

    /// Creates an anonymizer with a caller-chosen secret, for reproducible output.
    pub fn with_secret(keep: KeepSet, keep_mac: bool, secret: [u8; SECRET_LEN]) -> Self {
        Self { keep, keep_mac, secret }
    }

    /// Anonymizes a 4-byte or 16-byte IP address; other lengths are left alone.
    pub fn anonymize_ip(&self, addr: &mut [u8]) {
        let ip = match addr.len() {
            4 => IpAddr::from(<[u8; 4]>::try_from(&*addr).unwrap_or_default()),
            16 => IpAddr::from(<[u8; 16]>::try_from(&*addr).unwrap_or_default()),
            _ => return,
        };
        if self.keep.contains(&ip) {
            return;
        }
        let key = match addr.len() {
            4 => &self.secret[0..1],
            _ => &self.secret[1..11],
        };
        let host = addr.len() - key.len();
        xor(&mut addr[host..], key);
    }

    /// Anonymizes a 6-byte MAC address, keeping the OUI.
    pub fn anonymize_mac(&self, addr: &mut [u8]) {
        if self.keep_mac || addr.len() != 6 {
            return;
        }
        xor(&mut addr[3..], &self.secret[11..14]);
    }
}

fn xor(dst: &mut [u8], key: &[u8]) {
    for (d, k) in dst.iter_mut().zip(key) {
        *d ^= k;
    }
}
