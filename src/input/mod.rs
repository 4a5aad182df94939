//! Frame sources: capture files and live interfaces.

use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pnet::util::MacAddr;

use crate::error::{Error, Result};

mod file;
mod netif;

pub use file::FileSource;
pub use netif::NetifSource;

/// Metadata of one captured frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureInfo {
    /// Nanoseconds since the Unix epoch.
    pub timestamp: i64,
    pub caplen: u32,
    pub origlen: u32,
    /// Capture interface, when the source knows it. Never exported.
    pub interface: Option<u32>,
}

/// Stops a frame source from another thread; a blocked read then reports
/// end-of-stream.
#[derive(Debug, Clone, Default)]
pub struct CloseHandle(Arc<AtomicBool>);

impl CloseHandle {
    pub fn close(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub trait FrameSource: Send {
    /// Copies the next frame into `buf`. `Ok(None)` means end of stream,
    /// including after [`CloseHandle::close`].
    fn read_frame(&mut self, buf: &mut Vec<u8>) -> Result<Option<CaptureInfo>>;

    /// Whether `mac` belongs to the observed host.
    fn is_local(&self, mac: &[u8]) -> bool;

    fn close_handle(&self) -> CloseHandle;

    fn name(&self) -> &str;
}

/// Parses a local MAC address for file replay; it must be unicast.
pub fn parse_local_mac(s: &str) -> Result<[u8; 6]> {
    let MacAddr(a, b, c, d, e, f) = MacAddr::from_str(s).map_err(|_| Error::InvalidLocalMac(s.to_string()))?;
    if a & 0x01 != 0 {
        return Err(Error::InvalidLocalMac(s.to_string()));
    }
    Ok([a, b, c, d, e, f])
}

/// Opens a live interface, or a capture file replayed as seen by `local`.
pub fn open_source(ifname: Option<&str>, input: Option<&Path>, local: Option<&str>) -> Result<Box<dyn FrameSource>> {
    match (ifname, input, local) {
        (Some(ifname), None, None) => Ok(Box::new(NetifSource::open(ifname)?)),
        (None, Some(input), Some(local)) => Ok(Box::new(FileSource::open(input, parse_local_mac(local)?)?)),
        _ => Err(Error::SourceSelection),
    }
}
