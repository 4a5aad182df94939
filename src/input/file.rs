//! Capture file replay (pcap / pcapng, optionally gzip or zstd compressed).

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{create_reader, Block, Linktype, PcapBlockOwned, PcapError};
use tracing::{info, warn};

use super::{CaptureInfo, CloseHandle, FrameSource};
use crate::error::{Error, Result};

const READ_BUFFER: usize = 1 << 20;

#[derive(Debug, Clone, Copy)]
struct Interface {
    tsresol: u8,
    tsoffset: i64,
}

#[derive(Default)]
struct ReplayState {
    legacy_nanos: bool,
    interfaces: Vec<Interface>,
    warned_linktype: bool,
}

impl ReplayState {
    fn check_linktype(&mut self, linktype: Linktype) {
        if linktype != Linktype::ETHERNET && !self.warned_linktype {
            warn!(?linktype, "capture is not Ethernet, frames will not decode");
            self.warned_linktype = true;
        }
    }
}

/// `create_reader` erases the `Send` bound of the concrete reader it builds.
struct SendReader(Box<dyn PcapReaderIterator>);

// SAFETY: `create_reader` only builds `PcapNGReader`/`LegacyPcapReader` over the
// `Box<dyn Read + Send>` passed in `FileSource::open`, and both are `Send` then.
unsafe impl Send for SendReader {}

impl std::ops::Deref for SendReader {
    type Target = dyn PcapReaderIterator;
    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl std::ops::DerefMut for SendReader {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.0
    }
}

/// Replays a capture file as if captured on the host owning `local`.
pub struct FileSource {
    name: String,
    reader: SendReader,
    state: ReplayState,
    local: [u8; 6],
    closer: CloseHandle,
}

enum Compression {
    None,
    Gzip,
    Zstd,
}

fn classify_path(path: &Path) -> Result<Compression> {
    let name = path.file_name().map(|n| n.to_string_lossy().to_lowercase()).unwrap_or_default();
    let (stem, compression) = if let Some(s) = name.strip_suffix(".gz") {
        (s, Compression::Gzip)
    } else if let Some(s) = name.strip_suffix(".zst") {
        (s, Compression::Zstd)
    } else {
        (name.as_str(), Compression::None)
    };
    if stem.ends_with(".pcap") || stem.ends_with(".pcapng") {
        Ok(compression)
    } else {
        Err(Error::UnknownExtension(path.display().to_string()))
    }
}

impl FileSource {
    pub fn open(path: &Path, local: [u8; 6]) -> Result<Self> {
        let compression = classify_path(path)?;
        let file = BufReader::new(File::open(path)?);
        let stream: Box<dyn Read + Send> = match compression {
            Compression::None => Box::new(file),
            Compression::Gzip => Box::new(MultiGzDecoder::new(file)),
            Compression::Zstd => Box::new(zstd::stream::read::Decoder::with_buffer(file)?),
        };
        let reader = create_reader(READ_BUFFER, stream).map_err(|e| Error::Capture(format!("{e:?}")))?;
        info!(file = %path.display(), "replaying capture");
        Ok(Self {
            name: path.display().to_string(),
            reader: SendReader(reader),
            state: ReplayState::default(),
            local,
            closer: CloseHandle::default(),
        })
    }
}

/// pcapng timestamp units to nanoseconds.
fn pcapng_nanos(iface: &Interface, ts_high: u32, ts_low: u32) -> i64 {
    let ts = ((ts_high as u128) << 32) | ts_low as u128;
    let per_sec: u128 = if iface.tsresol & 0x80 != 0 {
        1u128 << (iface.tsresol & 0x7f).min(64)
    } else {
        10u128.pow((iface.tsresol as u32).min(19))
    };
    let nanos = ts * 1_000_000_000 / per_sec;
    (nanos as i64).saturating_add(iface.tsoffset.saturating_mul(1_000_000_000))
}

fn fill(buf: &mut Vec<u8>, data: &[u8], caplen: u32) -> usize {
    let n = (caplen as usize).min(data.len());
    buf.clear();
    buf.extend_from_slice(&data[..n]);
    n
}

fn take_block(block: PcapBlockOwned<'_>, state: &mut ReplayState, buf: &mut Vec<u8>) -> Option<CaptureInfo> {
    match block {
        PcapBlockOwned::LegacyHeader(hdr) => {
            state.legacy_nanos = hdr.is_nanosecond_precision();
            state.check_linktype(hdr.network);
            None
        }
        PcapBlockOwned::Legacy(pkt) => {
            let frac = if state.legacy_nanos { pkt.ts_usec as i64 } else { pkt.ts_usec as i64 * 1000 };
            let caplen = fill(buf, pkt.data, pkt.caplen) as u32;
            Some(CaptureInfo {
                timestamp: pkt.ts_sec as i64 * 1_000_000_000 + frac,
                caplen,
                origlen: pkt.origlen,
                interface: None,
            })
        }
        PcapBlockOwned::NG(Block::SectionHeader(_)) => {
            state.interfaces.clear();
            None
        }
        PcapBlockOwned::NG(Block::InterfaceDescription(idb)) => {
            state.check_linktype(idb.linktype);
            state.interfaces.push(Interface {
                tsresol: idb.if_tsresol,
                tsoffset: idb.if_tsoffset as i64,
            });
            None
        }
        PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => {
            let iface = state.interfaces.get(epb.if_id as usize).copied()?;
            let caplen = fill(buf, epb.data, epb.caplen) as u32;
            Some(CaptureInfo {
                timestamp: pcapng_nanos(&iface, epb.ts_high, epb.ts_low),
                caplen,
                origlen: epb.origlen,
                interface: Some(epb.if_id),
            })
        }
        PcapBlockOwned::NG(Block::SimplePacket(spb)) => {
            let caplen = fill(buf, spb.data, spb.origlen) as u32;
            Some(CaptureInfo { timestamp: 0, caplen, origlen: spb.origlen, interface: Some(0) })
        }
        PcapBlockOwned::NG(_) => None,
    }
}

impl FrameSource for FileSource {
    fn read_frame(&mut self, buf: &mut Vec<u8>) -> Result<Option<CaptureInfo>> {
        loop {
            if self.closer.is_closed() {
                return Ok(None);
            }
            match self.reader.next() {
                Ok((offset, block)) => {
                    let info = take_block(block, &mut self.state, buf);
                    self.reader.consume(offset);
                    if info.is_some() {
                        return Ok(info);
                    }
                }
                Err(PcapError::Eof) => return Ok(None),
                Err(PcapError::Incomplete) => {
                    if self.reader.reader_exhausted() {
                        warn!(file = %self.name, "capture file ends with a truncated block");
                        return Ok(None);
                    }
                    self.reader.refill().map_err(|e| Error::Capture(format!("refill error: {e:?}")))?;
                }
                Err(e) => return Err(Error::Capture(format!("pcap parse error: {e:?}"))),
            }
        }
    }

    fn is_local(&self, mac: &[u8]) -> bool {
        mac == self.local
    }

    fn close_handle(&self) -> CloseHandle {
        self.closer.clone()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
