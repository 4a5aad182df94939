//! Live capture on one network interface.

use std::io;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use pnet::datalink::{self, Channel, Config, DataLinkReceiver};
use pnet::util::MacAddr;
use tracing::info;

use super::{CaptureInfo, CloseHandle, FrameSource};
use crate::error::{Error, Result};

/// How long a read may block before the close flag is checked again.
const POLL_TIMEOUT: Duration = Duration::from_secs(1);

pub struct NetifSource {
    name: String,
    index: u32,
    mac: [u8; 6],
    rx: Box<dyn DataLinkReceiver>,
    closer: CloseHandle,
}

impl NetifSource {
    pub fn open(ifname: &str) -> Result<Self> {
        let iface = datalink::interfaces()
            .into_iter()
            .find(|i| i.name == ifname)
            .ok_or_else(|| Error::UnsupportedInterface(ifname.to_string()))?;
        let MacAddr(a, b, c, d, e, f) = iface.mac.ok_or_else(|| Error::UnsupportedInterface(ifname.to_string()))?;

        let config = Config { read_timeout: Some(POLL_TIMEOUT), promiscuous: true, ..Config::default() };
        let rx = match datalink::channel(&iface, config)? {
            Channel::Ethernet(_tx, rx) => rx,
            _ => return Err(Error::UnsupportedInterface(ifname.to_string())),
        };
        info!(ifname, index = iface.index, "capturing on interface");
        Ok(Self { name: ifname.to_string(), index: iface.index, mac: [a, b, c, d, e, f], rx, closer: CloseHandle::default() })
    }
}

fn now_nanos() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as i64).unwrap_or(0)
}

impl FrameSource for NetifSource {
    fn read_frame(&mut self, buf: &mut Vec<u8>) -> Result<Option<CaptureInfo>> {
        loop {
            if self.closer.is_closed() {
                return Ok(None);
            }
            match self.rx.next() {
                Ok(frame) => {
                    let timestamp = now_nanos();
                    buf.clear();
                    buf.extend_from_slice(frame);
                    let len = frame.len() as u32;
                    return Ok(Some(CaptureInfo { timestamp, caplen: len, origlen: len, interface: Some(self.index) }));
                }
                Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {}
                Err(e) => return Err(Error::Capture(e.to_string())),
            }
        }
    }

    fn is_local(&self, mac: &[u8]) -> bool {
        mac == self.mac
    }

    fn close_handle(&self) -> CloseHandle {
        self.closer.clone()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
