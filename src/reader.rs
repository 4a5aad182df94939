//! Pull-based frame to record pipeline.

use std::collections::VecDeque;
use std::ops::Range;

use serde::Serialize;
use tracing::{debug, trace};

use crate::anonymizer::Anonymizer;
use crate::direction::DirectionClassifier;
use crate::error::Result;
use crate::flow::{build_flow_key, Ports};
use crate::input::{CloseHandle, FrameSource};
use crate::layers::{DecodedFrame, LayerDecoder, Ndn, IPPROTO_TCP};
use crate::ndn::tlv::Elements;
use crate::ndn::Element;
use crate::parser::{NdnPacketParser, Parsed};
use crate::record::{Direction, Record, Wire};
use crate::websocket::{extract_binary_frames, XffScrubber};

pub const DEFAULT_TCP_PORT: u16 = 6363;
pub const DEFAULT_WS_PORT: u16 = 9696;

#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// NDN over TCP and unicast UDP.
    pub tcp_port: u16,
    /// NDN over WebSocket.
    pub ws_port: u16,
    /// Leave Interest/Data payload and signatures intact.
    pub keep_payload: bool,
    /// Also emit segments on the NDN ports that carry no decodable packet,
    /// so a raw export keeps whole conversations.
    pub raw_export: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self { tcp_port: DEFAULT_TCP_PORT, ws_port: DEFAULT_WS_PORT, keep_payload: false, raw_export: false }
    }
}

// ─── Stats ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReaderStats {
    pub frames: u64,
    pub records: u64,
    pub skipped_undecodable: u64,
    pub skipped_foreign: u64,
    pub skipped_not_ndn: u64,
    pub skipped_malformed_ndn: u64,
    pub websocket_frames: u64,
    pub xff_masked: u64,
}

#[derive(Debug, Clone, Copy)]
enum Skip {
    Undecodable,
    Foreign,
    NotNdn,
    MalformedNdn,
}

// ─── Reader ───────────────────────────────────────────────────────────────────

pub struct Reader {
    source: Box<dyn FrameSource>,
    anonymizer: Anonymizer,
    decoder: LayerDecoder,
    classifier: DirectionClassifier,
    parser: NdnPacketParser,
    xff: XffScrubber,
    opts: ReaderOptions,
    buf: Vec<u8>,
    pending: VecDeque<Record<'static>>,
    stats: ReaderStats,
}

impl Reader {
    pub fn new(source: Box<dyn FrameSource>, anonymizer: Anonymizer, opts: ReaderOptions) -> Result<Self> {
        Ok(Self {
            source,
            anonymizer,
            decoder: LayerDecoder::new(opts.tcp_port),
            classifier: DirectionClassifier::new(opts.tcp_port, opts.ws_port),
            parser: NdnPacketParser::new(opts.keep_payload),
            xff: XffScrubber::new()?,
            opts,
            buf: Vec::with_capacity(65536),
            pending: VecDeque::new(),
            stats: ReaderStats::default(),
        })
    }

    pub fn stats(&self) -> &ReaderStats {
        &self.stats
    }

    pub fn close_handle(&self) -> CloseHandle {
        self.source.close_handle()
    }

    /// Returns the next record, or `None` once the source is exhausted or closed.
    ///
    /// Frames that do not yield a record are skipped. The record's wire bytes
    /// borrow an internal buffer that the next call overwrites.
    pub fn read(&mut self) -> Result<Option<Record<'_>>> {
        if let Some(rec) = self.pending.pop_front() {
            return Ok(Some(rec));
        }
        loop {
            let Some(capture) = self.source.read_frame(&mut self.buf)? else {
                return Ok(None);
            };
            self.stats.frames += 1;
            if let Some(rec) = self.process(capture.timestamp) {
                return Ok(Some(rec.with_wire(Wire { bytes: &self.buf, capture })));
            }
            if let Some(rec) = self.pending.pop_front() {
                return Ok(Some(rec));
            }
        }
    }

    fn skip(&mut self, reason: Skip) -> Option<Record<'static>> {
        trace!(frame = self.stats.frames, ?reason, "frame skipped");
        match reason {
            Skip::Undecodable => self.stats.skipped_undecodable += 1,
            Skip::Foreign => self.stats.skipped_foreign += 1,
            Skip::NotNdn => self.stats.skipped_not_ndn += 1,
            Skip::MalformedNdn => self.stats.skipped_malformed_ndn += 1,
        }
        None
    }

    fn emit(&mut self, rec: Record<'static>) -> Record<'static> {
        self.stats.records += 1;
        rec
    }

    /// Decodes, classifies and anonymizes the frame in `self.buf`. Records
    /// beyond the returned one are queued in `self.pending`.
    fn process(&mut self, timestamp: i64) -> Option<Record<'static>> {
        let Some(frame) = self.decoder.decode(&self.buf) else {
            return self.skip(Skip::Undecodable);
        };
        let source = &self.source;
        let Some(direction) = self.classifier.classify(&self.buf, &frame, |mac| source.is_local(mac)) else {
            return self.skip(Skip::Foreign);
        };

        let flow = self.anonymize(&frame, direction);
        let base = Record::new(direction, timestamp, flow);

        let stream = match &frame.transport {
            Some(t) if t.proto == IPPROTO_TCP => {
                if t.uses_port(self.opts.ws_port) {
                    let payload = t.payload.clone();
                    return self.process_websocket(payload, base);
                }
                t.uses_port(self.opts.tcp_port).then(|| t.payload.clone())
            }
            _ => None,
        };
        if let Some(payload) = stream {
            return self.process_tcp(payload, base, frame.ndn.is_some());
        }

        match frame.ndn {
            Some(Ndn { tlv, message: Some(msg) }) => {
                let parsed = self.parser.parse(&mut self.buf, msg);
                Some(self.emit(with_packet(base, tlv.size(), parsed)))
            }
            Some(Ndn { message: None, .. }) => self.skip(Skip::MalformedNdn),
            None => self.skip(Skip::NotNdn),
        }
    }

    /// A TCP segment may carry several NDN packets back to back. Each complete
    /// one is parsed and scrubbed; the first is returned and the rest queued.
    fn process_tcp(
        &mut self,
        payload: Range<usize>,
        base: Record<'static>,
        starts_with_ndn: bool,
    ) -> Option<Record<'static>> {
        let elements: Vec<Element> = Elements::new(&self.buf, payload).map_while(|e| e.ok()).collect();
        for ele in elements {
            let Some(Ndn { tlv, message: Some(msg) }) = self.decoder.decode_ndn(&self.buf, ele.start..ele.value.end)
            else {
                debug!(frame = self.stats.frames, typ = ele.typ, "undecodable element in TCP segment");
                continue;
            };
            let parsed = self.parser.parse(&mut self.buf, msg);
            let rec = self.emit(with_packet(base.clone(), tlv.size(), parsed));
            self.pending.push_back(rec);
        }
        if let Some(first) = self.pending.pop_front() {
            return Some(first);
        }
        if self.opts.raw_export {
            return Some(self.emit(base));
        }
        self.skip(if starts_with_ndn { Skip::MalformedNdn } else { Skip::NotNdn })
    }

    /// Anonymizes link and network addresses in place and returns the flow key.
    fn anonymize(&mut self, frame: &DecodedFrame, direction: Direction) -> Vec<u8> {
        self.anonymizer.anonymize_mac(&mut self.buf[frame.link.src.clone()]);
        self.anonymizer.anonymize_mac(&mut self.buf[frame.link.dst.clone()]);
        let (src, dst) = match &frame.network {
            Some(net) => {
                self.anonymizer.anonymize_ip(&mut self.buf[net.src.clone()]);
                self.anonymizer.anonymize_ip(&mut self.buf[net.dst.clone()]);
                (net.src.clone(), net.dst.clone())
            }
            None => (frame.link.src.clone(), frame.link.dst.clone()),
        };
        let ports = frame.transport.as_ref().map(|t| Ports { proto: t.proto, src: t.src_port, dst: t.dst_port });
        build_flow_key(direction, &self.buf[src], &self.buf[dst], ports)
    }

    fn process_websocket(&mut self, payload: Range<usize>, base: Record<'static>) -> Option<Record<'static>> {
        if !payload.is_empty() {
            let frames = extract_binary_frames(&mut self.buf, payload.clone());
            if frames.is_empty() {
                self.stats.xff_masked += self.xff.scrub(&mut self.buf[payload]) as u64;
            }
            for body in frames {
                self.stats.websocket_frames += 1;
                match self.decoder.decode_ndn(&self.buf, body) {
                    Some(Ndn { tlv, message: Some(msg) }) => {
                        let parsed = self.parser.parse(&mut self.buf, msg);
                        let rec = self.emit(with_packet(base.clone(), tlv.size(), parsed));
                        self.pending.push_back(rec);
                    }
                    _ => debug!(frame = self.stats.frames, "WebSocket message is not an NDN packet"),
                }
            }
        }
        if self.opts.raw_export {
            return Some(self.emit(base));
        }
        if self.pending.is_empty() {
            self.skip(Skip::NotNdn);
        }
        None
    }
}

fn with_packet(mut rec: Record<'static>, size: usize, parsed: Parsed) -> Record<'static> {
    rec.kind = Some(parsed.kind);
    rec.fragmented = parsed.fragmented;
    rec.size = size;
    rec.size3 = parsed.size3;
    rec.name = parsed.name;
    rec.detail = parsed.detail;
    rec
}
