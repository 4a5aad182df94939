//! Anonymized raw packet export in pcapng format.
//!
//! The file has one section and one Ethernet interface with nanosecond
//! timestamps. Capture interface indices are not carried over.

use std::io::Write;

use anyhow::{Context, Result};

use super::compressed::Finish;
use super::RecordOutput;
use crate::record::Record;

const BLOCK_SHB: u32 = 0x0A0D_0D0A;
const BLOCK_IDB: u32 = 0x0000_0001;
const BLOCK_EPB: u32 = 0x0000_0006;
const BYTE_ORDER_MAGIC: u32 = 0x1A2B_3C4D;

const OPT_ENDOFOPT: u16 = 0;
const OPT_SHB_USERAPPL: u16 = 4;
const OPT_IF_TSRESOL: u16 = 9;

const LINKTYPE_ETHERNET: u16 = 1;

fn pad4(n: usize) -> usize {
    (4 - n % 4) % 4
}

fn push_option(body: &mut Vec<u8>, code: u16, value: &[u8]) {
    body.extend_from_slice(&code.to_le_bytes());
    body.extend_from_slice(&(value.len() as u16).to_le_bytes());
    body.extend_from_slice(value);
    body.resize(body.len() + pad4(value.len()), 0);
}

fn write_block(w: &mut impl Write, block_type: u32, body: &[u8]) -> std::io::Result<()> {
    let total = (12 + body.len()) as u32;
    w.write_all(&block_type.to_le_bytes())?;
    w.write_all(&total.to_le_bytes())?;
    w.write_all(body)?;
    w.write_all(&total.to_le_bytes())
}

fn write_header(w: &mut impl Write) -> std::io::Result<()> {
    let mut shb = Vec::with_capacity(40);
    shb.extend_from_slice(&BYTE_ORDER_MAGIC.to_le_bytes());
    shb.extend_from_slice(&1u16.to_le_bytes());
    shb.extend_from_slice(&0u16.to_le_bytes());
    shb.extend_from_slice(&(-1i64).to_le_bytes());
    push_option(&mut shb, OPT_SHB_USERAPPL, env!("CARGO_PKG_NAME").as_bytes());
    push_option(&mut shb, OPT_ENDOFOPT, &[]);
    write_block(w, BLOCK_SHB, &shb)?;

    let mut idb = Vec::with_capacity(20);
    idb.extend_from_slice(&LINKTYPE_ETHERNET.to_le_bytes());
    idb.extend_from_slice(&0u16.to_le_bytes());
    idb.extend_from_slice(&0u32.to_le_bytes());
    push_option(&mut idb, OPT_IF_TSRESOL, &[9]);
    push_option(&mut idb, OPT_ENDOFOPT, &[]);
    write_block(w, BLOCK_IDB, &idb)
}

pub struct PcapngOutput<W: Finish> {
    w: W,
    body: Vec<u8>,
}

impl<W: Finish> PcapngOutput<W> {
    pub fn new(mut w: W) -> Result<Self> {
        write_header(&mut w).context("writing pcapng header")?;
        Ok(Self { w, body: Vec::new() })
    }

    pub fn into_inner(self) -> W {
        self.w
    }
}

impl<W: Finish + Send> RecordOutput for PcapngOutput<W> {
    fn write(&mut self, rec: &Record<'_>) -> Result<()> {
        let Some(wire) = &rec.wire else { return Ok(()) };
        let ts = rec.timestamp.max(0) as u64;
        let caplen = wire.bytes.len() as u32;
        let origlen = wire.capture.origlen.max(caplen);

        self.body.clear();
        self.body.extend_from_slice(&0u32.to_le_bytes());
        self.body.extend_from_slice(&((ts >> 32) as u32).to_le_bytes());
        self.body.extend_from_slice(&(ts as u32).to_le_bytes());
        self.body.extend_from_slice(&caplen.to_le_bytes());
        self.body.extend_from_slice(&origlen.to_le_bytes());
        self.body.extend_from_slice(wire.bytes);
        self.body.resize(self.body.len() + pad4(wire.bytes.len()), 0);
        write_block(&mut self.w, BLOCK_EPB, &self.body)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.w.finish().context("closing pcapng output")
    }
}
