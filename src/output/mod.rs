//! Record sinks.

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::reader::Reader;
use crate::record::Record;

pub mod compressed;
mod logrotate;
mod ndjson;
mod pcapng;

pub use compressed::{CompressedFile, Finish};
pub use logrotate::{Logrotate, RotateHandle};
pub use ndjson::NdjsonOutput;
pub use pcapng::PcapngOutput;

pub trait RecordOutput: Send {
    fn write(&mut self, rec: &Record<'_>) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// Sends every record to each sink. A failing sink does not stop the others;
/// all failures are reported together.
#[derive(Default)]
pub struct FanOut {
    sinks: Vec<Box<dyn RecordOutput>>,
}

impl FanOut {
    pub fn push(&mut self, sink: Box<dyn RecordOutput>) {
        self.sinks.push(sink);
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

fn join_errors(errors: Vec<anyhow::Error>) -> Result<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.into_iter().next().unwrap_or_else(|| anyhow::anyhow!("output error"))),
        n => {
            let list: Vec<String> = errors.iter().map(|e| format!("{e:#}")).collect();
            bail!("{n} outputs failed: {}", list.join("; "))
        }
    }
}

impl RecordOutput for FanOut {
    fn write(&mut self, rec: &Record<'_>) -> Result<()> {
        join_errors(self.sinks.iter_mut().filter_map(|s| s.write(rec).err()).collect())
    }

    fn close(&mut self) -> Result<()> {
        join_errors(self.sinks.iter_mut().filter_map(|s| s.close().err()).collect())
    }
}

fn open_ndjson(path: &Path) -> Result<NdjsonOutput<CompressedFile>> {
    Ok(NdjsonOutput::new(CompressedFile::create(path)?))
}

fn open_pcapng(path: &Path) -> Result<PcapngOutput<CompressedFile>> {
    PcapngOutput::new(CompressedFile::create(path)?)
}

/// Opens the requested outputs, each reopenable through the returned handles.
pub fn open_outputs(json: Option<&Path>, pcapng: Option<&Path>) -> Result<(FanOut, Vec<RotateHandle>)> {
    let mut fan = FanOut::default();
    let mut handles = Vec::new();
    if let Some(path) = json {
        let (out, h) = Logrotate::open(path, open_ndjson)?;
        fan.push(Box::new(out));
        handles.push(h);
    }
    if let Some(path) = pcapng {
        let (out, h) = Logrotate::open(path, open_pcapng)?;
        fan.push(Box::new(out));
        handles.push(h);
    }
    if fan.is_empty() {
        bail!("no output specified");
    }
    Ok((fan, handles))
}

/// Copies every record from `reader` into `out`, then closes `out` even if
/// reading or writing failed so compressed files are still finished. The
/// copy error takes precedence over a close error.
pub fn copy_records(reader: &mut Reader, out: &mut dyn RecordOutput) -> Result<()> {
    let copied = (|| -> Result<()> {
        while let Some(rec) = reader.read()? {
            out.write(&rec)?;
        }
        Ok(())
    })();
    let closed = out.close().context("closing outputs");
    copied.and(closed)
}
