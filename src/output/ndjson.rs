//! One JSON object per line.

use anyhow::{Context, Result};

use super::compressed::Finish;
use super::RecordOutput;
use crate::record::Record;

pub struct NdjsonOutput<W: Finish> {
    w: W,
}

impl<W: Finish> NdjsonOutput<W> {
    pub fn new(w: W) -> Self {
        Self { w }
    }

    pub fn into_inner(self) -> W {
        self.w
    }
}

impl<W: Finish + Send> RecordOutput for NdjsonOutput<W> {
    fn write(&mut self, rec: &Record<'_>) -> Result<()> {
        if rec.kind.is_none() {
            return Ok(());
        }
        serde_json::to_writer(&mut self.w, rec).context("encoding record")?;
        self.w.write_all(b"\n")?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.w.finish().context("closing NDJSON output")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Direction, PacketKind};

    #[test]
    fn writes_lines_and_skips_transport_only() {
        let mut out = NdjsonOutput::new(Vec::new());
        let mut r = Record::new(Direction::Inbound, 7, vec![1]);
        out.write(&r).unwrap();
        r.kind = Some(PacketKind::Fragment);
        r.fragmented = true;
        r.size = 9;
        out.write(&r).unwrap();
        out.write(&r).unwrap();
        out.close().unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"t":">F","ts":7,"flow":"AQ==","size":9}"#);
    }
}
