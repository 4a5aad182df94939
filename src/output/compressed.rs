//! Output files, compressed according to their extension.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::write::GzEncoder;

/// A writer that needs an explicit end-of-stream step.
pub trait Finish: Write {
    fn finish(&mut self) -> io::Result<()>;
}

impl Finish for Vec<u8> {
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

enum Encoder {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
    Zstd(zstd::stream::write::Encoder<'static, BufWriter<File>>),
}

/// A file written plain, gzip (`.gz`) or zstd (`.zst`) compressed.
pub struct CompressedFile {
    inner: Option<Encoder>,
}

impl CompressedFile {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("Cannot create {:?}", path))?;
        let w = BufWriter::new(file);
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let inner = match ext {
            "gz" => Encoder::Gzip(GzEncoder::new(w, flate2::Compression::fast())),
            "zst" => Encoder::Zstd(zstd::stream::write::Encoder::new(w, 1).context("zstd encoder")?),
            _ => Encoder::Plain(w),
        };
        Ok(Self { inner: Some(inner) })
    }

    fn encoder(&mut self) -> io::Result<&mut Encoder> {
        self.inner.as_mut().ok_or_else(|| io::Error::new(io::ErrorKind::Other, "output already finished"))
    }
}

impl Write for CompressedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.encoder()? {
            Encoder::Plain(w) => w.write(buf),
            Encoder::Gzip(w) => w.write(buf),
            Encoder::Zstd(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.encoder()? {
            Encoder::Plain(w) => w.flush(),
            Encoder::Gzip(w) => w.flush(),
            Encoder::Zstd(w) => w.flush(),
        }
    }
}

impl Finish for CompressedFile {
    fn finish(&mut self) -> io::Result<()> {
        let mut w = match self.inner.take() {
            None => return Ok(()),
            Some(Encoder::Plain(w)) => w,
            Some(Encoder::Gzip(w)) => w.finish()?,
            Some(Encoder::Zstd(w)) => w.finish()?,
        };
        w.flush()
    }
}

impl Drop for CompressedFile {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}
