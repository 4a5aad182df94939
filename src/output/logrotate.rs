//! Output files that can be reopened after an external log rotation.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use tracing::info;

use super::RecordOutput;
use crate::record::Record;

type Opener<T> = fn(&Path) -> Result<T>;

struct Shared<T> {
    path: PathBuf,
    open: Opener<T>,
    sink: Mutex<Option<T>>,
}

impl<T> Shared<T> {
    fn lock(&self) -> Result<MutexGuard<'_, Option<T>>> {
        self.sink.lock().map_err(|_| anyhow!("output lock poisoned: {:?}", self.path))
    }
}

trait Reopen: Send + Sync {
    fn reopen(&self) -> Result<()>;
}

impl<T: RecordOutput> Reopen for Shared<T> {
    fn reopen(&self) -> Result<()> {
        let mut sink = self.lock()?;
        if let Some(mut old) = sink.take() {
            old.close()?;
        }
        *sink = Some((self.open)(&self.path)?);
        info!(path = %self.path.display(), "reopened output");
        Ok(())
    }
}

/// Triggers a reopen of a [`Logrotate`] output from any thread.
#[derive(Clone)]
pub struct RotateHandle(Arc<dyn Reopen>);

impl RotateHandle {
    pub fn rotate(&self) -> Result<()> {
        self.0.reopen()
    }
}

/// Wraps a file output so that [`RotateHandle::rotate`] closes the current
/// file and creates a new one at the same path. Writes and reopening are
/// serialized by one mutex.
pub struct Logrotate<T> {
    shared: Arc<Shared<T>>,
}

impl<T: RecordOutput + 'static> Logrotate<T> {
    pub fn open(path: &Path, open: Opener<T>) -> Result<(Self, RotateHandle)> {
        let shared = Arc::new(Shared { path: path.to_path_buf(), open, sink: Mutex::new(Some(open(path)?)) });
        let handle = RotateHandle(shared.clone());
        Ok((Self { shared }, handle))
    }
}

impl<T: RecordOutput> RecordOutput for Logrotate<T> {
    fn write(&mut self, rec: &Record<'_>) -> Result<()> {
        match self.shared.lock()?.as_mut() {
            Some(sink) => sink.write(rec),
            None => Err(anyhow!("output {:?} is closed", self.shared.path)),
        }
    }

    fn close(&mut self) -> Result<()> {
        match self.shared.lock()?.take() {
            Some(mut sink) => sink.close(),
            None => Ok(()),
        }
    }
}
