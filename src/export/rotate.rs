//! Timer-driven sink rotation
//!
//! A new timestamped CSV file is opened on every rotation; the header
//! row is re-emitted per file. Rotation only touches the sink, never
//! the flow/session state.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::sink::{CsvSink, RecordSink};
use super::{ExportError, FlowRecord};

/// CSV sink that swaps to a fresh timestamped file on demand
pub struct RotatingCsvSink {
    dir: PathBuf,
    current: CsvSink<File>,
    current_path: PathBuf,
}

impl RotatingCsvSink {
    /// Open the sink, creating the output directory and the first file.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, ExportError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|source| ExportError::Open {
            path: dir.clone(),
            source,
        })?;

        let (current_path, current) = Self::open_file(&dir)?;
        info!("writing records to {}", current_path.display());

        Ok(Self {
            dir,
            current,
            current_path,
        })
    }

    /// Path of the file currently being written.
    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    /// Flush and close the active file, then open a new one. Returns the
    /// path of the file that was closed.
    pub fn rotate(&mut self) -> Result<PathBuf, ExportError> {
        self.current.flush()?;
        let (path, sink) = Self::open_file(&self.dir)?;
        let closed = std::mem::replace(&mut self.current_path, path);
        self.current = sink;
        info!(
            "rotated records from {} to {}",
            closed.display(),
            self.current_path.display()
        );
        Ok(closed)
    }

    fn open_file(dir: &Path) -> Result<(PathBuf, CsvSink<File>), ExportError> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let mut path = dir.join(format!("network_traffic_{}.csv", stamp));

        // Same-second rotations get a numeric suffix instead of truncating
        let mut attempt = 1;
        while path.exists() {
            path = dir.join(format!("network_traffic_{}_{}.csv", stamp, attempt));
            attempt += 1;
        }

        let sink = CsvSink::create(&path)?;
        Ok((path, sink))
    }
}

/// Spawn the timer task that rotates the sink on a fixed interval.
/// Rotation failures are logged and retried on the next tick; records
/// keep flowing to the current file in the meantime.
pub fn spawn_rotation(sink: Arc<Mutex<RotatingCsvSink>>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        // The first tick completes immediately; skip it
        tick.tick().await;
        loop {
            tick.tick().await;
            if let Err(e) = sink.lock().rotate() {
                error!("sink rotation failed: {}", e);
            }
        }
    })
}

impl RecordSink for RotatingCsvSink {
    fn write(&mut self, record: &FlowRecord) -> Result<(), ExportError> {
        self.current.write(record)
    }

    fn flush(&mut self) -> Result<(), ExportError> {
        self.current.flush()
    }
}
