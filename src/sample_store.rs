// Append-only CSV log of samples. Insertion order is time order; rows are never
// rewritten. One async mutex serializes appends and reads so a reader never sees
// half a row and two writers never interleave.

use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::models::{LOG_HEADER, Sample};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sample log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("encode sample row: {0}")]
    Csv(#[from] csv::Error),
}

pub struct SampleStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SampleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Creates the log with its header row if absent. Never truncates an existing log.
    #[instrument(skip(self), fields(store = "samples", operation = "init"))]
    pub async fn init(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_err(e))?;
        }
        let created = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .await;
        match created {
            Ok(mut file) => {
                file.write_all(&header_bytes()?)
                    .await
                    .map_err(|e| self.io_err(e))?;
                file.flush().await.map_err(|e| self.io_err(e))?;
                debug!(path = %self.path.display(), "created sample log");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(self.io_err(e)),
        }
    }

    /// Durably appends one row. The row is encoded up front and written with a
    /// single `write_all` while holding the store lock.
    #[instrument(skip(self, sample), fields(store = "samples", operation = "append", site = %sample.target))]
    pub async fn append(&self, sample: &Sample) -> Result<(), StoreError> {
        let row = encode(Some(sample.to_record()))?;

        let _guard = self.lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_err(e))?;
        let len = file.metadata().await.map_err(|e| self.io_err(e))?.len();
        let buf = if len == 0 {
            let mut buf = header_bytes()?;
            buf.extend_from_slice(&row);
            buf
        } else {
            row
        };
        file.write_all(&buf).await.map_err(|e| self.io_err(e))?;
        file.sync_data().await.map_err(|e| self.io_err(e))?;
        Ok(())
    }

    /// All samples with `timestamp >= since`, in timestamp order. Rows that do not
    /// parse are skipped. A missing log reads as empty.
    #[instrument(skip(self), fields(store = "samples", operation = "read"))]
    pub async fn read(&self, since: NaiveDateTime) -> Result<Vec<Sample>, StoreError> {
        let Some(bytes) = self.read_bytes().await? else {
            return Ok(Vec::new());
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes.as_slice());
        let mut samples: Vec<Sample> = reader
            .records()
            .filter_map(Result::ok)
            .filter_map(|r| Sample::from_record(&r))
            .filter(|s| s.timestamp >= since)
            .collect();
        samples.sort_by_key(|s| s.timestamp);
        debug!(samples_count = samples.len(), "samples read");
        Ok(samples)
    }

    /// The full log verbatim. A missing log yields just the header row.
    #[instrument(skip(self), fields(store = "samples", operation = "read_all"))]
    pub async fn read_all(&self) -> Result<String, StoreError> {
        match self.read_bytes().await? {
            Some(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            None => Ok(String::from_utf8_lossy(&header_bytes()?).into_owned()),
        }
    }

    async fn read_bytes(&self) -> Result<Option<Vec<u8>>, StoreError> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_err(e)),
        }
    }
}

fn header_bytes() -> Result<Vec<u8>, StoreError> {
    encode(None)
}

/// Encodes the header (when `record` is `None`) or one sample row.
fn encode(record: Option<[String; 6]>) -> Result<Vec<u8>, StoreError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    match record {
        Some(r) => wtr.write_record(&r)?,
        None => wtr.write_record(LOG_HEADER)?,
    }
    wtr.into_inner()
        .map_err(|e| StoreError::Csv(csv::Error::from(e.into_error())))
}
