//! File backed store of observation records.
//!
//! One JSON file per record in the inputs directory. Drafts are keyed by
//! their internal id; exported records by the id the server knows them by.

use std::cmp::Ordering;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::codec;
use crate::error::{Error, Result};
use crate::record::{ObservationRecord, Status};

const FILE_PREFIX: &str = "input_";
const FILE_EXTENSION: &str = "json";
const SYNC_LOCK_FILE: &str = ".sync.lock";

/// Exclusive claim on a store for one synchronization run, shared by every
/// process using the same inputs directory. Released on drop.
#[derive(Debug)]
pub struct SyncLock {
    _file: File,
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        LocalStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: i64) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{key}.{FILE_EXTENSION}"))
    }

    /// Every readable record: drafts first by ascending start date, then the
    /// records pending synchronization in the same order. Unreadable files
    /// are logged and skipped.
    pub async fn read_all(&self) -> Vec<ObservationRecord> {
        let mut records: Vec<ObservationRecord> = self
            .load_all()
            .await
            .into_iter()
            .map(|(_, record)| record)
            .collect();

        records.sort_by(compare_records);
        records
    }

    /// Records waiting to be sent, in [`LocalStore::read_all`] order.
    pub async fn read_to_sync(&self) -> Vec<ObservationRecord> {
        self.read_all()
            .await
            .into_iter()
            .filter(|record| record.status == Status::ToSync)
            .collect()
    }

    pub async fn read(&self, internal_id: i64) -> Result<ObservationRecord> {
        self.locate(internal_id).await.map(|(_, record)| record)
    }

    /// Writes the record under its internal id as a draft. A pending export
    /// of the same record is dropped: editing invalidates it.
    pub async fn save(&self, record: &ObservationRecord) -> Result<ObservationRecord> {
        let mut record = record.clone();
        record.status = Status::Draft;

        if let Some(id) = record.id.filter(|id| *id != record.internal_id) {
            self.remove_file(&self.path_for(id), record.internal_id).await?;
        }

        let path = self.path_for(record.internal_id);
        self.write_file(&path, &record).await?;

        debug!(internal_id = record.internal_id, path = %path.display(), "saved draft");

        Ok(record)
    }

    /// Marks the record as ready to be sent and moves it under the id the
    /// server knows it by.
    pub async fn export(&self, internal_id: i64) -> Result<ObservationRecord> {
        let (source, mut record) = self.locate(internal_id).await?;
        record.status = Status::ToSync;

        let path = self.path_for(record.server_visible_id());
        self.write_file(&path, &record).await?;

        if source != path {
            self.remove_file(&source, internal_id).await?;
        }

        debug!(internal_id, path = %path.display(), "exported record");

        Ok(record)
    }

    pub async fn delete(&self, internal_id: i64) -> Result<ObservationRecord> {
        let (path, record) = self.locate(internal_id).await?;

        tokio::fs::remove_file(&path)
            .await
            .map_err(|source| Error::Write {
                id: internal_id,
                source,
            })?;

        debug!(internal_id, path = %path.display(), "deleted record");

        Ok(record)
    }

    /// Claims the store for a synchronization run without waiting. Fails
    /// with [`Error::SyncAlreadyRunning`] while another run, in this process
    /// or another one, holds the claim.
    pub fn try_lock_sync(&self) -> Result<SyncLock> {
        std::fs::create_dir_all(&self.dir)?;

        let path = self.dir.join(SYNC_LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(path = %path.display(), "acquired sync lock");
                Ok(SyncLock { _file: file })
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                Err(Error::SyncAlreadyRunning)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Finds the file holding a record: first by its draft name, then by
    /// scanning, since exported records are keyed by their server id.
    async fn locate(&self, internal_id: i64) -> Result<(PathBuf, ObservationRecord)> {
        let path = self.path_for(internal_id);

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let record = codec::read_slice(&bytes)?;

                if record.internal_id == internal_id {
                    return Ok((path, record));
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        self.load_all()
            .await
            .into_iter()
            .find(|(_, record)| record.internal_id == internal_id)
            .ok_or(Error::NotFound(internal_id))
    }

    async fn load_all(&self) -> Vec<(PathBuf, ObservationRecord)> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(dir = %self.dir.display(), error = %e, "cannot list records");
                }
                return Vec::new();
            }
        };

        let mut records = Vec::new();

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %self.dir.display(), error = %e, "cannot list records");
                    break;
                }
            };

            let path = entry.path();

            if !is_record_file(&path) {
                continue;
            }

            let record = match tokio::fs::read(&path).await {
                Ok(bytes) => codec::read_slice(&bytes),
                Err(e) => Err(e.into()),
            };

            match record {
                Ok(record) => records.push((path, record)),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable record"),
            }
        }

        records
    }

    /// Writes to a temporary sibling first so a crash never leaves a
    /// truncated record behind.
    async fn write_file(&self, path: &Path, record: &ObservationRecord) -> Result<()> {
        let id = record.internal_id;
        let json = codec::write_pretty(record, None)?;
        let tmp = path.with_extension("json.tmp");

        let write = async {
            tokio::fs::create_dir_all(&self.dir).await?;
            tokio::fs::write(&tmp, json.as_bytes()).await?;
            tokio::fs::rename(&tmp, path).await
        };

        write.await.map_err(|source| Error::Write { id, source })
    }

    async fn remove_file(&self, path: &Path, internal_id: i64) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(Error::Write {
                id: internal_id,
                source,
            }),
        }
    }
}

fn is_record_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == FILE_EXTENSION)
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(FILE_PREFIX))
}

fn compare_records(a: &ObservationRecord, b: &ObservationRecord) -> Ordering {
    let is_draft = |record: &ObservationRecord| record.status == Status::Draft;

    is_draft(b)
        .cmp(&is_draft(a))
        .then_with(|| a.start_date().cmp(&b.start_date()))
        .then_with(|| a.internal_id.cmp(&b.internal_id))
}
