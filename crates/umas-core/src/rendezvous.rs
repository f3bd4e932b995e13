//! Port rendezvous between a task server and its clients.
//!
//! The server publishes its dynamically assigned port as a small JSON record,
//! keyed by job identity:
//!
//! ```text
//! /tmp/umas_port_{job_id}.json   ->   {"port": 5005}
//! ```
//!
//! No locking is applied. A client may observe a stale or momentarily absent
//! record while a server restarts; the dispatcher's wait loop tolerates the
//! latter and the former surfaces as a connection error.

use crate::config::RendezvousConfig;
use crate::error::{Result, UmasError};
use crate::job::get_job_id;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// On-disk content of a rendezvous file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendezvousRecord {
    pub port: u16,
}

/// Where a server advertises its port and where clients look for it.
pub trait RendezvousStore: Send + Sync {
    /// Publish `port`, replacing any previous record.
    fn save(&self, port: u16) -> Result<()>;

    /// Read the published port. Absence is reported as [`UmasError::NotFound`].
    fn load(&self) -> Result<u16>;

    /// Delete the record. Best-effort: failures are swallowed.
    fn remove(&self);

    /// Whether a record is currently visible.
    fn exists(&self) -> bool;

    /// Location used in diagnostics.
    fn location(&self) -> &Path;
}

/// Rendezvous file path for `job_id` in the default directory.
pub fn path_for(job_id: &str) -> PathBuf {
    path_in(Path::new(RendezvousConfig::DIR), job_id)
}

/// Rendezvous file path for `job_id` under `dir`.
pub fn path_in(dir: &Path, job_id: &str) -> PathBuf {
    dir.join(format!(
        "{}{}{}",
        RendezvousConfig::FILE_PREFIX,
        job_id,
        RendezvousConfig::FILE_SUFFIX
    ))
}

/// Filesystem-backed rendezvous record.
#[derive(Debug, Clone)]
pub struct FileRendezvous {
    path: PathBuf,
}

impl FileRendezvous {
    /// Record for the job identity of the current process.
    pub fn for_current_job() -> Self {
        Self::for_job(&get_job_id())
    }

    /// Record for an explicit job identity in the default directory.
    pub fn for_job(job_id: &str) -> Self {
        Self {
            path: path_for(job_id),
        }
    }

    /// Record for an explicit job identity under `dir`.
    pub fn in_dir(dir: impl AsRef<Path>, job_id: &str) -> Self {
        Self {
            path: path_in(dir.as_ref(), job_id),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RendezvousStore for FileRendezvous {
    /// Written to a temp file and renamed into place, so readers never see a
    /// half-written record.
    fn save(&self, port: u16) -> Result<()> {
        let content = serde_json::to_vec(&RendezvousRecord { port }).map_err(UmasError::encode)?;

        let temp_path = self
            .path
            .with_extension(format!("json.{}.tmp", std::process::id()));
        std::fs::write(&temp_path, content).map_err(|e| UmasError::io_with_path(e, &temp_path))?;
        if let Err(e) = std::fs::rename(&temp_path, &self.path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(UmasError::io_with_path(e, &self.path));
        }

        debug!("Published port {} at {}", port, self.path.display());
        Ok(())
    }

    fn load(&self) -> Result<u16> {
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(UmasError::NotFound {
                    path: self.path.clone(),
                });
            }
            Err(e) => return Err(UmasError::io_with_path(e, &self.path)),
        };

        let record: RendezvousRecord =
            serde_json::from_slice(&content).map_err(UmasError::decode)?;
        Ok(record.port)
    }

    fn remove(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!("Ignoring failure to remove {}: {}", self.path.display(), e);
        }
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

/// In-memory rendezvous record, for tests and single-process setups.
#[derive(Debug)]
pub struct MemoryRendezvous {
    label: PathBuf,
    port: Mutex<Option<u16>>,
}

impl MemoryRendezvous {
    pub fn new() -> Self {
        Self {
            label: PathBuf::from("memory"),
            port: Mutex::new(None),
        }
    }

    /// A store that already holds `port`.
    pub fn with_port(port: u16) -> Self {
        let store = Self::new();
        store.set(Some(port));
        store
    }

    fn set(&self, port: Option<u16>) {
        *self.port.lock().unwrap_or_else(|e| e.into_inner()) = port;
    }

    fn get(&self) -> Option<u16> {
        *self.port.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryRendezvous {
    fn default() -> Self {
        Self::new()
    }
}

impl RendezvousStore for MemoryRendezvous {
    fn save(&self, port: u16) -> Result<()> {
        self.set(Some(port));
        Ok(())
    }

    fn load(&self) -> Result<u16> {
        self.get().ok_or_else(|| UmasError::NotFound {
            path: self.label.clone(),
        })
    }

    fn remove(&self) {
        self.set(None);
    }

    fn exists(&self) -> bool {
        self.get().is_some()
    }

    fn location(&self) -> &Path {
        &self.label
    }
}
