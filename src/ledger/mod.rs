//! Append-only metrics ledger.
//!
//! [`MetricsLedger`] keeps one [`AttemptRecord`] per completed upstream
//! attempt sequence and computes [`Summary`] views over them on demand.
//!
//! The in-memory list is authoritative. After each append the full list is
//! written back to the ledger file as a JSON array (temp file + rename,
//! serialized per ledger), and the file is loaded again at
//! [`open()`](MetricsLedger::open), so history survives restarts. Write
//! failures are logged and swallowed. The list is not bounded; a long-lived
//! process pays a full-file rewrite per record.

pub mod record;
pub mod summary;

pub use record::{AttemptError, AttemptRecord, SNIPPET_CHARS};
pub use summary::{RECENT_LIMIT, Summary};

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::storage;

/// Ledger configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerConfig {
    /// Ledger file. `None` keeps records in memory only.
    pub path: Option<PathBuf>,
}

impl LedgerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist records to this file.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Append-only record store with aggregate summaries.
#[derive(Debug, Default)]
pub struct MetricsLedger {
    records: RwLock<Vec<AttemptRecord>>,
    path: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl MetricsLedger {
    /// A ledger that never touches disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the ledger at `config.path`, loading existing records.
    ///
    /// A missing or empty file starts an empty ledger. An unreadable or
    /// unparseable file is logged and also starts empty; it is overwritten by
    /// the next record.
    pub async fn open(config: &LedgerConfig) -> Self {
        let records = match &config.path {
            Some(path) => load(path).await,
            None => Vec::new(),
        };
        Self {
            records: RwLock::new(records),
            path: config.path.clone(),
            write_lock: Mutex::new(()),
        }
    }

    /// Ledger file, if persistence is enabled.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append `record`. Never fails; persistence errors are logged.
    pub async fn record(&self, record: AttemptRecord) {
        {
            let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
            records.push(record);
        }
        self.persist().await;
    }

    /// Aggregate summary over every record.
    pub fn summarize(&self) -> Summary {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Summary::from_records(&records)
    }

    /// Copy of every record, oldest first.
    pub fn records(&self) -> Vec<AttemptRecord> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let _guard = self.write_lock.lock().await;
        // Snapshot under the writer lock so a later write never lands an
        // older list.
        let bytes = {
            let records = self.records.read().unwrap_or_else(|e| e.into_inner());
            serde_json::to_vec_pretty(&*records)
        };
        let written = match bytes {
            Ok(bytes) => storage::write_atomic(path, &bytes).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = written {
            error!(path = %path.display(), error = %e, "failed to write metrics ledger");
        }
    }
}

async fn load(path: &Path) -> Vec<AttemptRecord> {
    let raw = match storage::read_if_exists(path).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read metrics ledger, starting empty");
            return Vec::new();
        }
    };
    if raw.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<AttemptRecord>>(&raw) {
        Ok(records) => {
            debug!(path = %path.display(), count = records.len(), "loaded metrics ledger");
            records
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to parse metrics ledger, starting empty");
            Vec::new()
        }
    }
}
