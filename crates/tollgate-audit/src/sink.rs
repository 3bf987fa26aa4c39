//! Audit sink trait and the built-in memory and JSON-lines backends.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::entry::AuditEntry;
use crate::error::{AuditError, AuditResult};

/// Storage backend for audit entries.
///
/// Implementations must be thread-safe. Appends are expected to be cheap;
/// the engine calls [`append`](Self::append) on every decision.
pub trait AuditSink: Send + Sync {
    /// Append an entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be persisted.
    fn append(&self, entry: &AuditEntry) -> AuditResult<()>;

    /// All retained entries, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn entries(&self) -> AuditResult<Vec<AuditEntry>>;

    /// Number of retained entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn count(&self) -> AuditResult<usize> {
        self.entries().map(|e| e.len())
    }

    /// Flush buffered writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&self) -> AuditResult<()> {
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| {
        tracing::warn!("audit sink lock was poisoned, recovering");
        e.into_inner()
    })
}

// ---------------------------------------------------------------------------
// MemoryAuditSink
// ---------------------------------------------------------------------------

/// Size-bounded in-memory sink. The oldest entry is dropped when full.
#[derive(Debug)]
pub struct MemoryAuditSink {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl MemoryAuditSink {
    /// Create a sink retaining at most `capacity` entries (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    /// Maximum number of retained entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(&self, entry: &AuditEntry) -> AuditResult<()> {
        let mut entries = lock(&self.entries);
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry.clone());
        Ok(())
    }

    fn entries(&self) -> AuditResult<Vec<AuditEntry>> {
        Ok(lock(&self.entries).iter().cloned().collect())
    }

    fn count(&self) -> AuditResult<usize> {
        Ok(lock(&self.entries).len())
    }
}

// ---------------------------------------------------------------------------
// JsonlAuditSink
// ---------------------------------------------------------------------------

/// Append-only file sink writing one JSON object per line.
///
/// Existing content is preserved; reopening the same path continues the log.
#[derive(Debug)]
pub struct JsonlAuditSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonlAuditSink {
    /// Open (or create) the log at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Io`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> AuditResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing::debug!(path = %path.display(), "opened audit log");
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every well-formed entry from a JSON-lines file.
    ///
    /// Lines that fail to parse are skipped with a warning, so a torn final
    /// write does not hide the rest of the log.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Io`] if the file cannot be read.
    pub fn read_file(path: impl AsRef<Path>) -> AuditResult<Vec<AuditEntry>> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let mut entries = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        line = idx.saturating_add(1),
                        error = %e,
                        "skipping malformed audit line"
                    );
                },
            }
        }
        Ok(entries)
    }
}

impl AuditSink for JsonlAuditSink {
    fn append(&self, entry: &AuditEntry) -> AuditResult<()> {
        let line = serde_json::to_string(entry)?;
        let mut writer = lock(&self.writer);
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    fn entries(&self) -> AuditResult<Vec<AuditEntry>> {
        self.flush()?;
        Self::read_file(&self.path)
    }

    fn flush(&self) -> AuditResult<()> {
        lock(&self.writer).flush().map_err(AuditError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::AuditAction;
    use tollgate_core::{Decision, OperationIntent, Timestamp};

    fn entry(path: &str) -> AuditEntry {
        let intent = OperationIntent::file("edit", path);
        AuditEntry::decision(
            Timestamp::now(),
            None,
            intent.id.clone(),
            intent.key(),
            Decision::AutoApprove,
            Some(0.1),
        )
    }

    #[test]
    fn test_memory_sink_appends_in_order() {
        let sink = MemoryAuditSink::new(10);
        sink.append(&entry("a")).unwrap();
        sink.append(&entry("b")).unwrap();

        let entries = sink.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].operation().unwrap().target, "a");
        assert_eq!(entries[1].operation().unwrap().target, "b");
    }

    #[test]
    fn test_memory_sink_evicts_oldest() {
        let sink = MemoryAuditSink::new(3);
        for name in ["a", "b", "c", "d", "e"] {
            sink.append(&entry(name)).unwrap();
        }

        let entries = sink.entries().unwrap();
        assert_eq!(sink.count().unwrap(), 3);
        assert_eq!(entries[0].operation().unwrap().target, "c");
    }

    #[test]
    fn test_memory_sink_zero_capacity_clamped() {
        let sink = MemoryAuditSink::new(0);
        assert_eq!(sink.capacity(), 1);
        sink.append(&entry("a")).unwrap();
        assert_eq!(sink.count().unwrap(), 1);
    }

    #[test]
    fn test_jsonl_sink_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("audit.jsonl");

        {
            let sink = JsonlAuditSink::open(&path).unwrap();
            sink.append(&entry("src/a.rs")).unwrap();
            sink.append(&entry("src/b.rs")).unwrap();
        }

        let sink = JsonlAuditSink::open(&path).unwrap();
        sink.append(&entry("src/c.rs")).unwrap();

        let entries = sink.entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].operation().unwrap().target, "src/c.rs");
    }

    #[test]
    fn test_jsonl_read_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let good = serde_json::to_string(&entry("x")).unwrap();
        std::fs::write(&path, format!("{good}\nnot json\n\n{good}\n{{\"trunc")).unwrap();

        let entries = JsonlAuditSink::read_file(&path).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_jsonl_records_session_actions() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlAuditSink::open(dir.path().join("audit.jsonl")).unwrap();
        sink.append(&AuditEntry::new(
            Timestamp::now(),
            None,
            AuditAction::SessionEnded {
                reason: "stopped".to_owned(),
                approved: 2,
                blocked: 0,
            },
        ))
        .unwrap();

        let entries = sink.entries().unwrap();
        assert!(matches!(
            entries[0].action,
            AuditAction::SessionEnded { approved: 2, .. }
        ));
    }
}
