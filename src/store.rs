use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::BookRecord;

/// One persisted checklist row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistEntry {
    pub id: u32,
    pub title: String,
    pub author: String,
    pub year: Option<i32>,
    pub completed: bool,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no checklist entry with id {id}")]
    NotFound { id: u32 },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The durable checklist: a CSV table plus a marker-file directory.
///
/// The marker directory is a deliberate second representation of
/// "completed" (external tooling consumes it); the reconciler owns
/// convergence between the two. Single-writer: one build or one
/// mark/unmark at a time.
#[derive(Debug, Clone)]
pub struct ChecklistStore {
    data_dir: PathBuf,
}

impl ChecklistStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn table_path(&self) -> PathBuf {
        self.data_dir.join("checklist.csv")
    }

    pub fn markers_dir(&self) -> PathBuf {
        self.data_dir.join("completed")
    }

    fn marker_path(&self, id: u32) -> PathBuf {
        self.markers_dir().join(format!("{id}.done"))
    }

    /// Load the full table. A store that does not exist yet is an empty
    /// table, not an error; a table that exists but cannot be read or
    /// parsed is fatal.
    pub fn load(&self) -> anyhow::Result<BTreeMap<u32, ChecklistEntry>> {
        let path = self.table_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let mut reader = csv::Reader::from_path(&path)
            .with_context(|| format!("open checklist table: {}", path.display()))?;

        let mut table = BTreeMap::new();
        for row in reader.deserialize() {
            let entry: ChecklistEntry =
                row.with_context(|| format!("parse checklist row: {}", path.display()))?;
            table.insert(entry.id, entry);
        }
        Ok(table)
    }

    /// Persist the full table, replacing the prior one atomically: the
    /// rows go to a temp file in the same directory which is then
    /// renamed over the table, so readers see the old table or the new
    /// one, never a partial write.
    pub fn flush(&self, table: &BTreeMap<u32, ChecklistEntry>) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("create data dir: {}", self.data_dir.display()))?;

        let path = self.table_path();
        let tmp_path = path.with_extension(format!("csv.tmp.{}", uuid::Uuid::new_v4().simple()));

        let mut writer = csv::Writer::from_path(&tmp_path)
            .with_context(|| format!("create temp table: {}", tmp_path.display()))?;
        for entry in table.values() {
            writer
                .serialize(entry)
                .with_context(|| format!("write checklist row for id {}", entry.id))?;
        }
        writer
            .flush()
            .with_context(|| format!("flush temp table: {}", tmp_path.display()))?;
        drop(writer);

        std::fs::rename(&tmp_path, &path)
            .with_context(|| format!("rename temp table to: {}", path.display()))?;
        Ok(())
    }

    pub fn marker_present(&self, id: u32) -> bool {
        self.marker_path(id).exists()
    }

    /// Create or remove the marker file for `id`. Removal of an absent
    /// marker is a no-op, which keeps unmark idempotent.
    pub fn set_marker(&self, id: u32, present: bool) -> anyhow::Result<()> {
        let path = self.marker_path(id);
        if present {
            let dir = self.markers_dir();
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("create markers dir: {}", dir.display()))?;
            std::fs::write(&path, b"")
                .with_context(|| format!("create marker: {}", path.display()))?;
        } else if let Err(err) = std::fs::remove_file(&path)
            && err.kind() != std::io::ErrorKind::NotFound
        {
            return Err(err).with_context(|| format!("remove marker: {}", path.display()));
        }
        Ok(())
    }

    /// Flip completion for an existing entry, in both representations.
    ///
    /// The marker goes first: it is the authoritative signal, so a crash
    /// between the two writes is converged by read-repair at the next
    /// load. Success is only reported once the table rename has also
    /// landed.
    pub fn set_completed(&self, id: u32, value: bool) -> Result<(), StoreError> {
        let mut table = self.load()?;
        let Some(entry) = table.get_mut(&id) else {
            return Err(StoreError::NotFound { id });
        };

        self.set_marker(id, value)?;
        entry.completed = value;
        self.flush(&table)?;

        tracing::debug!(id, completed = value, "store: completion updated");
        Ok(())
    }
}

/// Fold freshly ingested candidates into the existing table.
///
/// New ids come in uncompleted; existing ids get their descriptive
/// fields refreshed while `completed` is left untouched, so a rebuild
/// can never regress a user's completion mark. Entries for ids the new
/// catalog no longer carries are kept (deletion is not a rebuild
/// concern).
pub fn merge(
    mut existing: BTreeMap<u32, ChecklistEntry>,
    candidates: Vec<BookRecord>,
) -> BTreeMap<u32, ChecklistEntry> {
    for candidate in candidates {
        match existing.get_mut(&candidate.id) {
            Some(entry) => {
                entry.title = candidate.title;
                entry.author = candidate.author;
                entry.year = candidate.year;
            }
            None => {
                existing.insert(
                    candidate.id,
                    ChecklistEntry {
                        id: candidate.id,
                        title: candidate.title,
                        author: candidate.author,
                        year: candidate.year,
                        completed: false,
                    },
                );
            }
        }
    }
    existing
}
