use std::collections::BTreeMap;

use anyhow::Context as _;

use crate::store::{ChecklistEntry, ChecklistStore};

/// Unify the two physical representations of "completed".
///
/// The marker records the most recent explicit user action, so when the
/// signals disagree the marker wins. This is what makes mark/unmark
/// idempotent and crash-tolerant: whichever of the two writes survived a
/// crash, the next reconciliation pass converges the table to the
/// marker. Read-repair only; a marker that does not exist is never
/// fabricated.
pub fn reconcile(table_completed: bool, marker_present: bool) -> bool {
    if table_completed != marker_present {
        return marker_present;
    }
    table_completed
}

/// Load the table with reconciliation applied, repairing the stored
/// table in place when any row had diverged from its marker. Every read
/// path (show, search) goes through this.
pub fn load_repaired(store: &ChecklistStore) -> anyhow::Result<BTreeMap<u32, ChecklistEntry>> {
    let mut table = store.load().context("load checklist table")?;

    let mut repaired = 0usize;
    for entry in table.values_mut() {
        let completed = reconcile(entry.completed, store.marker_present(entry.id));
        if completed != entry.completed {
            entry.completed = completed;
            repaired += 1;
        }
    }

    if repaired > 0 {
        tracing::info!(
            repaired,
            "reconcile: table diverged from markers; repairing table"
        );
        store.flush(&table).context("flush repaired table")?;
    }

    Ok(table)
}
