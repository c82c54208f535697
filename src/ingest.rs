use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use serde::Serialize;

use crate::filter::{self, Reason};
use crate::record::{self, BookRecord, ParseFailure, ParseFailureCause};
use crate::scrape::CopyrightLookup;

#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    pub cutoff_year: i32,
    /// Parse+filter worker window.
    pub concurrency: usize,
    /// Scrape lookup window; network-bound, so capped tighter than the
    /// parse window.
    pub scrape_concurrency: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            cutoff_year: 1927,
            concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            scrape_concurrency: 8,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub units_seen: usize,
    pub parsed: usize,
    pub accepted: usize,
    pub accepted_explicit_statement: usize,
    pub accepted_year_cutoff: usize,
    pub accepted_scraped_fallback: usize,
    pub rejected_language: usize,
    pub rejected_recent: usize,
    pub indeterminate: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub scrape_lookups: usize,
    pub scrape_failures: usize,
}

impl IngestStats {
    fn record_decision(&mut self, decision: filter::EligibilityDecision) {
        if decision.accepted {
            self.accepted += 1;
        }
        match decision.reason {
            Reason::ExplicitStatement => self.accepted_explicit_statement += 1,
            Reason::YearCutoff => self.accepted_year_cutoff += 1,
            Reason::ScrapedFallback => self.accepted_scraped_fallback += 1,
            Reason::RejectedLanguage => self.rejected_language += 1,
            Reason::RejectedRecent => self.rejected_recent += 1,
            Reason::Indeterminate => self.indeterminate += 1,
        }
    }
}

#[derive(Debug)]
pub struct IngestOutcome {
    /// Accepted records, sorted strictly ascending by id, one per id.
    pub candidates: Vec<BookRecord>,
    pub failures: Vec<ParseFailure>,
    pub stats: IngestStats,
}

enum UnitOutcome {
    Decided(BookRecord, filter::EligibilityDecision),
    /// Indeterminate under metadata alone; the scrape stage gets a shot.
    NeedsLookup(BookRecord),
    Failed(ParseFailure),
}

/// Build the candidate set from every raw metadata unit under
/// `source_dir`.
///
/// Each unit is parsed and filtered independently on a bounded worker
/// window; one bad unit is a recorded failure, never an abort. Only a
/// missing or unreadable source directory is fatal. When `lookup` is
/// supplied, records the metadata leaves indeterminate go through a
/// second, tighter window of external lookups; a failed lookup leaves
/// that one record indeterminate.
///
/// Workers complete in arbitrary order; the returned candidates are
/// sorted by id and deduplicated (first wins), so downstream merging is
/// deterministic for a fixed input set.
pub async fn ingest(
    source_dir: &Path,
    options: &IngestOptions,
    lookup: Option<Arc<dyn CopyrightLookup>>,
) -> anyhow::Result<IngestOutcome> {
    let units = enumerate_units(source_dir)?;
    let total_units = units.len();
    let concurrency = options.concurrency.max(1);
    let scrape_enabled = lookup.is_some();

    tracing::info!(
        units = total_units,
        concurrency,
        scrape_enabled,
        cutoff_year = options.cutoff_year,
        "ingest: parsing catalog units"
    );

    let mut stats = IngestStats {
        units_seen: total_units,
        ..IngestStats::default()
    };
    let mut candidates = Vec::new();
    let mut failures = Vec::new();
    let mut pending_lookup = Vec::new();

    let cutoff_year = options.cutoff_year;
    let mut join_set = tokio::task::JoinSet::new();
    let mut next_idx = 0usize;
    let mut done_units = 0usize;
    let started_at = std::time::Instant::now();
    let mut last_progress_log_at = started_at;

    while next_idx < units.len() || !join_set.is_empty() {
        while next_idx < units.len() && join_set.len() < concurrency {
            let path = units[next_idx].clone();
            next_idx += 1;

            join_set.spawn(async move {
                process_unit(path, cutoff_year, scrape_enabled).await
            });
        }

        let Some(joined) = join_set.join_next().await else {
            break;
        };
        match joined.context("join parse worker")? {
            UnitOutcome::Decided(record, decision) => {
                stats.parsed += 1;
                stats.record_decision(decision);
                if decision.accepted {
                    candidates.push(record);
                }
            }
            UnitOutcome::NeedsLookup(record) => {
                stats.parsed += 1;
                pending_lookup.push(record);
            }
            UnitOutcome::Failed(failure) => {
                stats.failed += 1;
                tracing::warn!(unit = ?failure.unit, %failure, "ingest: unit failed");
                failures.push(failure);
            }
        }

        done_units += 1;
        if done_units == total_units || last_progress_log_at.elapsed() >= Duration::from_secs(2) {
            tracing::info!(
                done = done_units,
                total = total_units,
                failed = stats.failed,
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "ingest: progress"
            );
            last_progress_log_at = std::time::Instant::now();
        }
    }

    // Workers only defer to this stage when a lookup was supplied, so
    // a non-empty queue implies `lookup` is present.
    if !pending_lookup.is_empty()
        && let Some(lookup) = lookup
    {
        run_lookup_stage(
            lookup,
            options,
            pending_lookup,
            &mut candidates,
            &mut stats,
        )
        .await?;
    }

    candidates.sort_by_key(|record| record.id);
    let before_dedup = candidates.len();
    candidates.dedup_by_key(|record| record.id);
    stats.duplicates = before_dedup - candidates.len();

    failures.sort_by_key(|failure| failure.unit);

    tracing::info!(
        candidates = candidates.len(),
        failed = stats.failed,
        duplicates = stats.duplicates,
        elapsed_ms = started_at.elapsed().as_millis() as u64,
        "ingest: done"
    );

    Ok(IngestOutcome {
        candidates,
        failures,
        stats,
    })
}

async fn process_unit(path: PathBuf, cutoff_year: i32, scrape_enabled: bool) -> UnitOutcome {
    let unit_id = unit_id_from_path(&path);

    let xml = match tokio::fs::read_to_string(&path).await {
        Ok(xml) => xml,
        Err(err) => {
            return UnitOutcome::Failed(ParseFailure {
                unit: unit_id,
                cause: ParseFailureCause::Unreadable(err.to_string()),
            });
        }
    };

    let record = match record::parse_unit(unit_id, &xml) {
        Ok(record) => record,
        Err(failure) => return UnitOutcome::Failed(failure),
    };

    let decision = filter::decide(&record, cutoff_year, None);
    if !decision.accepted && decision.reason == Reason::Indeterminate && scrape_enabled {
        return UnitOutcome::NeedsLookup(record);
    }
    UnitOutcome::Decided(record, decision)
}

async fn run_lookup_stage(
    lookup: Arc<dyn CopyrightLookup>,
    options: &IngestOptions,
    pending: Vec<BookRecord>,
    candidates: &mut Vec<BookRecord>,
    stats: &mut IngestStats,
) -> anyhow::Result<()> {
    let concurrency = options.scrape_concurrency.max(1);
    let cutoff_year = options.cutoff_year;
    stats.scrape_lookups = pending.len();

    tracing::info!(
        lookups = pending.len(),
        concurrency,
        "ingest: resolving indeterminate records via copyright lookup"
    );

    let mut join_set = tokio::task::JoinSet::new();
    let mut next_idx = 0usize;

    while next_idx < pending.len() || !join_set.is_empty() {
        while next_idx < pending.len() && join_set.len() < concurrency {
            let record = pending[next_idx].clone();
            next_idx += 1;

            let lookup = Arc::clone(&lookup);
            join_set.spawn(async move {
                let signal = match lookup.lookup(record.id).await {
                    Ok(signal) => Some(signal),
                    Err(err) => {
                        tracing::warn!(
                            id = record.id,
                            error = %err,
                            "ingest: copyright lookup failed; leaving record indeterminate"
                        );
                        None
                    }
                };
                (record, signal)
            });
        }

        let Some(joined) = join_set.join_next().await else {
            break;
        };
        let (record, signal) = joined.context("join lookup worker")?;
        if signal.is_none() {
            stats.scrape_failures += 1;
        }
        let decision = filter::decide(&record, cutoff_year, signal);
        stats.record_decision(decision);
        if decision.accepted {
            candidates.push(record);
        }
    }

    Ok(())
}

fn enumerate_units(source_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !source_dir.is_dir() {
        anyhow::bail!(
            "source directory missing or unreadable: {}",
            source_dir.display()
        );
    }

    let mut units = Vec::new();
    let mut pending_dirs = vec![source_dir.to_path_buf()];
    while let Some(dir) = pending_dirs.pop() {
        for entry in std::fs::read_dir(&dir)
            .with_context(|| format!("read source directory: {}", dir.display()))?
        {
            let entry = entry.with_context(|| format!("read entry in: {}", dir.display()))?;
            let path = entry.path();
            if entry
                .file_type()
                .with_context(|| format!("stat: {}", path.display()))?
                .is_dir()
            {
                pending_dirs.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some("rdf") {
                units.push(path);
            }
        }
    }

    units.sort();
    Ok(units)
}

/// Units are named `pg<id>.rdf`; the digits are a hint for failure
/// reports when the record body has no usable id.
fn unit_id_from_path(path: &Path) -> Option<u32> {
    let stem = path.file_stem()?.to_str()?;
    let digits: String = stem.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
