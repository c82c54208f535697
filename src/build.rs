use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use serde::Serialize;
use url::Url;

use crate::cli::BuildArgs;
use crate::ingest::{self, IngestOptions, IngestStats};
use crate::record::ParseFailure;
use crate::scrape::{CopyrightLookup, HttpCopyrightLookup};
use crate::store::{self, ChecklistStore};

/// Per-run artifact left beside the table so a build with partial
/// failures stays inspectable after the logs are gone.
#[derive(Debug, Serialize)]
struct BuildReport {
    built_at: String,
    cutoff_year: i32,
    scrape_enabled: bool,
    table_entries: usize,
    new_entries: usize,
    stats: IngestStats,
    failures: Vec<ParseFailure>,
}

/// The whole build: ingest the catalog, fold candidates into the
/// existing table, flush once.
///
/// The table is written exactly once, after the merge completes, so an
/// interrupted build leaves the prior checklist untouched. Per-unit
/// failures do not fail the build; they are counted, logged, and listed
/// in the build report.
pub async fn run(args: BuildArgs) -> anyhow::Result<()> {
    let source_dir = PathBuf::from(&args.source);
    let store = ChecklistStore::new(&args.data);

    let mut options = IngestOptions {
        cutoff_year: args.cutoff_year,
        scrape_concurrency: args.scrape_concurrency,
        ..IngestOptions::default()
    };
    if let Some(concurrency) = args.concurrency {
        options.concurrency = concurrency;
    }

    let lookup: Option<Arc<dyn CopyrightLookup>> = if args.scrape {
        let base_url = Url::parse(&args.scrape_url).context("parse --scrape-url")?;
        Some(Arc::new(
            HttpCopyrightLookup::new(base_url).context("build copyright lookup")?,
        ))
    } else {
        None
    };

    let outcome = ingest::ingest(&source_dir, &options, lookup)
        .await
        .context("ingest catalog")?;

    let existing = store.load().context("load checklist table")?;
    let new_entries = outcome
        .candidates
        .iter()
        .filter(|candidate| !existing.contains_key(&candidate.id))
        .count();

    let merged = store::merge(existing, outcome.candidates);
    store.flush(&merged).context("flush checklist table")?;

    let report = BuildReport {
        built_at: chrono::Utc::now().to_rfc3339(),
        cutoff_year: args.cutoff_year,
        scrape_enabled: args.scrape,
        table_entries: merged.len(),
        new_entries,
        stats: outcome.stats.clone(),
        failures: outcome.failures,
    };
    write_report(&args.data, &report).context("write build report")?;

    tracing::info!(
        entries = merged.len(),
        new = new_entries,
        failed = outcome.stats.failed,
        "build: checklist updated"
    );
    println!(
        "checklist: {} entries ({} new), {} unit failures",
        merged.len(),
        new_entries,
        outcome.stats.failed
    );

    Ok(())
}

fn write_report(data_dir: &str, report: &BuildReport) -> anyhow::Result<()> {
    let path = PathBuf::from(data_dir).join("build-report.json");
    let json = serde_json::to_vec_pretty(report).context("serialize build report")?;
    std::fs::write(&path, json)
        .with_context(|| format!("write build report: {}", path.display()))?;
    Ok(())
}
