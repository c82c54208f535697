use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download and unpack the catalog feed (the build input).
    Fetch(FetchArgs),
    /// Rebuild the checklist from an unpacked catalog directory.
    Build(BuildArgs),
    /// Print the checklist with completion state.
    Show(ShowArgs),
    /// Find checklist entries by title or author substring.
    Search(SearchArgs),
    /// Mark a book as completed.
    Mark(MarkArgs),
    /// Clear a book's completed mark.
    Unmark(MarkArgs),
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Catalog feed URL (must be http/https, a gzip tarball of RDF units).
    #[arg(long)]
    pub url: String,

    /// Local path for the downloaded archive.
    #[arg(long, default_value = "rdf-files.tar.gz")]
    pub archive: String,

    /// Directory the archive is unpacked into.
    #[arg(long, default_value = "rdf-files")]
    pub out: String,
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Directory of raw per-book metadata units (see `fetch`).
    #[arg(long)]
    pub source: String,

    /// Checklist data directory (table + completion markers).
    #[arg(long, default_value = "checklist")]
    pub data: String,

    /// Books published on/before this year are presumed public domain.
    #[arg(long, default_value_t = 1927)]
    pub cutoff_year: i32,

    /// Look up books the metadata leaves undecided on the catalog site.
    #[arg(long, default_value_t = false)]
    pub scrape: bool,

    /// Base URL for copyright lookups.
    #[arg(long, default_value = "https://www.gutenberg.org/")]
    pub scrape_url: String,

    /// Maximum concurrent parse workers (default: available parallelism).
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Maximum concurrent copyright lookups.
    #[arg(long, default_value_t = 8)]
    pub scrape_concurrency: usize,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Checklist data directory.
    #[arg(long, default_value = "checklist")]
    pub data: String,

    /// Only completed books.
    #[arg(long, conflicts_with = "pending")]
    pub completed: bool,

    /// Only books not yet completed.
    #[arg(long, conflicts_with = "completed")]
    pub pending: bool,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Case-insensitive substring matched against title and author.
    pub keyword: String,

    /// Checklist data directory.
    #[arg(long, default_value = "checklist")]
    pub data: String,
}

#[derive(Debug, Args)]
pub struct MarkArgs {
    /// Catalog id of the book.
    pub id: u32,

    /// Checklist data directory.
    #[arg(long, default_value = "checklist")]
    pub data: String,
}
