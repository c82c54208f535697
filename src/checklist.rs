use anyhow::Context as _;

use crate::cli::{MarkArgs, SearchArgs, ShowArgs};
use crate::reconcile;
use crate::store::{ChecklistEntry, ChecklistStore};

/// Print the checklist, reconciled against the marker files.
pub fn show(args: ShowArgs) -> anyhow::Result<()> {
    let store = open_existing(&args.data)?;
    let table = reconcile::load_repaired(&store)?;

    let mut shown = 0usize;
    for entry in table.values() {
        if args.completed && !entry.completed {
            continue;
        }
        if args.pending && entry.completed {
            continue;
        }
        println!("{}", render_entry(entry));
        shown += 1;
    }

    let completed = table.values().filter(|entry| entry.completed).count();
    tracing::debug!(shown, total = table.len(), completed, "show: rendered checklist");
    Ok(())
}

/// Case-insensitive substring search over title and author.
pub fn search(args: SearchArgs) -> anyhow::Result<()> {
    let store = open_existing(&args.data)?;
    let table = reconcile::load_repaired(&store)?;

    let keyword = args.keyword.to_lowercase();
    let mut found = false;
    for entry in table.values() {
        if entry.title.to_lowercase().contains(&keyword)
            || entry.author.to_lowercase().contains(&keyword)
        {
            println!("{}", render_entry(entry));
            found = true;
        }
    }

    if !found {
        println!("no matches for '{}'", args.keyword);
    }
    Ok(())
}

pub fn mark(args: MarkArgs) -> anyhow::Result<()> {
    let store = ChecklistStore::new(&args.data);
    store
        .set_completed(args.id, true)
        .with_context(|| format!("mark book {}", args.id))?;
    println!("marked {} as completed", args.id);
    Ok(())
}

pub fn unmark(args: MarkArgs) -> anyhow::Result<()> {
    let store = ChecklistStore::new(&args.data);
    store
        .set_completed(args.id, false)
        .with_context(|| format!("unmark book {}", args.id))?;
    println!("cleared completed mark for {}", args.id);
    Ok(())
}

fn open_existing(data_dir: &str) -> anyhow::Result<ChecklistStore> {
    let store = ChecklistStore::new(data_dir);
    if !store.table_path().exists() {
        anyhow::bail!(
            "no checklist table at {}; run `gutencheck build` first",
            store.table_path().display()
        );
    }
    Ok(store)
}

fn render_entry(entry: &ChecklistEntry) -> String {
    let mark = if entry.completed { "x" } else { " " };
    let title = if entry.title.is_empty() {
        "(untitled)"
    } else {
        &entry.title
    };
    let author = if entry.author.is_empty() {
        "(unknown author)"
    } else {
        &entry.author
    };
    match entry.year {
        Some(year) => format!("[{mark}] {title} by {author} ({year}, id {id})", id = entry.id),
        None => format!("[{mark}] {title} by {author} (id {id})", id = entry.id),
    }
}
