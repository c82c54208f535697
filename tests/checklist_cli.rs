use std::fs;
use std::path::Path;

use predicates::prelude::*;

fn write_unit(dir: &Path, id: u32, title: &str, author: &str, language: &str, year: i32) {
    let xml = format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns:dcterms="http://purl.org/dc/terms/"
         xmlns:pgterms="http://www.gutenberg.org/2009/pgterms/">
  <pgterms:ebook rdf:about="ebooks/{id}">
    <dcterms:title>{title}</dcterms:title>
    <dcterms:creator>
      <pgterms:agent rdf:about="2009/agents/{id}">
        <pgterms:name>{author}</pgterms:name>
      </pgterms:agent>
    </dcterms:creator>
    <dcterms:issued>{year}-01-01</dcterms:issued>
    <dcterms:language>
      <rdf:Description><rdf:value>{language}</rdf:value></rdf:Description>
    </dcterms:language>
  </pgterms:ebook>
</rdf:RDF>"#
    );
    fs::write(dir.join(format!("pg{id}.rdf")), xml).expect("write rdf unit");
}

fn seed_catalog(source_dir: &Path) {
    fs::create_dir_all(source_dir).expect("create source dir");
    write_unit(source_dir, 84, "Frankenstein", "Shelley, Mary", "en", 1818);
    write_unit(source_dir, 11, "Alice in Wonderland", "Carroll, Lewis", "en", 1865);
    write_unit(source_dir, 2650, "Du cote de chez Swann", "Proust, Marcel", "fr", 1913);
    write_unit(source_dir, 70000, "A Recent Novel", "Modern, Author", "en", 1995);
}

fn build(source_dir: &Path, data_dir: &Path) {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("gutencheck");
    cmd.args([
        "build",
        "--source",
        source_dir.to_str().unwrap(),
        "--data",
        data_dir.to_str().unwrap(),
        "--cutoff-year",
        "1927",
    ])
    .assert()
    .success();
}

#[test]
fn build_then_show_lists_eligible_books_in_id_order() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let source_dir = temp.path().join("rdf");
    let data_dir = temp.path().join("checklist");
    seed_catalog(&source_dir);

    build(&source_dir, &data_dir);

    let table = fs::read_to_string(data_dir.join("checklist.csv"))?;
    assert!(table.starts_with("id,title,author,year,completed"));
    assert!(table.contains("84,Frankenstein"));
    // French and post-cutoff books stay out.
    assert!(!table.contains("Swann"));
    assert!(!table.contains("A Recent Novel"));

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("gutencheck");
    cmd.args(["show", "--data", data_dir.to_str().unwrap()])
        .assert()
        .success()
        .stdout(
            "[ ] Alice in Wonderland by Carroll, Lewis (1865, id 11)\n\
             [ ] Frankenstein by Shelley, Mary (1818, id 84)\n",
        );
    Ok(())
}

#[test]
fn build_reports_partial_failures_without_failing() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let source_dir = temp.path().join("rdf");
    let data_dir = temp.path().join("checklist");
    seed_catalog(&source_dir);
    fs::write(source_dir.join("pg666.rdf"), "<rdf:RDF><truncated")?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("gutencheck");
    cmd.args([
        "build",
        "--source",
        source_dir.to_str().unwrap(),
        "--data",
        data_dir.to_str().unwrap(),
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("1 unit failures"));

    let report = fs::read_to_string(data_dir.join("build-report.json"))?;
    let report: serde_json::Value = serde_json::from_str(&report)?;
    assert_eq!(report["stats"]["failed"], 1);
    assert_eq!(report["failures"][0]["unit"], 666);
    Ok(())
}

#[test]
fn completion_marks_survive_a_rebuild() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let source_dir = temp.path().join("rdf");
    let data_dir = temp.path().join("checklist");
    seed_catalog(&source_dir);

    build(&source_dir, &data_dir);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("gutencheck");
    cmd.args(["mark", "84", "--data", data_dir.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("marked 84"));
    assert!(data_dir.join("completed").join("84.done").exists());

    // The catalog refreshed the title upstream; the mark must survive.
    write_unit(
        &source_dir,
        84,
        "Frankenstein; Or, The Modern Prometheus",
        "Shelley, Mary Wollstonecraft",
        "en",
        1818,
    );
    build(&source_dir, &data_dir);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("gutencheck");
    cmd.args([
        "show",
        "--data",
        data_dir.to_str().unwrap(),
        "--completed",
    ])
    .assert()
    .success()
    .stdout(
        "[x] Frankenstein; Or, The Modern Prometheus by Shelley, Mary Wollstonecraft (1818, id 84)\n",
    );
    Ok(())
}

#[test]
fn rebuilding_an_unchanged_catalog_is_idempotent() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let source_dir = temp.path().join("rdf");
    let data_dir = temp.path().join("checklist");
    seed_catalog(&source_dir);

    build(&source_dir, &data_dir);
    let first = fs::read_to_string(data_dir.join("checklist.csv"))?;

    build(&source_dir, &data_dir);
    let second = fs::read_to_string(data_dir.join("checklist.csv"))?;

    assert_eq!(first, second);
    Ok(())
}

#[test]
fn unmark_clears_both_marker_and_table() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let source_dir = temp.path().join("rdf");
    let data_dir = temp.path().join("checklist");
    seed_catalog(&source_dir);

    build(&source_dir, &data_dir);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("gutencheck");
    cmd.args(["mark", "11", "--data", data_dir.to_str().unwrap()])
        .assert()
        .success();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("gutencheck");
    cmd.args(["unmark", "11", "--data", data_dir.to_str().unwrap()])
        .assert()
        .success();

    assert!(!data_dir.join("completed").join("11.done").exists());
    let table = fs::read_to_string(data_dir.join("checklist.csv"))?;
    assert!(table.contains("11,Alice in Wonderland,\"Carroll, Lewis\",1865,false"));
    Ok(())
}

#[test]
fn marking_an_unknown_id_fails_without_touching_state() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let source_dir = temp.path().join("rdf");
    let data_dir = temp.path().join("checklist");
    seed_catalog(&source_dir);

    build(&source_dir, &data_dir);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("gutencheck");
    cmd.args(["mark", "99999", "--data", data_dir.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no checklist entry with id 99999"));

    assert!(!data_dir.join("completed").join("99999.done").exists());
    Ok(())
}

#[test]
fn search_matches_title_and_author_case_insensitively() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let source_dir = temp.path().join("rdf");
    let data_dir = temp.path().join("checklist");
    seed_catalog(&source_dir);

    build(&source_dir, &data_dir);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("gutencheck");
    cmd.args(["search", "frank", "--data", data_dir.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Frankenstein"));

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("gutencheck");
    cmd.args(["search", "CARROLL", "--data", data_dir.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Alice in Wonderland"));

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("gutencheck");
    cmd.args(["search", "zzz", "--data", data_dir.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("no matches for 'zzz'"));
    Ok(())
}

#[test]
fn show_without_a_built_checklist_is_an_error() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let data_dir = temp.path().join("checklist");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("gutencheck");
    cmd.args(["show", "--data", data_dir.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("run `gutencheck build` first"));
    Ok(())
}

#[test]
fn build_with_a_missing_source_directory_is_fatal() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let data_dir = temp.path().join("checklist");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("gutencheck");
    cmd.args([
        "build",
        "--source",
        temp.path().join("no-such-dir").to_str().unwrap(),
        "--data",
        data_dir.to_str().unwrap(),
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("source directory"));

    // The fatal build must not leave a partial table behind.
    assert!(!data_dir.join("checklist.csv").exists());
    Ok(())
}

#[test]
fn a_stray_marker_completes_the_entry_on_the_next_show() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let source_dir = temp.path().join("rdf");
    let data_dir = temp.path().join("checklist");
    seed_catalog(&source_dir);

    build(&source_dir, &data_dir);

    // External tooling dropped a marker file directly.
    fs::create_dir_all(data_dir.join("completed"))?;
    fs::write(data_dir.join("completed").join("84.done"), b"")?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("gutencheck");
    cmd.args(["show", "--data", data_dir.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("[x] Frankenstein"));

    // The read repaired the table in place.
    let table = fs::read_to_string(data_dir.join("checklist.csv"))?;
    assert!(table.contains("84,Frankenstein,\"Shelley, Mary\",1818,true"));
    Ok(())
}
