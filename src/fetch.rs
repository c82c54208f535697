use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tokio::io::AsyncWriteExt as _;
use url::Url;

use crate::cli::FetchArgs;

/// Download the catalog feed and unpack it into the source directory
/// `build` reads from. Both steps skip work that is already on disk, so
/// a rerun after a finished fetch is a no-op.
pub async fn run(args: FetchArgs) -> anyhow::Result<()> {
    let archive_path = PathBuf::from(&args.archive);
    if archive_path.exists() {
        tracing::info!(archive = %archive_path.display(), "fetch: archive already downloaded");
    } else {
        download(&args.url, &archive_path).await.context("download catalog archive")?;
    }

    let out_dir = PathBuf::from(&args.out);
    if out_dir.exists() {
        tracing::info!(out = %out_dir.display(), "fetch: archive already unpacked");
        return Ok(());
    }

    tracing::info!(
        archive = %archive_path.display(),
        out = %out_dir.display(),
        "fetch: unpacking archive"
    );
    tokio::task::block_in_place(|| unpack(&archive_path, &out_dir)).context("unpack archive")?;

    Ok(())
}

/// Stream the archive to `<path>.part`, then rename, so an interrupted
/// download never passes for a complete archive.
async fn download(url: &str, path: &Path) -> anyhow::Result<()> {
    let url = Url::parse(url).context("parse --url")?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("--url must be http/https: {url}");
    }

    tracing::info!(%url, archive = %path.display(), "fetch: downloading catalog archive");

    let client = reqwest::Client::builder()
        .build()
        .context("build download http client")?;
    let mut response = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;
    if !response.status().is_success() {
        anyhow::bail!("catalog download failed: HTTP {} for {url}", response.status());
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create archive dir: {}", parent.display()))?;
    }

    let part_path = path.with_extension("part");
    let mut file = tokio::fs::File::create(&part_path)
        .await
        .with_context(|| format!("create partial download: {}", part_path.display()))?;
    while let Some(chunk) = response.chunk().await.context("read download chunk")? {
        file.write_all(&chunk)
            .await
            .context("write download chunk")?;
    }
    file.flush().await.context("flush download")?;
    drop(file);

    tokio::fs::rename(&part_path, path)
        .await
        .with_context(|| format!("rename download to: {}", path.display()))?;
    Ok(())
}

fn unpack(archive_path: &Path, out_dir: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::open(archive_path)
        .with_context(|| format!("open archive: {}", archive_path.display()))?;
    let decoder = flate2::read::GzDecoder::new(std::io::BufReader::new(file));
    let mut archive = tar::Archive::new(decoder);
    archive
        .unpack(out_dir)
        .with_context(|| format!("unpack archive into: {}", out_dir.display()))?;
    Ok(())
}
