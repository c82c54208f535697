use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ScrapeFailure {
    #[error("lookup request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("lookup returned HTTP status {0}")]
    Status(u16),
    #[error("invalid lookup url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Fallback copyright signal for records the catalog metadata cannot
/// settle. Injected into ingestion so the pipeline is testable without a
/// network, and substitutable with a stub.
#[async_trait]
pub trait CopyrightLookup: Send + Sync {
    /// `Ok(true)` when the external source reports the book as public
    /// domain. Errors degrade the record to indeterminate at the call
    /// site; they are never retried within one ingestion pass.
    async fn lookup(&self, id: u32) -> Result<bool, ScrapeFailure>;
}

/// Looks up the catalog's public book page and reads its copyright
/// status row.
#[derive(Debug, Clone)]
pub struct HttpCopyrightLookup {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpCopyrightLookup {
    pub fn new(base_url: Url) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build copyright lookup http client")?;

        Ok(Self { client, base_url })
    }

    fn book_page_url(&self, id: u32) -> Result<Url, url::ParseError> {
        self.base_url.join(&format!("ebooks/{id}"))
    }
}

#[async_trait]
impl CopyrightLookup for HttpCopyrightLookup {
    async fn lookup(&self, id: u32) -> Result<bool, ScrapeFailure> {
        let url = self.book_page_url(id)?;

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, "gutencheck/0.1")
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeFailure::Status(status.as_u16()));
        }

        let body = response.text().await?;
        Ok(page_reports_public_domain(&body))
    }
}

/// The book page renders a bibliographic table with a "Copyright Status"
/// row; the verdict is the text that follows it.
pub fn page_reports_public_domain(html: &str) -> bool {
    let lowered = html.to_ascii_lowercase();
    let Some(idx) = lowered.find("copyright status") else {
        return false;
    };
    let mut window_end = (idx + 400).min(lowered.len());
    while !lowered.is_char_boundary(window_end) {
        window_end -= 1;
    }
    lowered[idx..window_end].contains("public domain")
}
