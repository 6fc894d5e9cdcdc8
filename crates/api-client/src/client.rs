use std::time::Duration;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};

use threadline_api::*;

use crate::retry::{RetryConfig, retry_send};
use crate::stream::RunStream;

/// Typed HTTP client for the threads/runs API.
///
/// `base_url` is the API root (for example `http://localhost:3000/api`); every
/// path is appended to it verbatim.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
}

impl ApiClient {
    /// Create a new client with the given API root and connect timeout.
    ///
    /// No overall request timeout is set: run streams stay open for as long
    /// as the graph executes.
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create from an existing `reqwest::Client` (e.g. shared in tests).
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn thread_url(&self, thread_id: &str, suffix: &str) -> String {
        self.url(&format!(
            "/threads/{}{suffix}",
            urlencoding::encode(thread_id)
        ))
    }

    // ── Health ────────────────────────────────────────────────────────────

    pub async fn health(&self) -> Result<()> {
        let resp = self.client.get(self.url("/ok")).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("{status}: {body}");
        }
        Ok(())
    }

    // ── Threads ───────────────────────────────────────────────────────────

    /// `POST /threads`. Never retried: a retry could create a duplicate.
    pub async fn create_thread(&self, req: &CreateThreadRequest) -> Result<Thread> {
        let resp = self
            .client
            .post(self.url("/threads"))
            .json(req)
            .send()
            .await?;
        parse_response(resp).await
    }

    pub async fn get_thread_state(&self, thread_id: &str) -> Result<ThreadState> {
        let url = self.thread_url(thread_id, "/state");
        let resp = retry_send(|| self.client.get(&url), "get thread state", &self.retry).await?;
        parse_response(resp).await
    }

    pub async fn search_threads(&self, req: &ThreadSearchRequest) -> Result<Vec<Thread>> {
        let url = self.url("/threads/search");
        let resp = retry_send(
            || self.client.post(&url).json(req),
            "search threads",
            &self.retry,
        )
        .await?;
        parse_response(resp).await
    }

    // ── Runs ──────────────────────────────────────────────────────────────

    /// `GET /threads/{id}/runs`, oldest run first.
    pub async fn list_runs(&self, thread_id: &str) -> Result<Vec<Run>> {
        let url = self.thread_url(thread_id, "/runs");
        let resp = retry_send(
            || {
                self.client
                    .get(&url)
                    .header("Content-Type", "application/json")
            },
            "list runs",
            &self.retry,
        )
        .await?;
        let mut runs: Vec<Run> = parse_response(resp).await?;
        sort_runs_oldest_first(&mut runs);
        Ok(runs)
    }

    /// `POST /threads/{id}/runs/stream`. The returned stream yields events
    /// exactly as the server sends them.
    pub async fn stream_run(&self, thread_id: &str, req: &RunStreamRequest) -> Result<RunStream> {
        let resp = self
            .client
            .post(self.thread_url(thread_id, "/runs/stream"))
            .header("Accept", "text/event-stream")
            .json(req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("{status}: {body}");
        }
        Ok(RunStream::from_response(resp))
    }
}

/// Sort by `created_at`, parsed as RFC 3339 where possible. Unparseable
/// timestamps sort after parseable ones, then lexicographically.
pub fn sort_runs_oldest_first(runs: &mut [Run]) {
    runs.sort_by_cached_key(|run| {
        let parsed = DateTime::parse_from_rfc3339(&run.created_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc));
        (parsed.is_none(), parsed, run.created_at.clone())
    });
}

/// Parse an HTTP response: return the deserialized body on 2xx,
/// or an error containing the status and body text.
async fn parse_response<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("{status}: {body}");
    }
    Ok(resp.json().await?)
}
