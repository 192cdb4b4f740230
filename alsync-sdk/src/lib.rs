//! # alsync-sdk
//!
//! Client for the control API a running `alsync watch` session exposes.
//!
//! ## Example
//!
//! ```no_run
//! use alsync_sdk::AlsyncClient;
//!
//! let client = AlsyncClient::new("http://127.0.0.1:3131");
//!
//! // Push right away instead of waiting for the next tick
//! client.push().unwrap();
//!
//! let status = client.status().unwrap();
//! println!("{} commits so far", status.commits);
//! ```

use anyhow::{bail, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Pushes go to the network and may take a while on a slow link.
const PUSH_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Clone)]
pub struct AlsyncClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: String,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Status {
    pub session_id: String,
    pub project_path: PathBuf,
    pub started: String,
    pub state: String,
    pub push_scheduler_running: bool,
    pub commits: u64,
    pub commit_failures: u64,
    pub pushes_succeeded: u64,
    pub pushes_failed: u64,
    pub last_commit: Option<ActivityEntry>,
    pub last_push: Option<ActivityEntry>,
}

#[derive(Deserialize)]
struct StopResponse {
    status: String,
}

impl AlsyncClient {
    /// Create a client for the session listening at `base_url`
    /// (e.g. "http://127.0.0.1:3131").
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::blocking::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check server health
    pub fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()?;

        Ok(response.status().is_success())
    }

    pub fn status(&self) -> Result<Status> {
        let response = self
            .client
            .get(format!("{}/status", self.base_url))
            .send()?
            .error_for_status()?;

        Ok(response.json()?)
    }

    /// Most recent activity entries, oldest first.
    pub fn activity(&self, limit: usize) -> Result<Vec<ActivityEntry>> {
        let response = self
            .client
            .get(format!("{}/activity", self.base_url))
            .query(&[("limit", limit)])
            .send()?
            .error_for_status()?;

        Ok(response.json()?)
    }

    /// Push every branch now. Errors carry the server's explanation.
    pub fn push(&self) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/push", self.base_url))
            .timeout(PUSH_TIMEOUT)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("push failed ({}): {}", status, body);
        }

        Ok(())
    }

    /// Ask the session to stop. Returns the state it reported.
    pub fn stop(&self) -> Result<String> {
        let response: StopResponse = self
            .client
            .post(format!("{}/stop", self.base_url))
            .send()?
            .error_for_status()?
            .json()?;

        Ok(response.status)
    }
}
