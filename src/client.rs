//! HTTP client for the console RPC endpoints.

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::config::ConsoleConfig;
use crate::editor::SaveRequest;
use crate::jobs::{Envelope, JobEnvelope, JobTransport, TransportError};
use crate::logging::{log, log_request, obj, v_str, Domain, Level};

pub const STATUS_PATH: &str = "/proctor/rpc/jobs/status";
pub const CANCEL_PATH: &str = "/proctor/rpc/jobs/cancel";
pub const CLEAN_WORKSPACE_PATH: &str = "/proctor/rpc/svn/clean-working-directory";

const REQUESTED_WITH: (&str, &str) = ("X-Requested-With", "XMLHttpRequest");

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The save continues in a background job.
    Job(String),
    Saved(String),
}

pub struct ConsoleClient {
    client: Client,
    base: Url,
    status_timeout: Duration,
}

impl ConsoleClient {
    pub fn new(cfg: &ConsoleConfig) -> Result<Self> {
        let base = Url::parse(&cfg.base_url).with_context(|| format!("invalid base url {}", cfg.base_url))?;
        Ok(Self {
            client: Client::new(),
            base,
            status_timeout: Duration::from_millis(cfg.status_timeout_ms),
        })
    }

    pub fn job_url(&self, path: &str, job_id: &str) -> Result<Url> {
        let mut url = self.base.join(path)?;
        url.query_pairs_mut().append_pair("id", job_id);
        Ok(url)
    }

    async fn poll(&self, path: &str, job_id: &str) -> Result<JobEnvelope, TransportError> {
        let url = self
            .job_url(path, job_id)
            .map_err(|e| TransportError::new("url", e.to_string()))?;
        log_request("GET", url.as_str(), self.status_timeout.as_millis() as u64);
        let req = self
            .client
            .get(url)
            .header(REQUESTED_WITH.0, REQUESTED_WITH.1)
            .timeout(self.status_timeout);
        send_json(req).await
    }

    /// Start a background job that cleans the user's working copy.
    pub async fn clean_working_directory(&self, username: &str) -> Result<String> {
        let url = self.base.join(CLEAN_WORKSPACE_PATH)?;
        log_request("POST", url.as_str(), 0);
        let req = self
            .client
            .post(url)
            .header(REQUESTED_WITH.0, REQUESTED_WITH.1)
            .form(&[("username", username)]);
        let envelope: Envelope<Value> = send_json(req).await?;
        match job_id_of(&envelope) {
            Some(id) if envelope.success => Ok(id),
            _ => Err(anyhow!("Unable to detect background job")),
        }
    }

    /// Post a prepared definition save. The action URL may be relative to
    /// the console base.
    pub async fn save_definition(&self, request: &SaveRequest) -> Result<SaveOutcome> {
        let url = self.base.join(&request.url)?;
        log_request("POST", url.as_str(), 0);
        let req = self
            .client
            .post(url)
            .header(REQUESTED_WITH.0, REQUESTED_WITH.1)
            .form(&request.form);
        let envelope: Envelope<Value> = send_json(req).await?;
        save_outcome(envelope)
    }
}

#[async_trait::async_trait]
impl JobTransport for ConsoleClient {
    async fn status(&self, job_id: &str) -> Result<JobEnvelope, TransportError> {
        self.poll(STATUS_PATH, job_id).await
    }

    async fn cancel(&self, job_id: &str) -> Result<JobEnvelope, TransportError> {
        self.poll(CANCEL_PATH, job_id).await
    }
}

async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, TransportError> {
    let resp = req.send().await.map_err(transport_error)?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        log(
            Level::Warn,
            Domain::Http,
            "http_error",
            obj(&[("status", Value::from(status.as_u16())), ("msg", v_str(&body))]),
        );
        return Err(TransportError::new(status.as_u16().to_string(), status.canonical_reason().unwrap_or("error")));
    }
    resp.json::<T>().await.map_err(transport_error)
}

fn transport_error(e: reqwest::Error) -> TransportError {
    let code = if e.is_timeout() {
        "timeout".to_string()
    } else if let Some(status) = e.status() {
        status.as_u16().to_string()
    } else if e.is_decode() {
        "parse".to_string()
    } else {
        "network".to_string()
    };
    TransportError::new(code, e.to_string())
}

/// `data.jobId`, as a string whether the server sent a string or a number.
pub fn job_id_of(envelope: &Envelope<Value>) -> Option<String> {
    match envelope.data.as_ref()?.get("jobId")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn save_outcome(envelope: Envelope<Value>) -> Result<SaveOutcome> {
    if !envelope.success {
        return Err(anyhow!(envelope.msg.unwrap_or_default()));
    }
    if let Some(id) = job_id_of(&envelope) {
        return Ok(SaveOutcome::Job(id));
    }
    let msg = envelope.msg.filter(|m| !m.is_empty()).unwrap_or_else(|| "Saved!".to_string());
    Ok(SaveOutcome::Saved(msg))
}
