//! Background job monitoring.
//!
//! A [`JobMonitor`] polls one job's status until it finishes, is cancelled,
//! or the transport fails too many times in a row. Only one request is ever
//! in flight; cancelling drops it together with any pending refresh timer.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::config::ConsoleConfig;
use crate::logging::{log, log_job, obj, v_str, Domain, Level};

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLink {
    pub href: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub urls: Vec<JobLink>,
    #[serde(default)]
    pub end_message: Option<String>,
}

/// `{success, data?, msg?}`, shared by status, cancel and the save calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub msg: Option<String>,
}

pub type JobEnvelope = Envelope<JobStatus>;

/// A request that never produced a usable response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub code: String,
    pub message: String,
}

impl TransportError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into() }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for TransportError {}

#[async_trait]
pub trait JobTransport: Send + Sync {
    async fn status(&self, job_id: &str) -> Result<JobEnvelope, TransportError>;
    async fn cancel(&self, job_id: &str) -> Result<JobEnvelope, TransportError>;
}

// =============================================================================
// Events and view
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobEventKind {
    InProgress,
    Complete,
    Cancelled,
    Error,
}

impl JobEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobEventKind::InProgress => "in-progress",
            JobEventKind::Complete => "complete",
            JobEventKind::Cancelled => "cancelled",
            JobEventKind::Error => "error",
        }
    }

    pub fn is_finished(&self) -> bool {
        *self != JobEventKind::InProgress
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobEvent {
    pub kind: JobEventKind,
    pub job_id: String,
    /// Absent for errors.
    pub status: Option<JobStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishLink {
    Message(String),
    Url(JobLink),
}

/// What a monitor panel shows: title, `Status: ...` line and log text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobView {
    pub title: String,
    pub status: String,
    pub log: String,
    pub links: Vec<FinishLink>,
}

impl JobView {
    fn update(&mut self, title: &str, status: &str, log: &str) {
        self.title = title.to_string();
        self.status = status.to_string();
        self.log = log.to_string();
    }

    pub fn status_line(&self) -> String {
        format!("Status: {}", self.status)
    }
}

/// Final state of a monitor run. `kind` is `None` when the job reported a
/// status the console doesn't know, which ends polling without an event.
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub kind: Option<JobEventKind>,
    pub view: JobView,
}

// =============================================================================
// Monitor
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub refresh_interval: Duration,
    pub max_retries: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::from(&ConsoleConfig::default())
    }
}

impl From<&ConsoleConfig> for MonitorConfig {
    fn from(cfg: &ConsoleConfig) -> Self {
        Self {
            refresh_interval: Duration::from_millis(cfg.refresh_interval_ms),
            max_retries: cfg.max_retries,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Status,
    Cancel,
}

enum Step {
    Poll,
    Done(Option<JobEventKind>),
}

type JobHandler = Box<dyn FnMut(&JobEvent) + Send>;

pub struct JobMonitor<T: JobTransport> {
    job_id: String,
    transport: Arc<T>,
    config: MonitorConfig,
    retries: u32,
    view: JobView,
    handlers: Vec<(JobEventKind, JobHandler)>,
    cancel: Arc<Notify>,
}

impl<T: JobTransport + 'static> JobMonitor<T> {
    pub fn new(job_id: &str, transport: Arc<T>, config: MonitorConfig) -> Self {
        Self {
            job_id: job_id.to_string(),
            transport,
            config,
            retries: 0,
            view: JobView::default(),
            handlers: Vec::new(),
            cancel: Arc::new(Notify::new()),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn subscribe(&mut self, kind: JobEventKind, handler: impl FnMut(&JobEvent) + Send + 'static) {
        self.handlers.push((kind, Box::new(handler)));
    }

    /// Handler for every event kind.
    pub fn subscribe_all(&mut self, handler: impl FnMut(&JobEvent) + Send + Clone + 'static) {
        for kind in [
            JobEventKind::InProgress,
            JobEventKind::Complete,
            JobEventKind::Cancelled,
            JobEventKind::Error,
        ] {
            self.subscribe(kind, handler.clone());
        }
    }

    /// Cancellation trigger usable before the monitor is spawned.
    pub fn canceller(&self) -> Arc<Notify> {
        self.cancel.clone()
    }

    pub fn spawn(self) -> JobMonitorHandle {
        let cancel = self.cancel.clone();
        let join = tokio::spawn(self.run());
        JobMonitorHandle { cancel, join }
    }

    /// Poll until a terminal state.
    pub async fn run(mut self) -> JobReport {
        let cancel = self.cancel.clone();
        let transport = self.transport.clone();
        let job_id = self.job_id.clone();
        let mut request = Request::Status;
        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.notified(), if request == Request::Status => {
                    log_job(&self.job_id, "cancel_requested", &[]);
                    request = Request::Cancel;
                    continue;
                }
                r = send(transport.as_ref(), &job_id, request) => r,
            };

            let step = match result {
                Ok(envelope) => {
                    self.retries = 0;
                    self.on_response(envelope)
                }
                Err(err) => self.on_transport_error(err),
            };
            if let Step::Done(kind) = step {
                return JobReport { kind, view: self.view };
            }

            tokio::select! {
                biased;
                _ = cancel.notified() => {
                    log_job(&self.job_id, "cancel_requested", &[]);
                    request = Request::Cancel;
                }
                _ = sleep(self.config.refresh_interval) => request = Request::Status,
            }
        }
    }

    fn on_response(&mut self, envelope: JobEnvelope) -> Step {
        let job = match (envelope.success, envelope.data) {
            (true, Some(job)) => job,
            (true, None) => JobStatus::default(),
            (false, _) => {
                let msg = envelope.msg.unwrap_or_default();
                self.view.update(&msg, "ERROR", &msg);
                log(
                    Level::Warn,
                    Domain::Jobs,
                    "job_rejected",
                    obj(&[("job_id", v_str(&self.job_id)), ("msg", v_str(&msg))]),
                );
                self.publish(JobEventKind::Error, None);
                return Step::Done(Some(JobEventKind::Error));
            }
        };

        let shown = if job.running { "RUNNING" } else { job.status.as_str() };
        self.view.update(&job.title, shown, &job.log);
        log_job(&self.job_id, "status", &[("status", v_str(shown))]);

        let kind = if job.running {
            JobEventKind::InProgress
        } else {
            match job.status.as_str() {
                "DONE" | "FAILED" => JobEventKind::Complete,
                "CANCELLED" => JobEventKind::Cancelled,
                _ => return Step::Done(None),
            }
        };
        if kind.is_finished() {
            self.add_finish_links(&job);
        }
        self.publish(kind, Some(job));
        if kind.is_finished() {
            Step::Done(Some(kind))
        } else {
            Step::Poll
        }
    }

    fn on_transport_error(&mut self, err: TransportError) -> Step {
        self.retries += 1;
        if self.retries <= self.config.max_retries {
            log(
                Level::Warn,
                Domain::Jobs,
                "poll_retry",
                obj(&[
                    ("job_id", v_str(&self.job_id)),
                    ("attempt", Value::from(self.retries)),
                    ("msg", v_str(&err.to_string())),
                ]),
            );
            return Step::Poll;
        }
        let msg = err.to_string();
        let log_text = format!("Failed to retrieve job status for {}\n{}", self.job_id, msg);
        self.view.update(&msg, "ERROR", &log_text);
        log(
            Level::Error,
            Domain::Jobs,
            "poll_abandoned",
            obj(&[("job_id", v_str(&self.job_id)), ("msg", v_str(&msg))]),
        );
        self.publish(JobEventKind::Error, None);
        Step::Done(Some(JobEventKind::Error))
    }

    fn add_finish_links(&mut self, job: &JobStatus) {
        if let Some(m) = job.end_message.as_ref().filter(|m| !m.is_empty()) {
            self.view.links.push(FinishLink::Message(m.clone()));
        }
        self.view.links.extend(job.urls.iter().cloned().map(FinishLink::Url));
    }

    fn publish(&mut self, kind: JobEventKind, status: Option<JobStatus>) {
        let event = JobEvent { kind, job_id: self.job_id.clone(), status };
        for (k, handler) in self.handlers.iter_mut() {
            if *k == kind {
                handler(&event);
            }
        }
    }
}

async fn send<T: JobTransport>(transport: &T, job_id: &str, request: Request) -> Result<JobEnvelope, TransportError> {
    match request {
        Request::Status => transport.status(job_id).await,
        Request::Cancel => transport.cancel(job_id).await,
    }
}

impl<T: JobTransport> fmt::Debug for JobMonitor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobMonitor")
            .field("job_id", &self.job_id)
            .field("retries", &self.retries)
            .field("view", &self.view)
            .finish()
    }
}

/// A spawned monitor.
pub struct JobMonitorHandle {
    cancel: Arc<Notify>,
    join: JoinHandle<JobReport>,
}

impl JobMonitorHandle {
    /// Abort whatever is pending and ask the backend to cancel the job.
    pub fn cancel(&self) {
        self.cancel.notify_one();
    }

    pub fn canceller(&self) -> Arc<Notify> {
        self.cancel.clone()
    }

    pub async fn wait(self) -> anyhow::Result<JobReport> {
        Ok(self.join.await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn running(log: &str) -> JobEnvelope {
        Envelope {
            success: true,
            data: Some(JobStatus { title: "Saving".into(), running: true, log: log.into(), ..Default::default() }),
            msg: None,
        }
    }

    fn finished(status: &str) -> JobEnvelope {
        Envelope {
            success: true,
            data: Some(JobStatus {
                title: "Saving".into(),
                status: status.into(),
                end_message: Some("all good".into()),
                urls: vec![JobLink { href: "/t".into(), target: "_blank".into(), text: "view".into() }],
                ..Default::default()
            }),
            msg: None,
        }
    }

    struct Scripted {
        responses: Mutex<VecDeque<Result<JobEnvelope, TransportError>>>,
        cancels: Mutex<u32>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<JobEnvelope, TransportError>>) -> Arc<Self> {
            Arc::new(Self { responses: Mutex::new(responses.into()), cancels: Mutex::new(0) })
        }
    }

    #[async_trait]
    impl JobTransport for Scripted {
        async fn status(&self, _job_id: &str) -> Result<JobEnvelope, TransportError> {
            self.responses.lock().unwrap().pop_front().unwrap_or_else(|| Ok(finished("DONE")))
        }

        async fn cancel(&self, _job_id: &str) -> Result<JobEnvelope, TransportError> {
            *self.cancels.lock().unwrap() += 1;
            Ok(finished("CANCELLED"))
        }
    }

    fn fast() -> MonitorConfig {
        MonitorConfig { refresh_interval: Duration::from_millis(1), max_retries: 8 }
    }

    #[test]
    fn test_envelope_parses_server_json() {
        let env: JobEnvelope = serde_json::from_str(
            r#"{"success": true, "data": {"title": "t", "running": false, "status": "DONE", "log": "", "endMessage": "ok"}}"#,
        )
        .unwrap();
        assert_eq!(env.data.unwrap().end_message.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_running_then_done() {
        let transport = Scripted::new(vec![Ok(running("a")), Ok(running("b")), Ok(finished("DONE"))]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut monitor = JobMonitor::new("job-1", transport, fast());
        let sink = seen.clone();
        monitor.subscribe_all(move |e: &JobEvent| sink.lock().unwrap().push(e.kind));

        let report = monitor.run().await;

        assert_eq!(report.kind, Some(JobEventKind::Complete));
        assert_eq!(report.view.status_line(), "Status: DONE");
        assert_eq!(report.view.links[0], FinishLink::Message("all good".into()));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![JobEventKind::InProgress, JobEventKind::InProgress, JobEventKind::Complete]
        );
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let env = Envelope { success: false, data: None, msg: Some("no such job".into()) };
        let report = JobMonitor::new("job-2", Scripted::new(vec![Ok(env)]), fast()).run().await;
        assert_eq!(report.kind, Some(JobEventKind::Error));
        assert_eq!(report.view.title, "no such job");
        assert_eq!(report.view.log, "no such job");
        assert!(report.view.links.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_status_stops_silently() {
        let report = JobMonitor::new("job-3", Scripted::new(vec![Ok(finished("PAUSED"))]), fast()).run().await;
        assert_eq!(report.kind, None);
        assert_eq!(report.view.status, "PAUSED");
    }

    #[tokio::test]
    async fn test_retry_counter_resets_on_success() {
        let err = || Err(TransportError::new("5", "timeout"));
        let mut script: Vec<_> = (0..8).map(|_| err()).collect();
        script.push(Ok(running("")));
        script.extend((0..8).map(|_| err()));
        script.push(Ok(finished("DONE")));
        let report = JobMonitor::new("job-4", Scripted::new(script), fast()).run().await;
        assert_eq!(report.kind, Some(JobEventKind::Complete));
    }

    #[tokio::test]
    async fn test_cancel_before_first_poll_sends_cancel() {
        let transport = Scripted::new(vec![]);
        let monitor = JobMonitor::new("job-5", transport.clone(), fast());
        monitor.canceller().notify_one();
        let report = monitor.run().await;
        assert_eq!(report.kind, Some(JobEventKind::Cancelled));
        assert_eq!(*transport.cancels.lock().unwrap(), 1);
    }
}
