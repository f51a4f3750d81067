//! Follow a background job until it finishes.
//!
//! Usage: job_watch <job-id>
//!
//! Reads PROCTOR_BASE_URL, JOB_REFRESH_MS, JOB_MAX_RETRIES and JOB_TIMEOUT_MS.
//! Ctrl-C asks the server to cancel the job.

use anyhow::{anyhow, Result};
use proctor_console::client::ConsoleClient;
use proctor_console::config::ConsoleConfig;
use proctor_console::jobs::{FinishLink, JobEvent, JobEventKind, JobMonitor, MonitorConfig};
use proctor_console::logging::{log, obj, v_str, Domain, Level};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let job_id = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow!("usage: job_watch <job-id>"))?;
    let cfg = ConsoleConfig::from_env();
    log(
        Level::Info,
        Domain::System,
        "job_watch_start",
        obj(&[("job_id", v_str(&job_id)), ("base_url", v_str(&cfg.base_url))]),
    );

    let client = Arc::new(ConsoleClient::new(&cfg)?);
    let mut monitor = JobMonitor::new(&job_id, client, MonitorConfig::from(&cfg));
    let mut last_len = 0usize;
    monitor.subscribe(JobEventKind::InProgress, move |e: &JobEvent| {
        if let Some(status) = &e.status {
            // Only the new tail of the log.
            let tail = status.log.get(last_len..).unwrap_or(&status.log);
            if !tail.is_empty() {
                print!("{}", tail);
            }
            last_len = status.log.len();
        }
    });

    let handle = monitor.spawn();
    let cancel = handle.canceller();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.notify_one();
        }
    });

    let report = handle.wait().await?;
    println!("\n{}", report.view.title);
    println!("{}", report.view.status_line());
    for link in &report.view.links {
        match link {
            FinishLink::Message(m) => println!("{}", m),
            FinishLink::Url(u) => println!("{} <{}>", u.text, u.href),
        }
    }
    match report.kind {
        Some(JobEventKind::Error) => Err(anyhow!("{}", report.view.log)),
        _ => Ok(()),
    }
}
