//! Subcommand implementations.

use crate::echo::EchoHandler;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use umas_core::{
    device_list, get_job_id, parse_int_list, ClientDispatcher, FileRendezvous, Framing,
    RendezvousStore, TaskServer, UmasError,
};

/// Which job's rendezvous file the command works against.
#[derive(Debug, Clone)]
pub struct Target {
    job_id: String,
    rendezvous_dir: Option<PathBuf>,
}

impl Target {
    pub fn new(job_id: Option<String>, rendezvous_dir: Option<PathBuf>) -> Self {
        Self {
            job_id: job_id.unwrap_or_else(get_job_id),
            rendezvous_dir,
        }
    }

    pub fn store(&self) -> FileRendezvous {
        match &self.rendezvous_dir {
            Some(dir) => FileRendezvous::in_dir(dir, &self.job_id),
            None => FileRendezvous::for_job(&self.job_id),
        }
    }
}

pub fn job_id(target: &Target) -> Result<ExitCode> {
    println!("{}", target.job_id);
    Ok(ExitCode::SUCCESS)
}

/// A missing port file is fatal for this command: report it and exit 1.
pub fn port(target: &Target) -> Result<ExitCode> {
    match target.store().load() {
        Ok(port) => {
            println!("{}", port);
            Ok(ExitCode::SUCCESS)
        }
        Err(e @ UmasError::NotFound { .. }) => {
            println!("{}", e);
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn send(
    target: &Target,
    task: &str,
    timeout: f64,
    interval: f64,
    lenient: bool,
) -> Result<ExitCode> {
    let task: Value = serde_json::from_str(task).context("Task is not valid JSON")?;
    let timeout = Duration::try_from_secs_f64(timeout).context("Invalid --timeout")?;
    let interval = Duration::try_from_secs_f64(interval).context("Invalid --interval")?;
    if interval.is_zero() {
        anyhow::bail!("--interval must be greater than zero");
    }

    let dispatcher = ClientDispatcher::new(target.store())
        .with_wait_timeout(timeout)
        .with_poll_interval(interval)
        .with_framing(Framing::from_strict(!lenient));

    let result: Value = match dispatcher.dispatch(&task).await {
        Ok(result) => result,
        Err(e) if e.is_connection() => {
            return Err(anyhow::Error::new(e).context(format!(
                "Server for job {} is unreachable; the rendezvous file may be stale",
                target.job_id
            )));
        }
        Err(e) => return Err(e.into()),
    };
    println!("{}", result);
    Ok(ExitCode::SUCCESS)
}

pub async fn serve(target: &Target) -> Result<ExitCode> {
    let store = Arc::new(target.store());
    let mut handle = TaskServer::start(store.clone(), Arc::new(EchoHandler)).await?;

    // Intentional stdout so wrapper scripts can read the port directly
    println!("UMAS_PORT={}", handle.port());
    info!("Serving job {} via {}", target.job_id, store.location().display());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");
    handle.shutdown();
    Ok(ExitCode::SUCCESS)
}

pub fn devices(num_workers: usize, gpus: &str) -> Result<ExitCode> {
    let gpus = parse_int_list(gpus)?;
    for device in device_list(num_workers, &gpus) {
        println!("{}", device);
    }
    Ok(ExitCode::SUCCESS)
}
