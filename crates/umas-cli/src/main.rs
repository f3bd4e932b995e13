//! UMAS command-line tool.
//!
//! Client and diagnostic helpers for the job-scoped task rendezvous, plus a
//! small echo server for checking the plumbing end to end.

mod commands;
mod echo;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "umas")]
#[command(about = "Job-scoped task rendezvous for UMAS workers")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Job identity to use instead of the one derived from the environment
    #[arg(long, global = true)]
    job_id: Option<String>,

    /// Directory holding rendezvous files (defaults to /tmp)
    #[arg(long, global = true)]
    rendezvous_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the job identity
    JobId,

    /// Print the port published for this job
    Port,

    /// Send a JSON task to the server of this job and print the result
    Send {
        /// Task payload as JSON
        task: String,

        /// Seconds to wait for the rendezvous file
        #[arg(long, default_value_t = 300.0)]
        timeout: f64,

        /// Seconds between rendezvous checks
        #[arg(long, default_value_t = 0.5)]
        interval: f64,

        /// Accept a result frame cut short by the server
        #[arg(long)]
        lenient: bool,
    },

    /// Run an echo server for this job until Ctrl-C
    Serve,

    /// Print the device assigned to each worker
    Devices {
        /// Number of workers
        num_workers: usize,

        /// GPU numbers, e.g. "0-3" or "0,2"
        #[arg(default_value = "")]
        gpus: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // stdout carries command output; logs go to stderr
    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let target = commands::Target::new(args.job_id, args.rendezvous_dir);

    match args.command {
        Command::JobId => commands::job_id(&target),
        Command::Port => commands::port(&target),
        Command::Send {
            task,
            timeout,
            interval,
            lenient,
        } => commands::send(&target, &task, timeout, interval, lenient).await,
        Command::Serve => commands::serve(&target).await,
        Command::Devices { num_workers, gpus } => commands::devices(num_workers, &gpus),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_send_defaults() {
        let args = Args::try_parse_from(["umas", "send", r#"{"x": 1}"#]).unwrap();
        match args.command {
            Command::Send {
                task,
                timeout,
                interval,
                lenient,
            } => {
                assert_eq!(task, r#"{"x": 1}"#);
                assert_eq!(timeout, 300.0);
                assert_eq!(interval, 0.5);
                assert!(!lenient);
            }
            other => panic!("Expected Send, got: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "umas",
            "port",
            "--job-id",
            "1234.pbs",
            "--rendezvous-dir",
            "/var/tmp",
            "-d",
        ])
        .unwrap();
        assert!(args.debug);
        assert_eq!(args.job_id.as_deref(), Some("1234.pbs"));
        assert_eq!(args.rendezvous_dir, Some(PathBuf::from("/var/tmp")));
        assert!(matches!(args.command, Command::Port));
    }

    #[test]
    fn test_devices_gpus_optional() {
        let args = Args::try_parse_from(["umas", "devices", "3"]).unwrap();
        match args.command {
            Command::Devices { num_workers, gpus } => {
                assert_eq!(num_workers, 3);
                assert!(gpus.is_empty());
            }
            other => panic!("Expected Devices, got: {:?}", other),
        }
    }

    #[test]
    fn test_missing_subcommand_is_error() {
        assert!(Args::try_parse_from(["umas"]).is_err());
    }
}
