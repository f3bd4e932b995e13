//! Centralized configuration for UMAS task dispatch.
//!
//! Constants here define the on-disk and on-wire convention shared with
//! existing servers; changing them breaks interoperability.

use std::time::Duration;

/// Job identity derivation.
pub struct JobConfig;

impl JobConfig {
    /// Scheduler variables, checked in order. First non-empty value wins.
    pub const JOB_ID_VARS: [&'static str; 5] = [
        "UMA_JOBID",
        "PBS_JOBID",
        "LSB_JOBID",
        "SLURM_JOB_ID",
        "PJM_JOBID",
    ];
    pub const USER_VARS: [&'static str; 2] = ["USER", "LOGNAME"];
    pub const UNKNOWN_USER: &'static str = "unknown";
    pub const DEFAULT_SUFFIX: &'static str = "_default";
}

/// Rendezvous file location and client wait loop.
pub struct RendezvousConfig;

impl RendezvousConfig {
    pub const DIR: &'static str = "/tmp";
    pub const FILE_PREFIX: &'static str = "umas_port_";
    pub const FILE_SUFFIX: &'static str = ".json";
    pub const POLL_INTERVAL: Duration = Duration::from_millis(500);
    pub const WAIT_TIMEOUT: Duration = Duration::from_secs(300);
}

/// Wire framing.
pub struct FrameConfig;

impl FrameConfig {
    pub const HEADER_LEN: usize = 4;
    pub const MAX_FRAME_LEN: usize = 256 * 1024 * 1024; // 256MB
}

/// Task server defaults.
pub struct ServerConfig;

impl ServerConfig {
    pub const BIND_HOST: &'static str = "127.0.0.1";
    pub const CONNECT_HOST: &'static str = "localhost";
}
