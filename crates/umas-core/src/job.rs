//! Job identity derived from the batch scheduler environment.
//!
//! The identity scopes the rendezvous file, so a client and the server it
//! talks to must see the same scheduler variables.

use crate::config::JobConfig;

/// Derive the identity of the current job from the process environment.
///
/// Never fails; recomputed on every call.
pub fn get_job_id() -> String {
    job_id_from(|name| std::env::var(name).ok())
}

/// Derive a job identity from an arbitrary variable lookup.
///
/// Scheduler variables are checked in [`JobConfig::JOB_ID_VARS`] order and
/// the first non-empty one wins. Otherwise falls back to
/// `"{USER or LOGNAME or unknown}_default"`.
pub fn job_id_from<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |name: &str| lookup(name).filter(|value| !value.is_empty());

    if let Some(job_id) = JobConfig::JOB_ID_VARS.iter().find_map(|var| non_empty(*var)) {
        return job_id;
    }

    let user = JobConfig::USER_VARS
        .iter()
        .find_map(|var| non_empty(*var))
        .unwrap_or_else(|| JobConfig::UNKNOWN_USER.to_string());
    format!("{}{}", user, JobConfig::DEFAULT_SUFFIX)
}
