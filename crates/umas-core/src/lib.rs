//! UMAS Core - job-scoped task rendezvous over loopback TCP.
//!
//! A server binds an OS-assigned loopback port and publishes it in
//! `/tmp/umas_port_{job_id}.json`. Clients of the same job wait for that
//! record, connect, send one length-prefixed JSON task and read one
//! length-prefixed JSON result.
//!
//! # Example
//!
//! ```rust,ignore
//! use umas_core::ClientDispatcher;
//!
//! #[tokio::main]
//! async fn main() -> umas_core::Result<()> {
//!     let dispatcher = ClientDispatcher::for_current_job();
//!     let energy: f64 = dispatcher
//!         .dispatch(&serde_json::json!({"method": "energy", "atoms": []}))
//!         .await?;
//!     println!("energy = {}", energy);
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod codec;
pub mod config;
pub mod devices;
pub mod dispatch;
pub mod error;
pub mod job;
pub mod poll;
pub mod rendezvous;
pub mod server;

pub use cancel::{CancellationToken, CancelledError};
pub use codec::{decode, encode, read_frame, receive, send, write_frame, Framing};
pub use devices::{device_list, parse_int_list};
pub use dispatch::{send_task, ClientDispatcher, DispatchOptions};
pub use error::{Result, UmasError};
pub use job::{get_job_id, job_id_from};
pub use poll::{poll_until, PollError};
pub use rendezvous::{
    path_for, path_in, FileRendezvous, MemoryRendezvous, RendezvousRecord, RendezvousStore,
};
pub use server::{TaskHandler, TaskServer, TaskServerHandle};
