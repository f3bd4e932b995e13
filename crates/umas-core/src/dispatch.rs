//! Client side of a task exchange.
//!
//! One dispatch waits for the server's rendezvous record, connects to the
//! published port, sends one framed task and reads one framed result. The
//! connection is owned by the call and closed on every exit path. There is no
//! retry: one dispatch is exactly one connection attempt.

use crate::cancel::CancellationToken;
use crate::codec::{self, Framing};
use crate::config::{RendezvousConfig, ServerConfig};
use crate::error::{Result, UmasError};
use crate::poll::{poll_until, PollError};
use crate::rendezvous::{FileRendezvous, RendezvousStore};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Tunables for a dispatch.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub poll_interval: Duration,
    pub wait_timeout: Duration,
    pub framing: Framing,
    pub cancel: CancellationToken,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            poll_interval: RendezvousConfig::POLL_INTERVAL,
            wait_timeout: RendezvousConfig::WAIT_TIMEOUT,
            framing: Framing::default(),
            cancel: CancellationToken::new(),
        }
    }
}

/// Sends tasks to the server advertised through a [`RendezvousStore`].
#[derive(Debug)]
pub struct ClientDispatcher<S> {
    store: S,
    options: DispatchOptions,
}

impl ClientDispatcher<FileRendezvous> {
    /// Dispatcher for the rendezvous file of the current job.
    pub fn for_current_job() -> Self {
        Self::new(FileRendezvous::for_current_job())
    }
}

impl<S: RendezvousStore> ClientDispatcher<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            options: DispatchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    /// A zero interval makes the wait give up after a single check.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.options.poll_interval = interval;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.options.wait_timeout = timeout;
        self
    }

    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.options.framing = framing;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.options.cancel = cancel;
        self
    }

    /// Block until the rendezvous record appears.
    ///
    /// Fails with [`UmasError::Timeout`] once the wait budget is spent.
    pub async fn wait_for_rendezvous(&self) -> Result<()> {
        let result = poll_until(
            self.options.poll_interval,
            self.options.wait_timeout,
            &self.options.cancel,
            || self.store.exists(),
        )
        .await;

        match result {
            Ok(()) => Ok(()),
            Err(PollError::Cancelled) => Err(UmasError::Cancelled),
            Err(PollError::TimedOut(_)) => Err(UmasError::Timeout {
                path: self.store.location().to_path_buf(),
                waited: self.options.wait_timeout,
            }),
        }
    }

    /// Resolve the published port and open a connection to it.
    pub async fn connect(&self) -> Result<TcpStream> {
        let port = self.store.load()?;

        debug!("Connecting to {}:{}", ServerConfig::CONNECT_HOST, port);
        self.cancellable(async {
            TcpStream::connect((ServerConfig::CONNECT_HOST, port))
                .await
                .map_err(|e| {
                    UmasError::connection(
                        format!("connect to {}:{}", ServerConfig::CONNECT_HOST, port),
                        e,
                    )
                })
        })
        .await
    }

    /// Run one full exchange: wait, connect, send `task`, return the result.
    pub async fn dispatch<T, R>(&self, task: &T) -> Result<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.wait_for_rendezvous().await?;

        let mut stream = self.connect().await?;
        self.cancellable(codec::send(&mut stream, task)).await?;

        let result = self
            .cancellable(codec::receive(&mut stream, self.options.framing))
            .await?
            .ok_or_else(|| UmasError::Connection {
                message: "server closed the connection without a result".to_string(),
                source: None,
            })?;

        debug!("Task dispatched via {}", self.store.location().display());
        Ok(result)
    }

    /// Run one socket step unless the token fires first.
    async fn cancellable<F, T>(&self, step: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let cancel = &self.options.cancel;
        cancel.check()?;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(UmasError::Cancelled),
            result = step => result,
        }
    }
}

/// Dispatch `task` to the server of the current job with default options.
pub async fn send_task<T, R>(task: &T) -> Result<R>
where
    T: Serialize + ?Sized,
    R: DeserializeOwned,
{
    ClientDispatcher::for_current_job().dispatch(task).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendezvous::MemoryRendezvous;
    use tokio::net::TcpListener;

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_without_record() {
        let dispatcher = ClientDispatcher::new(MemoryRendezvous::new());
        let start = tokio::time::Instant::now();

        let result: Result<serde_json::Value> = dispatcher.dispatch(&"task").await;

        match result {
            Err(UmasError::Timeout { waited, .. }) => {
                assert_eq!(waited, Duration::from_secs(300));
            }
            other => panic!("Expected Timeout, got: {:?}", other),
        }
        assert_eq!(start.elapsed(), Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_wait() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let dispatcher = ClientDispatcher::new(MemoryRendezvous::new()).with_cancellation(cancel);

        let result = dispatcher.wait_for_rendezvous().await;
        assert!(matches!(result, Err(UmasError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_poll_interval_times_out() {
        let dispatcher = ClientDispatcher::new(MemoryRendezvous::new())
            .with_poll_interval(Duration::ZERO)
            .with_wait_timeout(Duration::from_millis(100));

        let result = tokio::time::timeout(Duration::from_secs(2), dispatcher.wait_for_rendezvous())
            .await
            .expect("wait with zero interval must return");
        assert!(matches!(result, Err(UmasError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_reply() {
        // A server that accepts and reads the task but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (accepted_tx, accepted_rx) = tokio::sync::oneshot::channel();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _: Option<serde_json::Value> =
                codec::receive(&mut stream, Framing::Strict).await.unwrap();
            let _ = accepted_tx.send(());
            std::future::pending::<()>().await;
        });

        let cancel = CancellationToken::new();
        let dispatcher =
            ClientDispatcher::new(MemoryRendezvous::with_port(port)).with_cancellation(cancel.clone());
        let canceller = tokio::spawn(async move {
            accepted_rx.await.unwrap();
            cancel.cancel();
        });

        let result: Result<serde_json::Value> =
            tokio::time::timeout(Duration::from_secs(5), dispatcher.dispatch(&"task"))
                .await
                .expect("cancelled dispatch must return");
        assert!(matches!(result, Err(UmasError::Cancelled)));

        canceller.await.unwrap();
        server.abort();
    }

    #[tokio::test]
    async fn test_connection_refused_is_connection_error() {
        // Bind then drop to get a port with no listener behind it.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let dispatcher = ClientDispatcher::new(MemoryRendezvous::with_port(port));
        let result: Result<serde_json::Value> = dispatcher.dispatch(&"task").await;
        assert!(matches!(result, Err(UmasError::Connection { .. })));
    }

    #[tokio::test]
    async fn test_server_closing_without_reply_is_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _: Option<serde_json::Value> =
                codec::receive(&mut stream, Framing::Strict).await.unwrap();
        });

        let dispatcher = ClientDispatcher::new(MemoryRendezvous::with_port(port));
        let result: Result<serde_json::Value> = dispatcher.dispatch(&"task").await;
        server.await.unwrap();

        match result {
            Err(UmasError::Connection { source, .. }) => assert!(source.is_none()),
            other => panic!("Expected Connection error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatch_roundtrip_against_raw_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let task: Option<Vec<i64>> = codec::receive(&mut stream, Framing::Strict).await.unwrap();
            let sum: i64 = task.unwrap_or_default().iter().sum();
            codec::send(&mut stream, &sum).await.unwrap();
        });

        let dispatcher = ClientDispatcher::new(MemoryRendezvous::with_port(port));
        let result: i64 = dispatcher.dispatch(&vec![1, 2, 3, 4]).await.unwrap();
        server.await.unwrap();

        assert_eq!(result, 10);
    }

    #[test]
    fn test_default_options() {
        let options = DispatchOptions::default();
        assert_eq!(options.poll_interval, Duration::from_millis(500));
        assert_eq!(options.wait_timeout, Duration::from_secs(300));
        assert_eq!(options.framing, Framing::Strict);
        assert!(!options.cancel.is_cancelled());
    }
}
