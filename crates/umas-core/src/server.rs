//! Task server publishing its port through a rendezvous record.
//!
//! Listens on `127.0.0.1:0` (OS-assigned port), saves the port into a
//! [`RendezvousStore`] and serves one connection at a time: receive one task
//! frame, hand it to the [`TaskHandler`], send one result frame, close.
//!
//! Shutting down (or dropping the handle) removes the rendezvous record and
//! drops any in-flight connection. Removal is best-effort.

use crate::codec::{self, Framing};
use crate::config::ServerConfig;
use crate::error::{Result, UmasError};
use crate::rendezvous::RendezvousStore;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Executes tasks received by a [`TaskServer`].
#[async_trait::async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    /// Produce the result for one task. An error drops the connection
    /// without a reply.
    async fn handle(&self, task: Value) -> Result<Value>;
}

/// Handle to a running task server. Dropping shuts down the server.
pub struct TaskServerHandle {
    addr: SocketAddr,
    store: Arc<dyn RendezvousStore>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl TaskServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Stop accepting connections and withdraw the rendezvous record.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            self.store.remove();
            info!("Task server on {} shut down", self.addr);
        }
    }
}

impl Drop for TaskServerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

/// Server half of the rendezvous convention.
pub struct TaskServer;

impl TaskServer {
    /// Bind a loopback port, publish it and start serving in the background.
    pub async fn start<H: TaskHandler>(
        store: Arc<dyn RendezvousStore>,
        handler: Arc<H>,
    ) -> Result<TaskServerHandle> {
        let listener = TcpListener::bind((ServerConfig::BIND_HOST, 0))
            .await
            .map_err(|e| UmasError::connection("bind task server", e))?;
        let addr = listener.local_addr()?;

        store.save(addr.port())?;
        info!(
            "Task server listening on {} (rendezvous {})",
            addr,
            store.location().display()
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task_handle = tokio::spawn(Self::accept_loop(listener, handler, shutdown_rx));

        Ok(TaskServerHandle {
            addr,
            store,
            shutdown_tx: Some(shutdown_tx),
            task_handle: Some(task_handle),
        })
    }

    async fn accept_loop<H: TaskHandler>(
        listener: TcpListener,
        handler: Arc<H>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        loop {
            let (stream, peer_addr) = tokio::select! {
                _ = &mut shutdown_rx => {
                    debug!("Task server accept loop stopping");
                    break;
                }
                accept_result = listener.accept() => match accept_result {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("Task server accept error: {}", e);
                        continue;
                    }
                },
            };

            debug!("Task connection from {}", peer_addr);
            // Shutdown also abandons a client that never finishes its exchange.
            tokio::select! {
                _ = &mut shutdown_rx => {
                    debug!("Task server stopping mid-exchange with {}", peer_addr);
                    break;
                }
                result = Self::handle_connection(stream, &*handler) => {
                    if let Err(e) = result {
                        warn!("Task connection {} failed: {}", peer_addr, e);
                    }
                }
            }
        }
    }

    async fn handle_connection<H: TaskHandler>(mut stream: TcpStream, handler: &H) -> Result<()> {
        let task: Value = match codec::receive(&mut stream, Framing::Strict).await? {
            Some(task) => task,
            None => return Ok(()), // Client left without sending
        };

        let result = handler.handle(task).await?;
        codec::send(&mut stream, &result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendezvous::MemoryRendezvous;
    use std::time::Duration;

    struct EchoHandler;

    #[async_trait::async_trait]
    impl TaskHandler for EchoHandler {
        async fn handle(&self, task: Value) -> Result<Value> {
            if task == Value::String("fail".to_string()) {
                return Err(UmasError::Io {
                    message: "handler failure".to_string(),
                    path: None,
                    source: None,
                });
            }
            Ok(task)
        }
    }

    #[tokio::test]
    async fn test_start_publishes_port() {
        let store = Arc::new(MemoryRendezvous::new());
        let mut handle = TaskServer::start(store.clone(), Arc::new(EchoHandler))
            .await
            .unwrap();

        assert!(handle.port() > 0);
        assert_eq!(handle.addr().ip(), std::net::Ipv4Addr::LOCALHOST);
        assert_eq!(store.load().unwrap(), handle.port());

        handle.shutdown();
        assert!(!store.exists());
    }

    #[tokio::test]
    async fn test_echo_over_raw_socket() {
        let store = Arc::new(MemoryRendezvous::new());
        let mut handle = TaskServer::start(store, Arc::new(EchoHandler)).await.unwrap();

        let mut stream = TcpStream::connect(handle.addr()).await.unwrap();
        codec::send(&mut stream, &serde_json::json!({"hello": "world"}))
            .await
            .unwrap();
        let reply: Option<Value> = codec::receive(&mut stream, Framing::Strict).await.unwrap();
        assert_eq!(reply, Some(serde_json::json!({"hello": "world"})));

        // One exchange per connection.
        let next: Option<Value> = codec::receive(&mut stream, Framing::Strict).await.unwrap();
        assert!(next.is_none());

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_handler_error_closes_without_reply() {
        let store = Arc::new(MemoryRendezvous::new());
        let mut handle = TaskServer::start(store, Arc::new(EchoHandler)).await.unwrap();

        let mut stream = TcpStream::connect(handle.addr()).await.unwrap();
        codec::send(&mut stream, "fail").await.unwrap();
        let reply: Option<Value> = codec::receive(&mut stream, Framing::Strict).await.unwrap();
        assert!(reply.is_none());

        // The server keeps serving after a failed task.
        let mut stream = TcpStream::connect(handle.addr()).await.unwrap();
        codec::send(&mut stream, &42).await.unwrap();
        let reply: Option<Value> = codec::receive(&mut stream, Framing::Strict).await.unwrap();
        assert_eq!(reply, Some(serde_json::json!(42)));

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_drop_removes_record() {
        let store = Arc::new(MemoryRendezvous::new());
        let handle = TaskServer::start(store.clone(), Arc::new(EchoHandler))
            .await
            .unwrap();
        assert!(store.exists());

        drop(handle);
        assert!(!store.exists());
    }

    #[tokio::test]
    async fn test_shutdown_stops_idle_client_exchange() {
        let store = Arc::new(MemoryRendezvous::new());
        let mut handle = TaskServer::start(store, Arc::new(EchoHandler)).await.unwrap();

        // Connects but never sends a task.
        let mut stream = TcpStream::connect(handle.addr()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        handle.shutdown();
        let accept_loop = handle.task_handle.take().unwrap();
        tokio::time::timeout(Duration::from_secs(5), accept_loop)
            .await
            .expect("accept loop must stop on shutdown")
            .unwrap();

        // The server side of the connection is gone: no reply ever arrives.
        let reply: Result<Option<Value>> = tokio::time::timeout(
            Duration::from_secs(5),
            codec::receive(&mut stream, Framing::Strict),
        )
        .await
        .unwrap();
        assert!(!matches!(reply, Ok(Some(_))));
    }
}
