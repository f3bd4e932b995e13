//! Echo task handler used by `umas serve`.

use serde_json::Value;
use tracing::info;
use umas_core::{Result, TaskHandler};

/// Returns every task unchanged.
pub struct EchoHandler;

#[async_trait::async_trait]
impl TaskHandler for EchoHandler {
    async fn handle(&self, task: Value) -> Result<Value> {
        info!("Echoing task: {}", task);
        Ok(task)
    }
}
