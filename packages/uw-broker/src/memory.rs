//! In-memory `Broker` for unit tests and local development without a
//! Pub/Sub emulator.

use crate::broker::{Broker, BrokerMessage, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

struct MemoryMessage {
    data: Vec<u8>,
}

#[async_trait]
impl BrokerMessage for MemoryMessage {
    fn data(&self) -> &[u8] {
        &self.data
    }

    async fn ack(self: Box<Self>) -> Result<()> {
        Ok(())
    }

    async fn nack(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBroker {
    queues: Mutex<HashMap<String, Vec<Vec<u8>>>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        self.queues.lock().await.entry(topic.to_string()).or_default().push(payload.to_vec());
        Ok(())
    }

    async fn pull(&self, topic: &str, max_messages: usize) -> Result<Vec<Box<dyn BrokerMessage>>> {
        let mut queues = self.queues.lock().await;
        let queue = queues.entry(topic.to_string()).or_default();
        let take = max_messages.min(queue.len());
        let drained: Vec<_> = queue.drain(0..take).collect();
        Ok(drained
            .into_iter()
            .map(|data| Box::new(MemoryMessage { data }) as Box<dyn BrokerMessage>)
            .collect())
    }
}
