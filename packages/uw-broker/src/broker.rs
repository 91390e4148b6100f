//! Transport-agnostic broker abstraction so the subscriber is unit-testable
//! against an in-memory fake without a live Pub/Sub emulator.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, BrokerError>;

/// One delivered message. `ack`/`nack` consume the message because a
/// message may only be settled once.
#[async_trait]
pub trait BrokerMessage: Send {
    fn data(&self) -> &[u8];
    async fn ack(self: Box<Self>) -> Result<()>;
    async fn nack(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<()>;

    /// Pulls the next batch of messages for `topic`, blocking up to an
    /// implementation-defined poll interval. Returns an empty vec on
    /// timeout, never an error, so the subscriber loop can poll forever.
    async fn pull(&self, topic: &str, max_messages: usize) -> Result<Vec<Box<dyn BrokerMessage>>>;
}
