pub mod broker;
pub mod classify;
pub mod memory;
pub mod pubsub;
pub mod subscriber;
pub mod topics;

pub use broker::{Broker, BrokerError, BrokerMessage, Result};
pub use classify::{decide, DeliveryDecision};
pub use memory::MemoryBroker;
pub use subscriber::Subscriber;

#[cfg(feature = "gcp")]
pub use pubsub::PubSubBroker;
