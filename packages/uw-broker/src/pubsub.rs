//! Concrete Pub/Sub-backed `Broker`, feature-gated behind `gcp` so the rest
//! of the crate compiles and unit-tests without a live emulator.

#![cfg(feature = "gcp")]

use crate::broker::{Broker, BrokerError, BrokerMessage, Result};
use async_trait::async_trait;
use google_cloud_pubsub::client::{Client, ClientConfig};
use google_cloud_pubsub::subscription::Subscription;
use std::collections::HashMap;
use tokio::sync::Mutex;

pub struct PubSubBroker {
    client: Client,
    subscriptions: Mutex<HashMap<String, Subscription>>,
}

impl PubSubBroker {
    pub async fn connect(project_id: &str) -> std::result::Result<Self, anyhow::Error> {
        let config = ClientConfig::default().with_auth().await?;
        let client = Client::new(config).await?;
        let _ = project_id;
        Ok(Self { client, subscriptions: Mutex::new(HashMap::new()) })
    }

    async fn subscription_for(&self, topic: &str) -> std::result::Result<Subscription, BrokerError> {
        let mut subs = self.subscriptions.lock().await;
        if let Some(sub) = subs.get(topic) {
            return Ok(sub.clone());
        }
        let subscription_id = format!("{topic}-sub");
        let sub = self.client.subscription(&subscription_id);
        subs.insert(topic.to_string(), sub.clone());
        Ok(sub)
    }
}

struct PubSubMessage {
    inner: google_cloud_pubsub::subscriber::ReceivedMessage,
}

#[async_trait]
impl BrokerMessage for PubSubMessage {
    fn data(&self) -> &[u8] {
        &self.inner.message.data
    }

    async fn ack(self: Box<Self>) -> Result<()> {
        self.inner.ack().await.map_err(|e| BrokerError::Transport(e.to_string()))
    }

    async fn nack(self: Box<Self>) -> Result<()> {
        self.inner.nack().await.map_err(|e| BrokerError::Transport(e.to_string()))
    }
}

#[async_trait]
impl Broker for PubSubBroker {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        let publisher = self.client.topic(topic).new_publisher(None);
        let message = google_cloud_pubsub::publisher::PublisherMessage {
            data: payload.to_vec().into(),
            ..Default::default()
        };
        publisher
            .publish(message)
            .await
            .get()
            .await
            .map_err(|e| BrokerError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn pull(&self, topic: &str, max_messages: usize) -> Result<Vec<Box<dyn BrokerMessage>>> {
        let subscription = self.subscription_for(topic).await?;
        let messages = subscription
            .pull(max_messages as i32, None)
            .await
            .map_err(|e| BrokerError::Transport(e.to_string()))?;
        Ok(messages
            .into_iter()
            .map(|inner| Box::new(PubSubMessage { inner }) as Box<dyn BrokerMessage>)
            .collect())
    }
}
