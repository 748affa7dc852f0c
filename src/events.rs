//! Event channel publisher.
//!
//! Publishing is fire-and-forget: a failed publish is logged and counted,
//! never surfaced to the request that triggered it, and never retried.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rdkafka::{
    config::ClientConfig,
    producer::{FutureProducer, FutureRecord},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Routing key attached to every transaction event.
pub const TRANSACTION_PROCESSED: &str = "transaction.processed";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    pub event_type: String,
    pub payload: serde_json::Value,
    pub published_at: DateTime<Utc>,
}

impl DomainEvent {
    pub fn transaction_processed(payload: serde_json::Value) -> Self {
        Self {
            event_type: TRANSACTION_PROCESSED.to_string(),
            payload,
            published_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: DomainEvent) -> Result<()>;
}

/// Kafka-backed publisher with persistent delivery (`acks=all`).
#[derive(Clone)]
pub struct KafkaEventPublisher {
    producer: FutureProducer,
    topic: String,
}

impl KafkaEventPublisher {
    pub fn new(brokers: &str, topic: String) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .create()?;

        Ok(Self { producer, topic })
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<()> {
        let key = event.event_type.clone();
        let payload = serde_json::to_vec(&event)?;

        let record = FutureRecord::to(&self.topic).key(&key).payload(&payload);

        match self
            .producer
            .send(record, tokio::time::Duration::from_secs(5))
            .await
        {
            Ok(_) => {
                tracing::debug!(
                    event_type = %key,
                    topic = %self.topic,
                    payload_size = payload.len(),
                    "published event"
                );
                Ok(())
            }
            Err((err, _)) => {
                tracing::error!(
                    event_type = %key,
                    topic = %self.topic,
                    error = %err,
                    "failed to publish event"
                );
                Err(anyhow::anyhow!("failed to publish event: {}", err))
            }
        }
    }
}

/// In-memory publisher for tests: records events instead of sending them.
#[derive(Default, Clone)]
pub struct MemoryEventPublisher {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl MemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.events.lock().await.len()
    }
}

#[async_trait]
impl EventPublisher for MemoryEventPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_envelope_shape() {
        let event = DomainEvent::transaction_processed(json!({"transaction_id": "abc"}));
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["eventType"], "transaction.processed");
        assert_eq!(value["payload"]["transaction_id"], "abc");
        assert!(value["publishedAt"].is_string());
    }

    #[tokio::test]
    async fn test_memory_publisher_records_events() {
        let publisher = MemoryEventPublisher::new();
        publisher
            .publish(DomainEvent::transaction_processed(json!({"total": "10.80"})))
            .await
            .unwrap();

        let events = publisher.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, TRANSACTION_PROCESSED);
    }
}
