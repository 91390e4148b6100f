//! Routes delivered messages to the matching orchestrator workflow and
//! applies the ack/nack policy to the result.

use crate::broker::{Broker, BrokerMessage};
use crate::classify::{decide, DeliveryDecision};
use crate::topics;
use std::sync::Arc;
use uw_core::domain::{ExecutionId, UnderwritingId, UnderwritingProcessorId};
use uw_orchestrator::Orchestrator;

pub struct Subscriber {
    pub broker: Arc<dyn Broker>,
    pub orchestrator: Arc<Orchestrator>,
}

impl Subscriber {
    pub fn new(broker: Arc<dyn Broker>, orchestrator: Arc<Orchestrator>) -> Self {
        Self { broker, orchestrator }
    }

    /// Pulls and dispatches once per call; callers loop this forever with
    /// their own poll interval. Kept as a single step so it's directly
    /// unit-testable.
    pub async fn poll_once(&self, topic: &str) {
        let messages = match self.broker.pull(topic, 10).await {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(topic, error = %e, "broker pull failed");
                return;
            }
        };

        for message in messages {
            self.dispatch(topic, message).await;
        }
    }

    async fn dispatch(&self, topic: &str, message: Box<dyn BrokerMessage>) {
        let outcome = self.handle(topic, message.data()).await;
        match outcome {
            Ok(()) => {
                if let Err(e) = message.ack().await {
                    tracing::error!(topic, error = %e, "ack failed");
                }
            }
            Err(reason) => match decide(&reason) {
                DeliveryDecision::Nack => {
                    tracing::warn!(topic, reason, "nacking for redelivery");
                    if let Err(e) = message.nack().await {
                        tracing::error!(topic, error = %e, "nack failed");
                    }
                }
                DeliveryDecision::Ack => {
                    tracing::error!(topic, reason, "dropping message to audit trail");
                    if let Err(e) = message.ack().await {
                        tracing::error!(topic, error = %e, "ack failed");
                    }
                }
            },
        }
    }

    async fn handle(&self, topic: &str, data: &[u8]) -> Result<(), String> {
        match topic {
            topics::UNDERWRITING_UPDATED | topics::DOCUMENT_ANALYZED => {
                let payload: topics::UnderwritingUpdatedPayload =
                    serde_json::from_slice(data).map_err(|e| e.to_string())?;
                self.orchestrator
                    .handle_workflow1(UnderwritingId(payload.underwriting_id))
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }
            topics::UNDERWRITING_PROCESSOR_EXECUTE => {
                let payload: topics::ProcessorExecutePayload = serde_json::from_slice(data).map_err(|e| e.to_string())?;
                self.orchestrator
                    .handle_workflow2(
                        UnderwritingProcessorId(payload.underwriting_processor_id),
                        payload.execution_id.map(ExecutionId),
                        payload.duplicate,
                        payload.application_form,
                        payload.document_list,
                    )
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }
            topics::UNDERWRITING_PROCESSOR_CONSOLIDATION => {
                let payload: topics::ProcessorConsolidationPayload =
                    serde_json::from_slice(data).map_err(|e| e.to_string())?;
                self.orchestrator
                    .handle_workflow3(UnderwritingProcessorId(payload.underwriting_processor_id))
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }
            topics::UNDERWRITING_EXECUTION_ACTIVATE => {
                let payload: topics::ExecutionActivatePayload = serde_json::from_slice(data).map_err(|e| e.to_string())?;
                self.orchestrator
                    .handle_workflow4(ExecutionId(payload.execution_id))
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }
            topics::UNDERWRITING_EXECUTION_DISABLE => {
                let payload: topics::ExecutionDisablePayload = serde_json::from_slice(data).map_err(|e| e.to_string())?;
                self.orchestrator
                    .handle_workflow5(ExecutionId(payload.execution_id))
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }
            other => Err(format!("no handler registered for topic {other}")),
        }
    }
}
