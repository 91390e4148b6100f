//! Broker-level ack/nack policy: transient errors are redelivered, anything
//! else is dropped to the audit trail to avoid poison-pill loops.

use uw_core::ErrorCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryDecision {
    Ack,
    Nack,
}

pub fn decide(error_message: &str) -> DeliveryDecision {
    match ErrorCategory::classify(error_message) {
        ErrorCategory::Transient => DeliveryDecision::Nack,
        ErrorCategory::Permanent | ErrorCategory::Infrastructure => DeliveryDecision::Ack,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_messages_are_nacked() {
        assert_eq!(decide("connection refused"), DeliveryDecision::Nack);
        assert_eq!(decide("read timeout"), DeliveryDecision::Nack);
    }

    #[test]
    fn other_errors_are_acked() {
        assert_eq!(decide("unknown underwriting_id"), DeliveryDecision::Ack);
    }
}
