use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a payment intent.
///
/// Permitted transitions:
/// `pending -> processing -> {completed | failed}`,
/// `pending -> {completed | failed}`, `completed -> refunded`.
/// `failed` and `refunded` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentIntentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

impl PaymentIntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentIntentStatus::Pending => "pending",
            PaymentIntentStatus::Processing => "processing",
            PaymentIntentStatus::Completed => "completed",
            PaymentIntentStatus::Failed => "failed",
            PaymentIntentStatus::Refunded => "refunded",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(PaymentIntentStatus::Pending),
            "processing" => Some(PaymentIntentStatus::Processing),
            "completed" => Some(PaymentIntentStatus::Completed),
            "failed" => Some(PaymentIntentStatus::Failed),
            "refunded" => Some(PaymentIntentStatus::Refunded),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentIntentStatus::Failed | PaymentIntentStatus::Refunded
        )
    }

    pub fn can_transition_to(&self, next: PaymentIntentStatus) -> bool {
        use PaymentIntentStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Completed)
                | (Pending, Failed)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Completed, Refunded)
        )
    }
}

impl Display for PaymentIntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_the_documented_transitions() {
        use PaymentIntentStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Failed));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(Completed.can_transition_to(Refunded));
    }

    #[test]
    fn rejects_everything_out_of_a_terminal_status() {
        use PaymentIntentStatus::*;
        for terminal in [Failed, Refunded] {
            for next in [Pending, Processing, Completed, Failed, Refunded] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn rejects_failed_to_completed_and_regressions() {
        use PaymentIntentStatus::*;
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Processing.can_transition_to(Pending));
    }
}
