//! Payment model: local mirror of the processor-side payment intent

use serde::{Deserialize, Serialize};

/// Payment status, mirroring the processor's intent lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Intent created, not yet confirmed
    Pending,
    /// Charge captured
    Succeeded,
    /// Charge declined or errored
    Failed,
    /// Returned to the buyer (terminal)
    Refunded,
}

impl PaymentStatus {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }

    /// Only captured payments can be refunded
    pub fn can_refund(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_roundtrip() {
        for s in [
            PaymentStatus::Pending,
            PaymentStatus::Succeeded,
            PaymentStatus::Failed,
            PaymentStatus::Refunded,
        ] {
            assert_eq!(PaymentStatus::from_db(s.as_db()), Some(s));
        }
        assert_eq!(PaymentStatus::from_db("charged"), None);
    }

    #[test]
    fn test_refund_guard() {
        assert!(PaymentStatus::Succeeded.can_refund());
        assert!(!PaymentStatus::Pending.can_refund());
        assert!(!PaymentStatus::Failed.can_refund());
        assert!(!PaymentStatus::Refunded.can_refund());
    }
}
