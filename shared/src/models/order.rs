//! Order model: the order state machine, payment method, shipping address
//!
//! A single [`OrderStatus`] enum with an explicit transition table replaces
//! the loosely-correlated paid/delivered/cancelled flags a naive CRUD design
//! would carry. Timestamps (`paid_at`, `delivered_at`, `cancelled_at`) record
//! when a transition happened; the enum alone decides what is allowed.

use serde::{Deserialize, Serialize};

/// Order lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Created at checkout, awaiting payment
    Pending,
    /// Payment captured, stock deducted
    Confirmed,
    /// Seller preparing shipment
    Processing,
    /// Handed to carrier
    Shipped,
    /// Received by buyer
    Delivered,
    /// Cancelled before shipment (stock restored if paid)
    Cancelled,
    /// Payment returned after capture (terminal)
    Refunded,
}

impl OrderStatus {
    /// Parse from database string value (lowercase)
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "processing" => Some(Self::Processing),
            "shipped" => Some(Self::Shipped),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }

    /// Database string representation (lowercase)
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// The transition table. Every status change goes through here.
    pub fn can_transition_to(&self, next: Self) -> bool {
        use OrderStatus::*;
        matches!(
            (*self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Processing)
                | (Confirmed, Shipped)
                | (Confirmed, Cancelled)
                | (Confirmed, Refunded)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Processing, Refunded)
                | (Shipped, Delivered)
                | (Delivered, Refunded)
        )
    }

    /// Cancellation window: anything not yet shipped and not already terminal
    pub fn can_cancel(&self) -> bool {
        self.can_transition_to(Self::Cancelled)
    }

    /// Payment has been captured for this order (and not returned)
    pub fn is_paid(&self) -> bool {
        matches!(
            self,
            Self::Confirmed | Self::Processing | Self::Shipped | Self::Delivered
        )
    }

    /// No further transitions possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }
}

/// How the buyer pays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    MobileMoney,
}

impl PaymentMethod {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "card" => Some(Self::Card),
            "bank_transfer" => Some(Self::BankTransfer),
            "mobile_money" => Some(Self::MobileMoney),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::BankTransfer => "bank_transfer",
            Self::MobileMoney => "mobile_money",
        }
    }
}

/// Shipping address captured at checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

impl ShippingAddress {
    /// All fields are required at checkout
    pub fn is_complete(&self) -> bool {
        !(self.street.trim().is_empty()
            || self.city.trim().is_empty()
            || self.state.trim().is_empty()
            || self.zip_code.trim().is_empty()
            || self.country.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    const ALL: [OrderStatus; 7] = [
        Pending, Confirmed, Processing, Shipped, Delivered, Cancelled, Refunded,
    ];

    #[test]
    fn test_db_roundtrip() {
        for s in ALL {
            assert_eq!(OrderStatus::from_db(s.as_db()), Some(s));
        }
        assert_eq!(OrderStatus::from_db("paid"), None);
    }

    #[test]
    fn test_happy_path() {
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
    }

    #[test]
    fn test_no_double_payment() {
        // Confirming twice is not a valid transition
        assert!(!Confirmed.can_transition_to(Confirmed));
        assert!(!Shipped.can_transition_to(Confirmed));
        assert!(!Delivered.can_transition_to(Confirmed));
    }

    #[test]
    fn test_cancel_window() {
        assert!(Pending.can_cancel());
        assert!(Confirmed.can_cancel());
        assert!(Processing.can_cancel());
        // Shipped and delivered orders cannot be cancelled
        assert!(!Shipped.can_cancel());
        assert!(!Delivered.can_cancel());
        assert!(!Cancelled.can_cancel());
        assert!(!Refunded.can_cancel());
    }

    #[test]
    fn test_refund_window() {
        // Refunds only after capture
        assert!(!Pending.can_transition_to(Refunded));
        assert!(Confirmed.can_transition_to(Refunded));
        assert!(Delivered.can_transition_to(Refunded));
        // Shipped orders refund after delivery confirmation, not mid-transit
        assert!(!Shipped.can_transition_to(Refunded));
        assert!(!Cancelled.can_transition_to(Refunded));
    }

    #[test]
    fn test_terminal_states() {
        for s in ALL {
            if s.is_terminal() {
                for next in ALL {
                    assert!(!s.can_transition_to(next), "{s:?} -> {next:?} must be rejected");
                }
            }
        }
    }

    #[test]
    fn test_is_paid() {
        assert!(!Pending.is_paid());
        assert!(Confirmed.is_paid());
        assert!(Processing.is_paid());
        assert!(Shipped.is_paid());
        assert!(Delivered.is_paid());
        assert!(!Cancelled.is_paid());
        assert!(!Refunded.is_paid());
    }

    #[test]
    fn test_shipping_address_complete() {
        let addr = ShippingAddress {
            street: "12 Mill Road".into(),
            city: "Leeds".into(),
            state: "West Yorkshire".into(),
            zip_code: "LS1 4DY".into(),
            country: "UK".into(),
        };
        assert!(addr.is_complete());

        let incomplete = ShippingAddress {
            city: "  ".into(),
            ..addr
        };
        assert!(!incomplete.is_complete());
    }
}
