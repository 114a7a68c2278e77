//! Seller subscription plans and their feature quotas

use serde::{Deserialize, Serialize};

/// Paid subscription plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Basic,
    Premium,
    Enterprise,
}

impl Plan {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "basic" => Some(Self::Basic),
            "premium" => Some(Self::Premium),
            "enterprise" => Some(Self::Enterprise),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Premium => "premium",
            Self::Enterprise => "enterprise",
        }
    }

    /// Monthly price in cents
    pub fn price_cents(&self) -> i64 {
        match self {
            Self::Basic => 2_900,
            Self::Premium => 5_900,
            Self::Enterprise => 9_900,
        }
    }

    /// Feature quotas for this plan
    pub fn features(&self) -> PlanFeatures {
        match self {
            Self::Basic => PlanFeatures {
                max_listings: Some(50),
                featured_listings: 5,
                analytics: false,
                priority_support: false,
                custom_branding: false,
            },
            Self::Premium => PlanFeatures {
                max_listings: Some(200),
                featured_listings: 20,
                analytics: true,
                priority_support: true,
                custom_branding: false,
            },
            Self::Enterprise => PlanFeatures {
                max_listings: None,
                featured_listings: 50,
                analytics: true,
                priority_support: true,
                custom_branding: true,
            },
        }
    }
}

/// Feature quotas attached to a plan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanFeatures {
    /// Maximum active listings (None = unlimited)
    pub max_listings: Option<i32>,
    /// Featured listing slots
    pub featured_listings: i32,
    /// Access to the analytics dashboard
    pub analytics: bool,
    pub priority_support: bool,
    pub custom_branding: bool,
}

impl PlanFeatures {
    /// Quotas for sellers without an active subscription
    pub fn free_tier() -> Self {
        Self {
            max_listings: Some(5),
            featured_listings: 0,
            analytics: false,
            priority_support: false,
            custom_branding: false,
        }
    }

    /// Whether `active_listings` leaves room for one more
    pub fn allows_listing(&self, active_listings: i64) -> bool {
        match self.max_listings {
            Some(max) => active_listings < max as i64,
            None => true,
        }
    }
}

/// Local mirror of the processor-side subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    PastDue,
    Incomplete,
}

impl SubscriptionStatus {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "cancelled" => Some(Self::Cancelled),
            "past_due" => Some(Self::PastDue),
            "incomplete" => Some(Self::Incomplete),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cancelled => "cancelled",
            Self::PastDue => "past_due",
            Self::Incomplete => "incomplete",
        }
    }

    /// Map the processor's status string to our local mirror.
    ///
    /// Stripe reports more states than we track; anything unpaid-ish maps
    /// to `PastDue`, anything pending maps to `Incomplete`.
    pub fn from_processor(s: &str) -> Self {
        match s {
            "active" | "trialing" => Self::Active,
            "canceled" | "cancelled" => Self::Cancelled,
            "past_due" | "unpaid" => Self::PastDue,
            _ => Self::Incomplete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_roundtrip() {
        for p in [Plan::Basic, Plan::Premium, Plan::Enterprise] {
            assert_eq!(Plan::from_db(p.as_db()), Some(p));
        }
        assert_eq!(Plan::from_db("free"), None);
    }

    #[test]
    fn test_plan_quotas() {
        assert_eq!(Plan::Basic.features().max_listings, Some(50));
        assert_eq!(Plan::Premium.features().max_listings, Some(200));
        assert_eq!(Plan::Enterprise.features().max_listings, None);
        assert!(Plan::Premium.features().analytics);
        assert!(!Plan::Basic.features().analytics);
    }

    #[test]
    fn test_listing_limits() {
        let free = PlanFeatures::free_tier();
        assert!(free.allows_listing(4));
        assert!(!free.allows_listing(5));

        let enterprise = Plan::Enterprise.features();
        assert!(enterprise.allows_listing(1_000_000));
    }

    #[test]
    fn test_processor_status_mapping() {
        assert_eq!(
            SubscriptionStatus::from_processor("active"),
            SubscriptionStatus::Active
        );
        assert_eq!(
            SubscriptionStatus::from_processor("trialing"),
            SubscriptionStatus::Active
        );
        assert_eq!(
            SubscriptionStatus::from_processor("canceled"),
            SubscriptionStatus::Cancelled
        );
        assert_eq!(
            SubscriptionStatus::from_processor("unpaid"),
            SubscriptionStatus::PastDue
        );
        assert_eq!(
            SubscriptionStatus::from_processor("incomplete_expired"),
            SubscriptionStatus::Incomplete
        );
    }
}
