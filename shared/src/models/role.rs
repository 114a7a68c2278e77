//! User roles

use serde::{Deserialize, Serialize};

/// Marketplace user role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Purchases listings
    Buyer,
    /// Creates listings, fulfills orders
    Seller,
    /// Platform operator
    Admin,
}

impl UserRole {
    /// Parse from database string value (lowercase)
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "buyer" => Some(Self::Buyer),
            "seller" => Some(Self::Seller),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Database string representation (lowercase)
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Buyer => "buyer",
            Self::Seller => "seller",
            Self::Admin => "admin",
        }
    }

    /// Sellers and admins may manage listings
    pub fn can_sell(&self) -> bool {
        matches!(self, Self::Seller | Self::Admin)
    }

    /// Admin-only operations
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_roundtrip() {
        for role in [UserRole::Buyer, UserRole::Seller, UserRole::Admin] {
            assert_eq!(UserRole::from_db(role.as_db()), Some(role));
        }
        assert_eq!(UserRole::from_db("superuser"), None);
    }

    #[test]
    fn test_capabilities() {
        assert!(!UserRole::Buyer.can_sell());
        assert!(UserRole::Seller.can_sell());
        assert!(UserRole::Admin.can_sell());
        assert!(UserRole::Admin.is_admin());
        assert!(!UserRole::Seller.is_admin());
    }

    #[test]
    fn test_serde() {
        assert_eq!(serde_json::to_string(&UserRole::Seller).unwrap(), "\"seller\"");
        let role: UserRole = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, UserRole::Admin);
    }
}
