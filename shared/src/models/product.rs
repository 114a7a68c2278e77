//! Product model: categories, listing status and its derivation rules

use serde::{Deserialize, Serialize};

/// Product category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductCategory {
    Food,
    Clothing,
    Electronics,
    Cosmetics,
    HomeGoods,
    Books,
    Toys,
    Sports,
    Other,
}

impl ProductCategory {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "food" => Some(Self::Food),
            "clothing" => Some(Self::Clothing),
            "electronics" => Some(Self::Electronics),
            "cosmetics" => Some(Self::Cosmetics),
            "home-goods" => Some(Self::HomeGoods),
            "books" => Some(Self::Books),
            "toys" => Some(Self::Toys),
            "sports" => Some(Self::Sports),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Clothing => "clothing",
            Self::Electronics => "electronics",
            Self::Cosmetics => "cosmetics",
            Self::HomeGoods => "home-goods",
            Self::Books => "books",
            Self::Toys => "toys",
            Self::Sports => "sports",
            Self::Other => "other",
        }
    }
}

/// Why the listing is discounted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpiryType {
    NearExpiry,
    Overstock,
    Seasonal,
    Discontinued,
    Other,
}

impl ExpiryType {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "near-expiry" => Some(Self::NearExpiry),
            "overstock" => Some(Self::Overstock),
            "seasonal" => Some(Self::Seasonal),
            "discontinued" => Some(Self::Discontinued),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::NearExpiry => "near-expiry",
            Self::Overstock => "overstock",
            Self::Seasonal => "seasonal",
            Self::Discontinued => "discontinued",
            Self::Other => "other",
        }
    }
}

/// Selling unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Piece,
    Kg,
    Liter,
    Box,
    Pack,
}

impl Unit {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "piece" => Some(Self::Piece),
            "kg" => Some(Self::Kg),
            "liter" => Some(Self::Liter),
            "box" => Some(Self::Box),
            "pack" => Some(Self::Pack),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Piece => "piece",
            Self::Kg => "kg",
            Self::Liter => "liter",
            Self::Box => "box",
            Self::Pack => "pack",
        }
    }
}

/// Item condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Condition {
    New,
    LikeNew,
    Good,
    Fair,
}

impl Condition {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "like-new" => Some(Self::LikeNew),
            "good" => Some(Self::Good),
            "fair" => Some(Self::Fair),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::LikeNew => "like-new",
            Self::Good => "good",
            Self::Fair => "fair",
        }
    }
}

/// Listing status
///
/// Derivable from stock/expiry but stored for query performance; every write
/// path recomputes it via [`ProductStatus::derive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductStatus {
    Active,
    Inactive,
    SoldOut,
    Expired,
}

impl ProductStatus {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "sold-out" => Some(Self::SoldOut),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::SoldOut => "sold-out",
            Self::Expired => "expired",
        }
    }

    /// Recompute the status from stock and expiry.
    ///
    /// `Inactive` is a seller/admin decision and survives derivation; for
    /// all other states stock wins over expiry (sold-out even if expired).
    pub fn derive(current: Self, stock: i32, expiry_millis: Option<i64>, now_millis: i64) -> Self {
        if current == Self::Inactive {
            return Self::Inactive;
        }
        if stock <= 0 {
            return Self::SoldOut;
        }
        if let Some(expiry) = expiry_millis
            && expiry < now_millis
        {
            return Self::Expired;
        }
        Self::Active
    }

    /// Only active listings can be ordered
    pub fn is_purchasable(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Discount percentage invariant: round(((original - discounted) / original) * 100)
///
/// Returns 0 for a non-positive original price.
pub fn discount_percentage(original_price: f64, discounted_price: f64) -> i32 {
    if original_price <= 0.0 {
        return 0;
    }
    (((original_price - discounted_price) / original_price) * 100.0).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_roundtrip() {
        for c in [
            ProductCategory::Food,
            ProductCategory::HomeGoods,
            ProductCategory::Other,
        ] {
            assert_eq!(ProductCategory::from_db(c.as_db()), Some(c));
        }
        assert_eq!(ProductCategory::from_db("weapons"), None);
    }

    #[test]
    fn test_status_derive_stock_wins() {
        // Stock 0 => sold-out even without expiry
        assert_eq!(
            ProductStatus::derive(ProductStatus::Active, 0, None, 1000),
            ProductStatus::SoldOut
        );
        // Stock 0 wins over expiry
        assert_eq!(
            ProductStatus::derive(ProductStatus::Active, 0, Some(500), 1000),
            ProductStatus::SoldOut
        );
    }

    #[test]
    fn test_status_derive_expiry() {
        assert_eq!(
            ProductStatus::derive(ProductStatus::Active, 5, Some(500), 1000),
            ProductStatus::Expired
        );
        assert_eq!(
            ProductStatus::derive(ProductStatus::Active, 5, Some(2000), 1000),
            ProductStatus::Active
        );
        assert_eq!(
            ProductStatus::derive(ProductStatus::Active, 5, None, 1000),
            ProductStatus::Active
        );
    }

    #[test]
    fn test_status_derive_restock_reactivates() {
        // Sold-out listing that got stock back becomes active again
        assert_eq!(
            ProductStatus::derive(ProductStatus::SoldOut, 10, None, 1000),
            ProductStatus::Active
        );
        // Expired listing stays expired regardless of stock
        assert_eq!(
            ProductStatus::derive(ProductStatus::Expired, 10, Some(500), 1000),
            ProductStatus::Expired
        );
    }

    #[test]
    fn test_status_derive_inactive_sticky() {
        // Deactivation is a seller decision; derivation never resurrects it
        assert_eq!(
            ProductStatus::derive(ProductStatus::Inactive, 10, None, 1000),
            ProductStatus::Inactive
        );
        assert_eq!(
            ProductStatus::derive(ProductStatus::Inactive, 0, Some(500), 1000),
            ProductStatus::Inactive
        );
    }

    #[test]
    fn test_discount_percentage() {
        assert_eq!(discount_percentage(100.0, 75.0), 25);
        assert_eq!(discount_percentage(100.0, 100.0), 0);
        assert_eq!(discount_percentage(100.0, 0.0), 100);
        // Rounds half up: (30 - 20) / 30 = 33.33.. => 33
        assert_eq!(discount_percentage(30.0, 20.0), 33);
        // (3 - 1) / 3 = 66.66.. => 67
        assert_eq!(discount_percentage(3.0, 1.0), 67);
        // Degenerate original price
        assert_eq!(discount_percentage(0.0, 10.0), 0);
    }

    #[test]
    fn test_purchasable() {
        assert!(ProductStatus::Active.is_purchasable());
        assert!(!ProductStatus::SoldOut.is_purchasable());
        assert!(!ProductStatus::Expired.is_purchasable());
        assert!(!ProductStatus::Inactive.is_purchasable());
    }
}
