//! Money calculation utilities using rust_decimal for precision
//!
//! All order arithmetic (line totals, platform fee, environmental impact)
//! is done with `Decimal` internally, then converted to `f64` for
//! storage/serialization. Monetary values round to 2 decimal places,
//! half away from zero.

use rust_decimal::prelude::*;
use shared::error::AppError;

/// Rounding strategy for monetary values (2 decimal places)
const DECIMAL_PLACES: u32 = 2;

/// Maximum allowed price per unit ($1,000,000)
const MAX_PRICE: f64 = 1_000_000.0;
/// Maximum allowed quantity per line item
const MAX_QUANTITY: i32 = 9999;

/// Validate that a f64 value is finite (not NaN, not Infinity)
#[inline]
fn require_finite(value: f64, field_name: &str) -> Result<(), AppError> {
    if !value.is_finite() {
        return Err(AppError::validation(format!(
            "{field_name} must be a finite number, got {value}"
        )));
    }
    Ok(())
}

/// Validate a unit price before processing
pub fn validate_price(value: f64, field_name: &str) -> Result<(), AppError> {
    require_finite(value, field_name)?;
    if value < 0.0 {
        return Err(AppError::validation(format!(
            "{field_name} must be non-negative, got {value}"
        )));
    }
    if value > MAX_PRICE {
        return Err(AppError::validation(format!(
            "{field_name} exceeds maximum allowed ({MAX_PRICE}), got {value}"
        )));
    }
    Ok(())
}

/// Validate a line-item quantity before processing
pub fn validate_quantity(quantity: i32) -> Result<(), AppError> {
    if quantity <= 0 {
        return Err(AppError::validation(format!(
            "quantity must be positive, got {quantity}"
        )));
    }
    if quantity > MAX_QUANTITY {
        return Err(AppError::validation(format!(
            "quantity exceeds maximum allowed ({MAX_QUANTITY}), got {quantity}"
        )));
    }
    Ok(())
}

/// Round a decimal to 2 places, half away from zero
fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

fn dec(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// price × quantity, rounded to cents
pub fn line_total(price: f64, quantity: i32) -> f64 {
    to_f64(round2(dec(price) * Decimal::from(quantity)))
}

/// Per-unit environmental estimate × quantity, rounded to 2 dp
pub fn line_impact(per_unit: f64, quantity: i32) -> f64 {
    to_f64(round2(dec(per_unit) * Decimal::from(quantity)))
}

/// Platform fee: item subtotal × commission rate (a fraction in [0, 1])
pub fn platform_fee(items_price: f64, commission_rate: f64) -> f64 {
    to_f64(round2(dec(items_price) * dec(commission_rate)))
}

/// Computed order totals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderTotals {
    pub items_price: f64,
    pub shipping_price: f64,
    pub platform_fee: f64,
    pub total_price: f64,
}

/// Compute order totals from server-side priced lines.
///
/// `lines` is (unit_price, quantity) per item. The invariant is
/// total = items + shipping + items × rate, all rounded to cents.
pub fn order_totals(
    lines: &[(f64, i32)],
    shipping_price: f64,
    commission_rate: f64,
) -> Result<OrderTotals, AppError> {
    validate_price(shipping_price, "shipping_price")?;
    require_finite(commission_rate, "commission_rate")?;
    if !(0.0..=1.0).contains(&commission_rate) {
        return Err(AppError::validation(format!(
            "commission_rate must be in [0, 1], got {commission_rate}"
        )));
    }

    let mut items = Decimal::ZERO;
    for &(price, quantity) in lines {
        validate_price(price, "price")?;
        validate_quantity(quantity)?;
        items += round2(dec(price) * Decimal::from(quantity));
    }

    let items = round2(items);
    let shipping = round2(dec(shipping_price));
    let fee = round2(items * dec(commission_rate));
    let total = round2(items + shipping + fee);

    Ok(OrderTotals {
        items_price: to_f64(items),
        shipping_price: to_f64(shipping),
        platform_fee: to_f64(fee),
        total_price: to_f64(total),
    })
}

/// Dollars to integer cents for the payment processor
pub fn to_cents(amount: f64) -> i64 {
    (dec(amount) * Decimal::from(100))
        .round()
        .to_i64()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_total() {
        assert_eq!(line_total(2.50, 3), 7.50);
        assert_eq!(line_total(0.10, 3), 0.30);
        // Float noise must not leak into cents
        assert_eq!(line_total(19.99, 7), 139.93);
    }

    #[test]
    fn test_platform_fee() {
        assert_eq!(platform_fee(100.0, 0.10), 10.0);
        assert_eq!(platform_fee(33.33, 0.10), 3.33);
        assert_eq!(platform_fee(0.0, 0.10), 0.0);
        assert_eq!(platform_fee(100.0, 0.0), 0.0);
    }

    #[test]
    fn test_order_totals_invariant() {
        // total = items + shipping + items * rate
        let t = order_totals(&[(10.0, 2), (5.0, 1)], 4.0, 0.10).unwrap();
        assert_eq!(t.items_price, 25.0);
        assert_eq!(t.shipping_price, 4.0);
        assert_eq!(t.platform_fee, 2.50);
        assert_eq!(t.total_price, 31.50);
    }

    #[test]
    fn test_order_totals_zero_rate() {
        let t = order_totals(&[(9.99, 1)], 0.0, 0.0).unwrap();
        assert_eq!(t.platform_fee, 0.0);
        assert_eq!(t.total_price, 9.99);
    }

    #[test]
    fn test_order_totals_full_rate() {
        // commissionRate = 1.0 is the upper bound of the valid range
        let t = order_totals(&[(50.0, 1)], 0.0, 1.0).unwrap();
        assert_eq!(t.platform_fee, 50.0);
        assert_eq!(t.total_price, 100.0);
    }

    #[test]
    fn test_order_totals_rounding() {
        // 3 × 3.33 = 9.99; fee 10% = 0.999 -> 1.00
        let t = order_totals(&[(3.33, 3)], 0.0, 0.10).unwrap();
        assert_eq!(t.items_price, 9.99);
        assert_eq!(t.platform_fee, 1.00);
        assert_eq!(t.total_price, 10.99);
    }

    #[test]
    fn test_order_totals_rejects_bad_input() {
        assert!(order_totals(&[(-1.0, 1)], 0.0, 0.1).is_err());
        assert!(order_totals(&[(1.0, 0)], 0.0, 0.1).is_err());
        assert!(order_totals(&[(1.0, 10_000)], 0.0, 0.1).is_err());
        assert!(order_totals(&[(1.0, 1)], -2.0, 0.1).is_err());
        assert!(order_totals(&[(1.0, 1)], 0.0, 1.5).is_err());
        assert!(order_totals(&[(f64::NAN, 1)], 0.0, 0.1).is_err());
        assert!(order_totals(&[(1.0, 1)], 0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_line_impact() {
        assert_eq!(line_impact(0.5, 3), 1.5);
        assert_eq!(line_impact(0.333, 3), 1.0);
    }

    #[test]
    fn test_to_cents() {
        assert_eq!(to_cents(10.0), 1000);
        assert_eq!(to_cents(19.99), 1999);
        assert_eq!(to_cents(0.01), 1);
        assert_eq!(to_cents(123.456), 12346);
    }
}
