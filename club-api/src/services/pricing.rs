//! Coupon evaluation and cart totals
//!
//! Pure functions over already-loaded rows; callers fetch the coupon.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::db::coupons::Coupon;

pub const DISCOUNT_PERCENT: &str = "percent";
pub const DISCOUNT_FIXED: &str = "fixed";

/// Why a coupon cannot be applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponRejection {
    Inactive,
    NotYetValid,
    Expired,
    UsageLimitReached,
    BelowMinimum { min_order_cents: i64 },
}

impl fmt::Display for CouponRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CouponRejection::Inactive => write!(f, "Coupon is not active"),
            CouponRejection::NotYetValid => write!(f, "Coupon is not valid yet"),
            CouponRejection::Expired => write!(f, "Coupon has expired"),
            CouponRejection::UsageLimitReached => write!(f, "Coupon usage limit reached"),
            CouponRejection::BelowMinimum { min_order_cents } => write!(
                f,
                "Order total is below the coupon minimum of {} cents",
                min_order_cents
            ),
        }
    }
}

/// Discount in cents for `subtotal_cents`, checked in order: active flag,
/// start date, end date, usage cap, minimum order.
pub fn evaluate_coupon(
    coupon: &Coupon,
    subtotal_cents: i64,
    now: DateTime<Utc>,
) -> Result<i64, CouponRejection> {
    if !coupon.is_active {
        return Err(CouponRejection::Inactive);
    }
    if coupon.valid_from.is_some_and(|from| now < from) {
        return Err(CouponRejection::NotYetValid);
    }
    if coupon.valid_until.is_some_and(|until| now > until) {
        return Err(CouponRejection::Expired);
    }
    if coupon.max_uses.is_some_and(|max| coupon.used_count >= max) {
        return Err(CouponRejection::UsageLimitReached);
    }
    if subtotal_cents < coupon.min_order_cents {
        return Err(CouponRejection::BelowMinimum {
            min_order_cents: coupon.min_order_cents,
        });
    }

    Ok(discount_for(&coupon.discount_type, coupon.discount_value, subtotal_cents))
}

/// Percent rounds down; fixed is capped at the subtotal
pub fn discount_for(discount_type: &str, value: i64, subtotal_cents: i64) -> i64 {
    let subtotal = subtotal_cents.max(0);
    match discount_type {
        // i128 keeps `subtotal * 100` in range; the quotient never exceeds subtotal
        DISCOUNT_PERCENT => {
            let discount = i128::from(subtotal) * i128::from(value.clamp(0, 100)) / 100;
            i64::try_from(discount).unwrap_or(subtotal)
        }
        _ => value.clamp(0, subtotal),
    }
}

/// Validate admin input for a coupon's type/value pair
pub fn validate_discount(discount_type: &str, value: i64) -> Result<(), String> {
    match discount_type {
        DISCOUNT_PERCENT if (1..=100).contains(&value) => Ok(()),
        DISCOUNT_PERCENT => Err("Percent discount must be between 1 and 100".to_string()),
        DISCOUNT_FIXED if value > 0 => Ok(()),
        DISCOUNT_FIXED => Err("Fixed discount must be greater than 0".to_string()),
        other => Err(format!("Unknown discount type: {}", other)),
    }
}
