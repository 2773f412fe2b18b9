//! Pricing engine shared by the preview and create-order paths.
//!
//! Both endpoints call [`quote`] with the same inputs so the two paths can
//! never drift apart. Totals are server-side recomputations from the live
//! cart; a client-submitted total is never trusted. All amounts are integer
//! VND.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Shipping tier for Hanoi / Ho Chi Minh City.
pub const SHIPPING_FEE_METRO: i64 = 15_000;
/// Shipping tier for every other destination.
pub const SHIPPING_FEE_DEFAULT: i64 = 30_000;
/// Flat surcharge added on top of the tier for express delivery.
pub const EXPRESS_SURCHARGE: i64 = 10_000;

const METRO_CITIES: [&str; 2] = ["ha noi", "ho chi minh"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShippingMethod {
    #[default]
    Standard,
    Express,
}

impl ShippingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingMethod::Standard => "standard",
            ShippingMethod::Express => "express",
        }
    }
}

/// One cart line with its unit price already resolved
/// (product base price + variant modifier).
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub variant_id: Uuid,
    pub quantity: i32,
    pub unit_price: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub merchandise_subtotal: i64,
    pub shipping_fee: i64,
    pub discount_amount: i64,
    pub final_total: i64,
}

/// Compute the full cost breakdown for a cart.
///
/// `discount` comes from the voucher validator and is clamped here so the
/// final total can never drop below the shipping fee.
pub fn quote(
    lines: &[PricedLine],
    destination_city: Option<&str>,
    method: ShippingMethod,
    discount: i64,
) -> AppResult<Quote> {
    let merchandise_subtotal = merchandise_subtotal(lines)?;
    let shipping_fee = shipping_fee(destination_city, method);
    let discount_amount = discount.clamp(0, merchandise_subtotal);
    Ok(Quote {
        merchandise_subtotal,
        shipping_fee,
        discount_amount,
        final_total: merchandise_subtotal + shipping_fee - discount_amount,
    })
}

pub fn merchandise_subtotal(lines: &[PricedLine]) -> AppResult<i64> {
    if lines.is_empty() {
        return Err(AppError::EmptyCart);
    }
    let mut subtotal: i64 = 0;
    for line in lines {
        if line.quantity <= 0 {
            return Err(AppError::BadRequest("Cart has invalid quantity".into()));
        }
        subtotal += line.unit_price * i64::from(line.quantity);
    }
    Ok(subtotal)
}

/// Tiered shipping fee by destination city, diacritic-insensitive.
/// Unknown destination quotes the default tier.
pub fn shipping_fee(destination_city: Option<&str>, method: ShippingMethod) -> i64 {
    let tier = match destination_city {
        Some(city) if is_metro_city(city) => SHIPPING_FEE_METRO,
        _ => SHIPPING_FEE_DEFAULT,
    };
    match method {
        ShippingMethod::Standard => tier,
        ShippingMethod::Express => tier + EXPRESS_SURCHARGE,
    }
}

fn is_metro_city(city: &str) -> bool {
    let folded = fold_city(city);
    METRO_CITIES.iter().any(|m| folded.contains(m))
}

/// Lowercase and strip Vietnamese diacritics so "Hà Nội", "ha noi" and
/// "TP. Hồ Chí Minh" all land on the same key.
fn fold_city(city: &str) -> String {
    city.chars()
        .flat_map(|c| c.to_lowercase())
        .map(fold_char)
        .collect()
}

fn fold_char(c: char) -> char {
    match c {
        'à' | 'á' | 'ạ' | 'ả' | 'ã' | 'â' | 'ầ' | 'ấ' | 'ậ' | 'ẩ' | 'ẫ' | 'ă' | 'ằ' | 'ắ'
        | 'ặ' | 'ẳ' | 'ẵ' => 'a',
        'è' | 'é' | 'ẹ' | 'ẻ' | 'ẽ' | 'ê' | 'ề' | 'ế' | 'ệ' | 'ể' | 'ễ' => 'e',
        'ì' | 'í' | 'ị' | 'ỉ' | 'ĩ' => 'i',
        'ò' | 'ó' | 'ọ' | 'ỏ' | 'õ' | 'ô' | 'ồ' | 'ố' | 'ộ' | 'ổ' | 'ỗ' | 'ơ' | 'ờ' | 'ớ'
        | 'ợ' | 'ở' | 'ỡ' => 'o',
        'ù' | 'ú' | 'ụ' | 'ủ' | 'ũ' | 'ư' | 'ừ' | 'ứ' | 'ự' | 'ử' | 'ữ' => 'u',
        'ỳ' | 'ý' | 'ỵ' | 'ỷ' | 'ỹ' => 'y',
        'đ' => 'd',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i32, unit_price: i64) -> PricedLine {
        PricedLine {
            variant_id: Uuid::new_v4(),
            quantity,
            unit_price,
        }
    }

    #[test]
    fn empty_cart_is_rejected() {
        assert!(matches!(
            quote(&[], None, ShippingMethod::Standard, 0),
            Err(AppError::EmptyCart)
        ));
    }

    #[test]
    fn subtotal_is_exact_over_many_lines() {
        let lines: Vec<PricedLine> = (1..=100).map(|q| line(q, 19_990)).collect();
        let expected: i64 = (1..=100i64).map(|q| q * 19_990).sum();
        assert_eq!(merchandise_subtotal(&lines).unwrap(), expected);
    }

    #[test]
    fn metro_cities_match_with_and_without_diacritics() {
        for city in ["Hà Nội", "ha noi", "TP. Hồ Chí Minh", "Ho Chi Minh City"] {
            assert_eq!(
                shipping_fee(Some(city), ShippingMethod::Standard),
                SHIPPING_FEE_METRO,
                "city {city:?}"
            );
        }
        assert_eq!(
            shipping_fee(Some("Đà Nẵng"), ShippingMethod::Standard),
            SHIPPING_FEE_DEFAULT
        );
    }

    #[test]
    fn express_adds_flat_surcharge_on_both_tiers() {
        assert_eq!(
            shipping_fee(Some("Hà Nội"), ShippingMethod::Express),
            SHIPPING_FEE_METRO + EXPRESS_SURCHARGE
        );
        assert_eq!(
            shipping_fee(Some("Hue"), ShippingMethod::Express),
            SHIPPING_FEE_DEFAULT + EXPRESS_SURCHARGE
        );
    }

    #[test]
    fn missing_address_quotes_default_tier() {
        assert_eq!(
            shipping_fee(None, ShippingMethod::Standard),
            SHIPPING_FEE_DEFAULT
        );
    }

    #[test]
    fn discount_is_clamped_to_subtotal() {
        let q = quote(
            &[line(1, 100_000)],
            Some("Hà Nội"),
            ShippingMethod::Standard,
            250_000,
        )
        .unwrap();
        assert_eq!(q.discount_amount, 100_000);
        // floor: the customer still pays shipping
        assert_eq!(q.final_total, SHIPPING_FEE_METRO);
    }

    #[test]
    fn hanoi_standard_scenario() {
        // cart of 2 x 500,000 with a 10% voucher, standard shipping to Hanoi
        let q = quote(
            &[line(2, 500_000)],
            Some("Hà Nội"),
            ShippingMethod::Standard,
            100_000,
        )
        .unwrap();
        assert_eq!(q.merchandise_subtotal, 1_000_000);
        assert_eq!(q.shipping_fee, 15_000);
        assert_eq!(q.discount_amount, 100_000);
        assert_eq!(q.final_total, 915_000);
    }
}
