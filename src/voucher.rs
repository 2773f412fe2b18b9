//! Voucher validation, shared by the preview and create-order paths.
//!
//! Lookup (existence, `is_active`) happens in the caller's query; everything
//! that can be decided from the loaded row is decided here, as independent
//! predicates evaluated cheapest-first.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::entity::vouchers::Model as VoucherModel;

pub const DISCOUNT_TYPE_FIXED: &str = "fixed";
pub const DISCOUNT_TYPE_PERCENT: &str = "percent";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoucherRejection {
    #[error("voucher code does not exist")]
    NotFound,
    #[error("voucher is not valid yet")]
    NotYetValid,
    #[error("voucher has expired")]
    Expired,
    #[error("voucher has no uses left")]
    UsageExhausted,
    #[error("order subtotal is below the voucher minimum of {min_order_value}")]
    BelowMinimum { min_order_value: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoucherOutcome {
    Valid { discount_amount: i64 },
    Rejected(VoucherRejection),
}

/// Validate a loaded voucher row against the order subtotal at `now`.
pub fn validate(voucher: &VoucherModel, merchandise_subtotal: i64, now: DateTime<Utc>) -> VoucherOutcome {
    if now < voucher.valid_from.with_timezone(&Utc) {
        return VoucherOutcome::Rejected(VoucherRejection::NotYetValid);
    }
    if now > voucher.valid_to.with_timezone(&Utc) {
        return VoucherOutcome::Rejected(VoucherRejection::Expired);
    }
    if let Some(limit) = voucher.usage_limit {
        if voucher.used_count >= limit {
            return VoucherOutcome::Rejected(VoucherRejection::UsageExhausted);
        }
    }
    if merchandise_subtotal < voucher.min_order_value {
        return VoucherOutcome::Rejected(VoucherRejection::BelowMinimum {
            min_order_value: voucher.min_order_value,
        });
    }

    let raw = if voucher.discount_type == DISCOUNT_TYPE_PERCENT {
        merchandise_subtotal * voucher.discount_value / 100
    } else {
        voucher.discount_value
    };

    VoucherOutcome::Valid {
        discount_amount: raw.min(merchandise_subtotal),
    }
}
