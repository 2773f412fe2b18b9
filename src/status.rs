//! Order lifecycle and payment state machines.
//!
//! The two columns evolve independently: `status` tracks fulfilment while
//! `payment_status` tracks money. Payment only ever moves forward along
//! unpaid -> partially_paid -> paid; the single exception is the
//! cancel-triggered paid -> refunding transition.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Processing,
    Delivering,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Delivering => "delivering",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "processing" => Some(OrderStatus::Processing),
            // some older rows carry the legacy label
            "delivering" | "shipped" => Some(OrderStatus::Delivering),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Orders handed to the carrier or already terminal cannot be cancelled.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Processing)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Delivering)
                | (Processing, Cancelled)
                | (Delivering, Completed)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Unpaid,
    PartiallyPaid,
    Paid,
    Refunding,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::PartiallyPaid => "partially_paid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunding => "refunding",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unpaid" => Some(PaymentStatus::Unpaid),
            "partially_paid" => Some(PaymentStatus::PartiallyPaid),
            "paid" => Some(PaymentStatus::Paid),
            "refunding" => Some(PaymentStatus::Refunding),
            _ => None,
        }
    }

    /// Position along the forward-only payment ladder. Refunding sits outside
    /// the ladder and is only reachable through cancellation.
    fn rank(&self) -> u8 {
        match self {
            PaymentStatus::Unpaid => 0,
            PaymentStatus::PartiallyPaid => 1,
            PaymentStatus::Paid => 2,
            PaymentStatus::Refunding => 3,
        }
    }

    /// Reconciliation may only move payment state forward, never regress it.
    pub fn can_advance_to(&self, next: PaymentStatus) -> bool {
        next != PaymentStatus::Refunding && next.rank() > self.rank()
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
