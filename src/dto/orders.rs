use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    models::{Order, OrderItem, ShippingAddress},
    pricing::ShippingMethod,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct PreviewOrderRequest {
    pub address_id: Option<Uuid>,
    pub voucher_code: Option<String>,
    pub shipping_method: Option<ShippingMethod>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VoucherInfo {
    pub valid: bool,
    pub voucher_id: Option<i32>,
    pub code: String,
    pub discount_value: i64,
    pub message: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PreviewOrderResponse {
    pub merchandise_subtotal: i64,
    pub shipping_fee: i64,
    pub shipping_address: Option<ShippingAddress>,
    pub discount_amount: i64,
    pub voucher_info: Option<VoucherInfo>,
    pub final_total: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub address_id: Option<Uuid>,
    pub payment_method: Option<String>,
    pub shipping_method: Option<ShippingMethod>,
    pub voucher_code: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateOrderResponse {
    pub order_id: Uuid,
    pub order_code: String,
    pub status: String,
    pub payment_status: String,
    /// Display-only QR image URL embedding the bank account, amount and
    /// order code as the transfer description.
    pub payment_url: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CancelOrderResponse {
    pub order_id: Uuid,
    pub status: String,
    pub payment_status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CostBreakdown {
    pub subtotal: i64,
    pub shipping_fee: i64,
    pub discount: i64,
    pub total_amount: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub cost_breakdown: CostBreakdown,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
