use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub order_id: Uuid,
    pub order_code: String,
    pub user_id: Uuid,
    pub status: String,
    pub payment_status: String,
    pub total_amount: i64,
    pub payment_method: String,
    pub shipping_method: String,
    pub shipping_fee: i64,
    pub discount_amount: i64,
    pub voucher_id: Option<i32>,
    pub shipping_address: serde_json::Value,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub item_id: Uuid,
    pub order_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
    pub price_at_purchase: i64,
    pub created_at: DateTime<Utc>,
}

/// Address snapshot frozen onto the order at commit time.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ShippingAddress {
    pub recipient_name: Option<String>,
    pub phone: Option<String>,
    pub full_address: Option<String>,
    pub city: Option<String>,
}

impl From<crate::entity::orders::Model> for Order {
    fn from(model: crate::entity::orders::Model) -> Self {
        Order {
            order_id: model.order_id,
            order_code: model.order_code,
            user_id: model.user_id,
            status: model.status,
            payment_status: model.payment_status,
            total_amount: model.total_amount,
            payment_method: model.payment_method,
            shipping_method: model.shipping_method,
            shipping_fee: model.shipping_fee,
            discount_amount: model.discount_amount,
            voucher_id: model.voucher_id,
            shipping_address: model.shipping_address,
            note: model.note,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

impl From<crate::entity::order_items::Model> for OrderItem {
    fn from(model: crate::entity::order_items::Model) -> Self {
        OrderItem {
            item_id: model.item_id,
            order_id: model.order_id,
            variant_id: model.variant_id,
            quantity: model.quantity,
            price_at_purchase: model.price_at_purchase,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}
