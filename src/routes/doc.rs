use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        orders::{
            CancelOrderRequest, CancelOrderResponse, CostBreakdown, CreateOrderRequest,
            CreateOrderResponse, OrderDetail, OrderList, PreviewOrderRequest,
            PreviewOrderResponse, VoucherInfo,
        },
        webhook::{BankTransferNotification, WebhookAck},
    },
    models::{Order, OrderItem, ShippingAddress},
    response::{ApiResponse, Meta},
    routes::{admin, health, orders, params, payment},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        orders::preview_order,
        orders::create_order,
        orders::cancel_order,
        orders::list_orders,
        orders::get_order,
        payment::bank_webhook,
        admin::list_all_orders,
        admin::force_order_status,
    ),
    components(
        schemas(
            Order,
            OrderItem,
            ShippingAddress,
            PreviewOrderRequest,
            PreviewOrderResponse,
            VoucherInfo,
            CreateOrderRequest,
            CreateOrderResponse,
            CancelOrderRequest,
            CancelOrderResponse,
            CostBreakdown,
            OrderDetail,
            OrderList,
            BankTransferNotification,
            WebhookAck,
            admin::ForceOrderStatusRequest,
            params::Pagination,
            params::OrderListQuery,
            Meta,
            ApiResponse<PreviewOrderResponse>,
            ApiResponse<CreateOrderResponse>,
            ApiResponse<CancelOrderResponse>,
            ApiResponse<OrderDetail>,
            ApiResponse<OrderList>,
            ApiResponse<Order>,
            health::HealthData,
            ApiResponse<health::HealthData>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Orders", description = "Checkout, preview and cancellation"),
        (name = "Payment", description = "Bank transfer webhook"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
