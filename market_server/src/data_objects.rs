use std::fmt::Display;

use market_engine::{
    db_types::{Money, NewProduct, ShippingAddress},
    order_objects::{NewOrderRequest, OrderItemRequest},
};
use serde::{Deserialize, Serialize};

/// The envelope for every JSON response: `{ "success": true, "data": ..., "message": ... }`. Errors are rendered by
/// [`crate::errors::ServerError`] as `{ "success": false, "error": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self { success: true, data: Some(data), message: None }
    }

    pub fn with_message<S: Display>(mut self, message: S) -> Self {
        self.message = Some(message.to_string());
        self
    }
}

impl ApiResponse<()> {
    pub fn message<S: Display>(message: S) -> Self {
        Self { success: true, data: None, message: Some(message.to_string()) }
    }
}

/// The body of `POST /api/orders`. Buyers place orders for themselves; admins may name the buyer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    #[serde(default)]
    pub buyer_id: Option<i64>,
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: ShippingAddress,
}

impl PlaceOrderRequest {
    pub fn into_order_request(self, caller_id: i64) -> NewOrderRequest {
        NewOrderRequest {
            buyer_id: self.buyer_id.unwrap_or(caller_id),
            items: self.items,
            shipping_address: self.shipping_address,
        }
    }
}

/// The body of `POST /api/products`. The seller is always the authenticated farmer; admins may name the seller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListProductRequest {
    #[serde(default)]
    pub seller_id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub farm_name: Option<String>,
    /// Price in minor currency units
    pub price: Money,
    pub stock: i64,
}

impl ListProductRequest {
    pub fn into_new_product(self, caller_id: i64) -> NewProduct {
        NewProduct {
            seller_id: self.seller_id.unwrap_or(caller_id),
            name: self.name,
            image: self.image,
            farm_name: self.farm_name,
            price: self.price,
            stock: self.stock,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityRequest {
    pub is_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectProductRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub success: bool,
}
