use serde::{Deserialize, Serialize};

use crate::{
    db_types::{OrderStatus, ShippingAddress},
    traits::MarketplaceError,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: i64,
    pub quantity: i64,
}

impl OrderItemRequest {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        Self { product_id, quantity }
    }
}

/// A request to place an order on behalf of `buyer_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub buyer_id: i64,
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: ShippingAddress,
}

impl NewOrderRequest {
    /// The requested items, with repeated product ids merged into a single item. The order of first appearance is
    /// preserved. Fails if a merged quantity cannot be represented.
    pub fn merged_items(&self) -> Result<Vec<OrderItemRequest>, MarketplaceError> {
        let mut merged: Vec<OrderItemRequest> = Vec::with_capacity(self.items.len());
        for item in &self.items {
            match merged.iter_mut().find(|m| m.product_id == item.product_id) {
                Some(m) => {
                    m.quantity = m.quantity.checked_add(item.quantity).ok_or_else(|| {
                        MarketplaceError::ValidationError(format!("Quantity for product {} is too large", item.product_id))
                    })?;
                },
                None => merged.push(item.clone()),
            }
        }
        Ok(merged)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl UpdateStatusRequest {
    pub fn new(status: OrderStatus) -> Self {
        Self { status, description: None, location: None }
    }

    pub fn with_location<S: Into<String>>(mut self, location: S) -> Self {
        self.location = Some(location.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn duplicate_items_are_merged() {
        let req = NewOrderRequest {
            buyer_id: 1,
            items: vec![OrderItemRequest::new(3, 1), OrderItemRequest::new(1, 2), OrderItemRequest::new(3, 4)],
            shipping_address: serde_json::from_str(
                r#"{"full_name":"A","street":"1 Main Rd","city":"Pune","state":"MH","postal_code":"411001"}"#,
            )
            .unwrap(),
        };
        assert_eq!(req.merged_items().unwrap(), vec![OrderItemRequest::new(3, 5), OrderItemRequest::new(1, 2)]);
        assert_eq!(req.shipping_address.country, "India");
    }

    #[test]
    fn merged_quantities_must_fit() {
        let req = NewOrderRequest {
            buyer_id: 1,
            items: vec![OrderItemRequest::new(3, i64::MAX), OrderItemRequest::new(3, 2)],
            shipping_address: serde_json::from_str(
                r#"{"full_name":"A","street":"1 Main Rd","city":"Pune","state":"MH","postal_code":"411001"}"#,
            )
            .unwrap(),
        };
        let err = req.merged_items().unwrap_err();
        assert!(matches!(err, MarketplaceError::ValidationError(ref m) if m == "Quantity for product 3 is too large"));
    }

    #[test]
    fn status_request_defaults() {
        let req: UpdateStatusRequest = serde_json::from_str(r#"{"status":"Shipped"}"#).unwrap();
        assert_eq!(req.status, OrderStatus::Shipped);
        assert!(req.description.is_none());
        assert!(serde_json::from_str::<UpdateStatusRequest>(r#"{"status":"Lost"}"#).is_err());
    }
}
