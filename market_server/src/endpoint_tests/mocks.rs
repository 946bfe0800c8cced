use std::collections::HashMap;

use market_engine::{
    db_types::Money,
    traits::{GatewayOrder, GatewayRefund, NewGatewayOrder, PaymentGateway, PaymentGatewayError},
};
use mkt_common::Secret;
use mockall::mock;

pub const KEY_SECRET: &str = "mock_key_secret";

mock! {
    pub Gateway {}
    impl Clone for Gateway {
        fn clone(&self) -> Self;
    }
    impl PaymentGateway for Gateway {
        fn key_id(&self) -> String;
        fn key_secret(&self) -> Secret<String>;
        async fn create_order(&self, order: NewGatewayOrder) -> Result<GatewayOrder, PaymentGatewayError>;
        async fn refund_payment(
            &self,
            gateway_payment_id: &str,
            amount: Money,
            notes: HashMap<String, String>,
        ) -> Result<GatewayRefund, PaymentGatewayError>;
    }
}

/// A gateway that accepts every order and refund.
pub fn accepting_gateway() -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_key_id().returning(|| "rzp_test_mock".to_string());
    gateway.expect_key_secret().returning(|| Secret::new(KEY_SECRET.to_string()));
    gateway.expect_create_order().returning(|order| {
        Ok(GatewayOrder {
            id: "order_mock1".to_string(),
            amount: order.amount,
            currency: order.currency,
            receipt: Some(order.receipt),
        })
    });
    gateway.expect_refund_payment().returning(|payment_id, amount, _| {
        Ok(GatewayRefund { id: "rfnd_mock1".to_string(), payment_id: payment_id.to_string(), amount })
    });
    gateway
}
