#![allow(dead_code)]
//! Shared fixtures for the engine integration tests.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use market_engine::{
    db_types::{Caller, Money, NewProduct, NewUser, Product, Role, ShippingAddress, UserAccount},
    events::EventProducers,
    order_objects::{NewOrderRequest, OrderItemRequest},
    traits::{GatewayOrder, GatewayRefund, NewGatewayOrder, PaymentGatewayError},
    AccountManagement,
    CatalogApi,
    CatalogManagement,
    MarketplaceDatabase,
    OrderFlowApi,
    PaymentApi,
    PaymentGateway,
    SqliteDatabase,
};
use market_engine::test_utils::prepare_env::{prepare_test_env, random_db_path, tear_down};
use mkt_common::Secret;

pub const KEY_SECRET: &str = "test_key_secret";
pub const WEBHOOK_SECRET: &str = "test_webhook_secret";

//--------------------------------------  Recording gateway  ---------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRefund {
    pub payment_id: String,
    pub amount: Money,
}

/// A payment gateway that records what was asked of it, and hands out predictable ids.
#[derive(Clone)]
pub struct RecordingGateway {
    secret: Secret<String>,
    pub orders: Arc<Mutex<Vec<NewGatewayOrder>>>,
    pub refunds: Arc<Mutex<Vec<RecordedRefund>>>,
    pub fail_refunds: bool,
}

impl Default for RecordingGateway {
    fn default() -> Self {
        Self {
            secret: Secret::new(KEY_SECRET.to_string()),
            orders: Arc::new(Mutex::new(vec![])),
            refunds: Arc::new(Mutex::new(vec![])),
            fail_refunds: false,
        }
    }
}

impl RecordingGateway {
    pub fn failing_refunds() -> Self {
        Self { fail_refunds: true, ..Default::default() }
    }

    pub fn refunds(&self) -> Vec<RecordedRefund> {
        self.refunds.lock().unwrap().clone()
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }
}

impl PaymentGateway for RecordingGateway {
    fn key_id(&self) -> String {
        "rzp_test_key".to_string()
    }

    fn key_secret(&self) -> Secret<String> {
        self.secret.clone()
    }

    async fn create_order(&self, order: NewGatewayOrder) -> Result<GatewayOrder, PaymentGatewayError> {
        let mut orders = self.orders.lock().unwrap();
        orders.push(order.clone());
        Ok(GatewayOrder {
            id: format!("order_gw{}", orders.len()),
            amount: order.amount,
            currency: order.currency,
            receipt: Some(order.receipt),
        })
    }

    async fn refund_payment(
        &self,
        gateway_payment_id: &str,
        amount: Money,
        _notes: HashMap<String, String>,
    ) -> Result<GatewayRefund, PaymentGatewayError> {
        if self.fail_refunds {
            return Err(PaymentGatewayError::Rejected("The payment has been fully refunded already".into()));
        }
        let mut refunds = self.refunds.lock().unwrap();
        refunds.push(RecordedRefund { payment_id: gateway_payment_id.to_string(), amount });
        Ok(GatewayRefund { id: format!("rfnd_{}", refunds.len()), payment_id: gateway_payment_id.to_string(), amount })
    }
}

//--------------------------------------      Fixtures       ---------------------------------------------------------

pub struct Marketplace {
    pub db: SqliteDatabase,
    pub admin: UserAccount,
    pub buyer: UserAccount,
    pub other_buyer: UserAccount,
    pub farmer: UserAccount,
    pub other_farmer: UserAccount,
}

impl Marketplace {
    pub async fn new() -> Self {
        let db = prepare_test_env(&random_db_path()).await;
        let admin = db.insert_user(NewUser::new("Admin", "admin@example.com", Role::Admin)).await.unwrap();
        let buyer = db
            .insert_user(NewUser::new("Asha Rao", "asha@example.com", Role::Buyer).with_phone("+91 98200 00000"))
            .await
            .unwrap();
        let other_buyer = db.insert_user(NewUser::new("Ravi Kumar", "ravi@example.com", Role::Buyer)).await.unwrap();
        let farmer = db.insert_user(NewUser::new("Meena Patil", "meena@example.com", Role::Farmer)).await.unwrap();
        let other_farmer = db.insert_user(NewUser::new("Joseph D", "joseph@example.com", Role::Farmer)).await.unwrap();
        Self { db, admin, buyer, other_buyer, farmer, other_farmer }
    }

    pub fn admin_caller(&self) -> Caller {
        Caller::new(self.admin.id, Role::Admin)
    }

    pub fn buyer_caller(&self) -> Caller {
        Caller::new(self.buyer.id, Role::Buyer)
    }

    pub fn other_buyer_caller(&self) -> Caller {
        Caller::new(self.other_buyer.id, Role::Buyer)
    }

    /// Lists and approves a product for the given seller.
    pub async fn approved_product(&self, seller_id: i64, name: &str, price: i64, stock: i64) -> Product {
        let catalog = CatalogApi::new(self.db.clone());
        let caller = Caller::new(seller_id, Role::Farmer);
        let product = NewProduct::new(seller_id, name, Money::from_major(price), stock).with_farm_name("Green Acres");
        let product = catalog.create_product(&caller, product).await.unwrap();
        catalog.approve_product(&self.admin_caller(), product.id).await.unwrap()
    }

    pub async fn product(&self, product_id: i64) -> Product {
        self.db.fetch_product(product_id).await.unwrap().unwrap()
    }

    pub async fn user(&self, user_id: i64) -> UserAccount {
        self.db.fetch_user(user_id).await.unwrap().unwrap()
    }

    pub fn order_api(&self) -> OrderFlowApi<SqliteDatabase> {
        OrderFlowApi::new(self.db.clone(), EventProducers::default())
    }

    pub fn order_api_with(&self, producers: EventProducers) -> OrderFlowApi<SqliteDatabase> {
        OrderFlowApi::new(self.db.clone(), producers)
    }

    pub fn payment_api(&self, gateway: RecordingGateway) -> PaymentApi<SqliteDatabase, RecordingGateway> {
        self.payment_api_with(gateway, EventProducers::default())
    }

    pub fn payment_api_with(
        &self,
        gateway: RecordingGateway,
        producers: EventProducers,
    ) -> PaymentApi<SqliteDatabase, RecordingGateway> {
        PaymentApi::new(self.db.clone(), Some(gateway), producers)
            .with_webhook_secret(Secret::new(WEBHOOK_SECRET.to_string()))
    }

    pub fn order_request(&self, items: &[(i64, i64)]) -> NewOrderRequest {
        NewOrderRequest {
            buyer_id: self.buyer.id,
            items: items.iter().map(|(id, q)| OrderItemRequest::new(*id, *q)).collect(),
            shipping_address: address(),
        }
    }

    pub async fn finish(self) {
        tear_down(self.db).await;
    }
}

pub fn address() -> ShippingAddress {
    ShippingAddress {
        full_name: "Asha Rao".into(),
        street: "12 MG Road".into(),
        city: "Pune".into(),
        state: "Maharashtra".into(),
        postal_code: "411001".into(),
        country: "India".into(),
        phone: None,
    }
}

pub fn amount(s: &str) -> Money {
    s.parse().unwrap()
}
