use actix_http::Request;
use actix_web::{
    body::to_bytes,
    dev::{Service, ServiceResponse},
    http::{header::AUTHORIZATION, StatusCode},
    test,
    test::TestRequest,
    App,
};
use log::debug;
use market_engine::{
    db_types::{Caller, Money, NewProduct, NewUser, Product, Role, UserAccount},
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path, tear_down},
    AccountApi,
    CatalogApi,
    SqliteDatabase,
};
use mkt_common::Secret;
use serde_json::{json, Value};

use super::mocks::MockGateway;
use crate::{
    auth::TokenIssuer,
    config::{AuthConfig, ServerConfig},
    server::configure_app,
};

pub const WEBHOOK_SECRET: &str = "endpoint_test_webhook_secret";

// DO NOT re-use this secret anywhere.
pub fn get_auth_config() -> AuthConfig {
    AuthConfig::new("endpoint-tests-only-2b7f1c9e4d")
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        auth: get_auth_config(),
        webhook_secret: Secret::new(WEBHOOK_SECRET.to_string()),
        ..Default::default()
    }
}

pub fn issue_token(user_id: i64, role: Role) -> String {
    TokenIssuer::new(&get_auth_config()).issue_token(user_id, role, None).expect("Failed to sign token")
}

/// A freshly migrated database with one user of each role.
pub struct TestMarket {
    pub db: SqliteDatabase,
    pub admin: UserAccount,
    pub buyer: UserAccount,
    pub other_buyer: UserAccount,
    pub farmer: UserAccount,
}

impl TestMarket {
    pub async fn new() -> Self {
        let db = prepare_test_env(&random_db_path()).await;
        let accounts = AccountApi::new(db.clone());
        let admin = accounts.create_user(NewUser::new("Admin", "admin@example.com", Role::Admin)).await.unwrap();
        let buyer = accounts.create_user(NewUser::new("Asha Rao", "asha@example.com", Role::Buyer)).await.unwrap();
        let other_buyer = accounts.create_user(NewUser::new("Ravi Kumar", "ravi@example.com", Role::Buyer)).await.unwrap();
        let farmer = accounts.create_user(NewUser::new("Meena Patil", "meena@example.com", Role::Farmer)).await.unwrap();
        Self { db, admin, buyer, other_buyer, farmer }
    }

    pub fn token(&self, user: &UserAccount) -> String {
        issue_token(user.id, user.role)
    }

    /// Lists and approves a product from the test farmer. `price` is in whole rupees.
    pub async fn approved_product(&self, name: &str, price: i64, stock: i64) -> Product {
        let catalog = CatalogApi::new(self.db.clone());
        let product = NewProduct::new(self.farmer.id, name, Money::from_major(price), stock);
        let product = catalog.create_product(&Caller::new(self.farmer.id, Role::Farmer), product).await.unwrap();
        catalog.approve_product(&Caller::admin(self.admin.id), product.id).await.unwrap()
    }

    pub async fn app(
        &self,
        gateway: Option<MockGateway>,
    ) -> impl Service<Request, Response = ServiceResponse, Error = actix_web::Error> {
        let config = test_config();
        let db = self.db.clone();
        test::init_service(
            App::new().configure(move |cfg| configure_app(cfg, &config, db, gateway, EventProducers::default())),
        )
        .await
    }

    pub async fn finish(self) {
        tear_down(self.db).await;
    }
}

pub fn order_body(product_id: i64, quantity: i64) -> Value {
    json!({
        "items": [{ "product_id": product_id, "quantity": quantity }],
        "shipping_address": {
            "full_name": "Asha Rao",
            "street": "12 MG Road",
            "city": "Pune",
            "state": "Maharashtra",
            "postal_code": "411001"
        }
    })
}

pub fn with_token(req: TestRequest, token: &str) -> TestRequest {
    req.insert_header((AUTHORIZATION, format!("Bearer {token}")))
}

/// Sends the request and returns the status with the parsed JSON body. Non-JSON bodies come back as `Value::Null`.
pub async fn call<S>(app: &S, req: TestRequest) -> (StatusCode, Value)
where S: Service<Request, Response = ServiceResponse, Error = actix_web::Error> {
    let res = match test::try_call_service(app, req.to_request()).await {
        Ok(res) => res.into_parts().1,
        Err(e) => e.error_response(),
    };
    let status = res.status();
    let body = to_bytes(res.into_body()).await.expect("Could not read response body");
    debug!("Response: {status} {}", String::from_utf8_lossy(&body));
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}
