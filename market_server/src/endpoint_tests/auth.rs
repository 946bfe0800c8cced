use actix_web::{http::StatusCode, test::TestRequest};
use chrono::Duration;
use market_engine::db_types::Role;

use super::helpers::{call, get_auth_config, with_token, TestMarket};
use crate::{auth::TokenIssuer, config::AuthConfig};

#[actix_web::test]
async fn fetch_my_orders_no_headers() {
    let market = TestMarket::new().await;
    let app = market.app(None).await;
    let (status, body) = call(&app, TestRequest::get().uri("/api/orders")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Authentication Error. No bearer token was provided.");
    market.finish().await;
}

#[actix_web::test]
async fn non_bearer_authorization_is_rejected() {
    let market = TestMarket::new().await;
    let app = market.app(None).await;
    let req = TestRequest::get().uri("/api/orders").insert_header(("Authorization", "Basic YWRtaW46YWRtaW4="));
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    market.finish().await;
}

#[actix_web::test]
async fn fetch_my_orders_invalid_sig() {
    let market = TestMarket::new().await;
    let app = market.app(None).await;
    let forged = TokenIssuer::new(&AuthConfig::new("some-other-secret-entirely"))
        .issue_token(market.buyer.id, Role::Admin, None)
        .unwrap();
    let (status, body) = call(&app, with_token(TestRequest::get().uri("/api/orders"), &forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    market.finish().await;
}

#[actix_web::test]
async fn expired_tokens_are_rejected() {
    let market = TestMarket::new().await;
    let app = market.app(None).await;
    let expired = TokenIssuer::new(&get_auth_config())
        .issue_token(market.buyer.id, Role::Buyer, Some(Duration::minutes(-5)))
        .unwrap();
    let (status, _) = call(&app, with_token(TestRequest::get().uri("/api/orders"), &expired)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    market.finish().await;
}

#[actix_web::test]
async fn fetch_my_orders() {
    let market = TestMarket::new().await;
    let app = market.app(None).await;
    let token = market.token(&market.buyer);
    let (status, body) = call(&app, with_token(TestRequest::get().uri("/api/orders"), &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
    market.finish().await;
}

#[actix_web::test]
async fn health_and_webhooks_do_not_need_a_token() {
    let market = TestMarket::new().await;
    let app = market.app(None).await;
    let (status, _) = call(&app, TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    // No signature, so the webhook is refused, but not for want of a token.
    let (status, _) = call(&app, TestRequest::post().uri("/webhooks/payments").set_payload("{}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    market.finish().await;
}
