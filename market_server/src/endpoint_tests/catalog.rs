use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;

use super::helpers::{call, with_token, TestMarket};

#[actix_web::test]
async fn farmers_list_products_for_moderation() {
    let market = TestMarket::new().await;
    let app = market.app(None).await;
    let farmer = market.token(&market.farmer);
    let listing = json!({ "name": "Nagpur oranges", "farm_name": "Patil Orchards", "price": 120.5, "stock": 40 });

    let req = with_token(TestRequest::post().uri("/api/products"), &farmer).set_json(&listing);
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    let product = &body["data"];
    assert_eq!(product["status"], "Pending");
    assert_eq!(product["seller_id"], market.farmer.id);
    assert_eq!(product["price"], 120.5);
    let id = product["id"].as_i64().unwrap();

    let req = with_token(TestRequest::post().uri("/api/products"), &market.token(&market.buyer)).set_json(&listing);
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = with_token(TestRequest::patch().uri(&format!("/api/admin/products/{id}/approve")), &farmer);
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req =
        with_token(TestRequest::patch().uri(&format!("/api/admin/products/{id}/approve")), &market.token(&market.admin));
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "Approved");
    assert_eq!(body["message"], "Product approved");

    let req = with_token(TestRequest::get().uri(&format!("/api/products/{id}")), &market.token(&market.buyer));
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Nagpur oranges");
    market.finish().await;
}

#[actix_web::test]
async fn rejected_products_come_off_sale() {
    let market = TestMarket::new().await;
    let app = market.app(None).await;
    let product = market.approved_product("Saffron", 900, 2).await;
    let admin = market.token(&market.admin);
    let path = format!("/api/admin/products/{}/reject", product.id);

    let req = with_token(TestRequest::patch().uri(&path), &admin).set_json(json!({ "reason": " " }));
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = with_token(TestRequest::patch().uri(&path), &admin).set_json(json!({ "reason": "Blurry photos" }));
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "Rejected");
    assert_eq!(body["data"]["is_available"], false);
    assert_eq!(body["data"]["rejection_reason"], "Blurry photos");
    market.finish().await;
}

#[actix_web::test]
async fn availability_is_set_by_the_seller() {
    let market = TestMarket::new().await;
    let app = market.app(None).await;
    let product = market.approved_product("Honey", 350, 12).await;
    let path = format!("/api/products/{}/availability", product.id);

    let req = with_token(TestRequest::patch().uri(&path), &market.token(&market.farmer))
        .set_json(json!({ "is_available": false }));
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_available"], false);

    let req = with_token(TestRequest::patch().uri(&path), &market.token(&market.buyer))
        .set_json(json!({ "is_available": true }));
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    market.finish().await;
}

#[actix_web::test]
async fn unknown_products() {
    let market = TestMarket::new().await;
    let app = market.app(None).await;
    let token = market.token(&market.buyer);
    let (status, body) = call(&app, with_token(TestRequest::get().uri("/api/products/4040"), &token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    let (status, _) = call(&app, with_token(TestRequest::get().uri("/api/products/carrots"), &token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    market.finish().await;
}

#[actix_web::test]
async fn admins_create_users() {
    let market = TestMarket::new().await;
    let app = market.app(None).await;
    let new_user = json!({ "name": "Kiran Farms", "email": "kiran@example.com", "role": "Farmer" });

    let req = with_token(TestRequest::post().uri("/api/admin/users"), &market.token(&market.buyer)).set_json(&new_user);
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = with_token(TestRequest::post().uri("/api/admin/users"), &market.token(&market.admin)).set_json(&new_user);
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["role"], "Farmer");
    assert_eq!(body["data"]["email"], "kiran@example.com");

    let bad = json!({ "name": "Nobody", "email": "not-an-email", "role": "Buyer" });
    let req = with_token(TestRequest::post().uri("/api/admin/users"), &market.token(&market.admin)).set_json(&bad);
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    market.finish().await;
}
