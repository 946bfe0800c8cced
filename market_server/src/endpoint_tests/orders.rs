use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;

use super::helpers::{call, order_body, with_token, TestMarket};

#[actix_web::test]
async fn place_and_fetch_an_order() {
    let market = TestMarket::new().await;
    let app = market.app(None).await;
    let product = market.approved_product("Alphonso mangoes", 200, 10).await;
    let token = market.token(&market.buyer);

    let req = with_token(TestRequest::post().uri("/api/orders"), &token).set_json(order_body(product.id, 2));
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Order placed");
    let order = &body["data"];
    assert_eq!(order["status"], "Pending");
    assert_eq!(order["payment_status"], "Pending");
    assert_eq!(order["buyer_id"], market.buyer.id);
    // 400.00 + 18% tax + 100.00 shipping, in rupees
    assert_eq!(order["subtotal"], 400);
    assert_eq!(order["tax"], 72);
    assert_eq!(order["shipping"], 100);
    assert_eq!(order["total_amount"], 572);
    assert_eq!(order["items"].as_array().map(Vec::len), Some(1));
    let order_id = order["order_id"].as_str().unwrap().to_string();

    let (status, body) = call(&app, with_token(TestRequest::get().uri("/api/orders"), &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["order_id"], order_id.as_str());

    let req = with_token(TestRequest::get().uri(&format!("/api/orders/{order_id}")), &token);
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order_id"], order_id.as_str());
    assert_eq!(body["data"]["timeline"][0]["status"], "Order Placed");
    market.finish().await;
}

#[actix_web::test]
async fn orders_are_private_to_the_buyer() {
    let market = TestMarket::new().await;
    let app = market.app(None).await;
    let product = market.approved_product("Kolam rice", 80, 10).await;
    let req = with_token(TestRequest::post().uri("/api/orders"), &market.token(&market.buyer))
        .set_json(order_body(product.id, 1));
    let (_, body) = call(&app, req).await;
    let path = format!("/api/orders/{}", body["data"]["order_id"].as_str().unwrap());

    let (status, body) = call(&app, with_token(TestRequest::get().uri(&path), &market.token(&market.other_buyer))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    let (status, _) = call(&app, with_token(TestRequest::get().uri(&path), &market.token(&market.admin))).await;
    assert_eq!(status, StatusCode::OK);

    let req = with_token(TestRequest::get().uri("/api/orders/ORD-DOES-NOT-EXIST"), &market.token(&market.admin));
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    market.finish().await;
}

#[actix_web::test]
async fn rejected_order_requests() {
    let market = TestMarket::new().await;
    let app = market.app(None).await;
    let product = market.approved_product("Jaggery", 60, 3).await;
    let token = market.token(&market.buyer);

    let req = with_token(TestRequest::post().uri("/api/orders"), &token).set_json(order_body(product.id, 4));
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let req = with_token(TestRequest::post().uri("/api/orders"), &token).set_json(order_body(9_999, 1));
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request. Product 9999 does not exist");

    let req = with_token(TestRequest::post().uri("/api/orders"), &token).set_json(json!({ "items": 3 }));
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    market.finish().await;
}

#[actix_web::test]
async fn cancel_without_a_body() {
    let market = TestMarket::new().await;
    let app = market.app(None).await;
    let product = market.approved_product("Cashews", 500, 5).await;
    let token = market.token(&market.buyer);
    let req = with_token(TestRequest::post().uri("/api/orders"), &token).set_json(order_body(product.id, 1));
    let (_, body) = call(&app, req).await;
    let order_id = body["data"]["order_id"].as_str().unwrap().to_string();

    let req = with_token(TestRequest::post().uri(&format!("/api/orders/{order_id}/cancel")), &token);
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "Cancelled");
    assert_eq!(body["message"], "Order cancelled");

    // Already cancelled
    let req = with_token(TestRequest::post().uri(&format!("/api/orders/{order_id}/cancel")), &token)
        .set_json(json!({ "reason": "Changed my mind" }));
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    market.finish().await;
}

#[actix_web::test]
async fn status_updates_follow_the_lifecycle() {
    let market = TestMarket::new().await;
    let app = market.app(None).await;
    let product = market.approved_product("Ragi flour", 90, 5).await;
    let req = with_token(TestRequest::post().uri("/api/orders"), &market.token(&market.buyer))
        .set_json(order_body(product.id, 1));
    let (_, body) = call(&app, req).await;
    let path = format!("/api/orders/{}/status", body["data"]["order_id"].as_str().unwrap());
    let admin = market.token(&market.admin);

    let req = with_token(TestRequest::put().uri(&path), &admin).set_json(json!({ "status": "Shipped" }));
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let req = with_token(TestRequest::put().uri(&path), &admin)
        .set_json(json!({ "status": "Processing", "description": "Packed at the farm" }));
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "Processing");
    assert_eq!(body["message"], "Order status updated to Processing");

    let req = with_token(TestRequest::put().uri(&path), &market.token(&market.other_buyer))
        .set_json(json!({ "status": "Shipped" }));
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    market.finish().await;
}
