use actix_http::Request;
use actix_web::{
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test::TestRequest,
};
use market_engine::helpers::{payment_signature, webhook_signature};
use serde_json::{json, Value};

use super::{
    helpers::{call, order_body, with_token, TestMarket, WEBHOOK_SECRET},
    mocks::{accepting_gateway, MockGateway, KEY_SECRET},
};
use crate::routes::WEBHOOK_SIGNATURE_HEADER;

/// Places a 572.00 order as the test buyer and returns its id.
async fn place_order<S>(app: &S, market: &TestMarket) -> String
where S: Service<Request, Response = ServiceResponse, Error = actix_web::Error> {
    let product = market.approved_product("Alphonso mangoes", 200, 10).await;
    let req = with_token(TestRequest::post().uri("/api/orders"), &market.token(&market.buyer))
        .set_json(order_body(product.id, 2));
    let (status, body) = call(app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["order_id"].as_str().unwrap().to_string()
}

fn verify_body(order_id: &str, payment_id: &str) -> Value {
    json!({
        "order_id": order_id,
        "razorpay_order_id": "order_mock1",
        "razorpay_payment_id": payment_id,
        "razorpay_signature": payment_signature(KEY_SECRET, "order_mock1", payment_id),
    })
}

fn signed_webhook(body: &Value) -> TestRequest {
    let raw = serde_json::to_vec(body).unwrap();
    let signature = webhook_signature(WEBHOOK_SECRET, &raw);
    TestRequest::post().uri("/webhooks/payments").insert_header((WEBHOOK_SIGNATURE_HEADER, signature)).set_payload(raw)
}

fn captured(payment_id: &str) -> Value {
    json!({
        "entity": "event",
        "event": "payment.captured",
        "payload": { "payment": { "entity": {
            "id": payment_id, "entity": "payment", "amount": 57_200, "currency": "INR",
            "status": "captured", "order_id": "order_mock1"
        }}}
    })
}

#[actix_web::test]
async fn payments_without_a_gateway() {
    let market = TestMarket::new().await;
    let app = market.app(None::<MockGateway>).await;
    let order_id = place_order(&app, &market).await;
    let req = with_token(TestRequest::post().uri("/api/payments/create-order"), &market.token(&market.buyer))
        .set_json(json!({ "order_id": order_id }));
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "The payment gateway is not configured");
    market.finish().await;
}

#[actix_web::test]
async fn checkout_and_verify() {
    let market = TestMarket::new().await;
    let app = market.app(Some(accepting_gateway())).await;
    let order_id = place_order(&app, &market).await;
    let buyer = market.token(&market.buyer);

    let req = with_token(TestRequest::post().uri("/api/payments/create-order"), &buyer)
        .set_json(json!({ "order_id": order_id, "amount": 57_200 }));
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request. Payment amount 57200.00 does not match the order total of 572.00");

    // Amounts are whole rupees in the request and the response
    for _ in 0..2 {
        let req = with_token(TestRequest::post().uri("/api/payments/create-order"), &buyer)
            .set_json(json!({ "order_id": order_id, "amount": 572 }));
        let (status, body) = call(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["gateway_order_id"], "order_mock1");
        assert_eq!(body["data"]["amount"], 572);
        assert_eq!(body["data"]["currency"], "INR");
        assert_eq!(body["data"]["key_id"], "rzp_test_mock");
    }

    let mut forged = verify_body(&order_id, "pay_mock1");
    forged["razorpay_signature"] = json!("00".repeat(32));
    let req = with_token(TestRequest::post().uri("/api/payments/verify"), &buyer).set_json(forged);
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Payment signature verification failed");

    for _ in 0..2 {
        let req =
            with_token(TestRequest::post().uri("/api/payments/verify"), &buyer).set_json(verify_body(&order_id, "pay_mock1"));
        let (status, body) = call(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "Confirmed");
        assert_eq!(body["data"]["payment_status"], "Paid");
        assert_eq!(body["data"]["gateway_payment_id"], "pay_mock1");
    }

    let req = with_token(TestRequest::post().uri("/api/payments/create-order"), &buyer)
        .set_json(json!({ "order_id": order_id }));
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    market.finish().await;
}

#[actix_web::test]
async fn webhook_confirms_the_order() {
    let market = TestMarket::new().await;
    let app = market.app(Some(accepting_gateway())).await;
    let order_id = place_order(&app, &market).await;
    let buyer = market.token(&market.buyer);
    let req = with_token(TestRequest::post().uri("/api/payments/create-order"), &buyer)
        .set_json(json!({ "order_id": order_id }));
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, signed_webhook(&captured("pay_hook1"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    let req = with_token(TestRequest::get().uri(&format!("/api/orders/{order_id}")), &buyer);
    let (_, body) = call(&app, req).await;
    assert_eq!(body["data"]["status"], "Confirmed");
    assert_eq!(body["data"]["payment_status"], "Paid");

    // Redelivery is acknowledged and changes nothing
    let (status, _) = call(&app, signed_webhook(&captured("pay_hook1"))).await;
    assert_eq!(status, StatusCode::OK);
    market.finish().await;
}

#[actix_web::test]
async fn webhook_signatures_are_required() {
    let market = TestMarket::new().await;
    let app = market.app(Some(accepting_gateway())).await;
    let raw = serde_json::to_vec(&captured("pay_hook1")).unwrap();

    let req = TestRequest::post().uri("/webhooks/payments").set_payload(raw.clone());
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let req = TestRequest::post()
        .uri("/webhooks/payments")
        .insert_header((WEBHOOK_SIGNATURE_HEADER, webhook_signature("not-the-secret", &raw)))
        .set_payload(raw);
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Signed, but about an order we have never seen
    let (status, body) = call(&app, signed_webhook(&json!({ "event": "order.paid", "payload": {} }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    market.finish().await;
}

#[actix_web::test]
async fn admins_refund_paid_orders() {
    let market = TestMarket::new().await;
    let app = market.app(Some(accepting_gateway())).await;
    let order_id = place_order(&app, &market).await;
    let buyer = market.token(&market.buyer);
    let path = format!("/api/payments/{order_id}/refund");

    let req = with_token(TestRequest::post().uri(&path), &market.token(&market.admin));
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = with_token(TestRequest::post().uri("/api/payments/create-order"), &buyer)
        .set_json(json!({ "order_id": order_id }));
    call(&app, req).await;
    let req =
        with_token(TestRequest::post().uri("/api/payments/verify"), &buyer).set_json(verify_body(&order_id, "pay_mock1"));
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, with_token(TestRequest::post().uri(&path), &buyer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = with_token(TestRequest::post().uri(&path), &market.token(&market.admin))
        .set_json(json!({ "reason": "Crop failure" }));
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "Cancelled");
    assert_eq!(body["data"]["payment_status"], "Refunded");
    assert_eq!(body["data"]["refund_id"], "rfnd_mock1");
    assert_eq!(body["message"], "Payment refunded");
    market.finish().await;
}
