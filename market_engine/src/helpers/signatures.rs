//! HMAC-SHA256 signatures used by the payment gateway.
//!
//! * Checkout signatures are computed over `{gateway_order_id}|{gateway_payment_id}` with the API key secret.
//! * Webhook signatures are computed over the raw request body with the webhook secret.
//!
//! Both are transmitted as lowercase hex. Verification decodes the hex and compares the MAC in constant time.
use hmac::{Hmac, Mac};
use log::trace;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn mac_for(secret: &str, data: &[u8]) -> HmacSha256 {
    // HMAC accepts keys of any length, so this cannot fail
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap_or_else(|_| unreachable!());
    mac.update(data);
    mac
}

fn verify(secret: &str, data: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        trace!("🔐️ Signature is not valid hex");
        return false;
    };
    mac_for(secret, data).verify_slice(&expected).is_ok()
}

pub fn hmac_sha256_hex(secret: &str, data: &[u8]) -> String {
    hex::encode(mac_for(secret, data).finalize().into_bytes())
}

fn checkout_message(gateway_order_id: &str, gateway_payment_id: &str) -> String {
    format!("{gateway_order_id}|{gateway_payment_id}")
}

/// The signature the gateway attaches to a successful checkout.
pub fn payment_signature(secret: &str, gateway_order_id: &str, gateway_payment_id: &str) -> String {
    hmac_sha256_hex(secret, checkout_message(gateway_order_id, gateway_payment_id).as_bytes())
}

pub fn verify_payment_signature(
    secret: &str,
    gateway_order_id: &str,
    gateway_payment_id: &str,
    signature: &str,
) -> bool {
    verify(secret, checkout_message(gateway_order_id, gateway_payment_id).as_bytes(), signature)
}

pub fn webhook_signature(secret: &str, body: &[u8]) -> String {
    hmac_sha256_hex(secret, body)
}

pub fn verify_webhook_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    verify(secret, body, signature)
}
