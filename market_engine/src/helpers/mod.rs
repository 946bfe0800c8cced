mod order_ids;
mod pricing;
mod signatures;

pub use order_ids::{generate_order_id, generate_payment_id};
pub use pricing::{OrderTotals, FLAT_SHIPPING_FEE, FREE_SHIPPING_THRESHOLD, TAX_RATE_PERCENT};
pub use signatures::{
    hmac_sha256_hex,
    payment_signature,
    verify_payment_signature,
    verify_webhook_signature,
    webhook_signature,
};
