use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRazorpayOrder {
    /// Amount in minor currency units
    pub amount: i64,
    pub currency: String,
    /// Our own reference for the order. Razorpay limits this to 40 characters.
    pub receipt: String,
    #[serde(default)]
    pub notes: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RazorpayOrder {
    pub id: String,
    pub amount: i64,
    #[serde(default)]
    pub amount_paid: i64,
    #[serde(default)]
    pub amount_due: i64,
    pub currency: String,
    pub receipt: Option<String>,
    pub status: String,
    #[serde(default)]
    pub attempts: i64,
    #[serde(default, deserialize_with = "notes_or_empty")]
    pub notes: HashMap<String, String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRefund {
    /// Amount in minor currency units
    pub amount: i64,
    #[serde(default)]
    pub notes: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RazorpayRefund {
    pub id: String,
    pub payment_id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[serde(default, deserialize_with = "notes_or_empty")]
    pub notes: HashMap<String, String>,
    pub created_at: i64,
}

// Razorpay sends an empty JSON *array* rather than an empty object when there are no notes.
fn notes_or_empty<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where D: serde::Deserializer<'de> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Notes {
        Map(HashMap<String, String>),
        List(Vec<serde_json::Value>),
    }
    match Notes::deserialize(deserializer)? {
        Notes::Map(m) => Ok(m),
        Notes::List(_) => Ok(HashMap::new()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn deserialize_order() {
        let json = r#"{
            "id": "order_IluGWxBm9U8zJ8",
            "entity": "order",
            "amount": 39500,
            "amount_paid": 0,
            "amount_due": 39500,
            "currency": "INR",
            "receipt": "ORD17000000000001234",
            "offer_id": null,
            "status": "created",
            "attempts": 0,
            "notes": {"order_id": "ORD17000000000001234", "buyer_id": "7"},
            "created_at": 1642662092
        }"#;
        let order: RazorpayOrder = serde_json::from_str(json).unwrap();
        assert_eq!(order.id, "order_IluGWxBm9U8zJ8");
        assert_eq!(order.amount, 39500);
        assert_eq!(order.status, "created");
        assert_eq!(order.notes.get("buyer_id").map(String::as_str), Some("7"));
    }

    #[test]
    fn deserialize_refund_with_empty_notes() {
        let json = r#"{
            "id": "rfnd_FP8QHiV938haTz",
            "entity": "refund",
            "amount": 50000,
            "receipt": null,
            "currency": "INR",
            "payment_id": "pay_29QQoUBi66xm2f",
            "notes": [],
            "status": "processed",
            "speed_processed": "normal",
            "created_at": 1597078866
        }"#;
        let refund: RazorpayRefund = serde_json::from_str(json).unwrap();
        assert_eq!(refund.payment_id, "pay_29QQoUBi66xm2f");
        assert_eq!(refund.amount, 50000);
        assert!(refund.notes.is_empty());
    }
}
