use log::*;
use mkt_common::Secret;

pub const DEFAULT_RAZORPAY_API_URL: &str = "https://api.razorpay.com/v1";

#[derive(Debug, Clone, Default)]
pub struct RazorpayConfig {
    pub api_url: String,
    /// The public key id. This is safe to hand to clients so that they can open the checkout form.
    pub key_id: String,
    pub key_secret: Secret<String>,
}

impl RazorpayConfig {
    pub fn new(key_id: &str, key_secret: &str) -> Self {
        Self {
            api_url: DEFAULT_RAZORPAY_API_URL.to_string(),
            key_id: key_id.to_string(),
            key_secret: Secret::new(key_secret.to_string()),
        }
    }

    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("MKT_RAZORPAY_API_URL").unwrap_or_else(|_| {
            debug!("MKT_RAZORPAY_API_URL not set, using {DEFAULT_RAZORPAY_API_URL}");
            DEFAULT_RAZORPAY_API_URL.to_string()
        });
        let key_id = std::env::var("MKT_RAZORPAY_KEY_ID").unwrap_or_else(|_| {
            warn!("MKT_RAZORPAY_KEY_ID not set. Payments will be unavailable.");
            String::default()
        });
        let key_secret = Secret::new(std::env::var("MKT_RAZORPAY_KEY_SECRET").unwrap_or_else(|_| {
            warn!("MKT_RAZORPAY_KEY_SECRET not set. Payments will be unavailable.");
            String::default()
        }));
        Self { api_url, key_id, key_secret }
    }

    /// Both halves of the key pair must be present before any gateway call is attempted.
    pub fn is_configured(&self) -> bool {
        !self.key_id.trim().is_empty() && !self.key_secret.is_empty()
    }
}
