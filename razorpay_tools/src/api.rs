use std::sync::Arc;

use log::*;
use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::RazorpayConfig,
    data_objects::{NewRazorpayOrder, NewRefund, RazorpayOrder, RazorpayRefund},
    RazorpayApiError,
};

#[derive(Clone)]
pub struct RazorpayApi {
    config: RazorpayConfig,
    client: Arc<Client>,
}

impl RazorpayApi {
    pub fn new(config: RazorpayConfig) -> Result<Self, RazorpayApiError> {
        if !config.is_configured() {
            return Err(RazorpayApiError::NotConfigured);
        }
        let client = Client::builder().build().map_err(|e| RazorpayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &RazorpayConfig {
        &self.config
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, RazorpayApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {method} {url}");
        let mut req = self
            .client
            .request(method, url)
            .basic_auth(&self.config.key_id, Some(self.config.key_secret.reveal()));
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| RazorpayApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| RazorpayApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| RazorpayApiError::RestResponseError(e.to_string()))?;
            Err(RazorpayApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url.trim_end_matches('/'))
    }

    /// Creates a gateway-side order. The buyer's checkout is opened against the returned order id.
    pub async fn create_order(&self, order: NewRazorpayOrder) -> Result<RazorpayOrder, RazorpayApiError> {
        debug!("Creating gateway order for receipt {} ({} {})", order.receipt, order.amount, order.currency);
        let result = self.rest_query::<RazorpayOrder, _>(Method::POST, "/orders", Some(order)).await?;
        info!("Created gateway order {}", result.id);
        Ok(result)
    }

    /// Refunds `refund.amount` (minor units) of a captured payment.
    pub async fn refund_payment(&self, payment_id: &str, refund: NewRefund) -> Result<RazorpayRefund, RazorpayApiError> {
        let path = format!("/payments/{payment_id}/refund");
        debug!("Refunding {} on payment {payment_id}", refund.amount);
        let result = self.rest_query::<RazorpayRefund, _>(Method::POST, &path, Some(refund)).await?;
        info!("Refund {} issued for payment {payment_id}", result.id);
        Ok(result)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unconfigured_client_is_refused() {
        let err = RazorpayApi::new(RazorpayConfig::default()).err().expect("Client should not be created");
        assert!(matches!(err, RazorpayApiError::NotConfigured));
    }

    #[test]
    fn url_building() {
        let mut config = RazorpayConfig::new("rzp_test_key", "secret");
        config.api_url = "http://localhost:9999/v1/".into();
        let api = RazorpayApi::new(config).unwrap();
        assert_eq!(api.url("/orders"), "http://localhost:9999/v1/orders");
        assert_eq!(api.url("/payments/pay_1/refund"), "http://localhost:9999/v1/payments/pay_1/refund");
    }
}
