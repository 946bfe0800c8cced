//! Razorpay as the marketplace's [`PaymentGateway`].
use std::collections::HashMap;

use log::*;
use market_engine::{
    db_types::Money,
    traits::{GatewayOrder, GatewayRefund, NewGatewayOrder, PaymentGatewayError},
    PaymentGateway,
};
use mkt_common::Secret;
use razorpay_tools::{NewRazorpayOrder, NewRefund, RazorpayApi, RazorpayApiError, RazorpayConfig};

#[derive(Clone)]
pub struct RazorpayGateway {
    api: RazorpayApi,
}

impl RazorpayGateway {
    pub fn new(api: RazorpayApi) -> Self {
        Self { api }
    }

    /// Builds the gateway client once at start-up. Returns `None` if the credentials are missing, in which case the
    /// payment routes report that the gateway is unavailable.
    pub fn from_config(config: RazorpayConfig) -> Option<Self> {
        match RazorpayApi::new(config) {
            Ok(api) => {
                info!("💰️ Razorpay gateway configured with key {}", api.config().key_id);
                Some(Self::new(api))
            },
            Err(RazorpayApiError::NotConfigured) => {
                warn!("💰️ Razorpay is not configured. Payments are disabled.");
                None
            },
            Err(e) => {
                error!("💰️ Could not create the Razorpay client. Payments are disabled. {e}");
                None
            },
        }
    }
}

fn gateway_error(e: RazorpayApiError) -> PaymentGatewayError {
    match e {
        RazorpayApiError::NotConfigured => PaymentGatewayError::NotConfigured,
        RazorpayApiError::QueryError { status, message } if (400..500).contains(&status) => {
            PaymentGatewayError::Rejected(message)
        },
        e => PaymentGatewayError::CommunicationError(e.to_string()),
    }
}

impl PaymentGateway for RazorpayGateway {
    fn key_id(&self) -> String {
        self.api.config().key_id.clone()
    }

    fn key_secret(&self) -> Secret<String> {
        self.api.config().key_secret.clone()
    }

    async fn create_order(&self, order: NewGatewayOrder) -> Result<GatewayOrder, PaymentGatewayError> {
        let request = NewRazorpayOrder {
            amount: order.amount.value(),
            currency: order.currency,
            receipt: order.receipt,
            notes: order.notes,
        };
        let created = self.api.create_order(request).await.map_err(gateway_error)?;
        debug!("💰️ Razorpay order {} created. Status: {}", created.id, created.status);
        Ok(GatewayOrder {
            id: created.id,
            amount: Money::from(created.amount),
            currency: created.currency,
            receipt: created.receipt,
        })
    }

    async fn refund_payment(
        &self,
        gateway_payment_id: &str,
        amount: Money,
        notes: HashMap<String, String>,
    ) -> Result<GatewayRefund, PaymentGatewayError> {
        let request = NewRefund { amount: amount.value(), notes };
        let refund = self.api.refund_payment(gateway_payment_id, request).await.map_err(gateway_error)?;
        debug!("💰️ Razorpay refund {} is {}", refund.id, refund.status);
        Ok(GatewayRefund { id: refund.id, payment_id: refund.payment_id, amount: Money::from(refund.amount) })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unconfigured_gateway_is_none() {
        assert!(RazorpayGateway::from_config(RazorpayConfig::default()).is_none());
        let gateway = RazorpayGateway::from_config(RazorpayConfig::new("rzp_test_abc", "shh")).unwrap();
        assert_eq!(gateway.key_id(), "rzp_test_abc");
        assert_eq!(gateway.key_secret().reveal(), "shh");
    }

    #[test]
    fn client_errors_are_rejections() {
        let e = gateway_error(RazorpayApiError::QueryError { status: 400, message: "Amount exceeds".into() });
        assert!(matches!(e, PaymentGatewayError::Rejected(m) if m == "Amount exceeds"));
        let e = gateway_error(RazorpayApiError::QueryError { status: 502, message: "Bad gateway".into() });
        assert!(matches!(e, PaymentGatewayError::CommunicationError(_)));
        let e = gateway_error(RazorpayApiError::NotConfigured);
        assert!(matches!(e, PaymentGatewayError::NotConfigured));
    }
}
