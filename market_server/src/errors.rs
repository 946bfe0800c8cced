use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use market_engine::MarketplaceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    Marketplace(#[from] MarketplaceError),
}

impl ServerError {
    /// The message that is sent to the client. Internal errors are logged, but never leaked.
    fn public_message(&self) -> String {
        match self.status_code() {
            StatusCode::INTERNAL_SERVER_ERROR => {
                error!("💻️ Internal error: {self}");
                "An internal server error occurred. Please try again later.".to_string()
            },
            _ => self.to_string(),
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::UNAUTHORIZED,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Marketplace(e) => marketplace_status_code(e),
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "success": false, "error": self.public_message() }).to_string())
    }
}

fn marketplace_status_code(e: &MarketplaceError) -> StatusCode {
    use MarketplaceError::*;
    match e {
        ValidationError(_) |
        ProductUnavailable(_) |
        InsufficientStock { .. } |
        PriceChanged(_) |
        InvalidStatusTransition { .. } |
        OrderModificationNoOp |
        InvalidState(_) |
        AlreadyPaid(_) |
        MissingPayment(_) |
        InvalidSignature |
        InvalidWebhookPayload(_) => StatusCode::BAD_REQUEST,
        Forbidden(_) => StatusCode::FORBIDDEN,
        ProductNotFound(_) | UserNotFound(_) | OrderNotFound(_) | GatewayReferenceNotFound(_) => StatusCode::NOT_FOUND,
        PaymentGatewayUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        GatewayError(_) => StatusCode::BAD_GATEWAY,
        DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No bearer token was provided.")]
    MissingToken,
    #[error("Access token is invalid or has expired. {0}")]
    ValidationError(String),
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
}

#[cfg(test)]
mod test {
    use market_engine::db_types::{OrderId, OrderStatus};

    use super::*;

    #[test]
    fn marketplace_errors_map_to_http_codes() {
        let code = |e: MarketplaceError| ServerError::from(e).status_code();
        assert_eq!(code(MarketplaceError::InsufficientStock { product_id: 1, requested: 3, available: 2 }), 400);
        assert_eq!(
            code(MarketplaceError::InvalidStatusTransition { from: OrderStatus::Shipped, to: OrderStatus::Pending }),
            400
        );
        assert_eq!(code(MarketplaceError::InvalidSignature), 400);
        assert_eq!(code(MarketplaceError::Forbidden("nope".into())), 403);
        assert_eq!(code(MarketplaceError::OrderNotFound(OrderId::from("ORD1"))), 404);
        assert_eq!(code(MarketplaceError::PaymentGatewayUnavailable), 503);
        assert_eq!(code(MarketplaceError::GatewayError("timeout".into())), 502);
        assert_eq!(code(MarketplaceError::DatabaseError("disk full".into())), 500);
        assert_eq!(ServerError::from(AuthError::MissingToken).status_code(), 401);
        assert_eq!(ServerError::NoRecordFound("Product #4".into()).status_code(), 404);
        assert_eq!(ServerError::InitializeError("no database".into()).status_code(), 500);
    }

    #[test]
    fn internal_errors_are_not_leaked() {
        let err = ServerError::from(MarketplaceError::DatabaseError("no such table: orders".into()));
        assert!(!err.public_message().contains("orders"));
        let err = ServerError::from(MarketplaceError::ValidationError("Quantity must be positive".into()));
        assert!(err.public_message().contains("Quantity must be positive"));
    }
}
