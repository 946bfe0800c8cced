use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use market_engine::{
    events::EventProducers,
    AccountApi,
    CatalogApi,
    OrderFlowApi,
    PaymentApi,
    PaymentGateway,
    SqliteDatabase,
};

use crate::{
    auth::TokenValidator,
    config::ServerConfig,
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    integrations::{notifications::create_notification_handlers, razorpay::RazorpayGateway},
    middleware::JwtMiddlewareFactory,
    routes::{
        health,
        ApproveProductRoute,
        CancelOrderRoute,
        CreateOrderRoute,
        CreatePaymentOrderRoute,
        CreateUserRoute,
        ListProductRoute,
        MyOrdersRoute,
        OrderByIdRoute,
        PaymentWebhookRoute,
        ProductByIdRoute,
        RefundPaymentRoute,
        RejectProductRoute,
        SetAvailabilityRoute,
        UpdateOrderStatusRoute,
        VerifyPaymentRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🗃️ Connected to {}", config.database_url);
    let handlers = create_notification_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;
    if config.expiry_worker_enabled {
        let _ = start_expiry_worker(db.clone(), producers.clone(), config.unpaid_order_timeout);
    } else {
        warn!("🕰️ The unpaid order expiry worker is disabled. Unpaid orders will hold their stock indefinitely.");
    }
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let gateway = RazorpayGateway::from_config(config.razorpay.clone());
    if gateway.is_none() {
        warn!("💰️ Razorpay is not configured. Payment requests will be refused with 503 until it is.");
    }
    let (host, port) = (config.host.clone(), config.port);
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mkt::access_log"))
            .configure(|cfg| configure_app(cfg, &config, db.clone(), gateway.clone(), producers.clone()))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

/// Registers the API state and every route on `cfg`.
///
/// Everything under `/api` requires a bearer token. The health check and the webhook receiver are public; webhooks
/// authenticate themselves with their signature instead.
pub fn configure_app<G>(
    cfg: &mut web::ServiceConfig,
    config: &ServerConfig,
    db: SqliteDatabase,
    gateway: Option<G>,
    producers: EventProducers,
) where
    G: PaymentGateway + 'static,
{
    let orders_api = OrderFlowApi::new(db.clone(), producers.clone()).with_currency(config.currency.as_str());
    let payments_api =
        PaymentApi::new(db.clone(), gateway, producers).with_webhook_secret(config.webhook_secret.clone());
    let accounts_api = AccountApi::new(db.clone());
    let catalog_api = CatalogApi::new(db);
    let validator = TokenValidator::new(&config.auth);
    let auth_scope = web::scope("/api")
        .wrap(JwtMiddlewareFactory::new(validator))
        .service(MyOrdersRoute::<SqliteDatabase>::new())
        .service(CreateOrderRoute::<SqliteDatabase>::new())
        .service(OrderByIdRoute::<SqliteDatabase>::new())
        .service(UpdateOrderStatusRoute::<SqliteDatabase>::new())
        .service(CancelOrderRoute::<SqliteDatabase>::new())
        .service(CreatePaymentOrderRoute::<SqliteDatabase, G>::new())
        .service(VerifyPaymentRoute::<SqliteDatabase, G>::new())
        .service(RefundPaymentRoute::<SqliteDatabase, G>::new())
        .service(ListProductRoute::<SqliteDatabase>::new())
        .service(ProductByIdRoute::<SqliteDatabase>::new())
        .service(SetAvailabilityRoute::<SqliteDatabase>::new())
        .service(ApproveProductRoute::<SqliteDatabase>::new())
        .service(RejectProductRoute::<SqliteDatabase>::new())
        .service(CreateUserRoute::<SqliteDatabase>::new());
    cfg.app_data(json_config())
        .app_data(path_config())
        .app_data(web::Data::new(orders_api))
        .app_data(web::Data::new(payments_api))
        .app_data(web::Data::new(accounts_api))
        .app_data(web::Data::new(catalog_api))
        .service(health)
        .service(PaymentWebhookRoute::<SqliteDatabase, G>::new())
        .service(auth_scope);
}

/// Malformed JSON bodies are reported in the same envelope as every other error.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        debug!("💻️ Rejected request body. {message}");
        ServerError::InvalidRequestBody(message).into()
    })
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        debug!("💻️ Rejected request path. {message}");
        ServerError::InvalidRequestPath(message).into()
    })
}
