//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution:
//!
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use market_engine::{
    db_types::{NewUser, OrderId, Role},
    order_objects::{CancelOrderRequest, UpdateStatusRequest},
    payment_objects::{CreatePaymentOrderRequest, RefundRequest, VerifyPaymentRequest, WebhookOutcome},
    traits::{MarketplaceDatabase, MarketplaceError, PaymentGateway},
    AccountApi,
    CatalogApi,
    OrderFlowApi,
    PaymentApi,
};

use crate::{
    auth::JwtClaims,
    data_objects::{
        ApiResponse,
        AvailabilityRequest,
        ListProductRequest,
        PlaceOrderRequest,
        RejectProductRequest,
        WebhookAck,
    },
    errors::ServerError,
};

/// The header that carries the hex HMAC-SHA256 of a webhook body.
pub const WEBHOOK_SIGNATURE_HEADER: &str = "X-Razorpay-Signature";

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl MarketplaceDatabase);
/// Route handler for placing an order
///
/// Buyers place orders for themselves. The prices, totals and seller details are all worked out by the engine from the
/// live catalog, so the body only names products and quantities.
pub async fn create_order<B: MarketplaceDatabase>(
    claims: JwtClaims,
    body: web::Json<PlaceOrderRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST create order for user #{}", claims.sub);
    let request = body.into_inner().into_order_request(claims.sub);
    let order = api.create_order(&claims.caller(), request).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(order).with_message("Order placed")))
}

route!(my_orders => Get "/orders" impl MarketplaceDatabase);
/// Route handler for the orders endpoint
///
/// Authenticated users fetch their own orders, newest first.
pub async fn my_orders<B: MarketplaceDatabase>(
    claims: JwtClaims,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my_orders for user #{}", claims.sub);
    let orders = api.orders_for_buyer(&claims.caller(), claims.sub).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(orders)))
}

route!(order_by_id => Get "/orders/{order_id}" impl MarketplaceDatabase);
/// Fetches a single order, with its line items and timeline. Only the buyer and admins may see it.
pub async fn order_by_id<B: MarketplaceDatabase>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order [{order_id}] for user #{}", claims.sub);
    let order = api.fetch_order(&claims.caller(), &order_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(order)))
}

route!(update_order_status => Put "/orders/{order_id}/status" impl MarketplaceDatabase);
pub async fn update_order_status<B: MarketplaceDatabase>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    body: web::Json<UpdateStatusRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let request = body.into_inner();
    debug!("💻️ PUT order [{order_id}] status to {} by user #{}", request.status, claims.sub);
    let order = api.update_order_status(&claims.caller(), &order_id, request).await?;
    let message = format!("Order status updated to {}", order.order.status);
    Ok(HttpResponse::Ok().json(ApiResponse::success(order).with_message(message)))
}

route!(cancel_order => Post "/orders/{order_id}/cancel" impl MarketplaceDatabase);
/// Cancels an order and puts its stock back on sale. The body, with an optional `reason`, may be omitted.
pub async fn cancel_order<B: MarketplaceDatabase>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    body: Option<web::Json<CancelOrderRequest>>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let reason = body.and_then(|b| b.into_inner().reason);
    debug!("💻️ POST cancel order [{order_id}] by user #{}", claims.sub);
    let order = api.cancel_order(&claims.caller(), &order_id, reason).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(order).with_message("Order cancelled")))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(create_payment_order => Post "/payments/create-order" impl MarketplaceDatabase, PaymentGateway);
/// Creates the gateway order that the buyer's checkout pays against. The response carries everything the client
/// needs to open the checkout form.
pub async fn create_payment_order<B, G>(
    claims: JwtClaims,
    body: web::Json<CreatePaymentOrderRequest>,
    api: web::Data<PaymentApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    let request = body.into_inner();
    debug!("💻️ POST create payment order for [{}] by user #{}", request.order_id, claims.sub);
    let response = api.create_payment_order(&claims.caller(), request).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

route!(verify_payment => Post "/payments/verify" impl MarketplaceDatabase, PaymentGateway);
/// The checkout callback. The signature is checked before anything is recorded, and repeating a successful call is
/// harmless.
pub async fn verify_payment<B, G>(
    claims: JwtClaims,
    body: web::Json<VerifyPaymentRequest>,
    api: web::Data<PaymentApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    let request = body.into_inner();
    debug!("💻️ POST verify payment for [{}] by user #{}", request.order_id, claims.sub);
    let order = api.verify_payment(&claims.caller(), request).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(order).with_message("Payment verified")))
}

route!(refund_payment => Post "/payments/{order_id}/refund" impl MarketplaceDatabase, PaymentGateway where requires [Role::Admin]);
pub async fn refund_payment<B, G>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    body: Option<web::Json<RefundRequest>>,
    api: web::Data<PaymentApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    let order_id = path.into_inner();
    let reason = body.and_then(|b| b.into_inner().reason);
    info!("💻️ POST refund for order [{order_id}] by admin #{}", claims.sub);
    let order = api.refund_payment(&claims.caller(), &order_id, reason).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(order).with_message("Payment refunded")))
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(payment_webhook => Post "/webhooks/payments" impl MarketplaceDatabase, PaymentGateway);
/// Receives Razorpay webhook deliveries.
///
/// The signature in the `X-Razorpay-Signature` header is checked against the raw body, so the body must not be
/// parsed before it is handed to the engine. Once the signature checks out, the delivery is always acknowledged,
/// even if the event could not be applied. Razorpay would otherwise keep retrying an event that can never succeed.
pub async fn payment_webhook<B, G>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<PaymentApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    trace!("💻️ Received payment webhook ({} bytes)", body.len());
    let signature = req.headers().get(WEBHOOK_SIGNATURE_HEADER).and_then(|v| v.to_str().ok()).ok_or_else(|| {
        debug!("💻️ Webhook delivery without a signature rejected");
        MarketplaceError::InvalidSignature
    })?;
    match api.handle_webhook(body.as_ref(), signature).await? {
        WebhookOutcome::Failed(reason) => warn!("💻️ Webhook acknowledged, but not applied. {reason}"),
        outcome => debug!("💻️ Webhook processed. {outcome:?}"),
    }
    Ok(HttpResponse::Ok().json(WebhookAck { success: true }))
}

//----------------------------------------------   Catalog  ----------------------------------------------------
route!(list_product => Post "/products" impl MarketplaceDatabase where requires [Role::Farmer, Role::Admin]);
/// Lists a new product. New products must be approved by an admin before they can be ordered.
pub async fn list_product<B: MarketplaceDatabase>(
    claims: JwtClaims,
    body: web::Json<ListProductRequest>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST new product by user #{}", claims.sub);
    let product = body.into_inner().into_new_product(claims.sub);
    let product = api.create_product(&claims.caller(), product).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(product).with_message("Product submitted for approval")))
}

route!(product_by_id => Get "/products/{id}" impl MarketplaceDatabase);
pub async fn product_by_id<B: MarketplaceDatabase>(
    path: web::Path<i64>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    trace!("💻️ GET product #{id}");
    let product = api.fetch_product(id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("Product #{id}")))?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(product)))
}

route!(set_availability => Patch "/products/{id}/availability" impl MarketplaceDatabase where requires [Role::Farmer, Role::Admin]);
pub async fn set_availability<B: MarketplaceDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<AvailabilityRequest>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let is_available = body.is_available;
    debug!("💻️ PATCH product #{id} availability to {is_available} by user #{}", claims.sub);
    let product = api.set_availability(&claims.caller(), id, is_available).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(product)))
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(approve_product => Patch "/admin/products/{id}/approve" impl MarketplaceDatabase where requires [Role::Admin]);
pub async fn approve_product<B: MarketplaceDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let product = api.approve_product(&claims.caller(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(product).with_message("Product approved")))
}

route!(reject_product => Patch "/admin/products/{id}/reject" impl MarketplaceDatabase where requires [Role::Admin]);
pub async fn reject_product<B: MarketplaceDatabase>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<RejectProductRequest>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let reason = body.into_inner().reason;
    let product = api.reject_product(&claims.caller(), path.into_inner(), reason).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(product).with_message("Product rejected")))
}

route!(create_user => Post "/admin/users" impl MarketplaceDatabase where requires [Role::Admin]);
/// Creates a user account. Buyers and farmers normally sign up through the account service; this route lets admins
/// create accounts directly.
pub async fn create_user<B: MarketplaceDatabase>(
    claims: JwtClaims,
    body: web::Json<NewUser>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user = body.into_inner();
    info!("💻️ POST new {} account ({}) by admin #{}", user.role, user.email, claims.sub);
    let user = api.create_user(user).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(user)))
}
