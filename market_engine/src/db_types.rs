//! Data types shared between the engine APIs and the database backends.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
pub use mkt_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

use crate::helpers::generate_order_id;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConversionError("Order id cannot be empty".into()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderId {
    /// Creates a fresh, human-readable order id of the form `ORD<utc millis><4 random digits>`.
    pub fn generate() -> Self {
        Self(generate_order_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------     OrderStatus       ---------------------------------------------------------
/// The fulfilment state of an order.
///
/// Valid transitions are:
///
/// | From \ To  | Confirmed | Processing | Shipped | Delivered | Cancelled |
/// |------------|-----------|------------|---------|-----------|-----------|
/// | Pending    | ✓         | ✓          |         |           | ✓         |
/// | Confirmed  |           | ✓          | ✓       |           | ✓         |
/// | Processing |           |            | ✓       |           | ✓         |
/// | Shipped    |           |            |         | ✓         |           |
///
/// `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum OrderStatus {
    /// The order has been placed, but payment has not been confirmed.
    Pending,
    /// Payment has been confirmed.
    Confirmed,
    /// The seller is preparing the order.
    Processing,
    Shipped,
    Delivered,
    /// The order was cancelled by the buyer, an admin, a refund or the expiry worker.
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    pub fn allowed_transitions(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Confirmed, Processing, Cancelled],
            Confirmed => &[Processing, Shipped, Cancelled],
            Processing => &[Shipped, Cancelled],
            Shipped => &[Delivered],
            Delivered | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Confirmed => write!(f, "Confirmed"),
            Self::Processing => write!(f, "Processing"),
            Self::Shipped => write!(f, "Shipped"),
            Self::Delivered => write!(f, "Delivered"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Confirmed" => Ok(Self::Confirmed),
            "Processing" => Ok(Self::Processing),
            "Shipped" => Ok(Self::Shipped),
            "Delivered" => Ok(Self::Delivered),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------    PaymentStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// A payment can be captured for the first time, or after an earlier attempt failed.
    pub fn can_be_marked_paid(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Paid => write!(f, "Paid"),
            Self::Failed => write!(f, "Failed"),
            Self::Refunded => write!(f, "Refunded"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Failed" => Ok(Self::Failed),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------    ProductStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum ProductStatus {
    /// Awaiting moderation
    Pending,
    Approved,
    Rejected,
}

impl Display for ProductStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Approved => write!(f, "Approved"),
            Self::Rejected => write!(f, "Rejected"),
        }
    }
}

//--------------------------------------         Role          ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum Role {
    Buyer,
    Farmer,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buyer => write!(f, "Buyer"),
            Self::Farmer => write!(f, "Farmer"),
            Self::Admin => write!(f, "Admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buyer" => Ok(Self::Buyer),
            "farmer" => Ok(Self::Farmer),
            "admin" => Ok(Self::Admin),
            _ => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid role: {value}. But this conversion cannot fail. Defaulting to Buyer");
            Role::Buyer
        })
    }
}

//--------------------------------------        Caller         ---------------------------------------------------------
/// The authenticated identity on whose behalf an engine operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: i64,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn admin(user_id: i64) -> Self {
        Self { user_id, role: Role::Admin }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// True if the caller is `user_id`, or an admin.
    pub fn is_self_or_admin(&self, user_id: i64) -> bool {
        self.is_admin() || self.user_id == user_id
    }
}

//--------------------------------------     UserAccount       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    /// Seller aggregate: number of live orders that include at least one of this seller's products.
    pub total_orders: i64,
    /// Seller aggregate: units sold across live orders.
    pub total_sales: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
}

impl NewUser {
    pub fn new<S: Into<String>>(name: S, email: S, role: Role) -> Self {
        Self { name: name.into(), email: email.into(), phone: None, role }
    }

    pub fn with_phone<S: Into<String>>(mut self, phone: S) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

//--------------------------------------       Product         ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub seller_id: i64,
    pub name: String,
    pub image: Option<String>,
    pub farm_name: Option<String>,
    pub price: Money,
    pub stock: i64,
    /// Cumulative units sold across live orders
    pub sales: i64,
    pub status: ProductStatus,
    pub is_available: bool,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_purchasable(&self) -> bool {
        self.status == ProductStatus::Approved && self.is_available
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub seller_id: i64,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub farm_name: Option<String>,
    pub price: Money,
    pub stock: i64,
}

impl NewProduct {
    pub fn new<S: Into<String>>(seller_id: i64, name: S, price: Money, stock: i64) -> Self {
        Self { seller_id, name: name.into(), image: None, farm_name: None, price, stock }
    }

    pub fn with_farm_name<S: Into<String>>(mut self, farm: S) -> Self {
        self.farm_name = Some(farm.into());
        self
    }
}

//--------------------------------------   ShippingAddress     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
}

fn default_country() -> String {
    "India".to_string()
}

impl ShippingAddress {
    /// Returns the names of required fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("full_name", &self.full_name),
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
            ("postal_code", &self.postal_code),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect()
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub buyer_id: i64,
    pub buyer_name: String,
    pub buyer_email: String,
    pub buyer_phone: Option<String>,
    pub shipping_address: Json<ShippingAddress>,
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub total_amount: Money,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub payment_id: Option<String>,
    pub refund_id: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       LineItem        ---------------------------------------------------------
/// A snapshot of a product at the time the order was placed. Line items are never recomputed from the catalog.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LineItem {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: i64,
    pub seller_id: i64,
    pub product_name: String,
    pub product_image: Option<String>,
    pub farm_name: Option<String>,
    pub unit_price: Money,
    pub quantity: i64,
    pub line_total: Money,
}

#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub product_id: i64,
    pub seller_id: i64,
    pub product_name: String,
    pub product_image: Option<String>,
    pub farm_name: Option<String>,
    pub unit_price: Money,
    pub quantity: i64,
}

impl NewLineItem {
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        Self {
            product_id: product.id,
            seller_id: product.seller_id,
            product_name: product.name.clone(),
            product_image: product.image.clone(),
            farm_name: product.farm_name.clone(),
            unit_price: product.price,
            quantity,
        }
    }

    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

//--------------------------------------    LogisticsEntry     ---------------------------------------------------------
/// One entry of an order's append-only logistics timeline.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LogisticsEntry {
    pub id: i64,
    pub order_id: OrderId,
    pub status: String,
    pub description: String,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub const ORDER_PLACED: &str = "Order Placed";
pub const PAYMENT_CONFIRMED: &str = "Payment Confirmed";
pub const PAYMENT_FAILED: &str = "Payment Failed";
pub const PAYMENT_REFUNDED: &str = "Payment Refunded";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLogisticsEntry {
    pub status: String,
    pub description: String,
    pub location: Option<String>,
}

impl NewLogisticsEntry {
    pub fn new<S: Into<String>>(status: S, description: S) -> Self {
        Self { status: status.into(), description: description.into(), location: None }
    }

    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }

    pub fn order_placed() -> Self {
        Self::new(ORDER_PLACED, "Your order has been placed successfully")
    }

    pub fn payment_confirmed() -> Self {
        Self::new(PAYMENT_CONFIRMED, "Payment received and order confirmed")
    }

    pub fn payment_failed(reason: &str) -> Self {
        Self::new(PAYMENT_FAILED.to_string(), format!("Payment failed: {reason}"))
    }

    /// `order_cancelled` is set when the refund also cancelled the order.
    pub fn payment_refunded(reason: &str, order_cancelled: bool) -> Self {
        let description = if order_cancelled {
            format!("Payment refunded and order cancelled: {reason}")
        } else {
            format!("Payment refunded: {reason}")
        };
        Self::new(PAYMENT_REFUNDED.to_string(), description)
    }

    pub fn cancelled(reason: &str) -> Self {
        Self::new(OrderStatus::Cancelled.to_string(), format!("Order cancelled: {reason}"))
    }

    /// The default entry for a fulfilment status change, e.g. "Shipped".
    pub fn for_status(status: OrderStatus, description: Option<String>, location: Option<String>) -> Self {
        let description = description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("Order status updated to {status}"));
        Self { status: status.to_string(), description, location }
    }
}

//--------------------------------------      FullOrder        ---------------------------------------------------------
/// An order together with its line items and logistics timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullOrder {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<LineItem>,
    pub timeline: Vec<LogisticsEntry>,
}

impl FullOrder {
    pub fn order_id(&self) -> &OrderId {
        &self.order.order_id
    }

    /// Number of timeline entries with the given status label.
    pub fn timeline_count(&self, status: &str) -> usize {
        self.timeline.iter().filter(|e| e.status == status).count()
    }
}

//--------------------------------------       NewOrder        ---------------------------------------------------------
/// A fully priced order, ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub buyer_id: i64,
    pub buyer_name: String,
    pub buyer_email: String,
    pub buyer_phone: Option<String>,
    pub shipping_address: ShippingAddress,
    pub items: Vec<NewLineItem>,
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub total_amount: Money,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------    Payment records    ---------------------------------------------------------
/// The identifiers recorded when a payment is captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentCapture {
    pub gateway_payment_id: String,
    /// Our own reference for the payment
    pub payment_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundRecord {
    pub refund_id: Option<String>,
    pub reason: String,
}
