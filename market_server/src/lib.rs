//! # Marketplace server
//! This crate hosts the HTTP server for the farm marketplace. It is responsible for:
//! * Authenticating API calls with bearer JWTs, and gating admin-only routes.
//! * Translating REST calls into calls on the `market_engine` APIs, and shaping their results into JSON envelopes.
//! * Receiving payment webhooks from Razorpay and handing them to the payment reconciliation engine.
//! * Running the background worker that expires unpaid orders.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhooks/payments`: Signed Razorpay webhook deliveries.
//! * `/api/...`: The authenticated order, payment, catalog and admin routes. See [routes](routes/index.html).
pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
