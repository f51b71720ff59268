//! # Farm order server
//! The HTTP front door of the farm order engine. It is responsible for:
//! * Taking checkouts, amendments and remainder payments from the storefront.
//! * Receiving payment outcomes from the payment provider's webhook.
//! * Admin transitions (lock, ready for pickup, completed, cancel), refunds and inventory administration.
//! * Running the forfeiture and reminder sweep on a fixed cadence, and on demand.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/orders`, `/orders/{order_number}/...`: The order lifecycle.
//! * `/payments/refund`: Refunds a completed payment.
//! * `/inventory`, `/discount_codes`: Inventory and discount code administration.
//! * `/scheduler/sweep`, `/integrity`: Manual sweep trigger and the integrity report.
//! * `/webhooks/payment`: Payment outcomes from the provider. HMAC-checked.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod forfeiture_worker;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
