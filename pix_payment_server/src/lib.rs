//! # PIX payment server
//! This crate hosts the HTTP front end of the PIX payment engine. It is responsible for:
//! * Creating PIX charges for storefront orders and handing back the QR code.
//! * Answering payment status checks from clients.
//! * Receiving payment notifications from the processor and feeding them to the reconciler.
//! * Pushing payment updates to connected clients over a WebSocket.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `POST /api/generate-pix`: Create a PIX charge. Also served at `/api/criar-pagamento` and `/criar-pagamento`.
//! * `GET /api/check-payment/{id}`: The status of a payment. Polled by clients.
//! * `GET /api/payment-status/{id}`: Ask the processor for the status of a payment.
//! * `GET /api/payments/{id}`: The stored payment record.
//! * `POST /api/webhook`: Processor notifications. Signed with `PIX_WEBHOOK_SECRET`.
//! * `POST /api/print-order`: Send an order straight to the printer.
//! * `POST /api/generate-pix-dev` and `POST /api/dev-approve/{id}`: Simulated payments, for development.
//! * `/ws`: The real-time channel.
pub mod cli;
pub mod config;
pub mod errors;

pub mod data_objects;
pub mod helpers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod webhook_routes;
pub mod ws;

#[cfg(test)]
mod endpoint_tests;
