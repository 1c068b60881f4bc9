//! # SLICED server
//! The HTTP face of the platform. It is responsible for:
//! * Creating PIX deposit charges at the payment gateway and relaying their QR codes.
//! * Receiving payment webhooks, re-verifying every charge against the gateway, and handing the
//!   verified result to the wallet ledger.
//! * Pushing payment status updates to clients over a websocket.
//! * Exposing the wallet (balances, history, withdrawals) and the match money flows (entry
//!   charges, settlement nudges) over REST.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more
//! information.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod gateway;
pub mod routes;
pub mod server;
pub mod ws;

#[cfg(test)]
mod endpoint_tests;
