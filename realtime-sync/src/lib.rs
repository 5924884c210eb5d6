//! Real-time synchronization server for two shared entity collections.
//!
//! Clients hold WebSocket connections and send JSON messages of the form
//! `{"action": "...", "payload": ...}`. Reads are answered to the asking
//! connection only; every other action ends with the full state of both
//! collections being pushed to every connection. Each module focuses on a
//! concrete responsibility:
//!
//! - [`model`] defines customers, items and the drafts clients submit.
//! - [`store`] keeps the two collections, each behind its own lock.
//! - [`message`] parses inbound messages and renders outbound bodies.
//! - [`dispatch`] applies a message to the store and picks its audience.
//! - [`broker`] routes bodies to per-connection FIFO queues.
//! - [`session`] couples one connection's inbound and outbound loops.
//! - [`server`] serves the WebSocket endpoint and a health check with axum.
//! - [`cli`] and [`client`] provide the command line and a terminal client.
//!
//! Integration tests use this crate directly to exercise the dispatcher and
//! a running server over real WebSockets.

pub mod broker;
pub mod cli;
pub mod client;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod model;
pub mod server;
pub mod session;
pub mod store;
