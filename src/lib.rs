// SPDX-License-Identifier: Apache-2.0 OR MIT

//! cream: a networked, in-memory key-value cache server.
//!
//! Clients open a TCP connection, send one binary request, receive one
//! binary response, and the connection is closed. The store has a fixed
//! maximum entry count chosen at startup; once full, new insertions evict
//! existing entries by a deterministic rule rather than rejecting writes.
//!
//! # Architecture
//!
//! ```text
//! acceptor -> WorkQueue -> WorkerPool -> Store -> WorkerPool -> client
//! ```
//!
//! [`store`] and [`queue`] are the concurrency-critical core; [`protocol`]
//! and [`worker`] implement the wire framing and per-connection state
//! machine; [`config`] and [`server`] are the ambient wiring that make the
//! above into a runnable binary.

pub mod config;
pub mod protocol;
pub mod queue;
pub mod server;
pub mod store;
pub mod worker;

pub use config::Config;
pub use server::CreamServer;
pub use store::Store;
