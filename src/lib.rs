//! # subject-mux
//!
//! Request/reply dispatch on top of publish/subscribe messaging.
//!
//! Handlers are registered by exact subject on a [`SubjectMux`]. Each inbound
//! message is routed to its handler together with a [`MessageResponder`] that
//! builds the single reply: a `Status` header (default `200`), an optional
//! `Description`, any other headers, and a payload.
//!
//! ## Architecture
//!
//! - **Mux** ([`handler`]): subject → handler table behind a reader/writer lock
//! - **Responder** ([`handler`]): per-request reply builder with at-most-one send
//! - **Transport** ([`transport`]): the [`Publisher`] seam plus an in-process [`LocalBus`]
//! - **Server** ([`Server`]): receive loop with bounded concurrent handlers
//!
//! ## Example
//!
//! ```ignore
//! use subject_mux::{LocalBus, Responder, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (bus, inbound) = LocalBus::with_defaults();
//!
//!     let server = Server::builder()
//!         .handle("echo", |mut res, msg| async move {
//!             res.respond(msg.payload.clone()).await
//!         })
//!         .serve(inbound, Arc::new(bus.publisher()));
//!
//!     server.wait_for_shutdown().await;
//! }
//! ```

pub mod error;
pub mod handler;
pub mod protocol;
pub mod transport;

mod server;

pub use error::{MuxError, Result};
pub use handler::{MessageResponder, Responder, SubjectMux};
pub use server::{Server, ServerBuilder, ServerConfig, DEFAULT_MAX_CONCURRENT_HANDLERS};
pub use transport::{BusConfig, LocalBus, Publisher};
