//! Handler module - subject routing and reply construction.
//!
//! Provides:
//! - [`SubjectMux`] - maps exact subjects to handlers
//! - [`Responder`] / [`MessageResponder`] - lets handlers set status, headers and respond
//! - [`error`] / [`not_found`] - one-call error replies
//!
//! # Example
//!
//! ```ignore
//! use subject_mux::handler::{error, Responder, SubjectMux};
//!
//! let mux = SubjectMux::new();
//!
//! mux.handle_func("users.get", |mut res, msg| async move {
//!     if msg.payload.is_empty() {
//!         return error(&mut res, "missing user id", 400).await;
//!     }
//!     res.set_description("found");
//!     res.respond(msg.payload.clone()).await
//! });
//! ```

mod mux;
mod responder;

pub use mux::{BoxFuture, FnHandler, Handler, HandlerResult, MsgHandler, SubjectMux};
pub use responder::{
    error, not_found, MessageResponder, Responder, NOT_FOUND_DESCRIPTION, STATUS_NOT_FOUND,
    STATUS_OK,
};
