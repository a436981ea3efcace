//! Protocol module - messages, replies and headers.
//!
//! This module defines the data exchanged with the transport:
//! - [`Message`] - inbound request (subject, reply target, headers, payload)
//! - [`Reply`] - outbound reply addressed to a request's reply target
//! - [`HeaderMap`] - ordered multi-value headers

mod header;
mod message;

pub use header::{HeaderMap, DESCRIPTION, STATUS};
pub use message::{Message, Reply};
