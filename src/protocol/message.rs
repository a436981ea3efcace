//! Inbound request and outbound reply types.
//!
//! Uses `bytes::Bytes` for zero-copy payload sharing.
//!
//! # Example
//!
//! ```
//! use subject_mux::protocol::{Message, Reply};
//! use bytes::Bytes;
//!
//! let msg = Message::new("orders.create", Bytes::from_static(b"{}"))
//!     .with_reply("_INBOX.1");
//!
//! assert_eq!(msg.subject, "orders.create");
//! assert_eq!(msg.reply.as_deref(), Some("_INBOX.1"));
//!
//! let reply = Reply::new(msg.reply.clone());
//! assert_eq!(reply.reply_to.as_deref(), Some("_INBOX.1"));
//! ```

use bytes::Bytes;

use super::header::{HeaderMap, DESCRIPTION, STATUS};

/// A message delivered by the transport.
#[derive(Debug, Clone, Default)]
pub struct Message {
    /// Routing key.
    pub subject: String,
    /// Where a reply should be sent. `None` for one-way messages.
    pub reply: Option<String>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Opaque payload.
    pub payload: Bytes,
}

impl Message {
    /// Create a one-way message with no headers.
    pub fn new(subject: impl Into<String>, payload: Bytes) -> Self {
        Self {
            subject: subject.into(),
            reply: None,
            headers: HeaderMap::new(),
            payload,
        }
    }

    /// Set the reply target.
    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }

    /// Replace the headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// A reply addressed to the reply target of a request.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    /// Copied from the originating request's reply target.
    pub reply_to: Option<String>,
    /// Reply headers.
    pub headers: HeaderMap,
    /// Reply payload. Empty when the reply only carries headers.
    pub payload: Bytes,
}

impl Reply {
    /// Create an empty reply for the given target.
    pub fn new(reply_to: Option<String>) -> Self {
        Self {
            reply_to,
            headers: HeaderMap::new(),
            payload: Bytes::new(),
        }
    }

    /// Value of the `Status` header.
    #[inline]
    pub fn status(&self) -> Option<&str> {
        self.headers.get(STATUS)
    }

    /// Value of the `Description` header.
    #[inline]
    pub fn description(&self) -> Option<&str> {
        self.headers.get(DESCRIPTION)
    }
}
