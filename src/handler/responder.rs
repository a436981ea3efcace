//! Responder for handlers.
//!
//! A [`Responder`] builds up the single reply for one request:
//! - `set_status` - overwrite the `Status` header (defaults to `200`)
//! - `set_description` - overwrite the `Description` header
//! - `header` - direct access to the pending reply headers
//! - `respond` - attach the payload and hand the reply to the transport
//!
//! # Example
//!
//! ```ignore
//! async fn lookup(mut res: MessageResponder, msg: Arc<Message>) -> HandlerResult {
//!     if msg.payload.is_empty() {
//!         return error(&mut res, "empty key", 400).await;
//!     }
//!     res.header().insert("Cache", "miss");
//!     res.respond(msg.payload.clone()).await
//! }
//! ```

use std::sync::Arc;

use bytes::Bytes;

use super::BoxFuture;
use crate::error::{MuxError, Result};
use crate::protocol::{HeaderMap, Message, Reply, DESCRIPTION, STATUS};
use crate::transport::Publisher;

/// Status set on every reply until a handler overrides it.
pub const STATUS_OK: i64 = 200;

/// Status used by [`not_found`].
pub const STATUS_NOT_FOUND: i64 = 404;

/// Description used by [`not_found`].
pub const NOT_FOUND_DESCRIPTION: &str = "No messages";

/// Capabilities a handler uses to construct its reply.
pub trait Responder: Send {
    /// Set the `Status` header to the decimal form of `code`.
    ///
    /// Any value is accepted. The last call before `respond` wins.
    fn set_status(&mut self, code: i64);

    /// Set the `Description` header.
    fn set_description(&mut self, description: &str);

    /// Headers that will be sent with the reply.
    fn header(&mut self) -> &mut HeaderMap;

    /// Attach `data` as the reply payload and send the reply.
    ///
    /// Transport failures are returned as-is and leave the responder usable,
    /// so the send may be retried. Once a send succeeds, further calls fail
    /// with `AlreadyResponded`.
    fn respond(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>>;
}

/// The [`Responder`] handed to every handler invocation.
///
/// Owns the pending [`Reply`] exclusively; the originating request is shared
/// read-only.
pub struct MessageResponder {
    /// Originating request.
    request: Arc<Message>,
    /// Reply under construction.
    reply: Reply,
    /// Transport used to deliver the reply.
    publisher: Arc<dyn Publisher>,
    /// Set once the reply was handed to the publisher.
    responded: bool,
}

impl MessageResponder {
    /// Create a responder bound to `request`'s reply target.
    ///
    /// The reply starts with `Status: 200`. No I/O happens until `respond`.
    pub fn new(request: Arc<Message>, publisher: Arc<dyn Publisher>) -> Self {
        let mut reply = Reply::new(request.reply.clone());
        reply.headers.insert(STATUS, STATUS_OK.to_string());

        Self {
            request,
            reply,
            publisher,
            responded: false,
        }
    }

    /// The request this responder answers.
    #[inline]
    pub fn request(&self) -> &Message {
        &self.request
    }

    /// The reply as it would be sent right now.
    #[inline]
    pub fn pending(&self) -> &Reply {
        &self.reply
    }

    /// Whether a reply has been handed to the transport successfully.
    #[inline]
    pub fn has_responded(&self) -> bool {
        self.responded
    }
}

impl Responder for MessageResponder {
    fn set_status(&mut self, code: i64) {
        self.reply.headers.insert(STATUS, code.to_string());
    }

    fn set_description(&mut self, description: &str) {
        self.reply.headers.insert(DESCRIPTION, description);
    }

    fn header(&mut self) -> &mut HeaderMap {
        &mut self.reply.headers
    }

    fn respond(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.responded {
                return Err(MuxError::AlreadyResponded);
            }
            self.reply.payload = data;
            self.publisher.publish(self.reply.clone()).await?;
            self.responded = true;
            Ok(())
        })
    }
}

/// Respond with `code` and `description` and an empty payload.
///
/// Same as calling `set_status`, `set_description` and `respond` in turn.
pub async fn error<R>(responder: &mut R, description: &str, code: i64) -> Result<()>
where
    R: Responder + ?Sized,
{
    responder.set_status(code);
    responder.set_description(description);
    responder.respond(Bytes::new()).await
}

/// Fallback for subjects with no registration.
///
/// Responds `404` / `No messages` with an empty payload.
pub async fn not_found<R>(responder: &mut R, _msg: &Message) -> Result<()>
where
    R: Responder + ?Sized,
{
    error(responder, NOT_FOUND_DESCRIPTION, STATUS_NOT_FOUND).await
}
