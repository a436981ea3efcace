//! Transport module - the seam between the mux and a messaging system.
//!
//! Provides:
//! - [`Publisher`] - accepts replies for delivery to their reply target
//! - [`LocalBus`] - in-process request/reply transport

mod bus;

pub use bus::{
    BusConfig, BusPublisher, LocalBus, DEFAULT_CHANNEL_CAPACITY, DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_SEND_TIMEOUT_MS, INBOX_PREFIX,
};

use crate::error::Result;
use crate::handler::BoxFuture;
use crate::protocol::Reply;

/// Delivers replies to the reply target they carry.
pub trait Publisher: Send + Sync + 'static {
    /// Attempt delivery of `reply`.
    ///
    /// Fails with [`MuxError::NoReplyTarget`](crate::MuxError::NoReplyTarget)
    /// when the reply has no target.
    fn publish(&self, reply: Reply) -> BoxFuture<'_, Result<()>>;
}
