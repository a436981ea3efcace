//! In-process request/reply bus.
//!
//! [`LocalBus`] plays the role of a pub/sub connection inside one process.
//! Requests get a unique inbox as their reply target; replies published to
//! that inbox complete the waiting request.
//!
//! # Architecture
//!
//! ```text
//! request() ─► mpsc::Sender<Message> ─► Server ─► handler
//!    ▲                                               │
//!    └──── oneshot (inbox) ◄── BusPublisher ◄────────┘
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};

use super::Publisher;
use crate::error::{MuxError, Result};
use crate::handler::BoxFuture;
use crate::protocol::{HeaderMap, Message, Reply};

/// Default inbound channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default time to wait for room on a full inbound channel.
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 5_000;

/// Default time a request waits for its reply.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Prefix of generated reply targets.
pub const INBOX_PREFIX: &str = "_INBOX.";

/// Configuration for [`LocalBus`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Capacity of the inbound message channel.
    pub channel_capacity: usize,
    /// Timeout when the inbound channel is full.
    pub send_timeout_ms: u64,
    /// Timeout for a request waiting on its reply.
    pub request_timeout_ms: u64,
}

impl BusConfig {
    /// Parse a JSON config; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[inline]
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    #[inline]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

/// Requests waiting on a reply, by inbox.
type Inboxes = Mutex<HashMap<String, oneshot::Sender<Reply>>>;

fn lock(inboxes: &Inboxes) -> MutexGuard<'_, HashMap<String, oneshot::Sender<Reply>>> {
    inboxes.lock().unwrap_or_else(PoisonError::into_inner)
}

struct BusInner {
    /// Inbound side, drained by the server.
    tx: mpsc::Sender<Message>,
    inboxes: Arc<Inboxes>,
    next_inbox: AtomicU64,
    config: BusConfig,
}

/// Removes an inbox when its request finishes or is dropped.
struct InboxGuard<'a> {
    inboxes: &'a Inboxes,
    inbox: String,
}

impl Drop for InboxGuard<'_> {
    fn drop(&mut self) {
        lock(self.inboxes).remove(&self.inbox);
    }
}

/// Handle to an in-process bus.
///
/// Cheaply cloneable. Every clone feeds the same inbound channel.
#[derive(Clone)]
pub struct LocalBus {
    inner: Arc<BusInner>,
}

impl LocalBus {
    /// Create a bus and the receiver for its inbound messages.
    pub fn new(config: BusConfig) -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));

        let bus = Self {
            inner: Arc::new(BusInner {
                tx,
                inboxes: Arc::new(Mutex::new(HashMap::new())),
                next_inbox: AtomicU64::new(1),
                config,
            }),
        };

        (bus, rx)
    }

    /// Create a bus with default configuration.
    pub fn with_defaults() -> (Self, mpsc::Receiver<Message>) {
        Self::new(BusConfig::default())
    }

    /// The configuration this bus was created with.
    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    /// Number of requests still waiting on a reply.
    pub fn pending_requests(&self) -> usize {
        lock(&self.inner.inboxes).len()
    }

    /// Send a one-way message.
    pub async fn publish(&self, subject: &str, headers: HeaderMap, payload: Bytes) -> Result<()> {
        self.send(Message::new(subject, payload).with_headers(headers))
            .await
    }

    /// Send a request and wait for its reply.
    pub async fn request(&self, subject: &str, headers: HeaderMap, payload: Bytes) -> Result<Reply> {
        let inbox = format!(
            "{}{}",
            INBOX_PREFIX,
            self.inner.next_inbox.fetch_add(1, Ordering::Relaxed)
        );

        let (reply_tx, reply_rx) = oneshot::channel();
        lock(&self.inner.inboxes).insert(inbox.clone(), reply_tx);
        let _guard = InboxGuard {
            inboxes: &self.inner.inboxes,
            inbox: inbox.clone(),
        };

        let msg = Message::new(subject, payload)
            .with_reply(inbox)
            .with_headers(headers);
        self.send(msg).await?;

        match tokio::time::timeout(self.inner.config.request_timeout(), reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(MuxError::ConnectionClosed),
            Err(_) => Err(MuxError::RequestTimeout(subject.to_string())),
        }
    }

    /// Push a message onto the inbound channel, waiting up to the send timeout.
    async fn send(&self, msg: Message) -> Result<()> {
        match tokio::time::timeout(self.inner.config.send_timeout(), self.inner.tx.send(msg)).await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(MuxError::ConnectionClosed),
            Err(_) => Err(MuxError::SendTimeout),
        }
    }

    /// Publisher that delivers replies to this bus's waiting requests.
    ///
    /// Holds no reference to the inbound channel, so dropping every
    /// `LocalBus` clone still closes it.
    pub fn publisher(&self) -> BusPublisher {
        BusPublisher {
            inboxes: self.inner.inboxes.clone(),
        }
    }
}

/// Reply side of a [`LocalBus`].
#[derive(Clone)]
pub struct BusPublisher {
    inboxes: Arc<Inboxes>,
}

impl Publisher for BusPublisher {
    fn publish(&self, reply: Reply) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let target = reply.reply_to.clone().ok_or(MuxError::NoReplyTarget)?;

            let waiter = lock(&self.inboxes).remove(&target);
            match waiter {
                Some(tx) => tx
                    .send(reply)
                    .map_err(|_| MuxError::NoResponders(target)),
                None => {
                    tracing::warn!(reply_to = %target, "No request waiting on reply target");
                    Err(MuxError::NoResponders(target))
                }
            }
        })
    }
}
