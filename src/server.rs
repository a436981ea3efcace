//! Server builder and runtime loop.
//!
//! The [`ServerBuilder`] registers handlers on a [`SubjectMux`]. The
//! [`Server`] drains an inbound message channel and dispatches every message
//! on its own task:
//! 1. Receive message from the transport
//! 2. Acquire a handler permit (drop the message at capacity)
//! 3. Run the mux adapter, which builds the responder and calls the handler
//! 4. Log handler errors
//!
//! # Example
//!
//! ```ignore
//! use subject_mux::{LocalBus, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (bus, inbound) = LocalBus::with_defaults();
//!
//!     let server = Server::builder()
//!         .handle("echo", |mut res, msg| async move {
//!             res.respond(msg.payload.clone()).await
//!         })
//!         .serve(inbound, Arc::new(bus.publisher()));
//!
//!     let reply = bus.request("echo", HeaderMap::new(), "hi".into()).await?;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::handler::{HandlerResult, MessageResponder, MsgHandler, SubjectMux};
use crate::protocol::Message;
use crate::transport::Publisher;

/// Default maximum concurrent handlers.
pub const DEFAULT_MAX_CONCURRENT_HANDLERS: usize = 256;

/// Configuration for [`Server`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Handlers allowed to run at once. Messages beyond this are dropped.
    pub max_concurrent_handlers: usize,
}

impl ServerConfig {
    /// Parse a JSON config; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Permit count actually used by the semaphore.
    ///
    /// Capped at `u32::MAX` so shutdown can take every permit back at once.
    fn permits(&self) -> u32 {
        let max = Semaphore::MAX_PERMITS.min(u32::MAX as usize);
        self.max_concurrent_handlers.clamp(1, max) as u32
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_handlers: DEFAULT_MAX_CONCURRENT_HANDLERS,
        }
    }
}

/// Builder for configuring and starting a [`Server`].
pub struct ServerBuilder {
    mux: SubjectMux,
    config: ServerConfig,
}

impl ServerBuilder {
    /// Create a new server builder.
    pub fn new() -> Self {
        Self {
            mux: SubjectMux::new(),
            config: ServerConfig::default(),
        }
    }

    /// Register a handler for `subject`.
    ///
    /// # Panics
    ///
    /// Panics if `subject` is empty.
    pub fn handle<F, Fut>(self, subject: &str, handler: F) -> Self
    where
        F: Fn(MessageResponder, Arc<Message>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.mux.handle_func(subject, handler);
        self
    }

    /// Set the maximum number of concurrent handlers.
    ///
    /// When this limit is reached, new messages are dropped with a warning.
    /// Default: 256
    pub fn max_concurrent_handlers(mut self, limit: usize) -> Self {
        self.config.max_concurrent_handlers = limit;
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Start dispatching messages from `inbound`, replying through `publisher`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn serve(self, inbound: mpsc::Receiver<Message>, publisher: Arc<dyn Publisher>) -> Server {
        Server::start(self.mux, self.config, inbound, publisher)
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running server.
///
/// Use `mux()` to add routes while serving.
/// Use `wait_for_shutdown()` to block until the inbound channel closes.
pub struct Server {
    /// Shared routing table.
    mux: Arc<SubjectMux>,
    /// Bounds concurrent handler tasks.
    semaphore: Arc<Semaphore>,
    /// Permit count the semaphore was created with.
    permits: usize,
    /// Fires once the loop has stopped and handlers drained.
    shutdown_rx: oneshot::Receiver<()>,
    /// Receive loop task handle.
    _task: JoinHandle<()>,
}

impl Server {
    /// Create a new server builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    fn start(
        mux: SubjectMux,
        config: ServerConfig,
        inbound: mpsc::Receiver<Message>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        let mux = Arc::new(mux);
        let permits = config.permits();
        let semaphore = Arc::new(Semaphore::new(permits as usize));
        let on_message = mux.msg_handler(publisher);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let loop_semaphore = semaphore.clone();

        let task = tokio::spawn(async move {
            Self::receive_loop(inbound, on_message, loop_semaphore, permits).await;
            let _ = shutdown_tx.send(());
        });

        Server {
            mux,
            semaphore,
            permits: permits as usize,
            shutdown_rx,
            _task: task,
        }
    }

    /// Main receive loop - dispatches until the inbound channel closes.
    async fn receive_loop(
        mut inbound: mpsc::Receiver<Message>,
        on_message: MsgHandler,
        semaphore: Arc<Semaphore>,
        permits: u32,
    ) {
        while let Some(msg) = inbound.recv().await {
            Self::dispatch_message(msg, &on_message, &semaphore);
        }

        tracing::debug!("Inbound channel closed, draining handlers");

        // Every permit back means every handler task finished.
        let _ = semaphore.acquire_many(permits).await;
    }

    /// Dispatch a single message on its own task.
    fn dispatch_message(msg: Message, on_message: &MsgHandler, semaphore: &Arc<Semaphore>) {
        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(p) => p,
            Err(_) => {
                tracing::warn!(
                    subject = %msg.subject,
                    "Handler capacity reached, dropping message"
                );
                return;
            }
        };

        let subject = msg.subject.clone();
        let fut = on_message(msg);

        tokio::spawn(async move {
            // Permit is held until this task completes
            let _permit = permit;

            if let Err(e) = fut.await {
                tracing::error!(%subject, "Handler error: {}", e);
            }
        });
    }

    /// The mux this server dispatches through.
    pub fn mux(&self) -> &Arc<SubjectMux> {
        &self.mux
    }

    /// Handlers currently running.
    pub fn in_flight(&self) -> usize {
        self.permits - self.semaphore.available_permits()
    }

    /// Wait until the inbound channel closes and running handlers finish.
    pub async fn wait_for_shutdown(self) {
        let _ = self.shutdown_rx.await;
    }
}
