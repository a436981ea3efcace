//! Subject multiplexer for dispatching messages by exact subject.
//!
//! The mux maps subjects to handlers behind a reader/writer lock. Lookups take
//! the shared lock just long enough to clone the handler; the handler itself
//! runs with no lock held.
//!
//! # Example
//!
//! ```ignore
//! use subject_mux::handler::{Responder, SubjectMux};
//!
//! let mux = Arc::new(SubjectMux::new());
//!
//! mux.handle_func("echo", |mut res, msg| async move {
//!     res.respond(msg.payload.clone()).await
//! });
//!
//! let on_message = mux.msg_handler(publisher);
//! on_message(message).await?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};

use super::responder::{not_found, MessageResponder};
use crate::error::Result;
use crate::protocol::Message;
use crate::transport::Publisher;

/// Result type for handler functions.
pub type HandlerResult = Result<()>;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Callback handed to the transport for every inbound message.
///
/// The returned future completes once the resolved handler has finished.
pub type MsgHandler = Arc<dyn Fn(Message) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Trait for handler functions.
pub trait Handler: Send + Sync + 'static {
    /// Handle one request.
    fn call(&self, responder: MessageResponder, msg: Arc<Message>)
        -> BoxFuture<'static, HandlerResult>;
}

/// Adapts an async closure into a [`Handler`].
pub struct FnHandler<F, Fut>
where
    F: Fn(MessageResponder, Arc<Message>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnHandler<F, Fut>
where
    F: Fn(MessageResponder, Arc<Message>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    /// Wrap a handler function.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, Fut> Handler for FnHandler<F, Fut>
where
    F: Fn(MessageResponder, Arc<Message>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(
        &self,
        responder: MessageResponder,
        msg: Arc<Message>,
    ) -> BoxFuture<'static, HandlerResult> {
        Box::pin((self.handler)(responder, msg))
    }
}

/// Entry for a registered subject.
#[derive(Clone)]
struct MuxEntry {
    /// Subject the handler was registered under.
    subject: String,
    /// The handler function.
    handler: Arc<dyn Handler>,
}

/// Message multiplexer keyed by exact subject.
///
/// Matching is plain string equality on the whole subject: no wildcards, no
/// prefix matching. Subjects without a registration go to [`not_found`].
pub struct SubjectMux {
    /// Entries by subject.
    entries: RwLock<HashMap<String, MuxEntry>>,
    /// Fallback for unregistered subjects.
    not_found: Arc<dyn Handler>,
}

impl SubjectMux {
    /// Create an empty mux.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            not_found: Arc::new(FnHandler::new(
                |mut responder: MessageResponder, msg: Arc<Message>| async move {
                    not_found(&mut responder, &msg).await
                },
            )),
        }
    }

    /// Register a handler function for `subject`.
    ///
    /// Replaces any handler already registered for the same subject.
    ///
    /// # Panics
    ///
    /// Panics if `subject` is empty.
    pub fn handle_func<F, Fut>(&self, subject: &str, handler: F)
    where
        F: Fn(MessageResponder, Arc<Message>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handle(subject, Arc::new(FnHandler::new(handler)));
    }

    /// Register a handler for `subject`.
    ///
    /// # Panics
    ///
    /// Panics if `subject` is empty.
    pub fn handle(&self, subject: &str, handler: Arc<dyn Handler>) {
        // Checked before locking so a rejected registration can't poison the map.
        if subject.is_empty() {
            panic!("subject-mux: invalid subject");
        }

        let entry = MuxEntry {
            subject: subject.to_string(),
            handler,
        };

        let replaced = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(subject.to_string(), entry)
            .is_some();

        tracing::debug!(subject, replaced, "Registered handler");
    }

    /// Handler for `subject`, or the not-found fallback.
    fn handler(&self, subject: &str) -> Arc<dyn Handler> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);

        match entries.get(subject) {
            Some(entry) => entry.handler.clone(),
            None => self.not_found.clone(),
        }
    }

    /// Resolve the handler for `msg` and run it to completion.
    pub(crate) async fn dispatch(
        &self,
        msg: Message,
        publisher: Arc<dyn Publisher>,
    ) -> HandlerResult {
        let handler = self.handler(&msg.subject);

        tracing::debug!(subject = %msg.subject, reply = ?msg.reply, "Dispatching message");

        let msg = Arc::new(msg);
        let responder = MessageResponder::new(msg.clone(), publisher);
        handler.call(responder, msg).await
    }

    /// Build the transport callback for this mux.
    ///
    /// Each invocation constructs a [`MessageResponder`] that replies through
    /// `publisher`, then runs the handler registered for the message subject.
    pub fn msg_handler(self: &Arc<Self>, publisher: Arc<dyn Publisher>) -> MsgHandler {
        let mux = self.clone();

        Arc::new(move |msg: Message| -> BoxFuture<'static, HandlerResult> {
            let mux = mux.clone();
            let publisher = publisher.clone();
            Box::pin(async move { mux.dispatch(msg, publisher).await })
        })
    }

    /// Whether a handler is registered for exactly `subject`.
    pub fn contains(&self, subject: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(subject)
    }

    /// Number of registered subjects.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered subjects, sorted.
    pub fn subjects(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut subjects: Vec<String> = entries.values().map(|e| e.subject.clone()).collect();
        subjects.sort();
        subjects
    }
}

impl Default for SubjectMux {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;

    use crate::handler::Responder;
    use crate::transport::testing::RecordingPublisher;

    fn request(subject: &str) -> Message {
        Message::new(subject, Bytes::new()).with_reply("_INBOX.test")
    }

    /// Handler that counts calls and responds with `tag`.
    fn counting(
        calls: Arc<AtomicUsize>,
        tag: &'static str,
    ) -> impl Fn(MessageResponder, Arc<Message>) -> BoxFuture<'static, HandlerResult>
           + Send
           + Sync
           + 'static {
        move |mut res, _msg| {
            calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { res.respond(Bytes::from_static(tag.as_bytes())).await })
        }
    }

    #[tokio::test]
    async fn test_exact_match_dispatch() {
        let mux = SubjectMux::new();
        let calls = Arc::new(AtomicUsize::new(0));
        mux.handle_func("orders.create", counting(calls.clone(), "created"));

        let publisher = RecordingPublisher::new();
        mux.dispatch(request("orders.create"), publisher.clone())
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let sent = publisher.replies();
        assert_eq!(sent.len(), 1);
        assert_eq!(&sent[0].payload[..], b"created");
        assert_eq!(sent[0].status(), Some("200"));
    }

    #[tokio::test]
    async fn test_unregistered_subject_goes_to_not_found() {
        let mux = SubjectMux::new();
        let calls = Arc::new(AtomicUsize::new(0));
        mux.handle_func("orders.create", counting(calls.clone(), "created"));

        let publisher = RecordingPublisher::new();
        for subject in ["orders.creat", "orders.create.x", "orders.*", "ORDERS.CREATE"] {
            mux.dispatch(request(subject), publisher.clone())
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let sent = publisher.replies();
        assert_eq!(sent.len(), 4);
        for reply in &sent {
            assert_eq!(reply.status(), Some("404"));
            assert_eq!(reply.description(), Some("No messages"));
            assert!(reply.payload.is_empty());
        }
    }

    #[tokio::test]
    async fn test_empty_mux_uses_not_found() {
        let mux = SubjectMux::new();
        assert!(mux.is_empty());

        let publisher = RecordingPublisher::new();
        mux.dispatch(request("anything"), publisher.clone())
            .await
            .unwrap();

        assert_eq!(publisher.replies()[0].status(), Some("404"));
    }

    #[tokio::test]
    async fn test_reregistration_last_write_wins() {
        let mux = SubjectMux::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        mux.handle_func("svc", counting(first.clone(), "h1"));
        mux.handle_func("svc", counting(second.clone(), "h2"));

        let publisher = RecordingPublisher::new();
        mux.dispatch(request("svc"), publisher.clone()).await.unwrap();

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(&publisher.replies()[0].payload[..], b"h2");
        assert_eq!(mux.len(), 1);
    }

    #[test]
    #[should_panic(expected = "invalid subject")]
    fn test_empty_subject_panics() {
        let mux = SubjectMux::new();
        mux.handle_func("", |_res, _msg| async { Ok(()) });
    }

    #[test]
    fn test_rejected_registration_keeps_registry_intact() {
        let mux = SubjectMux::new();
        mux.handle_func("a", |_res, _msg| async { Ok(()) });

        let result = catch_unwind(AssertUnwindSafe(|| {
            mux.handle_func("", |_res, _msg| async { Ok(()) });
        }));
        assert!(result.is_err());

        mux.handle_func("b", |_res, _msg| async { Ok(()) });
        assert_eq!(mux.subjects(), vec!["a".to_string(), "b".to_string()]);
        assert!(!mux.contains(""));
    }

    #[tokio::test]
    async fn test_msg_handler_adapter() {
        let mux = Arc::new(SubjectMux::new());
        mux.handle_func("echo", |mut res, msg| async move {
            res.header().insert("Echo-Subject", msg.subject.clone());
            res.respond(msg.payload.clone()).await
        });

        let publisher = RecordingPublisher::new();
        let on_message = mux.msg_handler(publisher.clone());

        let msg = Message::new("echo", Bytes::from_static(b"hello")).with_reply("_INBOX.9");
        on_message(msg).await.unwrap();

        let sent = publisher.replies();
        assert_eq!(sent[0].reply_to.as_deref(), Some("_INBOX.9"));
        assert_eq!(sent[0].headers.get("Echo-Subject"), Some("echo"));
        assert_eq!(&sent[0].payload[..], b"hello");
    }

    #[tokio::test]
    async fn test_handler_error_is_returned() {
        let mux = SubjectMux::new();
        mux.handle_func("oneway", |mut res, _msg| async move {
            res.respond(Bytes::new()).await
        });

        let publisher = RecordingPublisher::new();
        let msg = Message::new("oneway", Bytes::new());
        let result = mux.dispatch(msg, publisher.clone()).await;

        assert!(matches!(result, Err(crate::MuxError::NoReplyTarget)));
    }

    #[tokio::test]
    async fn test_handler_runs_without_lock() {
        let mux = Arc::new(SubjectMux::new());
        let inner = mux.clone();

        // Registering from inside a handler would deadlock if the lock were held.
        mux.handle_func("register", move |mut res, _msg| {
            let inner = inner.clone();
            async move {
                inner.handle_func("late", |_res, _msg| async { Ok(()) });
                res.respond(Bytes::new()).await
            }
        });

        let publisher = RecordingPublisher::new();
        mux.dispatch(request("register"), publisher).await.unwrap();

        assert!(mux.contains("late"));
    }

    #[test]
    fn test_concurrent_registration_no_lost_updates() {
        let mux = Arc::new(SubjectMux::new());
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let mux = mux.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        mux.handle_func(&format!("svc.{}.{}", t, i), |_res, _msg| async {
                            Ok(())
                        });
                    }
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(mux.len(), 8 * 50);
        for t in 0..8 {
            for i in 0..50 {
                assert!(mux.contains(&format!("svc.{}.{}", t, i)));
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_dispatch_resolves_exact_subject() {
        let mux = Arc::new(SubjectMux::new());
        for i in 0..16 {
            let tag = format!("handler-{}", i);
            mux.handle_func(&format!("svc.{}", i), move |mut res, _msg| {
                let tag = tag.clone();
                async move { res.respond(Bytes::from(tag)).await }
            });
        }

        let publisher = RecordingPublisher::new();
        let on_message = mux.msg_handler(publisher.clone());

        let tasks: Vec<_> = (0..200)
            .map(|n| {
                let on_message = on_message.clone();
                tokio::spawn(async move {
                    let i = n % 16;
                    let msg = Message::new(format!("svc.{}", i), Bytes::new())
                        .with_reply(format!("_INBOX.{}", i));
                    on_message(msg).await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let sent = publisher.replies();
        assert_eq!(sent.len(), 200);
        for reply in &sent {
            let inbox = reply.reply_to.as_deref().unwrap();
            let i = inbox.trim_start_matches("_INBOX.");
            assert_eq!(&reply.payload[..], format!("handler-{}", i).as_bytes());
        }
    }
}
