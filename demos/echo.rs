//! Echo service - request/reply over the in-process bus.
//!
//! This example demonstrates:
//! - Registering handlers with the server builder
//! - Setting status, description and custom headers on a reply
//! - The built-in 404 reply for unknown subjects
//!
//! Run with `RUST_LOG=debug cargo run --example echo` to see dispatch logs.

use std::sync::Arc;

use bytes::Bytes;
use subject_mux::handler::error;
use subject_mux::protocol::HeaderMap;
use subject_mux::{LocalBus, Responder, Server};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let (bus, inbound) = LocalBus::with_defaults();

    let server = Server::builder()
        .handle("echo", |mut res, msg| async move {
            if msg.payload.is_empty() {
                return error(&mut res, "nothing to echo", 400).await;
            }
            res.header().insert("Content-Length", msg.payload.len().to_string());
            res.respond(msg.payload.clone()).await
        })
        .serve(inbound, Arc::new(bus.publisher()));

    for (subject, payload) in [("echo", "hello"), ("echo", ""), ("missing", "?")] {
        let reply = bus
            .request(subject, HeaderMap::new(), Bytes::from(payload))
            .await?;

        println!(
            "{} -> status={} description={} payload={:?}",
            subject,
            reply.status().unwrap_or("-"),
            reply.description().unwrap_or("-"),
            String::from_utf8_lossy(&reply.payload),
        );
    }

    drop(bus);
    server.wait_for_shutdown().await;

    Ok(())
}
