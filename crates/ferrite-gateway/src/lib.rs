//! Gateway session and rate-limited REST transport for the Ferrite bot
//! runtime.
//!
//! Two components live here:
//!
//! - [`connect`] / [`SessionHandle`] — the persistent, resumable gateway
//!   session over a websocket, feeding decoded dispatch events into an
//!   [`EventSink`] (implemented by `ferrite_core::Dispatcher`)
//! - [`RestClient`] — authenticated REST calls gated by per-route
//!   rate-limit buckets
//!
//! Both are plain owned instances; construct them with their config structs
//! and share them behind `Arc`.

mod backoff;
mod config;
mod frame;
mod rest;
mod session;

pub use config::{BackoffPolicy, GatewayConfig, RestConfig};
pub use frame::{
    DispatchEvent, Heartbeat, Hello, Identify, InboundFrame, OutboundFrame, ReadySnapshot, Resume,
    ResumeRejected,
};
pub use rest::RestClient;
pub use session::{EventSink, SessionHandle, SessionState, connect};

pub use reqwest::Method;
