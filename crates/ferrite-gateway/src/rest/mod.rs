//! Rate-limited REST client.

mod bucket;
mod client;
mod route;

pub use client::RestClient;
