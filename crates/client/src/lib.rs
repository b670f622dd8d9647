//! HTTP client for the 115 open platform.
//!
//! [`Client`] covers the JSON API (files, upload handshake, offline tasks,
//! account info) and the object-store calls that carry upload bytes.

mod client;
mod oss;

pub use client::{Client, Error, RefreshCallback, TokenPair};
pub use oss::{CompletedPart, OssTarget};
