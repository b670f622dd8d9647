//! Storage driver for the 115 open platform.
//!
//! [`Open115`] exposes listing, download links, folder and entry
//! operations, offline tasks and uploads for one [`Account`]. Uploads go
//! through the [`Negotiator`], which lets the service deduplicate content
//! by digest before any bytes are sent, and the [`TransferExecutor`],
//! which sends the bytes in parts when it cannot.

pub mod account;
pub mod config;
mod driver;
mod error;
pub mod executor;
pub mod limiter;
pub mod negotiator;
mod object;
pub mod remote;

#[cfg(test)]
mod mock;

pub use account::{Account, AccountStore, SaveHook, default_account_dir};
pub use config::{DriverConfig, RetryConfig};
pub use driver::Open115;
pub use error::DriverError;
pub use executor::TransferExecutor;
pub use limiter::RateLimiter;
pub use negotiator::{Negotiator, SignRange, UploadOutcome, parse_sign_check};
pub use object::{Entry, Link, Object, StorageDetails};
pub use remote::{RemoteApi, RemoteFuture, Session};
