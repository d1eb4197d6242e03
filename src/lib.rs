//! # enrolld
//!
//! Local rendezvous authority for a fleet of embedded network devices sharing
//! one communication bus. Endpoints prove possession of a pre-provisioned
//! per-device secret over a Unix domain socket and are issued the
//! deployment-wide encryption key, authentication key, and a fresh
//! per-session seed. Deregistration revokes that trust.
//!
//! ## Architecture
//! - [`core`]: fixed-layout wire messages and codecs
//! - [`secrets`]: read-only secret store capability
//! - [`registry`]: in-memory device registry
//! - [`protocol`]: the pure transaction decision function
//! - [`service`]: the single-threaded connection-multiplexing event loop
//! - [`transport`]: Unix socket setup and client connections
//!
//! ## Protocol
//! A transaction is one fixed 76-byte request answered by one response.
//! Registration releases key material only after the supplied secret matches
//! the provisioned blob byte for byte; duplicate or unverified requests are
//! answered with `ALREADY` and carry no key material.

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod secrets;
pub mod service;
pub mod transport;

pub use config::Config;
pub use error::{EnrollError, Result};
pub use service::Multiplexer;
