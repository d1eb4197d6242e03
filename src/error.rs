//! # Error Types
//!
//! Error handling for the enrollment authority.
//!
//! This module defines all error variants that can occur while serving
//! transactions, from low-level I/O errors to protocol violations.
//!
//! ## Error Categories
//! - **I/O Errors**: socket and secret-store failures
//! - **Protocol Errors**: malformed frames, unknown operation codes
//! - **Startup Errors**: stale socket files, bind failures, bad configuration
//!
//! Protocol-*semantic* rejections (unknown device id, secret mismatch,
//! redundant operation) are not errors; they are encoded as an `ALREADY`
//! response by the transaction handler.

use std::io;
use thiserror::Error;

/// Primary error type for all service operations.
#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed request: expected {expected} bytes, got {found}")]
    MalformedRequest { expected: usize, found: usize },

    #[error("unknown operation code: {0}")]
    UnknownOperation(u16),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("deployment key {name} is {found} bytes, expected {expected}")]
    BadKeyMaterial {
        name: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("entropy source failure: {0}")]
    Entropy(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("stale socket at {path} could not be removed: {source}")]
    StaleSocket {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot bind listening socket at {path}: {source}")]
    Bind {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Type alias for Results using `EnrollError`.
pub type Result<T> = std::result::Result<T, EnrollError>;
