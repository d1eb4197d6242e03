//! Transaction decision logic.
//!
//! The handler is a pure function from a decoded request plus the current
//! registry and secret store to a response and an optional registry mutation.
//! Connection handling and mutation application live in the multiplexer.

pub mod handler;

pub use handler::{handle, Mutation, Transaction};
