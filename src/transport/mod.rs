//! Transport layer: the local listening endpoint and client connections.

pub mod local;
