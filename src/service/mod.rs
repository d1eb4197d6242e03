//! Service layer: the connection-multiplexing event loop.

pub mod multiplexer;

pub use multiplexer::Multiplexer;
