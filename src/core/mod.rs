//! # Core Protocol Components
//!
//! Low-level transaction messages, wire constants, and codecs.
//!
//! This module provides the foundation for the transaction protocol: the
//! fixed-layout request and response messages and the codecs that frame them
//! over byte streams.
//!
//! ## Wire Format
//! ```text
//! request:  [Reserved(8)] [DeviceId(2)] [Operation(2)] [Secret(64)]
//! response: [Magic "SC"(2)] [DeviceId(2)] [SenderId(2)] [BodyLen(2)] [Body]
//! ```
//! All integers are little-endian. A response body is either a 4-byte
//! acknowledgement (`DeviceId(2)`, `Status(2)`) or the 116-byte registration
//! grant that appends the encryption key, seed, and authentication key.
//!
//! ## Security
//! - Requests are a fixed 76 bytes; anything else on the stream is corruption
//! - Key material appears in exactly one response shape, produced only by the
//!   transaction handler after secret verification

pub mod codec;
pub mod wire;

pub use codec::{decode_request, decode_response, encode_response, EndpointCodec, TransactionCodec};
pub use wire::{KeyMaterial, Operation, Request, Response, Status};
