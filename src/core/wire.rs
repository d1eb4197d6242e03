//! Transaction message types and wire constants.

use std::fmt;

use crate::error::EnrollError;

/// Namespace-wide identifier of a physical endpoint.
pub type DeviceId = u16;

/// Magic tag opening every response.
pub const RESPONSE_MAGIC: [u8; 2] = *b"SC";

/// Sender id identifying this service in response headers.
pub const AUTHORITY_ID: u16 = 1;

/// Reserved transport header leading every request, ignored on decode.
pub const REQUEST_HEADER_LEN: usize = 8;

/// Length of the per-device credential field.
pub const SECRET_LEN: usize = 64;

/// Total fixed request size on the wire.
pub const REQUEST_LEN: usize = REQUEST_HEADER_LEN + 2 + 2 + SECRET_LEN;

/// Deployment-wide encryption key length.
pub const ENC_KEY_LEN: usize = 16;

/// Per-registration seed length.
pub const SEED_LEN: usize = 32;

/// Deployment-wide authentication key length.
pub const AUTH_KEY_LEN: usize = 64;

/// Response header size: magic, device id, sender id, body length.
pub const RESPONSE_HEADER_LEN: usize = 8;

/// Body size of an acknowledgement or rejection.
pub const ACK_BODY_LEN: usize = 4;

/// Body size of a successful registration carrying key material.
pub const KEY_BODY_LEN: usize = ACK_BODY_LEN + ENC_KEY_LEN + SEED_LEN + AUTH_KEY_LEN;

/// The two transaction operations an endpoint may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Operation {
    Register = 0,
    Deregister = 1,
}

impl TryFrom<u16> for Operation {
    type Error = EnrollError;

    fn try_from(code: u16) -> Result<Self, EnrollError> {
        match code {
            0 => Ok(Self::Register),
            1 => Ok(Self::Deregister),
            other => Err(EnrollError::UnknownOperation(other)),
        }
    }
}

/// Status codes carried in response bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum Status {
    /// Rejection: unknown device, secret mismatch, or redundant operation.
    Already = -1,
    /// Registration accepted; key material follows.
    Register = 0,
    /// Deregistration accepted.
    Deregister = 1,
}

impl TryFrom<i16> for Status {
    type Error = EnrollError;

    fn try_from(code: i16) -> Result<Self, EnrollError> {
        match code {
            -1 => Ok(Self::Already),
            0 => Ok(Self::Register),
            1 => Ok(Self::Deregister),
            other => Err(EnrollError::MalformedResponse(format!(
                "unknown status code: {other}"
            ))),
        }
    }
}

/// A decoded transaction request.
#[derive(Clone)]
pub struct Request {
    pub device_id: DeviceId,
    pub operation: Operation,
    /// Opaque per-device credential supplied by the endpoint.
    pub secret: [u8; SECRET_LEN],
}

// The credential never goes to logs.
impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("device_id", &self.device_id)
            .field("operation", &self.operation)
            .field("secret", &"<64 bytes>")
            .finish()
    }
}

/// Key material issued on a successful registration.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    pub enc_key: [u8; ENC_KEY_LEN],
    pub seed: [u8; SEED_LEN],
    pub auth_key: [u8; AUTH_KEY_LEN],
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("enc_key", &"<16 bytes>")
            .field("seed", &"<32 bytes>")
            .field("auth_key", &"<64 bytes>")
            .finish()
    }
}

/// A transaction response.
///
/// Key material is present exactly when the transaction was a successful,
/// newly-verified registration; the constructors are the only way to build
/// one and preserve that invariant.
#[derive(Debug, Clone)]
pub struct Response {
    pub device_id: DeviceId,
    pub status: Status,
    pub keys: Option<KeyMaterial>,
}

impl Response {
    /// Rejection or duplicate acknowledgement, `ALREADY` on the wire.
    pub fn rejection(device_id: DeviceId) -> Self {
        Self {
            device_id,
            status: Status::Already,
            keys: None,
        }
    }

    /// Successful registration grant.
    pub fn registered(device_id: DeviceId, keys: KeyMaterial) -> Self {
        Self {
            device_id,
            status: Status::Register,
            keys: Some(keys),
        }
    }

    /// Successful deregistration acknowledgement.
    pub fn deregistered(device_id: DeviceId) -> Self {
        Self {
            device_id,
            status: Status::Deregister,
            keys: None,
        }
    }

    /// Size of the encoded body in bytes.
    pub fn body_len(&self) -> usize {
        if self.keys.is_some() {
            KEY_BODY_LEN
        } else {
            ACK_BODY_LEN
        }
    }
}
