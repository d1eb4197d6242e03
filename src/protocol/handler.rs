//! Secret verification and key issuance.

use tracing::info;

use crate::core::wire::{DeviceId, KeyMaterial, Operation, Request, Response, SEED_LEN};
use crate::error::{EnrollError, Result};
use crate::registry::{Device, DeviceStatus, Registry};
use crate::secrets::SecretStore;

/// A registry change decided by a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mutation {
    pub device_id: DeviceId,
    pub status: DeviceStatus,
}

/// Outcome of a transaction: the wire response plus the registry change to
/// apply, if any.
#[derive(Debug)]
pub struct Transaction {
    pub response: Response,
    pub mutation: Option<Mutation>,
}

impl Transaction {
    fn rejection(device_id: DeviceId) -> Self {
        Self {
            response: Response::rejection(device_id),
            mutation: None,
        }
    }
}

/// Decide a transaction.
///
/// Checks run in strict priority order: unknown device, secret mismatch,
/// redundant operation, then the requested operation itself. Key material is
/// read and a fresh seed generated only after the secret proof succeeded for
/// a registration that actually changes state.
///
/// # Errors
/// Fails only on server-side faults: unreadable deployment key blobs or an
/// entropy source failure. Protocol-semantic rejections are `Ok` transactions
/// carrying an `ALREADY` response.
pub fn handle<S: SecretStore>(req: &Request, registry: &Registry, store: &S) -> Result<Transaction> {
    let id = req.device_id;

    let Some(stored) = store.device_secret(id)? else {
        info!(device = id, "bad id");
        return Ok(Transaction::rejection(id));
    };

    // The trust gate: nothing is released without exact byte equality.
    if stored.as_slice() != req.secret {
        info!(device = id, "secret mismatch");
        return Ok(Transaction::rejection(id));
    }

    let requested = DeviceStatus::from(req.operation);
    if registry.get(id).map(Device::status) == Some(requested) {
        info!(device = id, status = ?requested, "repeat transaction");
        return Ok(Transaction::rejection(id));
    }

    let transaction = match req.operation {
        Operation::Register => {
            let keys = KeyMaterial {
                enc_key: store.encryption_key()?,
                seed: fresh_seed()?,
                auth_key: store.auth_key()?,
            };
            info!(device = id, "registered");
            Transaction {
                response: Response::registered(id, keys),
                mutation: Some(Mutation {
                    device_id: id,
                    status: DeviceStatus::Registered,
                }),
            }
        }
        Operation::Deregister => {
            info!(device = id, "deregistered");
            Transaction {
                response: Response::deregistered(id),
                mutation: Some(Mutation {
                    device_id: id,
                    status: DeviceStatus::Deregistered,
                }),
            }
        }
    };

    Ok(transaction)
}

/// Generate a per-registration seed from the OS CSPRNG.
///
/// Seeds are never derived from stored state and never reused across devices
/// or re-registrations.
fn fresh_seed() -> Result<[u8; SEED_LEN]> {
    let mut seed = [0u8; SEED_LEN];
    getrandom::fill(&mut seed).map_err(|e| EnrollError::Entropy(e.to_string()))?;
    Ok(seed)
}
