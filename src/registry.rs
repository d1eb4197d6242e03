//! In-memory device registry.
//!
//! The single source of truth for which endpoints currently hold deployment
//! trust. The registry is owned by the connection multiplexer and touched only
//! from its event loop, so it carries no internal synchronization. Status
//! transitions are decided by the transaction handler; the registry just
//! stores them.

use std::collections::HashMap;

use tokio::net::UnixStream;
use tokio_util::codec::Framed;

use crate::core::codec::TransactionCodec;
use crate::core::wire::{DeviceId, Operation};

/// Server-side framed transaction stream bound to a device.
pub type DeviceConnection = Framed<UnixStream, TransactionCodec>;

/// Deployment trust state of a device.
///
/// Absence from the registry means never-registered; there is no explicit
/// state for that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Registered,
    Deregistered,
}

impl From<Operation> for DeviceStatus {
    fn from(op: Operation) -> Self {
        match op {
            Operation::Register => Self::Registered,
            Operation::Deregister => Self::Deregistered,
        }
    }
}

/// A device record: identity, trust state, and the connection it last
/// transacted on.
pub struct Device {
    id: DeviceId,
    status: DeviceStatus,
    conn: Option<DeviceConnection>,
}

impl Device {
    fn new(id: DeviceId, status: DeviceStatus, conn: Option<DeviceConnection>) -> Self {
        Self { id, status, conn }
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn status(&self) -> DeviceStatus {
        self.status
    }

    pub fn is_bound(&self) -> bool {
        self.conn.is_some()
    }

    /// Bind a connection to this device, dropping (and thereby closing) any
    /// previously bound stream.
    pub fn rebind(&mut self, conn: DeviceConnection) {
        self.conn = Some(conn);
    }
}

/// Mapping from device id to device record. Each id appears at most once.
#[derive(Default)]
pub struct Registry {
    devices: HashMap<DeviceId, Device>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(&id)
    }

    /// Create or update the record for `id`.
    ///
    /// A `Some` connection rebinds the device; `None` leaves any existing
    /// binding in place.
    pub fn upsert(&mut self, id: DeviceId, status: DeviceStatus, conn: Option<DeviceConnection>) {
        match self.devices.get_mut(&id) {
            Some(dev) => {
                dev.status = status;
                if let Some(conn) = conn {
                    dev.rebind(conn);
                }
            }
            None => {
                self.devices.insert(id, Device::new(id, status, conn));
            }
        }
    }

    /// Drop the record for `id`, closing its bound connection if any.
    pub fn remove(&mut self, id: DeviceId) {
        self.devices.remove(&id);
    }

    /// Detach and return the connection bound to `id`, leaving the record.
    pub fn take_connection(&mut self, id: DeviceId) -> Option<DeviceConnection> {
        self.devices.get_mut(&id).and_then(|dev| dev.conn.take())
    }

    pub fn connection_mut(&mut self, id: DeviceId) -> Option<&mut DeviceConnection> {
        self.devices.get_mut(&id).and_then(|dev| dev.conn.as_mut())
    }

    /// Iterate over every attributed connection together with its device id.
    pub fn connections_mut(&mut self) -> impl Iterator<Item = (DeviceId, &mut DeviceConnection)> {
        self.devices
            .iter_mut()
            .filter_map(|(id, dev)| dev.conn.as_mut().map(|conn| (*id, conn)))
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
