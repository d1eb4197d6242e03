//! # Connection Multiplexer
//!
//! The event loop that owns the listening socket, the pool of
//! not-yet-identified connections, and the registry of devices with their
//! bound connections.
//!
//! ## Loop shape
//! One event is serviced per iteration, with accepts taking priority over
//! pending requests. Connections start in the unattributed pool and move into
//! the registry on their first successful transaction; an unattributed
//! connection gets exactly one transaction, after which it either becomes
//! attributed or is discarded.
//!
//! ## Read model
//! Reads are non-blocking with per-connection buffering: each connection's
//! framed stream accumulates partial requests and the loop only ever sees
//! complete frames, so a peer that trickles bytes cannot stall the others.
//!
//! Single-threaded: no locks, and the registry and secret store are touched
//! only from this loop.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use futures::future::select_all;
use futures::{SinkExt, StreamExt};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn};

use crate::core::codec::TransactionCodec;
use crate::core::wire::{DeviceId, Request, Response};
use crate::error::Result;
use crate::protocol::handler;
use crate::registry::{DeviceConnection, Registry};
use crate::secrets::SecretStore;

/// Pool key for a connection that has not completed a transaction yet.
type ConnId = u64;

enum Event {
    /// A new peer arrived on the listening socket.
    Incoming(std::io::Result<UnixStream>),
    /// Item from an unattributed connection; `None` is end-of-stream.
    Pool(ConnId, Option<Result<Request>>),
    /// Item from a connection bound to a device.
    Bound(DeviceId, Option<Result<Request>>),
}

/// The event loop. Owns every connection and the device registry.
pub struct Multiplexer<S> {
    listener: UnixListener,
    store: S,
    registry: Registry,
    unattributed: HashMap<ConnId, DeviceConnection>,
    next_conn_id: ConnId,
}

impl<S: SecretStore> Multiplexer<S> {
    pub fn new(listener: UnixListener, store: S) -> Self {
        Self {
            listener,
            store,
            registry: Registry::new(),
            unattributed: HashMap::new(),
            next_conn_id: 0,
        }
    }

    /// Drive the loop forever. There is no shutdown signal; the process runs
    /// until externally terminated.
    pub async fn run(mut self) -> Result<()> {
        loop {
            let event = self.next_event().await;
            self.handle_event(event).await;
        }
    }

    /// Wait for the next serviceable event: an incoming connection, or a
    /// frame (or end-of-stream) on any pooled or bound connection.
    async fn next_event(&mut self) -> Event {
        let Self {
            listener,
            unattributed,
            registry,
            ..
        } = self;

        let request_ready = async {
            let mut pending: Vec<Pin<Box<dyn Future<Output = Event> + Send + '_>>> = Vec::new();
            for (&cid, conn) in unattributed.iter_mut() {
                pending.push(Box::pin(async move { Event::Pool(cid, conn.next().await) }));
            }
            for (id, conn) in registry.connections_mut() {
                pending.push(Box::pin(async move { Event::Bound(id, conn.next().await) }));
            }
            if pending.is_empty() {
                std::future::pending::<Event>().await
            } else {
                select_all(pending).await.0
            }
        };
        tokio::pin!(request_ready);

        tokio::select! {
            biased;
            res = listener.accept() => Event::Incoming(res.map(|(stream, _)| stream)),
            event = &mut request_ready => event,
        }
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::Incoming(Ok(stream)) => {
                let cid = self.next_conn_id;
                self.next_conn_id += 1;
                self.unattributed
                    .insert(cid, Framed::new(stream, TransactionCodec));
                info!("new connection");
            }
            Event::Incoming(Err(e)) => error!(error = %e, "error accepting connection"),
            Event::Pool(cid, item) => {
                // One transaction per unattributed connection, then out of
                // the pool regardless of outcome.
                let Some(conn) = self.unattributed.remove(&cid) else {
                    return;
                };
                match item {
                    None => info!("connection closed"),
                    Some(Err(e)) => warn!(error = %e, "dropping unattributed connection"),
                    Some(Ok(req)) => self.serve_unattributed(conn, req).await,
                }
            }
            Event::Bound(id, item) => match item {
                None => {
                    info!(device = id, "connection closed");
                    self.registry.remove(id);
                }
                Some(Err(e)) => {
                    warn!(device = id, error = %e, "dropping connection");
                    self.registry.remove(id);
                }
                Some(Ok(req)) => self.serve_bound(id, req).await,
            },
        }
    }

    async fn serve_unattributed(&mut self, mut conn: DeviceConnection, req: Request) {
        match handler::handle(&req, &self.registry, &self.store) {
            Err(e) => error!(device = req.device_id, error = %e, "transaction failed"),
            Ok(tx) => match tx.mutation {
                Some(m) => {
                    // First successful transaction: the connection becomes
                    // attributed to the device it transacted for.
                    self.registry.upsert(m.device_id, m.status, Some(conn));
                    self.send(m.device_id, tx.response).await;
                }
                None => {
                    // A rejection on a fresh connection is answered once;
                    // the peer reconnects to retry.
                    if let Err(e) = conn.send(tx.response).await {
                        debug!(error = %e, "rejection write failed");
                    }
                }
            },
        }
    }

    async fn serve_bound(&mut self, bound_id: DeviceId, req: Request) {
        match handler::handle(&req, &self.registry, &self.store) {
            Err(e) => {
                error!(device = req.device_id, error = %e, "transaction failed");
                self.registry.remove(bound_id);
            }
            Ok(tx) => {
                let respond_to = match tx.mutation {
                    Some(m) if m.device_id == bound_id => {
                        self.registry.upsert(bound_id, m.status, None);
                        bound_id
                    }
                    Some(m) => {
                        // Transaction for another device id rebinds the
                        // stream to the id it just transacted for.
                        let conn = self.registry.take_connection(bound_id);
                        self.registry.upsert(m.device_id, m.status, conn);
                        m.device_id
                    }
                    // Rejections leave an attributed connection open.
                    None => bound_id,
                };
                self.send(respond_to, tx.response).await;
            }
        }
    }

    /// Write a response to the connection bound to `id`. A failed write
    /// closes the connection and removes the registry entry.
    async fn send(&mut self, id: DeviceId, response: Response) {
        let Some(conn) = self.registry.connection_mut(id) else {
            return;
        };
        if let Err(e) = conn.send(response).await {
            warn!(device = id, error = %e, "response write failed; closing connection");
            self.registry.remove(id);
        }
    }
}
