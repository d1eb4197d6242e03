//! Unix domain socket setup.
//!
//! The authority listens on a single stream socket at a path supplied at
//! startup. A stale socket file left by a previous run is removed first;
//! startup aborts if that removal fails.

use std::io;
use std::path::Path;

use tokio::net::{UnixListener, UnixStream};
use tokio_util::codec::Framed;
use tracing::{debug, info};

use crate::core::codec::EndpointCodec;
use crate::error::{EnrollError, Result};

/// Bind the listening socket, replacing any stale socket file.
///
/// The listen backlog is the OS default.
///
/// # Errors
/// Fails fast when a stale file at `path` cannot be removed or the bind
/// itself fails.
pub async fn bind<P: AsRef<Path>>(path: P) -> Result<UnixListener> {
    let path = path.as_ref();

    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed stale socket file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(EnrollError::StaleSocket {
                path: path.display().to_string(),
                source: e,
            })
        }
    }

    let listener = UnixListener::bind(path).map_err(|e| EnrollError::Bind {
        path: path.display().to_string(),
        source: e,
    })?;
    info!(path = %path.display(), "listening on unix socket");
    Ok(listener)
}

/// Connect to the authority from the endpoint side.
///
/// Returns a framed stream that encodes requests and decodes responses; used
/// by clients and integration tests.
pub async fn connect<P: AsRef<Path>>(path: P) -> Result<Framed<UnixStream, EndpointCodec>> {
    let stream = UnixStream::connect(path).await?;
    Ok(Framed::new(stream, EndpointCodec))
}
