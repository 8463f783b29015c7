//! TCP listener that hands accepted connections to the reactor.

use std::net::{IpAddr, SocketAddr};

use edgeshare_core::EventSender;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::connection::{spawn_connection, WriterGuard};
use crate::application::events::ServerEvent;

/// Errors that can occur while setting up the listener.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The configured bind address is not an IP address.
    #[error("invalid bind address '{0}'")]
    InvalidAddress(String),
    /// The socket could not be bound, e.g. because the port is in use.
    #[error("failed to bind {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Parses the configured address and port into a socket address.
///
/// # Errors
///
/// [`NetworkError::InvalidAddress`] if `bind_address` is not an IP address.
pub fn listen_addr(bind_address: &str, port: u16) -> Result<SocketAddr, NetworkError> {
    let ip: IpAddr = bind_address
        .parse()
        .map_err(|_| NetworkError::InvalidAddress(bind_address.to_string()))?;
    Ok(SocketAddr::new(ip, port))
}

/// Binds the listening socket.
///
/// # Errors
///
/// [`NetworkError::BindFailed`] if the OS refuses the bind.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, NetworkError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| NetworkError::BindFailed { addr, source })?;
    let local = listener.local_addr().unwrap_or(addr);
    info!(addr = %local, "listening for screens");
    Ok(listener)
}

/// Accepts connections until the reactor shuts down.
///
/// Accept errors (e.g. too many open files) are logged and the loop goes on.
/// Each connection's writer gets a clone of `writers`.
pub fn spawn_listener(
    listener: TcpListener,
    sender: EventSender<ServerEvent>,
    writers: WriterGuard,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let accepted = listener.accept().await;
            if sender.is_shut_down() {
                break;
            }
            match accepted {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!(%peer, error = %e, "could not disable Nagle");
                    }
                    info!(%peer, "accepted connection");
                    spawn_connection(stream, peer, &sender, writers.clone());
                }
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }
    })
}
