//! Kasa Server Library
//!
//! Accepts a continuous stream of mutually-authenticated TLS connections. Every
//! incoming connection must present a client certificate; connections that fail
//! the handshake are dropped and never reach the handler.
//!
//! # Example
//!
//! ```no_run
//! use std::io::{Read, Write};
//!
//! use kasa_server::{Server, ServerConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = ServerConfig::new("127.0.0.1", 9443, "certs/server.key.pem", "certs/server.pem");
//! let server = Server::bind(&config)?;
//!
//! server.run(|mut stream| {
//!     let mut buf = [0u8; 4];
//!     if stream.read_exact(&mut buf).is_ok() {
//!         let _ = stream.write_all(&buf);
//!     }
//! });
//! # Ok(())
//! # }
//! ```

use std::{
    io,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use kasa_common::credential::PemFileProvider;
use rustls::{ServerConfig as RustlsServerConfig, ServerConnection};
use tracing::{debug, error, info, info_span, warn, Span};
use uuid::Uuid;

// Re-export important types from kasa-common for convenience
pub use kasa_common::{CredentialProvider, Error, KeySource, ServerConfig, TlsStream, TrustPolicy};

const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// A bound listener that hands every authenticated connection to a handler.
///
/// The listener only ever yields TLS server streams, so accepted connections need
/// no runtime check of their transport kind.
pub struct Server {
    listener:   TcpListener,
    tls_config: Arc<RustlsServerConfig>,
    local_addr: SocketAddr,
    closed:     Arc<AtomicBool>,
}

impl Server {
    /// Loads the server identity from PEM material and binds the listening socket.
    pub fn bind(config: &ServerConfig) -> Result<Self, Error> {
        Self::bind_with(config, &PemFileProvider)
    }

    /// Loads the server identity through `provider` and binds the listening socket.
    ///
    /// A server without an identity or a socket can't operate, so both failures are
    /// returned here rather than discovered later in [`Server::run`].
    pub fn bind_with<P>(config: &ServerConfig, provider: &P) -> Result<Self, Error>
    where
        P: CredentialProvider + ?Sized,
    {
        let address = config.address();

        let credential = provider.load(&config.public_key, &config.private_key)?;
        let tls_config = credential.server_config(&config.trust)?;

        let listener = TcpListener::bind((config.bind_host.as_str(), config.bind_port))
            .map_err(|source| Error::Listen {
                address: address.clone(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| Error::Listen {
            address: address.clone(),
            source,
        })?;

        info!(
            %local_addr,
            cert = %config.public_key,
            key = %config.private_key,
            fingerprint = credential.fingerprint(),
            "server bound"
        );
        Ok(Self {
            listener,
            tls_config: Arc::new(tls_config),
            local_addr,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The address actually bound, useful when the configured port is `0`
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A handle that stops [`Server::run`] from any thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            closed:    self.closed.clone(),
            wake_addr: wake_addr(self.local_addr),
        }
    }

    /// Runs the accept loop until [`ShutdownHandle::shutdown`] is called.
    ///
    /// Each connection is handshaken on this thread, then moved to a new thread
    /// running `handler`. Handlers are never awaited: returning only releases the
    /// listening socket.
    pub fn run<H>(self, handler: H)
    where
        H: Fn(TlsStream) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        info!(local_addr = %self.local_addr, "accepting connections");

        loop {
            let accepted = self.listener.accept();
            if self.closed.load(Ordering::Acquire) {
                break;
            }

            let (socket, peer) = match accepted {
                Ok(pair) => pair,
                Err(err) => {
                    warn!(%err, "connection is not accepted");
                    continue;
                }
            };

            let span = info_span!("connection", id = %Uuid::new_v4(), %peer);
            let stream = match span.in_scope(|| self.handshake(socket)) {
                Ok(stream) => stream,
                Err(err) => {
                    span.in_scope(|| warn!(%err, "handshake is unsuccessful"));
                    continue;
                }
            };

            dispatch(stream, span, &handler);
        }

        info!(local_addr = %self.local_addr, "listener closed");
    }

    fn handshake(&self, socket: TcpStream) -> io::Result<TlsStream> {
        debug!("performing TLS handshake");
        let tls = ServerConnection::new(self.tls_config.clone())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        TlsStream::from_server(socket, tls)
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.local_addr)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

fn dispatch<H>(stream: TlsStream, span: Span, handler: &Arc<H>)
where
    H: Fn(TlsStream) + Send + Sync + 'static,
{
    let handler = Arc::clone(handler);
    let worker = span.clone();
    let spawned = thread::Builder::new()
        .name("kasa-conn".to_string())
        .spawn(move || worker.in_scope(|| handler(stream)));

    // on spawn failure the stream was dropped with the closure, closing it
    span.in_scope(|| match spawned {
        Ok(_) => debug!("dispatched to handler"),
        Err(err) => error!(%err, "can't spawn connection handler"),
    });
}

/// Stops a running [`Server`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    closed:    Arc<AtomicBool>,
    wake_addr: SocketAddr,
}

impl ShutdownHandle {
    /// Marks the server closed and wakes its blocking accept.
    ///
    /// The accept loop returns without waiting for in-flight handlers. Calling this
    /// more than once has no further effect.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(err) = TcpStream::connect_timeout(&self.wake_addr, WAKE_TIMEOUT) {
            // accept stays blocked until some other connection arrives
            warn!(%err, wake_addr = %self.wake_addr, "can't wake accept loop");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

fn wake_addr(local: SocketAddr) -> SocketAddr {
    match local.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), local.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), local.port())
        }
        _ => local,
    }
}
