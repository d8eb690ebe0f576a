use std::{
    io::{self, Read, Write},
    net::{TcpStream, ToSocketAddrs},
    ops::{Deref, DerefMut},
    sync::Arc,
};

use kasa_common::{
    config::ClientConfig,
    credential::{CredentialProvider, PemFileProvider},
    error::Error,
    tls_stream::TlsStream,
};
use rustls::{pki_types::ServerName, ClientConnection};

/// One established, handshake-complete connection to a server.
///
/// There is no reconnection: once the stream closes the client is done.
#[derive(Debug)]
pub struct Client {
    stream: TlsStream,
}

impl Client {
    /// Dials the configured server, loading key material from PEM files or inline text.
    pub fn connect(config: &ClientConfig) -> Result<Self, Error> {
        Self::connect_with(config, &PemFileProvider)
    }

    /// Dials the configured server with key material resolved by `provider`.
    ///
    /// Single shot: one attempt per resolved address, in order, and no retry.
    pub fn connect_with<P>(config: &ClientConfig, provider: &P) -> Result<Self, Error>
    where
        P: CredentialProvider + ?Sized,
    {
        let address = config.address();

        let credential = provider.load(&config.public_key, &config.private_key)?;
        let tls_config = credential.client_config(&config.trust)?;

        let server_name = ServerName::try_from(config.remote_host.clone()).map_err(|e| {
            Error::Dial {
                address: address.clone(),
                source:  io::Error::new(io::ErrorKind::InvalidInput, e),
            }
        })?;

        let socket = dial(config).map_err(|source| Error::Dial {
            address: address.clone(),
            source,
        })?;
        tracing::debug!(%address, "socket connected, establishing TLS");

        let tls = ClientConnection::new(Arc::new(tls_config), server_name).map_err(|e| {
            Error::Handshake {
                address: address.clone(),
                source:  io::Error::new(io::ErrorKind::InvalidData, e),
            }
        })?;
        let stream = TlsStream::from_client(socket, tls).map_err(|source| Error::Handshake {
            address: address.clone(),
            source,
        })?;

        let peer = stream.peer_fingerprint().unwrap_or_default();
        tracing::info!(%address, %peer, "secure connection established");
        Ok(Self { stream })
    }

    pub fn into_stream(self) -> TlsStream {
        self.stream
    }
}

fn dial(config: &ClientConfig) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in (config.remote_host.as_str(), config.remote_port).to_socket_addrs()? {
        match TcpStream::connect(addr) {
            Ok(socket) => return Ok(socket),
            Err(err) => {
                tracing::debug!(%addr, %err, "connect attempt failed");
                last_err = Some(err);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::AddrNotAvailable, "no addresses resolved")
    }))
}

impl Deref for Client {
    type Target = TlsStream;

    fn deref(&self) -> &Self::Target {
        &self.stream
    }
}

impl DerefMut for Client {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.stream
    }
}

impl Read for Client {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for Client {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}
