use std::{
    io::{self, Read, Write},
    net::{Shutdown, SocketAddr, TcpStream},
    time::Duration,
};

use rustls::{
    pki_types::CertificateDer, ClientConnection, Connection, ProtocolVersion, ServerConnection,
};

use crate::credential::fingerprint;

/// Synchronous TLS stream over TCP.
///
/// Values only exist after a completed handshake, so every byte read from one
/// comes from an authenticated peer.
pub struct TlsStream {
    socket: TcpStream,
    tls:    Connection,
}

impl TlsStream {
    /// Wrap an accepted socket and complete the server side of the handshake
    pub fn from_server(socket: TcpStream, tls: ServerConnection) -> io::Result<Self> {
        let mut stream = Self {
            socket,
            tls: Connection::Server(tls),
        };
        stream.complete_handshake()?;
        Ok(stream)
    }

    /// Wrap a dialed socket and complete the client side of the handshake
    pub fn from_client(socket: TcpStream, tls: ClientConnection) -> io::Result<Self> {
        let mut stream = Self {
            socket,
            tls: Connection::Client(tls),
        };
        stream.complete_handshake()?;
        Ok(stream)
    }

    fn complete_handshake(&mut self) -> io::Result<()> {
        while self.tls.is_handshaking() {
            self.tls.complete_io(&mut self.socket)?;
        }
        // the last flight (client Finished, server tickets) may still be queued
        self.write_pending()
    }

    fn write_pending(&mut self) -> io::Result<()> {
        while self.tls.wants_write() {
            self.tls.write_tls(&mut self.socket)?;
        }
        self.socket.flush()
    }

    /// Certificates the peer presented, leaf first
    pub fn peer_certificates(&self) -> Option<&[CertificateDer<'static>]> {
        self.tls.peer_certificates()
    }

    /// Lowercase hex SHA-256 of the peer's leaf certificate
    pub fn peer_fingerprint(&self) -> Option<String> {
        self.peer_certificates()
            .and_then(|chain| chain.first())
            .map(fingerprint)
    }

    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        self.tls.protocol_version()
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.socket.peer_addr()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.socket.set_read_timeout(timeout)
    }

    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.socket.set_write_timeout(timeout)
    }

    /// Send close_notify and close the write half.
    ///
    /// The peer then reads a clean end of stream.
    pub fn shutdown(&mut self) -> io::Result<()> {
        self.tls.send_close_notify();
        self.write_pending()?;
        self.socket.shutdown(Shutdown::Write)
    }
}

impl Read for TlsStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            // Ok(0) after close_notify, UnexpectedEof on truncation
            match self.tls.reader().read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e),
            }

            self.tls.read_tls(&mut self.socket)?;
            if let Err(e) = self.tls.process_new_packets() {
                // best effort: let the peer see the alert
                let _ = self.write_pending();
                return Err(io::Error::new(io::ErrorKind::InvalidData, e));
            }
            self.write_pending()?;
        }
    }
}

impl Write for TlsStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.tls.writer().write(buf)?;
        self.write_pending()?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.tls.writer().flush()?;
        self.write_pending()
    }
}

impl std::fmt::Debug for TlsStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsStream")
            .field("socket", &self.socket)
            .field("protocol_version", &self.tls.protocol_version())
            .finish_non_exhaustive()
    }
}
