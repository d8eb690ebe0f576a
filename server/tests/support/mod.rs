#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::LazyLock,
    thread::{self, JoinHandle},
};

use kasa_client::ClientConfig;
use kasa_common::fingerprint;
use kasa_server::{KeySource, Server, ServerConfig, ShutdownHandle, TlsStream};
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose,
};

pub static SETUP: LazyLock<()> = LazyLock::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
});

/// A certificate + key pair held as inline PEM.
#[derive(Debug, Clone)]
pub struct Identity {
    pub cert_pem:    String,
    pub key_pem:     String,
    pub fingerprint: String,
}

impl Identity {
    pub fn self_signed() -> Self {
        let pair =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string(), "127.0.0.1".to_string()])
                .unwrap();
        Self {
            fingerprint: fingerprint(pair.cert.der()),
            cert_pem:    pair.cert.pem(),
            key_pem:     pair.key_pair.serialize_pem(),
        }
    }

    pub fn public_key(&self) -> KeySource {
        KeySource::Pem(self.cert_pem.clone())
    }

    pub fn private_key(&self) -> KeySource {
        KeySource::Pem(self.key_pem.clone())
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::new("127.0.0.1", 0, self.private_key(), self.public_key())
    }

    pub fn client_config(&self, server: SocketAddr) -> ClientConfig {
        ClientConfig::new(
            server.ip().to_string(),
            server.port(),
            self.private_key(),
            self.public_key(),
        )
    }
}

/// A throwaway certificate authority.
pub struct Authority {
    cert: rcgen::Certificate,
    key:  KeyPair,
}

impl Authority {
    pub fn new(name: &str) -> Self {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.distinguished_name.push(DnType::CommonName, name);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        let cert = params.self_signed(&key).unwrap();
        Self { cert, key }
    }

    pub fn bundle(&self) -> KeySource {
        KeySource::Pem(self.cert.pem())
    }

    pub fn issue(&self, name: &str) -> Identity {
        let key = KeyPair::generate().unwrap();
        let mut params =
            CertificateParams::new(vec!["localhost".to_string(), "127.0.0.1".to_string()])
                .unwrap();
        params.distinguished_name.push(DnType::CommonName, name);
        params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ServerAuth,
            ExtendedKeyUsagePurpose::ClientAuth,
        ];
        let cert = params.signed_by(&key, &self.cert, &self.key).unwrap();
        Identity {
            fingerprint: fingerprint(cert.der()),
            cert_pem:    cert.pem(),
            key_pem:     key.serialize_pem(),
        }
    }
}

/// A server running its accept loop on a background thread.
pub struct Running {
    pub addr:     SocketAddr,
    pub shutdown: ShutdownHandle,
    pub thread:   JoinHandle<()>,
}

impl Running {
    pub fn stop(self) {
        self.shutdown.shutdown();
        self.thread.join().unwrap();
    }
}

pub fn start<H>(config: &ServerConfig, handler: H) -> Running
where
    H: Fn(TlsStream) + Send + Sync + 'static,
{
    let server = Server::bind(config).unwrap();
    let addr = server.local_addr();
    let shutdown = server.shutdown_handle();
    let thread = thread::spawn(move || server.run(handler));
    Running {
        addr,
        shutdown,
        thread,
    }
}
