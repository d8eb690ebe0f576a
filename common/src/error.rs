use std::{io, path::PathBuf};

use rustls::server::VerifierBuilderError;

/// Failure to turn key material into a usable [`Credential`](crate::Credential).
///
/// Every variant means no credential was produced; there is never partial state.
#[derive(Debug, thiserror::Error)]
pub enum CredentialLoadError {
    #[error("can't read {path:?}: {source}")]
    Read {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed PEM in {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: io::Error,
    },

    #[error("no certificate found in {origin}")]
    NoCertificate { origin: String },

    #[error("no private key found in {origin}")]
    NoPrivateKey { origin: String },

    #[error("private key does not match the certificate")]
    Mismatch,

    #[error("key material rejected: {0}")]
    Unsupported(#[source] rustls::Error),

    #[error("no usable trust anchors in {origin}")]
    EmptyTrustStore { origin: String },

    #[error("invalid trust anchors: {0}")]
    Verifier(#[from] VerifierBuilderError),
}

/// Errors surfaced by endpoint construction and by the client's dial.
///
/// Per-connection failures on the server side are never returned; the accept loop
/// reports them as log events and keeps serving.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("can't load key pair: {0}")]
    CredentialLoad(#[from] CredentialLoadError),

    #[error("can't listen on {address}: {source}")]
    Listen {
        address: String,
        #[source]
        source:  io::Error,
    },

    #[error("can't dial {address}: {source}")]
    Dial {
        address: String,
        #[source]
        source:  io::Error,
    },

    #[error("handshake with {address} is unsuccessful: {source}")]
    Handshake {
        address: String,
        #[source]
        source:  io::Error,
    },
}
