//! Kasa Common Library
//!
//! Shared pieces of the Kasa client and server endpoints:
//!
//! - Key material sources and endpoint configuration
//! - Credential loading (certificate chain + matching private key)
//! - Trust policies deciding which peer certificates are accepted
//! - A synchronous TLS stream over TCP
//! - The error taxonomy both endpoints report
//!
//! # Features
//!
//! - **Mutual TLS**: both sides always present a certificate
//! - **Explicit trust**: accept any presented certificate, or require a CA bundle
//! - **Fingerprints**: SHA-256 identities for out-of-band peer verification

/// Configuration structures and key material sources
pub mod config;

/// Certificate and private key loading
pub mod credential;

/// Error types for endpoints and credential loading
pub mod error;

/// TLS stream wrapper for encrypted TCP communication
pub mod tls_stream;

/// Peer certificate acceptance policies
pub mod trust;

// Re-export commonly used types for convenience
pub use config::{CertPaths, ClientConfig, KeySource, ServerConfig};
pub use credential::{fingerprint, Credential, CredentialProvider, PemFileProvider};
pub use error::{CredentialLoadError, Error};
pub use tls_stream::TlsStream;
pub use trust::TrustPolicy;
