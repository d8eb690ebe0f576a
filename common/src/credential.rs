use std::{io::BufReader, sync::Arc};

use rustls::{
    client::ResolvesClientCert,
    crypto::CryptoProvider,
    pki_types::{CertificateDer, PrivateKeyDer},
    server::{ClientHello, ResolvesServerCert},
    sign::CertifiedKey,
    ClientConfig as RustlsClientConfig, InconsistentKeys, ServerConfig as RustlsServerConfig,
    SignatureScheme,
};
use rustls_pemfile::{certs, private_key};
use sha2::{Digest, Sha256};

use crate::{config::KeySource, error::CredentialLoadError, trust::TrustPolicy};

/// Anything able to turn a (public, private) pair of key material references into
/// a [`Credential`].
pub trait CredentialProvider: Send + Sync {
    fn load(&self, public: &KeySource, private: &KeySource)
        -> Result<Credential, CredentialLoadError>;
}

/// Loads PEM certificates and keys from files or inline text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PemFileProvider;

impl CredentialProvider for PemFileProvider {
    fn load(
        &self,
        public: &KeySource,
        private: &KeySource,
    ) -> Result<Credential, CredentialLoadError> {
        Credential::load(public, private)
    }
}

/// A certificate chain with its matching private key.
///
/// Loaded once per endpoint and never mutated; clones share the same key.
#[derive(Debug, Clone)]
pub struct Credential {
    certified:   Arc<CertifiedKey>,
    provider:    Arc<CryptoProvider>,
    fingerprint: String,
}

impl Credential {
    /// Loads and validates a key pair with the default crypto provider.
    pub fn load(public: &KeySource, private: &KeySource) -> Result<Self, CredentialLoadError> {
        Self::load_with_provider(public, private, default_provider())
    }

    /// Loads and validates a key pair, checking the private key against the leaf
    /// certificate's public key.
    pub fn load_with_provider(
        public: &KeySource,
        private: &KeySource,
        provider: Arc<CryptoProvider>,
    ) -> Result<Self, CredentialLoadError> {
        let chain = parse_certificates(public)?;
        let key = parse_private_key(private)?;
        let fingerprint = fingerprint(&chain[0]);

        let certified = CertifiedKey::from_der(chain, key, &provider).map_err(key_error)?;
        match certified.keys_match() {
            Ok(()) | Err(rustls::Error::InconsistentKeys(InconsistentKeys::Unknown)) => {}
            Err(e) => return Err(key_error(e)),
        }

        tracing::debug!(%public, %fingerprint, "loaded key pair");
        Ok(Self {
            certified: Arc::new(certified),
            provider,
            fingerprint,
        })
    }

    /// The certificate chain, leaf first
    pub fn certificate_chain(&self) -> &[CertificateDer<'static>] {
        &self.certified.cert
    }

    /// Lowercase hex SHA-256 of the leaf certificate
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// rustls settings for dialing with this identity
    pub fn client_config(
        &self,
        trust: &TrustPolicy,
    ) -> Result<RustlsClientConfig, CredentialLoadError> {
        let verifier = trust.server_verifier(&self.provider)?;
        let config = RustlsClientConfig::builder_with_provider(self.provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(CredentialLoadError::Unsupported)?
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_client_cert_resolver(Arc::new(self.clone()));
        Ok(config)
    }

    /// rustls settings for accepting with this identity; client certificates are
    /// mandatory.
    pub fn server_config(
        &self,
        trust: &TrustPolicy,
    ) -> Result<RustlsServerConfig, CredentialLoadError> {
        let verifier = trust.client_verifier(&self.provider)?;
        let config = RustlsServerConfig::builder_with_provider(self.provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(CredentialLoadError::Unsupported)?
            .with_client_cert_verifier(verifier)
            .with_cert_resolver(Arc::new(self.clone()));
        Ok(config)
    }
}

impl ResolvesServerCert for Credential {
    fn resolve(&self, _hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        Some(self.certified.clone())
    }
}

impl ResolvesClientCert for Credential {
    fn resolve(
        &self,
        _root_hint_subjects: &[&[u8]],
        _sigschemes: &[SignatureScheme],
    ) -> Option<Arc<CertifiedKey>> {
        Some(self.certified.clone())
    }

    fn has_certs(&self) -> bool {
        true
    }
}

pub(crate) fn default_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::aws_lc_rs::default_provider())
}

/// Lowercase hex SHA-256 of a DER certificate
pub fn fingerprint(cert: &CertificateDer<'_>) -> String {
    hex::encode(Sha256::digest(cert.as_ref()))
}

pub(crate) fn parse_certificates(
    source: &KeySource,
) -> Result<Vec<CertificateDer<'static>>, CredentialLoadError> {
    let pem = source.read()?;
    let chain = certs(&mut BufReader::new(&*pem))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CredentialLoadError::Parse {
            origin: source.to_string(),
            source: e,
        })?;

    if chain.is_empty() {
        return Err(CredentialLoadError::NoCertificate {
            origin: source.to_string(),
        });
    }
    Ok(chain)
}

fn parse_private_key(source: &KeySource) -> Result<PrivateKeyDer<'static>, CredentialLoadError> {
    let pem = source.read()?;
    private_key(&mut BufReader::new(&*pem))
        .map_err(|e| CredentialLoadError::Parse {
            origin: source.to_string(),
            source: e,
        })?
        .ok_or_else(|| CredentialLoadError::NoPrivateKey {
            origin: source.to_string(),
        })
}

fn key_error(e: rustls::Error) -> CredentialLoadError {
    match e {
        rustls::Error::InconsistentKeys(_) => CredentialLoadError::Mismatch,
        e => CredentialLoadError::Unsupported(e),
    }
}
