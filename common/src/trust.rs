use std::sync::Arc;

use rustls::{
    client::{
        danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
        WebPkiServerVerifier,
    },
    crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider, WebPkiSupportedAlgorithms},
    pki_types::{CertificateDer, ServerName, UnixTime},
    server::{
        danger::{ClientCertVerified, ClientCertVerifier},
        ParsedCertificate, WebPkiClientVerifier,
    },
    DigitallySignedStruct, DistinguishedName, RootCertStore, SignatureScheme,
};
use serde::{Deserialize, Serialize};

use crate::{config::KeySource, credential::parse_certificates, error::CredentialLoadError};

/// Which peer certificates an endpoint is willing to accept.
///
/// A server always demands a client certificate; the policy only decides which
/// presented certificates are good enough.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustPolicy {
    /// Accept any well-formed certificate whose holder proves possession of its key.
    ///
    /// Identity is expected to be checked out-of-band, for example by comparing
    /// [`TlsStream::peer_fingerprint`](crate::TlsStream::peer_fingerprint).
    #[default]
    AnyPresented,
    /// Require a chain to one of the CA certificates in this PEM bundle.
    Roots(KeySource),
}

impl TrustPolicy {
    /// Verifier the server uses to judge client certificates
    pub fn client_verifier(
        &self,
        provider: &Arc<CryptoProvider>,
    ) -> Result<Arc<dyn ClientCertVerifier>, CredentialLoadError> {
        match self {
            TrustPolicy::AnyPresented => Ok(Arc::new(AnyPresentedCert::new(provider))),
            TrustPolicy::Roots(bundle) => {
                let roots = root_store(bundle)?;
                let verifier =
                    WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone())
                        .build()?;
                Ok(verifier)
            }
        }
    }

    /// Verifier the client uses to judge the server certificate
    pub fn server_verifier(
        &self,
        provider: &Arc<CryptoProvider>,
    ) -> Result<Arc<dyn ServerCertVerifier>, CredentialLoadError> {
        match self {
            TrustPolicy::AnyPresented => Ok(Arc::new(AnyPresentedCert::new(provider))),
            TrustPolicy::Roots(bundle) => {
                let roots = root_store(bundle)?;
                let verifier: Arc<dyn ServerCertVerifier> =
                    WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider.clone())
                        .build()?;
                Ok(verifier)
            }
        }
    }
}

fn root_store(bundle: &KeySource) -> Result<RootCertStore, CredentialLoadError> {
    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(parse_certificates(bundle)?);
    tracing::debug!(%bundle, added, ignored, "loaded trust anchors");

    if roots.is_empty() {
        return Err(CredentialLoadError::EmptyTrustStore {
            origin: bundle.to_string(),
        });
    }
    Ok(roots)
}

/// Accepts any parsable end-entity certificate, in either direction.
///
/// Handshake signatures are still verified, so the peer must hold the private key
/// matching the certificate it presents.
#[derive(Debug)]
pub(crate) struct AnyPresentedCert {
    algorithms: WebPkiSupportedAlgorithms,
}

impl AnyPresentedCert {
    pub(crate) fn new(provider: &CryptoProvider) -> Self {
        Self {
            algorithms: provider.signature_verification_algorithms,
        }
    }
}

impl ServerCertVerifier for AnyPresentedCert {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        ParsedCertificate::try_from(end_entity)?;
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

impl ClientCertVerifier for AnyPresentedCert {
    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        ParsedCertificate::try_from(end_entity)?;
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }

    fn client_auth_mandatory(&self) -> bool {
        true
    }
}
