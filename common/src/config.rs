use std::{borrow::Cow, env, fmt, fs, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{error::CredentialLoadError, trust::TrustPolicy};

const CERTS_DIR_ENV: &str = "KASA_CERTS_DIR";
const DEFAULT_CERTS_DIR: &str = "certs";

fn get_certs_dir() -> PathBuf {
    env::var(CERTS_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CERTS_DIR))
}

/// Where a piece of PEM key material comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySource {
    /// A PEM file on disk
    Path(PathBuf),
    /// PEM text held in memory
    Pem(String),
}

impl KeySource {
    /// Reads the raw PEM bytes.
    pub fn read(&self) -> Result<Cow<'_, [u8]>, CredentialLoadError> {
        match self {
            KeySource::Path(path) => fs::read(path)
                .map(Cow::Owned)
                .map_err(|source| CredentialLoadError::Read {
                    path: path.clone(),
                    source,
                }),
            KeySource::Pem(pem) => Ok(Cow::Borrowed(pem.as_bytes())),
        }
    }
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Path(path) => write!(f, "{}", path.display()),
            KeySource::Pem(_) => f.write_str("inline PEM"),
        }
    }
}

impl From<PathBuf> for KeySource {
    fn from(path: PathBuf) -> Self {
        KeySource::Path(path)
    }
}

impl From<&str> for KeySource {
    fn from(path: &str) -> Self {
        KeySource::Path(PathBuf::from(path))
    }
}

/// Certificate and key file locations for one role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertPaths {
    /// Path to the PEM certificate chain
    pub cert_path: PathBuf,
    /// Path to the PEM private key
    pub key_path:  PathBuf,
}

impl CertPaths {
    /// Resolves `<role>.pem` and `<role>.key.pem` inside `$KASA_CERTS_DIR`
    /// (or `certs` when the variable is unset).
    pub fn from_env(role: &str) -> Self {
        let base = get_certs_dir();
        Self {
            cert_path: base.join(format!("{role}.pem")),
            key_path:  base.join(format!("{role}.key.pem")),
        }
    }
}

/// Settings for dialing one remote peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub remote_host: String,
    pub remote_port: u16,
    pub private_key: KeySource,
    pub public_key:  KeySource,
    /// How the server's certificate is judged
    #[serde(default)]
    pub trust:       TrustPolicy,
}

impl ClientConfig {
    pub fn new(
        remote_host: impl Into<String>,
        remote_port: u16,
        private_key: impl Into<KeySource>,
        public_key: impl Into<KeySource>,
    ) -> Self {
        Self {
            remote_host: remote_host.into(),
            remote_port,
            private_key: private_key.into(),
            public_key: public_key.into(),
            trust: TrustPolicy::default(),
        }
    }

    /// Client settings using `client.pem` / `client.key.pem` from the certs directory
    pub fn from_env(remote_host: impl Into<String>, remote_port: u16) -> Self {
        let paths = CertPaths::from_env("client");
        Self::new(remote_host, remote_port, paths.key_path, paths.cert_path)
    }

    pub fn with_trust(mut self, trust: TrustPolicy) -> Self {
        self.trust = trust;
        self
    }

    /// `host:port`, with IPv6 literals bracketed
    pub fn address(&self) -> String {
        join_host_port(&self.remote_host, self.remote_port)
    }
}

/// Settings for the listening side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_host:   String,
    pub bind_port:   u16,
    pub private_key: KeySource,
    pub public_key:  KeySource,
    /// How client certificates are judged
    #[serde(default)]
    pub trust:       TrustPolicy,
}

impl ServerConfig {
    pub fn new(
        bind_host: impl Into<String>,
        bind_port: u16,
        private_key: impl Into<KeySource>,
        public_key: impl Into<KeySource>,
    ) -> Self {
        Self {
            bind_host: bind_host.into(),
            bind_port,
            private_key: private_key.into(),
            public_key: public_key.into(),
            trust: TrustPolicy::default(),
        }
    }

    /// Server settings using `server.pem` / `server.key.pem` from the certs directory
    pub fn from_env(bind_host: impl Into<String>, bind_port: u16) -> Self {
        let paths = CertPaths::from_env("server");
        Self::new(bind_host, bind_port, paths.key_path, paths.cert_path)
    }

    pub fn with_trust(mut self, trust: TrustPolicy) -> Self {
        self.trust = trust;
        self
    }

    /// `host:port`, with IPv6 literals bracketed
    pub fn address(&self) -> String {
        join_host_port(&self.bind_host, self.bind_port)
    }
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
