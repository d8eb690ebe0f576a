//! Kasa Client Library
//!
//! Dials a single mutually-authenticated TLS connection to a Kasa server and hands
//! back the established stream. The client always presents its own certificate;
//! the server certificate is judged by the configured
//! [`TrustPolicy`](kasa_common::TrustPolicy).
//!
//! # Example
//!
//! ```no_run
//! use std::io::{Read, Write};
//!
//! use kasa_client::{Client, ClientConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = ClientConfig::new("127.0.0.1", 9443, "certs/client.key.pem", "certs/client.pem");
//!
//! let mut client = Client::connect(&config)?;
//! client.write_all(b"ping")?;
//!
//! let mut reply = [0u8; 4];
//! client.read_exact(&mut reply)?;
//! client.shutdown()?;
//! # Ok(())
//! # }
//! ```

mod client;

pub use client::*;
// Re-export important types from kasa-common for convenience
pub use kasa_common::{ClientConfig, Error, KeySource, TlsStream, TrustPolicy};
