use std::io::{Read, Write};

use anyhow::{Context, Result};
use kasa_client::{Client, ClientConfig};
use tracing::info;

/// Dials the echo server example and checks that "ping" comes back unchanged.
///
/// Usage: `KASA_CERTS_DIR=certs cargo run --example ping -- 127.0.0.1 9443`
fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port = match args.next() {
        Some(port) => port.parse().context("Invalid port")?,
        None => 9443,
    };

    let config = ClientConfig::from_env(host, port);
    info!("Certificate: {}", config.public_key);
    info!("Private key: {}", config.private_key);

    let mut client = Client::connect(&config).context("Failed to connect to server")?;
    info!(
        "Connected to {} (server fingerprint {})",
        config.address(),
        client.peer_fingerprint().unwrap_or_default()
    );

    client.write_all(b"ping").context("Failed to send ping")?;
    let mut reply = [0u8; 4];
    client
        .read_exact(&mut reply)
        .context("Failed to read reply")?;
    info!("Received: {}", String::from_utf8_lossy(&reply));

    client.shutdown().context("Failed to close connection")?;
    Ok(())
}
