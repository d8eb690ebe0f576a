use std::io::{self, Read, Write};

use anyhow::{Context, Result};
use kasa_server::{Server, ServerConfig, TlsStream};
use tracing::{info, warn};

/// Echo server example that writes back every byte a client sends
///
/// Usage: `KASA_CERTS_DIR=certs cargo run --example echo -- 127.0.0.1 9443`
fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port = match args.next() {
        Some(port) => port.parse().context("Invalid port")?,
        None => 9443,
    };

    let config = ServerConfig::from_env(host, port);
    let server = Server::bind(&config).context("Failed to create echo server")?;

    let shutdown = server.shutdown_handle();
    ctrlc::set_handler(move || shutdown.shutdown()).context("Failed to install Ctrl+C handler")?;

    info!("Echo server listening on {}", server.local_addr());
    info!("Press Ctrl+C to stop the server");
    server.run(|mut stream| {
        if let Err(e) = echo(&mut stream) {
            warn!("Client error: {}", e);
        }
    });

    info!("Echo server shutdown completed");
    Ok(())
}

fn echo(stream: &mut TlsStream) -> io::Result<()> {
    info!(
        "Client connected: {} ({})",
        stream.peer_addr()?,
        stream.peer_fingerprint().unwrap_or_default()
    );

    let mut buf = [0u8; 4096];
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        stream.write_all(&buf[..n])?;
    }

    info!("Client disconnected");
    stream.shutdown()
}
