mod support;

use std::{io::Write, time::Duration};

use crossbeam_channel::unbounded;
use kasa_client::Client;
use kasa_server::{Error, TlsStream, TrustPolicy};
use support::{start, Authority, Identity, SETUP};

const WAIT: Duration = Duration::from_secs(10);

#[test]
fn server_accepts_clients_issued_by_its_roots() {
    *SETUP;

    let ca = Authority::new("kasa test ca");
    let server_id = Identity::self_signed();
    let client_id = ca.issue("client");
    let (tx, rx) = unbounded();

    let config = server_id
        .server_config()
        .with_trust(TrustPolicy::Roots(ca.bundle()));
    let server = start(&config, move |stream: TlsStream| {
        tx.send(stream.peer_fingerprint()).unwrap();
    });

    let mut client = Client::connect(&client_id.client_config(server.addr)).unwrap();
    client.write_all(b"hello").unwrap();

    let peer = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(peer.as_deref(), Some(client_id.fingerprint.as_str()));

    server.stop();
}

#[test]
fn server_rejects_clients_outside_its_roots() {
    *SETUP;

    let ca = Authority::new("kasa test ca");
    let stranger_ca = Authority::new("someone else");
    let server_id = Identity::self_signed();
    let (tx, rx) = unbounded();

    let config = server_id
        .server_config()
        .with_trust(TrustPolicy::Roots(ca.bundle()));
    let server = start(&config, move |stream: TlsStream| {
        tx.send(stream.peer_fingerprint()).unwrap();
    });

    for outsider in [Identity::self_signed(), stranger_ca.issue("intruder")] {
        // the client side may complete under TLS 1.3; the server must still drop it
        if let Ok(mut client) = Client::connect(&outsider.client_config(server.addr)) {
            let _ = client.write_all(b"let me in");
            let _ = client.flush();
        }
    }

    let member = ca.issue("member");
    let _client = Client::connect(&member.client_config(server.addr)).unwrap();

    let peer = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(peer.as_deref(), Some(member.fingerprint.as_str()));
    assert!(rx.try_recv().is_err(), "handler ran for an untrusted client");

    server.stop();
}

#[test]
fn client_verifies_server_against_its_roots() {
    *SETUP;

    let ca = Authority::new("kasa test ca");
    let server_id = ca.issue("server");
    let client_id = Identity::self_signed();

    let server = start(&server_id.server_config(), |_stream: TlsStream| {});

    let config = client_id
        .client_config(server.addr)
        .with_trust(TrustPolicy::Roots(ca.bundle()));
    let client = Client::connect(&config).unwrap();
    assert_eq!(
        client.peer_fingerprint().as_deref(),
        Some(server_id.fingerprint.as_str())
    );

    server.stop();
}

#[test]
fn client_refuses_server_outside_its_roots() {
    *SETUP;

    let ca = Authority::new("kasa test ca");
    let server_id = Identity::self_signed();
    let client_id = Identity::self_signed();

    let server = start(&server_id.server_config(), |_stream: TlsStream| {});

    let config = client_id
        .client_config(server.addr)
        .with_trust(TrustPolicy::Roots(ca.bundle()));
    let err = Client::connect(&config).unwrap_err();
    assert!(matches!(err, Error::Handshake { .. }), "{err}");

    server.stop();
}
