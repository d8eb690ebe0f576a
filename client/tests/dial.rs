use std::net::TcpListener;

use kasa_client::{Client, ClientConfig, Error, KeySource};
use kasa_common::CredentialLoadError;

fn key_pair() -> (KeySource, KeySource) {
    let pair = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    (
        KeySource::Pem(pair.key_pair.serialize_pem()),
        KeySource::Pem(pair.cert.pem()),
    )
}

/// A loopback port nothing listens on.
fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[test]
fn refused_connection_is_a_dial_error() {
    let (private_key, public_key) = key_pair();
    let config = ClientConfig::new("127.0.0.1", closed_port(), private_key, public_key);

    match Client::connect(&config) {
        Err(Error::Dial { address, .. }) => assert_eq!(address, config.address()),
        other => panic!("expected dial error, got {other:?}"),
    }
}

#[test]
fn unresolvable_host_is_a_dial_error() {
    let (private_key, public_key) = key_pair();
    let config = ClientConfig::new("host.invalid", 9443, private_key, public_key);

    let err = Client::connect(&config).unwrap_err();
    assert!(matches!(err, Error::Dial { .. }), "{err}");
}

#[test]
fn bad_key_material_fails_before_dialing() {
    let (_, public_key) = key_pair();
    let config = ClientConfig::new(
        "127.0.0.1",
        closed_port(),
        "/missing/client.key.pem",
        public_key,
    );

    let err = Client::connect(&config).unwrap_err();
    assert!(
        matches!(err, Error::CredentialLoad(CredentialLoadError::Read { .. })),
        "{err}"
    );
}

#[test]
fn mismatched_key_pair_is_a_credential_error() {
    let (_, public_key) = key_pair();
    let (other_private, _) = key_pair();
    let config = ClientConfig::new("127.0.0.1", closed_port(), other_private, public_key);

    let err = Client::connect(&config).unwrap_err();
    assert!(
        matches!(err, Error::CredentialLoad(CredentialLoadError::Mismatch)),
        "{err}"
    );
}
