#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use certgate::authority::{AuthorityConfig, AuthorityStore};
use certgate::issuer::{CertificateIssuer, IssuancePolicy};

/// SHA-1 of the public key bits of `test.example.com.csr`.
pub const TEST_CSR_SKI: &str = "3dd39bc78e0447f2580ccb3e9eb01da30b704a38";

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

pub fn read_fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).unwrap()
}

/// Base64 of a fixture file, the way clients send requests.
pub fn transport_fixture(name: &str) -> String {
    STANDARD.encode(read_fixture(name))
}

pub fn authority_configs() -> Vec<AuthorityConfig> {
    vec![
        AuthorityConfig::new("ac1", fixture_path("ac1.crt"), fixture_path("ac1.key")),
        AuthorityConfig::new("ac2", fixture_path("ac2.crt"), fixture_path("ac2.key")),
    ]
}

pub fn load_store() -> AuthorityStore {
    AuthorityStore::load(&authority_configs()).unwrap()
}

pub fn issuer_with(store: AuthorityStore, validity_days: i64) -> CertificateIssuer {
    CertificateIssuer::new(
        Arc::new(store),
        IssuancePolicy::builder()
            .validity(time::Duration::days(validity_days))
            .build(),
    )
}

pub fn issuer() -> CertificateIssuer {
    issuer_with(load_store(), 365)
}

pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
