//! Certificate authorities the service signs with.
//!
//! Authorities are loaded once at startup from PEM files and stay read-only
//! afterwards. Loading stops at the first authority that cannot be used.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};
use x509_cert::name::Name;

use crate::cert::identifiers::subject_key_identifier;
use crate::cert::{Certificate, common_name};
use crate::error::{PkiError, Result};
use crate::issuer::Issuer;
use crate::key::KeyPair;

/// Where to find one authority's certificate and private key.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct AuthorityConfig {
    /// Name callers use to select the authority.
    pub name: String,
    /// PEM `CERTIFICATE` file.
    #[serde(rename = "certificatefile", alias = "certificate_file")]
    pub certificate_file: PathBuf,
    /// PEM private key file, PKCS#1 or PKCS#8.
    #[serde(rename = "privatekeyfile", alias = "private_key_file")]
    pub private_key_file: PathBuf,
}

impl AuthorityConfig {
    pub fn new(
        name: impl Into<String>,
        certificate_file: impl Into<PathBuf>,
        private_key_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            certificate_file: certificate_file.into(),
            private_key_file: private_key_file.into(),
        }
    }
}

/// A loaded authority: its certificate and the matching signing key.
#[derive(Clone, Debug)]
pub struct Authority {
    name: String,
    certificate: Certificate,
    key: KeyPair,
}

impl Authority {
    /// Builds an authority from PEM text, checking that the key belongs to
    /// the certificate.
    pub fn from_pem(name: &str, certificate_pem: &str, key_pem: &str) -> Result<Self> {
        let certificate = Certificate::from_pem(certificate_pem)
            .map_err(|e| PkiError::authority_load(name, format!("certificate: {e}")))?;
        let key = KeyPair::from_pem(key_pem)
            .map_err(|e| PkiError::authority_load(name, format!("private key: {e}")))?;

        let key_spki = key
            .as_spki()
            .map_err(|e| PkiError::authority_load(name, e))?;
        if &key_spki != certificate.subject_public_key_info() {
            return Err(PkiError::authority_load(
                name,
                "private key does not match the certificate public key",
            ));
        }

        Ok(Self {
            name: name.to_string(),
            certificate,
            key,
        })
    }

    /// Reads the files named by `config`.
    pub fn load(config: &AuthorityConfig) -> Result<Self> {
        let certificate_pem = read_pem_file(&config.name, &config.certificate_file)?;
        let key_pem = read_pem_file(&config.name, &config.private_key_file)?;
        Self::from_pem(&config.name, &certificate_pem, &key_pem)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn key(&self) -> &KeyPair {
        &self.key
    }
}

fn read_pem_file(name: &str, path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| PkiError::authority_load(name, format!("{}: {e}", path.display())))
}

impl Issuer for Authority {
    fn issuer_name(&self) -> &Name {
        self.certificate.subject()
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key
    }

    /// The authority certificate's own SKI, or the SHA-1 of its public key
    /// bits when the certificate has none.
    fn key_identifier(&self) -> Result<Vec<u8>> {
        match self.certificate.subject_key_identifier()? {
            Some(ski) => Ok(ski),
            None => Ok(subject_key_identifier(self.certificate.subject_public_key_info())?.to_vec()),
        }
    }
}

/// The set of authorities, keyed by name.
#[derive(Clone, Debug, Default)]
pub struct AuthorityStore {
    authorities: HashMap<String, Authority>,
}

impl AuthorityStore {
    /// A store with no authorities; every lookup fails.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads every configured authority, failing on the first one that
    /// cannot be read, parsed or matched with its key.
    pub fn load(configs: &[AuthorityConfig]) -> Result<Self> {
        let mut authorities = Vec::with_capacity(configs.len());
        for config in configs {
            debug!(
                authority = %config.name,
                certificate = %config.certificate_file.display(),
                "loading authority"
            );
            authorities.push(Authority::load(config)?);
        }
        Self::from_authorities(authorities)
    }

    /// Builds a store from already loaded authorities. Names must be unique.
    pub fn from_authorities(authorities: Vec<Authority>) -> Result<Self> {
        let mut map = HashMap::with_capacity(authorities.len());
        for authority in authorities {
            if map.contains_key(authority.name()) {
                return Err(PkiError::authority_load(
                    authority.name(),
                    "duplicate authority name",
                ));
            }
            info!(
                authority = %authority.name(),
                subject = %authority.certificate().subject(),
                common_name = %common_name(authority.certificate().subject()).unwrap_or_default(),
                key = authority.key().algorithm_name(),
                "authority loaded"
            );
            map.insert(authority.name().to_string(), authority);
        }
        Ok(Self { authorities: map })
    }

    /// Finds an authority by exact name.
    pub fn lookup(&self, name: &str) -> Result<&Authority> {
        self.authorities
            .get(name)
            .ok_or_else(|| PkiError::UnknownAuthority(name.to_string()))
    }

    /// Authority names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.authorities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.authorities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.authorities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(file: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(file)
    }

    fn read_fixture(file: &str) -> String {
        std::fs::read_to_string(fixture(file)).unwrap()
    }

    #[test]
    fn test_load_pkcs1_and_pkcs8_authorities() {
        let store = AuthorityStore::load(&[
            AuthorityConfig::new("AC1", fixture("ac1.crt"), fixture("ac1.key")),
            AuthorityConfig::new("AC2", fixture("ac2.crt"), fixture("ac2.key")),
        ])
        .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.names(), vec!["AC1", "AC2"]);

        let ac1 = store.lookup("AC1").unwrap();
        assert_eq!(ac1.key().algorithm_name(), "RSA");
        assert_eq!(
            common_name(ac1.issuer_name()).as_deref(),
            Some("Example Root AC1")
        );
        let ac2 = store.lookup("AC2").unwrap();
        assert_eq!(ac2.key().algorithm_name(), "ECDSA P-256");
    }

    #[test]
    fn test_lookup_is_exact() {
        let store = AuthorityStore::load(&[AuthorityConfig::new(
            "AC1",
            fixture("ac1.crt"),
            fixture("ac1.key"),
        )])
        .unwrap();
        for name in ["ac1", "AC1 ", "", "AC2"] {
            assert!(matches!(
                store.lookup(name),
                Err(PkiError::UnknownAuthority(_))
            ));
        }
        assert!(AuthorityStore::empty().lookup("AC1").is_err());
    }

    #[test]
    fn test_mismatched_key_is_rejected() {
        let err = Authority::from_pem("AC2", &read_fixture("ac2.crt"), &read_fixture("other.key"))
            .unwrap_err();
        assert!(matches!(err, PkiError::AuthorityLoad { ref name, .. } if name == "AC2"));
    }

    #[test]
    fn test_certificate_bundle_uses_the_first_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = dir.path().join("ac1-bundle.crt");
        std::fs::write(
            &bundle,
            format!("{}{}", read_fixture("ac1.crt"), read_fixture("ac2.crt")),
        )
        .unwrap();

        let store =
            AuthorityStore::load(&[AuthorityConfig::new("AC1", bundle, fixture("ac1.key"))])
                .unwrap();
        let ac1 = store.lookup("AC1").unwrap();
        assert_eq!(
            common_name(ac1.certificate().subject()).as_deref(),
            Some("Example Root AC1")
        );
    }

    #[test]
    fn test_missing_file_fails_the_whole_load() {
        let err = AuthorityStore::load(&[
            AuthorityConfig::new("AC1", fixture("ac1.crt"), fixture("ac1.key")),
            AuthorityConfig::new("AC3", fixture("missing.crt"), fixture("ac1.key")),
        ])
        .unwrap_err();
        assert!(matches!(err, PkiError::AuthorityLoad { ref name, .. } if name == "AC3"));
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let ac1 = Authority::from_pem("AC1", &read_fixture("ac1.crt"), &read_fixture("ac1.key"))
            .unwrap();
        let err = AuthorityStore::from_authorities(vec![ac1.clone(), ac1]).unwrap_err();
        assert!(matches!(err, PkiError::AuthorityLoad { .. }));
    }

    #[test]
    fn test_key_identifier_comes_from_the_ca_certificate() {
        let ac2 = Authority::from_pem("AC2", &read_fixture("ac2.crt"), &read_fixture("ac2.key"))
            .unwrap();
        assert_eq!(
            ac2.key_identifier().unwrap(),
            ac2.certificate().subject_key_identifier().unwrap().unwrap()
        );
    }
}
