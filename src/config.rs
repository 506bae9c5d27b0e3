//! Service configuration, read from a YAML file.
//!
//! Every section is optional. Without a file the service listens on
//! `0.0.0.0:8080` over plain HTTP with no authorities loaded.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use zeroize::Zeroizing;

use crate::authority::AuthorityConfig;
use crate::error::{PkiError, Result};
use crate::issuer::IssuancePolicy;
use crate::keygen::{DEFAULT_KEY_SIZE, DEFAULT_PBKDF2_ITERATIONS, KeyGenerator, SUPPORTED_KEY_SIZES};

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub authorities: Vec<AuthorityConfig>,
    pub issuance: IssuanceConfig,
    pub keygen: KeygenConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_address: String,
    /// Kept as a string, the way the port has always been written.
    pub port: String,
    pub tls: bool,
    /// Client CA bundle. Accepted for compatibility, client certificates
    /// are not checked.
    pub tlsca: Option<PathBuf>,
    pub tlscertificatefile: Option<PathBuf>,
    pub tlsprivatekeyfile: Option<PathBuf>,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0".to_string(),
            port: "8080".to_string(),
            tls: false,
            tlsca: None,
            tlscertificatefile: None,
            tlsprivatekeyfile: None,
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> Result<SocketAddr> {
        let port = self.port()?;
        format!("{}:{port}", self.listen_address)
            .parse::<SocketAddr>()
            .or_else(|_| {
                // Bracket bare IPv6 addresses.
                format!("[{}]:{port}", self.listen_address).parse::<SocketAddr>()
            })
            .map_err(|e| {
                PkiError::Config(format!(
                    "invalid listen address '{}': {e}",
                    self.listen_address
                ))
            })
    }

    fn port(&self) -> Result<u16> {
        match self.port.trim().parse::<u16>() {
            Ok(0) | Err(_) => Err(PkiError::Config(format!("invalid port '{}'", self.port))),
            Ok(port) => Ok(port),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct IssuanceConfig {
    /// Lifetime of issued certificates.
    pub validity_days: u32,
    /// Check each request's self-signature before issuing. While on, requests
    /// signed with an unsupported algorithm such as `sha1WithRSAEncryption`
    /// are rejected.
    pub verify_csr_signature: bool,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            validity_days: 365,
            verify_csr_signature: true,
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct KeygenConfig {
    pub passphrase: Option<Zeroizing<String>>,
    pub default_bits: usize,
    pub pbkdf2_iterations: u32,
}

impl Default for KeygenConfig {
    fn default() -> Self {
        Self {
            passphrase: None,
            default_bits: DEFAULT_KEY_SIZE,
            pbkdf2_iterations: DEFAULT_PBKDF2_ITERATIONS,
        }
    }
}

impl std::fmt::Debug for KeygenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeygenConfig")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .field("default_bits", &self.default_bits)
            .field("pbkdf2_iterations", &self.pbkdf2_iterations)
            .finish()
    }
}

impl Settings {
    /// Loads settings from `path`, or returns the defaults when no path is
    /// given. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            None => Self::default(),
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    PkiError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                Self::from_yaml(&text)
                    .map_err(|e| PkiError::Config(format!("{}: {e}", path.display())))?
            }
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_yaml(text: &str) -> std::result::Result<Self, serde_yaml::Error> {
        // An empty document is a valid, empty configuration.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    pub fn validate(&self) -> Result<()> {
        self.server.bind_address()?;
        if self.server.tls
            && (self.server.tlscertificatefile.is_none() || self.server.tlsprivatekeyfile.is_none())
        {
            return Err(PkiError::Config(
                "tls is enabled but tlscertificatefile or tlsprivatekeyfile is missing".to_string(),
            ));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(PkiError::Config("request_timeout_secs must be positive".to_string()));
        }
        if self.issuance.validity_days == 0 {
            return Err(PkiError::Config("validity_days must be positive".to_string()));
        }
        if !SUPPORTED_KEY_SIZES.contains(&self.keygen.default_bits) {
            return Err(PkiError::Config(format!(
                "default_bits must be one of {SUPPORTED_KEY_SIZES:?}"
            )));
        }
        if self.keygen.pbkdf2_iterations == 0 {
            return Err(PkiError::Config("pbkdf2_iterations must be positive".to_string()));
        }
        if self.keygen.passphrase.as_ref().is_some_and(|p| p.is_empty()) {
            return Err(PkiError::Config("keygen passphrase must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn issuance_policy(&self) -> IssuancePolicy {
        IssuancePolicy::builder()
            .validity(time::Duration::days(i64::from(self.issuance.validity_days)))
            .verify_csr_signature(self.issuance.verify_csr_signature)
            .build()
    }

    pub fn key_generator(&self) -> KeyGenerator {
        KeyGenerator::builder()
            .maybe_passphrase(self.keygen.passphrase.clone())
            .default_bits(self.keygen.default_bits)
            .pbkdf2_iterations(self.keygen.pbkdf2_iterations)
            .build()
    }
}
