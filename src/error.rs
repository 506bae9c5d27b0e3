//! The error type shared by every certgate operation.

use thiserror::Error;

/// Represents errors that can occur while loading authorities, issuing
/// certificates or generating keys.
///
/// Request-scoped variants are reported back to the caller, startup-scoped
/// ones (`Config`, `AuthorityLoad`) abort the service.
#[derive(Debug, Error, Clone)]
pub enum PkiError {
    /// Unreadable or malformed configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A configured authority could not be loaded.
    #[error("Failed to load authority '{name}': {reason}")]
    AuthorityLoad { name: String, reason: String },

    /// The certificate signing request could not be decoded or is not acceptable.
    #[error("Invalid certificate request: {0}")]
    CsrDecode(String),

    /// The requested authority is not part of the loaded set.
    #[error("Unknown authority: {0}")]
    UnknownAuthority(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The certificate could not be signed.
    #[error("Signing error: {0}")]
    Signing(String),

    /// Error during key generation or key encryption.
    #[error("Key generation error: {0}")]
    KeyGeneration(String),

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    Encoding(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    Decoding(String),
}

impl PkiError {
    /// Returns true when the error was caused by the caller's input rather
    /// than by the service itself.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PkiError::CsrDecode(_) | PkiError::UnknownAuthority(_) | PkiError::InvalidInput(_)
        )
    }

    pub(crate) fn authority_load(name: &str, reason: impl ToString) -> Self {
        PkiError::AuthorityLoad {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<der::Error> for PkiError {
    /// Converts a `der::Error` into a `PkiError`.
    fn from(err: der::Error) -> Self {
        PkiError::Decoding(err.to_string())
    }
}

impl From<pkcs8::Error> for PkiError {
    fn from(err: pkcs8::Error) -> Self {
        PkiError::Decoding(err.to_string())
    }
}

impl From<pkcs8::spki::Error> for PkiError {
    fn from(err: pkcs8::spki::Error) -> Self {
        PkiError::Decoding(err.to_string())
    }
}

impl From<rsa::pkcs1::Error> for PkiError {
    fn from(err: rsa::pkcs1::Error) -> Self {
        PkiError::Decoding(err.to_string())
    }
}

impl From<rsa::Error> for PkiError {
    fn from(err: rsa::Error) -> Self {
        PkiError::KeyGeneration(err.to_string())
    }
}

impl From<std::io::Error> for PkiError {
    fn from(err: std::io::Error) -> Self {
        PkiError::Config(err.to_string())
    }
}

impl From<pem::PemError> for PkiError {
    fn from(err: pem::PemError) -> Self {
        PkiError::Decoding(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PkiError>;
