//! # certgate - certificate issuance service
//!
//! certgate signs PKCS#10 certificate signing requests with one of a set of
//! configured certificate authorities, and hands out freshly generated RSA
//! keys encrypted under a passphrase. Everything is built on the rustcrypto
//! crates; openssl is only used by the tests as an independent parser.
//!
//! ## Supported Key Types
//!
//! Authorities may sign with:
//! - **RSA** keys, PKCS#1 or PKCS#8 encoded (sha256WithRSAEncryption)
//! - **ECDSA** P-256 and P-384 keys (ecdsa-with-SHA256 / SHA384)
//! - **Ed25519** keys
//!
//! Requests signed with any of these algorithms are accepted.
//!
//! ## Issued Certificates
//!
//! Every issued certificate copies the subject and DNS names of the request
//! and carries a fixed server/client profile: `digitalSignature` and
//! `keyEncipherment` key usages, `serverAuth` and `clientAuth` extended key
//! usages, subject and authority key identifiers, and a random 128-bit
//! serial number.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use certgate::authority::{AuthorityConfig, AuthorityStore};
//! use certgate::issuer::{CertificateIssuer, IssuancePolicy};
//!
//! # fn main() -> Result<(), certgate::error::PkiError> {
//! let store = AuthorityStore::load(&[AuthorityConfig::new("ac1", "ac1.crt", "ac1.key")])?;
//! let issuer = CertificateIssuer::new(
//!     Arc::new(store),
//!     IssuancePolicy::builder()
//!         .validity(time::Duration::days(365))
//!         .build(),
//! );
//!
//! let csr_base64 = std::fs::read_to_string("request.csr.b64").unwrap();
//! let pem = issuer.issue(&csr_base64, "ac1")?;
//! println!("{pem}");
//! # Ok(())
//! # }
//! ```
//!
//! ### Generating an Encrypted Key
//!
//! ```rust,no_run
//! use certgate::keygen::{KeyGenerator, decrypt_private_key};
//!
//! # fn main() -> Result<(), certgate::error::PkiError> {
//! let keygen = KeyGenerator::default();
//! let pem = keygen.generate_with(3072, "correct horse battery staple")?;
//! let key = decrypt_private_key(&pem, "correct horse battery staple")?;
//! # Ok(())
//! # }
//! ```

pub mod authority;
pub mod cert;
pub mod config;
pub mod csr;
pub mod error;
pub mod issuer;
pub mod key;
pub mod keygen;
pub mod server;
pub mod tbs_certificate;
