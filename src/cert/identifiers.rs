//! Per-certificate identifiers: subject key identifiers and serial numbers.

use der::{Decode, Encode};
use rand_core::RngCore;
use sha1::{Digest, Sha1};
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::error::{PkiError, Result};

/// Number of random bytes in a serial number (128 bits).
pub const SERIAL_NUMBER_LEN: usize = 16;

/// Computes the key identifier of a public key: the SHA-1 digest of the
/// `subjectPublicKey` bits of its canonical `SubjectPublicKeyInfo` encoding
/// (RFC 5280, section 4.2.1.2, method 1).
pub fn subject_key_identifier(spki: &SubjectPublicKeyInfoOwned) -> Result<[u8; 20]> {
    let canonical = SubjectPublicKeyInfoOwned::from_der(&spki.to_der()?)?;
    let bits = canonical.subject_public_key.as_bytes().ok_or_else(|| {
        PkiError::Decoding("Public key bit string has unused bits".to_string())
    })?;
    Ok(Sha1::digest(bits).into())
}

/// Draws a serial number uniformly from `[0, 2^128)`.
///
/// Uniqueness is left to the random source; collisions are not tracked.
pub fn random_serial_number() -> Result<SerialNumber> {
    let mut raw = [0u8; SERIAL_NUMBER_LEN];
    rand_core::OsRng
        .try_fill_bytes(&mut raw)
        .map_err(|e| PkiError::Signing(format!("Failed to draw a serial number: {e}")))?;
    serial_number_from_bytes(&raw)
}

/// Builds a non-negative serial number from big-endian magnitude bytes.
pub fn serial_number_from_bytes(magnitude: &[u8]) -> Result<SerialNumber> {
    let significant = match magnitude.iter().position(|b| *b != 0) {
        Some(first) => &magnitude[first..],
        None => &[0u8][..],
    };
    let mut encoded = Vec::with_capacity(significant.len() + 1);
    if significant[0] & 0x80 != 0 {
        encoded.push(0);
    }
    encoded.extend_from_slice(significant);
    Ok(SerialNumber::new(&encoded)?)
}
