use der::Decode;
use ed25519_dalek::{SigningKey as Ed25519SigningKey, VerifyingKey as Ed25519VerifyingKey};
use p256::ecdsa::{SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey};
use p384::ecdsa::{SigningKey as P384SigningKey, VerifyingKey as P384VerifyingKey};
use pkcs8::SecretDocument;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Sha256, Sha384, Sha512};
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::SignatureAlgorithm;
use crate::error::{PkiError, Result};

/// PEM label of a PKCS#1 RSA private key.
pub const PKCS1_RSA_LABEL: &str = "RSA PRIVATE KEY";
/// PEM label of an unencrypted PKCS#8 private key.
pub const PKCS8_LABEL: &str = "PRIVATE KEY";

/// Supported key types for signing certificates.
///
/// Every variant offers the same capabilities (public key export and
/// signing), so callers never need to match on the concrete algorithm.
#[derive(Clone)]
pub enum KeyPair {
    Rsa {
        private: Box<RsaPrivateKey>,
        public: RsaPublicKey,
    },
    EcdsaP256 {
        signing_key: P256SigningKey,
        verifying_key: P256VerifyingKey,
    },
    EcdsaP384 {
        signing_key: P384SigningKey,
        verifying_key: P384VerifyingKey,
    },
    Ed25519 {
        signing_key: Ed25519SigningKey,
    },
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &self.algorithm_name())
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| PkiError::KeyGeneration(e.to_string()))?;
        Ok(Self::from_rsa(private))
    }

    /// Generate an ECDSA P-256 key pair.
    pub fn generate_ecdsa_p256() -> Self {
        let mut rng = rand_core::OsRng;
        let signing_key = P256SigningKey::random(&mut rng);
        let verifying_key = signing_key.verifying_key().to_owned();
        KeyPair::EcdsaP256 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an ECDSA P-384 key pair.
    pub fn generate_ecdsa_p384() -> Self {
        let mut rng = rand_core::OsRng;
        let signing_key = P384SigningKey::random(&mut rng);
        let verifying_key = signing_key.verifying_key().to_owned();
        KeyPair::EcdsaP384 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an Ed25519 key pair.
    pub fn generate_ed25519() -> Self {
        let mut rng = rand_core::OsRng;
        let signing_key: Ed25519SigningKey = Ed25519SigningKey::generate(&mut rng);
        KeyPair::Ed25519 { signing_key }
    }

    fn from_rsa(private: RsaPrivateKey) -> Self {
        let public = RsaPublicKey::from(&private);
        KeyPair::Rsa {
            private: Box::new(private),
            public,
        }
    }

    /// Imports a PKCS#1 `RSAPrivateKey` structure.
    pub fn from_pkcs1_der(der: &[u8]) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs1_der(der)?;
        Ok(Self::from_rsa(private))
    }

    /// Imports an unencrypted PKCS#8 `PrivateKeyInfo`, dispatching on the
    /// algorithm it declares.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let info = pkcs8::PrivateKeyInfo::try_from(der)?;
        let oid = info.algorithm.oid;
        if oid == const_oid::db::rfc5912::RSA_ENCRYPTION {
            Ok(Self::from_rsa(RsaPrivateKey::from_pkcs8_der(der)?))
        } else if oid == const_oid::db::rfc5912::ID_EC_PUBLIC_KEY {
            if let Ok(signing_key) = P256SigningKey::from_pkcs8_der(der) {
                let verifying_key = signing_key.verifying_key().to_owned();
                return Ok(KeyPair::EcdsaP256 {
                    signing_key,
                    verifying_key,
                });
            }
            let signing_key = P384SigningKey::from_pkcs8_der(der).map_err(|_| {
                PkiError::Decoding("Unsupported elliptic curve, expected P-256 or P-384".into())
            })?;
            let verifying_key = signing_key.verifying_key().to_owned();
            Ok(KeyPair::EcdsaP384 {
                signing_key,
                verifying_key,
            })
        } else if oid == const_oid::db::rfc8410::ID_ED_25519 {
            let signing_key = Ed25519SigningKey::from_pkcs8_der(der)?;
            Ok(KeyPair::Ed25519 { signing_key })
        } else {
            Err(PkiError::Decoding(format!(
                "Unsupported private key algorithm {oid}"
            )))
        }
    }

    /// Imports a private key from a PEM document, either PKCS#1
    /// (`RSA PRIVATE KEY`) or PKCS#8 (`PRIVATE KEY`).
    pub fn from_pem(pem_str: &str) -> Result<Self> {
        let block = pem::parse(pem_str)?;
        match block.tag() {
            PKCS1_RSA_LABEL => Self::from_pkcs1_der(block.contents()),
            PKCS8_LABEL => Self::from_pkcs8_der(block.contents()),
            other => Err(PkiError::Decoding(format!(
                "Unexpected PEM label '{other}' for a private key"
            ))),
        }
    }

    /// Serializes the private key as an unencrypted PKCS#8 document.
    pub fn to_pkcs8_der(&self) -> Result<SecretDocument> {
        let doc = match self {
            KeyPair::Rsa { private, .. } => private.to_pkcs8_der(),
            KeyPair::EcdsaP256 { signing_key, .. } => signing_key.to_pkcs8_der(),
            KeyPair::EcdsaP384 { signing_key, .. } => signing_key.to_pkcs8_der(),
            KeyPair::Ed25519 { signing_key } => signing_key.to_pkcs8_der(),
        };
        doc.map_err(|e| PkiError::Encoding(e.to_string()))
    }

    /// Returns the public half as a `SubjectPublicKeyInfo`.
    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let doc = match self {
            KeyPair::Rsa { public, .. } => public.to_public_key_der(),
            KeyPair::EcdsaP256 { verifying_key, .. } => verifying_key.to_public_key_der(),
            KeyPair::EcdsaP384 { verifying_key, .. } => verifying_key.to_public_key_der(),
            KeyPair::Ed25519 { signing_key } => signing_key.verifying_key().to_public_key_der(),
        }
        .map_err(|e| PkiError::Encoding(e.to_string()))?;
        Ok(SubjectPublicKeyInfoOwned::from_der(doc.as_bytes())?)
    }

    /// The algorithm used when this key signs a certificate.
    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        match self {
            KeyPair::Rsa { .. } => SignatureAlgorithm::Sha256WithRSA,
            KeyPair::EcdsaP256 { .. } => SignatureAlgorithm::Sha256WithECDSA,
            KeyPair::EcdsaP384 { .. } => SignatureAlgorithm::Sha384WithECDSA,
            KeyPair::Ed25519 { .. } => SignatureAlgorithm::Ed25519,
        }
    }

    pub fn algorithm_name(&self) -> &'static str {
        match self {
            KeyPair::Rsa { .. } => "RSA",
            KeyPair::EcdsaP256 { .. } => "ECDSA P-256",
            KeyPair::EcdsaP384 { .. } => "ECDSA P-384",
            KeyPair::Ed25519 { .. } => "Ed25519",
        }
    }

    /// Signs `data` with [`Self::signature_algorithm`]. ECDSA signatures are
    /// DER encoded as X.509 requires.
    pub fn sign_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signature = match self {
            KeyPair::Rsa { private, .. } => {
                let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new((**private).clone());
                signing_key.try_sign(data).map(|s| s.to_vec())
            }
            KeyPair::EcdsaP256 { signing_key, .. } => {
                Signer::<p256::ecdsa::DerSignature>::try_sign(signing_key, data).map(|s| s.to_vec())
            }
            KeyPair::EcdsaP384 { signing_key, .. } => {
                Signer::<p384::ecdsa::DerSignature>::try_sign(signing_key, data).map(|s| s.to_vec())
            }
            KeyPair::Ed25519 { signing_key } => signing_key
                .try_sign(data)
                .map(|s| s.to_bytes().to_vec()),
        };
        signature.map_err(|e| PkiError::Signing(e.to_string()))
    }
}

/// A public key able to check signatures, decoded from a `SubjectPublicKeyInfo`.
#[derive(Clone, Debug)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP256(P256VerifyingKey),
    EcdsaP384(P384VerifyingKey),
    Ed25519(Ed25519VerifyingKey),
}

impl PublicKey {
    /// Extracts the public half of a key pair.
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        match key_pair {
            KeyPair::Rsa { public, .. } => PublicKey::Rsa(public.clone()),
            KeyPair::EcdsaP256 { verifying_key, .. } => PublicKey::EcdsaP256(*verifying_key),
            KeyPair::EcdsaP384 { verifying_key, .. } => PublicKey::EcdsaP384(*verifying_key),
            KeyPair::Ed25519 { signing_key } => PublicKey::Ed25519(signing_key.verifying_key()),
        }
    }

    /// Decodes a `SubjectPublicKeyInfo` into a concrete key type.
    pub fn from_x509spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let der = der::Encode::to_der(spki)?;
        let oid = spki.algorithm.oid;
        if oid == const_oid::db::rfc5912::RSA_ENCRYPTION {
            Ok(PublicKey::Rsa(RsaPublicKey::from_public_key_der(&der)?))
        } else if oid == const_oid::db::rfc5912::ID_EC_PUBLIC_KEY {
            if let Ok(key) = P256VerifyingKey::from_public_key_der(&der) {
                return Ok(PublicKey::EcdsaP256(key));
            }
            P384VerifyingKey::from_public_key_der(&der)
                .map(PublicKey::EcdsaP384)
                .map_err(|_| {
                    PkiError::Decoding("Unsupported elliptic curve, expected P-256 or P-384".into())
                })
        } else if oid == const_oid::db::rfc8410::ID_ED_25519 {
            Ok(PublicKey::Ed25519(Ed25519VerifyingKey::from_public_key_der(&der)?))
        } else {
            Err(PkiError::Decoding(format!(
                "Unsupported public key algorithm {oid}"
            )))
        }
    }

    /// Checks `signature` over `message` made with `algorithm`.
    ///
    /// Fails with [`PkiError::InvalidInput`] when the algorithm does not fit
    /// the key type, and with [`PkiError::Signing`] when the signature is wrong.
    pub fn verify(
        &self,
        algorithm: SignatureAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<()> {
        let bad_signature = |e: rsa::signature::Error| PkiError::Signing(e.to_string());
        match (self, algorithm) {
            (PublicKey::Rsa(key), SignatureAlgorithm::Sha256WithRSA) => {
                let sig = rsa::pkcs1v15::Signature::try_from(signature).map_err(bad_signature)?;
                rsa::pkcs1v15::VerifyingKey::<Sha256>::new(key.clone())
                    .verify(message, &sig)
                    .map_err(bad_signature)
            }
            (PublicKey::Rsa(key), SignatureAlgorithm::Sha384WithRSA) => {
                let sig = rsa::pkcs1v15::Signature::try_from(signature).map_err(bad_signature)?;
                rsa::pkcs1v15::VerifyingKey::<Sha384>::new(key.clone())
                    .verify(message, &sig)
                    .map_err(bad_signature)
            }
            (PublicKey::Rsa(key), SignatureAlgorithm::Sha512WithRSA) => {
                let sig = rsa::pkcs1v15::Signature::try_from(signature).map_err(bad_signature)?;
                rsa::pkcs1v15::VerifyingKey::<Sha512>::new(key.clone())
                    .verify(message, &sig)
                    .map_err(bad_signature)
            }
            (PublicKey::EcdsaP256(key), SignatureAlgorithm::Sha256WithECDSA) => {
                let sig = p256::ecdsa::Signature::from_der(signature).map_err(bad_signature)?;
                key.verify(message, &sig).map_err(bad_signature)
            }
            (PublicKey::EcdsaP384(key), SignatureAlgorithm::Sha384WithECDSA) => {
                let sig = p384::ecdsa::Signature::from_der(signature).map_err(bad_signature)?;
                key.verify(message, &sig).map_err(bad_signature)
            }
            (PublicKey::Ed25519(key), SignatureAlgorithm::Ed25519) => {
                let sig = ed25519_dalek::Signature::from_slice(signature).map_err(bad_signature)?;
                key.verify(message, &sig).map_err(bad_signature)
            }
            (_, algorithm) => Err(PkiError::InvalidInput(format!(
                "Signature algorithm {algorithm:?} does not match the public key type"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkcs8_round_trip_keeps_algorithm() {
        for key in [
            KeyPair::generate_ecdsa_p256(),
            KeyPair::generate_ecdsa_p384(),
            KeyPair::generate_ed25519(),
        ] {
            let der = key.to_pkcs8_der().unwrap();
            let imported = KeyPair::from_pkcs8_der(der.as_bytes()).unwrap();
            assert_eq!(key.algorithm_name(), imported.algorithm_name());
            assert_eq!(key.as_spki().unwrap(), imported.as_spki().unwrap());
        }
    }

    #[test]
    fn test_sign_and_verify_with_every_key_type() {
        let message = b"to be signed";
        for key in [
            KeyPair::generate_ecdsa_p256(),
            KeyPair::generate_ecdsa_p384(),
            KeyPair::generate_ed25519(),
        ] {
            let signature = key.sign_data(message).unwrap();
            let public = PublicKey::from_x509spki(&key.as_spki().unwrap()).unwrap();
            public
                .verify(key.signature_algorithm(), message, &signature)
                .unwrap();
            assert!(
                public
                    .verify(key.signature_algorithm(), b"tampered", &signature)
                    .is_err()
            );
        }
    }

    #[test]
    fn test_verify_rejects_mismatched_algorithm() {
        let key = KeyPair::generate_ed25519();
        let signature = key.sign_data(b"data").unwrap();
        let public = PublicKey::from_key_pair(&key);
        let err = public
            .verify(SignatureAlgorithm::Sha256WithECDSA, b"data", &signature)
            .unwrap_err();
        assert!(matches!(err, PkiError::InvalidInput(_)));
    }

    #[test]
    fn test_from_pem_rejects_unknown_label() {
        let block = pem::Pem::new("CERTIFICATE", vec![0x30, 0x00]);
        let err = KeyPair::from_pem(&pem::encode(&block)).unwrap_err();
        assert!(matches!(err, PkiError::Decoding(_)));
    }
}
