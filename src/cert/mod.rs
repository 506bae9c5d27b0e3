pub mod extensions;
pub mod identifiers;
pub mod params;

use crate::error::{PkiError, Result};
use const_oid::ObjectIdentifier;
use der::asn1::{Ia5StringRef, PrintableStringRef, Utf8StringRef};
use der::{Any, AnyRef, Decode, Encode, EncodePem};
use extensions::{SubjectKeyIdentifier, ToAndFromX509Extension};
use params::{ExtensionParam, Validity};
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

/// PEM label of an X.509 certificate.
pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// Represents the supported signature algorithms for certificates.
///
/// This enum provides a mapping to the corresponding OIDs for each algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption (PKCS#1 v1.5).
    Sha256WithRSA,
    /// SHA-384 with RSA encryption (PKCS#1 v1.5).
    Sha384WithRSA,
    /// SHA-512 with RSA encryption (PKCS#1 v1.5).
    Sha512WithRSA,
    /// SHA-256 with ECDSA.
    Sha256WithECDSA,
    /// SHA-384 with ECDSA.
    Sha384WithECDSA,
    /// Pure Ed25519.
    Ed25519,
}

impl SignatureAlgorithm {
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            SignatureAlgorithm::Sha256WithRSA => const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha384WithRSA => const_oid::db::rfc5912::SHA_384_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha512WithRSA => const_oid::db::rfc5912::SHA_512_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha256WithECDSA => const_oid::db::rfc5912::ECDSA_WITH_SHA_256,
            SignatureAlgorithm::Sha384WithECDSA => const_oid::db::rfc5912::ECDSA_WITH_SHA_384,
            SignatureAlgorithm::Ed25519 => const_oid::db::rfc8410::ID_ED_25519,
        }
    }

    /// Looks up the algorithm named by a signature `AlgorithmIdentifier`.
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        [
            SignatureAlgorithm::Sha256WithRSA,
            SignatureAlgorithm::Sha384WithRSA,
            SignatureAlgorithm::Sha512WithRSA,
            SignatureAlgorithm::Sha256WithECDSA,
            SignatureAlgorithm::Sha384WithECDSA,
            SignatureAlgorithm::Ed25519,
        ]
        .into_iter()
        .find(|alg| alg.oid() == *oid)
    }
}

impl From<SignatureAlgorithm> for AlgorithmIdentifierOwned {
    /// RSA algorithms carry an explicit NULL parameter (RFC 4055), the
    /// others carry none.
    fn from(value: SignatureAlgorithm) -> Self {
        let parameters = match value {
            SignatureAlgorithm::Sha256WithRSA
            | SignatureAlgorithm::Sha384WithRSA
            | SignatureAlgorithm::Sha512WithRSA => Some(Any::from(AnyRef::NULL)),
            _ => None,
        };
        AlgorithmIdentifierOwned {
            oid: value.oid(),
            parameters,
        }
    }
}

/// Represents an X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| PkiError::Encoding(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| PkiError::Encoding(e.to_string()))
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertificateInner::from_der(der)?,
        })
    }

    /// Parses the first PEM block of `pem_str`; any following blocks, such
    /// as the rest of a bundle, are ignored.
    pub fn from_pem(pem_str: &str) -> Result<Self> {
        let block = pem::parse(pem_str)?;
        if block.tag() != CERTIFICATE_LABEL {
            return Err(PkiError::Decoding(format!(
                "Unexpected PEM label '{}', expected {CERTIFICATE_LABEL}",
                block.tag()
            )));
        }
        Self::from_der(block.contents())
    }

    pub fn subject(&self) -> &Name {
        &self.inner.tbs_certificate.subject
    }

    pub fn issuer(&self) -> &Name {
        &self.inner.tbs_certificate.issuer
    }

    pub fn subject_public_key_info(&self) -> &SubjectPublicKeyInfoOwned {
        &self.inner.tbs_certificate.subject_public_key_info
    }

    /// Serial number as DER integer content bytes.
    pub fn serial_number(&self) -> &[u8] {
        self.inner.tbs_certificate.serial_number.as_bytes()
    }

    pub fn validity(&self) -> Validity {
        let validity = &self.inner.tbs_certificate.validity;
        Validity {
            not_before: crate::tbs_certificate::from_x509_time(&validity.not_before),
            not_after: crate::tbs_certificate::from_x509_time(&validity.not_after),
        }
    }

    /// Returns the raw extensions of the certificate.
    pub fn extensions(&self) -> Vec<ExtensionParam> {
        self.inner
            .tbs_certificate
            .extensions
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|ext| ExtensionParam {
                oid: ext.extn_id,
                critical: ext.critical,
                value: ext.extn_value.as_bytes().to_vec(),
            })
            .collect()
    }

    /// Decodes the extension of type `E`, if the certificate carries one.
    pub fn extension<E: ToAndFromX509Extension>(&self) -> Result<Option<E>> {
        self.extensions()
            .iter()
            .find(|ext| ext.oid == E::OID)
            .map(|ext| ext.to_extension())
            .transpose()
    }

    /// The Subject Key Identifier extension value, when present.
    pub fn subject_key_identifier(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.extension::<SubjectKeyIdentifier>()?.map(|ski| ski.0))
    }
}

/// Extracts the first common name (CN) of a distinguished name.
pub fn common_name(name: &Name) -> Option<String> {
    name.0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .find(|attr| attr.oid == const_oid::db::rfc4519::CN)
        .and_then(|attr| {
            attr.value
                .decode_as::<Utf8StringRef<'_>>()
                .map(|s| s.as_str().to_string())
                .or_else(|_| {
                    attr.value
                        .decode_as::<PrintableStringRef<'_>>()
                        .map(|s| s.as_str().to_string())
                })
                .or_else(|_| {
                    attr.value
                        .decode_as::<Ia5StringRef<'_>>()
                        .map(|s| s.as_str().to_string())
                })
                .ok()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::extensions::BasicConstraints;

    fn fixture(file: &str) -> String {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(file);
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_parse_ca_certificate() {
        let cert = Certificate::from_pem(&fixture("ac1.crt")).unwrap();
        assert_eq!(cert.subject(), cert.issuer());
        assert_eq!(common_name(cert.subject()).as_deref(), Some("Example Root AC1"));

        let basic_constraints = cert.extension::<BasicConstraints>().unwrap().unwrap();
        assert!(basic_constraints.is_ca);
        assert!(cert.subject_key_identifier().unwrap().is_some());

        let reparsed = Certificate::from_pem(&cert.to_pem().unwrap()).unwrap();
        assert_eq!(reparsed, cert);
    }

    #[test]
    fn test_from_pem_takes_the_first_block_of_a_bundle() {
        let bundle = format!("{}{}", fixture("ac1.crt"), fixture("ac2.crt"));
        let cert = Certificate::from_pem(&bundle).unwrap();
        assert_eq!(common_name(cert.subject()).as_deref(), Some("Example Root AC1"));

        let key = fixture("ac1.key");
        assert!(matches!(
            Certificate::from_pem(&key),
            Err(PkiError::Decoding(_))
        ));
    }

    #[test]
    fn test_signature_algorithm_oid_lookup() {
        let alg = SignatureAlgorithm::Sha384WithECDSA;
        assert_eq!(SignatureAlgorithm::from_oid(&alg.oid()), Some(alg));
        assert_eq!(
            SignatureAlgorithm::from_oid(&const_oid::db::rfc5912::ID_EC_PUBLIC_KEY),
            None
        );

        let rsa: AlgorithmIdentifierOwned = SignatureAlgorithm::Sha256WithRSA.into();
        assert!(rsa.parameters.is_some());
        let ed: AlgorithmIdentifierOwned = SignatureAlgorithm::Ed25519.into();
        assert!(ed.parameters.is_none());
    }
}
