//! PKCS#10 certificate signing requests.
//!
//! Requests reach the service as base64 text wrapping a PEM block, which in
//! turn wraps the DER `CertificationRequest`.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use const_oid::AssociatedOid;
use der::asn1::{BitString, SetOfVec};
use der::{Any, Decode, Encode};
use x509_cert::attr::Attribute;
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::request::{CertReq, CertReqInfo, ExtensionReq};
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::{SubjectAltName, ToAndFromX509Extension};
use crate::error::{PkiError, Result};
use crate::key::{KeyPair, PublicKey};

/// PEM label of a PKCS#10 request.
pub const CSR_LABEL: &str = "CERTIFICATE REQUEST";
/// Label still emitted by some older tools.
pub const LEGACY_CSR_LABEL: &str = "NEW CERTIFICATE REQUEST";

/// Standard alphabet, padding optional.
const TRANSPORT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

fn decode_error(context: &str, err: impl std::fmt::Display) -> PkiError {
    PkiError::CsrDecode(format!("{context}: {err}"))
}

/// A decoded certificate signing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequest {
    inner: CertReq,
}

impl SigningRequest {
    /// Decodes the transport form: base64 text of a PEM document. Line
    /// breaks and other ASCII whitespace in the base64 are skipped.
    pub fn from_transport(encoded: &str) -> Result<Self> {
        let compact: String = encoded
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let pem_bytes = TRANSPORT_ENGINE
            .decode(compact)
            .map_err(|e| decode_error("invalid base64", e))?;
        let pem_text =
            std::str::from_utf8(&pem_bytes).map_err(|e| decode_error("invalid PEM text", e))?;
        Self::from_pem(pem_text)
    }

    /// Encodes the request in its transport form.
    pub fn to_transport(&self) -> Result<String> {
        Ok(TRANSPORT_ENGINE.encode(self.to_pem()?))
    }

    /// Parses the first PEM block of `pem_str` as a request.
    pub fn from_pem(pem_str: &str) -> Result<Self> {
        let block = pem::parse(pem_str).map_err(|e| decode_error("invalid PEM", e))?;
        if block.tag() != CSR_LABEL && block.tag() != LEGACY_CSR_LABEL {
            return Err(PkiError::CsrDecode(format!(
                "unexpected PEM label '{}', expected {CSR_LABEL}",
                block.tag()
            )));
        }
        Self::from_der(block.contents())
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = CertReq::from_der(der).map_err(|e| decode_error("invalid PKCS#10 structure", e))?;
        Ok(Self { inner })
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| PkiError::Encoding(e.to_string()))
    }

    pub fn to_pem(&self) -> Result<String> {
        let block = pem::Pem::new(CSR_LABEL, self.to_der()?);
        Ok(pem::encode_config(
            &block,
            pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF),
        ))
    }

    /// Builds and self-signs a request for `subject`, asking for `dns_names`
    /// through an `extensionRequest` attribute.
    pub fn new_signed(subject: Name, dns_names: &[String], key: &KeyPair) -> Result<Self> {
        let mut attributes = Vec::new();
        if !dns_names.is_empty() {
            let san = SubjectAltName {
                names: dns_names.to_vec(),
            };
            let extension_request = ExtensionReq(vec![Extension {
                extn_id: SubjectAltName::OID,
                critical: false,
                extn_value: der::asn1::OctetString::new(san.to_x509_extension_value()?)?,
            }]);
            let value = Any::from_der(&extension_request.to_der()?)?;
            attributes.push(Attribute {
                oid: ExtensionReq::OID,
                values: SetOfVec::try_from(vec![value])?,
            });
        }

        let info = CertReqInfo {
            version: x509_cert::request::Version::V1,
            subject,
            public_key: key.as_spki()?,
            attributes: SetOfVec::try_from(attributes)?,
        };
        let signature = key.sign_data(&info.to_der()?)?;

        Ok(Self {
            inner: CertReq {
                info,
                algorithm: key.signature_algorithm().into(),
                signature: BitString::from_bytes(&signature)?,
            },
        })
    }

    pub fn subject(&self) -> &Name {
        &self.inner.info.subject
    }

    pub fn public_key(&self) -> &SubjectPublicKeyInfoOwned {
        &self.inner.info.public_key
    }

    /// Rejects requests that carry nothing to certify: no public key, or
    /// neither a subject nor a DNS name.
    pub fn validate(&self) -> Result<()> {
        if self.public_key().subject_public_key.raw_bytes().is_empty() {
            return Err(PkiError::CsrDecode("request has no public key".to_string()));
        }
        if self.subject().0.is_empty() && self.dns_names()?.is_empty() {
            return Err(PkiError::CsrDecode(
                "request has neither a subject nor DNS names".to_string(),
            ));
        }
        Ok(())
    }

    /// DNS names from the Subject Alternative Name extension the requester
    /// asked for. Names are returned verbatim, without syntax checks.
    pub fn dns_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for attribute in self.inner.info.attributes.iter() {
            if attribute.oid != ExtensionReq::OID {
                continue;
            }
            for value in attribute.values.iter() {
                let der = value.to_der()?;
                let request = ExtensionReq::from_der(&der)
                    .map_err(|e| decode_error("invalid extension request", e))?;
                for extension in request.0.iter().filter(|ext| ext.extn_id == SubjectAltName::OID) {
                    let san = SubjectAltName::from_x509_extension_value(
                        extension.extn_value.as_bytes(),
                    )
                    .map_err(|e| decode_error("invalid subject alternative name", e))?;
                    names.extend(san.names);
                }
            }
        }
        Ok(names)
    }

    /// Checks the request's signature against its own public key, proving
    /// the requester holds the matching private key.
    pub fn verify_signature(&self) -> Result<()> {
        let algorithm = SignatureAlgorithm::from_oid(&self.inner.algorithm.oid).ok_or_else(|| {
            PkiError::CsrDecode(format!(
                "unsupported request signature algorithm {}",
                self.inner.algorithm.oid
            ))
        })?;
        let public_key = PublicKey::from_x509spki(self.public_key())
            .map_err(|e| decode_error("unsupported request public key", e))?;
        let signature = self
            .inner
            .signature
            .as_bytes()
            .ok_or_else(|| PkiError::CsrDecode("malformed request signature".to_string()))?;
        let message = self.inner.info.to_der()?;
        public_key
            .verify(algorithm, &message, signature)
            .map_err(|e| decode_error("request signature check failed", e))
    }
}
