use std::sync::Arc;

use der::Encode;
use time::Duration;
use tracing::{debug, info, instrument, warn};
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;

use crate::authority::AuthorityStore;
use crate::cert::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption, KeyUsage,
    KeyUsages, SubjectAltName, SubjectKeyIdentifier,
};
use crate::cert::identifiers::{random_serial_number, subject_key_identifier};
use crate::cert::params::{CertificationRequestInfo, ExtensionParam, Validity};
use crate::cert::{Certificate, common_name};
use crate::csr::SigningRequest;
use crate::error::{PkiError, Result};
use crate::key::KeyPair;
use crate::tbs_certificate::TbsCertificate;

/// Represents an entity capable of issuing certificates.
///
/// This trait provides methods to retrieve issuer details and issue certificates.
pub trait Issuer {
    /// Returns the distinguished name of the issuer.
    fn issuer_name(&self) -> &Name;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Returns the key identifier placed in the Authority Key Identifier of
    /// every certificate this issuer signs.
    fn key_identifier(&self) -> Result<Vec<u8>>;

    /// Issues an end-entity certificate for `cert_request`.
    ///
    /// The profile is fixed: `CA:FALSE`, `digitalSignature | keyEncipherment`,
    /// `serverAuth, clientAuth`, key identifiers, and the requested DNS names.
    /// The SAN is critical when the subject is empty (RFC 5280, 4.2.1.6).
    fn issue(
        &self,
        cert_request: &CertificationRequestInfo,
        validity: Validity,
    ) -> Result<Certificate> {
        let signature_algo = self.signing_key().signature_algorithm();

        let subject_key_id = subject_key_identifier(&cert_request.subject_public_key)?;
        let authority_key_id = AuthorityKeyIdentifier {
            key_identifier: self.key_identifier()?,
        };
        let key_usage = KeyUsage(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment);
        let extended_key_usage = ExtendedKeyUsage {
            usage: vec![
                ExtendedKeyUsageOption::ServerAuth,
                ExtendedKeyUsageOption::ClientAuth,
            ],
        };

        let mut extensions: Vec<ExtensionParam> = vec![
            ExtensionParam::from_extension(BasicConstraints::default(), true)?,
            ExtensionParam::from_extension(SubjectKeyIdentifier(subject_key_id.to_vec()), false)?,
            ExtensionParam::from_extension(authority_key_id, false)?,
            ExtensionParam::from_extension(key_usage, true)?,
            ExtensionParam::from_extension(extended_key_usage, false)?,
        ];

        if !cert_request.dns_names.is_empty() {
            let san = SubjectAltName {
                names: cert_request.dns_names.clone(),
            };
            let critical = cert_request.subject.0.is_empty();
            extensions.push(ExtensionParam::from_extension(san, critical)?);
        }

        let tbs_cert = TbsCertificate::builder()
            .serial_number(random_serial_number()?)
            .signature_algorithm(signature_algo)
            .issuer(self.issuer_name().clone())
            .validity(validity)
            .subject(cert_request.subject.clone())
            .subject_public_key(cert_request.subject_public_key.clone())
            .extensions(extensions)
            .build();

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let tbs_der = tbs_cert_inner
            .to_der()
            .map_err(|e| PkiError::Signing(format!("Failed to encode certificate body: {e}")))?;
        let signature = self.signing_key().sign_data(&tbs_der)?;

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: signature_algo.into(),
            signature: der::asn1::BitString::from_bytes(&signature)
                .map_err(|e| PkiError::Signing(e.to_string()))?,
        };

        Ok(Certificate { inner: cert_inner })
    }
}

/// Settings applied to every certificate issued by a [`CertificateIssuer`].
#[derive(Clone, Debug, bon::Builder)]
pub struct IssuancePolicy {
    /// Exact distance between `notBefore` and `notAfter`.
    pub validity: Duration,
    /// Check the request's self-signature before issuing.
    #[builder(default = true)]
    pub verify_csr_signature: bool,
}

/// Turns certificate signing requests into certificates signed by one of
/// the loaded authorities.
///
/// The issuer only holds read-only state, so a single instance can serve
/// any number of concurrent calls.
#[derive(Clone, Debug)]
pub struct CertificateIssuer {
    authorities: Arc<AuthorityStore>,
    policy: IssuancePolicy,
}

impl CertificateIssuer {
    pub fn new(authorities: Arc<AuthorityStore>, policy: IssuancePolicy) -> Self {
        Self {
            authorities,
            policy,
        }
    }

    pub fn authorities(&self) -> &AuthorityStore {
        &self.authorities
    }

    pub fn policy(&self) -> &IssuancePolicy {
        &self.policy
    }

    /// Issues a certificate for a transport-encoded (base64 of PEM) PKCS#10
    /// request and returns it as a PEM `CERTIFICATE` block.
    ///
    /// The authority is resolved first, so an unknown name is reported even
    /// when the request itself is malformed.
    #[instrument(skip(self, csr_base64), fields(authority = %authority_name))]
    pub fn issue(&self, csr_base64: &str, authority_name: &str) -> Result<String> {
        let result = self
            .authorities
            .lookup(authority_name)
            .and_then(|_| SigningRequest::from_transport(csr_base64))
            .and_then(|request| self.issue_request(&request, authority_name))
            .map(|(_, pem)| pem);
        if let Err(e) = &result {
            warn!(error = %e, "certificate request rejected");
        }
        result
    }

    /// Issues a certificate for an already decoded request, returning both
    /// the certificate and its PEM encoding.
    pub fn issue_request(
        &self,
        request: &SigningRequest,
        authority_name: &str,
    ) -> Result<(Certificate, String)> {
        let authority = self.authorities.lookup(authority_name)?;

        request.validate()?;
        if self.policy.verify_csr_signature {
            request.verify_signature()?;
        }

        let cert_info = CertificationRequestInfo::builder()
            .subject(request.subject().clone())
            .subject_public_key(request.public_key().clone())
            .dns_names(request.dns_names()?)
            .build();
        debug!(dns_names = ?cert_info.dns_names, "signing request accepted");

        let validity = Validity::starting_now(self.policy.validity);
        let certificate = authority.issue(&cert_info, validity).map_err(|e| match e {
            PkiError::Signing(_) => e,
            other => PkiError::Signing(other.to_string()),
        })?;
        let pem = certificate.to_pem()?;

        info!(
            serial = %hex_serial(certificate.serial_number()),
            subject = %request.subject(),
            common_name = %common_name(request.subject()).unwrap_or_default(),
            authority = authority_name,
            not_after = %validity.not_after,
            "certificate issued"
        );
        Ok((certificate, pem))
    }
}

fn hex_serial(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
