//! Key generation, certificate requests, signing and chain validation.
//!
//! [`CertificateAuthority`] is the capability the issuers are written
//! against; [`Rcgen`] implements it in-process with [rcgen].

use rcgen::{
	CertificateParams, CertificateSigningRequestParams, DistinguishedName, Issuer, KeyPair,
	SanType, SerialNumber,
};
use time::{Duration, OffsetDateTime};

use crate::{
	chain::{self, Verification},
	profile::Policy,
	Error, Result,
};

mod extensions;
pub use extensions::{ExtensionProfile, NsCertType};
mod key;
pub use key::KeyAlgorithm;

/// Serial number and validity period of a certificate to be issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terms {
	/// Big-endian serial number.
	pub serial: Vec<u8>,
	/// Start of validity.
	pub not_before: OffsetDateTime,
	/// End of validity.
	pub not_after: OffsetDateTime,
}

impl Terms {
	/// Valid from now for `days` days.
	pub fn new(serial: Vec<u8>, days: u32) -> Result<Self> {
		let not_before = OffsetDateTime::now_utc();
		let not_after = not_before
			.checked_add(Duration::days(days.into()))
			.ok_or(Error::Validity { days })?;
		Ok(Self {
			serial,
			not_before,
			not_after,
		})
	}

	fn apply(&self, params: &mut CertificateParams) {
		params.serial_number = Some(SerialNumber::from_slice(&self.serial));
		params.not_before = self.not_before;
		params.not_after = self.not_after;
	}
}

/// A certificate signing request together with what the signer adds to it.
pub struct SignRequest<'a> {
	/// PEM encoded PKCS#10 request.
	pub csr_pem: &'a str,
	/// Extensions of the issued certificate.
	pub extensions: &'a ExtensionProfile,
	/// Subject policy enforced by the signer.
	pub policy: Policy,
	/// Serial number and validity.
	pub terms: &'a Terms,
}

/// The cryptographic operations an issuance pipeline needs.
///
/// Every method either completes or returns an error; none of them touch
/// the filesystem.
pub trait CertificateAuthority {
	/// Generate a new private key.
	fn generate_key(&self, algorithm: KeyAlgorithm) -> Result<KeyPair>;

	/// Build a PEM encoded CSR binding `subject` and `sans` to `key`.
	fn create_csr(
		&self,
		key: &KeyPair,
		subject: &DistinguishedName,
		sans: &[SanType],
	) -> Result<String>;

	/// Build a PEM encoded self-signed certificate.
	fn self_sign(
		&self,
		key: &KeyPair,
		subject: &DistinguishedName,
		extensions: &ExtensionProfile,
		terms: &Terms,
	) -> Result<String>;

	/// Sign a request with the CA identified by `issuer_cert_pem` and
	/// `issuer_key`, returning the PEM encoded certificate.
	fn sign(
		&self,
		request: &SignRequest<'_>,
		issuer_cert_pem: &str,
		issuer_key: KeyPair,
	) -> Result<String>;

	/// Validate the first certificate of `target_pem` against the
	/// certificates of `trusted_pem`.
	fn verify_chain(&self, target_pem: &str, trusted_pem: &str) -> Verification;
}

/// In-process implementation on top of [rcgen] and [x509_parser].
#[derive(Debug, Clone, Copy, Default)]
pub struct Rcgen;

impl CertificateAuthority for Rcgen {
	fn generate_key(&self, algorithm: KeyAlgorithm) -> Result<KeyPair> {
		Ok(algorithm.generate()?)
	}

	fn create_csr(
		&self,
		key: &KeyPair,
		subject: &DistinguishedName,
		sans: &[SanType],
	) -> Result<String> {
		let mut params = CertificateParams::default();
		params.distinguished_name = subject.clone();
		params.subject_alt_names = sans.to_vec();
		Ok(params.serialize_request(key)?.pem()?)
	}

	fn self_sign(
		&self,
		key: &KeyPair,
		subject: &DistinguishedName,
		extensions: &ExtensionProfile,
		terms: &Terms,
	) -> Result<String> {
		let mut params = CertificateParams::default();
		params.distinguished_name = subject.clone();
		extensions.apply(&mut params);
		terms.apply(&mut params);
		Ok(params.self_signed(key)?.pem())
	}

	fn sign(
		&self,
		request: &SignRequest<'_>,
		issuer_cert_pem: &str,
		issuer_key: KeyPair,
	) -> Result<String> {
		let mut csr = CertificateSigningRequestParams::from_pem(request.csr_pem)?;
		let signer = chain::subject(issuer_cert_pem)?;
		request.policy.check(&signer, &csr.params.distinguished_name)?;

		let issuer = Issuer::from_ca_cert_pem(issuer_cert_pem, issuer_key)?;
		request.extensions.apply(&mut csr.params);
		request.terms.apply(&mut csr.params);
		Ok(csr.signed_by(&issuer)?.pem())
	}

	fn verify_chain(&self, target_pem: &str, trusted_pem: &str) -> Verification {
		chain::verify(target_pem, trusted_pem)
	}
}
