//! Chain bundles and certificate path validation.
//!
//! [`verify`] follows `openssl verify -CAfile <trusted> <target>`: the
//! first certificate of the target is walked up through the trusted
//! certificates until a self-signed one is reached.

use std::fmt::{self, Write};

use pki_types::CertificateDer;
use rcgen::{DistinguishedName, DnType};
use x509_parser::prelude::{FromDer, GeneralName, X509Certificate};

use crate::{Error, Result};

/// Longest chain walked before giving up.
const MAX_CHAIN_DEPTH: usize = 8;

/// Concatenate PEM documents leaf first, exactly as given.
pub fn bundle<S: AsRef<str>>(parts: &[S]) -> String {
	parts.iter().map(AsRef::as_ref).collect()
}

/// DER certificates in a PEM document, in order. Other blocks are skipped.
pub fn certificates(pem_text: &str) -> Result<Vec<CertificateDer<'static>>> {
	Ok(pem::parse_many(pem_text)?
		.into_iter()
		.filter(|block| block.tag() == "CERTIFICATE")
		.map(|block| CertificateDer::from(block.into_contents()))
		.collect())
}

/// Country, organization and common name of the first certificate in
/// `pem_text`, as a distinguished name.
pub fn subject(pem_text: &str) -> Result<DistinguishedName> {
	let ders = certificates(pem_text)?;
	let der = ders
		.first()
		.ok_or_else(|| Error::NoCertificate("signer certificate".into()))?;
	let cert = parse(der).map_err(Error::InvalidCertificate)?;
	let name = cert.subject();
	let mut dn = DistinguishedName::new();
	if let Some(country) = name.iter_country().next().and_then(|v| v.as_str().ok()) {
		dn.push(DnType::CountryName, country);
	}
	if let Some(org) = name.iter_organization().next().and_then(|v| v.as_str().ok()) {
		dn.push(DnType::OrganizationName, org);
	}
	if let Some(cn) = name.iter_common_name().next().and_then(|v| v.as_str().ok()) {
		dn.push(DnType::CommonName, cn);
	}
	Ok(dn)
}

/// Outcome of a path validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
	/// A trusted path was found. Subjects from the target up to the anchor.
	Ok(Vec<String>),
	/// No trusted path.
	Failed(String),
}

impl Verification {
	/// Whether validation succeeded.
	pub fn is_ok(&self) -> bool {
		matches!(self, Verification::Ok(_))
	}
}

impl fmt::Display for Verification {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Verification::Ok(path) => write!(f, "OK ({})", path.join(" -> ")),
			Verification::Failed(reason) => write!(f, "FAIL: {reason}"),
		}
	}
}

fn parse<'a>(der: &'a CertificateDer<'_>) -> std::result::Result<X509Certificate<'a>, String> {
	X509Certificate::from_der(der)
		.map(|(_, cert)| cert)
		.map_err(|e| format!("unparsable certificate: {e}"))
}

fn self_signed(cert: &X509Certificate<'_>) -> bool {
	cert.subject().as_raw() == cert.issuer().as_raw() && cert.verify_signature(None).is_ok()
}

fn may_sign(cert: &X509Certificate<'_>) -> bool {
	let key_cert_sign = match cert.key_usage() {
		Ok(Some(ku)) => ku.value.key_cert_sign(),
		Ok(None) => true,
		Err(_) => false,
	};
	cert.is_ca() && key_cert_sign
}

/// Validate the first certificate of `target_pem` against `trusted_pem`.
pub fn verify(target_pem: &str, trusted_pem: &str) -> Verification {
	match walk(target_pem, trusted_pem) {
		Ok(path) => Verification::Ok(path),
		Err(reason) => Verification::Failed(reason),
	}
}

fn walk(target_pem: &str, trusted_pem: &str) -> std::result::Result<Vec<String>, String> {
	let target = certificates(target_pem).map_err(|e| e.to_string())?;
	let target = target
		.first()
		.ok_or_else(|| "no certificate in target".to_string())?;
	let trusted_der = certificates(trusted_pem).map_err(|e| e.to_string())?;
	if trusted_der.is_empty() {
		return Err("no certificate in trusted bundle".into());
	}
	let trusted = trusted_der
		.iter()
		.map(parse)
		.collect::<std::result::Result<Vec<_>, _>>()?;

	let mut current = parse(target)?;
	let mut current_der: &[u8] = target;
	let mut path = vec![current.subject().to_string()];

	for depth in 0..MAX_CHAIN_DEPTH {
		if !current.validity().is_valid() {
			return Err(format!(
				"certificate has expired or is not yet valid: {}",
				current.subject()
			));
		}
		if self_signed(&current) {
			return if trusted_der.iter().any(|der| der.as_ref() == current_der) {
				Ok(path)
			} else if depth == 0 {
				Err("self-signed certificate is not in the trusted bundle".into())
			} else {
				Err(format!("untrusted root {}", current.subject()))
			};
		}

		let candidates = trusted
			.iter()
			.zip(trusted_der.iter())
			.filter(|(issuer, _)| issuer.subject().as_raw() == current.issuer().as_raw())
			.collect::<Vec<_>>();
		if candidates.is_empty() {
			return Err(format!(
				"unable to get issuer certificate for {}",
				current.subject()
			));
		}
		let Some((issuer, issuer_der)) = candidates
			.into_iter()
			.find(|(issuer, _)| current.verify_signature(Some(issuer.public_key())).is_ok())
		else {
			return Err(format!(
				"certificate signature failure: {} is not signed by {}",
				current.subject(),
				current.issuer()
			));
		};
		if !may_sign(issuer) {
			return Err(format!("issuer {} is not a CA", issuer.subject()));
		}
		path.push(issuer.subject().to_string());
		current = issuer.clone();
		current_der = issuer_der.as_ref();
	}
	Err("certificate chain too long".into())
}

/// Text dump of every certificate in a PEM document, in the spirit of
/// `openssl x509 -text`.
pub fn describe(pem_text: &str) -> Result<String> {
	let ders = certificates(pem_text)?;
	if ders.is_empty() {
		return Err(Error::NoCertificate("PEM input".into()));
	}
	let mut out = String::new();
	for (n, der) in ders.iter().enumerate() {
		let cert = parse(der).map_err(Error::InvalidCertificate)?;
		// fmt::Write for String is infallible
		let _ = describe_one(&mut out, n, &cert);
	}
	Ok(out)
}

fn describe_one(out: &mut String, n: usize, cert: &X509Certificate<'_>) -> fmt::Result {
	writeln!(out, "certificate {n}:")?;
	writeln!(out, "  subject:    {}", cert.subject())?;
	writeln!(out, "  issuer:     {}", cert.issuer())?;
	writeln!(out, "  serial:     {}", cert.raw_serial_as_string())?;
	writeln!(out, "  not before: {}", cert.validity().not_before)?;
	writeln!(out, "  not after:  {}", cert.validity().not_after)?;
	if let Ok(Some(bc)) = cert.basic_constraints() {
		match bc.value.path_len_constraint {
			Some(len) => writeln!(out, "  basic constraints: CA:{}, pathlen:{len}", bc.value.ca)?,
			None => writeln!(out, "  basic constraints: CA:{}", bc.value.ca)?,
		}
	}
	if let Ok(Some(ku)) = cert.key_usage() {
		let ku = ku.value;
		let usages = [
			(ku.digital_signature(), "digitalSignature"),
			(ku.non_repudiation(), "nonRepudiation"),
			(ku.key_encipherment(), "keyEncipherment"),
			(ku.data_encipherment(), "dataEncipherment"),
			(ku.key_agreement(), "keyAgreement"),
			(ku.key_cert_sign(), "keyCertSign"),
			(ku.crl_sign(), "cRLSign"),
		]
		.into_iter()
		.filter_map(|(set, name)| set.then_some(name))
		.collect::<Vec<_>>();
		writeln!(out, "  key usage: {}", usages.join(", "))?;
	}
	if let Ok(Some(eku)) = cert.extended_key_usage() {
		let eku = eku.value;
		let purposes = [
			(eku.server_auth, "serverAuth"),
			(eku.client_auth, "clientAuth"),
			(eku.email_protection, "emailProtection"),
			(eku.code_signing, "codeSigning"),
		]
		.into_iter()
		.filter_map(|(set, name)| set.then_some(name))
		.collect::<Vec<_>>();
		writeln!(out, "  extended key usage: {}", purposes.join(", "))?;
	}
	if let Ok(Some(san)) = cert.subject_alternative_name() {
		let names = san
			.value
			.general_names
			.iter()
			.map(|name| match name {
				GeneralName::DNSName(dns) => format!("DNS:{dns}"),
				GeneralName::RFC822Name(mail) => format!("email:{mail}"),
				GeneralName::IPAddress(ip) => match <[u8; 4]>::try_from(*ip) {
					Ok(v4) => format!("IP:{}", std::net::Ipv4Addr::from(v4)),
					Err(_) => format!("IP:{}", hex::encode(ip)),
				},
				other => format!("{other:?}"),
			})
			.collect::<Vec<_>>();
		writeln!(out, "  subject alt names: {}", names.join(", "))?;
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use rcgen::{CertificateParams, DnType, Issuer, KeyPair};

	use super::*;
	use crate::{cert::ExtensionProfile, Role};

	struct Ca {
		pem: String,
		issuer: Issuer<'static, KeyPair>,
	}

	fn params(cn: &str, role: Role) -> CertificateParams {
		let mut params = CertificateParams::default();
		params.distinguished_name = rcgen::DistinguishedName::new();
		params.distinguished_name.push(DnType::CommonName, cn);
		ExtensionProfile::for_role(role).apply(&mut params);
		params
	}

	fn anchor(cn: &str) -> Ca {
		let key = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P384_SHA384).unwrap();
		let params = params(cn, Role::TrustedIdentity);
		let pem = params.self_signed(&key).unwrap().pem();
		Ca {
			pem,
			issuer: Issuer::new(params, key),
		}
	}

	fn issue(parent: &Ca, cn: &str, role: Role) -> Ca {
		let key = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P384_SHA384).unwrap();
		let params = params(cn, role);
		let pem = params.signed_by(&key, &parent.issuer).unwrap().pem();
		Ca {
			pem,
			issuer: Issuer::new(params, key),
		}
	}

	#[test]
	fn bundle_is_plain_concatenation() {
		assert_eq!(bundle(&["a\n", "b\n", "c\n"]), "a\nb\nc\n");
	}

	#[test]
	fn certificates_skip_key_blocks() -> anyhow::Result<()> {
		let ca = anchor("Anchor");
		let key = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P384_SHA384)?;
		let mixed = bundle(&[ca.pem.clone(), key.serialize_pem()]);
		assert_eq!(certificates(&mixed)?.len(), 1);
		Ok(())
	}

	#[test]
	fn trust_anchor_verifies_against_itself() {
		let ca = anchor("Anchor");
		assert_eq!(
			verify(&ca.pem, &ca.pem),
			Verification::Ok(vec!["CN=Anchor".into()])
		);
	}

	#[test]
	fn full_chain() {
		let ti = anchor("Anchor");
		let root = issue(&ti, "Root", Role::RootCa);
		let intermediate = issue(&root, "Intermediate", Role::IntermediateCa);
		let leaf = issue(&intermediate, "localhost", Role::Server);

		let root_chain = bundle(&[&root.pem, &ti.pem]);
		let intermediate_chain = bundle(&[intermediate.pem.as_str(), &root_chain]);
		let leaf_chain = bundle(&[leaf.pem.as_str(), &intermediate_chain]);

		assert!(verify(&root.pem, &root_chain).is_ok());
		assert!(verify(&root.pem, &ti.pem).is_ok());
		assert!(verify(&root_chain, &ti.pem).is_ok());
		assert!(verify(&intermediate.pem, &root_chain).is_ok());
		assert_eq!(
			verify(&leaf_chain, &intermediate_chain),
			Verification::Ok(vec![
				"CN=localhost".into(),
				"CN=Intermediate".into(),
				"CN=Root".into(),
				"CN=Anchor".into(),
			])
		);
	}

	#[test]
	fn missing_intermediate_fails() {
		let ti = anchor("Anchor");
		let root = issue(&ti, "Root", Role::RootCa);
		let intermediate = issue(&root, "Intermediate", Role::IntermediateCa);
		let leaf = issue(&intermediate, "localhost", Role::Server);

		let Verification::Failed(reason) = verify(&leaf.pem, &bundle(&[&root.pem, &ti.pem]))
		else {
			panic!("leaf verified without its issuer");
		};
		assert!(reason.contains("unable to get issuer"), "{reason}");
	}

	#[test]
	fn replaced_issuer_fails_signature() {
		let ti = anchor("Anchor");
		let old_root = issue(&ti, "Root", Role::RootCa);
		let intermediate = issue(&old_root, "Intermediate", Role::IntermediateCa);
		let new_root = issue(&ti, "Root", Role::RootCa);

		let Verification::Failed(reason) =
			verify(&intermediate.pem, &bundle(&[&new_root.pem, &ti.pem]))
		else {
			panic!("verified against a replaced root");
		};
		assert!(reason.contains("signature failure"), "{reason}");
	}

	#[test]
	fn leaf_cannot_act_as_issuer() {
		let ti = anchor("Anchor");
		let leaf = issue(&ti, "leaf.lan", Role::Server);
		let child = issue(&leaf, "child.lan", Role::Server);
		let Verification::Failed(reason) = verify(&child.pem, &bundle(&[&leaf.pem, &ti.pem]))
		else {
			panic!("end entity accepted as issuer");
		};
		assert!(reason.contains("is not a CA"), "{reason}");
	}

	#[test]
	fn untrusted_self_signed_fails() {
		let a = anchor("A");
		let b = anchor("B");
		assert!(!verify(&a.pem, &b.pem).is_ok());
		assert!(!verify(&a.pem, "").is_ok());
		assert!(!verify("", &a.pem).is_ok());
	}

	#[test]
	fn describe_lists_extensions() -> anyhow::Result<()> {
		let ti = anchor("Anchor");
		let key = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P384_SHA384)?;
		let mut leaf = params("localhost", Role::Server);
		leaf.subject_alt_names = vec![
			rcgen::SanType::DnsName("localhost".try_into()?),
			rcgen::SanType::IpAddress("127.0.0.1".parse()?),
		];
		let pem = leaf.signed_by(&key, &ti.issuer)?.pem();
		let text = describe(&pem)?;
		assert!(text.contains("subject:    CN=localhost"), "{text}");
		assert!(text.contains("basic constraints: CA:false"), "{text}");
		assert!(text.contains("extended key usage: serverAuth"), "{text}");
		assert!(
			text.contains("subject alt names: DNS:localhost, IP:127.0.0.1"),
			"{text}"
		);
		Ok(())
	}

	#[test]
	fn subject_of_signer() -> anyhow::Result<()> {
		let key = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P384_SHA384)?;
		let mut ca = params("Home Lab Root CA", Role::RootCa);
		ca.distinguished_name.push(DnType::CountryName, "US");
		ca.distinguished_name.push(DnType::OrganizationName, "Home Lab");
		ca.distinguished_name.push(DnType::OrganizationalUnitName, "Lab");
		let pem = ca.self_signed(&key)?.pem();

		let dn = subject(&bundle(&[pem.as_str(), &anchor("Anchor").pem]))?;
		assert_eq!(dn.iter().count(), 3);
		assert_eq!(dn.get(&DnType::CountryName), Some(&"US".into()));
		assert_eq!(dn.get(&DnType::OrganizationName), Some(&"Home Lab".into()));
		assert_eq!(dn.get(&DnType::CommonName), Some(&"Home Lab Root CA".into()));

		assert!(matches!(subject(""), Err(Error::NoCertificate(_))));
		Ok(())
	}
}
