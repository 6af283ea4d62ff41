use std::net::{IpAddr, Ipv4Addr};

use rcgen::{
	BasicConstraints, CertificateParams, CustomExtension, ExtendedKeyUsagePurpose, IsCa,
	KeyUsagePurpose, SanType,
};

use crate::{Error, Role};

/// Netscape certificate type, `2.16.840.1.113730.1.1`.
const OID_NS_CERT_TYPE: &[u64] = &[2, 16, 840, 1, 113730, 1, 1];

/// Bits of the Netscape certificate type BIT STRING, most significant first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NsCertType {
	/// `client`
	Client = 0x80,
	/// `server`
	Server = 0x40,
	/// `email`
	Email = 0x20,
}

/// X.509v3 extensions applied to a certificate at signing time.
///
/// Built per [`Role`] with [`ExtensionProfile::for_role`], then extended
/// with subject alternative names for leaf certificates.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionProfile {
	is_ca: IsCa,
	key_usages: Vec<KeyUsagePurpose>,
	extended_key_usages: Vec<ExtendedKeyUsagePurpose>,
	ns_cert_type: Vec<NsCertType>,
	subject_alt_names: Vec<SanType>,
	authority_key_identifier: bool,
}

impl ExtensionProfile {
	/// Profile for a certificate of `role`, without subject alternative names.
	pub fn for_role(role: Role) -> Self {
		match role {
			Role::TrustedIdentity => Self::ca(BasicConstraints::Unconstrained, false),
			Role::RootCa => Self::ca(BasicConstraints::Unconstrained, true),
			Role::IntermediateCa => Self::ca(BasicConstraints::Constrained(0), true),
			Role::Server => Self::end_entity(
				vec![
					KeyUsagePurpose::DigitalSignature,
					KeyUsagePurpose::KeyEncipherment,
				],
				vec![ExtendedKeyUsagePurpose::ServerAuth],
				vec![NsCertType::Server],
			),
			Role::Client => Self::end_entity(
				vec![
					KeyUsagePurpose::DigitalSignature,
					KeyUsagePurpose::ContentCommitment,
					KeyUsagePurpose::KeyEncipherment,
				],
				vec![
					ExtendedKeyUsagePurpose::ClientAuth,
					ExtendedKeyUsagePurpose::EmailProtection,
				],
				vec![NsCertType::Client, NsCertType::Email],
			),
		}
	}

	fn ca(constraints: BasicConstraints, authority_key_identifier: bool) -> Self {
		Self {
			is_ca: IsCa::Ca(constraints),
			key_usages: vec![
				KeyUsagePurpose::DigitalSignature,
				KeyUsagePurpose::KeyCertSign,
				KeyUsagePurpose::CrlSign,
			],
			extended_key_usages: Vec::new(),
			ns_cert_type: Vec::new(),
			subject_alt_names: Vec::new(),
			authority_key_identifier,
		}
	}

	fn end_entity(
		key_usages: Vec<KeyUsagePurpose>,
		extended_key_usages: Vec<ExtendedKeyUsagePurpose>,
		ns_cert_type: Vec<NsCertType>,
	) -> Self {
		Self {
			is_ca: IsCa::ExplicitNoCa,
			key_usages,
			extended_key_usages,
			ns_cert_type,
			subject_alt_names: Vec::new(),
			authority_key_identifier: true,
		}
	}

	/// Append a DNS name. Duplicates are ignored.
	pub fn dns_name(mut self, name: &str) -> Result<Self, Error> {
		let san = SanType::DnsName(
			name.try_into()
				.map_err(|_| Error::InvalidDnsName(name.into()))?,
		);
		if !self.subject_alt_names.contains(&san) {
			self.subject_alt_names.push(san);
		}
		Ok(self)
	}

	/// Append an IPv4 address.
	pub fn ip_address(mut self, addr: Ipv4Addr) -> Self {
		let san = SanType::IpAddress(IpAddr::V4(addr));
		if !self.subject_alt_names.contains(&san) {
			self.subject_alt_names.push(san);
		}
		self
	}

	/// Subject alternative names recorded so far.
	pub fn subject_alt_names(&self) -> &[SanType] {
		&self.subject_alt_names
	}

	/// Extended key usages of the profile.
	pub fn extended_key_usages(&self) -> &[ExtendedKeyUsagePurpose] {
		&self.extended_key_usages
	}

	/// Overwrite the extension fields of `params` with this profile.
	pub fn apply(&self, params: &mut CertificateParams) {
		params.is_ca = self.is_ca.clone();
		params.key_usages = self.key_usages.clone();
		params.extended_key_usages = self.extended_key_usages.clone();
		params.subject_alt_names = self.subject_alt_names.clone();
		params.use_authority_key_identifier_extension = self.authority_key_identifier;
		params
			.custom_extensions
			.retain(|ext| !ext.oid_components().eq(OID_NS_CERT_TYPE.iter().copied()));
		if !self.ns_cert_type.is_empty() {
			params.custom_extensions.push(CustomExtension::from_oid_content(
				OID_NS_CERT_TYPE,
				ns_cert_type_der(&self.ns_cert_type),
			));
		}
	}

	/// Render the profile in OpenSSL extension file syntax.
	pub fn to_openssl_conf(&self) -> String {
		let mut out = String::new();
		match &self.is_ca {
			IsCa::Ca(BasicConstraints::Unconstrained) => {
				out.push_str("basicConstraints = critical, CA:TRUE\n")
			},
			IsCa::Ca(BasicConstraints::Constrained(n)) => {
				out.push_str(&format!("basicConstraints = critical, CA:TRUE, pathlen:{n}\n"))
			},
			IsCa::ExplicitNoCa | IsCa::NoCa => out.push_str("basicConstraints = CA:FALSE\n"),
		}
		let usages = self
			.key_usages
			.iter()
			.map(|ku| match ku {
				KeyUsagePurpose::DigitalSignature => "digitalSignature",
				KeyUsagePurpose::ContentCommitment => "nonRepudiation",
				KeyUsagePurpose::KeyEncipherment => "keyEncipherment",
				KeyUsagePurpose::DataEncipherment => "dataEncipherment",
				KeyUsagePurpose::KeyAgreement => "keyAgreement",
				KeyUsagePurpose::KeyCertSign => "keyCertSign",
				KeyUsagePurpose::CrlSign => "cRLSign",
				KeyUsagePurpose::EncipherOnly => "encipherOnly",
				KeyUsagePurpose::DecipherOnly => "decipherOnly",
			})
			.collect::<Vec<_>>();
		out.push_str(&format!("keyUsage = critical, {}\n", usages.join(", ")));
		if !self.extended_key_usages.is_empty() {
			let ekus = self
				.extended_key_usages
				.iter()
				.map(|eku| match eku {
					ExtendedKeyUsagePurpose::ServerAuth => "serverAuth".to_string(),
					ExtendedKeyUsagePurpose::ClientAuth => "clientAuth".to_string(),
					ExtendedKeyUsagePurpose::EmailProtection => "emailProtection".to_string(),
					other => format!("{other:?}"),
				})
				.collect::<Vec<_>>();
			out.push_str(&format!("extendedKeyUsage = {}\n", ekus.join(", ")));
		}
		if !self.ns_cert_type.is_empty() {
			let types = self
				.ns_cert_type
				.iter()
				.map(|t| match t {
					NsCertType::Client => "client",
					NsCertType::Server => "server",
					NsCertType::Email => "email",
				})
				.collect::<Vec<_>>();
			out.push_str(&format!("nsCertType = {}\n", types.join(", ")));
		}
		if !self.subject_alt_names.is_empty() {
			let names = self
				.subject_alt_names
				.iter()
				.map(|san| match san {
					SanType::DnsName(name) => format!("DNS:{}", name.as_str()),
					SanType::IpAddress(ip) => format!("IP:{ip}"),
					SanType::Rfc822Name(mail) => format!("email:{}", mail.as_str()),
					SanType::URI(uri) => format!("URI:{}", uri.as_str()),
					other => format!("{other:?}"),
				})
				.collect::<Vec<_>>();
			out.push_str(&format!("subjectAltName = {}\n", names.join(", ")));
		}
		out
	}
}

/// DER BIT STRING holding the OR of `types`, with unused trailing bits stripped.
fn ns_cert_type_der(types: &[NsCertType]) -> Vec<u8> {
	let bits = types.iter().fold(0u8, |acc, t| acc | *t as u8);
	if bits == 0 {
		return vec![0x03, 0x01, 0x00];
	}
	vec![0x03, 0x02, bits.trailing_zeros() as u8, bits]
}
