use std::net::Ipv4Addr;

use tracing::warn;

use super::{Authority, Issuance, Issued, Lifetime};
use crate::{
	cert::{CertificateAuthority, ExtensionProfile, KeyAlgorithm},
	guard::Confirm,
	Error, Result, Role,
};

/// Second DNS name added to a server certificate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HostAlias {
	/// `*.<fqdn>`
	#[default]
	Wildcard,
	/// `www.<fqdn>`
	Www,
	/// Only `<fqdn>` itself.
	None,
}

impl HostAlias {
	fn for_host(&self, fqdn: &str) -> Option<String> {
		match self {
			HostAlias::Wildcard => Some(format!("*.{fqdn}")),
			HostAlias::Www => Some(format!("www.{fqdn}")),
			HostAlias::None => None,
		}
	}
}

/// Parameters of a server or client certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafRequest {
	/// Common name and artifact name: an FQDN for servers, usually an
	/// e-mail address for clients.
	pub name: String,
	/// [`Role::Server`] or [`Role::Client`].
	pub role: Role,
	/// Key algorithm.
	pub algorithm: KeyAlgorithm,
	/// Alias added next to the server name. Ignored for clients.
	pub alias: HostAlias,
	/// IPv4 subject alternative name. Ignored for clients.
	pub ip: Option<Ipv4Addr>,
	/// Additional DNS subject alternative names.
	pub extra_sans: Vec<String>,
}

impl LeafRequest {
	fn new(name: impl Into<String>, role: Role) -> Self {
		Self {
			name: name.into(),
			role,
			algorithm: KeyAlgorithm::default(),
			alias: HostAlias::default(),
			ip: None,
			extra_sans: Vec::new(),
		}
	}

	/// Server certificate for `fqdn`.
	pub fn server(fqdn: impl Into<String>) -> Self {
		Self::new(fqdn, Role::Server)
	}

	/// Client certificate for `name`.
	pub fn client(name: impl Into<String>) -> Self {
		Self::new(name, Role::Client)
	}

	/// Use `algorithm` for the key.
	pub fn algorithm(mut self, algorithm: KeyAlgorithm) -> Self {
		self.algorithm = algorithm;
		self
	}

	/// Use `alias` as the second server name.
	pub fn alias(mut self, alias: HostAlias) -> Self {
		self.alias = alias;
		self
	}

	/// Add an IPv4 subject alternative name.
	pub fn ip(mut self, addr: Ipv4Addr) -> Self {
		self.ip = Some(addr);
		self
	}

	/// Add a DNS subject alternative name.
	pub fn san(mut self, name: impl Into<String>) -> Self {
		self.extra_sans.push(name.into());
		self
	}

	/// Parse an IPv4 literal given as `, IP:<addr>`, `IP:<addr>` or `<addr>`.
	pub fn parse_ip(literal: &str) -> Result<Ipv4Addr> {
		let text = literal.trim();
		let text = text.strip_prefix(',').unwrap_or(text).trim_start();
		let text = text.strip_prefix("IP:").unwrap_or(text).trim();
		text.parse()
			.map_err(|_| Error::InvalidAddress(literal.to_owned()))
	}

	fn validate(&self) -> Result<()> {
		let name = self.name.as_str();
		let usable = !name.is_empty()
			&& !name.starts_with('.')
			&& !name.contains(['/', '\\'])
			&& !name.chars().any(|c| c.is_whitespace() || c.is_control())
			&& Role::from_ca_name(name).is_none();
		if !usable || self.role.is_ca() {
			return Err(Error::InvalidName(self.name.clone()));
		}
		Ok(())
	}

	fn extensions(&self) -> Result<ExtensionProfile> {
		let mut profile = ExtensionProfile::for_role(self.role);
		match self.role {
			Role::Server => {
				profile = profile.dns_name(&self.name)?;
				if let Some(alias) = self.alias.for_host(&self.name) {
					profile = profile.dns_name(&alias)?;
				}
				if let Some(ip) = self.ip {
					profile = profile.ip_address(ip);
				}
				for san in &self.extra_sans {
					profile = profile.dns_name(san)?;
				}
			},
			_ if self.algorithm == KeyAlgorithm::Rsa => {
				if !self.extra_sans.is_empty() || self.ip.is_some() {
					warn!("RSA client certificates carry no subject alternative names, ignoring");
				}
			},
			_ => {
				if self.ip.is_some() {
					warn!("client certificates carry no IP subject alternative name, ignoring");
				}
				for san in &self.extra_sans {
					profile = profile.dns_name(san)?;
				}
			},
		}
		Ok(profile)
	}
}

impl<B: CertificateAuthority> Authority<B> {
	/// Create a server or client certificate signed by the intermediate CA.
	pub fn issue_leaf(&self, request: &LeafRequest, confirm: &mut dyn Confirm) -> Result<Issued> {
		request.validate()?;
		let db = self.database()?;
		let extensions = request.extensions()?;
		let profile = self.profile(request.role)?;
		self.issue(
			db,
			Issuance {
				role: request.role,
				artifacts: self.layout.leaf(&request.name),
				common_name: request.name.clone(),
				subject: profile.subject,
				lifetime: Lifetime::SignerDefault,
				extensions,
				algorithm: request.algorithm,
				export_key: true,
			},
			confirm,
		)
	}
}
