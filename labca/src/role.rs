//! Certificate roles in the hierarchy.

use std::{fmt, str::FromStr};

/// Position of a certificate in the hierarchy.
///
/// The role decides the extension profile, the signing authority, the
/// directory tier, and which checks the verifier runs. It is recorded
/// with every issued certificate in the database index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
	/// Self-signed trust anchor.
	TrustedIdentity,
	/// Root CA, signed by the trust anchor.
	RootCa,
	/// Intermediate CA, signed by the root CA.
	IntermediateCa,
	/// TLS server leaf, signed by the intermediate CA.
	Server,
	/// TLS client / e-mail leaf, signed by the intermediate CA.
	Client,
}

impl Role {
	/// All roles, top of the hierarchy first.
	pub const ALL: [Role; 5] = [
		Role::TrustedIdentity,
		Role::RootCa,
		Role::IntermediateCa,
		Role::Server,
		Role::Client,
	];

	/// Stable name used for profile files, CA artifact names and the index.
	pub fn as_str(&self) -> &'static str {
		match self {
			Role::TrustedIdentity => "trusted-identity",
			Role::RootCa => "root-ca",
			Role::IntermediateCa => "intermediate-ca",
			Role::Server => "server",
			Role::Client => "client",
		}
	}

	/// Role whose key signs certificates of this role.
	pub fn signer(&self) -> Option<Role> {
		match self {
			Role::TrustedIdentity => None,
			Role::RootCa => Some(Role::TrustedIdentity),
			Role::IntermediateCa => Some(Role::RootCa),
			Role::Server | Role::Client => Some(Role::IntermediateCa),
		}
	}

	/// Whether certificates of this role may sign others.
	pub fn is_ca(&self) -> bool {
		matches!(
			self,
			Role::TrustedIdentity | Role::RootCa | Role::IntermediateCa
		)
	}

	/// Whether this is an end-entity role.
	pub fn is_leaf(&self) -> bool {
		!self.is_ca()
	}

	/// CA roles resolved from their well-known artifact name.
	pub fn from_ca_name(name: &str) -> Option<Role> {
		[Role::TrustedIdentity, Role::RootCa, Role::IntermediateCa]
			.into_iter()
			.find(|role| role.as_str() == name)
	}

	/// Warning shown before an existing certificate of this role is replaced.
	pub fn overwrite_warning(&self) -> &'static str {
		match self {
			Role::TrustedIdentity => {
				"regenerating the trusted identity invalidates every certificate issued by the root CA, \
				 the intermediate CA and all leaf certificates"
			},
			Role::RootCa => {
				"regenerating the root CA invalidates the intermediate CA and every leaf certificate it signed"
			},
			Role::IntermediateCa => {
				"regenerating the intermediate CA invalidates every leaf certificate it signed"
			},
			Role::Server | Role::Client => {
				"regenerating this certificate invalidates the existing certificate, key and bundles"
			},
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Role {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Role::ALL
			.into_iter()
			.find(|role| role.as_str() == s)
			.ok_or_else(|| format!("unknown certificate role `{s}`"))
	}
}
