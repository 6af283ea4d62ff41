//! Command Line argument parsing
#![allow(missing_docs)]

use std::{net::Ipv4Addr, path::PathBuf};

use bpaf::Bpaf;
use labca::{HostAlias, KeyAlgorithm, LeafRequest, Role};

#[derive(Clone, Debug, Bpaf)]
#[bpaf(options, version)]
/// labca: a private certificate authority for the home lab
pub struct Options {
	/// Base directory of the certificate authority [default: ~/labca]
	#[bpaf(long, env("LABCA_HOME"), argument("DIR"), optional)]
	pub home: Option<PathBuf>,
	#[bpaf(external)]
	pub command: Command,
}

#[derive(Clone, Debug, Bpaf)]
pub enum Command {
	/// Create the directory layout, serial database and role profiles
	#[bpaf(command)]
	Init {
		/// Copy <role>.toml profile templates from this directory
		#[bpaf(long, argument("DIR"), optional)]
		templates: Option<PathBuf>,
		/// Start with unique_subject = no
		#[bpaf(long)]
		allow_duplicate_subjects: bool,
	},
	/// Set unique_subject in the database
	#[bpaf(command)]
	Policy {
		#[bpaf(positional::<String>("yes|no"), parse(parse_switch))]
		unique_subject: bool,
	},
	/// Issue the self-signed trusted identity
	#[bpaf(command("trusted-identity"))]
	TrustedIdentity {
		/// Overwrite an existing certificate without asking
		#[bpaf(long)]
		yes: bool,
	},
	/// Issue the root CA, signed by the trusted identity
	#[bpaf(command("root-ca"))]
	RootCa {
		/// Overwrite an existing certificate without asking
		#[bpaf(long)]
		yes: bool,
	},
	/// Issue the intermediate CA, signed by the root CA
	#[bpaf(command("intermediate-ca"))]
	IntermediateCa {
		/// Overwrite an existing certificate without asking
		#[bpaf(long)]
		yes: bool,
	},
	/// Issue a TLS server certificate
	#[bpaf(command)]
	Server(#[bpaf(external(leaf))] Leaf),
	/// Issue a TLS client / e-mail certificate
	#[bpaf(command)]
	Client(#[bpaf(external(leaf))] Leaf),
	/// Verify a certificate and its bundles against every ancestor
	#[bpaf(command)]
	Verify {
		/// Print every certificate and the walked chain
		#[bpaf(short, long)]
		verbose: bool,
		/// Certificate name: trusted-identity, root-ca, intermediate-ca or a leaf name
		#[bpaf(positional("NAME"), optional)]
		name: Option<String>,
	},
}

#[derive(Clone, Debug, Bpaf)]
pub struct Leaf {
	/// Overwrite an existing certificate without asking
	#[bpaf(long)]
	pub yes: bool,
	/// Use an RSA 2048 key instead of ECDSA P-384
	#[bpaf(long)]
	pub rsa: bool,
	#[bpaf(external)]
	pub alias: Alias,
	/// IPv4 subject alternative name, `, IP:<addr>` or plain address (servers)
	#[bpaf(long, argument::<String>("IP"), parse(parse_ip), optional)]
	pub ip: Option<Ipv4Addr>,
	/// Extra DNS subject alternative name (apply multiple times for multiple names)
	#[bpaf(long, argument("NAME"), many)]
	pub san: Vec<String>,
	/// FQDN for servers, e-mail address for clients; prompted for if omitted
	#[bpaf(positional("NAME"), optional)]
	pub name: Option<String>,
}

/// Second server name next to the FQDN.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Bpaf)]
#[bpaf(fallback(Alias::Wildcard))]
pub enum Alias {
	/// Add DNS:*.<name> (default)
	Wildcard,
	/// Add DNS:www.<name> instead of the wildcard
	Www,
	/// Add no second name
	Bare,
}

impl From<Alias> for HostAlias {
	fn from(alias: Alias) -> Self {
		match alias {
			Alias::Wildcard => HostAlias::Wildcard,
			Alias::Www => HostAlias::Www,
			Alias::Bare => HostAlias::None,
		}
	}
}

impl Leaf {
	/// Request for `role` named `name`.
	pub fn request(&self, role: Role, name: String) -> LeafRequest {
		let mut request = match role {
			Role::Client => LeafRequest::client(name),
			_ => LeafRequest::server(name),
		}
		.alias(self.alias.into());
		if self.rsa {
			request = request.algorithm(KeyAlgorithm::Rsa);
		}
		if let Some(ip) = self.ip {
			request = request.ip(ip);
		}
		for san in &self.san {
			request = request.san(san.as_str());
		}
		request
	}
}

fn parse_ip(literal: String) -> labca::Result<Ipv4Addr> {
	LeafRequest::parse_ip(&literal)
}

fn parse_switch(value: String) -> Result<bool, String> {
	match value.as_str() {
		"yes" => Ok(true),
		"no" => Ok(false),
		other => Err(format!("expected `yes` or `no`, found `{other}`")),
	}
}
