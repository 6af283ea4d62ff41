//! Diagnostic sweep over issued certificates and their bundles.
//!
//! Every check validates one file against a trusted bundle and records
//! PASS or FAIL on its own; a failing check never stops the sweep.

use std::{
	fmt,
	path::{Path, PathBuf},
};

use tracing::{info, warn};

use crate::{
	cert::CertificateAuthority,
	chain::{self, Verification},
	db::Database,
	layout::{read_file, Artifacts, Layout},
	Error, Role,
};

/// Result of one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
	/// The target validated against the trusted bundle.
	Pass,
	/// The target did not validate, or an input is missing.
	Fail(String),
}

/// One file validated against one trusted bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
	/// Short description, `<target> against <trusted>`.
	pub label: String,
	/// Validated file.
	pub target: PathBuf,
	/// Trusted bundle.
	pub trusted: PathBuf,
	/// What happened.
	pub outcome: Outcome,
	/// Certificate dump and walked chain, in verbose mode.
	pub detail: Option<String>,
}

impl Check {
	/// Whether the check passed.
	pub fn passed(&self) -> bool {
		self.outcome == Outcome::Pass
	}
}

impl fmt::Display for Check {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.outcome {
			Outcome::Pass => write!(f, "PASS  {}", self.label),
			Outcome::Fail(reason) => write!(f, "FAIL  {} ({reason})", self.label),
		}
	}
}

/// All checks run for one certificate name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
	/// Name the sweep was asked for.
	pub name: String,
	/// Role the name resolved to.
	pub role: Role,
	/// Checks in execution order.
	pub checks: Vec<Check>,
}

impl Report {
	/// Whether every check passed.
	pub fn passed(&self) -> bool {
		self.checks.iter().all(Check::passed)
	}
}

/// A check to be run: target file and trusted bundle.
pub(crate) type Plan = (PathBuf, PathBuf);

/// Checks proving that `artifacts`, issued for `role`, chain up to the anchor.
pub(crate) fn own_checks(layout: &Layout, role: Role, artifacts: &Artifacts) -> Vec<Plan> {
	let Some(signer) = role.signer() else {
		return vec![(artifacts.cert.clone(), artifacts.cert.clone())];
	};
	let signer_chain = signer_chain(layout, signer);
	let mut plan = vec![
		(artifacts.cert.clone(), artifacts.chain.clone()),
		(artifacts.cert.clone(), signer_chain.clone()),
		(artifacts.chain.clone(), signer_chain.clone()),
	];
	if role == Role::Server {
		plan.push((artifacts.proxy_bundle.clone(), signer_chain));
	}
	plan
}

/// Bundle a certificate signed by `signer` is validated against.
pub(crate) fn signer_chain(layout: &Layout, signer: Role) -> PathBuf {
	let artifacts = layout.ca(signer);
	match signer {
		Role::TrustedIdentity => artifacts.cert,
		_ => artifacts.chain,
	}
}

/// Checks for `role` preceded by the checks of every ancestor CA.
///
/// A root CA sweep repeats only the root's own checks.
pub(crate) fn sweep(layout: &Layout, role: Role, artifacts: &Artifacts) -> Vec<Plan> {
	if role == Role::RootCa {
		return own_checks(layout, role, artifacts);
	}
	let mut ancestors = Vec::new();
	let mut next = role.signer();
	while let Some(ancestor) = next {
		ancestors.push(ancestor);
		next = ancestor.signer();
	}
	let mut plan = Vec::new();
	for ancestor in ancestors.into_iter().rev() {
		plan.extend(own_checks(layout, ancestor, &layout.ca(ancestor)));
	}
	plan.extend(own_checks(layout, role, artifacts));
	plan
}

fn file_name(path: &Path) -> String {
	path.file_name()
		.map(|name| name.to_string_lossy().into_owned())
		.unwrap_or_else(|| path.display().to_string())
}

/// Run one check.
pub fn check<B: CertificateAuthority + ?Sized>(
	backend: &B,
	target: &Path,
	trusted: &Path,
	verbose: bool,
) -> Check {
	let label = format!("{} against {}", file_name(target), file_name(trusted));
	let mut detail = None;
	let outcome = match (read_file(target, "target"), read_file(trusted, "trusted bundle")) {
		(Err(Error::MissingFile { path, .. }), _) | (_, Err(Error::MissingFile { path, .. })) => {
			Outcome::Fail(format!("file not found: {}", path.display()))
		},
		(Err(e), _) | (_, Err(e)) => Outcome::Fail(e.to_string()),
		(Ok(target_pem), Ok(trusted_pem)) => {
			let verification = backend.verify_chain(&target_pem, &trusted_pem);
			if verbose {
				let mut text = match chain::describe(&target_pem) {
					Ok(text) => text,
					Err(e) => format!("{e}\n"),
				};
				text.push_str(&format!("chain: {verification}\n"));
				detail = Some(text);
			}
			match verification {
				Verification::Ok(_) => Outcome::Pass,
				Verification::Failed(reason) => Outcome::Fail(reason),
			}
		},
	};
	let check = Check {
		label,
		target: target.to_owned(),
		trusted: trusted.to_owned(),
		outcome,
		detail,
	};
	if check.passed() {
		info!("{check}");
	} else {
		warn!("{check}");
	}
	check
}

/// Run a list of checks.
pub(crate) fn run<B: CertificateAuthority + ?Sized>(
	backend: &B,
	plan: &[Plan],
	verbose: bool,
) -> Vec<Check> {
	plan.iter()
		.map(|(target, trusted)| check(backend, target, trusted, verbose))
		.collect()
}

/// Role and artifacts for a certificate name.
///
/// Well-known CA names come first, then the role recorded in the index
/// for a matching common name. Anything else is a server leaf.
pub(crate) fn resolve(layout: &Layout, name: &str) -> (Role, Artifacts) {
	if let Some(role) = Role::from_ca_name(name) {
		return (role, layout.ca(role));
	}
	let recorded = Database::open(layout.db_dir()).and_then(|db| db.find(name));
	match recorded {
		Ok(Some(record)) if record.role.is_ca() => (record.role, layout.ca(record.role)),
		Ok(Some(record)) => (record.role, layout.leaf(name)),
		Ok(None) => (Role::Server, layout.leaf(name)),
		Err(e) => {
			warn!("cannot look up `{name}` in the index, assuming a server certificate: {e}");
			(Role::Server, layout.leaf(name))
		},
	}
}
