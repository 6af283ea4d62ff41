//! Issuance pipelines for every role of the hierarchy.
//!
//! Each run follows the same steps: preconditions, database lock and
//! counter refresh, the overwrite guard, key, request, signature, output
//! files, index commit, then the role's own verification checks.

use std::path::PathBuf;

use rcgen::KeyPair;
use tracing::info;

use crate::{
	cert::{CertificateAuthority, ExtensionProfile, KeyAlgorithm, Rcgen, SignRequest, Terms},
	chain,
	db::{Database, IndexRecord},
	guard::{self, Confirm},
	layout::{read_file, write_file, Access, Artifacts, InitOptions, Layout},
	profile::{Profile, SubjectTemplate},
	verifier::{self, Check, Report},
	Error, Result, Role, StepContext,
};

mod ca;
mod leaf;
pub use leaf::{HostAlias, LeafRequest};

/// A certificate authority rooted at a base directory.
///
/// Generic over the [`CertificateAuthority`] backend doing the
/// cryptography; [`Rcgen`] by default.
#[derive(Debug, Clone)]
pub struct Authority<B = Rcgen> {
	layout: Layout,
	backend: B,
}

/// Outcome of a successful issuance run.
#[derive(Debug, Clone)]
pub struct Issued {
	/// Role of the issued certificate.
	pub role: Role,
	/// Files written.
	pub artifacts: Artifacts,
	/// Index record added to the database.
	pub record: IndexRecord,
	/// Checks run on the written files.
	pub checks: Vec<Check>,
}

impl Issued {
	/// Whether every post-issuance check passed.
	pub fn passed(&self) -> bool {
		self.checks.iter().all(Check::passed)
	}
}

/// How long the new certificate is valid.
enum Lifetime {
	/// Fixed number of days.
	Days(u32),
	/// The signer's `default_days`.
	SignerDefault,
}

/// Everything a run needs to know about the certificate it produces.
struct Issuance {
	role: Role,
	artifacts: Artifacts,
	common_name: String,
	subject: SubjectTemplate,
	lifetime: Lifetime,
	extensions: ExtensionProfile,
	algorithm: KeyAlgorithm,
	export_key: bool,
}

/// Certificate, key and chain of the CA signing a run.
struct Signer {
	role: Role,
	profile: PathBuf,
	cert_pem: String,
	key_pem: String,
	chain_pem: String,
}

impl Authority<Rcgen> {
	/// Authority under `base` using the in-process backend.
	pub fn open(base: impl Into<PathBuf>) -> Self {
		Self::with_backend(Layout::new(base), Rcgen)
	}
}

impl<B: CertificateAuthority> Authority<B> {
	/// Authority with a custom backend.
	pub fn with_backend(layout: Layout, backend: B) -> Self {
		Self { layout, backend }
	}

	/// Directory layout.
	pub fn layout(&self) -> &Layout {
		&self.layout
	}

	/// Create the directory tree, database and profiles.
	pub fn init(&self, options: &InitOptions) -> Result<()> {
		self.layout.init(options)
	}

	/// Serial database.
	pub fn database(&self) -> Result<Database> {
		Database::open(self.layout.db_dir())
	}

	/// Set `unique_subject` in the database attributes.
	pub fn set_unique_subject(&self, unique: bool) -> Result<()> {
		self.database()?.set_unique_subject(unique)?;
		info!(
			"unique_subject = {}",
			if unique { "yes" } else { "no" }
		);
		Ok(())
	}

	/// Validate the certificate called `name` and all of its ancestors.
	///
	/// Individual failures are recorded in the report, never returned.
	pub fn verify(&self, name: &str, verbose: bool) -> Result<Report> {
		if name.trim().is_empty() {
			return Err(Error::InvalidName(name.to_owned()));
		}
		let (role, artifacts) = verifier::resolve(&self.layout, name);
		info!("verifying `{name}` as {role}");
		let plan = verifier::sweep(&self.layout, role, &artifacts);
		Ok(Report {
			name: name.to_owned(),
			role,
			checks: verifier::run(&self.backend, &plan, verbose),
		})
	}

	/// Parsed profile of `role`. A missing file is a precondition failure.
	fn profile(&self, role: Role) -> Result<Profile> {
		let path = self.layout.profile(role);
		if !path.is_file() {
			return Err(Error::MissingFile {
				what: "profile",
				path,
			});
		}
		Profile::load(&path)
	}

	fn signer(&self, role: Role) -> Result<Signer> {
		let artifacts = self.layout.ca(role);
		let profile = self.layout.profile(role);
		if !profile.is_file() {
			return Err(Error::MissingFile {
				what: "signing CA profile",
				path: profile,
			});
		}
		Ok(Signer {
			role,
			profile,
			cert_pem: read_file(&artifacts.cert, "signing CA certificate")?,
			key_pem: read_file(&artifacts.key, "signing CA key")?,
			chain_pem: read_file(
				&verifier::signer_chain(&self.layout, role),
				"signing CA chain bundle",
			)?,
		})
	}

	fn issue(&self, db: Database, plan: Issuance, confirm: &mut dyn Confirm) -> Result<Issued> {
		let Issuance {
			role,
			artifacts,
			common_name,
			..
		} = &plan;
		let role = *role;
		let signer = role.signer().map(|signer| self.signer(signer)).transpose()?;
		let subject = plan.subject.distinguished_name(common_name);

		let txn = db.begin()?;
		txn.refresh_counters()?;
		let exists = artifacts.cert.exists() || db.find(common_name)?.is_some();
		guard::resolve(
			common_name,
			exists,
			db.unique_subject()?,
			role.overwrite_warning(),
			confirm,
		)?;
		let reservation = txn.reserve(role, &plan.subject.oneline(common_name))?;
		// A CA's own lifetime is checked before anything is written.
		let own_terms = match plan.lifetime {
			Lifetime::Days(days) => Some((days, Terms::new(reservation.serial().to_vec(), days)?)),
			Lifetime::SignerDefault => None,
		};

		info!("{role}: generating {} key", plan.algorithm);
		let key = self
			.backend
			.generate_key(plan.algorithm)
			.step(format!("generating {role} key"))?;
		let key_pem = key.serialize_pem();
		write_file(&artifacts.key, &key_pem, Access::Owner).step(format!("writing {role} key"))?;
		write_file(
			&artifacts.extfile,
			&plan.extensions.to_openssl_conf(),
			Access::Public,
		)
		.step(format!("writing {role} extension record"))?;

		let (cert_pem, terms) = match &signer {
			None => {
				let (days, terms) = match own_terms {
					Some(own) => own,
					None => {
						let days = Profile::default().default_days();
						(days, Terms::new(reservation.serial().to_vec(), days)?)
					},
				};
				info!("{role}: self-signing certificate for {days} days");
				let pem = self
					.backend
					.self_sign(&key, &subject, &plan.extensions, &terms)
					.step(format!("self-signing {role} certificate"))?;
				(pem, terms)
			},
			Some(signer) => {
				info!("{role}: creating certificate signing request");
				let csr = self
					.backend
					.create_csr(&key, &subject, plan.extensions.subject_alt_names())
					.step(format!("creating {role} certificate signing request"))?;
				write_file(&artifacts.csr, &csr, Access::Public)
					.step(format!("writing {role} certificate signing request"))?;

				let signing = format!("signing {role} certificate with {}", signer.role);
				let signer_profile = Profile::load(&signer.profile).step(&signing)?;
				let (days, terms) = match own_terms {
					Some(own) => own,
					None => {
						let days = signer_profile.default_days();
						(days, Terms::new(reservation.serial().to_vec(), days).step(&signing)?)
					},
				};
				let issuer_key = KeyPair::from_pem(&signer.key_pem).step(&signing)?;
				info!("{role}: {signing} for {days} days");
				let pem = self
					.backend
					.sign(
						&SignRequest {
							csr_pem: &csr,
							extensions: &plan.extensions,
							policy: signer_profile.signing.policy,
							terms: &terms,
						},
						&signer.cert_pem,
						issuer_key,
					)
					.step(&signing)?;
				(pem, terms)
			},
		};

		write_file(&artifacts.cert, &cert_pem, Access::Public)
			.step(format!("writing {role} certificate"))?;
		write_file(&artifacts.cert_export, &cert_pem, Access::Public)
			.step(format!("exporting {role} certificate"))?;
		if let Some(signer) = &signer {
			let bundle = chain::bundle(&[cert_pem.as_str(), &signer.chain_pem]);
			write_file(&artifacts.chain, &bundle, Access::Public)
				.step(format!("bundling {role} chain"))?;
			if role == Role::Server {
				let proxy = chain::bundle(&[bundle.as_str(), &key_pem]);
				write_file(&artifacts.proxy_bundle, &proxy, Access::Owner)
					.step(format!("bundling {role} HAProxy certificate"))?;
			}
		}
		if plan.export_key {
			write_file(&artifacts.key_export, &key_pem, Access::Owner)
				.step(format!("exporting {role} key"))?;
		}

		let record = txn.commit(reservation, terms.not_after)?;
		drop(txn);
		info!(serial = %record.serial, "{role}: issued `{common_name}`");

		let plan_checks = verifier::own_checks(&self.layout, role, artifacts);
		let checks = verifier::run(&self.backend, &plan_checks, false);
		Ok(Issued {
			role,
			artifacts: plan.artifacts,
			record,
			checks,
		})
	}
}
