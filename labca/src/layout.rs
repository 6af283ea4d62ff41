//! On-disk layout of a certificate authority and its initializer.
//!
//! ```text
//! <base>/
//!   certs/{root,intermediate,certificates}/
//!   private/{root,intermediate,certificates}/
//!   csr/
//!   extfiles/
//!   db/{index.txt,index.txt.attr,serial,crlnumber}
//!   config/<role>.toml
//! ```

use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use crate::{db::Database, profile, Error, Result, Role};

/// Directory tier holding a role's certificates and keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
	/// Trusted identity and root CA.
	Root,
	/// Intermediate CA.
	Intermediate,
	/// Leaf certificates.
	Certificates,
}

impl Tier {
	fn dir_name(&self) -> &'static str {
		match self {
			Tier::Root => "root",
			Tier::Intermediate => "intermediate",
			Tier::Certificates => "certificates",
		}
	}

	fn of(role: Role) -> Tier {
		match role {
			Role::TrustedIdentity | Role::RootCa => Tier::Root,
			Role::IntermediateCa => Tier::Intermediate,
			Role::Server | Role::Client => Tier::Certificates,
		}
	}
}

/// Who may read a written file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
	/// `0644`
	Public,
	/// `0600`, for anything containing a private key.
	Owner,
}

/// Write `contents` to `path`, replacing it, with the given access mode.
pub fn write_file(path: &Path, contents: &str, access: Access) -> Result<()> {
	let mut out = File::create(path).map_err(|e| Error::io(path, e))?;
	out.write_all(contents.as_bytes())
		.map_err(|e| Error::io(path, e))?;
	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		let mode = match access {
			Access::Public => 0o644,
			Access::Owner => 0o600,
		};
		fs::set_permissions(path, fs::Permissions::from_mode(mode))
			.map_err(|e| Error::io(path, e))?;
	}
	#[cfg(not(unix))]
	let _ = access;
	debug!(path = %path.display(), "wrote file");
	Ok(())
}

/// Read a whole file, mapping a missing file to [`Error::MissingFile`].
pub fn read_file(path: &Path, what: &'static str) -> Result<String> {
	match fs::read_to_string(path) {
		Ok(text) => Ok(text),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::MissingFile {
			what,
			path: path.to_owned(),
		}),
		Err(e) => Err(Error::io(path, e)),
	}
}

/// Every file produced for one issued certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
	/// Artifact base name.
	pub name: String,
	/// PEM certificate.
	pub cert: PathBuf,
	/// Same certificate with a `.crt` extension.
	pub cert_export: PathBuf,
	/// PEM private key.
	pub key: PathBuf,
	/// Same key with a `.key` extension.
	pub key_export: PathBuf,
	/// PEM certificate signing request.
	pub csr: PathBuf,
	/// Certificate followed by every ancestor, leaf first.
	pub chain: PathBuf,
	/// Chain bundle followed by the private key.
	pub proxy_bundle: PathBuf,
	/// Record of the applied extensions.
	pub extfile: PathBuf,
}

/// Paths of a certificate authority rooted at a base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
	base: PathBuf,
}

/// Options for [`Layout::init`].
#[derive(Debug, Clone)]
pub struct InitOptions {
	/// `unique_subject` value written to a new database.
	pub unique_subject: bool,
	/// Directory with `<role>.toml` templates to copy into the configuration directory.
	pub templates: Option<PathBuf>,
}

impl Default for InitOptions {
	fn default() -> Self {
		Self {
			unique_subject: true,
			templates: None,
		}
	}
}

impl Layout {
	/// Layout rooted at `base`. Nothing is touched on disk.
	pub fn new(base: impl Into<PathBuf>) -> Self {
		Self { base: base.into() }
	}

	/// Base directory.
	pub fn base(&self) -> &Path {
		&self.base
	}

	/// Certificate directory of a tier.
	pub fn certs_dir(&self, tier: Tier) -> PathBuf {
		self.base.join("certs").join(tier.dir_name())
	}

	/// Private key directory of a tier.
	pub fn private_dir(&self, tier: Tier) -> PathBuf {
		self.base.join("private").join(tier.dir_name())
	}

	/// Certificate signing requests.
	pub fn csr_dir(&self) -> PathBuf {
		self.base.join("csr")
	}

	/// Extension records.
	pub fn extfiles_dir(&self) -> PathBuf {
		self.base.join("extfiles")
	}

	/// Serial database.
	pub fn db_dir(&self) -> PathBuf {
		self.base.join("db")
	}

	/// Role profiles.
	pub fn config_dir(&self) -> PathBuf {
		self.base.join("config")
	}

	/// Profile file of `role`.
	pub fn profile(&self, role: Role) -> PathBuf {
		self.config_dir().join(format!("{}.toml", role.as_str()))
	}

	/// Artifacts of a CA role, named after the role.
	pub fn ca(&self, role: Role) -> Artifacts {
		self.artifacts(Tier::of(role), role.as_str())
	}

	/// Artifacts of a leaf certificate called `name`.
	pub fn leaf(&self, name: &str) -> Artifacts {
		self.artifacts(Tier::Certificates, name)
	}

	fn artifacts(&self, tier: Tier, name: &str) -> Artifacts {
		let certs = self.certs_dir(tier);
		let private = self.private_dir(tier);
		Artifacts {
			name: name.to_owned(),
			cert: certs.join(format!("{name}.pem")),
			cert_export: certs.join(format!("{name}.crt")),
			key: private.join(format!("{name}.key.pem")),
			key_export: private.join(format!("{name}.key")),
			csr: self.csr_dir().join(format!("{name}.csr.pem")),
			chain: certs.join(format!("{name}-chain.pem")),
			proxy_bundle: certs.join(format!("{name}-haproxy.pem")),
			extfile: self.extfiles_dir().join(format!("{name}.ext")),
		}
	}

	/// Create the directory tree, database files and role profiles.
	///
	/// Existing directories, database files and profiles are kept as
	/// they are, so running this again changes nothing.
	pub fn init(&self, options: &InitOptions) -> Result<()> {
		let mut dirs = vec![
			self.csr_dir(),
			self.extfiles_dir(),
			self.db_dir(),
			self.config_dir(),
		];
		for tier in [Tier::Root, Tier::Intermediate, Tier::Certificates] {
			dirs.push(self.certs_dir(tier));
			dirs.push(self.private_dir(tier));
		}
		for dir in &dirs {
			fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
		}

		Database::create(&self.db_dir(), options.unique_subject)?;
		self.install_profiles(options.templates.as_deref())?;
		info!(base = %self.base.display(), "certificate authority layout ready");
		Ok(())
	}

	fn install_profiles(&self, templates: Option<&Path>) -> Result<()> {
		if let Some(source) = templates {
			if source.is_dir() {
				for role in Role::ALL {
					let from = source.join(format!("{}.toml", role.as_str()));
					let to = self.profile(role);
					if to.exists() {
						continue;
					}
					if from.is_file() {
						fs::copy(&from, &to).map_err(|e| Error::io(&to, e))?;
						debug!(from = %from.display(), "copied profile template");
					} else {
						warn!("template {} not found, using built-in profile", from.display());
					}
				}
			} else {
				warn!(
					"template directory {} not found, using built-in profiles",
					source.display()
				);
			}
		}
		for role in Role::ALL {
			let path = self.profile(role);
			if !path.exists() {
				write_file(&path, profile::template(role), Access::Public)?;
			}
		}
		Ok(())
	}
}
