use std::{io, path::PathBuf};

/// Everything that can stop an issuance run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// Reading or writing a file failed.
	#[error("{}: {source}", .path.display())]
	Io {
		/// File or directory being accessed.
		path: PathBuf,
		/// Underlying error.
		#[source]
		source: io::Error,
	},
	/// A file required before issuance can start is absent.
	#[error("{what} not found at {}", .path.display())]
	MissingFile {
		/// Human readable name of the missing input.
		what: &'static str,
		/// Expected location.
		path: PathBuf,
	},
	/// A role profile could not be parsed.
	#[error("invalid profile {}: {source}", .path.display())]
	Profile {
		/// Profile file.
		path: PathBuf,
		/// Parser error.
		#[source]
		source: toml::de::Error,
	},
	/// The subject exists and `unique_subject = yes`.
	#[error("certificate for `{subject}` already exists and unique_subject is enabled")]
	AlreadyExists {
		/// Common name of the existing subject.
		subject: String,
	},
	/// The operator declined to overwrite an existing certificate.
	#[error("overwrite of `{subject}` not confirmed, aborting")]
	Aborted {
		/// Common name of the existing subject.
		subject: String,
	},
	/// Another process holds the database lock.
	#[error("certificate database is locked by another run (remove {} if stale)", .0.display())]
	Locked(PathBuf),
	/// A database file is malformed.
	#[error("malformed database file {}: {reason}", .path.display())]
	Database {
		/// Offending file.
		path: PathBuf,
		/// What was wrong with it.
		reason: String,
	},
	/// A certificate name is empty or cannot be used as a file name.
	#[error("invalid certificate name `{0}`")]
	InvalidName(String),
	/// An IP subject alternative name is not an IPv4 literal.
	#[error("invalid IPv4 address `{0}`")]
	InvalidAddress(String),
	/// A subject alternative name is not a valid DNS name.
	#[error("invalid DNS name `{0}`")]
	InvalidDnsName(String),
	/// A strict signing policy rejected the request subject.
	#[error("signing policy requires {field} `{expected}`, request has `{found}`")]
	Policy {
		/// Distinguished name attribute.
		field: &'static str,
		/// Value in the signer's certificate.
		expected: String,
		/// Value in the request.
		found: String,
	},
	/// A PEM input held no certificate.
	#[error("no certificate found in {0}")]
	NoCertificate(String),
	/// A certificate could not be decoded.
	#[error("{0}")]
	InvalidCertificate(String),
	/// A configured validity period does not fit the calendar.
	#[error("validity of {days} days is out of range")]
	Validity {
		/// Requested lifetime.
		days: u32,
	},
	/// Certificate generation or parsing failed in rcgen.
	#[error(transparent)]
	Rcgen(#[from] rcgen::Error),
	/// PEM decoding failed.
	#[error(transparent)]
	Pem(#[from] pem::PemError),
	/// A named pipeline step failed.
	#[error("{step} failed: {source}")]
	Step {
		/// Step description.
		step: String,
		/// Cause.
		#[source]
		source: Box<Error>,
	},
}

impl Error {
	pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
		Error::Io {
			path: path.into(),
			source,
		}
	}
}

/// Attach the name of the pipeline step to a failure.
pub trait StepContext<T> {
	/// Wrap the error as [`Error::Step`].
	fn step(self, step: impl Into<String>) -> crate::Result<T>;
}

impl<T, E: Into<Error>> StepContext<T> for Result<T, E> {
	fn step(self, step: impl Into<String>) -> crate::Result<T> {
		self.map_err(|e| Error::Step {
			step: step.into(),
			source: Box::new(e.into()),
		})
	}
}
