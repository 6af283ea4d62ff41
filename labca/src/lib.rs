#![warn(missing_docs)]
//! This library runs a small private certificate authority hierarchy on
//! top of [rcgen]: a self-signed trust anchor (the "trusted identity"),
//! a root CA, an intermediate CA, and server or client leaf certificates
//! signed by the intermediate.
//!
//! All state lives in a directory layout under a base path: keys,
//! requests, certificates, chain bundles, a serial database, and one
//! configuration profile per certificate role.
//!
//! ```no_run
//! use labca::{Answer, Authority, InitOptions, LeafRequest};
//!
//! # fn main() -> labca::Result<()> {
//! let ca = Authority::open("/tmp/labca");
//! ca.init(&InitOptions::default())?;
//! let mut no = Answer::new("no");
//! ca.issue_trust_anchor(&mut no)?;
//! ca.issue_root_ca(&mut no)?;
//! ca.issue_intermediate_ca(&mut no)?;
//! ca.issue_leaf(&LeafRequest::server("localhost"), &mut no)?;
//! let report = ca.verify("localhost", false)?;
//! assert!(report.passed());
//! # Ok(())
//! # }
//! ```

pub mod cert;
pub mod chain;
pub mod db;
mod error;
pub mod guard;
mod issue;
pub mod layout;
pub mod profile;
pub mod role;
pub mod verifier;

pub use cert::{CertificateAuthority, KeyAlgorithm, Rcgen};
pub use error::{Error, StepContext};
pub use guard::{Answer, Confirm};
pub use issue::{Authority, HostAlias, Issued, LeafRequest};
pub use layout::{InitOptions, Layout};
pub use role::Role;
pub use verifier::{Check, Outcome, Report};

/// A specialized `Result` type.
pub type Result<T> = std::result::Result<T, Error>;
