//! Decides whether an issuance run may replace an existing subject.
//!
//! ```text
//! NoExistingSubject -> CheckUniqueness -> Blocked           (unique_subject = yes, subject exists)
//!                                      -> ConfirmOverwrite  (unique_subject = no, subject exists)
//!                                      -> ProceedFresh      (subject absent)
//! ConfirmOverwrite -- "yes" --> ProceedFresh
//! ConfirmOverwrite -- other --> Aborted
//! ```

use std::io;

use tracing::warn;

use crate::{Error, Result};

/// Source of the operator's reply to an overwrite warning.
pub trait Confirm {
	/// Show `warning` and return the reply, without its line terminator.
	fn confirm(&mut self, warning: &str) -> io::Result<String>;
}

/// A fixed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer(String);

impl Answer {
	/// Reply with `text` to every question.
	pub fn new(text: impl Into<String>) -> Self {
		Self(text.into())
	}

	/// The affirmative reply.
	pub fn yes() -> Self {
		Self::new("yes")
	}
}

impl Confirm for Answer {
	fn confirm(&mut self, _warning: &str) -> io::Result<String> {
		Ok(self.0.clone())
	}
}

/// States of the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
	/// Nothing observed yet.
	NoExistingSubject,
	/// Existence of the subject is known.
	CheckUniqueness {
		/// Whether a certificate for the subject exists.
		exists: bool,
	},
	/// Subject exists and uniqueness is enforced. Terminal.
	Blocked,
	/// Subject exists and uniqueness is relaxed; waiting for the operator.
	ConfirmOverwrite,
	/// Generation may proceed.
	ProceedFresh,
	/// The operator declined. Terminal.
	Aborted,
}

impl Guard {
	/// Record whether the subject already exists.
	pub fn observe(self, exists: bool) -> Self {
		match self {
			Guard::NoExistingSubject => Guard::CheckUniqueness { exists },
			other => other,
		}
	}

	/// Apply the `unique_subject` policy.
	pub fn apply_policy(self, unique_subject: bool) -> Self {
		match self {
			Guard::CheckUniqueness { exists: false } => Guard::ProceedFresh,
			Guard::CheckUniqueness { exists: true } if unique_subject => Guard::Blocked,
			Guard::CheckUniqueness { exists: true } => Guard::ConfirmOverwrite,
			other => other,
		}
	}

	/// Feed the operator's reply. Only the exact string `yes` proceeds.
	pub fn answer(self, reply: &str) -> Self {
		match self {
			Guard::ConfirmOverwrite if reply == "yes" => Guard::ProceedFresh,
			Guard::ConfirmOverwrite => Guard::Aborted,
			other => other,
		}
	}
}

/// Run the guard to completion for `subject`.
///
/// Returns `Ok(())` only in [`Guard::ProceedFresh`].
pub fn resolve(
	subject: &str,
	exists: bool,
	unique_subject: bool,
	warning: &str,
	confirm: &mut dyn Confirm,
) -> Result<()> {
	let mut state = Guard::NoExistingSubject
		.observe(exists)
		.apply_policy(unique_subject);
	if state == Guard::ConfirmOverwrite {
		warn!("`{subject}` already exists: {warning}");
		let prompt = format!("{warning}. Type `yes` to overwrite `{subject}`");
		let reply = confirm.confirm(&prompt).map_err(|e| Error::Io {
			path: "<stdin>".into(),
			source: e,
		})?;
		state = state.answer(reply.trim_end_matches(['\r', '\n']));
	}
	match state {
		Guard::ProceedFresh => Ok(()),
		Guard::Blocked => Err(Error::AlreadyExists {
			subject: subject.to_owned(),
		}),
		_ => Err(Error::Aborted {
			subject: subject.to_owned(),
		}),
	}
}
