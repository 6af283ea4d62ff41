use std::{path::PathBuf, process::ExitCode};

use labca::{Answer, Authority, Check, Confirm, InitOptions, Issued, Role};
use tracing_subscriber::EnvFilter;

mod args;
mod prompt;

use args::{Command, Leaf};

/// A specialized `Result` type.
type Result<T> = std::result::Result<T, Error>;
/// This is defined as a convenience.
type Error = Box<dyn std::error::Error + Send + Sync>;

fn main() -> ExitCode {
	let opts = args::options().run();

	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.with_target(false)
		.without_time()
		.with_writer(std::io::stderr)
		.init();

	let base = match opts.home {
		Some(home) => home,
		None => match default_home() {
			Ok(home) => home,
			Err(e) => return fatal(&e),
		},
	};
	tracing::debug!(base = %base.display(), "certificate authority directory");
	match run(Authority::open(base), opts.command) {
		Ok(code) => code,
		Err(e) => fatal(&e),
	}
}

fn fatal(e: &Error) -> ExitCode {
	eprintln!("[ERROR] {e}");
	ExitCode::FAILURE
}

fn default_home() -> Result<PathBuf> {
	home::home_dir()
		.map(|home| home.join("labca"))
		.ok_or_else(|| "cannot determine the home directory, pass --home or set LABCA_HOME".into())
}

fn run(ca: Authority, command: Command) -> Result<ExitCode> {
	match command {
		Command::Init {
			templates,
			allow_duplicate_subjects,
		} => {
			ca.init(&InitOptions {
				unique_subject: !allow_duplicate_subjects,
				templates,
			})?;
			Ok(ExitCode::SUCCESS)
		},
		Command::Policy { unique_subject } => {
			ca.set_unique_subject(unique_subject)?;
			Ok(ExitCode::SUCCESS)
		},
		Command::TrustedIdentity { yes } => report(ca.issue_trust_anchor(confirm(yes).as_mut())?),
		Command::RootCa { yes } => report(ca.issue_root_ca(confirm(yes).as_mut())?),
		Command::IntermediateCa { yes } => {
			report(ca.issue_intermediate_ca(confirm(yes).as_mut())?)
		},
		Command::Server(leaf) => issue_leaf(&ca, Role::Server, &leaf),
		Command::Client(leaf) => issue_leaf(&ca, Role::Client, &leaf),
		Command::Verify { verbose, name } => {
			let name = match name {
				Some(name) => name,
				None => prompt::ask("Certificate name: ")?,
			};
			let report = ca.verify(name.trim(), verbose)?;
			print_checks(&report.checks, verbose);
			Ok(ExitCode::SUCCESS)
		},
	}
}

fn confirm(yes: bool) -> Box<dyn Confirm> {
	if yes {
		Box::new(Answer::yes())
	} else {
		Box::new(prompt::Terminal)
	}
}

fn issue_leaf(ca: &Authority, role: Role, leaf: &Leaf) -> Result<ExitCode> {
	let mut ip = leaf.ip;
	let name = match &leaf.name {
		Some(name) => name.clone(),
		None => {
			let what = if role == Role::Server { "FQDN" } else { "name" };
			let name = prompt::ask(&format!("{role} certificate {what}: "))?;
			if role == Role::Server && ip.is_none() {
				let literal = prompt::ask("IP address (`, IP:<addr>`, empty for none): ")?;
				if !literal.trim().is_empty() {
					ip = Some(labca::LeafRequest::parse_ip(&literal)?);
				}
			}
			name.trim().to_owned()
		},
	};
	let mut request = leaf.request(role, name);
	request.ip = ip;
	report(ca.issue_leaf(&request, confirm(leaf.yes).as_mut())?)
}

fn print_checks(checks: &[Check], verbose: bool) {
	for check in checks {
		println!("{check}");
		if verbose {
			if let Some(detail) = &check.detail {
				println!("{detail}");
			}
		}
	}
}

fn report(issued: Issued) -> Result<ExitCode> {
	print_checks(&issued.checks, false);
	println!(
		"{} `{}` written to {}",
		issued.role,
		issued.artifacts.name,
		issued.artifacts.cert.display()
	);
	if issued.passed() {
		Ok(ExitCode::SUCCESS)
	} else {
		Err(format!("verification of the new {} certificate failed", issued.role).into())
	}
}
