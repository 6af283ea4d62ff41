//! Terminal prompts.

use std::io::{self, BufRead, Write};

use labca::Confirm;

/// Reads the overwrite confirmation from standard input.
pub struct Terminal;

impl Confirm for Terminal {
	fn confirm(&mut self, warning: &str) -> io::Result<String> {
		ask(&format!("WARNING: {warning}: "))
	}
}

/// Print `question` to stderr and read one line from stdin.
pub fn ask(question: &str) -> io::Result<String> {
	let mut stderr = io::stderr().lock();
	stderr.write_all(question.as_bytes())?;
	stderr.flush()?;
	let mut line = String::new();
	io::stdin().lock().read_line(&mut line)?;
	Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}
