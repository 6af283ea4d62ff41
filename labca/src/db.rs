//! Serial number database and index of issued certificates.
//!
//! The files follow the layout of an OpenSSL CA database:
//!
//! * `serial` and `crlnumber` hold hex counters, refreshed with random
//!   16-byte values at the start of every issuance run.
//! * `index.txt.attr` holds `unique_subject = yes|no`.
//! * `index.txt` has one tab separated line per certificate: status,
//!   expiry, revocation date, serial, role and one-line subject. The
//!   role column is where OpenSSL writes its unused file name.
//!
//! Writes go through a [`Transaction`], which owns an exclusive lock
//! file for the duration of an issuance run.

use std::{
	fs::{self, OpenOptions},
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
};

use rand::RngCore;
use time::OffsetDateTime;
use tracing::debug;

use crate::{
	layout::{read_file, write_file, Access},
	Error, Result, Role,
};

const INDEX: &str = "index.txt";
const ATTR: &str = "index.txt.attr";
const SERIAL: &str = "serial";
const CRLNUMBER: &str = "crlnumber";
const LOCK: &str = ".lock";

/// Status column of an index record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
	/// `V`
	Valid,
	/// `R`
	Revoked,
	/// `E`
	Expired,
}

/// One line of `index.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
	/// Certificate status.
	pub status: Status,
	/// Expiry as `YYMMDDHHMMSSZ`, or `YYYYMMDDHHMMSSZ` from 2050 on.
	pub expires: String,
	/// Revocation date, empty unless revoked.
	pub revoked: String,
	/// Upper-case hex serial.
	pub serial: String,
	/// Role of the certificate.
	pub role: Role,
	/// `/C=../O=../CN=..` subject.
	pub subject: String,
}

impl IndexRecord {
	/// `CN` attribute of the subject.
	pub fn common_name(&self) -> Option<&str> {
		self.subject
			.split('/')
			.filter_map(|part| part.strip_prefix("CN="))
			.last()
	}

	fn parse(line: &str) -> std::result::Result<Self, String> {
		let fields: Vec<&str> = line.split('\t').collect();
		let [status, expires, revoked, serial, role, subject] = fields[..] else {
			return Err(format!("expected 6 columns, found {}", fields.len()));
		};
		let status = match status {
			"V" => Status::Valid,
			"R" => Status::Revoked,
			"E" => Status::Expired,
			other => return Err(format!("unknown status `{other}`")),
		};
		Ok(Self {
			status,
			expires: expires.to_owned(),
			revoked: revoked.to_owned(),
			serial: serial.to_owned(),
			role: role.parse()?,
			subject: subject.to_owned(),
		})
	}

	fn to_line(&self) -> String {
		let status = match self.status {
			Status::Valid => "V",
			Status::Revoked => "R",
			Status::Expired => "E",
		};
		format!(
			"{status}\t{}\t{}\t{}\t{}\t{}\n",
			self.expires, self.revoked, self.serial, self.role, self.subject
		)
	}
}

/// Format a time the way the index stores it.
fn index_time(t: OffsetDateTime) -> String {
	let t = t.to_offset(time::UtcOffset::UTC);
	let date = if t.year() < 2050 {
		format!("{:02}", t.year() % 100)
	} else {
		format!("{:04}", t.year())
	};
	format!(
		"{date}{:02}{:02}{:02}{:02}{:02}Z",
		u8::from(t.month()),
		t.day(),
		t.hour(),
		t.minute(),
		t.second()
	)
}

/// 16 random bytes forming a positive, minimally encoded serial number.
fn random_serial() -> Vec<u8> {
	let mut bytes = [0u8; 16];
	rand::thread_rng().fill_bytes(&mut bytes);
	bytes[0] &= 0x7f;
	if bytes[0] == 0 {
		bytes[0] = 0x01;
	}
	bytes.to_vec()
}

/// Handle on the database directory.
#[derive(Debug, Clone)]
pub struct Database {
	dir: PathBuf,
}

impl Database {
	/// Create any missing database file. Existing files are left alone.
	pub(crate) fn create(dir: &Path, unique_subject: bool) -> Result<()> {
		let index = dir.join(INDEX);
		if !index.exists() {
			write_file(&index, "", Access::Public)?;
		}
		let attr = dir.join(ATTR);
		if !attr.exists() {
			write_file(&attr, &attr_line(unique_subject), Access::Public)?;
		}
		for counter in [SERIAL, CRLNUMBER] {
			let path = dir.join(counter);
			if !path.exists() {
				write_file(&path, &counter_line(&random_serial()), Access::Public)?;
			}
		}
		Ok(())
	}

	/// Open an initialized database.
	pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
		let dir = dir.into();
		let index = dir.join(INDEX);
		if !index.is_file() {
			return Err(Error::MissingFile {
				what: "certificate database (run `labca init`)",
				path: index,
			});
		}
		Ok(Self { dir })
	}

	/// Database directory.
	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Current `unique_subject` policy. A missing attribute file means `yes`.
	pub fn unique_subject(&self) -> Result<bool> {
		let path = self.dir.join(ATTR);
		let text = match fs::read_to_string(&path) {
			Ok(text) => text,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
			Err(e) => return Err(Error::io(&path, e)),
		};
		for line in text.lines() {
			let Some((key, value)) = line.split_once('=') else {
				continue;
			};
			if key.trim() == "unique_subject" {
				return match value.trim() {
					"yes" => Ok(true),
					"no" => Ok(false),
					other => Err(Error::Database {
						path,
						reason: format!("unique_subject must be yes or no, found `{other}`"),
					}),
				};
			}
		}
		Ok(true)
	}

	/// Change the `unique_subject` policy.
	pub fn set_unique_subject(&self, unique: bool) -> Result<()> {
		write_file(&self.dir.join(ATTR), &attr_line(unique), Access::Public)
	}

	/// All index records in file order.
	pub fn records(&self) -> Result<Vec<IndexRecord>> {
		let path = self.dir.join(INDEX);
		let text = read_file(&path, "certificate index")?;
		text.lines()
			.enumerate()
			.filter(|(_, line)| !line.trim().is_empty())
			.map(|(n, line)| {
				IndexRecord::parse(line).map_err(|reason| Error::Database {
					path: path.clone(),
					reason: format!("line {}: {reason}", n + 1),
				})
			})
			.collect()
	}

	/// Latest valid record whose subject CN is `common_name`.
	pub fn find(&self, common_name: &str) -> Result<Option<IndexRecord>> {
		Ok(self
			.records()?
			.into_iter()
			.filter(|r| r.status == Status::Valid && r.common_name() == Some(common_name))
			.last())
	}

	/// Take the database lock.
	pub fn begin(&self) -> Result<Transaction<'_>> {
		let lock = self.dir.join(LOCK);
		let mut file = match OpenOptions::new().write(true).create_new(true).open(&lock) {
			Ok(file) => file,
			Err(e) if e.kind() == ErrorKind::AlreadyExists => return Err(Error::Locked(lock)),
			Err(e) => return Err(Error::io(&lock, e)),
		};
		Transaction { db: self, lock }.stamp(&mut file)
	}
}

fn attr_line(unique: bool) -> String {
	format!("unique_subject = {}\n", if unique { "yes" } else { "no" })
}

fn counter_line(value: &[u8]) -> String {
	format!("{}\n", hex::encode_upper(value))
}

/// Exclusive access to the database, released on drop.
#[derive(Debug)]
pub struct Transaction<'a> {
	db: &'a Database,
	lock: PathBuf,
}

/// A serial number set aside for one subject.
///
/// Dropping it without [`Transaction::commit`] leaves the database as it was.
#[derive(Debug)]
#[must_use]
pub struct Reservation {
	serial: Vec<u8>,
	role: Role,
	subject: String,
}

impl Reservation {
	/// Reserved serial number.
	pub fn serial(&self) -> &[u8] {
		&self.serial
	}
}

impl Transaction<'_> {
	/// Record the owning process in the lock file. The lock is released
	/// again if that fails.
	fn stamp(self, out: &mut impl Write) -> Result<Self> {
		writeln!(out, "{}", std::process::id()).map_err(|e| Error::io(&self.lock, e))?;
		debug!(lock = %self.lock.display(), "database locked");
		Ok(self)
	}

	/// Database this transaction locks.
	pub fn database(&self) -> &Database {
		self.db
	}

	/// Replace the serial and CRL counters with fresh random values.
	pub fn refresh_counters(&self) -> Result<()> {
		for counter in [SERIAL, CRLNUMBER] {
			write_file(
				&self.db.dir.join(counter),
				&counter_line(&random_serial()),
				Access::Public,
			)?;
		}
		Ok(())
	}

	/// Reserve the current serial for `subject`.
	pub fn reserve(&self, role: Role, subject: &str) -> Result<Reservation> {
		let path = self.db.dir.join(SERIAL);
		let text = read_file(&path, "serial counter")?;
		let serial = hex::decode(text.trim()).map_err(|e| Error::Database {
			path: path.clone(),
			reason: e.to_string(),
		})?;
		if serial.is_empty() {
			return Err(Error::Database {
				path,
				reason: "empty serial".into(),
			});
		}
		Ok(Reservation {
			serial,
			role,
			subject: subject.to_owned(),
		})
	}

	/// Record the issued certificate and advance the serial counter.
	pub fn commit(&self, reservation: Reservation, not_after: OffsetDateTime) -> Result<IndexRecord> {
		let record = IndexRecord {
			status: Status::Valid,
			expires: index_time(not_after),
			revoked: String::new(),
			serial: hex::encode_upper(&reservation.serial),
			role: reservation.role,
			subject: reservation.subject,
		};
		let path = self.db.dir.join(INDEX);
		let mut index = OpenOptions::new()
			.append(true)
			.open(&path)
			.map_err(|e| Error::io(&path, e))?;
		index
			.write_all(record.to_line().as_bytes())
			.map_err(|e| Error::io(&path, e))?;
		write_file(
			&self.db.dir.join(SERIAL),
			&counter_line(&random_serial()),
			Access::Public,
		)?;
		debug!(serial = %record.serial, subject = %record.subject, "index updated");
		Ok(record)
	}
}

impl Drop for Transaction<'_> {
	fn drop(&mut self) {
		if let Err(e) = fs::remove_file(&self.lock) {
			tracing::warn!("could not remove {}: {e}", self.lock.display());
		}
	}
}
