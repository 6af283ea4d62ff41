//! Per-role configuration profiles.
//!
//! Each role has a TOML profile in the configuration directory holding
//! the subject distinguished name, validity periods and, for CAs, the
//! policy applied to the requests they sign.

use std::{fs, path::Path};

use rcgen::{DistinguishedName, DnType, DnValue};
use serde::Deserialize;

use crate::{Error, Result, Role};

/// Built-in template for `role`.
pub fn template(role: Role) -> &'static str {
	match role {
		Role::TrustedIdentity => include_str!("../templates/trusted-identity.toml"),
		Role::RootCa => include_str!("../templates/root-ca.toml"),
		Role::IntermediateCa => include_str!("../templates/intermediate-ca.toml"),
		Role::Server => include_str!("../templates/server.toml"),
		Role::Client => include_str!("../templates/client.toml"),
	}
}

/// Parsed profile file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
	/// Subject distinguished name.
	#[serde(default)]
	pub subject: SubjectTemplate,
	/// Validity periods.
	#[serde(default)]
	pub validity: Validity,
	/// Signing behaviour, CA profiles only.
	#[serde(default)]
	pub signing: Signing,
}

/// Distinguished name attributes. Unset attributes are left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubjectTemplate {
	/// `C`
	pub country: Option<String>,
	/// `ST`
	pub state: Option<String>,
	/// `L`
	pub locality: Option<String>,
	/// `O`
	pub organization: Option<String>,
	/// `OU`
	pub organizational_unit: Option<String>,
	/// `CN`, ignored for leaf roles.
	pub common_name: Option<String>,
}

/// Validity periods in days.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Validity {
	/// Lifetime of the certificate described by this profile.
	pub days: Option<u32>,
	/// Lifetime of certificates signed with this profile's key.
	pub default_days: Option<u32>,
}

/// CA signing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Signing {
	/// Subject policy for signed requests.
	#[serde(default)]
	pub policy: Policy,
}

/// Which request subject attributes must match the signer's subject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
	/// Country and organization must equal the signer's.
	Strict,
	/// Any subject is accepted.
	#[default]
	Loose,
}

impl Policy {
	/// Check a request subject against the signer's subject.
	pub fn check(&self, signer: &DistinguishedName, request: &DistinguishedName) -> Result<()> {
		if *self == Policy::Loose {
			return Ok(());
		}
		for (ty, field) in [
			(DnType::CountryName, "countryName"),
			(DnType::OrganizationName, "organizationName"),
		] {
			let Some(expected) = signer.get(&ty).and_then(dn_text) else {
				continue;
			};
			let found = request.get(&ty).and_then(dn_text).unwrap_or_default();
			if found != expected {
				return Err(Error::Policy {
					field,
					expected,
					found,
				});
			}
		}
		Ok(())
	}
}

fn dn_text(value: &DnValue) -> Option<String> {
	match value {
		DnValue::Utf8String(s) => Some(s.clone()),
		DnValue::PrintableString(s) => Some(s.as_str().to_owned()),
		DnValue::Ia5String(s) => Some(s.as_str().to_owned()),
		_ => None,
	}
}

impl Profile {
	/// Read and parse a profile file.
	pub fn load(path: &Path) -> Result<Self> {
		let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
		toml::from_str(&text).map_err(|source| Error::Profile {
			path: path.to_owned(),
			source,
		})
	}

	/// Common name for a CA role, falling back to a generic name.
	pub fn ca_common_name(&self, role: Role) -> String {
		self.subject
			.common_name
			.clone()
			.unwrap_or_else(|| format!("labca {role}"))
	}

	/// Lifetime of the certificate this profile describes.
	pub fn days(&self, role: Role) -> u32 {
		self.validity.days.unwrap_or(match role {
			Role::TrustedIdentity => 10950,
			Role::RootCa => 7300,
			Role::IntermediateCa => 1825,
			Role::Server | Role::Client => 375,
		})
	}

	/// Lifetime of certificates signed under this profile.
	pub fn default_days(&self) -> u32 {
		self.validity.default_days.unwrap_or(375)
	}
}

impl SubjectTemplate {
	fn attributes<'a>(&'a self, common_name: &'a str) -> Vec<(DnType, &'static str, &'a str)> {
		[
			(DnType::CountryName, "C", self.country.as_deref()),
			(DnType::StateOrProvinceName, "ST", self.state.as_deref()),
			(DnType::LocalityName, "L", self.locality.as_deref()),
			(DnType::OrganizationName, "O", self.organization.as_deref()),
			(
				DnType::OrganizationalUnitName,
				"OU",
				self.organizational_unit.as_deref(),
			),
			(DnType::CommonName, "CN", Some(common_name)),
		]
		.into_iter()
		.filter_map(|(ty, short, value)| value.map(|v| (ty, short, v)))
		.collect()
	}

	/// Distinguished name with `common_name` as CN.
	pub fn distinguished_name(&self, common_name: &str) -> DistinguishedName {
		let mut dn = DistinguishedName::new();
		for (ty, _, value) in self.attributes(common_name) {
			dn.push(ty, value);
		}
		dn
	}

	/// One-line `/C=../O=../CN=..` form used in the database index.
	pub fn oneline(&self, common_name: &str) -> String {
		self.attributes(common_name)
			.into_iter()
			.map(|(_, short, value)| format!("/{short}={value}"))
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn builtin_templates_parse() -> anyhow::Result<()> {
		for role in Role::ALL {
			let profile: Profile = toml::from_str(template(role))?;
			assert_eq!(profile.subject.organization.as_deref(), Some("Home Lab"));
		}
		let anchor: Profile = toml::from_str(template(Role::TrustedIdentity))?;
		assert_eq!(anchor.days(Role::TrustedIdentity), 10950);
		assert_eq!(anchor.signing.policy, Policy::Strict);
		let intermediate: Profile = toml::from_str(template(Role::IntermediateCa))?;
		assert_eq!(intermediate.days(Role::IntermediateCa), 1825);
		assert_eq!(intermediate.default_days(), 375);
		assert_eq!(intermediate.signing.policy, Policy::Loose);
		Ok(())
	}

	#[test]
	fn empty_profile_uses_defaults() -> anyhow::Result<()> {
		let profile: Profile = toml::from_str("")?;
		assert_eq!(profile.days(Role::RootCa), 7300);
		assert_eq!(profile.signing.policy, Policy::Loose);
		assert_eq!(profile.ca_common_name(Role::RootCa), "labca root-ca");
		Ok(())
	}

	#[test]
	fn unknown_keys_are_rejected() {
		assert!(toml::from_str::<Profile>("[subject]\ncolour = \"red\"\n").is_err());
	}

	#[test]
	fn load_reports_path() -> anyhow::Result<()> {
		use assert_fs::prelude::*;
		let temp = assert_fs::TempDir::new()?;
		let file = temp.child("root-ca.toml");
		file.write_str("[validity\ndays = 1")?;
		let err = Profile::load(file.path()).unwrap_err();
		assert!(matches!(err, Error::Profile { .. }));
		assert!(err.to_string().contains("root-ca.toml"));
		Ok(())
	}

	#[test]
	fn oneline_subject() {
		let subject = SubjectTemplate {
			country: Some("US".into()),
			organization: Some("Home Lab".into()),
			..Default::default()
		};
		assert_eq!(subject.oneline("localhost"), "/C=US/O=Home Lab/CN=localhost");
		assert_eq!(subject.distinguished_name("localhost").iter().count(), 3);
	}

	#[test]
	fn strict_policy() {
		let subject = SubjectTemplate {
			country: Some("US".into()),
			organization: Some("Home Lab".into()),
			..Default::default()
		};
		let signer = subject.distinguished_name("Home Lab Root CA");
		let same = subject.distinguished_name("Home Lab Intermediate CA");
		let other = SubjectTemplate {
			country: Some("DE".into()),
			..subject.clone()
		}
		.distinguished_name("Home Lab Intermediate CA");

		assert!(Policy::Strict.check(&signer, &same).is_ok());
		assert!(matches!(
			Policy::Strict.check(&signer, &other),
			Err(Error::Policy { field: "countryName", .. })
		));
		assert!(Policy::Loose.check(&signer, &other).is_ok());
	}
}
