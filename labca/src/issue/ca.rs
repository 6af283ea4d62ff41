use super::{Authority, Issuance, Issued, Lifetime};
use crate::{
	cert::{CertificateAuthority, ExtensionProfile, KeyAlgorithm},
	guard::Confirm,
	Result, Role,
};

impl<B: CertificateAuthority> Authority<B> {
	/// Create the self-signed trust anchor.
	pub fn issue_trust_anchor(&self, confirm: &mut dyn Confirm) -> Result<Issued> {
		self.issue_ca(Role::TrustedIdentity, confirm)
	}

	/// Create the root CA, signed by the trust anchor.
	pub fn issue_root_ca(&self, confirm: &mut dyn Confirm) -> Result<Issued> {
		self.issue_ca(Role::RootCa, confirm)
	}

	/// Create the intermediate CA, signed by the root CA.
	pub fn issue_intermediate_ca(&self, confirm: &mut dyn Confirm) -> Result<Issued> {
		self.issue_ca(Role::IntermediateCa, confirm)
	}

	fn issue_ca(&self, role: Role, confirm: &mut dyn Confirm) -> Result<Issued> {
		let db = self.database()?;
		let profile = self.profile(role)?;
		self.issue(
			db,
			Issuance {
				role,
				artifacts: self.layout.ca(role),
				common_name: profile.ca_common_name(role),
				lifetime: Lifetime::Days(profile.days(role)),
				subject: profile.subject,
				extensions: ExtensionProfile::for_role(role),
				algorithm: KeyAlgorithm::EcdsaP384,
				export_key: false,
			},
			confirm,
		)
	}
}
