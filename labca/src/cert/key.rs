use std::{fmt, str::FromStr};

use rcgen::{KeyPair, RsaKeySize};

/// Supported key algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyAlgorithm {
	/// ECDSA on NIST P-384, signing with SHA-384. Used by every CA.
	#[default]
	EcdsaP384,
	/// RSA 2048, signing with PKCS#1 v1.5 SHA-256. Leaf certificates only.
	Rsa,
}

impl fmt::Display for KeyAlgorithm {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			KeyAlgorithm::EcdsaP384 => write!(f, "ecdsa-p384"),
			KeyAlgorithm::Rsa => write!(f, "rsa"),
		}
	}
}

impl FromStr for KeyAlgorithm {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"ecdsa" | "ecdsa-p384" | "ecdsa_p384" => Ok(KeyAlgorithm::EcdsaP384),
			"rsa" => Ok(KeyAlgorithm::Rsa),
			other => Err(format!("unsupported key algorithm `{other}`")),
		}
	}
}

impl KeyAlgorithm {
	/// Generate a fresh `rcgen::KeyPair` for this algorithm.
	pub(crate) fn generate(&self) -> Result<KeyPair, rcgen::Error> {
		match self {
			KeyAlgorithm::EcdsaP384 => KeyPair::generate_for(&rcgen::PKCS_ECDSA_P384_SHA384),
			KeyAlgorithm::Rsa => {
				KeyPair::generate_rsa_for(&rcgen::PKCS_RSA_SHA256, RsaKeySize::_2048)
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ecdsa_p384_keypair() -> anyhow::Result<()> {
		let key_pair = KeyAlgorithm::EcdsaP384.generate()?;
		assert_eq!(
			format!("{:?}", key_pair.algorithm()),
			"PKCS_ECDSA_P384_SHA384"
		);
		Ok(())
	}

	#[test]
	fn rsa_keypair() -> anyhow::Result<()> {
		let key_pair = KeyAlgorithm::Rsa.generate()?;
		assert_eq!(format!("{:?}", key_pair.algorithm()), "PKCS_RSA_SHA256");
		Ok(())
	}

	#[test]
	fn parse_algorithm_names() {
		assert_eq!("ECDSA_P384".parse(), Ok(KeyAlgorithm::EcdsaP384));
		assert_eq!("rsa".parse(), Ok(KeyAlgorithm::Rsa));
		assert!("ed25519".parse::<KeyAlgorithm>().is_err());
	}
}
