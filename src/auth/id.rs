//! Strongly typed identifiers for the registered application and its directory tenant.

// std
use std::ops::Deref;
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 256;
// Tenants are spliced into the token endpoint path.
const RESERVED_CHARS: &[char] = &['/', '?', '#', '%', '\\'];

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (client, tenant).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (client, tenant).
		kind: &'static str,
	},
	/// The identifier contains a URL-reserved character.
	#[error("{kind} identifier contains the reserved character `{found}`.")]
	ContainsReserved {
		/// Kind of identifier (client, tenant).
		kind: &'static str,
		/// First reserved character found.
		found: char,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (client, tenant).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { ClientId, "Application (client) identifier assigned by the directory.", "Client" }
def_id! { TenantId, "Directory tenant, as a GUID or a verified domain name.", "Tenant" }

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if let Some(found) = view.chars().find(|c| RESERVED_CHARS.contains(c)) {
		return Err(IdentifierError::ContainsReserved { kind, found });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_reject_whitespace_and_empty() {
		assert!(TenantId::new(" contoso").is_err(), "Leading whitespace must be rejected.");
		assert!(ClientId::new("").is_err());

		let tenant = TenantId::new("contoso.onmicrosoft.com")
			.expect("Domain-style tenants should be considered valid.");

		assert_eq!(tenant.as_ref(), "contoso.onmicrosoft.com");
	}

	#[test]
	fn tenants_cannot_escape_the_endpoint_path() {
		assert_eq!(
			TenantId::new("common/../evil"),
			Err(IdentifierError::ContainsReserved { kind: "Tenant", found: '/' })
		);
		assert!(TenantId::new("tenant?x=1").is_err());
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let client: ClientId = serde_json::from_str("\"8a2c5b1e-0000-4d3f-9f0a-31c0b1d5e7aa\"")
			.expect("Client identifier should deserialize successfully.");

		assert_eq!(client.as_ref(), "8a2c5b1e-0000-4d3f-9f0a-31c0b1d5e7aa");
		assert!(serde_json::from_str::<ClientId>("\"with space\"").is_err());
	}

	#[test]
	fn length_limit_is_enforced() {
		TenantId::new("a".repeat(IDENTIFIER_MAX_LEN)).expect("Exact length should succeed.");

		assert!(TenantId::new("a".repeat(IDENTIFIER_MAX_LEN + 1)).is_err());
	}
}
