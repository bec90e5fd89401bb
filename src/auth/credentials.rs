//! Immutable client credentials shared by the token cache.

// self
use crate::{
	_prelude::*,
	auth::{AssertionSigner, ClientId, Secret, TenantId},
};

/// How the client proves its identity at the token endpoint.
///
/// Exactly one mode is active and it never changes after construction.
#[derive(Clone, Debug)]
pub enum CredentialMode {
	/// Static client secret posted in the request body.
	Secret(Secret),
	/// Certificate-backed signed assertion minted per acquisition.
	Certificate(Arc<AssertionSigner>),
}
impl CredentialMode {
	/// Returns a stable label for logs and spans.
	pub const fn as_str(&self) -> &'static str {
		match self {
			CredentialMode::Secret(_) => "secret",
			CredentialMode::Certificate(_) => "certificate",
		}
	}
}

/// Validated client identity and credential material.
#[derive(Clone, Debug)]
pub struct CredentialConfig {
	/// Application (client) identifier.
	pub client_id: ClientId,
	/// Directory tenant the token is requested for.
	pub tenant: TenantId,
	mode: CredentialMode,
}
impl CredentialConfig {
	/// Builds a config that authenticates with a static client secret.
	pub fn with_secret(client_id: ClientId, tenant: TenantId, secret: Secret) -> Self {
		Self { client_id, tenant, mode: CredentialMode::Secret(secret) }
	}

	/// Builds a config that authenticates with signed assertions.
	pub fn with_certificate(
		client_id: ClientId,
		tenant: TenantId,
		signer: AssertionSigner,
	) -> Self {
		Self { client_id, tenant, mode: CredentialMode::Certificate(Arc::new(signer)) }
	}

	/// Active credential mode.
	pub fn mode(&self) -> &CredentialMode {
		&self.mode
	}
}
