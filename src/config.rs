//! Connector settings and their one-shot validation.
//!
//! [`Settings`] mirrors the host's configuration document (camelCase keys). Calling
//! [`Settings::validate`] checks everything once and yields the immutable [`CredentialConfig`]
//! and [`SyncConfig`] the token cache and sync engine are built from.

// std
use std::num::NonZeroU32;
// self
use crate::{
	_prelude::*,
	auth::{AssertionSigner, ClientId, CredentialConfig, KeyStoreConfig, Secret, TenantId},
	error::ConfigError,
};

/// Page size used when a setting is absent.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Raw connector settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
	/// Application (client) id.
	pub client_id: String,
	/// Tenant id or verified domain.
	pub tenant: String,
	/// Client secret; takes precedence over the key store when non-empty.
	#[serde(default)]
	pub client_secret: Option<Secret>,
	/// PKCS#12 key store used for signed assertions.
	#[serde(default)]
	pub key_store: Option<KeyStoreConfig>,
	/// Users requested per page.
	#[serde(default = "default_page_size")]
	pub user_pagination_size: u32,
	/// Groups requested per page.
	#[serde(default = "default_page_size")]
	pub group_pagination_size: u32,
	/// Members requested per page.
	#[serde(default = "default_page_size")]
	pub member_pagination_size: u32,
	/// Namespace applied to nested-group membership keys.
	#[serde(default)]
	pub identity_source: Option<String>,
}
impl Settings {
	/// Creates settings with default page sizes and no credentials.
	pub fn new(client_id: impl Into<String>, tenant: impl Into<String>) -> Self {
		Self {
			client_id: client_id.into(),
			tenant: tenant.into(),
			client_secret: None,
			key_store: None,
			user_pagination_size: DEFAULT_PAGE_SIZE,
			group_pagination_size: DEFAULT_PAGE_SIZE,
			member_pagination_size: DEFAULT_PAGE_SIZE,
			identity_source: None,
		}
	}

	/// Decodes settings from a JSON document.
	pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
		let mut deserializer = serde_json::Deserializer::from_str(raw);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| ConfigError::Settings { source })
	}

	/// Sets the client secret.
	pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(Secret::new(secret));

		self
	}

	/// Sets the key store.
	pub fn key_store(mut self, key_store: KeyStoreConfig) -> Self {
		self.key_store = Some(key_store);

		self
	}

	/// Validates every setting and builds the runtime configuration.
	///
	/// Certificate mode loads the key store here, so a bad file, password, or alias fails before
	/// any token is requested.
	pub fn validate(&self) -> Result<(CredentialConfig, SyncConfig), ConfigError> {
		let client_id = ClientId::new(&self.client_id)?;
		let tenant = TenantId::new(&self.tenant)?;
		let sync = SyncConfig::new(
			self.user_pagination_size,
			self.group_pagination_size,
			self.member_pagination_size,
		)?
		.with_identity_source(self.identity_source.clone());
		let credentials = match (&self.client_secret, &self.key_store) {
			(Some(secret), _) if !secret.is_empty() =>
				CredentialConfig::with_secret(client_id, tenant, secret.clone()),
			(_, Some(key_store)) => CredentialConfig::with_certificate(
				client_id,
				tenant,
				AssertionSigner::from_key_store(key_store)?,
			),
			_ => return Err(ConfigError::MissingCredentials),
		};

		Ok((credentials, sync))
	}
}

/// Validated paging configuration for the sync engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncConfig {
	/// Users requested per page.
	pub user_page_size: NonZeroU32,
	/// Groups requested per page.
	pub group_page_size: NonZeroU32,
	/// Members requested per page.
	pub member_page_size: NonZeroU32,
	/// Namespace applied to nested-group membership keys.
	pub identity_source: Option<String>,
}
impl SyncConfig {
	/// Validates the three page sizes.
	pub fn new(users: u32, groups: u32, members: u32) -> Result<Self, ConfigError> {
		Ok(Self {
			user_page_size: page_size("user", users)?,
			group_page_size: page_size("group", groups)?,
			member_page_size: page_size("member", members)?,
			identity_source: None,
		})
	}

	/// Sets the nested-group key namespace.
	pub fn with_identity_source(mut self, source: Option<String>) -> Self {
		self.identity_source = source.filter(|value| !value.is_empty());

		self
	}
}

fn page_size(kind: &'static str, value: u32) -> Result<NonZeroU32, ConfigError> {
	NonZeroU32::new(value).ok_or(ConfigError::InvalidPageSize { kind, value })
}

fn default_page_size() -> u32 {
	DEFAULT_PAGE_SIZE
}
