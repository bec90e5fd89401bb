//! Signed client assertions for certificate credentials.
//!
//! [`AssertionSigner`] is loaded once from a PKCS#12 key store and then mints a fresh RS256
//! JWT for every token acquisition. The claim set is rebuilt on each call, so concurrent
//! callers never share the issued-at/expiry pair and signing needs no lock. The JOSE header
//! carries the certificate thumbprint (base64 of the SHA-1 digest of the DER certificate) so
//! the directory can pick the registered certificate.

// std
use std::path::{Path, PathBuf};
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use openssl::pkcs12::Pkcs12;
use sha1::{Digest, Sha1};
// self
use crate::{
	_prelude::*,
	auth::{ClientId, Secret},
	error::{ConfigError, SigningError},
};

/// Lifetime of every signed assertion.
pub const ASSERTION_LIFETIME: Duration = Duration::seconds(300);
/// `client_assertion_type` value sent alongside a signed assertion.
pub const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Location and unlock material for the PKCS#12 key store holding the signing key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStoreConfig {
	/// Path to the PKCS#12 file.
	pub file: PathBuf,
	/// Password protecting the store and its key.
	pub password: Secret,
	/// Friendly name of the key entry.
	pub alias: String,
}
impl KeyStoreConfig {
	/// Creates a config for the provided file, password, and alias.
	pub fn new(
		file: impl Into<PathBuf>,
		password: impl Into<String>,
		alias: impl Into<String>,
	) -> Self {
		Self { file: file.into(), password: Secret::new(password), alias: alias.into() }
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.file.as_os_str().is_empty() {
			return Err(ConfigError::KeyStorePathEmpty);
		}
		if !self.file.is_file() {
			return Err(ConfigError::KeyStoreNotAFile { path: display_path(&self.file) });
		}
		if self.password.is_empty() {
			return Err(ConfigError::KeyStorePasswordEmpty);
		}
		if self.alias.is_empty() {
			return Err(ConfigError::KeyStoreAliasEmpty);
		}

		Ok(())
	}
}

/// Claim set of a client assertion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
	/// Issuer; always the client id.
	pub iss: String,
	/// Subject; always the client id.
	pub sub: String,
	/// Audience; the tenant's token endpoint.
	pub aud: String,
	/// Unique assertion identifier.
	pub jti: String,
	/// Not-before, equal to `iat`.
	pub nbf: i64,
	/// Issued-at, in Unix seconds.
	pub iat: i64,
	/// Expiry, always `iat` + [`ASSERTION_LIFETIME`].
	pub exp: i64,
}
impl AssertionClaims {
	/// Builds a fresh claim set issued at `issued_at`.
	pub fn new(client_id: &ClientId, audience: &Url, issued_at: OffsetDateTime) -> Self {
		let iat = issued_at.unix_timestamp();

		Self {
			iss: client_id.to_string(),
			sub: client_id.to_string(),
			aud: audience.to_string(),
			jti: format!("{:032x}", rand::random::<u128>()),
			nbf: iat,
			iat,
			exp: iat + ASSERTION_LIFETIME.whole_seconds(),
		}
	}
}

/// RS256 signer bound to one certificate and private key.
#[derive(Clone)]
pub struct AssertionSigner {
	key: EncodingKey,
	thumbprint: String,
}
impl AssertionSigner {
	/// Loads the key entry named by `config` from its PKCS#12 key store.
	///
	/// Every input is checked before the file is opened; any failure is a
	/// [`ConfigError`] and no signer is produced.
	pub fn from_key_store(config: &KeyStoreConfig) -> Result<Self, ConfigError> {
		config.validate()?;

		let path = display_path(&config.file);
		let bytes = std::fs::read(&config.file)
			.map_err(|source| ConfigError::KeyStoreRead { path: path.clone(), source })?;
		let parsed = Pkcs12::from_der(&bytes)
			.and_then(|store| store.parse2(config.password.expose()))
			.map_err(|source| ConfigError::KeyStoreLoad { path: path.clone(), source })?;
		let alias_not_found = || ConfigError::KeyStoreAliasNotFound {
			path: path.clone(),
			alias: config.alias.clone(),
		};
		let (Some(pkey), Some(cert)) = (parsed.pkey, parsed.cert) else {
			return Err(alias_not_found());
		};
		let alias_matches = cert
			.alias()
			.and_then(|raw| std::str::from_utf8(raw).ok())
			.is_some_and(|alias| alias.eq_ignore_ascii_case(&config.alias));

		if !alias_matches {
			return Err(alias_not_found());
		}

		let unsupported = |source: openssl::error::ErrorStack| ConfigError::UnsupportedKey {
			alias: config.alias.clone(),
			source: Some(Box::new(source)),
		};
		let private_der = pkey.rsa().and_then(|rsa| rsa.private_key_to_der()).map_err(unsupported)?;
		let cert_der = cert.to_der().map_err(unsupported)?;

		Ok(Self::from_der(&private_der, &cert_der))
	}

	/// Builds a signer from a PKCS#1 DER private key and a DER certificate.
	pub fn from_der(private_key_der: &[u8], certificate_der: &[u8]) -> Self {
		Self {
			key: EncodingKey::from_rsa_der(private_key_der),
			thumbprint: certificate_thumbprint(certificate_der),
		}
	}

	/// Certificate thumbprint advertised in the JOSE header.
	pub fn thumbprint(&self) -> &str {
		&self.thumbprint
	}

	/// Signs a fresh assertion for `client_id`, addressed to the token endpoint `audience`.
	pub fn sign(&self, client_id: &ClientId, audience: &Url) -> Result<String, SigningError> {
		self.sign_at(client_id, audience, OffsetDateTime::now_utc())
	}

	/// Signs a fresh assertion issued at an explicit instant.
	pub fn sign_at(
		&self,
		client_id: &ClientId,
		audience: &Url,
		issued_at: OffsetDateTime,
	) -> Result<String, SigningError> {
		let claims = AssertionClaims::new(client_id, audience, issued_at);

		Ok(jsonwebtoken::encode(&self.header(), &claims, &self.key)?)
	}

	fn header(&self) -> Header {
		let mut header = Header::new(Algorithm::RS256);

		header.x5t = Some(self.thumbprint.clone());
		header.kid = Some(self.thumbprint.clone());

		header
	}
}
impl Debug for AssertionSigner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AssertionSigner")
			.field("key", &"<redacted>")
			.field("thumbprint", &self.thumbprint)
			.finish()
	}
}

/// Base64 (standard alphabet) SHA-1 digest of a DER certificate.
pub fn certificate_thumbprint(certificate_der: &[u8]) -> String {
	STANDARD.encode(Sha1::digest(certificate_der))
}

fn display_path(path: &Path) -> String {
	path.display().to_string()
}
