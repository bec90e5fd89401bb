//! Crate-level error types shared by the token cache, the page walker, and the sync engine.
//!
//! [`Error`] is what public operations return: configuration problems, authentication
//! failures, and transport failures are fatal to the call that hit them. [`CheckpointError`]
//! and [`RecordError`] are recovered where they occur (logged and skipped), so they never
//! surface through [`Error`].

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Missing or invalid settings; fatal and never retried.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Access token acquisition failed.
	#[error(transparent)]
	Authentication(#[from] AuthError),
	/// A directory page could not be fetched or decoded.
	#[error(transparent)]
	Transport(#[from] TransportError),
}

/// Configuration and validation failures raised at construction time.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Settings document could not be decoded.
	#[error("Settings could not be decoded.")]
	Settings {
		/// Structured parsing failure, including the offending key path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// A client or tenant identifier failed validation.
	#[error(transparent)]
	Identifier(#[from] crate::auth::IdentifierError),
	/// Neither a client secret nor a key store was configured.
	#[error("Either a client secret or a key store (file, password, alias) must be configured.")]
	MissingCredentials,
	/// Key-store path was empty.
	#[error("Key store file path cannot be empty.")]
	KeyStorePathEmpty,
	/// Key-store path does not point at a regular file.
	#[error("Key store file `{path}` does not exist or is a directory.")]
	KeyStoreNotAFile {
		/// Offending path.
		path: String,
	},
	/// Key-store password was empty.
	#[error("Key store password cannot be empty.")]
	KeyStorePasswordEmpty,
	/// Key-store alias was empty.
	#[error("Key store alias cannot be empty.")]
	KeyStoreAliasEmpty,
	/// Key-store file could not be read from disk.
	#[error("Key store file `{path}` could not be read.")]
	KeyStoreRead {
		/// Offending path.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Key-store bytes could not be parsed or decrypted.
	#[error("Key store `{path}` could not be loaded.")]
	KeyStoreLoad {
		/// Offending path.
		path: String,
		/// Underlying PKCS#12 failure.
		#[source]
		source: openssl::error::ErrorStack,
	},
	/// The key store does not hold a private key and certificate under the alias.
	#[error("Key store `{path}` does not contain a key entry for alias `{alias}`.")]
	KeyStoreAliasNotFound {
		/// Offending path.
		path: String,
		/// Alias that was requested.
		alias: String,
	},
	/// The key entry is not usable for RS256 signing.
	#[error("Key store entry `{alias}` does not hold an RSA private key.")]
	UnsupportedKey {
		/// Alias that was requested.
		alias: String,
		/// Underlying key conversion failure, when available.
		#[source]
		source: Option<BoxError>,
	},
	/// A page size was not a positive integer.
	#[error("Invalid {kind} pagination size [{value}]; it must be a positive integer.")]
	InvalidPageSize {
		/// Collection the size applies to (user, group, member).
		kind: &'static str,
		/// Rejected value.
		value: u32,
	},
	/// An endpoint URL cannot be parsed or joined.
	#[error("Endpoint `{endpoint}` is invalid.")]
	InvalidEndpoint {
		/// Endpoint label.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoints must use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Endpoint label.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures while acquiring an access token.
///
/// Cloning is cheap; sources are shared so one failed refresh can be handed to every waiter.
#[derive(Clone, Debug, ThisError)]
pub enum AuthError {
	/// The client assertion could not be produced.
	#[error(transparent)]
	Signing(#[from] SigningError),
	/// The token endpoint rejected the exchange.
	#[error("Token endpoint rejected the client credentials grant: {reason}.")]
	Rejected {
		/// Provider-supplied reason string.
		reason: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// The token endpoint could not be reached.
	#[error("Token endpoint could not be reached: {message}.")]
	Unreachable {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Underlying transport failure, when available.
		#[source]
		source: Option<SharedError>,
	},
	/// Token endpoint responded with malformed JSON.
	#[error("Token endpoint returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: Arc<serde_path_to_error::Error<serde_json::Error>>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// The token request itself could not be built.
	#[error("Token request could not be constructed.")]
	Request(#[source] Arc<oauth2::http::Error>),
}
impl AuthError {
	/// Wraps a transport failure observed while calling the token endpoint.
	pub fn unreachable(
		message: impl Into<String>,
		status: Option<u16>,
		src: Option<BoxError>,
	) -> Self {
		Self::Unreachable { message: message.into(), status, source: src.map(Arc::from) }
	}
}
impl From<oauth2::http::Error> for AuthError {
	fn from(e: oauth2::http::Error) -> Self {
		Self::Request(Arc::new(e))
	}
}

/// Failures while producing a signed client assertion.
#[derive(Clone, Debug, ThisError)]
pub enum SigningError {
	/// JWT encoding or RSA signing failed.
	#[error("Client assertion could not be signed.")]
	Encode(#[from] jsonwebtoken::errors::Error),
}

/// Failures while fetching or decoding one directory page.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while fetching `{url}`.")]
	Network {
		/// Requested URL.
		url: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while fetching a directory page.")]
	Io(#[from] std::io::Error),
	/// Directory returned a non-success status.
	#[error("Directory returned HTTP {status} for `{url}`: {code} - {message}.")]
	Status {
		/// Requested URL.
		url: String,
		/// HTTP status code.
		status: u16,
		/// OData error code (or the status text when the body is not an OData error).
		code: String,
		/// OData error message (or a body preview).
		message: String,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Page body could not be decoded into the expected envelope.
	#[error("Directory page from `{url}` could not be decoded.")]
	Decode {
		/// Requested URL.
		url: String,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Request construction failed.
	#[error("Directory request could not be constructed.")]
	Request(#[from] oauth2::http::Error),
	/// Transport reported a failure without a typed source.
	#[error("HTTP client error occurred while fetching `{url}`: {message}.")]
	Other {
		/// Requested URL.
		url: String,
		/// Transport-supplied message.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(url: &Url, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { url: url.to_string(), source: Box::new(src) }
	}
}

/// Reasons a checkpoint could not be turned back into a page URL.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CheckpointError {
	/// Checkpoint bytes are not UTF-8.
	#[error("Checkpoint is not valid UTF-8.")]
	NotUtf8,
	/// Checkpoint text is not an absolute URL.
	#[error("Checkpoint `{text}` is not an absolute URL.")]
	NotUrl {
		/// Decoded checkpoint text.
		text: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Checkpoint points outside the directory this engine talks to.
	#[error("Checkpoint `{url}` does not belong to origin `{expected}`.")]
	ForeignOrigin {
		/// Decoded URL.
		url: String,
		/// Expected origin.
		expected: String,
	},
}

/// Reasons a raw directory record was excluded from the output.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RecordError {
	/// A required identifying attribute was absent or empty.
	#[error("{kind} `{id}` is missing `{field}`.")]
	MissingField {
		/// Record kind (user, group, member).
		kind: &'static str,
		/// Record identifier, or `<unknown>`.
		id: String,
		/// Missing attribute name.
		field: &'static str,
	},
	/// A member had a type this engine does not map.
	#[error("Member `{id}` has unsupported type `{odata_type}`.")]
	UnsupportedMemberType {
		/// Record identifier, or `<unknown>`.
		id: String,
		/// Reported `@odata.type`.
		odata_type: String,
	},
}
