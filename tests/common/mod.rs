//! Fixtures shared by the integration tests: a scripted in-memory directory, PKCS#12 key
//! stores, and a reqwest client that trusts `httpmock`'s self-signed certificate.

#![allow(dead_code)]

// std
use std::{collections::HashMap, future::Future, io, path::PathBuf, pin::Pin, sync::Arc};
// crates.io
use graph_identity_sync::{
	auth::{ClientId, CredentialConfig, KeyStoreConfig, Secret, TenantId},
	config::SyncConfig,
	endpoints::DirectoryEndpoints,
	http::{DirectoryHttpClient, ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot},
	oauth::DefaultTransportErrorMapper,
	sync::IdentitySync,
	token::TokenCache,
};
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{
		Method, StatusCode,
		header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue},
	},
};
use openssl::{
	asn1::Asn1Time,
	bn::BigNum,
	hash::MessageDigest,
	pkcs12::Pkcs12,
	pkey::PKey,
	rsa::Rsa,
	x509::{X509, X509NameBuilder},
};
use parking_lot::Mutex;
use url::Url;

pub const AUTHORITY: &str = "https://login.test";
pub const GRAPH: &str = "https://graph.test/v1.0";
pub const TENANT: &str = "tenant-1";
pub const CLIENT_ID: &str = "app-1";
pub const TOKEN_URL: &str = "https://login.test/tenant-1/oauth2/v2.0/token";
pub const TOKEN_BODY: &str =
	"{\"access_token\":\"directory-token\",\"token_type\":\"Bearer\",\"expires_in\":3599}";

pub type ScriptedCache = TokenCache<ScriptedDirectory, DefaultTransportErrorMapper>;
pub type ScriptedSync = IdentitySync<ScriptedDirectory, DefaultTransportErrorMapper>;

/// One request observed by [`ScriptedDirectory`].
#[derive(Clone, Debug)]
pub struct RecordedRequest {
	pub method: Method,
	pub url: String,
	pub authorization: Option<String>,
	pub body: String,
}

#[derive(Default)]
struct Script {
	routes: HashMap<String, (u16, String)>,
	requests: Vec<RecordedRequest>,
}

/// In-memory directory answering exact URLs with canned responses.
///
/// Unrouted URLs fail at the transport level, like a refused connection.
#[derive(Clone, Default)]
pub struct ScriptedDirectory(Arc<Mutex<Script>>);
impl ScriptedDirectory {
	/// Directory whose token endpoint always issues [`TOKEN_BODY`].
	pub fn new() -> Self {
		let directory = Self::default();

		directory.route(TOKEN_URL, 200, TOKEN_BODY);

		directory
	}

	pub fn route(&self, url: &str, status: u16, body: impl Into<String>) {
		self.0.lock().routes.insert(url.to_owned(), (status, body.into()));
	}

	pub fn route_json(&self, url: &str, body: serde_json::Value) {
		self.route(url, 200, body.to_string());
	}

	pub fn requests(&self) -> Vec<RecordedRequest> {
		self.0.lock().requests.clone()
	}

	/// URLs of every directory GET, in order.
	pub fn page_requests(&self) -> Vec<String> {
		self.0
			.lock()
			.requests
			.iter()
			.filter(|request| request.method == Method::GET)
			.map(|request| request.url.clone())
			.collect()
	}

	pub fn token_requests(&self) -> usize {
		self.0.lock().requests.iter().filter(|request| request.method == Method::POST).count()
	}
}
impl DirectoryHttpClient for ScriptedDirectory {
	type Handle = ScriptedHandle;
	type TransportError = io::Error;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ScriptedHandle { script: Arc::clone(&self.0), slot }
	}
}

#[derive(Clone)]
pub struct ScriptedHandle {
	script: Arc<Mutex<Script>>,
	slot: ResponseMetadataSlot,
}
impl<'c> AsyncHttpClient<'c> for ScriptedHandle {
	type Error = HttpClientError<io::Error>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let this = self.clone();

		Box::pin(async move {
			this.slot.take();

			let url = request.uri().to_string();
			let route = {
				let mut script = this.script.lock();

				script.requests.push(RecordedRequest {
					method: request.method().clone(),
					url: url.clone(),
					authorization: request
						.headers()
						.get(AUTHORIZATION)
						.and_then(|value| value.to_str().ok())
						.map(ToOwned::to_owned),
					body: String::from_utf8_lossy(request.body()).into_owned(),
				});

				script.routes.get(&url).cloned()
			};
			let Some((status, body)) = route else {
				return Err(HttpClientError::Io(io::Error::new(
					io::ErrorKind::ConnectionRefused,
					format!("no route for {url}"),
				)));
			};

			this.slot.store(ResponseMetadata { status: Some(status), retry_after: None });

			let mut response = HttpResponse::new(body.into_bytes());

			*response.status_mut() =
				StatusCode::from_u16(status).expect("Scripted status should be valid.");
			response
				.headers_mut()
				.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

			Ok(response)
		})
	}
}

pub fn endpoints() -> DirectoryEndpoints {
	DirectoryEndpoints::builder()
		.authority(Url::parse(AUTHORITY).expect("Authority fixture should parse."))
		.graph(Url::parse(GRAPH).expect("Graph fixture should parse."))
		.build()
		.expect("Scripted endpoints should validate.")
}

pub fn secret_credentials() -> CredentialConfig {
	CredentialConfig::with_secret(
		ClientId::new(CLIENT_ID).expect("Client fixture should be valid."),
		TenantId::new(TENANT).expect("Tenant fixture should be valid."),
		Secret::new("s3cr3t"),
	)
}

pub fn sync_config() -> SyncConfig {
	SyncConfig::new(50, 50, 50).expect("Default page sizes should validate.")
}

/// Sync engine over `directory` with secret credentials and the scripted endpoints.
pub fn scripted_sync(directory: &ScriptedDirectory, config: SyncConfig) -> ScriptedSync {
	let endpoints = endpoints();
	let http_client = Arc::new(directory.clone());
	let mapper = Arc::new(DefaultTransportErrorMapper);
	let tokens: Arc<ScriptedCache> = Arc::new(TokenCache::new(
		secret_credentials(),
		&endpoints,
		http_client.clone(),
		mapper.clone(),
	));

	IdentitySync::new(config, endpoints, tokens, http_client, mapper)
}

/// Builds a reqwest transport that accepts the self-signed certificates produced by `httpmock`.
pub fn test_reqwest_http_client() -> ReqwestHttpClient {
	let client = reqwest::Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestHttpClient::with_client(client)
}

/// Writes a PKCS#12 store holding a fresh RSA key and self-signed certificate under `alias`.
pub fn write_key_store(tag: &str, alias: &str, password: &str) -> KeyStoreConfig {
	let pkey = PKey::from_rsa(Rsa::generate(2048).expect("RSA generation should succeed."))
		.expect("RSA key should wrap into PKey.");
	let mut name = X509NameBuilder::new().expect("Name builder should be available.");

	name.append_entry_by_text("CN", "graph-identity-sync-it")
		.expect("CN entry should be accepted.");

	let name = name.build();
	let mut builder = X509::builder().expect("Certificate builder should be available.");
	let serial = BigNum::from_u32(11)
		.and_then(|n| n.to_asn1_integer())
		.expect("Serial number should encode.");

	builder.set_version(2).expect("Version should be accepted.");
	builder.set_serial_number(&serial).expect("Serial should be accepted.");
	builder.set_subject_name(&name).expect("Subject should be accepted.");
	builder.set_issuer_name(&name).expect("Issuer should be accepted.");
	builder.set_pubkey(&pkey).expect("Public key should be accepted.");
	builder
		.set_not_before(&Asn1Time::days_from_now(0).expect("Start time should encode."))
		.expect("Start time should be accepted.");
	builder
		.set_not_after(&Asn1Time::days_from_now(1).expect("End time should encode."))
		.expect("End time should be accepted.");
	builder.sign(&pkey, MessageDigest::sha256()).expect("Self-signing should succeed.");

	let cert = builder.build();
	let store = Pkcs12::builder()
		.name(alias)
		.pkey(&pkey)
		.cert(&cert)
		.build2(password)
		.expect("PKCS#12 store should build.");
	let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
	let path: PathBuf =
		std::env::temp_dir().join(format!("it-{tag}-{}-{nanos}.p12", std::process::id()));

	std::fs::write(&path, store.to_der().expect("PKCS#12 store should encode."))
		.expect("Key store should be written to the temp dir.");

	KeyStoreConfig::new(path, password, alias)
}
