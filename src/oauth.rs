//! Client-credentials exchange on top of the `oauth2` crate, plus transport error mapping.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError, RequestTokenError, Scope,
	TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::{ClientId, Secret},
	error::{AuthError, TransportError},
	http::{DirectoryHttpClient, ResponseMetadata, ResponseMetadataSlot},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Maps HTTP transport failures into [`TransportError`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] raised while requesting `url`.
	fn map_transport_error(
		&self,
		url: &Url,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> TransportError;
}

/// Mapper that keeps the transport's own error as the network failure source.
#[derive(Clone, Debug, Default)]
pub struct DefaultTransportErrorMapper;
impl<E> TransportErrorMapper<E> for DefaultTransportErrorMapper
where
	E: 'static + Send + Sync + StdError,
{
	fn map_transport_error(
		&self,
		url: &Url,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> TransportError {
		match error {
			HttpClientError::Reqwest(inner) => TransportError::network(url, *inner),
			HttpClientError::Http(inner) => TransportError::Request(inner),
			HttpClientError::Io(inner) => TransportError::Io(inner),
			HttpClientError::Other(message) =>
				TransportError::Other { url: url.to_string(), message },
			_ => TransportError::Other {
				url: url.to_string(),
				message: match metadata.and_then(|meta| meta.status) {
					Some(status) => format!("unclassified failure after HTTP {status}"),
					None => "unclassified failure".into(),
				},
			},
		}
	}
}

/// Token material returned by a successful exchange.
#[derive(Clone, Debug)]
pub(crate) struct IssuedToken {
	pub(crate) access_token: Secret,
	pub(crate) expires_in: Option<Duration>,
}

/// `oauth2` client configured for one tenant's token endpoint.
///
/// Credentials always travel in the request body. Certificate mode sets no secret and passes the
/// assertion as extra parameters instead.
pub(crate) struct BasicFacade<C, M>
where
	C: ?Sized + DirectoryHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	token_url: Url,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> BasicFacade<C, M>
where
	C: ?Sized + DirectoryHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(
		client_id: &ClientId,
		client_secret: Option<&Secret>,
		token_url: Url,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Self {
		let mut oauth_client = BasicClient::new(oauth2::ClientId::new(client_id.to_string()))
			.set_token_uri(TokenUrl::from_url(token_url.clone()))
			.set_auth_type(AuthType::RequestBody);

		if let Some(secret) = client_secret {
			oauth_client =
				oauth_client.set_client_secret(ClientSecret::new(secret.expose().to_owned()));
		}

		Self { oauth_client, token_url, http_client, error_mapper }
	}

	pub(crate) async fn exchange_client_credentials(
		&self,
		scope: &str,
		extra_params: &[(&'static str, String)],
	) -> Result<IssuedToken, AuthError> {
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(meta.clone());
		let mut request =
			self.oauth_client.exchange_client_credentials().add_scope(Scope::new(scope.to_owned()));

		for (key, value) in extra_params {
			request = request.add_extra_param(*key, value.as_str());
		}

		let response = request
			.request_async(&handle)
			.await
			.map_err(|err| self.map_request_error(meta.take(), err))?;

		Ok(IssuedToken {
			access_token: Secret::new(response.access_token().secret().to_owned()),
			expires_in: response
				.expires_in()
				.and_then(|lifetime| i64::try_from(lifetime.as_secs()).ok())
				.map(Duration::seconds),
		})
	}

	fn map_request_error(
		&self,
		meta: Option<ResponseMetadata>,
		err: BasicRequestTokenError<HttpClientError<C::TransportError>>,
	) -> AuthError {
		let status = meta.as_ref().and_then(|value| value.status);

		match err {
			RequestTokenError::ServerResponse(response) => map_server_response(response, status),
			RequestTokenError::Request(error) => {
				let mapped =
					self.error_mapper.map_transport_error(&self.token_url, meta.as_ref(), error);

				AuthError::unreachable(mapped.to_string(), status, Some(Box::new(mapped)))
			},
			RequestTokenError::Parse(source, _body) =>
				AuthError::ResponseParse { source: Arc::new(source), status },
			RequestTokenError::Other(message) => AuthError::unreachable(
				format!("unexpected token endpoint response ({message})"),
				status,
				None,
			),
		}
	}
}

fn map_server_response(response: BasicErrorResponse, status: Option<u16>) -> AuthError {
	let code = response.error().as_ref();
	let reason = match response.error_description() {
		Some(description) => format!("{code} ({description})"),
		None => code.to_owned(),
	};

	AuthError::Rejected { reason, status }
}
