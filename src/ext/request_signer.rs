//! Request signing: attach a cached access token to an outbound directory request.

// crates.io
use oauth2::{
	HttpRequest,
	http::{
		HeaderValue,
		header::{ACCEPT, AUTHORIZATION},
	},
};
// self
use crate::{auth::Secret, error::TransportError};

/// Attaches an access token to a request without constraining the HTTP client type.
pub trait RequestSigner<Request, Error>
where
	Self: Send + Sync,
{
	/// Consumes the request and returns it carrying the authorization state derived from `token`.
	fn attach_token(&self, request: Request, token: &Secret) -> Result<Request, Error>;
}

/// Sets `Authorization: Bearer <token>` and `Accept: application/json`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BearerSigner;
impl RequestSigner<HttpRequest, TransportError> for BearerSigner {
	fn attach_token(
		&self,
		mut request: HttpRequest,
		token: &Secret,
	) -> Result<HttpRequest, TransportError> {
		let mut authorization = HeaderValue::from_str(&format!("Bearer {}", token.expose()))
			.map_err(oauth2::http::Error::from)?;

		authorization.set_sensitive(true);

		let headers = request.headers_mut();

		headers.insert(AUTHORIZATION, authorization);
		headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

		Ok(request)
	}
}
