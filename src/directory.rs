//! Paginated collection walker.
//!
//! [`PageWalker::fetch_page`] issues exactly one authenticated GET and decodes the OData envelope.
//! It never retries and never follows links on its own; [`PageWalker::member_stream`] is the only
//! place that chains pages, lazily and strictly in order.

mod record;

pub use record::*;

// crates.io
use futures::{Stream, TryStreamExt, stream};
use oauth2::{
	AsyncHttpClient,
	http::{Method, Request, StatusCode},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	endpoints::DirectoryEndpoints,
	error::TransportError,
	ext::{BearerSigner, RequestSigner},
	http::{DirectoryHttpClient, ResponseMetadataSlot},
	oauth::TransportErrorMapper,
	token::TokenCache,
};

const BODY_PREVIEW_CHARS: usize = 256;

/// Fetches single directory pages with a bearer token from the shared [`TokenCache`].
pub struct PageWalker<C, M>
where
	C: ?Sized + DirectoryHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	endpoints: DirectoryEndpoints,
	tokens: Arc<TokenCache<C, M>>,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
	signer: BearerSigner,
}
impl<C, M> PageWalker<C, M>
where
	C: ?Sized + DirectoryHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a walker sharing `tokens` with any other component of the same tenant.
	pub fn new(
		endpoints: DirectoryEndpoints,
		tokens: Arc<TokenCache<C, M>>,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			endpoints,
			tokens,
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
			signer: BearerSigner,
		}
	}

	/// Endpoint layout the walker was built with.
	pub fn endpoints(&self) -> &DirectoryEndpoints {
		&self.endpoints
	}

	/// Token cache used to authenticate requests.
	pub fn tokens(&self) -> &Arc<TokenCache<C, M>> {
		&self.tokens
	}

	/// Fetches and decodes the page at `url`.
	pub async fn fetch_page<T>(&self, url: &Url) -> Result<DirectoryPage<T>>
	where
		T: DeserializeOwned,
	{
		let token = self.tokens.get_token().await?;
		let mut target = url.clone();

		// Fragments are client-side only; links may still carry one.
		target.set_fragment(None);

		let request = Request::builder()
			.method(Method::GET)
			.uri(target.as_str())
			.body(Vec::new())
			.map_err(TransportError::from)?;
		let request = self.signer.attach_token(request, &token)?;
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(meta.clone());
		let response = handle.call(request).await.map_err(|err| {
			self.error_mapper.map_transport_error(url, meta.take().as_ref(), err)
		})?;
		let status = response.status();

		if !status.is_success() {
			if status == StatusCode::UNAUTHORIZED {
				self.tokens.invalidate();
			}

			let retry_after = meta.take().and_then(|value| value.retry_after);

			return Err(status_error(url, status, response.body(), retry_after).into());
		}

		let mut deserializer = serde_json::Deserializer::from_slice(response.body());
		let page: DirectoryPage<T> = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| TransportError::Decode { url: url.to_string(), source })?;

		tracing::debug!(
			url = %url,
			items = page.value.len(),
			has_next = page.next_link().is_some(),
			"Fetched directory page."
		);

		Ok(page)
	}

	/// Lazily walks every member page of one group, starting at `first`.
	///
	/// The stream is finite and cannot be restarted; the next page is requested only after the
	/// current one is exhausted. A transport failure ends the stream with that error.
	pub fn member_stream(&self, first: Url) -> impl Stream<Item = Result<RawMember>> + '_ {
		stream::try_unfold(Some(first), move |next| async move {
			let Some(url) = next else {
				return Ok(None);
			};
			let page = self.fetch_page::<RawMember>(&url).await?;
			let next = page.next_link().map(|link| self.follow_link(&url, link)).transpose()?;

			Ok::<_, Error>(Some((stream::iter(page.value.into_iter().map(Ok::<_, Error>)), next)))
		})
		.try_flatten()
	}

	/// Resolves a next link returned by the page at `from`.
	///
	/// Links that are not absolute or leave the graph origin are transport errors, so paging
	/// never follows them.
	pub fn follow_link(&self, from: &Url, link: &str) -> Result<Url, TransportError> {
		let invalid = |message: String| TransportError::Other { url: from.to_string(), message };
		let next = Url::parse(link)
			.map_err(|e| invalid(format!("next link `{link}` is not an absolute URL ({e})")))?;

		if !self.endpoints.is_graph_origin(&next) {
			return Err(invalid(format!(
				"next link `{link}` leaves the directory origin {}",
				self.endpoints.graph_origin()
			)));
		}

		Ok(next)
	}
}
impl<C, M> Debug for PageWalker<C, M>
where
	C: ?Sized + DirectoryHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PageWalker")
			.field("graph", &self.endpoints.graph().as_str())
			.field("tokens", &self.tokens)
			.finish()
	}
}

fn status_error(
	url: &Url,
	status: StatusCode,
	body: &[u8],
	retry_after: Option<Duration>,
) -> TransportError {
	let (code, message) = match serde_json::from_slice::<ODataErrorBody>(body) {
		Ok(ODataErrorBody { error }) => (error.code, error.message),
		Err(_) => (
			status.canonical_reason().unwrap_or("Unknown").to_owned(),
			String::from_utf8_lossy(body).chars().take(BODY_PREVIEW_CHARS).collect(),
		),
	};

	TransportError::Status {
		url: url.to_string(),
		status: status.as_u16(),
		code,
		message,
		retry_after,
	}
}
