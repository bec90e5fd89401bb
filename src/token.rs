//! Token cache with refresh-ahead and single-flight acquisition.
//!
//! [`TokenCache::get_token`] serves the cached token while it is younger than
//! [`SOFT_REFRESH_AFTER`]. Past that, the calling task performs one client-credentials exchange
//! while holding the refresh guard; tasks that arrive during the exchange wait on the guard and
//! then take its outcome, token or error, instead of starting their own. A token older than its
//! hard expiry is never served. A failed exchange is returned to every caller that waited on it
//! and the previous token stays cached, so the next call retries.

mod cached;
mod clock;

pub use cached::*;
pub use clock::*;

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{CLIENT_ASSERTION_TYPE, CredentialConfig, CredentialMode, Secret},
	endpoints::DirectoryEndpoints,
	error::AuthError,
	http::DirectoryHttpClient,
	oauth::{BasicFacade, TransportErrorMapper},
	obs::{self, Operation},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::DefaultTransportErrorMapper};

/// Token cache specialized for the crate's default reqwest transport stack.
#[cfg(feature = "reqwest")]
pub type ReqwestTokenCache = TokenCache<ReqwestHttpClient, DefaultTransportErrorMapper>;

/// Refresh-ahead access token cache for one credential configuration.
pub struct TokenCache<C, M>
where
	C: ?Sized + DirectoryHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	credentials: CredentialConfig,
	token_url: Url,
	scope: String,
	facade: BasicFacade<C, M>,
	clock: Arc<dyn Clock>,
	current: RwLock<Option<CachedToken>>,
	// Bumped under the guard each time an exchange finishes.
	refreshes: AtomicU64,
	// Error of the most recent exchange, if it failed.
	refresh_guard: AsyncMutex<Option<AuthError>>,
}
impl<C, M> TokenCache<C, M>
where
	C: ?Sized + DirectoryHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an empty cache; the first [`get_token`](Self::get_token) call acquires a token.
	pub fn new(
		credentials: CredentialConfig,
		endpoints: &DirectoryEndpoints,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Self {
		let token_url = endpoints.token_endpoint(&credentials.tenant);
		let secret = match credentials.mode() {
			CredentialMode::Secret(secret) => Some(secret),
			CredentialMode::Certificate(_) => None,
		};
		let facade = BasicFacade::new(
			&credentials.client_id,
			secret,
			token_url.clone(),
			http_client.into(),
			error_mapper.into(),
		);

		Self {
			scope: endpoints.scope().to_owned(),
			credentials,
			token_url,
			facade,
			clock: Arc::new(SystemClock),
			current: RwLock::new(None),
			refreshes: AtomicU64::new(0),
			refresh_guard: AsyncMutex::new(None),
		}
	}

	/// Replaces the time source.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Token endpoint this cache exchanges credentials at.
	pub fn token_url(&self) -> &Url {
		&self.token_url
	}

	/// Returns a bearer token that is younger than the soft refresh threshold.
	pub async fn get_token(&self) -> Result<Secret, AuthError> {
		if let Some(token) = self.fresh_token() {
			tracing::debug!("Serving cached access token.");

			return Ok(token);
		}

		let seen = self.refreshes.load(Ordering::Acquire);
		let mut last_failure = self.refresh_guard.lock().await;

		// Another task may have refreshed while this one waited.
		if let Some(token) = self.fresh_token() {
			return Ok(token);
		}

		// An exchange finished while this task waited; share its failure.
		let waited_on_exchange = self.refreshes.load(Ordering::Acquire) != seen;

		if let Some(e) = last_failure.as_ref().filter(|_| waited_on_exchange) {
			tracing::debug!(error = %e, "Returning the failure of the awaited refresh.");

			return Err(e.clone());
		}

		let outcome = obs::observe(Operation::TokenRefresh, "get_token", async {
			let now = self.clock.now();
			let previous = self.current.read().as_ref().map(|token| token.freshness_at(now));

			tracing::debug!(
				?previous,
				mode = self.credentials.mode().as_str(),
				"Refreshing access token."
			);

			match self.acquire().await {
				Ok(token) => {
					let value = token.value().clone();

					*self.current.write() = Some(token);

					Ok(value)
				},
				Err(e) => {
					tracing::warn!(error = %e, "Access token refresh failed.");

					Err(e)
				},
			}
		})
		.await;

		*last_failure = outcome.as_ref().err().cloned();

		self.refreshes.fetch_add(1, Ordering::Release);

		outcome
	}

	/// Drops the cached token so the next call acquires a new one.
	pub fn invalidate(&self) {
		if self.current.write().take().is_some() {
			tracing::debug!("Cached access token invalidated.");
		}
	}

	/// Snapshot of the cached token, if any.
	pub fn cached(&self) -> Option<CachedToken> {
		self.current.read().clone()
	}

	fn fresh_token(&self) -> Option<Secret> {
		let now = self.clock.now();

		self.current
			.read()
			.as_ref()
			.filter(|token| token.freshness_at(now) == Freshness::Fresh)
			.map(|token| token.value().clone())
	}

	async fn acquire(&self) -> Result<CachedToken, AuthError> {
		let extra_params = match self.credentials.mode() {
			CredentialMode::Secret(_) => Vec::new(),
			CredentialMode::Certificate(signer) => {
				let assertion =
					signer.sign_at(&self.credentials.client_id, &self.token_url, self.clock.now())?;

				vec![
					("client_assertion_type", CLIENT_ASSERTION_TYPE.to_owned()),
					("client_assertion", assertion),
				]
			},
		};
		let issued = self.facade.exchange_client_credentials(&self.scope, &extra_params).await?;

		Ok(CachedToken::new(issued.access_token, self.clock.now(), issued.expires_in))
	}
}
impl<C, M> Debug for TokenCache<C, M>
where
	C: ?Sized + DirectoryHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCache")
			.field("client_id", &self.credentials.client_id)
			.field("tenant", &self.credentials.tenant)
			.field("token_url", &self.token_url.as_str())
			.field("cached", &self.current.read().as_ref().map(CachedToken::acquired_at))
			.finish()
	}
}
