//! Cached access token and its refresh-ahead thresholds.

// self
use crate::{_prelude::*, auth::Secret};

/// Age after which a cached token is refreshed before being served.
pub const SOFT_REFRESH_AFTER: Duration = Duration::minutes(30);
/// Age after which a cached token is never served.
pub const HARD_EXPIRE_AFTER: Duration = Duration::minutes(45);

/// Freshness classification of a [`CachedToken`] at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Freshness {
	/// Younger than the soft threshold; served without contacting the token endpoint.
	Fresh,
	/// Past the soft threshold but still inside the hard expiry.
	Stale,
	/// Past the hard expiry.
	Expired,
}

/// Access token plus the instant it was acquired.
#[derive(Clone, Debug)]
pub struct CachedToken {
	value: Secret,
	acquired_at: OffsetDateTime,
	soft: Duration,
	hard: Duration,
}
impl CachedToken {
	/// Wraps a freshly issued token.
	///
	/// A positive `expires_in` shorter than [`HARD_EXPIRE_AFTER`] tightens the hard expiry, and
	/// the soft threshold never exceeds the hard one.
	pub fn new(value: Secret, acquired_at: OffsetDateTime, expires_in: Option<Duration>) -> Self {
		let hard = expires_in
			.filter(|lifetime| lifetime.is_positive())
			.map_or(HARD_EXPIRE_AFTER, |lifetime| lifetime.min(HARD_EXPIRE_AFTER));

		Self { value, acquired_at, soft: SOFT_REFRESH_AFTER.min(hard), hard }
	}

	/// Bearer value.
	pub fn value(&self) -> &Secret {
		&self.value
	}

	/// Instant the token was stored.
	pub fn acquired_at(&self) -> OffsetDateTime {
		self.acquired_at
	}

	/// Instant after which the token is never served.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.acquired_at + self.hard
	}

	/// Classifies the token at `now`.
	pub fn freshness_at(&self, now: OffsetDateTime) -> Freshness {
		let age = now - self.acquired_at;

		if age >= self.hard {
			Freshness::Expired
		} else if age >= self.soft {
			Freshness::Stale
		} else {
			Freshness::Fresh
		}
	}
}
