//! Directory endpoint layout: login authority, graph API base, and the collection URLs built from
//! them.
//!
//! [`DirectoryEndpoints`] defaults to the public cloud. Both bases can be overridden through
//! [`DirectoryEndpointsBuilder`] (sovereign clouds, local mocks). Every endpoint must use HTTPS
//! unless it points at a loopback host.

// std
use std::num::NonZeroU32;
// crates.io
use url::Host;
// self
use crate::{_prelude::*, auth::TenantId, error::ConfigError};

/// Default login authority.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
/// Default graph API base.
pub const DEFAULT_GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";
/// Default scope requested during the client-credentials exchange.
pub const DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Validated endpoint layout used by the token cache and the page walker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEndpoints {
	authority: Url,
	graph: Url,
	scope: String,
}
impl DirectoryEndpoints {
	/// Returns the public-cloud layout.
	pub fn public_cloud() -> Result<Self, ConfigError> {
		Self::builder().build()
	}

	/// Starts a builder seeded with the public-cloud defaults.
	pub fn builder() -> DirectoryEndpointsBuilder {
		DirectoryEndpointsBuilder::default()
	}

	/// Login authority base.
	pub fn authority(&self) -> &Url {
		&self.authority
	}

	/// Graph API base.
	pub fn graph(&self) -> &Url {
		&self.graph
	}

	/// Scope requested during token acquisition.
	pub fn scope(&self) -> &str {
		&self.scope
	}

	/// Token endpoint for `tenant`: `{authority}/{tenant}/oauth2/v2.0/token`.
	pub fn token_endpoint(&self, tenant: &TenantId) -> Url {
		with_segments(&self.authority, &[tenant.as_ref(), "oauth2", "v2.0", "token"])
	}

	/// First page of the user collection.
	pub fn users_url(&self, page_size: NonZeroU32) -> Url {
		self.collection(&["users"], page_size)
	}

	/// First page of the group collection.
	pub fn groups_url(&self, page_size: NonZeroU32) -> Url {
		self.collection(&["groups"], page_size)
	}

	/// First page of the member collection of `group_id`.
	pub fn members_url(&self, group_id: &str, page_size: NonZeroU32) -> Url {
		self.collection(&["groups", group_id, "members"], page_size)
	}

	/// Returns `true` when `url` points at the configured graph origin.
	pub fn is_graph_origin(&self, url: &Url) -> bool {
		url.origin() == self.graph.origin()
	}

	/// Serialized graph origin, used in diagnostics.
	pub fn graph_origin(&self) -> String {
		self.graph.origin().ascii_serialization()
	}

	fn collection(&self, segments: &[&str], page_size: NonZeroU32) -> Url {
		let mut url = with_segments(&self.graph, segments);

		url.set_query(Some(&format!("$top={page_size}")));

		url
	}
}

/// Builder for [`DirectoryEndpoints`].
#[derive(Clone, Debug, Default)]
pub struct DirectoryEndpointsBuilder {
	/// Authority override; defaults to [`DEFAULT_AUTHORITY`].
	pub authority: Option<Url>,
	/// Graph base override; defaults to [`DEFAULT_GRAPH_BASE`].
	pub graph: Option<Url>,
	/// Scope override; defaults to [`DEFAULT_SCOPE`].
	pub scope: Option<String>,
}
impl DirectoryEndpointsBuilder {
	/// Overrides the login authority.
	pub fn authority(mut self, url: Url) -> Self {
		self.authority = Some(url);

		self
	}

	/// Overrides the graph API base.
	pub fn graph(mut self, url: Url) -> Self {
		self.graph = Some(url);

		self
	}

	/// Overrides the requested scope.
	pub fn scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());

		self
	}

	/// Validates the layout.
	pub fn build(self) -> Result<DirectoryEndpoints, ConfigError> {
		let authority = resolve("authority", self.authority, DEFAULT_AUTHORITY)?;
		let graph = resolve("graph", self.graph, DEFAULT_GRAPH_BASE)?;

		Ok(DirectoryEndpoints {
			authority,
			graph,
			scope: self.scope.unwrap_or_else(|| DEFAULT_SCOPE.to_owned()),
		})
	}
}

fn resolve(
	name: &'static str,
	url: Option<Url>,
	default: &'static str,
) -> Result<Url, ConfigError> {
	let url = match url {
		Some(url) => url,
		None => Url::parse(default)
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: name, source })?,
	};

	validate_endpoint(name, &url)?;

	Ok(url)
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigError> {
	if url.scheme() == "https" || is_loopback(url) {
		Ok(())
	} else {
		Err(ConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}

// Local mock servers and sidecar proxies may speak plain HTTP.
fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(Host::Ipv4(ip)) => ip.is_loopback(),
		Some(Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	}
}

fn with_segments(base: &Url, segments: &[&str]) -> Url {
	let mut url = base.clone();

	url.set_query(None);
	url.set_fragment(None);

	// Validated bases always accept path segments.
	if let Ok(mut path) = url.path_segments_mut() {
		path.pop_if_empty().extend(segments);
	}

	url
}
