//! Checkpointed synchronization engine.
//!
//! Each `list_*` call serves exactly one page. Without a checkpoint it starts at the collection's
//! first page; with one it fetches the URL the checkpoint encodes, and a checkpoint that does not
//! decode falls back to the first page with a warning. Invalid records are dropped with a warning
//! and never fail the page. Transport and authentication failures propagate unchanged, and so
//! does a next link outside the graph origin, which no checkpoint could resume from.
//!
//! Listing groups drains every group's member pages before the group is returned, so a group's
//! membership set is always complete.

mod checkpoint;
mod model;

pub use checkpoint::*;
pub use model::*;

// crates.io
use futures::{Stream, StreamExt, TryStreamExt};
// self
use crate::{
	_prelude::*,
	config::SyncConfig,
	directory::{PageWalker, RawGroup, RawMember, RawUser},
	endpoints::DirectoryEndpoints,
	error::RecordError,
	http::DirectoryHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, Operation},
	token::TokenCache,
};
#[cfg(feature = "reqwest")]
use crate::{config::Settings, http::ReqwestHttpClient, oauth::DefaultTransportErrorMapper};

/// Sync engine specialized for the crate's default reqwest transport stack.
#[cfg(feature = "reqwest")]
pub type ReqwestIdentitySync = IdentitySync<ReqwestHttpClient, DefaultTransportErrorMapper>;

/// Items converted from one page plus the caller's resumption state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckpointedPage<T> {
	/// Valid items, in page order.
	pub items: Vec<T>,
	/// Checkpoint for the next page; `None` once the collection is exhausted.
	pub checkpoint: Option<Checkpoint>,
	/// `true` exactly when `checkpoint` is present.
	pub has_more: bool,
}
impl<T> CheckpointedPage<T> {
	fn new(items: Vec<T>, next_link: Option<&str>) -> Self {
		let checkpoint = next_link.map(Checkpoint::from_link);

		Self { items, has_more: checkpoint.is_some(), checkpoint }
	}
}

/// Walks users, groups, and group members and converts them into the identity model.
pub struct IdentitySync<C, M>
where
	C: ?Sized + DirectoryHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	config: SyncConfig,
	walker: PageWalker<C, M>,
	context: Arc<dyn IdentityContext>,
}
impl<C, M> IdentitySync<C, M>
where
	C: ?Sized + DirectoryHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an engine; nested groups are keyed by [`NamespacedContext`] over the configured
	/// identity source.
	pub fn new(
		config: SyncConfig,
		endpoints: DirectoryEndpoints,
		tokens: Arc<TokenCache<C, M>>,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Self {
		let context = Arc::new(NamespacedContext::new(config.identity_source.clone()));

		Self {
			config,
			walker: PageWalker::new(endpoints, tokens, http_client, error_mapper),
			context,
		}
	}

	/// Replaces the group key mapping.
	pub fn with_context(mut self, context: Arc<dyn IdentityContext>) -> Self {
		self.context = context;

		self
	}

	/// Page walker backing this engine.
	pub fn walker(&self) -> &PageWalker<C, M> {
		&self.walker
	}

	/// Lists one page of users.
	pub async fn list_users(
		&self,
		checkpoint: Option<&[u8]>,
	) -> Result<CheckpointedPage<IdentityUser>> {
		obs::observe(Operation::ListUsers, "list_users", async {
			let default = self.endpoints().users_url(self.config.user_page_size);
			let url = self.resume_url("users", checkpoint, default);
			let page = self.walker.fetch_page::<RawUser>(&url).await?;
			let next_link = self.checked_next_link(&url, page.next_link())?;
			let items = page
				.value
				.into_iter()
				.filter_map(|raw| keep_valid("user", IdentityUser::from_raw(raw)))
				.collect();

			Ok::<_, Error>(CheckpointedPage::new(items, next_link.as_deref()))
		})
		.await
	}

	/// Lists one page of groups, each with its complete membership set.
	pub async fn list_groups(
		&self,
		checkpoint: Option<&[u8]>,
	) -> Result<CheckpointedPage<IdentityGroup>> {
		obs::observe(Operation::ListGroups, "list_groups", async {
			let default = self.endpoints().groups_url(self.config.group_page_size);
			let url = self.resume_url("groups", checkpoint, default);
			let page = self.walker.fetch_page::<RawGroup>(&url).await?;
			let next_link = self.checked_next_link(&url, page.next_link())?;
			let mut items = Vec::with_capacity(page.value.len());

			for raw in page.value {
				let Some(header) = keep_valid("group", GroupHeader::from_raw(raw)) else {
					continue;
				};
				let members = self.resolve_members(&header.id).await?;

				items.push(IdentityGroup {
					group_key: self.context.group_key(&header.id),
					group_id: header.id,
					display_name: header.display_name,
					members,
				});
			}

			Ok::<_, Error>(CheckpointedPage::new(items, next_link.as_deref()))
		})
		.await
	}

	/// Drains every member page of `group_id` into a deduplicated membership set.
	pub async fn resolve_members(&self, group_id: &str) -> Result<BTreeSet<Membership>> {
		obs::observe(Operation::ListMembers, "resolve_members", async {
			let members: BTreeSet<Membership> = self.memberships(group_id).try_collect().await?;

			tracing::debug!(group_id, members = members.len(), "Resolved group membership.");

			Ok::<_, Error>(members)
		})
		.await
	}

	/// Lazily streams the valid memberships of `group_id`, page by page.
	///
	/// Duplicates are not removed; [`resolve_members`](Self::resolve_members) collects into a set.
	pub fn memberships<'a>(
		&'a self,
		group_id: &str,
	) -> impl Stream<Item = Result<Membership>> + use<'a, C, M> {
		let first = self.endpoints().members_url(group_id, self.config.member_page_size);
		let context = Arc::clone(&self.context);

		self.walker.member_stream(first).filter_map(move |item| {
			let converted = match item {
				Ok(raw) => convert_member(raw, context.as_ref()).map(Ok),
				Err(e) => Some(Err(e)),
			};

			futures::future::ready(converted)
		})
	}

	fn endpoints(&self) -> &DirectoryEndpoints {
		self.walker.endpoints()
	}

	// The checkpoint keeps the link verbatim once it is known to resolve inside the graph origin.
	fn checked_next_link(&self, from: &Url, link: Option<&str>) -> Result<Option<String>> {
		let Some(link) = link else {
			return Ok(None);
		};

		self.walker.follow_link(from, link)?;

		Ok(Some(link.to_owned()))
	}

	fn resume_url(
		&self,
		collection: &'static str,
		checkpoint: Option<&[u8]>,
		default: Url,
	) -> Url {
		let Some(bytes) = checkpoint.filter(|bytes| !bytes.is_empty()) else {
			return default;
		};

		match Checkpoint::decode(bytes, self.endpoints()) {
			Ok(url) => url,
			Err(e) => {
				tracing::warn!(
					collection,
					error = %e,
					fallback = %default,
					"Malformed checkpoint; restarting from the first page."
				);
				obs::record_skipped("checkpoint");

				default
			},
		}
	}
}
#[cfg(feature = "reqwest")]
impl IdentitySync<ReqwestHttpClient, DefaultTransportErrorMapper> {
	/// Validates `settings` and wires a token cache, reqwest transport, and engine for the public
	/// cloud.
	pub fn from_settings(settings: &Settings) -> Result<Self> {
		let (credentials, config) = settings.validate()?;
		let endpoints = DirectoryEndpoints::public_cloud()?;
		let http_client = Arc::new(ReqwestHttpClient::new()?);
		let error_mapper = Arc::new(DefaultTransportErrorMapper);
		let tokens = Arc::new(TokenCache::new(
			credentials,
			&endpoints,
			http_client.clone(),
			error_mapper.clone(),
		));

		Ok(Self::new(config, endpoints, tokens, http_client, error_mapper))
	}
}
impl<C, M> Debug for IdentitySync<C, M>
where
	C: ?Sized + DirectoryHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdentitySync")
			.field("config", &self.config)
			.field("walker", &self.walker)
			.finish()
	}
}

fn convert_member(raw: RawMember, context: &dyn IdentityContext) -> Option<Membership> {
	keep_valid("member", Membership::from_raw(raw, context))
}

fn keep_valid<T>(kind: &'static str, converted: Result<T, RecordError>) -> Option<T> {
	match converted {
		Ok(item) => Some(item),
		Err(e) => {
			tracing::warn!(kind, error = %e, "Skipping invalid directory record.");
			obs::record_skipped(kind);

			None
		},
	}
}
