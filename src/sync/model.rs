//! Normalized identity model and conversion from wire records.

// self
use crate::{
	_prelude::*,
	directory::{ODATA_TYPE_GROUP, ODATA_TYPE_USER, RawGroup, RawMember, RawUser},
	error::RecordError,
};

const UNKNOWN_ID: &str = "<unknown>";

/// Key identifying an entity in the target identity graph.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
	/// Entity identifier (a mail address for users, an object id for groups).
	pub id: String,
	/// Identity source the id is scoped to, if any.
	pub namespace: Option<String>,
}
impl EntityKey {
	/// Key without a namespace.
	pub fn new(id: impl Into<String>) -> Self {
		Self { id: id.into(), namespace: None }
	}

	/// Key scoped to `namespace`.
	pub fn namespaced(id: impl Into<String>, namespace: impl Into<String>) -> Self {
		Self { id: id.into(), namespace: Some(namespace.into()) }
	}
}

/// Role a member holds in a group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipRole {
	/// Plain membership; the only role the directory reports.
	Member,
}

/// One resolved membership of a group.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Membership {
	/// Key of the member entity.
	pub member_key: EntityKey,
	/// Roles held by the member.
	pub roles: BTreeSet<MembershipRole>,
}
impl Membership {
	/// Plain [`MembershipRole::Member`] membership for `member_key`.
	pub fn member(member_key: EntityKey) -> Self {
		Self { member_key, roles: BTreeSet::from([MembershipRole::Member]) }
	}

	/// Converts a raw member, classifying it by its `@odata.type`.
	///
	/// Users need a mail address; nested groups need an id and are keyed through `context`.
	pub fn from_raw(raw: RawMember, context: &dyn IdentityContext) -> Result<Self, RecordError> {
		let id = raw.id.as_deref().filter(|value| !value.is_empty());
		let missing = |field| RecordError::MissingField {
			kind: "member",
			id: id.unwrap_or(UNKNOWN_ID).to_owned(),
			field,
		};

		match raw.odata_type.as_deref() {
			Some(ODATA_TYPE_USER) => {
				let mail = non_empty(raw.mail.as_deref()).ok_or_else(|| missing("mail"))?;

				Ok(Self::member(EntityKey::new(mail)))
			},
			Some(ODATA_TYPE_GROUP) => {
				let id = id.ok_or_else(|| missing("id"))?;

				Ok(Self::member(context.group_key(id)))
			},
			Some(other) => Err(RecordError::UnsupportedMemberType {
				id: id.unwrap_or(UNKNOWN_ID).to_owned(),
				odata_type: other.to_owned(),
			}),
			None => Err(missing("@odata.type")),
		}
	}
}

/// User as seen by the identity graph.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdentityUser {
	/// External identity (the user's mail address).
	pub external_identity: String,
	/// Sign-in identity (the user principal name).
	pub user_identity: String,
}
impl IdentityUser {
	/// Converts a raw user; both `mail` and `userPrincipalName` must be non-empty.
	pub fn from_raw(raw: RawUser) -> Result<Self, RecordError> {
		let missing = |field| RecordError::MissingField {
			kind: "user",
			id: raw.id.clone().unwrap_or_else(|| UNKNOWN_ID.to_owned()),
			field,
		};
		let mail = non_empty(raw.mail.as_deref()).ok_or_else(|| missing("mail"))?;
		let upn = non_empty(raw.user_principal_name.as_deref())
			.ok_or_else(|| missing("userPrincipalName"))?;

		Ok(Self { external_identity: mail.to_owned(), user_identity: upn.to_owned() })
	}
}

/// Group with its fully resolved membership set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityGroup {
	/// Directory object id.
	pub group_id: String,
	/// Key of the group in the identity graph.
	pub group_key: EntityKey,
	/// Display name, when the directory reports one.
	pub display_name: Option<String>,
	/// Deduplicated memberships.
	pub members: BTreeSet<Membership>,
}

/// Group fields validated before its members are fetched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct GroupHeader {
	pub(crate) id: String,
	pub(crate) display_name: Option<String>,
}
impl GroupHeader {
	pub(crate) fn from_raw(raw: RawGroup) -> Result<Self, RecordError> {
		let id = non_empty(raw.id.as_deref()).ok_or_else(|| RecordError::MissingField {
			kind: "group",
			id: UNKNOWN_ID.to_owned(),
			field: "id",
		})?;

		Ok(Self { id: id.to_owned(), display_name: raw.display_name })
	}
}

/// Host-provided mapping from directory groups to identity-graph keys.
pub trait IdentityContext
where
	Self: Send + Sync,
{
	/// Key for the group with directory id `group_id`.
	fn group_key(&self, group_id: &str) -> EntityKey;
}

/// Keys groups by id, scoped to an optional identity-source namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamespacedContext {
	namespace: Option<String>,
}
impl NamespacedContext {
	/// Creates a context scoped to `namespace`.
	pub fn new(namespace: Option<String>) -> Self {
		Self { namespace }
	}
}
impl IdentityContext for NamespacedContext {
	fn group_key(&self, group_id: &str) -> EntityKey {
		EntityKey { id: group_id.to_owned(), namespace: self.namespace.clone() }
	}
}

fn non_empty(value: Option<&str>) -> Option<&str> {
	value.filter(|inner| !inner.is_empty())
}
