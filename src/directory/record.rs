//! Wire records and the OData collection envelope.
//!
//! Every attribute is optional on the wire; the sync engine decides which ones a record needs.

// crates.io
use serde::{Deserializer, de::DeserializeOwned};
// self
use crate::_prelude::*;

/// `@odata.type` of user members.
pub const ODATA_TYPE_USER: &str = "#microsoft.graph.user";
/// `@odata.type` of nested group members.
pub const ODATA_TYPE_GROUP: &str = "#microsoft.graph.group";

/// One page of a collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct DirectoryPage<T> {
	/// `@odata.context` metadata URL.
	#[serde(rename = "@odata.context", default)]
	pub context: Option<String>,
	/// Link to the next page, when more results exist.
	#[serde(rename = "@odata.nextLink", default)]
	pub next_link: Option<String>,
	/// Delta link returned on the final page of a delta query.
	#[serde(rename = "@odata.deltaLink", default)]
	pub delta_link: Option<String>,
	/// Records on this page; an absent or null `value` and null entries decode as nothing.
	#[serde(default, deserialize_with = "non_null_entries")]
	pub value: Vec<T>,
}
impl<T> DirectoryPage<T> {
	/// Next-page link, ignoring empty strings.
	pub fn next_link(&self) -> Option<&str> {
		self.next_link.as_deref().filter(|link| !link.is_empty())
	}
}

/// User record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUser {
	/// Object id.
	#[serde(default)]
	pub id: Option<String>,
	/// Primary SMTP address.
	#[serde(default)]
	pub mail: Option<String>,
	/// Sign-in name.
	#[serde(default)]
	pub user_principal_name: Option<String>,
	/// Display name.
	#[serde(default)]
	pub display_name: Option<String>,
	/// Whether the account can sign in.
	#[serde(default)]
	pub account_enabled: Option<bool>,
}

/// Group record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGroup {
	/// Object id.
	#[serde(default)]
	pub id: Option<String>,
	/// Display name.
	#[serde(default)]
	pub display_name: Option<String>,
	/// Group SMTP address, for mail-enabled groups.
	#[serde(default)]
	pub mail: Option<String>,
}

/// Group member record; `odata_type` tells users from nested groups.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMember {
	/// `@odata.type` discriminator.
	#[serde(rename = "@odata.type", default)]
	pub odata_type: Option<String>,
	/// Object id.
	#[serde(default)]
	pub id: Option<String>,
	/// Primary SMTP address (users).
	#[serde(default)]
	pub mail: Option<String>,
	/// Sign-in name (users).
	#[serde(default)]
	pub user_principal_name: Option<String>,
	/// Display name.
	#[serde(default)]
	pub display_name: Option<String>,
}

/// OData error body: `{"error": {"code": ..., "message": ...}}`.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ODataErrorBody {
	pub(crate) error: ODataError,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ODataError {
	#[serde(default)]
	pub(crate) code: String,
	#[serde(default)]
	pub(crate) message: String,
}

fn non_null_entries<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
	D: Deserializer<'de>,
	T: Deserialize<'de>,
{
	let entries = Option::<Vec<Option<T>>>::deserialize(deserializer)?;

	Ok(entries.unwrap_or_default().into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn envelope_tolerates_null_value_and_entries() {
		let page: DirectoryPage<RawUser> = serde_json::from_str(
			r#"{"@odata.context":"ctx","value":[null,{"id":"1","mail":"a@x.com"}]}"#,
		)
		.expect("Envelope should decode.");

		assert_eq!(page.value.len(), 1);
		assert_eq!(page.value[0].mail.as_deref(), Some("a@x.com"));
		assert!(page.next_link().is_none());

		let empty: DirectoryPage<RawUser> =
			serde_json::from_str(r#"{"value":null}"#).expect("Null value should decode.");

		assert!(empty.value.is_empty());

		let bare: DirectoryPage<RawGroup> =
			serde_json::from_str("{}").expect("Missing value should decode.");

		assert!(bare.value.is_empty());
	}

	#[test]
	fn member_discriminator_and_links_decode() {
		let page: DirectoryPage<RawMember> = serde_json::from_str(
			r##"{
				"@odata.nextLink":"https://graph.example.com/v1.0/groups/g/members?$skiptoken=x",
				"value":[{"@odata.type":"#microsoft.graph.group","id":"g2","displayName":"Nested"}]
			}"##,
		)
		.expect("Member page should decode.");

		assert_eq!(page.value[0].odata_type.as_deref(), Some(ODATA_TYPE_GROUP));
		assert_eq!(
			page.next_link(),
			Some("https://graph.example.com/v1.0/groups/g/members?$skiptoken=x")
		);
	}

	#[test]
	fn empty_next_link_means_last_page() {
		let page: DirectoryPage<RawGroup> =
			serde_json::from_str(r#"{"@odata.nextLink":"","value":[]}"#)
				.expect("Envelope should decode.");

		assert!(page.next_link().is_none());
	}
}
