mod common;

// std
use std::{collections::BTreeSet, pin::pin};
// crates.io
use color_eyre::{Result, eyre::eyre};
use futures::{StreamExt, TryStreamExt};
use graph_identity_sync::{
	config::SyncConfig,
	error::{Error, TransportError},
	sync::{EntityKey, IdentityUser, Membership},
};
use serde_json::{Value, json};
// self
use common::{GRAPH, ScriptedDirectory};

const USERS_FIRST: &str = "https://graph.test/v1.0/users?$top=50";
const GROUPS_FIRST: &str = "https://graph.test/v1.0/groups?$top=50";

fn users_page(next_link: Option<&str>) -> Value {
	let mut page = json!({
		"@odata.context": "https://graph.test/v1.0/$metadata#users",
		"value": [
			{ "id": "1", "mail": "a@x.com", "userPrincipalName": "a@x.com" },
			{ "id": "2", "mail": "", "userPrincipalName": "b@x.com" },
		],
	});

	if let Some(link) = next_link {
		page["@odata.nextLink"] = json!(link);
	}

	page
}

fn members_url(group_id: &str) -> String {
	format!("{GRAPH}/groups/{group_id}/members?$top=50")
}

fn user_member(id: &str, mail: &str) -> Value {
	json!({ "@odata.type": "#microsoft.graph.user", "id": id, "mail": mail })
}

fn group_member(id: &str) -> Value {
	json!({ "@odata.type": "#microsoft.graph.group", "id": id, "displayName": "Nested" })
}

fn empty_page() -> Value {
	json!({ "value": [] })
}

fn expected_members() -> BTreeSet<Membership> {
	BTreeSet::from([
		Membership::member(EntityKey::new("a@x.com")),
		Membership::member(EntityKey::namespaced("g2", "entra")),
	])
}

#[tokio::test]
async fn absent_checkpoint_fetches_the_first_page() -> Result<()> {
	let directory = ScriptedDirectory::new();

	directory.route_json(USERS_FIRST, users_page(None));

	let sync = common::scripted_sync(&directory, common::sync_config());
	let page = sync.list_users(None).await?;

	assert_eq!(directory.page_requests(), vec![USERS_FIRST.to_owned()]);
	assert_eq!(page.items.len(), 1);

	let get = directory
		.requests()
		.into_iter()
		.find(|request| request.url == USERS_FIRST)
		.ok_or_else(|| eyre!("The users page should have been requested."))?;

	assert_eq!(get.authorization.as_deref(), Some("Bearer directory-token"));

	Ok(())
}

#[tokio::test]
async fn configured_page_sizes_shape_the_first_urls() -> Result<()> {
	let directory = ScriptedDirectory::new();
	let config = SyncConfig::new(7, 3, 2)?;

	directory.route_json(&format!("{GRAPH}/users?$top=7"), empty_page());
	directory.route_json(&format!("{GRAPH}/groups?$top=3"), json!({ "value": [{ "id": "g1" }] }));
	directory.route_json(&format!("{GRAPH}/groups/g1/members?$top=2"), empty_page());

	let sync = common::scripted_sync(&directory, config);

	sync.list_users(None).await?;
	sync.list_groups(None).await?;

	assert_eq!(
		directory.page_requests(),
		vec![
			format!("{GRAPH}/users?$top=7"),
			format!("{GRAPH}/groups?$top=3"),
			format!("{GRAPH}/groups/g1/members?$top=2"),
		]
	);

	Ok(())
}

#[tokio::test]
async fn malformed_checkpoints_fall_back_to_the_first_page() -> Result<()> {
	let directory = ScriptedDirectory::new();

	directory.route_json(USERS_FIRST, users_page(None));

	let sync = common::scripted_sync(&directory, common::sync_config());
	let checkpoints: [&[u8]; 4] = [
		b"not a url",
		&[0xff, 0xfe, 0x00],
		b"https://attacker.test/v1.0/users?$skiptoken=x",
		b"",
	];

	for checkpoint in checkpoints {
		let page = sync.list_users(Some(checkpoint)).await?;

		assert_eq!(page.items.len(), 1);
		assert!(!page.has_more);
	}

	assert_eq!(directory.page_requests(), vec![USERS_FIRST.to_owned(); 4]);

	Ok(())
}

#[tokio::test]
async fn next_link_round_trips_through_the_checkpoint() -> Result<()> {
	let next = "https://graph.test/v1.0/users?$top=50&$skiptoken=X%27abc%27";
	let directory = ScriptedDirectory::new();

	directory.route_json(USERS_FIRST, users_page(Some(next)));
	directory.route_json(next, users_page(None));

	let sync = common::scripted_sync(&directory, common::sync_config());
	let first = sync.list_users(None).await?;

	assert!(first.has_more);

	let checkpoint = first.checkpoint.ok_or_else(|| eyre!("A next link should be emitted."))?;

	assert_eq!(checkpoint.as_bytes(), next.as_bytes());

	let second = sync.list_users(Some(checkpoint.as_bytes())).await?;

	assert_eq!(directory.page_requests().last().map(String::as_str), Some(next));
	assert!(!second.has_more);
	assert!(second.checkpoint.is_none());

	Ok(())
}

#[tokio::test]
async fn users_missing_identifying_fields_are_dropped() -> Result<()> {
	let directory = ScriptedDirectory::new();

	directory.route_json(USERS_FIRST, users_page(None));

	let page = common::scripted_sync(&directory, common::sync_config()).list_users(None).await?;

	assert_eq!(
		page.items,
		vec![IdentityUser {
			external_identity: "a@x.com".into(),
			user_identity: "a@x.com".into(),
		}]
	);
	assert!(page.checkpoint.is_none());
	assert!(!page.has_more);

	Ok(())
}

#[tokio::test]
async fn group_memberships_are_deduplicated_across_member_pages() -> Result<()> {
	let second_members = format!("{}&$skiptoken=m2", members_url("g1"));
	let directory = ScriptedDirectory::new();

	directory.route_json(
		GROUPS_FIRST,
		json!({ "value": [{ "id": "g1", "displayName": "Engineering" }, { "displayName": "?" }] }),
	);
	directory.route_json(
		&members_url("g1"),
		json!({
			"@odata.nextLink": second_members,
			"value": [user_member("u1", "a@x.com"), group_member("g2"), user_member("u3", "")],
		}),
	);
	directory.route_json(
		&second_members,
		json!({
			"value": [
				user_member("u1", "a@x.com"),
				{ "@odata.type": "#microsoft.graph.device", "id": "d1" },
				null,
			],
		}),
	);

	let config = common::sync_config().with_identity_source(Some("entra".into()));
	let page = common::scripted_sync(&directory, config).list_groups(None).await?;

	assert_eq!(page.items.len(), 1);

	let group = &page.items[0];

	assert_eq!(group.group_id, "g1");
	assert_eq!(group.group_key, EntityKey::namespaced("g1", "entra"));
	assert_eq!(group.display_name.as_deref(), Some("Engineering"));
	assert_eq!(group.members, expected_members());
	assert!(!page.has_more);

	Ok(())
}

#[tokio::test]
async fn membership_sets_do_not_depend_on_member_order() -> Result<()> {
	let members = [user_member("u1", "a@x.com"), group_member("g2"), user_member("u3", "")];
	let mut reversed = members.clone();

	reversed.reverse();

	let mut resolved = Vec::new();

	for order in [members, reversed] {
		let directory = ScriptedDirectory::new();

		directory.route_json(&members_url("g1"), json!({ "value": order }));

		let config = common::sync_config().with_identity_source(Some("entra".into()));

		resolved.push(common::scripted_sync(&directory, config).resolve_members("g1").await?);
	}

	assert_eq!(resolved[0], expected_members());
	assert_eq!(resolved[0], resolved[1]);

	Ok(())
}

#[tokio::test]
async fn member_pages_are_fetched_lazily() -> Result<()> {
	let second_members = format!("{}&$skiptoken=m2", members_url("g1"));
	let directory = ScriptedDirectory::new();

	directory.route_json(
		&members_url("g1"),
		json!({ "@odata.nextLink": second_members, "value": [user_member("u1", "a@x.com")] }),
	);
	directory.route_json(&second_members, json!({ "value": [user_member("u2", "b@x.com")] }));

	let sync = common::scripted_sync(&directory, common::sync_config());
	let mut stream = pin!(sync.memberships("g1"));
	let first = stream.next().await.ok_or_else(|| eyre!("One membership should be streamed."))??;

	assert_eq!(first, Membership::member(EntityKey::new("a@x.com")));
	assert_eq!(directory.page_requests(), vec![members_url("g1")]);

	let rest: Vec<Membership> = stream.try_collect().await?;

	assert_eq!(rest, vec![Membership::member(EntityKey::new("b@x.com"))]);
	assert_eq!(directory.page_requests(), vec![members_url("g1"), second_members]);

	Ok(())
}

#[tokio::test]
async fn fragment_links_round_trip_across_group_pages() -> Result<()> {
	let next = "https://graph.test/v1.0/groups?$top=50&$skiptoken=p2#next";
	let directory = ScriptedDirectory::new();

	directory
		.route_json(GROUPS_FIRST, json!({ "@odata.nextLink": next, "value": [{ "id": "g1" }] }));
	directory.route_json(
		"https://graph.test/v1.0/groups?$top=50&$skiptoken=p2",
		json!({ "value": [{ "id": "g2" }] }),
	);
	directory.route_json(&members_url("g1"), empty_page());
	directory.route_json(&members_url("g2"), empty_page());

	let sync = common::scripted_sync(&directory, common::sync_config());
	let first = sync.list_groups(None).await?;

	assert!(first.has_more);

	let checkpoint = first.checkpoint.ok_or_else(|| eyre!("A next link should be emitted."))?;

	assert_eq!(checkpoint.as_bytes(), next.as_bytes());

	let second = sync.list_groups(Some(checkpoint.as_bytes())).await?;

	assert_eq!(second.items.len(), 1);
	assert_eq!(second.items[0].group_id, "g2");
	assert!(!second.has_more);
	assert!(second.checkpoint.is_none());

	Ok(())
}

#[tokio::test]
async fn foreign_next_links_fail_the_collection_call() {
	let foreign = "https://graph.other.test/v1.0/users?$skiptoken=x";
	let directory = ScriptedDirectory::new();

	directory.route_json(USERS_FIRST, users_page(Some(foreign)));
	directory.route_json(
		GROUPS_FIRST,
		json!({ "@odata.nextLink": foreign, "value": [{ "id": "g1" }] }),
	);

	let sync = common::scripted_sync(&directory, common::sync_config());

	for err in [
		sync.list_users(None).await.expect_err("A foreign users link should fail."),
		sync.list_groups(None).await.expect_err("A foreign groups link should fail."),
	] {
		match err {
			Error::Transport(TransportError::Other { message, .. }) => {
				assert!(message.contains("graph.other.test"));
			},
			other => panic!("Unexpected error: {other:?}."),
		}
	}

	assert_eq!(directory.page_requests(), vec![USERS_FIRST.to_owned(), GROUPS_FIRST.to_owned()]);
}

#[tokio::test]
async fn transport_failures_propagate() {
	let directory = ScriptedDirectory::new();

	directory.route_json(GROUPS_FIRST, json!({ "value": [{ "id": "g1" }] }));
	directory.route(
		&members_url("g1"),
		503,
		r#"{"error":{"code":"serviceUnavailable","message":"Try later."}}"#,
	);

	let sync = common::scripted_sync(&directory, common::sync_config());
	let unrouted = sync.list_users(None).await.expect_err("An unrouted page should fail.");

	assert!(matches!(unrouted, Error::Transport(TransportError::Io(_))));

	let member_failure =
		sync.list_groups(None).await.expect_err("A failing member page should fail the groups.");

	match member_failure {
		Error::Transport(TransportError::Status { status, code, .. }) => {
			assert_eq!(status, 503);
			assert_eq!(code, "serviceUnavailable");
		},
		other => panic!("Unexpected error: {other:?}."),
	}
}

#[tokio::test]
async fn unauthorized_pages_invalidate_the_cached_token() {
	let directory = ScriptedDirectory::new();

	directory.route(
		USERS_FIRST,
		401,
		r#"{"error":{"code":"InvalidAuthenticationToken","message":"Token expired."}}"#,
	);

	let sync = common::scripted_sync(&directory, common::sync_config());
	let err = sync.list_users(None).await.expect_err("A 401 page should fail.");

	assert!(matches!(err, Error::Transport(TransportError::Status { status: 401, .. })));
	assert!(sync.walker().tokens().cached().is_none());

	sync.list_users(None).await.expect_err("The page is still unauthorized.");

	assert_eq!(directory.token_requests(), 2);
}

#[tokio::test]
async fn token_failures_surface_as_authentication_errors() {
	let directory = ScriptedDirectory::new();

	directory.route(
		common::TOKEN_URL,
		401,
		r#"{"error":"invalid_client","error_description":"Bad secret."}"#,
	);
	directory.route_json(USERS_FIRST, users_page(None));

	let err = common::scripted_sync(&directory, common::sync_config())
		.list_users(None)
		.await
		.expect_err("A rejected token exchange should fail the page.");

	assert!(matches!(err, Error::Authentication(_)));
	assert!(directory.page_requests().is_empty());
}
