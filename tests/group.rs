mod common;

use common::{not_found, session, ScriptedConnection};
use serde_json::json;
use std::sync::Arc;
use syncano_sdk::{Error, Method, Model, Session};

fn group(session: &Arc<Session>) -> Model {
    let mut group = session.model("Group").unwrap();
    group.set("instance_name", "demo").unwrap();
    group
        .to_python(&json!({"id": 4, "label": "staff", "links": {"self": "/v1/instances/demo/groups/4/"}}))
        .unwrap();
    group
}

fn user(session: &Arc<Session>) -> Model {
    let mut user = session.model("User").unwrap();
    user.set("instance_name", "demo").unwrap();
    user.to_python(&json!({"id": 9, "username": "ann", "links": {"self": "/v1/instances/demo/users/9/"}}))
        .unwrap();
    user
}

#[tokio::test]
async fn add_user_unwraps_membership() {
    let conn = ScriptedConnection::new();
    conn.push(json!({"user": {"id": 9, "username": "ann"}}));
    let session = session(&conn);

    let member = group(&session).add_user(9).await.unwrap();
    assert_eq!(member.name(), "User");
    assert_eq!(member.get_str("username"), Some("ann"));

    let request = &conn.requests()[0];
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.path, "/v1/instances/demo/groups/4/users/");
    assert_eq!(request.data, Some(json!({"user": 9})));
}

#[tokio::test]
async fn list_users_follows_pages() {
    let conn = ScriptedConnection::new();
    conn.push(json!({
        "objects": [{"user": {"id": 1, "username": "a"}}],
        "next": "/v1/instances/demo/groups/4/users/?page=2"
    }));
    conn.push(json!({"objects": [{"user": {"id": 2, "username": "b"}}], "next": null}));
    let session = session(&conn);

    let users = group(&session).list_users().await.unwrap();
    let names: Vec<_> = users.iter().filter_map(|u| u.get_str("username")).collect();
    assert_eq!(names, ["a", "b"]);
}

#[tokio::test]
async fn missing_members_map_to_domain_errors() {
    let conn = ScriptedConnection::new();
    conn.push_err(not_found());
    conn.push_err(not_found());
    conn.push_err(not_found());
    let session = session(&conn);

    assert_eq!(group(&session).user_details(99).await.unwrap_err(), Error::UserNotFound);
    assert_eq!(group(&session).remove_user(99).await.unwrap_err(), Error::UserNotFound);
    assert_eq!(
        user(&session).remove_from_group(7).await.unwrap_err(),
        Error::GroupNotFound
    );

    let requests = conn.requests();
    assert_eq!(requests[0].path, "/v1/instances/demo/groups/4/users/99/");
    assert_eq!(requests[1].method, Method::Delete);
    assert_eq!(requests[2].path, "/v1/instances/demo/users/9/groups/7/");
}

#[tokio::test]
async fn add_to_group_returns_group() {
    let conn = ScriptedConnection::new();
    conn.push(json!({"group": {"id": 4, "label": "staff"}}));
    let session = session(&conn);

    let joined = user(&session).add_to_group(4).await.unwrap();
    assert_eq!(joined.name(), "Group");
    assert_eq!(joined.get_str("label"), Some("staff"));
    assert_eq!(conn.requests()[0].data, Some(json!({"group": 4})));
}

#[tokio::test]
async fn other_failures_pass_through() {
    let conn = ScriptedConnection::new();
    conn.push_err(syncano_sdk::RequestError::status(403, json!({"detail": "No access"})));
    let session = session(&conn);
    let err = group(&session).user_details(1).await.unwrap_err();
    assert_eq!(err.status_code(), Some(403));
}
