mod common;

use common::{not_found, session, ScriptedConnection};
use serde_json::{json, Value};
use syncano_sdk::{ConfigError, Error, FieldValue, Method, NO_KWARGS};

fn class_payload(name: &str) -> Value {
    json!({
        "name": name,
        "schema": [{"name": "title", "type": "string"}],
        "links": {"self": format!("/v1/instances/demo/classes/{name}/")}
    })
}

#[tokio::test]
async fn get_maps_positional_args_onto_detail_path() {
    let conn = ScriptedConnection::new();
    conn.push(class_payload("books"));
    conn.push(json!({"id": 7}));
    let session = session(&conn);

    let class = session.please("Class").unwrap().get(["books"]).await.unwrap();
    assert_eq!(class.get_str("name"), Some("books"));
    assert_eq!(class.get_endpoint_data().get("instance_name").map(String::as_str), Some("demo"));

    let object = session
        .please("Object")
        .unwrap()
        .get([FieldValue::from("books"), FieldValue::from(7)])
        .await
        .unwrap();
    assert_eq!(object.get_i64("id"), Some(7));

    let requests = conn.requests();
    assert_eq!(requests[0].method, Method::Get);
    assert_eq!(requests[0].path, "/v1/instances/demo/classes/books/");
    assert_eq!(requests[1].path, "/v1/instances/demo/classes/books/objects/7/");
}

#[tokio::test]
async fn single_argument_binds_to_id() {
    let conn = ScriptedConnection::new();
    conn.push(json!({"id": 7}));
    let session = session(&conn);

    session
        .please("Object")
        .unwrap()
        .property("class_name", "books")
        .get([7])
        .await
        .unwrap();
    assert_eq!(conn.requests()[0].path, "/v1/instances/demo/classes/books/objects/7/");

    let err = session.please("Object").unwrap().get([7]).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::MissingProperty { ref property, .. }) if property == "class_name"
    ));
    assert_eq!(conn.requests().len(), 1);
}

#[tokio::test]
async fn too_many_positional_args_is_rejected_locally() {
    let conn = ScriptedConnection::new();
    let session = session(&conn);
    let err = session
        .please("Class")
        .unwrap()
        .get(["books", "extra"])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::Validation(_))));
    assert!(conn.requests().is_empty());
}

#[tokio::test]
async fn get_404_is_does_not_exist() {
    let conn = ScriptedConnection::new();
    conn.push_err(not_found());
    let session = session(&conn);
    let err = session.please("Class").unwrap().get(["missing"]).await.unwrap_err();
    assert_eq!(err, Error::DoesNotExist { model: "Class".into() });
    assert!(err.is_does_not_exist());
}

#[tokio::test]
async fn list_404_stays_a_request_error() {
    let conn = ScriptedConnection::new();
    conn.push_err(not_found());
    let session = session(&conn);
    let err = session.please("Class").unwrap().fetch().await.unwrap_err();
    assert_eq!(err.status_code(), Some(404));
}

#[tokio::test]
async fn chain_methods_leave_the_original_untouched() {
    let conn = ScriptedConnection::new();
    let session = session(&conn);
    let base = session.please("Object").unwrap().property("class_name", "books");

    let narrowed = base
        .filter([("id__gt", 1)])
        .unwrap()
        .page_size(10)
        .property("class_name", "films");

    assert!(base.query_params().is_empty());
    assert_eq!(base.properties_bound()["class_name"], "books");
    assert_eq!(narrowed.properties_bound()["class_name"], "films");
    assert_eq!(narrowed.query_params()["page_size"], "10");
}

#[tokio::test]
async fn object_filters_build_the_query_document() {
    let conn = ScriptedConnection::new();
    conn.push(json!({"objects": [], "next": null}));
    let session = session(&conn);

    let manager = session
        .please("Object")
        .unwrap()
        .property("class_name", "books")
        .filter([("id__gt", FieldValue::from(1)), ("owner", FieldValue::from(2))])
        .unwrap();
    manager.fetch().await.unwrap();

    let requests = conn.requests();
    assert_eq!(requests[0].path, "/v1/instances/demo/classes/books/objects/");
    let query: Value = serde_json::from_str(&requests[0].params["query"]).unwrap();
    assert_eq!(query, json!({"id": {"_gt": 1}, "owner": {"_eq": 2}}));
}

#[tokio::test]
async fn bad_filters_fail_before_any_request() {
    let conn = ScriptedConnection::new();
    let session = session(&conn);
    let objects = session.please("Object").unwrap().property("class_name", "books");

    assert!(matches!(
        objects.filter([("colour", "red")]),
        Err(ConfigError::UnknownField { .. })
    ));
    assert!(matches!(
        objects.filter([("id__near", 3)]),
        Err(ConfigError::UnknownLookup { .. })
    ));
    assert!(matches!(
        objects.filter([("owner__startswith", "a")]),
        Err(ConfigError::InvalidLookupValue { .. })
    ));
    assert!(matches!(
        objects.filter([("class_name", "books")]),
        Err(ConfigError::Validation(_))
    ));
    assert!(conn.requests().is_empty());
}

#[tokio::test]
async fn non_object_filter_binds_properties() {
    let conn = ScriptedConnection::new();
    let session = session(&conn);
    let classes = session
        .please("Class")
        .unwrap()
        .filter([("instance_name", "other")])
        .unwrap();
    assert_eq!(classes.properties_bound()["instance_name"], "other");
    assert!(classes.query_params().is_empty());
}

#[tokio::test]
async fn ordering_rules_follow_the_model_kind() {
    let conn = ScriptedConnection::new();
    let session = session(&conn);
    let classes = session.please("Class").unwrap();
    let objects = session.please("Object").unwrap();

    assert!(matches!(classes.order_by("name"), Err(ConfigError::InvalidOrdering(_))));
    assert!(matches!(objects.ordering("asc"), Err(ConfigError::InvalidOrdering(_))));
    assert!(matches!(objects.order_by("owner"), Err(ConfigError::InvalidOrdering(_))));
    assert!(matches!(classes.ordering("sideways"), Err(ConfigError::InvalidOrdering(_))));

    assert_eq!(
        objects.order_by("-created_at").unwrap().query_params()["order_by"],
        "-created_at"
    );
    assert_eq!(classes.ordering("DESC").unwrap().query_params()["ordering"], "desc");
}

#[tokio::test]
async fn count_asks_for_the_total_only() {
    let conn = ScriptedConnection::new();
    conn.push(json!({"objects": [], "objects_count": 3, "next": null}));
    let session = session(&conn);

    let total = session.please("Class").unwrap().count().await.unwrap();
    assert_eq!(total, 3);
    let params = &conn.requests()[0].params;
    assert_eq!(params["page_size"], "0");
    assert_eq!(params["include_count"], "true");
}

#[tokio::test]
async fn first_returns_none_on_empty_list() {
    let conn = ScriptedConnection::new();
    conn.push(json!({"objects": [], "next": null}));
    let session = session(&conn);

    assert!(session.please("Class").unwrap().first(NO_KWARGS).await.unwrap().is_none());
    assert_eq!(conn.requests()[0].params["page_size"], "1");
}

#[tokio::test]
async fn first_binds_kwargs_as_properties() {
    let conn = ScriptedConnection::new();
    conn.push(json!({"objects": [{"name": "books"}], "next": null}));
    let session = session(&conn);

    let class = session
        .please("Class")
        .unwrap()
        .first([("instance_name", "other")])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(class.get_str("name"), Some("books"));
    assert_eq!(conn.requests()[0].path, "/v1/instances/other/classes/");
}

#[tokio::test]
async fn update_patches_and_explicit_data_wins() {
    let conn = ScriptedConnection::new();
    conn.push(json!({"name": "books", "description": "from data"}));
    let session = session(&conn);

    let class = session
        .please("Class")
        .unwrap()
        .data(json!({"description": "from data"}))
        .unwrap()
        .update(["books"], [("description", "from kwargs")])
        .await
        .unwrap();

    let requests = conn.requests();
    assert_eq!(requests[0].method, Method::Patch);
    assert_eq!(requests[0].path, "/v1/instances/demo/classes/books/");
    assert_eq!(requests[0].data, Some(json!({"description": "from data"})));
    assert_eq!(class.get_str("description"), Some("from data"));
}

#[tokio::test]
async fn update_without_writable_detail_verb_fails() {
    let conn = ScriptedConnection::new();
    let session = session(&conn);
    let err = session
        .please("Message")
        .unwrap()
        .property("channel_name", "news")
        .update([1], NO_KWARGS)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::MethodNotAllowed { .. })));
    assert!(conn.requests().is_empty());
}

#[tokio::test]
async fn get_or_create_creates_when_missing() {
    let conn = ScriptedConnection::new();
    conn.push_err(not_found());
    conn.push(class_payload("books"));
    let session = session(&conn);

    let (class, created) = session
        .please("Class")
        .unwrap()
        .get_or_create(
            [("name", "books")],
            [
                ("description", FieldValue::from("shelf")),
                ("schema", FieldValue::Json(json!([{"name": "title", "type": "string"}]))),
            ],
        )
        .await
        .unwrap();

    assert!(created);
    assert_eq!(class.get_str("name"), Some("books"));
    let requests = conn.requests();
    assert_eq!(requests[0].method, Method::Get);
    assert_eq!(requests[0].path, "/v1/instances/demo/classes/books/");
    assert_eq!(requests[1].method, Method::Post);
    assert_eq!(requests[1].path, "/v1/instances/demo/classes/");
    let body = requests[1].data.as_ref().unwrap();
    assert_eq!(body["name"], "books");
    assert_eq!(body["description"], "shelf");
    assert_eq!(body["schema"], json!([{"name": "title", "type": "string"}]));
}

#[tokio::test]
async fn get_or_create_returns_existing() {
    let conn = ScriptedConnection::new();
    conn.push(class_payload("books"));
    let session = session(&conn);

    let (_, created) = session
        .please("Class")
        .unwrap()
        .get_or_create([("name", "books")], NO_KWARGS)
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(conn.requests().len(), 1);
}

#[tokio::test]
async fn update_or_create_sends_defaults_as_data() {
    let conn = ScriptedConnection::new();
    conn.push(json!({"name": "books", "description": "fresh"}));
    let session = session(&conn);

    let (_, created) = session
        .please("Class")
        .unwrap()
        .update_or_create([("name", "books")], [("description", "fresh")])
        .await
        .unwrap();
    assert!(!created);
    let request = &conn.requests()[0];
    assert_eq!(request.method, Method::Patch);
    assert_eq!(request.path, "/v1/instances/demo/classes/books/");
    assert_eq!(request.data, Some(json!({"name": "books", "description": "fresh"})));
}

#[tokio::test]
async fn delete_issues_detail_delete() {
    let conn = ScriptedConnection::new();
    conn.push(Value::Null);
    let session = session(&conn);
    session.please("Class").unwrap().delete(["books"]).await.unwrap();
    let request = &conn.requests()[0];
    assert_eq!(request.method, Method::Delete);
    assert_eq!(request.path, "/v1/instances/demo/classes/books/");
}

#[tokio::test]
async fn create_saves_through_list_endpoint() {
    let conn = ScriptedConnection::new();
    conn.push(json!({"id": 1, "channel": "news", "links": {"self": "x"}}));
    let session = session(&conn);

    let object = session
        .please("Object")
        .unwrap()
        .property("class_name", "books")
        .create([("channel", "news")])
        .await
        .unwrap();
    assert!(!object.is_new());
    let request = &conn.requests()[0];
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.path, "/v1/instances/demo/classes/books/objects/");
    assert_eq!(request.data, Some(json!({"channel": "news"})));
}

#[tokio::test]
async fn raw_manager_returns_json() {
    let conn = ScriptedConnection::new();
    conn.push(class_payload("books"));
    let session = session(&conn);
    let value = session.please("Class").unwrap().raw().get(["books"]).await.unwrap();
    assert_eq!(value["name"], "books");
}

#[tokio::test]
async fn instance_manager_has_no_default_instance_binding() {
    let conn = ScriptedConnection::new();
    conn.push(json!({"objects": [{"name": "demo"}], "next": null}));
    let session = session(&conn);
    let instances = session.please("Instance").unwrap();
    assert!(instances.properties_bound().is_empty());
    let all = instances.fetch().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(conn.requests()[0].path, "/v1/instances/");
}
