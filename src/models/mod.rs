//! Built-in model declarations for the Syncano v1 API.

pub mod channel;
pub mod group;
pub mod object;

pub use channel::{PollHandle, Poller};

use serde_json::{json, Value};

use crate::config::Method::{Delete, Get, Patch, Post, Put};
use crate::config::{FieldConfig, FullConfig, ModelConfig, ModelKind};
use crate::error::Result;
use crate::model::Model;

const PERMISSIONS: &[&str] = &["none", "read", "write", "full"];

fn instance_scoped(name: &str) -> ModelConfig {
    ModelConfig::new(name)
        .parent("Instance")
        .field(FieldConfig::endpoint_param("instance_name"))
}

fn timestamps(model: ModelConfig) -> ModelConfig {
    model
        .field(FieldConfig::datetime("created_at").read_only().ordered())
        .field(FieldConfig::datetime("updated_at").read_only().ordered())
}

fn instance() -> ModelConfig {
    timestamps(
        ModelConfig::new("Instance")
            .field(FieldConfig::string("name").primary_key().required().max_length(64))
            .field(FieldConfig::text("description"))
            .field(FieldConfig::string("role").read_only())
            .field(FieldConfig::json("owner").read_only())
            .field(FieldConfig::json("metadata"))
            .field(FieldConfig::links()),
    )
    .endpoint("list", &[Get, Post], "/v1/instances/")
    .endpoint("detail", &[Get, Put, Patch, Delete], "/v1/instances/{name}/")
    .endpoint("batch", &[Post], "/v1/instances/{name}/batch/")
}

fn admin() -> ModelConfig {
    instance_scoped("Admin")
        .field(FieldConfig::integer("id").primary_key().read_only())
        .field(FieldConfig::email("email").read_only())
        .field(FieldConfig::string("first_name").read_only())
        .field(FieldConfig::string("last_name").read_only())
        .field(FieldConfig::choice("role", &["full", "write", "read"]).required())
        .field(FieldConfig::links())
        .endpoint("list", &[Get], "/v1/instances/{instance_name}/admins/")
        .endpoint(
            "detail",
            &[Get, Put, Patch, Delete],
            "/v1/instances/{instance_name}/admins/{id}/",
        )
}

fn api_key() -> ModelConfig {
    timestamps(
        instance_scoped("ApiKey")
            .field(FieldConfig::integer("id").primary_key().read_only())
            .field(FieldConfig::string("api_key").read_only())
            .field(FieldConfig::text("description"))
            .field(FieldConfig::boolean("allow_user_create").default(json!(false)))
            .field(FieldConfig::boolean("ignore_acl").default(json!(false)))
            .field(FieldConfig::links()),
    )
    .endpoint("list", &[Get, Post], "/v1/instances/{instance_name}/api_keys/")
    .endpoint("detail", &[Get, Delete], "/v1/instances/{instance_name}/api_keys/{id}/")
    .endpoint("reset_key", &[Post], "/v1/instances/{instance_name}/api_keys/{id}/reset_key/")
}

fn class() -> ModelConfig {
    timestamps(
        instance_scoped("Class")
            .field(FieldConfig::string("name").primary_key().required().max_length(64))
            .field(FieldConfig::text("description"))
            .field(FieldConfig::integer("objects_count").read_only())
            .field(FieldConfig::schema("schema").required())
            .field(FieldConfig::json("status").read_only())
            .field(FieldConfig::json("metadata"))
            .field(FieldConfig::integer("revision").read_only())
            .field(FieldConfig::integer("group"))
            .field(FieldConfig::choice("group_permissions", &["none", "read", "create_objects"]))
            .field(FieldConfig::choice("other_permissions", &["none", "read", "create_objects"]))
            .field(FieldConfig::links()),
    )
    .endpoint("list", &[Get, Post], "/v1/instances/{instance_name}/classes/")
    .endpoint(
        "detail",
        &[Get, Put, Patch, Delete],
        "/v1/instances/{instance_name}/classes/{name}/",
    )
}

fn object() -> ModelConfig {
    ModelConfig::new("Object")
        .kind(ModelKind::Object)
        .parent("Class")
        .field(FieldConfig::integer("id").primary_key().read_only().ordered())
        .field(FieldConfig::endpoint_param("instance_name"))
        .field(FieldConfig::endpoint_param("class_name"))
        .field(FieldConfig::datetime("created_at").read_only().ordered())
        .field(FieldConfig::datetime("updated_at").read_only().ordered())
        .field(FieldConfig::integer("revision").read_only().ordered())
        .field(FieldConfig::integer("owner"))
        .field(FieldConfig::choice("owner_permissions", PERMISSIONS))
        .field(FieldConfig::integer("group"))
        .field(FieldConfig::choice("group_permissions", PERMISSIONS))
        .field(FieldConfig::choice("other_permissions", PERMISSIONS))
        .field(FieldConfig::string("channel"))
        .field(FieldConfig::string("channel_room").max_length(64))
        .field(FieldConfig::links())
        .endpoint(
            "list",
            &[Get, Post],
            "/v1/instances/{instance_name}/classes/{class_name}/objects/",
        )
        .endpoint(
            "detail",
            &[Get, Post, Patch, Delete],
            "/v1/instances/{instance_name}/classes/{class_name}/objects/{id}/",
        )
}

fn channel() -> ModelConfig {
    timestamps(
        instance_scoped("Channel")
            .field(FieldConfig::string("name").primary_key().required().max_length(64))
            .field(FieldConfig::choice("type", &["default", "separate_rooms"]))
            .field(FieldConfig::integer("group"))
            .field(FieldConfig::choice("group_permissions", &["none", "subscribe", "publish"]))
            .field(FieldConfig::choice("other_permissions", &["none", "subscribe", "publish"]))
            .field(FieldConfig::boolean("custom_publish"))
            .field(FieldConfig::text("description"))
            .field(FieldConfig::links()),
    )
    .endpoint("list", &[Get, Post], "/v1/instances/{instance_name}/channels/")
    .endpoint(
        "detail",
        &[Get, Put, Patch, Delete],
        "/v1/instances/{instance_name}/channels/{name}/",
    )
    .endpoint("poll", &[Get], "/v1/instances/{instance_name}/channels/{name}/poll/")
    .endpoint("publish", &[Post], "/v1/instances/{instance_name}/channels/{name}/publish/")
}

fn message() -> ModelConfig {
    instance_scoped("Message")
        .parent("Channel")
        .field(FieldConfig::integer("id").primary_key().read_only())
        .field(FieldConfig::endpoint_param("channel_name"))
        .field(FieldConfig::string("room").read_only())
        .field(FieldConfig::choice("action", &["custom", "create", "update", "delete"]).read_only())
        .field(FieldConfig::json("author").read_only())
        .field(FieldConfig::json("metadata").read_only())
        .field(FieldConfig::json("payload").read_only())
        .field(FieldConfig::datetime("created_at").read_only())
        .endpoint(
            "list",
            &[Get],
            "/v1/instances/{instance_name}/channels/{channel_name}/history/",
        )
        .endpoint(
            "detail",
            &[Get],
            "/v1/instances/{instance_name}/channels/{channel_name}/history/{id}/",
        )
}

fn group() -> ModelConfig {
    timestamps(
        instance_scoped("Group")
            .field(FieldConfig::integer("id").primary_key().read_only())
            .field(FieldConfig::string("label").required().max_length(64))
            .field(FieldConfig::text("description"))
            .field(FieldConfig::links()),
    )
    .endpoint("list", &[Get, Post], "/v1/instances/{instance_name}/groups/")
    .endpoint(
        "detail",
        &[Get, Put, Patch, Delete],
        "/v1/instances/{instance_name}/groups/{id}/",
    )
    .endpoint("users", &[Get, Post], "/v1/instances/{instance_name}/groups/{id}/users/")
    .endpoint(
        "user_detail",
        &[Get, Delete],
        "/v1/instances/{instance_name}/groups/{id}/users/{user_id}/",
    )
}

fn user() -> ModelConfig {
    timestamps(
        instance_scoped("User")
            .field(FieldConfig::integer("id").primary_key().read_only())
            .field(FieldConfig::string("username").required().max_length(64))
            .field(FieldConfig::string("password"))
            .field(FieldConfig::string("user_key").read_only())
            .field(FieldConfig::json("profile").read_only())
            .field(FieldConfig::links()),
    )
    .endpoint("list", &[Get, Post], "/v1/instances/{instance_name}/users/")
    .endpoint(
        "detail",
        &[Get, Put, Patch, Delete],
        "/v1/instances/{instance_name}/users/{id}/",
    )
    .endpoint("reset_key", &[Post], "/v1/instances/{instance_name}/users/{id}/reset_key/")
    .endpoint("groups", &[Get, Post], "/v1/instances/{instance_name}/users/{id}/groups/")
    .endpoint(
        "group_detail",
        &[Get, Delete],
        "/v1/instances/{instance_name}/users/{id}/groups/{group_id}/",
    )
}

fn codebox() -> ModelConfig {
    timestamps(
        instance_scoped("CodeBox")
            .field(FieldConfig::integer("id").primary_key().read_only())
            .field(FieldConfig::string("label").required().max_length(80))
            .field(FieldConfig::text("description"))
            .field(FieldConfig::text("source").required())
            .field(FieldConfig::choice("runtime_name", &["nodejs", "python", "ruby", "golang"]).required())
            .field(FieldConfig::json("config"))
            .field(FieldConfig::links()),
    )
    .endpoint("list", &[Get, Post], "/v1/instances/{instance_name}/codeboxes/")
    .endpoint(
        "detail",
        &[Get, Put, Patch, Delete],
        "/v1/instances/{instance_name}/codeboxes/{id}/",
    )
    .endpoint("run", &[Post], "/v1/instances/{instance_name}/codeboxes/{id}/run/")
}

fn webhook() -> ModelConfig {
    instance_scoped("Webhook")
        .field(FieldConfig::slug("name").primary_key().required().max_length(50))
        .field(FieldConfig::integer("codebox").required())
        .field(FieldConfig::boolean("public"))
        .field(FieldConfig::string("public_link").read_only())
        .field(FieldConfig::links())
        .endpoint("list", &[Get, Post], "/v1/instances/{instance_name}/webhooks/")
        .endpoint(
            "detail",
            &[Get, Put, Patch, Delete],
            "/v1/instances/{instance_name}/webhooks/{name}/",
        )
        .endpoint("run", &[Post], "/v1/instances/{instance_name}/webhooks/{name}/run/")
}

fn trigger() -> ModelConfig {
    timestamps(
        instance_scoped("Trigger")
            .field(FieldConfig::integer("id").primary_key().read_only())
            .field(FieldConfig::string("label").max_length(80))
            .field(FieldConfig::integer("codebox").required())
            .field(FieldConfig::string("class").required().max_length(50))
            .field(FieldConfig::choice("signal", &["post_create", "post_update", "post_delete"]).required())
            .field(FieldConfig::links()),
    )
    .endpoint("list", &[Get, Post], "/v1/instances/{instance_name}/triggers/")
    .endpoint(
        "detail",
        &[Get, Put, Patch, Delete],
        "/v1/instances/{instance_name}/triggers/{id}/",
    )
}

fn coupon() -> ModelConfig {
    ModelConfig::new("Coupon")
        .field(FieldConfig::string("name").primary_key().required().max_length(32))
        .field(FieldConfig::date("redeem_by").required())
        .field(FieldConfig::integer("percent_off"))
        .field(FieldConfig::float("amount_off"))
        .field(FieldConfig::choice("currency", &["usd"]).default(json!("usd")))
        .field(FieldConfig::integer("duration").default(json!(0)))
        .field(FieldConfig::links())
        .endpoint("list", &[Get, Post], "/v1/billing/coupons/")
        .endpoint("detail", &[Get, Delete], "/v1/billing/coupons/{name}/")
}

fn discount() -> ModelConfig {
    ModelConfig::new("Discount")
        .field(FieldConfig::integer("id").primary_key().read_only())
        .field(FieldConfig::model("instance", "Instance").just_pk())
        .field(FieldConfig::model("coupon", "Coupon").just_pk())
        .field(FieldConfig::date("start").read_only())
        .field(FieldConfig::date("end").read_only())
        .field(FieldConfig::links())
        .endpoint("list", &[Get, Post], "/v1/billing/discounts/")
        .endpoint("detail", &[Get], "/v1/billing/discounts/{id}/")
}

/// Every built-in model. Merge custom declarations on top with [`FullConfig::merge`].
pub fn builtin_config() -> FullConfig {
    FullConfig {
        models: vec![
            instance(),
            admin(),
            api_key(),
            class(),
            object(),
            channel(),
            message(),
            group(),
            user(),
            codebox(),
            webhook(),
            trigger(),
            coupon(),
            discount(),
        ],
    }
}

impl Model {
    /// Execute a CodeBox or Webhook and return the raw trace/result payload.
    pub async fn run(&self, payload: Value) -> Result<Value> {
        self.call_endpoint("run", Post, Some(json!({ "payload": payload })))
            .await
    }

    /// Issue a new key for an ApiKey or User.
    pub async fn reset_key(&mut self) -> Result<&mut Self> {
        let value = self.call_endpoint("reset_key", Post, None).await?;
        self.to_python(&value)?;
        Ok(self)
    }
}
