//! Group membership helpers on `Group` and `User` records.

use serde_json::{json, Value};

use crate::config::{Method, Properties};
use crate::connection::Request;
use crate::error::{Error, Result};
use crate::fields::FieldValue;
use crate::model::Model;
use crate::response::{parse, Page};

/// Membership payloads wrap the member (`{"user": {...}}`); accept either form.
fn unwrap_member(value: Value, key: &str) -> Value {
    match value.get(key) {
        Some(inner @ Value::Object(_)) => inner.clone(),
        _ => value,
    }
}

impl Model {
    async fn membership_request(
        &self,
        endpoint: &str,
        method: Method,
        member: Option<(&str, FieldValue)>,
        body: Option<Value>,
        not_found: Error,
    ) -> Result<Value> {
        self.options().check_method(endpoint, method)?;
        let mut properties = self.get_endpoint_data();
        if let Some((key, value)) = member {
            if let Some(v) = value.as_property() {
                properties.insert(key.to_string(), v);
            }
        }
        let path = self.options().resolve_endpoint(endpoint, &properties)?;
        let mut request = Request::new(method, path);
        if let Some(body) = body {
            request = request.data(body);
        }
        self.session()
            .request(request)
            .await
            .map_err(|e| if e.is_not_found() { not_found } else { e.into() })
    }

    fn member(&self, model: &str, key: &str, value: Value) -> Result<Model> {
        let options = self.session().options_for(model)?;
        let properties: Properties = self
            .get_endpoint_data()
            .into_iter()
            .filter(|(k, _)| k == "instance_name")
            .collect();
        Ok(Model::from_response(
            self.session().clone(),
            options,
            properties,
            &unwrap_member(value, key),
        )?)
    }

    async fn members(&self, endpoint: &str, model: &str, key: &str, not_found: Error) -> Result<Vec<Model>> {
        let mut page: Page = parse(
            self.membership_request(endpoint, Method::Get, None, None, not_found)
                .await?,
        )?;
        let mut out = Vec::new();
        loop {
            for item in std::mem::take(&mut page.objects) {
                out.push(self.member(model, key, item)?);
            }
            let Some(next) = page.next.take().filter(|n| !n.is_empty()) else {
                break;
            };
            page = parse(self.session().request(Request::new(Method::Get, next)).await?)?;
        }
        Ok(out)
    }

    // Group side

    pub async fn list_users(&self) -> Result<Vec<Model>> {
        self.members("users", "User", "user", Error::GroupNotFound).await
    }

    pub async fn add_user(&self, user_id: impl Into<FieldValue>) -> Result<Model> {
        let body = json!({ "user": user_id.into().to_json() });
        let value = self
            .membership_request("users", Method::Post, None, Some(body), Error::UserNotFound)
            .await?;
        self.member("User", "user", value)
    }

    pub async fn user_details(&self, user_id: impl Into<FieldValue>) -> Result<Model> {
        let value = self
            .membership_request(
                "user_detail",
                Method::Get,
                Some(("user_id", user_id.into())),
                None,
                Error::UserNotFound,
            )
            .await?;
        self.member("User", "user", value)
    }

    pub async fn remove_user(&self, user_id: impl Into<FieldValue>) -> Result<()> {
        self.membership_request(
            "user_detail",
            Method::Delete,
            Some(("user_id", user_id.into())),
            None,
            Error::UserNotFound,
        )
        .await?;
        Ok(())
    }

    // User side

    pub async fn list_groups(&self) -> Result<Vec<Model>> {
        self.members("groups", "Group", "group", Error::UserNotFound).await
    }

    pub async fn add_to_group(&self, group_id: impl Into<FieldValue>) -> Result<Model> {
        let body = json!({ "group": group_id.into().to_json() });
        let value = self
            .membership_request("groups", Method::Post, None, Some(body), Error::GroupNotFound)
            .await?;
        self.member("Group", "group", value)
    }

    pub async fn group_details(&self, group_id: impl Into<FieldValue>) -> Result<Model> {
        let value = self
            .membership_request(
                "group_detail",
                Method::Get,
                Some(("group_id", group_id.into())),
                None,
                Error::GroupNotFound,
            )
            .await?;
        self.member("Group", "group", value)
    }

    pub async fn remove_from_group(&self, group_id: impl Into<FieldValue>) -> Result<()> {
        self.membership_request(
            "group_detail",
            Method::Delete,
            Some(("group_id", group_id.into())),
            None,
            Error::GroupNotFound,
        )
        .await?;
        Ok(())
    }
}
