use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::error::{ConsoleError, Result};
use crate::models::{Permission, Role};

/// One page of the remote role list as the server reported it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RolePage {
    pub roles: Vec<Role>,
    /// Total number of roles across all pages, when the server says.
    pub total: Option<u64>,
}

/// Remote operations the role directory depends on.
pub trait RoleService {
    fn list_roles(&self, skip: u32, limit: u32) -> Result<RolePage>;
    fn list_permissions(&self) -> Result<Vec<Permission>>;
    fn add_role(&self, name: &str, permission_keys: &[String]) -> Result<()>;
    fn update_role(&self, id: &str, name: &str, permission_keys: &[String]) -> Result<()>;
    fn delete_role(&self, id: &str) -> Result<()>;
}

/// What a successful login hands back.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginGrant {
    pub token: String,
    pub user: Value,
}

pub struct HrApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HrApi {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("hrconsole/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(&self) -> Result<&str> {
        self.token.as_deref().ok_or(ConsoleError::MissingCredential)
    }

    fn authorized(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        Ok(req.bearer_auth(self.bearer()?))
    }

    /// Send a request and return its JSON body, turning non-2xx answers into
    /// `ConsoleError::Server` carrying the server's message.
    fn send(&self, req: RequestBuilder, fallback: &str) -> Result<Value> {
        let resp = req.send()?;
        let status = resp.status();
        let text = resp.text()?;
        log::debug!("response {status} ({} bytes)", text.len());

        let body: Option<Value> = if text.trim().is_empty() {
            Some(Value::Null)
        } else {
            serde_json::from_str(&text).ok()
        };

        if !status.is_success() {
            let msg = error_message(status, body.as_ref(), fallback);
            log::warn!("request failed: {msg}");
            return Err(ConsoleError::Server(msg));
        }
        body.ok_or_else(|| {
            ConsoleError::Server(format!(
                "Invalid response from server: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or_default()
            ))
        })
    }

    pub fn login(&self, email: &str, password: &str) -> Result<LoginGrant> {
        log::debug!("POST /user/login for {email}");
        let req = self
            .client
            .post(self.url("/user/login"))
            .json(&json!({ "email": email, "password": password }));
        let body = self.send(req, "Login failed")?;
        parse_login(&body)
    }

    pub fn forgot_password(&self, email: &str) -> Result<String> {
        log::debug!("POST /user/forgot-password for {email}");
        let req = self
            .client
            .post(self.url("/user/forgot-password"))
            .json(&json!({ "email": email }));
        let body = self.send(req, "Failed to send reset email")?;
        Ok(message_or(&body, "Password reset email sent successfully!"))
    }

    pub fn reset_password(&self, reset_token: &str, password: &str) -> Result<String> {
        log::debug!("POST /user/reset-password");
        let req = self
            .client
            .post(self.url("/user/reset-password"))
            .json(&json!({ "token": reset_token, "password": password }));
        let body = self.send(req, "Failed to reset password")?;
        Ok(message_or(&body, "Password reset successfully!"))
    }
}

impl RoleService for HrApi {
    fn list_roles(&self, skip: u32, limit: u32) -> Result<RolePage> {
        log::debug!("GET /role/list skip={skip} limit={limit}");
        let req = self.authorized(
            self.client
                .get(self.url("/role/list"))
                .query(&[("skip", skip), ("limit", limit)]),
        )?;
        let body = self.send(req, "Failed to fetch roles")?;
        Ok(parse_role_page(&body))
    }

    fn list_permissions(&self) -> Result<Vec<Permission>> {
        log::debug!("GET /permission/list");
        let req = self.authorized(self.client.get(self.url("/permission/list")))?;
        let body = self.send(req, "Failed to fetch permissions")?;
        Ok(parse_permissions(&body))
    }

    fn add_role(&self, name: &str, permission_keys: &[String]) -> Result<()> {
        log::debug!("POST /role/add {name}");
        let req = self.authorized(
            self.client
                .post(self.url("/role/add"))
                .json(&json!({ "roleName": name, "permissionKeys": permission_keys })),
        )?;
        self.send(req, "Failed to add role")?;
        Ok(())
    }

    fn update_role(&self, id: &str, name: &str, permission_keys: &[String]) -> Result<()> {
        log::debug!("PUT /role/update/{id}");
        let req = self.authorized(
            self.client
                .put(self.url(&format!("/role/update/{id}")))
                .json(&json!({ "roleName": name, "permissionKeys": permission_keys })),
        )?;
        self.send(req, "Failed to update role")?;
        Ok(())
    }

    fn delete_role(&self, id: &str) -> Result<()> {
        log::debug!("DELETE /role/delete/{id}");
        let req = self.authorized(self.client.delete(self.url(&format!("/role/delete/{id}"))))?;
        self.send(req, "Failed to delete role")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Envelope parsing
// ---------------------------------------------------------------------------

pub(crate) fn error_message(status: StatusCode, body: Option<&Value>, fallback: &str) -> String {
    match body {
        None => format!("Server error: {}", status.as_u16()),
        Some(v) => v
            .get("message")
            .or_else(|| v.get("error"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(fallback)
            .to_string(),
    }
}

fn message_or(body: &Value, default: &str) -> String {
    body.get("message")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_string()
}

pub(crate) fn parse_login(body: &Value) -> Result<LoginGrant> {
    let token = [
        body.get("token"),
        body.pointer("/data/token"),
        body.pointer("/user/token"),
    ]
    .into_iter()
    .flatten()
    .find_map(|t| t.as_str().filter(|s| !s.is_empty()))
    .ok_or_else(|| ConsoleError::Server("Token not received".to_string()))?;

    let user = body
        .get("user")
        .or_else(|| body.pointer("/data/user"))
        .filter(|u| !u.is_null())
        .unwrap_or(body)
        .clone();

    Ok(LoginGrant {
        token: token.to_string(),
        user,
    })
}

pub(crate) fn parse_role_page(body: &Value) -> RolePage {
    let items = body
        .pointer("/data/roles")
        .and_then(Value::as_array)
        .or_else(|| body.get("data").and_then(Value::as_array))
        .or_else(|| body.as_array());

    let roles = items
        .map(|arr| {
            arr.iter()
                .filter_map(|v| {
                    let role = Role::from_value(v);
                    if role.is_none() {
                        log::warn!("skipping role without an id: {v}");
                    }
                    role
                })
                .collect()
        })
        .unwrap_or_default();

    let total = [
        body.pointer("/data/totalCount"),
        body.pointer("/data/total"),
        body.get("totalCount"),
        body.get("total"),
    ]
    .into_iter()
    .flatten()
    .find_map(|v| v.as_u64().filter(|n| *n > 0));

    RolePage { roles, total }
}

pub(crate) fn parse_permissions(body: &Value) -> Vec<Permission> {
    body.pointer("/data/permission")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Permission::from_value).collect())
        .unwrap_or_default()
}
