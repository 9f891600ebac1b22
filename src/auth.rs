//! Authorization glue for GraphQL resolvers.
//!
//! Provides helpers for:
//! - Extracting user and company ids from gateway HTTP headers
//! - Querying the user-management service for session state and permissions
//! - Guard functions resolvers call before doing protected work
//!
//! Permission data never lives in this crate; every check is a call to the
//! user-management service using the cookies from the incoming request.

use std::collections::BTreeSet;

use async_graphql::Context;
use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{GraphQLError, Result};

/// Default in-cluster address of the user-management service.
pub const DEFAULT_USER_MANAGEMENT_URL: &str = "http://user-management:8000";

pub const PERMISSION_DENIED_MSG: &str = "Permission Denied.";
pub const LOGIN_REQUIRED_MSG: &str = "Permission Denied. Please log in first.";

/// The current user's id, injected into the GraphQL context by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);

/// The current session's company id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompanyId(pub Uuid);

/// Extract the user id from the `x-user-id` header.
pub fn extract_user_id(headers: &HeaderMap) -> Option<UserId> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .map(UserId)
}

/// Extract the company id from the `x-company-id` header.
pub fn extract_company_id(headers: &HeaderMap) -> Option<CompanyId> {
    headers
        .get("x-company-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .map(CompanyId)
}

/// Get the user id from a GraphQL context.
pub fn get_user_id(ctx: &Context<'_>) -> Option<UserId> {
    ctx.data_opt::<UserId>().copied()
}

/// Get the company id from a GraphQL context.
pub fn get_company_id(ctx: &Context<'_>) -> Option<CompanyId> {
    ctx.data_opt::<CompanyId>().copied()
}

/// What the current session is allowed to do, as reported by the
/// user-management service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPermissions {
    pub activities: BTreeSet<String>,
    pub is_staff: bool,
    pub is_superuser: bool,
}

#[derive(Deserialize)]
struct RolesPayload {
    activities: Vec<String>,
    user: UserAttributes,
}

#[derive(Deserialize)]
struct UserAttributes {
    #[serde(default)]
    is_staff: bool,
    #[serde(default)]
    is_superuser: bool,
}

impl From<RolesPayload> for UserPermissions {
    fn from(payload: RolesPayload) -> Self {
        Self {
            activities: payload.activities.into_iter().collect(),
            is_staff: payload.user.is_staff,
            is_superuser: payload.user.is_superuser,
        }
    }
}

/// Session-state queries against the user-management service.
///
/// Implemented by [`UserManagementClient`] for production and by
/// [`crate::testing::StaticPermissions`] in tests.
#[async_trait]
pub trait PermissionsApi: Send + Sync {
    /// Whether the session identified by `cookies` is logged in.
    async fn is_authenticated(&self, cookies: &str) -> Result<bool>;

    /// The activities and user traits of the session.
    async fn user_permissions(&self, cookies: &str) -> Result<UserPermissions>;
}

/// HTTP client for the user-management service.
///
/// `cookies` arguments are the raw `Cookie` header of the incoming request,
/// forwarded as-is so user-management sees the caller's session.
#[derive(Debug, Clone)]
pub struct UserManagementClient {
    base_url: String,
    http: reqwest::Client,
}

impl Default for UserManagementClient {
    fn default() -> Self {
        Self::new(DEFAULT_USER_MANAGEMENT_URL)
    }
}

impl UserManagementClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    async fn get_json(&self, path: &str, cookies: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.get(&url);
        if !cookies.is_empty() {
            request = request.header(reqwest::header::COOKIE, cookies);
        }
        let response = request.send().await?.error_for_status()?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.starts_with("application/json") {
            return Err(GraphQLError::Upstream(format!(
                "Invalid content-type '{}' returned",
                content_type
            )));
        }

        Ok(response.json().await?)
    }

    /// The company payload for the current session.
    pub async fn session_company(&self, cookies: &str) -> Result<Value> {
        self.get_json("/api/session_company/", cookies).await
    }

    /// Convenience accessor for the company id of the current session.
    pub async fn session_company_id(&self, cookies: &str) -> Result<i64> {
        let payload = self.session_company(cookies).await?;
        payload["company"]["id"].as_i64().ok_or_else(|| {
            GraphQLError::Upstream("session_company response missing company id".to_string())
        })
    }
}

#[async_trait]
impl PermissionsApi for UserManagementClient {
    async fn is_authenticated(&self, cookies: &str) -> Result<bool> {
        let payload = self.get_json("/api/user_is_authenticated/", cookies).await?;
        Ok(payload["isAuthenticated"].as_bool().unwrap_or(false))
    }

    async fn user_permissions(&self, cookies: &str) -> Result<UserPermissions> {
        let payload = self.get_json("/api/get_user_roles/", cookies).await?;
        let roles: RolesPayload = serde_json::from_value(payload).map_err(|e| {
            GraphQLError::Upstream(format!("Malformed get_user_roles response: {}", e))
        })?;
        Ok(roles.into())
    }
}

/// What a protected operation requires of the current session.
#[derive(Debug, Clone, Default)]
pub struct ActivityRequirement {
    activities: BTreeSet<String>,
    require_staff: bool,
    require_superuser: bool,
}

impl ActivityRequirement {
    pub fn new<I, S>(activities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            activities: activities.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Additionally require the user to be staff.
    pub fn staff(mut self) -> Self {
        self.require_staff = true;
        self
    }

    /// Additionally require the user to be a superuser.
    pub fn superuser(mut self) -> Self {
        self.require_superuser = true;
        self
    }

    /// Check the requirement against a set of permissions.
    pub fn check(&self, permissions: &UserPermissions) -> Result<()> {
        let missing: Vec<&str> = self
            .activities
            .difference(&permissions.activities)
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            let noun = if missing.len() > 1 { "activities" } else { "activity" };
            return Err(GraphQLError::PermissionDenied(format!(
                "Missing required {}: {}",
                noun,
                missing.join(", ")
            )));
        }
        if self.require_staff && !permissions.is_staff {
            return Err(GraphQLError::PermissionDenied(
                "User must be staff to take this action".to_string(),
            ));
        }
        if self.require_superuser && !permissions.is_superuser {
            return Err(GraphQLError::PermissionDenied(
                "User must be a superuser to take this action".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fail with `PermissionDenied` unless the session is logged in.
///
/// Any failure talking to user-management is also reported as a permission
/// error; an unreachable authority must deny, not allow.
pub async fn require_authentication(api: &dyn PermissionsApi, cookies: &str) -> Result<()> {
    let authenticated = api
        .is_authenticated(cookies)
        .await
        .map_err(|_| GraphQLError::PermissionDenied(LOGIN_REQUIRED_MSG.to_string()))?;
    if !authenticated {
        return Err(GraphQLError::PermissionDenied(LOGIN_REQUIRED_MSG.to_string()));
    }
    Ok(())
}

/// Fail with `PermissionDenied` unless the session satisfies `requirement`.
pub async fn require_activities(
    api: &dyn PermissionsApi,
    cookies: &str,
    requirement: &ActivityRequirement,
) -> Result<()> {
    let permissions = api
        .user_permissions(cookies)
        .await
        .map_err(|_| GraphQLError::PermissionDenied(PERMISSION_DENIED_MSG.to_string()))?;
    requirement.check(&permissions)
}
