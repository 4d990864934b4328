use async_trait::async_trait;
use axum::http::header;
use dashmap::DashMap;
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::config::{AuthorizeConfig, Env};
use crate::context::RequestContext;
use crate::error::{AuthorizeError, AuthorizeResult};
use crate::menu::MenuNode;
use crate::permission::{self, PermissionFlags};

/// Claims
///
/// Payload of the bearer tokens this layer accepts.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id looked up in the `UserDirectory`.
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
}

/// User
///
/// A resolved caller and the rights granted to them, keyed by menu full name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Administrators hold every bit on every node.
    pub is_admin: bool,
    pub rights: BTreeMap<String, PermissionFlags>,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn admin(mut self) -> Self {
        self.is_admin = true;
        self
    }

    pub fn grant(mut self, full_name: impl Into<String>, flags: PermissionFlags) -> Self {
        *self.rights.entry(full_name.into()).or_default() |= flags;
        self
    }

    /// Rights held on `node`.
    pub fn rights(&self, node: &MenuNode) -> PermissionFlags {
        if self.is_admin {
            return PermissionFlags::from_bits_retain(u32::MAX);
        }
        self.rights
            .get(&node.full_name)
            .copied()
            .unwrap_or(PermissionFlags::NONE)
    }

    pub fn has(&self, node: &MenuNode, required: PermissionFlags) -> bool {
        permission::has(self.rights(node), required)
    }
}

/// UserDirectory
///
/// Where identities are looked up once a token has been validated.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, id: Uuid) -> Option<User>;
    async fn find_by_name(&self, name: &str) -> Option<User>;
}

pub type UserDirectoryState = Arc<dyn UserDirectory>;

/// InMemoryUserDirectory
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: DashMap<Uuid, User>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, user: User) -> Uuid {
        let id = user.id;
        self.users.insert(id, user);
        id
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_user(&self, id: Uuid) -> Option<User> {
        self.users.get(&id).map(|u| u.value().clone())
    }

    async fn find_by_name(&self, name: &str) -> Option<User> {
        self.users
            .iter()
            .find(|u| u.name == name)
            .map(|u| u.value().clone())
    }
}

/// IdentityResolver
///
/// Resolves the current caller of a request. Failing to identify the caller is
/// not an error: it yields `None` and the pipeline redirects to login.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn current_user(&self, ctx: &RequestContext) -> AuthorizeResult<Option<User>>;
}

pub type IdentityState = Arc<dyn IdentityResolver>;

/// BearerIdentityResolver
///
/// 1. Local bypass: in `Env::Local` an `x-user-id` header naming a known user logs in.
/// 2. Otherwise an `Authorization: Bearer <jwt>` header is decoded with the
///    configured secret, expiry enforced.
/// 3. The token subject must still exist in the directory.
pub struct BearerIdentityResolver {
    directory: UserDirectoryState,
    config: AuthorizeConfig,
}

impl BearerIdentityResolver {
    pub fn new(directory: UserDirectoryState, config: AuthorizeConfig) -> Self {
        Self { directory, config }
    }

    async fn local_bypass(&self, ctx: &RequestContext) -> Option<User> {
        if self.config.env != Env::Local {
            return None;
        }
        let id = ctx
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())?;
        self.directory.get_user(id).await
    }
}

#[async_trait]
impl IdentityResolver for BearerIdentityResolver {
    async fn current_user(&self, ctx: &RequestContext) -> AuthorizeResult<Option<User>> {
        if let Some(user) = self.local_bypass(ctx).await {
            return Ok(Some(user));
        }

        let Some(token) = ctx
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
        else {
            return Ok(None);
        };

        let key = DecodingKey::from_secret(self.config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let claims = match decode::<Claims>(token, &key, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                match e.kind() {
                    ErrorKind::ExpiredSignature => tracing::debug!("bearer token expired"),
                    kind => tracing::debug!(?kind, "bearer token rejected"),
                }
                return Ok(None);
            }
        };

        // The token may outlive the account.
        Ok(self.directory.get_user(claims.sub).await)
    }
}

/// Signs a bearer token for `user_id`, valid for `ttl_secs`.
pub fn issue_token(secret: &str, user_id: Uuid, ttl_secs: u64) -> AuthorizeResult<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AuthorizeError::Config(e.to_string()))?
        .as_secs();

    let claims = Claims {
        sub: user_id,
        iat: now as usize,
        exp: (now + ttl_secs) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthorizeError::Config(format!("cannot sign token: {e}")))
}
