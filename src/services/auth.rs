//! Authentication, account creation and the authorization port

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use std::sync::Arc;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{
        Actor, CreateUser, LoginRequest, LoginResponse, NewUser, Permission, User, UserClaims,
    },
    repository::{SharedStore, UserStore},
};

/// Decides whether an actor may perform an operation
#[cfg_attr(test, mockall::automock)]
pub trait Authorizer: Send + Sync {
    /// `PermissionDenied` unless `actor` holds `permission`
    fn require(&self, actor: &Actor, permission: Permission) -> AppResult<()>;
}

/// Checks the permission set carried by the actor
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissionSetAuthorizer;

impl Authorizer for PermissionSetAuthorizer {
    fn require(&self, actor: &Actor, permission: Permission) -> AppResult<()> {
        if actor.has(permission) {
            return Ok(());
        }
        tracing::warn!(
            user_id = actor.user_id,
            username = %actor.username,
            %permission,
            "Permission denied"
        );
        Err(AppError::PermissionDenied(format!(
            "Requires the {} permission",
            permission
        )))
    }
}

pub type SharedAuthorizer = Arc<dyn Authorizer>;

#[derive(Clone)]
pub struct AuthService {
    store: SharedStore,
    authorizer: SharedAuthorizer,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(store: SharedStore, authorizer: SharedAuthorizer, config: AuthConfig) -> Self {
        Self { store, authorizer, config }
    }

    /// Authenticate by username and password and issue a JWT
    pub async fn login(&self, request: LoginRequest) -> AppResult<LoginResponse> {
        request.validate()?;

        let user = self
            .store
            .find_user_by_username(&request.username)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid username or password".to_string()))?;

        if !self.verify_password(&user, &request.password)? {
            tracing::warn!(username = %request.username, "Failed login attempt");
            return Err(AppError::Authentication("Invalid username or password".to_string()));
        }

        let token = self.create_token_for_user(&user)?;
        tracing::info!(user_id = user.id, "User logged in");

        Ok(LoginResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.jwt_expiration_hours as i64 * 3600,
            user,
        })
    }

    fn create_token_for_user(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let exp = now + (self.config.jwt_expiration_hours as i64 * 3600);

        let claims = UserClaims {
            sub: user.username.clone(),
            user_id: user.id,
            permissions: user.permissions.clone(),
            exp,
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password_hash)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    /// Account of the current actor
    pub async fn me(&self, actor: &Actor) -> AppResult<User> {
        self.store.get_user(actor.user_id).await
    }

    /// Create an account (requires `add_user`). The new account may only
    /// receive permissions the creator holds.
    pub async fn create_user(&self, actor: &Actor, request: CreateUser) -> AppResult<User> {
        self.authorizer.require(actor, Permission::AddUser)?;
        for permission in &request.permissions {
            self.authorizer.require(actor, *permission)?;
        }
        request.validate()?;

        let mut permissions = request.permissions;
        permissions.sort_by_key(|p| p.as_str());
        permissions.dedup();

        let user = self
            .store
            .create_user(&NewUser {
                username: request.username,
                password_hash: self.hash_password(&request.password)?,
                first_name: request.first_name,
                last_name: request.last_name,
                permissions,
            })
            .await?;

        tracing::info!(user_id = user.id, created_by = actor.user_id, "User created");
        Ok(user)
    }

    /// Create the configured bootstrap account if its username is free.
    /// Returns the account when one was created.
    pub async fn ensure_bootstrap_admin(&self) -> AppResult<Option<User>> {
        let Some(admin) = &self.config.bootstrap_admin else {
            return Ok(None);
        };

        if self.store.find_user_by_username(&admin.username).await?.is_some() {
            tracing::debug!(username = %admin.username, "Bootstrap account already exists");
            return Ok(None);
        }

        let user = self
            .store
            .create_user(&NewUser {
                username: admin.username.clone(),
                password_hash: self.hash_password(&admin.password)?,
                first_name: String::new(),
                last_name: String::new(),
                permissions: Permission::ALL.to_vec(),
            })
            .await?;

        tracing::info!(user_id = user.id, username = %user.username, "Bootstrap account created");
        Ok(Some(user))
    }
}
