//! User accounts, permissions and JWT claims

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

pub type UserId = i32;

/// Capability checked before a management or loan operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    AddGenre,
    ChangeGenre,
    DeleteGenre,
    AddLanguage,
    ChangeLanguage,
    DeleteLanguage,
    AddAuthor,
    ChangeAuthor,
    DeleteAuthor,
    AddBook,
    ChangeBook,
    DeleteBook,
    AddBookinstance,
    ChangeBookinstance,
    DeleteBookinstance,
    /// Checkout, renew and return copies, and see every active loan
    CanMarkReturned,
    AddUser,
}

impl Permission {
    pub const ALL: [Permission; 17] = [
        Permission::AddGenre,
        Permission::ChangeGenre,
        Permission::DeleteGenre,
        Permission::AddLanguage,
        Permission::ChangeLanguage,
        Permission::DeleteLanguage,
        Permission::AddAuthor,
        Permission::ChangeAuthor,
        Permission::DeleteAuthor,
        Permission::AddBook,
        Permission::ChangeBook,
        Permission::DeleteBook,
        Permission::AddBookinstance,
        Permission::ChangeBookinstance,
        Permission::DeleteBookinstance,
        Permission::CanMarkReturned,
        Permission::AddUser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::AddGenre => "add_genre",
            Permission::ChangeGenre => "change_genre",
            Permission::DeleteGenre => "delete_genre",
            Permission::AddLanguage => "add_language",
            Permission::ChangeLanguage => "change_language",
            Permission::DeleteLanguage => "delete_language",
            Permission::AddAuthor => "add_author",
            Permission::ChangeAuthor => "change_author",
            Permission::DeleteAuthor => "delete_author",
            Permission::AddBook => "add_book",
            Permission::ChangeBook => "change_book",
            Permission::DeleteBook => "delete_book",
            Permission::AddBookinstance => "add_bookinstance",
            Permission::ChangeBookinstance => "change_bookinstance",
            Permission::DeleteBookinstance => "delete_bookinstance",
            Permission::CanMarkReturned => "can_mark_returned",
            Permission::AddUser => "add_user",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("Invalid permission: {}", s))
    }
}

/// Internal row structure for database queries
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    id: i32,
    username: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    permissions: Vec<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let permissions = row
            .permissions
            .iter()
            .filter_map(|p| match p.parse() {
                Ok(permission) => Some(permission),
                Err(e) => {
                    tracing::warn!("Ignoring stored permission on user {}: {}", row.id, e);
                    None
                }
            })
            .collect();

        User {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            permissions,
        }
    }
}

/// User account (borrower and/or librarian)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// Argon2 PHC string
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub permissions: Vec<Permission>,
}

/// User to insert, password already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub permissions: Vec<Permission>,
}

/// Create user request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[validate(length(min = 3, max = 150, message = "Username must be 3-150 characters"))]
    pub username: String,
    #[validate(length(min = 4, message = "Password must be at least 4 characters"))]
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// Login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    /// Token lifetime in seconds
    pub expires_in: i64,
    pub user: User,
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: UserId,
    pub permissions: Vec<Permission>,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }
}

/// The caller of an operation, as seen by the authorization port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Actor {
    pub user_id: UserId,
    pub username: String,
    #[schema(value_type = Vec<Permission>)]
    pub permissions: HashSet<Permission>,
}

impl Actor {
    pub fn new(user_id: UserId, username: impl Into<String>, permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            user_id,
            username: username.into(),
            permissions: permissions.into_iter().collect(),
        }
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

impl From<UserClaims> for Actor {
    fn from(claims: UserClaims) -> Self {
        Actor::new(claims.user_id, claims.sub, claims.permissions)
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Actor::new(user.id, user.username.clone(), user.permissions.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_codenames_round_trip() {
        for permission in Permission::ALL {
            let parsed: Permission = permission.as_str().parse().unwrap();
            assert_eq!(parsed, permission);
            let json = serde_json::to_value(permission).unwrap();
            assert_eq!(json, permission.as_str());
        }
        assert!("can_fly".parse::<Permission>().is_err());
    }

    #[test]
    fn test_token_carries_permissions() {
        let now = chrono::Utc::now().timestamp();
        let claims = UserClaims {
            sub: "librarian".to_string(),
            user_id: 5,
            permissions: vec![Permission::CanMarkReturned],
            exp: now + 3600,
            iat: now,
        };
        let token = claims.create_token("secret").unwrap();
        assert!(UserClaims::from_token(&token, "other-secret").is_err());

        let actor = Actor::from(UserClaims::from_token(&token, "secret").unwrap());
        assert_eq!(actor.user_id, 5);
        assert!(actor.has(Permission::CanMarkReturned));
        assert!(!actor.has(Permission::AddBook));
    }

    #[test]
    fn test_unknown_stored_permission_is_dropped() {
        let row = UserRow {
            id: 1,
            username: "u".to_string(),
            password_hash: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            permissions: vec!["add_book".to_string(), "legacy_flag".to_string()],
        };
        let user = User::from(row);
        assert_eq!(user.permissions, vec![Permission::AddBook]);
    }
}
