use chrono::{DateTime, Utc};

use super::role::Role;

#[derive(Debug, Clone)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    /// Present only for supplier accounts
    pub supplier_id: Option<u64>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub user_id: u64,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

/// Usernames are unique case-insensitively; they are stored normalized.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}
