use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use sqlx::FromRow;

use super::{MySqlStore, conflict_or_backend, suppliers::fetch_supplier};
use crate::model::non_blank;
use crate::model::role::Role;
use crate::model::supplier::{NewSupplier, Supplier};
use crate::model::user::{NewUser, RefreshToken, User, normalize_username};
use crate::store::{StoreError, StoreResult, TokenStore, UserStore};

#[derive(FromRow)]
struct UserRow {
    id: u64, // BIGINT UNSIGNED
    username: String,
    password_hash: String,
    role_id: u8,
    supplier_id: Option<u64>,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> StoreResult<Self> {
        let role = Role::from_id(row.role_id)
            .ok_or_else(|| StoreError::Backend(format!("unknown role id {}", row.role_id)))?;
        Ok(User {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            role,
            supplier_id: row.supplier_id,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
        })
    }
}

const USER_COLUMNS: &str =
    "id, username, password_hash, role_id, supplier_id, last_login_at, created_at";

impl MySqlStore {
    async fn fetch_user(&self, id: u64) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }
}

#[async_trait]
impl UserStore for MySqlStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, password_hash, role_id, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(normalize_username(&user.username))
        .bind(&user.password_hash)
        .bind(user.role.id())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_backend(e, "Username already exists"))?;

        self.fetch_user(result.last_insert_id())
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn create_supplier_account(
        &self,
        user: NewUser,
        supplier: NewSupplier,
    ) -> StoreResult<(User, Supplier)> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let supplier_id = sqlx::query(
            r#"
            INSERT INTO suppliers
                (company_name, contact_name, email, phone, address, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 'active', ?, ?)
            "#,
        )
        .bind(supplier.company_name.trim())
        .bind(supplier.contact_name.trim())
        .bind(supplier.email.trim())
        .bind(non_blank(supplier.phone.as_deref()))
        .bind(non_blank(supplier.address.as_deref()))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_id();

        let user_id = sqlx::query(
            r#"
            INSERT INTO users (username, password_hash, role_id, supplier_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(normalize_username(&user.username))
        .bind(&user.password_hash)
        .bind(user.role.id())
        .bind(supplier_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_or_backend(e, "Username already exists"))?
        .last_insert_id();

        sqlx::query("UPDATE suppliers SET user_id = ? WHERE id = ?")
            .bind(user_id)
            .bind(supplier_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let user = self.fetch_user(user_id).await?.ok_or(StoreError::NotFound)?;
        let supplier = fetch_supplier(&self.pool, supplier_id)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok((user, supplier))
    }

    async fn find_user(&self, id: u64) -> StoreResult<Option<User>> {
        self.fetch_user(id).await
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(normalize_username(username))
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn username_exists(&self, username: &str) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ? LIMIT 1)",
        )
        .bind(normalize_username(username))
        .fetch_one(&self.pool)
        .await?;
        Ok(exists != 0)
    }

    async fn record_login(&self, user_id: u64, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
            .bind(at)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_password_hash(&self, user_id: u64, password_hash: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn usernames(&self) -> BoxStream<'_, StoreResult<String>> {
        sqlx::query_scalar::<_, String>("SELECT username FROM users")
            .fetch(&self.pool)
            .map_err(StoreError::from)
            .boxed()
    }

    fn usernames_active_since(&self, since: DateTime<Utc>) -> BoxStream<'_, StoreResult<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT username
            FROM users
            WHERE last_login_at >= ?
            ORDER BY last_login_at DESC
            "#,
        )
        .bind(since)
        .fetch(&self.pool)
        .map_err(StoreError::from)
        .boxed()
    }
}

#[async_trait]
impl TokenStore for MySqlStore {
    async fn save_refresh_token(&self, token: RefreshToken) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, jti, expires_at, revoked)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(token.user_id)
        .bind(&token.jti)
        .bind(token.expires_at)
        .bind(token.revoked)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn revoke_refresh_token(&self, jti: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE
            WHERE jti = ?
            AND revoked = FALSE
            "#,
        )
        .bind(jti)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn revoke_user_tokens(&self, user_id: u64) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = ? AND revoked = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
