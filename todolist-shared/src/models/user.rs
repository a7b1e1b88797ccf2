/// User model and database operations
///
/// This module provides the User model and the PostgreSQL queries behind the
/// account, profile and OTP flows.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     first_name VARCHAR(30) NOT NULL,
///     last_name VARCHAR(30) NOT NULL,
///     email VARCHAR(255) NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     role user_role NOT NULL DEFAULT 'user',
///     is_account_verified BOOLEAN NOT NULL DEFAULT FALSE,
///     verify_otp VARCHAR(255),
///     verify_otp_expires_at TIMESTAMPTZ,
///     reset_otp VARCHAR(255),
///     reset_otp_expires_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use todolist_shared::models::user::{CreateUser, User, UserRole};
/// use todolist_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     first_name: "Ada".to_string(),
///     last_name: "Lovelace".to_string(),
///     email: "ada@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     role: UserRole::User,
/// }).await?;
///
/// let found = User::find_by_email(&pool, "ada@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, first_name, last_name, email, password_hash, role, \
     is_account_verified, verify_otp, verify_otp_expires_at, reset_otp, \
     reset_otp_expires_at, created_at, updated_at";

/// Account role carried in session tokens and checked by route policies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Regular account, sees only its own todos
    #[default]
    User,

    /// Administrator, may manage every account and todo
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of the two one-time-password slots an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    /// Email verification code (24 hour window)
    Verify,

    /// Password reset code (15 minute window)
    Reset,
}

impl OtpPurpose {
    fn columns(&self) -> (&'static str, &'static str) {
        match self {
            OtpPurpose::Verify => ("verify_otp", "verify_otp_expires_at"),
            OtpPurpose::Reset => ("reset_otp", "reset_otp_expires_at"),
        }
    }
}

/// User account row
///
/// Holds the password hash and both OTP slots, so it is never serialized
/// to clients directly. Use [`PublicUser`] for responses.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    pub first_name: String,

    pub last_name: String,

    /// Unique across all accounts
    pub email: String,

    /// Argon2id PHC string
    pub password_hash: String,

    pub role: UserRole,

    pub is_account_verified: bool,

    /// Argon2id hash of the pending verification code
    pub verify_otp: Option<String>,

    pub verify_otp_expires_at: Option<DateTime<Utc>>,

    /// Argon2id hash of the pending password reset code
    pub reset_otp: Option<String>,

    pub reset_otp_expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Pending OTP stored for one purpose
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredOtp {
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

impl User {
    /// Returns the stored OTP for `purpose`, if both hash and expiry are set
    pub fn otp(&self, purpose: OtpPurpose) -> Option<StoredOtp> {
        let (hash, expires_at) = match purpose {
            OtpPurpose::Verify => (&self.verify_otp, self.verify_otp_expires_at),
            OtpPurpose::Reset => (&self.reset_otp, self.reset_otp_expires_at),
        };

        match (hash, expires_at) {
            (Some(hash), Some(expires_at)) if !hash.is_empty() => Some(StoredOtp {
                hash: hash.clone(),
                expires_at,
            }),
            _ => None,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Client-facing view of a user with every secret stripped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: UserRole,
    pub is_account_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            role: user.role,
            is_account_verified: user.is_account_verified,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        PublicUser::from(&user)
    }
}

/// Input for creating a new account
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
}

/// Profile fields a user may change about themselves
#[derive(Debug, Clone, Default)]
pub struct UpdateProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UpdateProfile {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none()
    }
}

impl User {
    /// Inserts a new account
    ///
    /// # Errors
    ///
    /// Returns a database error carrying the `users_email_key` constraint
    /// when the email is already registered.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (first_name, last_name, email, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&query)
            .bind(data.first_name)
            .bind(data.last_name)
            .bind(data.email)
            .bind(data.password_hash)
            .bind(data.role)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Lists every non-admin account, oldest first
    pub async fn list_members(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role <> 'admin' ORDER BY created_at ASC"
        );

        sqlx::query_as::<_, User>(&query).fetch_all(pool).await
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Updates the name fields that are present
    ///
    /// Returns `None` when no account has this id.
    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        data: UpdateProfile,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE users SET \
                first_name = COALESCE($2, first_name), \
                last_name = COALESCE($3, last_name), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(data.first_name)
            .bind(data.last_name)
            .fetch_optional(pool)
            .await
    }

    /// Replaces the OTP slot for `purpose` with a fresh hash and expiry
    pub async fn store_otp(
        pool: &PgPool,
        id: Uuid,
        purpose: OtpPurpose,
        hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let (otp_col, exp_col) = purpose.columns();
        let query = format!(
            "UPDATE users SET {otp_col} = $2, {exp_col} = $3, updated_at = NOW() WHERE id = $1"
        );

        let result = sqlx::query(&query)
            .bind(id)
            .bind(hash)
            .bind(expires_at)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn clear_otp(pool: &PgPool, id: Uuid, purpose: OtpPurpose) -> Result<bool, sqlx::Error> {
        let (otp_col, exp_col) = purpose.columns();
        let query = format!(
            "UPDATE users SET {otp_col} = NULL, {exp_col} = NULL, updated_at = NOW() WHERE id = $1"
        );

        let result = sqlx::query(&query).bind(id).execute(pool).await?;

        Ok(result.rows_affected() > 0)
    }

    /// Marks the account verified and clears the verification code
    ///
    /// The write only applies while the stored hash still equals
    /// `expected_hash`, so a code can be consumed once.
    pub async fn mark_verified(
        pool: &PgPool,
        id: Uuid,
        expected_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_account_verified = TRUE,
                verify_otp = NULL,
                verify_otp_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND verify_otp = $2
            "#,
        )
        .bind(id)
        .bind(expected_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Stores a new password hash and clears the reset code
    ///
    /// Same compare-and-clear rule as [`User::mark_verified`].
    pub async fn reset_password(
        pool: &PgPool,
        id: Uuid,
        expected_hash: &str,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $3,
                reset_otp = NULL,
                reset_otp_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND reset_otp = $2
            "#,
        )
        .bind(id)
        .bind(expected_hash)
        .bind(password_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes an account and its todos
    ///
    /// Returns the ids of the removed todos, or `None` when no such user
    /// exists.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<Option<Vec<Uuid>>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let todo_ids: Vec<Uuid> =
            sqlx::query_scalar("DELETE FROM todos WHERE user_id = $1 RETURNING id")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(todo_ids))
    }
}

#[cfg(test)]
pub(crate) fn sample_user(role: UserRole) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: format!("ada-{}@example.com", Uuid::new_v4()),
        password_hash: "$argon2id$stub".to_string(),
        role,
        is_account_verified: false,
        verify_otp: None,
        verify_otp_expires_at: None,
        reset_otp: None,
        reset_otp_expires_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_public_user_hides_secrets() {
        let mut user = sample_user(UserRole::User);
        user.verify_otp = Some("$argon2id$otp".to_string());

        let json = serde_json::to_value(PublicUser::from(&user)).unwrap();

        assert_eq!(json["_id"], user.id.to_string());
        assert_eq!(json["firstName"], "Ada");
        assert_eq!(json["isAccountVerified"], false);
        assert_eq!(json["role"], "user");
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
        assert!(json.get("verifyOtp").is_none());
    }

    #[test]
    fn test_otp_slot_requires_hash_and_expiry() {
        let mut user = sample_user(UserRole::User);
        assert!(user.otp(OtpPurpose::Verify).is_none());

        user.reset_otp = Some("hash".to_string());
        assert!(user.otp(OtpPurpose::Reset).is_none());

        let expires_at = Utc::now() + Duration::minutes(15);
        user.reset_otp_expires_at = Some(expires_at);
        assert_eq!(
            user.otp(OtpPurpose::Reset),
            Some(StoredOtp { hash: "hash".to_string(), expires_at })
        );
        assert!(user.otp(OtpPurpose::Verify).is_none());
    }

    #[test]
    fn test_role_display_and_default() {
        assert_eq!(UserRole::default(), UserRole::User);
        assert_eq!(UserRole::Admin.to_string(), "admin");
        assert_eq!(serde_json::to_string(&UserRole::User).unwrap(), "\"user\"");
    }

    #[test]
    fn test_update_profile_is_empty() {
        assert!(UpdateProfile::default().is_empty());
        let update = UpdateProfile {
            first_name: Some("Grace".to_string()),
            last_name: None,
        };
        assert!(!update.is_empty());
    }
}
