use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use pulseid_core::{
    Account, AccountStore, AuthError, AuthResult, DeactivationStats, NewAccount, Role,
};

#[derive(Clone)]
pub struct SqliteAccountStore {
    pool: SqlitePool,
}

/// Parse a SQLite datetime text string into a chrono DateTime<Utc>.
///
/// SQLite stores datetimes as TEXT in the format produced by
/// `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')`, which yields strings like
/// `2025-01-01T00:00:00.000Z`. That format is fixed-width, so expiry
/// comparisons inside SQL can compare the strings lexicographically.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, AuthError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.fZ") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%SZ") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    Err(AuthError::Storage(format!("failed to parse datetime: {s}")))
}

fn parse_datetime_opt(s: Option<&str>) -> Result<Option<DateTime<Utc>>, AuthError> {
    match s {
        Some(s) => Ok(Some(parse_datetime(s)?)),
        None => Ok(None),
    }
}

/// Format a datetime the same way the schema defaults do.
fn fmt_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn storage_err(e: impl std::fmt::Display) -> AuthError {
    AuthError::Storage(e.to_string())
}

fn col<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, AuthError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name).map_err(storage_err)
}

fn row_to_account(row: &SqliteRow) -> Result<Account, AuthError> {
    let role: String = col(row, "role")?;
    let role = Role::parse(&role)
        .ok_or_else(|| AuthError::Storage(format!("unknown role in store: {role}")))?;

    let verification_code_expires: Option<String> = col(row, "verification_code_expires")?;
    let reset_token_expires: Option<String> = col(row, "reset_token_expires")?;
    let deleted_at: Option<String> = col(row, "deleted_at")?;
    let auto_deactivated_at: Option<String> = col(row, "auto_deactivated_at")?;
    let reactivation_token_expires: Option<String> = col(row, "reactivation_token_expires")?;
    let last_reactivation_attempt: Option<String> = col(row, "last_reactivation_attempt")?;
    let reactivated_at: Option<String> = col(row, "reactivated_at")?;
    let last_login: Option<String> = col(row, "last_login")?;
    let last_activity: Option<String> = col(row, "last_activity")?;
    let created_at: String = col(row, "created_at")?;
    let is_verified: i64 = col(row, "is_verified")?;
    let is_deleted: i64 = col(row, "is_deleted")?;
    let is_auto_deactivated: i64 = col(row, "is_auto_deactivated")?;

    Ok(Account {
        id: col(row, "id")?,
        first_name: col(row, "first_name")?,
        last_name: col(row, "last_name")?,
        email: col(row, "email")?,
        phone: col(row, "phone")?,
        password_hash: col(row, "password_hash")?,
        google_id: col(row, "google_id")?,
        role,
        is_verified: is_verified != 0,
        verification_code: col(row, "verification_code")?,
        verification_code_expires: parse_datetime_opt(verification_code_expires.as_deref())?,
        reset_token: col(row, "reset_token")?,
        reset_token_expires: parse_datetime_opt(reset_token_expires.as_deref())?,
        is_deleted: is_deleted != 0,
        deleted_at: parse_datetime_opt(deleted_at.as_deref())?,
        is_auto_deactivated: is_auto_deactivated != 0,
        auto_deactivated_at: parse_datetime_opt(auto_deactivated_at.as_deref())?,
        reactivation_token: col(row, "reactivation_token")?,
        reactivation_token_expires: parse_datetime_opt(reactivation_token_expires.as_deref())?,
        reactivation_attempts: col(row, "reactivation_attempts")?,
        last_reactivation_attempt: parse_datetime_opt(last_reactivation_attempt.as_deref())?,
        reactivated_at: parse_datetime_opt(reactivated_at.as_deref())?,
        original_email: col(row, "original_email")?,
        original_phone: col(row, "original_phone")?,
        last_login: parse_datetime_opt(last_login.as_deref())?,
        last_activity: parse_datetime_opt(last_activity.as_deref())?,
        created_at: parse_datetime(&created_at)?,
    })
}

const ACCOUNT_SELECT: &str = "SELECT * FROM users";

impl SqliteAccountStore {
    pub async fn connect(url: &str) -> AuthResult<Self> {
        let pool = SqlitePool::connect(url).await.map_err(storage_err)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(storage_err)?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn get_account_where(
        &self,
        where_clause: &str,
        bind_value: &str,
    ) -> AuthResult<Option<Account>> {
        let sql = format!("{ACCOUNT_SELECT} WHERE {where_clause}");
        let row = sqlx::query(&sql)
            .bind(bind_value)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        match row {
            Some(ref r) => Ok(Some(row_to_account(r)?)),
            None => Ok(None),
        }
    }

    async fn count_where(&self, where_clause: &str) -> AuthResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM users WHERE {where_clause}");
        sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)
    }

    async fn count_where_bound(&self, where_clause: &str, bind_value: &str) -> AuthResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM users WHERE {where_clause}");
        sqlx::query_scalar(&sql)
            .bind(bind_value)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)
    }
}

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn create_account(&self, input: &NewAccount) -> AuthResult<Account> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = fmt_datetime(Utc::now());

        let result = sqlx::query(
            "INSERT INTO users (id, first_name, last_name, email, password_hash, google_id, last_activity)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .bind(&input.password_hash)
        .bind(&input.google_id)
        .bind(&now)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            // The unique index on email doubles as the duplicate check.
            if let sqlx::Error::Database(ref db) = e {
                if db.message().contains("UNIQUE") {
                    return Err(AuthError::EmailTaken);
                }
            }
            return Err(storage_err(e));
        }

        self.get_account(&id).await?.ok_or_else(|| {
            AuthError::Storage("failed to retrieve account after creation".to_string())
        })
    }

    async fn get_account(&self, id: &str) -> AuthResult<Option<Account>> {
        self.get_account_where("id = ?", id).await
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<Account>> {
        self.get_account_where("email = ? AND is_deleted = 0", email)
            .await
    }

    async fn find_any_by_email(&self, email: &str) -> AuthResult<Option<Account>> {
        self.get_account_where("email = ?", email).await
    }

    async fn set_verification_code(
        &self,
        id: &str,
        code: &str,
        expires: DateTime<Utc>,
    ) -> AuthResult<()> {
        sqlx::query(
            "UPDATE users SET verification_code = ?, verification_code_expires = ? WHERE id = ?",
        )
        .bind(code)
        .bind(fmt_datetime(expires))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn mark_verified(&self, id: &str, code: &str) -> AuthResult<bool> {
        let result = sqlx::query(
            "UPDATE users
             SET is_verified = 1, verification_code = NULL,
                 verification_code_expires = NULL, last_activity = ?
             WHERE id = ? AND verification_code = ? AND is_deleted = 0",
        )
        .bind(fmt_datetime(Utc::now()))
        .bind(id)
        .bind(code)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_reset_token(
        &self,
        id: &str,
        token: &str,
        expires: DateTime<Utc>,
    ) -> AuthResult<()> {
        sqlx::query("UPDATE users SET reset_token = ?, reset_token_expires = ? WHERE id = ?")
            .bind(token)
            .bind(fmt_datetime(expires))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token: &str,
        new_hash: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<Account>> {
        let id: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE reset_token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        let Some(id) = id else {
            return Ok(None);
        };

        // Conditional on the token still matching at write time, so the
        // password write and the token clear land atomically and a replay
        // (or a racing duplicate request) finds no token to consume.
        // Completing a reset also clears auto-deactivation: the user has
        // proven they are back.
        let result = sqlx::query(
            "UPDATE users
             SET password_hash = ?, reset_token = NULL, reset_token_expires = NULL,
                 is_auto_deactivated = 0, auto_deactivated_at = NULL,
                 reactivation_token = NULL, reactivation_token_expires = NULL,
                 last_activity = ?
             WHERE id = ? AND reset_token = ? AND reset_token_expires > ? AND is_deleted = 0",
        )
        .bind(new_hash)
        .bind(fmt_datetime(now))
        .bind(&id)
        .bind(token)
        .bind(fmt_datetime(now))
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_account(&id).await
    }

    async fn update_password(&self, id: &str, hash: &str) -> AuthResult<()> {
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(hash)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn update_role(&self, id: &str, role: Role) -> AuthResult<bool> {
        let result = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn link_google(&self, id: &str, google_id: &str) -> AuthResult<()> {
        sqlx::query("UPDATE users SET google_id = ? WHERE id = ?")
            .bind(google_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn touch_login(&self, id: &str) -> AuthResult<()> {
        let now = fmt_datetime(Utc::now());
        sqlx::query("UPDATE users SET last_login = ?, last_activity = ? WHERE id = ?")
            .bind(&now)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn touch_activity(&self, id: &str) -> AuthResult<()> {
        sqlx::query("UPDATE users SET last_activity = ? WHERE id = ?")
            .bind(fmt_datetime(Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn reactivate_if_auto_deactivated(&self, id: &str) -> AuthResult<bool> {
        let now = fmt_datetime(Utc::now());
        let result = sqlx::query(
            "UPDATE users
             SET is_auto_deactivated = 0, auto_deactivated_at = NULL,
                 reactivation_token = NULL, reactivation_token_expires = NULL,
                 reactivated_at = ?, last_login = ?, last_activity = ?
             WHERE id = ? AND is_auto_deactivated = 1 AND is_deleted = 0",
        )
        .bind(&now)
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_reactivation_token(
        &self,
        id: &str,
        token: &str,
        expires: DateTime<Utc>,
    ) -> AuthResult<()> {
        sqlx::query(
            "UPDATE users
             SET reactivation_token = ?, reactivation_token_expires = ?,
                 reactivation_attempts = reactivation_attempts + 1,
                 last_reactivation_attempt = ?
             WHERE id = ?",
        )
        .bind(token)
        .bind(fmt_datetime(expires))
        .bind(fmt_datetime(Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn reactivate_with_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<Account>> {
        let id: Option<String> =
            sqlx::query_scalar("SELECT id FROM users WHERE reactivation_token = ?")
                .bind(token)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_err)?;
        let Some(id) = id else {
            return Ok(None);
        };

        let now_s = fmt_datetime(now);
        let result = sqlx::query(
            "UPDATE users
             SET is_auto_deactivated = 0, auto_deactivated_at = NULL,
                 reactivation_token = NULL, reactivation_token_expires = NULL,
                 reactivated_at = ?, last_activity = ?
             WHERE id = ? AND reactivation_token = ? AND reactivation_token_expires > ?
               AND is_auto_deactivated = 1 AND is_deleted = 0",
        )
        .bind(&now_s)
        .bind(&now_s)
        .bind(&id)
        .bind(token)
        .bind(&now_s)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_account(&id).await
    }

    async fn auto_deactivate_if_inactive(
        &self,
        id: &str,
        cutoff: DateTime<Utc>,
    ) -> AuthResult<bool> {
        // Re-checks the idle condition at write time so a login that raced
        // the sweep (and bumped last_activity) wins.
        let result = sqlx::query(
            "UPDATE users
             SET is_auto_deactivated = 1, auto_deactivated_at = ?
             WHERE id = ? AND is_deleted = 0 AND is_auto_deactivated = 0
               AND is_verified = 1
               AND last_activity IS NOT NULL AND last_activity < ?",
        )
        .bind(fmt_datetime(Utc::now()))
        .bind(id)
        .bind(fmt_datetime(cutoff))
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_inactive_since(&self, cutoff: DateTime<Utc>) -> AuthResult<Vec<Account>> {
        let sql = format!(
            "{ACCOUNT_SELECT}
             WHERE is_deleted = 0 AND is_auto_deactivated = 0 AND is_verified = 1
               AND last_activity IS NOT NULL AND last_activity < ?"
        );
        let rows = sqlx::query(&sql)
            .bind(fmt_datetime(cutoff))
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.iter().map(row_to_account).collect()
    }

    async fn clear_expired_tokens(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let now_s = fmt_datetime(now);
        let reactivation = sqlx::query(
            "UPDATE users
             SET reactivation_token = NULL, reactivation_token_expires = NULL
             WHERE reactivation_token IS NOT NULL AND reactivation_token_expires < ?",
        )
        .bind(&now_s)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        let reset = sqlx::query(
            "UPDATE users
             SET reset_token = NULL, reset_token_expires = NULL
             WHERE reset_token IS NOT NULL AND reset_token_expires < ?",
        )
        .bind(&now_s)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(reactivation.rows_affected() + reset.rows_affected())
    }

    async fn soft_delete(&self, id: &str) -> AuthResult<bool> {
        // Shadow the addressable fields and tombstone the live email in a
        // single write; the unique index slot frees immediately.
        let result = sqlx::query(
            "UPDATE users
             SET is_deleted = 1, deleted_at = ?,
                 original_email = email, original_phone = phone,
                 email = 'deleted_' || id || '@removed.invalid', phone = NULL
             WHERE id = ? AND is_deleted = 0",
        )
        .bind(fmt_datetime(Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn restore(&self, id: &str) -> AuthResult<Option<Account>> {
        let result = sqlx::query(
            "UPDATE users
             SET email = COALESCE(original_email, email), phone = original_phone,
                 original_email = NULL, original_phone = NULL,
                 is_deleted = 0, deleted_at = NULL
             WHERE id = ? AND is_deleted = 1",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_account(id).await
    }

    async fn list_accounts(&self, include_deleted: bool) -> AuthResult<Vec<Account>> {
        let sql = if include_deleted {
            format!("{ACCOUNT_SELECT} ORDER BY created_at DESC")
        } else {
            format!("{ACCOUNT_SELECT} WHERE is_deleted = 0 ORDER BY created_at DESC")
        };
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.iter().map(row_to_account).collect()
    }

    async fn deactivation_stats(&self, now: DateTime<Utc>) -> AuthResult<DeactivationStats> {
        let now_s = fmt_datetime(now);
        let week_ago = fmt_datetime(now - chrono::Duration::days(7));

        Ok(DeactivationStats {
            total_accounts: self.count_where("1 = 1").await?,
            soft_deleted: self.count_where("is_deleted = 1").await?,
            auto_deactivated: self.count_where("is_auto_deactivated = 1").await?,
            expired_reactivation_tokens: self
                .count_where_bound(
                    "reactivation_token IS NOT NULL AND reactivation_token_expires < ?",
                    &now_s,
                )
                .await?,
            pending_reactivations: self
                .count_where_bound(
                    "reactivation_token IS NOT NULL AND reactivation_token_expires >= ?",
                    &now_s,
                )
                .await?,
            deactivated_last_week: self
                .count_where_bound("auto_deactivated_at >= ?", &week_ago)
                .await?,
            reactivated_last_week: self
                .count_where_bound("reactivated_at >= ?", &week_ago)
                .await?,
        })
    }
}
