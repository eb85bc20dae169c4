use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AuthResult;
use crate::types::{Account, NewAccount, Role};

/// Counters for the admin auto-deactivation dashboard.
#[derive(Debug, Clone, Default)]
pub struct DeactivationStats {
    pub total_accounts: i64,
    pub soft_deleted: i64,
    pub auto_deactivated: i64,
    /// Accounts holding a reactivation token that has already expired.
    pub expired_reactivation_tokens: i64,
    /// Accounts holding a live reactivation token.
    pub pending_reactivations: i64,
    pub deactivated_last_week: i64,
    pub reactivated_last_week: i64,
}

/// Durable record of account identity, credentials, and lifecycle flags.
///
/// Soft-deleted accounts are excluded from `find_by_email`; call sites that
/// genuinely need tombstones use `find_any_by_email`, making the exclusion
/// visible instead of a hidden cross-cutting query rule.
///
/// Every state transition that can race (login-triggered reactivation vs the
/// sweeper, two concurrent logins, token consumption) is a conditional write:
/// the update applies only if the row is still in the expected source state,
/// and the return value tells the caller whether it won.
#[async_trait]
pub trait AccountStore: Send + Sync + 'static {
    async fn create_account(&self, input: &NewAccount) -> AuthResult<Account>;
    async fn get_account(&self, id: &str) -> AuthResult<Option<Account>>;
    /// Lookup by live email, excluding soft-deleted accounts.
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<Account>>;
    /// Lookup by live email including soft-deleted accounts (their email
    /// field holds a tombstone placeholder, so in practice this differs from
    /// `find_by_email` only for rows deleted before the placeholder write).
    async fn find_any_by_email(&self, email: &str) -> AuthResult<Option<Account>>;

    // Verification codes
    async fn set_verification_code(
        &self,
        id: &str,
        code: &str,
        expires: DateTime<Utc>,
    ) -> AuthResult<()>;
    /// Mark verified iff the stored code still matches `code`. Clears the
    /// code fields and bumps `last_activity` in the same write, so a consumed
    /// code can never validate again.
    async fn mark_verified(&self, id: &str, code: &str) -> AuthResult<bool>;

    // Password reset
    async fn set_reset_token(
        &self,
        id: &str,
        token: &str,
        expires: DateTime<Utc>,
    ) -> AuthResult<()>;
    /// Store the new hash and clear the token in one conditional write keyed
    /// on the token still matching and being unexpired. Also clears any
    /// auto-deactivation, since completing a reset proves the user is back.
    /// Returns the updated account, or `None` if the token did not consume.
    async fn consume_reset_token(
        &self,
        token: &str,
        new_hash: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<Account>>;
    async fn update_password(&self, id: &str, hash: &str) -> AuthResult<()>;

    // Identity
    async fn update_role(&self, id: &str, role: Role) -> AuthResult<bool>;
    async fn link_google(&self, id: &str, google_id: &str) -> AuthResult<()>;

    // Activity bookkeeping
    async fn touch_login(&self, id: &str) -> AuthResult<()>;
    async fn touch_activity(&self, id: &str) -> AuthResult<()>;

    // Auto-deactivation / reactivation
    /// Return to Active iff currently auto-deactivated, clearing all
    /// reactivation bookkeeping and bumping login/activity timestamps in the
    /// same write. `false` means another caller (or the user) got there first.
    async fn reactivate_if_auto_deactivated(&self, id: &str) -> AuthResult<bool>;
    async fn set_reactivation_token(
        &self,
        id: &str,
        token: &str,
        expires: DateTime<Utc>,
    ) -> AuthResult<()>;
    /// Token-based reactivation: consume the token and return to Active in
    /// one conditional write. `None` when the token is unknown, expired, or
    /// the account is no longer auto-deactivated.
    async fn reactivate_with_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<Account>>;
    /// Sweeper transition: deactivate iff still Active and still idle past
    /// `cutoff` at write time.
    async fn auto_deactivate_if_inactive(
        &self,
        id: &str,
        cutoff: DateTime<Utc>,
    ) -> AuthResult<bool>;
    async fn list_inactive_since(&self, cutoff: DateTime<Utc>) -> AuthResult<Vec<Account>>;
    /// Hygiene: null out reactivation/reset tokens whose expiry has passed.
    async fn clear_expired_tokens(&self, now: DateTime<Utc>) -> AuthResult<u64>;

    // Soft delete / restore
    /// Move email/phone into shadow fields, overwrite the live email with a
    /// tombstone placeholder, and set the deleted flag, all in one write.
    async fn soft_delete(&self, id: &str) -> AuthResult<bool>;
    /// Admin restore: move the shadow fields back and clear the deleted flag.
    /// `None` if the account is not currently soft-deleted.
    async fn restore(&self, id: &str) -> AuthResult<Option<Account>>;

    // Admin reads
    async fn list_accounts(&self, include_deleted: bool) -> AuthResult<Vec<Account>>;
    async fn deactivation_stats(&self, now: DateTime<Utc>) -> AuthResult<DeactivationStats>;
}
