use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Enumerated account role. New accounts default to `User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// The four mutually exclusive lifecycle states. Derived, never stored:
/// the store keeps the underlying flags and `Account::state` computes the
/// single state that holds, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountState {
    Unverified,
    Active,
    AutoDeactivated,
    SoftDeleted,
}

impl AccountState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountState::Unverified => "unverified",
            AccountState::Active => "active",
            AccountState::AutoDeactivated => "deactivated",
            AccountState::SoftDeleted => "deleted",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    /// Absent for federated-identity-only accounts.
    pub password_hash: Option<String>,
    /// External IdP subject, set once a Google identity is linked.
    pub google_id: Option<String>,
    pub role: Role,
    pub is_verified: bool,
    pub verification_code: Option<String>,
    pub verification_code_expires: Option<DateTime<Utc>>,
    pub reset_token: Option<String>,
    pub reset_token_expires: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub is_auto_deactivated: bool,
    pub auto_deactivated_at: Option<DateTime<Utc>>,
    pub reactivation_token: Option<String>,
    pub reactivation_token_expires: Option<DateTime<Utc>>,
    pub reactivation_attempts: i64,
    pub last_reactivation_attempt: Option<DateTime<Utc>>,
    pub reactivated_at: Option<DateTime<Utc>>,
    /// Shadow fields holding the real email/phone while soft-deleted.
    pub original_email: Option<String>,
    pub original_phone: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Derive the single lifecycle state that holds for this account.
    ///
    /// SoftDeleted takes precedence over AutoDeactivated, which takes
    /// precedence over Unverified. Everything else is Active.
    pub fn state(&self) -> AccountState {
        if self.is_deleted {
            AccountState::SoftDeleted
        } else if self.is_auto_deactivated {
            AccountState::AutoDeactivated
        } else if !self.is_verified {
            AccountState::Unverified
        } else {
            AccountState::Active
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// The non-addressable email written over the live field on soft delete,
    /// freeing the unique-email slot for re-registration.
    pub fn tombstone_email(id: &str) -> String {
        format!("deleted_{id}@removed.invalid")
    }
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// `None` when the account is created through federated sign-in.
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
}
