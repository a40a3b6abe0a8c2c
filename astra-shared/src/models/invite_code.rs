/// Invite codes
///
/// An invite code lets a specific email address sign up into a team (or a
/// new team when `team_id` is NULL) with a preassigned role. Codes are
/// 8 characters from `[A-Z0-9]`, giving a 36^8 keyspace.
///
/// Uniqueness is enforced only by the `invite_codes_code_key` constraint.
/// A collision surfaces as a database error for the caller to report; it is
/// never retried here.
///
/// # Lifecycle
///
/// ```text
/// active, unused ──use──> active, partially used ──use──> exhausted
///        │                         │
///        └──── admin toggle ───────┴──> deactivated (reversible)
/// ```
///
/// Redemption (incrementing `current_uses`) happens outside this crate.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::user::UserRole;

/// Length of generated invite codes
pub const INVITE_CODE_LENGTH: usize = 8;

/// Name of the unique constraint guarding `invite_codes.code`
pub const INVITE_CODE_UNIQUE_CONSTRAINT: &str = "invite_codes_code_key";

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates a random invite code
///
/// # Example
///
/// ```
/// use astra_shared::models::invite_code::generate_invite_code;
///
/// let code = generate_invite_code();
/// assert_eq!(code.len(), 8);
/// assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
/// ```
pub fn generate_invite_code() -> String {
    let mut rng = rand::thread_rng();

    (0..INVITE_CODE_LENGTH)
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .collect()
}

/// Derived state of an invite code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteState {
    /// Usable; `current_uses < max_uses`
    Active,

    /// All uses consumed
    Exhausted,

    /// Turned off by an admin
    Deactivated,
}

/// Invite code row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InviteCode {
    pub id: Uuid,
    pub code: String,
    pub email: String,

    /// `None` means the invitee starts a new team
    pub team_id: Option<Uuid>,

    pub role: UserRole,
    pub can_view_financials: bool,
    pub max_uses: i32,
    pub current_uses: i32,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl InviteCode {
    pub fn state(&self) -> InviteState {
        if !self.is_active {
            InviteState::Deactivated
        } else if self.current_uses >= self.max_uses {
            InviteState::Exhausted
        } else {
            InviteState::Active
        }
    }

    pub fn remaining_uses(&self) -> i32 {
        (self.max_uses - self.current_uses).max(0)
    }

    /// Message an admin can paste into chat or email by hand
    pub fn share_message(&self, app_url: &str) -> String {
        format!(
            "You've been invited to join Astra Intelligence!\n\n\
             Sign up at {app_url}/signup with the email {email} and enter invite code: {code}",
            email = self.email,
            code = self.code,
        )
    }
}

/// Input for issuing a code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInviteCode {
    pub code: String,
    pub email: String,
    pub team_id: Option<Uuid>,
    pub role: UserRole,
    pub can_view_financials: bool,
    pub max_uses: i32,
    pub created_by: Option<Uuid>,
}

const INVITE_COLUMNS: &str = "id, code, email, team_id, role, can_view_financials, \
    max_uses, current_uses, is_active, created_by, created_at";

impl InviteCode {
    /// Persists a new invite code with `current_uses = 0`
    ///
    /// # Errors
    ///
    /// A duplicate code violates [`INVITE_CODE_UNIQUE_CONSTRAINT`].
    pub async fn create(pool: &PgPool, data: CreateInviteCode) -> Result<Self, sqlx::Error> {
        let sql = format!(
            "INSERT INTO invite_codes \
             (code, email, team_id, role, can_view_financials, max_uses, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {INVITE_COLUMNS}"
        );

        sqlx::query_as::<_, InviteCode>(&sql)
            .bind(data.code)
            .bind(data.email)
            .bind(data.team_id)
            .bind(data.role)
            .bind(data.can_view_financials)
            .bind(data.max_uses)
            .bind(data.created_by)
            .fetch_one(pool)
            .await
    }

    /// Lists codes, newest first
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!("SELECT {INVITE_COLUMNS} FROM invite_codes ORDER BY created_at DESC");

        sqlx::query_as::<_, InviteCode>(&sql).fetch_all(pool).await
    }

    /// Activates or deactivates a code
    pub async fn set_active(
        pool: &PgPool,
        id: Uuid,
        is_active: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "UPDATE invite_codes SET is_active = $2 WHERE id = $1 RETURNING {INVITE_COLUMNS}"
        );

        sqlx::query_as::<_, InviteCode>(&sql)
            .bind(id)
            .bind(is_active)
            .fetch_optional(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn sample(max_uses: i32, current_uses: i32, is_active: bool) -> InviteCode {
        InviteCode {
            id: Uuid::new_v4(),
            code: "AB12CD34".to_string(),
            email: "new@example.com".to_string(),
            team_id: None,
            role: UserRole::Member,
            can_view_financials: false,
            max_uses,
            current_uses,
            is_active,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_code_shape() {
        for _ in 0..1_000 {
            let code = generate_invite_code();
            assert_eq!(code.len(), INVITE_CODE_LENGTH);
            assert!(code
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
        }
    }

    #[test]
    fn test_codes_rarely_collide() {
        // Birthday bound for 10k draws from 36^8 is ~0.018 expected pairs
        let codes: Vec<String> = (0..10_000).map(|_| generate_invite_code()).collect();
        let unique: HashSet<&String> = codes.iter().collect();
        assert!(codes.len() - unique.len() <= 1);
    }

    #[test]
    fn test_state_transitions() {
        assert_eq!(sample(3, 0, true).state(), InviteState::Active);
        assert_eq!(sample(3, 2, true).state(), InviteState::Active);
        assert_eq!(sample(3, 3, true).state(), InviteState::Exhausted);
        assert_eq!(sample(3, 1, false).state(), InviteState::Deactivated);
        assert_eq!(sample(1, 1, false).state(), InviteState::Deactivated);
    }

    #[test]
    fn test_remaining_uses() {
        assert_eq!(sample(5, 2, true).remaining_uses(), 3);
        assert_eq!(sample(1, 1, true).remaining_uses(), 0);
    }

    #[test]
    fn test_share_message_mentions_code_and_email() {
        let invite = sample(1, 0, true);
        let message = invite.share_message("https://app.example.com");
        assert!(message.contains("AB12CD34"));
        assert!(message.contains("new@example.com"));
        assert!(message.contains("https://app.example.com/signup"));
    }
}
