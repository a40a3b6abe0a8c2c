/// Authorization checks
///
/// Two roles exist: admins can do everything, members act within their team.
/// Financial documents additionally require the `can_view_financials` flag,
/// read from the user row so revocation applies immediately.

use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::user::User;

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Admin access required")]
    AdminRequired,

    #[error("Financial document access required")]
    FinancialAccessRequired,

    #[error("Not a member of team {0}")]
    NotTeamMember(Uuid),
}

pub fn require_admin(auth: &AuthContext) -> Result<(), AuthzError> {
    if auth.is_admin() {
        Ok(())
    } else {
        Err(AuthzError::AdminRequired)
    }
}

/// Whether `user` may see financial documents
pub fn can_view_financials(user: &User) -> bool {
    user.role.is_admin() || user.can_view_financials
}

pub fn require_financial_access(user: &User) -> Result<(), AuthzError> {
    if can_view_financials(user) {
        Ok(())
    } else {
        Err(AuthzError::FinancialAccessRequired)
    }
}

/// Members may only act on their own team; admins on any
pub fn require_team_access(auth: &AuthContext, team_id: Uuid) -> Result<(), AuthzError> {
    if auth.is_admin() || auth.team_id() == Some(team_id) {
        Ok(())
    } else {
        Err(AuthzError::NotTeamMember(team_id))
    }
}
