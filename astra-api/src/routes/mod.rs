/// API route handlers
///
/// Organized by resource:
///
/// - `health`: Health check
/// - `auth`: Registration, login and token refresh
/// - `me`: The caller's own profile and activity
/// - `teams`: Teams
/// - `users`: Admin user management
/// - `documents`: Document metadata
/// - `chat`: Chat messages
/// - `reports`: Reports
/// - `dashboard`: Bulk dashboard data and the aggregated summary
/// - `invites`: Invite code issuance
/// - `support`: Support tickets and triage
/// - `marketing`: Marketing campaigns
/// - `integrations`: Gmail OAuth and Drive sync
/// - `assistant`: AI help assistant
/// - `launch`: Launch progress
/// - `realtime`: SSE change feed

pub mod assistant;
pub mod auth;
pub mod chat;
pub mod dashboard;
pub mod documents;
pub mod health;
pub mod integrations;
pub mod invites;
pub mod launch;
pub mod marketing;
pub mod me;
pub mod realtime;
pub mod reports;
pub mod support;
pub mod teams;
pub mod users;

use serde::{Deserialize, Deserializer};
use validator::ValidationError;

/// Rejects strings that are empty once trimmed
///
/// Use with `#[validate(custom(function = "crate::routes::not_blank"))]` on
/// required text that handlers store trimmed.
pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("blank");
        error.message = Some("Must not be blank".into());
        return Err(error);
    }
    Ok(())
}

/// Distinguishes an absent field from an explicit `null`
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`:
/// absent gives `None`, `null` gives `Some(None)`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        team_id: Option<Option<Uuid>>,
    }

    #[test]
    fn test_not_blank() {
        assert!(not_blank("Upload fails").is_ok());
        assert!(not_blank("  padded  ").is_ok());
        assert!(not_blank("").is_err());
        assert!(not_blank(" \n\t ").is_err());
    }

    #[test]
    fn test_double_option() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        let cleared: Patch = serde_json::from_str(r#"{"team_id": null}"#).unwrap();
        let id = Uuid::new_v4();
        let set: Patch = serde_json::from_str(&format!(r#"{{"team_id": "{id}"}}"#)).unwrap();

        assert_eq!(absent.team_id, None);
        assert_eq!(cleared.team_id, Some(None));
        assert_eq!(set.team_id, Some(Some(id)));
    }
}
