/// Reports
///
/// A report is either built on demand ("manual") or generated on a schedule.
/// The column is a free-form tag, so decoding happens here: a missing, empty
/// or `"manual"` tag is manual. Every other tag is a schedule, including ones
/// this service does not generate itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// How often a report is regenerated
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScheduleFrequency {
    Manual,
    Daily,
    Weekly,
    Monthly,

    /// Any other non-empty tag
    Other(String),
}

impl ScheduleFrequency {
    /// Decodes the stored tag
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.map(str::trim) {
            None | Some("") | Some("manual") => ScheduleFrequency::Manual,
            Some("daily") => ScheduleFrequency::Daily,
            Some("weekly") => ScheduleFrequency::Weekly,
            Some("monthly") => ScheduleFrequency::Monthly,
            Some(other) => ScheduleFrequency::Other(other.to_string()),
        }
    }

    /// Tag written back to the database
    pub fn as_tag(&self) -> Option<&str> {
        match self {
            ScheduleFrequency::Manual => None,
            ScheduleFrequency::Daily => Some("daily"),
            ScheduleFrequency::Weekly => Some("weekly"),
            ScheduleFrequency::Monthly => Some("monthly"),
            ScheduleFrequency::Other(tag) => Some(tag),
        }
    }

    pub fn is_scheduled(&self) -> bool {
        !matches!(self, ScheduleFrequency::Manual)
    }
}

impl From<String> for ScheduleFrequency {
    fn from(tag: String) -> Self {
        Self::from_tag(Some(&tag))
    }
}

impl From<ScheduleFrequency> for String {
    fn from(frequency: ScheduleFrequency) -> Self {
        frequency.as_tag().unwrap_or("manual").to_string()
    }
}

/// Report row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Report {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub schedule_frequency: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Report {
    pub fn frequency(&self) -> ScheduleFrequency {
        ScheduleFrequency::from_tag(self.schedule_frequency.as_deref())
    }
}

/// Input for creating a report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReport {
    pub user_id: Uuid,
    pub title: String,
    pub frequency: ScheduleFrequency,
}

impl Report {
    pub async fn create(pool: &PgPool, data: CreateReport) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Report>(
            r#"
            INSERT INTO reports (user_id, title, schedule_frequency)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, title, schedule_frequency, created_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.title)
        .bind(data.frequency.as_tag())
        .fetch_one(pool)
        .await
    }

    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Report>(
            r#"
            SELECT id, user_id, title, schedule_frequency, created_at
            FROM reports
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Report>(
            "SELECT id, user_id, title, schedule_frequency, created_at FROM reports",
        )
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_empty_and_manual_decode_to_manual() {
        assert_eq!(ScheduleFrequency::from_tag(None), ScheduleFrequency::Manual);
        assert_eq!(ScheduleFrequency::from_tag(Some("")), ScheduleFrequency::Manual);
        assert_eq!(ScheduleFrequency::from_tag(Some("manual")), ScheduleFrequency::Manual);
        assert_eq!(ScheduleFrequency::from_tag(Some("  ")), ScheduleFrequency::Manual);
    }

    #[test]
    fn test_unrecognised_tags_are_scheduled() {
        for tag in ["hourly", "biweekly", "quarterly", "Weekly", "Manual"] {
            let freq = ScheduleFrequency::from_tag(Some(tag));
            assert!(freq.is_scheduled(), "{tag} should be scheduled");
            assert_eq!(freq.as_tag(), Some(tag));
        }
    }

    #[test]
    fn test_serde_uses_the_plain_tag() {
        let freq: ScheduleFrequency = serde_json::from_str(r#""biweekly""#).unwrap();
        assert_eq!(freq, ScheduleFrequency::Other("biweekly".to_string()));
        assert_eq!(serde_json::to_string(&freq).unwrap(), r#""biweekly""#);

        let manual: ScheduleFrequency = serde_json::from_str(r#""manual""#).unwrap();
        assert_eq!(serde_json::to_string(&manual).unwrap(), r#""manual""#);
        assert_eq!(serde_json::to_string(&ScheduleFrequency::Weekly).unwrap(), r#""weekly""#);
    }

    #[test]
    fn test_known_frequencies_are_scheduled() {
        for tag in ["daily", "weekly", "monthly"] {
            let freq = ScheduleFrequency::from_tag(Some(tag));
            assert!(freq.is_scheduled(), "{tag} should be scheduled");
            assert_eq!(freq.as_tag(), Some(tag));
        }
        assert_eq!(ScheduleFrequency::Manual.as_tag(), None);
    }
}
