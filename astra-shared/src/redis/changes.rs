/// Realtime change feed
///
/// Mutations publish a small [`ChangeEvent`] to `astra:changes:<table>`.
/// Events carry no row data: subscribers treat them as "this slice is
/// stale" and re-fetch it. Duplicated or reordered events are therefore
/// harmless.
///
/// Publishing is best-effort. A failed publish is logged and the mutation
/// that triggered it still succeeds.

use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::client::{RedisClient, RedisClientError};

const CHANNEL_PREFIX: &str = "astra:changes:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTable {
    Users,
    Teams,
    Documents,
    ChatMessages,
    Reports,
    InviteCodes,
    SupportSubmissions,
    MarketingEmails,
    GmailConnections,
    DriveConnections,
}

impl ChangeTable {
    pub const ALL: [ChangeTable; 10] = [
        ChangeTable::Users,
        ChangeTable::Teams,
        ChangeTable::Documents,
        ChangeTable::ChatMessages,
        ChangeTable::Reports,
        ChangeTable::InviteCodes,
        ChangeTable::SupportSubmissions,
        ChangeTable::MarketingEmails,
        ChangeTable::GmailConnections,
        ChangeTable::DriveConnections,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeTable::Users => "users",
            ChangeTable::Teams => "teams",
            ChangeTable::Documents => "documents",
            ChangeTable::ChatMessages => "chat_messages",
            ChangeTable::Reports => "reports",
            ChangeTable::InviteCodes => "invite_codes",
            ChangeTable::SupportSubmissions => "support_submissions",
            ChangeTable::MarketingEmails => "marketing_emails",
            ChangeTable::GmailConnections => "gmail_connections",
            ChangeTable::DriveConnections => "drive_connections",
        }
    }

    pub fn channel(&self) -> String {
        format!("{CHANNEL_PREFIX}{}", self.as_str())
    }

    /// Parses a comma-separated table list; an empty list means every table
    /// Tables whose changes only admins may follow
    pub fn is_admin_only(&self) -> bool {
        matches!(
            self,
            ChangeTable::InviteCodes
                | ChangeTable::SupportSubmissions
                | ChangeTable::MarketingEmails
                | ChangeTable::GmailConnections
        )
    }

    pub fn parse_list(list: &str) -> Result<Vec<ChangeTable>, String> {
        let mut tables = Vec::new();

        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let table: ChangeTable = name.parse()?;
            if !tables.contains(&table) {
                tables.push(table);
            }
        }

        if tables.is_empty() {
            tables.extend(ChangeTable::ALL);
        }

        Ok(tables)
    }
}

impl fmt::Display for ChangeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeTable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChangeTable::ALL
            .into_iter()
            .find(|table| table.as_str() == s)
            .ok_or_else(|| format!("Unknown table: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: ChangeTable,
    pub op: ChangeOp,

    /// Affected row, when there is a single one
    pub id: Option<Uuid>,

    pub at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(table: ChangeTable, op: ChangeOp, id: Option<Uuid>) -> Self {
        Self {
            table,
            op,
            id,
            at: Utc::now(),
        }
    }
}

/// Publishes and subscribes to change events
///
/// Holds no connection when Redis is not configured; publishing is then a
/// no-op and subscribing yields `None`.
#[derive(Clone, Default)]
pub struct ChangePublisher {
    redis: Option<RedisClient>,
}

impl ChangePublisher {
    pub fn new(redis: Option<RedisClient>) -> Self {
        Self { redis }
    }

    pub fn disabled() -> Self {
        Self { redis: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.redis.is_some()
    }

    /// Redis reachability; `None` when the feed is disabled
    pub async fn ping(&self) -> Option<bool> {
        let redis = self.redis.as_ref()?;
        Some(redis.ping().await.unwrap_or(false))
    }

    pub async fn publish(&self, table: ChangeTable, op: ChangeOp, id: Option<Uuid>) {
        let Some(redis) = &self.redis else {
            return;
        };

        let event = ChangeEvent::new(table, op, id);
        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode change event");
                return;
            }
        };

        let mut conn = redis.connection();
        let result: Result<i64, redis::RedisError> = redis::cmd("PUBLISH")
            .arg(table.channel())
            .arg(payload)
            .query_async(&mut conn)
            .await;

        match result {
            Ok(receivers) => {
                tracing::trace!(table = %table, op = ?op, receivers, "Published change event");
            }
            Err(e) => {
                tracing::warn!(table = %table, error = %e, "Failed to publish change event");
            }
        }
    }

    /// Opens a dedicated pub/sub connection for `tables`
    pub async fn subscribe(
        &self,
        tables: &[ChangeTable],
    ) -> Result<Option<BoxStream<'static, ChangeEvent>>, RedisClientError> {
        let Some(redis) = &self.redis else {
            return Ok(None);
        };

        let conn = redis.client().get_async_connection().await?;
        let mut pubsub = conn.into_pubsub();
        for table in tables {
            pubsub.subscribe(table.channel()).await?;
        }

        tracing::debug!(tables = tables.len(), "Subscribed to change feed");

        let stream = pubsub
            .into_on_message()
            .filter_map(|msg| async move {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!(error = %e, "Unreadable change event payload");
                        return None;
                    }
                };
                decode_event(&payload)
            })
            .boxed();

        Ok(Some(stream))
    }
}

fn decode_event(payload: &str) -> Option<ChangeEvent> {
    match serde_json::from_str(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(error = %e, "Malformed change event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names() {
        assert_eq!(ChangeTable::SupportSubmissions.channel(), "astra:changes:support_submissions");
        assert_eq!(ChangeTable::Users.channel(), "astra:changes:users");
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            ChangeTable::parse_list("invite_codes, users,invite_codes").unwrap(),
            vec![ChangeTable::InviteCodes, ChangeTable::Users]
        );
        assert_eq!(ChangeTable::parse_list("").unwrap().len(), ChangeTable::ALL.len());
        assert!(ChangeTable::parse_list("users,secrets").is_err());
    }

    #[test]
    fn test_event_wire_format() {
        let id = Uuid::new_v4();
        let event = ChangeEvent::new(ChangeTable::MarketingEmails, ChangeOp::Update, Some(id));
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();

        assert_eq!(json["table"], "marketing_emails");
        assert_eq!(json["op"], "update");
        assert_eq!(json["id"], id.to_string());
        assert_eq!(decode_event(&json.to_string()), Some(event));
        assert_eq!(decode_event("not json"), None);
    }

    #[tokio::test]
    async fn test_disabled_publisher_is_a_noop() {
        let publisher = ChangePublisher::disabled();
        assert!(!publisher.is_enabled());

        publisher.publish(ChangeTable::Users, ChangeOp::Insert, None).await;
        assert!(publisher.subscribe(&[ChangeTable::Users]).await.unwrap().is_none());
    }
}
