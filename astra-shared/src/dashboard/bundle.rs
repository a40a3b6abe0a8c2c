/// Bulk dashboard data
///
/// Everything an admin dashboard needs, loaded in one round of concurrent
/// queries. Served as-is by the bulk endpoint and fed to the aggregator.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    chat_message::ChatMessage,
    document::Document,
    integration::{DriveConnection, GmailConnection},
    report::Report,
    team::Team,
    user::User,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardBundle {
    pub users: Vec<User>,
    pub teams: Vec<Team>,
    pub documents: Vec<Document>,
    pub chat_messages: Vec<ChatMessage>,
    pub reports: Vec<Report>,

    /// Users with an active Gmail connection
    pub gmail_connected: Vec<Uuid>,

    /// Users with an active Drive connection
    pub drive_connected: Vec<Uuid>,
}

impl DashboardBundle {
    pub async fn load(pool: &PgPool) -> Result<Self, sqlx::Error> {
        let (users, teams, documents, chat_messages, reports, gmail_connected, drive_connected) = tokio::try_join!(
            User::list_all(pool),
            Team::list_all(pool),
            Document::list_all(pool),
            ChatMessage::list_all(pool),
            Report::list_all(pool),
            GmailConnection::active_user_ids(pool),
            DriveConnection::active_user_ids(pool),
        )?;

        debug!(
            users = users.len(),
            teams = teams.len(),
            documents = documents.len(),
            chat_messages = chat_messages.len(),
            reports = reports.len(),
            "Loaded dashboard bundle"
        );

        Ok(Self {
            users,
            teams,
            documents,
            chat_messages,
            reports,
            gmail_connected,
            drive_connected,
        })
    }
}
