/// Database models for Astra
///
/// Each model owns its row type, the enums for its variant columns, and the
/// sqlx queries that read and write it.
///
/// # Models
///
/// - `user`: Accounts, roles and activity timestamps
/// - `team`: Teams and their point totals
/// - `document`: Document metadata, categorized into folder types
/// - `chat_message`: Chat messages tagged with a mode
/// - `report`: Reports with an optional schedule frequency
/// - `invite_code`: Invite codes and code generation
/// - `support_submission`: Support tickets and triage
/// - `marketing_email`: Marketing campaigns
/// - `integration`: Gmail and Drive connections
/// - `launch_progress`: Onboarding progress rows
///
/// # Example
///
/// ```no_run
/// use astra_shared::models::team::{Team, CreateTeam};
/// use astra_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::from_url("postgresql://localhost/astra")).await?;
/// let team = Team::create(&pool, CreateTeam { name: "Growth".to_string() }).await?;
/// # Ok(())
/// # }
/// ```

pub mod chat_message;
pub mod document;
pub mod integration;
pub mod invite_code;
pub mod launch_progress;
pub mod marketing_email;
pub mod report;
pub mod support_submission;
pub mod team;
pub mod user;
