/// Dashboard rollups
///
/// [`aggregate`] is a pure projection of a [`DashboardBundle`]: lookup maps
/// are built once, then messages, documents and reports are each walked a
/// single time. It performs no I/O and cannot fail; empty input yields zero
/// counts.
///
/// Attribution rules:
///
/// - Team documents are those whose `team_id` is the team's id.
/// - Team messages and reports are those authored by a team member.
/// - User documents are those the user uploaded.
/// - A user without a team, or whose team is unknown, is labelled
///   [`NO_TEAM`] and contributes to no team's counts.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::bundle::DashboardBundle;
use crate::models::{chat_message::MessageMode, document::DocumentCategory, user::UserRole};

/// Team label for users without a (known) team
pub const NO_TEAM: &str = "No Team";

/// Document counts per folder category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub strategy: u64,
    pub meeting: u64,
    pub financial: u64,
    pub marketing: u64,
    pub other: u64,
}

impl CategoryCounts {
    pub fn add(&mut self, category: DocumentCategory) {
        *self.slot(category) += 1;
    }

    pub fn get(&self, category: DocumentCategory) -> u64 {
        match category {
            DocumentCategory::Strategy => self.strategy,
            DocumentCategory::Meeting => self.meeting,
            DocumentCategory::Financial => self.financial,
            DocumentCategory::Marketing => self.marketing,
            DocumentCategory::Other => self.other,
        }
    }

    pub fn total(&self) -> u64 {
        self.strategy + self.meeting + self.financial + self.marketing + self.other
    }

    fn slot(&mut self, category: DocumentCategory) -> &mut u64 {
        match category {
            DocumentCategory::Strategy => &mut self.strategy,
            DocumentCategory::Meeting => &mut self.meeting,
            DocumentCategory::Financial => &mut self.financial,
            DocumentCategory::Marketing => &mut self.marketing,
            DocumentCategory::Other => &mut self.other,
        }
    }
}

/// Chat message counts per mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCounts {
    pub private: u64,
    pub team: u64,
    pub reports: u64,
}

impl MessageCounts {
    pub fn add(&mut self, mode: MessageMode) {
        match mode {
            MessageMode::Private => self.private += 1,
            MessageMode::Team => self.team += 1,
            MessageMode::Reports => self.reports += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.private + self.team + self.reports
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRollup {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub team_name: String,
    pub messages: MessageCounts,
    pub documents: CategoryCounts,
    pub documents_count: u64,
    pub has_documents: bool,
    pub gmail_connected: bool,
    pub drive_connected: bool,
    pub last_active_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRollup {
    pub team_id: Uuid,
    pub name: String,
    pub total_points: i64,
    pub member_count: u64,
    pub documents: CategoryCounts,
    pub documents_count: u64,
    pub scheduled_reports: u64,
    pub manual_reports: u64,
    pub messages: MessageCounts,
    pub total_messages_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalSummary {
    pub total_users: u64,
    pub total_teams: u64,
    pub total_documents: u64,
    pub documents: CategoryCounts,
    pub total_messages: u64,
    pub messages: MessageCounts,
    pub scheduled_reports: u64,
    pub manual_reports: u64,
    pub active_users_7d: u64,
    pub active_users_30d: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub users: Vec<UserRollup>,
    pub teams: Vec<TeamRollup>,
    pub totals: GlobalSummary,
}

/// Whether `last_active_at` falls inside the trailing `days` window ending at `now`
///
/// The lower bound is inclusive. A user who was never active is outside
/// every window.
pub fn active_within(last_active_at: Option<DateTime<Utc>>, now: DateTime<Utc>, days: i64) -> bool {
    last_active_at.is_some_and(|at| at >= now - Duration::days(days))
}

pub fn aggregate(bundle: &DashboardBundle, now: DateTime<Utc>) -> DashboardSummary {
    let team_names: HashMap<Uuid, &str> = bundle
        .teams
        .iter()
        .map(|team| (team.id, team.name.as_str()))
        .collect();
    let team_slot: HashMap<Uuid, usize> = bundle
        .teams
        .iter()
        .enumerate()
        .map(|(idx, team)| (team.id, idx))
        .collect();
    let gmail: HashSet<Uuid> = bundle.gmail_connected.iter().copied().collect();
    let drive: HashSet<Uuid> = bundle.drive_connected.iter().copied().collect();

    let mut teams: Vec<TeamRollup> = bundle
        .teams
        .iter()
        .map(|team| TeamRollup {
            team_id: team.id,
            name: team.name.clone(),
            total_points: team.total_points,
            member_count: 0,
            documents: CategoryCounts::default(),
            documents_count: 0,
            scheduled_reports: 0,
            manual_reports: 0,
            messages: MessageCounts::default(),
            total_messages_count: 0,
        })
        .collect();

    // user id -> (rollup index, team index if the team is known)
    let mut user_slot: HashMap<Uuid, (usize, Option<usize>)> =
        HashMap::with_capacity(bundle.users.len());
    let mut users = Vec::with_capacity(bundle.users.len());
    let mut totals = GlobalSummary {
        total_users: bundle.users.len() as u64,
        total_teams: bundle.teams.len() as u64,
        ..GlobalSummary::default()
    };

    for user in &bundle.users {
        let team_idx = user.team_id.and_then(|id| team_slot.get(&id).copied());
        if let Some(idx) = team_idx {
            teams[idx].member_count += 1;
        }

        if active_within(user.last_active_at, now, 7) {
            totals.active_users_7d += 1;
        }
        if active_within(user.last_active_at, now, 30) {
            totals.active_users_30d += 1;
        }

        let team_name = user
            .team_id
            .and_then(|id| team_names.get(&id).copied())
            .unwrap_or(NO_TEAM);

        user_slot.insert(user.id, (users.len(), team_idx));
        users.push(UserRollup {
            user_id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
            team_name: team_name.to_string(),
            messages: MessageCounts::default(),
            documents: CategoryCounts::default(),
            documents_count: 0,
            has_documents: false,
            gmail_connected: gmail.contains(&user.id),
            drive_connected: drive.contains(&user.id),
            last_active_at: user.last_active_at,
        });
    }

    for message in &bundle.chat_messages {
        totals.messages.add(message.mode);

        if let Some(&(user_idx, team_idx)) = user_slot.get(&message.user_id) {
            users[user_idx].messages.add(message.mode);
            if let Some(idx) = team_idx {
                teams[idx].messages.add(message.mode);
            }
        }
    }

    for document in &bundle.documents {
        totals.documents.add(document.category);

        if let Some(&(user_idx, _)) = document.uploaded_by.and_then(|id| user_slot.get(&id)) {
            users[user_idx].documents.add(document.category);
        }
        if let Some(&idx) = document.team_id.and_then(|id| team_slot.get(&id)) {
            teams[idx].documents.add(document.category);
        }
    }

    for report in &bundle.reports {
        let scheduled = report.frequency().is_scheduled();
        if scheduled {
            totals.scheduled_reports += 1;
        } else {
            totals.manual_reports += 1;
        }

        if let Some(&(_, Some(idx))) = user_slot.get(&report.user_id) {
            if scheduled {
                teams[idx].scheduled_reports += 1;
            } else {
                teams[idx].manual_reports += 1;
            }
        }
    }

    for user in &mut users {
        user.documents_count = user.documents.total();
        user.has_documents = user.documents_count > 0;
    }
    for team in &mut teams {
        team.documents_count = team.documents.total();
        team.total_messages_count = team.messages.total();
    }
    totals.total_documents = totals.documents.total();
    totals.total_messages = totals.messages.total();

    DashboardSummary {
        users,
        teams,
        totals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        chat_message::ChatMessage, document::Document, report::Report, team::Team, user::User,
    };

    fn team(name: &str) -> Team {
        Team {
            id: Uuid::new_v4(),
            name: name.to_string(),
            total_points: 0,
            created_at: Utc::now(),
        }
    }

    fn user(team_id: Option<Uuid>, last_active_at: Option<DateTime<Utc>>) -> User {
        User {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", Uuid::new_v4()),
            password_hash: String::new(),
            full_name: None,
            team_id,
            role: UserRole::Member,
            can_view_financials: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_sign_in_at: None,
            last_active_at,
        }
    }

    fn document(team_id: Option<Uuid>, uploaded_by: Option<Uuid>, category: DocumentCategory) -> Document {
        Document {
            id: Uuid::new_v4(),
            team_id,
            uploaded_by,
            title: "doc".to_string(),
            category,
            created_at: Utc::now(),
        }
    }

    fn message(user_id: Uuid, mode: MessageMode) -> ChatMessage {
        ChatMessage {
            id: Uuid::new_v4(),
            user_id,
            mode,
            content: "hi".to_string(),
            created_at: Utc::now(),
        }
    }

    fn report(user_id: Uuid, frequency: Option<&str>) -> Report {
        Report {
            id: Uuid::new_v4(),
            user_id,
            title: "weekly numbers".to_string(),
            schedule_frequency: frequency.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    fn scenario() -> (DashboardBundle, Uuid, Uuid) {
        let team_a = team("Team A");
        let team_b = team("Team B");
        let a1 = user(Some(team_a.id), None);
        let a2 = user(Some(team_a.id), None);
        let b1 = user(Some(team_b.id), None);

        let documents = vec![
            document(Some(team_a.id), Some(a1.id), DocumentCategory::Strategy),
            document(Some(team_a.id), Some(a1.id), DocumentCategory::Strategy),
            document(Some(team_a.id), Some(a2.id), DocumentCategory::Strategy),
            document(Some(team_b.id), Some(b1.id), DocumentCategory::Financial),
        ];
        let chat_messages = vec![
            message(a1.id, MessageMode::Private),
            message(a1.id, MessageMode::Private),
            message(a2.id, MessageMode::Private),
            message(a1.id, MessageMode::Team),
            message(a2.id, MessageMode::Team),
        ];

        let bundle = DashboardBundle {
            users: vec![a1, a2, b1],
            teams: vec![team_a.clone(), team_b.clone()],
            documents,
            chat_messages,
            ..DashboardBundle::default()
        };

        (bundle, team_a.id, team_b.id)
    }

    fn team_rollup(summary: &DashboardSummary, id: Uuid) -> &TeamRollup {
        summary.teams.iter().find(|t| t.team_id == id).unwrap()
    }

    #[test]
    fn test_two_team_scenario() {
        let (bundle, team_a, team_b) = scenario();
        let summary = aggregate(&bundle, Utc::now());

        let a = team_rollup(&summary, team_a);
        assert_eq!(a.member_count, 2);
        assert_eq!(a.documents_count, 3);
        assert_eq!(a.documents.strategy, 3);
        assert_eq!(a.documents.meeting, 0);
        assert_eq!(a.documents.financial, 0);
        assert_eq!(a.total_messages_count, 5);
        assert_eq!(a.messages.private, 3);
        assert_eq!(a.messages.team, 2);

        let b = team_rollup(&summary, team_b);
        assert_eq!(b.member_count, 1);
        assert_eq!(b.documents_count, 1);
        assert_eq!(b.documents.financial, 1);
        assert_eq!(b.total_messages_count, 0);

        assert_eq!(summary.totals.total_users, 3);
        assert_eq!(summary.totals.total_teams, 2);
        assert_eq!(summary.totals.total_documents, 4);
        assert_eq!(summary.totals.total_messages, 5);
    }

    #[test]
    fn test_team_sums_match_global_totals() {
        let (bundle, _, _) = scenario();
        let summary = aggregate(&bundle, Utc::now());

        for category in DocumentCategory::ALL {
            let per_team: u64 = summary.teams.iter().map(|t| t.documents.get(category)).sum();
            assert_eq!(per_team, summary.totals.documents.get(category), "{category:?}");
        }

        let members: u64 = summary.teams.iter().map(|t| t.member_count).sum();
        assert_eq!(members, summary.totals.total_users);
    }

    #[test]
    fn test_user_rollups() {
        let (mut bundle, _, _) = scenario();
        let a1 = bundle.users[0].id;
        let b1 = bundle.users[2].id;
        bundle.gmail_connected = vec![a1];
        bundle.drive_connected = vec![b1];

        let summary = aggregate(&bundle, Utc::now());
        let first = &summary.users[0];
        assert_eq!(first.team_name, "Team A");
        assert_eq!(first.messages.private, 2);
        assert_eq!(first.messages.team, 1);
        assert_eq!(first.documents.strategy, 2);
        assert_eq!(first.documents_count, 2);
        assert!(first.has_documents);
        assert!(first.gmail_connected);
        assert!(!first.drive_connected);

        let third = &summary.users[2];
        assert_eq!(third.team_name, "Team B");
        assert!(third.drive_connected);
        assert_eq!(third.messages.total(), 0);
    }

    #[test]
    fn test_missing_or_unknown_team_is_no_team() {
        let known = team("Known");
        let teamless = user(None, None);
        let orphaned = user(Some(Uuid::new_v4()), None);

        let bundle = DashboardBundle {
            users: vec![teamless.clone(), orphaned.clone()],
            teams: vec![known],
            chat_messages: vec![message(orphaned.id, MessageMode::Team)],
            ..DashboardBundle::default()
        };

        let summary = aggregate(&bundle, Utc::now());
        assert_eq!(summary.users[0].team_name, NO_TEAM);
        assert_eq!(summary.users[1].team_name, NO_TEAM);
        assert!(!summary.users[0].has_documents);
        assert_eq!(summary.teams[0].member_count, 0);
        assert_eq!(summary.teams[0].total_messages_count, 0);
        assert_eq!(summary.totals.total_messages, 1);
    }

    #[test]
    fn test_active_windows_are_inclusive_and_skip_never_active() {
        let now = Utc::now();
        let bundle = DashboardBundle {
            users: vec![
                user(None, Some(now - Duration::days(7))),
                user(None, Some(now - Duration::days(7) - Duration::seconds(1))),
                user(None, Some(now - Duration::days(30))),
                user(None, Some(now - Duration::days(31))),
                user(None, None),
            ],
            ..DashboardBundle::default()
        };

        let totals = aggregate(&bundle, now).totals;
        assert_eq!(totals.active_users_7d, 1);
        assert_eq!(totals.active_users_30d, 3);
    }

    #[test]
    fn test_report_split_by_frequency() {
        let t = team("Ops");
        let member = user(Some(t.id), None);
        let bundle = DashboardBundle {
            reports: vec![
                report(member.id, None),
                report(member.id, Some("")),
                report(member.id, Some("manual")),
                report(member.id, Some("weekly")),
                report(member.id, Some("daily")),
                report(member.id, Some("biweekly")),
                report(member.id, Some("Weekly")),
            ],
            users: vec![member],
            teams: vec![t],
            ..DashboardBundle::default()
        };

        let summary = aggregate(&bundle, Utc::now());
        assert_eq!(summary.teams[0].manual_reports, 3);
        assert_eq!(summary.teams[0].scheduled_reports, 4);
        assert_eq!(summary.totals.manual_reports, 3);
        assert_eq!(summary.totals.scheduled_reports, 4);
    }

    #[test]
    fn test_empty_bundle_gives_zeroes() {
        let summary = aggregate(&DashboardBundle::default(), Utc::now());
        assert!(summary.users.is_empty());
        assert!(summary.teams.is_empty());
        assert_eq!(summary.totals, GlobalSummary::default());
    }
}
