/// Admin dashboards
///
/// [`bundle::DashboardBundle`] is the raw data for one dashboard render,
/// fetched in a single bulk call. [`aggregator::aggregate`] turns it into
/// per-user, per-team and global statistics.

pub mod aggregator;
pub mod bundle;

pub use aggregator::{aggregate, CategoryCounts, DashboardSummary, GlobalSummary, MessageCounts, TeamRollup, UserRollup, NO_TEAM};
pub use bundle::DashboardBundle;
