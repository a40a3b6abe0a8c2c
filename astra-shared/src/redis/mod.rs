/// Redis integration
///
/// - [`client`]: Connection-managed client with health checks
/// - [`changes`]: Realtime change feed over pub/sub
///
/// Redis is optional. Without it the change feed publishes nothing and the
/// realtime endpoint reports itself unavailable.

pub mod changes;
pub mod client;

pub use changes::{ChangeEvent, ChangeOp, ChangePublisher, ChangeTable};
pub use client::{RedisClient, RedisClientError, RedisConfig};
