/// Database layer
///
/// - `pool`: Postgres connection pool and health check
/// - `migrations`: Embedded schema migrations

pub mod migrations;
pub mod pool;
