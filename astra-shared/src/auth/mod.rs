/// Authentication and authorization
///
/// - [`password`]: Argon2id password hashing
/// - [`jwt`]: Access and refresh tokens
/// - [`middleware`]: The per-request [`middleware::AuthContext`]
/// - [`authorization`]: Admin, financial and team access checks

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
