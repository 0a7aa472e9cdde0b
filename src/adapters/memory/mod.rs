//! Process-local stores used when no database is configured, and by tests.

pub mod session_repo;
pub mod user_repo;

pub use session_repo::InMemorySessionRepository;
pub use user_repo::InMemoryUserRepository;
