use time::OffsetDateTime;

/// Handle returned to a client after a successful login. `token` is shown
/// once; only its hash is persisted.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub expires_at: OffsetDateTime,
}
