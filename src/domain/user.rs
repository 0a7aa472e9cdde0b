use crate::domain::password_reset::PendingReset;
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Where a user sits in the forgot-password cycle at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetState {
    NoPendingReset,
    PendingReset,
    /// A token is still stored but can no longer be redeemed. Behaves like
    /// `NoPendingReset` for every operation.
    Expired,
}

#[derive(Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub(crate) password_hash: String,
    pub(crate) reset: Option<PendingReset>,
    pub created_at: OffsetDateTime,
}

impl User {
    #[must_use]
    pub const fn pending_reset(&self) -> Option<&PendingReset> {
        self.reset.as_ref()
    }

    #[must_use]
    pub fn reset_state(&self, now: OffsetDateTime) -> ResetState {
        match &self.reset {
            None => ResetState::NoPendingReset,
            Some(reset) if reset.is_valid_at(now) => ResetState::PendingReset,
            Some(_) => ResetState::Expired,
        }
    }

    /// True only when `token` is the stored token and it has not yet expired.
    #[must_use]
    pub fn has_valid_reset_token(&self, token: &str, now: OffsetDateTime) -> bool {
        self.reset.as_ref().is_some_and(|reset| reset.matches(token) && reset.is_valid_at(now))
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("reset_pending", &self.reset.is_some())
            .field("created_at", &self.created_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn user_with_reset(reset: Option<PendingReset>) -> User {
        User {
            id: Uuid::new_v4(),
            username: "alice@example.com".to_string(),
            password_hash: "hash".to_string(),
            reset,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_reset_state_transitions_with_time() {
        let t0 = OffsetDateTime::UNIX_EPOCH + Duration::days(1000);
        let reset = PendingReset::new("abc".to_string(), t0 + Duration::hours(1));
        let user = user_with_reset(Some(reset));

        assert_eq!(user.reset_state(t0), ResetState::PendingReset);
        assert_eq!(user.reset_state(t0 + Duration::seconds(3599)), ResetState::PendingReset);
        assert_eq!(user.reset_state(t0 + Duration::hours(1)), ResetState::Expired);

        let user = user_with_reset(None);
        assert_eq!(user.reset_state(t0), ResetState::NoPendingReset);
    }

    #[test]
    fn test_has_valid_reset_token() {
        let t0 = OffsetDateTime::UNIX_EPOCH + Duration::days(1000);
        let user = user_with_reset(Some(PendingReset::new("abc".to_string(), t0 + Duration::hours(1))));

        assert!(user.has_valid_reset_token("abc", t0));
        assert!(!user.has_valid_reset_token("abd", t0));
        assert!(!user.has_valid_reset_token("ab", t0));
        assert!(!user.has_valid_reset_token("abc", t0 + Duration::hours(1)));
    }

    #[test]
    fn test_debug_redacts_hash() {
        let user = user_with_reset(None);
        let rendered = format!("{user:?}");
        assert!(!rendered.contains("\"hash\""));
        assert!(rendered.contains("<redacted>"));
    }
}
