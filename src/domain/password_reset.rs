use rand::{RngCore, rngs::OsRng};
use subtle::ConstantTimeEq;
use time::OffsetDateTime;

/// Random bytes per reset token (160 bits).
pub const RESET_TOKEN_BYTES: usize = 20;

pub const RESET_EMAIL_SUBJECT: &str = "Password Reset";

/// A reset token together with its expiry. Holding both in one value keeps
/// the token and its deadline from ever being stored apart.
#[derive(Clone, PartialEq, Eq)]
pub struct PendingReset {
    pub(crate) token: String,
    pub(crate) expires_at: OffsetDateTime,
}

impl PendingReset {
    #[must_use]
    pub const fn new(token: String, expires_at: OffsetDateTime) -> Self {
        Self { token, expires_at }
    }

    /// Issues a fresh token from the OS CSPRNG, hex-encoded.
    #[must_use]
    pub fn generate(expires_at: OffsetDateTime) -> Self {
        let mut bytes = [0u8; RESET_TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self::new(hex::encode(bytes), expires_at)
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub const fn expires_at(&self) -> OffsetDateTime {
        self.expires_at
    }

    /// Strictly before expiry; the expiry instant itself is already invalid.
    #[must_use]
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at > now
    }

    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        self.token.as_bytes().ct_eq(candidate.as_bytes()).into()
    }
}

impl std::fmt::Debug for PendingReset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingReset").field("token", &"<redacted>").field("expires_at", &self.expires_at).finish()
    }
}

/// Builds `<base-url>/reset/<token>`. The token is inserted verbatim.
#[must_use]
pub fn reset_link(base_url: &str, token: &str) -> String {
    format!("{}/reset/{}", base_url.trim_end_matches('/'), token)
}

/// Replaces the token in every `/reset/<token>` link with `<redacted>`.
#[must_use]
pub fn redact_reset_links(text: &str) -> String {
    const MARKER: &str = "/reset/";

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(MARKER) {
        let after = &rest[pos + MARKER.len()..];
        let token_len = after.find(char::is_whitespace).unwrap_or(after.len());
        out.push_str(&rest[..pos + MARKER.len()]);
        if token_len > 0 {
            out.push_str("<redacted>");
        }
        rest = &after[token_len..];
    }
    out.push_str(rest);
    out
}

#[must_use]
pub fn reset_email_body(reset_url: &str) -> String {
    format!(
        "You are receiving this because you (or someone else) requested a password reset for your account.\n\n\
         Please click on the following link, or paste it into your browser to complete the process within one hour of receiving it:\n\n\
         {reset_url}\n\n\
         If you did not request this, please ignore this email and your password will remain unchanged."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn test_generated_token_shape() {
        let expires = OffsetDateTime::now_utc() + Duration::hours(1);
        let a = PendingReset::generate(expires);
        let b = PendingReset::generate(expires);

        assert_eq!(a.token().len(), RESET_TOKEN_BYTES * 2);
        assert!(a.token().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a.token(), b.token());
    }

    #[test]
    fn test_expiry_is_strict() {
        let expires = OffsetDateTime::UNIX_EPOCH + Duration::days(1);
        let reset = PendingReset::new("t".to_string(), expires);

        assert!(reset.is_valid_at(expires - Duration::nanoseconds(1)));
        assert!(!reset.is_valid_at(expires));
        assert!(!reset.is_valid_at(expires + Duration::seconds(1)));
    }

    #[test]
    fn test_reset_link_format() {
        assert_eq!(reset_link("http://localhost:3000", "abc123"), "http://localhost:3000/reset/abc123");
        assert_eq!(reset_link("https://example.com/", "abc123"), "https://example.com/reset/abc123");
    }

    #[test]
    fn test_email_body_contains_link() {
        let body = reset_email_body("http://host/reset/tok");
        assert!(body.contains("\n\nhttp://host/reset/tok\n\n"));
        assert!(body.starts_with("You are receiving this because"));
        assert!(body.ends_with("your password will remain unchanged."));
    }

    #[test]
    fn test_redact_reset_links_hides_every_token() {
        let body = reset_email_body("http://host/reset/0123abcd");
        let redacted = redact_reset_links(&body);

        assert!(!redacted.contains("0123abcd"));
        assert!(redacted.contains("\n\nhttp://host/reset/<redacted>\n\n"));
        assert!(redacted.starts_with("You are receiving this because"));

        assert_eq!(redact_reset_links("a /reset/x b /reset/y"), "a /reset/<redacted> b /reset/<redacted>");
        assert_eq!(redact_reset_links("no link here"), "no link here");
        assert_eq!(redact_reset_links("dangling /reset/"), "dangling /reset/");
    }
}
