//! Authentication context handed to each screen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A signed-in administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Full name if set, else the email address.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(self.email.as_str())
    }

    /// Uppercase first letter of every word of the full name, or of the
    /// email address when there is no name.
    pub fn initials(&self) -> String {
        let words: Vec<&str> = match self.full_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.split_whitespace().collect(),
            _ => vec![self.email.as_str()],
        };
        words
            .iter()
            .filter_map(|w| w.chars().next())
            .flat_map(char::to_uppercase)
            .collect()
    }
}

/// Session state as seen by a screen at mount time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    session: Option<Session>,
}

impl AuthContext {
    pub fn signed_in(session: Session) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    /// The session, if one exists and has not expired at `now`.
    pub fn live_session(&self, now: DateTime<Utc>) -> Option<&Session> {
        self.session.as_ref().filter(|s| s.is_live(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(full_name: Option<&str>) -> Session {
        Session {
            user_id: Uuid::new_v4(),
            email: "admin@clinic.test".into(),
            full_name: full_name.map(Into::into),
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    #[test]
    fn test_display_name_and_initials() {
        let s = session(Some("grace brewster hopper"));
        assert_eq!(s.display_name(), "grace brewster hopper");
        assert_eq!(s.initials(), "GBH");

        let s = session(None);
        assert_eq!(s.display_name(), "admin@clinic.test");
        assert_eq!(s.initials(), "A");

        let s = session(Some("  "));
        assert_eq!(s.display_name(), "admin@clinic.test");
    }

    #[test]
    fn test_live_session() {
        let now = Utc::now();
        let ctx = AuthContext::signed_in(session(None));
        assert!(ctx.live_session(now).is_some());
        assert!(ctx.live_session(now + Duration::hours(2)).is_none());
        assert!(AuthContext::signed_out().live_session(now).is_none());
    }
}
