use rusqlite::Connection;

use crate::api::LoginGrant;
use crate::db::{self, KEY_CURRENT_PAGE, KEY_PROFILE, KEY_TOKEN};
use crate::error::{ConsoleError, Result};
use crate::models::{Profile, Session};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Checking,
    Anonymous,
    Authenticated(Session),
}

/// Login/logout state backed by the local store.
#[derive(Debug)]
pub struct SessionGate {
    state: SessionState,
    last_error: Option<String>,
}

impl Default for SessionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionGate {
    pub fn new() -> Self {
        Self {
            state: SessionState::Checking,
            last_error: None,
        }
    }

    /// Build a gate and immediately resolve `Checking` from the store.
    pub fn load(conn: &Connection) -> Result<Self> {
        let mut gate = Self::new();
        gate.check(conn)?;
        Ok(gate)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated(_))
    }

    /// Authenticated only when both the credential and a readable profile
    /// are stored.
    pub fn check(&mut self, conn: &Connection) -> Result<()> {
        let token = db::get_item(conn, KEY_TOKEN)?.filter(|t| !t.is_empty());
        let profile = db::get_item(conn, KEY_PROFILE)?;

        self.state = match (token, profile) {
            (Some(credential), Some(raw)) => match serde_json::from_str::<Profile>(&raw) {
                Ok(profile) => SessionState::Authenticated(Session { credential, profile }),
                Err(e) => {
                    log::warn!("stored profile is unreadable: {e}");
                    SessionState::Anonymous
                }
            },
            _ => SessionState::Anonymous,
        };
        log::debug!("session check: authenticated={}", self.is_authenticated());
        Ok(())
    }

    /// Record the outcome of a login call. A successful grant is persisted;
    /// a failure leaves the gate anonymous and remembers the message.
    pub fn complete_login(
        &mut self,
        conn: &Connection,
        outcome: Result<LoginGrant>,
    ) -> Result<&Session> {
        match outcome {
            Ok(grant) => {
                let profile = Profile::from_user_data(&grant.user);
                db::set_item(conn, KEY_TOKEN, &grant.token)?;
                db::set_item(conn, KEY_PROFILE, &serde_json::to_string(&profile)?)?;
                self.last_error = None;
                self.state = SessionState::Authenticated(Session {
                    credential: grant.token,
                    profile,
                });
                self.session()
            }
            Err(e) => {
                self.state = SessionState::Anonymous;
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Drop the credential, profile and page marker. `purge` empties the
    /// whole store, ledger included.
    pub fn logout(&mut self, conn: &Connection, purge: bool) -> Result<()> {
        if purge {
            db::clear(conn)?;
        } else {
            for key in [KEY_TOKEN, KEY_PROFILE, KEY_CURRENT_PAGE] {
                db::remove_item(conn, key)?;
            }
        }
        self.state = SessionState::Anonymous;
        self.last_error = None;
        Ok(())
    }

    pub fn session(&self) -> Result<&Session> {
        match &self.state {
            SessionState::Authenticated(session) => Ok(session),
            _ => Err(ConsoleError::MissingCredential),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_db, KEY_TRANSACTIONS};
    use serde_json::json;

    fn grant() -> LoginGrant {
        LoginGrant {
            token: "tok-123".to_string(),
            user: json!({"name": "Asha", "email": "asha@example.com"}),
        }
    }

    #[test]
    fn test_starts_checking() {
        let gate = SessionGate::new();
        assert_eq!(gate.state(), &SessionState::Checking);
        assert!(!gate.is_authenticated());
    }

    #[test]
    fn test_empty_store_is_anonymous() {
        let (_dir, conn) = test_db();
        let gate = SessionGate::load(&conn).unwrap();
        assert_eq!(gate.state(), &SessionState::Anonymous);
        assert!(matches!(gate.session(), Err(ConsoleError::MissingCredential)));
    }

    #[test]
    fn test_token_without_profile_is_anonymous() {
        let (_dir, conn) = test_db();
        db::set_item(&conn, KEY_TOKEN, "tok").unwrap();
        let gate = SessionGate::load(&conn).unwrap();
        assert_eq!(gate.state(), &SessionState::Anonymous);
    }

    #[test]
    fn test_login_persists_and_survives_reload() {
        let (_dir, conn) = test_db();
        let mut gate = SessionGate::load(&conn).unwrap();
        let session = gate.complete_login(&conn, Ok(grant())).unwrap();
        assert_eq!(session.profile.name, "Asha");

        let reloaded = SessionGate::load(&conn).unwrap();
        let session = reloaded.session().unwrap();
        assert_eq!(session.credential, "tok-123");
        assert_eq!(session.profile.email, "asha@example.com");
    }

    #[test]
    fn test_failed_login_stays_anonymous() {
        let (_dir, conn) = test_db();
        let mut gate = SessionGate::load(&conn).unwrap();
        let result = gate.complete_login(&conn, Err(ConsoleError::Server("Invalid credentials".into())));
        assert!(result.is_err());
        assert_eq!(gate.state(), &SessionState::Anonymous);
        assert_eq!(gate.last_error(), Some("Invalid credentials"));
        assert_eq!(db::get_item(&conn, KEY_TOKEN).unwrap(), None);
    }

    #[test]
    fn test_logout_clears_session_keys() {
        let (_dir, conn) = test_db();
        let mut gate = SessionGate::load(&conn).unwrap();
        gate.complete_login(&conn, Ok(grant())).unwrap();
        db::set_item(&conn, KEY_CURRENT_PAGE, "2").unwrap();
        db::set_item(&conn, KEY_TRANSACTIONS, "[]").unwrap();

        gate.logout(&conn, false).unwrap();
        assert_eq!(gate.state(), &SessionState::Anonymous);
        assert_eq!(db::get_item(&conn, KEY_TOKEN).unwrap(), None);
        assert_eq!(db::get_item(&conn, KEY_PROFILE).unwrap(), None);
        assert_eq!(db::get_item(&conn, KEY_CURRENT_PAGE).unwrap(), None);
        assert_eq!(db::get_item(&conn, KEY_TRANSACTIONS).unwrap().as_deref(), Some("[]"));

        let reloaded = SessionGate::load(&conn).unwrap();
        assert_eq!(reloaded.state(), &SessionState::Anonymous);
    }

    #[test]
    fn test_logout_purge_wipes_ledger() {
        let (_dir, conn) = test_db();
        let mut gate = SessionGate::load(&conn).unwrap();
        db::set_item(&conn, KEY_TRANSACTIONS, "[]").unwrap();
        gate.logout(&conn, true).unwrap();
        assert_eq!(db::get_item(&conn, KEY_TRANSACTIONS).unwrap(), None);
        assert_eq!(db::count_items(&conn).unwrap(), 0);
    }
}
