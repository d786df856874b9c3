//! Login and setup flow.
//!
//! `LoggedOut -> Authenticating -> CredentialCheck -> CredentialSetup ->
//! Ready`, with `CredentialCheck` skipping straight to `Ready` when the
//! document store already holds a key. Denial drops back to `LoggedOut` and
//! leaves no session behind.

use shared::chat::Session;

/// The identity allow-list, carried over verbatim from the original
/// deployment. Clear-text exact match on the access code, username matched
/// case-insensitively. This is a known security deficiency (see DESIGN.md);
/// do not extend it without replacing the mechanism.
const ALLOWED_IDENTITIES: &[(&str, &str)] = &[
    ("daksh lohchab", "886"),
    ("operator", "quantum"),
    ("admin", "singularity"),
    ("tiya", "protocol"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    LoggedOut,
    Authenticating,
    CredentialCheck,
    CredentialSetup,
    Ready,
}

pub fn identity_allowed(username: &str, access_code: &str) -> bool {
    let user = username.trim().to_lowercase();
    ALLOWED_IDENTITIES
        .iter()
        .any(|(u, code)| *u == user && *code == access_code)
}

pub struct LoginFlow {
    state: FlowState,
    session: Option<Session>,
    denial: Option<String>,
}

impl Default for LoginFlow {
    fn default() -> Self {
        Self {
            state: FlowState::LoggedOut,
            session: None,
            denial: None,
        }
    }
}

impl LoginFlow {
    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    pub fn denial(&self) -> Option<&str> {
        self.denial.as_deref()
    }

    /// Check the credentials. Returns `true` when the caller should start
    /// the stored-key lookup; on denial the machine is back in `LoggedOut`
    /// with no session created or touched.
    pub fn submit_login(&mut self, username: &str, access_code: &str) -> bool {
        self.state = FlowState::Authenticating;
        self.denial = None;

        if identity_allowed(username, access_code) {
            tracing::info!("access granted for {}", username.trim().to_lowercase());
            self.session = Some(Session::new(username.trim().to_lowercase()));
            self.state = FlowState::CredentialCheck;
            true
        } else {
            tracing::warn!("access denied");
            self.denial = Some("ACCESS DENIED: identity not recognized".to_string());
            self.state = FlowState::LoggedOut;
            false
        }
    }

    /// Stored-key lookup finished. A found key goes straight to `Ready`;
    /// no key routes to the setup screen.
    pub fn lookup_finished(&mut self, stored_key: Option<String>) {
        if self.state != FlowState::CredentialCheck {
            return;
        }
        match stored_key {
            Some(key) => {
                if let Some(session) = self.session.as_mut() {
                    session.set_api_key(key);
                }
                self.state = FlowState::Ready;
            }
            None => self.state = FlowState::CredentialSetup,
        }
    }

    /// Lookup errors are not fatal; the user can enter a key by hand.
    pub fn lookup_failed(&mut self) {
        if self.state == FlowState::CredentialCheck {
            self.state = FlowState::CredentialSetup;
        }
    }

    /// A key passed validation and was persisted.
    pub fn key_accepted(&mut self, key: String) {
        if self.state != FlowState::CredentialSetup {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.set_api_key(key);
        }
        self.state = FlowState::Ready;
    }

    /// Proceed without a key (limited mode).
    pub fn skip_setup(&mut self) {
        if self.state == FlowState::CredentialSetup {
            self.state = FlowState::Ready;
        }
    }

    /// Log out and drop the session.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_reaches_ready_via_setup_when_no_stored_key() {
        let mut flow = LoginFlow::default();
        assert!(flow.submit_login("operator", "quantum"));
        assert_eq!(flow.state(), FlowState::CredentialCheck);

        flow.lookup_finished(None);
        assert_eq!(flow.state(), FlowState::CredentialSetup);

        flow.key_accepted("AIza-test-key".to_string());
        assert_eq!(flow.state(), FlowState::Ready);
        assert_eq!(flow.session().unwrap().api_key(), Some("AIza-test-key"));
    }

    #[test]
    fn test_stored_key_skips_setup() {
        let mut flow = LoginFlow::default();
        assert!(flow.submit_login("Admin", "singularity"));
        flow.lookup_finished(Some("stored-key".to_string()));
        assert_eq!(flow.state(), FlowState::Ready);
        assert_eq!(flow.session().unwrap().api_key(), Some("stored-key"));
    }

    #[test]
    fn test_wrong_secret_returns_to_logged_out_with_untouched_session() {
        let mut flow = LoginFlow::default();
        assert!(!flow.submit_login("operator", "wrong"));
        assert_eq!(flow.state(), FlowState::LoggedOut);
        assert!(flow.session().is_none());
        assert!(flow.denial().is_some());
    }

    #[test]
    fn test_username_case_insensitive_code_exact() {
        assert!(identity_allowed("  OPERATOR ", "quantum"));
        assert!(!identity_allowed("operator", "QUANTUM"));
        assert!(!identity_allowed("intruder", "quantum"));
    }

    #[test]
    fn test_lookup_failure_routes_to_setup() {
        let mut flow = LoginFlow::default();
        flow.submit_login("tiya", "protocol");
        flow.lookup_failed();
        assert_eq!(flow.state(), FlowState::CredentialSetup);
        // Session survives the failed lookup.
        assert!(flow.session().is_some());
    }

    #[test]
    fn test_skip_enters_limited_mode_without_key() {
        let mut flow = LoginFlow::default();
        flow.submit_login("operator", "quantum");
        flow.lookup_finished(None);
        flow.skip_setup();
        assert_eq!(flow.state(), FlowState::Ready);
        assert!(!flow.session().unwrap().has_api_key());
    }

    #[test]
    fn test_reset_drops_everything() {
        let mut flow = LoginFlow::default();
        flow.submit_login("operator", "quantum");
        flow.reset();
        assert_eq!(flow.state(), FlowState::LoggedOut);
        assert!(flow.session().is_none());
    }
}
