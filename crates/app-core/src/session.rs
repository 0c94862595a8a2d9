//! Session reconciliation
//!
//! A page that needs a signed-in user first checks the local session hint.
//! If there is none the user is sent to the login page straight away.
//! Otherwise the page follows the identity service's session changes and
//! compares each live session against the hint:
//!
//! - no live session: the hint is cleared and the user is redirected
//! - a live session for another email: same as above
//! - a matching live session: the header switches to its signed-in state
//!
//! The hint is re-read on every change, so a login completed on this page
//! is picked up. Once the hint is gone, changes are ignored.

use app_state::{HintStore, InvalidationReason, SessionHintError};
use backend_client::{AuthUser, IdentityService};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::page::{show_signed_in, Page, Route};

/// Notification shown before redirecting to the login page
pub const LOGIN_REQUIRED: &str = "You need to log in to access this page.";

/// Outcome of comparing the hint with the live session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionVerdict {
    /// Hint and live session agree
    Authenticated(AuthUser),
    /// No hint is stored; nothing to reconcile
    NoHint,
    /// Hint present but the identity service has no session
    NoBackendSession,
    /// Hint and live session name different emails
    Mismatch {
        /// Email in the hint
        cached: String,
        /// Email of the live session
        live: String,
    },
}

impl SessionVerdict {
    /// Whether the page may stay in its signed-in state
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionVerdict::Authenticated(_))
    }
}

/// Show the login-required notification and go to the login page
///
/// The navigation is skipped when the login page is already shown.
pub fn redirect_to_login(page: &dyn Page) {
    page.alert(LOGIN_REQUIRED);
    if page.current_route() != Route::Login {
        page.navigate(Route::Login);
    }
}

/// Keeps the session hint consistent with the identity service
///
/// A sign-in on a page that is already reconciling changes the live session
/// before the new hint is written. If the stored hint names another email,
/// that change is seen as a mismatch: the old hint is cleared and the page
/// redirects, even though the sign-in then completes and stores its own
/// hint. The next page load reconciles against that new hint.
#[derive(Clone)]
pub struct SessionReconciler {
    identity: Arc<dyn IdentityService>,
    hints: HintStore,
    page: Arc<dyn Page>,
}

impl SessionReconciler {
    /// Create a reconciler
    pub fn new(identity: Arc<dyn IdentityService>, hints: HintStore, page: Arc<dyn Page>) -> Self {
        Self { identity, hints, page }
    }

    /// Local checkpoint: the remembered email, or a redirect when there is none
    pub fn check_local(&self) -> Result<Option<String>, SessionHintError> {
        match self.hints.cached_email()? {
            Some(email) => {
                tracing::debug!("Session hint found for {}", email);
                Ok(Some(email))
            }
            None => {
                tracing::info!("No session hint, redirecting to login");
                redirect_to_login(self.page.as_ref());
                Ok(None)
            }
        }
    }

    /// Compare the current hint with a live session and act on the result
    pub fn reconcile(&self, live: Option<&AuthUser>) -> Result<SessionVerdict, SessionHintError> {
        let Some(cached) = self.hints.cached_email()? else {
            return Ok(SessionVerdict::NoHint);
        };

        let verdict = match live {
            None => SessionVerdict::NoBackendSession,
            Some(user) if user.email != cached => SessionVerdict::Mismatch {
                cached,
                live: user.email.clone(),
            },
            Some(user) => SessionVerdict::Authenticated(user.clone()),
        };

        match &verdict {
            SessionVerdict::Authenticated(user) => {
                tracing::info!("User authenticated: {}", user.email);
                show_signed_in(self.page.as_ref());
            }
            SessionVerdict::NoBackendSession => {
                self.hints.invalidate(&InvalidationReason::NoBackendSession)?;
                redirect_to_login(self.page.as_ref());
            }
            SessionVerdict::Mismatch { cached, live } => {
                tracing::warn!("Session mismatch: remembered {}, signed in as {}", cached, live);
                self.hints.invalidate(&InvalidationReason::Mismatch {
                    cached: cached.clone(),
                    live: live.clone(),
                })?;
                redirect_to_login(self.page.as_ref());
            }
            SessionVerdict::NoHint => {}
        }

        Ok(verdict)
    }

    /// Run the local checkpoint, then follow session changes in a task
    ///
    /// Returns `None` when the checkpoint redirected.
    pub fn start(self) -> Option<JoinHandle<()>> {
        match self.check_local() {
            Ok(Some(_)) => {}
            Ok(None) => return None,
            Err(e) => {
                tracing::error!("Failed to read session hint: {}", e);
                return None;
            }
        }

        let changes = self.identity.subscribe();
        Some(tokio::spawn(self.follow(changes)))
    }

    /// Reconcile the current session, then every change until the identity
    /// service goes away
    pub async fn follow(self, mut changes: watch::Receiver<Option<AuthUser>>) {
        loop {
            let live = changes.borrow_and_update().clone();
            match self.reconcile(live.as_ref()) {
                Ok(SessionVerdict::NoHint) => tracing::debug!("Session changed with no hint stored"),
                Ok(_) => {}
                Err(e) => tracing::error!("Failed to reconcile session: {}", e),
            }

            if changes.changed().await.is_err() {
                tracing::debug!("Identity service closed, stopping session reconciliation");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::testing::RecordingPage;
    use crate::page::ElementId;
    use app_state::SessionHint;
    use backend_client::MemoryIdentity;
    use storage::{LocalStore, MemoryStore};

    fn reconciler(route: Route) -> (SessionReconciler, Arc<MemoryIdentity>, Arc<MemoryStore>, Arc<RecordingPage>) {
        let identity = MemoryIdentity::shared();
        let local = Arc::new(MemoryStore::new());
        let page = Arc::new(RecordingPage::new(route));
        let reconciler = SessionReconciler::new(identity.clone(), HintStore::new(local.clone()), page.clone());
        (reconciler, identity, local, page)
    }

    fn remember(local: &Arc<MemoryStore>, email: &str) {
        HintStore::new(local.clone())
            .remember(&SessionHint::new(email, 0))
            .unwrap();
    }

    #[test]
    fn test_check_local_without_hint_redirects() {
        let (reconciler, _, _, page) = reconciler(Route::Home);

        assert!(reconciler.check_local().unwrap().is_none());
        assert_eq!(page.alerts(), vec![LOGIN_REQUIRED]);
        assert_eq!(page.log.lock().navigations, vec![Route::Login]);
    }

    #[test]
    fn test_redirect_skips_navigation_on_login_page() {
        let (reconciler, _, _, page) = reconciler(Route::Login);

        reconciler.check_local().unwrap();
        assert_eq!(page.alerts(), vec![LOGIN_REQUIRED]);
        assert!(page.log.lock().navigations.is_empty());
    }

    #[test]
    fn test_matching_session_shows_signed_in() {
        let (reconciler, _, local, page) = reconciler(Route::Home);
        remember(&local, "a@x.com");

        let user = AuthUser::new("uid-1", "a@x.com");
        let verdict = reconciler.reconcile(Some(&user)).unwrap();

        assert!(verdict.is_authenticated());
        assert_eq!(page.is_visible(ElementId::GetStarted), Some(false));
        assert!(page.alerts().is_empty());
    }

    #[test]
    fn test_mismatch_clears_and_redirects() {
        let (reconciler, _, local, page) = reconciler(Route::Home);
        remember(&local, "a@x.com");

        let verdict = reconciler
            .reconcile(Some(&AuthUser::new("uid-2", "b@x.com")))
            .unwrap();

        assert_eq!(
            verdict,
            SessionVerdict::Mismatch { cached: "a@x.com".to_string(), live: "b@x.com".to_string() }
        );
        assert!(local.is_empty());
        assert_eq!(page.alerts(), vec![LOGIN_REQUIRED]);
    }

    #[test]
    fn test_account_switch_before_new_hint_is_a_mismatch() {
        let (reconciler, _, local, page) = reconciler(Route::Home);
        remember(&local, "a@x.com");
        let switched = AuthUser::new("uid-2", "b@x.com");

        let verdict = reconciler.reconcile(Some(&switched)).unwrap();
        assert!(matches!(verdict, SessionVerdict::Mismatch { .. }));
        assert_eq!(page.alerts(), vec![LOGIN_REQUIRED]);

        remember(&local, "b@x.com");
        let verdict = reconciler.reconcile(Some(&switched)).unwrap();
        assert_eq!(verdict, SessionVerdict::Authenticated(switched));
        assert_eq!(page.alerts().len(), 1);
    }

    #[test]
    fn test_no_backend_session_clears_and_redirects() {
        let (reconciler, _, local, page) = reconciler(Route::Home);
        remember(&local, "a@x.com");

        let verdict = reconciler.reconcile(None).unwrap();

        assert_eq!(verdict, SessionVerdict::NoBackendSession);
        assert!(local.get("email").unwrap().is_none());
        assert_eq!(page.log.lock().navigations, vec![Route::Login]);
    }

    #[test]
    fn test_no_hint_is_left_alone() {
        let (reconciler, _, _, page) = reconciler(Route::Home);
        assert_eq!(reconciler.reconcile(None).unwrap(), SessionVerdict::NoHint);
        assert!(page.alerts().is_empty());
    }

    #[tokio::test]
    async fn test_start_without_hint_does_not_spawn() {
        let (reconciler, _, _, _) = reconciler(Route::Home);
        assert!(reconciler.start().is_none());
    }

    #[tokio::test]
    async fn test_follow_reacts_to_session_changes() {
        let (reconciler, identity, local, page) = reconciler(Route::Home);
        remember(&local, "a@x.com");
        identity.force_session(Some(AuthUser::new("uid-1", "a@x.com")));

        let task = reconciler.start().unwrap();
        tokio::task::yield_now().await;
        for _ in 0..10 {
            if page.is_visible(ElementId::Logout).is_some() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(page.is_visible(ElementId::Logout), Some(true));

        identity.force_session(Some(AuthUser::new("uid-9", "b@x.com")));
        for _ in 0..10 {
            if !page.alerts().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(page.alerts(), vec![LOGIN_REQUIRED]);
        assert!(local.is_empty());
        task.abort();
    }
}
