//! Credential workflows
//!
//! Sign-up, login, federated login and logout. Each workflow chains its
//! identity and document store calls, writes the session hint on success
//! and surfaces any failure to the user, naming the stage that failed.

use app_state::{HintStore, InvalidationReason, SessionHint, SessionHintError, SubmissionGuard};
use backend_client::documents::to_fields;
use backend_client::{AuthUser, DocumentStore, FederatedProvider, IdentityService};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::page::{show_signed_in, ElementId, Page};
use crate::records::{UserRecord, USERS};
use crate::validation::{require, ValidationError};

/// Notification shown once an account has been created
pub const ACCOUNT_REGISTERED: &str = "Account Registered!";

/// Notification shown after a successful login
pub const LOGIN_SUCCESSFUL: &str = "Login Successful!";

/// Notification shown when the signed-in identity has no user record
pub const USER_NOT_FOUND: &str = "Login failed: User not found";

/// Steps of the credential workflows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    /// Creating the account with the identity service
    CreateAccount,
    /// Writing the user record
    SaveUserRecord,
    /// Signing in with email and password
    SignIn,
    /// Reading the user record
    LoadUserRecord,
    /// Federated provider consent and sign-in
    ProviderSignIn,
    /// Terminating the session
    SignOut,
}

impl fmt::Display for AuthStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthStage::CreateAccount => "create account",
            AuthStage::SaveUserRecord => "save user record",
            AuthStage::SignIn => "sign in",
            AuthStage::LoadUserRecord => "load user record",
            AuthStage::ProviderSignIn => "provider sign-in",
            AuthStage::SignOut => "sign out",
        };
        f.write_str(name)
    }
}

/// Credential workflow errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Form input rejected before any network call
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A backend call failed
    #[error("{stage} failed: {source}")]
    Service {
        /// Stage that failed
        stage: AuthStage,
        /// Backend error
        #[source]
        source: backend_client::Error,
    },

    /// The signed-in identity has no user record
    #[error("User not found: {uid}")]
    UserNotFound {
        /// uid of the identity
        uid: String,
    },

    /// The session hint could not be written
    #[error("Session hint error: {0}")]
    Hint(#[from] SessionHintError),

    /// The same workflow is already running
    #[error("A sign-up is already in progress")]
    Busy,
}

/// Result type for credential workflows
pub type Result<T> = std::result::Result<T, AuthError>;

impl AuthError {
    fn at(stage: AuthStage) -> impl FnOnce(backend_client::Error) -> AuthError {
        move |source| AuthError::Service { stage, source }
    }

    /// Stage that failed, for backend failures
    pub fn stage(&self) -> Option<AuthStage> {
        match self {
            AuthError::Service { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Notification to show for this failure, if any
    pub fn user_message(&self, workflow: &str) -> Option<String> {
        match self {
            AuthError::Validation(_) => Some("Please enter both email and password.".to_string()),
            AuthError::Service { stage, source } => {
                Some(format!("{} failed ({}): {}", workflow, stage, source))
            }
            AuthError::UserNotFound { .. } => Some(USER_NOT_FOUND.to_string()),
            AuthError::Hint(e) => Some(format!("{} failed: {}", workflow, e)),
            AuthError::Busy => None,
        }
    }
}

/// Email and password as typed in the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Email
    pub email: String,
    /// Password
    pub password: String,
}

impl Credentials {
    /// Create credentials
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into(), password: password.into() }
    }

    /// Read the credentials from the page's form inputs
    pub fn from_page(page: &dyn Page) -> Self {
        Self {
            email: page.value(ElementId::EmailInput).unwrap_or_default(),
            password: page.value(ElementId::PasswordInput).unwrap_or_default(),
        }
    }

    /// Reject empty fields
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        require("email", &self.email)?;
        require("password", &self.password)
    }
}

/// Sign-up, login and logout against the identity service
pub struct CredentialWorkflows {
    identity: Arc<dyn IdentityService>,
    documents: Arc<dyn DocumentStore>,
    hints: HintStore,
    page: Arc<dyn Page>,
    sign_up_guard: SubmissionGuard,
}

impl CredentialWorkflows {
    /// Create the workflows
    pub fn new(
        identity: Arc<dyn IdentityService>,
        documents: Arc<dyn DocumentStore>,
        hints: HintStore,
        page: Arc<dyn Page>,
    ) -> Self {
        Self {
            identity,
            documents,
            hints,
            page,
            sign_up_guard: SubmissionGuard::new("sign-up"),
        }
    }

    // ========================================================================
    // Workflows
    // ========================================================================

    /// Create an account, save its user record, then log in
    pub async fn sign_up(&self, credentials: &Credentials) -> Result<SessionHint> {
        let result = self.try_sign_up(credentials).await;
        self.report("Sign-up", result)
    }

    /// Sign up with the credentials typed in the form
    pub async fn sign_up_from_page(&self) -> Result<SessionHint> {
        let credentials = Credentials::from_page(self.page.as_ref());
        self.sign_up(&credentials).await
    }

    /// Log in with email and password
    pub async fn log_in(&self, credentials: &Credentials) -> Result<SessionHint> {
        let result = self.try_log_in(credentials).await;
        self.report("Login", result)
    }

    /// Log in with the credentials typed in the form
    pub async fn log_in_from_page(&self) -> Result<SessionHint> {
        let credentials = Credentials::from_page(self.page.as_ref());
        self.log_in(&credentials).await
    }

    /// Log in through a federated provider, creating the user record on
    /// first use
    pub async fn log_in_with_provider(&self, provider: FederatedProvider) -> Result<SessionHint> {
        let result = self.try_log_in_with_provider(provider).await;
        let workflow = format!("{} login", provider.display_name());
        self.report(&workflow, result)
    }

    /// Terminate the session, clear the local store and reload the page
    pub async fn log_out(&self) -> Result<()> {
        let result = self.try_log_out().await;
        self.report("Logout", result)
    }

    // ========================================================================
    // Steps
    // ========================================================================

    async fn try_sign_up(&self, credentials: &Credentials) -> Result<SessionHint> {
        credentials.validate()?;
        let _in_flight = self.sign_up_guard.try_begin().ok_or(AuthError::Busy)?;

        let user = self
            .identity
            .create_account(&credentials.email, &credentials.password)
            .await
            .map_err(AuthError::at(AuthStage::CreateAccount))?;

        self.save_user_record(&user, UserRecord::new(&credentials.email, Utc::now()))
            .await?;
        tracing::info!("Registered account {}", credentials.email);
        self.page.alert(ACCOUNT_REGISTERED);

        let user = self
            .identity
            .sign_in(&credentials.email, &credentials.password)
            .await
            .map_err(AuthError::at(AuthStage::SignIn))?;

        self.complete_sign_in(&user).await
    }

    async fn try_log_in(&self, credentials: &Credentials) -> Result<SessionHint> {
        credentials.validate()?;

        let user = self
            .identity
            .sign_in(&credentials.email, &credentials.password)
            .await
            .map_err(AuthError::at(AuthStage::SignIn))?;

        self.complete_sign_in(&user).await
    }

    async fn try_log_in_with_provider(&self, provider: FederatedProvider) -> Result<SessionHint> {
        let user = self
            .identity
            .sign_in_with_provider(provider)
            .await
            .map_err(AuthError::at(AuthStage::ProviderSignIn))?;

        if let Some(record) = self.load_user_record(&user).await? {
            return self.finish(&user, record.posts, LOGIN_SUCCESSFUL);
        }

        tracing::info!("First {} login for {}, creating user record", provider.display_name(), user.email);
        self.save_user_record(&user, UserRecord::new(&user.email, Utc::now()))
            .await?;
        let message = format!("{} {}", provider.display_name(), LOGIN_SUCCESSFUL);
        self.finish(&user, 0, &message)
    }

    async fn try_log_out(&self) -> Result<()> {
        self.identity
            .sign_out()
            .await
            .map_err(AuthError::at(AuthStage::SignOut))?;
        tracing::info!("User logged out");

        self.hints.invalidate(&InvalidationReason::Logout)?;
        self.page.reload();
        Ok(())
    }

    async fn complete_sign_in(&self, user: &AuthUser) -> Result<SessionHint> {
        let record = self
            .load_user_record(user)
            .await?
            .ok_or_else(|| AuthError::UserNotFound { uid: user.uid.clone() })?;

        self.finish(user, record.posts, LOGIN_SUCCESSFUL)
    }

    fn finish(&self, user: &AuthUser, posts: u32, message: &str) -> Result<SessionHint> {
        let hint = SessionHint::new(&user.email, posts);
        self.hints.remember(&hint)?;
        tracing::info!("Signed in as {}", user.email);

        self.page.alert(message);
        show_signed_in(self.page.as_ref());
        Ok(hint)
    }

    async fn load_user_record(&self, user: &AuthUser) -> Result<Option<UserRecord>> {
        let document = self
            .documents
            .get(USERS, &user.uid)
            .await
            .map_err(AuthError::at(AuthStage::LoadUserRecord))?;

        document
            .map(|doc| doc.decode())
            .transpose()
            .map_err(AuthError::at(AuthStage::LoadUserRecord))
    }

    async fn save_user_record(&self, user: &AuthUser, record: UserRecord) -> Result<()> {
        let fields = to_fields(&record).map_err(AuthError::at(AuthStage::SaveUserRecord))?;
        self.documents
            .set(USERS, &user.uid, fields)
            .await
            .map_err(AuthError::at(AuthStage::SaveUserRecord))
    }

    fn report<T>(&self, workflow: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            match e {
                AuthError::Busy => tracing::warn!("{} ignored: {}", workflow, e),
                _ => tracing::error!("{} failed: {}", workflow, e),
            }
            if let Some(message) = e.user_message(workflow) {
                self.page.alert(&message);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::testing::RecordingPage;
    use crate::page::Route;
    use app_state::session::{EMAIL_KEY, POSTS_KEY};
    use backend_client::memory::{DocumentOp, IdentityOp};
    use backend_client::{MemoryDocumentStore, MemoryIdentity};
    use storage::{LocalStore, MemoryStore};

    struct Fixture {
        identity: Arc<MemoryIdentity>,
        documents: Arc<MemoryDocumentStore>,
        local: Arc<MemoryStore>,
        page: Arc<RecordingPage>,
        workflows: CredentialWorkflows,
    }

    fn fixture() -> Fixture {
        let identity = MemoryIdentity::shared();
        let documents = MemoryDocumentStore::shared();
        let local = Arc::new(MemoryStore::new());
        let page = Arc::new(RecordingPage::new(Route::Login));
        let workflows = CredentialWorkflows::new(
            identity.clone(),
            documents.clone(),
            HintStore::new(local.clone()),
            page.clone(),
        );
        Fixture { identity, documents, local, page, workflows }
    }

    #[tokio::test]
    async fn test_sign_up_creates_record_and_hint() {
        let f = fixture();
        let hint = f
            .workflows
            .sign_up(&Credentials::new("a@x.com", "secret1"))
            .await
            .unwrap();

        assert_eq!(hint, SessionHint::new("a@x.com", 0));
        assert_eq!(f.local.get(EMAIL_KEY).unwrap().as_deref(), Some("a@x.com"));
        assert_eq!(f.local.get(POSTS_KEY).unwrap().as_deref(), Some("0"));
        assert_eq!(f.page.alerts(), vec![ACCOUNT_REGISTERED, LOGIN_SUCCESSFUL]);
        assert_eq!(f.page.is_visible(ElementId::Logout), Some(true));

        let uid = f.identity.uid_of("a@x.com").unwrap();
        let record: UserRecord = f.documents.get(USERS, &uid).await.unwrap().unwrap().decode().unwrap();
        assert_eq!(record.email, "a@x.com");
        assert_eq!(record.posts, 0);
    }

    #[tokio::test]
    async fn test_sign_up_reads_form_inputs() {
        let f = fixture();
        f.page.fill(ElementId::EmailInput, "form@x.com");
        f.page.fill(ElementId::PasswordInput, "secret1");

        let hint = f.workflows.sign_up_from_page().await.unwrap();
        assert_eq!(hint.email, "form@x.com");
    }

    #[tokio::test]
    async fn test_sign_up_validation_short_circuits() {
        let f = fixture();
        let err = f
            .workflows
            .sign_up(&Credentials::new("", "secret1"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Validation(ValidationError::EmptyField("email"))));
        assert!(f.identity.uid_of("").is_none());
        assert_eq!(f.page.alerts(), vec!["Please enter both email and password."]);
    }

    #[tokio::test]
    async fn test_sign_up_duplicate_email_names_stage() {
        let f = fixture();
        f.workflows
            .sign_up(&Credentials::new("a@x.com", "secret1"))
            .await
            .unwrap();

        let err = f
            .workflows
            .sign_up(&Credentials::new("a@x.com", "secret1"))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(AuthStage::CreateAccount));
        let last = f.page.alerts().pop().unwrap();
        assert_eq!(last, "Sign-up failed (create account): EMAIL_EXISTS");
    }

    #[tokio::test]
    async fn test_sign_up_record_write_failure() {
        let f = fixture();
        f.documents.fail_next(DocumentOp::Set, "Missing or insufficient permissions.");

        let err = f
            .workflows
            .sign_up(&Credentials::new("a@x.com", "secret1"))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(AuthStage::SaveUserRecord));
        assert!(!f.page.alerts().contains(&ACCOUNT_REGISTERED.to_string()));
        assert!(f.local.is_empty());
    }

    #[tokio::test]
    async fn test_log_in_uses_record_post_count() {
        let f = fixture();
        f.workflows
            .sign_up(&Credentials::new("a@x.com", "secret1"))
            .await
            .unwrap();
        let uid = f.identity.uid_of("a@x.com").unwrap();
        let mut record = UserRecord::new("a@x.com", Utc::now());
        record.posts = 7;
        f.documents.set(USERS, &uid, to_fields(&record).unwrap()).await.unwrap();

        let hint = f
            .workflows
            .log_in(&Credentials::new("a@x.com", "secret1"))
            .await
            .unwrap();

        assert_eq!(hint.post_count, 7);
        assert_eq!(f.local.get(POSTS_KEY).unwrap().as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn test_log_in_without_record_is_user_not_found() {
        let f = fixture();
        f.identity.create_account("orphan@x.com", "secret1").await.unwrap();

        let err = f
            .workflows
            .log_in(&Credentials::new("orphan@x.com", "secret1"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::UserNotFound { .. }));
        assert_eq!(f.page.alerts(), vec![USER_NOT_FOUND]);
        assert!(f.local.get(EMAIL_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_log_in_wrong_password() {
        let f = fixture();
        f.workflows
            .sign_up(&Credentials::new("a@x.com", "secret1"))
            .await
            .unwrap();

        let err = f
            .workflows
            .log_in(&Credentials::new("a@x.com", "wrong-password"))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(AuthStage::SignIn));
    }

    #[tokio::test]
    async fn test_provider_login_creates_record_once() {
        let f = fixture();
        f.identity.grant_consent("g@x.com");

        let hint = f
            .workflows
            .log_in_with_provider(FederatedProvider::Google)
            .await
            .unwrap();
        assert_eq!(hint, SessionHint::new("g@x.com", 0));
        assert_eq!(f.page.alerts(), vec!["Google Login Successful!"]);
        assert_eq!(f.documents.count(USERS), 1);

        f.workflows
            .log_in_with_provider(FederatedProvider::Google)
            .await
            .unwrap();
        assert_eq!(f.documents.count(USERS), 1);
        assert_eq!(f.page.alerts().last().map(String::as_str), Some(LOGIN_SUCCESSFUL));
    }

    #[tokio::test]
    async fn test_provider_consent_dismissed() {
        let f = fixture();
        let err = f
            .workflows
            .log_in_with_provider(FederatedProvider::Google)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(AuthStage::ProviderSignIn));
        assert!(f.page.alerts()[0].starts_with("Google login failed (provider sign-in)"));
        assert_eq!(f.documents.count(USERS), 0);
    }

    #[tokio::test]
    async fn test_log_out_clears_store_and_reloads() {
        let f = fixture();
        f.workflows
            .sign_up(&Credentials::new("a@x.com", "secret1"))
            .await
            .unwrap();
        f.local.set("theme", "dark").unwrap();

        f.workflows.log_out().await.unwrap();

        assert!(f.identity.current_user().is_none());
        assert!(f.local.is_empty());
        assert_eq!(f.page.log.lock().reloads, 1);
    }

    #[tokio::test]
    async fn test_log_out_failure_keeps_hint() {
        let f = fixture();
        f.workflows
            .sign_up(&Credentials::new("a@x.com", "secret1"))
            .await
            .unwrap();
        f.identity.fail_next(IdentityOp::SignOut, "backend unavailable");

        let err = f.workflows.log_out().await.unwrap_err();

        assert_eq!(err.stage(), Some(AuthStage::SignOut));
        assert_eq!(f.local.get(EMAIL_KEY).unwrap().as_deref(), Some("a@x.com"));
        assert_eq!(f.page.log.lock().reloads, 0);
    }

    #[test]
    fn test_busy_has_no_notification() {
        assert!(AuthError::Busy.user_message("Sign-up").is_none());
    }
}
