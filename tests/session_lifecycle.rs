//! Session hint lifecycle across page loads

use std::sync::Arc;

use app_core::session::LOGIN_REQUIRED;
use app_core::{Credentials, ElementId, Page, Route, Site};
use app_state::{HintStore, SessionHint};
use app_ui::HeadlessPage;
use backend_client::{AuthUser, BackendConfig, BackendRegistry, IdentityService, MemoryConnector};
use storage::{KvConfig, KvStore, LocalStore, MemoryStore};
use tempfile::TempDir;

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

struct Browser {
    registry: BackendRegistry,
    connector: MemoryConnector,
    config: BackendConfig,
    local: Arc<dyn LocalStore>,
}

impl Browser {
    fn with_store(local: Arc<dyn LocalStore>) -> Self {
        inkwell::init_tracing();
        Self {
            registry: BackendRegistry::new(),
            connector: MemoryConnector::new(),
            config: BackendConfig::new("key", "blog.example.com", "blog"),
            local,
        }
    }

    fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    async fn open(&self, route: Route) -> (Site, Arc<HeadlessPage>) {
        let page = Arc::new(HeadlessPage::new(route));
        let site = Site::start(
            &self.config,
            &self.registry,
            &self.connector,
            page.clone(),
            self.local.clone(),
        )
        .await
        .unwrap();
        settle().await;
        (site, page)
    }

    async fn sign_up(&self, email: &str) {
        let (site, _) = self.open(Route::Login).await;
        site.auth()
            .sign_up(&Credentials::new(email, "secret1"))
            .await
            .unwrap();
    }

    fn remember(&self, email: &str) {
        HintStore::new(self.local.clone())
            .remember(&SessionHint::new(email, 0))
            .unwrap();
    }
}

#[tokio::test]
async fn test_signed_in_home_shows_controls() {
    let browser = Browser::new();
    browser.sign_up("a@x.com").await;

    let (site, home) = browser.open(Route::Home).await;

    assert!(site.is_reconciling());
    assert_eq!(home.is_visible(ElementId::GetStarted), Some(false));
    assert_eq!(home.is_visible(ElementId::CreatePostLink), Some(true));
    assert_eq!(home.is_visible(ElementId::Logout), Some(true));
    assert_eq!(
        home.attribute(ElementId::ProfilePicture, "src").as_deref(),
        Some("../images/profile.jpg")
    );
    assert!(home.alerts().is_empty());
}

#[tokio::test]
async fn test_logout_then_reload_redirects() {
    let browser = Browser::new();
    browser.sign_up("a@x.com").await;

    let (site, home) = browser.open(Route::Home).await;
    site.auth().log_out().await.unwrap();
    settle().await;

    assert_eq!(home.reloads(), 1);
    assert!(browser.local.get("email").unwrap().is_none());
    assert!(browser.connector.identity().current_user().is_none());
    drop(site);

    let (site, home) = browser.open(Route::Home).await;
    assert!(!site.is_reconciling());
    assert_eq!(home.alerts(), vec![LOGIN_REQUIRED]);
    assert_eq!(home.navigations(), vec![Route::Login]);
}

#[tokio::test]
async fn test_session_for_another_user_clears_hint() {
    let browser = Browser::new();
    browser.remember("a@x.com");
    browser
        .connector
        .identity()
        .force_session(Some(AuthUser::new("uid-9", "b@x.com")));

    let (_site, home) = browser.open(Route::Home).await;

    assert_eq!(home.alerts(), vec![LOGIN_REQUIRED]);
    assert_eq!(home.navigations(), vec![Route::Login]);
    assert!(browser.local.get("email").unwrap().is_none());
    assert_eq!(home.is_visible(ElementId::Logout), Some(false));
}

#[tokio::test]
async fn test_hint_without_backend_session_clears_hint() {
    let browser = Browser::new();
    browser.remember("a@x.com");
    browser.local.set("theme", "dark").unwrap();

    let (_site, home) = browser.open(Route::Home).await;

    assert_eq!(home.alerts(), vec![LOGIN_REQUIRED]);
    assert!(browser.local.get("theme").unwrap().is_none());
}

#[tokio::test]
async fn test_session_ending_after_load_redirects() {
    let browser = Browser::new();
    browser.sign_up("a@x.com").await;
    let (_site, home) = browser.open(Route::Home).await;
    assert!(home.alerts().is_empty());

    browser.connector.identity().force_session(None);
    settle().await;

    assert_eq!(home.alerts(), vec![LOGIN_REQUIRED]);
    assert_eq!(home.current_route(), Route::Login);
}

#[tokio::test]
async fn test_login_page_does_not_redirect_to_itself() {
    let browser = Browser::new();
    let (_site, login) = browser.open(Route::Login).await;

    assert_eq!(login.alerts(), vec![LOGIN_REQUIRED]);
    assert!(login.navigations().is_empty());
    assert_eq!(login.current_route(), Route::Login);
}

#[tokio::test]
async fn test_hint_persists_in_sled_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("local").to_string_lossy().into_owned();

    {
        let store = Arc::new(KvStore::new(KvConfig::new(&path).origin("blog.example.com")).unwrap());
        let browser = Browser::with_store(store.clone());
        browser.sign_up("a@x.com").await;
        store.flush().unwrap();
    }

    let store = KvStore::new(KvConfig::new(&path).origin("blog.example.com")).unwrap();
    let hint = HintStore::new(Arc::new(store)).load().unwrap();
    assert_eq!(hint, Some(SessionHint::new("a@x.com", 0)));
}
