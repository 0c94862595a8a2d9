//! Walks through a sign-up, a post and the feed on headless pages.
//!
//! With `INKWELL_SITE_URL` set, the backend configuration is fetched
//! relative to that page URL and the hosted services are used. Otherwise
//! everything runs against in-memory backends.

use anyhow::{Context, Result};
use std::sync::Arc;

use inkwell::app_core::{Credentials, ElementId, Route, Site};
use inkwell::app_ui::HeadlessPage;
use inkwell::backend_client::http::{HttpClient, HttpClientConfig};
use inkwell::backend_client::{
    BackendConfig, BackendConnector, BackendRegistry, ConfigLoader, MemoryConnector, RestConnector,
};
use inkwell::storage::{KvConfig, KvStore, LocalStore};

const DEMO_EMAIL: &str = "reader@example.com";
const DEMO_PASSWORD: &str = "correct-horse";

#[tokio::main]
async fn main() -> Result<()> {
    inkwell::init_tracing();

    let data_dir = std::env::var("INKWELL_DATA_DIR").unwrap_or_else(|_| "inkwell-data".to_string());
    let local: Arc<dyn LocalStore> = Arc::new(
        KvStore::new(KvConfig::new(&data_dir).origin("inkwell-demo"))
            .with_context(|| format!("opening local store at {}", data_dir))?,
    );

    let registry = BackendRegistry::new();
    let (config, connector): (BackendConfig, Box<dyn BackendConnector>) =
        match std::env::var("INKWELL_SITE_URL") {
            Ok(site_url) => {
                let http = HttpClient::new(HttpClientConfig::default())?;
                let loader = ConfigLoader::new(http, &site_url)?;
                tracing::info!("Loading backend config from {}", loader.url());
                (loader.load().await?, Box::new(RestConnector::new()))
            }
            Err(_) => (
                BackendConfig::new("demo-key", "demo.example.com", "inkwell-demo"),
                Box::new(MemoryConnector::new()),
            ),
        };

    // Login page: create an account
    let login = Arc::new(HeadlessPage::new(Route::Login));
    let site = Site::start(&config, &registry, connector.as_ref(), login.clone(), local.clone()).await?;
    login.type_into(ElementId::EmailInput, DEMO_EMAIL);
    login.type_into(ElementId::PasswordInput, DEMO_PASSWORD);
    let signed_up = site.auth().sign_up_from_page().await;
    if signed_up.is_err() {
        site.auth()
            .log_in(&Credentials::new(DEMO_EMAIL, DEMO_PASSWORD))
            .await
            .context("logging in with the demo account")?;
    }
    drop(site);

    // Editor page: publish a post
    let editor = Arc::new(HeadlessPage::new(Route::CreatePost));
    let site = Site::start(&config, &registry, connector.as_ref(), editor.clone(), local.clone()).await?;
    editor.type_into(ElementId::HeadingInput, "Hello from Inkwell");
    editor.type_into(ElementId::ContentInput, "First line of the post\nSecond line\nThird line");
    editor.type_into(ElementId::CategoryInput, "demo");
    let post_id = site.publisher().publish().await?;
    tracing::info!("Published post {}", post_id);
    drop(site);

    // Home page: show the feed
    let home = Arc::new(HeadlessPage::new(Route::Home));
    let _site = Site::start(&config, &registry, connector.as_ref(), home.clone(), local).await?;
    for card in home.children(ElementId::RecentPosts) {
        println!("{}\n", card);
    }
    for alert in [login.alerts(), editor.alerts(), home.alerts()].concat() {
        println!("alert: {}", alert);
    }

    Ok(())
}
