//! Page bootstrap
//!
//! Loads the backend configuration, initializes the backend once, wires the
//! workflows to the page, starts session reconciliation and renders the feed.

use app_state::HintStore;
use backend_client::{
    BackendConfig, BackendConnector, BackendHandles, BackendRegistry, ConfigLoadError, ConfigLoader,
};
use std::sync::Arc;
use storage::LocalStore;
use tokio::task::JoinHandle;

use crate::auth::CredentialWorkflows;
use crate::feeds::FeedRenderer;
use crate::page::Page;
use crate::posts::PostPublisher;
use crate::session::SessionReconciler;

/// A loaded page with its workflows wired up
pub struct Site {
    handles: BackendHandles,
    auth: CredentialWorkflows,
    publisher: PostPublisher,
    feed: FeedRenderer,
    reconciler: Option<JoinHandle<()>>,
}

impl Site {
    /// Fetch the configuration and start the page
    ///
    /// A configuration failure is logged and returned; nothing else runs.
    pub async fn load(
        loader: &ConfigLoader,
        registry: &BackendRegistry,
        connector: &dyn BackendConnector,
        page: Arc<dyn Page>,
        local: Arc<dyn LocalStore>,
    ) -> Result<Self, ConfigLoadError> {
        let config = loader.load().await.map_err(|e| {
            tracing::error!("Error initializing backend: {}", e);
            e
        })?;

        Self::start(&config, registry, connector, page, local).await
    }

    /// Initialize the backend from a configuration and start the page
    pub async fn start(
        config: &BackendConfig,
        registry: &BackendRegistry,
        connector: &dyn BackendConnector,
        page: Arc<dyn Page>,
        local: Arc<dyn LocalStore>,
    ) -> Result<Self, ConfigLoadError> {
        let handles = registry.initialize(config, connector).await.map_err(|e| {
            tracing::error!("Error initializing backend: {}", e);
            e
        })?;

        Ok(Self::with_handles(handles, page, local).await)
    }

    /// Start the page on already initialized backend handles
    pub async fn with_handles(handles: BackendHandles, page: Arc<dyn Page>, local: Arc<dyn LocalStore>) -> Self {
        let hints = HintStore::new(local);

        let reconciler =
            SessionReconciler::new(handles.identity.clone(), hints.clone(), page.clone()).start();

        let feed = FeedRenderer::new(handles.documents.clone(), page.clone());
        let auth = CredentialWorkflows::new(
            handles.identity.clone(),
            handles.documents.clone(),
            hints.clone(),
            page.clone(),
        );
        let publisher = PostPublisher::new(
            handles.identity.clone(),
            handles.documents.clone(),
            hints,
            page,
            feed.clone(),
        );

        feed.refresh().await;

        Self { handles, auth, publisher, feed, reconciler }
    }

    /// Backend handles
    pub fn handles(&self) -> &BackendHandles {
        &self.handles
    }

    /// Sign-up, login and logout
    pub fn auth(&self) -> &CredentialWorkflows {
        &self.auth
    }

    /// Post publishing
    pub fn publisher(&self) -> &PostPublisher {
        &self.publisher
    }

    /// Recent-post feed
    pub fn feed(&self) -> &FeedRenderer {
        &self.feed
    }

    /// Whether session reconciliation is running
    pub fn is_reconciling(&self) -> bool {
        self.reconciler.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for Site {
    fn drop(&mut self) {
        if let Some(task) = self.reconciler.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::testing::RecordingPage;
    use crate::page::Route;
    use crate::session::LOGIN_REQUIRED;
    use backend_client::MemoryConnector;
    use storage::MemoryStore;

    #[tokio::test]
    async fn test_start_without_hint_redirects() {
        let registry = BackendRegistry::new();
        let connector = MemoryConnector::new();
        let page = Arc::new(RecordingPage::new(Route::Home));
        let config = BackendConfig::new("key", "demo.example.com", "demo");

        let site = Site::start(&config, &registry, &connector, page.clone(), Arc::new(MemoryStore::new()))
            .await
            .unwrap();

        assert!(registry.is_initialized());
        assert!(!site.is_reconciling());
        assert_eq!(page.alerts(), vec![LOGIN_REQUIRED]);
        assert!(page.log.lock().cards.is_empty());
    }

    #[tokio::test]
    async fn test_second_start_reuses_handles() {
        let registry = BackendRegistry::new();
        let connector = MemoryConnector::new();
        let config = BackendConfig::new("key", "demo.example.com", "demo");
        let local: Arc<dyn LocalStore> = Arc::new(MemoryStore::new());

        let first = Site::start(
            &config,
            &registry,
            &connector,
            Arc::new(RecordingPage::new(Route::Login)),
            local.clone(),
        )
        .await
        .unwrap();
        let second = Site::start(
            &config,
            &registry,
            &connector,
            Arc::new(RecordingPage::new(Route::Login)),
            local,
        )
        .await
        .unwrap();

        assert!(Arc::ptr_eq(&first.handles().documents, &second.handles().documents));
    }
}
