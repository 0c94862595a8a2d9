//! Backend configuration
//!
//! The configuration document lives next to the site's scripts and is
//! fetched at page load. The backend client built from it is initialized
//! at most once per page lifetime through [`BackendRegistry`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::documents::DocumentStore;
use crate::http::{HttpClient, HttpRequest};
use crate::identity::IdentityService;

/// Location of the configuration document, relative to the page URL
pub const CONFIG_PATH: &str = "../js/backend-config.json";

/// Default base URL of the hosted identity service
pub const DEFAULT_IDENTITY_ENDPOINT: &str = "https://identitytoolkit.googleapis.com/v1";

/// Default base URL of the hosted document store
pub const DEFAULT_DOCUMENTS_ENDPOINT: &str = "https://firestore.googleapis.com/v1";

/// Errors raised while loading the configuration or connecting the backend
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// The configuration resource answered with a non-success status
    #[error("Failed to load backend config: {0}")]
    Status(u16),

    /// The page URL could not be resolved
    #[error("Invalid config location: {0}")]
    Url(String),

    /// The configuration document is not valid
    #[error("Invalid backend config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Network failure while fetching the configuration
    #[error("Failed to fetch backend config: {0}")]
    Transport(#[source] crate::Error),

    /// The backend client could not be built from the configuration
    #[error("Failed to connect backend: {0}")]
    Connect(#[source] crate::Error),
}

/// Connection settings for the hosted services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// API key sent with every identity and document request
    pub api_key: String,
    /// Domain the identity service serves its sign-in handlers from
    pub auth_domain: String,
    /// Project identifier of the document store
    pub project_id: String,
    /// Blob storage bucket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_bucket: Option<String>,
    /// Messaging sender id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messaging_sender_id: Option<String>,
    /// Application id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    /// Base URL of the identity service
    #[serde(default = "default_identity_endpoint")]
    pub identity_endpoint: String,
    /// Base URL of the document store
    #[serde(default = "default_documents_endpoint")]
    pub documents_endpoint: String,
}

fn default_identity_endpoint() -> String {
    DEFAULT_IDENTITY_ENDPOINT.to_string()
}

fn default_documents_endpoint() -> String {
    DEFAULT_DOCUMENTS_ENDPOINT.to_string()
}

impl BackendConfig {
    /// Create a configuration pointing at the hosted services
    pub fn new(
        api_key: impl Into<String>,
        auth_domain: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            auth_domain: auth_domain.into(),
            project_id: project_id.into(),
            storage_bucket: None,
            messaging_sender_id: None,
            app_id: None,
            identity_endpoint: default_identity_endpoint(),
            documents_endpoint: default_documents_endpoint(),
        }
    }

    /// Point both services at another host (emulator, test server)
    pub fn with_endpoints(
        mut self,
        identity_endpoint: impl Into<String>,
        documents_endpoint: impl Into<String>,
    ) -> Self {
        self.identity_endpoint = identity_endpoint.into();
        self.documents_endpoint = documents_endpoint.into();
        self
    }
}

/// Fetches the configuration document
pub struct ConfigLoader {
    http: HttpClient,
    url: String,
}

impl ConfigLoader {
    /// Create a loader for the page at `page_url`
    pub fn new(http: HttpClient, page_url: &str) -> Result<Self, ConfigLoadError> {
        Self::with_path(http, page_url, CONFIG_PATH)
    }

    /// Create a loader for a configuration document at a custom relative path
    pub fn with_path(http: HttpClient, page_url: &str, path: &str) -> Result<Self, ConfigLoadError> {
        let url = reqwest::Url::parse(page_url)
            .and_then(|base| base.join(path))
            .map_err(|e| ConfigLoadError::Url(format!("{}: {}", page_url, e)))?;

        Ok(Self { http, url: url.to_string() })
    }

    /// Resolved URL of the configuration document
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch and parse the configuration
    pub async fn load(&self) -> Result<BackendConfig, ConfigLoadError> {
        match self.http.send::<BackendConfig>(HttpRequest::get(&self.url)).await {
            Ok(response) => Ok(response.data),
            Err(crate::Error::Service { status, .. }) => Err(ConfigLoadError::Status(status)),
            Err(crate::Error::Json(e)) => Err(ConfigLoadError::Parse(e)),
            Err(e) => Err(ConfigLoadError::Transport(e)),
        }
    }
}

/// Handles to the two backend services
#[derive(Clone)]
pub struct BackendHandles {
    /// Identity service
    pub identity: Arc<dyn IdentityService>,
    /// Document store
    pub documents: Arc<dyn DocumentStore>,
}

impl BackendHandles {
    /// Bundle two service handles
    pub fn new(identity: Arc<dyn IdentityService>, documents: Arc<dyn DocumentStore>) -> Self {
        Self { identity, documents }
    }
}

/// Builds service handles from a configuration
pub trait BackendConnector: Send + Sync {
    /// Connect to the backend described by `config`
    fn connect(&self, config: &BackendConfig) -> crate::Result<BackendHandles>;
}

/// Page-lifetime holder of the backend handles
#[derive(Default)]
pub struct BackendRegistry {
    handles: OnceCell<BackendHandles>,
}

impl BackendRegistry {
    /// Create an uninitialized registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize the backend, or return the existing handles if already initialized
    pub async fn initialize(
        &self,
        config: &BackendConfig,
        connector: &dyn BackendConnector,
    ) -> Result<BackendHandles, ConfigLoadError> {
        let handles = self
            .handles
            .get_or_try_init(|| async {
                let handles = connector.connect(config).map_err(ConfigLoadError::Connect)?;
                tracing::info!("Backend initialized for project {}", config.project_id);
                Ok::<_, ConfigLoadError>(handles)
            })
            .await?;

        Ok(handles.clone())
    }

    /// Whether the backend has been initialized
    pub fn is_initialized(&self) -> bool {
        self.handles.initialized()
    }

    /// The handles, if initialized
    pub fn handles(&self) -> Option<BackendHandles> {
        self.handles.get().cloned()
    }
}
