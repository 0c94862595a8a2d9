//! Backend client library for Inkwell
//!
//! This crate wraps the hosted identity service and document store behind
//! two async traits, and provides the configuration loader, an HTTP
//! transport, REST implementations of both services and in-memory
//! implementations for tests and offline use.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod documents;
pub mod http;
pub mod identity;
pub mod memory;
pub mod rest;
pub mod value;

pub use config::{
    BackendConfig, BackendConnector, BackendHandles, BackendRegistry, ConfigLoadError,
    ConfigLoader,
};
pub use documents::{Document, DocumentStore, Fields, OrderDirection, Query};
pub use identity::{AuthUser, ConsentFlow, FederatedProvider, IdentityService, ProviderCredential};
pub use memory::{MemoryConnector, MemoryDocumentStore, MemoryIdentity};
pub use rest::{RestConnector, RestDocumentStore, RestIdentity};

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for backend operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error reported by the service, with its status code and raw message
    #[error("{message}")]
    Service {
        /// HTTP status code
        status: u16,
        /// Machine-readable code (e.g. "EMAIL_EXISTS", "NOT_FOUND")
        code: String,
        /// Message from the service
        message: String,
    },

    /// Federated consent flow failed or was dismissed
    #[error("Consent flow failed: {0}")]
    Consent(String),

    /// Operation requires a signed-in user
    #[error("No user is signed in")]
    NotSignedIn,
}

impl Error {
    /// Create a service error
    pub fn service(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service { status, code: code.into(), message: message.into() }
    }

    /// HTTP status of a service error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Service { status, .. } => Some(*status),
            Error::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
