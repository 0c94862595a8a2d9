//! Identity service boundary
//!
//! Account creation, credential verification and session lifecycle are
//! owned by the hosted identity service. Session changes are published on
//! a `tokio::sync::watch` channel so that observers see the current value
//! on subscription and every change after it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::Result;

/// A signed-in identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Stable user id assigned by the identity service
    pub uid: String,
    /// Email address of the account
    pub email: String,
}

impl AuthUser {
    /// Create a new identity
    pub fn new(uid: impl Into<String>, email: impl Into<String>) -> Self {
        Self { uid: uid.into(), email: email.into() }
    }
}

/// Federated sign-in providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FederatedProvider {
    /// Google accounts
    Google,
}

impl FederatedProvider {
    /// Provider id understood by the identity service
    pub fn provider_id(&self) -> &'static str {
        match self {
            FederatedProvider::Google => "google.com",
        }
    }

    /// Display name used in user-facing messages
    pub fn display_name(&self) -> &'static str {
        match self {
            FederatedProvider::Google => "Google",
        }
    }
}

/// Credential produced by a provider consent flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCredential {
    /// Provider that issued the token
    pub provider: FederatedProvider,
    /// OpenID Connect id token
    pub id_token: String,
}

/// Provider-mediated consent flow (popup, redirect, device flow...)
#[async_trait]
pub trait ConsentFlow: Send + Sync {
    /// Ask the user to consent and return the provider credential
    async fn authorize(&self, provider: FederatedProvider) -> Result<ProviderCredential>;
}

/// Hosted identity service
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Create an account and sign it in
    async fn create_account(&self, email: &str, password: &str) -> Result<AuthUser>;

    /// Sign in with email and password
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser>;

    /// Sign in through a federated provider's consent flow
    async fn sign_in_with_provider(&self, provider: FederatedProvider) -> Result<AuthUser>;

    /// Terminate the current session
    async fn sign_out(&self) -> Result<()>;

    /// Currently signed-in user, if any
    fn current_user(&self) -> Option<AuthUser>;

    /// Subscribe to session changes
    fn subscribe(&self) -> watch::Receiver<Option<AuthUser>>;
}
