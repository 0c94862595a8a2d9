//! In-memory backends
//!
//! Process-local implementations of [`IdentityService`] and
//! [`DocumentStore`] with the same observable semantics as the hosted
//! services, plus one-shot failure injection for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::config::{BackendConfig, BackendConnector, BackendHandles};
use crate::documents::{Document, DocumentStore, Fields, OrderDirection, Query};
use crate::identity::{AuthUser, FederatedProvider, IdentityService};
use crate::{Error, Result};

/// Identity operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityOp {
    /// `create_account`
    CreateAccount,
    /// `sign_in`
    SignIn,
    /// `sign_in_with_provider`
    ProviderSignIn,
    /// `sign_out`
    SignOut,
}

/// Document operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentOp {
    /// `get`
    Get,
    /// `set`
    Set,
    /// `add`
    Add,
    /// `query`
    Query,
}

#[derive(Debug, Clone)]
struct Account {
    uid: String,
    password: Option<String>,
}

/// In-memory identity service
pub struct MemoryIdentity {
    accounts: Mutex<HashMap<String, Account>>,
    consent: Mutex<std::result::Result<String, String>>,
    failures: Mutex<HashMap<IdentityOp, String>>,
    session: watch::Sender<Option<AuthUser>>,
    next_uid: AtomicU64,
    min_password_len: Option<usize>,
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentity {
    /// Create an empty identity service with no signed-in user
    pub fn new() -> Self {
        let (session, _) = watch::channel(None);
        Self {
            accounts: Mutex::new(HashMap::new()),
            consent: Mutex::new(Err("popup closed by user".to_string())),
            failures: Mutex::new(HashMap::new()),
            session,
            next_uid: AtomicU64::new(1),
            min_password_len: None,
        }
    }

    /// Reject new passwords shorter than `len` characters
    ///
    /// Off by default; any non-empty password is accepted.
    pub fn with_min_password_len(mut self, len: usize) -> Self {
        self.min_password_len = Some(len);
        self
    }

    /// Create a shareable handle
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Make provider consent flows succeed as `email` until changed
    pub fn grant_consent(&self, email: impl Into<String>) {
        *self.consent.lock() = Ok(email.into());
    }

    /// Make provider consent flows fail with `message` until changed
    pub fn deny_consent(&self, message: impl Into<String>) {
        *self.consent.lock() = Err(message.into());
    }

    /// Make the next call of `op` fail with a service error carrying `message`
    pub fn fail_next(&self, op: IdentityOp, message: impl Into<String>) {
        self.failures.lock().insert(op, message.into());
    }

    /// Replace the live session, as another tab or an expiry would
    pub fn force_session(&self, user: Option<AuthUser>) {
        self.session.send_replace(user);
    }

    /// uid of a registered email
    pub fn uid_of(&self, email: &str) -> Option<String> {
        self.accounts.lock().get(email).map(|a| a.uid.clone())
    }

    fn take_failure(&self, op: IdentityOp) -> Result<()> {
        match self.failures.lock().remove(&op) {
            Some(message) => Err(Error::service(503, "UNAVAILABLE", message)),
            None => Ok(()),
        }
    }

    fn allocate_uid(&self) -> String {
        format!("uid-{:04}", self.next_uid.fetch_add(1, AtomicOrdering::SeqCst))
    }

    fn start_session(&self, uid: String, email: &str) -> AuthUser {
        let user = AuthUser::new(uid, email);
        self.session.send_replace(Some(user.clone()));
        user
    }
}

#[async_trait]
impl IdentityService for MemoryIdentity {
    async fn create_account(&self, email: &str, password: &str) -> Result<AuthUser> {
        self.take_failure(IdentityOp::CreateAccount)?;

        if !email.contains('@') {
            return Err(Error::service(400, "INVALID_EMAIL", "INVALID_EMAIL"));
        }
        if let Some(min) = self.min_password_len {
            if password.chars().count() < min {
                return Err(Error::service(
                    400,
                    "WEAK_PASSWORD",
                    format!("WEAK_PASSWORD : Password should be at least {} characters", min),
                ));
            }
        }

        let uid = {
            let mut accounts = self.accounts.lock();
            if accounts.contains_key(email) {
                return Err(Error::service(400, "EMAIL_EXISTS", "EMAIL_EXISTS"));
            }
            let uid = self.allocate_uid();
            accounts.insert(
                email.to_string(),
                Account { uid: uid.clone(), password: Some(password.to_string()) },
            );
            uid
        };

        Ok(self.start_session(uid, email))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser> {
        self.take_failure(IdentityOp::SignIn)?;

        let account = self
            .accounts
            .lock()
            .get(email)
            .cloned()
            .ok_or_else(|| Error::service(400, "EMAIL_NOT_FOUND", "EMAIL_NOT_FOUND"))?;

        if account.password.as_deref() != Some(password) {
            return Err(Error::service(400, "INVALID_PASSWORD", "INVALID_PASSWORD"));
        }

        Ok(self.start_session(account.uid, email))
    }

    async fn sign_in_with_provider(&self, provider: FederatedProvider) -> Result<AuthUser> {
        self.take_failure(IdentityOp::ProviderSignIn)?;

        let email = self.consent.lock().clone().map_err(Error::Consent)?;
        tracing::debug!("{} consent granted for {}", provider.display_name(), email);

        let uid = {
            let mut accounts = self.accounts.lock();
            match accounts.get(&email) {
                Some(account) => account.uid.clone(),
                None => {
                    let uid = self.allocate_uid();
                    accounts.insert(email.clone(), Account { uid: uid.clone(), password: None });
                    uid
                }
            }
        };

        Ok(self.start_session(uid, &email))
    }

    async fn sign_out(&self) -> Result<()> {
        self.take_failure(IdentityOp::SignOut)?;
        self.session.send_replace(None);
        Ok(())
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.session.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<AuthUser>> {
        self.session.subscribe()
    }
}

#[derive(Debug, Clone)]
struct StoredDocument {
    seq: u64,
    fields: Fields,
}

/// In-memory document store
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<HashMap<String, HashMap<String, StoredDocument>>>,
    failures: Mutex<HashMap<DocumentOp, String>>,
    next_seq: AtomicU64,
}

impl MemoryDocumentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shareable handle
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Make the next call of `op` fail with a service error carrying `message`
    pub fn fail_next(&self, op: DocumentOp, message: impl Into<String>) {
        self.failures.lock().insert(op, message.into());
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: &str) -> usize {
        self.collections.lock().get(collection).map_or(0, HashMap::len)
    }

    fn take_failure(&self, op: DocumentOp) -> Result<()> {
        match self.failures.lock().remove(&op) {
            Some(message) => Err(Error::service(503, "UNAVAILABLE", message)),
            None => Ok(()),
        }
    }

    fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.take_failure(DocumentOp::Get)?;

        Ok(self
            .collections
            .lock()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|stored| Document::new(id, stored.fields.clone())))
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        self.take_failure(DocumentOp::Set)?;

        let mut collections = self.collections.lock();
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.get_mut(id) {
            Some(stored) => stored.fields = fields,
            None => {
                let seq = self.next_seq();
                docs.insert(id.to_string(), StoredDocument { seq, fields });
            }
        }
        Ok(())
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String> {
        self.take_failure(DocumentOp::Add)?;

        let seq = self.next_seq();
        let id = format!("doc-{:06}", seq);
        self.collections
            .lock()
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), StoredDocument { seq, fields });
        Ok(id)
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        self.take_failure(DocumentOp::Query)?;

        let collections = self.collections.lock();
        let Some(docs) = collections.get(&query.collection) else {
            return Ok(Vec::new());
        };

        // Documents without the order field are excluded, as the hosted store does.
        let mut matching: Vec<(&String, &StoredDocument, &Value)> = docs
            .iter()
            .filter_map(|(id, stored)| {
                stored.fields.get(&query.order_by).map(|value| (id, stored, value))
            })
            .collect();

        matching.sort_by(|a, b| compare_values(a.2, b.2).then(a.1.seq.cmp(&b.1.seq)));
        if query.direction == OrderDirection::Descending {
            matching.reverse();
        }

        Ok(matching
            .into_iter()
            .take(query.limit)
            .map(|(id, stored, _)| Document::new(id.clone(), stored.fields.clone()))
            .collect())
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Connector handing out one shared pair of in-memory backends
#[derive(Clone, Default)]
pub struct MemoryConnector {
    identity: Arc<MemoryIdentity>,
    documents: Arc<MemoryDocumentStore>,
}

impl MemoryConnector {
    /// Create a connector with empty backends
    pub fn new() -> Self {
        Self::default()
    }

    /// The identity service handed out
    pub fn identity(&self) -> &Arc<MemoryIdentity> {
        &self.identity
    }

    /// The document store handed out
    pub fn documents(&self) -> &Arc<MemoryDocumentStore> {
        &self.documents
    }
}

impl BackendConnector for MemoryConnector {
    fn connect(&self, config: &BackendConfig) -> Result<BackendHandles> {
        tracing::debug!("Connecting in-memory backends for project {}", config.project_id);
        Ok(BackendHandles::new(self.identity.clone(), self.documents.clone()))
    }
}
