//! REST backends for the hosted identity service and document store
//!
//! [`RestIdentity`] keeps the id token of the signed-in user and shares it
//! with [`RestDocumentStore`], which sends it as the bearer credential.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::sync::watch;

use crate::config::{BackendConfig, BackendConnector, BackendHandles};
use crate::documents::{Document, DocumentStore, Fields, Query};
use crate::http::{HttpClient, HttpClientConfig, HttpRequest};
use crate::identity::{AuthUser, ConsentFlow, FederatedProvider, IdentityService};
use crate::value;
use crate::{Error, Result};

/// Shared id token of the signed-in user
pub type TokenHandle = Arc<RwLock<Option<String>>>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    id_token: String,
}

/// Identity service speaking the hosted identity-toolkit REST API
pub struct RestIdentity {
    http: HttpClient,
    endpoint: String,
    api_key: String,
    request_uri: String,
    consent: Option<Arc<dyn ConsentFlow>>,
    session: watch::Sender<Option<AuthUser>>,
    token: TokenHandle,
}

impl RestIdentity {
    /// Create an identity client for `config`
    pub fn new(http: HttpClient, config: &BackendConfig) -> Self {
        let (session, _) = watch::channel(None);
        Self {
            http,
            endpoint: config.identity_endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_uri: format!("https://{}", config.auth_domain),
            consent: None,
            session,
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Attach the consent flow used for federated sign-in
    pub fn with_consent_flow(mut self, consent: Arc<dyn ConsentFlow>) -> Self {
        self.consent = Some(consent);
        self
    }

    /// Handle to the id token, for the document store
    pub fn token_handle(&self) -> TokenHandle {
        Arc::clone(&self.token)
    }

    async fn call(&self, method: &str, body: Value) -> Result<AuthUser> {
        let request = HttpRequest::post(format!("{}/accounts:{}", self.endpoint, method))
            .param("key", &self.api_key)
            .json_body(&body)?;

        let response: AuthResponse = self.http.send(request).await?.data;
        let email = response
            .email
            .ok_or_else(|| Error::service(400, "MISSING_EMAIL", "Account has no email address"))?;

        *self.token.write() = Some(response.id_token);
        let user = AuthUser::new(response.local_id, email);
        self.session.send_replace(Some(user.clone()));
        Ok(user)
    }
}

#[async_trait]
impl IdentityService for RestIdentity {
    async fn create_account(&self, email: &str, password: &str) -> Result<AuthUser> {
        self.call(
            "signUp",
            json!({ "email": email, "password": password, "returnSecureToken": true }),
        )
        .await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser> {
        self.call(
            "signInWithPassword",
            json!({ "email": email, "password": password, "returnSecureToken": true }),
        )
        .await
    }

    async fn sign_in_with_provider(&self, provider: FederatedProvider) -> Result<AuthUser> {
        let consent = self
            .consent
            .as_ref()
            .ok_or_else(|| Error::Consent("no consent flow configured".to_string()))?;

        let credential = consent.authorize(provider).await?;
        let post_body = format!(
            "id_token={}&providerId={}",
            credential.id_token,
            credential.provider.provider_id()
        );

        self.call(
            "signInWithIdp",
            json!({
                "postBody": post_body,
                "requestUri": self.request_uri,
                "returnIdpCredential": true,
                "returnSecureToken": true,
            }),
        )
        .await
    }

    async fn sign_out(&self) -> Result<()> {
        *self.token.write() = None;
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

#[derive(Debug, Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl RawDocument {
    fn into_document(self) -> Result<Document> {
        let id = self.name.rsplit('/').next().unwrap_or_default().to_string();
        Ok(Document::new(id, value::decode_fields(&self.fields)?))
    }
}

#[derive(Debug, Deserialize)]
struct RunQueryItem {
    #[serde(default)]
    document: Option<RawDocument>,
}

/// Document store speaking the hosted document REST API
pub struct RestDocumentStore {
    http: HttpClient,
    base: String,
    api_key: String,
    token: TokenHandle,
}

impl RestDocumentStore {
    /// Create a document client for `config`, authenticated through `token`
    pub fn new(http: HttpClient, config: &BackendConfig, token: TokenHandle) -> Self {
        Self {
            http,
            base: format!(
                "{}/projects/{}/databases/(default)/documents",
                config.documents_endpoint.trim_end_matches('/'),
                config.project_id
            ),
            api_key: config.api_key.clone(),
            token,
        }
    }

    fn request(&self, request: HttpRequest) -> HttpRequest {
        let token = self.token.read().clone();
        request.param("key", &self.api_key).bearer(token.as_deref())
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.base, collection, id)
    }
}

#[async_trait]
impl DocumentStore for RestDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let request = self.request(HttpRequest::get(self.document_url(collection, id)));
        match self.http.send_optional::<RawDocument>(request).await? {
            Some(response) => response.data.into_document().map(Some),
            None => Ok(None),
        }
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let body = json!({ "fields": value::encode_fields(&fields) });
        let request = self
            .request(HttpRequest::patch(self.document_url(collection, id)))
            .json_body(&body)?;
        self.http.send::<Value>(request).await?;
        Ok(())
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String> {
        let body = json!({ "fields": value::encode_fields(&fields) });
        let request = self
            .request(HttpRequest::post(format!("{}/{}", self.base, collection)))
            .json_body(&body)?;
        let document = self.http.send::<RawDocument>(request).await?.data.into_document()?;
        Ok(document.id)
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        let mut structured = json!({
            "from": [{ "collectionId": query.collection }],
            "orderBy": [{
                "field": { "fieldPath": query.order_by },
                "direction": query.direction.as_str(),
            }],
        });
        if query.limit != usize::MAX {
            structured["limit"] = json!(query.limit.min(i32::MAX as usize));
        }

        let request = self
            .request(HttpRequest::post(format!("{}:runQuery", self.base)))
            .json_body(&json!({ "structuredQuery": structured }))?;
        let items = self.http.send::<Vec<RunQueryItem>>(request).await?.data;

        items
            .into_iter()
            .filter_map(|item| item.document)
            .map(RawDocument::into_document)
            .collect()
    }
}

/// Connector producing the REST backends
#[derive(Default)]
pub struct RestConnector {
    http_config: HttpClientConfig,
    consent: Option<Arc<dyn ConsentFlow>>,
}

impl RestConnector {
    /// Create a connector with default HTTP settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Use custom HTTP settings
    pub fn with_http_config(mut self, config: HttpClientConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Attach the consent flow used for federated sign-in
    pub fn with_consent_flow(mut self, consent: Arc<dyn ConsentFlow>) -> Self {
        self.consent = Some(consent);
        self
    }
}

impl BackendConnector for RestConnector {
    fn connect(&self, config: &BackendConfig) -> Result<BackendHandles> {
        let http = HttpClient::new(self.http_config.clone())?;

        let mut identity = RestIdentity::new(http.clone(), config);
        if let Some(consent) = &self.consent {
            identity = identity.with_consent_flow(Arc::clone(consent));
        }
        let documents = RestDocumentStore::new(http, config, identity.token_handle());

        Ok(BackendHandles::new(Arc::new(identity), Arc::new(documents)))
    }
}
