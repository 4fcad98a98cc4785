use crate::item::Item;
use crate::loader::LoadedData;
use crate::params::Credentials;
use crate::provider::{ItemTypeTag, ProviderName};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use url::Url;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// The user/organization pair every backend call is made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub org_id: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            org_id: org_id.into(),
        }
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::new("TestUser", "TestOrg")
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("request to {endpoint} failed: {reason}")]
    Transport { endpoint: String, reason: String },
    #[error("{endpoint} responded with status {status}")]
    Status {
        endpoint: String,
        status: u16,
        detail: Option<String>,
    },
    #[error("{endpoint} returned an unusable response: {reason}")]
    InvalidResponse { endpoint: String, reason: String },
}

impl BackendError {
    /// Error detail supplied by the backend itself, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// Backend detail when present, otherwise the caller's generic sentence.
    pub fn user_message(&self, fallback: &str) -> String {
        self.detail()
            .map(str::to_string)
            .unwrap_or_else(|| fallback.to_string())
    }

    pub fn rejected(endpoint: impl Into<String>, status: u16, detail: impl Into<String>) -> Self {
        Self::Status {
            endpoint: endpoint.into(),
            status,
            detail: Some(detail.into()),
        }
    }
}

/// The three calls the connector makes against the integration backend.
#[async_trait]
pub trait IntegrationBackend: Send + Sync {
    async fn authorize(
        &self,
        provider: ProviderName,
        identity: &Identity,
        item_type: ItemTypeTag,
    ) -> Result<Url, BackendError>;

    async fn fetch_credentials(
        &self,
        provider: ProviderName,
        identity: &Identity,
        item_type: ItemTypeTag,
    ) -> Result<Credentials, BackendError>;

    async fn load(
        &self,
        provider: ProviderName,
        credentials: &Credentials,
    ) -> Result<LoadedData, BackendError>;
}

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Http,
    Mock,
}

pub fn connect_backend(kind: BackendKind, base_url: &Url) -> Arc<dyn IntegrationBackend> {
    match kind {
        BackendKind::Http => Arc::new(HttpBackend::new(base_url.clone())),
        BackendKind::Mock => Arc::new(MockBackend::granting()),
    }
}

/// Talks to the FastAPI-style backend with form-encoded POST bodies.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(base_url: Url) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, provider: ProviderName, action: &str) -> Result<Url, BackendError> {
        let relative = format!("integrations/{}/{action}", provider.endpoint());
        self.base_url
            .join(&relative)
            .map_err(|err| BackendError::Transport {
                endpoint: relative,
                reason: err.to_string(),
            })
    }

    async fn post_form(&self, url: Url, form: &[(&str, String)]) -> Result<Value, BackendError> {
        let endpoint = url.path().to_string();
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|err| BackendError::Transport {
                endpoint: endpoint.clone(),
                reason: err.to_string(),
            })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| BackendError::Transport {
                endpoint: endpoint.clone(),
                reason: err.to_string(),
            })?;

        if !status.is_success() {
            tracing::warn!(%endpoint, status = status.as_u16(), "backend rejected request");
            return Err(BackendError::Status {
                endpoint,
                status: status.as_u16(),
                detail: parse_detail(&body),
            });
        }

        serde_json::from_str(&body).map_err(|err| BackendError::InvalidResponse {
            endpoint,
            reason: err.to_string(),
        })
    }

    fn identity_form(identity: &Identity, item_type: ItemTypeTag) -> [(&'static str, String); 3] {
        [
            ("user_id", identity.user_id.clone()),
            ("org_id", identity.org_id.clone()),
            ("item_type", item_type.as_str().to_string()),
        ]
    }
}

#[async_trait]
impl IntegrationBackend for HttpBackend {
    async fn authorize(
        &self,
        provider: ProviderName,
        identity: &Identity,
        item_type: ItemTypeTag,
    ) -> Result<Url, BackendError> {
        let url = self.endpoint(provider, "authorize")?;
        let endpoint = url.path().to_string();
        let body = self
            .post_form(url, &Self::identity_form(identity, item_type))
            .await?;
        let raw = body
            .get("authorization_url")
            .and_then(Value::as_str)
            .filter(|raw| !raw.trim().is_empty())
            .ok_or_else(|| BackendError::InvalidResponse {
                endpoint: endpoint.clone(),
                reason: "missing authorization_url".to_string(),
            })?;
        Url::parse(raw.trim()).map_err(|err| BackendError::InvalidResponse {
            endpoint,
            reason: format!("authorization_url is not a URL: {err}"),
        })
    }

    async fn fetch_credentials(
        &self,
        provider: ProviderName,
        identity: &Identity,
        item_type: ItemTypeTag,
    ) -> Result<Credentials, BackendError> {
        let url = self.endpoint(provider, "credentials")?;
        let endpoint = url.path().to_string();
        match self
            .post_form(url, &Self::identity_form(identity, item_type))
            .await?
        {
            Value::Object(map) => Ok(Credentials::from_map(map)),
            Value::Null => Err(BackendError::InvalidResponse {
                endpoint,
                reason: "no credentials returned".to_string(),
            }),
            other => Err(BackendError::InvalidResponse {
                endpoint,
                reason: format!("expected a credentials object, got {other}"),
            }),
        }
    }

    async fn load(
        &self,
        provider: ProviderName,
        credentials: &Credentials,
    ) -> Result<LoadedData, BackendError> {
        let url = self.endpoint(provider, "load")?;
        let endpoint = url.path().to_string();
        let mut form = Vec::with_capacity(2);
        if provider == ProviderName::Hubspot {
            let item_type = credentials
                .item_type()
                .unwrap_or(ItemTypeTag::Contact.as_str())
                .to_string();
            form.push(("item_type", item_type));
        }
        form.push(("credentials", credentials.to_json()));

        let body = self.post_form(url, &form).await?;
        serde_json::from_value(body).map_err(|err| BackendError::InvalidResponse {
            endpoint,
            reason: err.to_string(),
        })
    }
}

/// Pulls a human readable message out of a FastAPI error body.
fn parse_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(detail) if !detail.trim().is_empty() => Some(detail.clone()),
        Value::Array(entries) => {
            let messages: Vec<&str> = entries
                .iter()
                .filter_map(|entry| entry.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockCallCounts {
    pub authorize: usize,
    pub credentials: usize,
    pub load: usize,
}

type CallHook = Arc<dyn Fn() + Send + Sync>;

struct MockState {
    authorization: Result<Url, BackendError>,
    credentials_error: Option<BackendError>,
    credentials_hook: Option<CallHook>,
    load_reply: Option<Result<LoadedData, BackendError>>,
    granted: bool,
    grant_on_authorize: bool,
    calls: MockCallCounts,
}

/// Scripted in-memory backend.
///
/// Credentials only exist after [`MockBackend::grant`] has been called, the
/// way the real backend only has tokens once the user finished the consent
/// screen. [`MockBackend::granting`] grants as soon as `authorize` is called.
#[derive(Clone)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        let authorization = Url::parse("https://app.hubspot.com/oauth/authorize?client_id=mock")
            .map_err(|err| BackendError::InvalidResponse {
                endpoint: "mock".to_string(),
                reason: err.to_string(),
            });
        Self {
            state: Arc::new(Mutex::new(MockState {
                authorization,
                credentials_error: None,
                credentials_hook: None,
                load_reply: None,
                granted: false,
                grant_on_authorize: false,
                calls: MockCallCounts::default(),
            })),
        }
    }

    pub fn granting() -> Self {
        let backend = Self::new();
        backend.state.lock().grant_on_authorize = true;
        backend
    }

    /// Simulate the user completing the provider's consent screen.
    pub fn grant(&self) {
        self.state.lock().granted = true;
    }

    pub fn fail_authorize(&self, error: BackendError) {
        self.state.lock().authorization = Err(error);
    }

    pub fn fail_credentials(&self, error: BackendError) {
        self.state.lock().credentials_error = Some(error);
    }

    /// Run `hook` at the start of every `fetch_credentials` call.
    pub fn on_fetch_credentials(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.state.lock().credentials_hook = Some(Arc::new(hook));
    }

    pub fn reply_to_load(&self, reply: Result<LoadedData, BackendError>) {
        self.state.lock().load_reply = Some(reply);
    }

    pub fn calls(&self) -> MockCallCounts {
        self.state.lock().calls
    }

    fn sample_items(item_type: ItemTypeTag) -> Vec<Item> {
        let raw = match item_type {
            ItemTypeTag::Contact => json!([
                {"id": "101", "type": "contact", "name": "Ada Lovelace", "email": "ada@example.com", "phone": "+44 20 7946 0000"},
                {"id": "102", "type": "contact", "name": "Grace Hopper", "email": "grace@example.com", "phone": ""}
            ]),
            ItemTypeTag::Company => json!([
                {"id": "201", "type": "company", "name": "Analytical Engines Ltd", "domain": "engines.example.com"},
                {"id": "202", "type": "company", "name": "", "domain": ""}
            ]),
        };
        serde_json::from_value(raw).unwrap_or_default()
    }
}

#[async_trait]
impl IntegrationBackend for MockBackend {
    async fn authorize(
        &self,
        provider: ProviderName,
        identity: &Identity,
        item_type: ItemTypeTag,
    ) -> Result<Url, BackendError> {
        let mut state = self.state.lock();
        state.calls.authorize += 1;
        let mut url = state.authorization.clone()?;
        url.query_pairs_mut().append_pair(
            "state",
            &format!(
                "{}:{}:{}:{}",
                provider.endpoint(),
                identity.user_id,
                identity.org_id,
                item_type
            ),
        );
        if state.grant_on_authorize {
            state.granted = true;
        }
        Ok(url)
    }

    async fn fetch_credentials(
        &self,
        provider: ProviderName,
        identity: &Identity,
        item_type: ItemTypeTag,
    ) -> Result<Credentials, BackendError> {
        let hook = self.state.lock().credentials_hook.clone();
        if let Some(hook) = hook {
            hook();
        }
        let mut state = self.state.lock();
        state.calls.credentials += 1;
        let endpoint = format!("/integrations/{}/credentials", provider.endpoint());
        if let Some(error) = state.credentials_error.clone() {
            return Err(error);
        }
        if !state.granted {
            return Err(BackendError::rejected(
                endpoint,
                400,
                "No credentials found. Please authorize first.",
            ));
        }
        Ok(Credentials::new()
            .with("user_id", identity.user_id.clone())
            .with("org_id", identity.org_id.clone())
            .with("item_type", item_type.as_str()))
    }

    async fn load(
        &self,
        _provider: ProviderName,
        credentials: &Credentials,
    ) -> Result<LoadedData, BackendError> {
        let mut state = self.state.lock();
        state.calls.load += 1;
        if let Some(reply) = state.load_reply.clone() {
            return reply;
        }
        let item_type = credentials
            .item_type()
            .and_then(ItemTypeTag::parse)
            .unwrap_or_default();
        Ok(LoadedData::from_items(Self::sample_items(item_type)))
    }
}
