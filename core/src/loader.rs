use crate::backend::{BackendError, IntegrationBackend};
use crate::item::Item;
use crate::params::{Credentials, IntegrationParamsStore};
use crate::provider::ProviderName;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Body of a `load` response, kept exactly as the backend sent it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LoadedData {
    Error { error: String },
    Items { items: Vec<Item> },
}

impl<'de> Deserialize<'de> for LoadedData {
    /// A non-null `error` wins; otherwise `items` is read leniently, with a
    /// missing or null list meaning no items and null entries skipped.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Value::Object(mut body) = Value::deserialize(deserializer)? else {
            return Err(de::Error::custom("load response must be a JSON object"));
        };
        match body.remove("error") {
            None | Some(Value::Null) => {}
            Some(Value::String(error)) => return Ok(LoadedData::Error { error }),
            Some(other) => {
                return Ok(LoadedData::Error {
                    error: other.to_string(),
                })
            }
        }
        let items = match body.remove("items") {
            Some(Value::Array(entries)) => entries
                .into_iter()
                .filter(|entry| !entry.is_null())
                .map(Item::from_value)
                .collect(),
            _ => Vec::new(),
        };
        Ok(LoadedData::Items { items })
    }
}

impl LoadedData {
    pub fn from_items(items: Vec<Item>) -> Self {
        LoadedData::Items { items }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        LoadedData::Error {
            error: error.into(),
        }
    }

    pub fn items(&self) -> &[Item] {
        match self {
            LoadedData::Items { items } => items,
            LoadedData::Error { .. } => &[],
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoadedData::Error { error } => Some(error),
            LoadedData::Items { .. } => None,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("{provider} is not connected")]
    NotConnected { provider: ProviderName },
    #[error("loading {provider} data failed: {source}")]
    Backend {
        provider: ProviderName,
        #[source]
        source: BackendError,
    },
}

impl LoadError {
    pub fn user_message(&self) -> String {
        match self {
            LoadError::NotConnected { provider } => {
                format!("Connect to {provider} before loading data")
            }
            LoadError::Backend { source, .. } => source.user_message("Error loading data"),
        }
    }
}

/// Fetches the item collection for the credentials currently in the store.
///
/// Every call goes to the backend; nothing is cached or coalesced.
#[derive(Clone)]
pub struct DataLoader {
    backend: Arc<dyn IntegrationBackend>,
}

impl DataLoader {
    pub fn new(backend: Arc<dyn IntegrationBackend>) -> Self {
        Self { backend }
    }

    pub async fn load(
        &self,
        provider: ProviderName,
        credentials: &Credentials,
    ) -> Result<LoadedData, LoadError> {
        tracing::info!(
            %provider,
            item_type = credentials.item_type().unwrap_or("contact"),
            "loading integration data"
        );
        let data = self
            .backend
            .load(provider, credentials)
            .await
            .map_err(|source| LoadError::Backend { provider, source })?;
        match &data {
            LoadedData::Items { items } => {
                tracing::info!(%provider, count = items.len(), "integration data loaded")
            }
            LoadedData::Error { error } => {
                tracing::warn!(%provider, %error, "backend reported a load error")
            }
        }
        Ok(data)
    }

    /// Load using whatever the shared store holds right now.
    pub async fn load_current(&self, store: &IntegrationParamsStore) -> Result<LoadedData, LoadError> {
        let params = store.snapshot();
        let credentials = params.credentials.ok_or(LoadError::NotConnected {
            provider: params.provider,
        })?;
        self.load(params.provider, &credentials).await
    }
}

/// What the data panel currently shows.
#[derive(Debug, Default)]
pub struct DataPanel {
    loaded: Option<LoadedData>,
    loading: bool,
}

impl DataPanel {
    pub fn loaded(&self) -> Option<&LoadedData> {
        self.loaded.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn begin(&mut self) -> bool {
        if self.loading {
            return false;
        }
        self.loading = true;
        true
    }

    /// Replace the shown data wholesale. A failed load keeps the previous result.
    pub fn finish(&mut self, result: &Result<LoadedData, LoadError>) {
        self.loading = false;
        if let Ok(data) = result {
            self.loaded = Some(data.clone());
        }
    }

    pub fn clear(&mut self) {
        self.loaded = None;
    }
}
