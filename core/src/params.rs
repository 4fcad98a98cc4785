use crate::provider::{ItemTypeTag, ProviderName};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

const ITEM_TYPE_KEY: &str = "item_type";

/// Opaque credential mapping handed out by the backend.
///
/// The connector only ever reads or rewrites `item_type`; every other key is
/// passed back to the backend untouched when loading data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(Map<String, Value>);

impl Credentials {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), Value::String(value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn item_type(&self) -> Option<&str> {
        self.get(ITEM_TYPE_KEY)
    }

    pub fn set_item_type(&mut self, item_type: ItemTypeTag) {
        self.0.insert(
            ITEM_TYPE_KEY.to_string(),
            Value::String(item_type.as_str().to_string()),
        );
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }
}

/// Which provider, which item type, and the credentials obtained for them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrationParams {
    pub provider: ProviderName,
    pub item_type: ItemTypeTag,
    pub credentials: Option<Credentials>,
}

impl IntegrationParams {
    pub fn empty(provider: ProviderName) -> Self {
        let item_type = provider
            .supported_item_types()
            .first()
            .copied()
            .unwrap_or_default();
        Self {
            provider,
            item_type,
            credentials: None,
        }
    }

    pub fn connected(provider: ProviderName, item_type: ItemTypeTag, credentials: Credentials) -> Self {
        let mut params = Self {
            provider,
            item_type,
            credentials: Some(credentials),
        };
        params.sync_item_type();
        params
    }

    pub fn is_connected(&self) -> bool {
        self.credentials.is_some()
    }

    fn sync_item_type(&mut self) {
        let item_type = self.item_type;
        if let Some(credentials) = self.credentials.as_mut() {
            credentials.set_item_type(item_type);
        }
    }
}

/// Partial updates accepted by [`IntegrationParamsStore::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamsUpdate {
    ItemType(ItemTypeTag),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamsError {
    #[error("{provider} does not support item type `{item_type}`")]
    UnsupportedItemType {
        provider: ProviderName,
        item_type: ItemTypeTag,
    },
}

/// Shared integration state for one connector form.
///
/// Cloning the store clones the handle, not the state: the handshake writes
/// through one clone while the data loader reads through another.
#[derive(Clone, Default)]
pub struct IntegrationParamsStore {
    inner: Arc<RwLock<IntegrationParams>>,
}

impl IntegrationParamsStore {
    pub fn new(provider: ProviderName) -> Self {
        Self {
            inner: Arc::new(RwLock::new(IntegrationParams::empty(provider))),
        }
    }

    pub fn snapshot(&self) -> IntegrationParams {
        self.inner.read().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.read().is_connected()
    }

    pub fn provider(&self) -> ProviderName {
        self.inner.read().provider
    }

    pub fn item_type(&self) -> ItemTypeTag {
        self.inner.read().item_type
    }

    /// Full replace, used when a handshake completes.
    pub fn set(&self, mut params: IntegrationParams) {
        params.sync_item_type();
        *self.inner.write() = params;
    }

    pub fn update(&self, update: ParamsUpdate) -> Result<(), ParamsError> {
        match update {
            ParamsUpdate::ItemType(item_type) => {
                let mut inner = self.inner.write();
                if !inner.provider.supports(item_type) {
                    return Err(ParamsError::UnsupportedItemType {
                        provider: inner.provider,
                        item_type,
                    });
                }
                inner.item_type = item_type;
                inner.sync_item_type();
                tracing::debug!(
                    item_type = %item_type,
                    connected = inner.is_connected(),
                    "item type updated"
                );
            }
        }
        Ok(())
    }

    /// Switch to another provider, dropping any credentials held for the old one.
    pub fn select_provider(&self, provider: ProviderName) {
        let mut inner = self.inner.write();
        if inner.provider != provider {
            *inner = IntegrationParams::empty(provider);
        }
    }

    /// Restart the flow for the current provider.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        *inner = IntegrationParams::empty(inner.provider);
    }
}
