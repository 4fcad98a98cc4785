use serde::{Deserialize, Serialize};
use std::fmt;

/// Integrations the connector knows about. Only HubSpot is wired to a backend today.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProviderName {
    #[default]
    Hubspot,
    Notion,
    Airtable,
}

impl ProviderName {
    pub const ALL: [ProviderName; 3] = [
        ProviderName::Hubspot,
        ProviderName::Notion,
        ProviderName::Airtable,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ProviderName::Hubspot => "HubSpot",
            ProviderName::Notion => "Notion",
            ProviderName::Airtable => "Airtable",
        }
    }

    /// Path segment used under `/integrations/` on the backend.
    pub fn endpoint(self) -> &'static str {
        match self {
            ProviderName::Hubspot => "hubspot",
            ProviderName::Notion => "notion",
            ProviderName::Airtable => "airtable",
        }
    }

    pub fn is_functional(self) -> bool {
        matches!(self, ProviderName::Hubspot)
    }

    pub fn supported_item_types(self) -> &'static [ItemTypeTag] {
        match self {
            ProviderName::Hubspot => &[ItemTypeTag::Contact, ItemTypeTag::Company],
            ProviderName::Notion | ProviderName::Airtable => &[],
        }
    }

    pub fn supports(self, item_type: ItemTypeTag) -> bool {
        self.supported_item_types().contains(&item_type)
    }

    /// `type` value the OAuth callback page posts to its opener, e.g. `HUBSPOT_AUTH_SUCCESS`.
    pub fn auth_success_message(self) -> String {
        format!("{}_AUTH_SUCCESS", self.endpoint().to_ascii_uppercase())
    }

    /// Query parameter the backend appends when redirecting back after a successful grant.
    pub fn success_query_param(self) -> String {
        format!("{}_success", self.endpoint())
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// CRM record family requested from a provider.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ItemTypeTag {
    #[default]
    Contact,
    Company,
}

impl ItemTypeTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemTypeTag::Contact => "contact",
            ItemTypeTag::Company => "company",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ItemTypeTag::Contact => "Contacts",
            ItemTypeTag::Company => "Companies",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "contact" | "contacts" => Some(ItemTypeTag::Contact),
            "company" | "companies" => Some(ItemTypeTag::Company),
            _ => None,
        }
    }
}

impl fmt::Display for ItemTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
