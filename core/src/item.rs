use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Provider-assigned record id. HubSpot sends strings, fixtures often use numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Number(value) => write!(f, "{value}"),
            ItemId::Text(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactItem {
    #[serde(default)]
    pub id: Option<ItemId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyItem {
    #[serde(default)]
    pub id: Option<ItemId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

/// One CRM record as returned by the backend's `load` endpoint.
///
/// Records whose `type` is not recognised, or whose fields do not match the
/// expected shape, are kept verbatim as [`Item::Unknown`].
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Contact(ContactItem),
    Company(CompanyItem),
    Unknown(Value),
}

impl Item {
    pub fn id(&self) -> Option<ItemId> {
        match self {
            Item::Contact(contact) => contact.id.clone(),
            Item::Company(company) => company.id.clone(),
            Item::Unknown(raw) => raw
                .get("id")
                .and_then(|id| serde_json::from_value(id.clone()).ok()),
        }
    }

    pub fn type_tag(&self) -> Option<&str> {
        match self {
            Item::Contact(_) => Some("contact"),
            Item::Company(_) => Some("company"),
            Item::Unknown(raw) => raw.get("type").and_then(Value::as_str),
        }
    }

    pub(crate) fn from_value(raw: Value) -> Self {
        match raw.get("type").and_then(Value::as_str) {
            Some("contact") => serde_json::from_value(raw.clone())
                .map(Item::Contact)
                .unwrap_or(Item::Unknown(raw)),
            Some("company") => serde_json::from_value(raw.clone())
                .map(Item::Company)
                .unwrap_or(Item::Unknown(raw)),
            _ => Item::Unknown(raw),
        }
    }
}

impl<'de> Deserialize<'de> for Item {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        if raw.is_null() {
            return Err(de::Error::custom("item cannot be null"));
        }
        Ok(Item::from_value(raw))
    }
}

impl Serialize for Item {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        #[derive(Serialize)]
        struct Tagged<'a, T: Serialize> {
            #[serde(rename = "type")]
            kind: &'static str,
            #[serde(flatten)]
            fields: &'a T,
        }

        match self {
            Item::Contact(contact) => Tagged {
                kind: "contact",
                fields: contact,
            }
            .serialize(serializer),
            Item::Company(company) => Tagged {
                kind: "company",
                fields: company,
            }
            .serialize(serializer),
            Item::Unknown(raw) => raw.serialize(serializer),
        }
    }
}
