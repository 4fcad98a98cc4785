use crate::item::{CompanyItem, ContactItem, Item};
use crate::loader::LoadedData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardKind {
    Contact,
    Company,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRow {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemCard {
    pub kind: CardKind,
    pub title: String,
    pub rows: Vec<DisplayRow>,
    pub badge: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayModel {
    Card(ItemCard),
    /// Pretty-printed JSON for records of an unrecognised type.
    Raw(String),
}

pub fn render(item: &Item) -> DisplayModel {
    match item {
        Item::Contact(contact) => DisplayModel::Card(contact_card(contact)),
        Item::Company(company) => DisplayModel::Card(company_card(company)),
        Item::Unknown(raw) => DisplayModel::Raw(
            serde_json::to_string_pretty(raw).unwrap_or_else(|_| raw.to_string()),
        ),
    }
}

fn contact_card(contact: &ContactItem) -> ItemCard {
    let mut rows = Vec::new();
    push_row(&mut rows, "Email", contact.email.as_deref());
    push_row(&mut rows, "Phone", contact.phone.as_deref());
    ItemCard {
        kind: CardKind::Contact,
        title: present(contact.name.as_deref())
            .unwrap_or("Unnamed Contact")
            .to_string(),
        rows,
        badge: "Contact",
    }
}

fn company_card(company: &CompanyItem) -> ItemCard {
    let mut rows = Vec::new();
    push_row(&mut rows, "Domain", company.domain.as_deref());
    ItemCard {
        kind: CardKind::Company,
        title: present(company.name.as_deref())
            .unwrap_or("Unnamed Company")
            .to_string(),
        rows,
        badge: "Company",
    }
}

// The backend fills missing HubSpot properties with "".
fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

fn push_row(rows: &mut Vec<DisplayRow>, label: &'static str, value: Option<&str>) {
    if let Some(value) = present(value) {
        rows.push(DisplayRow {
            label,
            value: value.to_string(),
        });
    }
}

/// A rendered item plus a key that stays unique even when provider ids repeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedModel {
    pub key: String,
    pub model: DisplayModel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataView {
    Error(String),
    Empty,
    Items {
        summary: String,
        entries: Vec<KeyedModel>,
    },
}

pub fn render_loaded(data: &LoadedData) -> DataView {
    if let Some(error) = data.error() {
        return DataView::Error(format!("Error: {error}"));
    }
    let items = data.items();
    if items.is_empty() {
        return DataView::Empty;
    }
    let entries = items
        .iter()
        .enumerate()
        .map(|(index, item)| KeyedModel {
            key: match item.id() {
                Some(id) => format!("{index}:{id}"),
                None => index.to_string(),
            },
            model: render(item),
        })
        .collect();
    DataView::Items {
        summary: format!("Found {} items", items.len()),
        entries,
    }
}
