use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").expect("email pattern is a valid regex")
});

/// A record type stored in its own [`Collection`](crate::store::Collection).
pub trait Entity: Clone + Serialize + Send + Sync + 'static {
    /// Lower-case name used on the wire (`customer`, `item`).
    const KIND: &'static str;

    type Draft: DeserializeOwned + Send;

    fn id(&self) -> Uuid;

    fn draft_id(draft: &Self::Draft) -> Option<Uuid>;

    /// Checks field contents beyond what deserialization enforces.
    fn validate(draft: &Self::Draft) -> Result<(), String>;

    fn from_draft(draft: Self::Draft, id: Uuid) -> Self;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomerDraft {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    pub email: String,
}

impl CustomerDraft {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: email.into(),
        }
    }
}

impl Entity for Customer {
    const KIND: &'static str = "customer";

    type Draft = CustomerDraft;

    fn id(&self) -> Uuid {
        self.id
    }

    fn draft_id(draft: &CustomerDraft) -> Option<Uuid> {
        draft.id
    }

    fn validate(draft: &CustomerDraft) -> Result<(), String> {
        if is_email(&draft.email) {
            Ok(())
        } else {
            Err(format!("'{}' is not a valid email address", draft.email))
        }
    }

    fn from_draft(draft: CustomerDraft, id: Uuid) -> Self {
        Self {
            id,
            name: draft.name,
            email: draft.email,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub quantity: i64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemDraft {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    pub quantity: i64,
    pub price: f64,
}

impl ItemDraft {
    pub fn new(name: impl Into<String>, quantity: i64, price: f64) -> Self {
        Self {
            id: None,
            name: name.into(),
            quantity,
            price,
        }
    }
}

impl Entity for Item {
    const KIND: &'static str = "item";

    type Draft = ItemDraft;

    fn id(&self) -> Uuid {
        self.id
    }

    fn draft_id(draft: &ItemDraft) -> Option<Uuid> {
        draft.id
    }

    fn validate(draft: &ItemDraft) -> Result<(), String> {
        // NaN and infinities have no JSON representation.
        if draft.price.is_finite() {
            Ok(())
        } else {
            Err("price must be a finite number".to_string())
        }
    }

    fn from_draft(draft: ItemDraft, id: Uuid) -> Self {
        Self {
            id,
            name: draft.name,
            quantity: draft.quantity,
            price: draft.price,
        }
    }
}

pub fn is_email(candidate: &str) -> bool {
    EMAIL.is_match(candidate)
}
