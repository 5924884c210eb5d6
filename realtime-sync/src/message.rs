use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::SyncError;

/// Every action a client may request, spelled the way it appears on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Action {
    #[serde(rename = "customer:create")]
    CustomerCreate,
    #[serde(rename = "customer:read")]
    CustomerRead,
    #[serde(rename = "customer:read-all")]
    CustomerReadAll,
    #[serde(rename = "customer:update")]
    CustomerUpdate,
    #[serde(rename = "customer:delete")]
    CustomerDelete,
    #[serde(rename = "customer:delete-all")]
    CustomerDeleteAll,

    #[serde(rename = "item:create")]
    ItemCreate,
    #[serde(rename = "item:read")]
    ItemRead,
    #[serde(rename = "item:read-all")]
    ItemReadAll,
    #[serde(rename = "item:update")]
    ItemUpdate,
    #[serde(rename = "item:delete")]
    ItemDelete,
    #[serde(rename = "item:delete-all")]
    ItemDeleteAll,

    #[serde(rename = "echo")]
    Echo,
    #[serde(rename = "reverse")]
    Reverse,
}

/// Which collection an action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Customer,
    Item,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crud {
    Create,
    Read,
    ReadAll,
    Update,
    Delete,
    DeleteAll,
}

/// An [`Action`] split into what it touches and what it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Store(Target, Crud),
    Echo,
    Reverse,
}

impl Action {
    pub const ALL: [Action; 14] = [
        Action::CustomerCreate,
        Action::CustomerRead,
        Action::CustomerReadAll,
        Action::CustomerUpdate,
        Action::CustomerDelete,
        Action::CustomerDeleteAll,
        Action::ItemCreate,
        Action::ItemRead,
        Action::ItemReadAll,
        Action::ItemUpdate,
        Action::ItemDelete,
        Action::ItemDeleteAll,
        Action::Echo,
        Action::Reverse,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::CustomerCreate => "customer:create",
            Action::CustomerRead => "customer:read",
            Action::CustomerReadAll => "customer:read-all",
            Action::CustomerUpdate => "customer:update",
            Action::CustomerDelete => "customer:delete",
            Action::CustomerDeleteAll => "customer:delete-all",
            Action::ItemCreate => "item:create",
            Action::ItemRead => "item:read",
            Action::ItemReadAll => "item:read-all",
            Action::ItemUpdate => "item:update",
            Action::ItemDelete => "item:delete",
            Action::ItemDeleteAll => "item:delete-all",
            Action::Echo => "echo",
            Action::Reverse => "reverse",
        }
    }

    pub fn operation(self) -> Operation {
        use Crud::*;
        use Target::*;

        match self {
            Action::CustomerCreate => Operation::Store(Customer, Create),
            Action::CustomerRead => Operation::Store(Customer, Read),
            Action::CustomerReadAll => Operation::Store(Customer, ReadAll),
            Action::CustomerUpdate => Operation::Store(Customer, Update),
            Action::CustomerDelete => Operation::Store(Customer, Delete),
            Action::CustomerDeleteAll => Operation::Store(Customer, DeleteAll),
            Action::ItemCreate => Operation::Store(Item, Create),
            Action::ItemRead => Operation::Store(Item, Read),
            Action::ItemReadAll => Operation::Store(Item, ReadAll),
            Action::ItemUpdate => Operation::Store(Item, Update),
            Action::ItemDelete => Operation::Store(Item, Delete),
            Action::ItemDeleteAll => Operation::Store(Item, DeleteAll),
            Action::Echo => Operation::Echo,
            Action::Reverse => Operation::Reverse,
        }
    }

    /// Reads answer only the connection that asked.
    pub fn is_read(self) -> bool {
        matches!(
            self.operation(),
            Operation::Store(_, Crud::Read | Crud::ReadAll)
        )
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One inbound request. The payload is kept as raw JSON because its shape
/// depends on the action and is checked when the action runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Message {
    pub fn new(action: Action, payload: Value) -> Self {
        Self {
            action,
            payload: Some(payload),
        }
    }

    pub fn bare(action: Action) -> Self {
        Self {
            action,
            payload: None,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, SyncError> {
        serde_json::from_str(raw.trim()).map_err(|err| SyncError::Parse(err.to_string()))
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Serializes any outbound body, such as a [`Snapshot`](crate::store::Snapshot),
/// a single entity or a list of them.
pub fn render<T: Serialize + ?Sized>(body: &T) -> String {
    serde_json::to_string(body).unwrap_or_else(|err| render_error(&err.to_string()))
}

pub fn render_error(message: &str) -> String {
    json!({ "error": message }).to_string()
}
