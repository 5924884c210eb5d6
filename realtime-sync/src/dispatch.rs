use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::{
    broker::ConnectionId,
    error::SyncError,
    message::{Action, Crud, Message, Operation, Target, render},
    model::Entity,
    store::{Collection, Store},
};

/// What to send and to whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    pub body: String,
    /// `true` sends to every connection, `false` to the originator only.
    pub broadcast: bool,
}

impl DispatchResult {
    pub fn reply(body: String) -> Self {
        Self {
            body,
            broadcast: false,
        }
    }

    pub fn broadcast(body: String) -> Self {
        Self {
            body,
            broadcast: true,
        }
    }
}

enum Outcome {
    /// Connection-local answer; skips the resync.
    Reply(String),
    /// The store may have changed.
    Applied,
}

/// Applies inbound messages to the store. Reads answer the originating
/// connection; every other action ends in a resync of both collections sent to
/// all connections, whether or not it changed anything.
pub struct Dispatcher {
    store: Arc<Store>,
}

impl Dispatcher {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub async fn dispatch(&self, origin: ConnectionId, raw: &str) -> DispatchResult {
        let message = match Message::parse(raw) {
            Ok(message) => message,
            Err(err) => {
                debug!(connection = %origin, error = %err, "unparseable message");
                return self.resync(true).await;
            }
        };

        let action = message.action;
        match self.execute(message).await {
            Ok(Outcome::Reply(body)) => DispatchResult::reply(body),
            Ok(Outcome::Applied) => self.resync(true).await,
            Err(err) => {
                debug!(connection = %origin, %action, error = %err, "action rejected");
                // A failed read still stays with the connection that asked.
                self.resync(!action.is_read()).await
            }
        }
    }

    async fn resync(&self, broadcast: bool) -> DispatchResult {
        let body = render(&self.store.snapshot().await);
        if broadcast {
            DispatchResult::broadcast(body)
        } else {
            DispatchResult::reply(body)
        }
    }

    async fn execute(&self, message: Message) -> Result<Outcome, SyncError> {
        let Message { action, payload } = message;
        match action.operation() {
            Operation::Store(Target::Customer, crud) => {
                apply(&self.store.customers, action, crud, payload).await
            }
            Operation::Store(Target::Item, crud) => {
                apply(&self.store.items, action, crud, payload).await
            }
            Operation::Echo => text_payload(action, payload).map(Outcome::Reply),
            Operation::Reverse => {
                text_payload(action, payload).map(|text| Outcome::Reply(text.chars().rev().collect()))
            }
        }
    }
}

async fn apply<E: Entity>(
    collection: &Collection<E>,
    action: Action,
    crud: Crud,
    payload: Option<Value>,
) -> Result<Outcome, SyncError> {
    match crud {
        Crud::Create => {
            let drafts = drafts::<E>(action, payload)?;
            let created = collection.create(drafts).await;
            debug!(kind = E::KIND, count = created.len(), "created");
            Ok(Outcome::Applied)
        }
        Crud::Read => {
            let id = single_id(action, payload)?;
            let entity = collection.read(id).await?;
            Ok(Outcome::Reply(render(&entity)))
        }
        Crud::ReadAll => Ok(Outcome::Reply(render(&collection.read_all().await))),
        Crud::Update => {
            let records = drafts::<E>(action, payload)?
                .into_iter()
                .map(|draft| match E::draft_id(&draft) {
                    Some(id) => Ok(E::from_draft(draft, id)),
                    None => Err(SyncError::shape(action.as_str(), "every record needs an id")),
                })
                .collect::<Result<Vec<_>, _>>()?;
            let inserted = collection.update(records).await;
            debug!(kind = E::KIND, inserted, "updated");
            Ok(Outcome::Applied)
        }
        Crud::Delete => {
            let ids = id_list(action, payload)?;
            let removed = collection.delete(&ids).await;
            debug!(kind = E::KIND, removed, "deleted");
            Ok(Outcome::Applied)
        }
        Crud::DeleteAll => {
            let removed = collection.delete_all().await;
            debug!(kind = E::KIND, removed, "cleared");
            Ok(Outcome::Applied)
        }
    }
}

/// An identifier given either bare or inside an object with an `id` field.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdRef {
    Bare(Uuid),
    Keyed { id: Uuid },
}

impl IdRef {
    fn id(&self) -> Uuid {
        match self {
            IdRef::Bare(id) | IdRef::Keyed { id } => *id,
        }
    }
}

#[derive(Deserialize)]
struct TextPayload {
    message: String,
}

fn required(action: Action, payload: Option<Value>) -> Result<Value, SyncError> {
    payload.ok_or_else(|| SyncError::shape(action.as_str(), "payload is required"))
}

/// Decodes and validates a whole batch before anything touches the store.
fn drafts<E: Entity>(action: Action, payload: Option<Value>) -> Result<Vec<E::Draft>, SyncError> {
    let values = match required(action, payload)? {
        Value::Array(values) if values.is_empty() => {
            return Err(SyncError::shape(action.as_str(), "at least one record is required"));
        }
        Value::Array(values) => values,
        single @ Value::Object(_) => vec![single],
        _ => {
            return Err(SyncError::shape(
                action.as_str(),
                "expected an object or a list of objects",
            ));
        }
    };

    values
        .into_iter()
        .map(|value| {
            let draft: E::Draft = serde_json::from_value(value)
                .map_err(|err| SyncError::shape(action.as_str(), err.to_string()))?;
            E::validate(&draft).map_err(|reason| SyncError::shape(action.as_str(), reason))?;
            Ok(draft)
        })
        .collect()
}

fn single_id(action: Action, payload: Option<Value>) -> Result<Uuid, SyncError> {
    let id_ref: IdRef = serde_json::from_value(required(action, payload)?)
        .map_err(|_| SyncError::shape(action.as_str(), "expected an id"))?;
    Ok(id_ref.id())
}

fn id_list(action: Action, payload: Option<Value>) -> Result<Vec<Uuid>, SyncError> {
    let refs: Vec<IdRef> = serde_json::from_value(required(action, payload)?)
        .map_err(|_| SyncError::shape(action.as_str(), "expected a list of ids"))?;
    Ok(refs.iter().map(IdRef::id).collect())
}

fn text_payload(action: Action, payload: Option<Value>) -> Result<String, SyncError> {
    let text: TextPayload = serde_json::from_value(required(action, payload)?)
        .map_err(|err| SyncError::shape(action.as_str(), err.to_string()))?;
    Ok(text.message)
}
