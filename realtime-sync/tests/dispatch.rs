use std::sync::Arc;

use realtime_sync::{
    broker::{Broker, ConnectionId},
    dispatch::{DispatchResult, Dispatcher},
    message::{Action, Message, render},
    model::{Customer, CustomerDraft, Item, ItemDraft},
    store::{Snapshot, Store},
};
use serde_json::{Value, json};
use uuid::Uuid;

struct Harness {
    dispatcher: Dispatcher,
    origin: ConnectionId,
}

impl Harness {
    async fn seeded() -> Self {
        let store = Arc::new(Store::new());
        store.seed_demo().await;
        Self {
            dispatcher: Dispatcher::new(store),
            origin: Broker::new().next_id(),
        }
    }

    fn store(&self) -> &Store {
        self.dispatcher.store()
    }

    async fn send(&self, message: Message) -> DispatchResult {
        let raw = message.encode().expect("encode message");
        self.dispatcher.dispatch(self.origin, &raw).await
    }

    async fn send_raw(&self, raw: &str) -> DispatchResult {
        self.dispatcher.dispatch(self.origin, raw).await
    }

    async fn current_state(&self) -> Snapshot {
        self.store().snapshot().await
    }
}

fn parse_snapshot(result: &DispatchResult) -> Snapshot {
    serde_json::from_str(&result.body).expect("body should be a combined snapshot")
}

fn sorted(mut snapshot: Snapshot) -> Snapshot {
    snapshot.customer.sort_by_key(|c| c.id);
    snapshot.item.sort_by_key(|i| i.id);
    snapshot
}

#[tokio::test]
async fn create_without_id_assigns_one_and_broadcasts() {
    let harness = Harness {
        dispatcher: Dispatcher::new(Arc::new(Store::new())),
        origin: Broker::new().next_id(),
    };

    let result = harness
        .send(Message::new(
            Action::CustomerCreate,
            json!({"name": "Dana", "email": "dana@x.com"}),
        ))
        .await;

    assert!(result.broadcast);
    let state = parse_snapshot(&result);
    assert_eq!(state.customer.len(), 1);
    assert!(state.item.is_empty());

    let dana = &state.customer[0];
    assert_eq!(dana.name, "Dana");
    assert_eq!(dana.email, "dana@x.com");
    assert_eq!(harness.store().customers.read(dana.id).await.expect("stored"), *dana);
}

#[tokio::test]
async fn read_of_unknown_id_resyncs_only_the_originator() {
    let harness = Harness::seeded().await;
    let before = sorted(harness.current_state().await);

    let result = harness
        .send(Message::new(Action::ItemRead, json!({"id": Uuid::new_v4()})))
        .await;

    assert!(!result.broadcast);
    assert_eq!(sorted(parse_snapshot(&result)), before);
}

#[tokio::test]
async fn reads_are_never_broadcast() {
    let harness = Harness::seeded().await;
    let state = harness.current_state().await;
    let customer = state.customer[0].clone();

    let single = harness
        .send(Message::new(Action::CustomerRead, json!({"id": customer.id})))
        .await;
    assert!(!single.broadcast);
    let read: Customer = serde_json::from_str(&single.body).expect("single customer body");
    assert_eq!(read, customer);

    let all = harness.send(Message::bare(Action::ItemReadAll)).await;
    assert!(!all.broadcast);
    let items: Vec<Item> = serde_json::from_str(&all.body).expect("item list body");
    assert_eq!(items.len(), 3);

    for payload in [None, Some(json!("garbage")), Some(json!({"id": "not-a-uuid"}))] {
        for action in [Action::CustomerRead, Action::ItemRead] {
            let result = harness
                .send(Message {
                    action,
                    payload: payload.clone(),
                })
                .await;
            assert!(!result.broadcast, "{action} with {payload:?} was broadcast");
        }
    }
}

#[tokio::test]
async fn every_other_store_action_broadcasts_even_when_rejected() {
    let harness = Harness::seeded().await;
    let junk = [None, Some(json!(42)), Some(json!([])), Some(json!({"unexpected": true}))];

    for action in Action::ALL.into_iter().filter(|a| !a.is_read()) {
        if matches!(action, Action::Echo | Action::Reverse) {
            continue;
        }
        for payload in &junk {
            let result = harness
                .send(Message {
                    action,
                    payload: payload.clone(),
                })
                .await;
            assert!(result.broadcast, "{action} with {payload:?} stayed local");
            parse_snapshot(&result);
        }
    }
}

#[tokio::test]
async fn delete_all_items_leaves_customers_alone() {
    let harness = Harness::seeded().await;
    let customers_before = sorted(harness.current_state().await).customer;

    let result = harness.send(Message::bare(Action::ItemDeleteAll)).await;

    assert!(result.broadcast);
    let state = sorted(parse_snapshot(&result));
    assert!(state.item.is_empty());
    assert_eq!(state.customer, customers_before);
}

#[tokio::test]
async fn echo_and_reverse_answer_locally() {
    let harness = Harness::seeded().await;

    let echo = harness
        .send(Message::new(Action::Echo, json!({"message": "hi"})))
        .await;
    assert_eq!(echo, DispatchResult::reply("hi".to_string()));

    let reverse = harness
        .send(Message::new(Action::Reverse, json!({"message": "héllo"})))
        .await;
    assert_eq!(reverse, DispatchResult::reply("olléh".to_string()));
}

#[tokio::test]
async fn malformed_text_broadcasts_unchanged_state() {
    let harness = Harness::seeded().await;
    let before = sorted(harness.current_state().await);

    for raw in ["", "{not json", r#"{"action":"customer:explode"}"#, r#"["echo"]"#] {
        let result = harness.send_raw(raw).await;
        assert!(result.broadcast, "{raw:?} stayed local");
        assert_eq!(sorted(parse_snapshot(&result)), before);
    }
}

#[tokio::test]
async fn batch_with_one_bad_draft_creates_nothing() {
    let harness = Harness::seeded().await;
    let before = sorted(harness.current_state().await);

    let result = harness
        .send(Message::new(
            Action::ItemCreate,
            json!([
                {"name": "Stapler", "quantity": 4, "price": 7.25},
                {"name": "Glue", "quantity": "lots", "price": 1.0},
            ]),
        ))
        .await;

    assert!(result.broadcast);
    assert_eq!(sorted(parse_snapshot(&result)), before);
}

#[tokio::test]
async fn batch_create_applies_every_draft() {
    let harness = Harness::seeded().await;

    let drafts: Vec<Value> = (0..10)
        .map(|n| json!({"name": format!("bulk-{n}"), "quantity": n, "price": 1.5}))
        .collect();
    let result = harness
        .send(Message::new(Action::ItemCreate, Value::Array(drafts)))
        .await;

    assert_eq!(parse_snapshot(&result).item.len(), 13);
}

#[tokio::test]
async fn deleting_unknown_ids_changes_nothing() {
    let harness = Harness::seeded().await;

    let result = harness
        .send(Message::new(
            Action::CustomerDelete,
            json!([Uuid::new_v4(), Uuid::new_v4()]),
        ))
        .await;

    assert!(result.broadcast);
    assert_eq!(parse_snapshot(&result).customer.len(), 3);
}

#[tokio::test]
async fn delete_removes_only_listed_ids() {
    let harness = Harness::seeded().await;
    let state = harness.current_state().await;
    let doomed = state.customer[0].id;

    let result = harness
        .send(Message::new(Action::CustomerDelete, json!([doomed])))
        .await;

    let after = parse_snapshot(&result);
    assert_eq!(after.customer.len(), 2);
    assert!(after.customer.iter().all(|c| c.id != doomed));
}

#[tokio::test]
async fn update_replaces_existing_and_inserts_unknown() {
    let harness = Harness::seeded().await;
    let existing = harness.current_state().await.item[0].clone();
    let new_id = Uuid::new_v4();

    let result = harness
        .send(Message::new(
            Action::ItemUpdate,
            json!([
                {"id": existing.id, "name": existing.name, "quantity": 0, "price": existing.price},
                {"id": new_id, "name": "Eraser", "quantity": 9, "price": 0.25},
            ]),
        ))
        .await;

    assert!(result.broadcast);
    let state = parse_snapshot(&result);
    assert_eq!(state.item.len(), 4);
    let updated = state
        .item
        .iter()
        .find(|item| item.id == existing.id)
        .expect("updated item");
    assert_eq!(updated.quantity, 0);
    assert!(state.item.iter().any(|item| item.id == new_id));
}

#[tokio::test]
async fn update_without_ids_is_rejected_as_a_whole() {
    let harness = Harness::seeded().await;
    let existing = harness.current_state().await.customer[0].clone();

    harness
        .send(Message::new(
            Action::CustomerUpdate,
            json!([
                {"id": existing.id, "name": "Renamed", "email": existing.email},
                {"name": "Nobody", "email": "nobody@x.com"},
            ]),
        ))
        .await;

    let stored = harness
        .store()
        .customers
        .read(existing.id)
        .await
        .expect("still stored");
    assert_eq!(stored.name, existing.name);
    assert_eq!(harness.store().counts().await, (3, 3));
}

#[tokio::test]
async fn rendered_snapshot_matches_store() {
    let harness = Harness::seeded().await;
    harness
        .store()
        .customers
        .create(vec![CustomerDraft::new("Dana", "dana@x.com")])
        .await;
    harness
        .store()
        .items
        .create(vec![ItemDraft::new("Stapler", 4, 7.25)])
        .await;

    let result = harness.send(Message::bare(Action::CustomerDeleteAll)).await;
    let expected = Snapshot {
        customer: Vec::new(),
        item: harness.store().items.read_all().await,
    };

    assert_eq!(sorted(parse_snapshot(&result)), sorted(expected.clone()));
    let reparsed: Snapshot = serde_json::from_str(&render(&expected)).expect("render roundtrip");
    assert_eq!(reparsed.item.len(), 4);
}
