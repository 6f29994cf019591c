use futures::channel::oneshot;
use futures::executor::block_on;
use futures::FutureExt;
use prj_core::tracking::proxy::ProxyHandler;
use prj_core::tracking::value::Value;
use prj_core::transaction::{
    ChangeSet, PendingWrite, TransactionModel, WriteChanges, WriteError,
};
use serde_json::{json, Value as JsonValue};
use std::cell::RefCell;
use std::rc::Rc;

type Calls = Rc<RefCell<Vec<(JsonValue, Option<PendingWrite>)>>>;

fn recording_writer() -> (Calls, WriteChanges) {
    let calls: Calls = Rc::new(RefCell::new(Vec::new()));
    let recorded = Rc::clone(&calls);
    let writer: WriteChanges = Box::new(
        move |changes: ChangeSet, previous: Option<PendingWrite>| {
            recorded
                .borrow_mut()
                .push((JsonValue::Object(changes), previous));
            async { Ok::<(), WriteError>(()) }.boxed_local()
        },
    );
    (calls, writer)
}

fn changes_of(calls: &Calls) -> Vec<JsonValue> {
    calls
        .borrow()
        .iter()
        .map(|(changes, _)| changes.clone())
        .collect()
}

#[test]
fn model_without_writer_starts_active() {
    let model = TransactionModel::new(None);
    assert!(model.is_transaction_active());

    let (_, writer) = recording_writer();
    assert!(!TransactionModel::new(Some(writer)).is_transaction_active());
}

#[test]
fn update_outside_transaction_flushes_immediately() {
    let (calls, writer) = recording_writer();
    let model = TransactionModel::new(Some(writer));

    model.update_key_value("data.title", json!("X"));

    assert_eq!(changes_of(&calls), vec![json!({"data": {"title": "X"}})]);
    assert!(model.changes().is_empty());
    assert!(calls.borrow()[0].1.is_none(), "first write has no predecessor");
}

#[test]
fn transaction_batches_updates_into_one_flush() {
    let (calls, writer) = recording_writer();
    let model = TransactionModel::new(Some(writer));

    model.start_transaction();
    model.update_key_value("a.b", json!(1));
    model.update_key_value("a.c", json!(2));
    model.update_key_value("d", json!(3));
    assert!(calls.borrow().is_empty());

    model.finish_transaction();
    assert_eq!(
        changes_of(&calls),
        vec![json!({"a": {"b": 1, "c": 2}, "d": 3})]
    );
    assert!(!model.is_transaction_active());
    assert!(model.changes().is_empty());
}

#[test]
fn second_flush_receives_first_pending_write() {
    let (calls, writer) = recording_writer();
    let model = TransactionModel::new(Some(writer));

    model.update_key_value("title", json!("A"));
    let first = model.pending_write().expect("first write dispatched");
    model.update_key_value("status", json!("Done"));

    let calls = calls.borrow();
    assert_eq!(calls.len(), 2);
    let previous = calls[1].1.as_ref().expect("second write chains on the first");
    assert!(previous.ptr_eq(&first));
}

#[test]
fn chained_writes_land_in_issue_order() {
    let log: Rc<RefCell<Vec<JsonValue>>> = Rc::new(RefCell::new(Vec::new()));
    let (release, gate) = oneshot::channel::<()>();
    let gate = RefCell::new(Some(gate));
    let recorded = Rc::clone(&log);
    let writer: WriteChanges = Box::new(
        move |changes: ChangeSet, previous: Option<PendingWrite>| {
            let log = Rc::clone(&recorded);
            let gate = gate.borrow_mut().take();
            async move {
                if let Some(previous) = previous {
                    let _ = previous.await;
                }
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                log.borrow_mut().push(JsonValue::Object(changes));
                Ok::<(), WriteError>(())
            }
            .boxed_local()
        },
    );
    let model = TransactionModel::new(Some(writer));

    model.update_key_value("title", json!("A"));
    model.update_key_value("status", json!("Done"));
    assert!(log.borrow().is_empty(), "first write is still waiting");

    release.send(()).expect("gate receiver alive");
    block_on(model.pending_write().expect("second write dispatched"))
        .expect("writes should succeed");

    assert_eq!(
        *log.borrow(),
        vec![json!({"title": "A"}), json!({"status": "Done"})]
    );
}

#[test]
fn abort_discards_changes_without_writing() {
    let (calls, writer) = recording_writer();
    let model = TransactionModel::new(Some(writer));

    model.start_transaction();
    model.update_key_value("title", json!("A"));
    model.abort_transaction();

    assert!(calls.borrow().is_empty());
    assert!(model.changes().is_empty());
    assert!(!model.is_transaction_active());

    model.abort_transaction();
    model.finish_transaction();
    assert!(calls.borrow().is_empty(), "inactive finish and abort are no-ops");
}

#[test]
fn abort_without_writer_is_ignored() {
    let model = TransactionModel::new(None);
    model.update_key_value("title", json!("A"));
    model.abort_transaction();

    assert!(model.is_transaction_active());
    assert_eq!(JsonValue::Object(model.changes()), json!({"title": "A"}));
}

#[test]
fn finish_without_writer_keeps_transaction_open_and_changes_buffered() {
    let model = TransactionModel::new(None);
    model.update_key_value("title", json!("A"));

    model.finish_transaction();

    // Nothing flushes until a writer is installed.
    assert!(model.is_transaction_active());
    assert_eq!(JsonValue::Object(model.changes()), json!({"title": "A"}));
}

#[test]
fn installing_writer_flushes_pending_changes() {
    let model = TransactionModel::new(None);
    model.update_key_value("tags", json!(["a"]));
    model.update_key_value("status", json!("Later"));

    let (calls, writer) = recording_writer();
    model.set_write_changes(writer);

    assert_eq!(
        changes_of(&calls),
        vec![json!({"tags": ["a"], "status": "Later"})]
    );
    assert!(!model.is_transaction_active());
}

#[test]
fn installing_writer_on_empty_transaction_aborts_it() {
    let model = TransactionModel::new(None);
    let (calls, writer) = recording_writer();

    model.set_write_changes(writer);

    assert!(calls.borrow().is_empty());
    assert!(!model.is_transaction_active());
}

#[test]
fn failed_write_is_observable_but_not_raised() {
    let writer: WriteChanges = Box::new(|_: ChangeSet, _: Option<PendingWrite>| {
        async { Err::<(), WriteError>(WriteError::new("disk full")) }.boxed_local()
    });
    let model = TransactionModel::new(Some(writer));

    model.update_key_value("title", json!("A"));

    assert!(model.changes().is_empty(), "changes are cleared on dispatch");
    let result = block_on(model.pending_write().expect("write dispatched"));
    assert_eq!(result, Err(WriteError::new("disk full")));
}

#[test]
fn proxy_writes_feed_a_transaction() {
    let (calls, writer) = recording_writer();
    let model = Rc::new(TransactionModel::new(Some(writer)));
    let handler = ProxyHandler::new(Rc::clone(&model).sink());
    let root = Value::from(json!({"title": "Old", "meta": {"priority": 1}}));
    let proxy = handler.create_proxy(&root).expect("object target");

    model.start_transaction();
    proxy.set("title", "New").expect("write should succeed");
    proxy
        .get("meta")
        .and_then(|meta| meta.as_object().cloned())
        .expect("meta is an object")
        .set("priority", 2_u64)
        .expect("write should succeed");
    model.finish_transaction();

    assert_eq!(
        changes_of(&calls),
        vec![json!({"title": "New", "meta": {"priority": 2}})]
    );
}

#[test]
fn push_after_assigning_a_list_keeps_the_whole_list() {
    let model = Rc::new(TransactionModel::new(None));
    let handler = ProxyHandler::new(Rc::clone(&model).sink());
    let root = Value::from(json!({"tags": ["old"]}));
    let proxy = handler.create_proxy(&root).expect("object target");

    proxy
        .set("tags", vec![Value::from("a"), Value::from("b")])
        .expect("write should succeed");
    let tags = proxy.get("tags").expect("tags exists");
    let tags = tags.as_object().expect("tags is a list");
    tags.push("c").expect("push should succeed");

    assert_eq!(root.to_json(), json!({"tags": ["a", "b", "c"]}));
    assert_eq!(
        JsonValue::Object(model.changes()),
        json!({"tags": ["a", "b", "c"]})
    );

    tags.pop().expect("pop should succeed");
    assert_eq!(
        JsonValue::Object(model.changes()),
        json!({"tags": ["a", "b"]})
    );
}
