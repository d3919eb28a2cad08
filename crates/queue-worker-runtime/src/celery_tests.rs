//! Tests for Celery envelopes.

use super::*;
use serde_json::json;

fn decode_envelope(message: &CeleryMessage) -> Envelope {
    let json = STANDARD.decode(&message.body).unwrap();
    serde_json::from_slice(&json).unwrap()
}

#[test]
fn test_envelope_headers_and_properties() {
    let message = build_celery_message("tasks.add", &[json!(1), json!(2)], &Map::new()).unwrap();
    let envelope = decode_envelope(&message);

    assert_eq!(envelope.headers.task, "tasks.add");
    assert_eq!(envelope.headers.lang, "py");
    assert_eq!(envelope.headers.id, message.task_id);
    assert_eq!(envelope.headers.root_id, message.task_id);
    assert!(envelope.headers.parent_id.is_none());
    assert!(envelope.headers.group.is_none());

    assert_eq!(envelope.properties.correlation_id, message.task_id);
    assert_eq!(envelope.properties.body_encoding, "base64");
    assert_eq!(envelope.properties.delivery_info.routing_key, "celery");
    assert_eq!(envelope.properties.delivery_info.exchange, "");
    assert_eq!(envelope.content_type, "application/json");
    assert_eq!(envelope.content_encoding, "utf-8");
}

#[test]
fn test_envelope_body_carries_arguments() {
    let mut kwargs = Map::new();
    kwargs.insert("user_id".to_string(), json!("US123"));

    let message = build_celery_message("tasks.notify", &[json!("hello")], &kwargs).unwrap();
    let envelope = decode_envelope(&message);

    let body: Value = serde_json::from_slice(&STANDARD.decode(envelope.body).unwrap()).unwrap();
    assert_eq!(
        body,
        json!([
            ["hello"],
            {"user_id": "US123"},
            {"callbacks": null, "errbacks": null, "chain": null, "chord": null}
        ])
    );
}

#[test]
fn test_envelope_wire_field_names() {
    let message = build_celery_message("t", &[], &Map::new()).unwrap();
    let raw: Value = serde_json::from_slice(&STANDARD.decode(&message.body).unwrap()).unwrap();

    assert!(raw.get("content-type").is_some());
    assert!(raw.get("content-encoding").is_some());
    assert!(raw["headers"].get("parent_id").unwrap().is_null());
}

#[test]
fn test_task_ids_are_unique() {
    let a = build_celery_message("t", &[], &Map::new()).unwrap();
    let b = build_celery_message("t", &[], &Map::new()).unwrap();
    assert_ne!(a.task_id, b.task_id);
}
