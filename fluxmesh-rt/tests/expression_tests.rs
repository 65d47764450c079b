//! Cross-cutting expression evaluator properties.
//!
//! The expression grammar is shared by templates, transforms, and dynamic
//! configuration, so its behavior is pinned down here over a broad range
//! of shapes.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use fluxmesh_rt::message::Message;
use fluxmesh_rt::{Evaluator, Expression};
use serde_json::json;

#[test]
fn test_get_set_roundtrip_over_many_paths_and_values() {
    let evaluator = Evaluator::new();
    let paths = [
        "input.payload:a",
        "input.payload:a.b.c",
        "input.payload:list.3",
        "user_data.ns",
        "user_data.ns:deep.2.field",
        "previous:x.y",
    ];
    let values = [
        json!(null),
        json!(true),
        json!(42),
        json!(2.5),
        json!("text"),
        json!([1, [2, 3], {"k": "v"}]),
        json!({"nested": {"list": [1, 2, 3]}}),
    ];

    for path in paths {
        for value in &values {
            let mut message = Message::new(json!({}));
            evaluator
                .set_str(path, &mut message, value.clone())
                .unwrap();
            assert_eq!(
                evaluator.evaluate_str(path, &message, None).unwrap(),
                *value,
                "roundtrip failed for {path}"
            );
        }
    }
}

#[test]
fn test_whole_object_addressing_forms_agree() {
    let evaluator = Evaluator::new();
    let message = Message::new(json!({"key": [1, 2]}));
    let bare = evaluator
        .evaluate_str("input.payload", &message, None)
        .unwrap();
    let dangling = evaluator
        .evaluate_str("input.payload:", &message, None)
        .unwrap();
    assert_eq!(bare, dangling);
}

#[test]
fn test_sequence_padding_matches_expected_shape() {
    let evaluator = Evaluator::new();
    let mut message = Message::new(json!({"key1": "value1", "key2": 2}));
    evaluator
        .set_str("input.payload:key7.1", &mut message, json!(5))
        .unwrap();
    evaluator
        .set_str("input.payload:key7.3.1", &mut message, json!(6))
        .unwrap();
    assert_eq!(
        evaluator
            .evaluate_str("input.payload:key7", &message, None)
            .unwrap(),
        json!([null, 5, null, [null, 6]])
    );
}

#[test]
fn test_unknown_sources_fail_at_parse_time() {
    for bad in [
        "invalid_expression",
        "invalid_type:invalid_name",
        "input.invalid_name",
        "input.payload.invalid_name",
    ] {
        assert!(Expression::parse(bad).is_err(), "{bad} should not parse");
    }
}

#[test]
fn test_template_composes_all_encoders() {
    let evaluator = Evaluator::new();
    let message = Message::new(json!({"item": {"subitem": "value"}})).with_topic("a/b/c");

    let rendered = evaluator
        .render_template(
            "plain={{input.topic}} json={{json://input.payload:item}} yaml={{yaml://input.payload:item}}",
            &message,
            None,
        )
        .unwrap();
    assert_eq!(
        rendered,
        "plain=a/b/c json={\"subitem\":\"value\"} yaml=subitem: value\n"
    );
}

#[test]
fn test_topic_levels_indexing() {
    let evaluator = Evaluator::new();
    let message = Message::new(json!(null))
        .with_topic("a/valid/topic/with/a/very/long/length");
    let levels = evaluator
        .evaluate_str("input.topic_levels", &message, None)
        .unwrap();
    assert_eq!(levels.as_array().unwrap().len(), 8);
    assert_eq!(
        evaluator
            .evaluate_str("input.topic_levels:0", &message, None)
            .unwrap(),
        json!("a")
    );
}
