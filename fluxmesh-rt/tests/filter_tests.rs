//! Tests for the message_filter component.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use fluxmesh_rt::message::Message;
use fluxmesh_rt::testkit::create_test_flows_yaml;
use fluxmesh_rt::Evaluator;
use serde_json::json;

#[tokio::test]
async fn test_simple_filter() {
    let config = r#"
flows:
  - name: test_flow
    components:
      - component_name: message_filter
        component_module: message_filter
        component_config:
          filter_expression:
            invoke:
              module: invoke_functions
              function: equal
              params:
                positional:
                  - evaluate_expression(input.payload:my_list.1)
                  - 2
"#;

    let harness = create_test_flows_yaml(config).await.unwrap();
    let flow = &harness.flows[0];

    // Send 3 messages - the first and last should be passed on
    flow.send(Message::new(json!({"my_list": [1, 2, 3]}))).await;
    flow.send(Message::new(json!({"my_list": [4, 5, 6]}))).await;
    flow.send(Message::new(json!({"my_list": [3, 2, 1]}))).await;

    let evaluator = Evaluator::new();
    let first = flow.receive().await.unwrap();
    assert_eq!(
        evaluator
            .evaluate_str("input.payload:my_list", &first, None)
            .unwrap(),
        json!([1, 2, 3])
    );
    let second = flow.receive().await.unwrap();
    assert_eq!(
        evaluator
            .evaluate_str("input.payload:my_list", &second, None)
            .unwrap(),
        json!([3, 2, 1])
    );

    harness.dispose().await;
}

#[tokio::test]
async fn test_missing_item_filter() {
    let config = r#"
flows:
  - name: test_flow
    components:
      - component_name: message_filter
        component_module: message_filter
        component_config:
          filter_expression:
            invoke:
              module: invoke_functions
              function: not_equal
              params:
                positional:
                  - evaluate_expression(input.payload:my_list)
                  - null
"#;

    let harness = create_test_flows_yaml(config).await.unwrap();
    let flow = &harness.flows[0];

    flow.send(Message::new(
        json!({"my_list": [1, 2, 3], "my_obj": {"a": 1, "b": 2}}),
    ))
    .await;
    flow.send(Message::new(json!({"my_obj": {"a": 1, "b": 2}})))
        .await;
    flow.send(Message::new(
        json!({"my_list": [3, 2, 1], "my_obj": {"a": 1, "b": 2}}),
    ))
    .await;

    let evaluator = Evaluator::new();
    let first = flow.receive().await.unwrap();
    assert_eq!(
        evaluator
            .evaluate_str("input.payload:my_list", &first, None)
            .unwrap(),
        json!([1, 2, 3])
    );
    let second = flow.receive().await.unwrap();
    assert_eq!(
        evaluator
            .evaluate_str("input.payload:my_list", &second, None)
            .unwrap(),
        json!([3, 2, 1])
    );

    harness.dispose().await;
}

#[tokio::test]
async fn test_filter_with_multi_stage_data() {
    let config = r#"
flows:
  - name: test_flow
    components:
      - component_name: user_processor
        component_module: user_processor
        component_config:
          component_processing:
            invoke:
              module: invoke_functions
              function: add
              params:
                positional:
                  - 5
                  - 6
      - component_name: message_filter
        component_module: message_filter
        component_config:
          filter_expression:
            invoke:
              module: invoke_functions
              function: not_equal
              params:
                positional:
                  - 1
                  - 2
        input_transforms:
          - type: copy
            source_expression: previous
            dest_expression: user_data.output
      - component_name: pass_through
        component_module: pass_through
"#;

    let harness = create_test_flows_yaml(config).await.unwrap();
    let flow = &harness.flows[0];

    flow.send(Message::new(
        json!({"my_list": [1, 2, 3], "my_obj": {"a": 1, "b": 2}}),
    ))
    .await;

    let evaluator = Evaluator::new();
    let output = flow.receive().await.unwrap();
    assert_eq!(
        evaluator
            .evaluate_str("input.payload:my_list", &output, None)
            .unwrap(),
        json!([1, 2, 3])
    );
    assert_eq!(
        evaluator
            .evaluate_str("user_data.output", &output, None)
            .unwrap(),
        json!(11)
    );

    harness.dispose().await;
}

#[tokio::test]
async fn test_filter_discard_fires_upstream_acks() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    let config = r#"
flows:
  - name: test_flow
    components:
      - component_name: message_filter
        component_module: message_filter
        component_config:
          filter_expression:
            invoke:
              module: invoke_functions
              function: equal
              params:
                positional:
                  - evaluate_expression(input.payload:keep)
                  - true
"#;

    let harness = create_test_flows_yaml(config).await.unwrap();
    let flow = &harness.flows[0];

    let acked = Arc::new(AtomicBool::new(false));
    let acked_flag = Arc::clone(&acked);
    let message = Message::new(json!({"keep": false}));
    message.add_acknowledgement(Box::new(move || {
        acked_flag.store(true, Ordering::SeqCst);
    }));

    flow.send(message).await;

    // The message is discarded, so nothing reaches the sink...
    assert!(flow
        .receive_timeout(std::time::Duration::from_millis(300))
        .await
        .is_none());
    // ...and the upstream acknowledgement has fired
    assert!(acked.load(Ordering::SeqCst));

    harness.dispose().await;
}
