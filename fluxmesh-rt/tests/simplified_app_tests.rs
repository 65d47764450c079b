//! Simplified apps: implicit flow synthesis, the subscription router,
//! and app-level configuration precedence.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use fluxmesh_rt::messaging::{MessagingServiceBuilder, SharedBrokerStore};
use fluxmesh_rt::testkit::{create_test_flows_with, create_test_flows_yaml};
use fluxmesh_rt::{Connector, Evaluator};
use serde_json::json;

fn messaging() -> MessagingServiceBuilder {
    MessagingServiceBuilder::with_store(SharedBrokerStore::new())
}

fn routed_app() -> serde_json::Value {
    json!({
        "apps": [{
            "name": "routed",
            "broker": {
                "broker_type": "dev_broker",
                "queue_name": "routed-queue",
                "input_enabled": true,
                "payload_format": "json",
                "subscriptions": [{"topic": "t/>"}],
            },
            "components": [
                {
                    "component_name": "comp1",
                    "component_module": "pass_through",
                    "subscriptions": [{"topic": "t/one/>"}],
                    "input_transforms": [{
                        "type": "append",
                        "source_expression": "static:one",
                        "dest_expression": "user_data.route:path",
                    }],
                },
                {
                    "component_name": "comp2",
                    "component_module": "pass_through",
                    "subscriptions": [{"topic": "t/two/>"}],
                    "input_transforms": [{
                        "type": "append",
                        "source_expression": "static:two",
                        "dest_expression": "user_data.route:path",
                    }],
                },
            ],
        }]
    })
}

#[tokio::test]
async fn test_implicit_flow_is_synthesized() {
    let messaging = messaging();
    let harness =
        create_test_flows_with(Connector::builder().with_messaging(messaging.clone()), &routed_app())
            .await
            .unwrap();

    let flow = harness.connector.flow("routed_implicit_flow").unwrap();
    let names: Vec<&str> = flow.groups().iter().map(|g| g.name()).collect();
    assert_eq!(names, vec!["_broker_input", "_router", "comp1", "comp2"]);

    harness.dispose().await;
}

#[tokio::test]
async fn test_router_dispatches_by_subscription() {
    let messaging = messaging();
    let harness =
        create_test_flows_with(Connector::builder().with_messaging(messaging.clone()), &routed_app())
            .await
            .unwrap();
    let flow = &harness.flows[0];

    let broker = messaging
        .clone()
        .from_properties(&json!({"broker_type": "dev_broker"}))
        .unwrap()
        .build()
        .unwrap();
    broker.connect().await.unwrap();

    let evaluator = Evaluator::new();

    // Routed to comp2: only comp2's transform runs
    broker
        .send_message(
            "t/two/x",
            serde_json::to_vec(&json!({"v": 2})).unwrap(),
            None,
            None,
        )
        .await
        .unwrap();
    let output = flow.receive().await.unwrap();
    assert_eq!(
        evaluator
            .evaluate_str("user_data.route:path", &output, None)
            .unwrap(),
        json!(["two"])
    );

    // Routed to comp1: the message then traverses the rest of the
    // pipeline, so both transforms run in order
    broker
        .send_message(
            "t/one/x",
            serde_json::to_vec(&json!({"v": 1})).unwrap(),
            None,
            None,
        )
        .await
        .unwrap();
    let output = flow.receive().await.unwrap();
    assert_eq!(
        evaluator
            .evaluate_str("user_data.route:path", &output, None)
            .unwrap(),
        json!(["one", "two"])
    );

    harness.dispose().await;
}

#[tokio::test]
async fn test_router_drops_unmatched_topics() {
    let messaging = messaging();
    let harness =
        create_test_flows_with(Connector::builder().with_messaging(messaging.clone()), &routed_app())
            .await
            .unwrap();
    let flow = &harness.flows[0];

    let broker = messaging
        .clone()
        .from_properties(&json!({"broker_type": "dev_broker"}))
        .unwrap()
        .build()
        .unwrap();
    broker.connect().await.unwrap();

    // The app's queue subscribes to the component topics only, but even a
    // message that reaches the router without a component match is dropped
    broker
        .send_message(
            "t/one",
            serde_json::to_vec(&json!({"v": 0})).unwrap(),
            None,
            None,
        )
        .await
        .unwrap();
    assert!(flow.receive_timeout(Duration::from_millis(300)).await.is_none());

    harness.dispose().await;
}

#[tokio::test]
async fn test_app_level_config_is_visible_to_components() {
    // component_processing comes from the app_config layer, exercising
    // the component > app > flow precedence chain
    let config = r#"
apps:
  - name: layered
    app_config:
      component_processing:
        invoke:
          module: invoke_functions
          function: add
          params:
            positional:
              - 5
              - 6
    flows:
      - name: layered_flow
        components:
          - component_name: processor
            component_module: user_processor
"#;

    let harness = create_test_flows_yaml(config).await.unwrap();
    let flow = &harness.flows[0];

    flow.send(fluxmesh_rt::Message::new(json!({}))).await;
    let output = flow.receive().await.unwrap();
    assert_eq!(
        Evaluator::new()
            .evaluate_str("previous", &output, None)
            .unwrap(),
        json!(11)
    );

    harness.dispose().await;
}

#[tokio::test]
async fn test_app_schema_rejects_missing_required_parameter() {
    let config = json!({
        "apps": [{
            "name": "strict",
            "app_schema": {
                "config_parameters": [
                    {"name": "endpoint", "required": true},
                ]
            },
            "app_config": {},
            "flows": [{
                "name": "f",
                "components": [{
                    "component_name": "c",
                    "component_module": "pass_through",
                }],
            }],
        }]
    });

    let result = Connector::new(&config).await;
    let error = result.err().map(|e| e.to_string()).unwrap_or_default();
    assert!(error.contains("endpoint"));
}

#[tokio::test]
async fn test_legacy_top_level_flows_become_default_app() {
    let config = r#"
flows:
  - name: legacy_flow
    components:
      - component_name: pass_through
        component_module: pass_through
"#;

    let harness = create_test_flows_yaml(config).await.unwrap();
    assert_eq!(harness.connector.apps().len(), 1);
    assert_eq!(harness.connector.apps()[0].name(), "default_app");
    assert!(harness.connector.flow("legacy_flow").is_some());
    harness.dispose().await;
}

#[tokio::test]
async fn test_app_num_instances_builds_independent_apps() {
    let config = json!({
        "apps": [{
            "name": "multi",
            "num_instances": 2,
            "flows": [{
                "name": "multi_flow",
                "components": [{
                    "component_name": "c",
                    "component_module": "pass_through",
                }],
            }],
        }]
    });

    let harness = create_test_flows_with(Connector::builder(), &config)
        .await
        .unwrap();
    let names: Vec<&str> = harness
        .connector
        .apps()
        .iter()
        .map(|app| app.name())
        .collect();
    assert_eq!(names, vec!["multi_0", "multi_1"]);
    harness.dispose().await;
}
