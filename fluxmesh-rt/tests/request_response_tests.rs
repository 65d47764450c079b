//! Request/response correlation: sessions, synchronous round trips,
//! fire-and-forget, and timeouts.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use fluxmesh_rt::messaging::{MessagingServiceBuilder, SharedBrokerStore};
use fluxmesh_rt::rrc::{DEFAULT_REPLY_METADATA_KEY, DEFAULT_REPLY_TOPIC_KEY};
use fluxmesh_rt::testkit::create_test_flows_with;
use fluxmesh_rt::{
    Connector, Message, RequestOptions, RequestOutcome, RrcError,
};
use serde_json::{json, Value};

fn messaging() -> MessagingServiceBuilder {
    MessagingServiceBuilder::with_store(SharedBrokerStore::new())
}

/// Echo responder: receives requests on `request/>` and publishes each
/// payload back to the advertised reply topic with the correlation
/// metadata intact.
async fn spawn_echo_responder(messaging: &MessagingServiceBuilder) {
    let broker = messaging
        .clone()
        .from_properties(&json!({
            "broker_type": "dev_broker",
            "queue_name": "echo-responder",
            "subscriptions": [{"topic": "request/>"}],
        }))
        .unwrap()
        .build()
        .unwrap();
    broker.connect().await.unwrap();
    tokio::spawn(async move {
        loop {
            match broker.receive_message(500, "echo-responder").await {
                Ok(Some(request)) => {
                    let Some(reply_topic) = request
                        .user_properties
                        .get(DEFAULT_REPLY_TOPIC_KEY)
                        .and_then(Value::as_str)
                        .map(str::to_string)
                    else {
                        continue;
                    };
                    let _ = broker
                        .send_message(
                            &reply_topic,
                            request.payload.clone(),
                            Some(request.user_properties.clone()),
                            None,
                        )
                        .await;
                }
                Ok(None) => {}
                Err(_) => break,
            }
        }
    });
}

fn session_config() -> Value {
    json!({
        "flows": [{
            "name": "session_flow",
            "components": [{
                "component_name": "session_handler",
                "component_module": "pass_through",
                "multi_session_request_response": {
                    "enabled": true,
                    "default_broker_config": {"broker_type": "dev_broker"},
                    "request_expiry_ms": 3000,
                },
            }],
        }]
    })
}

#[tokio::test]
async fn test_multi_session_lifecycle_and_isolation() {
    let messaging = messaging();
    spawn_echo_responder(&messaging).await;
    let harness = create_test_flows_with(
        Connector::builder().with_messaging(messaging.clone()),
        &session_config(),
    )
    .await
    .unwrap();

    let flow = harness.connector.flow("session_flow").unwrap();
    let context = flow.groups()[0].context(0).unwrap();
    let sessions = Arc::clone(context.sessions().unwrap());

    // 1. Create two sessions
    let session_a = sessions.create_session(None).await.unwrap();
    let session_b = sessions
        .create_session(Some(json!({"request_expiry_ms": 60000})))
        .await
        .unwrap();
    assert_ne!(session_a, session_b);

    // 2. Use both sessions independently
    let message_a = Message::new(json!({"data": "A"})).with_topic("request/topic");
    let response_a = context
        .do_broker_request_response(
            &message_a,
            RequestOptions::synchronous(),
            Some(session_a.as_str()),
        )
        .await
        .unwrap();
    match response_a {
        RequestOutcome::Response(response) => {
            assert_eq!(response.payload(), &json!({"data": "A"}))
        }
        _ => panic!("expected a response"),
    }

    let message_b = Message::new(json!({"data": "B"})).with_topic("request/topic");
    let response_b = context
        .do_broker_request_response(
            &message_b,
            RequestOptions::synchronous(),
            Some(session_b.as_str()),
        )
        .await
        .unwrap();
    match response_b {
        RequestOutcome::Response(response) => {
            assert_eq!(response.payload(), &json!({"data": "B"}))
        }
        _ => panic!("expected a response"),
    }

    // 3. List sessions and verify status
    let listed = sessions.list_sessions();
    assert_eq!(listed.len(), 2);
    let ids: std::collections::HashSet<String> =
        listed.iter().map(|s| s.session_id.clone()).collect();
    assert!(ids.contains(session_a.as_str()));
    assert!(ids.contains(session_b.as_str()));
    for session in &listed {
        assert_eq!(session.active_request_count, 0);
    }

    // 4. Destroy one session
    assert!(sessions.destroy_session(session_a.as_str()).await);
    assert_eq!(sessions.list_sessions().len(), 1);

    // 5. Using the destroyed session fails
    let result = context
        .do_broker_request_response(
            &message_a,
            RequestOptions::synchronous(),
            Some(session_a.as_str()),
        )
        .await;
    assert!(matches!(result, Err(RrcError::SessionNotFound(_))));

    // 6. The other session is still functional, and the internal reply
    // metadata was stripped from the returned message
    let again = context
        .do_broker_request_response(
            &message_b,
            RequestOptions::synchronous(),
            Some(session_b.as_str()),
        )
        .await
        .unwrap();
    match again {
        RequestOutcome::Response(response) => {
            assert_eq!(response.payload(), &json!({"data": "B"}));
            assert!(!response
                .user_properties()
                .contains_key(DEFAULT_REPLY_METADATA_KEY));
            assert!(!response
                .user_properties()
                .contains_key(DEFAULT_REPLY_TOPIC_KEY));
        }
        _ => panic!("expected a response"),
    }

    // 7. Destroy the second session
    assert!(sessions.destroy_session(session_b.as_str()).await);
    assert!(sessions.list_sessions().is_empty());

    harness.dispose().await;
}

#[tokio::test]
async fn test_fire_and_forget_sends_without_waiting() {
    let messaging = messaging();
    let harness = create_test_flows_with(
        Connector::builder().with_messaging(messaging.clone()),
        &session_config(),
    )
    .await
    .unwrap();

    // Observe the request side directly
    let observer = messaging
        .clone()
        .from_properties(&json!({"broker_type": "dev_broker"}))
        .unwrap()
        .build()
        .unwrap();
    observer.connect().await.unwrap();
    observer
        .add_topic_to_queue("request/>", "ff-observer")
        .await
        .unwrap();

    let flow = harness.connector.flow("session_flow").unwrap();
    let context = flow.groups()[0].context(0).unwrap();
    let sessions = Arc::clone(context.sessions().unwrap());
    let session = sessions.create_session(None).await.unwrap();

    let message = Message::new(json!({"data": "fire_and_forget"})).with_topic("request/topic");
    let outcome = context
        .do_broker_request_response(
            &message,
            RequestOptions {
                wait_for_response: false,
                ..RequestOptions::default()
            },
            Some(session.as_str()),
        )
        .await
        .unwrap();
    assert!(matches!(outcome, RequestOutcome::Sent));

    // The request was published with correlation metadata attached
    let published = observer
        .receive_message(2000, "ff-observer")
        .await
        .unwrap()
        .unwrap();
    assert!(published
        .user_properties
        .contains_key(DEFAULT_REPLY_METADATA_KEY));
    assert!(published
        .user_properties
        .contains_key(DEFAULT_REPLY_TOPIC_KEY));

    assert!(sessions.destroy_session(session.as_str()).await);
    harness.dispose().await;
}

#[tokio::test]
async fn test_session_request_timeout() {
    let messaging = messaging();
    // No responder is listening
    let harness = create_test_flows_with(
        Connector::builder().with_messaging(messaging.clone()),
        &session_config(),
    )
    .await
    .unwrap();

    let flow = harness.connector.flow("session_flow").unwrap();
    let context = flow.groups()[0].context(0).unwrap();
    let sessions = Arc::clone(context.sessions().unwrap());
    let session = sessions
        .create_session(Some(json!({"request_expiry_ms": 100})))
        .await
        .unwrap();

    let message = Message::new(json!({"data": "nobody"})).with_topic("request/void");
    let result = context
        .do_broker_request_response(
            &message,
            RequestOptions::synchronous(),
            Some(session.as_str()),
        )
        .await;
    assert!(matches!(result, Err(RrcError::Timeout)));

    harness.dispose().await;
}

#[tokio::test]
async fn test_component_level_request_response() {
    let messaging = messaging();
    spawn_echo_responder(&messaging).await;

    let config = json!({
        "flows": [{
            "name": "legacy_flow",
            "components": [{
                "component_name": "requester",
                "component_module": "pass_through",
                "broker_request_response": {
                    "broker_config": {"broker_type": "dev_broker"},
                    "request_expiry_ms": 3000,
                },
            }],
        }]
    });
    let harness = create_test_flows_with(
        Connector::builder().with_messaging(messaging.clone()),
        &config,
    )
    .await
    .unwrap();

    let flow = harness.connector.flow("legacy_flow").unwrap();
    let context = flow.groups()[0].context(0).unwrap();

    let message = Message::new(json!({"ask": 42})).with_topic("request/legacy");
    let outcome = context
        .do_broker_request_response(&message, RequestOptions::synchronous(), None)
        .await
        .unwrap();
    match outcome {
        RequestOutcome::Response(response) => {
            assert_eq!(response.payload(), &json!({"ask": 42}))
        }
        _ => panic!("expected a response"),
    }

    harness.dispose().await;
}

#[tokio::test]
async fn test_request_ids_are_pairwise_distinct() {
    let ids: Vec<String> = (0..1000)
        .map(|_| fluxmesh_rt::RequestId::new().to_string())
        .collect();
    let unique: std::collections::HashSet<&String> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len());
}

#[tokio::test]
async fn test_streaming_response_chunks() {
    let messaging = messaging();

    // Responder that sends three chunks, the last marked done
    let responder = messaging
        .clone()
        .from_properties(&json!({
            "broker_type": "dev_broker",
            "queue_name": "stream-responder",
            "subscriptions": [{"topic": "request/stream"}],
        }))
        .unwrap()
        .build()
        .unwrap();
    responder.connect().await.unwrap();
    tokio::spawn(async move {
        if let Ok(Some(request)) = responder.receive_message(3000, "stream-responder").await {
            let reply_topic = request
                .user_properties
                .get(DEFAULT_REPLY_TOPIC_KEY)
                .and_then(Value::as_str)
                .unwrap()
                .to_string();
            for chunk in 0..3u8 {
                let payload = json!({"chunk": chunk, "done": chunk == 2});
                let _ = responder
                    .send_message(
                        &reply_topic,
                        serde_json::to_vec(&payload).unwrap(),
                        Some(request.user_properties.clone()),
                        None,
                    )
                    .await;
            }
        }
    });

    let harness = create_test_flows_with(
        Connector::builder().with_messaging(messaging.clone()),
        &session_config(),
    )
    .await
    .unwrap();
    let flow = harness.connector.flow("session_flow").unwrap();
    let context = flow.groups()[0].context(0).unwrap();
    let sessions = Arc::clone(context.sessions().unwrap());
    let session = sessions.create_session(None).await.unwrap();

    let message = Message::new(json!({"q": 1})).with_topic("request/stream");
    let outcome = context
        .do_broker_request_response(
            &message,
            RequestOptions::streaming("input.payload:done"),
            Some(session.as_str()),
        )
        .await
        .unwrap();

    let mut receiver = match outcome {
        RequestOutcome::Stream(receiver) => receiver,
        _ => panic!("expected a stream"),
    };

    let mut chunks = Vec::new();
    let deadline = Duration::from_secs(5);
    loop {
        match tokio::time::timeout(deadline, receiver.recv()).await {
            Ok(Some(fluxmesh_rt::rrc::RrcEvent::Chunk { message, is_last })) => {
                chunks.push(message.payload().clone());
                if is_last {
                    break;
                }
            }
            other => panic!("unexpected stream event: {other:?}"),
        }
    }
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0]["chunk"], json!(0));
    assert_eq!(chunks[2]["done"], json!(true));

    harness.dispose().await;
}
