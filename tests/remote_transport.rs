//! End-to-end transport behaviour against a mock storefront API.
//!
//! The mock implements only the shopper endpoints under `/api`; the admin
//! endpoints are unrouted, so requests for them get a genuine HTTP 404.

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{Value, json};

use storefront_chat::messaging::{
    Conversation, ConversationId, FallbackTransport, LocalFallbackStore, LocalTransport,
    MemorySlot, Message, MessageOrigin, MessageTransport, MessagingConfig, MessagingError,
    RemoteTransport, ReplyPayload, SendMessagePayload, TransportMode, UserId, UserMeta,
    build_transport_with_slot,
};

const TOKEN: &str = "secret";

#[derive(Default)]
struct Backend {
    conversations: Mutex<Vec<Conversation>>,
}

type Reply = (StatusCode, Json<Value>);

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == format!("Bearer {TOKEN}"))
}

fn unauthorized() -> Reply {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "success": false, "message": "token expired" })),
    )
}

async fn send_message(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(payload): Json<SendMessagePayload>,
) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    if payload.content.contains("blocked") {
        return (
            StatusCode::OK,
            Json(json!({ "success": false, "message": "blocked by moderation" })),
        );
    }

    let now = Utc::now();
    let mut conversations = backend.conversations.lock().unwrap();
    let index = match conversations
        .iter()
        .position(|conversation| conversation.user_id == payload.user_id)
    {
        Some(index) => index,
        None => {
            conversations.push(Conversation::new(
                payload.user_id.clone(),
                payload.user_meta.clone(),
                now,
            ));
            conversations.len() - 1
        }
    };
    let message = Message::new(MessageOrigin::User, payload.content, now);
    let conversation = &mut conversations[index];
    conversation.push_message(message.clone());

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": {
                "conversationId": conversation.id,
                "conversation": conversation,
                "message": message,
            }
        })),
    )
}

async fn list_conversations(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Reply {
    if !authorized(&headers) {
        return unauthorized();
    }
    // List items come without message bodies, keyed by `_id`.
    let items: Vec<Value> = backend
        .conversations
        .lock()
        .unwrap()
        .iter()
        .map(|conversation| {
            json!({
                "_id": conversation.id,
                "userId": conversation.user_id,
                "userMeta": conversation.user_meta,
                "createdAt": conversation.created_at,
                "updatedAt": conversation.updated_at,
                "lastMessagePreview": conversation.last_message_preview,
            })
        })
        .collect();
    (StatusCode::OK, Json(json!({ "success": true, "data": items })))
}

async fn broken() -> Reply {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "message": "database down" })),
    )
}

async fn spawn_backend() -> (String, Arc<Backend>) {
    let backend = Arc::new(Backend::default());
    let app = Router::new()
        .route("/api/messages", post(send_message))
        .route("/api/messages/conversations", get(list_conversations))
        .route("/broken/messages", post(broken))
        .route("/broken/messages/conversations", get(broken))
        .route("/broken/admin/messages/conversations", get(broken))
        .with_state(Arc::clone(&backend));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), backend)
}

fn config(origin: &str, prefix: &str) -> MessagingConfig {
    MessagingConfig::new()
        .with_base_url(format!("{origin}/{prefix}"))
        .with_bearer_token(TOKEN)
}

fn remote(origin: &str, prefix: &str) -> RemoteTransport {
    RemoteTransport::new(&config(origin, prefix).remote).unwrap()
}

fn with_local(primary: RemoteTransport) -> (Arc<LocalTransport>, FallbackTransport) {
    let local = Arc::new(LocalTransport::new(Arc::new(LocalFallbackStore::in_memory())));
    let transport = FallbackTransport::new(Arc::new(primary), local.clone());
    (local, transport)
}

fn payload(user: &str, content: &str) -> SendMessagePayload {
    SendMessagePayload {
        user_id: UserId::new(user),
        user_meta: Some(UserMeta {
            email: Some(format!("{user}@shop.test")),
            name: None,
        }),
        content: content.to_string(),
    }
}

#[tokio::test]
async fn implemented_endpoints_are_served_remotely() {
    let (origin, backend) = spawn_backend().await;
    let (local, transport) = with_local(remote(&origin, "api"));

    let sent = transport.send_message(payload("u1", "Hello")).await.unwrap();
    assert_eq!(sent.message.content, "Hello");
    assert_eq!(sent.conversation_id, sent.conversation.id);

    let listed = transport
        .get_user_conversations(Some(UserId::new("u1")))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, sent.conversation_id);
    assert_eq!(listed[0].last_message_preview.as_deref(), Some("Hello"));

    assert_eq!(backend.conversations.lock().unwrap().len(), 1);
    assert!(local.store().load().conversations.is_empty());
}

#[tokio::test]
async fn unimplemented_endpoints_fall_back_to_local_store() {
    let (origin, _backend) = spawn_backend().await;
    let (local, transport) = with_local(remote(&origin, "v0"));

    let sent = transport.send_message(payload("u1", "Hello")).await.unwrap();
    transport
        .send_message(payload("u1", "Still there?"))
        .await
        .unwrap();
    let reply = transport
        .admin_send_reply(
            sent.conversation_id.clone(),
            ReplyPayload {
                content: "We're here".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(reply.message.from, MessageOrigin::Admin);

    let all = transport.get_user_conversations(None).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].last_message_preview.as_deref(), Some("We're here"));

    let opened = transport
        .admin_get_conversation(sent.conversation_id.clone())
        .await
        .unwrap();
    let contents: Vec<&str> = opened.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["Hello", "Still there?", "We're here"]);
    assert_eq!(local.store().load().conversations.len(), 1);
}

#[tokio::test]
async fn admin_routes_fall_back_while_shopper_routes_stay_remote() {
    let (origin, _backend) = spawn_backend().await;
    let (local, transport) = with_local(remote(&origin, "api"));

    transport.send_message(payload("u1", "Hello")).await.unwrap();
    let admin_list = transport.get_user_conversations(None).await.unwrap();

    // The admin list is served by the (empty) local store.
    assert!(admin_list.is_empty());
    assert!(local.store().load().conversations.is_empty());

    let err = transport
        .admin_send_reply(
            ConversationId::new("conv_missing"),
            ReplyPayload {
                content: "We're here".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MessagingError::NotFound(_)));
}

#[tokio::test]
async fn server_errors_are_not_masked() {
    let (origin, _backend) = spawn_backend().await;
    let (local, transport) = with_local(remote(&origin, "broken"));

    let err = transport.send_message(payload("u1", "Hello")).await.unwrap_err();
    match err {
        MessagingError::Http { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "database down");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(
        transport
            .get_user_conversations(None)
            .await
            .unwrap_err()
            .is_transport_failure()
    );
    assert!(local.store().load().conversations.is_empty());
}

#[tokio::test]
async fn auth_failures_propagate() {
    let (origin, _backend) = spawn_backend().await;
    let config = MessagingConfig::new().with_base_url(format!("{origin}/api"));
    let (_local, transport) = with_local(RemoteTransport::new(&config.remote).unwrap());

    let err = transport.send_message(payload("u1", "Hello")).await.unwrap_err();
    assert!(matches!(
        err,
        MessagingError::Http { status: 401, ref message } if message == "token expired"
    ));
}

#[tokio::test]
async fn unsuccessful_envelope_is_rejected() {
    let (origin, _backend) = spawn_backend().await;
    let err = remote(&origin, "api")
        .send_message(payload("u1", "this is blocked"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MessagingError::Rejected(ref message) if message == "blocked by moderation"
    ));
}

#[tokio::test]
async fn unreachable_api_is_a_transport_failure() {
    let (origin, _backend) = spawn_backend().await;
    let remote = remote(&origin, "api");
    // Nothing listens on port 9 of the loopback interface.
    let unreachable = RemoteTransport::new(&config("http://127.0.0.1:9", "api").remote).unwrap();
    assert!(remote.probe().await.unwrap());

    let (local, transport) = with_local(unreachable);
    let err = transport.send_message(payload("u1", "Hello")).await.unwrap_err();
    assert!(matches!(err, MessagingError::Request(_)));
    assert!(local.store().load().conversations.is_empty());
}

#[tokio::test]
async fn probe_mode_picks_transport_once() {
    let (origin, _backend) = spawn_backend().await;

    let present = config(&origin, "api").with_transport(TransportMode::Probe);
    let transport = build_transport_with_slot(&present, Arc::new(MemorySlot::new()))
        .await
        .unwrap();
    assert_eq!(transport.name(), "remote");

    let missing = config(&origin, "v0").with_transport(TransportMode::Probe);
    let transport = build_transport_with_slot(&missing, Arc::new(MemorySlot::new()))
        .await
        .unwrap();
    assert_eq!(transport.name(), "local");

    let sent = transport.send_message(payload("u1", "Hello")).await.unwrap();
    assert_eq!(sent.conversation.messages.len(), 1);
}
