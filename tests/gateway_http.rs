//! HTTP surface over a real socket, backed by the in-memory store and queue.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::watch;
use uuid::Uuid;

use dogpay_payments::gateway::{self, state::AppState, types::error_codes};
use dogpay_payments::ledger::{LedgerStore, MemoryLedgerStore};
use dogpay_payments::queue::MemoryTransferQueue;
use dogpay_payments::transfer::{ProcessorConfig, TransferProcessor};
use dogpay_payments::user_auth::UserAuthService;

const SECRET: &str = "integration-secret";

struct TestServer {
    base: String,
    store: Arc<MemoryLedgerStore>,
    queue: Arc<MemoryTransferQueue>,
    auth: UserAuthService,
    http: reqwest::Client,
    shutdown: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    async fn start() -> Self {
        let store = Arc::new(MemoryLedgerStore::new(dec!(1000.00)));
        let queue = Arc::new(MemoryTransferQueue::default());
        let state = Arc::new(AppState::new(
            store.clone(),
            queue.clone(),
            Arc::new(UserAuthService::new(SECRET.to_string())),
            50,
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(gateway::serve(listener, state, rx));

        Self {
            base,
            store,
            queue,
            auth: UserAuthService::new(SECRET.to_string()),
            http: reqwest::Client::new(),
            shutdown,
            handle,
        }
    }

    fn token(&self, user_id: Uuid, email: &str) -> String {
        self.auth
            .issue_token(user_id, email, chrono::Duration::hours(1))
            .unwrap()
    }

    async fn stop(self) {
        let TestServer {
            http,
            shutdown,
            handle,
            ..
        } = self;
        // Release keep-alive connections so graceful shutdown can finish
        drop(http);
        shutdown.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}

#[tokio::test]
async fn payments_routes_require_bearer_token() {
    let server = TestServer::start().await;

    let resp = server
        .http
        .get(format!("{}/payments/balance", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], error_codes::MISSING_AUTH);

    let resp = server
        .http
        .get(format!("{}/payments/balance", server.base))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], error_codes::AUTH_FAILED);

    // Signed with another secret
    let forged = UserAuthService::new("other".to_string())
        .issue_token(Uuid::new_v4(), "x@example.com", chrono::Duration::hours(1))
        .unwrap();
    let resp = server
        .http
        .get(format!("{}/payments/history", server.base))
        .bearer_auth(forged)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    server.stop().await;
}

#[tokio::test]
async fn transfer_round_trip_over_http() {
    let server = TestServer::start().await;
    let alice = server.store.register_user("alice@example.com").await;
    let bob = server.store.register_user("bob@example.com").await;

    // Provisioned by the identity service
    for user_id in [alice, bob] {
        let resp = server
            .http
            .post(format!("{}/internal/accounts", server.base))
            .json(&json!({ "user_id": user_id }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let token = server.token(alice, "alice@example.com");
    let resp = server
        .http
        .post(format!("{}/payments/transfer", server.base))
        .bearer_auth(&token)
        .json(&json!({ "to_email": "bob@example.com", "amount": "30.00", "description": "rent" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let receipt: Value = resp.json().await.unwrap();
    assert_eq!(receipt["status"], "pending");
    let tx_id = receipt["transaction_id"].as_str().unwrap().to_string();

    let processor = TransferProcessor::new(
        server.store.clone(),
        server.queue.clone(),
        ProcessorConfig::default(),
    );
    assert_eq!(processor.drain().await.unwrap(), 1);

    let resp = server
        .http
        .get(format!("{}/payments/transactions/{}", server.base, tx_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let tx: Value = resp.json().await.unwrap();
    assert_eq!(tx["status"], "completed");
    assert_eq!(tx["description"], "rent");

    let resp = server
        .http
        .get(format!("{}/payments/balance", server.base))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let balance: Value = resp.json().await.unwrap();
    assert_eq!(balance["balance"], "970.00");

    let bob_token = server.token(bob, "bob@example.com");
    let resp = server
        .http
        .get(format!("{}/payments/history", server.base))
        .bearer_auth(&bob_token)
        .send()
        .await
        .unwrap();
    let history: Value = resp.json().await.unwrap();
    assert_eq!(history["transactions"].as_array().unwrap().len(), 1);

    server.stop().await;
}

#[tokio::test]
async fn invalid_transfers_are_rejected_synchronously() {
    let server = TestServer::start().await;
    let alice = server.store.register_user("alice@example.com").await;
    server.store.create_account(alice).await.unwrap();
    let token = server.token(alice, "alice@example.com");

    let cases = [
        (
            json!({ "to_email": "alice@example.com", "amount": "5.00" }),
            StatusCode::BAD_REQUEST,
            error_codes::SAME_ACCOUNT,
        ),
        (
            json!({ "to_email": "ghost@example.com", "amount": "5.00" }),
            StatusCode::NOT_FOUND,
            error_codes::RECIPIENT_NOT_FOUND,
        ),
        (
            json!({ "to_email": "not-an-email", "amount": "5.00" }),
            StatusCode::BAD_REQUEST,
            error_codes::INVALID_PARAMETER,
        ),
        (
            json!({ "to_email": "ghost@example.com", "amount": "-1" }),
            StatusCode::BAD_REQUEST,
            error_codes::INVALID_AMOUNT,
        ),
        (
            json!({ "to_email": "ghost@example.com", "amount": "1.999" }),
            StatusCode::BAD_REQUEST,
            error_codes::INVALID_AMOUNT,
        ),
        // Bodies that do not deserialize at all
        (
            json!({ "to_email": "bob@example.com" }),
            StatusCode::BAD_REQUEST,
            error_codes::INVALID_PARAMETER,
        ),
        (
            json!({ "to_email": "bob@example.com", "amount": "abc" }),
            StatusCode::BAD_REQUEST,
            error_codes::INVALID_PARAMETER,
        ),
    ];

    for (body, expected, code) in cases {
        let resp = server
            .http
            .post(format!("{}/payments/transfer", server.base))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), expected, "body: {}", body);
        let envelope: Value = resp.json().await.unwrap();
        assert_eq!(envelope["code"], code, "body: {}", body);
    }

    let resp = server
        .http
        .post(format!("{}/payments/transfer", server.base))
        .bearer_auth(&token)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = server
        .http
        .post(format!("{}/internal/accounts", server.base))
        .json(&json!({ "user_id": "not-a-uuid" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let envelope: Value = resp.json().await.unwrap();
    assert_eq!(envelope["code"], error_codes::INVALID_PARAMETER);

    assert_eq!(server.store.transaction_count().await, 0);
    assert!(server.queue.is_empty().await);

    server.stop().await;
}

#[tokio::test]
async fn failed_enqueue_reports_the_recorded_transaction() {
    let server = TestServer::start().await;
    let alice = server.store.register_user("alice@example.com").await;
    let bob = server.store.register_user("bob@example.com").await;
    server.store.create_account(alice).await.unwrap();
    server.store.create_account(bob).await.unwrap();
    let token = server.token(alice, "alice@example.com");

    server.queue.fail_next_publishes(1);
    let resp = server
        .http
        .post(format!("{}/payments/transfer", server.base))
        .bearer_auth(&token)
        .json(&json!({ "to_email": "bob@example.com", "amount": "10.00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], error_codes::QUEUE_ERROR);
    let tx_id = body["transaction_id"].as_str().unwrap().to_string();

    // The caller can poll the record instead of paying twice
    let resp = server
        .http
        .get(format!("{}/payments/transactions/{}", server.base, tx_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let tx: Value = resp.json().await.unwrap();
    assert_eq!(tx["status"], "pending");
    assert_eq!(server.store.transaction_count().await, 1);

    server.stop().await;
}

#[tokio::test]
async fn health_and_docs_are_public() {
    let server = TestServer::start().await;

    let resp = server
        .http
        .get(format!("{}/health", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "payment-service");

    let resp = server
        .http
        .get(format!("{}/api-docs/openapi.json", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let doc: Value = resp.json().await.unwrap();
    assert!(doc["paths"]["/payments/transfer"].is_object());

    server.store.set_unavailable(true);
    let resp = server
        .http
        .get(format!("{}/health", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    server.stop().await;
}
