//! Integration tests for the PicklePot backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::errors::AppError;
use crate::owner::OwnerCredentials;
use crate::stripe::{
    signature_header, CheckoutMode, CheckoutSession, CheckoutSessionParams, PaymentGateway,
    StripeCustomer, StripeSubscription,
};
use crate::{create_router, AppState};

const WEBHOOK_SECRET: &str = "whsec_test";
const INDIVIDUAL_MONTHLY: &str = "price_1Rwq6nFFPAbZxH9HkmDxBJ73";

/// In-memory payment gateway that records every checkout it is asked for.
#[derive(Default)]
struct FakeGateway {
    counter: AtomicUsize,
    fail_checkout: AtomicBool,
    sessions: Mutex<Vec<CheckoutSessionParams>>,
    subscriptions: Mutex<HashMap<String, StripeSubscription>>,
    customers: Mutex<HashMap<String, StripeCustomer>>,
}

impl FakeGateway {
    fn last_session(&self) -> CheckoutSessionParams {
        self.sessions.lock().unwrap().last().cloned().expect("no checkout created")
    }

    fn add_subscription(&self, id: &str, status: &str, customer: &str, price_id: &str) {
        let sub: StripeSubscription = serde_json::from_value(json!({
            "id": id,
            "status": status,
            "customer": customer,
            "current_period_end": 1_900_000_000,
            "items": { "data": [{ "price": {
                "id": price_id,
                "unit_amount": 999,
                "currency": "usd",
                "recurring": { "interval": "month" }
            }}]}
        }))
        .unwrap();
        self.subscriptions.lock().unwrap().insert(id.to_string(), sub);
    }

    fn add_customer(&self, id: &str, email: &str) {
        self.customers.lock().unwrap().insert(
            id.to_string(),
            StripeCustomer {
                id: id.to_string(),
                email: Some(email.to_string()),
            },
        );
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams,
    ) -> Result<CheckoutSession, AppError> {
        if self.fail_checkout.load(Ordering::SeqCst) {
            return Err(AppError::Payment("Stripe API error: card declined".to_string()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("cs_test_{}", n);
        self.sessions.lock().unwrap().push(params.clone());
        Ok(CheckoutSession {
            url: format!("https://checkout.stripe.test/{}", id),
            id,
        })
    }

    async fn retrieve_subscription(&self, id: &str) -> Result<StripeSubscription, AppError> {
        self.subscriptions
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::Payment(format!("No such subscription: {}", id)))
    }

    async fn retrieve_customer(&self, id: &str) -> Result<StripeCustomer, AppError> {
        self.customers
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::Payment(format!("No such customer: {}", id)))
    }
}

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    repo: Arc<Repository>,
    gateway: Arc<FakeGateway>,
    _temp_dir: TempDir,
}

/// A pot created through the paid checkout flow.
struct CreatedPot {
    id: String,
    owner_code: String,
    owner_token: String,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    async fn with_config(customize: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        // Create config
        let mut config = Config::for_tests();
        config.db_path = db_path;
        config.stripe_webhook_secret = WEBHOOK_SECRET.to_string();
        customize(&mut config);

        let gateway = Arc::new(FakeGateway::default());
        let owner = OwnerCredentials::new(
            config.owner_token_secret.clone().unwrap_or_default(),
            config.owner_token_ttl_secs,
        );

        let state = AppState {
            repo: repo.clone(),
            payments: gateway.clone(),
            owner: Arc::new(owner),
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        TestFixture {
            client,
            base_url,
            repo,
            gateway,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn deliver(&self, event: &Value) -> reqwest::Response {
        let body = serde_json::to_vec(event).unwrap();
        let header = signature_header(&body, WEBHOOK_SECRET, Utc::now().timestamp());
        self.client
            .post(self.url("/webhook"))
            .header("stripe-signature", header)
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap()
    }

    /// Start a creation checkout and return `(draft_id, session_id)`.
    async fn start_pot_checkout(&self, name: &str) -> (String, String) {
        let resp = self
            .post_json(
                "/create-pot-session",
                json!({
                    "draft": { "name": name, "buy_in_cents": 2000, "payment_methods": { "stripe": true } },
                    "success_url": "https://app.example/created",
                    "cancel_url": "https://app.example/cancelled",
                }),
            )
            .await;
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        (
            body["draft_id"].as_str().unwrap().to_string(),
            body["session_id"].as_str().unwrap().to_string(),
        )
    }

    /// Run the full paid-creation flow and claim the owner credentials.
    async fn create_pot(&self, name: &str) -> CreatedPot {
        let (draft_id, session_id) = self.start_pot_checkout(name).await;
        let resp = self.deliver(&create_completed(&session_id, &draft_id)).await;
        assert_eq!(resp.status(), 200);

        let status: Value = self
            .client
            .get(self.url(&format!("/create-status?session_id={}", session_id)))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["status"], "active");

        CreatedPot {
            id: status["pot_id"].as_str().unwrap().to_string(),
            owner_code: status["owner_code"].as_str().unwrap().to_string(),
            owner_token: status["owner_token"].as_str().unwrap().to_string(),
        }
    }
}

fn create_completed(session_id: &str, draft_id: &str) -> Value {
    json!({
        "id": format!("evt_{}", session_id),
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": session_id,
            "object": "checkout.session",
            "mode": "payment",
            "amount_total": 1000,
            "currency": "usd",
            "metadata": { "flow": "create", "draft_id": draft_id }
        }}
    })
}

fn join_completed(session_id: &str, pot_id: &str, entry_id: &str, amount: i64) -> Value {
    json!({
        "id": format!("evt_{}", session_id),
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": session_id,
            "object": "checkout.session",
            "mode": "payment",
            "amount_total": amount,
            "currency": "usd",
            "payment_intent": "pi_123",
            "metadata": { "flow": "join", "pot_id": pot_id, "entry_id": entry_id }
        }}
    })
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    for path in ["/health", "/healthz"] {
        let resp = fixture.client.get(fixture.url(path)).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(body["price_cents"], 1000);
    }

    let body: Value = fixture
        .client
        .get(fixture.url("/"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["service"], "picklepot-backend");

    let resp = fixture.client.head(fixture.url("/")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_cors_layer() {
    let fixture = TestFixture::new().await;
    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .header("origin", "https://anywhere.example")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");

    let fixture = TestFixture::with_config(|c| {
        c.cors_origins = vec!["https://app.example".to_string()];
    })
    .await;
    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .header("origin", "https://app.example")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["access-control-allow-origin"], "https://app.example");

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .header("origin", "https://evil.example")
        .send()
        .await
        .unwrap();
    assert!(resp.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_join_rejects_amount_below_minimum() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .post_json(
            "/create-checkout-session",
            json!({
                "pot_id": "pot_1",
                "entry_id": "entry_1",
                "amount_cents": 49,
                "success_url": "https://app.example/ok",
                "cancel_url": "https://app.example/cancel",
            }),
        )
        .await;

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["message"], "Minimum amount is 50 cents");
    assert!(fixture.gateway.sessions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_pot_validation() {
    let fixture = TestFixture::new().await;

    let cases = [
        json!({ "success_url": "https://a/ok", "cancel_url": "https://a/c" }),
        json!({ "draft": { "name": "" }, "success_url": "https://a/ok", "cancel_url": "https://a/c" }),
        json!({ "draft": { "name": "Ladder" }, "cancel_url": "https://a/c" }),
        json!({ "draft": { "name": "Ladder" }, "success_url": "https://a/ok", "cancel_url": "https://a/c", "amount_cents": 10 }),
    ];

    for case in cases {
        let resp = fixture.post_json("/create-pot-session", case).await;
        assert_eq!(resp.status(), 400);
    }
    assert!(fixture.gateway.sessions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_bodies_use_error_envelope() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .post_json(
            "/create-pot-session",
            json!({ "draft": { "organizer": "Kim" }, "success_url": "https://a/ok", "cancel_url": "https://a/c" }),
        )
        .await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["message"], "Draft name is required");

    let resp = fixture
        .post_json(
            "/create-checkout-session",
            json!({
                "pot_id": "cs_test_1",
                "amount_cents": "abc",
                "success_url": "https://a/ok",
                "cancel_url": "https://a/c",
            }),
        )
        .await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let resp = fixture
        .client
        .post(fixture.url("/create-pot-session"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let resp = fixture
        .client
        .get(fixture.url("/create-status"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);

    assert!(fixture.gateway.sessions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_draft_keeps_every_payment_method() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .post_json(
            "/create-pot-session",
            json!({
                "draft": {
                    "name": "Mixed Payments",
                    "payment_methods": { "stripe": true, "paypal": true, "cashapp": true, "venmo": false },
                },
                "success_url": "https://app.example/created",
                "cancel_url": "https://app.example/cancelled",
            }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let draft_id = body["draft_id"].as_str().unwrap().to_string();
    let session_id = body["session_id"].as_str().unwrap().to_string();

    let resp = fixture.deliver(&create_completed(&session_id, &draft_id)).await;
    assert_eq!(resp.status(), 200);

    let pot: Value = fixture
        .client
        .get(fixture.url(&format!("/pots/{}", session_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        pot["payment_methods"],
        json!({ "stripe": true, "paypal": true, "cashapp": true, "venmo": false })
    );
}

#[tokio::test]
async fn test_create_pot_checkout_parameters() {
    let fixture = TestFixture::new().await;
    let (draft_id, session_id) = fixture.start_pot_checkout("Saturday Ladder").await;

    let params = fixture.gateway.last_session();
    assert_eq!(params.mode, CheckoutMode::Payment);
    assert_eq!(params.metadata_value("flow"), Some("create"));
    assert_eq!(params.metadata_value("draft_id"), Some(draft_id.as_str()));
    assert_eq!(
        params.success_url,
        "https://app.example/created?flow=create&session_id={CHECKOUT_SESSION_ID}"
    );
    assert_eq!(
        params.cancel_url,
        format!(
            "{}/cancel-create?session_id={{CHECKOUT_SESSION_ID}}&next=https%3A%2F%2Fapp.example%2Fcancelled",
            fixture.base_url
        )
    );
    assert!(session_id.starts_with("cs_test_"));

    let draft = fixture.repo.get_draft(&draft_id).await.unwrap().unwrap();
    assert_eq!(draft.details.name, "Saturday Ladder");
    assert!(draft.details.payment_methods.stripe);
}

#[tokio::test]
async fn test_create_pot_gateway_failure() {
    let fixture = TestFixture::new().await;
    fixture.gateway.fail_checkout.store(true, Ordering::SeqCst);

    let resp = fixture
        .post_json(
            "/create-pot-session",
            json!({
                "draft": { "name": "Ladder" },
                "success_url": "https://a/ok",
                "cancel_url": "https://a/c",
            }),
        )
        .await;
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "PAYMENT_ERROR");
}

#[tokio::test]
async fn test_create_status_hands_out_credentials_once() {
    let fixture = TestFixture::new().await;
    let (draft_id, session_id) = fixture.start_pot_checkout("Doubles Night").await;
    let status_url = fixture.url(&format!("/create-status?session_id={}", session_id));

    let pending: Value = fixture.client.get(&status_url).send().await.unwrap().json().await.unwrap();
    assert_eq!(pending["status"], "pending");

    let resp = fixture.deliver(&create_completed(&session_id, &draft_id)).await;
    assert_eq!(resp.status(), 200);
    let ack: Value = resp.json().await.unwrap();
    assert_eq!(ack["received"], true);

    let first: Value = fixture.client.get(&status_url).send().await.unwrap().json().await.unwrap();
    assert_eq!(first["status"], "active");
    assert_eq!(first["pot_id"], session_id.as_str());
    assert_eq!(first["owner_code"].as_str().unwrap().len(), 10);
    assert!(first["owner_token"].as_str().unwrap().contains('.'));
    assert!(first["manage_url"]
        .as_str()
        .unwrap()
        .contains(&format!("/manage/{}?token=", session_id)));

    let second: Value = fixture.client.get(&status_url).send().await.unwrap().json().await.unwrap();
    assert_eq!(second["status"], "active");
    assert!(second.get("owner_code").is_none());
    assert!(second.get("owner_token").is_none());

    // Draft is consumed; pot is public without credential fields
    assert!(fixture.repo.get_draft(&draft_id).await.unwrap().is_none());
    let pot: Value = fixture
        .client
        .get(fixture.url(&format!("/pots/{}", session_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(pot["name"], "Doubles Night");
    assert_eq!(pot["status"], "active");
    assert!(pot.get("owner_code_hash").is_none());
    assert!(pot.get("owner_token_salt").is_none());
}

#[tokio::test]
async fn test_create_status_unknown_session() {
    let fixture = TestFixture::new().await;
    let resp = fixture
        .client
        .get(fixture.url("/create-status?session_id=cs_missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_webhook_replay_does_not_recreate_pot() {
    let fixture = TestFixture::new().await;
    let (draft_id, session_id) = fixture.start_pot_checkout("Replay Cup").await;
    let event = create_completed(&session_id, &draft_id);

    assert_eq!(fixture.deliver(&event).await.status(), 200);
    let original = fixture.repo.get_pot(&session_id).await.unwrap().unwrap();

    assert_eq!(fixture.deliver(&event).await.status(), 200);
    let replayed = fixture.repo.get_pot(&session_id).await.unwrap().unwrap();

    assert_eq!(original.owner_code_hash, replayed.owner_code_hash);
    assert_eq!(original.owner_token_salt, replayed.owner_token_salt);
    assert_eq!(original.created_at, replayed.created_at);
    assert_eq!(replayed.source, "checkout");
    assert_eq!(replayed.draft_id.as_deref(), Some(draft_id.as_str()));
    assert_eq!(replayed.amount_total, Some(1000));
}

#[tokio::test]
async fn test_legacy_create_pot_metadata() {
    let fixture = TestFixture::new().await;
    let (draft_id, session_id) = fixture.start_pot_checkout("Legacy Open").await;

    let event = json!({
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": session_id,
            "mode": "payment",
            "amount_total": 1000,
            "metadata": { "type": "create_pot", "draft_id": draft_id }
        }}
    });
    assert_eq!(fixture.deliver(&event).await.status(), 200);

    let pot = fixture.repo.get_pot(&session_id).await.unwrap().unwrap();
    assert_eq!(pot.details.name, "Legacy Open");
    assert_eq!(pot.currency.as_deref(), Some("usd"));
}

#[tokio::test]
async fn test_webhook_rejects_bad_signature_and_payload() {
    let fixture = TestFixture::new().await;
    let body = br#"{"type":"checkout.session.completed","data":{"object":{}}}"#.to_vec();

    // Missing header
    let resp = fixture
        .client
        .post(fixture.url("/webhook"))
        .body(body.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(resp.text().await.unwrap(), "Invalid signature");

    // Signed with another secret
    let header = signature_header(&body, "whsec_other", Utc::now().timestamp());
    let resp = fixture
        .client
        .post(fixture.url("/stripe-webhook"))
        .header("stripe-signature", header)
        .body(body.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Correctly signed garbage
    let garbage = b"not json".to_vec();
    let header = signature_header(&garbage, WEBHOOK_SECRET, Utc::now().timestamp());
    let resp = fixture
        .client
        .post(fixture.url("/webhook"))
        .header("stripe-signature", header)
        .body(garbage)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(resp.text().await.unwrap(), "Invalid payload");
}

#[tokio::test]
async fn test_webhook_acknowledges_ignored_and_failing_events() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .deliver(&json!({ "type": "charge.refunded", "data": { "object": {} } }))
        .await;
    assert_eq!(resp.status(), 200);

    // Subscription lookup fails inside the handler; still acknowledged
    let resp = fixture
        .deliver(&json!({
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_sub_missing",
                "mode": "subscription",
                "customer_email": "a@example.com",
                "subscription": "sub_unknown"
            }}
        }))
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["received"], true);
}

#[tokio::test]
async fn test_join_checkout_and_payment() {
    let fixture = TestFixture::new().await;
    let pot = fixture.create_pot("Join Night").await;

    let resp = fixture
        .post_json(
            "/create-checkout-session",
            json!({
                "pot_id": pot.id,
                "entry_id": "entry_1",
                "amount_cents": 2500,
                "player_name": "Sam",
                "player_email": "Sam@Example.com",
                "success_url": "https://app.example/joined",
                "cancel_url": "https://app.example/cancelled",
            }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["entry_id"], "entry_1");
    let session_id = body["session_id"].as_str().unwrap().to_string();

    let params = fixture.gateway.last_session();
    assert_eq!(params.metadata_value("flow"), Some("join"));
    assert_eq!(params.metadata_value("pot_id"), Some(pot.id.as_str()));
    assert_eq!(params.metadata_value("player_email"), Some("sam@example.com"));
    assert_eq!(params.customer_email.as_deref(), Some("sam@example.com"));
    assert!(params
        .success_url
        .starts_with("https://app.example/joined?flow=join&session_id={CHECKOUT_SESSION_ID}&pot_id="));

    let pending = fixture.repo.get_entry(&pot.id, "entry_1").await.unwrap().unwrap();
    assert!(!pending.paid);
    assert_eq!(pending.name, "Sam");

    let event = join_completed(&session_id, &pot.id, "entry_1", 2500);
    assert_eq!(fixture.deliver(&event).await.status(), 200);

    let paid = fixture.repo.get_entry(&pot.id, "entry_1").await.unwrap().unwrap();
    assert!(paid.paid);
    assert_eq!(paid.paid_amount, Some(2500));
    assert_eq!(paid.payment_method.as_deref(), Some("stripe"));
    assert_eq!(paid.stripe_payment_intent_id.as_deref(), Some("pi_123"));
    assert!(fixture.repo.get_join_session(&session_id).await.unwrap().is_none());

    // Replay leaves the recorded payment untouched
    assert_eq!(fixture.deliver(&event).await.status(), 200);
    let replayed = fixture.repo.get_entry(&pot.id, "entry_1").await.unwrap().unwrap();
    assert_eq!(replayed.paid_at, paid.paid_at);

    // A paid entry cannot be checked out again
    let resp = fixture
        .post_json(
            "/create-checkout-session",
            json!({
                "pot_id": pot.id,
                "entry_id": "entry_1",
                "amount_cents": 2500,
                "success_url": "https://app.example/joined",
                "cancel_url": "https://app.example/cancelled",
            }),
        )
        .await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_join_unknown_pot() {
    let fixture = TestFixture::new().await;
    let resp = fixture
        .post_json(
            "/create-checkout-session",
            json!({
                "pot_id": "cs_nope",
                "amount_cents": 500,
                "success_url": "https://a/ok",
                "cancel_url": "https://a/c",
            }),
        )
        .await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_join_defaults_to_buy_in() {
    let fixture = TestFixture::new().await;
    let pot = fixture.create_pot("Buy-in Default").await;

    let resp = fixture
        .post_json(
            "/create-checkout-session",
            json!({
                "pot_id": pot.id,
                "success_url": "https://a/ok",
                "cancel_url": "https://a/c",
            }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(!body["entry_id"].as_str().unwrap().is_empty());

    match fixture.gateway.last_session().line_item {
        crate::stripe::LineItem::Adhoc { unit_amount, product_name, .. } => {
            assert_eq!(unit_amount, 2000);
            assert_eq!(product_name, "Pot Join — Player");
        }
        other => panic!("unexpected line item {:?}", other),
    }
}

#[tokio::test]
async fn test_cancel_join_removes_unpaid_entry() {
    let fixture = TestFixture::new().await;
    let pot = fixture.create_pot("Cancel Cup").await;

    let body: Value = fixture
        .post_json(
            "/create-checkout-session",
            json!({
                "pot_id": pot.id,
                "entry_id": "entry_x",
                "amount_cents": 500,
                "success_url": "https://a/ok",
                "cancel_url": "https://a/c",
            }),
        )
        .await
        .json()
        .await
        .unwrap();
    let session_id = body["session_id"].as_str().unwrap();

    let resp = fixture
        .client
        .get(fixture.url(&format!(
            "/cancel-join?session_id={}&next=https%3A%2F%2Fapp.example%2Fback",
            session_id
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 302);
    assert_eq!(resp.headers()["location"], "https://app.example/back");

    assert!(fixture.repo.get_entry(&pot.id, "entry_x").await.unwrap().is_none());
    assert!(fixture.repo.get_join_session(session_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_cancel_create_deletes_draft() {
    let fixture = TestFixture::new().await;
    let (draft_id, session_id) = fixture.start_pot_checkout("Abandoned").await;

    let resp = fixture
        .client
        .get(fixture.url(&format!("/cancel-create?session_id={}", session_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 302);
    assert_eq!(resp.headers()["location"], "/");

    assert!(fixture.repo.get_draft(&draft_id).await.unwrap().is_none());
    let resp = fixture
        .client
        .get(fixture.url(&format!("/create-status?session_id={}", session_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_cancel_pot_session() {
    let fixture = TestFixture::new().await;
    let (draft_id, _) = fixture.start_pot_checkout("Legacy Cancel").await;

    let resp = fixture.post_json("/cancel-pot-session", json!({})).await;
    assert_eq!(resp.status(), 400);

    let resp = fixture
        .post_json("/cancel-pot-session", json!({ "draft_id": draft_id }))
        .await;
    assert_eq!(resp.status(), 200);
    assert!(fixture.repo.get_draft(&draft_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_owner_login_and_verify() {
    let fixture = TestFixture::new().await;
    let pot = fixture.create_pot("Owner Cup").await;
    let other = fixture.create_pot("Other Cup").await;

    let resp = fixture
        .post_json(
            &format!("/pots/{}/owner/login", pot.id),
            json!({ "owner_code": "AAAAAAAAAA" }),
        )
        .await;
    assert_eq!(resp.status(), 401);

    // Codes are case-insensitive on input
    let resp = fixture
        .post_json(
            &format!("/pots/{}/owner/login", pot.id),
            json!({ "owner_code": pot.owner_code.to_lowercase() }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let login: Value = resp.json().await.unwrap();
    let token = login["owner_token"].as_str().unwrap();

    let verify_url = fixture.url(&format!("/pots/{}/owner/verify", pot.id));
    let resp = fixture
        .client
        .get(&verify_url)
        .header("x-owner-token", token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .client
        .get(format!("{}?token={}", verify_url, pot.owner_token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Another pot's token is rejected
    let resp = fixture
        .client
        .get(&verify_url)
        .header("x-owner-token", &other.owner_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = fixture.client.get(&verify_url).send().await.unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_owner_rotation_revokes_credentials() {
    let fixture = TestFixture::new().await;
    let pot = fixture.create_pot("Rotation Cup").await;
    let verify_url = fixture.url(&format!("/pots/{}/owner/verify", pot.id));

    let rotated: Value = fixture
        .client
        .post(fixture.url(&format!("/pots/{}/owner/rotate-token", pot.id)))
        .header("x-owner-token", &pot.owner_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let new_token = rotated["owner_token"].as_str().unwrap().to_string();

    let old = fixture
        .client
        .get(&verify_url)
        .header("x-owner-token", &pot.owner_token)
        .send()
        .await
        .unwrap();
    assert_eq!(old.status(), 401);
    let new = fixture
        .client
        .get(&verify_url)
        .header("x-owner-token", &new_token)
        .send()
        .await
        .unwrap();
    assert_eq!(new.status(), 200);

    let resp = fixture
        .client
        .post(fixture.url(&format!("/pots/{}/owner/rotate-code", pot.id)))
        .header("x-owner-token", &new_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let recoded: Value = resp.json().await.unwrap();
    let new_code = recoded["owner_code"].as_str().unwrap().to_string();
    assert_ne!(new_code, pot.owner_code);

    let stale = fixture
        .client
        .get(&verify_url)
        .header("x-owner-token", &new_token)
        .send()
        .await
        .unwrap();
    assert_eq!(stale.status(), 401);

    let login_url = format!("/pots/{}/owner/login", pot.id);
    let resp = fixture
        .post_json(&login_url, json!({ "owner_code": pot.owner_code }))
        .await;
    assert_eq!(resp.status(), 401);
    let resp = fixture
        .post_json(&login_url, json!({ "owner_code": new_code }))
        .await;
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_owner_entries_and_mark_paid() {
    let fixture = TestFixture::new().await;
    let pot = fixture.create_pot("Cash Game").await;

    fixture
        .post_json(
            "/create-checkout-session",
            json!({
                "pot_id": pot.id,
                "entry_id": "cash_1",
                "amount_cents": 2000,
                "player_name": "Alex",
                "success_url": "https://a/ok",
                "cancel_url": "https://a/c",
            }),
        )
        .await;

    let entries_url = fixture.url(&format!("/pots/{}/entries", pot.id));
    let resp = fixture.client.get(&entries_url).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    let list: Value = fixture
        .client
        .get(&entries_url)
        .header("x-owner-token", &pot.owner_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["entries"].as_array().unwrap().len(), 1);
    assert_eq!(list["entries"][0]["paid"], false);

    let mark_url = fixture.url(&format!("/pots/{}/entries/cash_1/mark-paid", pot.id));
    let resp = fixture
        .client
        .post(&mark_url)
        .header("x-owner-token", &pot.owner_token)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let entry: Value = resp.json().await.unwrap();
    assert_eq!(entry["paid"], true);
    assert_eq!(entry["payment_method"], "manual");
    assert_eq!(entry["paid_amount"], 2000);

    let resp = fixture
        .client
        .post(fixture.url(&format!("/pots/{}/entries/missing/mark-paid", pot.id)))
        .header("x-owner-token", &pot.owner_token)
        .json(&json!({ "payment_method": "cash" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_mark_paid_without_body() {
    let fixture = TestFixture::new().await;
    let pot = fixture.create_pot("Bare Post").await;

    fixture
        .post_json(
            "/create-checkout-session",
            json!({
                "pot_id": pot.id,
                "entry_id": "walkup_1",
                "player_name": "Sam",
                "success_url": "https://a/ok",
                "cancel_url": "https://a/c",
            }),
        )
        .await;

    let mark_url = fixture.url(&format!("/pots/{}/entries/walkup_1/mark-paid", pot.id));
    let resp = fixture
        .client
        .post(&mark_url)
        .header("x-owner-token", &pot.owner_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let entry: Value = resp.json().await.unwrap();
    assert_eq!(entry["paid"], true);
    assert_eq!(entry["payment_method"], "manual");
    assert_eq!(entry["paid_amount"], 2000);

    let resp = fixture
        .client
        .post(&mark_url)
        .header("x-owner-token", &pot.owner_token)
        .header("content-type", "application/json")
        .body("{\"paid_amount\":")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_subscription_checkout() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .post_json(
            "/create-organizer-subscription",
            json!({ "price_id": "price_fake", "success_url": "https://a/ok", "cancel_url": "https://a/c" }),
        )
        .await;
    assert_eq!(resp.status(), 400);

    let resp = fixture
        .post_json(
            "/create-organizer-subscription",
            json!({ "price_id": INDIVIDUAL_MONTHLY, "success_url": "https://a/ok" }),
        )
        .await;
    assert_eq!(resp.status(), 400);

    let resp = fixture
        .post_json(
            "/create-organizer-subscription",
            json!({
                "price_id": INDIVIDUAL_MONTHLY,
                "success_url": "https://a/ok",
                "cancel_url": "https://a/c",
                "email": "org@example.com",
            }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["url"].as_str().unwrap().starts_with("https://checkout.stripe.test/"));

    let params = fixture.gateway.last_session();
    assert_eq!(params.mode, CheckoutMode::Subscription);
    assert!(params.allow_promotion_codes);
    assert_eq!(params.customer_email.as_deref(), Some("org@example.com"));
}

#[tokio::test]
async fn test_subscription_webhook_then_activate() {
    let fixture = TestFixture::new().await;
    fixture
        .gateway
        .add_subscription("sub_1", "active", "cus_1", INDIVIDUAL_MONTHLY);

    let event = json!({
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_sub_1",
            "mode": "subscription",
            "customer": "cus_1",
            "customer_details": { "email": "Org@Example.com" },
            "subscription": "sub_1"
        }}
    });
    assert_eq!(fixture.deliver(&event).await.status(), 200);

    let record = fixture
        .repo
        .get_subscription_by_email("org@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.plan.as_deref(), Some("individual"));
    assert_eq!(record.pots_per_month, Some(2));
    assert_eq!(record.max_users_per_event, Some(12));
    assert_eq!(record.interval.as_deref(), Some("month"));

    let resp = fixture
        .post_json("/activate-subscription-for-uid", json!({ "uid": "user_1" }))
        .await;
    assert_eq!(resp.status(), 400);

    let resp = fixture
        .post_json(
            "/activate-subscription-for-uid",
            json!({ "uid": "user_1", "email": "nobody@example.com" }),
        )
        .await;
    assert_eq!(resp.status(), 404);

    let resp = fixture
        .post_json(
            "/activate-subscription-for-uid",
            json!({ "uid": "user_1", "email": "ORG@example.com" }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["attached_to_uid"], "user_1");

    let attached = fixture
        .repo
        .get_subscription_by_uid("user_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(attached.email, "org@example.com");
    assert_eq!(attached.stripe_subscription_id.as_deref(), Some("sub_1"));
}

#[tokio::test]
async fn test_subscription_updates_and_inactive_status() {
    let fixture = TestFixture::new().await;
    fixture.gateway.add_customer("cus_2", "Club@Example.com");

    let event = json!({
        "type": "customer.subscription.deleted",
        "data": { "object": {
            "id": "sub_2",
            "status": "canceled",
            "customer": "cus_2",
            "items": { "data": [{ "price": { "id": "price_1Rwq1JFFPAbZxH9HmpYCSJYv" } }] }
        }}
    });
    assert_eq!(fixture.deliver(&event).await.status(), 200);

    let record = fixture
        .repo
        .get_subscription_by_email("club@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status.as_deref(), Some("canceled"));
    assert_eq!(record.plan.as_deref(), Some("club"));

    let resp = fixture
        .post_json(
            "/activate-subscription-for-uid",
            json!({ "uid": "user_2", "email": "club@example.com" }),
        )
        .await;
    assert_eq!(resp.status(), 400);

    // Invoice payment re-fetches the subscription and reactivates
    fixture
        .gateway
        .add_subscription("sub_2", "active", "cus_2", "price_1Rwq1JFFPAbZxH9HmpYCSJYv");
    let invoice = json!({
        "type": "invoice.payment_succeeded",
        "data": { "object": { "subscription": "sub_2", "customer": "cus_2" } }
    });
    assert_eq!(fixture.deliver(&invoice).await.status(), 200);

    let resp = fixture
        .post_json(
            "/activate-subscription-for-uid",
            json!({ "uid": "user_2", "email": "club@example.com" }),
        )
        .await;
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_rosters_require_admin_token() {
    let fixture = TestFixture::with_config(|c| c.admin_token = Some("roster-admin".to_string())).await;

    let resp = fixture
        .client
        .put(fixture.url("/rosters/org_1"))
        .json(&json!({ "emails": ["a@example.com"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let resp = fixture
        .client
        .put(fixture.url("/rosters/org_1"))
        .header("x-organizer-token", "wrong")
        .json(&json!({ "emails": ["a@example.com"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = fixture
        .client
        .put(fixture.url("/rosters/org_1"))
        .header("x-organizer-token", "roster-admin")
        .json(&json!({ "emails": [" B@example.com", "a@example.com", "b@example.com", ""] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["count"], 2);

    let body: Value = fixture
        .client
        .get(fixture.url("/rosters/org_1?token=roster-admin"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["emails"], json!(["a@example.com", "b@example.com"]));
}

#[tokio::test]
async fn test_roster_resolution_order() {
    let fixture = TestFixture::new().await;
    let resolved_url = fixture.url("/pots/pot_r/roster-resolved");

    let body: Value = fixture.client.get(&resolved_url).send().await.unwrap().json().await.unwrap();
    assert_eq!(body["source"], "none");
    assert_eq!(body["emails"], json!([]));

    fixture
        .client
        .put(fixture.url("/rosters/org_9"))
        .json(&json!({ "emails": ["z@example.com"] }))
        .send()
        .await
        .unwrap();
    let resp = fixture
        .client
        .put(fixture.url("/pots/pot_r/roster-binding"))
        .json(&json!({ "org_id": "org_9" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = fixture.client.get(&resolved_url).send().await.unwrap().json().await.unwrap();
    assert_eq!(body["source"], "org");
    assert_eq!(body["org_id"], "org_9");
    assert_eq!(body["emails"], json!(["z@example.com"]));

    fixture
        .client
        .put(fixture.url("/pots/pot_r/roster-inline"))
        .json(&json!({ "emails": ["Inline@Example.com"] }))
        .send()
        .await
        .unwrap();
    let body: Value = fixture.client.get(&resolved_url).send().await.unwrap().json().await.unwrap();
    assert_eq!(body["source"], "inline");
    assert_eq!(body["emails"], json!(["inline@example.com"]));

    // Empty inline roster clears it, falling back to the binding
    fixture
        .client
        .put(fixture.url("/pots/pot_r/roster-inline"))
        .json(&json!({ "emails": [] }))
        .send()
        .await
        .unwrap();
    let body: Value = fixture.client.get(&resolved_url).send().await.unwrap().json().await.unwrap();
    assert_eq!(body["source"], "org");

    fixture
        .client
        .put(fixture.url("/pots/pot_r/roster-binding"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    let body: Value = fixture.client.get(&resolved_url).send().await.unwrap().json().await.unwrap();
    assert_eq!(body["source"], "none");
}

#[tokio::test]
async fn test_admin_toggle_forces_stripe_off() {
    let fixture = TestFixture::with_config(|c| {
        c.require_admin_toggle = true;
        c.admin_toggle_key = "toggle-key".to_string();
    })
    .await;

    let draft = json!({
        "draft": { "name": "Admin Only", "payment_methods": { "stripe": true, "cash": true } },
        "success_url": "https://a/ok",
        "cancel_url": "https://a/c",
    });

    let body: Value = fixture
        .post_json("/create-pot-session", draft.clone())
        .await
        .json()
        .await
        .unwrap();
    let stored = fixture
        .repo
        .get_draft(body["draft_id"].as_str().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.details.payment_methods.stripe);
    assert!(stored.details.payment_methods.enabled("cash"));

    let body: Value = fixture
        .client
        .post(fixture.url("/create-pot-session"))
        .header("x-admin-key", "toggle-key")
        .json(&draft)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let stored = fixture
        .repo
        .get_draft(body["draft_id"].as_str().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert!(stored.details.payment_methods.stripe);
}
