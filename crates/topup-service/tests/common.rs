//! Common test utilities for top-up service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::{TestResponse, TestServer};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use topup_core::{ChargeId, Currency, CurrencyCatalog, UserId};
use topup_service::audit::{AuditError, AuditLog, AuditPayload};
use topup_service::context::CallerContext;
use topup_service::ledger::MemoryLedger;
use topup_service::rates::ExchangeRateApi;
use topup_service::stripe::{signature, StripeClient};
use topup_service::{create_router, AppState, Dependencies, ServiceConfig};
use topup_store::MemoryStore;

/// Webhook signing secret used by the harness.
pub const WEBHOOK_SECRET: &str = "whsec_test";

/// Session id returned by the mocked Stripe API.
pub const SESSION_ID: &str = "cs_test_1";

/// Price configured for checkout.
pub const PRICE_ID: &str = "price_test";

/// Rates API key expected by the mocked rate provider.
pub const RATES_KEY: &str = "test-key";

/// One recorded audit entry.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: String,
    pub status: i8,
    pub uid: UserId,
    pub payload: AuditPayload,
}

/// Audit sink that keeps every entry in memory.
#[derive(Default)]
pub struct RecordingAudit {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingAudit {
    /// Entries recorded so far.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditLog for RecordingAudit {
    async fn log(
        &self,
        _ctx: &CallerContext,
        action: &str,
        status: i8,
        uid: UserId,
        payload: &AuditPayload,
    ) -> Result<(), AuditError> {
        self.entries.lock().unwrap().push(AuditEntry {
            action: action.to_string(),
            status,
            uid,
            payload: payload.clone(),
        });
        Ok(())
    }
}

/// Currencies known to the in-memory ledger.
pub fn currencies() -> Vec<Currency> {
    [
        ("Hong Kong Dollar", "HKD", 344),
        ("US Dollar", "USD", 840),
        ("Euro", "EUR", 978),
    ]
    .into_iter()
    .map(|(name, alpha, code)| Currency {
        name: name.into(),
        alpha: alpha.into(),
        decimals: 2,
        code,
        exchange_rate: 0.0,
    })
    .collect()
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The in-memory ledger behind the service.
    pub ledger: Arc<MemoryLedger>,
    /// The shared snapshot cache.
    pub store: Arc<MemoryStore>,
    /// Audit entries written by the service.
    pub audit: Arc<RecordingAudit>,
    /// Mock Stripe API.
    pub stripe: MockServer,
    /// Mock exchange-rate API.
    pub rates: MockServer,
    /// A test user ID for authenticated requests.
    pub user_id: UserId,
}

impl TestHarness {
    /// Create a harness with Stripe and the rate API answering successfully.
    pub async fn new() -> Self {
        let harness = Self::bare().await;
        harness.mount_stripe_defaults().await;
        harness.mount_rates(1_700_000_000).await;
        harness
    }

    /// Create a harness with no mocks mounted.
    pub async fn bare() -> Self {
        let stripe = MockServer::start().await;
        let rates = MockServer::start().await;

        let ledger = Arc::new(MemoryLedger::with_currencies(currencies()));
        let store = Arc::new(MemoryStore::new());
        let audit = Arc::new(RecordingAudit::default());

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            stripe_webhook_secret: Some(WEBHOOK_SECRET.into()),
            stripe_publishable_key: Some("pk_test".into()),
            stripe_price_id: PRICE_ID.into(),
            stripe_api_base: stripe.uri(),
            rates_api_url: rates.uri(),
            rates_api_key: Some(RATES_KEY.into()),
            ..ServiceConfig::default()
        };

        let timeout = Duration::from_secs(5);
        let provider = StripeClient::new("sk_test", &stripe.uri(), timeout)
            .expect("Failed to create Stripe client");
        let rate_source = ExchangeRateApi::new(&rates.uri(), RATES_KEY, "HKD", timeout)
            .expect("Failed to create rate source");

        let state = AppState::new(
            config,
            Dependencies {
                ledger: ledger.clone(),
                store: store.clone(),
                audit: audit.clone(),
                provider: Arc::new(provider),
                rate_source: Arc::new(rate_source),
                catalog: CurrencyCatalog::new(currencies()),
            },
        );
        let router: Router = create_router(state);
        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            ledger,
            store,
            audit,
            stripe,
            rates,
            user_id: UserId::generate(),
        }
    }

    /// Answer checkout session creation and price lookups.
    pub async fn mount_stripe_defaults(&self) {
        Mock::given(method("POST"))
            .and(path("/checkout/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": SESSION_ID,
                "object": "checkout.session",
                "url": "https://checkout.stripe.com/c/pay/cs_test_1",
                "currency": "hkd",
                "amount_total": 20_000,
                "status": "open",
                "payment_status": "unpaid",
                "metadata": {}
            })))
            .mount(&self.stripe)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("/prices/{PRICE_ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": PRICE_ID,
                "object": "price",
                "unit_amount": 100,
                "currency": "hkd"
            })))
            .mount(&self.stripe)
            .await;
    }

    /// Answer rate requests with a snapshot updated at `last_update`.
    pub async fn mount_rates(&self, last_update: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/v6/{RATES_KEY}/latest/HKD")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "success",
                "time_last_update_unix": last_update,
                "time_next_update_unix": last_update + 86_400,
                "base_code": "HKD",
                "conversion_rates": {"HKD": 1.0, "USD": 0.128, "JPY": 19.1}
            })))
            .mount(&self.rates)
            .await;
    }

    /// `x-auth-user` header for the harness user.
    pub fn user_header(&self) -> (HeaderName, HeaderValue) {
        user_header(self.user_id)
    }

    /// Start a checkout for the harness user and return the charge id.
    pub async fn checkout(&self, quantity: u32) -> ChargeId {
        let (name, value) = self.user_header();
        let response = self
            .server
            .post("/checkout")
            .add_header(name, value)
            .json(&json!({ "quantity": quantity, "currency": "hkd" }))
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        body["result"]["id"]
            .as_str()
            .expect("checkout id")
            .parse()
            .expect("valid charge id")
    }

    /// POST a webhook body with an optional `Stripe-Signature` header.
    pub async fn post_webhook(&self, body: &[u8], signature: Option<String>) -> TestResponse {
        let mut request = self
            .server
            .post("/webhook/stripe")
            .content_type("application/json")
            .bytes(body.to_vec().into());
        if let Some(signature) = signature {
            request = request.add_header(
                HeaderName::from_static("stripe-signature"),
                HeaderValue::from_str(&signature).unwrap(),
            );
        }
        request.await
    }

    /// POST a webhook body signed with the harness secret.
    pub async fn post_signed_webhook(&self, body: &[u8]) -> TestResponse {
        self.post_webhook(body, Some(sign(body))).await
    }
}

/// `x-auth-user` header for `user_id`.
pub fn user_header(user_id: UserId) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-auth-user"),
        HeaderValue::from_str(&user_id.to_string()).unwrap(),
    )
}

/// Sign `body` with the harness secret at the current time.
pub fn sign(body: &[u8]) -> String {
    signature::header_for(body, WEBHOOK_SECRET, chrono::Utc::now().timestamp())
}

/// A `checkout.session.completed` event for `charge_id`.
pub fn completed_event(user_id: UserId, charge_id: ChargeId, amount_total: u64) -> Vec<u8> {
    event_with_session(
        "checkout.session.completed",
        json!({
            "id": SESSION_ID,
            "object": "checkout.session",
            "currency": "hkd",
            "amount_total": amount_total,
            "payment_status": "paid",
            "status": "complete",
            "metadata": {
                "uid": user_id.to_string(),
                "cid": charge_id.to_string()
            }
        }),
    )
}

/// An event of `event_type` wrapping `object`.
pub fn event_with_session(event_type: &str, object: Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": "evt_test_1",
        "object": "event",
        "type": event_type,
        "created": 1_700_000_000,
        "data": { "object": object }
    }))
    .unwrap()
}
