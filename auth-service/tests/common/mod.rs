//! Shared setup for the reset-flow integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use healthdir_auth::{
    build_router,
    config::ResetConfig,
    models::{Role, User},
    services::{
        CredentialStore, DeliveryReport, ManualClock, MemoryStore, RecordingSender,
        ResetRequestOutcome, ResetService,
    },
    utils::Argon2Settings,
    AppState,
};
use std::sync::Arc;

pub const OLD_HASH: &str = "$argon2id$v=19$m=8,t=1,p=1$c2FsdHNhbHQ$b2xkaGFzaA";
pub const STRONG_PASSWORD: &str = "Nouveau-Passe42";

pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub sender: Arc<RecordingSender>,
    pub clock: Arc<ManualClock>,
    pub service: ResetService,
    pub user: User,
    pub start: DateTime<Utc>,
}

impl TestContext {
    pub fn router(&self) -> axum::Router {
        build_router(AppState::new(self.service.clone()))
    }

    /// Request a reset for `email` and wait for its background half.
    /// Returns `None` for an unregistered email.
    pub async fn request_and_wait(&self, email: &str) -> Option<DeliveryReport> {
        match self.service.request_reset(email).await.expect("lookup failed") {
            ResetRequestOutcome::UnknownEmail => None,
            ResetRequestOutcome::Accepted { delivery, .. } => Some(delivery.wait().await),
        }
    }

    /// Reset request for the test user, asserting the link went out.
    pub async fn request_delivered(&self) {
        let report = self.request_and_wait(&self.user.email).await;
        assert!(
            matches!(report, Some(DeliveryReport::Delivered)),
            "unexpected delivery report: {report:?}"
        );
    }

    /// Wait until `count` links have been recorded by the sender.
    pub async fn wait_for_sent(&self, count: usize) {
        for _ in 0..200 {
            if self.sender.sent().len() >= count {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("expected {count} sent links, got {}", self.sender.sent().len());
    }

    /// Current stored record for the test user.
    pub async fn store_user(&self) -> User {
        self.store
            .find_user_by_id(self.user.user_id)
            .await
            .expect("store lookup failed")
            .expect("test user missing")
    }

    /// Token value carried by the most recent delivered link.
    pub fn last_token(&self) -> String {
        self.sender
            .last_sent()
            .expect("no reset link was sent")
            .link
            .token()
            .expose()
            .to_string()
    }
}

pub fn test_reset_config() -> ResetConfig {
    ResetConfig {
        link_base_url: "https://annuaire.example".to_string(),
        argon2: Argon2Settings {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        },
        ..ResetConfig::default()
    }
}

pub fn setup() -> TestContext {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();

    let user = User::new("structure@clinique.example", Role::HealthStructure, OLD_HASH);
    let store = Arc::new(MemoryStore::with_users([user.clone()]));
    let sender = Arc::new(RecordingSender::new());
    let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_else(Utc::now);
    let clock = Arc::new(ManualClock::new(start));

    let service = ResetService::new(
        store.clone(),
        sender.clone(),
        clock.clone(),
        test_reset_config(),
    );

    TestContext {
        store,
        sender,
        clock,
        service,
        user,
        start,
    }
}
