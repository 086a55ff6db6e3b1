//! Shared test utilities for API handler tests.
//!
//! `TestStateBuilder` backs the engine with an in-memory store on a manual
//! clock pinned at [`TEST_NOW`], so handler tests exercise real capping
//! behavior. Swap in a `MockKeyedStore` to simulate store failures.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::test_utils::{TestStateBuilder, failing_store};
//!
//! let state = TestStateBuilder::new()
//!     .with_store(failing_store())
//!     .with_read_failure_policy(ReadFailurePolicy::Open)
//!     .build();
//! ```

use std::sync::Arc;

use anyhow::anyhow;
use axum::response::Response;
use capping::{CappingEngine, KeyedStore, ManualClock, MemoryKeyedStore, MockKeyedStore, Prefixes};
use http_body_util::BodyExt;

use crate::config::{Config, ReadFailurePolicy};
use crate::state::AppState;

/// Epoch seconds every test clock starts at.
pub const TEST_NOW: i64 = 1_700_000_000;

/// Creates a test configuration with dummy values.
pub fn test_config() -> Config {
    let prefixes = Prefixes::default();
    Config {
        host: "127.0.0.1".to_string(),
        port: 3000,
        redis_url: None,
        counters_prefix: prefixes.counters,
        exclude_lists_prefix: prefixes.exclude_lists,
        no_ads_prefix: prefixes.no_ads,
        read_failure_policy: ReadFailurePolicy::Closed,
        env: "test".to_string(),
        sentry_dsn: None,
    }
}

/// A store on which every call fails, as when Redis is unreachable.
pub fn failing_store() -> MockKeyedStore {
    let mut store = MockKeyedStore::new();
    store
        .expect_ping()
        .returning(|| Err(anyhow!("connection refused")));
    store
        .expect_get()
        .returning(|_| Err(anyhow!("connection refused")));
    store
        .expect_set()
        .returning(|_, _, _| Err(anyhow!("connection refused")));
    store
        .expect_increment()
        .returning(|_, _, _| Err(anyhow!("connection refused")));
    store
        .expect_ttl()
        .returning(|_| Err(anyhow!("connection refused")));
    store
        .expect_sorted_set_add()
        .returning(|_, _, _| Err(anyhow!("connection refused")));
    store
        .expect_sorted_set_range()
        .returning(|_, _, _, _| Err(anyhow!("connection refused")));
    store
}

pub async fn response_body(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn response_json(response: Response) -> serde_json::Value {
    serde_json::from_str(&response_body(response).await).unwrap()
}

/// Builder for constructing test `AppState`.
pub struct TestStateBuilder {
    store: Option<Arc<dyn KeyedStore>>,
    read_failure_policy: ReadFailurePolicy,
    clock: Arc<ManualClock>,
}

impl TestStateBuilder {
    /// Creates a builder over a fresh in-memory store.
    pub fn new() -> Self {
        Self {
            store: None,
            read_failure_policy: ReadFailurePolicy::Closed,
            clock: Arc::new(ManualClock::new(TEST_NOW)),
        }
    }

    /// The clock the built state runs on, for moving time in tests.
    pub fn clock(&self) -> Arc<ManualClock> {
        self.clock.clone()
    }

    pub fn with_store(mut self, store: MockKeyedStore) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    pub fn with_read_failure_policy(mut self, policy: ReadFailurePolicy) -> Self {
        self.read_failure_policy = policy;
        self
    }

    pub fn build(self) -> AppState {
        let clock = self.clock;
        let store: Arc<dyn KeyedStore> = match self.store {
            Some(store) => store,
            None => Arc::new(MemoryKeyedStore::new(clock.clone())),
        };

        let mut config = test_config();
        config.read_failure_policy = self.read_failure_policy;

        let engine = CappingEngine::new(store, config.prefixes(), clock).unwrap();

        AppState { config, engine }
    }
}

impl Default for TestStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
