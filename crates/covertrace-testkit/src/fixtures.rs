//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: sample exposure data, a fixed
//! clock, and a scripted backend with an in-memory chunk store.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

use covertrace_core::catalog::endpoints;
use covertrace_core::{
    ChunkScope, Country, ExposureDetectionSummary, ExposureDetectionSummaryData, ExposureInfo,
    RiskLevel, TemporaryExposureKey,
};
use covertrace_net::transport::memory::{Reply, ScriptedTransport};
use covertrace_net::Response;
use covertrace_store::MemoryChunkStore;

use crate::mocks::MockExposureProvider;

/// 2020-06-15T10:00:00Z, the clock used across fixtures.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.timestamp_opt(1_592_215_200, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// `fixed_now()` shifted by whole days.
pub fn days_from_now(days: i64) -> DateTime<Utc> {
    fixed_now() + chrono::Duration::days(days)
}

/// A daily key starting at `rolling_start_number`.
pub fn diagnosis_key(rolling_start_number: u32) -> TemporaryExposureKey {
    let mut key_data = [0u8; 16];
    key_data[..4].copy_from_slice(&rolling_start_number.to_be_bytes());
    TemporaryExposureKey {
        key_data,
        rolling_start_number,
        rolling_period: 144,
        transmission_risk: RiskLevel::Medium,
    }
}

pub fn summary_data(maximum_risk_score: u8) -> ExposureDetectionSummaryData {
    ExposureDetectionSummaryData {
        matched_key_count: 2,
        days_since_last_exposure: 3,
        duration_by_attenuation_bucket: vec![Duration::from_secs(600), Duration::from_secs(300), Duration::ZERO],
        maximum_risk_score,
        metadata: BTreeMap::new(),
    }
}

pub fn matches(maximum_risk_score: u8) -> ExposureDetectionSummary {
    ExposureDetectionSummary::Matches(summary_data(maximum_risk_score))
}

/// A contact `days_ago` days before `fixed_now()`.
pub fn exposure_info(days_ago: i64, total_risk_score: u8) -> ExposureInfo {
    ExposureInfo {
        date: days_from_now(-days_ago),
        duration: Duration::from_secs(900),
        attenuation_value: 45,
        duration_by_attenuation_bucket: vec![Duration::from_secs(600), Duration::from_secs(300), Duration::ZERO],
        transmission_risk: RiskLevel::Medium,
        total_risk_score,
        metadata: BTreeMap::new(),
    }
}

fn scope_country(scope: ChunkScope) -> Option<Country> {
    match scope {
        ChunkScope::Global => None,
        ChunkScope::Country(country) => Some(country),
    }
}

/// Body served for chunk `index` of `scope`.
pub fn chunk_body(scope: ChunkScope, index: i64) -> String {
    format!("{scope}-chunk-{index}")
}

/// A scripted backend, an in-memory chunk store and a mock provider.
pub struct TestFixture {
    pub transport: Arc<ScriptedTransport>,
    pub store: Arc<MemoryChunkStore>,
    pub provider: Arc<MockExposureProvider>,
}

impl TestFixture {
    /// Fixture with an authorized provider that finds no matches.
    pub fn new() -> Self {
        Self::with_provider(MockExposureProvider::authorized())
    }

    pub fn with_provider(provider: MockExposureProvider) -> Self {
        Self {
            transport: Arc::new(ScriptedTransport::new()),
            store: Arc::new(MemoryChunkStore::new()),
            provider: Arc::new(provider),
        }
    }

    /// Publish chunks `oldest..=newest` for `scope`.
    pub async fn publish_chunks(&self, scope: ChunkScope, oldest: i64, newest: i64) {
        let country = scope_country(scope);
        self.transport
            .on(
                &endpoints::keys_index(country),
                Reply::Respond(Response::json(&json!({ "oldest": oldest, "newest": newest }))),
            )
            .await;
        for index in oldest..=newest {
            self.transport
                .on(
                    &endpoints::keys_chunk(country, index),
                    Reply::Respond(Response::new(200, chunk_body(scope, index))),
                )
                .await;
        }
    }

    /// Answer `scope`'s index with the backend's "no batches found" error.
    pub async fn publish_nothing(&self, scope: ChunkScope) {
        self.transport
            .on(
                &endpoints::keys_index(scope_country(scope)),
                Reply::Respond(Response::new(
                    404,
                    json!({ "error_code": 1301, "message": "no batches found" }).to_string(),
                )),
            )
            .await;
    }

    /// Accept every ingestion request.
    pub async fn accept_ingestion(&self) {
        for path in [endpoints::CHECK_OTP, endpoints::CHECK_CUN, endpoints::UPLOAD] {
            self.transport
                .on(path, Reply::Respond(Response::json(&json!({}))))
                .await;
        }
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
