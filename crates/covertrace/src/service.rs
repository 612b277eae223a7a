//! The exposure service: unified API over detection, state and uploads.
//!
//! The service owns the detection state and wires the pieces together:
//! the manager guarding the matching capability, the remote key chunk
//! provider feeding the executor, and the backend client sending padded
//! ingestion requests.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, info};

use covertrace_core::{Country, Cun, DetectionOutcome, Otp, UploadBody, UploadTek};
use covertrace_detect::{
    DetectionRequest, ExecutorConfig, ExposureDetectionExecutor, ExposureNotificationManager,
    ExposureNotificationProvider,
};
use covertrace_net::{BackendClient, BackendConfig, Transport};
use covertrace_store::ChunkStore;

use crate::config::Configuration;
use crate::dummy::DummyTrafficPolicy;
use crate::error::Result;
use crate::keys::{KeyProviderConfig, RemoteKeyChunkProvider};
use crate::state::{DetectionKind, DetectionState};

/// Configuration for the service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Remote configuration document.
    pub configuration: Configuration,
    /// Backend hosts. The target size is taken from `configuration`.
    pub backend: BackendConfig,
    pub executor: ExecutorConfig,
    pub key_provider: KeyProviderConfig,
    /// Shown by the platform when per-contact details are requested.
    pub user_explanation: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            configuration: Configuration::default(),
            backend: BackendConfig::default(),
            executor: ExecutorConfig::default(),
            key_provider: KeyProviderConfig::default(),
            user_explanation: "Your exposure details are used to assess your risk.".to_string(),
        }
    }
}

/// What triggered a detection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionTrigger {
    pub kind: DetectionKind,
    /// Skip the throttle and enumerate contacts even without matches.
    pub force_run: bool,
    pub is_user_covid_positive: bool,
}

impl DetectionTrigger {
    pub fn foreground() -> Self {
        Self {
            kind: DetectionKind::Foreground,
            force_run: false,
            is_user_covid_positive: false,
        }
    }

    pub fn background() -> Self {
        Self {
            kind: DetectionKind::Background,
            ..Self::foreground()
        }
    }

    pub fn forced(mut self) -> Self {
        self.force_run = true;
        self
    }

    pub fn covid_positive(mut self, positive: bool) -> Self {
        self.is_user_covid_positive = positive;
        self
    }
}

/// Runs detections, keeps their state and talks to the ingestion backend.
pub struct ExposureService<P, T, S>
where
    P: ExposureNotificationProvider,
    T: Transport,
    S: ChunkStore,
{
    manager: Arc<ExposureNotificationManager<P>>,
    executor: ExposureDetectionExecutor<P, RemoteKeyChunkProvider<T, S>>,
    client: BackendClient<T>,
    configuration: Configuration,
    user_explanation: String,
    /// Held for a whole run, so runs never overlap.
    detection: Mutex<()>,
    state: Mutex<DetectionState>,
    dummy: DummyTrafficPolicy,
}

impl<P, T, S> ExposureService<P, T, S>
where
    P: ExposureNotificationProvider,
    T: Transport,
    S: ChunkStore,
{
    /// Create a service with empty detection state.
    ///
    /// Fails if the remote configuration cannot be used.
    pub fn new(provider: Arc<P>, transport: Arc<T>, store: Arc<S>, config: ServiceConfig) -> Result<Self> {
        let ServiceConfig {
            configuration,
            backend,
            executor,
            key_provider,
            user_explanation,
        } = config;
        configuration.validate(&backend.ingestion_base_url, Utc::now())?;

        let client = BackendClient::with_shared(
            transport,
            BackendConfig {
                target_size: configuration.teks_packet_size,
                ..backend
            },
        );
        let manager = Arc::new(ExposureNotificationManager::with_shared(provider));
        let keys = Arc::new(RemoteKeyChunkProvider::new(client.clone(), store, key_provider));
        let executor = ExposureDetectionExecutor::new(Arc::clone(&manager), keys, executor);
        let dummy = DummyTrafficPolicy::new(configuration.dummy_traffic_settings());

        Ok(Self {
            manager,
            executor,
            client,
            configuration,
            user_explanation,
            detection: Mutex::new(()),
            state: Mutex::new(DetectionState::new()),
            dummy,
        })
    }

    /// Resume from a previously persisted state.
    pub fn with_state(mut self, state: DetectionState) -> Self {
        self.state = Mutex::new(state);
        self
    }

    pub fn manager(&self) -> &ExposureNotificationManager<P> {
        &self.manager
    }

    pub fn client(&self) -> &BackendClient<T> {
        &self.client
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn dummy_traffic(&self) -> &DummyTrafficPolicy {
        &self.dummy
    }

    /// A copy of the current detection state, e.g. for persistence.
    pub async fn state(&self) -> DetectionState {
        self.state.lock().await.clone()
    }

    pub async fn set_countries_of_interest(&self, countries: Vec<Country>) {
        self.state.lock().await.countries_of_interest = countries;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Detection
    // ─────────────────────────────────────────────────────────────────────────

    /// Run one detection cycle and fold its outcome into the state.
    pub async fn run_detection(&self, trigger: DetectionTrigger, now: DateTime<Utc>) -> DetectionOutcome {
        let _run = self.detection.lock().await;

        let request = {
            let state = self.state.lock().await;
            DetectionRequest {
                exposure_detection_period: self.configuration.detection_period(trigger.kind),
                last_detection_date: state.last_detection_date,
                cursors: state.cursors.clone(),
                configuration: self.configuration.exposure_configuration.clone(),
                exposure_info_risk_score_threshold: self.configuration.exposure_info_minimum_risk_score,
                user_explanation: self.user_explanation.clone(),
                now,
                is_user_covid_positive: trigger.is_user_covid_positive,
                force_run: trigger.force_run,
                countries_of_interest: state.countries_of_interest.clone(),
            }
        };

        let outcome = self.executor.execute(&request).await;

        let mut state = self.state.lock().await;
        state.apply_outcome(&outcome, trigger.kind, now);
        let dropped = state.clear_outdated_results(now);
        if dropped > 0 {
            debug!(dropped, "outdated exposure results dropped");
        }
        outcome
    }

    /// Drop retained results older than the retention period.
    pub async fn clear_outdated_results(&self, now: DateTime<Utc>) -> usize {
        self.state.lock().await.clear_outdated_results(now)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ingestion
    // ─────────────────────────────────────────────────────────────────────────

    /// Capped upload body from the device keys and the retained results.
    pub async fn prepare_upload_body(&self, province: &str) -> Result<UploadBody> {
        let keys = self.manager.get_diagnosis_keys().await?;
        let teks: Vec<UploadTek> = keys.iter().map(UploadTek::from).collect();

        let state = self.state.lock().await;
        Ok(UploadBody::new(
            teks,
            province,
            state.upload_summaries(),
            state.countries_of_interest.clone(),
            &self.configuration.upload_limits(),
        ))
    }

    /// Ask the backend to authorize `otp`. Cancels any running dummy sequence.
    pub async fn validate_otp(&self, otp: &Otp, now: DateTime<Utc>) -> Result<()> {
        self.dummy.cancel();
        self.client.validate_otp(otp, now).await?;
        Ok(())
    }

    /// Ask the backend to authorize a health service `cun`. Cancels any
    /// running dummy sequence.
    pub async fn validate_cun(
        &self,
        cun: &Cun,
        last_his_number: &str,
        symptoms_started_on: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.dummy.cancel();
        self.client
            .validate_cun(cun, last_his_number, symptoms_started_on, now)
            .await?;
        Ok(())
    }

    /// Upload keys and retained results under an authorized `otp`.
    pub async fn upload_data(&self, otp: &Otp, province: &str, now: DateTime<Utc>) -> Result<()> {
        self.dummy.cancel();
        let body = self.prepare_upload_body(province).await?;
        self.client.upload_data(body, otp, now).await?;
        Ok(())
    }

    pub async fn send_dummy_request(&self) -> Result<()> {
        self.client.send_dummy_request().await?;
        Ok(())
    }

    /// Run this session's dummy sequence if one is due.
    ///
    /// Returns the number of requests sent. Request failures are ignored.
    pub async fn run_dummy_sequence<R>(&self, rng: &mut R, now: DateTime<Utc>) -> usize
    where
        R: Rng + Send,
    {
        self.dummy.update_window_if_expired(rng, now);
        let Some(start_delay) = self.dummy.schedule(rng, now) else {
            return 0;
        };
        tokio::time::sleep(start_delay).await;

        let started = chrono::Duration::from_std(start_delay)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(now);
        self.dummy.reset_window(rng, started);

        let mut sent = 0;
        loop {
            if self.dummy.is_cancelled() {
                debug!(sent, "dummy sequence cancelled");
                break;
            }
            if let Err(e) = self.client.send_dummy_request().await {
                debug!(error = %e, "dummy request failed");
            }
            sent += 1;

            match self.dummy.next_request_delay(rng, sent - 1) {
                Some(delay) => tokio::time::sleep(delay).await,
                None => break,
            }
        }

        self.dummy.finish_sequence();
        info!(sent, "dummy sequence finished");
        sent
    }
}
