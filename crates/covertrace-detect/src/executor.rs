//! The exposure detection executor.
//!
//! One call to [`ExposureDetectionExecutor::execute`] runs one detection
//! cycle and yields exactly one [`DetectionOutcome`]:
//!
//! ```text
//! throttle ─► status ─► fetch chunks ─► match ─► (exposure info) ─► outcome
//!                            │                                  ▲
//!                            └────── cleanup, always, once ─────┘
//! ```
//!
//! Once the fetch has started, every chunk it stored is cleared, including
//! when the run times out halfway through the download.
//!
//! The executor keeps no state between runs. Callers must not start a run
//! before the previous one for the same cursors has finished.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use covertrace_core::{
    chunk_boundaries, Country, DetectionError, DetectionOutcome, ExposureConfiguration,
    ExposureDetectionSummary,
};
use covertrace_store::ChunkLocation;

use crate::keys::{ChunkCursors, KeyChunk, KeyChunkProvider};
use crate::manager::ExposureNotificationManager;
use crate::provider::ExposureNotificationProvider;

/// Configuration for the executor.
#[derive(Debug, Clone, Default)]
pub struct ExecutorConfig {
    /// Time budget for one run. Cleanup is not counted against it.
    pub timeout: Option<Duration>,
}

/// Inputs of one detection run.
#[derive(Debug, Clone)]
pub struct DetectionRequest {
    /// Minimum time between two unforced runs.
    pub exposure_detection_period: Duration,
    pub last_detection_date: Option<DateTime<Utc>>,
    pub cursors: ChunkCursors,
    pub configuration: ExposureConfiguration,
    /// Summaries scoring below this are not enumerated per contact.
    pub exposure_info_risk_score_threshold: u8,
    pub user_explanation: String,
    pub now: DateTime<Utc>,
    pub is_user_covid_positive: bool,
    pub force_run: bool,
    pub countries_of_interest: Vec<Country>,
}

impl DetectionRequest {
    /// Whether an unforced run would be throttled.
    pub fn ran_recently(&self) -> bool {
        let Some(last) = self.last_detection_date else {
            return false;
        };
        let elapsed = self.now.signed_duration_since(last);
        match elapsed.to_std() {
            Ok(elapsed) => elapsed < self.exposure_detection_period,
            // A last run in the future counts as recent.
            Err(_) => true,
        }
    }
}

/// Whether matching results warrant enumerating every contact.
pub fn should_retrieve_exposure_info(
    summary: &ExposureDetectionSummary,
    risk_score_threshold: u8,
    is_user_covid_positive: bool,
    force_run: bool,
) -> bool {
    match summary {
        ExposureDetectionSummary::NoMatch => force_run,
        ExposureDetectionSummary::Matches(data) => {
            !is_user_covid_positive && data.maximum_risk_score >= risk_score_threshold
        }
    }
}

/// Chunks a run has stored so far.
///
/// Filled while the fetch is in flight, so a fetch cut short by the
/// deadline still leaves behind what must be cleared.
#[derive(Default)]
struct Fetch {
    started: bool,
    chunks: Vec<KeyChunk>,
}

/// Runs detection cycles against a manager and a key chunk provider.
pub struct ExposureDetectionExecutor<P, K>
where
    P: ExposureNotificationProvider,
    K: KeyChunkProvider,
{
    manager: Arc<ExposureNotificationManager<P>>,
    keys: Arc<K>,
    config: ExecutorConfig,
}

impl<P, K> ExposureDetectionExecutor<P, K>
where
    P: ExposureNotificationProvider,
    K: KeyChunkProvider,
{
    pub fn new(
        manager: Arc<ExposureNotificationManager<P>>,
        keys: Arc<K>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            manager,
            keys,
            config,
        }
    }

    pub fn manager(&self) -> &ExposureNotificationManager<P> {
        &self.manager
    }

    /// Run one detection cycle.
    pub async fn execute(&self, request: &DetectionRequest) -> DetectionOutcome {
        let deadline = self.config.timeout.map(|t| Instant::now() + t);

        let mut fetch = Fetch::default();

        let prepared = with_deadline(deadline, self.prepare(request, &mut fetch)).await;
        let outcome = match prepared {
            None => DetectionError::Timeout.into(),
            Some(Some(outcome)) => outcome,
            Some(None) => with_deadline(deadline, self.detect(request, &fetch.chunks))
                .await
                .unwrap_or_else(|| DetectionError::Timeout.into()),
        };

        if fetch.started {
            let chunks = &fetch.chunks;
            if let Err(e) = self.keys.clear_local_resources(chunks).await {
                warn!(error = %e, chunks = chunks.len(), "failed to clear local chunk resources");
            }
        }
        finish(outcome)
    }

    /// Throttle, authorization and key fetch.
    ///
    /// Returns the outcome when the run ends here, `None` when matching
    /// should go ahead on `fetch.chunks`.
    async fn prepare(
        &self,
        request: &DetectionRequest,
        fetch: &mut Fetch,
    ) -> Option<DetectionOutcome> {
        if !request.force_run && request.ran_recently() {
            debug!("detection ran recently, skipping");
            return Some(DetectionOutcome::NoDetectionNecessary);
        }

        match self.manager.status().await {
            Ok(status) if status.can_perform_detection() => {}
            Ok(status) => {
                debug!(?status, "detection not authorized");
                return Some(DetectionError::NotAuthorized.into());
            }
            Err(e) => {
                warn!(error = %e, "unable to retrieve status");
                return Some(DetectionError::UnableToRetrieveStatus.into());
            }
        }

        fetch.started = true;
        match self
            .keys
            .fetch_chunks_into(
                &request.cursors,
                &request.countries_of_interest,
                &mut fetch.chunks,
            )
            .await
        {
            Ok(()) => None,
            Err(e) => {
                warn!(error = %e, stored = fetch.chunks.len(), "unable to retrieve keys");
                Some(DetectionError::UnableToRetrieveKeys.into())
            }
        }
    }

    /// Matching and the partial/full decision.
    async fn detect(&self, request: &DetectionRequest, chunks: &[KeyChunk]) -> DetectionOutcome {
        if chunks.is_empty() && !request.force_run {
            debug!("no new key chunks");
            return DetectionOutcome::NoDetectionNecessary;
        }

        let locations: Vec<ChunkLocation> = chunks
            .iter()
            .flat_map(|c| c.locations.iter().cloned())
            .collect();
        let boundaries = chunk_boundaries(chunks.iter().map(|c| (c.scope, c.index)));
        for (scope, range) in &boundaries {
            debug!(%scope, first = range.first, last = range.last, "processing chunks");
        }

        let summary = match self
            .manager
            .detect_exposures(&request.configuration, &locations)
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "unable to retrieve summary");
                return DetectionError::UnableToRetrieveSummary.into();
            }
        };

        if !should_retrieve_exposure_info(
            &summary,
            request.exposure_info_risk_score_threshold,
            request.is_user_covid_positive,
            request.force_run,
        ) {
            return DetectionOutcome::PartialDetection {
                date: request.now,
                summary,
                boundaries,
                processed_key_count: chunks.len(),
            };
        }

        match self
            .manager
            .get_exposure_info(&summary, &request.user_explanation)
            .await
        {
            Ok(exposure_info) => DetectionOutcome::FullDetection {
                date: request.now,
                summary,
                exposure_info,
                boundaries,
                processed_key_count: chunks.len(),
            },
            Err(e) => {
                warn!(error = %e, "unable to retrieve exposure info");
                DetectionError::UnableToRetrieveExposureInfo.into()
            }
        }
    }
}

async fn with_deadline<F: std::future::Future>(
    deadline: Option<Instant>,
    future: F,
) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, future).await.ok(),
        None => Some(future.await),
    }
}

fn finish(outcome: DetectionOutcome) -> DetectionOutcome {
    match &outcome {
        DetectionOutcome::Error(e) => info!(outcome = outcome.kind(), error = e.label(), "detection finished"),
        _ => info!(outcome = outcome.kind(), "detection finished"),
    }
    outcome
}
