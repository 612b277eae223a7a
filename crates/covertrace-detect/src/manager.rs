//! Serialized access to the matching capability.
//!
//! Every provider call goes through one async mutex, so no two calls ever
//! overlap. The first call to take the lock activates the provider; later
//! calls find activation already done. Activation therefore completes
//! before any other provider call starts.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, OnceCell};
use tracing::{debug, warn};

use covertrace_core::{
    AuthorizationStatus, ExposureConfiguration, ExposureDetectionSummary, ExposureInfo,
    TemporaryExposureKey,
};
use covertrace_store::ChunkLocation;

use crate::error::Result;
use crate::provider::ExposureNotificationProvider;

/// Wraps a provider so that its methods run strictly one at a time.
pub struct ExposureNotificationManager<P: ExposureNotificationProvider> {
    provider: Arc<P>,
    queue: Mutex<()>,
    activation: OnceCell<()>,
}

impl<P: ExposureNotificationProvider> ExposureNotificationManager<P> {
    pub fn new(provider: P) -> Self {
        Self::with_shared(Arc::new(provider))
    }

    pub fn with_shared(provider: Arc<P>) -> Self {
        Self {
            provider,
            queue: Mutex::new(()),
            activation: OnceCell::new(),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Take the queue and make sure the provider has been activated.
    async fn serialized(&self) -> MutexGuard<'_, ()> {
        let guard = self.queue.lock().await;
        self.activation
            .get_or_init(|| async {
                match self.provider.activate().await {
                    Ok(()) => debug!("exposure notification provider activated"),
                    Err(e) => warn!(error = %e, "exposure notification provider activation failed"),
                }
            })
            .await;
        guard
    }

    /// Activate the provider now instead of on first use.
    pub async fn activate(&self) {
        let _guard = self.serialized().await;
    }

    pub async fn status(&self) -> Result<AuthorizationStatus> {
        let _guard = self.serialized().await;
        self.provider.status().await
    }

    /// Enable notifications if permission was already granted; meant for every startup.
    ///
    /// Never prompts the user. Failures are swallowed. Returns the status
    /// after the attempt.
    pub async fn start_if_authorized(&self) -> Result<AuthorizationStatus> {
        let _guard = self.serialized().await;
        self.enable(true).await;
        self.provider.status().await
    }

    /// Enable notifications, prompting the user for permission if needed.
    ///
    /// Failures are swallowed. Returns the status after the attempt.
    pub async fn ask_authorization_and_start(&self) -> Result<AuthorizationStatus> {
        let _guard = self.serialized().await;
        self.enable(false).await;
        self.provider.status().await
    }

    async fn enable(&self, silently: bool) {
        if silently {
            match self.provider.status().await {
                Ok(status) if status.can_perform_detection() => {}
                Ok(status) => {
                    debug!(?status, "not enabling exposure notifications");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "status unavailable, not enabling exposure notifications");
                    return;
                }
            }
        }
        if let Err(e) = self.provider.set_exposure_notification_enabled(true).await {
            warn!(error = %e, silently, "enabling exposure notifications failed");
        }
    }

    pub async fn detect_exposures(
        &self,
        configuration: &ExposureConfiguration,
        key_locations: &[ChunkLocation],
    ) -> Result<ExposureDetectionSummary> {
        let _guard = self.serialized().await;
        self.provider
            .detect_exposures(configuration, key_locations)
            .await
    }

    /// Details of the matches in `summary`; empty for no match, without touching the provider.
    pub async fn get_exposure_info(
        &self,
        summary: &ExposureDetectionSummary,
        user_explanation: &str,
    ) -> Result<Vec<ExposureInfo>> {
        let data = match summary {
            ExposureDetectionSummary::NoMatch => return Ok(Vec::new()),
            ExposureDetectionSummary::Matches(data) => data,
        };
        let _guard = self.serialized().await;
        self.provider.get_exposure_info(data, user_explanation).await
    }

    pub async fn get_diagnosis_keys(&self) -> Result<Vec<TemporaryExposureKey>> {
        let _guard = self.serialized().await;
        self.provider.get_diagnosis_keys().await
    }

    pub async fn deactivate(&self) -> Result<()> {
        let _guard = self.serialized().await;
        self.provider.deactivate().await
    }
}
