//! The exposure-matching capability contract.
//!
//! The capability is an opaque, stateful platform service. Nothing here
//! serializes calls; wrap providers in an
//! [`ExposureNotificationManager`](crate::ExposureNotificationManager).

use async_trait::async_trait;

use covertrace_core::{
    AuthorizationStatus, ExposureConfiguration, ExposureDetectionSummary,
    ExposureDetectionSummaryData, ExposureInfo, TemporaryExposureKey,
};
use covertrace_store::ChunkLocation;

use crate::error::Result;

/// Async interface of the matching capability.
#[async_trait]
pub trait ExposureNotificationProvider: Send + Sync {
    /// Prepare the provider. Called once, before any other method.
    async fn activate(&self) -> Result<()>;

    async fn status(&self) -> Result<AuthorizationStatus>;

    /// Turn exposure notifications on or off. Turning them on may prompt the user.
    async fn set_exposure_notification_enabled(&self, enabled: bool) -> Result<()>;

    /// Match the keys stored at `key_locations` against local contacts.
    async fn detect_exposures(
        &self,
        configuration: &ExposureConfiguration,
        key_locations: &[ChunkLocation],
    ) -> Result<ExposureDetectionSummary>;

    /// Per-contact details of the exposures summarized by `summary`.
    async fn get_exposure_info(
        &self,
        summary: &ExposureDetectionSummaryData,
        user_explanation: &str,
    ) -> Result<Vec<ExposureInfo>>;

    /// The user's own keys, after explicit authorization.
    async fn get_diagnosis_keys(&self) -> Result<Vec<TemporaryExposureKey>>;

    /// Release the provider; it will not be used again.
    async fn deactivate(&self) -> Result<()>;
}

/// Provider for platforms without the capability.
///
/// Reports a fixed status and succeeds at everything without finding matches.
pub mod stub {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExposureNotificationProviderStub {
        status: AuthorizationStatus,
    }

    impl ExposureNotificationProviderStub {
        pub fn new(status: AuthorizationStatus) -> Self {
            Self { status }
        }
    }

    #[async_trait]
    impl ExposureNotificationProvider for ExposureNotificationProviderStub {
        async fn activate(&self) -> Result<()> {
            Ok(())
        }

        async fn status(&self) -> Result<AuthorizationStatus> {
            Ok(self.status)
        }

        async fn set_exposure_notification_enabled(&self, _enabled: bool) -> Result<()> {
            Ok(())
        }

        async fn detect_exposures(
            &self,
            _configuration: &ExposureConfiguration,
            _key_locations: &[ChunkLocation],
        ) -> Result<ExposureDetectionSummary> {
            Ok(ExposureDetectionSummary::NoMatch)
        }

        async fn get_exposure_info(
            &self,
            _summary: &ExposureDetectionSummaryData,
            _user_explanation: &str,
        ) -> Result<Vec<ExposureInfo>> {
            Ok(Vec::new())
        }

        async fn get_diagnosis_keys(&self) -> Result<Vec<TemporaryExposureKey>> {
            Ok(Vec::new())
        }

        async fn deactivate(&self) -> Result<()> {
            Ok(())
        }
    }
}
