//! Remote configuration document.
//!
//! The backend publishes one JSON document with snake_case keys. Every field
//! has a default, so a partial or older document still deserializes. Times
//! are expressed in seconds.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use covertrace_core::catalog::{maximal_upload_target_size, minimum_ingestion_target_size};
use covertrace_core::{ExposureConfiguration, UploadLimits};

use crate::dummy::DummyTrafficSettings;
use crate::error::{Result, ServiceError};
use crate::state::DetectionKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Minimum time between background detections.
    pub exposure_detection_period: f64,
    /// Minimum time between foreground detections.
    pub maximum_exposure_detection_waiting_time: f64,
    /// Summaries scoring below this are not enumerated per contact.
    pub exposure_info_minimum_risk_score: u8,
    pub exposure_configuration: ExposureConfiguration,
    pub teks_max_summary_count: usize,
    pub teks_max_info_count: usize,
    /// Wire size shared by every ingestion request.
    pub teks_packet_size: usize,
    pub dummy_teks_average_opportunity_waiting_time: f64,
    pub dummy_teks_window_duration: f64,
    pub dummy_teks_average_start_waiting_time: f64,
    pub dummy_teks_average_request_waiting_time: f64,
    /// Probability of another dummy request after the i-th one.
    pub dummy_teks_request_probabilities: Vec<f64>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            exposure_detection_period: 14_400.0,
            maximum_exposure_detection_waiting_time: 86_400.0,
            exposure_info_minimum_risk_score: 20,
            exposure_configuration: ExposureConfiguration::default(),
            teks_max_summary_count: 84,
            teks_max_info_count: 600,
            teks_packet_size: 110_000,
            dummy_teks_average_opportunity_waiting_time: 5_184_000.0,
            dummy_teks_window_duration: 1_209_600.0,
            dummy_teks_average_start_waiting_time: 15.0,
            dummy_teks_average_request_waiting_time: 10.0,
            dummy_teks_request_probabilities: vec![0.95, 0.1],
        }
    }
}

/// Seconds to a duration; negative or non-finite values become zero.
pub(crate) fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

impl Configuration {
    /// Parse a configuration document.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Reject documents the service cannot operate with.
    ///
    /// The packet size must hold every ingestion request sent to
    /// `ingestion_base_url` at `now`, including an upload filled to the
    /// configured summary and exposure limits.
    pub fn validate(&self, ingestion_base_url: &str, now: DateTime<Utc>) -> Result<()> {
        let fixed = minimum_ingestion_target_size(ingestion_base_url, now)?;
        let upload = maximal_upload_target_size(ingestion_base_url, &self.upload_limits(), now)?;
        let required = fixed.max(upload);
        if self.teks_packet_size < required {
            return Err(ServiceError::Config(format!(
                "teks_packet_size {} is below the {} bytes required",
                self.teks_packet_size, required
            )));
        }

        let times = [
            ("exposure_detection_period", self.exposure_detection_period),
            (
                "maximum_exposure_detection_waiting_time",
                self.maximum_exposure_detection_waiting_time,
            ),
            (
                "dummy_teks_average_opportunity_waiting_time",
                self.dummy_teks_average_opportunity_waiting_time,
            ),
            ("dummy_teks_window_duration", self.dummy_teks_window_duration),
            (
                "dummy_teks_average_start_waiting_time",
                self.dummy_teks_average_start_waiting_time,
            ),
            (
                "dummy_teks_average_request_waiting_time",
                self.dummy_teks_average_request_waiting_time,
            ),
        ];
        for (name, value) in times {
            if !value.is_finite() || value < 0.0 {
                return Err(ServiceError::Config(format!("{name} must be a non-negative number of seconds")));
            }
        }

        if self.dummy_teks_request_probabilities.is_empty() {
            return Err(ServiceError::Config(
                "dummy_teks_request_probabilities must not be empty".into(),
            ));
        }
        if self
            .dummy_teks_request_probabilities
            .iter()
            .any(|p| !(0.0..=1.0).contains(p))
        {
            return Err(ServiceError::Config(
                "dummy_teks_request_probabilities must lie in [0, 1]".into(),
            ));
        }
        Ok(())
    }

    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits {
            max_summaries: self.teks_max_summary_count,
            max_exposure_infos: self.teks_max_info_count,
        }
    }

    /// Throttling period for a detection of the given kind.
    pub fn detection_period(&self, kind: DetectionKind) -> Duration {
        match kind {
            DetectionKind::Foreground => seconds(self.maximum_exposure_detection_waiting_time),
            DetectionKind::Background => seconds(self.exposure_detection_period),
        }
    }

    pub fn dummy_traffic_settings(&self) -> DummyTrafficSettings {
        DummyTrafficSettings {
            average_opportunity_waiting_time: seconds(self.dummy_teks_average_opportunity_waiting_time),
            window_duration: seconds(self.dummy_teks_window_duration),
            average_start_waiting_time: seconds(self.dummy_teks_average_start_waiting_time),
            average_request_waiting_time: seconds(self.dummy_teks_average_request_waiting_time),
            request_probabilities: self.dummy_teks_request_probabilities.clone(),
        }
    }
}
