//! Exposure data produced by the on-device matching capability.
//!
//! These types mirror what the platform hands back. They are never mutated
//! after creation; upload-ready copies live in [`crate::upload`].

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Length of the key material of a temporary exposure key.
pub const KEY_DATA_LEN: usize = 16;

/// Transmission risk ordinal attached to keys and exposures.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum RiskLevel {
    #[default]
    Invalid = 0,
    Lowest = 1,
    Low = 2,
    LowMedium = 3,
    Medium = 4,
    MediumHigh = 5,
    High = 6,
    VeryHigh = 7,
    Highest = 8,
}

impl RiskLevel {
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => RiskLevel::Invalid,
            1 => RiskLevel::Lowest,
            2 => RiskLevel::Low,
            3 => RiskLevel::LowMedium,
            4 => RiskLevel::Medium,
            5 => RiskLevel::MediumHigh,
            6 => RiskLevel::High,
            7 => RiskLevel::VeryHigh,
            8 => RiskLevel::Highest,
            _ => return None,
        })
    }
}

/// A key broadcast by this device, as returned by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemporaryExposureKey {
    pub key_data: [u8; KEY_DATA_LEN],
    /// Start of validity, in 10-minute intervals since the Unix epoch.
    pub rolling_start_number: u32,
    /// Validity, in 10-minute intervals.
    pub rolling_period: u32,
    pub transmission_risk: RiskLevel,
}

/// Authorization state of the matching capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    #[default]
    Unknown,
    Restricted,
    NotAuthorized,
    Authorized,
    AuthorizedAndActive,
    AuthorizedAndInactive,
    AuthorizedAndBluetoothOff,
}

impl AuthorizationStatus {
    /// Whether the user granted access, whatever the radio state.
    pub fn is_authorized(&self) -> bool {
        matches!(
            self,
            AuthorizationStatus::Authorized
                | AuthorizationStatus::AuthorizedAndActive
                | AuthorizationStatus::AuthorizedAndInactive
                | AuthorizationStatus::AuthorizedAndBluetoothOff
        )
    }

    /// Whether a detection cycle may run in this state.
    pub fn can_perform_detection(&self) -> bool {
        matches!(
            self,
            AuthorizationStatus::Authorized
                | AuthorizationStatus::AuthorizedAndActive
                | AuthorizationStatus::AuthorizedAndInactive
        )
    }
}

/// Aggregate statistics of a detection run that matched at least one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureDetectionSummaryData {
    pub matched_key_count: u64,
    pub days_since_last_exposure: i32,
    /// One entry per attenuation bucket.
    pub duration_by_attenuation_bucket: Vec<Duration>,
    pub maximum_risk_score: u8,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Result of matching a set of key chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ExposureDetectionSummary {
    NoMatch,
    Matches(ExposureDetectionSummaryData),
}

impl ExposureDetectionSummary {
    pub fn data(&self) -> Option<&ExposureDetectionSummaryData> {
        match self {
            ExposureDetectionSummary::NoMatch => None,
            ExposureDetectionSummary::Matches(data) => Some(data),
        }
    }

    pub fn maximum_risk_score(&self) -> Option<u8> {
        self.data().map(|d| d.maximum_risk_score)
    }

    pub fn matched_key_count(&self) -> u64 {
        self.data().map_or(0, |d| d.matched_key_count)
    }
}

/// Detail of a single contact event, revealed by a full detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureInfo {
    pub date: DateTime<Utc>,
    pub duration: Duration,
    pub attenuation_value: u8,
    pub duration_by_attenuation_bucket: Vec<Duration>,
    pub transmission_risk: RiskLevel,
    pub total_risk_score: u8,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_roundtrip() {
        for value in 0..=8u8 {
            assert_eq!(RiskLevel::from_u8(value).unwrap().to_u8(), value);
        }
        assert_eq!(RiskLevel::from_u8(9), None);
    }

    #[test]
    fn test_detection_allowed_states() {
        use AuthorizationStatus::*;
        let allowed: Vec<_> = [
            Unknown,
            Restricted,
            NotAuthorized,
            Authorized,
            AuthorizedAndActive,
            AuthorizedAndInactive,
            AuthorizedAndBluetoothOff,
        ]
        .into_iter()
        .filter(|s| s.can_perform_detection())
        .collect();
        assert_eq!(
            allowed,
            vec![Authorized, AuthorizedAndActive, AuthorizedAndInactive]
        );
        assert!(AuthorizedAndBluetoothOff.is_authorized());
    }

    #[test]
    fn test_summary_accessors() {
        assert_eq!(ExposureDetectionSummary::NoMatch.maximum_risk_score(), None);
        let summary = ExposureDetectionSummary::Matches(ExposureDetectionSummaryData {
            matched_key_count: 3,
            days_since_last_exposure: 2,
            duration_by_attenuation_bucket: vec![Duration::from_secs(300); 3],
            maximum_risk_score: 17,
            metadata: BTreeMap::new(),
        });
        assert_eq!(summary.maximum_risk_score(), Some(17));
        assert_eq!(summary.matched_key_count(), 3);
    }
}
