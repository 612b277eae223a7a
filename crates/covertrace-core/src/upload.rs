//! Upload-ready records.
//!
//! Native exposure data is converted into these flat, clamped records when
//! a detection outcome is retained, and later capped into an [`UploadBody`].

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::capper::{cap_keys, cap_summaries, UploadLimits, MAX_KEYS_PER_UPLOAD};
use crate::country::Country;
use crate::error::{CoreError, Result};
use crate::exposure::{ExposureDetectionSummaryData, ExposureInfo, TemporaryExposureKey};
use crate::wire::Parameters;

/// Longest duration, in seconds, reported for a single bucket or contact.
pub const MAX_DURATION_SECS: u32 = 1800;
/// Highest risk score reported upstream.
pub const MAX_RISK_SCORE: u32 = 4096;
/// Highest attenuation value reported upstream.
pub const MAX_ATTENUATION: u32 = 255;
/// Highest transmission risk level reported upstream.
pub const MAX_TRANSMISSION_RISK: u32 = 8;

fn clamp_secs(duration: Duration) -> u32 {
    let secs = duration.as_secs_f64().round();
    secs.min(f64::from(MAX_DURATION_SECS)) as u32
}

/// `yyyy-MM-dd` in UTC.
pub fn utc_day(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadTek {
    /// Base64 of the raw key material.
    pub key_data: String,
    pub rolling_start_number: u32,
    pub rolling_period: u32,
}

impl From<&TemporaryExposureKey> for UploadTek {
    fn from(key: &TemporaryExposureKey) -> Self {
        Self {
            key_data: STANDARD.encode(key.key_data),
            rolling_start_number: key.rolling_start_number,
            rolling_period: key.rolling_period,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadExposureInfo {
    /// `yyyy-MM-dd` of the contact.
    pub date: String,
    pub duration: u32,
    pub attenuation_value: u32,
    pub attenuation_durations: Vec<u32>,
    pub transmission_risk_level: u32,
    pub total_risk_score: u32,
}

impl From<&ExposureInfo> for UploadExposureInfo {
    fn from(info: &ExposureInfo) -> Self {
        Self {
            date: utc_day(info.date),
            duration: clamp_secs(info.duration),
            attenuation_value: u32::from(info.attenuation_value).min(MAX_ATTENUATION),
            attenuation_durations: info
                .duration_by_attenuation_bucket
                .iter()
                .copied()
                .map(clamp_secs)
                .collect(),
            transmission_risk_level: u32::from(info.transmission_risk.to_u8())
                .min(MAX_TRANSMISSION_RISK),
            total_risk_score: u32::from(info.total_risk_score).min(MAX_RISK_SCORE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadSummary {
    /// `yyyy-MM-dd` of the detection run that produced the summary.
    pub date: String,
    pub matched_key_count: u64,
    pub days_since_last_exposure: i32,
    pub attenuation_durations: Vec<u32>,
    pub maximum_risk_score: u32,
    pub exposure_info: Vec<UploadExposureInfo>,
}

impl UploadSummary {
    /// Flatten a native summary and the exposures enumerated with it.
    pub fn from_native(
        summary: &ExposureDetectionSummaryData,
        exposure_info: &[ExposureInfo],
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            date: utc_day(generated_at),
            matched_key_count: summary.matched_key_count,
            days_since_last_exposure: summary.days_since_last_exposure,
            attenuation_durations: summary
                .duration_by_attenuation_bucket
                .iter()
                .copied()
                .map(clamp_secs)
                .collect(),
            maximum_risk_score: u32::from(summary.maximum_risk_score).min(MAX_RISK_SCORE),
            exposure_info: exposure_info.iter().map(UploadExposureInfo::from).collect(),
        }
    }
}

/// Most recent contact day among infos scoring at least `threshold`.
///
/// Dates are `yyyy-MM-dd`, so lexicographic order is chronological.
pub fn most_recent_risky_upload_day(infos: &[UploadExposureInfo], threshold: u32) -> Option<NaiveDate> {
    infos
        .iter()
        .filter(|info| info.total_risk_score >= threshold)
        .map(|info| info.date.as_str())
        .max()
        .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
}

/// Body of a data upload request, already capped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadBody {
    pub teks: Vec<UploadTek>,
    /// Two-letter province code of the user.
    pub province: String,
    pub exposure_detection_summaries: Vec<UploadSummary>,
    pub countries_of_interest: Vec<Country>,
}

impl UploadBody {
    /// Build a body, applying the key cap and the summary/exposure limits.
    pub fn new(
        teks: Vec<UploadTek>,
        province: impl Into<String>,
        summaries: Vec<UploadSummary>,
        countries_of_interest: Vec<Country>,
        limits: &UploadLimits,
    ) -> Self {
        Self {
            teks: cap_keys(teks),
            province: province.into(),
            exposure_detection_summaries: cap_summaries(summaries, limits),
            countries_of_interest,
        }
    }

    /// The largest body an upload under `limits` can carry: every count at
    /// its cap and every number at its widest.
    pub fn maximal(limits: &UploadLimits) -> Self {
        let info = UploadExposureInfo {
            date: "2020-06-01".into(),
            duration: 1800,
            attenuation_value: 255,
            attenuation_durations: vec![1800; 3],
            transmission_risk_level: 8,
            total_risk_score: 4096,
        };
        let per_summary = limits
            .max_exposure_infos
            .div_ceil(limits.max_summaries.max(1));
        let mut remaining = limits.max_exposure_infos;
        let summaries = (0..limits.max_summaries)
            .map(|_| {
                let count = per_summary.min(remaining);
                remaining -= count;
                UploadSummary {
                    date: "2020-06-01".into(),
                    matched_key_count: 999,
                    days_since_last_exposure: 14,
                    attenuation_durations: vec![1800; 3],
                    maximum_risk_score: 4096,
                    exposure_info: vec![info.clone(); count],
                }
            })
            .collect();
        let teks = (0..MAX_KEYS_PER_UPLOAD as u32)
            .map(|i| UploadTek {
                key_data: "AAAAAAAAAAAAAAAAAAAAAA==".into(),
                rolling_start_number: 2_699_000 + i * 144,
                rolling_period: 144,
            })
            .collect();
        Self::new(teks, "RM", summaries, Country::ALL.to_vec(), limits)
    }

    /// The body as request parameters.
    pub fn to_parameters(&self) -> Result<Parameters> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(CoreError::NonObjectBody),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposure::RiskLevel;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn native_info() -> ExposureInfo {
        ExposureInfo {
            date: Utc.with_ymd_and_hms(2020, 6, 14, 23, 59, 0).unwrap(),
            duration: Duration::from_secs(4000),
            attenuation_value: 200,
            duration_by_attenuation_bucket: vec![
                Duration::from_millis(1_499),
                Duration::from_millis(1_500),
                Duration::from_secs(9_999),
            ],
            transmission_risk: RiskLevel::Highest,
            total_risk_score: 255,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn test_tek_key_data_is_base64() {
        let key = TemporaryExposureKey {
            key_data: [0xff; 16],
            rolling_start_number: 2_650_000,
            rolling_period: 144,
            transmission_risk: RiskLevel::Low,
        };
        let tek = UploadTek::from(&key);
        assert_eq!(tek.key_data, "/////////////////////w==");
        assert_eq!(tek.rolling_period, 144);
    }

    #[test]
    fn test_info_clamping_and_rounding() {
        let info = UploadExposureInfo::from(&native_info());
        assert_eq!(info.date, "2020-06-14");
        assert_eq!(info.duration, 1800);
        assert_eq!(info.attenuation_value, 200);
        assert_eq!(info.attenuation_durations, vec![1, 2, 1800]);
        assert_eq!(info.transmission_risk_level, 8);
        assert_eq!(info.total_risk_score, 255);
    }

    #[test]
    fn test_summary_from_native() {
        let data = ExposureDetectionSummaryData {
            matched_key_count: 2,
            days_since_last_exposure: 3,
            duration_by_attenuation_bucket: vec![Duration::from_secs(60); 3],
            maximum_risk_score: 30,
            metadata: BTreeMap::new(),
        };
        let at = Utc.with_ymd_and_hms(2020, 7, 1, 8, 0, 0).unwrap();
        let summary = UploadSummary::from_native(&data, &[native_info()], at);
        assert_eq!(summary.date, "2020-07-01");
        assert_eq!(summary.attenuation_durations, vec![60, 60, 60]);
        assert_eq!(summary.exposure_info.len(), 1);
    }

    #[test]
    fn test_body_field_names() {
        let body = UploadBody::new(
            vec![],
            "RM",
            vec![],
            vec![Country::France],
            &UploadLimits::default(),
        );
        let params = body.to_parameters().unwrap();
        let mut keys: Vec<_> = params.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "countries_of_interest",
                "exposure_detection_summaries",
                "province",
                "teks"
            ]
        );
        assert_eq!(params["countries_of_interest"], serde_json::json!(["FR"]));
    }

    #[test]
    fn test_most_recent_risky_upload_day() {
        let mut a = UploadExposureInfo::from(&native_info());
        a.date = "2020-06-02".into();
        let mut b = a.clone();
        b.date = "2020-06-10".into();
        b.total_risk_score = 1;
        let day = most_recent_risky_upload_day(&[a, b], 4).unwrap();
        assert_eq!(day, NaiveDate::from_ymd_opt(2020, 6, 2).unwrap());
    }
}
