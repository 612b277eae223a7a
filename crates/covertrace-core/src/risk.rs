//! Weighted-bucket risk scoring.
//!
//! Each contact is placed into one of eight buckets along four axes
//! (attenuation, days since exposure, duration, transmission risk). The
//! configuration assigns a score to every bucket and a weight to every
//! axis; the total risk score is the product of the weighted scores,
//! clamped to a byte.

use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::exposure::{ExposureDetectionSummaryData, ExposureInfo, RiskLevel};

/// Number of buckets along each scoring axis.
pub const BUCKET_COUNT: usize = 8;

/// Risk score from which a contact counts as close.
pub const CLOSE_CONTACT_RISK_THRESHOLD: u8 = 4;

/// Scoring model handed to the matching capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureConfiguration {
    /// dBm thresholds splitting `duration_by_attenuation_bucket`.
    pub attenuation_thresholds: Vec<i32>,
    pub attenuation_bucket_scores: Vec<u8>,
    pub attenuation_weight: f64,
    pub days_since_last_exposure_bucket_scores: Vec<u8>,
    pub days_since_last_exposure_weight: f64,
    pub duration_bucket_scores: Vec<u8>,
    pub duration_weight: f64,
    pub transmission_risk_bucket_scores: Vec<u8>,
    pub transmission_risk_weight: f64,
    /// Contacts scoring below this are not reported at all.
    pub minimum_risk_score: u8,
}

impl Default for ExposureConfiguration {
    fn default() -> Self {
        Self {
            attenuation_thresholds: vec![50, 70],
            attenuation_bucket_scores: vec![0, 5, 5, 5, 5, 5, 5, 5],
            attenuation_weight: 1.0,
            days_since_last_exposure_bucket_scores: vec![1; BUCKET_COUNT],
            days_since_last_exposure_weight: 1.0,
            duration_bucket_scores: vec![0, 0, 0, 0, 5, 5, 5, 5],
            duration_weight: 1.0,
            transmission_risk_bucket_scores: vec![1; BUCKET_COUNT],
            transmission_risk_weight: 1.0,
            minimum_risk_score: 1,
        }
    }
}

impl ExposureConfiguration {
    /// Total risk score of a contact with the given characteristics.
    pub fn total_risk_score(
        &self,
        attenuation_value: u8,
        days_since_last_exposure: i32,
        duration: Duration,
        transmission_risk: RiskLevel,
    ) -> u8 {
        let factors = [
            weighted(
                &self.attenuation_bucket_scores,
                attenuation_bucket(attenuation_value),
                self.attenuation_weight,
            ),
            weighted(
                &self.days_since_last_exposure_bucket_scores,
                days_bucket(days_since_last_exposure),
                self.days_since_last_exposure_weight,
            ),
            weighted(
                &self.duration_bucket_scores,
                duration_bucket(duration),
                self.duration_weight,
            ),
            weighted(
                &self.transmission_risk_bucket_scores,
                transmission_bucket(transmission_risk),
                self.transmission_risk_weight,
            ),
        ];
        let product: f64 = factors.iter().product();
        product.round().clamp(0.0, f64::from(u8::MAX)) as u8
    }

    /// Whether a score is high enough to be reported.
    pub fn is_reportable(&self, score: u8) -> bool {
        score >= self.minimum_risk_score
    }
}

fn weighted(scores: &[u8], bucket: usize, weight: f64) -> f64 {
    f64::from(scores.get(bucket).copied().unwrap_or(0)) * weight
}

/// Attenuation bucket: stronger signal (lower attenuation) lands higher.
pub fn attenuation_bucket(attenuation: u8) -> usize {
    match attenuation {
        74.. => 0,
        64..=73 => 1,
        52..=63 => 2,
        34..=51 => 3,
        28..=33 => 4,
        16..=27 => 5,
        11..=15 => 6,
        _ => 7,
    }
}

/// Days-since-exposure bucket: more recent lands higher.
pub fn days_bucket(days: i32) -> usize {
    match days {
        14.. => 0,
        12..=13 => 1,
        10..=11 => 2,
        8..=9 => 3,
        6..=7 => 4,
        4..=5 => 5,
        2..=3 => 6,
        _ => 7,
    }
}

/// Duration bucket in 5-minute steps; zero duration is its own bucket.
pub fn duration_bucket(duration: Duration) -> usize {
    if duration.is_zero() {
        return 0;
    }
    let minutes = duration.as_secs_f64() / 60.0;
    let step = (minutes / 5.0).ceil() as usize;
    step.clamp(1, BUCKET_COUNT - 1)
}

/// Transmission risk bucket; levels above the table share the last bucket.
pub fn transmission_bucket(level: RiskLevel) -> usize {
    usize::from(level.to_u8()).min(BUCKET_COUNT - 1)
}

pub fn is_close_contact(score: u8) -> bool {
    score >= CLOSE_CONTACT_RISK_THRESHOLD
}

impl ExposureInfo {
    pub fn is_close_contact(&self) -> bool {
        is_close_contact(self.total_risk_score)
    }
}

impl ExposureDetectionSummaryData {
    pub fn is_close_contact(&self) -> bool {
        is_close_contact(self.maximum_risk_score)
    }
}

/// Most recent day of a contact scoring at least `threshold`.
pub fn most_recent_risky_contact_day(infos: &[ExposureInfo], threshold: u8) -> Option<NaiveDate> {
    infos
        .iter()
        .filter(|info| info.total_risk_score >= threshold)
        .map(|info| info.date.date_naive())
        .max()
}
