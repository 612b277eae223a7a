//! Bookkeeping carried between detection runs.
//!
//! The executor is stateless; this is where the caller keeps what the next
//! run needs (per-scope cursors, the last detection date) and what a later
//! upload needs (retained positive results). The whole state serializes to
//! JSON so it can be persisted by the host.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

use covertrace_core::{Country, DetectionOutcome, ExposureDetectionSummary, UploadSummary};
use covertrace_detect::ChunkCursors;

/// How long positive results are kept for upload, in days.
pub const RESULT_RETENTION_DAYS: i64 = 14;

/// Debug records kept in the state; older ones are dropped first.
pub const MAX_DEBUG_RECORDS: usize = 100;

/// Whether a run was triggered with the app in foreground or by a background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionKind {
    Foreground,
    Background,
}

/// A detection run that found at least one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositiveExposureResult {
    pub date: DateTime<Utc>,
    pub data: UploadSummary,
}

impl PositiveExposureResult {
    /// `None` unless the outcome ran matching and found something.
    pub fn from_outcome(outcome: &DetectionOutcome) -> Option<Self> {
        match outcome {
            DetectionOutcome::PartialDetection {
                date,
                summary: ExposureDetectionSummary::Matches(data),
                ..
            } => Some(Self {
                date: *date,
                data: UploadSummary::from_native(data, &[], *date),
            }),
            DetectionOutcome::FullDetection {
                date,
                summary: ExposureDetectionSummary::Matches(data),
                exposure_info,
                ..
            } => Some(Self {
                date: *date,
                data: UploadSummary::from_native(data, exposure_info, *date),
            }),
            _ => None,
        }
    }
}

/// Condensed outcome kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DebugResult {
    Skipped,
    Failed {
        error: String,
    },
    Succeeded {
        exposures_count: u64,
        full_detection: bool,
    },
}

impl From<&DetectionOutcome> for DebugResult {
    fn from(outcome: &DetectionOutcome) -> Self {
        match outcome {
            DetectionOutcome::NoDetectionNecessary => DebugResult::Skipped,
            DetectionOutcome::Error(e) => DebugResult::Failed {
                error: e.label().to_string(),
            },
            DetectionOutcome::PartialDetection { summary, .. } => DebugResult::Succeeded {
                exposures_count: summary.matched_key_count(),
                full_detection: false,
            },
            DetectionOutcome::FullDetection { exposure_info, .. } => DebugResult::Succeeded {
                exposures_count: exposure_info.len() as u64,
                full_detection: true,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugRecord {
    pub date: DateTime<Utc>,
    pub kind: DetectionKind,
    pub result: DebugResult,
}

/// Everything the detection flow remembers between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionState {
    /// Latest processed chunk index per scope.
    pub cursors: ChunkCursors,
    /// Date of the most recent run that reached matching.
    pub last_detection_date: Option<DateTime<Utc>>,
    pub recent_positive_results: Vec<PositiveExposureResult>,
    pub countries_of_interest: Vec<Country>,
    pub debug_records: Vec<DebugRecord>,
}

impl DetectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Fold the outcome of a run into the state.
    ///
    /// Cursors and the last detection date only move for runs that reached
    /// matching. Every run leaves a debug record, and only the latest
    /// [`MAX_DEBUG_RECORDS`] are kept.
    pub fn apply_outcome(&mut self, outcome: &DetectionOutcome, kind: DetectionKind, now: DateTime<Utc>) {
        self.debug_records.push(DebugRecord {
            date: now,
            kind,
            result: DebugResult::from(outcome),
        });
        let excess = self.debug_records.len().saturating_sub(MAX_DEBUG_RECORDS);
        self.debug_records.drain(..excess);

        if let Some(result) = PositiveExposureResult::from_outcome(outcome) {
            self.recent_positive_results.push(result);
        }

        if let Some(boundaries) = outcome.boundaries() {
            for (scope, range) in boundaries {
                let cursor = self.cursors.entry(*scope).or_insert(range.last);
                *cursor = (*cursor).max(range.last);
            }
        }

        if let Some(date) = outcome.date() {
            self.last_detection_date = Some(date);
        }
    }

    /// Drop retained results older than the retention period.
    ///
    /// Returns how many were removed.
    pub fn clear_outdated_results(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.recent_positive_results.len();
        let retention = ChronoDuration::days(RESULT_RETENTION_DAYS);
        self.recent_positive_results
            .retain(|result| now.signed_duration_since(result.date) <= retention);
        before - self.recent_positive_results.len()
    }

    /// Summaries to attach to an upload.
    pub fn upload_summaries(&self) -> Vec<UploadSummary> {
        self.recent_positive_results
            .iter()
            .map(|result| result.data.clone())
            .collect()
    }
}
