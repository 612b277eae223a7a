//! Terminal result of one exposure detection run.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::country::Country;
use crate::error::CoreError;
use crate::exposure::{ExposureDetectionSummary, ExposureInfo};

/// Which key feed a chunk belongs to.
///
/// Serialized as `"global"` or the country code, so it can key JSON maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChunkScope {
    /// The home backend's own feed.
    Global,
    /// A federated country's feed.
    Country(Country),
}

impl fmt::Display for ChunkScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkScope::Global => f.write_str("global"),
            ChunkScope::Country(c) => write!(f, "{}", c),
        }
    }
}

impl FromStr for ChunkScope {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "global" {
            return Ok(ChunkScope::Global);
        }
        s.parse().map(ChunkScope::Country)
    }
}

impl Serialize for ChunkScope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChunkScope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Inclusive range of chunk indices processed for one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkRange {
    pub first: i64,
    pub last: i64,
}

impl ChunkRange {
    pub const fn single(index: i64) -> Self {
        Self {
            first: index,
            last: index,
        }
    }

    /// Widen the range to cover `index`.
    pub fn include(&mut self, index: i64) {
        self.first = self.first.min(index);
        self.last = self.last.max(index);
    }
}

/// Processed chunk ranges, per scope.
pub type ChunkBoundaries = BTreeMap<ChunkScope, ChunkRange>;

/// Compute boundaries from the `(scope, index)` pairs of processed chunks.
pub fn chunk_boundaries<I>(chunks: I) -> ChunkBoundaries
where
    I: IntoIterator<Item = (ChunkScope, i64)>,
{
    let mut boundaries = ChunkBoundaries::new();
    for (scope, index) in chunks {
        boundaries
            .entry(scope)
            .and_modify(|r| r.include(index))
            .or_insert_with(|| ChunkRange::single(index));
    }
    boundaries
}

/// Why a detection run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum DetectionError {
    #[error("detection timed out")]
    Timeout,

    #[error("exposure notifications are not authorized")]
    NotAuthorized,

    #[error("unable to retrieve key chunks")]
    UnableToRetrieveKeys,

    #[error("unable to retrieve authorization status")]
    UnableToRetrieveStatus,

    #[error("unable to retrieve detection summary")]
    UnableToRetrieveSummary,

    #[error("unable to retrieve exposure info")]
    UnableToRetrieveExposureInfo,
}

impl DetectionError {
    pub const ALL: [DetectionError; 6] = [
        DetectionError::Timeout,
        DetectionError::NotAuthorized,
        DetectionError::UnableToRetrieveKeys,
        DetectionError::UnableToRetrieveStatus,
        DetectionError::UnableToRetrieveSummary,
        DetectionError::UnableToRetrieveExposureInfo,
    ];

    /// Stable label used when the error is persisted.
    pub const fn label(&self) -> &'static str {
        match self {
            DetectionError::Timeout => "timeout",
            DetectionError::NotAuthorized => "notAuthorized",
            DetectionError::UnableToRetrieveKeys => "unableToRetrieveKeys",
            DetectionError::UnableToRetrieveStatus => "unableToRetrieveStatus",
            DetectionError::UnableToRetrieveSummary => "unableToRetrieveSummary",
            DetectionError::UnableToRetrieveExposureInfo => "unableToRetrieveExposureInfo",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.label() == label)
    }

    /// Permission problems need the user; everything else may clear up by itself.
    pub const fn is_transient(&self) -> bool {
        !matches!(self, DetectionError::NotAuthorized)
    }
}

/// The single terminal result of an executor run.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    /// Throttled, or nothing new to evaluate.
    NoDetectionNecessary,

    /// Matching ran but per-contact details were not enumerated.
    PartialDetection {
        date: DateTime<Utc>,
        summary: ExposureDetectionSummary,
        boundaries: ChunkBoundaries,
        /// Number of key chunks handed to matching.
        processed_key_count: usize,
    },

    /// Matching ran and per-contact details were enumerated.
    FullDetection {
        date: DateTime<Utc>,
        summary: ExposureDetectionSummary,
        exposure_info: Vec<ExposureInfo>,
        boundaries: ChunkBoundaries,
        processed_key_count: usize,
    },

    Error(DetectionError),
}

impl DetectionOutcome {
    /// Chunk ranges consumed by the run, if it processed any.
    pub fn boundaries(&self) -> Option<&ChunkBoundaries> {
        match self {
            DetectionOutcome::PartialDetection { boundaries, .. }
            | DetectionOutcome::FullDetection { boundaries, .. } => Some(boundaries),
            DetectionOutcome::NoDetectionNecessary | DetectionOutcome::Error(_) => None,
        }
    }

    pub fn summary(&self) -> Option<&ExposureDetectionSummary> {
        match self {
            DetectionOutcome::PartialDetection { summary, .. }
            | DetectionOutcome::FullDetection { summary, .. } => Some(summary),
            DetectionOutcome::NoDetectionNecessary | DetectionOutcome::Error(_) => None,
        }
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        match self {
            DetectionOutcome::PartialDetection { date, .. }
            | DetectionOutcome::FullDetection { date, .. } => Some(*date),
            DetectionOutcome::NoDetectionNecessary | DetectionOutcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<DetectionError> {
        match self {
            DetectionOutcome::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Whether matching actually ran.
    pub fn is_successful(&self) -> bool {
        matches!(
            self,
            DetectionOutcome::PartialDetection { .. } | DetectionOutcome::FullDetection { .. }
        )
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DetectionOutcome::NoDetectionNecessary => "no_detection_necessary",
            DetectionOutcome::PartialDetection { .. } => "partial_detection",
            DetectionOutcome::FullDetection { .. } => "full_detection",
            DetectionOutcome::Error(_) => "error",
        }
    }
}

impl From<DetectionError> for DetectionOutcome {
    fn from(e: DetectionError) -> Self {
        DetectionOutcome::Error(e)
    }
}
