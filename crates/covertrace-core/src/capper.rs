//! Bounded selection of upload records.
//!
//! Everything here is a pure, total function: capping may discard data but
//! never fails. Orderings are total and sorts are stable, so the same input
//! always yields the same output and capping is idempotent.

use std::cmp::Reverse;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::upload::{UploadSummary, UploadTek};

/// Number of daily keys the backend expects in an upload.
pub const MAX_KEYS_PER_UPLOAD: usize = 14;

/// Ceilings on the exposure data carried by one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadLimits {
    pub max_summaries: usize,
    pub max_exposure_infos: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_summaries: 84,
            max_exposure_infos: 600,
        }
    }
}

/// Keep the most recent keys, newest first.
pub fn cap_keys(mut keys: Vec<UploadTek>) -> Vec<UploadTek> {
    keys.sort_by_key(|k| Reverse(k.rolling_start_number));
    keys.truncate(MAX_KEYS_PER_UPLOAD);
    keys
}

/// Keep the oldest summaries, then the riskiest exposures across them.
///
/// Exposures are ranked by risk score descending, ties going to the older
/// date. Each kept summary retains its surviving exposures in their
/// original relative order.
pub fn cap_summaries(mut summaries: Vec<UploadSummary>, limits: &UploadLimits) -> Vec<UploadSummary> {
    summaries.sort_by(|a, b| a.date.cmp(&b.date));
    summaries.truncate(limits.max_summaries);

    let mut ranked: Vec<(usize, usize)> = summaries
        .iter()
        .enumerate()
        .flat_map(|(s, summary)| (0..summary.exposure_info.len()).map(move |i| (s, i)))
        .collect();

    if ranked.len() <= limits.max_exposure_infos {
        return summaries;
    }

    ranked.sort_by(|&(sa, ia), &(sb, ib)| {
        let a = &summaries[sa].exposure_info[ia];
        let b = &summaries[sb].exposure_info[ib];
        b.total_risk_score
            .cmp(&a.total_risk_score)
            .then_with(|| a.date.cmp(&b.date))
    });
    let keep: HashSet<(usize, usize)> = ranked
        .into_iter()
        .take(limits.max_exposure_infos)
        .collect();

    for (s, summary) in summaries.iter_mut().enumerate() {
        let mut index = 0;
        summary.exposure_info.retain(|_| {
            let kept = keep.contains(&(s, index));
            index += 1;
            kept
        });
    }
    summaries
}

/// Total number of exposures carried by `summaries`.
pub fn exposure_count(summaries: &[UploadSummary]) -> usize {
    summaries.iter().map(|s| s.exposure_info.len()).sum()
}
