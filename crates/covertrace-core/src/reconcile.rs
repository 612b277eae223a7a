//! Key chunk reconciliation.
//!
//! Decides which server-published chunks still need to be downloaded, given
//! the local high-water mark and the range the server currently advertises.

use serde::{Deserialize, Serialize};

/// Chunks the matching capability accepts per day.
pub const DEFAULT_CHUNK_RATE_LIMIT: usize = 15;

/// Inclusive range of chunk indices published by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeysIndex {
    pub oldest: i64,
    pub newest: i64,
}

impl KeysIndex {
    pub const fn new(oldest: i64, newest: i64) -> Self {
        Self { oldest, newest }
    }
}

/// Ascending chunk indices to fetch, at most `ceiling` of them.
///
/// When more chunks are missing than the ceiling allows, the most recent
/// ones win. The cursor only advances to what was actually processed, so
/// older chunks that still fall inside the published range are picked up by
/// later runs.
pub fn missing_chunk_indices(
    latest_known: Option<i64>,
    index: KeysIndex,
    ceiling: usize,
) -> Vec<i64> {
    if index.newest < index.oldest {
        return Vec::new();
    }

    let first = match latest_known {
        None => index.oldest,
        Some(latest) if latest >= index.newest => return Vec::new(),
        Some(latest) => index.oldest.max(latest + 1),
    };

    let available = (index.newest - first + 1) as u64;
    let skip = available.saturating_sub(ceiling as u64) as i64;
    (first + skip..=index.newest).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(a: i64, b: i64) -> Vec<i64> {
        (a..=b).collect()
    }

    #[test]
    fn test_first_run_takes_whole_range() {
        let indices = missing_chunk_indices(None, KeysIndex::new(50, 60), 15);
        assert_eq!(indices, range(50, 60));
    }

    #[test]
    fn test_resumes_after_cursor() {
        let indices = missing_chunk_indices(Some(55), KeysIndex::new(50, 60), 15);
        assert_eq!(indices, range(56, 60));
    }

    #[test]
    fn test_ceiling_keeps_most_recent() {
        let indices = missing_chunk_indices(Some(55), KeysIndex::new(50, 80), 15);
        assert_eq!(indices, range(66, 80));

        let indices = missing_chunk_indices(Some(55), KeysIndex::new(50, 80), 14);
        assert_eq!(indices, range(67, 80));
    }

    #[test]
    fn test_up_to_date_cursor() {
        assert!(missing_chunk_indices(Some(80), KeysIndex::new(50, 80), 15).is_empty());
        assert!(missing_chunk_indices(Some(99), KeysIndex::new(50, 80), 15).is_empty());
    }

    #[test]
    fn test_cursor_older_than_published_range() {
        let indices = missing_chunk_indices(Some(10), KeysIndex::new(50, 52), 15);
        assert_eq!(indices, range(50, 52));
    }

    #[test]
    fn test_malformed_bounds_yield_nothing() {
        assert!(missing_chunk_indices(None, KeysIndex::new(60, 50), 15).is_empty());
    }

    #[test]
    fn test_zero_ceiling() {
        assert!(missing_chunk_indices(None, KeysIndex::new(1, 5), 0).is_empty());
    }

    #[test]
    fn test_keys_index_json() {
        let index: KeysIndex = serde_json::from_str(r#"{"oldest": 3, "newest": 9}"#).unwrap();
        assert_eq!(index, KeysIndex::new(3, 9));
    }
}
