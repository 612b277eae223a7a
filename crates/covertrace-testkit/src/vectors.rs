//! Golden size vectors.
//!
//! Every ingestion request shape, built at a known target size, must come
//! out at exactly that size on the wire. The vectors cover the smallest and
//! largest shapes the client produces.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

use covertrace_core::catalog::{
    endpoints, CunValidationRequest, DataUploadRequest, DummyIngestionRequest,
    OtpValidationRequest, PaddedRequest,
};
use covertrace_core::{Cun, Otp, UploadBody, UploadLimits, WireRequest};

use crate::fixtures::fixed_now;
use crate::generators::maximal_upload_body;

/// Which request a vector builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestShape {
    OtpValidation,
    CunValidation,
    Dummy,
    EmptyUpload,
    MaximalUpload,
}

/// A golden size vector.
#[derive(Debug, Clone)]
pub struct SizeVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub shape: RequestShape,
    /// Size every encoded request of this vector must have.
    pub target_size: usize,
}

/// Get all golden size vectors.
pub fn all_vectors() -> Vec<SizeVector> {
    let mut vectors = Vec::new();
    for target_size in [110_000, 150_000] {
        vectors.extend([
            SizeVector {
                name: "otp validation",
                shape: RequestShape::OtpValidation,
                target_size,
            },
            SizeVector {
                name: "cun validation",
                shape: RequestShape::CunValidation,
                target_size,
            },
            SizeVector {
                name: "dummy upload",
                shape: RequestShape::Dummy,
                target_size,
            },
            SizeVector {
                name: "upload without keys or summaries",
                shape: RequestShape::EmptyUpload,
                target_size,
            },
            SizeVector {
                name: "upload at every cap",
                shape: RequestShape::MaximalUpload,
                target_size,
            },
        ]);
    }
    vectors
}

fn otp() -> Otp {
    Otp::generate_with_rng(&mut StdRng::seed_from_u64(7))
}

/// Build the request a vector describes, stamped at `now`.
pub fn build_vector(vector: &SizeVector, now: DateTime<Utc>) -> covertrace_core::Result<WireRequest> {
    let base_url = endpoints::INGESTION_BASE_URL;
    match vector.shape {
        RequestShape::OtpValidation => {
            OtpValidationRequest::new(otp(), now).build(base_url, vector.target_size)
        }
        RequestShape::CunValidation => {
            let cun = Cun::parse("Q7WX2ZRE5A")?;
            CunValidationRequest::new(cun, "99999999", now.date_naive(), now)
                .build(base_url, vector.target_size)
        }
        RequestShape::Dummy => DummyIngestionRequest::new().build(base_url, vector.target_size),
        RequestShape::EmptyUpload => {
            let body = UploadBody::new(vec![], "RM", vec![], vec![], &UploadLimits::default());
            DataUploadRequest::new(body, otp(), now).build(base_url, vector.target_size)
        }
        RequestShape::MaximalUpload => {
            let body = maximal_upload_body(&UploadLimits::default());
            DataUploadRequest::new(body, otp(), now).build(base_url, vector.target_size)
        }
    }
}

/// Build every vector and report the ones that missed their size.
///
/// Returns `(name, target_size, actual_size)` for each failure; a build
/// error is reported with an actual size of zero.
pub fn verify_all_vectors() -> Vec<(&'static str, usize, usize)> {
    all_vectors()
        .iter()
        .filter_map(|v| {
            let actual = build_vector(v, fixed_now()).map(|r| r.wire_size()).unwrap_or(0);
            (actual != v.target_size).then_some((v.name, v.target_size, actual))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_hit_their_size() {
        let failures = verify_all_vectors();
        assert!(failures.is_empty(), "size mismatches: {failures:?}");
    }

    #[test]
    fn test_vector_names_unique_per_size() {
        let vectors = all_vectors();
        for target_size in [110_000, 150_000] {
            let mut names: Vec<_> = vectors
                .iter()
                .filter(|v| v.target_size == target_size)
                .map(|v| v.name)
                .collect();
            let total = names.len();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), total);
        }
    }

    #[test]
    fn test_undersized_target_fails() {
        let vector = SizeVector {
            name: "too small",
            shape: RequestShape::OtpValidation,
            target_size: 64,
        };
        assert!(build_vector(&vector, fixed_now()).is_err());
    }
}
