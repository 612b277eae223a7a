//! # Covertrace Core
//!
//! Pure primitives for covertrace: fixed-size request framing, key chunk
//! reconciliation, upload capping and the exposure data model.
//!
//! This crate contains no I/O, no storage, no networking. Every function is
//! a deterministic computation over its inputs (padding content aside).
//!
//! ## Key Types
//!
//! - [`PaddedRequestEncoder`] - Pads request bodies to an exact wire size
//! - [`RequestFrame`] - Method, URL and headers of a request
//! - [`catalog::PaddedRequest`] - The ingestion request shapes sharing one size
//! - [`UploadBody`] - Capped upload payload
//! - [`DetectionOutcome`] - Terminal result of a detection run
//!
//! ## Usage
//!
//! ```rust,no_run
//! use covertrace_core::catalog::{endpoints, DummyIngestionRequest, PaddedRequest};
//!
//! let request = DummyIngestionRequest::new()
//!     .build(endpoints::INGESTION_BASE_URL, 110_000)
//!     .unwrap();
//! assert_eq!(request.wire_size(), 110_000);
//! ```

pub mod capper;
pub mod catalog;
pub mod country;
pub mod error;
pub mod exposure;
pub mod otp;
pub mod outcome;
pub mod padding;
pub mod reconcile;
pub mod risk;
pub mod upload;
pub mod wire;

pub use capper::{cap_keys, cap_summaries, UploadLimits, MAX_KEYS_PER_UPLOAD};
pub use catalog::{CunValidationBody, CunValidationRequest, KeysRequest, WireRequest};
pub use country::Country;
pub use error::{CoreError, Result};
pub use exposure::{
    AuthorizationStatus, ExposureDetectionSummary, ExposureDetectionSummaryData, ExposureInfo,
    RiskLevel, TemporaryExposureKey,
};
pub use otp::{Cun, Otp};
pub use outcome::{
    chunk_boundaries, ChunkBoundaries, ChunkRange, ChunkScope, DetectionError, DetectionOutcome,
};
pub use padding::PaddedRequestEncoder;
pub use reconcile::{missing_chunk_indices, KeysIndex, DEFAULT_CHUNK_RATE_LIMIT};
pub use risk::ExposureConfiguration;
pub use upload::{UploadBody, UploadExposureInfo, UploadSummary, UploadTek};
pub use wire::{compute_base_size, Header, HttpMethod, Parameters, RequestFrame};
