//! # Covertrace Testkit
//!
//! Testing utilities for covertrace.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden size vectors**: Every ingestion request shape at known target sizes
//! - **Generators**: Proptest strategies for upload records and key indices
//! - **Mocks**: An instrumented matching capability and an overlap-detecting lock
//! - **Fixtures**: A scripted backend, an in-memory chunk store and sample data
//!
//! ## Golden Vectors
//!
//! ```rust
//! use covertrace_testkit::vectors::verify_all_vectors;
//!
//! for (name, target, actual) in verify_all_vectors() {
//!     println!("{name}: expected {target} bytes, got {actual}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use covertrace_core::UploadLimits;
//! use covertrace_testkit::generators::UploadShape;
//!
//! proptest! {
//!     #[test]
//!     fn capping_is_idempotent(shape: UploadShape) {
//!         let limits = UploadLimits::default();
//!         let body = shape.body(&limits);
//!         prop_assert!(body.teks.len() <= 14);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use covertrace_core::ChunkScope;
//! use covertrace_testkit::fixtures::TestFixture;
//!
//! # async fn example() {
//! let fixture = TestFixture::new();
//! fixture.publish_chunks(ChunkScope::Global, 1, 3).await;
//! # }
//! ```

pub mod fixtures;
pub mod generators;
pub mod mocks;
pub mod vectors;

pub use fixtures::{fixed_now, TestFixture};
pub use generators::{maximal_upload_body, UploadShape};
pub use mocks::{AssertingLock, MockExposureProvider};
pub use vectors::{all_vectors, build_vector, verify_all_vectors, SizeVector};
