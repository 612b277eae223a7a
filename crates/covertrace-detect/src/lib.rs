//! # Covertrace Detect
//!
//! Exposure detection on top of an opaque matching capability.
//!
//! ## Overview
//!
//! The platform's matching capability is modelled by the
//! [`ExposureNotificationProvider`] trait. Because the capability is a
//! single stateful resource, all access goes through the
//! [`ExposureNotificationManager`], which activates it once and then
//! serializes every call.
//!
//! The [`ExposureDetectionExecutor`] runs one detection cycle: it throttles,
//! checks authorization, fetches key chunks from a [`KeyChunkProvider`],
//! runs matching, decides between a partial and a full detection, and
//! always releases the fetched chunks.
//!
//! ## Key Types
//!
//! - [`ExposureNotificationProvider`] - The capability contract
//! - [`ExposureNotificationManager`] - Serialized access to a provider
//! - [`KeyChunkProvider`] - Supplies key chunks per scope
//! - [`ExposureDetectionExecutor`] - Runs one detection cycle
//!
//! ## Usage
//!
//! ```rust,no_run
//! use covertrace_core::AuthorizationStatus;
//! use covertrace_detect::provider::stub::ExposureNotificationProviderStub;
//! use covertrace_detect::ExposureNotificationManager;
//!
//! async fn example() {
//!     let manager = ExposureNotificationManager::new(ExposureNotificationProviderStub::new(
//!         AuthorizationStatus::AuthorizedAndActive,
//!     ));
//!     let status = manager.start_if_authorized().await.unwrap();
//!     assert!(status.can_perform_detection());
//! }
//! ```

pub mod error;
pub mod executor;
pub mod keys;
pub mod manager;
pub mod provider;

pub use error::{DetectError, Result};
pub use executor::{
    should_retrieve_exposure_info, DetectionRequest, ExecutorConfig, ExposureDetectionExecutor,
};
pub use keys::{ChunkCursors, KeyChunk, KeyChunkProvider};
pub use manager::ExposureNotificationManager;
pub use provider::ExposureNotificationProvider;
