//! # Covertrace
//!
//! The unified API for covertrace: privacy-preserving exposure detection
//! and fixed-size uploads for a contact-tracing client.
//!
//! ## Overview
//!
//! Covertrace provides:
//!
//! - **Detection runs**: download new key chunks, match them through the
//!   platform capability, and decide between a partial and a full result
//! - **Detection state**: per-feed chunk cursors, the last detection date,
//!   retained positive results and debug records
//! - **Uploads**: capped upload bodies sent as requests that all share one
//!   wire size, so genuine and cover traffic look the same
//! - **Dummy traffic**: randomized cover request sequences
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use chrono::Utc;
//! use covertrace::{DetectionTrigger, ExposureService, ServiceConfig};
//! use covertrace::core::AuthorizationStatus;
//! use covertrace::detect::provider::stub::ExposureNotificationProviderStub;
//! use covertrace::net::{HttpTransportConfig, ReqwestTransport};
//! use covertrace::store::FileChunkStore;
//!
//! async fn example() -> covertrace::Result<()> {
//!     let provider = ExposureNotificationProviderStub::new(AuthorizationStatus::Authorized);
//!     let transport = ReqwestTransport::new(HttpTransportConfig::default())?;
//!     let store = FileChunkStore::open("chunks")?;
//!
//!     let service = ExposureService::new(
//!         Arc::new(provider),
//!         Arc::new(transport),
//!         Arc::new(store),
//!         ServiceConfig::default(),
//!     )?;
//!
//!     let outcome = service
//!         .run_detection(DetectionTrigger::background(), Utc::now())
//!         .await;
//!     println!("detection finished: {}", outcome.kind());
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `covertrace::core` - Wire model, padding, capping, reconciliation
//! - `covertrace::store` - Chunk storage
//! - `covertrace::net` - Backend transport and client
//! - `covertrace::detect` - Matching capability, manager and executor

pub mod config;
pub mod dummy;
pub mod error;
pub mod keys;
pub mod service;
pub mod state;

// Re-export component crates
pub use covertrace_core as core;
pub use covertrace_detect as detect;
pub use covertrace_net as net;
pub use covertrace_store as store;

// Re-export main types for convenience
pub use config::Configuration;
pub use dummy::{DummyTrafficPolicy, DummyTrafficSettings, OpportunityWindow};
pub use error::{Result, ServiceError};
pub use keys::{KeyProviderConfig, RemoteKeyChunkProvider};
pub use service::{DetectionTrigger, ExposureService, ServiceConfig};
pub use state::{DebugRecord, DebugResult, DetectionKind, DetectionState, PositiveExposureResult};

// Re-export commonly used core types
pub use covertrace_core::{
    ChunkScope, Country, Cun, DetectionError, DetectionOutcome, ExposureDetectionSummary, Otp,
    UploadBody,
};
