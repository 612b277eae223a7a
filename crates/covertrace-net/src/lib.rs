//! # Covertrace Net
//!
//! Backend access for covertrace.
//!
//! ## Overview
//!
//! Requests are built by `covertrace-core` and executed through the
//! [`Transport`] trait. The [`BackendClient`] knows every backend request
//! (OTP validation, data upload, dummy upload, key index and chunk
//! download) and maps backend error documents onto [`NetworkError`].
//!
//! ## Key Types
//!
//! - [`Transport`] - Executes a built request
//! - [`ReqwestTransport`] - HTTP implementation
//! - [`transport::memory::ScriptedTransport`] - Scripted backend for tests
//! - [`BackendClient`] - Typed client over a transport
//!
//! ## Usage
//!
//! ```rust,no_run
//! use covertrace_net::{BackendClient, BackendConfig, HttpTransportConfig, ReqwestTransport};
//! use covertrace_core::ChunkScope;
//!
//! async fn example() {
//!     let transport = ReqwestTransport::new(HttpTransportConfig::default()).unwrap();
//!     let client = BackendClient::new(transport, BackendConfig::default());
//!
//!     let index = client.keys_index(ChunkScope::Global).await.unwrap();
//!     let chunk = client.download_chunk(ChunkScope::Global, index.newest).await.unwrap();
//! }
//! ```

pub mod client;
pub mod error;
pub mod http;
pub mod transport;

pub use client::{BackendClient, BackendConfig};
pub use error::{ApiError, NetworkError, Result};
pub use http::{HttpTransportConfig, ReqwestTransport};
pub use transport::{Response, Transport};
