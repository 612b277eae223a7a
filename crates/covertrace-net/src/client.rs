//! Backend client issuing every catalog request.
//!
//! Ingestion requests are padded to the configured target size before they
//! reach the transport; a request that cannot be padded fails with
//! [`NetworkError::Encoding`] and is never sent.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};

use covertrace_core::catalog::{
    endpoints, CunValidationRequest, DataUploadRequest, DummyIngestionRequest,
    OtpValidationRequest, PaddedRequest,
};
use covertrace_core::{
    ChunkScope, Country, Cun, KeysIndex, KeysRequest, Otp, UploadBody, WireRequest,
};

use crate::error::{NetworkError, Result};
use crate::transport::{Response, Transport};

/// Hosts and sizing used by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub ingestion_base_url: String,
    pub keys_base_url: String,
    /// Wire size shared by every ingestion request.
    pub target_size: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            ingestion_base_url: endpoints::INGESTION_BASE_URL.to_string(),
            keys_base_url: endpoints::KEYS_BASE_URL.to_string(),
            target_size: 110_000,
        }
    }
}

fn scope_country(scope: ChunkScope) -> Option<Country> {
    match scope {
        ChunkScope::Global => None,
        ChunkScope::Country(country) => Some(country),
    }
}

/// Client for the ingestion and key distribution backends.
pub struct BackendClient<T: Transport> {
    transport: Arc<T>,
    config: BackendConfig,
}

impl<T: Transport> Clone for BackendClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            config: self.config.clone(),
        }
    }
}

impl<T: Transport> BackendClient<T> {
    pub fn new(transport: T, config: BackendConfig) -> Self {
        Self::with_shared(Arc::new(transport), config)
    }

    /// Build a client over a transport that is also used elsewhere.
    pub fn with_shared(transport: Arc<T>, config: BackendConfig) -> Self {
        Self { transport, config }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Replace the target size, e.g. after a configuration refresh.
    pub fn set_target_size(&mut self, target_size: usize) {
        self.config.target_size = target_size;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ingestion
    // ─────────────────────────────────────────────────────────────────────────

    /// Ask the backend to authorize `otp` for a later upload.
    pub async fn validate_otp(&self, otp: &Otp, now: DateTime<Utc>) -> Result<()> {
        let request = OtpValidationRequest::new(otp.clone(), now)
            .build(&self.config.ingestion_base_url, self.config.target_size)?;
        self.send(request).await?;
        info!("otp validated");
        Ok(())
    }

    /// Ask the backend to authorize a health service `cun`.
    pub async fn validate_cun(
        &self,
        cun: &Cun,
        last_his_number: &str,
        symptoms_started_on: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let request = CunValidationRequest::new(cun.clone(), last_his_number, symptoms_started_on, now)
            .build(&self.config.ingestion_base_url, self.config.target_size)?;
        self.send(request).await?;
        info!("cun validated");
        Ok(())
    }

    /// Upload keys and exposure summaries under an authorized `otp`.
    pub async fn upload_data(&self, body: UploadBody, otp: &Otp, now: DateTime<Utc>) -> Result<()> {
        let teks = body.teks.len();
        let summaries = body.exposure_detection_summaries.len();
        let request = DataUploadRequest::new(body, otp.clone(), now)
            .build(&self.config.ingestion_base_url, self.config.target_size)?;
        self.send(request).await?;
        info!(teks, summaries, "data uploaded");
        Ok(())
    }

    /// Send one cover request to the upload endpoint.
    pub async fn send_dummy_request(&self) -> Result<()> {
        let request = DummyIngestionRequest::new()
            .build(&self.config.ingestion_base_url, self.config.target_size)?;
        self.send(request).await?;
        debug!("dummy request sent");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Key distribution
    // ─────────────────────────────────────────────────────────────────────────

    /// Range of chunk indices currently published for `scope`.
    pub async fn keys_index(&self, scope: ChunkScope) -> Result<KeysIndex> {
        let request = KeysRequest::Index {
            country: scope_country(scope),
        }
        .build(&self.config.keys_base_url);
        let response = self.send(request).await?;
        serde_json::from_slice(&response.body)
            .map_err(|e| NetworkError::MalformedResponse(e.to_string()))
    }

    /// Raw bytes of chunk `index` of `scope`.
    pub async fn download_chunk(&self, scope: ChunkScope, index: i64) -> Result<Bytes> {
        let request = KeysRequest::Chunk {
            country: scope_country(scope),
            index,
        }
        .build(&self.config.keys_base_url);
        let response = self.send(request).await?;
        debug!(%scope, index, bytes = response.body.len(), "chunk downloaded");
        Ok(response.body)
    }

    async fn send(&self, request: WireRequest) -> Result<Response> {
        let response = self.transport.execute(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(NetworkError::from_response_body(&response.body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::{Reply, ScriptedTransport};
    use chrono::TimeZone;
    use covertrace_core::catalog::headers;
    use covertrace_core::UploadLimits;
    use serde_json::json;

    const TARGET: usize = 2_048;

    fn client() -> BackendClient<ScriptedTransport> {
        BackendClient::new(
            ScriptedTransport::new(),
            BackendConfig {
                target_size: TARGET,
                ..BackendConfig::default()
            },
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 6, 15, 10, 0, 0).unwrap()
    }

    fn otp() -> Otp {
        Otp::parse("AEFHIJKLQ7").unwrap()
    }

    fn cun() -> Cun {
        Cun::parse("AEFHIJKLQ7").unwrap()
    }

    fn symptoms_started_on() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 6, 10).unwrap()
    }

    fn ok() -> Reply {
        Reply::Respond(Response::new(200, "{}"))
    }

    #[tokio::test]
    async fn test_ingestion_requests_share_wire_size() {
        let client = client();
        client.transport().on(endpoints::CHECK_OTP, ok()).await;
        client.transport().on(endpoints::UPLOAD, ok()).await;

        client.transport().on(endpoints::CHECK_CUN, ok()).await;

        client.validate_otp(&otp(), now()).await.unwrap();
        client
            .validate_cun(&cun(), "12345678", symptoms_started_on(), now())
            .await
            .unwrap();
        let body = UploadBody::new(vec![], "RM", vec![], vec![], &UploadLimits::default());
        client.upload_data(body, &otp(), now()).await.unwrap();
        client.send_dummy_request().await.unwrap();

        let requests = client.transport().requests().await;
        assert_eq!(requests.len(), 4);
        for request in &requests {
            assert_eq!(request.wire_size(), TARGET);
        }
        assert!(requests[1].frame.url.ends_with(endpoints::CHECK_CUN));
        assert_eq!(requests[3].frame.header(headers::DUMMY_DATA), Some("1"));
    }

    #[tokio::test]
    async fn test_validate_cun_sends_prefixed_bearer() {
        let client = client();
        client.transport().on(endpoints::CHECK_CUN, ok()).await;

        client
            .validate_cun(&cun(), "12345678", symptoms_started_on(), now())
            .await
            .unwrap();

        let requests = client.transport().requests().await;
        let request = &requests[0];
        assert_eq!(
            request.frame.header(headers::AUTHORIZATION),
            Some(format!("Bearer {}", cun().bearer_token()).as_str())
        );
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(body["last_his_number"], "12345678");
        assert_eq!(body["symptoms_started_on"], "2020-06-10");
    }

    #[tokio::test]
    async fn test_rejected_cun_is_mapped() {
        let client = client();
        client
            .transport()
            .on(
                endpoints::CHECK_CUN,
                Reply::Respond(Response::new(
                    401,
                    json!({"error_code": 1101, "message": "Unauthorized OTP."}).to_string(),
                )),
            )
            .await;

        let err = client
            .validate_cun(&cun(), "12345678", symptoms_started_on(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, NetworkError::UnauthorizedOtp));
    }

    #[tokio::test]
    async fn test_backend_error_is_mapped() {
        let client = client();
        client
            .transport()
            .on(
                endpoints::CHECK_OTP,
                Reply::Respond(Response::new(
                    401,
                    json!({"error_code": 1101, "message": "Unauthorized OTP."}).to_string(),
                )),
            )
            .await;

        let err = client.validate_otp(&otp(), now()).await.unwrap_err();
        assert!(matches!(err, NetworkError::UnauthorizedOtp));
    }

    #[tokio::test]
    async fn test_overflow_is_never_sent() {
        let mut client = client();
        client.set_target_size(10);

        let err = client.send_dummy_request().await.unwrap_err();
        assert!(matches!(err, NetworkError::Encoding(_)));
        assert!(client.transport().requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_keys_index_per_scope() {
        let client = client();
        client
            .transport()
            .on(
                "/v1/keys/index",
                Reply::Respond(Response::json(&json!({"oldest": 50, "newest": 60}))),
            )
            .await;
        client
            .transport()
            .on(
                "/v1/keys/eu/DE/index",
                Reply::Respond(Response::json(&json!({"oldest": 1, "newest": 2}))),
            )
            .await;

        let global = client.keys_index(ChunkScope::Global).await.unwrap();
        assert_eq!(global, KeysIndex::new(50, 60));
        let germany = client
            .keys_index(ChunkScope::Country(Country::Germany))
            .await
            .unwrap();
        assert_eq!(germany, KeysIndex::new(1, 2));
    }

    #[tokio::test]
    async fn test_keys_index_malformed() {
        let client = client();
        client
            .transport()
            .on("/v1/keys/index", Reply::Respond(Response::new(200, "[]")))
            .await;
        let err = client.keys_index(ChunkScope::Global).await.unwrap_err();
        assert!(matches!(err, NetworkError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_download_chunk() {
        let client = client();
        client
            .transport()
            .on(
                "/v1/keys/eu/FR/7",
                Reply::Respond(Response::new(200, Bytes::from_static(b"PK"))),
            )
            .await;
        let data = client
            .download_chunk(ChunkScope::Country(Country::France), 7)
            .await
            .unwrap();
        assert_eq!(data, Bytes::from_static(b"PK"));

        let err = client
            .download_chunk(ChunkScope::Global, 8)
            .await
            .unwrap_err();
        assert!(matches!(err, NetworkError::Connection));
    }
}
