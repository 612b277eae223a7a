//! Outbound request shapes.
//!
//! The ingestion requests (OTP validation, CUN validation, data upload and
//! dummy upload) are padded through [`PaddedRequestEncoder`] to one shared target
//! size, so they cannot be told apart by length. Key downloads are plain
//! GETs and are not padded.

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::Serialize;

use crate::capper::UploadLimits;
use crate::country::Country;
use crate::error::{CoreError, Result};
use crate::otp::{Cun, Otp};
use crate::padding::PaddedRequestEncoder;
use crate::upload::UploadBody;
use crate::wire::{HttpMethod, Parameters, RequestFrame};

/// Backend paths and default hosts.
pub mod endpoints {
    use crate::country::Country;

    pub const INGESTION_BASE_URL: &str = "https://upload.immuni.gov.it";
    pub const KEYS_BASE_URL: &str = "https://get.immuni.gov.it";

    pub const CHECK_OTP: &str = "/v1/ingestion/check-otp";
    pub const CHECK_CUN: &str = "/v1/ingestion/check-cun";
    pub const UPLOAD: &str = "/v1/ingestion/upload";

    pub fn keys_index(country: Option<Country>) -> String {
        match country {
            None => "/v1/keys/index".to_string(),
            Some(c) => format!("/v1/keys/eu/{}/index", c.code()),
        }
    }

    pub fn keys_chunk(country: Option<Country>, index: i64) -> String {
        match country {
            None => format!("/v1/keys/{index}"),
            Some(c) => format!("/v1/keys/eu/{}/{index}", c.code()),
        }
    }
}

/// Header names and the header sets attached to each request family.
pub mod headers {
    use crate::wire::Header;

    pub const USER_AGENT: &str = "User-Agent";
    pub const ACCEPT_LANGUAGE: &str = "Accept-Language";
    pub const ACCEPT_ENCODING: &str = "Accept-Encoding";
    pub const AUTHORIZATION: &str = "Authorization";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const DUMMY_DATA: &str = "Immuni-Dummy-Data";
    pub const CLIENT_CLOCK: &str = "Immuni-Client-Clock";

    pub const USER_AGENT_VALUE: &str = "Immuni";
    pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

    /// Headers every request carries.
    pub fn common() -> Vec<Header> {
        vec![
            Header::new(USER_AGENT, USER_AGENT_VALUE),
            Header::new(ACCEPT_LANGUAGE, "en-US;q=1.0"),
            Header::new(ACCEPT_ENCODING, "br;q=1.0"),
        ]
    }

    /// Full header set of an ingestion request, in wire order.
    pub fn ingestion(bearer: &str, is_dummy: bool, clock: &str) -> Vec<Header> {
        let mut headers = common();
        headers.extend([
            Header::new(AUTHORIZATION, format!("Bearer {bearer}")),
            Header::new(CONTENT_TYPE, JSON_CONTENT_TYPE),
            Header::new(DUMMY_DATA, if is_dummy { "1" } else { "0" }),
            Header::new(CLIENT_CLOCK, clock),
        ]);
        headers
    }
}

/// A fully built request: frame plus body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRequest {
    pub frame: RequestFrame,
    pub body: Bytes,
}

impl WireRequest {
    /// Bytes taken by the method, URL, headers and body.
    pub fn wire_size(&self) -> usize {
        self.frame.framing_size() + self.body.len()
    }
}

/// A request shape that is padded to a shared target size.
pub trait PaddedRequest {
    /// Method, URL and headers under `base_url`.
    fn frame(&self, base_url: &str) -> RequestFrame;

    /// Declared body fields, without padding.
    fn parameters(&self) -> Result<Parameters>;

    /// Smallest target size this request fits in.
    fn minimum_size(&self, base_url: &str) -> Result<usize> {
        PaddedRequestEncoder::minimum_size(&self.frame(base_url), &self.parameters()?)
    }

    fn build(&self, base_url: &str, target_size: usize) -> Result<WireRequest>
    where
        Self: Sized,
    {
        self.build_with_rng(base_url, target_size, &mut rand::thread_rng())
    }

    fn build_with_rng<R: Rng>(
        &self,
        base_url: &str,
        target_size: usize,
        rng: &mut R,
    ) -> Result<WireRequest>
    where
        Self: Sized,
    {
        let frame = self.frame(base_url);
        let body =
            PaddedRequestEncoder::new(target_size).encode_with_rng(&frame, self.parameters()?, rng)?;
        Ok(WireRequest { frame, body })
    }
}

fn clock(now: DateTime<Utc>) -> String {
    now.timestamp().to_string()
}

/// Asks the backend to authorize an OTP.
#[derive(Debug, Clone)]
pub struct OtpValidationRequest {
    pub otp: Otp,
    pub now: DateTime<Utc>,
}

impl OtpValidationRequest {
    pub fn new(otp: Otp, now: DateTime<Utc>) -> Self {
        Self { otp, now }
    }
}

impl PaddedRequest for OtpValidationRequest {
    fn frame(&self, base_url: &str) -> RequestFrame {
        RequestFrame::new(HttpMethod::Post, base_url, endpoints::CHECK_OTP).with_headers(
            headers::ingestion(&self.otp.bearer_token(), false, &clock(self.now)),
        )
    }

    fn parameters(&self) -> Result<Parameters> {
        Ok(Parameters::new())
    }
}

/// Body of a CUN validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CunValidationBody {
    /// Last digits of the user's health insurance card.
    pub last_his_number: String,
    /// Serialized as `yyyy-MM-dd`.
    pub symptoms_started_on: NaiveDate,
}

/// Asks the backend to authorize a CUN.
#[derive(Debug, Clone)]
pub struct CunValidationRequest {
    pub body: CunValidationBody,
    pub cun: Cun,
    pub now: DateTime<Utc>,
}

impl CunValidationRequest {
    pub fn new(
        cun: Cun,
        last_his_number: impl Into<String>,
        symptoms_started_on: NaiveDate,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            body: CunValidationBody {
                last_his_number: last_his_number.into(),
                symptoms_started_on,
            },
            cun,
            now,
        }
    }
}

impl PaddedRequest for CunValidationRequest {
    fn frame(&self, base_url: &str) -> RequestFrame {
        RequestFrame::new(HttpMethod::Post, base_url, endpoints::CHECK_CUN).with_headers(
            headers::ingestion(&self.cun.bearer_token(), false, &clock(self.now)),
        )
    }

    fn parameters(&self) -> Result<Parameters> {
        match serde_json::to_value(&self.body)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(CoreError::NonObjectBody),
        }
    }
}

/// Uploads keys and exposure summaries under an authorized OTP.
#[derive(Debug, Clone)]
pub struct DataUploadRequest {
    pub body: UploadBody,
    pub otp: Otp,
    pub now: DateTime<Utc>,
}

impl DataUploadRequest {
    pub fn new(body: UploadBody, otp: Otp, now: DateTime<Utc>) -> Self {
        Self { body, otp, now }
    }
}

impl PaddedRequest for DataUploadRequest {
    fn frame(&self, base_url: &str) -> RequestFrame {
        RequestFrame::new(HttpMethod::Post, base_url, endpoints::UPLOAD).with_headers(
            headers::ingestion(&self.otp.bearer_token(), false, &clock(self.now)),
        )
    }

    fn parameters(&self) -> Result<Parameters> {
        self.body.to_parameters()
    }
}

/// Cover traffic sent to the upload endpoint.
///
/// The bearer is derived from a throwaway random code so it has the same
/// length as a genuine one; the clock is always `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DummyIngestionRequest {
    bearer: String,
}

impl DummyIngestionRequest {
    pub fn new() -> Self {
        Self::with_rng(&mut rand::thread_rng())
    }

    pub fn with_rng<R: Rng>(rng: &mut R) -> Self {
        Self {
            bearer: Otp::generate_with_rng(rng).bearer_token(),
        }
    }

    pub fn bearer(&self) -> &str {
        &self.bearer
    }
}

impl Default for DummyIngestionRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl PaddedRequest for DummyIngestionRequest {
    fn frame(&self, base_url: &str) -> RequestFrame {
        RequestFrame::new(HttpMethod::Post, base_url, endpoints::UPLOAD)
            .with_headers(headers::ingestion(&self.bearer, true, "0"))
    }

    fn parameters(&self) -> Result<Parameters> {
        Ok(Parameters::new())
    }
}

/// Smallest shared target size that fits both payload-free ingestion shapes.
pub fn minimum_ingestion_target_size(base_url: &str, now: DateTime<Utc>) -> Result<usize> {
    let otp = OtpValidationRequest::new(Otp::generate(), now).minimum_size(base_url)?;
    let dummy = DummyIngestionRequest::new().minimum_size(base_url)?;
    Ok(otp.max(dummy))
}

/// Smallest target size that fits a data upload at every cap of `limits`.
pub fn maximal_upload_target_size(
    base_url: &str,
    limits: &UploadLimits,
    now: DateTime<Utc>,
) -> Result<usize> {
    DataUploadRequest::new(UploadBody::maximal(limits), Otp::generate(), now).minimum_size(base_url)
}

/// Unpadded key download requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeysRequest {
    Index { country: Option<Country> },
    Chunk { country: Option<Country>, index: i64 },
}

impl KeysRequest {
    pub fn path(&self) -> String {
        match *self {
            KeysRequest::Index { country } => endpoints::keys_index(country),
            KeysRequest::Chunk { country, index } => endpoints::keys_chunk(country, index),
        }
    }

    pub fn frame(&self, base_url: &str) -> RequestFrame {
        RequestFrame::new(HttpMethod::Get, base_url, &self.path()).with_headers(headers::common())
    }

    pub fn build(&self, base_url: &str) -> WireRequest {
        WireRequest {
            frame: self.frame(base_url),
            body: Bytes::new(),
        }
    }
}
