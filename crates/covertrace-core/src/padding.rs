//! Fixed-size request padding.
//!
//! Every padded request carries a `"padding"` string field sized so that the
//! whole request (method, URL, headers and body) is exactly `target_size`
//! bytes. The padding length is derived from the unpadded size plus the
//! fixed overhead of the field itself, so the field is never re-measured
//! after insertion.
//!
//! ## Overhead
//!
//! ```text
//! {}             -> {"padding":"xxxx"}        overhead = 12
//! {"a":1}        -> {"a":1,"padding":"xxxx"}  overhead = 13 (extra comma)
//! ```

use bytes::Bytes;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::wire::{compute_base_size, json_bytes, Parameters, RequestFrame};

/// Name of the body field holding the padding string.
pub const PADDING_KEY: &str = "padding";

/// Bytes the padding field adds to a body besides its content.
///
/// `"padding":""` is the key and value quotes plus the colon; a comma is
/// needed when the object already has fields.
pub fn padding_overhead(parameters: &Parameters) -> usize {
    let field = PADDING_KEY.len() + 5;
    if parameters.is_empty() {
        field
    } else {
        field + 1
    }
}

/// Random ASCII alphanumeric string of exactly `len` bytes.
pub fn random_padding<R: Rng>(rng: &mut R, len: usize) -> String {
    (0..len).map(|_| char::from(rng.sample(Alphanumeric))).collect()
}

/// Pads request bodies to a fixed total wire size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaddedRequestEncoder {
    target_size: usize,
}

impl PaddedRequestEncoder {
    pub const fn new(target_size: usize) -> Self {
        Self { target_size }
    }

    pub const fn target_size(&self) -> usize {
        self.target_size
    }

    /// Smallest target size that can carry `frame` with `parameters`.
    pub fn minimum_size(frame: &RequestFrame, parameters: &Parameters) -> Result<usize> {
        if parameters.contains_key(PADDING_KEY) {
            return Err(CoreError::ReservedField(PADDING_KEY));
        }
        Ok(compute_base_size(frame, parameters)? + padding_overhead(parameters))
    }

    /// Length of the padding string that brings the request to the target size.
    pub fn padding_len(&self, frame: &RequestFrame, parameters: &Parameters) -> Result<usize> {
        let required = Self::minimum_size(frame, parameters)?;
        self.target_size
            .checked_sub(required)
            .ok_or(CoreError::PaddingOverflow {
                target_size: self.target_size,
                required,
            })
    }

    /// Pad `parameters` and serialize them into the request body.
    pub fn encode(&self, frame: &RequestFrame, parameters: Parameters) -> Result<Bytes> {
        self.encode_with_rng(frame, parameters, &mut rand::thread_rng())
    }

    /// Like [`encode`](Self::encode), drawing padding characters from `rng`.
    ///
    /// A zero-length padding is still emitted as `"padding":""`, never
    /// omitted. [`minimum_size`](Self::minimum_size) always counts the
    /// field's overhead (key, quotes, colon and any comma), so a body that
    /// dropped the field at length 0 would come out that many bytes short
    /// of `target_size`.
    pub fn encode_with_rng<R: Rng>(
        &self,
        frame: &RequestFrame,
        mut parameters: Parameters,
        rng: &mut R,
    ) -> Result<Bytes> {
        let len = self.padding_len(frame, &parameters)?;
        parameters.insert(
            PADDING_KEY.to_string(),
            Value::String(random_padding(rng, len)),
        );

        let body = json_bytes(&parameters)?;
        debug_assert_eq!(frame.framing_size() + body.len(), self.target_size);
        Ok(Bytes::from(body))
    }
}

/// Pad `parameters` so that `frame` plus the returned body is `target_size` bytes.
pub fn encode(frame: &RequestFrame, parameters: Parameters, target_size: usize) -> Result<Bytes> {
    PaddedRequestEncoder::new(target_size).encode(frame, parameters)
}
