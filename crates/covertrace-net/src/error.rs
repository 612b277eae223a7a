//! Error types for the network module.
//!
//! The backend reports failures as `{"error_code": int, "message": string}`.
//! Known codes map onto [`NetworkError`] variants; anything that cannot be
//! read at all is treated as a connection failure.

use serde::Deserialize;
use thiserror::Error;

use covertrace_core::CoreError;

/// Errors that can occur while talking to the backend.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The request never produced a readable response.
    #[error("connection error")]
    Connection,

    /// The backend answered with an error code this client does not know.
    #[error("unknown backend error")]
    Unknown,

    #[error("bad request")]
    BadRequest,

    #[error("otp is not authorized")]
    UnauthorizedOtp,

    #[error("batch not found")]
    BatchNotFound,

    #[error("no batches found")]
    NoBatchesFound,

    #[error("otp already authorized")]
    OtpAlreadyAuthorized,

    /// The request could not be built; nothing was sent.
    #[error("request encoding failed: {0}")]
    Encoding(#[from] CoreError),

    /// A success response whose body did not have the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The HTTP client could not be constructed.
    #[error("http client setup failed: {0}")]
    ClientSetup(String),
}

impl NetworkError {
    /// Map a backend error code onto its variant. Unknown codes map to [`NetworkError::Unknown`].
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => NetworkError::Connection,
            1001 => NetworkError::BadRequest,
            1101 => NetworkError::UnauthorizedOtp,
            1300 => NetworkError::BatchNotFound,
            1301 => NetworkError::NoBatchesFound,
            1400 => NetworkError::OtpAlreadyAuthorized,
            _ => NetworkError::Unknown,
        }
    }

    /// The backend code of this error, if it is one the backend can report.
    pub fn code(&self) -> Option<u16> {
        match self {
            NetworkError::Connection => Some(1),
            NetworkError::Unknown => Some(1000),
            NetworkError::BadRequest => Some(1001),
            NetworkError::UnauthorizedOtp => Some(1101),
            NetworkError::BatchNotFound => Some(1300),
            NetworkError::NoBatchesFound => Some(1301),
            NetworkError::OtpAlreadyAuthorized => Some(1400),
            NetworkError::Encoding(_)
            | NetworkError::MalformedResponse(_)
            | NetworkError::ClientSetup(_) => None,
        }
    }

    /// Decode the error carried by a non-success response body.
    pub fn from_response_body(body: &[u8]) -> Self {
        match serde_json::from_slice::<ApiError>(body) {
            Ok(api) => Self::from_code(api.error_code),
            Err(_) => NetworkError::Connection,
        }
    }
}

/// Error document returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiError {
    pub error_code: u16,
    #[serde(default)]
    pub message: String,
}

/// Result type for network operations.
pub type Result<T> = std::result::Result<T, NetworkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_table_roundtrip() {
        for code in [1u16, 1000, 1001, 1101, 1300, 1301, 1400] {
            assert_eq!(NetworkError::from_code(code).code(), Some(code));
        }
    }

    #[test]
    fn test_unknown_code() {
        assert!(matches!(NetworkError::from_code(4242), NetworkError::Unknown));
    }

    #[test]
    fn test_decode_body() {
        let err = NetworkError::from_response_body(
            br#"{"error_code": 1101, "message": "Unauthorized OTP."}"#,
        );
        assert!(matches!(err, NetworkError::UnauthorizedOtp));

        let err = NetworkError::from_response_body(br#"{"error_code": 1400}"#);
        assert!(matches!(err, NetworkError::OtpAlreadyAuthorized));
    }

    #[test]
    fn test_unreadable_body_is_connection() {
        assert!(matches!(
            NetworkError::from_response_body(b""),
            NetworkError::Connection
        ));
        assert!(matches!(
            NetworkError::from_response_body(b"<html>502</html>"),
            NetworkError::Connection
        ));
    }

    #[test]
    fn test_encoding_error_has_no_code() {
        let err = NetworkError::from(CoreError::NonObjectBody);
        assert_eq!(err.code(), None);
    }
}
