//! One-time codes authorizing a data upload.
//!
//! A code is nine random characters followed by a check character. The
//! check character weights each position with one of two tables (odd and
//! even positions, counted from one), sums the weights and indexes the
//! alphabet with the sum modulo its length.
//!
//! A CUN is a code issued by the health service instead. It carries no check
//! character and is hashed with a `CUN-` prefix.

use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};

/// Length of a generated code, check character included.
pub const OTP_LENGTH: usize = 10;

/// Characters a generated code is drawn from. Ambiguous glyphs are excluded.
pub const OTP_ALPHABET: &[u8; 25] = b"AEFHIJKLQRSUWXYZ123456789";

const ODD_DIGITS: [u32; 10] = [1, 0, 5, 7, 9, 13, 15, 17, 19, 21];
const ODD_LETTERS: [u32; 26] = [
    1, 0, 5, 7, 9, 13, 15, 17, 19, 21, 2, 4, 18, 20, 11, 3, 6, 8, 12, 14, 16, 10, 22, 25, 24, 23,
];

fn odd_weight(c: u8) -> Option<u32> {
    match c {
        b'0'..=b'9' => Some(ODD_DIGITS[usize::from(c - b'0')]),
        b'A'..=b'Z' => Some(ODD_LETTERS[usize::from(c - b'A')]),
        _ => None,
    }
}

fn even_weight(c: u8) -> Option<u32> {
    match c {
        b'0'..=b'9' => Some(u32::from(c - b'0')),
        b'A'..=b'Z' => Some(u32::from(c - b'A')),
        _ => None,
    }
}

/// Check character for `code`, or `None` if it contains characters outside the tables.
pub fn check_character(code: &[u8]) -> Option<u8> {
    let mut sum = 0u32;
    for (i, &c) in code.iter().enumerate() {
        let weight = if (i + 1) % 2 == 0 {
            even_weight(c)
        } else {
            odd_weight(c)
        };
        sum += weight?;
    }
    Some(OTP_ALPHABET[sum as usize % OTP_ALPHABET.len()])
}

/// A verified one-time code.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Otp(String);

impl Otp {
    /// Generate a fresh random code.
    pub fn generate() -> Self {
        Self::generate_with_rng(&mut rand::thread_rng())
    }

    pub fn generate_with_rng<R: Rng>(rng: &mut R) -> Self {
        let mut code: Vec<u8> = (0..OTP_LENGTH - 1)
            .filter_map(|_| OTP_ALPHABET.choose(rng).copied())
            .collect();
        // Every alphabet character has a weight in both tables.
        if let Some(check) = check_character(&code) {
            code.push(check);
        }
        Self(code.into_iter().map(char::from).collect())
    }

    /// Parse and verify a code typed by the user.
    pub fn parse(raw: &str) -> Result<Self> {
        let upper = raw.trim().to_ascii_uppercase();
        let bytes = upper.as_bytes();
        if bytes.len() < 2 {
            return Err(CoreError::InvalidOtp("too short".into()));
        }

        let (code, check) = bytes.split_at(bytes.len() - 1);
        match check_character(code) {
            Some(expected) if expected == check[0] => Ok(Self(upper)),
            Some(_) => Err(CoreError::InvalidOtp("check character mismatch".into())),
            None => Err(CoreError::InvalidOtp("unexpected character".into())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The code split 3/4/3 for display.
    pub fn code_parts(&self) -> [&str; 3] {
        let third = OTP_LENGTH / 3;
        let len = self.0.len();
        if len < 2 * third {
            return [self.0.as_str(), "", ""];
        }
        [
            &self.0[..third],
            &self.0[third..len - third],
            &self.0[len - third..],
        ]
    }

    /// Lowercase hex SHA-256 of the code, used as the bearer token.
    pub fn bearer_token(&self) -> String {
        hex::encode(Sha256::digest(self.0.as_bytes()))
    }
}

/// Prefix hashed in front of a CUN to form its bearer token.
pub const CUN_PREFIX: &str = "CUN-";

/// A code issued by the health service, validated by the backend only.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Cun(String);

impl Cun {
    /// Accept a code typed by the user: non-empty, ASCII letters and digits.
    pub fn parse(raw: &str) -> Result<Self> {
        let code = raw.trim().to_ascii_uppercase();
        if code.is_empty() {
            return Err(CoreError::InvalidOtp("empty cun".into()));
        }
        if !code.bytes().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CoreError::InvalidOtp("unexpected character in cun".into()));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase hex SHA-256 of `CUN-` followed by the code.
    pub fn bearer_token(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(CUN_PREFIX.as_bytes());
        hasher.update(self.0.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Debug for Cun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cun({}***)", &self.0[..self.0.len().min(3)])
    }
}

impl FromStr for Cun {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Debug for Otp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Otp({}***)", &self.0[..self.0.len().min(3)])
    }
}

impl fmt::Display for Otp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Otp {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
