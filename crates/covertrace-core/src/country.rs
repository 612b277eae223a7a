//! Countries whose key feeds can be followed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A country participating in key exchange, identified by its ISO 3166 alpha-2 code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Country {
    #[serde(rename = "IT")]
    Italy,
    #[serde(rename = "FR")]
    France,
    #[serde(rename = "ES")]
    Spain,
    #[serde(rename = "DE")]
    Germany,
    #[serde(rename = "RU")]
    Russia,
    #[serde(rename = "AT")]
    Austria,
    #[serde(rename = "CH")]
    Switzerland,
    #[serde(rename = "PT")]
    Portugal,
    #[serde(rename = "NL")]
    Netherlands,
    #[serde(rename = "BE")]
    Belgium,
    #[serde(rename = "AL")]
    Albania,
    #[serde(rename = "GR")]
    Greece,
    #[serde(rename = "HR")]
    Croatia,
    #[serde(rename = "HU")]
    Hungary,
}

impl Country {
    pub const ALL: [Country; 14] = [
        Country::Italy,
        Country::France,
        Country::Spain,
        Country::Germany,
        Country::Russia,
        Country::Austria,
        Country::Switzerland,
        Country::Portugal,
        Country::Netherlands,
        Country::Belgium,
        Country::Albania,
        Country::Greece,
        Country::Croatia,
        Country::Hungary,
    ];

    pub const fn code(&self) -> &'static str {
        match self {
            Country::Italy => "IT",
            Country::France => "FR",
            Country::Spain => "ES",
            Country::Germany => "DE",
            Country::Russia => "RU",
            Country::Austria => "AT",
            Country::Switzerland => "CH",
            Country::Portugal => "PT",
            Country::Netherlands => "NL",
            Country::Belgium => "BE",
            Country::Albania => "AL",
            Country::Greece => "GR",
            Country::Croatia => "HR",
            Country::Hungary => "HU",
        }
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Country {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Country::ALL
            .iter()
            .copied()
            .find(|c| c.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::UnknownCountry(s.to_string()))
    }
}
