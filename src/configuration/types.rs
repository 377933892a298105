use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use crate::error_handling::types::ConfigError;

/// Which status codes make a correlated pair worth writing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StatusFilter {
    /// Every pair is written.
    #[default]
    All,
    /// Only pairs whose response status is in the set are written.
    Codes(BTreeSet<u16>),
}

impl StatusFilter {
    pub fn allows(&self, status: u16) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Codes(codes) => codes.contains(&status),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = ConfigError;

    /// Accepts `ALL` (any case) or a comma-separated list of 3-digit codes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }

        let mut codes = BTreeSet::new();
        for part in s.split(',') {
            let part = part.trim();
            if part.len() != 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ConfigError::BadStatusFilter(format!(
                    "'{}' is not a 3-digit status code (in '{}')",
                    part, s
                )));
            }
            let code: u16 = part
                .parse()
                .map_err(|_| ConfigError::BadStatusFilter(format!("'{}' is not a number", part)))?;
            if !(100..=599).contains(&code) {
                return Err(ConfigError::BadStatusFilter(format!(
                    "{} is outside 100..=599",
                    code
                )));
            }
            codes.insert(code);
        }
        Ok(StatusFilter::Codes(codes))
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => write!(f, "ALL"),
            StatusFilter::Codes(codes) => {
                let list: Vec<String> = codes.iter().map(u16::to_string).collect();
                write!(f, "{}", list.join(","))
            }
        }
    }
}

impl<'de> Deserialize<'de> for StatusFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Which end of a `seq <start>:<end>` range keys a request.
///
/// `Start` pairs a request with a response acknowledging the first byte of
/// the segment; `End` with one acknowledging the byte after it, which is what
/// a live TCP peer sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeqAnchor {
    #[default]
    Start,
    End,
}
