//! Request numbers: `REQ-<year>-<sequence>`
//!
//! The sequence is zero-padded to four digits, strictly increasing within a
//! calendar year and restarts at 1 every January. Allocation itself happens
//! inside the store, behind a single serialization point, so that reading the
//! last value and inserting the new request cannot interleave.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const REQUEST_NUMBER_PREFIX: &str = "REQ";

static REQUEST_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^REQ-(\d{4})-(\d{4,})$").expect("valid regex"));

/// A parsed, human-readable request identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct RequestNumber {
    year: i32,
    sequence: u32,
}

impl RequestNumber {
    pub fn new(year: i32, sequence: u32) -> Result<Self, AppError> {
        if !(1000..=9999).contains(&year) {
            return Err(AppError::Validation(format!("Year {} is not a four-digit year", year)));
        }
        if sequence == 0 {
            return Err(AppError::Validation("Request sequence starts at 1".to_string()));
        }
        Ok(Self { year, sequence })
    }

    /// First number of a calendar year
    pub fn first_of(year: i32) -> Result<Self, AppError> {
        Self::new(year, 1)
    }

    /// Number that follows `last` in `year`; restarts at 1 when `last`
    /// belongs to another year or there is none.
    pub fn next_after(last: Option<&RequestNumber>, year: i32) -> Result<Self, AppError> {
        match last {
            Some(last) if last.year == year => {
                let sequence = last.sequence.checked_add(1).ok_or_else(|| {
                    AppError::Validation(format!("Request sequence for {} is exhausted", year))
                })?;
                Self::new(year, sequence)
            }
            _ => Self::first_of(year),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// `LIKE` pattern selecting every number of a year
    pub fn year_pattern(year: i32) -> String {
        format!("{}-{}-%", REQUEST_NUMBER_PREFIX, year)
    }
}

impl std::fmt::Display for RequestNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{:04}", REQUEST_NUMBER_PREFIX, self.year, self.sequence)
    }
}

impl std::str::FromStr for RequestNumber {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = REQUEST_NUMBER_RE
            .captures(s)
            .ok_or_else(|| AppError::Validation(format!("Malformed request number '{}'", s)))?;

        let year = caps[1]
            .parse()
            .map_err(|_| AppError::Validation(format!("Malformed request number '{}'", s)))?;
        let sequence = caps[2]
            .parse()
            .map_err(|_| AppError::Validation(format!("Request sequence overflow in '{}'", s)))?;

        Self::new(year, sequence)
    }
}

impl From<RequestNumber> for String {
    fn from(number: RequestNumber) -> Self {
        number.to_string()
    }
}

impl TryFrom<String> for RequestNumber {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
