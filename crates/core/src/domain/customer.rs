use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Identifier the sales backend assigns to a customer. Always positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct CustomerId(u64);

impl CustomerId {
    pub fn new(raw: i64) -> Result<Self, DomainError> {
        if raw <= 0 {
            return Err(DomainError::InvalidCustomerId(raw));
        }
        Ok(Self(raw as u64))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl TryFrom<i64> for CustomerId {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CustomerId> for i64 {
    fn from(value: CustomerId) -> Self {
        value.0 as i64
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CustomerId {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let raw = trimmed.parse::<i64>().map_err(|_| {
            DomainError::InvariantViolation(format!("`{trimmed}` is not a customer id"))
        })?;
        Self::new(raw)
    }
}

/// One candidate returned by a customer lookup on the sales backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerMatch {
    pub id: CustomerId,
    pub company_name: String,
}
