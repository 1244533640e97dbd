use std::fmt::Display;
use std::str::FromStr;

use phonenumber::PhoneNumber;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kenyan country calling code; the only one mobile money payments go to.
const KENYA: u16 = 254;

/// A payer's mobile number in the gateway's format: country code followed by
/// the national number, no `+` (e.g. `254712345678`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Msisdn {
    inner: PhoneNumber,
}

#[derive(Debug, Error)]
pub enum MsisdnError {
    #[error("Phone number must be in format 254XXXXXXXXX")]
    Format,
    #[error(transparent)]
    Parse(#[from] phonenumber::ParseError),
}

impl FromStr for Msisdn {
    type Err = MsisdnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 12 || !s.starts_with("254") || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MsisdnError::Format);
        }
        let inner = phonenumber::parse(None, format!("+{s}"))?;
        if inner.code().value() != KENYA {
            return Err(MsisdnError::Format);
        }
        Ok(Msisdn { inner })
    }
}

impl TryFrom<String> for Msisdn {
    type Error = MsisdnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Msisdn> for String {
    fn from(msisdn: Msisdn) -> Self {
        msisdn.to_string()
    }
}

impl Display for Msisdn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}",
            self.inner.code().value(),
            self.inner.national().value()
        )
    }
}
