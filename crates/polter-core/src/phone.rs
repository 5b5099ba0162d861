//! Kenyan mobile number handling.
//!
//! Every number the service stores or pays out to is kept in the canonical
//! national form `254` followed by nine digits, where the first of the nine
//! digits identifies the carrier.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PhoneError;

const COUNTRY_CODE: &str = "254";
const TRUNK_PREFIX: char = '0';
const SUBSCRIBER_DIGITS: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Carrier {
    Safaricom,
    Airtel,
    Telkom,
    Unknown,
}

impl Carrier {
    fn from_prefix(digit: char) -> Option<Self> {
        match digit {
            '7' => Some(Carrier::Safaricom),
            '1' => Some(Carrier::Airtel),
            '2' => Some(Carrier::Telkom),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Carrier::Safaricom => "Safaricom",
            Carrier::Airtel => "Airtel",
            Carrier::Telkom => "Telkom",
            Carrier::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A phone number in canonical `254XXXXXXXXX` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Normalizes loosely formatted input (`0712 345 678`, `+254712345678`,
    /// `712345678`, ...) into canonical form.
    pub fn normalize(raw: &str) -> Result<Self, PhoneError> {
        let cleaned: String = raw
            .chars()
            .filter(|ch| !ch.is_whitespace() && !matches!(ch, '-' | '(' | ')'))
            .collect();

        let rest = cleaned.strip_prefix('+').unwrap_or(&cleaned);
        let rest = rest.strip_prefix(TRUNK_PREFIX).unwrap_or(rest);
        let rest = rest.strip_prefix(COUNTRY_CODE).unwrap_or(rest);

        if !is_subscriber_number(rest) {
            return Err(PhoneError::InvalidPhoneFormat(raw.to_string()));
        }

        Ok(Self(format!("{COUNTRY_CODE}{rest}")))
    }

    /// Accepts only values that are already canonical. Stored contacts go
    /// through this instead of [`PhoneNumber::normalize`].
    pub fn parse_canonical(value: &str) -> Result<Self, PhoneError> {
        match value.strip_prefix(COUNTRY_CODE) {
            Some(rest) if is_subscriber_number(rest) => Ok(Self(value.to_string())),
            _ => Err(PhoneError::InvalidPhoneFormat(value.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn carrier(&self) -> Carrier {
        carrier_of(&self.0)
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_canonical(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(value: PhoneNumber) -> Self {
        value.0
    }
}

pub fn normalize(raw: &str) -> Result<PhoneNumber, PhoneError> {
    PhoneNumber::normalize(raw)
}

pub fn is_valid(raw: &str) -> bool {
    PhoneNumber::normalize(raw).is_ok()
}

pub fn is_canonical(value: &str) -> bool {
    PhoneNumber::parse_canonical(value).is_ok()
}

/// Maps the digit after the country code to its carrier. Works on any
/// string, so values read from elsewhere fall back to `Unknown`.
pub fn carrier_of(canonical: &str) -> Carrier {
    canonical
        .strip_prefix(COUNTRY_CODE)
        .and_then(|rest| rest.chars().next())
        .and_then(Carrier::from_prefix)
        .unwrap_or(Carrier::Unknown)
}

fn is_subscriber_number(value: &str) -> bool {
    value.len() == SUBSCRIBER_DIGITS
        && value.bytes().all(|byte| byte.is_ascii_digit())
        && value.chars().next().and_then(Carrier::from_prefix).is_some()
}
