//! Number-like request values.
//!
//! Callers supply numeric request fields as machine integers, big integers
//! or text (decimal or `0x` hex). The value keeps the caller's form; it is
//! resolved to an unsigned 256-bit integer only when encoded or compared.

use std::fmt;

use alloy_primitives::U256;

use crate::error::{AttestationError, Result};

/// A numeric field value in any accepted representation.
#[derive(Debug, Clone)]
pub enum Numeric {
    /// Unsigned big integer.
    Unsigned(U256),
    /// Signed machine integer. Negative values fail to encode.
    Signed(i128),
    /// Decimal or `0x`-prefixed hexadecimal text.
    Text(String),
}

impl Numeric {
    /// Resolve to an unsigned integer for the field `key`.
    ///
    /// # Errors
    ///
    /// Returns `NegativeValueUnsupported` for negative values and
    /// `InvalidNumber` for text that is neither decimal nor hex.
    pub fn resolve(&self, key: &str) -> Result<U256> {
        match self {
            Self::Unsigned(value) => Ok(*value),
            Self::Signed(value) if *value < 0 => {
                Err(AttestationError::NegativeValueUnsupported { key: key.to_string() })
            },
            Self::Signed(value) => Ok(U256::from(value.unsigned_abs())),
            Self::Text(text) => parse_text(text, key),
        }
    }

    /// Resolve to a `u64`, failing if the value does not fit.
    pub fn resolve_u64(&self, key: &str) -> Result<u64> {
        let value = self.resolve(key)?;
        u64::try_from(value).map_err(|_| AttestationError::FieldTooLong {
            key: key.to_string(),
            width: 8,
            actual: value.byte_len(),
        })
    }
}

fn parse_text(text: &str, key: &str) -> Result<U256> {
    let trimmed = text.trim();

    if let Some(magnitude) = trimmed.strip_prefix('-') {
        let magnitude = parse_text(magnitude, key)?;
        if magnitude.is_zero() {
            return Ok(U256::ZERO);
        }
        return Err(AttestationError::NegativeValueUnsupported { key: key.to_string() });
    }

    let (digits, radix) = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (trimmed, 10),
    };

    if digits.is_empty() {
        return Err(AttestationError::invalid_number(text));
    }

    U256::from_str_radix(digits, radix).map_err(|_| AttestationError::invalid_number(text))
}

impl PartialEq for Numeric {
    /// Numeric equality: `"10"`, `"0xA"` and `10u64` are equal.
    ///
    /// Values that fail to resolve are only equal to an identical
    /// representation.
    fn eq(&self, other: &Self) -> bool {
        match (self.resolve(""), other.resolve("")) {
            (Ok(a), Ok(b)) => a == b,
            (Err(_), Err(_)) => match (self, other) {
                (Self::Signed(a), Self::Signed(b)) => a == b,
                (Self::Text(a), Self::Text(b)) => a == b,
                _ => false,
            },
            _ => false,
        }
    }
}

impl Eq for Numeric {}

impl Default for Numeric {
    fn default() -> Self {
        Self::Unsigned(U256::ZERO)
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsigned(value) => write!(f, "{value}"),
            Self::Signed(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

macro_rules! numeric_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for Numeric {
            fn from(value: $t) -> Self {
                Self::Unsigned(U256::from(value))
            }
        })*
    };
}

macro_rules! numeric_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for Numeric {
            fn from(value: $t) -> Self {
                Self::Signed(i128::from(value))
            }
        })*
    };
}

numeric_from_unsigned!(u8, u16, u32, u64, u128);
numeric_from_signed!(i8, i16, i32, i64, i128);

impl From<U256> for Numeric {
    fn from(value: U256) -> Self {
        Self::Unsigned(value)
    }
}

impl From<&str> for Numeric {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Numeric {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}
