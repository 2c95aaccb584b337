use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// ISO 4217 currencies the platform charges in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Currency {
    AED,
    USD,
    EUR,
    GBP,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::AED => "AED",
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
        }
    }

    /// Parses a 3-letter code, case-insensitively.
    pub fn from_code(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "AED" => Some(Currency::AED),
            "USD" => Some(Currency::USD),
            "EUR" => Some(Currency::EUR),
            "GBP" => Some(Currency::GBP),
            _ => None,
        }
    }

    /// Number of decimal places in the minor-unit representation.
    pub fn decimals(&self) -> u32 {
        2
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
