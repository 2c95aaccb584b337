use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Identifier of a supported payment gateway.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GatewayId {
    Stripe,
    Paypal,
    Square,
    Tap,
}

impl GatewayId {
    pub const ALL: [GatewayId; 4] = [
        GatewayId::Stripe,
        GatewayId::Paypal,
        GatewayId::Square,
        GatewayId::Tap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayId::Stripe => "stripe",
            GatewayId::Paypal => "paypal",
            GatewayId::Square => "square",
            GatewayId::Tap => "tap",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "stripe" => Some(GatewayId::Stripe),
            "paypal" => Some(GatewayId::Paypal),
            "square" => Some(GatewayId::Square),
            "tap" => Some(GatewayId::Tap),
            _ => None,
        }
    }
}

impl Display for GatewayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
