use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::domain::entities::payment_intents::PaymentIntentEntity;
use crate::domain::value_objects::enums::{
    currencies::Currency, gateways::GatewayId, payment_intent_statuses::PaymentIntentStatus,
};

/// Converts a decimal amount into the currency's smallest-unit integer.
/// Returns `None` for non-positive amounts or amounts with fractional
/// minor units (e.g. AED 10.005).
pub fn to_minor_units(amount: Decimal, currency: Currency) -> Option<i64> {
    if amount <= Decimal::ZERO {
        return None;
    }

    let scaled = amount * Decimal::from(10i64.pow(currency.decimals()));
    if !scaled.fract().is_zero() {
        return None;
    }

    scaled.to_i64()
}

pub fn from_minor_units(amount_minor: i64, currency: Currency) -> Decimal {
    Decimal::new(amount_minor, currency.decimals())
}

/// Validated checkout request handed to the payment usecase.
#[derive(Debug, Clone)]
pub struct CreatePaymentIntentModel {
    pub amount: Decimal,
    pub currency: String,
    pub gateway_id: String,
    pub booking_id: i64,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentDto {
    pub id: String,
    pub booking_id: i64,
    pub gateway_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentIntentStatus,
    pub client_secret: Option<String>,
    pub receipt_url: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<PaymentIntentEntity> for PaymentIntentDto {
    fn from(entity: PaymentIntentEntity) -> Self {
        let currency = Currency::from_code(&entity.currency).unwrap_or(Currency::USD);

        Self {
            id: entity.id,
            booking_id: entity.booking_id,
            gateway_id: entity.gateway,
            amount: from_minor_units(entity.amount_minor, currency),
            currency: entity.currency,
            status: PaymentIntentStatus::from_str(&entity.status)
                .unwrap_or(PaymentIntentStatus::Pending),
            client_secret: entity.client_secret,
            receipt_url: entity.receipt_url,
            metadata: entity.metadata,
            created_at: entity.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayDescriptorDto {
    pub id: GatewayId,
    pub display_name: String,
    pub test_mode: bool,
}

/// Capture request: the client hands over its payment token (where the
/// provider needs one); the resulting status comes from the gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentIntentModel {
    pub payment_intent_id: String,
    pub payment_method: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_two_decimal_amounts_to_minor_units() {
        let amount = Decimal::new(10000, 2); // 100.00
        assert_eq!(to_minor_units(amount, Currency::AED), Some(10_000));

        let amount = Decimal::new(995, 2); // 9.95
        assert_eq!(to_minor_units(amount, Currency::USD), Some(995));
    }

    #[test]
    fn rejects_non_positive_and_sub_minor_amounts() {
        assert_eq!(to_minor_units(Decimal::ZERO, Currency::USD), None);
        assert_eq!(to_minor_units(Decimal::new(-100, 2), Currency::USD), None);
        // 10.005 has a fractional fils
        assert_eq!(to_minor_units(Decimal::new(10005, 3), Currency::AED), None);
    }

    #[test]
    fn round_trips_through_minor_units() {
        let amount = Decimal::new(12345, 2); // 123.45
        let minor = to_minor_units(amount, Currency::GBP).unwrap();
        assert_eq!(from_minor_units(minor, Currency::GBP), amount);
    }
}
