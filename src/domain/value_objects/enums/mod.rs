pub mod booking_statuses;
pub mod currencies;
pub mod gateways;
pub mod payment_intent_statuses;
pub mod payment_statuses;
