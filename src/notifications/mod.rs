pub mod smtp;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use mockall::automock;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::value_objects::enums::{currencies::Currency, gateways::GatewayId};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification send timed out")]
    Timeout,

    #[error("notification send failed: {0}")]
    Send(String),
}

#[derive(Debug, Clone)]
pub struct PaymentNotification {
    pub recipient: String,
    pub booking_id: i64,
    pub intent_id: String,
    pub gateway: GatewayId,
    pub amount: Decimal,
    pub currency: Currency,
    pub receipt_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BookingCancellationNotification {
    pub recipient: String,
    pub booking_id: i64,
    pub resource_id: i64,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
}

/// Formats and sends the lifecycle emails. Implementations own delivery;
/// callers own deciding which events are fatal when a send fails.
#[async_trait]
#[automock]
pub trait NotificationDispatcher: Send + Sync {
    async fn booking_confirmed(
        &self,
        notification: &PaymentNotification,
    ) -> Result<(), NotificationError>;

    async fn payment_failed(
        &self,
        notification: &PaymentNotification,
    ) -> Result<(), NotificationError>;

    async fn payment_refunded(
        &self,
        notification: &PaymentNotification,
    ) -> Result<(), NotificationError>;

    async fn booking_cancelled(
        &self,
        notification: &BookingCancellationNotification,
    ) -> Result<(), NotificationError>;
}
