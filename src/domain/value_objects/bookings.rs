use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::bookings::BookingEntity;
use crate::domain::value_objects::enums::{
    booking_statuses::BookingStatus, currencies::Currency, payment_statuses::PaymentStatus,
};
use crate::domain::value_objects::payments::from_minor_units;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertBookingModel {
    pub resource_id: i64,
    pub user_id: Uuid,
    pub contact_email: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub party_size: i32,
    pub total_price: Decimal,
    pub currency: String,
    pub special_requests: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookingModel {
    pub status: Option<BookingStatus>,
    pub special_requests: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub resource_id: i64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub party_size: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityDto {
    pub available: bool,
    pub remaining_capacity: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDto {
    pub id: i64,
    pub resource_id: i64,
    pub user_id: Uuid,
    pub contact_email: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub party_size: i32,
    pub total_price: Decimal,
    pub currency: String,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub special_requests: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<BookingEntity> for BookingDto {
    fn from(entity: BookingEntity) -> Self {
        let currency = Currency::from_code(&entity.currency).unwrap_or(Currency::USD);

        Self {
            id: entity.id,
            resource_id: entity.resource_id,
            user_id: entity.user_id,
            contact_email: entity.contact_email,
            date: entity.booking_date,
            start_time: entity.start_time,
            duration_minutes: entity.duration_minutes,
            party_size: entity.party_size,
            total_price: from_minor_units(entity.total_price_minor, currency),
            currency: entity.currency,
            status: BookingStatus::from_str(&entity.status).unwrap_or(BookingStatus::Pending),
            payment_status: PaymentStatus::from_str(&entity.payment_status)
                .unwrap_or(PaymentStatus::Pending),
            special_requests: entity.special_requests,
            created_at: entity.created_at,
        }
    }
}
