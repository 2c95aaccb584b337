use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infrastructure::postgres::schema::bookings;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = bookings)]
pub struct BookingEntity {
    pub id: i64,
    pub resource_id: i64,
    pub user_id: Uuid,
    pub contact_email: String,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub party_size: i32,
    pub total_price_minor: i64,
    pub currency: String,
    pub status: String,
    pub payment_status: String,
    pub special_requests: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = bookings)]
pub struct InsertBookingEntity {
    pub resource_id: i64,
    pub user_id: Uuid,
    pub contact_email: String,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub party_size: i32,
    pub total_price_minor: i64,
    pub currency: String,
    pub status: String,
    pub payment_status: String,
    pub special_requests: Option<String>,
}
