use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::infrastructure::postgres::schema::payment_intents;

/// A gateway-tracked charge. The primary key is the provider-issued
/// transaction id; rows are never deleted, only transitioned.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payment_intents)]
pub struct PaymentIntentEntity {
    pub id: String,
    pub booking_id: i64,
    pub gateway: String,
    pub amount_minor: i64,
    pub currency: String,
    pub status: String,
    pub metadata: serde_json::Value,
    pub client_secret: Option<String>,
    pub receipt_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payment_intents)]
pub struct InsertPaymentIntentEntity {
    pub id: String,
    pub booking_id: i64,
    pub gateway: String,
    pub amount_minor: i64,
    pub currency: String,
    pub status: String,
    pub metadata: serde_json::Value,
    pub client_secret: Option<String>,
}
