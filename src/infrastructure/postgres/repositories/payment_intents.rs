use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::{insert_into, update};

use crate::domain::entities::payment_intents::{InsertPaymentIntentEntity, PaymentIntentEntity};
use crate::domain::repositories::payment_intents::PaymentIntentRepository;
use crate::domain::value_objects::enums::payment_intent_statuses::PaymentIntentStatus;
use crate::infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::payment_intents};

pub struct PaymentIntentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentIntentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentIntentRepository for PaymentIntentPostgres {
    async fn insert(&self, intent: InsertPaymentIntentEntity) -> Result<PaymentIntentEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let entity = insert_into(payment_intents::table)
            .values(&intent)
            .get_result::<PaymentIntentEntity>(&mut conn)?;

        Ok(entity)
    }

    async fn find_by_id(&self, intent_id: &str) -> Result<Option<PaymentIntentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let entity = payment_intents::table
            .find(intent_id)
            .first::<PaymentIntentEntity>(&mut conn)
            .optional()?;

        Ok(entity)
    }

    async fn transition_status(
        &self,
        intent_id: &str,
        from: PaymentIntentStatus,
        to: PaymentIntentStatus,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // Single conditional UPDATE: the row-level guard on the current
        // status is the per-intent mutual exclusion boundary.
        let updated = update(
            payment_intents::table
                .filter(payment_intents::id.eq(intent_id))
                .filter(payment_intents::status.eq(from.as_str())),
        )
        .set((
            payment_intents::status.eq(to.as_str()),
            payment_intents::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(updated > 0)
    }

    async fn set_receipt_url(&self, intent_id: &str, receipt_url: &str) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(payment_intents::table.filter(payment_intents::id.eq(intent_id)))
            .set((
                payment_intents::receipt_url.eq(receipt_url),
                payment_intents::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }
}
