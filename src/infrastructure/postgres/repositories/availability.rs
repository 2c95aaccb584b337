use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use diesel::define_sql_function;
use diesel::prelude::*;
use diesel::sql_types::Integer;
use diesel::update;

use crate::domain::entities::availability::AvailabilitySlotEntity;
use crate::domain::repositories::availability::AvailabilityRepository;
use crate::infrastructure::postgres::{
    postgres_connection::PgPoolSquad, schema::availability_slots,
};

define_sql_function! {
    fn greatest(a: Integer, b: Integer) -> Integer;
}

pub struct AvailabilityPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl AvailabilityPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl AvailabilityRepository for AvailabilityPostgres {
    async fn find_slot(
        &self,
        resource_id: i64,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<AvailabilitySlotEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let slot = availability_slots::table
            .filter(availability_slots::resource_id.eq(resource_id))
            .filter(availability_slots::slot_date.eq(date))
            .filter(availability_slots::slot_time.eq(time))
            .first::<AvailabilitySlotEntity>(&mut conn)
            .optional()?;

        Ok(slot)
    }

    async fn release(
        &self,
        resource_id: i64,
        date: NaiveDate,
        time: NaiveTime,
        party_size: i32,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(
            availability_slots::table
                .filter(availability_slots::resource_id.eq(resource_id))
                .filter(availability_slots::slot_date.eq(date))
                .filter(availability_slots::slot_time.eq(time)),
        )
        .set(
            availability_slots::current_bookings.eq(greatest(
                availability_slots::current_bookings - party_size,
                0,
            )),
        )
        .execute(&mut conn)?;

        Ok(())
    }
}
