use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::{insert_into, update};

use crate::domain::entities::bookings::{BookingEntity, InsertBookingEntity};
use crate::domain::repositories::bookings::BookingRepository;
use crate::domain::value_objects::enums::{
    booking_statuses::BookingStatus, payment_statuses::PaymentStatus,
};
use crate::infrastructure::postgres::{
    postgres_connection::PgPoolSquad,
    schema::{availability_slots, bookings},
};

pub struct BookingPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl BookingPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl BookingRepository for BookingPostgres {
    async fn insert_reserving_slot(
        &self,
        booking: InsertBookingEntity,
    ) -> Result<Option<BookingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // One transaction: the conditional check-and-increment and the
        // insert commit together or not at all, so a crash between them
        // can never strand reserved capacity.
        let entity = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let reserved = update(
                availability_slots::table
                    .filter(availability_slots::resource_id.eq(booking.resource_id))
                    .filter(availability_slots::slot_date.eq(booking.booking_date))
                    .filter(availability_slots::slot_time.eq(booking.start_time))
                    .filter(
                        availability_slots::current_bookings
                            .le(availability_slots::max_capacity - booking.party_size),
                    ),
            )
            .set(
                availability_slots::current_bookings
                    .eq(availability_slots::current_bookings + booking.party_size),
            )
            .execute(conn)?;

            if reserved == 0 {
                return Ok(None);
            }

            insert_into(bookings::table)
                .values(&booking)
                .get_result::<BookingEntity>(conn)
                .map(Some)
        })?;

        Ok(entity)
    }

    async fn find_by_id(&self, booking_id: i64) -> Result<Option<BookingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let entity = bookings::table
            .find(booking_id)
            .first::<BookingEntity>(&mut conn)
            .optional()?;

        Ok(entity)
    }

    async fn confirm_if_active(&self, booking_id: i64) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // Guarded in SQL so a cancellation racing the confirmation can
        // never be overwritten.
        let updated = update(
            bookings::table
                .filter(bookings::id.eq(booking_id))
                .filter(bookings::status.ne(BookingStatus::Cancelled.as_str())),
        )
        .set((
            bookings::status.eq(BookingStatus::Confirmed.as_str()),
            bookings::payment_status.eq(PaymentStatus::Paid.as_str()),
            bookings::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(updated > 0)
    }

    async fn set_payment_status(
        &self,
        booking_id: i64,
        payment_status: PaymentStatus,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(bookings::table.filter(bookings::id.eq(booking_id)))
            .set((
                bookings::payment_status.eq(payment_status.as_str()),
                bookings::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn cancel(&self, booking_id: i64) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(
            bookings::table
                .filter(bookings::id.eq(booking_id))
                .filter(bookings::status.ne(BookingStatus::Cancelled.as_str())),
        )
        .set((
            bookings::status.eq(BookingStatus::Cancelled.as_str()),
            bookings::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(updated > 0)
    }

    async fn set_special_requests(
        &self,
        booking_id: i64,
        special_requests: Option<String>,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(bookings::table.filter(bookings::id.eq(booking_id)))
            .set((
                bookings::special_requests.eq(special_requests),
                bookings::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }
}
