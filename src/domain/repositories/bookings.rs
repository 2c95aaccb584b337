use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::bookings::{BookingEntity, InsertBookingEntity};
use crate::domain::value_objects::enums::payment_statuses::PaymentStatus;

#[async_trait]
#[automock]
pub trait BookingRepository {
    /// Reserves slot capacity and inserts the booking in one transaction.
    /// Returns `None` (with no state change) when the slot is missing or
    /// cannot fit the party.
    async fn insert_reserving_slot(
        &self,
        booking: InsertBookingEntity,
    ) -> Result<Option<BookingEntity>>;

    async fn find_by_id(&self, booking_id: i64) -> Result<Option<BookingEntity>>;

    /// Marks the booking confirmed and paid, guarded on the booking not
    /// being cancelled. Returns false when the guard rejected the update.
    async fn confirm_if_active(&self, booking_id: i64) -> Result<bool>;

    async fn set_payment_status(
        &self,
        booking_id: i64,
        payment_status: PaymentStatus,
    ) -> Result<()>;

    /// Transitions the booking to cancelled. Returns false when it was
    /// already cancelled (the slot must then not be released again).
    async fn cancel(&self, booking_id: i64) -> Result<bool>;

    async fn set_special_requests(
        &self,
        booking_id: i64,
        special_requests: Option<String>,
    ) -> Result<()>;
}
