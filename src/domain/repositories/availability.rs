use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use mockall::automock;

use crate::domain::entities::availability::AvailabilitySlotEntity;

#[async_trait]
#[automock]
pub trait AvailabilityRepository {
    async fn find_slot(
        &self,
        resource_id: i64,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<AvailabilitySlotEntity>>;

    /// Decrements `current_bookings`, floored at zero.
    async fn release(
        &self,
        resource_id: i64,
        date: NaiveDate,
        time: NaiveTime,
        party_size: i32,
    ) -> Result<()>;
}
