use chrono::{NaiveDate, NaiveTime};
use diesel::prelude::*;

use crate::infrastructure::postgres::schema::availability_slots;

/// Per-(resource, date, time) capacity counters. `current_bookings` is only
/// ever mutated through the conditional reserve/release updates, so it can
/// never exceed `max_capacity`.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = availability_slots)]
pub struct AvailabilitySlotEntity {
    pub id: i64,
    pub resource_id: i64,
    pub slot_date: NaiveDate,
    pub slot_time: NaiveTime,
    pub max_capacity: i32,
    pub current_bookings: i32,
}

impl AvailabilitySlotEntity {
    pub fn fits(&self, party_size: i32) -> bool {
        self.current_bookings + party_size <= self.max_capacity
    }

    pub fn remaining_capacity(&self) -> i32 {
        (self.max_capacity - self.current_bookings).max(0)
    }
}
