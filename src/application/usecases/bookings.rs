use std::sync::Arc;

use axum::http::StatusCode;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::domain::entities::bookings::InsertBookingEntity;
use crate::domain::repositories::availability::AvailabilityRepository;
use crate::domain::repositories::bookings::BookingRepository;
use crate::domain::value_objects::bookings::{
    AvailabilityDto, AvailabilityQuery, BookingDto, InsertBookingModel, UpdateBookingModel,
};
use crate::domain::value_objects::enums::{
    booking_statuses::BookingStatus, currencies::Currency, payment_statuses::PaymentStatus,
};
use crate::domain::value_objects::payments::to_minor_units;
use crate::notifications::{BookingCancellationNotification, NotificationDispatcher};

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("the requested slot is no longer available")]
    SlotUnavailable,

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl BookingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingError::Validation(_) => StatusCode::BAD_REQUEST,
            BookingError::NotFound(_) => StatusCode::NOT_FOUND,
            BookingError::SlotUnavailable => StatusCode::CONFLICT,
            BookingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type BookingResult<T> = std::result::Result<T, BookingError>;

pub struct BookingUseCase<B, A, N>
where
    B: BookingRepository + Send + Sync + 'static,
    A: AvailabilityRepository + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    booking_repo: Arc<B>,
    availability_repo: Arc<A>,
    dispatcher: Arc<N>,
}

impl<B, A, N> BookingUseCase<B, A, N>
where
    B: BookingRepository + Send + Sync + 'static,
    A: AvailabilityRepository + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    pub fn new(booking_repo: Arc<B>, availability_repo: Arc<A>, dispatcher: Arc<N>) -> Self {
        Self {
            booking_repo,
            availability_repo,
            dispatcher,
        }
    }

    /// Pure read used for UX pre-checks; the authoritative check is the
    /// conditional reserve at creation time.
    pub async fn check_availability(&self, query: AvailabilityQuery) -> BookingResult<AvailabilityDto> {
        if query.party_size <= 0 {
            return Err(BookingError::Validation(
                "party size must be greater than zero".to_string(),
            ));
        }

        let slot = self
            .availability_repo
            .find_slot(query.resource_id, query.date, query.time)
            .await
            .map_err(|err| {
                error!(
                    resource_id = query.resource_id,
                    db_error = ?err,
                    "bookings: failed to load availability slot"
                );
                BookingError::Internal(err)
            })?;

        Ok(match slot {
            Some(slot) => AvailabilityDto {
                available: slot.fits(query.party_size),
                remaining_capacity: slot.remaining_capacity(),
            },
            None => AvailabilityDto {
                available: false,
                remaining_capacity: 0,
            },
        })
    }

    pub async fn create_booking(&self, model: InsertBookingModel) -> BookingResult<BookingDto> {
        Self::validate(&model)?;

        let currency = Currency::from_code(&model.currency).ok_or_else(|| {
            BookingError::Validation(format!("unsupported currency: {}", model.currency))
        })?;
        let total_price_minor = to_minor_units(model.total_price, currency).ok_or_else(|| {
            BookingError::Validation("total price must be a positive amount".to_string())
        })?;

        let insert = InsertBookingEntity {
            resource_id: model.resource_id,
            user_id: model.user_id,
            contact_email: model.contact_email,
            booking_date: model.date,
            start_time: model.start_time,
            duration_minutes: model.duration_minutes,
            party_size: model.party_size,
            total_price_minor,
            currency: currency.code().to_string(),
            status: BookingStatus::Pending.to_string(),
            payment_status: PaymentStatus::Pending.to_string(),
            special_requests: model.special_requests,
        };

        // Reservation and insert commit as one transaction in the
        // repository; None means the slot could not fit the party.
        let booking = self
            .booking_repo
            .insert_reserving_slot(insert)
            .await
            .map_err(|err| {
                error!(
                    resource_id = model.resource_id,
                    db_error = ?err,
                    "bookings: create failed"
                );
                BookingError::Internal(err)
            })?;

        let Some(booking) = booking else {
            info!(
                resource_id = model.resource_id,
                date = %model.date,
                time = %model.start_time,
                party_size = model.party_size,
                "bookings: slot unavailable"
            );
            return Err(BookingError::SlotUnavailable);
        };

        info!(booking_id = booking.id, resource_id = booking.resource_id, "bookings: created");
        Ok(BookingDto::from(booking))
    }

    pub async fn get_booking(&self, booking_id: i64) -> BookingResult<BookingDto> {
        let booking = self
            .booking_repo
            .find_by_id(booking_id)
            .await
            .map_err(BookingError::Internal)?
            .ok_or(BookingError::NotFound("booking"))?;

        Ok(BookingDto::from(booking))
    }

    pub async fn update_booking(
        &self,
        booking_id: i64,
        model: UpdateBookingModel,
    ) -> BookingResult<BookingDto> {
        self.booking_repo
            .find_by_id(booking_id)
            .await
            .map_err(BookingError::Internal)?
            .ok_or(BookingError::NotFound("booking"))?;

        match model.status {
            Some(BookingStatus::Cancelled) => {
                self.cancel_booking(booking_id).await?;
            }
            Some(status) => {
                // Confirmation only ever flows from a completed payment.
                return Err(BookingError::Validation(format!(
                    "bookings cannot be set to {status} directly"
                )));
            }
            None => {}
        }

        if let Some(special_requests) = model.special_requests {
            self.booking_repo
                .set_special_requests(booking_id, Some(special_requests))
                .await
                .map_err(|err| {
                    error!(booking_id, db_error = ?err, "bookings: update failed");
                    BookingError::Internal(err)
                })?;
        }

        self.get_booking(booking_id).await
    }

    /// Cancels the booking, releases its slot exactly once, and emails the
    /// guest. Cancelling an already-cancelled booking is a no-op.
    pub async fn cancel_booking(&self, booking_id: i64) -> BookingResult<()> {
        let booking = self
            .booking_repo
            .find_by_id(booking_id)
            .await
            .map_err(BookingError::Internal)?
            .ok_or(BookingError::NotFound("booking"))?;

        let cancelled = self
            .booking_repo
            .cancel(booking_id)
            .await
            .map_err(|err| {
                error!(booking_id, db_error = ?err, "bookings: cancel failed");
                BookingError::Internal(err)
            })?;

        if !cancelled {
            info!(booking_id, "bookings: already cancelled, nothing to release");
            return Ok(());
        }

        self.availability_repo
            .release(
                booking.resource_id,
                booking.booking_date,
                booking.start_time,
                booking.party_size,
            )
            .await
            .map_err(|err| {
                error!(booking_id, db_error = ?err, "bookings: slot release failed");
                BookingError::Internal(err)
            })?;

        info!(booking_id, "bookings: cancelled and slot released");

        // Cancellation already happened; a failed email is logged, not fatal.
        let notification = BookingCancellationNotification {
            recipient: booking.contact_email,
            booking_id: booking.id,
            resource_id: booking.resource_id,
            date: booking.booking_date,
            start_time: booking.start_time,
        };
        if let Err(err) = self.dispatcher.booking_cancelled(&notification).await {
            warn!(booking_id, error = %err, "bookings: cancellation email failed");
        }

        Ok(())
    }

    fn validate(model: &InsertBookingModel) -> BookingResult<()> {
        if model.party_size <= 0 {
            return Err(BookingError::Validation(
                "party size must be greater than zero".to_string(),
            ));
        }
        if model.duration_minutes <= 0 {
            return Err(BookingError::Validation(
                "duration must be greater than zero".to_string(),
            ));
        }
        if !model.contact_email.contains('@') {
            return Err(BookingError::Validation(
                "contact email is invalid".to_string(),
            ));
        }
        Ok(())
    }
}
