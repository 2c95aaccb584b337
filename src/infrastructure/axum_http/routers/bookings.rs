use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::application::usecases::bookings::BookingUseCase;
use crate::domain::value_objects::bookings::{
    AvailabilityQuery, InsertBookingModel, UpdateBookingModel,
};
use crate::infrastructure::postgres::postgres_connection::PgPoolSquad;
use crate::infrastructure::postgres::repositories::{
    availability::AvailabilityPostgres, bookings::BookingPostgres,
};
use crate::notifications::smtp::SmtpNotificationDispatcher;

type BookingsUseCase =
    BookingUseCase<BookingPostgres, AvailabilityPostgres, SmtpNotificationDispatcher>;

fn build_usecase(
    db_pool: Arc<PgPoolSquad>,
    dispatcher: Arc<SmtpNotificationDispatcher>,
) -> Arc<BookingsUseCase> {
    let booking_repo = BookingPostgres::new(Arc::clone(&db_pool));
    let availability_repo = AvailabilityPostgres::new(Arc::clone(&db_pool));
    Arc::new(BookingUseCase::new(
        Arc::new(booking_repo),
        Arc::new(availability_repo),
        dispatcher,
    ))
}

pub fn routes(db_pool: Arc<PgPoolSquad>, dispatcher: Arc<SmtpNotificationDispatcher>) -> Router {
    Router::new()
        .route("/", post(create_booking))
        .route("/availability", get(check_availability))
        .route("/:booking_id", get(get_booking).put(update_booking))
        .with_state(build_usecase(db_pool, dispatcher))
}

/// `POST /api/fleet/:id/book` shares the availability-checked creation
/// path; the vehicle id comes from the route.
pub fn fleet_routes(
    db_pool: Arc<PgPoolSquad>,
    dispatcher: Arc<SmtpNotificationDispatcher>,
) -> Router {
    Router::new()
        .route("/:resource_id/book", post(book_fleet_vehicle))
        .with_state(build_usecase(db_pool, dispatcher))
}

async fn create_booking(
    State(bookings_usecase): State<Arc<BookingsUseCase>>,
    Json(payload): Json<InsertBookingModel>,
) -> impl IntoResponse {
    match bookings_usecase.create_booking(payload).await {
        Ok(booking) => (StatusCode::CREATED, Json(booking)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn check_availability(
    State(bookings_usecase): State<Arc<BookingsUseCase>>,
    Query(query): Query<AvailabilityQuery>,
) -> impl IntoResponse {
    match bookings_usecase.check_availability(query).await {
        Ok(availability) => (StatusCode::OK, Json(availability)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn get_booking(
    State(bookings_usecase): State<Arc<BookingsUseCase>>,
    Path(booking_id): Path<i64>,
) -> impl IntoResponse {
    match bookings_usecase.get_booking(booking_id).await {
        Ok(booking) => (StatusCode::OK, Json(booking)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn update_booking(
    State(bookings_usecase): State<Arc<BookingsUseCase>>,
    Path(booking_id): Path<i64>,
    Json(payload): Json<UpdateBookingModel>,
) -> impl IntoResponse {
    match bookings_usecase.update_booking(booking_id, payload).await {
        Ok(booking) => (StatusCode::OK, Json(booking)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FleetBookingRequest {
    user_id: Uuid,
    contact_email: String,
    date: NaiveDate,
    start_time: NaiveTime,
    duration_minutes: i32,
    party_size: i32,
    total_price: Decimal,
    currency: String,
    special_requests: Option<String>,
}

async fn book_fleet_vehicle(
    State(bookings_usecase): State<Arc<BookingsUseCase>>,
    Path(resource_id): Path<i64>,
    Json(payload): Json<FleetBookingRequest>,
) -> impl IntoResponse {
    let model = InsertBookingModel {
        resource_id,
        user_id: payload.user_id,
        contact_email: payload.contact_email,
        date: payload.date,
        start_time: payload.start_time,
        duration_minutes: payload.duration_minutes,
        party_size: payload.party_size,
        total_price: payload.total_price,
        currency: payload.currency,
        special_requests: payload.special_requests,
    };

    match bookings_usecase.create_booking(model).await {
        Ok(booking) => (StatusCode::CREATED, Json(booking)).into_response(),
        Err(err) => err.into_response(),
    }
}
