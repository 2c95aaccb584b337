use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use crate::application::usecases::payments::PaymentUseCase;
use crate::domain::value_objects::enums::gateways::GatewayId;
use crate::domain::value_objects::payments::{ConfirmPaymentIntentModel, CreatePaymentIntentModel};
use crate::gateways::{GatewayAdapter, GatewayRegistry};
use crate::infrastructure::postgres::postgres_connection::PgPoolSquad;
use crate::infrastructure::postgres::repositories::{
    bookings::BookingPostgres, payment_intents::PaymentIntentPostgres,
};
use crate::notifications::smtp::SmtpNotificationDispatcher;

type PaymentsUseCase =
    PaymentUseCase<PaymentIntentPostgres, BookingPostgres, SmtpNotificationDispatcher>;

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    registry: Arc<GatewayRegistry>,
    adapters: HashMap<GatewayId, Arc<dyn GatewayAdapter>>,
    dispatcher: Arc<SmtpNotificationDispatcher>,
    receipt_base_url: String,
) -> Router {
    let intent_repo = PaymentIntentPostgres::new(Arc::clone(&db_pool));
    let booking_repo = BookingPostgres::new(Arc::clone(&db_pool));
    let payments_usecase = Arc::new(PaymentUseCase::new(
        Arc::new(intent_repo),
        Arc::new(booking_repo),
        dispatcher,
        registry,
        adapters,
        receipt_base_url,
    ));

    Router::new()
        .route("/create", post(create_intent))
        .route("/confirm", post(confirm_intent))
        .route("/gateways", get(list_gateways))
        .route("/:payment_id/receipt", post(generate_receipt))
        .route("/webhook/stripe", post(stripe_webhook))
        .route("/webhook/paypal", post(paypal_webhook))
        .route("/webhook/square", post(square_webhook))
        .route("/webhook/tap", post(tap_webhook))
        .with_state(payments_usecase)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentIntentRequest {
    amount: Decimal,
    currency: String,
    gateway_id: String,
    booking_id: i64,
    metadata: Option<serde_json::Value>,
}

async fn create_intent(
    State(payments_usecase): State<Arc<PaymentsUseCase>>,
    Json(payload): Json<CreatePaymentIntentRequest>,
) -> impl IntoResponse {
    let model = CreatePaymentIntentModel {
        amount: payload.amount,
        currency: payload.currency,
        gateway_id: payload.gateway_id,
        booking_id: payload.booking_id,
        metadata: payload.metadata,
    };

    match payments_usecase.create_intent(model).await {
        Ok(intent) => (StatusCode::CREATED, Json(intent)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn confirm_intent(
    State(payments_usecase): State<Arc<PaymentsUseCase>>,
    Json(payload): Json<ConfirmPaymentIntentModel>,
) -> impl IntoResponse {
    match payments_usecase
        .capture_intent(
            &payload.payment_intent_id,
            payload.payment_method.as_deref(),
        )
        .await
    {
        Ok(intent) => (StatusCode::OK, Json(intent)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn list_gateways(
    State(payments_usecase): State<Arc<PaymentsUseCase>>,
) -> impl IntoResponse {
    (StatusCode::OK, Json(payments_usecase.list_gateways())).into_response()
}

async fn generate_receipt(
    State(payments_usecase): State<Arc<PaymentsUseCase>>,
    Path(payment_id): Path<String>,
) -> impl IntoResponse {
    match payments_usecase.generate_receipt(&payment_id).await {
        Ok(receipt_url) => {
            (StatusCode::OK, Json(json!({ "receiptUrl": receipt_url }))).into_response()
        }
        Err(err) => err.into_response(),
    }
}

async fn stripe_webhook(
    State(payments_usecase): State<Arc<PaymentsUseCase>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    handle_webhook(payments_usecase, GatewayId::Stripe, &headers, "stripe-signature", body).await
}

async fn paypal_webhook(
    State(payments_usecase): State<Arc<PaymentsUseCase>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    handle_webhook(
        payments_usecase,
        GatewayId::Paypal,
        &headers,
        "paypal-transmission-sig",
        body,
    )
    .await
}

async fn square_webhook(
    State(payments_usecase): State<Arc<PaymentsUseCase>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    handle_webhook(
        payments_usecase,
        GatewayId::Square,
        &headers,
        "x-square-hmacsha256-signature",
        body,
    )
    .await
}

async fn tap_webhook(
    State(payments_usecase): State<Arc<PaymentsUseCase>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    handle_webhook(payments_usecase, GatewayId::Tap, &headers, "hashstring", body).await
}

async fn handle_webhook(
    payments_usecase: Arc<PaymentsUseCase>,
    gateway_id: GatewayId,
    headers: &HeaderMap,
    signature_header: &'static str,
    body: Bytes,
) -> axum::response::Response {
    let signature = headers
        .get(signature_header)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    match payments_usecase
        .handle_webhook(gateway_id, &body, signature)
        .await
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => err.into_response(),
    }
}
