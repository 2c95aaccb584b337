use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use axum::http::StatusCode;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::domain::entities::bookings::BookingEntity;
use crate::domain::entities::payment_intents::{InsertPaymentIntentEntity, PaymentIntentEntity};
use crate::domain::repositories::bookings::BookingRepository;
use crate::domain::repositories::payment_intents::PaymentIntentRepository;
use crate::domain::value_objects::enums::{
    currencies::Currency, gateways::GatewayId, payment_intent_statuses::PaymentIntentStatus,
    payment_statuses::PaymentStatus,
};
use crate::domain::value_objects::payments::{
    CreatePaymentIntentModel, GatewayDescriptorDto, PaymentIntentDto, from_minor_units,
    to_minor_units,
};
use crate::gateways::{ChargeRequest, GatewayAdapter, GatewayError, GatewayRegistry};
use crate::notifications::{NotificationDispatcher, NotificationError, PaymentNotification};

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("payment gateway {0} is not available")]
    GatewayUnavailable(GatewayId),

    #[error("{provider} gateway error: {message}")]
    Gateway {
        provider: &'static str,
        message: String,
    },

    #[error("{0} gateway timed out")]
    GatewayTimeout(&'static str),

    #[error("notification dispatch timed out")]
    NotificationTimeout,

    #[error("illegal payment status transition: {from} -> {to}")]
    IllegalTransition {
        from: PaymentIntentStatus,
        to: PaymentIntentStatus,
    },

    #[error("{0}")]
    Conflict(String),

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl PaymentError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PaymentError::Validation(_) | PaymentError::GatewayUnavailable(_) => {
                StatusCode::BAD_REQUEST
            }
            PaymentError::NotFound(_) => StatusCode::NOT_FOUND,
            PaymentError::IllegalTransition { .. } | PaymentError::Conflict(_) => {
                StatusCode::CONFLICT
            }
            PaymentError::Gateway { .. } => StatusCode::BAD_GATEWAY,
            PaymentError::GatewayTimeout(_) | PaymentError::NotificationTimeout => {
                StatusCode::GATEWAY_TIMEOUT
            }
            PaymentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GatewayError> for PaymentError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Timeout(provider) => PaymentError::GatewayTimeout(provider),
            GatewayError::Upstream { provider, message } => {
                PaymentError::Gateway { provider, message }
            }
            GatewayError::InvalidSignature => {
                PaymentError::Validation("webhook signature verification failed".to_string())
            }
        }
    }
}

pub type PaymentResult<T> = std::result::Result<T, PaymentError>;

pub struct PaymentUseCase<I, B, N>
where
    I: PaymentIntentRepository + Send + Sync + 'static,
    B: BookingRepository + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    intent_repo: Arc<I>,
    booking_repo: Arc<B>,
    dispatcher: Arc<N>,
    registry: Arc<GatewayRegistry>,
    adapters: HashMap<GatewayId, Arc<dyn GatewayAdapter>>,
    receipt_base_url: String,
}

impl<I, B, N> PaymentUseCase<I, B, N>
where
    I: PaymentIntentRepository + Send + Sync + 'static,
    B: BookingRepository + Send + Sync + 'static,
    N: NotificationDispatcher + Send + Sync + 'static,
{
    pub fn new(
        intent_repo: Arc<I>,
        booking_repo: Arc<B>,
        dispatcher: Arc<N>,
        registry: Arc<GatewayRegistry>,
        adapters: HashMap<GatewayId, Arc<dyn GatewayAdapter>>,
        receipt_base_url: String,
    ) -> Self {
        Self {
            intent_repo,
            booking_repo,
            dispatcher,
            registry,
            adapters,
            receipt_base_url,
        }
    }

    pub fn list_gateways(&self) -> Vec<GatewayDescriptorDto> {
        self.registry
            .list_enabled()
            .into_iter()
            .map(|config| GatewayDescriptorDto {
                id: config.id,
                display_name: config.display_name.clone(),
                test_mode: config.test_mode,
            })
            .collect()
    }

    pub async fn create_intent(
        &self,
        model: CreatePaymentIntentModel,
    ) -> PaymentResult<PaymentIntentDto> {
        if model.amount <= rust_decimal::Decimal::ZERO {
            return Err(PaymentError::Validation(
                "amount must be greater than zero".to_string(),
            ));
        }

        if model.currency.len() != 3 || !model.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(PaymentError::Validation(
                "currency must be a 3-letter code".to_string(),
            ));
        }

        let currency = Currency::from_code(&model.currency).ok_or_else(|| {
            PaymentError::Validation(format!("unsupported currency: {}", model.currency))
        })?;

        let gateway_id = GatewayId::from_str(&model.gateway_id).ok_or_else(|| {
            PaymentError::Validation(format!("unknown gateway: {}", model.gateway_id))
        })?;

        let gateway_config = self
            .registry
            .get(gateway_id)
            .filter(|config| config.enabled)
            .ok_or(PaymentError::GatewayUnavailable(gateway_id))?;

        let adapter = self
            .adapters
            .get(&gateway_id)
            .ok_or(PaymentError::GatewayUnavailable(gateway_id))?;

        let amount_minor = to_minor_units(model.amount, currency).ok_or_else(|| {
            PaymentError::Validation(format!(
                "amount has more precision than {} allows",
                currency.code()
            ))
        })?;

        let booking = self
            .booking_repo
            .find_by_id(model.booking_id)
            .await
            .map_err(|err| {
                error!(
                    booking_id = model.booking_id,
                    db_error = ?err,
                    "payments: failed to load booking for checkout"
                );
                PaymentError::Internal(err)
            })?
            .ok_or(PaymentError::NotFound("booking"))?;

        let metadata = model.metadata.unwrap_or_else(|| serde_json::json!({}));

        info!(
            booking_id = booking.id,
            gateway = %gateway_id,
            amount = %model.amount,
            currency = %currency,
            test_mode = gateway_config.test_mode,
            "payments: creating intent"
        );

        // Gateway call happens before any write so a provider failure
        // leaves no partial intent behind.
        let charge = adapter
            .create_charge(&ChargeRequest {
                amount: model.amount,
                currency,
                booking_id: booking.id,
                metadata: metadata.clone(),
            })
            .await
            .map_err(|err| {
                error!(
                    booking_id = booking.id,
                    gateway = %gateway_id,
                    error = %err,
                    "payments: gateway charge creation failed"
                );
                PaymentError::from(err)
            })?;

        let entity = self
            .intent_repo
            .insert(InsertPaymentIntentEntity {
                id: charge.provider_id.clone(),
                booking_id: booking.id,
                gateway: gateway_id.to_string(),
                amount_minor,
                currency: currency.code().to_string(),
                status: PaymentIntentStatus::Pending.to_string(),
                metadata,
                client_secret: charge.client_secret,
            })
            .await
            .map_err(|err| {
                error!(
                    intent_id = %charge.provider_id,
                    db_error = ?err,
                    "payments: failed to persist intent"
                );
                PaymentError::Internal(err)
            })?;

        info!(intent_id = %entity.id, booking_id = booking.id, "payments: intent created");
        Ok(PaymentIntentDto::from(entity))
    }

    /// Applies a reported status to an intent. Safe under redelivery: a
    /// same-status report is a no-op and the repository-level CAS guards
    /// against concurrent duplicates regressing a terminal status.
    pub async fn confirm_intent(
        &self,
        intent_id: &str,
        reported: PaymentIntentStatus,
    ) -> PaymentResult<PaymentIntentDto> {
        let intent = self
            .intent_repo
            .find_by_id(intent_id)
            .await
            .map_err(|err| {
                error!(%intent_id, db_error = ?err, "payments: failed to load intent");
                PaymentError::Internal(err)
            })?
            .ok_or(PaymentError::NotFound("payment intent"))?;

        let current = PaymentIntentStatus::from_str(&intent.status)
            .ok_or_else(|| PaymentError::Internal(anyhow!("corrupt intent status")))?;

        if current == reported {
            info!(
                %intent_id,
                status = %reported,
                "payments: duplicate status report, nothing to apply"
            );
            return Ok(PaymentIntentDto::from(intent));
        }

        if !current.can_transition_to(reported) {
            warn!(
                %intent_id,
                from = %current,
                to = %reported,
                "payments: rejected illegal status transition"
            );
            return Err(PaymentError::IllegalTransition {
                from: current,
                to: reported,
            });
        }

        let applied = self
            .intent_repo
            .transition_status(intent_id, current, reported)
            .await
            .map_err(|err| {
                error!(%intent_id, db_error = ?err, "payments: status transition failed");
                PaymentError::Internal(err)
            })?;

        if !applied {
            // A concurrent delivery won the CAS. If it applied the same
            // status this is just a duplicate; anything else is a conflict.
            let latest = self
                .intent_repo
                .find_by_id(intent_id)
                .await
                .map_err(PaymentError::Internal)?
                .ok_or(PaymentError::NotFound("payment intent"))?;

            if PaymentIntentStatus::from_str(&latest.status) == Some(reported) {
                info!(
                    %intent_id,
                    status = %reported,
                    "payments: lost transition race to an identical delivery"
                );
                return Ok(PaymentIntentDto::from(latest));
            }

            return Err(PaymentError::Conflict(
                "payment intent was updated concurrently".to_string(),
            ));
        }

        info!(%intent_id, from = %current, to = %reported, "payments: status transition applied");

        let mut intent = intent;
        intent.status = reported.to_string();

        match reported {
            PaymentIntentStatus::Completed => {
                let confirmed = self
                    .booking_repo
                    .confirm_if_active(intent.booking_id)
                    .await
                    .map_err(|err| {
                        error!(
                            %intent_id,
                            booking_id = intent.booking_id,
                            db_error = ?err,
                            "payments: failed to confirm booking"
                        );
                        PaymentError::Internal(err)
                    })?;

                if !confirmed {
                    warn!(
                        %intent_id,
                        booking_id = intent.booking_id,
                        "payments: booking is cancelled, intent completes for audit only"
                    );
                }

                let receipt_url = self.persist_receipt_url(&intent.id).await?;
                intent.receipt_url = Some(receipt_url);

                if confirmed {
                    let notification = self.notification_for(&intent).await?;
                    self.dispatch(
                        self.dispatcher.booking_confirmed(&notification).await,
                        &intent.id,
                        "booking confirmation",
                    )?;
                }
            }
            PaymentIntentStatus::Failed => {
                let notification = self.notification_for(&intent).await?;
                self.dispatch(
                    self.dispatcher.payment_failed(&notification).await,
                    &intent.id,
                    "payment failure",
                )?;
            }
            PaymentIntentStatus::Refunded => {
                self.booking_repo
                    .set_payment_status(intent.booking_id, PaymentStatus::Refunded)
                    .await
                    .map_err(|err| {
                        error!(
                            %intent_id,
                            booking_id = intent.booking_id,
                            db_error = ?err,
                            "payments: failed to mark booking refunded"
                        );
                        PaymentError::Internal(err)
                    })?;

                let notification = self.notification_for(&intent).await?;
                self.dispatch(
                    self.dispatcher.payment_refunded(&notification).await,
                    &intent.id,
                    "refund notice",
                )?;
            }
            PaymentIntentStatus::Pending | PaymentIntentStatus::Processing => {}
        }

        Ok(PaymentIntentDto::from(intent))
    }

    /// Settles the charge with the provider and applies the status the
    /// provider reports back. The client only ever supplies its payment
    /// token; it cannot pick the resulting status.
    pub async fn capture_intent(
        &self,
        intent_id: &str,
        payment_method: Option<&str>,
    ) -> PaymentResult<PaymentIntentDto> {
        let intent = self
            .intent_repo
            .find_by_id(intent_id)
            .await
            .map_err(|err| {
                error!(%intent_id, db_error = ?err, "payments: failed to load intent");
                PaymentError::Internal(err)
            })?
            .ok_or(PaymentError::NotFound("payment intent"))?;

        let gateway_id = GatewayId::from_str(&intent.gateway)
            .ok_or_else(|| PaymentError::Internal(anyhow!("corrupt gateway id")))?;
        let adapter = self
            .adapters
            .get(&gateway_id)
            .ok_or(PaymentError::GatewayUnavailable(gateway_id))?;

        let status = adapter
            .confirm_charge(intent_id, payment_method)
            .await
            .map_err(|err| {
                error!(
                    %intent_id,
                    gateway = %gateway_id,
                    error = %err,
                    "payments: gateway capture failed"
                );
                PaymentError::from(err)
            })?;

        info!(%intent_id, gateway = %gateway_id, status = %status, "payments: charge captured");
        self.confirm_intent(intent_id, status).await
    }

    /// Builds and persists the hosted receipt URL for a completed intent.
    pub async fn generate_receipt(&self, intent_id: &str) -> PaymentResult<String> {
        let intent = self
            .intent_repo
            .find_by_id(intent_id)
            .await
            .map_err(PaymentError::Internal)?
            .ok_or(PaymentError::NotFound("payment intent"))?;

        if PaymentIntentStatus::from_str(&intent.status) != Some(PaymentIntentStatus::Completed) {
            return Err(PaymentError::Validation(
                "receipt is only available for completed payments".to_string(),
            ));
        }

        self.persist_receipt_url(&intent.id).await
    }

    /// Entry point for provider webhooks. Verified, mapped, and applied;
    /// duplicate and unhandled deliveries acknowledge cleanly so gateways
    /// stop redelivering.
    pub async fn handle_webhook(
        &self,
        gateway_id: GatewayId,
        payload: &[u8],
        signature: &str,
    ) -> PaymentResult<()> {
        let adapter = self
            .adapters
            .get(&gateway_id)
            .ok_or(PaymentError::GatewayUnavailable(gateway_id))?;

        let event = adapter.verify_webhook(payload, signature).map_err(|err| {
            warn!(gateway = %gateway_id, error = %err, "payments: webhook rejected");
            PaymentError::from(err)
        })?;

        info!(
            gateway = %gateway_id,
            event_type = %event.event_type,
            "payments: webhook verified"
        );

        let Some(transition) = event.transition else {
            debug!(
                gateway = %gateway_id,
                event_type = %event.event_type,
                "payments: unhandled webhook event type"
            );
            return Ok(());
        };

        match self
            .confirm_intent(&transition.intent_id, transition.status)
            .await
        {
            Ok(_) => Ok(()),
            // Out-of-order deliveries (e.g. a stale `processing` arriving
            // after `completed`) are logged and acknowledged, not retried.
            Err(PaymentError::IllegalTransition { from, to }) => {
                warn!(
                    gateway = %gateway_id,
                    intent_id = %transition.intent_id,
                    %from,
                    %to,
                    "payments: ignored out-of-order webhook delivery"
                );
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn persist_receipt_url(&self, intent_id: &str) -> PaymentResult<String> {
        let receipt_url = format!("{}/receipts/{}", self.receipt_base_url, intent_id);

        self.intent_repo
            .set_receipt_url(intent_id, &receipt_url)
            .await
            .map_err(|err| {
                error!(%intent_id, db_error = ?err, "payments: failed to persist receipt url");
                PaymentError::Internal(err)
            })?;

        Ok(receipt_url)
    }

    async fn notification_for(
        &self,
        intent: &PaymentIntentEntity,
    ) -> PaymentResult<PaymentNotification> {
        let booking: BookingEntity = self
            .booking_repo
            .find_by_id(intent.booking_id)
            .await
            .map_err(PaymentError::Internal)?
            .ok_or(PaymentError::NotFound("booking"))?;

        let currency = Currency::from_code(&intent.currency).unwrap_or(Currency::USD);
        let gateway = GatewayId::from_str(&intent.gateway).unwrap_or(GatewayId::Stripe);

        Ok(PaymentNotification {
            recipient: booking.contact_email,
            booking_id: booking.id,
            intent_id: intent.id.clone(),
            gateway,
            amount: from_minor_units(intent.amount_minor, currency),
            currency,
            receipt_url: intent.receipt_url.clone(),
        })
    }

    /// Notification failures surface to the caller but never roll back the
    /// booking/intent mutations that already happened.
    fn dispatch(
        &self,
        result: Result<(), NotificationError>,
        intent_id: &str,
        kind: &'static str,
    ) -> PaymentResult<()> {
        match result {
            Ok(()) => Ok(()),
            Err(NotificationError::Timeout) => {
                error!(%intent_id, kind, "payments: notification dispatch timed out");
                Err(PaymentError::NotificationTimeout)
            }
            Err(NotificationError::Send(message)) => {
                error!(%intent_id, kind, %message, "payments: notification dispatch failed");
                Err(PaymentError::Internal(anyhow!(
                    "{kind} notification failed"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mockall::predicate::{always, eq};
    use rust_decimal::Decimal;

    use crate::domain::repositories::bookings::MockBookingRepository;
    use crate::domain::repositories::payment_intents::MockPaymentIntentRepository;
    use crate::domain::value_objects::enums::booking_statuses::BookingStatus;
    use crate::gateways::{GatewayCharge, GatewayConfig, MockGatewayAdapter};
    use crate::notifications::MockNotificationDispatcher;

    const RECEIPT_BASE: &str = "https://pay.velatours.test";

    fn stripe_registry() -> Arc<GatewayRegistry> {
        Arc::new(GatewayRegistry::new(vec![GatewayConfig {
            id: GatewayId::Stripe,
            display_name: "Stripe".to_string(),
            enabled: true,
            test_mode: true,
            secret_key: "sk_test".to_string(),
            webhook_secret: "whsec".to_string(),
            client_id: None,
            location_id: None,
        }]))
    }

    fn sample_booking(id: i64) -> BookingEntity {
        let now = Utc::now();
        BookingEntity {
            id,
            resource_id: 7,
            user_id: uuid::Uuid::new_v4(),
            contact_email: "guest@example.com".to_string(),
            booking_date: chrono::NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            start_time: chrono::NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            duration_minutes: 120,
            party_size: 2,
            total_price_minor: 10_000,
            currency: "AED".to_string(),
            status: BookingStatus::Pending.to_string(),
            payment_status: PaymentStatus::Pending.to_string(),
            special_requests: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_intent(id: &str, booking_id: i64, status: PaymentIntentStatus) -> PaymentIntentEntity {
        let now = Utc::now();
        PaymentIntentEntity {
            id: id.to_string(),
            booking_id,
            gateway: "stripe".to_string(),
            amount_minor: 10_000,
            currency: "AED".to_string(),
            status: status.to_string(),
            metadata: serde_json::json!({}),
            client_secret: Some("pi_secret".to_string()),
            receipt_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn usecase(
        intent_repo: MockPaymentIntentRepository,
        booking_repo: MockBookingRepository,
        dispatcher: MockNotificationDispatcher,
        adapter: Option<MockGatewayAdapter>,
    ) -> PaymentUseCase<MockPaymentIntentRepository, MockBookingRepository, MockNotificationDispatcher>
    {
        let mut adapters: HashMap<GatewayId, Arc<dyn GatewayAdapter>> = HashMap::new();
        if let Some(adapter) = adapter {
            adapters.insert(GatewayId::Stripe, Arc::new(adapter));
        }

        PaymentUseCase::new(
            Arc::new(intent_repo),
            Arc::new(booking_repo),
            Arc::new(dispatcher),
            stripe_registry(),
            adapters,
            RECEIPT_BASE.to_string(),
        )
    }

    fn create_model(amount: Decimal, currency: &str, gateway: &str) -> CreatePaymentIntentModel {
        CreatePaymentIntentModel {
            amount,
            currency: currency.to_string(),
            gateway_id: gateway.to_string(),
            booking_id: 42,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn create_intent_echoes_the_request_and_starts_pending() {
        let mut intent_repo = MockPaymentIntentRepository::new();
        let mut booking_repo = MockBookingRepository::new();
        let mut adapter = MockGatewayAdapter::new();

        booking_repo
            .expect_find_by_id()
            .with(eq(42i64))
            .returning(|id| Box::pin(async move { Ok(Some(sample_booking(id))) }));

        adapter
            .expect_create_charge()
            .withf(|req| req.booking_id == 42 && req.amount == Decimal::new(10000, 2))
            .returning(|_| {
                Box::pin(async {
                    Ok(GatewayCharge {
                        provider_id: "pi_abc".to_string(),
                        client_secret: Some("secret_abc".to_string()),
                        status: PaymentIntentStatus::Pending,
                    })
                })
            });

        intent_repo
            .expect_insert()
            .withf(|entity| {
                entity.id == "pi_abc"
                    && entity.booking_id == 42
                    && entity.gateway == "stripe"
                    && entity.amount_minor == 10_000
                    && entity.currency == "AED"
                    && entity.status == "pending"
            })
            .returning(|entity| {
                Box::pin(async move {
                    let now = Utc::now();
                    Ok(PaymentIntentEntity {
                        id: entity.id,
                        booking_id: entity.booking_id,
                        gateway: entity.gateway,
                        amount_minor: entity.amount_minor,
                        currency: entity.currency,
                        status: entity.status,
                        metadata: entity.metadata,
                        client_secret: entity.client_secret,
                        receipt_url: None,
                        created_at: now,
                        updated_at: now,
                    })
                })
            });

        let usecase = usecase(
            intent_repo,
            booking_repo,
            MockNotificationDispatcher::new(),
            Some(adapter),
        );

        let dto = usecase
            .create_intent(create_model(Decimal::new(10000, 2), "AED", "stripe"))
            .await
            .unwrap();

        assert_eq!(dto.id, "pi_abc");
        assert_eq!(dto.amount, Decimal::new(10000, 2));
        assert_eq!(dto.currency, "AED");
        assert_eq!(dto.gateway_id, "stripe");
        assert_eq!(dto.booking_id, 42);
        assert_eq!(dto.status, PaymentIntentStatus::Pending);
        assert_eq!(dto.client_secret.as_deref(), Some("secret_abc"));
    }

    #[tokio::test]
    async fn create_intent_rejects_bad_input_before_any_side_effect() {
        // No expectations set: any repository or gateway call would panic.
        let usecase = usecase(
            MockPaymentIntentRepository::new(),
            MockBookingRepository::new(),
            MockNotificationDispatcher::new(),
            Some(MockGatewayAdapter::new()),
        );

        let err = usecase
            .create_intent(create_model(Decimal::ZERO, "AED", "stripe"))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));

        let err = usecase
            .create_intent(create_model(Decimal::ONE, "DIRHAMS", "stripe"))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));

        let err = usecase
            .create_intent(create_model(Decimal::ONE, "AED", "bitcoin"))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));

        // Configured but not enabled in the registry / no adapter built.
        let err = usecase
            .create_intent(create_model(Decimal::ONE, "AED", "paypal"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PaymentError::GatewayUnavailable(GatewayId::Paypal)
        ));
    }

    #[tokio::test]
    async fn gateway_failure_leaves_no_intent_persisted() {
        let intent_repo = MockPaymentIntentRepository::new(); // insert would panic
        let mut booking_repo = MockBookingRepository::new();
        let mut adapter = MockGatewayAdapter::new();

        booking_repo
            .expect_find_by_id()
            .returning(|id| Box::pin(async move { Ok(Some(sample_booking(id))) }));

        adapter.expect_create_charge().returning(|_| {
            Box::pin(async {
                Err(GatewayError::Upstream {
                    provider: "stripe",
                    message: "card declined".to_string(),
                })
            })
        });

        let usecase = usecase(
            intent_repo,
            booking_repo,
            MockNotificationDispatcher::new(),
            Some(adapter),
        );

        let err = usecase
            .create_intent(create_model(Decimal::new(10000, 2), "AED", "stripe"))
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::Gateway { provider: "stripe", .. }));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn completing_an_intent_confirms_the_booking_and_notifies_once() {
        let mut intent_repo = MockPaymentIntentRepository::new();
        let mut booking_repo = MockBookingRepository::new();
        let mut dispatcher = MockNotificationDispatcher::new();

        intent_repo
            .expect_find_by_id()
            .with(eq("pi_abc"))
            .returning(|id| {
                let id = id.to_string();
                Box::pin(async move {
                    Ok(Some(sample_intent(&id, 42, PaymentIntentStatus::Pending)))
                })
            });

        intent_repo
            .expect_transition_status()
            .with(
                eq("pi_abc"),
                eq(PaymentIntentStatus::Pending),
                eq(PaymentIntentStatus::Completed),
            )
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(true) }));

        intent_repo
            .expect_set_receipt_url()
            .with(eq("pi_abc"), always())
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(()) }));

        booking_repo
            .expect_confirm_if_active()
            .with(eq(42i64))
            .times(1)
            .returning(|_| Box::pin(async { Ok(true) }));

        booking_repo
            .expect_find_by_id()
            .with(eq(42i64))
            .returning(|id| Box::pin(async move { Ok(Some(sample_booking(id))) }));

        dispatcher
            .expect_booking_confirmed()
            .withf(|note| note.booking_id == 42 && note.recipient == "guest@example.com")
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let usecase = usecase(intent_repo, booking_repo, dispatcher, None);

        let dto = usecase
            .confirm_intent("pi_abc", PaymentIntentStatus::Completed)
            .await
            .unwrap();

        assert_eq!(dto.status, PaymentIntentStatus::Completed);
        assert_eq!(
            dto.receipt_url.as_deref(),
            Some("https://pay.velatours.test/receipts/pi_abc")
        );
    }

    #[tokio::test]
    async fn confirm_is_idempotent_for_a_repeated_completed_report() {
        let mut intent_repo = MockPaymentIntentRepository::new();
        let booking_repo = MockBookingRepository::new();
        let dispatcher = MockNotificationDispatcher::new();

        // Intent already completed; no transition, booking mutation or
        // notification expectations are registered, so any call panics.
        intent_repo.expect_find_by_id().returning(|id| {
            let id = id.to_string();
            Box::pin(async move {
                Ok(Some(sample_intent(&id, 42, PaymentIntentStatus::Completed)))
            })
        });

        let usecase = usecase(intent_repo, booking_repo, dispatcher, None);

        let dto = usecase
            .confirm_intent("pi_abc", PaymentIntentStatus::Completed)
            .await
            .unwrap();
        assert_eq!(dto.status, PaymentIntentStatus::Completed);
    }

    #[tokio::test]
    async fn terminal_statuses_reject_further_transitions() {
        for terminal in [PaymentIntentStatus::Failed, PaymentIntentStatus::Refunded] {
            let mut intent_repo = MockPaymentIntentRepository::new();
            intent_repo.expect_find_by_id().returning(move |id| {
                let id = id.to_string();
                Box::pin(async move { Ok(Some(sample_intent(&id, 42, terminal))) })
            });

            let usecase = usecase(
                intent_repo,
                MockBookingRepository::new(),
                MockNotificationDispatcher::new(),
                None,
            );

            let err = usecase
                .confirm_intent("pi_abc", PaymentIntentStatus::Completed)
                .await
                .unwrap_err();
            assert!(matches!(err, PaymentError::IllegalTransition { .. }));
            assert_eq!(err.status_code(), StatusCode::CONFLICT);
        }
    }

    #[tokio::test]
    async fn a_cancelled_booking_is_not_reconfirmed_but_the_intent_completes() {
        let mut intent_repo = MockPaymentIntentRepository::new();
        let mut booking_repo = MockBookingRepository::new();
        let dispatcher = MockNotificationDispatcher::new(); // no email expected

        intent_repo.expect_find_by_id().returning(|id| {
            let id = id.to_string();
            Box::pin(async move { Ok(Some(sample_intent(&id, 42, PaymentIntentStatus::Pending))) })
        });
        intent_repo
            .expect_transition_status()
            .returning(|_, _, _| Box::pin(async { Ok(true) }));
        intent_repo
            .expect_set_receipt_url()
            .returning(|_, _| Box::pin(async { Ok(()) }));

        // Guarded update refuses: the booking was cancelled meanwhile.
        booking_repo
            .expect_confirm_if_active()
            .with(eq(42i64))
            .times(1)
            .returning(|_| Box::pin(async { Ok(false) }));

        let usecase = usecase(intent_repo, booking_repo, dispatcher, None);

        let dto = usecase
            .confirm_intent("pi_abc", PaymentIntentStatus::Completed)
            .await
            .unwrap();
        assert_eq!(dto.status, PaymentIntentStatus::Completed);
    }

    #[tokio::test]
    async fn refund_updates_the_booking_payment_status_only() {
        let mut intent_repo = MockPaymentIntentRepository::new();
        let mut booking_repo = MockBookingRepository::new();
        let mut dispatcher = MockNotificationDispatcher::new();

        intent_repo.expect_find_by_id().returning(|id| {
            let id = id.to_string();
            Box::pin(async move {
                Ok(Some(sample_intent(&id, 42, PaymentIntentStatus::Completed)))
            })
        });
        intent_repo
            .expect_transition_status()
            .with(
                eq("pi_abc"),
                eq(PaymentIntentStatus::Completed),
                eq(PaymentIntentStatus::Refunded),
            )
            .returning(|_, _, _| Box::pin(async { Ok(true) }));

        booking_repo
            .expect_set_payment_status()
            .with(eq(42i64), eq(PaymentStatus::Refunded))
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(()) }));
        booking_repo
            .expect_find_by_id()
            .returning(|id| Box::pin(async move { Ok(Some(sample_booking(id))) }));
        // cancel() is never expected: refund does not cancel the booking

        dispatcher
            .expect_payment_refunded()
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let usecase = usecase(intent_repo, booking_repo, dispatcher, None);

        let dto = usecase
            .confirm_intent("pi_abc", PaymentIntentStatus::Refunded)
            .await
            .unwrap();
        assert_eq!(dto.status, PaymentIntentStatus::Refunded);
    }

    #[tokio::test]
    async fn a_lost_cas_race_against_an_identical_delivery_is_a_no_op() {
        let mut intent_repo = MockPaymentIntentRepository::new();

        let mut first = true;
        intent_repo.expect_find_by_id().returning(move |id| {
            let id = id.to_string();
            let status = if first {
                first = false;
                PaymentIntentStatus::Pending
            } else {
                PaymentIntentStatus::Completed
            };
            Box::pin(async move { Ok(Some(sample_intent(&id, 42, status))) })
        });
        intent_repo
            .expect_transition_status()
            .returning(|_, _, _| Box::pin(async { Ok(false) }));

        let usecase = usecase(
            intent_repo,
            MockBookingRepository::new(),
            MockNotificationDispatcher::new(),
            None,
        );

        let dto = usecase
            .confirm_intent("pi_abc", PaymentIntentStatus::Completed)
            .await
            .unwrap();
        assert_eq!(dto.status, PaymentIntentStatus::Completed);
    }

    #[tokio::test]
    async fn capture_applies_the_status_the_provider_reports() {
        let mut intent_repo = MockPaymentIntentRepository::new();
        let mut booking_repo = MockBookingRepository::new();
        let mut dispatcher = MockNotificationDispatcher::new();
        let mut adapter = MockGatewayAdapter::new();

        intent_repo.expect_find_by_id().returning(|id| {
            let id = id.to_string();
            Box::pin(async move { Ok(Some(sample_intent(&id, 42, PaymentIntentStatus::Pending))) })
        });

        // The provider settles the charge; its answer drives the transition.
        adapter
            .expect_confirm_charge()
            .withf(|provider_id, token| provider_id == "pi_abc" && token == &Some("pm_card"))
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(PaymentIntentStatus::Completed) }));

        intent_repo
            .expect_transition_status()
            .with(
                eq("pi_abc"),
                eq(PaymentIntentStatus::Pending),
                eq(PaymentIntentStatus::Completed),
            )
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(true) }));
        intent_repo
            .expect_set_receipt_url()
            .returning(|_, _| Box::pin(async { Ok(()) }));

        booking_repo
            .expect_confirm_if_active()
            .with(eq(42i64))
            .times(1)
            .returning(|_| Box::pin(async { Ok(true) }));
        booking_repo
            .expect_find_by_id()
            .returning(|id| Box::pin(async move { Ok(Some(sample_booking(id))) }));

        dispatcher
            .expect_booking_confirmed()
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let usecase = usecase(intent_repo, booking_repo, dispatcher, Some(adapter));

        let dto = usecase
            .capture_intent("pi_abc", Some("pm_card"))
            .await
            .unwrap();
        assert_eq!(dto.status, PaymentIntentStatus::Completed);
    }

    #[tokio::test]
    async fn a_declined_capture_records_the_failure() {
        let mut intent_repo = MockPaymentIntentRepository::new();
        let mut booking_repo = MockBookingRepository::new();
        let mut dispatcher = MockNotificationDispatcher::new();
        let mut adapter = MockGatewayAdapter::new();

        intent_repo.expect_find_by_id().returning(|id| {
            let id = id.to_string();
            Box::pin(async move { Ok(Some(sample_intent(&id, 42, PaymentIntentStatus::Pending))) })
        });
        adapter
            .expect_confirm_charge()
            .returning(|_, _| Box::pin(async { Ok(PaymentIntentStatus::Failed) }));
        intent_repo
            .expect_transition_status()
            .with(
                eq("pi_abc"),
                eq(PaymentIntentStatus::Pending),
                eq(PaymentIntentStatus::Failed),
            )
            .returning(|_, _, _| Box::pin(async { Ok(true) }));
        booking_repo
            .expect_find_by_id()
            .returning(|id| Box::pin(async move { Ok(Some(sample_booking(id))) }));
        dispatcher
            .expect_payment_failed()
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let usecase = usecase(intent_repo, booking_repo, dispatcher, Some(adapter));

        let dto = usecase.capture_intent("pi_abc", None).await.unwrap();
        assert_eq!(dto.status, PaymentIntentStatus::Failed);
    }

    #[tokio::test]
    async fn a_gateway_error_during_capture_leaves_the_intent_untouched() {
        let mut intent_repo = MockPaymentIntentRepository::new();
        let mut adapter = MockGatewayAdapter::new();

        intent_repo.expect_find_by_id().returning(|id| {
            let id = id.to_string();
            Box::pin(async move { Ok(Some(sample_intent(&id, 42, PaymentIntentStatus::Pending))) })
        });
        // transition_status would panic: no expectation registered
        adapter
            .expect_confirm_charge()
            .returning(|_, _| Box::pin(async { Err(GatewayError::Timeout("stripe")) }));

        let usecase = usecase(
            intent_repo,
            MockBookingRepository::new(),
            MockNotificationDispatcher::new(),
            Some(adapter),
        );

        let err = usecase.capture_intent("pi_abc", None).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn receipt_generation_requires_a_completed_intent() {
        let mut intent_repo = MockPaymentIntentRepository::new();
        intent_repo.expect_find_by_id().returning(|id| {
            let id = id.to_string();
            Box::pin(async move { Ok(Some(sample_intent(&id, 42, PaymentIntentStatus::Pending))) })
        });

        let usecase = usecase(
            intent_repo,
            MockBookingRepository::new(),
            MockNotificationDispatcher::new(),
            None,
        );

        let err = usecase.generate_receipt("pi_abc").await.unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
    }

    #[tokio::test]
    async fn duplicate_webhook_for_a_completed_intent_acks_without_a_second_send() {
        let mut intent_repo = MockPaymentIntentRepository::new();
        let booking_repo = MockBookingRepository::new();
        let dispatcher = MockNotificationDispatcher::new(); // a send would panic
        let mut adapter = MockGatewayAdapter::new();

        adapter.expect_verify_webhook().returning(|_, _| {
            Ok(crate::gateways::WebhookEvent {
                event_type: "payment_intent.succeeded".to_string(),
                transition: Some(crate::gateways::IntentTransition {
                    intent_id: "pi_abc".to_string(),
                    status: PaymentIntentStatus::Completed,
                }),
            })
        });

        intent_repo.expect_find_by_id().returning(|id| {
            let id = id.to_string();
            Box::pin(async move {
                Ok(Some(sample_intent(&id, 42, PaymentIntentStatus::Completed)))
            })
        });

        let usecase = usecase(intent_repo, booking_repo, dispatcher, Some(adapter));

        usecase
            .handle_webhook(GatewayId::Stripe, b"{}", "t=1,v1=sig")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn out_of_order_webhook_is_acknowledged_not_errored() {
        let mut intent_repo = MockPaymentIntentRepository::new();
        let mut adapter = MockGatewayAdapter::new();

        adapter.expect_verify_webhook().returning(|_, _| {
            Ok(crate::gateways::WebhookEvent {
                event_type: "payment_intent.processing".to_string(),
                transition: Some(crate::gateways::IntentTransition {
                    intent_id: "pi_abc".to_string(),
                    status: PaymentIntentStatus::Processing,
                }),
            })
        });

        intent_repo.expect_find_by_id().returning(|id| {
            let id = id.to_string();
            Box::pin(async move {
                Ok(Some(sample_intent(&id, 42, PaymentIntentStatus::Completed)))
            })
        });

        let usecase = usecase(
            intent_repo,
            MockBookingRepository::new(),
            MockNotificationDispatcher::new(),
            Some(adapter),
        );

        usecase
            .handle_webhook(GatewayId::Stripe, b"{}", "t=1,v1=sig")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn invalid_webhook_signature_maps_to_a_validation_error() {
        let mut adapter = MockGatewayAdapter::new();
        adapter
            .expect_verify_webhook()
            .returning(|_, _| Err(GatewayError::InvalidSignature));

        let usecase = usecase(
            MockPaymentIntentRepository::new(),
            MockBookingRepository::new(),
            MockNotificationDispatcher::new(),
            Some(adapter),
        );

        let err = usecase
            .handle_webhook(GatewayId::Stripe, b"{}", "bogus")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
