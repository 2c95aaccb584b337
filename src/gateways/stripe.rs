use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use sha2::Sha256;
use tracing::error;

use crate::domain::value_objects::enums::{
    gateways::GatewayId, payment_intent_statuses::PaymentIntentStatus,
};
use crate::domain::value_objects::payments::to_minor_units;
use crate::gateways::{
    ChargeRequest, GatewayAdapter, GatewayCharge, GatewayConfig, GatewayError, IntentTransition,
    WebhookEvent,
};

type HmacSha256 = Hmac<Sha256>;

const PROVIDER: &str = "stripe";
const API_BASE: &str = "https://api.stripe.com";

/// Minimal Stripe PaymentIntents client built on reqwest.
pub struct StripeAdapter {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    #[serde(rename = "type")]
    type_: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    client_secret: Option<String>,
    status: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

impl StripeAdapter {
    pub fn new(config: &GatewayConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }

    /// Maps Stripe's PaymentIntent status vocabulary onto ours.
    fn map_status(status: &str) -> PaymentIntentStatus {
        match status {
            "processing" => PaymentIntentStatus::Processing,
            "succeeded" => PaymentIntentStatus::Completed,
            "canceled" => PaymentIntentStatus::Failed,
            // requires_payment_method / requires_confirmation / requires_action
            _ => PaymentIntentStatus::Pending,
        }
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response, GatewayError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let (stripe_error_type, stripe_error_code, stripe_error_message) =
            match serde_json::from_str::<StripeErrorEnvelope>(&body) {
                Ok(envelope) => (
                    envelope.error.type_,
                    envelope.error.code,
                    envelope.error.message,
                ),
                Err(_) => (None, None, None),
            };

        error!(
            status = %status,
            stripe_error_type = ?stripe_error_type,
            stripe_error_code = ?stripe_error_code,
            stripe_error_message = ?stripe_error_message,
            response_body = %body,
            context = %context,
            "stripe api request failed"
        );

        Err(GatewayError::Upstream {
            provider: PROVIDER,
            message: format!("{context} failed with status {status}"),
        })
    }
}

#[async_trait]
impl GatewayAdapter for StripeAdapter {
    fn id(&self) -> GatewayId {
        GatewayId::Stripe
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<GatewayCharge, GatewayError> {
        // https://stripe.com/docs/api/payment_intents/create
        let amount_minor =
            to_minor_units(request.amount, request.currency).ok_or(GatewayError::Upstream {
                provider: PROVIDER,
                message: "amount is not representable in minor units".to_string(),
            })?;

        let mut body: Vec<(String, String)> = vec![
            ("amount".to_string(), amount_minor.to_string()),
            (
                "currency".to_string(),
                request.currency.code().to_lowercase(),
            ),
            (
                "metadata[booking_id]".to_string(),
                request.booking_id.to_string(),
            ),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];

        if let Some(metadata) = request.metadata.as_object() {
            for (key, value) in metadata {
                let value = match value.as_str() {
                    Some(text) => text.to_string(),
                    None => value.to_string(),
                };
                body.push((format!("metadata[{key}]"), value));
            }
        }

        let resp = self
            .http
            .post(format!("{API_BASE}/v1/payment_intents"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&body)
            .send()
            .await
            .map_err(|err| GatewayError::from_reqwest(PROVIDER, err))?;
        let resp = Self::ensure_success(resp, "create payment intent").await?;

        let parsed: StripePaymentIntent = resp
            .json()
            .await
            .map_err(|err| GatewayError::from_reqwest(PROVIDER, err))?;

        Ok(GatewayCharge {
            provider_id: parsed.id,
            client_secret: parsed.client_secret,
            status: Self::map_status(&parsed.status),
        })
    }

    async fn confirm_charge(
        &self,
        provider_id: &str,
        token: Option<&str>,
    ) -> Result<PaymentIntentStatus, GatewayError> {
        // https://stripe.com/docs/api/payment_intents/confirm
        let mut body: Vec<(String, String)> = Vec::new();
        if let Some(payment_method) = token {
            body.push(("payment_method".to_string(), payment_method.to_string()));
        }

        let resp = self
            .http
            .post(format!("{API_BASE}/v1/payment_intents/{provider_id}/confirm"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&body)
            .send()
            .await
            .map_err(|err| GatewayError::from_reqwest(PROVIDER, err))?;
        let resp = Self::ensure_success(resp, "confirm payment intent").await?;

        let parsed: StripePaymentIntent = resp
            .json()
            .await
            .map_err(|err| GatewayError::from_reqwest(PROVIDER, err))?;

        Ok(Self::map_status(&parsed.status))
    }

    /// Verifies the `Stripe-Signature` header.
    /// https://stripe.com/docs/webhooks/signatures
    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, GatewayError> {
        let mut timestamp: Option<&str> = None;
        let mut signature: Option<&str> = None;

        for part in signature_header.split(',') {
            if let Some(rest) = part.strip_prefix("t=") {
                timestamp = Some(rest);
            } else if let Some(rest) = part.strip_prefix("v1=") {
                signature = Some(rest);
            }
        }

        let (timestamp, signature) = match (timestamp, signature) {
            (Some(t), Some(s)) => (t, s),
            _ => return Err(GatewayError::InvalidSignature),
        };

        let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| GatewayError::InvalidSignature)?;
        mac.update(signed_payload.as_bytes());
        let provided = hex::decode(signature).map_err(|_| GatewayError::InvalidSignature)?;
        // verify_slice compares in constant time
        mac.verify_slice(&provided)
            .map_err(|_| GatewayError::InvalidSignature)?;

        let event: StripeEvent =
            serde_json::from_slice(payload).map_err(|_| GatewayError::InvalidSignature)?;

        let status = match event.type_.as_str() {
            "payment_intent.processing" => Some(PaymentIntentStatus::Processing),
            "payment_intent.succeeded" => Some(PaymentIntentStatus::Completed),
            "payment_intent.payment_failed" => Some(PaymentIntentStatus::Failed),
            "charge.refunded" => Some(PaymentIntentStatus::Refunded),
            _ => None,
        };

        // charge.* events carry the intent id under `payment_intent`
        let intent_id = event
            .data
            .object
            .get("payment_intent")
            .and_then(|value| value.as_str())
            .or_else(|| event.data.object.get("id").and_then(|value| value.as_str()))
            .map(|value| value.to_string());

        let transition = match (intent_id, status) {
            (Some(intent_id), Some(status)) => Some(IntentTransition { intent_id, status }),
            _ => None,
        };

        Ok(WebhookEvent {
            event_type: event.type_,
            transition,
        })
    }
}
