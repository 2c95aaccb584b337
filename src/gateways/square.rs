use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use sha2::Sha256;
use tracing::error;
use uuid::Uuid;

use crate::domain::value_objects::enums::{
    gateways::GatewayId, payment_intent_statuses::PaymentIntentStatus,
};
use crate::domain::value_objects::payments::to_minor_units;
use crate::gateways::{
    ChargeRequest, GatewayAdapter, GatewayCharge, GatewayConfig, GatewayError, IntentTransition,
    WebhookEvent,
};

type HmacSha256 = Hmac<Sha256>;

const PROVIDER: &str = "square";

/// Square Payments client. Payments are created with `autocomplete: false`
/// so the complete call acts as the confirm step.
pub struct SquareAdapter {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
    location_id: String,
    api_base: &'static str,
}

#[derive(Debug, Deserialize)]
struct SquarePaymentEnvelope {
    payment: SquarePayment,
}

#[derive(Debug, Deserialize)]
struct SquarePayment {
    id: String,
    status: String,
}

impl SquareAdapter {
    pub fn new(config: &GatewayConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
            location_id: config.location_id.clone().unwrap_or_default(),
            api_base: if config.test_mode {
                "https://connect.squareupsandbox.com"
            } else {
                "https://connect.squareup.com"
            },
        }
    }

    fn map_status(status: &str) -> PaymentIntentStatus {
        match status {
            "APPROVED" => PaymentIntentStatus::Processing,
            "COMPLETED" => PaymentIntentStatus::Completed,
            "CANCELED" | "FAILED" => PaymentIntentStatus::Failed,
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

        let body = resp.text().await.unwrap_or_default();
        error!(
            status = %status,
            response_body = %body,
            context = %context,
            "square api request failed"
        );

        Err(GatewayError::Upstream {
            provider: PROVIDER,
            message: format!("{context} failed with status {status}"),
        })
    }
}

#[async_trait]
impl GatewayAdapter for SquareAdapter {
    fn id(&self) -> GatewayId {
        GatewayId::Square
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<GatewayCharge, GatewayError> {
        // https://developer.squareup.com/reference/square/payments-api/create-payment
        let amount_minor =
            to_minor_units(request.amount, request.currency).ok_or(GatewayError::Upstream {
                provider: PROVIDER,
                message: "amount is not representable in minor units".to_string(),
            })?;

        // The card token arrives through checkout metadata.
        let source_id = request
            .metadata
            .get("source_id")
            .and_then(|value| value.as_str())
            .unwrap_or("EXTERNAL");

        let body = serde_json::json!({
            "idempotency_key": Uuid::new_v4().to_string(),
            "source_id": source_id,
            "location_id": self.location_id,
            "reference_id": request.booking_id.to_string(),
            "autocomplete": false,
            "amount_money": {
                "amount": amount_minor,
                "currency": request.currency.code(),
            },
        });

        let resp = self
            .http
            .post(format!("{}/v2/payments", self.api_base))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .json(&body)
            .send()
            .await
            .map_err(|err| GatewayError::from_reqwest(PROVIDER, err))?;
        let resp = Self::ensure_success(resp, "create payment").await?;

        let parsed: SquarePaymentEnvelope = resp
            .json()
            .await
            .map_err(|err| GatewayError::from_reqwest(PROVIDER, err))?;

        Ok(GatewayCharge {
            provider_id: parsed.payment.id,
            client_secret: None,
            status: Self::map_status(&parsed.payment.status),
        })
    }

    async fn confirm_charge(
        &self,
        provider_id: &str,
        _token: Option<&str>,
    ) -> Result<PaymentIntentStatus, GatewayError> {
        // https://developer.squareup.com/reference/square/payments-api/complete-payment
        let resp = self
            .http
            .post(format!("{}/v2/payments/{provider_id}/complete", self.api_base))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|err| GatewayError::from_reqwest(PROVIDER, err))?;
        let resp = Self::ensure_success(resp, "complete payment").await?;

        let parsed: SquarePaymentEnvelope = resp
            .json()
            .await
            .map_err(|err| GatewayError::from_reqwest(PROVIDER, err))?;
        Ok(Self::map_status(&parsed.payment.status))
    }

    /// Square signs webhooks with base64-encoded HMAC-SHA256 in the
    /// `x-square-hmacsha256-signature` header.
    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, GatewayError> {
        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| GatewayError::InvalidSignature)?;
        mac.update(payload);
        let provided = BASE64
            .decode(signature_header.trim())
            .map_err(|_| GatewayError::InvalidSignature)?;
        mac.verify_slice(&provided)
            .map_err(|_| GatewayError::InvalidSignature)?;

        #[derive(Debug, Deserialize)]
        struct SquareWebhookEnvelope {
            #[serde(rename = "type")]
            type_: String,
            data: serde_json::Value,
        }

        let envelope: SquareWebhookEnvelope =
            serde_json::from_slice(payload).map_err(|_| GatewayError::InvalidSignature)?;

        let transition = if envelope.type_ == "payment.updated" {
            let payment = envelope.data.pointer("/object/payment");
            let intent_id = payment
                .and_then(|p| p.get("id"))
                .and_then(|value| value.as_str());
            let status = payment
                .and_then(|p| p.get("status"))
                .and_then(|value| value.as_str())
                .map(Self::map_status);

            match (intent_id, status) {
                // payment.updated also fires for statuses we treat as
                // pending; those carry no transition for the orchestrator.
                (Some(intent_id), Some(status)) if status != PaymentIntentStatus::Pending => {
                    Some(IntentTransition {
                        intent_id: intent_id.to_string(),
                        status,
                    })
                }
                _ => None,
            }
        } else if envelope.type_ == "refund.updated" {
            envelope
                .data
                .pointer("/object/refund/payment_id")
                .and_then(|value| value.as_str())
                .map(|intent_id| IntentTransition {
                    intent_id: intent_id.to_string(),
                    status: PaymentIntentStatus::Refunded,
                })
        } else {
            None
        };

        Ok(WebhookEvent {
            event_type: envelope.type_,
            transition,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> SquareAdapter {
        let config = GatewayConfig {
            id: GatewayId::Square,
            display_name: "Square".to_string(),
            enabled: true,
            test_mode: true,
            secret_key: "sq_secret".to_string(),
            webhook_secret: "sq_webhook_secret".to_string(),
            client_id: None,
            location_id: Some("loc_1".to_string()),
        };
        SquareAdapter::new(&config, reqwest::Client::new())
    }

    fn sign(secret: &str, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload);
        BASE64.encode(mac.finalize().into_bytes())
    }

    #[test]
    fn payment_updated_completed_maps_to_a_transition() {
        let adapter = adapter();
        let payload =
            br#"{"type":"payment.updated","data":{"object":{"payment":{"id":"sq_1","status":"COMPLETED"}}}}"#;
        let signature = sign("sq_webhook_secret", payload);

        let event = adapter.verify_webhook(payload, &signature).unwrap();
        let transition = event.transition.unwrap();
        assert_eq!(transition.intent_id, "sq_1");
        assert_eq!(transition.status, PaymentIntentStatus::Completed);
    }

    #[test]
    fn refund_updated_maps_to_the_original_payment() {
        let adapter = adapter();
        let payload =
            br#"{"type":"refund.updated","data":{"object":{"refund":{"id":"rf_1","payment_id":"sq_1"}}}}"#;
        let signature = sign("sq_webhook_secret", payload);

        let event = adapter.verify_webhook(payload, &signature).unwrap();
        let transition = event.transition.unwrap();
        assert_eq!(transition.intent_id, "sq_1");
        assert_eq!(transition.status, PaymentIntentStatus::Refunded);
    }

    #[test]
    fn rejects_an_invalid_signature() {
        let adapter = adapter();
        let payload = br#"{"type":"payment.updated","data":{}}"#;
        let result = adapter.verify_webhook(payload, "AAAA");
        assert!(matches!(result, Err(GatewayError::InvalidSignature)));
    }
}
