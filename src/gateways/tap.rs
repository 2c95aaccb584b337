use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use sha2::Sha256;
use tracing::error;

use crate::domain::value_objects::enums::{
    gateways::GatewayId, payment_intent_statuses::PaymentIntentStatus,
};
use crate::gateways::{
    ChargeRequest, GatewayAdapter, GatewayCharge, GatewayConfig, GatewayError, IntentTransition,
    WebhookEvent,
};

type HmacSha256 = Hmac<Sha256>;

const PROVIDER: &str = "tap";
const API_BASE: &str = "https://api.tap.company";

/// Tap Payments charges client (the regional gateway for AED checkouts).
pub struct TapAdapter {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
}

#[derive(Debug, Deserialize)]
struct TapCharge {
    id: String,
    status: String,
    transaction: Option<TapTransaction>,
}

#[derive(Debug, Deserialize)]
struct TapTransaction {
    url: Option<String>,
}

impl TapAdapter {
    pub fn new(config: &GatewayConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }

    fn map_status(status: &str) -> PaymentIntentStatus {
        match status {
            "IN_PROGRESS" | "AUTHORIZED" => PaymentIntentStatus::Processing,
            "CAPTURED" => PaymentIntentStatus::Completed,
            "DECLINED" | "FAILED" | "CANCELLED" | "ABANDONED" => PaymentIntentStatus::Failed,
            "REFUNDED" => PaymentIntentStatus::Refunded,
            // INITIATED
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
            "tap api request failed"
        );

        Err(GatewayError::Upstream {
            provider: PROVIDER,
            message: format!("{context} failed with status {status}"),
        })
    }
}

#[async_trait]
impl GatewayAdapter for TapAdapter {
    fn id(&self) -> GatewayId {
        GatewayId::Tap
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<GatewayCharge, GatewayError> {
        // https://developers.tap.company/reference/create-a-charge
        // Tap takes decimal amounts.
        let body = serde_json::json!({
            "amount": request.amount.round_dp(request.currency.decimals()),
            "currency": request.currency.code(),
            "reference": { "order": request.booking_id.to_string() },
            "source": { "id": "src_all" },
        });

        let resp = self
            .http
            .post(format!("{API_BASE}/v2/charges"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .json(&body)
            .send()
            .await
            .map_err(|err| GatewayError::from_reqwest(PROVIDER, err))?;
        let resp = Self::ensure_success(resp, "create charge").await?;

        let parsed: TapCharge = resp
            .json()
            .await
            .map_err(|err| GatewayError::from_reqwest(PROVIDER, err))?;

        // The hosted payment page URL stands in for a client secret.
        let payment_url = parsed.transaction.and_then(|transaction| transaction.url);

        Ok(GatewayCharge {
            provider_id: parsed.id,
            client_secret: payment_url,
            status: Self::map_status(&parsed.status),
        })
    }

    async fn confirm_charge(
        &self,
        provider_id: &str,
        _token: Option<&str>,
    ) -> Result<PaymentIntentStatus, GatewayError> {
        // Tap charges settle on the hosted page; confirm is a status poll.
        // https://developers.tap.company/reference/retrieve-a-charge
        let resp = self
            .http
            .get(format!("{API_BASE}/v2/charges/{provider_id}"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await
            .map_err(|err| GatewayError::from_reqwest(PROVIDER, err))?;
        let resp = Self::ensure_success(resp, "retrieve charge").await?;

        let parsed: TapCharge = resp
            .json()
            .await
            .map_err(|err| GatewayError::from_reqwest(PROVIDER, err))?;
        Ok(Self::map_status(&parsed.status))
    }

    /// Tap posts back with an HMAC-SHA256 hashstring over the raw payload.
    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, GatewayError> {
        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| GatewayError::InvalidSignature)?;
        mac.update(payload);
        let provided = hex::decode(signature_header.trim())
            .map_err(|_| GatewayError::InvalidSignature)?;
        mac.verify_slice(&provided)
            .map_err(|_| GatewayError::InvalidSignature)?;

        let charge: TapCharge =
            serde_json::from_slice(payload).map_err(|_| GatewayError::InvalidSignature)?;

        let status = Self::map_status(&charge.status);
        let transition = if status == PaymentIntentStatus::Pending {
            None
        } else {
            Some(IntentTransition {
                intent_id: charge.id,
                status,
            })
        };

        Ok(WebhookEvent {
            event_type: format!("charge.{}", charge.status.to_lowercase()),
            transition,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> TapAdapter {
        let config = GatewayConfig {
            id: GatewayId::Tap,
            display_name: "Tap".to_string(),
            enabled: true,
            test_mode: true,
            secret_key: "tap_secret".to_string(),
            webhook_secret: "tap_webhook_secret".to_string(),
            client_id: None,
            location_id: None,
        };
        TapAdapter::new(&config, reqwest::Client::new())
    }

    fn sign(secret: &str, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn a_captured_charge_maps_to_completed() {
        let adapter = adapter();
        let payload = br#"{"id":"chg_1","status":"CAPTURED"}"#;
        let signature = sign("tap_webhook_secret", payload);

        let event = adapter.verify_webhook(payload, &signature).unwrap();
        assert_eq!(event.event_type, "charge.captured");
        let transition = event.transition.unwrap();
        assert_eq!(transition.intent_id, "chg_1");
        assert_eq!(transition.status, PaymentIntentStatus::Completed);
    }

    #[test]
    fn an_initiated_charge_carries_no_transition() {
        let adapter = adapter();
        let payload = br#"{"id":"chg_1","status":"INITIATED"}"#;
        let signature = sign("tap_webhook_secret", payload);

        let event = adapter.verify_webhook(payload, &signature).unwrap();
        assert!(event.transition.is_none());
    }

    #[test]
    fn rejects_an_invalid_signature() {
        let adapter = adapter();
        let payload = br#"{"id":"chg_1","status":"CAPTURED"}"#;
        let result = adapter.verify_webhook(payload, "deadbeef");
        assert!(matches!(result, Err(GatewayError::InvalidSignature)));
    }
}
