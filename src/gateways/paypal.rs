use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
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

const PROVIDER: &str = "paypal";

/// PayPal Orders v2 client. Orders play the role of payment intents: the
/// order id is the transaction identifier and capture is the confirm step.
pub struct PaypalAdapter {
    http: reqwest::Client,
    client_id: String,
    secret_key: String,
    webhook_secret: String,
    api_base: &'static str,
}

#[derive(Debug, Deserialize)]
struct PaypalTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct PaypalOrder {
    id: String,
    status: String,
    #[serde(default)]
    links: Vec<PaypalLink>,
}

#[derive(Debug, Deserialize)]
struct PaypalLink {
    rel: String,
    href: String,
}

#[derive(Debug, Deserialize)]
struct PaypalWebhookEnvelope {
    event_type: String,
    resource: serde_json::Value,
}

impl PaypalAdapter {
    pub fn new(config: &GatewayConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            client_id: config.client_id.clone().unwrap_or_default(),
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
            api_base: if config.test_mode {
                "https://api-m.sandbox.paypal.com"
            } else {
                "https://api-m.paypal.com"
            },
        }
    }

    fn map_status(status: &str) -> PaymentIntentStatus {
        match status {
            "APPROVED" | "SAVED" => PaymentIntentStatus::Processing,
            "COMPLETED" => PaymentIntentStatus::Completed,
            "VOIDED" => PaymentIntentStatus::Failed,
            // CREATED / PAYER_ACTION_REQUIRED
            _ => PaymentIntentStatus::Pending,
        }
    }

    async fn access_token(&self) -> Result<String, GatewayError> {
        // https://developer.paypal.com/api/rest/authentication/
        let credentials = BASE64.encode(format!("{}:{}", self.client_id, self.secret_key));

        let resp = self
            .http
            .post(format!("{}/v1/oauth2/token", self.api_base))
            .header(AUTHORIZATION, format!("Basic {credentials}"))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(|err| GatewayError::from_reqwest(PROVIDER, err))?;
        let resp = Self::ensure_success(resp, "oauth token").await?;

        let parsed: PaypalTokenResponse = resp
            .json()
            .await
            .map_err(|err| GatewayError::from_reqwest(PROVIDER, err))?;
        Ok(parsed.access_token)
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
            "paypal api request failed"
        );

        Err(GatewayError::Upstream {
            provider: PROVIDER,
            message: format!("{context} failed with status {status}"),
        })
    }
}

#[async_trait]
impl GatewayAdapter for PaypalAdapter {
    fn id(&self) -> GatewayId {
        GatewayId::Paypal
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<GatewayCharge, GatewayError> {
        // https://developer.paypal.com/docs/api/orders/v2/#orders_create
        let token = self.access_token().await?;

        // PayPal takes decimal string amounts, not minor units.
        let body = serde_json::json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "custom_id": request.booking_id.to_string(),
                "amount": {
                    "currency_code": request.currency.code(),
                    "value": request.amount.round_dp(request.currency.decimals()).to_string(),
                },
            }],
        });

        let resp = self
            .http
            .post(format!("{}/v2/checkout/orders", self.api_base))
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .json(&body)
            .send()
            .await
            .map_err(|err| GatewayError::from_reqwest(PROVIDER, err))?;
        let resp = Self::ensure_success(resp, "create order").await?;

        let parsed: PaypalOrder = resp
            .json()
            .await
            .map_err(|err| GatewayError::from_reqwest(PROVIDER, err))?;

        // The buyer approval link is the closest analogue of a client secret.
        let approve_link = parsed
            .links
            .iter()
            .find(|link| link.rel == "approve")
            .map(|link| link.href.clone());

        Ok(GatewayCharge {
            provider_id: parsed.id,
            client_secret: approve_link,
            status: Self::map_status(&parsed.status),
        })
    }

    async fn confirm_charge(
        &self,
        provider_id: &str,
        _token: Option<&str>,
    ) -> Result<PaymentIntentStatus, GatewayError> {
        // https://developer.paypal.com/docs/api/orders/v2/#orders_capture
        let token = self.access_token().await?;

        let resp = self
            .http
            .post(format!(
                "{}/v2/checkout/orders/{provider_id}/capture",
                self.api_base
            ))
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(CONTENT_TYPE, "application/json")
            .body("{}")
            .send()
            .await
            .map_err(|err| GatewayError::from_reqwest(PROVIDER, err))?;
        let resp = Self::ensure_success(resp, "capture order").await?;

        let parsed: PaypalOrder = resp
            .json()
            .await
            .map_err(|err| GatewayError::from_reqwest(PROVIDER, err))?;
        Ok(Self::map_status(&parsed.status))
    }

    /// Verifies the transmission signature against the out-of-band webhook
    /// secret: HMAC-SHA256 over the raw payload, hex-encoded in the
    /// `Paypal-Transmission-Sig` header.
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

        let envelope: PaypalWebhookEnvelope =
            serde_json::from_slice(payload).map_err(|_| GatewayError::InvalidSignature)?;

        let status = match envelope.event_type.as_str() {
            "PAYMENT.CAPTURE.PENDING" => Some(PaymentIntentStatus::Processing),
            "PAYMENT.CAPTURE.COMPLETED" | "CHECKOUT.ORDER.COMPLETED" => {
                Some(PaymentIntentStatus::Completed)
            }
            "PAYMENT.CAPTURE.DENIED" => Some(PaymentIntentStatus::Failed),
            "PAYMENT.CAPTURE.REFUNDED" => Some(PaymentIntentStatus::Refunded),
            _ => None,
        };

        // Capture events reference the order through related_ids; order
        // events carry the id directly.
        let intent_id = envelope
            .resource
            .pointer("/supplementary_data/related_ids/order_id")
            .and_then(|value| value.as_str())
            .or_else(|| envelope.resource.get("id").and_then(|value| value.as_str()))
            .map(|value| value.to_string());

        let transition = match (intent_id, status) {
            (Some(intent_id), Some(status)) => Some(IntentTransition { intent_id, status }),
            _ => None,
        };

        Ok(WebhookEvent {
            event_type: envelope.event_type,
            transition,
        })
    }
}
