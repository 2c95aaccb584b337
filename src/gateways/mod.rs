pub mod paypal;
pub mod square;
pub mod stripe;
pub mod tap;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::config::config_model::GatewaysConfig;
use crate::domain::value_objects::enums::{
    currencies::Currency, gateways::GatewayId, payment_intent_statuses::PaymentIntentStatus,
};

/// Static configuration of one payment gateway, assembled at startup.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub id: GatewayId,
    pub display_name: String,
    pub enabled: bool,
    pub test_mode: bool,
    pub secret_key: String,
    pub webhook_secret: String,
    /// PayPal REST client id; unused by the other providers.
    pub client_id: Option<String>,
    /// Square location id; unused by the other providers.
    pub location_id: Option<String>,
}

/// Pure lookup over the configured gateways. No side effects; an empty
/// enabled set is a user-facing condition the callers must handle.
pub struct GatewayRegistry {
    configs: Vec<GatewayConfig>,
}

impl GatewayRegistry {
    pub fn new(configs: Vec<GatewayConfig>) -> Self {
        Self { configs }
    }

    pub fn from_config(config: &GatewaysConfig) -> Self {
        let configs = [
            (GatewayId::Stripe, &config.stripe),
            (GatewayId::Paypal, &config.paypal),
            (GatewayId::Square, &config.square),
            (GatewayId::Tap, &config.tap),
        ]
        .into_iter()
        .map(|(id, settings)| GatewayConfig {
            id,
            display_name: settings.display_name.clone(),
            enabled: settings.enabled,
            test_mode: settings.test_mode,
            secret_key: settings.secret_key.clone(),
            webhook_secret: settings.webhook_secret.clone(),
            client_id: settings.client_id.clone(),
            location_id: settings.location_id.clone(),
        })
        .collect();

        Self { configs }
    }

    pub fn get(&self, id: GatewayId) -> Option<&GatewayConfig> {
        self.configs.iter().find(|config| config.id == id)
    }

    pub fn list_enabled(&self) -> Vec<&GatewayConfig> {
        self.configs.iter().filter(|config| config.enabled).collect()
    }
}

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub amount: Decimal,
    pub currency: Currency,
    pub booking_id: i64,
    pub metadata: serde_json::Value,
}

/// Provider response normalized to a common shape.
#[derive(Debug, Clone)]
pub struct GatewayCharge {
    pub provider_id: String,
    pub client_secret: Option<String>,
    pub status: PaymentIntentStatus,
}

/// An intent transition extracted from a verified webhook payload.
#[derive(Debug, Clone)]
pub struct IntentTransition {
    pub intent_id: String,
    pub status: PaymentIntentStatus,
}

#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub event_type: String,
    /// None for event types the orchestrator does not act on.
    pub transition: Option<IntentTransition>,
}

/// Every provider failure is normalized to this shape; provider error
/// bodies are logged inside the adapter and never surfaced verbatim.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{provider} rejected the request: {message}")]
    Upstream {
        provider: &'static str,
        message: String,
    },

    #[error("{0} request timed out")]
    Timeout(&'static str),

    #[error("webhook signature verification failed")]
    InvalidSignature,
}

impl GatewayError {
    pub(crate) fn from_reqwest(provider: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout(provider)
        } else {
            // reqwest errors can embed the request URL but never credentials
            GatewayError::Upstream {
                provider,
                message: err.without_url().to_string(),
            }
        }
    }
}

#[async_trait]
#[automock]
pub trait GatewayAdapter: Send + Sync {
    fn id(&self) -> GatewayId;

    /// Creates the provider-side charge and returns its id, client secret
    /// and initial status. Owns the amount-representation translation.
    async fn create_charge(&self, request: &ChargeRequest) -> Result<GatewayCharge, GatewayError>;

    /// Confirms/captures the charge for providers with a separate confirm
    /// step and reports the resulting status.
    async fn confirm_charge(
        &self,
        provider_id: &str,
        token: Option<&str>,
    ) -> Result<PaymentIntentStatus, GatewayError>;

    /// Verifies the webhook signature and maps the event into a normalized
    /// `WebhookEvent`. Must be called before the payload is trusted.
    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, GatewayError>;
}

/// Builds the adapter lookup table for every enabled gateway.
pub fn build_adapters(
    registry: &GatewayRegistry,
    http: reqwest::Client,
) -> HashMap<GatewayId, Arc<dyn GatewayAdapter>> {
    let mut adapters: HashMap<GatewayId, Arc<dyn GatewayAdapter>> = HashMap::new();

    for config in registry.list_enabled() {
        let adapter: Arc<dyn GatewayAdapter> = match config.id {
            GatewayId::Stripe => Arc::new(stripe::StripeAdapter::new(config, http.clone())),
            GatewayId::Paypal => Arc::new(paypal::PaypalAdapter::new(config, http.clone())),
            GatewayId::Square => Arc::new(square::SquareAdapter::new(config, http.clone())),
            GatewayId::Tap => Arc::new(tap::TapAdapter::new(config, http.clone())),
        };
        adapters.insert(adapter.id(), adapter);
    }

    adapters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(id: GatewayId, enabled: bool) -> GatewayConfig {
        GatewayConfig {
            id,
            display_name: id.to_string(),
            enabled,
            test_mode: true,
            secret_key: "sk_test".to_string(),
            webhook_secret: "whsec_test".to_string(),
            client_id: None,
            location_id: None,
        }
    }

    #[test]
    fn lists_only_enabled_gateways() {
        let registry = GatewayRegistry::new(vec![
            config(GatewayId::Stripe, true),
            config(GatewayId::Paypal, false),
            config(GatewayId::Tap, true),
        ]);

        let enabled: Vec<GatewayId> = registry
            .list_enabled()
            .iter()
            .map(|config| config.id)
            .collect();
        assert_eq!(enabled, vec![GatewayId::Stripe, GatewayId::Tap]);
    }

    #[test]
    fn get_returns_none_for_unconfigured_gateway() {
        let registry = GatewayRegistry::new(vec![config(GatewayId::Stripe, true)]);

        assert!(registry.get(GatewayId::Square).is_none());
        assert!(registry.get(GatewayId::Stripe).is_some());
    }

    #[test]
    fn empty_registry_is_not_an_error() {
        let registry = GatewayRegistry::new(Vec::new());
        assert!(registry.list_enabled().is_empty());
    }

    #[test]
    fn built_adapters_are_keyed_by_their_own_id() {
        let registry = GatewayRegistry::new(
            GatewayId::ALL
                .into_iter()
                .map(|id| config(id, true))
                .collect(),
        );

        let adapters = build_adapters(&registry, reqwest::Client::new());

        assert_eq!(adapters.len(), GatewayId::ALL.len());
        for id in GatewayId::ALL {
            assert_eq!(adapters[&id].id(), id);
        }
    }
}
