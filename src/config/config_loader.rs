use anyhow::{Ok, Result};

use super::config_model::{
    Database, DotEnvyConfig, GatewaySettings, GatewaysConfig, Payments, Server, Smtp,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let server = Server {
        port: std::env::var("SERVER_PORT")
            .expect("SERVER_PORT is invalid")
            .parse()?,
        body_limit: std::env::var("SERVER_BODY_LIMIT")
            .expect("SERVER_BODY_LIMIT is invalid")
            .parse()?,
        timeout: std::env::var("SERVER_TIMEOUT")
            .expect("SERVER_TIMEOUT is invalid")
            .parse()?,
    };

    let database = Database {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL is invalid"),
    };

    let smtp = Smtp {
        host: std::env::var("SMTP_HOST").expect("SMTP_HOST is invalid"),
        port: std::env::var("SMTP_PORT")
            .unwrap_or("587".to_string())
            .parse()?,
        username: std::env::var("SMTP_USERNAME").expect("SMTP_USERNAME is invalid"),
        password: std::env::var("SMTP_PASSWORD").expect("SMTP_PASSWORD is invalid"),
        sender: std::env::var("SMTP_SENDER").expect("SMTP_SENDER is invalid"),
        timeout_secs: std::env::var("SMTP_TIMEOUT_SECS")
            .unwrap_or("10".to_string())
            .parse()?,
    };

    let payments = Payments {
        receipt_base_url: std::env::var("RECEIPT_BASE_URL").expect("RECEIPT_BASE_URL is invalid"),
        gateway_timeout_secs: std::env::var("GATEWAY_TIMEOUT_SECS")
            .unwrap_or("30".to_string())
            .parse()?,
    };

    let gateways = GatewaysConfig {
        stripe: load_gateway_settings("STRIPE", "Stripe"),
        paypal: load_gateway_settings("PAYPAL", "PayPal"),
        square: load_gateway_settings("SQUARE", "Square"),
        tap: load_gateway_settings("TAP", "Tap"),
    };

    Ok(DotEnvyConfig {
        server,
        database,
        smtp,
        payments,
        gateways,
    })
}

fn load_gateway_settings(prefix: &str, default_display_name: &str) -> GatewaySettings {
    let var = |suffix: &str| std::env::var(format!("{}_{}", prefix, suffix));

    GatewaySettings {
        enabled: var("ENABLED")
            .map(|value| value == "true")
            .unwrap_or(false),
        display_name: var("DISPLAY_NAME").unwrap_or(default_display_name.to_string()),
        secret_key: var("SECRET_KEY").unwrap_or_default(),
        webhook_secret: var("WEBHOOK_SECRET").unwrap_or_default(),
        client_id: var("CLIENT_ID").ok(),
        location_id: var("LOCATION_ID").ok(),
        test_mode: var("TEST_MODE")
            .map(|value| value == "true")
            .unwrap_or(true),
    }
}
