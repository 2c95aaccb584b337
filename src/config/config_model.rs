#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub server: Server,
    pub database: Database,
    pub smtp: Smtp,
    pub payments: Payments,
    pub gateways: GatewaysConfig,
}

#[derive(Debug, Clone)]
pub struct Server {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Smtp {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sender: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Payments {
    pub receipt_base_url: String,
    pub gateway_timeout_secs: u64,
}

/// Per-provider settings. Disabled providers keep their entry so they can
/// be switched on without a deploy of new code.
#[derive(Debug, Clone, Default)]
pub struct GatewaySettings {
    pub enabled: bool,
    pub display_name: String,
    pub secret_key: String,
    pub webhook_secret: String,
    pub client_id: Option<String>,
    pub location_id: Option<String>,
    pub test_mode: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GatewaysConfig {
    pub stripe: GatewaySettings,
    pub paypal: GatewaySettings,
    pub square: GatewaySettings,
    pub tap: GatewaySettings,
}
