use crate::{
    config::config_model::DotEnvyConfig,
    gateways::{GatewayRegistry, build_adapters},
    infrastructure::{
        axum_http::{
            default_routers,
            routers::{bookings, payments},
        },
        postgres::postgres_connection::PgPoolSquad,
    },
    notifications::smtp::SmtpNotificationDispatcher,
};
use anyhow::Result;
use axum::{Router, http::Method, routing::get};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let registry = Arc::new(GatewayRegistry::from_config(&config.gateways));

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.payments.gateway_timeout_secs))
        .build()?;
    let adapters = build_adapters(&registry, http_client);

    let dispatcher = Arc::new(SmtpNotificationDispatcher::new(&config.smtp)?);

    let app = Router::new()
        .fallback(default_routers::not_found)
        .route("/api/v1/health-check", get(default_routers::health_check))
        .nest(
            "/api/payments",
            payments::routes(
                Arc::clone(&db_pool),
                registry,
                adapters,
                Arc::clone(&dispatcher),
                config.payments.receipt_base_url.clone(),
            ),
        )
        .nest(
            "/api/bookings",
            bookings::routes(Arc::clone(&db_pool), Arc::clone(&dispatcher)),
        )
        .nest(
            "/api/fleet",
            bookings::fleet_routes(Arc::clone(&db_pool), Arc::clone(&dispatcher)),
        )
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::PUT,
                    Method::DELETE,
                ])
                .allow_origin(Any), // TODO Add the domain later
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
    };

    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
