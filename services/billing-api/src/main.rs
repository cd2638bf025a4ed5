//! Splitfee Billing API
//!
//! HTTP surface of the billing and commission engine.
//!
//! ## REST Endpoints
//!
//! - `GET /api/v1/billing` - Billing view (plan, plans, payouts, invoices, stats)
//! - `POST /api/v1/billing/plan` - Change plan (free applies, paid redirects)
//! - `POST /api/v1/billing/cancel` - Schedule cancellation
//! - `GET /api/v1/billing/rates` - Commission rate table
//! - `POST /webhooks/stripe` - Stripe webhook handler
//!
//! The caller is identified by the `x-user-id` header set by the gateway.
//!
//! ## Health Endpoints
//!
//! - `GET /health` - Liveness check
//! - `GET /ready` - Readiness check
//! - `GET /metrics` - Prometheus metrics

mod config;
mod error;
mod handlers;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use splitfee_billing_core::{BillingOrchestrator, Stores, StripeProvider};
use splitfee_db::Repositories;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::handlers::{health, ready};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::from_default_env()
                .add_directive("billing_api=debug".parse()?)
                .add_directive("splitfee_billing_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Splitfee Billing API");

    let config = Config::from_env()?;
    tracing::info!(
        http_port = config.http_port,
        currency = %config.billing.currency,
        "Configuration loaded"
    );

    let metrics_handle = if config.metrics_enabled {
        Some(setup_metrics()?)
    } else {
        None
    };

    let pool = splitfee_db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    if config.run_migrations {
        splitfee_db::MIGRATOR.run(&pool).await?;
        tracing::info!("Migrations applied");
    }

    // Wire the engine over PostgreSQL and Stripe
    let stores = Stores::from(Repositories::new(pool.clone()));
    let provider = Arc::new(StripeProvider::new(config.billing.clone()));
    let billing = BillingOrchestrator::new(stores, provider, config.billing.clone());

    let state = AppState::new(billing, pool, config.clone());
    let app = build_router(state, metrics_handle);

    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    run_http_server(app, http_addr).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn build_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let request_timeout = state.request_timeout();

    // API v1 billing routes
    let api_v1 = Router::new()
        .route("/billing", get(handlers::get_billing))
        .route("/billing/plan", post(handlers::change_plan))
        .route("/billing/cancel", post(handlers::cancel_subscription))
        .route("/billing/rates", get(handlers::get_rates));

    // Webhook route (separate - uses raw body, no JSON parsing)
    let webhook_routes = Router::new().route("/webhooks/stripe", post(handlers::stripe_webhook));

    // Health routes (no timeout - must always respond quickly)
    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    let metrics_route = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    // Outermost first
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(webhook_routes)
        .layer(middleware)
        .merge(health_routes)
        .merge(metrics_route)
        .with_state(state)
}

async fn run_http_server(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn setup_metrics() -> anyhow::Result<PrometheusHandle> {
    // Most operations finish well under 200ms; checkout waits on Stripe
    let billing_latency_buckets = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.2, 0.5, 1.0, 2.5, 10.0];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("billing_operation_duration_seconds".to_string()),
            billing_latency_buckets,
        )?
        .install_recorder()?;

    metrics::describe_counter!(
        "billing_checkouts_created_total",
        "Total checkout sessions created"
    );
    metrics::describe_counter!(
        "billing_subscriptions_canceled_total",
        "Total cancellations scheduled"
    );
    metrics::describe_counter!(
        "billing_webhooks_processed_total",
        "Total webhooks processed by outcome"
    );
    metrics::describe_counter!(
        "billing_view_degraded_total",
        "Billing views served with a section missing"
    );
    metrics::describe_histogram!(
        "billing_operation_duration_seconds",
        "Billing operation latency in seconds by operation type"
    );

    Ok(handle)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
