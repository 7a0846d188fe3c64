use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use domain::services::notification::{spawn_dispatcher, NotificationQueue};
use persistence::repositories::{PgIdentityRepository, PgInviteRepository};

use crate::config::Config;
use crate::middleware::{
    metrics_handler, metrics_middleware, security_headers_middleware, trace_id,
};
use crate::routes::{approvals, health, invites, registration};
use crate::services::{
    ApprovalService, EmailNotifier, EmailService, InviteService, RegistrationService,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub invites: InviteService,
    pub registration: RegistrationService,
    pub approval: ApprovalService,
}

pub fn create_app(config: Config, pool: PgPool) -> Router {
    let config = Arc::new(config);

    let invite_store = Arc::new(PgInviteRepository::new(pool.clone()));
    let identity_store = Arc::new(PgIdentityRepository::new(pool.clone()));
    let email = EmailService::new(config.email.clone());

    // The queue receiver is consumed by a background dispatcher; services
    // only hold the sending half.
    let (queue, queue_rx) = NotificationQueue::new();
    spawn_dispatcher(queue_rx, Arc::new(EmailNotifier::new(email.clone())));

    let invites = InviteService::new(invite_store, email, &config.invites);
    let registration = RegistrationService::new(
        invites.clone(),
        identity_store.clone(),
        queue.clone(),
    );
    let approval = ApprovalService::new(identity_store, queue);

    let state = AppState {
        pool,
        config: config.clone(),
        invites,
        registration,
        approval,
    };

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        // Default: allow any origin (for development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        // Production: only allow specified origins
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let api_routes = Router::new()
        // Invite lifecycle (v1)
        .route("/api/v1/invites", post(invites::issue_invite))
        .route("/api/v1/invites/expired", delete(invites::sweep_expired))
        .route("/api/v1/invites/:token", get(invites::validate_invite))
        // Registration (v1)
        .route(
            "/api/v1/register/doctor",
            post(registration::register_doctor),
        )
        .route(
            "/api/v1/register/patient",
            post(registration::register_patient),
        )
        // Account review (v1)
        .route(
            "/api/v1/accounts/:kind/:id/approve",
            post(approvals::approve),
        )
        .route("/api/v1/accounts/:kind/:id/reject", post(approvals::reject))
        .route(
            "/api/v1/accounts/:kind/:id/deactivate",
            post(approvals::deactivate),
        )
        .route(
            "/api/v1/accounts/:kind/:id/status",
            put(approvals::set_status),
        );

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    // Merge all routes
    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn(security_headers_middleware)) // Security headers
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware)) // Prometheus metrics
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id)) // Request ID and logging
        .layer(cors)
        .with_state(state)
}
