#![warn(clippy::pedantic)]

mod config;
mod error;
mod extract;
mod mail;
mod openapi;
mod payout;
mod ratelimit;
mod route;
mod session;
mod trace;

use std::{net::SocketAddr, sync::Arc};

use aide::{axum::ApiRouter, openapi::OpenApi};
use argon2::Argon2;
use axum::{Extension, Router};
use sqlx::postgres::PgPoolOptions;
use tower_governor::GovernorLayer;
use tower_http::{
	compression::CompressionLayer,
	request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
	trace::TraceLayer,
};

use crate::{
	extract::CallbackSecret,
	mail::{LogMailer, Mailer},
	payout::{HttpGateway, ManualGateway, PayoutGateway},
};

pub type Database = sqlx::Pool<sqlx::Postgres>;
pub type AppState = State;

/// The shared application state.
///
/// This should contain all shared dependencies that handlers need to access,
/// such as the database pool, the password hasher and the clients of external
/// services.
#[derive(Clone, axum::extract::FromRef)]
pub struct State {
	pub database: Database,
	pub hasher: Argon2<'static>,
	pub mailer: Arc<dyn Mailer>,
	pub payouts: Arc<dyn PayoutGateway>,
	pub callback_secret: CallbackSecret,
}

/// The rate limits of the API.
pub struct Limits {
	pub default: ratelimit::Config,
	pub strict: ratelimit::Config,
}

#[derive(Debug, thiserror::Error)]
enum StartupError {
	#[error("invalid configuration: {0}")]
	Config(#[from] config::Error),
	#[error("failed to initialize tracing: {0}")]
	Trace(#[from] trace::Error),
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
	#[error("failed to run migrations: {0}")]
	Migrate(#[from] sqlx::migrate::MigrateError),
	#[error("failed to create payout client: {0}")]
	Payout(#[from] payout::Error),
	#[error("server error: {0}")]
	Io(#[from] std::io::Error),
}

/// Builds the application router. Rate limiting is skipped when `limits`
/// is `None`, since it needs the peer address of each connection.
pub fn app(state: State, limits: Option<&Limits>) -> Router {
	let mut api = OpenApi::default();

	let mut routes = route::routes();
	let mut strict = route::strict_routes();

	if let Some(limits) = limits {
		routes = routes.layer(GovernorLayer {
			config: limits.default.clone(),
		});
		strict = strict.layer(GovernorLayer {
			config: limits.strict.clone(),
		});
	}

	let router = ApiRouter::new()
		.nest(
			"/api",
			routes
				.merge(strict)
				.nest("/docs", route::docs::routes()),
		)
		.finish_api_with(&mut api, openapi::docs);

	router
		.layer(Extension(Arc::new(api)))
		.layer(CompressionLayer::new())
		.layer(PropagateRequestIdLayer::x_request_id())
		.layer(TraceLayer::new_for_http())
		.layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
		.with_state(state)
}

async fn shutdown_signal() {
	if let Err(error) = tokio::signal::ctrl_c().await {
		tracing::error!(%error, "failed to listen for the shutdown signal");
	}

	tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
	let config = config::Config::from_env()?;
	let _guard = trace::init_tracing_subscriber(config.log_level, config.otlp_endpoint.as_deref())?;

	let database = PgPoolOptions::new()
		.max_connections(20)
		.connect(&config.database_url)
		.await?;

	sqlx::migrate!().run(&database).await?;

	let payouts: Arc<dyn PayoutGateway> = match &config.payout {
		Some(payout) => Arc::new(HttpGateway::new(payout)?),
		None => {
			tracing::warn!("no payout provider is configured, withdrawals stay pending until settled by hand");

			Arc::new(ManualGateway)
		}
	};

	if config.callback_secret.is_none() {
		tracing::warn!("PAYMENT_CALLBACK_SECRET is not set, payment callbacks will be rejected");
	}

	let state = State {
		database,
		hasher: Argon2::default(),
		mailer: Arc::new(LogMailer::new(config.mail_from.clone())),
		payouts,
		callback_secret: CallbackSecret::new(config.callback_secret.clone()),
	};

	let limits = Limits {
		default: ratelimit::default(),
		strict: ratelimit::strict(),
	};

	ratelimit::cleanup_old_limits(&[&limits.default, &limits.strict]);

	let app = app(state, Some(&limits));
	let listener = tokio::net::TcpListener::bind((config.host, config.port)).await?;

	tracing::info!(address = %listener.local_addr()?, "listening");

	axum::serve(
		listener,
		app.into_make_service_with_connect_info::<SocketAddr>(),
	)
	.with_graceful_shutdown(shutdown_signal())
	.await?;

	Ok(())
}
