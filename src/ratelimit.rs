use std::{sync::Arc, time::Duration};

use axum::{
	body::Body,
	response::{IntoResponse, Response},
};
use governor::{
	clock::QuantaInstant,
	middleware::{RateLimitingMiddleware, StateInformationMiddleware},
};
use tower_governor::{
	governor::{GovernorConfig, GovernorConfigBuilder},
	key_extractor::{KeyExtractor, PeerIpKeyExtractor},
	GovernorError,
};

use crate::error::AppError;

pub type Config = Arc<GovernorConfig<PeerIpKeyExtractor, StateInformationMiddleware>>;

fn build(per_second: u64, burst_size: u32) -> Config {
	let config = GovernorConfigBuilder::default()
		.per_second(per_second)
		.burst_size(burst_size)
		.use_headers()
		.error_handler(error_handler)
		.finish();

	// `finish` only fails for a zero period or burst size
	Arc::new(config.unwrap_or_else(|| unreachable!("rate limit quota must be non-zero")))
}

/// Limits for the general API surface.
pub fn default() -> Config {
	build(1, 50)
}

/// Limits for credential and money-moving endpoints
/// (login, registration, withdrawals, support payments).
pub fn strict() -> Config {
	build(5, 5)
}

fn error_handler(error: GovernorError) -> Response<Body> {
	AppError::from(error).into_response()
}

/// Periodically drops rate limiting state for peers that have not been seen recently.
pub fn cleanup_old_limits<T, M>(configs: &[&Arc<GovernorConfig<T, M>>])
where
	T: KeyExtractor,
	<T as KeyExtractor>::Key: Send + Sync + 'static,
	M: RateLimitingMiddleware<QuantaInstant> + Send + Sync + 'static,
{
	let limiters = configs
		.iter()
		.map(|config| config.limiter().clone())
		.collect::<Vec<_>>();
	let interval = Duration::from_secs(60);

	std::thread::spawn(move || loop {
		std::thread::sleep(interval);

		for limiter in &limiters {
			tracing::debug!(size = limiter.len(), "pruning rate limiting storage");

			limiter.retain_recent();
		}
	});
}
