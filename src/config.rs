use std::{net::IpAddr, str::FromStr};

use tracing::Level;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{0} must be set")]
	Missing(&'static str),
	#[error("{name} has an invalid value {value:?}")]
	Invalid { name: &'static str, value: String },
}

/// Credentials for the external payout provider.
#[derive(Debug, Clone)]
pub struct PayoutConfig {
	pub url: String,
	pub api_key: String,
}

/// Runtime configuration, read from the environment (and a `.env` file).
#[derive(Debug, Clone)]
pub struct Config {
	pub database_url: String,
	pub host: IpAddr,
	pub port: u16,
	pub log_level: Level,
	/// When set, traces and metrics are exported over OTLP.
	pub otlp_endpoint: Option<String>,
	/// When unset, withdrawals stay pending for manual processing.
	pub payout: Option<PayoutConfig>,
	/// Shared secret the payment provider sends with its callbacks.
	pub callback_secret: Option<String>,
	pub mail_from: String,
}

impl Config {
	/// Loads the configuration from the process environment.
	pub fn from_env() -> Result<Self, Error> {
		dotenvy::dotenv().ok();

		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Loads the configuration from an arbitrary variable source.
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
		let optional = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

		let database_url = optional("DATABASE_URL").ok_or(Error::Missing("DATABASE_URL"))?;

		let payout = match (optional("PAYOUT_API_URL"), optional("PAYOUT_API_KEY")) {
			(Some(url), Some(api_key)) => Some(PayoutConfig { url, api_key }),
			(None, None) => None,
			(Some(_), None) => return Err(Error::Missing("PAYOUT_API_KEY")),
			(None, Some(_)) => return Err(Error::Missing("PAYOUT_API_URL")),
		};

		Ok(Self {
			database_url,
			host: parse(&optional, "HOST")?.unwrap_or(IpAddr::from([127, 0, 0, 1])),
			port: parse(&optional, "PORT")?.unwrap_or(3000),
			log_level: parse(&optional, "LOG_LEVEL")?.unwrap_or(Level::INFO),
			otlp_endpoint: optional("OTEL_EXPORTER_OTLP_ENDPOINT"),
			payout,
			callback_secret: optional("PAYMENT_CALLBACK_SECRET"),
			mail_from: optional("MAIL_FROM").unwrap_or_else(|| "no-reply@localhost".into()),
		})
	}
}

fn parse<T: FromStr>(
	lookup: &impl Fn(&str) -> Option<String>,
	name: &'static str,
) -> Result<Option<T>, Error> {
	lookup(name)
		.map(|value| {
			value
				.trim()
				.parse()
				.map_err(|_| Error::Invalid { name, value })
		})
		.transpose()
}

#[cfg(test)]
mod test {
	use std::collections::HashMap;

	use super::*;

	fn load(vars: &[(&str, &str)]) -> Result<Config, Error> {
		let vars = vars
			.iter()
			.map(|(k, v)| ((*k).to_string(), (*v).to_string()))
			.collect::<HashMap<_, _>>();

		Config::from_lookup(|name| vars.get(name).cloned())
	}

	#[test]
	fn test_defaults() {
		let config = load(&[("DATABASE_URL", "postgres://localhost/market")]).unwrap();

		assert_eq!(config.port, 3000);
		assert_eq!(config.host, IpAddr::from([127, 0, 0, 1]));
		assert_eq!(config.log_level, Level::INFO);
		assert!(config.payout.is_none());
		assert!(config.otlp_endpoint.is_none());
		assert_eq!(config.mail_from, "no-reply@localhost");
	}

	#[test]
	fn test_database_url_required() {
		assert!(matches!(load(&[]), Err(Error::Missing("DATABASE_URL"))));
	}

	#[test]
	fn test_invalid_port() {
		let result = load(&[("DATABASE_URL", "postgres://"), ("PORT", "eighty")]);

		assert!(matches!(result, Err(Error::Invalid { name: "PORT", .. })));
	}

	#[test]
	fn test_payout_needs_both_values() {
		let result = load(&[
			("DATABASE_URL", "postgres://"),
			("PAYOUT_API_URL", "https://payouts.example"),
		]);

		assert!(matches!(result, Err(Error::Missing("PAYOUT_API_KEY"))));

		let config = load(&[
			("DATABASE_URL", "postgres://"),
			("PAYOUT_API_URL", "https://payouts.example"),
			("PAYOUT_API_KEY", "secret"),
			("LOG_LEVEL", "debug"),
		])
		.unwrap();

		assert_eq!(config.payout.unwrap().url, "https://payouts.example");
		assert_eq!(config.log_level, Level::DEBUG);
	}
}
