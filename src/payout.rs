//! Sending money to authors through an external payout provider.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::PayoutConfig;

/// Where a payout is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(
	tag = "method",
	rename_all = "SCREAMING_SNAKE_CASE",
	rename_all_fields = "camelCase"
)]
pub enum Destination {
	Mpesa {
		/// Normalized to `2547XXXXXXXX` or `2541XXXXXXXX`.
		phone_number: String,
	},
	MpesaPaybill {
		paybill_number: String,
		account_number: String,
	},
	MpesaTill {
		till_number: String,
	},
	BankTransfer {
		bank_name: String,
		account_number: String,
		account_name: String,
	},
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payout {
	/// Our reference, echoed back by the provider in its callback.
	pub reference: String,
	/// Whole Kenyan shillings.
	pub amount: i64,
	#[serde(flatten)]
	pub destination: Destination,
}

/// The provider's acknowledgement of a payout request.
///
/// Accepted payouts stay pending until the provider's callback settles them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
	pub provider_reference: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("payout request failed: {0}")]
	Http(#[from] reqwest::Error),
	#[error("payout provider rejected the request with status {status}: {body}")]
	Rejected { status: u16, body: String },
}

#[axum::async_trait]
pub trait PayoutGateway: Send + Sync {
	async fn send(&self, payout: &Payout) -> Result<Receipt, Error>;
}

/// Sends payouts to an HTTP payout API.
pub struct HttpGateway {
	client: reqwest::Client,
	url: String,
	api_key: String,
}

impl HttpGateway {
	pub fn new(config: &PayoutConfig) -> Result<Self, Error> {
		let client = reqwest::Client::builder()
			.timeout(Duration::from_secs(15))
			.build()?;

		Ok(Self {
			client,
			url: format!("{}/payouts", config.url.trim_end_matches('/')),
			api_key: config.api_key.clone(),
		})
	}
}

#[axum::async_trait]
impl PayoutGateway for HttpGateway {
	async fn send(&self, payout: &Payout) -> Result<Receipt, Error> {
		let response = self
			.client
			.post(&self.url)
			.bearer_auth(&self.api_key)
			.json(payout)
			.send()
			.await?;

		let status = response.status();

		if !status.is_success() {
			return Err(Error::Rejected {
				status: status.as_u16(),
				body: response.text().await.unwrap_or_default(),
			});
		}

		Ok(response.json().await?)
	}
}

/// Accepts every payout without sending it anywhere. Withdrawals stay
/// pending until they are settled by hand.
pub struct ManualGateway;

#[axum::async_trait]
impl PayoutGateway for ManualGateway {
	async fn send(&self, payout: &Payout) -> Result<Receipt, Error> {
		tracing::info!(reference = %payout.reference, amount = payout.amount, "payout queued for manual processing");

		Ok(Receipt::default())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_payout_body() {
		let payout = Payout {
			reference: "WD-0123456789AB".into(),
			amount: 500,
			destination: Destination::MpesaPaybill {
				paybill_number: "247247".into(),
				account_number: "0712345678".into(),
			},
		};

		assert_eq!(
			serde_json::to_value(&payout).unwrap(),
			serde_json::json!({
				"reference": "WD-0123456789AB",
				"amount": 500,
				"method": "MPESA_PAYBILL",
				"paybillNumber": "247247",
				"accountNumber": "0712345678",
			})
		);
	}

	#[test]
	fn test_url_has_no_double_slash() {
		let gateway = HttpGateway::new(&PayoutConfig {
			url: "https://payouts.example.com/".into(),
			api_key: "key".into(),
		})
		.unwrap();

		assert_eq!(gateway.url, "https://payouts.example.com/payouts");
	}
}
