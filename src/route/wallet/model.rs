use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::withdrawal;

pub use crate::route::model::IdInput;

#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema, sqlx::Type,
)]
#[sqlx(type_name = "payout_method", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutMethod {
	Mpesa,
	MpesaPaybill,
	MpesaTill,
	BankTransfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
	Pending,
	Completed,
	Failed,
}

/// The balances and payout preferences of an author.
///
/// Amounts are whole Kenyan shillings.
#[derive(Debug, Clone, Serialize, JsonSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
	#[serde(rename = "authorId")]
	pub user_id: Uuid,
	/// Can be withdrawn.
	pub available_balance: i64,
	/// Reserved by withdrawals that have not settled yet.
	pub pending_balance: i64,
	pub total_received: i64,
	pub total_withdrawn: i64,
	pub preferred_method: Option<PayoutMethod>,
	pub mpesa_phone: Option<String>,
	pub bank_name: Option<String>,
	pub bank_account_number: Option<String>,
	pub bank_account_name: Option<String>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, JsonSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
	pub id: Uuid,
	#[serde(skip)]
	pub author_id: Uuid,
	pub method: PayoutMethod,
	pub amount: i64,
	pub phone_number: Option<String>,
	pub paybill_number: Option<String>,
	pub account_number: Option<String>,
	pub till_number: Option<String>,
	pub bank_name: Option<String>,
	pub bank_account_number: Option<String>,
	pub bank_account_name: Option<String>,
	pub status: PaymentStatus,
	pub reference: String,
	/// The reference the payout provider assigned.
	pub provider_reference: Option<String>,
	pub failure_reason: Option<String>,
	pub created_at: DateTime<Utc>,
	pub completed_at: Option<DateTime<Utc>>,
}

/// A reader's tip to an author.
#[derive(Debug, Clone, Serialize, JsonSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SupportTransaction {
	pub id: Uuid,
	pub author_id: Uuid,
	pub post_id: Option<Uuid>,
	pub supporter_id: Option<Uuid>,
	pub supporter_name: Option<String>,
	pub amount: i64,
	pub message: Option<String>,
	pub status: PaymentStatus,
	pub reference: String,
	pub created_at: DateTime<Utc>,
	pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletOverview {
	#[serde(flatten)]
	pub wallet: Wallet,
	pub recent_withdrawals: Vec<Withdrawal>,
	pub recent_support: Vec<SupportTransaction>,
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
	withdrawal::normalize_phone(phone)
		.map(|_| ())
		.ok_or_else(|| ValidationError::new("invalid_phone_number"))
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWalletInput {
	pub preferred_method: Option<PayoutMethod>,
	/// A Kenyan mobile number, like `0712345678` or `+254712345678`.
	#[validate(custom(function = "validate_phone"))]
	pub mpesa_phone: Option<String>,
	#[validate(length(min = 1, max = 100))]
	pub bank_name: Option<String>,
	#[validate(length(min = 1, max = 50))]
	pub bank_account_number: Option<String>,
	#[validate(length(min = 1, max = 100))]
	pub bank_account_name: Option<String>,
}

/// A withdrawal request. Which destination fields are required depends on the method.
#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawInput {
	pub method: PayoutMethod,
	pub amount: i64,
	#[validate(length(max = 20))]
	pub phone_number: Option<String>,
	#[validate(length(max = 20))]
	pub paybill_number: Option<String>,
	#[validate(length(max = 50))]
	pub account_number: Option<String>,
	#[validate(length(max = 20))]
	pub till_number: Option<String>,
	#[validate(length(max = 100))]
	pub bank_name: Option<String>,
	#[validate(length(max = 50))]
	pub bank_account_number: Option<String>,
	#[validate(length(max = 100))]
	pub bank_account_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SupportInput {
	/// Whole Kenyan shillings.
	#[validate(range(min = 10, max = 100_000))]
	pub amount: i64,
	#[validate(length(max = 500))]
	pub message: Option<String>,
	/// The post that prompted the tip.
	pub post_id: Option<Uuid>,
	/// Shown to the author instead of your username.
	#[validate(length(min = 1, max = 100))]
	pub supporter_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallbackStatus {
	Completed,
	Failed,
}

/// Notification from the payment provider that a payment settled.
#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallbackInput {
	#[validate(length(min = 1, max = 64))]
	pub reference: String,
	pub status: CallbackStatus,
	#[validate(length(max = 100))]
	pub provider_reference: Option<String>,
	#[validate(length(max = 500))]
	pub reason: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct CallbackOutput {
	pub reference: String,
	/// False when the payment had already settled, so nothing changed.
	pub applied: bool,
}
