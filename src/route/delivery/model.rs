pub use crate::route::model::IdInput;

use chrono::{DateTime, Utc};
use macros::model;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn validate_code(code: &str) -> Result<(), ValidationError> {
	if code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
		Ok(())
	} else {
		Err(ValidationError::new("invalid_voucher_code"))
	}
}

/// A delivery fee that applies to one or more zones.
#[model]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, Validate, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryFee {
	#[serde(skip_deserializing)]
	pub id: Uuid,
	#[validate(length(min = 1, max = 100))]
	pub name: String,
	#[serde(default)]
	#[validate(length(max = 500))]
	pub description: String,
	/// The fee in whole Kenyan shillings.
	#[validate(range(min = 0, max = 1_000_000))]
	pub amount: i64,
	/// The zones the fee applies to.
	#[serde(default)]
	#[validate(length(max = 50))]
	pub zones: Vec<String>,
	pub is_active: bool,
	/// Used when an order does not pick a fee. Only one fee can be the default.
	#[serde(default)]
	pub is_default: bool,
	#[serde(skip_deserializing)]
	pub created_at: DateTime<Utc>,
	#[serde(skip_deserializing)]
	pub updated_at: DateTime<Utc>,
}

#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema, sqlx::Type,
)]
#[sqlx(type_name = "discount_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
	Percentage,
	Fixed,
}

/// A code that discounts the delivery fee of an order.
#[model]
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, Validate, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryVoucher {
	#[serde(skip_deserializing)]
	pub id: Uuid,
	/// Stored in upper case; matched case-insensitively.
	#[validate(length(min = 3, max = 32), custom(function = "validate_code"))]
	pub code: String,
	#[serde(default)]
	#[validate(length(max = 500))]
	pub description: String,
	pub discount_type: DiscountType,
	/// A percentage of the fee, or an amount in shillings.
	#[validate(range(min = 0, max = 1_000_000))]
	pub discount_value: i64,
	/// The smallest order amount the voucher applies to.
	#[serde(default)]
	#[validate(range(min = 0))]
	pub minimum_order: i64,
	/// How many times the voucher can be used. Unlimited when absent.
	#[validate(range(min = 1))]
	pub max_uses: Option<i32>,
	#[serde(skip_deserializing)]
	pub used_count: i32,
	/// The zones the voucher is valid in. Valid everywhere when empty.
	#[serde(default)]
	#[validate(length(max = 50))]
	pub zones: Vec<String>,
	pub is_active: bool,
	pub expires_at: Option<DateTime<Utc>>,
	#[serde(skip_deserializing)]
	pub created_at: DateTime<Utc>,
	#[serde(skip_deserializing)]
	pub updated_at: DateTime<Utc>,
}

/// Why a voucher does not apply to an order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoucherError {
	#[error("the voucher is not active")]
	Inactive,
	#[error("the voucher has expired")]
	Expired,
	#[error("the voucher has been used up")]
	UsedUp,
	#[error("the voucher requires an order of at least KES {0}")]
	BelowMinimum(i64),
	#[error("the voucher is not valid in zone {0}")]
	WrongZone(String),
}

pub fn check_discount(discount_type: DiscountType, value: i64) -> Result<(), ValidationError> {
	if discount_type == DiscountType::Percentage && value > 100 {
		return Err(ValidationError::new("percentage_above_100"));
	}

	Ok(())
}

fn zone_matches(zones: &[String], zone: &str) -> bool {
	zones.is_empty() || zones.iter().any(|z| z.trim().eq_ignore_ascii_case(zone.trim()))
}

impl DeliveryVoucher {
	/// The discount this voucher gives on `fee`, never more than the fee itself.
	pub fn discount(
		&self,
		fee: i64,
		order_amount: i64,
		zone: &str,
		now: DateTime<Utc>,
	) -> Result<i64, VoucherError> {
		if !self.is_active {
			return Err(VoucherError::Inactive);
		}

		if self.expires_at.is_some_and(|expires_at| expires_at <= now) {
			return Err(VoucherError::Expired);
		}

		if self.max_uses.is_some_and(|max_uses| self.used_count >= max_uses) {
			return Err(VoucherError::UsedUp);
		}

		if order_amount < self.minimum_order {
			return Err(VoucherError::BelowMinimum(self.minimum_order));
		}

		if !zone_matches(&self.zones, zone) {
			return Err(VoucherError::WrongZone(zone.to_owned()));
		}

		let discount = match self.discount_type {
			DiscountType::Percentage => fee * self.discount_value.min(100) / 100,
			DiscountType::Fixed => self.discount_value,
		};

		Ok(discount.clamp(0, fee))
	}
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct ListQuery {
	/// Only return active entries.
	pub active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuoteInput {
	#[validate(length(min = 1, max = 32))]
	pub code: String,
	#[validate(range(min = 0))]
	pub order_amount: i64,
	#[validate(length(min = 1, max = 100))]
	pub zone: String,
	/// The fee to discount. The default fee is used when absent.
	pub fee_id: Option<Uuid>,
}

#[derive(Debug, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
	pub code: String,
	pub fee_id: Uuid,
	pub fee: i64,
	pub discount: i64,
	/// The fee after the discount.
	pub total: i64,
}

#[cfg(test)]
mod test {
	use chrono::Duration;

	use super::*;

	fn voucher(discount_type: DiscountType, discount_value: i64) -> DeliveryVoucher {
		DeliveryVoucher {
			id: Uuid::new_v4(),
			code: "FREESHIP".into(),
			description: String::new(),
			discount_type,
			discount_value,
			minimum_order: 1000,
			max_uses: Some(10),
			used_count: 0,
			zones: vec!["Nairobi".into(), "Kiambu".into()],
			is_active: true,
			expires_at: None,
			created_at: Utc::now(),
			updated_at: Utc::now(),
		}
	}

	#[test]
	fn test_percentage_discount() {
		let voucher = voucher(DiscountType::Percentage, 25);

		assert_eq!(voucher.discount(300, 1500, "nairobi", Utc::now()), Ok(75));
	}

	#[test]
	fn test_fixed_discount_is_capped_at_fee() {
		let voucher = voucher(DiscountType::Fixed, 500);

		assert_eq!(voucher.discount(200, 1500, "Kiambu", Utc::now()), Ok(200));
	}

	#[test]
	fn test_voucher_conditions() {
		let now = Utc::now();
		let mut voucher = voucher(DiscountType::Fixed, 100);

		assert_eq!(
			voucher.discount(300, 999, "Nairobi", now),
			Err(VoucherError::BelowMinimum(1000))
		);
		assert_eq!(
			voucher.discount(300, 1500, "Mombasa", now),
			Err(VoucherError::WrongZone("Mombasa".into()))
		);

		voucher.used_count = 10;
		assert_eq!(voucher.discount(300, 1500, "Nairobi", now), Err(VoucherError::UsedUp));

		voucher.used_count = 0;
		voucher.expires_at = Some(now - Duration::hours(1));
		assert_eq!(voucher.discount(300, 1500, "Nairobi", now), Err(VoucherError::Expired));

		voucher.expires_at = None;
		voucher.is_active = false;
		assert_eq!(voucher.discount(300, 1500, "Nairobi", now), Err(VoucherError::Inactive));
	}

	#[test]
	fn test_voucher_without_zones_applies_everywhere() {
		let mut voucher = voucher(DiscountType::Fixed, 50);

		voucher.zones.clear();

		assert_eq!(voucher.discount(300, 1500, "Eldoret", Utc::now()), Ok(50));
	}

	#[test]
	fn test_percentage_above_100_is_invalid() {
		assert!(check_discount(DiscountType::Percentage, 101).is_err());
		assert!(check_discount(DiscountType::Fixed, 101).is_ok());
	}

	#[test]
	fn test_voucher_code_characters() {
		let input: CreateDeliveryVoucherInput = serde_json::from_value(serde_json::json!({
			"code": "free ship!",
			"discountType": "FIXED",
			"discountValue": 100,
			"maxUses": null,
			"isActive": true,
			"expiresAt": null,
		}))
		.unwrap();

		assert!(input.validate().is_err());
	}

	#[test]
	fn test_update_input_is_partial() {
		let input: UpdateDeliveryFeeInput =
			serde_json::from_value(serde_json::json!({ "amount": 250 })).unwrap();

		assert_eq!(input.amount, Some(250));
		assert!(input.name.is_none());
		assert!(input.validate().is_ok());
	}

	#[test]
	fn test_update_input_tells_null_from_missing() {
		let input: UpdateDeliveryVoucherInput =
			serde_json::from_value(serde_json::json!({ "expiresAt": null, "maxUses": null }))
				.unwrap();

		assert_eq!(input.expires_at, Some(None));
		assert_eq!(input.max_uses, Some(None));

		let input: UpdateDeliveryVoucherInput =
			serde_json::from_value(serde_json::json!({ "maxUses": 5 })).unwrap();

		assert_eq!(input.expires_at, None);
		assert_eq!(input.max_uses, Some(Some(5)));
		assert!(input.validate().is_ok());
	}
}
