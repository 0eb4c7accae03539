//! Withdrawal limits and destination checks.

use crate::payout::Destination;

use super::model::{PayoutMethod, WithdrawInput};

/// The largest amount a single withdrawal can move.
pub const MAXIMUM_AMOUNT: i64 = 150_000;

impl PayoutMethod {
	/// The smallest amount that can be withdrawn with this method.
	pub fn minimum(self) -> i64 {
		match self {
			Self::Mpesa | Self::MpesaPaybill | Self::MpesaTill => 200,
			Self::BankTransfer => 1_000,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Mpesa => "MPESA",
			Self::MpesaPaybill => "MPESA_PAYBILL",
			Self::MpesaTill => "MPESA_TILL",
			Self::BankTransfer => "BANK_TRANSFER",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WithdrawalError {
	#[error("the minimum withdrawal with {} is KES {}", .0.as_str(), .0.minimum())]
	BelowMinimum(PayoutMethod),
	#[error("the maximum withdrawal is KES {MAXIMUM_AMOUNT}")]
	AboveMaximum,
	#[error("{0} is required for this payout method")]
	MissingField(&'static str),
	#[error("{0} is not a valid Kenyan mobile number")]
	InvalidPhone(String),
	#[error("{0} must only contain digits")]
	NotNumeric(&'static str),
}

impl WithdrawalError {
	/// The input field the error refers to.
	pub fn field(&self) -> &'static str {
		match self {
			Self::BelowMinimum(..) | Self::AboveMaximum => "amount",
			Self::MissingField(field) | Self::NotNumeric(field) => field,
			Self::InvalidPhone(..) => "phoneNumber",
		}
	}
}

/// Normalizes a Kenyan mobile number to `2547XXXXXXXX` or `2541XXXXXXXX`.
///
/// Accepts the local (`07…`, `01…`) and international (`+254…`, `254…`)
/// forms, with optional spaces and dashes.
pub fn normalize_phone(raw: &str) -> Option<String> {
	let digits = raw
		.trim()
		.trim_start_matches('+')
		.chars()
		.filter(|c| !matches!(c, ' ' | '-'))
		.collect::<String>();

	if !digits.chars().all(|c| c.is_ascii_digit()) {
		return None;
	}

	let normalized = match digits.strip_prefix('0') {
		Some(local) if local.len() == 9 => format!("254{local}"),
		_ => digits,
	};

	let valid = normalized.len() == 12
		&& (normalized.starts_with("2547") || normalized.starts_with("2541"));

	valid.then_some(normalized)
}

fn required(value: Option<&String>, field: &'static str) -> Result<String, WithdrawalError> {
	value
		.map(|value| value.trim())
		.filter(|value| !value.is_empty())
		.map(str::to_owned)
		.ok_or(WithdrawalError::MissingField(field))
}

fn numeric(value: Option<&String>, field: &'static str) -> Result<String, WithdrawalError> {
	let value = required(value, field)?;

	if value.chars().all(|c| c.is_ascii_digit()) {
		Ok(value)
	} else {
		Err(WithdrawalError::NotNumeric(field))
	}
}

/// Checks the amount and method-specific fields of a withdrawal request.
///
/// The available balance is checked when the funds are reserved.
pub fn validate(input: &WithdrawInput) -> Result<Destination, WithdrawalError> {
	if input.amount < input.method.minimum() {
		return Err(WithdrawalError::BelowMinimum(input.method));
	}

	if input.amount > MAXIMUM_AMOUNT {
		return Err(WithdrawalError::AboveMaximum);
	}

	Ok(match input.method {
		PayoutMethod::Mpesa => {
			let phone = required(input.phone_number.as_ref(), "phoneNumber")?;

			Destination::Mpesa {
				phone_number: normalize_phone(&phone).ok_or(WithdrawalError::InvalidPhone(phone))?,
			}
		}
		PayoutMethod::MpesaPaybill => Destination::MpesaPaybill {
			paybill_number: numeric(input.paybill_number.as_ref(), "paybillNumber")?,
			account_number: required(input.account_number.as_ref(), "accountNumber")?,
		},
		PayoutMethod::MpesaTill => Destination::MpesaTill {
			till_number: numeric(input.till_number.as_ref(), "tillNumber")?,
		},
		PayoutMethod::BankTransfer => Destination::BankTransfer {
			bank_name: required(input.bank_name.as_ref(), "bankName")?,
			account_number: required(input.bank_account_number.as_ref(), "bankAccountNumber")?,
			account_name: required(input.bank_account_name.as_ref(), "bankAccountName")?,
		},
	})
}

#[cfg(test)]
mod test {
	use super::*;

	fn input(method: PayoutMethod, amount: i64) -> WithdrawInput {
		WithdrawInput {
			method,
			amount,
			phone_number: None,
			paybill_number: None,
			account_number: None,
			till_number: None,
			bank_name: None,
			bank_account_number: None,
			bank_account_name: None,
		}
	}

	#[test]
	fn test_normalize_phone() {
		assert_eq!(normalize_phone("0712345678").as_deref(), Some("254712345678"));
		assert_eq!(normalize_phone("0112345678").as_deref(), Some("254112345678"));
		assert_eq!(normalize_phone("+254 712-345-678").as_deref(), Some("254712345678"));
		assert_eq!(normalize_phone("254712345678").as_deref(), Some("254712345678"));
		assert_eq!(normalize_phone("0812345678"), None);
		assert_eq!(normalize_phone("07123"), None);
		assert_eq!(normalize_phone("07123456ab"), None);
	}

	#[test]
	fn test_mpesa_below_minimum() {
		let mut request = input(PayoutMethod::Mpesa, 150);

		request.phone_number = Some("0712345678".into());

		assert_eq!(
			validate(&request),
			Err(WithdrawalError::BelowMinimum(PayoutMethod::Mpesa))
		);
	}

	#[test]
	fn test_bank_minimum_is_higher() {
		let mut request = input(PayoutMethod::BankTransfer, 500);

		request.bank_name = Some("Equity".into());
		request.bank_account_number = Some("0123456789".into());
		request.bank_account_name = Some("Jane Wanjiku".into());

		assert_eq!(
			validate(&request),
			Err(WithdrawalError::BelowMinimum(PayoutMethod::BankTransfer))
		);

		request.amount = 1_000;

		assert!(validate(&request).is_ok());
	}

	#[test]
	fn test_maximum_applies_to_every_method() {
		let mut request = input(PayoutMethod::MpesaTill, MAXIMUM_AMOUNT + 1);

		request.till_number = Some("123456".into());

		assert_eq!(validate(&request), Err(WithdrawalError::AboveMaximum));
	}

	#[test]
	fn test_required_fields_per_method() {
		let request = input(PayoutMethod::MpesaPaybill, 500);

		assert_eq!(
			validate(&request),
			Err(WithdrawalError::MissingField("paybillNumber"))
		);

		let mut request = input(PayoutMethod::BankTransfer, 5_000);

		request.bank_name = Some("KCB".into());
		request.bank_account_number = Some("   ".into());

		let error = validate(&request).unwrap_err();

		assert_eq!(error, WithdrawalError::MissingField("bankAccountNumber"));
		assert_eq!(error.field(), "bankAccountNumber");
	}

	#[test]
	fn test_mpesa_destination_is_normalized() {
		let mut request = input(PayoutMethod::Mpesa, 200);

		request.phone_number = Some("+254712345678".into());

		assert_eq!(
			validate(&request),
			Ok(Destination::Mpesa {
				phone_number: "254712345678".into(),
			})
		);
	}

	#[test]
	fn test_till_number_must_be_numeric() {
		let mut request = input(PayoutMethod::MpesaTill, 300);

		request.till_number = Some("12A456".into());

		assert_eq!(
			validate(&request),
			Err(WithdrawalError::NotNumeric("tillNumber"))
		);
	}
}
