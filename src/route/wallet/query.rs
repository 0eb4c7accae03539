use chrono::Utc;
use uuid::Uuid;

use crate::{payout::Destination, Database};

use super::model::{CallbackStatus, PaymentStatus, SupportTransaction, Wallet, Withdrawal};

pub const WITHDRAWAL_PREFIX: &str = "WD";
pub const SUPPORT_PREFIX: &str = "SUP";

/// What a payment reference refers to, by its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
	Withdrawal,
	Support,
}

impl Kind {
	pub fn of(reference: &str) -> Option<Self> {
		match reference.split_once('-')?.0 {
			WITHDRAWAL_PREFIX => Some(Self::Withdrawal),
			SUPPORT_PREFIX => Some(Self::Support),
			_ => None,
		}
	}
}

/// Generates a reference like `WD-3F2A9C0D1E4B`.
pub fn reference(prefix: &str) -> String {
	let id = Uuid::new_v4().simple().to_string();

	format!("{prefix}-{}", id[..12].to_uppercase())
}

/// Creates the wallet of a user if it does not exist yet.
pub async fn ensure_wallet<'e, E>(executor: E, user_id: Uuid) -> Result<(), sqlx::Error>
where
	E: sqlx::PgExecutor<'e>,
{
	sqlx::query("INSERT INTO author_wallet (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
		.bind(user_id)
		.execute(executor)
		.await?;

	Ok(())
}

pub async fn get_wallet(database: &Database, user_id: Uuid) -> Result<Wallet, sqlx::Error> {
	ensure_wallet(database, user_id).await?;

	sqlx::query_as::<_, Wallet>("SELECT * FROM author_wallet WHERE user_id = $1")
		.bind(user_id)
		.fetch_one(database)
		.await
}

/// The destination columns of a withdrawal row.
#[derive(Default)]
struct Columns<'a> {
	phone_number: Option<&'a str>,
	paybill_number: Option<&'a str>,
	account_number: Option<&'a str>,
	till_number: Option<&'a str>,
	bank_name: Option<&'a str>,
	bank_account_number: Option<&'a str>,
	bank_account_name: Option<&'a str>,
}

impl<'a> From<&'a Destination> for Columns<'a> {
	fn from(destination: &'a Destination) -> Self {
		match destination {
			Destination::Mpesa { phone_number } => Self {
				phone_number: Some(phone_number),
				..Self::default()
			},
			Destination::MpesaPaybill {
				paybill_number,
				account_number,
			} => Self {
				paybill_number: Some(paybill_number),
				account_number: Some(account_number),
				..Self::default()
			},
			Destination::MpesaTill { till_number } => Self {
				till_number: Some(till_number),
				..Self::default()
			},
			Destination::BankTransfer {
				bank_name,
				account_number,
				account_name,
			} => Self {
				bank_name: Some(bank_name),
				bank_account_number: Some(account_number),
				bank_account_name: Some(account_name),
				..Self::default()
			},
		}
	}
}

/// The outcome of [`reserve_withdrawal`].
pub enum Reservation {
	Reserved(Withdrawal),
	Insufficient { available: i64 },
}

/// Moves `amount` from the available to the pending balance and records a
/// pending withdrawal, in one transaction.
///
/// Nothing changes when the available balance is too low.
pub async fn reserve_withdrawal(
	database: &Database,
	user_id: Uuid,
	method: super::model::PayoutMethod,
	amount: i64,
	destination: &Destination,
) -> Result<Reservation, sqlx::Error> {
	let mut tx = database.begin().await?;

	ensure_wallet(&mut *tx, user_id).await?;

	let debited = sqlx::query(
		r#"
			UPDATE author_wallet SET
				available_balance = available_balance - $2,
				pending_balance = pending_balance + $2,
				updated_at = now()
			WHERE user_id = $1 AND available_balance >= $2
		"#,
	)
	.bind(user_id)
	.bind(amount)
	.execute(&mut *tx)
	.await?
	.rows_affected();

	if debited == 0 {
		let available = sqlx::query_scalar::<_, i64>(
			"SELECT available_balance FROM author_wallet WHERE user_id = $1",
		)
		.bind(user_id)
		.fetch_one(&mut *tx)
		.await?;

		return Ok(Reservation::Insufficient { available });
	}

	let columns = Columns::from(destination);

	let withdrawal = sqlx::query_as::<_, Withdrawal>(
		r#"
			INSERT INTO withdrawal (
				author_id, method, amount, phone_number, paybill_number, account_number,
				till_number, bank_name, bank_account_number, bank_account_name, reference
			)
			VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
			RETURNING *
		"#,
	)
	.bind(user_id)
	.bind(method)
	.bind(amount)
	.bind(columns.phone_number)
	.bind(columns.paybill_number)
	.bind(columns.account_number)
	.bind(columns.till_number)
	.bind(columns.bank_name)
	.bind(columns.bank_account_number)
	.bind(columns.bank_account_name)
	.bind(reference(WITHDRAWAL_PREFIX))
	.fetch_one(&mut *tx)
	.await?;

	tx.commit().await?;

	Ok(Reservation::Reserved(withdrawal))
}

/// Settles a pending withdrawal and moves its reserved funds.
///
/// Completed withdrawals move from pending to withdrawn, failed ones back to
/// available. Returns `None` for an unknown reference and `Some(false)` when
/// the withdrawal had already settled.
pub async fn settle_withdrawal(
	database: &Database,
	reference: &str,
	status: CallbackStatus,
	provider_reference: Option<&str>,
	reason: Option<&str>,
) -> Result<Option<bool>, sqlx::Error> {
	let mut tx = database.begin().await?;

	let settled = sqlx::query_as::<_, (Uuid, i64)>(
		r#"
			UPDATE withdrawal SET
				status = $2,
				provider_reference = COALESCE($3, provider_reference),
				failure_reason = $4,
				completed_at = $5
			WHERE reference = $1 AND status = 'PENDING'
			RETURNING author_id, amount
		"#,
	)
	.bind(reference)
	.bind(PaymentStatus::from(status))
	.bind(provider_reference)
	.bind(reason.filter(|_| status == CallbackStatus::Failed))
	.bind((status == CallbackStatus::Completed).then(Utc::now))
	.fetch_optional(&mut *tx)
	.await?;

	let Some((author_id, amount)) = settled else {
		return exists(&mut *tx, Kind::Withdrawal, reference)
			.await
			.map(|found| found.then_some(false));
	};

	let query = match status {
		CallbackStatus::Completed => {
			r#"
				UPDATE author_wallet SET
					pending_balance = pending_balance - $2,
					total_withdrawn = total_withdrawn + $2,
					updated_at = now()
				WHERE user_id = $1
			"#
		}
		CallbackStatus::Failed => {
			r#"
				UPDATE author_wallet SET
					pending_balance = pending_balance - $2,
					available_balance = available_balance + $2,
					updated_at = now()
				WHERE user_id = $1
			"#
		}
	};

	sqlx::query(query)
		.bind(author_id)
		.bind(amount)
		.execute(&mut *tx)
		.await?;

	tx.commit().await?;

	tracing::info!(%reference, author = %author_id, amount, ?status, "withdrawal settled");

	Ok(Some(true))
}

pub async fn create_support(
	database: &Database,
	author_id: Uuid,
	supporter_id: Option<Uuid>,
	supporter_name: Option<&str>,
	input: &super::model::SupportInput,
) -> Result<SupportTransaction, sqlx::Error> {
	sqlx::query_as::<_, SupportTransaction>(
		r#"
			INSERT INTO support_transaction (
				author_id, post_id, supporter_id, supporter_name, amount, message, reference
			)
			VALUES ($1, $2, $3, $4, $5, $6, $7)
			RETURNING *
		"#,
	)
	.bind(author_id)
	.bind(input.post_id)
	.bind(supporter_id)
	.bind(supporter_name)
	.bind(input.amount)
	.bind(input.message.as_deref().map(str::trim))
	.bind(reference(SUPPORT_PREFIX))
	.fetch_one(database)
	.await
}

/// Settles a pending support transaction. A completed one credits the
/// author's wallet.
///
/// Returns the same as [`settle_withdrawal`].
pub async fn settle_support(
	database: &Database,
	reference: &str,
	status: CallbackStatus,
) -> Result<Option<bool>, sqlx::Error> {
	let mut tx = database.begin().await?;

	let settled = sqlx::query_as::<_, (Uuid, i64)>(
		r#"
			UPDATE support_transaction SET status = $2, completed_at = $3
			WHERE reference = $1 AND status = 'PENDING'
			RETURNING author_id, amount
		"#,
	)
	.bind(reference)
	.bind(PaymentStatus::from(status))
	.bind((status == CallbackStatus::Completed).then(Utc::now))
	.fetch_optional(&mut *tx)
	.await?;

	let Some((author_id, amount)) = settled else {
		return exists(&mut *tx, Kind::Support, reference)
			.await
			.map(|found| found.then_some(false));
	};

	if status == CallbackStatus::Completed {
		ensure_wallet(&mut *tx, author_id).await?;

		sqlx::query(
			r#"
				UPDATE author_wallet SET
					available_balance = available_balance + $2,
					total_received = total_received + $2,
					updated_at = now()
				WHERE user_id = $1
			"#,
		)
		.bind(author_id)
		.bind(amount)
		.execute(&mut *tx)
		.await?;
	}

	tx.commit().await?;

	tracing::info!(%reference, author = %author_id, amount, ?status, "support settled");

	Ok(Some(true))
}

async fn exists<'e, E>(executor: E, kind: Kind, reference: &str) -> Result<bool, sqlx::Error>
where
	E: sqlx::PgExecutor<'e>,
{
	let query = match kind {
		Kind::Withdrawal => "SELECT EXISTS (SELECT 1 FROM withdrawal WHERE reference = $1)",
		Kind::Support => "SELECT EXISTS (SELECT 1 FROM support_transaction WHERE reference = $1)",
	};

	sqlx::query_scalar::<_, bool>(query)
		.bind(reference)
		.fetch_one(executor)
		.await
}

impl From<CallbackStatus> for PaymentStatus {
	fn from(status: CallbackStatus) -> Self {
		match status {
			CallbackStatus::Completed => Self::Completed,
			CallbackStatus::Failed => Self::Failed,
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_reference_format() {
		let reference = reference(WITHDRAWAL_PREFIX);

		assert_eq!(reference.len(), 15);
		assert!(reference.starts_with("WD-"));
		assert!(reference[3..]
			.chars()
			.all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
	}

	#[test]
	fn test_kind_of_reference() {
		assert_eq!(Kind::of("WD-0123456789AB"), Some(Kind::Withdrawal));
		assert_eq!(Kind::of("SUP-0123456789AB"), Some(Kind::Support));
		assert_eq!(Kind::of("XYZ-0123456789AB"), None);
		assert_eq!(Kind::of("WD0123456789AB"), None);
	}

	#[test]
	fn test_bank_columns() {
		let destination = Destination::BankTransfer {
			bank_name: "Equity".into(),
			account_number: "0123456789".into(),
			account_name: "Jane".into(),
		};
		let columns = Columns::from(&destination);

		assert_eq!(columns.bank_account_number, Some("0123456789"));
		assert_eq!(columns.account_number, None);
		assert_eq!(columns.phone_number, None);
	}
}
