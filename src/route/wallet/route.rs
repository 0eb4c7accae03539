use std::sync::Arc;

use axum::extract::State;
use macros::route;

use crate::{
	extract::{CallbackSignature, Json, OptionalSession, Path, Session},
	openapi::tag,
	payout::{Payout, PayoutGateway},
	Database,
};

use super::{
	model,
	query::{self, Kind, Reservation},
	withdrawal, Error, RouteError,
};

/// Get wallet
/// Returns the balances and payout preferences of the authenticated author,
/// with their ten most recent withdrawals and support transactions.
#[route(tag = tag::WALLET)]
pub async fn get_wallet(
	State(database): State<Database>,
	session: Session,
) -> Result<Json<model::WalletOverview>, RouteError> {
	let wallet = query::get_wallet(&database, session.user.id).await?;

	let recent_withdrawals = sqlx::query_as::<_, model::Withdrawal>(
		"SELECT * FROM withdrawal WHERE author_id = $1 ORDER BY created_at DESC LIMIT 10",
	)
	.bind(session.user.id)
	.fetch_all(&database)
	.await?;

	let recent_support = sqlx::query_as::<_, model::SupportTransaction>(
		"SELECT * FROM support_transaction WHERE author_id = $1 ORDER BY created_at DESC LIMIT 10",
	)
	.bind(session.user.id)
	.fetch_all(&database)
	.await?;

	Ok(Json(model::WalletOverview {
		wallet,
		recent_withdrawals,
		recent_support,
	}))
}

/// Update wallet
/// Updates the payout preferences of the authenticated author.
/// M-Pesa phone numbers are stored in the `2547XXXXXXXX` form.
#[route(tag = tag::WALLET)]
pub async fn update_wallet(
	State(database): State<Database>,
	session: Session,
	Json(input): Json<model::UpdateWalletInput>,
) -> Result<Json<model::Wallet>, RouteError> {
	query::ensure_wallet(&database, session.user.id).await?;

	let wallet = sqlx::query_as::<_, model::Wallet>(
		r#"
			UPDATE author_wallet SET
				preferred_method = COALESCE($2, preferred_method),
				mpesa_phone = COALESCE($3, mpesa_phone),
				bank_name = COALESCE($4, bank_name),
				bank_account_number = COALESCE($5, bank_account_number),
				bank_account_name = COALESCE($6, bank_account_name),
				updated_at = now()
			WHERE user_id = $1
			RETURNING *
		"#,
	)
	.bind(session.user.id)
	.bind(input.preferred_method)
	.bind(input.mpesa_phone.as_deref().and_then(withdrawal::normalize_phone))
	.bind(input.bank_name.as_deref().map(str::trim))
	.bind(input.bank_account_number.as_deref().map(str::trim))
	.bind(input.bank_account_name.as_deref().map(str::trim))
	.fetch_one(&database)
	.await?;

	Ok(Json(wallet))
}

/// Withdraw
/// Withdraws from the available balance of the authenticated author.
/// The funds are held as pending until the payout provider confirms the payout,
/// and are returned to the available balance if it fails.
#[route(tag = tag::WALLET)]
pub async fn withdraw(
	State(database): State<Database>,
	State(payouts): State<Arc<dyn PayoutGateway>>,
	session: Session,
	Json(input): Json<model::WithdrawInput>,
) -> Result<Json<model::Withdrawal>, RouteError> {
	let destination = withdrawal::validate(&input).map_err(Error::from)?;

	let reservation = query::reserve_withdrawal(
		&database,
		session.user.id,
		input.method,
		input.amount,
		&destination,
	)
	.await?;

	let withdrawal = match reservation {
		Reservation::Reserved(withdrawal) => withdrawal,
		Reservation::Insufficient { available } => {
			return Err(Error::InsufficientBalance { available }.into());
		}
	};

	tracing::info!(
		withdrawal = %withdrawal.id,
		reference = %withdrawal.reference,
		author = %session.user.id,
		amount = withdrawal.amount,
		"withdrawal requested"
	);

	let payout = Payout {
		reference: withdrawal.reference.clone(),
		amount: withdrawal.amount,
		destination,
	};

	match payouts.send(&payout).await {
		Ok(receipt) => {
			let Some(provider_reference) = receipt.provider_reference else {
				return Ok(Json(withdrawal));
			};

			let withdrawal = sqlx::query_as::<_, model::Withdrawal>(
				"UPDATE withdrawal SET provider_reference = $2 WHERE id = $1 RETURNING *",
			)
			.bind(withdrawal.id)
			.bind(provider_reference)
			.fetch_one(&database)
			.await?;

			Ok(Json(withdrawal))
		}
		Err(error) => {
			query::settle_withdrawal(
				&database,
				&withdrawal.reference,
				model::CallbackStatus::Failed,
				None,
				Some(&error.to_string()),
			)
			.await?;

			Err(Error::Gateway(error).into())
		}
	}
}

/// Support author
/// Sends a tip to an author. The tip stays pending until the payment provider
/// confirms it, and is then credited to the author's wallet.
#[route(tag = tag::PAYMENT)]
pub async fn support_author(
	State(database): State<Database>,
	OptionalSession(session): OptionalSession,
	Path(path): Path<model::IdInput>,
	Json(input): Json<model::SupportInput>,
) -> Result<Json<model::SupportTransaction>, RouteError> {
	if session.as_ref().is_some_and(|session| session.user.id == path.id) {
		return Err(Error::SelfSupport.into());
	}

	let exists = sqlx::query_scalar::<_, bool>(r#"SELECT EXISTS (SELECT 1 FROM "user" WHERE id = $1)"#)
		.bind(path.id)
		.fetch_one(&database)
		.await?;

	if !exists {
		return Err(Error::UnknownAuthor(path.id).into());
	}

	if let Some(post_id) = input.post_id {
		let owned = sqlx::query_scalar::<_, bool>(
			"SELECT EXISTS (SELECT 1 FROM blog_post WHERE id = $1 AND author_id = $2)",
		)
		.bind(post_id)
		.bind(path.id)
		.fetch_one(&database)
		.await?;

		if !owned {
			return Err(Error::UnknownPost(post_id).into());
		}
	}

	let supporter_name = input
		.supporter_name
		.as_deref()
		.map(str::trim)
		.or(session.as_ref().map(|session| session.user.username.as_str()));

	let support = query::create_support(
		&database,
		path.id,
		session.as_ref().map(|session| session.user.id),
		supporter_name,
		&input,
	)
	.await?;

	tracing::info!(
		support = %support.id,
		reference = %support.reference,
		author = %path.id,
		amount = support.amount,
		"support requested"
	);

	Ok(Json(support))
}

/// Payment callback
/// Settles a pending withdrawal or support transaction by its reference.
/// Requests must carry the shared secret in the `X-Callback-Secret` header.
/// Settling an already settled payment changes nothing.
#[route(tag = tag::PAYMENT)]
pub async fn payment_callback(
	State(database): State<Database>,
	_signature: CallbackSignature,
	Json(input): Json<model::CallbackInput>,
) -> Result<Json<model::CallbackOutput>, RouteError> {
	let reference = input.reference.trim();

	let applied = match Kind::of(reference) {
		Some(Kind::Withdrawal) => {
			query::settle_withdrawal(
				&database,
				reference,
				input.status,
				input.provider_reference.as_deref(),
				input.reason.as_deref(),
			)
			.await?
		}
		Some(Kind::Support) => query::settle_support(&database, reference, input.status).await?,
		None => None,
	}
	.ok_or_else(|| Error::UnknownReference(reference.to_owned()))?;

	if !applied {
		tracing::info!(%reference, "payment already settled");
	}

	Ok(Json(model::CallbackOutput {
		reference: reference.to_owned(),
		applied,
	}))
}
