use axum::{extract::State, http::StatusCode};
use chrono::Utc;
use macros::route;
use validator::ValidationErrors;

use crate::{
	extract::{AdminSession, Json, Path, Query},
	openapi::tag,
	Database,
};

use super::{model, Error, RouteError};

fn check_discount(
	discount_type: model::DiscountType,
	discount_value: i64,
) -> Result<(), ValidationErrors> {
	model::check_discount(discount_type, discount_value).map_err(|error| {
		let mut errors = ValidationErrors::new();

		errors.add("discountValue", error);
		errors
	})
}

/// Maps a unique violation on the voucher code to a conflict.
fn voucher_conflict(code: &str) -> impl FnOnce(sqlx::Error) -> RouteError + '_ {
	move |error| match error {
		sqlx::Error::Database(ref database)
			if database.constraint() == Some("delivery_voucher_code_key") =>
		{
			Error::DuplicateCode(code.to_owned()).into()
		}
		error => error.into(),
	}
}

/// List delivery fees
/// Returns all delivery fees, the default one first.
/// Pass `active=true` to only return active fees.
#[route(tag = tag::DELIVERY)]
pub async fn get_fees(
	State(database): State<Database>,
	Query(filter): Query<model::ListQuery>,
) -> Result<Json<Vec<model::DeliveryFee>>, RouteError> {
	let fees = sqlx::query_as::<_, model::DeliveryFee>(
		r#"
			SELECT * FROM delivery_fee
			WHERE $1::boolean IS NULL OR is_active = $1
			ORDER BY is_default DESC, name
		"#,
	)
	.bind(filter.active)
	.fetch_all(&database)
	.await?;

	Ok(Json(fees))
}

/// Create delivery fee
/// Creates a delivery fee. Making it the default unsets the previous default.
#[route(tag = tag::DELIVERY)]
pub async fn create_fee(
	State(database): State<Database>,
	AdminSession(session): AdminSession,
	Json(input): Json<model::CreateDeliveryFeeInput>,
) -> Result<Json<model::DeliveryFee>, RouteError> {
	let mut tx = database.begin().await?;

	if input.is_default {
		sqlx::query("UPDATE delivery_fee SET is_default = FALSE, updated_at = now() WHERE is_default")
			.execute(&mut *tx)
			.await?;
	}

	let fee = sqlx::query_as::<_, model::DeliveryFee>(
		r#"
			INSERT INTO delivery_fee (name, description, amount, zones, is_active, is_default)
			VALUES ($1, $2, $3, $4, $5, $6)
			RETURNING *
		"#,
	)
	.bind(input.name.trim())
	.bind(&input.description)
	.bind(input.amount)
	.bind(&input.zones)
	.bind(input.is_active)
	.bind(input.is_default)
	.fetch_one(&mut *tx)
	.await?;

	tx.commit().await?;

	tracing::info!(fee = %fee.id, admin = %session.user.id, "delivery fee created");

	Ok(Json(fee))
}

/// Update delivery fee
/// Updates the given fields of a delivery fee.
/// Making it the default unsets the previous default.
#[route(tag = tag::DELIVERY)]
pub async fn update_fee(
	State(database): State<Database>,
	AdminSession(session): AdminSession,
	Path(path): Path<model::IdInput>,
	Json(input): Json<model::UpdateDeliveryFeeInput>,
) -> Result<Json<model::DeliveryFee>, RouteError> {
	let mut tx = database.begin().await?;

	if input.is_default == Some(true) {
		sqlx::query(
			r#"
				UPDATE delivery_fee SET is_default = FALSE, updated_at = now()
				WHERE is_default AND id <> $1
			"#,
		)
		.bind(path.id)
		.execute(&mut *tx)
		.await?;
	}

	let fee = sqlx::query_as::<_, model::DeliveryFee>(
		r#"
			UPDATE delivery_fee SET
				name = COALESCE($1, name),
				description = COALESCE($2, description),
				amount = COALESCE($3, amount),
				zones = COALESCE($4, zones),
				is_active = COALESCE($5, is_active),
				is_default = COALESCE($6, is_default),
				updated_at = now()
			WHERE id = $7
			RETURNING *
		"#,
	)
	.bind(input.name.as_deref().map(str::trim))
	.bind(input.description.as_deref())
	.bind(input.amount)
	.bind(input.zones.as_deref())
	.bind(input.is_active)
	.bind(input.is_default)
	.bind(path.id)
	.fetch_optional(&mut *tx)
	.await?
	.ok_or(Error::UnknownFee(path.id))?;

	tx.commit().await?;

	tracing::info!(fee = %fee.id, admin = %session.user.id, "delivery fee updated");

	Ok(Json(fee))
}

/// Delete delivery fee
/// Deletes a delivery fee.
#[route(tag = tag::DELIVERY)]
pub async fn delete_fee(
	State(database): State<Database>,
	AdminSession(session): AdminSession,
	Path(path): Path<model::IdInput>,
) -> Result<StatusCode, RouteError> {
	let result = sqlx::query("DELETE FROM delivery_fee WHERE id = $1")
		.bind(path.id)
		.execute(&database)
		.await?;

	if result.rows_affected() == 0 {
		return Err(Error::UnknownFee(path.id).into());
	}

	tracing::info!(fee = %path.id, admin = %session.user.id, "delivery fee deleted");

	Ok(StatusCode::NO_CONTENT)
}

/// List delivery vouchers
/// Returns all delivery vouchers, newest first.
/// Pass `active=true` to only return active vouchers.
#[route(tag = tag::DELIVERY)]
pub async fn get_vouchers(
	State(database): State<Database>,
	Query(filter): Query<model::ListQuery>,
) -> Result<Json<Vec<model::DeliveryVoucher>>, RouteError> {
	let vouchers = sqlx::query_as::<_, model::DeliveryVoucher>(
		r#"
			SELECT * FROM delivery_voucher
			WHERE $1::boolean IS NULL OR is_active = $1
			ORDER BY created_at DESC
		"#,
	)
	.bind(filter.active)
	.fetch_all(&database)
	.await?;

	Ok(Json(vouchers))
}

/// Create delivery voucher
/// Creates a delivery voucher. Codes are stored in upper case and must be unique.
#[route(tag = tag::DELIVERY)]
pub async fn create_voucher(
	State(database): State<Database>,
	AdminSession(session): AdminSession,
	Json(input): Json<model::CreateDeliveryVoucherInput>,
) -> Result<Json<model::DeliveryVoucher>, RouteError> {
	check_discount(input.discount_type, input.discount_value)?;

	let code = input.code.trim().to_uppercase();

	let voucher = sqlx::query_as::<_, model::DeliveryVoucher>(
		r#"
			INSERT INTO delivery_voucher (
				code, description, discount_type, discount_value, minimum_order,
				max_uses, zones, is_active, expires_at
			)
			VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
			RETURNING *
		"#,
	)
	.bind(&code)
	.bind(&input.description)
	.bind(input.discount_type)
	.bind(input.discount_value)
	.bind(input.minimum_order)
	.bind(input.max_uses)
	.bind(&input.zones)
	.bind(input.is_active)
	.bind(input.expires_at)
	.fetch_one(&database)
	.await
	.map_err(voucher_conflict(&code))?;

	tracing::info!(voucher = %voucher.id, %code, admin = %session.user.id, "delivery voucher created");

	Ok(Json(voucher))
}

/// Update delivery voucher
/// Updates the given fields of a delivery voucher.
#[route(tag = tag::DELIVERY)]
pub async fn update_voucher(
	State(database): State<Database>,
	AdminSession(session): AdminSession,
	Path(path): Path<model::IdInput>,
	Json(input): Json<model::UpdateDeliveryVoucherInput>,
) -> Result<Json<model::DeliveryVoucher>, RouteError> {
	let mut tx = database.begin().await?;

	let current = sqlx::query_as::<_, model::DeliveryVoucher>(
		"SELECT * FROM delivery_voucher WHERE id = $1 FOR UPDATE",
	)
	.bind(path.id)
	.fetch_optional(&mut *tx)
	.await?
	.ok_or(Error::UnknownVoucher(path.id))?;

	check_discount(
		input.discount_type.unwrap_or(current.discount_type),
		input.discount_value.unwrap_or(current.discount_value),
	)?;

	let code = input
		.code
		.as_deref()
		.map_or(current.code, |code| code.trim().to_uppercase());

	let voucher = sqlx::query_as::<_, model::DeliveryVoucher>(
		r#"
			UPDATE delivery_voucher SET
				code = $1,
				description = COALESCE($2, description),
				discount_type = COALESCE($3, discount_type),
				discount_value = COALESCE($4, discount_value),
				minimum_order = COALESCE($5, minimum_order),
				max_uses = CASE WHEN $6 THEN $7 ELSE max_uses END,
				zones = COALESCE($8, zones),
				is_active = COALESCE($9, is_active),
				expires_at = CASE WHEN $10 THEN $11 ELSE expires_at END,
				updated_at = now()
			WHERE id = $12
			RETURNING *
		"#,
	)
	.bind(&code)
	.bind(input.description.as_deref())
	.bind(input.discount_type)
	.bind(input.discount_value)
	.bind(input.minimum_order)
	.bind(input.max_uses.is_some())
	.bind(input.max_uses.flatten())
	.bind(input.zones.as_deref())
	.bind(input.is_active)
	.bind(input.expires_at.is_some())
	.bind(input.expires_at.flatten())
	.bind(path.id)
	.fetch_one(&mut *tx)
	.await
	.map_err(voucher_conflict(&code))?;

	tx.commit().await?;

	tracing::info!(voucher = %voucher.id, admin = %session.user.id, "delivery voucher updated");

	Ok(Json(voucher))
}

/// Delete delivery voucher
/// Deletes a delivery voucher.
#[route(tag = tag::DELIVERY)]
pub async fn delete_voucher(
	State(database): State<Database>,
	AdminSession(session): AdminSession,
	Path(path): Path<model::IdInput>,
) -> Result<StatusCode, RouteError> {
	let result = sqlx::query("DELETE FROM delivery_voucher WHERE id = $1")
		.bind(path.id)
		.execute(&database)
		.await?;

	if result.rows_affected() == 0 {
		return Err(Error::UnknownVoucher(path.id).into());
	}

	tracing::info!(voucher = %path.id, admin = %session.user.id, "delivery voucher deleted");

	Ok(StatusCode::NO_CONTENT)
}

/// Quote voucher
/// Computes the discounted delivery fee for an order.
/// Uses the given fee, or the default fee when none is given. Nothing is redeemed.
#[route(tag = tag::DELIVERY)]
pub async fn quote_voucher(
	State(database): State<Database>,
	Json(input): Json<model::QuoteInput>,
) -> Result<Json<model::Quote>, RouteError> {
	let code = input.code.trim().to_uppercase();

	let voucher = sqlx::query_as::<_, model::DeliveryVoucher>(
		"SELECT * FROM delivery_voucher WHERE code = $1",
	)
	.bind(&code)
	.fetch_optional(&database)
	.await?
	.ok_or_else(|| Error::UnknownCode(code.clone()))?;

	let fee = match input.fee_id {
		Some(id) => sqlx::query_as::<_, model::DeliveryFee>(
			"SELECT * FROM delivery_fee WHERE id = $1 AND is_active",
		)
		.bind(id)
		.fetch_optional(&database)
		.await?
		.ok_or(Error::UnknownFee(id))?,
		None => sqlx::query_as::<_, model::DeliveryFee>(
			"SELECT * FROM delivery_fee WHERE is_default AND is_active",
		)
		.fetch_optional(&database)
		.await?
		.ok_or(Error::NoDefaultFee)?,
	};

	let discount = voucher
		.discount(fee.amount, input.order_amount, &input.zone, Utc::now())
		.map_err(Error::from)?;

	Ok(Json(model::Quote {
		code,
		fee_id: fee.id,
		fee: fee.amount,
		discount,
		total: fee.amount - discount,
	}))
}
