use aide::axum::{
	routing::{get_with, post_with, put_with},
	ApiRouter,
};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::{error, AppState};

use self::model::VoucherError;

pub mod model;
pub mod route;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unknown delivery fee {0}")]
	UnknownFee(Uuid),
	#[error("unknown delivery voucher {0}")]
	UnknownVoucher(Uuid),
	#[error("unknown voucher code {0}")]
	UnknownCode(String),
	#[error("no default delivery fee is configured")]
	NoDefaultFee,
	#[error("voucher code {0} is already taken")]
	DuplicateCode(String),
	#[error(transparent)]
	Voucher(#[from] VoucherError),
}

pub type RouteError = error::RouteError<Error>;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route(
			"/delivery-fees",
			get_with(get_fees, get_fees_docs).post_with(create_fee, create_fee_docs),
		)
		.api_route(
			"/delivery-fees/:id",
			put_with(update_fee, update_fee_docs).delete_with(delete_fee, delete_fee_docs),
		)
		.api_route(
			"/delivery-vouchers",
			get_with(get_vouchers, get_vouchers_docs).post_with(create_voucher, create_voucher_docs),
		)
		.api_route(
			"/delivery-vouchers/quote",
			post_with(quote_voucher, quote_voucher_docs),
		)
		.api_route(
			"/delivery-vouchers/:id",
			put_with(update_voucher, update_voucher_docs)
				.delete_with(delete_voucher, delete_voucher_docs),
		)
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::UnknownFee(..)
			| Self::UnknownVoucher(..)
			| Self::UnknownCode(..)
			| Self::NoDefaultFee => StatusCode::NOT_FOUND,
			Self::DuplicateCode(..) => StatusCode::CONFLICT,
			Self::Voucher(..) => StatusCode::BAD_REQUEST,
		}
	}

	fn into_errors(self) -> Vec<error::Message<'static>> {
		let message = error::Message::new(self.to_string());

		match self {
			Self::DuplicateCode(..) | Self::UnknownCode(..) | Self::Voucher(..) => {
				message.field("code")
			}
			Self::UnknownFee(..) | Self::NoDefaultFee => message.field("feeId"),
			Self::UnknownVoucher(..) => message,
		}
		.into_vec()
	}
}
