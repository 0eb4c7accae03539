use aide::axum::{
	routing::{get_with, post_with},
	ApiRouter,
};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::{error, payout, AppState};

use self::withdrawal::WithdrawalError;

pub mod model;
pub mod query;
pub mod route;
pub mod withdrawal;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Withdrawal(#[from] WithdrawalError),
	#[error("insufficient balance, KES {available} is available")]
	InsufficientBalance { available: i64 },
	#[error("payout failed: {0}")]
	Gateway(payout::Error),
	#[error("unknown author {0}")]
	UnknownAuthor(Uuid),
	#[error("unknown post {0}")]
	UnknownPost(Uuid),
	#[error("you cannot support yourself")]
	SelfSupport,
	#[error("unknown payment reference {0}")]
	UnknownReference(String),
	#[error("invalid callback secret")]
	InvalidSignature,
}

pub type RouteError = error::RouteError<Error>;

/// Routes that move money out of a wallet, which get a stricter rate limit.
pub fn payout_routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route("/author/wallet/withdraw", post_with(withdraw, withdraw_docs))
		.api_route(
			"/authors/:id/support",
			post_with(support_author, support_author_docs),
		)
}

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route(
			"/author/wallet",
			get_with(get_wallet, get_wallet_docs).patch_with(update_wallet, update_wallet_docs),
		)
		.api_route(
			"/payments/callback",
			post_with(payment_callback, payment_callback_docs),
		)
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::Withdrawal(..) | Self::SelfSupport => StatusCode::BAD_REQUEST,
			Self::InsufficientBalance { .. } => StatusCode::CONFLICT,
			Self::Gateway(..) => StatusCode::BAD_GATEWAY,
			Self::UnknownAuthor(..) | Self::UnknownPost(..) | Self::UnknownReference(..) => {
				StatusCode::NOT_FOUND
			}
			Self::InvalidSignature => StatusCode::UNAUTHORIZED,
		}
	}

	fn into_errors(self) -> Vec<error::Message<'static>> {
		match self {
			Self::Withdrawal(error) => error::Message::new(error.to_string()).field(error.field()),
			Self::InsufficientBalance { available } => error::Message::new(self.to_string())
				.field("amount")
				.detail("available", available),
			// the provider's response is logged, not shown
			Self::Gateway(..) => {
				error::Message::new("the payout could not be sent, your balance was not charged")
			}
			Self::UnknownPost(..) => error::Message::new(self.to_string()).field("postId"),
			Self::UnknownReference(..) => error::Message::new(self.to_string()).field("reference"),
			_ => error::Message::new(self.to_string()),
		}
		.into_vec()
	}
}
