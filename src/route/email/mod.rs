use aide::axum::{routing::get_with, ApiRouter};
use axum::http::StatusCode;

use crate::{error, AppState};

pub mod model;
pub mod route;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("a role is required for the ROLE audience")]
	MissingRole,
	#[error("user ids are required for the INDIVIDUAL audience")]
	MissingRecipients,
	#[error("no users match the audience")]
	NoRecipients,
}

pub type RouteError = error::RouteError<Error>;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new().api_route(
		"/",
		get_with(get_emails, get_emails_docs).post_with(send_email, send_email_docs),
	)
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		StatusCode::BAD_REQUEST
	}

	fn into_errors(self) -> Vec<error::Message<'static>> {
		let message = error::Message::new(self.to_string());

		match self {
			Self::MissingRole => message.field("role"),
			Self::MissingRecipients | Self::NoRecipients => message.field("userIds"),
		}
		.into_vec()
	}
}
