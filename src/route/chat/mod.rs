use aide::axum::{
	routing::{get_with, post_with},
	ApiRouter,
};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::{error, AppState};

pub mod model;
pub mod route;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("you cannot start a conversation with yourself")]
	SelfConversation,
	#[error("unknown user {0}")]
	UnknownUser(Uuid),
	#[error("unknown conversation {0}")]
	UnknownConversation(Uuid),
	#[error("unknown message {0}")]
	UnknownMessage(Uuid),
}

pub type RouteError = error::RouteError<Error>;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route(
			"/conversations",
			get_with(get_conversations, get_conversations_docs)
				.post_with(create_conversation, create_conversation_docs),
		)
		.api_route(
			"/conversations/:id/messages",
			get_with(get_messages, get_messages_docs).post_with(send_message, send_message_docs),
		)
		.api_route("/messages/:id/reactions", post_with(react, react_docs))
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::SelfConversation => StatusCode::BAD_REQUEST,
			Self::UnknownUser(..) | Self::UnknownConversation(..) | Self::UnknownMessage(..) => {
				StatusCode::NOT_FOUND
			}
		}
	}

	fn into_errors(self) -> Vec<error::Message<'static>> {
		let message = error::Message::new(self.to_string());

		match self {
			Self::SelfConversation | Self::UnknownUser(..) => message.field("participantId"),
			_ => message,
		}
		.into_vec()
	}
}
