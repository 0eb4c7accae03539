use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub use crate::route::model::{IdInput, Page, Paginate};

/// A conversation, as seen by one of its two participants.
#[derive(Debug, Serialize, JsonSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
	pub id: Uuid,
	/// The other participant.
	pub participant_id: Uuid,
	pub participant_username: String,
	/// Messages from the other participant you have not read yet.
	pub unread_count: i64,
	pub last_message_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
}

/// The two participants of a conversation, in storage order.
pub fn ordered_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
	if a < b {
		(a, b)
	} else {
		(b, a)
	}
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationInput {
	pub participant_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReactionSummary {
	pub emoji: String,
	pub count: i64,
	/// Whether you reacted with this emoji.
	pub reacted: bool,
}

#[derive(Debug, Serialize, JsonSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
	pub id: Uuid,
	pub conversation_id: Uuid,
	pub sender_id: Uuid,
	pub content: String,
	pub attachment_url: Option<String>,
	pub read_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	#[sqlx(skip)]
	pub reactions: Vec<ReactionSummary>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ReactionRow {
	pub message_id: Uuid,
	pub emoji: String,
	pub count: i64,
	pub reacted: bool,
}

/// Attaches reaction summaries to the messages they belong to.
pub fn attach_reactions(messages: &mut [ChatMessage], rows: Vec<ReactionRow>) {
	for row in rows {
		if let Some(message) = messages.iter_mut().find(|message| message.id == row.message_id) {
			message.reactions.push(ReactionSummary {
				emoji: row.emoji,
				count: row.count,
				reacted: row.reacted,
			});
		}
	}
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageInput {
	#[validate(length(min = 1, max = 5_000))]
	pub content: String,
	#[validate(url)]
	pub attachment_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct ReactionInput {
	#[validate(length(min = 1, max = 16))]
	pub emoji: String,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReactionOutput {
	pub emoji: String,
	/// Whether the reaction is now present.
	pub reacted: bool,
	pub count: i64,
}
