use axum::extract::State;
use macros::route;
use uuid::Uuid;

use crate::{
	extract::{Json, Path, Query, Session},
	openapi::tag,
	Database,
};

use super::{model, Error, RouteError};

/// Lists the conversations of `user_id`, or just the one with `id`.
async fn fetch_conversations(
	database: &Database,
	user_id: Uuid,
	id: Option<Uuid>,
) -> Result<Vec<model::Conversation>, sqlx::Error> {
	sqlx::query_as::<_, model::Conversation>(
		r#"
			SELECT
				c.id,
				c.last_message_at,
				c.created_at,
				u.id AS participant_id,
				u.username AS participant_username,
				(
					SELECT COUNT(*) FROM chat_message m
					WHERE m.conversation_id = c.id AND m.sender_id <> $1 AND m.read_at IS NULL
				) AS unread_count
			FROM conversation c
			JOIN "user" u ON u.id = CASE WHEN c.user_a = $1 THEN c.user_b ELSE c.user_a END
			WHERE (c.user_a = $1 OR c.user_b = $1) AND ($2::uuid IS NULL OR c.id = $2)
			ORDER BY c.last_message_at DESC NULLS LAST, c.created_at DESC
		"#,
	)
	.bind(user_id)
	.bind(id)
	.fetch_all(database)
	.await
}

async fn ensure_member(database: &Database, id: Uuid, user_id: Uuid) -> Result<(), RouteError> {
	let member = sqlx::query_scalar::<_, bool>(
		"SELECT EXISTS (SELECT 1 FROM conversation WHERE id = $1 AND (user_a = $2 OR user_b = $2))",
	)
	.bind(id)
	.bind(user_id)
	.fetch_one(database)
	.await?;

	if member {
		Ok(())
	} else {
		Err(Error::UnknownConversation(id).into())
	}
}

/// List conversations
/// Returns your conversations, most recently active first.
#[route(tag = tag::CHAT)]
pub async fn get_conversations(
	State(database): State<Database>,
	session: Session,
) -> Result<Json<Vec<model::Conversation>>, RouteError> {
	Ok(Json(
		fetch_conversations(&database, session.user.id, None).await?,
	))
}

/// Start conversation
/// Returns your conversation with a user, creating it if needed.
#[route(tag = tag::CHAT)]
pub async fn create_conversation(
	State(database): State<Database>,
	session: Session,
	Json(input): Json<model::CreateConversationInput>,
) -> Result<Json<model::Conversation>, RouteError> {
	if input.participant_id == session.user.id {
		return Err(Error::SelfConversation.into());
	}

	let exists = sqlx::query_scalar::<_, bool>(r#"SELECT EXISTS (SELECT 1 FROM "user" WHERE id = $1)"#)
		.bind(input.participant_id)
		.fetch_one(&database)
		.await?;

	if !exists {
		return Err(Error::UnknownUser(input.participant_id).into());
	}

	let (user_a, user_b) = model::ordered_pair(session.user.id, input.participant_id);

	let id = sqlx::query_scalar::<_, Uuid>(
		r#"
			INSERT INTO conversation (user_a, user_b) VALUES ($1, $2)
			ON CONFLICT (user_a, user_b) DO UPDATE SET user_a = EXCLUDED.user_a
			RETURNING id
		"#,
	)
	.bind(user_a)
	.bind(user_b)
	.fetch_one(&database)
	.await?;

	fetch_conversations(&database, session.user.id, Some(id))
		.await?
		.pop()
		.map(Json)
		.ok_or_else(|| Error::UnknownConversation(id).into())
}

/// List messages
/// Returns a page of messages in a conversation, newest first.
/// Messages from the other participant are marked as read.
#[route(tag = tag::CHAT)]
pub async fn get_messages(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::IdInput>,
	Query(paginate): Query<model::Paginate>,
) -> Result<Json<model::Page<model::ChatMessage>>, RouteError> {
	ensure_member(&database, path.id, session.user.id).await?;

	sqlx::query(
		r#"
			UPDATE chat_message SET read_at = now()
			WHERE conversation_id = $1 AND sender_id <> $2 AND read_at IS NULL
		"#,
	)
	.bind(path.id)
	.bind(session.user.id)
	.execute(&database)
	.await?;

	let total =
		sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM chat_message WHERE conversation_id = $1")
			.bind(path.id)
			.fetch_one(&database)
			.await?;

	let mut items = sqlx::query_as::<_, model::ChatMessage>(
		r#"
			SELECT * FROM chat_message WHERE conversation_id = $1
			ORDER BY created_at DESC
			LIMIT $2 OFFSET $3
		"#,
	)
	.bind(path.id)
	.bind(paginate.limit())
	.bind(paginate.offset())
	.fetch_all(&database)
	.await?;

	let ids = items.iter().map(|message| message.id).collect::<Vec<_>>();

	let reactions = sqlx::query_as::<_, model::ReactionRow>(
		r#"
			SELECT message_id, emoji, COUNT(*) AS count, bool_or(user_id = $2) AS reacted
			FROM message_reaction
			WHERE message_id = ANY($1)
			GROUP BY message_id, emoji
			ORDER BY message_id, MIN(created_at)
		"#,
	)
	.bind(&ids)
	.bind(session.user.id)
	.fetch_all(&database)
	.await?;

	model::attach_reactions(&mut items, reactions);

	Ok(Json(model::Page {
		items,
		pagination: paginate.pagination(total),
	}))
}

/// Send message
/// Sends a message to a conversation you are part of.
#[route(tag = tag::CHAT)]
pub async fn send_message(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::IdInput>,
	Json(input): Json<model::SendMessageInput>,
) -> Result<Json<model::ChatMessage>, RouteError> {
	ensure_member(&database, path.id, session.user.id).await?;

	let mut tx = database.begin().await?;

	let message = sqlx::query_as::<_, model::ChatMessage>(
		r#"
			INSERT INTO chat_message (conversation_id, sender_id, content, attachment_url)
			VALUES ($1, $2, $3, $4)
			RETURNING *
		"#,
	)
	.bind(path.id)
	.bind(session.user.id)
	.bind(input.content.trim())
	.bind(&input.attachment_url)
	.fetch_one(&mut *tx)
	.await?;

	sqlx::query("UPDATE conversation SET last_message_at = $2 WHERE id = $1")
		.bind(path.id)
		.bind(message.created_at)
		.execute(&mut *tx)
		.await?;

	tx.commit().await?;

	Ok(Json(message))
}

/// React to message
/// Toggles your reaction with an emoji on a message.
#[route(tag = tag::CHAT)]
pub async fn react(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::IdInput>,
	Json(input): Json<model::ReactionInput>,
) -> Result<Json<model::ReactionOutput>, RouteError> {
	let visible = sqlx::query_scalar::<_, bool>(
		r#"
			SELECT EXISTS (
				SELECT 1 FROM chat_message m
				JOIN conversation c ON c.id = m.conversation_id
				WHERE m.id = $1 AND (c.user_a = $2 OR c.user_b = $2)
			)
		"#,
	)
	.bind(path.id)
	.bind(session.user.id)
	.fetch_one(&database)
	.await?;

	if !visible {
		return Err(Error::UnknownMessage(path.id).into());
	}

	let emoji = input.emoji.trim();

	let removed = sqlx::query(
		"DELETE FROM message_reaction WHERE message_id = $1 AND user_id = $2 AND emoji = $3",
	)
	.bind(path.id)
	.bind(session.user.id)
	.bind(emoji)
	.execute(&database)
	.await?
	.rows_affected();

	if removed == 0 {
		sqlx::query(
			r#"
				INSERT INTO message_reaction (message_id, user_id, emoji) VALUES ($1, $2, $3)
				ON CONFLICT DO NOTHING
			"#,
		)
		.bind(path.id)
		.bind(session.user.id)
		.bind(emoji)
		.execute(&database)
		.await?;
	}

	let count = sqlx::query_scalar::<_, i64>(
		"SELECT COUNT(*) FROM message_reaction WHERE message_id = $1 AND emoji = $2",
	)
	.bind(path.id)
	.bind(emoji)
	.fetch_one(&database)
	.await?;

	Ok(Json(model::ReactionOutput {
		emoji: emoji.to_owned(),
		reacted: removed == 0,
		count,
	}))
}
