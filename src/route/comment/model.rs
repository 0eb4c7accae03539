use std::{
	collections::{HashMap, HashSet},
	fmt,
};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};
use uuid::Uuid;
use validator::Validate;

pub use crate::route::model::{IdInput, Page, Paginate, SlugInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema, sqlx::Type)]
#[sqlx(type_name = "comment_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommentStatus {
	#[serde(alias = "pending")]
	Pending,
	#[serde(alias = "approved")]
	Approved,
	#[serde(alias = "rejected")]
	Rejected,
}

impl CommentStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Pending => "PENDING",
			Self::Approved => "APPROVED",
			Self::Rejected => "REJECTED",
		}
	}
}

impl fmt::Display for CommentStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// The moderation state of a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommentModeration {
	Pending,
	Approved {
		#[serde(rename = "moderatedAt")]
		moderated_at: DateTime<Utc>,
	},
	Rejected {
		reason: Option<String>,
		#[serde(rename = "moderatedAt")]
		moderated_at: DateTime<Utc>,
	},
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("the comment was already moderated ({0})")]
pub struct AlreadyModerated(pub CommentStatus);

impl CommentModeration {
	pub fn status(&self) -> CommentStatus {
		match self {
			Self::Pending => CommentStatus::Pending,
			Self::Approved { .. } => CommentStatus::Approved,
			Self::Rejected { .. } => CommentStatus::Rejected,
		}
	}

	pub fn is_approved(&self) -> bool {
		matches!(self, Self::Approved { .. })
	}

	pub fn reason(&self) -> Option<&str> {
		match self {
			Self::Rejected { reason, .. } => reason.as_deref(),
			_ => None,
		}
	}

	pub fn moderated_at(&self) -> Option<DateTime<Utc>> {
		match self {
			Self::Pending => None,
			Self::Approved { moderated_at } | Self::Rejected { moderated_at, .. } => {
				Some(*moderated_at)
			}
		}
	}

	/// Moderates a pending comment. Comments are only ever moderated once.
	pub fn decide(
		&self,
		decision: Decision,
		reason: Option<String>,
		now: DateTime<Utc>,
	) -> Result<Self, AlreadyModerated> {
		if *self != Self::Pending {
			return Err(AlreadyModerated(self.status()));
		}

		Ok(match decision {
			Decision::Approve => Self::Approved { moderated_at: now },
			Decision::Reject => Self::Rejected {
				reason: reason
					.map(|reason| reason.trim().to_owned())
					.filter(|reason| !reason.is_empty()),
				moderated_at: now,
			},
		})
	}
}

/// Who wrote a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommentAuthor {
	Registered {
		#[serde(rename = "userId")]
		user_id: Uuid,
		username: String,
	},
	Guest {
		name: String,
		/// Only shown to admins.
		#[serde(skip_serializing_if = "Option::is_none")]
		email: Option<String>,
	},
}

/// A comment, as read from `blog_comment_view`.
#[derive(Debug, Clone)]
pub struct Comment {
	pub id: Uuid,
	pub post_id: Uuid,
	pub post_slug: String,
	pub post_title: String,
	pub parent_id: Option<Uuid>,
	pub author: CommentAuthor,
	pub content: String,
	pub moderation: CommentModeration,
	pub created_at: DateTime<Utc>,
}

impl FromRow<'_, PgRow> for Comment {
	fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
		let author = match row.try_get::<Option<Uuid>, _>("author_id")? {
			Some(user_id) => CommentAuthor::Registered {
				user_id,
				username: row
					.try_get::<Option<String>, _>("author_username")?
					.unwrap_or_default(),
			},
			None => CommentAuthor::Guest {
				name: row
					.try_get::<Option<String>, _>("guest_name")?
					.unwrap_or_default(),
				email: row.try_get("guest_email")?,
			},
		};

		let moderated_at = row.try_get::<Option<DateTime<Utc>>, _>("moderated_at")?;
		let moderation = match (row.try_get::<CommentStatus, _>("status")?, moderated_at) {
			(CommentStatus::Pending, _) => CommentModeration::Pending,
			(CommentStatus::Approved, Some(moderated_at)) => {
				CommentModeration::Approved { moderated_at }
			}
			(CommentStatus::Rejected, Some(moderated_at)) => CommentModeration::Rejected {
				reason: row.try_get("moderation_reason")?,
				moderated_at,
			},
			(status, None) => {
				return Err(sqlx::Error::ColumnDecode {
					index: "moderated_at".into(),
					source: format!("{} comment without a moderation time", status.as_str()).into(),
				})
			}
		};

		Ok(Self {
			id: row.try_get("id")?,
			post_id: row.try_get("post_id")?,
			post_slug: row.try_get("post_slug")?,
			post_title: row.try_get("post_title")?,
			parent_id: row.try_get("parent_id")?,
			author,
			content: row.try_get("content")?,
			moderation,
			created_at: row.try_get("created_at")?,
		})
	}
}

/// A comment as sent to clients.
///
/// `isApproved` and `moderationReason` are derived from the moderation state.
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommentOutput {
	pub id: Uuid,
	pub post_id: Uuid,
	pub post_slug: String,
	pub post_title: String,
	pub parent_id: Option<Uuid>,
	pub author: CommentAuthor,
	pub content: String,
	#[serde(flatten)]
	pub moderation: CommentModeration,
	pub is_approved: bool,
	pub moderation_reason: Option<String>,
	pub created_at: DateTime<Utc>,
}

impl From<Comment> for CommentOutput {
	fn from(comment: Comment) -> Self {
		Self {
			is_approved: comment.moderation.is_approved(),
			moderation_reason: comment.moderation.reason().map(str::to_owned),
			id: comment.id,
			post_id: comment.post_id,
			post_slug: comment.post_slug,
			post_title: comment.post_title,
			parent_id: comment.parent_id,
			author: comment.author,
			content: comment.content,
			moderation: comment.moderation,
			created_at: comment.created_at,
		}
	}
}

impl CommentOutput {
	/// Hides guest email addresses.
	pub fn public(comment: Comment) -> Self {
		let mut output = Self::from(comment);

		if let CommentAuthor::Guest { email, .. } = &mut output.author {
			*email = None;
		}

		output
	}
}

/// A comment with its replies.
#[derive(Debug, Serialize, JsonSchema)]
pub struct CommentThread {
	#[serde(flatten)]
	pub comment: CommentOutput,
	pub replies: Vec<CommentThread>,
}

/// Arranges comments into reply threads, keeping their order.
///
/// Replies whose parent is not part of `comments` are shown at the top level.
pub fn build_threads(comments: Vec<Comment>) -> Vec<CommentThread> {
	let ids = comments
		.iter()
		.map(|comment| comment.id)
		.collect::<HashSet<_>>();
	let mut children: HashMap<Option<Uuid>, Vec<Comment>> = HashMap::new();

	for comment in comments {
		let parent = comment.parent_id.filter(|parent| ids.contains(parent));

		children.entry(parent).or_default().push(comment);
	}

	fn collect(
		parent: Option<Uuid>,
		children: &mut HashMap<Option<Uuid>, Vec<Comment>>,
	) -> Vec<CommentThread> {
		children
			.remove(&parent)
			.unwrap_or_default()
			.into_iter()
			.map(|comment| {
				let replies = collect(Some(comment.id), children);

				CommentThread {
					comment: CommentOutput::public(comment),
					replies,
				}
			})
			.collect()
	}

	collect(None, &mut children)
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentInput {
	#[validate(length(min = 1, max = 2000))]
	pub content: String,
	/// The comment this one replies to, on the same post.
	pub parent_id: Option<Uuid>,
	/// Required when not signed in.
	#[validate(length(min = 1, max = 100))]
	pub guest_name: Option<String>,
	/// Required when not signed in.
	#[validate(email)]
	pub guest_email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
	Approve,
	Reject,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct ModerateCommentInput {
	pub action: Decision,
	#[validate(length(max = 1000))]
	pub reason: Option<String>,
}

/// Filters for the admin comment list.
#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommentQuery {
	#[validate(range(min = 1, max = 10_000))]
	pub page: Option<i64>,
	#[validate(range(min = 1, max = 100))]
	pub limit: Option<i64>,
	pub status: Option<CommentStatus>,
	/// Matches comment content, author names and post titles.
	#[validate(length(max = 200))]
	pub search: Option<String>,
	pub post_id: Option<Uuid>,
}

#[cfg(test)]
mod test {
	use super::*;

	fn comment(parent_id: Option<Uuid>) -> Comment {
		Comment {
			id: Uuid::new_v4(),
			post_id: Uuid::nil(),
			post_slug: "deep-litter".into(),
			post_title: "Deep litter".into(),
			parent_id,
			author: CommentAuthor::Guest {
				name: "Wanjiru".into(),
				email: Some("wanjiru@example.com".into()),
			},
			content: "Thanks, this helped.".into(),
			moderation: CommentModeration::Approved {
				moderated_at: Utc::now(),
			},
			created_at: Utc::now(),
		}
	}

	#[test]
	fn test_pending_comment_can_be_approved_once() {
		let approved = CommentModeration::Pending
			.decide(Decision::Approve, None, Utc::now())
			.unwrap();

		assert!(approved.is_approved());
		assert_eq!(approved.reason(), None);
		assert_eq!(
			approved.decide(Decision::Reject, None, Utc::now()),
			Err(AlreadyModerated(CommentStatus::Approved))
		);
	}

	#[test]
	fn test_rejection_keeps_reason() {
		let rejected = CommentModeration::Pending
			.decide(Decision::Reject, Some(" spam ".into()), Utc::now())
			.unwrap();

		assert_eq!(rejected.status(), CommentStatus::Rejected);
		assert!(!rejected.is_approved());
		assert_eq!(rejected.reason(), Some("spam"));
		assert!(rejected.moderated_at().is_some());
	}

	#[test]
	fn test_wire_flags_follow_state() {
		let mut rejected = comment(None);

		rejected.moderation = CommentModeration::Rejected {
			reason: Some("off topic".into()),
			moderated_at: Utc::now(),
		};

		let value = serde_json::to_value(CommentOutput::from(rejected)).unwrap();

		assert_eq!(value["status"], "REJECTED");
		assert_eq!(value["isApproved"], false);
		assert_eq!(value["moderationReason"], "off topic");
		assert!(value["moderatedAt"].is_string());

		let value = serde_json::to_value(CommentOutput::from(comment(None))).unwrap();

		assert_eq!(value["status"], "APPROVED");
		assert_eq!(value["isApproved"], true);
		assert_eq!(value["moderationReason"], serde_json::Value::Null);
	}

	#[test]
	fn test_status_filter_accepts_lowercase() {
		let query: CommentQuery =
			serde_json::from_value(serde_json::json!({ "status": "pending" })).unwrap();

		assert_eq!(query.status, Some(CommentStatus::Pending));

		let query: CommentQuery =
			serde_json::from_value(serde_json::json!({ "status": "REJECTED" })).unwrap();

		assert_eq!(query.status, Some(CommentStatus::Rejected));
		assert_eq!(
			serde_json::to_value(CommentStatus::Approved).unwrap(),
			"APPROVED"
		);
	}

	#[test]
	fn test_already_moderated_names_status() {
		assert_eq!(
			AlreadyModerated(CommentStatus::Rejected).to_string(),
			"the comment was already moderated (REJECTED)"
		);
	}

	#[test]
	fn test_public_output_hides_guest_email() {
		let value = serde_json::to_value(CommentOutput::public(comment(None))).unwrap();

		assert_eq!(value["author"]["type"], "GUEST");
		assert_eq!(value["author"]["name"], "Wanjiru");
		assert!(value["author"].get("email").is_none());
	}

	#[test]
	fn test_threads_nest_replies() {
		let root = comment(None);
		let reply = comment(Some(root.id));
		let nested = comment(Some(reply.id));
		let orphan = comment(Some(Uuid::new_v4()));

		let threads = build_threads(vec![root.clone(), reply.clone(), nested.clone(), orphan.clone()]);

		assert_eq!(threads.len(), 2);
		assert_eq!(threads[0].comment.id, root.id);
		assert_eq!(threads[0].replies[0].comment.id, reply.id);
		assert_eq!(threads[0].replies[0].replies[0].comment.id, nested.id);
		assert_eq!(threads[1].comment.id, orphan.id);
	}
}
