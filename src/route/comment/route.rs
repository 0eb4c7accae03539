use axum::extract::State;
use chrono::Utc;
use macros::route;
use uuid::Uuid;

use crate::{
	extract::{AdminSession, Json, OptionalSession, Path, Query},
	openapi::tag,
	route::post::{self, model::PostStatus},
	Database,
};

use super::{model, Error, RouteError};

async fn find_comment(database: &Database, id: Uuid) -> Result<model::Comment, RouteError> {
	sqlx::query_as::<_, model::Comment>("SELECT * FROM blog_comment_view WHERE id = $1")
		.bind(id)
		.fetch_optional(database)
		.await?
		.ok_or_else(|| Error::UnknownComment(id).into())
}

/// Looks up a post that accepts and shows comments.
async fn published_post(database: &Database, slug: &str) -> Result<post::model::Post, RouteError> {
	post::query::find_by_slug(database, slug)
		.await?
		.filter(|post| post.status() == PostStatus::Published)
		.ok_or_else(|| Error::UnknownPost(slug.to_owned()).into())
}

/// List comments
/// Returns the approved comments of a published post, arranged in reply threads.
#[route(tag = tag::COMMENT)]
pub async fn get_comments(
	State(database): State<Database>,
	Path(path): Path<model::SlugInput>,
) -> Result<Json<Vec<model::CommentThread>>, RouteError> {
	let post = published_post(&database, &path.slug).await?;

	let comments = sqlx::query_as::<_, model::Comment>(
		r#"
			SELECT * FROM blog_comment_view
			WHERE post_id = $1 AND status = 'APPROVED'
			ORDER BY created_at
		"#,
	)
	.bind(post.id)
	.fetch_all(&database)
	.await?;

	Ok(Json(model::build_threads(comments)))
}

/// Create comment
/// Comments on a published post, optionally as a reply to another comment.
/// Signed-out visitors must give a name and an email address. New comments
/// are hidden until an admin approves them.
#[route(tag = tag::COMMENT)]
pub async fn create_comment(
	State(database): State<Database>,
	OptionalSession(session): OptionalSession,
	Path(path): Path<model::SlugInput>,
	Json(input): Json<model::CreateCommentInput>,
) -> Result<Json<model::CommentOutput>, RouteError> {
	let post = published_post(&database, &path.slug).await?;

	let (author_id, guest_name, guest_email) = match &session {
		Some(session) => (Some(session.user.id), None, None),
		None => match (input.guest_name.as_deref(), input.guest_email.as_deref()) {
			(Some(name), Some(email)) if !name.trim().is_empty() => {
				(None, Some(name.trim()), Some(email))
			}
			_ => return Err(Error::GuestDetailsRequired.into()),
		},
	};

	if let Some(parent_id) = input.parent_id {
		let same_post = sqlx::query_scalar::<_, bool>(
			"SELECT EXISTS (SELECT 1 FROM blog_comment WHERE id = $1 AND post_id = $2)",
		)
		.bind(parent_id)
		.bind(post.id)
		.fetch_one(&database)
		.await?;

		if !same_post {
			return Err(Error::UnknownParent(parent_id).into());
		}
	}

	let id = sqlx::query_scalar::<_, Uuid>(
		r#"
			INSERT INTO blog_comment (post_id, parent_id, author_id, guest_name, guest_email, content)
			VALUES ($1, $2, $3, $4, $5, $6)
			RETURNING id
		"#,
	)
	.bind(post.id)
	.bind(input.parent_id)
	.bind(author_id)
	.bind(guest_name)
	.bind(guest_email)
	.bind(input.content.trim())
	.fetch_one(&database)
	.await?;

	tracing::info!(comment = %id, post = %post.id, guest = author_id.is_none(), "comment created");

	let comment = find_comment(&database, id).await?;

	Ok(Json(match session {
		Some(..) => comment.into(),
		None => model::CommentOutput::public(comment),
	}))
}

/// Moderate comment
/// Approves or rejects a pending comment.
/// Comments are moderated once; moderating them again is a conflict.
#[route(tag = tag::COMMENT)]
pub async fn moderate_comment(
	State(database): State<Database>,
	AdminSession(session): AdminSession,
	Path(path): Path<model::IdInput>,
	Json(input): Json<model::ModerateCommentInput>,
) -> Result<Json<model::CommentOutput>, RouteError> {
	let comment = find_comment(&database, path.id).await?;
	let next = comment
		.moderation
		.decide(input.action, input.reason, Utc::now())
		.map_err(Error::from)?;

	let result = sqlx::query(
		r#"
			UPDATE blog_comment
			SET status = $1, moderation_reason = $2, moderated_at = $3
			WHERE id = $4 AND status = 'PENDING'
		"#,
	)
	.bind(next.status())
	.bind(next.reason())
	.bind(next.moderated_at())
	.bind(comment.id)
	.execute(&database)
	.await?;

	if result.rows_affected() == 0 {
		// another admin got there first
		let current = find_comment(&database, comment.id).await?;

		return Err(Error::from(model::AlreadyModerated(current.moderation.status())).into());
	}

	tracing::info!(
		comment = %comment.id,
		admin = %session.user.id,
		status = next.status().as_str(),
		"comment moderated"
	);

	Ok(Json(model::CommentOutput::from(model::Comment {
		moderation: next,
		..comment
	})))
}

/// List all comments
/// Returns a paginated list of comments across posts, newest first.
/// Filters by moderation status and post, and searches content, author names and post titles.
#[route(tag = tag::COMMENT)]
pub async fn get_all_comments(
	State(database): State<Database>,
	_admin: AdminSession,
	Query(filter): Query<model::CommentQuery>,
) -> Result<Json<model::Page<model::CommentOutput>>, RouteError> {
	let paginate = model::Paginate::from_query(filter.page, filter.limit);
	let search = post::query::search_pattern(filter.search.as_deref());

	let total = sqlx::query_scalar::<_, i64>(
		r#"
			SELECT COUNT(*) FROM blog_comment_view
			WHERE ($1::comment_status IS NULL OR status = $1)
				AND ($2::uuid IS NULL OR post_id = $2)
				AND ($3::text IS NULL OR content ILIKE $3 OR author_username ILIKE $3
					OR guest_name ILIKE $3 OR post_title ILIKE $3)
		"#,
	)
	.bind(filter.status)
	.bind(filter.post_id)
	.bind(search.as_deref())
	.fetch_one(&database)
	.await?;

	let comments = sqlx::query_as::<_, model::Comment>(
		r#"
			SELECT * FROM blog_comment_view
			WHERE ($1::comment_status IS NULL OR status = $1)
				AND ($2::uuid IS NULL OR post_id = $2)
				AND ($3::text IS NULL OR content ILIKE $3 OR author_username ILIKE $3
					OR guest_name ILIKE $3 OR post_title ILIKE $3)
			ORDER BY created_at DESC
			LIMIT $4 OFFSET $5
		"#,
	)
	.bind(filter.status)
	.bind(filter.post_id)
	.bind(search.as_deref())
	.bind(paginate.limit())
	.bind(paginate.offset())
	.fetch_all(&database)
	.await?;

	Ok(Json(model::Page {
		items: comments.into_iter().map(Into::into).collect(),
		pagination: paginate.pagination(total),
	}))
}
