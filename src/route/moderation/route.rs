use axum::extract::State;
use chrono::Utc;
use macros::route;
use uuid::Uuid;

use crate::{
	extract::{AdminSession, Json, Path, Query},
	openapi::tag,
	route::post::{
		model::{Moderation, Paginate, PostStatus},
		query,
		transition::{self, Action, Actor, Outcome},
		Error, RouteError,
	},
	Database,
};

use super::model;

/// Review queue
/// Returns a paginated list of posts in any status, newest first.
/// Filters by status and category, and searches titles, excerpts and author usernames.
#[route(tag = tag::MODERATION)]
pub async fn get_review_queue(
	State(database): State<Database>,
	_admin: AdminSession,
	Query(filter): Query<model::ReviewQueueQuery>,
) -> Result<Json<model::PostList>, RouteError> {
	let paginate = Paginate::from_query(filter.page, filter.limit);
	let search = query::search_pattern(filter.search.as_deref());

	let total = sqlx::query_scalar::<_, i64>(
		r#"
			SELECT COUNT(*) FROM blog_post_view
			WHERE ($1::post_status IS NULL OR status = $1)
				AND ($2::post_category IS NULL OR category = $2)
				AND ($3::text IS NULL OR title ILIKE $3 OR excerpt ILIKE $3 OR author_username ILIKE $3)
		"#,
	)
	.bind(filter.status)
	.bind(filter.category)
	.bind(search.as_deref())
	.fetch_one(&database)
	.await?;

	let posts = sqlx::query_as::<_, model::Post>(
		r#"
			SELECT * FROM blog_post_view
			WHERE ($1::post_status IS NULL OR status = $1)
				AND ($2::post_category IS NULL OR category = $2)
				AND ($3::text IS NULL OR title ILIKE $3 OR excerpt ILIKE $3 OR author_username ILIKE $3)
			ORDER BY created_at DESC
			LIMIT $4 OFFSET $5
		"#,
	)
	.bind(filter.status)
	.bind(filter.category)
	.bind(search.as_deref())
	.bind(paginate.limit())
	.bind(paginate.offset())
	.fetch_all(&database)
	.await?;

	Ok(Json(model::PostList {
		posts,
		pagination: paginate.pagination(total).into(),
	}))
}

/// Review statistics
/// Returns the number of posts in each status.
#[route(tag = tag::MODERATION)]
pub async fn get_stats(
	State(database): State<Database>,
	_admin: AdminSession,
) -> Result<Json<model::ReviewStats>, RouteError> {
	let counts = sqlx::query_as::<_, (PostStatus, i64)>(
		"SELECT status, COUNT(*) FROM blog_post GROUP BY status",
	)
	.fetch_all(&database)
	.await?;

	Ok(Json(counts.into_iter().collect()))
}

/// Create post as admin
/// Creates a post authored by you.
/// With `publishImmediately` the post skips the review queue and is published
/// right away, optionally featured.
#[route(tag = tag::MODERATION)]
pub async fn create_post(
	State(database): State<Database>,
	AdminSession(session): AdminSession,
	Json(input): Json<model::AdminCreatePostInput>,
) -> Result<Json<model::Post>, RouteError> {
	let actor = Actor::for_post(session.user.id, true, session.user.id);
	let now = Utc::now();

	let mut actions = Vec::with_capacity(2);

	if input.publish_immediately || input.post.submit {
		actions.push(Action::Submit);
	}

	if input.publish_immediately {
		actions.push(Action::Approve {
			publish_now: true,
			featured: input.featured,
		});
	}

	let mut moderation = Moderation::draft();

	for action in actions {
		if let Outcome::Update(next) =
			transition::apply(&moderation, action, actor, now).map_err(Error::from)?
		{
			moderation = next;
		}
	}

	let post = query::NewPost {
		author_id: session.user.id,
		title: input.post.title.trim(),
		content: &input.post.content,
		excerpt: &input.post.excerpt,
		featured_image: input.post.featured_image.as_deref(),
		images: &input.post.images,
		category: input.post.category,
		tags: &input.post.tags,
	};

	query::insert(&database, &post, &moderation).await.map(Json)
}

/// Review post
/// Approves or rejects a post waiting for review.
/// Approved posts are published right away unless `publishImmediately` is false.
/// Fails with a conflict if the post is not waiting for review, including when
/// another admin reviewed it first.
#[route(tag = tag::MODERATION)]
pub async fn review_post(
	State(database): State<Database>,
	AdminSession(session): AdminSession,
	Path(path): Path<model::SlugInput>,
	Json(input): Json<model::ReviewInput>,
) -> Result<Json<model::Post>, RouteError> {
	let post = query::get_by_slug(&database, &path.slug).await?;
	let actor = Actor::for_post(session.user.id, true, post.author_id);

	query::transition(&database, &post, input.into_action(), actor).await?;

	query::get_by_id(&database, post.id).await.map(Json)
}

/// Turns the outcome for a single post into its entry in the bulk results.
///
/// Unexpected failures are logged and reported without their details.
fn item_result(
	post_id: Uuid,
	result: Result<Option<PostStatus>, RouteError>,
) -> model::BulkItemResult {
	let (status, error) = match result {
		Ok(status) => (status, None),
		Err(RouteError::Route(error)) => (None, Some(error.to_string())),
		Err(RouteError::App(error)) => {
			tracing::error!(%post_id, %error, "bulk action failed for post");

			(None, Some("internal error".to_owned()))
		}
	};

	model::BulkItemResult {
		post_id,
		success: error.is_none(),
		status,
		error,
	}
}

/// Bulk action
/// Applies an action to each of the given posts independently.
/// Every post gets its own result; one failing post does not stop the others.
#[route(tag = tag::MODERATION)]
pub async fn bulk_action(
	State(database): State<Database>,
	AdminSession(session): AdminSession,
	Json(input): Json<model::BulkInput>,
) -> Result<Json<model::BulkOutput>, RouteError> {
	let mut results = Vec::with_capacity(input.post_ids.len());

	for post_id in input.post_ids {
		let result = match query::get_by_id(&database, post_id).await {
			Ok(post) => {
				let actor = Actor::for_post(session.user.id, true, post.author_id);
				let action = input.action.to_action(post.status());

				query::transition(&database, &post, action, actor)
					.await
					.map(|moderation| moderation.map(|moderation| moderation.status))
			}
			Err(error) => Err(error),
		};

		results.push(item_result(post_id, result));
	}

	let output = model::BulkOutput::new(input.action, results);

	tracing::info!(
		admin = %session.user.id,
		action = ?input.action,
		succeeded = output.succeeded,
		failed = output.failed,
		"bulk action applied"
	);

	Ok(Json(output))
}
