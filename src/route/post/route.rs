use axum::{extract::State, http::StatusCode};
use chrono::Utc;
use macros::route;

use crate::{
	extract::{Json, OptionalSession, Path, Query, Session},
	openapi::tag,
	Database,
};

use super::{
	model::{self, Paginate, PostStatus},
	query,
	transition::{self, Action, Actor},
	Error, RouteError,
};

/// Re-reads a post after a transition so the response carries fresh counters.
async fn reload(database: &Database, post: &model::Post) -> Result<Json<model::Post>, RouteError> {
	query::get_by_id(database, post.id).await.map(Json)
}

/// List published posts
/// Returns a paginated list of published posts, newest first.
/// Filters by category and searches titles, excerpts and author names.
#[route(tag = tag::POST)]
pub async fn get_posts(
	State(database): State<Database>,
	Query(filter): Query<model::PublicPostsQuery>,
) -> Result<Json<model::PostList>, RouteError> {
	let paginate = Paginate::from_query(filter.page, filter.limit);
	let search = query::search_pattern(filter.search.as_deref());

	let total = sqlx::query_scalar::<_, i64>(
		r#"
			SELECT COUNT(*) FROM blog_post_view
			WHERE status = 'PUBLISHED'
				AND ($1::post_category IS NULL OR category = $1)
				AND ($2::text IS NULL OR title ILIKE $2 OR excerpt ILIKE $2 OR author_username ILIKE $2)
		"#,
	)
	.bind(filter.category)
	.bind(search.as_deref())
	.fetch_one(&database)
	.await?;

	let posts = sqlx::query_as::<_, model::Post>(
		r#"
			SELECT * FROM blog_post_view
			WHERE status = 'PUBLISHED'
				AND ($1::post_category IS NULL OR category = $1)
				AND ($2::text IS NULL OR title ILIKE $2 OR excerpt ILIKE $2 OR author_username ILIKE $2)
			ORDER BY featured DESC, published_at DESC NULLS LAST, created_at DESC
			LIMIT $3 OFFSET $4
		"#,
	)
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

/// List own posts
/// Returns a paginated list of your posts in any status, newest first.
#[route(tag = tag::POST)]
pub async fn get_own_posts(
	State(database): State<Database>,
	session: Session,
	Query(filter): Query<model::OwnPostsQuery>,
) -> Result<Json<model::PostList>, RouteError> {
	let paginate = Paginate::from_query(filter.page, filter.limit);

	let total = sqlx::query_scalar::<_, i64>(
		r#"
			SELECT COUNT(*) FROM blog_post
			WHERE author_id = $1 AND ($2::post_status IS NULL OR status = $2)
		"#,
	)
	.bind(session.user.id)
	.bind(filter.status)
	.fetch_one(&database)
	.await?;

	let posts = sqlx::query_as::<_, model::Post>(
		r#"
			SELECT * FROM blog_post_view
			WHERE author_id = $1 AND ($2::post_status IS NULL OR status = $2)
			ORDER BY created_at DESC
			LIMIT $3 OFFSET $4
		"#,
	)
	.bind(session.user.id)
	.bind(filter.status)
	.bind(paginate.limit())
	.bind(paginate.offset())
	.fetch_all(&database)
	.await?;

	Ok(Json(model::PostList {
		posts,
		pagination: paginate.pagination(total).into(),
	}))
}

/// Get post
/// Returns a post by its slug.
/// Published posts are public and each read counts as a view. Posts in any
/// other status are only visible to their author and to admins.
#[route(tag = tag::POST)]
pub async fn get_post(
	State(database): State<Database>,
	OptionalSession(session): OptionalSession,
	Path(input): Path<model::SlugInput>,
) -> Result<Json<model::Post>, RouteError> {
	let mut post = query::get_by_slug(&database, &input.slug).await?;

	if post.status() == PostStatus::Published {
		sqlx::query("UPDATE blog_post SET view_count = view_count + 1 WHERE id = $1")
			.bind(post.id)
			.execute(&database)
			.await?;

		post.view_count += 1;

		return Ok(Json(post));
	}

	let visible = session
		.as_ref()
		.is_some_and(|session| session.is_admin() || session.user.id == post.author_id);

	if !visible {
		return Err(Error::UnknownPost(input.slug).into());
	}

	Ok(Json(post))
}

/// Create post
/// Creates a new post authored by you.
/// The post starts as a draft, or goes straight into the review queue when
/// `submit` is set.
#[route(tag = tag::POST)]
pub async fn create_post(
	State(database): State<Database>,
	session: Session,
	Json(input): Json<model::CreatePostInput>,
) -> Result<Json<model::Post>, RouteError> {
	let mut moderation = model::Moderation::draft();

	if input.submit {
		let actor = Actor::for_post(session.user.id, session.is_admin(), session.user.id);

		if let transition::Outcome::Update(next) =
			transition::apply(&moderation, Action::Submit, actor, Utc::now()).map_err(Error::from)?
		{
			moderation = next;
		}
	}

	let post = query::NewPost {
		author_id: session.user.id,
		title: input.title.trim(),
		content: &input.content,
		excerpt: &input.excerpt,
		featured_image: input.featured_image.as_deref(),
		images: &input.images,
		category: input.category,
		tags: &input.tags,
	};

	query::insert(&database, &post, &moderation).await.map(Json)
}

/// Update post
/// Updates the content of one of your posts.
/// Only drafts and rejected posts can be edited.
#[route(tag = tag::POST)]
pub async fn update_post(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::SlugInput>,
	Json(input): Json<model::UpdatePostInput>,
) -> Result<Json<model::Post>, RouteError> {
	let post = query::get_by_slug(&database, &path.slug).await?;
	let actor = Actor::for_post(session.user.id, session.is_admin(), post.author_id);

	transition::check_editable(post.status(), actor).map_err(Error::from)?;

	let tags = input.tags.as_deref().map(query::normalize_tags);

	let result = sqlx::query(
		r#"
			UPDATE blog_post SET
				title = COALESCE($1, title),
				content = COALESCE($2, content),
				excerpt = COALESCE($3, excerpt),
				featured_image = CASE WHEN $4 THEN $5 ELSE featured_image END,
				images = COALESCE($6, images),
				category = COALESCE($7, category),
				tags = COALESCE($8, tags),
				updated_at = now()
			WHERE id = $9 AND author_id = $10 AND status = $11
		"#,
	)
	.bind(input.title.as_deref().map(str::trim))
	.bind(input.content.as_deref())
	.bind(input.excerpt.as_deref().map(str::trim))
	.bind(input.featured_image.is_some())
	.bind(input.featured_image.flatten())
	.bind(input.images.as_deref())
	.bind(input.category)
	.bind(tags.as_deref())
	.bind(post.id)
	.bind(session.user.id)
	.bind(post.status())
	.execute(&database)
	.await?;

	if result.rows_affected() == 0 {
		return Err(Error::StatusChanged {
			expected: post.status(),
		}
		.into());
	}

	tracing::info!(post = %post.id, author = %session.user.id, "post updated");

	reload(&database, &post).await
}

/// Delete post
/// Deletes a draft or rejected post.
/// Authors can delete their own posts; admins can delete any.
#[route(tag = tag::POST, response(status = 204, description = "The post was deleted."))]
pub async fn delete_post(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::SlugInput>,
) -> Result<StatusCode, RouteError> {
	let post = query::get_by_slug(&database, &path.slug).await?;
	let actor = Actor::for_post(session.user.id, session.is_admin(), post.author_id);

	query::transition(&database, &post, Action::Delete, actor).await?;

	Ok(StatusCode::NO_CONTENT)
}

/// Submit post
/// Sends one of your drafts to the review queue.
#[route(tag = tag::POST)]
pub async fn submit_post(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::IdInput>,
) -> Result<Json<model::Post>, RouteError> {
	let post = query::get_by_id(&database, path.id).await?;
	let actor = Actor::for_post(session.user.id, session.is_admin(), post.author_id);

	query::transition(&database, &post, Action::Submit, actor).await?;

	reload(&database, &post).await
}

/// Resubmit post
/// Sends one of your rejected posts back to the review queue.
/// The rejection reason is cleared and the resubmission counter goes up by one.
#[route(tag = tag::POST)]
pub async fn resubmit_post(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::IdInput>,
	Json(input): Json<model::ResubmitInput>,
) -> Result<Json<model::Post>, RouteError> {
	let post = query::get_by_id(&database, path.id).await?;
	let actor = Actor::for_post(session.user.id, session.is_admin(), post.author_id);

	query::transition(
		&database,
		&post,
		Action::Resubmit {
			notes: input.submission_notes,
		},
		actor,
	)
	.await?;

	reload(&database, &post).await
}

/// Archive post
/// Takes a published post off the public listing.
#[route(tag = tag::POST)]
pub async fn archive_post(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::SlugInput>,
) -> Result<Json<model::Post>, RouteError> {
	let post = query::get_by_slug(&database, &path.slug).await?;
	let actor = Actor::for_post(session.user.id, session.is_admin(), post.author_id);

	query::transition(&database, &post, Action::Archive, actor).await?;

	reload(&database, &post).await
}

/// Like post
/// Toggles your like on a published post.
#[route(tag = tag::POST)]
pub async fn like_post(
	State(database): State<Database>,
	session: Session,
	Path(path): Path<model::SlugInput>,
) -> Result<Json<model::LikeOutput>, RouteError> {
	let post = query::get_by_slug(&database, &path.slug).await?;

	if post.status() != PostStatus::Published {
		return Err(Error::UnknownPost(path.slug).into());
	}

	let removed = sqlx::query("DELETE FROM post_like WHERE post_id = $1 AND user_id = $2")
		.bind(post.id)
		.bind(session.user.id)
		.execute(&database)
		.await?
		.rows_affected();

	if removed == 0 {
		sqlx::query("INSERT INTO post_like (post_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
			.bind(post.id)
			.bind(session.user.id)
			.execute(&database)
			.await?;
	}

	let like_count =
		sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM post_like WHERE post_id = $1")
			.bind(post.id)
			.fetch_one(&database)
			.await?;

	Ok(Json(model::LikeOutput {
		liked: removed == 0,
		like_count,
	}))
}
