use chrono::Utc;
use sqlx::{postgres::PgArguments, query::Query, Postgres, Row};
use uuid::Uuid;

use crate::Database;

use super::{
	model::{Category, Moderation, Post, PostStatus},
	transition::{self, Action, Actor, Outcome},
	Error, RouteError,
};

/// Slugs that would collide with fixed routes under `/blog/posts`.
const RESERVED_SLUGS: [&str; 2] = ["me", "by-id"];
const MAX_SLUG_LENGTH: usize = 80;
const EXCERPT_LENGTH: usize = 160;

/// Turns a title into a URL-safe slug.
pub fn slugify(title: &str) -> String {
	let mut slug = String::with_capacity(title.len());

	for c in title.chars().flat_map(char::to_lowercase) {
		if c.is_ascii_alphanumeric() {
			slug.push(c);
		} else if !slug.is_empty() && !slug.ends_with('-') {
			slug.push('-');
		}

		if slug.len() >= MAX_SLUG_LENGTH {
			break;
		}
	}

	let slug = slug.trim_end_matches('-');

	if slug.is_empty() {
		"post".into()
	} else if RESERVED_SLUGS.contains(&slug) {
		format!("{slug}-post")
	} else {
		slug.into()
	}
}

/// A short random suffix to de-duplicate slugs.
fn slug_suffix() -> String {
	let id = Uuid::new_v4().simple().to_string();

	id[..8].to_owned()
}

/// Builds a plain-text excerpt from markdown content.
pub fn derive_excerpt(content: &str) -> String {
	let text = content
		.split_whitespace()
		.map(|word| word.trim_matches(|c| matches!(c, '#' | '*' | '_' | '>' | '`')))
		.filter(|word| !word.is_empty())
		.collect::<Vec<_>>()
		.join(" ");

	if text.chars().count() <= EXCERPT_LENGTH {
		return text;
	}

	let cut = text
		.char_indices()
		.nth(EXCERPT_LENGTH)
		.map_or(text.len(), |(index, _)| index);
	let truncated = &text[..cut];
	let truncated = truncated
		.rsplit_once(' ')
		.map_or(truncated, |(head, _)| head);

	format!("{truncated}…")
}

/// Trims, lower-cases and de-duplicates tags, keeping their order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
	let mut normalized: Vec<String> = Vec::with_capacity(tags.len());

	for tag in tags {
		let tag = tag.trim().to_lowercase();

		if !tag.is_empty() && !normalized.contains(&tag) {
			normalized.push(tag);
		}
	}

	normalized
}

/// Escapes `LIKE` wildcards and wraps the term for a substring match.
pub fn like_pattern(term: &str) -> String {
	let mut pattern = String::with_capacity(term.len() + 2);

	pattern.push('%');

	for c in term.chars() {
		if matches!(c, '\\' | '%' | '_') {
			pattern.push('\\');
		}

		pattern.push(c);
	}

	pattern.push('%');
	pattern
}

/// Search input as an optional `LIKE` pattern; blank terms do not filter.
pub fn search_pattern(search: Option<&str>) -> Option<String> {
	search
		.map(str::trim)
		.filter(|term| !term.is_empty())
		.map(like_pattern)
}

pub async fn find_by_slug(database: &Database, slug: &str) -> Result<Option<Post>, sqlx::Error> {
	sqlx::query_as::<_, Post>("SELECT * FROM blog_post_view WHERE slug = $1")
		.bind(slug)
		.fetch_optional(database)
		.await
}

pub async fn find_by_id(database: &Database, id: Uuid) -> Result<Option<Post>, sqlx::Error> {
	sqlx::query_as::<_, Post>("SELECT * FROM blog_post_view WHERE id = $1")
		.bind(id)
		.fetch_optional(database)
		.await
}

pub async fn get_by_slug(database: &Database, slug: &str) -> Result<Post, RouteError> {
	find_by_slug(database, slug)
		.await?
		.ok_or_else(|| Error::UnknownPost(slug.to_owned()).into())
}

pub async fn get_by_id(database: &Database, id: Uuid) -> Result<Post, RouteError> {
	find_by_id(database, id)
		.await?
		.ok_or_else(|| Error::UnknownPost(id.to_string()).into())
}

/// Binds the moderation columns, in declaration order, as the next eleven parameters.
fn bind_moderation<'q>(
	query: Query<'q, Postgres, PgArguments>,
	moderation: &'q Moderation,
) -> Query<'q, Postgres, PgArguments> {
	query
		.bind(moderation.status)
		.bind(moderation.featured)
		.bind(moderation.submitted_at)
		.bind(moderation.approved_at)
		.bind(moderation.published_at)
		.bind(moderation.rejected_at)
		.bind(moderation.archived_at)
		.bind(moderation.rejection_reason.as_deref())
		.bind(moderation.submission_notes.as_deref())
		.bind(moderation.approved_by)
		.bind(moderation.resubmit_count)
}

/// Content of a post about to be inserted.
pub struct NewPost<'a> {
	pub author_id: Uuid,
	pub title: &'a str,
	pub content: &'a str,
	pub excerpt: &'a str,
	pub featured_image: Option<&'a str>,
	pub images: &'a [String],
	pub category: Category,
	pub tags: &'a [String],
}

/// Inserts a post, retrying with a suffixed slug when the title's slug is taken.
pub async fn insert(
	database: &Database,
	post: &NewPost<'_>,
	moderation: &Moderation,
) -> Result<Post, RouteError> {
	let base = slugify(post.title);
	let excerpt = if post.excerpt.trim().is_empty() {
		derive_excerpt(post.content)
	} else {
		post.excerpt.trim().to_owned()
	};
	let tags = normalize_tags(post.tags);

	let mut slug = base.clone();

	for attempt in 0..3 {
		if attempt > 0 {
			slug = format!("{base}-{}", slug_suffix());
		}

		let query = sqlx::query(
			r#"
				INSERT INTO blog_post (
					status, featured, submitted_at, approved_at, published_at, rejected_at,
					archived_at, rejection_reason, submission_notes, approved_by, resubmit_count,
					slug, author_id, title, content, excerpt, featured_image, images, category, tags
				)
				VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
				RETURNING id
			"#,
		);

		let result = bind_moderation(query, moderation)
			.bind(&slug)
			.bind(post.author_id)
			.bind(post.title)
			.bind(post.content)
			.bind(&excerpt)
			.bind(post.featured_image)
			.bind(post.images)
			.bind(post.category)
			.bind(&tags)
			.fetch_one(database)
			.await;

		match result {
			Ok(row) => {
				let id = row.try_get::<Uuid, _>("id")?;

				tracing::info!(post = %id, author = %post.author_id, status = %moderation.status, "post created");

				return get_by_id(database, id).await;
			}
			Err(sqlx::Error::Database(ref error))
				if error.constraint() == Some("blog_post_slug_key") =>
			{
				tracing::debug!(%slug, "slug taken, retrying with a suffix");
			}
			Err(error) => return Err(error.into()),
		}
	}

	Err(Error::SlugTaken(base).into())
}

/// Writes a new moderation state, only if the post is still in `from`.
///
/// Returns `false` when the post changed status in the meantime.
pub async fn persist<'e, E>(
	executor: E,
	id: Uuid,
	from: PostStatus,
	next: &Moderation,
) -> Result<bool, sqlx::Error>
where
	E: sqlx::PgExecutor<'e>,
{
	let query = sqlx::query(
		r#"
			UPDATE blog_post SET
				status = $1,
				featured = $2,
				submitted_at = $3,
				approved_at = $4,
				published_at = $5,
				rejected_at = $6,
				archived_at = $7,
				rejection_reason = $8,
				submission_notes = $9,
				approved_by = $10,
				resubmit_count = GREATEST(resubmit_count, $11),
				updated_at = now()
			WHERE id = $12 AND status = $13
		"#,
	);

	let result = bind_moderation(query, next)
		.bind(id)
		.bind(from)
		.execute(executor)
		.await?;

	Ok(result.rows_affected() == 1)
}

/// Applies `action` to `post` and persists the outcome.
///
/// Returns the new moderation state, or `None` if the post was deleted.
pub async fn transition(
	database: &Database,
	post: &Post,
	action: Action,
	actor: Actor,
) -> Result<Option<Moderation>, RouteError> {
	let from = post.status();
	let kind = action.kind();

	match transition::apply(&post.moderation, action, actor, Utc::now()).map_err(Error::from)? {
		Outcome::Delete => {
			let result = sqlx::query("DELETE FROM blog_post WHERE id = $1 AND status = $2")
				.bind(post.id)
				.bind(from)
				.execute(database)
				.await?;

			if result.rows_affected() == 0 {
				return Err(Error::StatusChanged { expected: from }.into());
			}

			tracing::info!(post = %post.id, actor = %actor.user_id, %from, "post deleted");

			Ok(None)
		}
		Outcome::Update(next) => {
			if !persist(database, post.id, from, &next).await? {
				return Err(Error::StatusChanged { expected: from }.into());
			}

			tracing::info!(
				post = %post.id,
				actor = %actor.user_id,
				action = %kind,
				%from,
				to = %next.status,
				"post transitioned"
			);

			Ok(Some(next))
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_slugify() {
		assert_eq!(
			slugify("Raising Kienyeji Chickens: A Beginner's Guide!"),
			"raising-kienyeji-chickens-a-beginner-s-guide"
		);
		assert_eq!(slugify("  --  "), "post");
		assert_eq!(slugify("Me"), "me-post");
		assert_eq!(slugify("By ID"), "by-id-post");
	}

	#[test]
	fn test_slugify_caps_length() {
		let slug = slugify(&"layers ".repeat(40));

		assert!(slug.len() <= MAX_SLUG_LENGTH);
		assert!(!slug.ends_with('-'));
	}

	#[test]
	fn test_slug_suffix_is_short_hex() {
		let suffix = slug_suffix();

		assert_eq!(suffix.len(), 8);
		assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
	}

	#[test]
	fn test_excerpt_strips_markdown() {
		assert_eq!(
			derive_excerpt("# Feeding\n\n**Layers** need  `16%` protein."),
			"Feeding Layers need 16% protein."
		);
	}

	#[test]
	fn test_long_excerpt_is_cut_on_a_word() {
		let excerpt = derive_excerpt(&"broiler ".repeat(50));

		assert!(excerpt.ends_with("broiler…"));
		assert!(excerpt.chars().count() <= EXCERPT_LENGTH + 1);
	}

	#[test]
	fn test_normalize_tags() {
		let tags = ["Layers ", "layers", "", "Feed"].map(String::from);

		assert_eq!(normalize_tags(&tags), ["layers", "feed"]);
	}

	#[test]
	fn test_like_pattern_escapes_wildcards() {
		assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
		assert_eq!(search_pattern(Some("   ")), None);
		assert_eq!(search_pattern(Some(" hens ")).as_deref(), Some("%hens%"));
	}
}
