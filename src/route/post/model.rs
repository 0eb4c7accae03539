use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidateUrl, ValidationError};

pub use crate::route::model::{IdInput, Paginate, Pagination, SlugInput};

/// The lifecycle state of a blog post.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema, sqlx::Type,
)]
#[sqlx(type_name = "post_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostStatus {
	Draft,
	PendingApproval,
	Approved,
	Published,
	Rejected,
	Archived,
}

impl PostStatus {
	pub const ALL: [Self; 6] = [
		Self::Draft,
		Self::PendingApproval,
		Self::Approved,
		Self::Published,
		Self::Rejected,
		Self::Archived,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Draft => "DRAFT",
			Self::PendingApproval => "PENDING_APPROVAL",
			Self::Approved => "APPROVED",
			Self::Published => "PUBLISHED",
			Self::Rejected => "REJECTED",
			Self::Archived => "ARCHIVED",
		}
	}

	/// Whether the author may still change the content.
	pub fn is_editable(self) -> bool {
		matches!(self, Self::Draft | Self::Rejected)
	}
}

impl fmt::Display for PostStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(
	Debug,
	Clone,
	Copy,
	Default,
	PartialEq,
	Eq,
	Deserialize,
	Serialize,
	JsonSchema,
	sqlx::Type,
)]
#[sqlx(type_name = "post_category", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
	#[default]
	General,
	PoultryHealth,
	FeedingNutrition,
	BreedingGenetics,
	HousingEquipment,
	DiseasePrevention,
	MarketTrends,
	BusinessTips,
	SuccessStories,
	EggProduction,
}

/// Status and moderation metadata of a post.
///
/// Only the transition rules produce new values of this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Moderation {
	pub status: PostStatus,
	pub featured: bool,
	pub submitted_at: Option<DateTime<Utc>>,
	pub approved_at: Option<DateTime<Utc>>,
	pub published_at: Option<DateTime<Utc>>,
	pub rejected_at: Option<DateTime<Utc>>,
	pub archived_at: Option<DateTime<Utc>>,
	/// Only present while the post is rejected.
	pub rejection_reason: Option<String>,
	/// The note the author attached to their latest resubmission.
	pub submission_notes: Option<String>,
	/// The admin that approved the post.
	pub approved_by: Option<Uuid>,
	/// How many times the post went back into review after a rejection.
	pub resubmit_count: i32,
}

impl Moderation {
	/// The moderation state of a freshly created post.
	pub fn draft() -> Self {
		Self {
			status: PostStatus::Draft,
			featured: false,
			submitted_at: None,
			approved_at: None,
			published_at: None,
			rejected_at: None,
			archived_at: None,
			rejection_reason: None,
			submission_notes: None,
			approved_by: None,
			resubmit_count: 0,
		}
	}
}

/// A blog post, as read from `blog_post_view`.
#[derive(Debug, Clone, Serialize, JsonSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Post {
	pub id: Uuid,
	pub slug: String,
	pub author_id: Uuid,
	pub author_username: String,
	pub title: String,
	/// The content of the post in Markdown format.
	pub content: String,
	pub excerpt: String,
	pub featured_image: Option<String>,
	pub images: Vec<String>,
	pub category: Category,
	pub tags: Vec<String>,
	#[sqlx(flatten)]
	#[serde(flatten)]
	pub moderation: Moderation,
	pub view_count: i64,
	pub like_count: i64,
	/// The number of approved comments.
	pub comment_count: i64,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Post {
	pub fn status(&self) -> PostStatus {
		self.moderation.status
	}
}

pub(crate) fn validate_urls(urls: &[String]) -> Result<(), ValidationError> {
	if urls.iter().all(|url| url.validate_url()) {
		Ok(())
	} else {
		Err(ValidationError::new("invalid_url"))
	}
}

fn validate_tags(tags: &[String]) -> Result<(), ValidationError> {
	if tags.iter().any(|tag| tag.chars().count() > 32) {
		return Err(ValidationError::new("tag_too_long"));
	}

	Ok(())
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostInput {
	#[validate(length(min = 3, max = 200))]
	pub title: String,
	#[validate(length(min = 1, max = 100_000))]
	pub content: String,
	/// A short summary. Derived from the content when left empty.
	#[serde(default)]
	#[validate(length(max = 500))]
	pub excerpt: String,
	#[validate(url)]
	pub featured_image: Option<String>,
	#[serde(default)]
	#[validate(length(max = 20), custom(function = "validate_urls"))]
	pub images: Vec<String>,
	#[serde(default)]
	pub category: Category,
	#[serde(default)]
	#[validate(length(max = 10), custom(function = "validate_tags"))]
	pub tags: Vec<String>,
	/// Submit the post for review right away instead of keeping it as a draft.
	#[serde(default)]
	pub submit: bool,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminCreatePostInput {
	#[serde(flatten)]
	#[validate(nested)]
	pub post: CreatePostInput,
	/// Publish the post without leaving it in the review queue.
	#[serde(default)]
	pub publish_immediately: bool,
	#[serde(default)]
	pub featured: bool,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostInput {
	#[validate(length(min = 3, max = 200))]
	pub title: Option<String>,
	#[validate(length(min = 1, max = 100_000))]
	pub content: Option<String>,
	#[validate(length(max = 500))]
	pub excerpt: Option<String>,
	/// `null` removes the featured image.
	#[validate(url)]
	#[serde(default, deserialize_with = "crate::route::model::double_option")]
	pub featured_image: Option<Option<String>>,
	#[validate(length(max = 20), custom(function = "validate_urls"))]
	pub images: Option<Vec<String>>,
	pub category: Option<Category>,
	#[validate(length(max = 10), custom(function = "validate_tags"))]
	pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResubmitInput {
	/// What changed since the rejection, for the reviewer.
	#[validate(length(max = 2000))]
	pub submission_notes: Option<String>,
}

/// Filters for the author's own post list.
#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct OwnPostsQuery {
	#[validate(range(min = 1, max = 10_000))]
	pub page: Option<i64>,
	#[validate(range(min = 1, max = 100))]
	pub limit: Option<i64>,
	pub status: Option<PostStatus>,
}

/// Filters for the public post list.
#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct PublicPostsQuery {
	#[validate(range(min = 1, max = 10_000))]
	pub page: Option<i64>,
	#[validate(range(min = 1, max = 100))]
	pub limit: Option<i64>,
	#[validate(length(max = 200))]
	pub search: Option<String>,
	pub category: Option<Category>,
}

#[derive(Debug, Clone, Copy, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostPagination {
	pub page: i64,
	pub limit: i64,
	pub total_posts: i64,
	pub total_pages: i64,
}

impl From<Pagination> for PostPagination {
	fn from(pagination: Pagination) -> Self {
		Self {
			page: pagination.page,
			limit: pagination.limit,
			total_posts: pagination.total,
			total_pages: pagination.total_pages,
		}
	}
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct PostList {
	pub posts: Vec<Post>,
	pub pagination: PostPagination,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LikeOutput {
	pub liked: bool,
	pub like_count: i64,
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_update_input_can_clear_featured_image() {
		let input: UpdatePostInput =
			serde_json::from_value(serde_json::json!({ "featuredImage": null })).unwrap();

		assert_eq!(input.featured_image, Some(None));

		let input: UpdatePostInput =
			serde_json::from_value(serde_json::json!({ "title": "Coop airflow" })).unwrap();

		assert_eq!(input.featured_image, None);
		assert!(input.validate().is_ok());

		let input: UpdatePostInput =
			serde_json::from_value(serde_json::json!({ "featuredImage": "not a url" })).unwrap();

		assert!(input.validate().is_err());
	}

	#[test]
	fn test_status_wire_format_matches_database() {
		for status in PostStatus::ALL {
			assert_eq!(
				serde_json::to_value(status).unwrap(),
				serde_json::json!(status.as_str())
			);
		}
	}

	#[test]
	fn test_only_draft_and_rejected_are_editable() {
		let editable = PostStatus::ALL
			.into_iter()
			.filter(|status| status.is_editable())
			.collect::<Vec<_>>();

		assert_eq!(editable, [PostStatus::Draft, PostStatus::Rejected]);
	}

	#[test]
	fn test_create_input_defaults() {
		let input: CreatePostInput = serde_json::from_value(serde_json::json!({
			"title": "Brooding chicks in cold weather",
			"content": "Keep the brooder at 35°C for the first week.",
		}))
		.unwrap();

		assert_eq!(input.category, Category::General);
		assert!(input.tags.is_empty());
		assert!(!input.submit);
		assert!(input.validate().is_ok());
	}

	#[test]
	fn test_create_input_rejects_bad_image_urls() {
		let input: CreatePostInput = serde_json::from_value(serde_json::json!({
			"title": "Layer housing",
			"content": "Cages versus deep litter.",
			"images": ["https://cdn.example.com/a.jpg", "not a url"],
		}))
		.unwrap();

		assert!(input.validate().is_err());
	}

	#[test]
	fn test_pagination_uses_total_posts() {
		let pagination = PostPagination::from(Paginate::from_query(Some(3), Some(12)).pagination(25));
		let value = serde_json::to_value(pagination).unwrap();

		assert_eq!(value["totalPosts"], 25);
		assert_eq!(value["totalPages"], 3);
	}
}
