use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::route::post::{
	model::{Category, PostStatus},
	transition::Action,
};

pub use crate::route::post::model::{AdminCreatePostInput, Post, PostList, SlugInput};

#[inline]
fn yes() -> bool {
	true
}

/// Filters for the admin review queue.
#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct ReviewQueueQuery {
	#[validate(range(min = 1, max = 10_000))]
	pub page: Option<i64>,
	#[validate(range(min = 1, max = 100))]
	pub limit: Option<i64>,
	/// Matches titles, excerpts and author usernames, case-insensitively.
	#[validate(length(max = 200))]
	pub search: Option<String>,
	pub status: Option<PostStatus>,
	pub category: Option<Category>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
	Approve,
	Reject,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewInput {
	pub action: ReviewDecision,
	/// Publish right away when approving. When false, the post waits in the
	/// approved state until it is published.
	#[serde(default = "yes")]
	pub publish_immediately: bool,
	#[serde(default)]
	pub featured: bool,
	/// Shown to the author when rejecting.
	#[validate(length(max = 2000))]
	pub rejection_reason: Option<String>,
}

impl ReviewInput {
	pub fn into_action(self) -> Action {
		match self.action {
			ReviewDecision::Approve => Action::Approve {
				publish_now: self.publish_immediately,
				featured: self.featured,
			},
			ReviewDecision::Reject => Action::Reject {
				reason: self.rejection_reason,
			},
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
	Publish,
	Draft,
	Feature,
	Unfeature,
	Archive,
	Delete,
}

impl BulkAction {
	/// The transition this bulk action stands for, given the current status of a post.
	pub fn to_action(self, status: PostStatus) -> Action {
		match self {
			Self::Publish if status == PostStatus::PendingApproval => Action::Approve {
				publish_now: true,
				featured: false,
			},
			Self::Publish => Action::Publish,
			Self::Draft => Action::RevertToDraft,
			Self::Feature => Action::SetFeatured(true),
			Self::Unfeature => Action::SetFeatured(false),
			Self::Archive => Action::Archive,
			Self::Delete => Action::Delete,
		}
	}
}

fn validate_unique_ids(ids: &[Uuid]) -> Result<(), ValidationError> {
	let mut sorted = ids.to_vec();

	sorted.sort_unstable();
	sorted.dedup();

	if sorted.len() == ids.len() {
		Ok(())
	} else {
		Err(ValidationError::new("duplicate_post_id"))
	}
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkInput {
	pub action: BulkAction,
	#[validate(length(min = 1, max = 100), custom(function = "validate_unique_ids"))]
	pub post_ids: Vec<Uuid>,
}

/// The outcome of a bulk action on a single post.
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkItemResult {
	pub post_id: Uuid,
	pub success: bool,
	/// The status of the post after the action. Absent for deleted posts and failures.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<PostStatus>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct BulkOutput {
	pub action: BulkAction,
	pub results: Vec<BulkItemResult>,
	pub succeeded: usize,
	pub failed: usize,
}

impl BulkOutput {
	pub fn new(action: BulkAction, results: Vec<BulkItemResult>) -> Self {
		let succeeded = results.iter().filter(|result| result.success).count();

		Self {
			action,
			failed: results.len() - succeeded,
			succeeded,
			results,
		}
	}
}

/// Number of posts per status.
#[derive(Debug, Default, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
	pub total: i64,
	pub draft: i64,
	pub pending_approval: i64,
	pub approved: i64,
	pub published: i64,
	pub rejected: i64,
	pub archived: i64,
}

impl FromIterator<(PostStatus, i64)> for ReviewStats {
	fn from_iter<I: IntoIterator<Item = (PostStatus, i64)>>(counts: I) -> Self {
		let mut stats = Self::default();

		for (status, count) in counts {
			let slot = match status {
				PostStatus::Draft => &mut stats.draft,
				PostStatus::PendingApproval => &mut stats.pending_approval,
				PostStatus::Approved => &mut stats.approved,
				PostStatus::Published => &mut stats.published,
				PostStatus::Rejected => &mut stats.rejected,
				PostStatus::Archived => &mut stats.archived,
			};

			*slot += count;
			stats.total += count;
		}

		stats
	}
}
