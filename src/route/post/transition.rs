//! Post lifecycle rules.
//!
//! [`apply`] maps the current moderation state of a post, an action and the
//! actor performing it onto the next moderation state. It performs no I/O;
//! the handlers persist the result with a conditional update on the previous
//! status.

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::model::{Moderation, PostStatus};

/// Who is acting on a post, relative to that post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
	pub user_id: Uuid,
	pub is_admin: bool,
	/// Whether the actor wrote the post.
	pub is_owner: bool,
}

impl Actor {
	pub fn for_post(user_id: Uuid, is_admin: bool, author_id: Uuid) -> Self {
		Self {
			user_id,
			is_admin,
			is_owner: user_id == author_id,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
	Submit,
	Resubmit { notes: Option<String> },
	Approve { publish_now: bool, featured: bool },
	Reject { reason: Option<String> },
	/// Publishes a post that was approved for later publication.
	Publish,
	RevertToDraft,
	Archive,
	Delete,
	SetFeatured(bool),
}

/// The name of an [`Action`], without its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
	Submit,
	Resubmit,
	Approve,
	Reject,
	Publish,
	RevertToDraft,
	Archive,
	Delete,
	Feature,
	Edit,
}

impl ActionKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Submit => "submit",
			Self::Resubmit => "resubmit",
			Self::Approve => "approve",
			Self::Reject => "reject",
			Self::Publish => "publish",
			Self::RevertToDraft => "revert_to_draft",
			Self::Archive => "archive",
			Self::Delete => "delete",
			Self::Feature => "feature",
			Self::Edit => "edit",
		}
	}
}

impl fmt::Display for ActionKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl Action {
	pub fn kind(&self) -> ActionKind {
		match self {
			Self::Submit => ActionKind::Submit,
			Self::Resubmit { .. } => ActionKind::Resubmit,
			Self::Approve { .. } => ActionKind::Approve,
			Self::Reject { .. } => ActionKind::Reject,
			Self::Publish => ActionKind::Publish,
			Self::RevertToDraft => ActionKind::RevertToDraft,
			Self::Archive => ActionKind::Archive,
			Self::Delete => ActionKind::Delete,
			Self::SetFeatured(..) => ActionKind::Feature,
		}
	}

	/// The states this action can be taken from.
	pub fn sources(&self) -> &'static [PostStatus] {
		use PostStatus::*;

		match self {
			Self::Submit => &[Draft],
			Self::Resubmit { .. } => &[Rejected],
			Self::Approve { .. } | Self::Reject { .. } => &[PendingApproval],
			Self::Publish => &[Approved],
			Self::RevertToDraft => &[PendingApproval, Approved, Rejected],
			Self::Archive => &[Published],
			Self::Delete => &[Draft, Rejected],
			Self::SetFeatured(..) => &[Approved, Published],
		}
	}
}

/// Who may perform an action.
enum Permission {
	/// Only the author of the post.
	Author,
	Admin,
	AuthorOrAdmin,
}

fn permission(kind: ActionKind) -> Permission {
	match kind {
		ActionKind::Submit | ActionKind::Resubmit | ActionKind::Edit => Permission::Author,
		ActionKind::Approve
		| ActionKind::Reject
		| ActionKind::Publish
		| ActionKind::RevertToDraft
		| ActionKind::Feature => Permission::Admin,
		ActionKind::Archive | ActionKind::Delete => Permission::AuthorOrAdmin,
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
	#[error("cannot {action} a post that is {from}")]
	InvalidTransition { from: PostStatus, action: ActionKind },
	#[error("only the author can {0} this post")]
	NotAuthor(ActionKind),
	#[error("only an admin can {0} a post")]
	NotAdmin(ActionKind),
	#[error("you cannot {0} this post")]
	NotAllowed(ActionKind),
	#[error("a post that is {0} can no longer be edited")]
	Frozen(PostStatus),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
	Update(Moderation),
	Delete,
}

fn check_permission(kind: ActionKind, actor: Actor) -> Result<(), TransitionError> {
	let allowed = match permission(kind) {
		Permission::Author => actor.is_owner,
		Permission::Admin => actor.is_admin,
		Permission::AuthorOrAdmin => actor.is_owner || actor.is_admin,
	};

	if allowed {
		return Ok(());
	}

	Err(match permission(kind) {
		Permission::Author => TransitionError::NotAuthor(kind),
		Permission::Admin => TransitionError::NotAdmin(kind),
		Permission::AuthorOrAdmin => TransitionError::NotAllowed(kind),
	})
}

/// Empty or whitespace-only notes are treated as absent.
fn non_empty(text: Option<String>) -> Option<String> {
	text.map(|text| text.trim().to_owned())
		.filter(|text| !text.is_empty())
}

/// Computes the outcome of `action` taken by `actor` on a post in `current` state.
pub fn apply(
	current: &Moderation,
	action: Action,
	actor: Actor,
	now: DateTime<Utc>,
) -> Result<Outcome, TransitionError> {
	let kind = action.kind();

	check_permission(kind, actor)?;

	if !action.sources().contains(&current.status) {
		return Err(TransitionError::InvalidTransition {
			from: current.status,
			action: kind,
		});
	}

	let mut next = current.clone();

	match action {
		Action::Submit => {
			next.status = PostStatus::PendingApproval;
			next.submitted_at = Some(now);
		}
		Action::Resubmit { notes } => {
			next.status = PostStatus::PendingApproval;
			next.submitted_at = Some(now);
			next.rejection_reason = None;
			next.submission_notes = non_empty(notes);
			next.resubmit_count = current.resubmit_count.saturating_add(1);
		}
		Action::Approve {
			publish_now,
			featured,
		} => {
			next.approved_at = Some(now);
			next.approved_by = Some(actor.user_id);
			next.featured = current.featured || featured;

			if publish_now {
				next.status = PostStatus::Published;
				next.published_at = Some(now);
			} else {
				next.status = PostStatus::Approved;
			}
		}
		Action::Reject { reason } => {
			next.status = PostStatus::Rejected;
			next.rejected_at = Some(now);
			next.rejection_reason = non_empty(reason);
		}
		Action::Publish => {
			next.status = PostStatus::Published;
			next.published_at = Some(now);
		}
		Action::RevertToDraft => {
			// Back with the author: no review is active anymore
			next = Moderation {
				resubmit_count: current.resubmit_count,
				..Moderation::draft()
			};
		}
		Action::Archive => {
			next.status = PostStatus::Archived;
			next.archived_at = Some(now);
			next.featured = false;
		}
		Action::Delete => return Ok(Outcome::Delete),
		Action::SetFeatured(featured) => {
			next.featured = featured;
		}
	}

	Ok(Outcome::Update(next))
}

/// Checks that `actor` may change the content of a post in `status`.
pub fn check_editable(status: PostStatus, actor: Actor) -> Result<(), TransitionError> {
	check_permission(ActionKind::Edit, actor)?;

	if !status.is_editable() {
		return Err(TransitionError::Frozen(status));
	}

	Ok(())
}

#[cfg(test)]
mod test {
	use super::*;

	fn author() -> Actor {
		Actor {
			user_id: Uuid::new_v4(),
			is_admin: false,
			is_owner: true,
		}
	}

	fn admin() -> Actor {
		Actor {
			user_id: Uuid::new_v4(),
			is_admin: true,
			is_owner: false,
		}
	}

	fn stranger() -> Actor {
		Actor {
			user_id: Uuid::new_v4(),
			is_admin: false,
			is_owner: false,
		}
	}

	fn in_state(status: PostStatus) -> Moderation {
		Moderation {
			status,
			..Moderation::draft()
		}
	}

	fn updated(outcome: Result<Outcome, TransitionError>) -> Moderation {
		match outcome {
			Ok(Outcome::Update(next)) => next,
			other => panic!("expected an update, got {other:?}"),
		}
	}

	#[test]
	fn test_submit_draft() {
		let now = Utc::now();
		let next = updated(apply(
			&Moderation::draft(),
			Action::Submit,
			author(),
			now,
		));

		assert_eq!(next.status, PostStatus::PendingApproval);
		assert_eq!(next.submitted_at, Some(now));
	}

	#[test]
	fn test_admin_cannot_submit_for_author() {
		assert_eq!(
			apply(&Moderation::draft(), Action::Submit, admin(), Utc::now()),
			Err(TransitionError::NotAuthor(ActionKind::Submit))
		);
	}

	#[test]
	fn test_resubmit_clears_reason_and_counts() {
		let current = Moderation {
			status: PostStatus::Rejected,
			rejected_at: Some(Utc::now()),
			rejection_reason: Some("Too short".into()),
			resubmit_count: 2,
			..Moderation::draft()
		};

		let next = updated(apply(
			&current,
			Action::Resubmit {
				notes: Some("  Added vaccination schedule ".into()),
			},
			author(),
			Utc::now(),
		));

		assert_eq!(next.status, PostStatus::PendingApproval);
		assert_eq!(next.resubmit_count, 3);
		assert_eq!(next.rejection_reason, None);
		assert_eq!(
			next.submission_notes.as_deref(),
			Some("Added vaccination schedule")
		);
	}

	#[test]
	fn test_resubmit_requires_rejection() {
		for status in [PostStatus::Draft, PostStatus::PendingApproval, PostStatus::Published] {
			assert_eq!(
				apply(
					&in_state(status),
					Action::Resubmit { notes: None },
					author(),
					Utc::now()
				),
				Err(TransitionError::InvalidTransition {
					from: status,
					action: ActionKind::Resubmit,
				})
			);
		}
	}

	#[test]
	fn test_approve_and_publish_now() {
		let now = Utc::now();
		let admin = admin();
		let next = updated(apply(
			&in_state(PostStatus::PendingApproval),
			Action::Approve {
				publish_now: true,
				featured: true,
			},
			admin,
			now,
		));

		assert_eq!(next.status, PostStatus::Published);
		assert_eq!(next.approved_at, Some(now));
		assert_eq!(next.published_at, Some(now));
		assert_eq!(next.approved_by, Some(admin.user_id));
		assert!(next.featured);
	}

	#[test]
	fn test_approve_for_later_then_publish() {
		let next = updated(apply(
			&in_state(PostStatus::PendingApproval),
			Action::Approve {
				publish_now: false,
				featured: false,
			},
			admin(),
			Utc::now(),
		));

		assert_eq!(next.status, PostStatus::Approved);
		assert_eq!(next.published_at, None);
		assert!(next.approved_at.is_some());

		let next = updated(apply(&next, Action::Publish, admin(), Utc::now()));

		assert_eq!(next.status, PostStatus::Published);
		assert!(next.published_at.is_some());
	}

	#[test]
	fn test_approving_published_post_conflicts() {
		let result = apply(
			&in_state(PostStatus::Published),
			Action::Approve {
				publish_now: true,
				featured: false,
			},
			admin(),
			Utc::now(),
		);

		assert_eq!(
			result,
			Err(TransitionError::InvalidTransition {
				from: PostStatus::Published,
				action: ActionKind::Approve,
			})
		);
	}

	#[test]
	fn test_author_cannot_approve_own_post() {
		let result = apply(
			&in_state(PostStatus::PendingApproval),
			Action::Approve {
				publish_now: true,
				featured: false,
			},
			author(),
			Utc::now(),
		);

		assert_eq!(result, Err(TransitionError::NotAdmin(ActionKind::Approve)));
	}

	#[test]
	fn test_reject_with_blank_reason() {
		let next = updated(apply(
			&in_state(PostStatus::PendingApproval),
			Action::Reject {
				reason: Some("   ".into()),
			},
			admin(),
			Utc::now(),
		));

		assert_eq!(next.status, PostStatus::Rejected);
		assert_eq!(next.rejection_reason, None);
		assert!(next.rejected_at.is_some());
	}

	#[test]
	fn test_archive_published() {
		for actor in [author(), admin()] {
			let next = updated(apply(
				&Moderation {
					featured: true,
					..in_state(PostStatus::Published)
				},
				Action::Archive,
				actor,
				Utc::now(),
			));

			assert_eq!(next.status, PostStatus::Archived);
			assert!(next.archived_at.is_some());
			assert!(!next.featured);
		}

		assert_eq!(
			apply(
				&in_state(PostStatus::Published),
				Action::Archive,
				stranger(),
				Utc::now()
			),
			Err(TransitionError::NotAllowed(ActionKind::Archive))
		);
	}

	#[test]
	fn test_delete_only_before_publication() {
		for status in PostStatus::ALL {
			let result = apply(&in_state(status), Action::Delete, admin(), Utc::now());

			if matches!(status, PostStatus::Draft | PostStatus::Rejected) {
				assert_eq!(result, Ok(Outcome::Delete));
			} else {
				assert!(matches!(
					result,
					Err(TransitionError::InvalidTransition { .. })
				));
			}
		}
	}

	#[test]
	fn test_revert_to_draft_keeps_resubmit_count() {
		let current = Moderation {
			status: PostStatus::Rejected,
			rejection_reason: Some("Needs sources".into()),
			rejected_at: Some(Utc::now()),
			resubmit_count: 4,
			..Moderation::draft()
		};

		let next = updated(apply(&current, Action::RevertToDraft, admin(), Utc::now()));

		assert_eq!(next.status, PostStatus::Draft);
		assert_eq!(next.resubmit_count, 4);
		assert_eq!(next.rejection_reason, None);
		assert_eq!(next.rejected_at, None);
	}

	#[test]
	fn test_feature_requires_visible_post() {
		assert!(apply(
			&in_state(PostStatus::Draft),
			Action::SetFeatured(true),
			admin(),
			Utc::now()
		)
		.is_err());

		let next = updated(apply(
			&in_state(PostStatus::Published),
			Action::SetFeatured(true),
			admin(),
			Utc::now(),
		));

		assert!(next.featured);
		assert_eq!(next.status, PostStatus::Published);
	}

	#[test]
	fn test_resubmit_count_never_decreases() {
		let mut state = Moderation::draft();
		let mut last_count = state.resubmit_count;
		let steps = [
			(Action::Submit, author()),
			(Action::Reject { reason: None }, admin()),
			(Action::Resubmit { notes: None }, author()),
			(Action::RevertToDraft, admin()),
			(Action::Submit, author()),
			(Action::Reject { reason: Some("again".into()) }, admin()),
			(Action::Resubmit { notes: None }, author()),
		];

		for (action, actor) in steps {
			state = updated(apply(&state, action, actor, Utc::now()));

			assert!(state.resubmit_count >= last_count);
			assert!(state.rejection_reason.is_none() || state.status == PostStatus::Rejected);
			last_count = state.resubmit_count;
		}

		assert_eq!(state.resubmit_count, 2);
	}

	#[test]
	fn test_editing_window() {
		assert!(check_editable(PostStatus::Draft, author()).is_ok());
		assert!(check_editable(PostStatus::Rejected, author()).is_ok());
		assert_eq!(
			check_editable(PostStatus::PendingApproval, author()),
			Err(TransitionError::Frozen(PostStatus::PendingApproval))
		);
		assert_eq!(
			check_editable(PostStatus::Draft, admin()),
			Err(TransitionError::NotAuthor(ActionKind::Edit))
		);
		assert_eq!(
			TransitionError::NotAuthor(ActionKind::Edit).to_string(),
			"only the author can edit this post"
		);
	}
}
