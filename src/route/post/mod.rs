use aide::axum::{
	routing::{get_with, post_with},
	ApiRouter,
};
use axum::http::StatusCode;

use crate::{error, AppState};

use self::{model::PostStatus, transition::TransitionError};

pub mod model;
pub mod query;
pub mod route;
pub mod transition;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Transition(#[from] TransitionError),
	#[error("unknown post {0}")]
	UnknownPost(String),
	#[error("the post is no longer {expected}")]
	StatusChanged { expected: PostStatus },
	#[error("could not find a free slug for {0}")]
	SlugTaken(String),
}

pub type RouteError = error::RouteError<Error>;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route(
			"/",
			get_with(get_posts, get_posts_docs).post_with(create_post, create_post_docs),
		)
		.api_route("/me", get_with(get_own_posts, get_own_posts_docs))
		.api_route(
			"/:slug",
			get_with(get_post, get_post_docs)
				.put_with(update_post, update_post_docs)
				.delete_with(delete_post, delete_post_docs),
		)
		.api_route("/:slug/archive", post_with(archive_post, archive_post_docs))
		.api_route("/:slug/like", post_with(like_post, like_post_docs))
		.api_route("/by-id/:id/submit", post_with(submit_post, submit_post_docs))
		.api_route(
			"/by-id/:id/resubmit",
			post_with(resubmit_post, resubmit_post_docs),
		)
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::Transition(
				TransitionError::NotAuthor(..)
				| TransitionError::NotAdmin(..)
				| TransitionError::NotAllowed(..),
			) => StatusCode::FORBIDDEN,
			Self::Transition(
				TransitionError::InvalidTransition { .. } | TransitionError::Frozen(..),
			)
			| Self::StatusChanged { .. }
			| Self::SlugTaken(..) => StatusCode::CONFLICT,
			Self::UnknownPost(..) => StatusCode::NOT_FOUND,
		}
	}

	fn into_errors(self) -> Vec<error::Message<'static>> {
		let message = error::Message::new(self.to_string());

		let message = match self {
			Self::Transition(TransitionError::InvalidTransition { from, action }) => message
				.field("status")
				.detail("code", "invalid_transition")
				.detail("from", from.as_str())
				.detail("action", action.as_str()),
			Self::Transition(TransitionError::Frozen(status)) => message
				.detail("code", "post_frozen")
				.detail("status", status.as_str()),
			Self::Transition(..) => message.detail("code", "forbidden"),
			Self::UnknownPost(post) => message.detail("code", "unknown_post").detail("post", post),
			Self::StatusChanged { expected } => message
				.field("status")
				.detail("code", "status_changed")
				.detail("expected", expected.as_str()),
			Self::SlugTaken(..) => message.field("title").detail("code", "slug_taken"),
		};

		message.into_vec()
	}
}

#[cfg(test)]
mod test {
	use axum::response::IntoResponse;

	use super::{
		model::PostStatus,
		transition::{ActionKind, TransitionError},
		Error, RouteError,
	};

	#[test]
	fn test_invalid_transition_is_conflict() {
		let response = RouteError::from(Error::from(TransitionError::InvalidTransition {
			from: PostStatus::Published,
			action: ActionKind::Approve,
		}))
		.into_response();

		assert_eq!(response.status(), 409);
	}

	#[test]
	fn test_permission_errors_are_forbidden() {
		let response =
			RouteError::from(Error::from(TransitionError::NotAdmin(ActionKind::Reject)))
				.into_response();

		assert_eq!(response.status(), 403);
	}

	#[test]
	fn test_unknown_post_is_not_found() {
		let response = RouteError::from(Error::UnknownPost("no-such-post".into())).into_response();

		assert_eq!(response.status(), 404);
	}
}

#[cfg(all(test, feature = "database-tests"))]
mod database_test {
	use crate::test::*;

	async fn create_post(app: &TestServer, title: &str, submit: bool) -> serde_json::Value {
		let response = app
			.post("/api/blog/posts")
			.json(&json!({
				"title": title,
				"content": "Vaccinate against Newcastle disease at day 7 and day 21.",
				"category": "POULTRY_HEALTH",
				"tags": ["Vaccines", "vaccines", "Layers"],
				"submit": submit,
			}))
			.await;

		assert_eq!(response.status_code(), 200);

		response.json()
	}

	#[sqlx::test]
	async fn test_create_draft(pool: Database) {
		let app = app(pool);

		register(&app, "alice").await;

		let post = create_post(&app, "Vaccination schedule", false).await;

		assert_eq!(post["status"], "DRAFT");
		assert_eq!(post["slug"], "vaccination-schedule");
		assert_eq!(post["tags"], json!(["vaccines", "layers"]));
		assert_eq!(post["authorUsername"], "alice");
		assert!(post["excerpt"].as_str().unwrap().starts_with("Vaccinate"));
	}

	#[sqlx::test]
	async fn test_duplicate_titles_get_distinct_slugs(pool: Database) {
		let app = app(pool);

		register(&app, "alice").await;

		let first = create_post(&app, "Brooding basics", false).await;
		let second = create_post(&app, "Brooding basics", false).await;

		assert_eq!(first["slug"], "brooding-basics");
		assert_ne!(first["slug"], second["slug"]);
		assert!(second["slug"]
			.as_str()
			.unwrap()
			.starts_with("brooding-basics-"));
	}

	#[sqlx::test]
	async fn test_drafts_are_hidden_from_others(pool: Database) {
		let app = app(pool);

		register(&app, "alice").await;

		let post = create_post(&app, "Private notes", false).await;
		let slug = post["slug"].as_str().unwrap();

		app.get("/api/auth/logout").await;

		let response = app.get(&format!("/api/blog/posts/{slug}")).await;

		assert_eq!(response.status_code(), 404);

		register(&app, "bob").await;

		let response = app.get(&format!("/api/blog/posts/{slug}")).await;

		assert_eq!(response.status_code(), 404);
	}

	#[sqlx::test]
	async fn test_submit_then_edit_is_frozen(pool: Database) {
		let app = app(pool);

		register(&app, "alice").await;

		let post = create_post(&app, "Feed ratios", false).await;
		let id = post["id"].as_str().unwrap();
		let slug = post["slug"].as_str().unwrap();

		let response = app.post(&format!("/api/blog/posts/by-id/{id}/submit")).await;

		assert_eq!(response.status_code(), 200);
		assert_eq!(response.json::<serde_json::Value>()["status"], "PENDING_APPROVAL");

		let response = app
			.put(&format!("/api/blog/posts/{slug}"))
			.json(&json!({ "title": "Feed ratios for broilers" }))
			.await;

		assert_eq!(response.status_code(), 409);

		// a second submission is not a valid transition
		let response = app.post(&format!("/api/blog/posts/by-id/{id}/submit")).await;

		assert_eq!(response.status_code(), 409);
	}

	#[sqlx::test]
	async fn test_edit_can_remove_featured_image(pool: Database) {
		let app = app(pool);

		register(&app, "alice").await;

		let post = create_post(&app, "Coop ventilation", false).await;
		let path = format!("/api/blog/posts/{}", post["slug"].as_str().unwrap());

		let response = app
			.put(&path)
			.json(&json!({ "featuredImage": "https://images.example.com/coop.jpg" }))
			.await;

		assert_eq!(response.status_code(), 200);
		assert_eq!(
			response.json::<serde_json::Value>()["featuredImage"],
			"https://images.example.com/coop.jpg"
		);

		let response = app.put(&path).json(&json!({ "title": "Coop airflow" })).await;

		assert_eq!(
			response.json::<serde_json::Value>()["featuredImage"],
			"https://images.example.com/coop.jpg"
		);

		let response = app.put(&path).json(&json!({ "featuredImage": null })).await;

		assert_eq!(response.status_code(), 200);
		assert_eq!(
			response.json::<serde_json::Value>()["featuredImage"],
			serde_json::Value::Null
		);

		register(&app, "bob").await;

		let response = app.put(&path).json(&json!({ "title": "Mine now" })).await;

		assert_eq!(response.status_code(), 403);
		assert_eq!(
			response.json::<serde_json::Value>()["errors"][0]["content"],
			"only the author can edit this post"
		);
	}

	#[sqlx::test]
	async fn test_only_author_can_submit(pool: Database) {
		let app = app(pool);

		register(&app, "alice").await;

		let post = create_post(&app, "Egg grading", false).await;
		let id = post["id"].as_str().unwrap();

		register(&app, "bob").await;

		let response = app.post(&format!("/api/blog/posts/by-id/{id}/submit")).await;

		assert_eq!(response.status_code(), 403);
	}

	#[sqlx::test]
	async fn test_published_list_and_views(pool: Database) {
		let app = app(pool.clone());

		register(&app, "alice").await;
		let draft = create_post(&app, "Still a draft", false).await;
		let pending = create_post(&app, "Waiting for review", true).await;

		register(&app, "admin").await;
		promote(&pool, "admin").await;

		let slug = pending["slug"].as_str().unwrap();
		let response = app
			.patch(&format!("/api/blog/posts/{slug}/approve"))
			.json(&json!({ "action": "approve" }))
			.await;

		assert_eq!(response.status_code(), 200);

		app.get("/api/auth/logout").await;

		let response = app.get("/api/blog/posts").await;
		let body = response.json::<serde_json::Value>();

		assert_eq!(response.status_code(), 200);
		assert_eq!(body["pagination"]["totalPosts"], 1);
		assert_eq!(body["posts"][0]["slug"], pending["slug"]);
		assert_ne!(body["posts"][0]["slug"], draft["slug"]);

		app.get(&format!("/api/blog/posts/{slug}")).await;
		let response = app.get(&format!("/api/blog/posts/{slug}")).await;

		assert_eq!(response.json::<serde_json::Value>()["viewCount"], 2);
	}

	#[sqlx::test]
	async fn test_like_toggles(pool: Database) {
		let app = app(pool.clone());

		register(&app, "admin").await;
		promote(&pool, "admin").await;

		let response = app
			.post("/api/admin/blog/posts")
			.json(&json!({
				"title": "Deep litter systems",
				"content": "Turn the litter weekly.",
				"publishImmediately": true,
			}))
			.await;
		let slug = response.json::<serde_json::Value>()["slug"]
			.as_str()
			.unwrap()
			.to_owned();

		register(&app, "reader").await;

		let response = app.post(&format!("/api/blog/posts/{slug}/like")).await;

		assert_eq!(response.json::<serde_json::Value>(), json!({ "liked": true, "likeCount": 1 }));

		let response = app.post(&format!("/api/blog/posts/{slug}/like")).await;

		assert_eq!(response.json::<serde_json::Value>(), json!({ "liked": false, "likeCount": 0 }));
	}
}
