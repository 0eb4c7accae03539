use aide::axum::{
	routing::{get_with, post_with},
	ApiRouter,
};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::{error, AppState};

use self::model::AlreadyModerated;

pub mod model;
pub mod route;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unknown post {0}")]
	UnknownPost(String),
	#[error("unknown comment {0}")]
	UnknownComment(Uuid),
	#[error("the parent comment {0} does not belong to this post")]
	UnknownParent(Uuid),
	#[error("guests must give a name and an email address")]
	GuestDetailsRequired,
	#[error(transparent)]
	AlreadyModerated(#[from] AlreadyModerated),
}

pub type RouteError = error::RouteError<Error>;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route(
			"/blog/posts/:slug/comments",
			get_with(get_comments, get_comments_docs).post_with(create_comment, create_comment_docs),
		)
		.api_route(
			"/blog/comments/:id/moderate",
			post_with(moderate_comment, moderate_comment_docs),
		)
		.api_route(
			"/admin/blog/comments",
			get_with(get_all_comments, get_all_comments_docs),
		)
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::UnknownPost(..) | Self::UnknownComment(..) => StatusCode::NOT_FOUND,
			Self::UnknownParent(..) | Self::GuestDetailsRequired => StatusCode::BAD_REQUEST,
			Self::AlreadyModerated(..) => StatusCode::CONFLICT,
		}
	}

	fn into_errors(self) -> Vec<error::Message<'static>> {
		let message = error::Message::new(self.to_string());

		match self {
			Self::UnknownParent(..) => message.field("parentId"),
			Self::GuestDetailsRequired => message.field("guestName"),
			Self::AlreadyModerated(AlreadyModerated(status)) => {
				message.field("status").detail("status", status.as_str())
			}
			Self::UnknownPost(..) | Self::UnknownComment(..) => message,
		}
		.into_vec()
	}
}

#[cfg(all(test, feature = "database-tests"))]
mod test {
	use crate::test::*;

	/// Creates a published post as an admin and returns its slug.
	async fn published_post(app: &TestServer, pool: &Database) -> String {
		register(app, "editor").await;
		promote(pool, "editor").await;

		let response = app
			.post("/api/admin/blog/posts")
			.json(&json!({
				"title": "Gumboro outbreaks",
				"content": "Vaccinate early.",
				"publishImmediately": true,
			}))
			.await;

		response.json::<serde_json::Value>()["slug"]
			.as_str()
			.unwrap()
			.to_owned()
	}

	#[sqlx::test]
	async fn test_comments_wait_for_approval(pool: Database) {
		let app = app(pool.clone());
		let slug = published_post(&app, &pool).await;

		app.get("/api/auth/logout").await;

		let response = app
			.post(&format!("/api/blog/posts/{slug}/comments"))
			.json(&json!({
				"content": "Which vaccine brand do you use?",
				"guestName": "Otieno",
				"guestEmail": "otieno@example.com",
			}))
			.await;
		let comment = response.json::<serde_json::Value>();

		assert_eq!(response.status_code(), 200);
		assert_eq!(comment["status"], "PENDING");
		assert_eq!(comment["isApproved"], false);
		assert!(comment["author"].get("email").is_none());

		let response = app.get(&format!("/api/blog/posts/{slug}/comments")).await;

		assert_eq!(response.json::<serde_json::Value>(), json!([]));

		login(&app, "editor").await;

		let id = comment["id"].as_str().unwrap();
		let response = app
			.post(&format!("/api/blog/comments/{id}/moderate"))
			.json(&json!({ "action": "approve" }))
			.await;

		assert_eq!(response.status_code(), 200);
		assert_eq!(response.json::<serde_json::Value>()["isApproved"], true);

		let response = app
			.post(&format!("/api/blog/comments/{id}/moderate"))
			.json(&json!({ "action": "reject" }))
			.await;

		assert_eq!(response.status_code(), 409);

		let response = app.get(&format!("/api/blog/posts/{slug}/comments")).await;

		assert_eq!(response.json::<serde_json::Value>()[0]["id"], comment["id"]);
	}

	#[sqlx::test]
	async fn test_guest_details_required(pool: Database) {
		let app = app(pool.clone());
		let slug = published_post(&app, &pool).await;

		app.get("/api/auth/logout").await;

		let response = app
			.post(&format!("/api/blog/posts/{slug}/comments"))
			.json(&json!({ "content": "Anonymous!" }))
			.await;

		assert_eq!(response.status_code(), 400);
	}

	#[sqlx::test]
	async fn test_pending_filter(pool: Database) {
		let app = app(pool.clone());
		let slug = published_post(&app, &pool).await;

		let mut ids = Vec::new();

		for content in ["first", "second", "third"] {
			let response = app
				.post(&format!("/api/blog/posts/{slug}/comments"))
				.json(&json!({ "content": content }))
				.await;

			ids.push(response.json::<serde_json::Value>()["id"].clone());
		}

		app.post(&format!("/api/blog/comments/{}/moderate", ids[0].as_str().unwrap()))
			.json(&json!({ "action": "approve" }))
			.await;
		app.post(&format!("/api/blog/comments/{}/moderate", ids[1].as_str().unwrap()))
			.json(&json!({ "action": "reject", "reason": "spam" }))
			.await;

		let response = app
			.get("/api/admin/blog/comments")
			.add_query_param("status", "pending")
			.await;
		let body = response.json::<serde_json::Value>();

		assert_eq!(response.status_code(), 200);
		assert_eq!(body["pagination"]["total"], 1);
		assert_eq!(body["items"][0]["id"], ids[2]);
	}
}
