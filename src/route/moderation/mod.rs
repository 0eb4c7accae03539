//! Admin review of blog posts.
//!
//! Shares its error type with [`crate::route::post`], since every failure here
//! is a failure to find or transition a post.

use aide::axum::{
	routing::{get_with, patch_with, post_with},
	ApiRouter,
};

use crate::AppState;

pub mod model;
pub mod route;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route(
			"/admin/blog/posts",
			get_with(get_review_queue, get_review_queue_docs)
				.post_with(create_post, create_post_docs),
		)
		.api_route("/admin/blog/stats", get_with(get_stats, get_stats_docs))
		.api_route("/admin/blog/bulk", post_with(bulk_action, bulk_action_docs))
		.api_route(
			"/blog/posts/:slug/approve",
			patch_with(review_post, review_post_docs),
		)
}

#[cfg(all(test, feature = "database-tests"))]
mod test {
	use crate::test::*;

	async fn submitted_post(app: &TestServer, title: &str) -> serde_json::Value {
		let response = app
			.post("/api/blog/posts")
			.json(&json!({
				"title": title,
				"content": "Maize bran, fish meal and a premix make a cheap layer ration.",
				"submit": true,
			}))
			.await;

		assert_eq!(response.status_code(), 200);

		response.json()
	}

	#[sqlx::test]
	async fn test_reject_and_resubmit(pool: Database) {
		let app = app(pool.clone());

		register(&app, "author").await;
		let post = submitted_post(&app, "Layer rations").await;
		let slug = post["slug"].as_str().unwrap().to_owned();
		let id = post["id"].as_str().unwrap().to_owned();

		register(&app, "admin").await;
		promote(&pool, "admin").await;

		for round in 1..=3 {
			let response = app
				.patch(&format!("/api/blog/posts/{slug}/approve"))
				.json(&json!({ "action": "reject", "rejectionReason": "Cite your sources" }))
				.await;
			let body = response.json::<serde_json::Value>();

			assert_eq!(response.status_code(), 200);
			assert_eq!(body["status"], "REJECTED");
			assert_eq!(body["rejectionReason"], "Cite your sources");

			login(&app, "author").await;

			let response = app
				.post(&format!("/api/blog/posts/by-id/{id}/resubmit"))
				.json(&json!({ "submissionNotes": "Added references" }))
				.await;
			let body = response.json::<serde_json::Value>();

			assert_eq!(response.status_code(), 200);
			assert_eq!(body["status"], "PENDING_APPROVAL");
			assert_eq!(body["resubmitCount"], round);
			assert_eq!(body["rejectionReason"], serde_json::Value::Null);
			assert_eq!(body["submissionNotes"], "Added references");

			login(&app, "admin").await;
		}
	}

	#[sqlx::test]
	async fn test_approving_published_post_conflicts(pool: Database) {
		let app = app(pool.clone());

		register(&app, "author").await;
		let post = submitted_post(&app, "Incubation temperatures").await;
		let slug = post["slug"].as_str().unwrap().to_owned();

		register(&app, "admin").await;
		promote(&pool, "admin").await;

		let response = app
			.patch(&format!("/api/blog/posts/{slug}/approve"))
			.json(&json!({ "action": "approve", "featured": true }))
			.await;
		let body = response.json::<serde_json::Value>();

		assert_eq!(response.status_code(), 200);
		assert_eq!(body["status"], "PUBLISHED");
		assert_eq!(body["featured"], true);
		assert!(body["publishedAt"].is_string());

		let response = app
			.patch(&format!("/api/blog/posts/{slug}/approve"))
			.json(&json!({ "action": "approve" }))
			.await;

		assert_eq!(response.status_code(), 409);
	}

	#[sqlx::test]
	async fn test_review_requires_admin(pool: Database) {
		let app = app(pool);

		register(&app, "author").await;
		let post = submitted_post(&app, "Self review").await;
		let slug = post["slug"].as_str().unwrap();

		let response = app
			.patch(&format!("/api/blog/posts/{slug}/approve"))
			.json(&json!({ "action": "approve" }))
			.await;

		assert_eq!(response.status_code(), 403);

		let response = app.get("/api/admin/blog/posts").await;

		assert_eq!(response.status_code(), 403);
	}

	#[sqlx::test]
	async fn test_review_queue_filters(pool: Database) {
		let app = app(pool.clone());

		register(&app, "author").await;

		for n in 0..25 {
			submitted_post(&app, &format!("Pending post {n}")).await;
		}

		app.post("/api/blog/posts")
			.json(&json!({ "title": "A draft about turkeys", "content": "Gobble." }))
			.await;

		register(&app, "admin").await;
		promote(&pool, "admin").await;

		let response = app
			.get("/api/admin/blog/posts")
			.add_query_param("status", "PENDING_APPROVAL")
			.add_query_param("page", 3)
			.add_query_param("limit", 12)
			.await;
		let body = response.json::<serde_json::Value>();

		assert_eq!(response.status_code(), 200);
		assert_eq!(body["pagination"]["totalPosts"], 25);
		assert_eq!(body["pagination"]["totalPages"], 3);
		assert_eq!(body["posts"].as_array().unwrap().len(), 1);

		let response = app
			.get("/api/admin/blog/posts")
			.add_query_param("search", "TURKEYS")
			.await;
		let body = response.json::<serde_json::Value>();

		assert_eq!(body["pagination"]["totalPosts"], 1);
		assert_eq!(body["posts"][0]["status"], "DRAFT");

		let response = app.get("/api/admin/blog/stats").await;
		let body = response.json::<serde_json::Value>();

		assert_eq!(body["pendingApproval"], 25);
		assert_eq!(body["draft"], 1);
		assert_eq!(body["total"], 26);
	}

	#[sqlx::test]
	async fn test_bulk_publish_reports_each_post(pool: Database) {
		let app = app(pool.clone());

		register(&app, "author").await;
		let pending = submitted_post(&app, "Bulk one").await;
		let draft = app
			.post("/api/blog/posts")
			.json(&json!({ "title": "Bulk two", "content": "Still drafting." }))
			.await
			.json::<serde_json::Value>();

		register(&app, "admin").await;
		promote(&pool, "admin").await;

		let missing = uuid::Uuid::new_v4();
		let response = app
			.post("/api/admin/blog/bulk")
			.json(&json!({
				"action": "publish",
				"postIds": [pending["id"], draft["id"], missing],
			}))
			.await;
		let body = response.json::<serde_json::Value>();

		assert_eq!(response.status_code(), 200);
		assert_eq!(body["succeeded"], 1);
		assert_eq!(body["failed"], 2);
		assert_eq!(body["results"][0]["success"], true);
		assert_eq!(body["results"][0]["status"], "PUBLISHED");
		assert_eq!(body["results"][1]["success"], false);
		assert!(body["results"][1]["error"].is_string());
		assert_eq!(body["results"][2]["postId"], json!(missing));
	}

	#[sqlx::test]
	async fn test_admin_create_publishes_immediately(pool: Database) {
		let app = app(pool.clone());

		register(&app, "admin").await;
		promote(&pool, "admin").await;

		let response = app
			.post("/api/admin/blog/posts")
			.json(&json!({
				"title": "Market prices this week",
				"content": "Tray of eggs at KES 420.",
				"category": "MARKET_TRENDS",
				"publishImmediately": true,
				"featured": true,
			}))
			.await;
		let body = response.json::<serde_json::Value>();

		assert_eq!(response.status_code(), 200);
		assert_eq!(body["status"], "PUBLISHED");
		assert_eq!(body["featured"], true);
		assert!(body["approvedBy"].is_string());
	}
}
