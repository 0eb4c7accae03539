use aide::axum::{
	routing::{get_with, post_with},
	ApiRouter,
};
use axum::http::StatusCode;

use crate::{error, AppState};

pub mod model;
pub mod route;

/// An error that can occur during authentication.
///
/// Note that the messages are presented to the client, so they should not contain
/// sensitive information.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("invalid email or password")]
	InvalidEmailOrPassword,
	#[error("password hashing error")]
	Argon(#[from] argon2::Error),
	#[error("no session cookie")]
	NoSessionCookie,
	#[error("invalid session cookie")]
	InvalidSessionCookie,
	#[error("admin role required")]
	Forbidden,
	#[error("username already taken")]
	UsernameTaken,
	#[error("email already taken")]
	EmailTaken,
}

pub type RouteError = error::RouteError<Error>;

/// Routes that check credentials, which get a stricter rate limit.
pub fn credential_routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route("/auth/login", post_with(login, login_docs))
		.api_route("/auth/register", post_with(register, register_docs))
}

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route("/auth/logout", get_with(logout, logout_docs))
		.api_route("/auth/me", get_with(get_me, get_me_docs))
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::InvalidEmailOrPassword | Self::NoSessionCookie | Self::InvalidSessionCookie => {
				StatusCode::UNAUTHORIZED
			}
			Self::Forbidden => StatusCode::FORBIDDEN,
			Self::Argon(..) => StatusCode::INTERNAL_SERVER_ERROR,
			Self::UsernameTaken | Self::EmailTaken => StatusCode::CONFLICT,
		}
	}

	fn into_errors(self) -> Vec<error::Message<'static>> {
		let field = match self {
			Self::UsernameTaken => Some("username"),
			Self::EmailTaken => Some("email"),
			_ => None,
		};

		let message = error::Message::new(self.to_string());

		match field {
			Some(field) => message.field(field).into_vec(),
			None => message.into_vec(),
		}
	}
}

#[cfg(all(test, feature = "database-tests"))]
mod test {
	use crate::test::*;

	#[sqlx::test]
	async fn test_signup_flow(pool: Database) {
		let app = app(pool);

		let response = app
			.post("/api/auth/register")
			.json(&json!({
				"email": "john@smith.com",
				"username": "john",
				"password": "hunter2hunter",
			}))
			.await;

		assert_eq!(response.status_code(), 200);
		assert!(response
			.header("set-cookie")
			.to_str()
			.unwrap()
			.contains("session="));

		let response = app
			.post("/api/auth/login")
			.json(&json!({
				"email": "john@smith.com",
				"password": "hunter2hunter",
			}))
			.await;

		assert_eq!(response.status_code(), 200);

		let response = app.get("/api/auth/me").await;

		assert_eq!(response.status_code(), 200);
		assert_eq!(response.json::<serde_json::Value>()["username"], "john");
		assert_eq!(response.json::<serde_json::Value>()["role"], "USER");
	}

	#[sqlx::test]
	async fn test_duplicate_username(pool: Database) {
		let app = app(pool);

		register(&app, "mary").await;

		let response = app
			.post("/api/auth/register")
			.json(&json!({
				"email": "other@example.com",
				"username": "mary",
				"password": "hunter2hunter",
			}))
			.await;

		assert_eq!(response.status_code(), 409);
	}

	#[sqlx::test]
	async fn test_wrong_password(pool: Database) {
		let app = app(pool);

		register(&app, "peter").await;
		app.get("/api/auth/logout").await;

		let response = app
			.post("/api/auth/login")
			.json(&json!({
				"email": "peter@example.com",
				"password": "not-the-password",
			}))
			.await;

		assert_eq!(response.status_code(), 401);

		let response = app.get("/api/auth/me").await;

		assert_eq!(response.status_code(), 401);
	}
}
