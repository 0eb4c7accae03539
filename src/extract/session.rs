use aide::OperationInput;
use axum::{
	extract::{FromRef, FromRequestParts},
	http::{header, request},
};
use uuid::Uuid;

use crate::{
	error::RouteError,
	openapi::SECURITY_SCHEME_SESSION,
	route::auth::{self, model::Role},
	session, Database,
};

/// Extracts the session and related user from the request.
///
/// This is the request-scoped auth context: it is resolved once per request
/// and handed to every handler that needs the current user.
///
/// If the cookie does not exist, a [`auth::Error::NoSessionCookie`] is returned.
/// If the session is invalid, a [`auth::Error::InvalidSessionCookie`] is returned.
///
/// ```rust
/// async fn route(session: Session) {
///   println!("{:?}", session.user);
/// }
/// ```
#[derive(Debug)]
pub struct Session {
	pub id: Uuid,
	pub user: auth::model::User,
}

impl Session {
	pub fn is_admin(&self) -> bool {
		self.user.role == Role::Admin
	}
}

/// Reads the session id out of the `Cookie` headers, if present.
fn session_cookie(parts: &request::Parts) -> Option<Result<Uuid, auth::Error>> {
	let cookies = parts
		.headers
		.get_all(header::COOKIE)
		.into_iter()
		.filter_map(|value| value.to_str().ok());

	let cookie = cookies
		.flat_map(cookie::Cookie::split_parse)
		.filter_map(Result::ok)
		.find(|cookie| cookie.name() == session::COOKIE_NAME)?;

	Some(Uuid::parse_str(cookie.value()).map_err(|_| auth::Error::InvalidSessionCookie))
}

async fn load_user(
	database: &Database,
	session_id: Uuid,
) -> Result<Option<auth::model::User>, sqlx::Error> {
	sqlx::query_as::<_, auth::model::User>(
		r#"
			SELECT * FROM "user" WHERE id = (
				SELECT user_id FROM session WHERE id = $1
			)
		"#,
	)
	.bind(session_id)
	.fetch_optional(database)
	.await
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Session
where
	Database: FromRef<S>,
	S: Sync + Send,
{
	type Rejection = RouteError<auth::Error>;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		let session_id = session_cookie(parts).ok_or(auth::Error::NoSessionCookie)??;

		let database = Database::from_ref(state);
		let user = load_user(&database, session_id)
			.await?
			.ok_or(auth::Error::InvalidSessionCookie)?;

		Ok(Session {
			id: session_id,
			user,
		})
	}
}

impl OperationInput for Session {
	/// Adds a session cookie requirement to the `OpenAPI` operation.
	fn operation_input(_ctx: &mut aide::gen::GenContext, operation: &mut aide::openapi::Operation) {
		operation.security.push(
			[(SECURITY_SCHEME_SESSION.to_string(), Vec::new())]
				.into_iter()
				.collect(),
		);
	}
}

/// A session whose user has the [`Role::Admin`] role.
///
/// Non-admin users are rejected with [`auth::Error::Forbidden`].
#[derive(Debug)]
pub struct AdminSession(pub Session);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminSession
where
	Database: FromRef<S>,
	S: Sync + Send,
{
	type Rejection = RouteError<auth::Error>;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		let session = Session::from_request_parts(parts, state).await?;

		if !session.is_admin() {
			return Err(auth::Error::Forbidden.into());
		}

		Ok(Self(session))
	}
}

impl OperationInput for AdminSession {
	fn operation_input(ctx: &mut aide::gen::GenContext, operation: &mut aide::openapi::Operation) {
		Session::operation_input(ctx, operation);
	}
}

/// A session that may be absent, for public endpoints that behave
/// differently for signed-in users.
///
/// Missing or stale cookies resolve to `None` rather than an error.
#[derive(Debug)]
pub struct OptionalSession(pub Option<Session>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for OptionalSession
where
	Database: FromRef<S>,
	S: Sync + Send,
{
	type Rejection = RouteError<auth::Error>;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		let Some(Ok(session_id)) = session_cookie(parts) else {
			return Ok(Self(None));
		};

		let database = Database::from_ref(state);
		let user = load_user(&database, session_id).await?;

		Ok(Self(user.map(|user| Session {
			id: session_id,
			user,
		})))
	}
}

impl OperationInput for OptionalSession {}
