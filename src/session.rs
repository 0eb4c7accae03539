use cookie::{time::Duration, SameSite};
use uuid::Uuid;

pub const COOKIE_NAME: &str = "session";

/// How long a browser keeps the session cookie.
const MAX_AGE: Duration = Duration::days(30);

/// Creates the session cookie handed out after logging in or registering.
pub fn create_cookie(session_id: Uuid) -> cookie::Cookie<'static> {
	cookie::Cookie::build((COOKIE_NAME, session_id.to_string()))
		.secure(!cfg!(debug_assertions))
		.http_only(true)
		.same_site(SameSite::Lax)
		.path("/")
		.max_age(MAX_AGE)
		.into()
}

/// Creates an empty session cookie used to invalidate a previous one
pub fn clear_cookie() -> cookie::Cookie<'static> {
	cookie::Cookie::build(COOKIE_NAME)
		.http_only(true)
		.path("/")
		.max_age(Duration::ZERO)
		.into()
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_cookie_carries_session_id() {
		let id = Uuid::new_v4();
		let cookie = create_cookie(id);

		assert_eq!(cookie.name(), COOKIE_NAME);
		assert_eq!(cookie.value(), id.to_string());
		assert_eq!(cookie.http_only(), Some(true));
		assert_eq!(cookie.max_age(), Some(MAX_AGE));
	}

	#[test]
	fn test_clear_cookie_expires_immediately() {
		assert_eq!(clear_cookie().max_age(), Some(Duration::ZERO));
	}
}
