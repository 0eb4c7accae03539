use aide::axum::ApiRouter;

use crate::AppState;

pub mod auth;
pub mod chat;
pub mod comment;
pub mod delivery;
pub mod docs;
pub mod email;
pub mod model;
pub mod moderation;
pub mod post;
pub mod wallet;

/// Every route under `/api`, except the ones in [`strict_routes`].
pub fn routes() -> ApiRouter<AppState> {
	ApiRouter::new()
		.merge(auth::routes())
		.nest("/blog/posts", post::routes())
		.merge(moderation::routes())
		.merge(comment::routes())
		.merge(delivery::routes())
		.merge(wallet::routes())
		.nest("/admin/emails", email::routes())
		.nest("/chat", chat::routes())
}

/// Logging in, registering and moving money.
pub fn strict_routes() -> ApiRouter<AppState> {
	ApiRouter::new()
		.merge(auth::credential_routes())
		.merge(wallet::payout_routes())
}
