use aide::{
	openapi::{ApiKeyLocation, SecurityScheme, Tag},
	transform::TransformOpenApi,
};

use crate::{error, extract::Json, session};

pub const SECURITY_SCHEME_SESSION: &str = "Session";

pub mod tag {
	pub const AUTH: &str = "Auth";
	pub const POST: &str = "Post";
	pub const MODERATION: &str = "Moderation";
	pub const COMMENT: &str = "Comment";
	pub const DELIVERY: &str = "Delivery";
	pub const WALLET: &str = "Wallet";
	pub const PAYMENT: &str = "Payment";
	pub const EMAIL: &str = "Email";
	pub const CHAT: &str = "Chat";
}

fn tag(name: &str, description: &str) -> Tag {
	Tag {
		name: name.into(),
		description: Some(description.into()),
		..Default::default()
	}
}

pub fn docs(api: TransformOpenApi) -> TransformOpenApi {
	api.title("Coop Market API")
		.summary("Blog moderation, author wallets and delivery configuration")
		.description(include_str!("../README.md"))
		.tag(tag(tag::AUTH, "User authentication"))
		.tag(tag(tag::POST, "Blog posts and their lifecycle"))
		.tag(tag(tag::MODERATION, "Admin review queue and bulk actions"))
		.tag(tag(tag::COMMENT, "Blog comments and their moderation"))
		.tag(tag(tag::DELIVERY, "Delivery fees and vouchers"))
		.tag(tag(tag::WALLET, "Author wallets and withdrawals"))
		.tag(tag(tag::PAYMENT, "Reader support and payment provider callbacks"))
		.tag(tag(tag::EMAIL, "Admin email dispatch"))
		.tag(tag(tag::CHAT, "Direct messages between users"))
		.security_scheme(
			SECURITY_SCHEME_SESSION,
			SecurityScheme::ApiKey {
				location: ApiKeyLocation::Cookie,
				name: session::COOKIE_NAME.into(),
				description: Some("A user session cookie".into()),
				extensions: Default::default(),
			},
		)
		.default_response_with::<Json<error::ErrorResponse>, _>(|res| {
			res.example(error::ErrorResponse {
				success: false,
				errors: error::Message::new("invalid_transition")
					.field("status")
					.detail("from", "PUBLISHED")
					.into_vec(),
			})
		})
}
