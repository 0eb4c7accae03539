use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::route::auth::model::Role;

pub use crate::route::model::{Page, Paginate};

/// Who an email is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema, sqlx::Type)]
#[sqlx(type_name = "email_audience", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Audience {
	/// Every user.
	All,
	/// Every user with the given role.
	Role,
	/// The given users.
	Individual,
}

/// A recorded email dispatch.
#[derive(Debug, Serialize, JsonSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EmailCampaign {
	pub id: Uuid,
	pub sender_id: Option<Uuid>,
	pub audience: Audience,
	pub role: Option<Role>,
	pub subject: String,
	pub body: String,
	pub recipient_count: i32,
	/// Recipients the mail could not be sent to.
	pub failed_count: i32,
	pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailInput {
	pub audience: Audience,
	/// Required when the audience is `ROLE`.
	pub role: Option<Role>,
	/// Required when the audience is `INDIVIDUAL`.
	#[serde(default)]
	#[validate(length(max = 1000))]
	pub user_ids: Vec<Uuid>,
	/// `{{username}}` is replaced with each recipient's username.
	#[validate(length(min = 1, max = 200))]
	pub subject: String,
	/// `{{username}}` is replaced with each recipient's username.
	#[validate(length(min = 1, max = 20_000))]
	pub body: String,
}

#[derive(Debug, sqlx::FromRow)]
pub struct Recipient {
	pub email: String,
	pub username: String,
}
