use std::sync::Arc;

use axum::extract::State;
use macros::route;

use crate::{
	extract::{AdminSession, Json, Query},
	mail::{Mail, Mailer},
	openapi::tag,
	Database,
};

use super::{model, Error, RouteError};

async fn recipients(
	database: &Database,
	input: &model::SendEmailInput,
) -> Result<Vec<model::Recipient>, RouteError> {
	let recipients = match input.audience {
		model::Audience::All => {
			sqlx::query_as::<_, model::Recipient>(r#"SELECT email, username FROM "user""#)
				.fetch_all(database)
				.await?
		}
		model::Audience::Role => {
			let role = input.role.ok_or(Error::MissingRole)?;

			sqlx::query_as::<_, model::Recipient>(
				r#"SELECT email, username FROM "user" WHERE role = $1"#,
			)
			.bind(role)
			.fetch_all(database)
			.await?
		}
		model::Audience::Individual => {
			if input.user_ids.is_empty() {
				return Err(Error::MissingRecipients.into());
			}

			sqlx::query_as::<_, model::Recipient>(
				r#"SELECT email, username FROM "user" WHERE id = ANY($1)"#,
			)
			.bind(&input.user_ids)
			.fetch_all(database)
			.await?
		}
	};

	if recipients.is_empty() {
		return Err(Error::NoRecipients.into());
	}

	Ok(recipients)
}

/// Send email
/// Sends an email to every user, every user with a role, or a list of users.
/// Delivery is attempted for each recipient; failures are counted rather than
/// aborting the dispatch.
#[route(tag = tag::EMAIL)]
pub async fn send_email(
	State(database): State<Database>,
	State(mailer): State<Arc<dyn Mailer>>,
	AdminSession(session): AdminSession,
	Json(input): Json<model::SendEmailInput>,
) -> Result<Json<model::EmailCampaign>, RouteError> {
	let recipients = recipients(&database, &input).await?;
	let mut failed: i32 = 0;

	for recipient in &recipients {
		let mail = Mail::personalized(
			&recipient.email,
			&recipient.username,
			&input.subject,
			&input.body,
		);

		if let Err(error) = mailer.send(&mail).await {
			tracing::warn!(%error, recipient = %recipient.username, "failed to send email");

			failed += 1;
		}
	}

	let campaign = sqlx::query_as::<_, model::EmailCampaign>(
		r#"
			INSERT INTO email_campaign (
				sender_id, audience, role, subject, body, recipient_count, failed_count
			)
			VALUES ($1, $2, $3, $4, $5, $6, $7)
			RETURNING *
		"#,
	)
	.bind(session.user.id)
	.bind(input.audience)
	.bind(input.role.filter(|_| input.audience == model::Audience::Role))
	.bind(&input.subject)
	.bind(&input.body)
	.bind(i32::try_from(recipients.len()).unwrap_or(i32::MAX))
	.bind(failed)
	.fetch_one(&database)
	.await?;

	tracing::info!(
		campaign = %campaign.id,
		admin = %session.user.id,
		recipients = campaign.recipient_count,
		failed,
		"email campaign sent"
	);

	Ok(Json(campaign))
}

/// List emails
/// Returns the email campaigns that were sent, newest first.
#[route(tag = tag::EMAIL)]
pub async fn get_emails(
	State(database): State<Database>,
	_admin: AdminSession,
	Query(paginate): Query<model::Paginate>,
) -> Result<Json<model::Page<model::EmailCampaign>>, RouteError> {
	let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM email_campaign")
		.fetch_one(&database)
		.await?;

	let items = sqlx::query_as::<_, model::EmailCampaign>(
		"SELECT * FROM email_campaign ORDER BY created_at DESC LIMIT $1 OFFSET $2",
	)
	.bind(paginate.limit())
	.bind(paginate.offset())
	.fetch_all(&database)
	.await?;

	Ok(Json(model::Page {
		items,
		pagination: paginate.pagination(total),
	}))
}
