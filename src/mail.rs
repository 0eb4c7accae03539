//! Outgoing email.

/// Placeholder replaced with the recipient's username.
pub const USERNAME_PLACEHOLDER: &str = "{{username}}";

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("mail transport failed: {0}")]
	Transport(String),
	#[error("invalid recipient address {0:?}")]
	InvalidAddress(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
	pub to: String,
	pub subject: String,
	pub body: String,
}

impl Mail {
	/// Builds the mail for one recipient, filling in their username.
	pub fn personalized(to: &str, username: &str, subject: &str, body: &str) -> Self {
		Self {
			to: to.to_owned(),
			subject: subject.replace(USERNAME_PLACEHOLDER, username),
			body: body.replace(USERNAME_PLACEHOLDER, username),
		}
	}
}

#[axum::async_trait]
pub trait Mailer: Send + Sync {
	async fn send(&self, mail: &Mail) -> Result<(), Error>;
}

/// Writes every mail to the log instead of delivering it.
pub struct LogMailer {
	from: String,
}

impl LogMailer {
	pub fn new(from: impl Into<String>) -> Self {
		Self { from: from.into() }
	}
}

#[axum::async_trait]
impl Mailer for LogMailer {
	async fn send(&self, mail: &Mail) -> Result<(), Error> {
		if !mail.to.contains('@') {
			return Err(Error::InvalidAddress(mail.to.clone()));
		}

		tracing::info!(from = %self.from, to = %mail.to, subject = %mail.subject, "mail sent");

		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_personalized() {
		let mail = Mail::personalized(
			"wanjiru@example.com",
			"wanjiru",
			"Hello {{username}}",
			"Dear {{username}}, your flock report is ready.",
		);

		assert_eq!(mail.subject, "Hello wanjiru");
		assert_eq!(mail.body, "Dear wanjiru, your flock report is ready.");
	}

	#[tokio::test]
	async fn test_log_mailer_rejects_bad_address() {
		let mailer = LogMailer::new("no-reply@localhost");
		let mail = Mail::personalized("not-an-address", "x", "s", "b");

		assert!(matches!(
			mailer.send(&mail).await,
			Err(Error::InvalidAddress(..))
		));
	}
}
