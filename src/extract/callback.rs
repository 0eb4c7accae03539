use std::sync::Arc;

use aide::OperationInput;
use axum::{
	extract::{FromRef, FromRequestParts},
	http::request,
};
use subtle::ConstantTimeEq;

use crate::route::wallet;

pub const HEADER_NAME: &str = "x-callback-secret";

/// The secret the payment provider must send with its callbacks.
///
/// Callbacks are rejected while no secret is configured.
#[derive(Clone, Default)]
pub struct CallbackSecret(pub Option<Arc<str>>);

impl CallbackSecret {
	pub fn new(secret: Option<String>) -> Self {
		Self(secret.map(Arc::from))
	}

	fn verify(&self, given: &[u8]) -> bool {
		match &self.0 {
			Some(secret) => bool::from(secret.as_bytes().ct_eq(given)),
			None => false,
		}
	}
}

impl std::fmt::Debug for CallbackSecret {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("CallbackSecret")
			.field(&self.0.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

/// Proof that the request carries the configured [`CallbackSecret`]
/// in its `X-Callback-Secret` header.
#[derive(Debug)]
pub struct CallbackSignature;

#[axum::async_trait]
impl<S> FromRequestParts<S> for CallbackSignature
where
	CallbackSecret: FromRef<S>,
	S: Sync + Send,
{
	type Rejection = wallet::RouteError;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		let given = parts
			.headers
			.get(HEADER_NAME)
			.map(|value| value.as_bytes())
			.unwrap_or_default();

		if CallbackSecret::from_ref(state).verify(given) {
			Ok(Self)
		} else {
			Err(wallet::Error::InvalidSignature.into())
		}
	}
}

impl OperationInput for CallbackSignature {}
