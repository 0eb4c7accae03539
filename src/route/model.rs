use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Tells a missing field (`None`) apart from an explicit `null` (`Some(None)`).
///
/// Pair with `#[serde(default)]` so that missing fields still deserialize.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
	T: Deserialize<'de>,
	D: Deserializer<'de>,
{
	Option::<T>::deserialize(deserializer).map(Some)
}

/// These can be removed when [`serde`] supports
/// literal defaults: <https://github.com/serde-rs/serde/issues/368>
#[inline]
fn one() -> i64 {
	1
}

#[inline]
fn twelve() -> i64 {
	12
}

#[derive(Debug, Clone, Copy, Deserialize, Validate, JsonSchema)]
pub struct Paginate {
	/// The page number to return (1-indexed).
	#[validate(range(min = 1, max = 10_000))]
	#[serde(default = "one")]
	pub page: i64,
	/// The number of items to return per page.
	#[validate(range(min = 1, max = 100))]
	#[serde(default = "twelve", alias = "size")]
	pub limit: i64,
}

impl Default for Paginate {
	fn default() -> Self {
		Self {
			page: one(),
			limit: twelve(),
		}
	}
}

impl Paginate {
	/// Builds a [`Paginate`] out of optional query parameters, for filter
	/// structs that cannot flatten this one into a query string.
	pub fn from_query(page: Option<i64>, limit: Option<i64>) -> Self {
		let default = Self::default();

		Self {
			page: page.unwrap_or(default.page),
			limit: limit.unwrap_or(default.limit),
		}
	}

	pub fn offset(&self) -> i64 {
		(self.page - 1) * self.limit
	}

	pub fn limit(&self) -> i64 {
		self.limit
	}

	/// Describes the page this request selects out of `total` items.
	pub fn pagination(&self, total: i64) -> Pagination {
		Pagination {
			page: self.page,
			limit: self.limit,
			total,
			total_pages: (total + self.limit - 1) / self.limit,
		}
	}
}

/// Pagination metadata returned alongside a page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
	pub page: i64,
	pub limit: i64,
	/// The number of items across all pages.
	pub total: i64,
	pub total_pages: i64,
}

/// A page of results.
#[derive(Debug, Serialize, JsonSchema)]
pub struct Page<T> {
	pub items: Vec<T>,
	pub pagination: Pagination,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct IdInput {
	pub id: Uuid,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct SlugInput {
	#[validate(length(min = 1, max = 255))]
	pub slug: String,
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_paginate_offset() {
		let mut paginate = Paginate { page: 1, limit: 10 };

		assert_eq!(paginate.offset(), 0);

		paginate.page = 2;

		assert_eq!(paginate.offset(), 10);

		paginate.limit = 5;

		assert_eq!(paginate.offset(), 5);

		paginate.page = 3;

		assert_eq!(paginate.offset(), 10);
	}

	#[test]
	fn test_paginate_defaults() {
		let paginate: Paginate = serde_json::from_value(serde_json::json!({})).unwrap();

		assert_eq!(paginate.page, 1);
		assert_eq!(paginate.limit(), 12);
	}

	#[test]
	fn test_total_pages_rounds_up() {
		let paginate = Paginate { page: 3, limit: 12 };
		let pagination = paginate.pagination(25);

		assert_eq!(pagination.total_pages, 3);
		// the last page holds the single remaining item
		assert_eq!(25 - paginate.offset(), 1);
	}

	#[test]
	fn test_total_pages_of_empty_list() {
		assert_eq!(Paginate::default().pagination(0).total_pages, 0);
	}

	#[test]
	fn test_limit_out_of_range() {
		assert!(Paginate { page: 1, limit: 0 }.validate().is_err());
		assert!(Paginate { page: 1, limit: 101 }.validate().is_err());
		assert!(Paginate { page: 0, limit: 10 }.validate().is_err());
	}
}
