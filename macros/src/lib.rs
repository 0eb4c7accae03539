mod model;
mod route;

use proc_macro::TokenStream;

/// Creates a new documentation function for the route, named after the original function with the suffix `_docs`.
///
/// The first line of the doc comment becomes the `OpenAPI` summary, the remaining
/// lines become the description.
#[proc_macro_attribute]
pub fn route(args: TokenStream, input: TokenStream) -> TokenStream {
	route::from_input(args, input)
}

/// Creates two new structs: `CreateXInput` and `UpdateXInput` for the model.
///
/// For both models, fields with `#[serde(skip_deserializing)]` are skipped, and all
/// other fields are included verbatim (including attributes). Fields of the update
/// input are wrapped in an `Option` so that partial updates can be expressed.
///
/// Row mapping (`sqlx::FromRow` and `#[sqlx(..)]` attributes) only applies to the
/// model itself and is not forwarded.
#[proc_macro_attribute]
pub fn model(_args: TokenStream, input: TokenStream) -> TokenStream {
	model::from_input(input)
}
