use darling::{ast, FromDeriveInput, FromField};
use proc_macro2::TokenTree;
use quote::{format_ident, quote, ToTokens};
use syn::{punctuated::Punctuated, Meta, Token};

#[derive(Debug, FromDeriveInput)]
#[darling(supports(struct_named), forward_attrs)]
struct ModelInputReceiver {
	ident: syn::Ident,

	generics: syn::Generics,

	data: ast::Data<(), ModelFieldReceiver>,

	attrs: Vec<syn::Attribute>,
}

#[derive(Debug, FromField)]
#[darling(forward_attrs)]
struct ModelFieldReceiver {
	ident: Option<syn::Ident>,

	ty: syn::Type,
	vis: syn::Visibility,

	attrs: Vec<syn::Attribute>,
}

/// Returns `true` if the attribute is `#[serde(..)]` containing one of `flags`.
fn has_serde_flag(attr: &syn::Attribute, flags: &[&str]) -> bool {
	let Meta::List(ref list) = attr.meta else {
		return false;
	};

	if !list.path.is_ident("serde") {
		return false;
	}

	list.tokens.to_token_stream().into_iter().any(
		|token| matches!(token, TokenTree::Ident(ref ident) if flags.iter().any(|flag| ident == flag)),
	)
}

/// Returns `true` if the type is spelled `Option<..>`.
fn is_option(ty: &syn::Type) -> bool {
	let syn::Type::Path(path) = ty else {
		return false;
	};

	path.qself.is_none()
		&& path
			.path
			.segments
			.last()
			.is_some_and(|segment| segment.ident == "Option")
}

/// Rewrites a struct-level attribute for the generated inputs.
///
/// `#[derive(..)]` lists lose `FromRow`, `#[sqlx(..)]` attributes are dropped
/// entirely, and everything else is forwarded as-is.
fn forward_struct_attr(attr: &syn::Attribute) -> Option<proc_macro2::TokenStream> {
	if attr.path().is_ident("sqlx") {
		return None;
	}

	if !attr.path().is_ident("derive") {
		return Some(attr.to_token_stream());
	}

	let Ok(paths) = attr.parse_args_with(Punctuated::<syn::Path, Token![,]>::parse_terminated)
	else {
		return Some(attr.to_token_stream());
	};

	let paths = paths
		.into_iter()
		.filter(|path| {
			path.segments
				.last()
				.map_or(true, |segment| segment.ident != "FromRow")
		})
		.collect::<Vec<_>>();

	Some(quote! { #[derive(#(#paths),*)] })
}

pub fn from_input(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
	let input = syn::parse_macro_input!(input as syn::DeriveInput);
	let receiver = match ModelInputReceiver::from_derive_input(&input) {
		Ok(x) => x,
		Err(e) => return e.write_errors().into(),
	};

	let ident = &receiver.ident;
	let vis = &input.vis;
	let generics = &receiver.generics;
	let create_ident = format_ident!("Create{}Input", ident);
	let update_ident = format_ident!("Update{}Input", ident);

	let attrs = receiver
		.attrs
		.iter()
		.filter_map(forward_struct_attr)
		.collect::<Vec<_>>();

	let Some(fields) = receiver.data.take_struct() else {
		return syn::Error::new_spanned(ident, "#[model] only supports structs with named fields")
			.into_compile_error()
			.into();
	};

	let fields = fields
		.iter()
		.filter_map(|field| {
			let ident = field.ident.as_ref()?;

			// Fields the client cannot provide are not part of either input
			if field
				.attrs
				.iter()
				.any(|attr| has_serde_flag(attr, &["skip_deserializing", "skip"]))
			{
				return None;
			}

			let attrs = field
				.attrs
				.iter()
				.filter(|attr| !attr.path().is_ident("sqlx"))
				.collect::<Vec<_>>();

			let has_default = field
				.attrs
				.iter()
				.any(|attr| has_serde_flag(attr, &["default"]));

			Some((attrs, ident, &field.ty, &field.vis, has_default))
		})
		.collect::<Vec<_>>();

	let create_fields = fields.iter().map(|(attrs, ident, ty, vis, _)| {
		quote! {
			#(#attrs)*
			#vis #ident: #ty,
		}
	});

	// Nullable fields become `Option<Option<_>>`, where `Some(None)` clears the value
	let update_fields = fields.iter().map(|(attrs, ident, ty, vis, has_default)| {
		let nullable = if !is_option(ty) {
			None
		} else if *has_default {
			Some(quote! { #[serde(deserialize_with = "crate::route::model::double_option")] })
		} else {
			Some(quote! {
				#[serde(default, deserialize_with = "crate::route::model::double_option")]
			})
		};

		quote! {
			#(#attrs)*
			#nullable
			#vis #ident: Option<#ty>,
		}
	});

	quote! {
		#input

		#(#attrs)*
		#vis struct #create_ident #generics {
			#(
				#create_fields
			)*
		}

		#(#attrs)*
		#vis struct #update_ident #generics {
			#(
				#update_fields
			)*
		}
	}
	.into()
}
