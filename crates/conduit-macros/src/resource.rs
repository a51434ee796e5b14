//! `#[resource]`: binds a method into a `conduit_server::registry::resource`
//! descriptor + handler pair. Resources take no caller-supplied arguments
//! beyond the URI itself (spec's data model), so the method may only take
//! `&self` and, optionally, a `HandlerContext`.

use crate::attrs::ResourceAttrs;
use crate::signature;
use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{parse_macro_input, ImplItemFn};

pub fn generate_resource_impl(args: TokenStream, input: TokenStream) -> TokenStream {
    let method = parse_macro_input!(input as ImplItemFn);
    let attrs = match syn::parse::<ResourceAttrs>(args) {
        Ok(attrs) => attrs,
        Err(err) => return err.to_compile_error().into(),
    };
    expand_resource(&attrs, method).unwrap_or_else(|err| err.to_compile_error()).into()
}

pub fn expand_resource(attrs: &ResourceAttrs, method: ImplItemFn) -> syn::Result<proc_macro2::TokenStream> {
    let fn_name = &method.sig.ident;
    let uri = &attrs.uri;

    let info = signature::analyze(&method.sig)?;
    if !info.args.is_empty() {
        return Err(syn::Error::new_spanned(
            &method.sig,
            "#[resource] handlers take no arguments beyond an optional HandlerContext; use a path in the URI instead",
        ));
    }

    let mime_type = match &attrs.mime_type {
        Some(m) => quote! { Some(#m.to_string()) },
        None => quote! { None },
    };

    let ctx_arg = match &info.context_binding {
        Some(ident) => quote! { #ident },
        None => quote! {},
    };

    let descriptor_fn = syn::Ident::new(&format!("__conduit_resource_{fn_name}_descriptor"), Span::call_site());
    let handler_fn = syn::Ident::new(&format!("__conduit_resource_{fn_name}_handler"), Span::call_site());

    Ok(quote! {
        #method

        #[doc(hidden)]
        #[allow(non_snake_case)]
        fn #descriptor_fn() -> conduit_protocol::ResourceDescriptor {
            conduit_protocol::ResourceDescriptor {
                uri: #uri.to_string(),
                name: stringify!(#fn_name).to_string(),
                description: None,
                mime_type: #mime_type,
            }
        }

        #[doc(hidden)]
        #[allow(non_snake_case)]
        fn #handler_fn(self: &::std::sync::Arc<Self>) -> conduit_server::registry::resource::ResourceHandlerFn {
            let this = ::std::sync::Arc::clone(self);
            ::std::sync::Arc::new(move |ctx: conduit_server::HandlerContext| {
                let this = ::std::sync::Arc::clone(&this);
                Box::pin(async move {
                    let result = this.#fn_name(#ctx_arg).await
                        .map_err(conduit_server::ServerError::Handler)?;
                    Ok(conduit_protocol::resources::ReadResourceResult {
                        contents: vec![conduit_protocol::Content::text(result)],
                    })
                })
            })
        }
    })
}
