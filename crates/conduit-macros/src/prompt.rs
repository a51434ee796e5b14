//! `#[prompt]`: binds a method into a `conduit_server::registry::prompt`
//! descriptor + handler pair. Prompt arguments are always strings (spec's
//! data model), so unlike `#[tool]` there is no JSON Schema to derive — the
//! descriptor just lists each non-context parameter name as a
//! `PromptArgument`, all required.

use crate::attrs::PromptAttrs;
use crate::signature;
use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{parse_macro_input, ImplItemFn};

pub fn generate_prompt_impl(args: TokenStream, input: TokenStream) -> TokenStream {
    let method = parse_macro_input!(input as ImplItemFn);
    let attrs = match syn::parse::<PromptAttrs>(args) {
        Ok(attrs) => attrs,
        Err(err) => return err.to_compile_error().into(),
    };
    expand_prompt(&attrs, method).unwrap_or_else(|err| err.to_compile_error()).into()
}

pub fn expand_prompt(attrs: &PromptAttrs, method: ImplItemFn) -> syn::Result<proc_macro2::TokenStream> {
    let fn_name = &method.sig.ident;
    let prompt_name = fn_name.to_string();
    let description = &attrs.description;

    let info = signature::analyze(&method.sig)?;
    let arg_names: Vec<String> = info.args.iter().map(|a| a.ident.to_string()).collect();
    let call_idents: Vec<_> = info.args.iter().map(|a| &a.ident).collect();
    let call_types: Vec<_> = info.args.iter().map(|a| &a.ty).collect();

    let ctx_arg = match &info.context_binding {
        Some(ident) => quote! { #ident, },
        None => quote! {},
    };

    let descriptor_fn = syn::Ident::new(&format!("__conduit_prompt_{fn_name}_descriptor"), Span::call_site());
    let handler_fn = syn::Ident::new(&format!("__conduit_prompt_{fn_name}_handler"), Span::call_site());

    let lookups = arg_names.iter().zip(call_idents.iter()).zip(call_types.iter()).map(|((name, ident), ty)| {
        quote! {
            let #ident: #ty = args.get(#name)
                .ok_or_else(|| conduit_server::ServerError::Handler(
                    conduit_core::Error::invalid_params(format!("missing prompt argument '{}'", #name))
                ))?
                .parse()
                .map_err(|_| conduit_server::ServerError::Handler(
                    conduit_core::Error::invalid_params(format!("prompt argument '{}' has the wrong type", #name))
                ))?;
        }
    });

    Ok(quote! {
        #method

        #[doc(hidden)]
        #[allow(non_snake_case)]
        fn #descriptor_fn() -> conduit_protocol::PromptDescriptor {
            conduit_protocol::PromptDescriptor {
                name: #prompt_name.to_string(),
                description: Some(#description.to_string()),
                arguments: vec![
                    #( conduit_protocol::PromptArgument {
                        name: #arg_names.to_string(),
                        description: None,
                        required: true,
                    } ),*
                ],
            }
        }

        #[doc(hidden)]
        #[allow(non_snake_case)]
        fn #handler_fn(self: &::std::sync::Arc<Self>) -> conduit_server::registry::prompt::PromptHandlerFn {
            let this = ::std::sync::Arc::clone(self);
            ::std::sync::Arc::new(move |args: ::std::collections::BTreeMap<String, String>, ctx: conduit_server::HandlerContext| {
                let this = ::std::sync::Arc::clone(&this);
                Box::pin(async move {
                    #( #lookups )*
                    let result = this.#fn_name(#ctx_arg #( #call_idents ),*).await
                        .map_err(conduit_server::ServerError::Handler)?;
                    Ok(conduit_protocol::prompts::GetPromptResult {
                        description: Some(#description.to_string()),
                        messages: vec![conduit_protocol::prompts::PromptMessage {
                            role: conduit_protocol::prompts::PromptRole::User,
                            content: conduit_protocol::Content::text(result),
                        }],
                    })
                })
            })
        }
    })
}
