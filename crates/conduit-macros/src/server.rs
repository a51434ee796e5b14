//! `#[server]`: applied to an `impl Block` rather than a single method. Scans
//! the block for `#[tool]`/`#[prompt]`/`#[resource]`-tagged methods, expands
//! each exactly as the standalone attribute would (this crate's three
//! attributes are never separately invoked by the compiler on methods
//! nested inside a `#[server]` impl — `#[server]` consumes the whole impl's
//! token stream before the compiler would dispatch to them), and appends one
//! `into_router` method that registers every tagged handler and returns a
//! ready [`conduit_server::Router`].
//!
//! Grounded on the donor's `server.rs::generate_server_impl`, which takes
//! the same "parse the whole impl, find tagged methods, emit a
//! server-assembly method" approach rather than relying on macro expansion
//! order across sibling attributes.

use crate::attrs::{PromptAttrs, ResourceAttrs, ServerAttrs, ToolAttrs};
use crate::{prompt, resource, tool};
use proc_macro::TokenStream;
use quote::quote;
use syn::{ImplItem, ItemImpl};

pub fn generate_server_impl(args: TokenStream, mut item_impl: ItemImpl) -> TokenStream {
    let attrs = match syn::parse::<ServerAttrs>(args) {
        Ok(attrs) => attrs,
        Err(err) => return err.to_compile_error().into(),
    };

    let self_ty = item_impl.self_ty.clone();

    let mut tool_idents = Vec::new();
    let mut prompt_idents = Vec::new();
    let mut resource_idents = Vec::new();
    let mut expanded_items = Vec::new();

    for item in std::mem::take(&mut item_impl.items) {
        let ImplItem::Fn(mut method) = item else {
            expanded_items.push(item);
            continue;
        };

        if let Some(pos) = method.attrs.iter().position(|a| a.path().is_ident("tool")) {
            let attr = method.attrs.remove(pos);
            let tool_attrs: ToolAttrs = match attr.parse_args() {
                Ok(a) => a,
                Err(err) => return err.to_compile_error().into(),
            };
            tool_idents.push(method.sig.ident.clone());
            match tool::expand_tool(&tool_attrs, method) {
                Ok(tokens) => expanded_items.push(ImplItem::Verbatim(tokens)),
                Err(err) => return err.to_compile_error().into(),
            }
            continue;
        }

        if let Some(pos) = method.attrs.iter().position(|a| a.path().is_ident("prompt")) {
            let attr = method.attrs.remove(pos);
            let prompt_attrs: PromptAttrs = match attr.parse_args() {
                Ok(a) => a,
                Err(err) => return err.to_compile_error().into(),
            };
            prompt_idents.push(method.sig.ident.clone());
            match prompt::expand_prompt(&prompt_attrs, method) {
                Ok(tokens) => expanded_items.push(ImplItem::Verbatim(tokens)),
                Err(err) => return err.to_compile_error().into(),
            }
            continue;
        }

        if let Some(pos) = method.attrs.iter().position(|a| a.path().is_ident("resource")) {
            let attr = method.attrs.remove(pos);
            let resource_attrs: ResourceAttrs = match attr.parse_args() {
                Ok(a) => a,
                Err(err) => return err.to_compile_error().into(),
            };
            resource_idents.push(method.sig.ident.clone());
            match resource::expand_resource(&resource_attrs, method) {
                Ok(tokens) => expanded_items.push(ImplItem::Verbatim(tokens)),
                Err(err) => return err.to_compile_error().into(),
            }
            continue;
        }

        expanded_items.push(ImplItem::Fn(method));
    }
    item_impl.items = expanded_items;

    let name = attrs.name.unwrap_or_else(|| self_ty_name(&self_ty));
    let version = attrs.version.unwrap_or_else(|| "0.1.0".to_string());
    let description = attrs.description;

    let descriptor_fns: Vec<_> = tool_idents.iter().map(|i| syn::Ident::new(&format!("__conduit_tool_{i}_descriptor"), i.span())).collect();
    let handler_fns: Vec<_> = tool_idents.iter().map(|i| syn::Ident::new(&format!("__conduit_tool_{i}_handler"), i.span())).collect();

    let prompt_descriptor_fns: Vec<_> =
        prompt_idents.iter().map(|i| syn::Ident::new(&format!("__conduit_prompt_{i}_descriptor"), i.span())).collect();
    let prompt_handler_fns: Vec<_> =
        prompt_idents.iter().map(|i| syn::Ident::new(&format!("__conduit_prompt_{i}_handler"), i.span())).collect();

    let resource_descriptor_fns: Vec<_> = resource_idents
        .iter()
        .map(|i| syn::Ident::new(&format!("__conduit_resource_{i}_descriptor"), i.span()))
        .collect();
    let resource_handler_fns: Vec<_> =
        resource_idents.iter().map(|i| syn::Ident::new(&format!("__conduit_resource_{i}_handler"), i.span())).collect();

    let instructions = match description {
        Some(d) => quote! { config.instructions = Some(#d.to_string()); },
        None => quote! {},
    };

    let expanded = quote! {
        #item_impl

        impl #self_ty {
            /// Identity this `#[server]` block was declared with.
            pub fn server_identity() -> conduit_protocol::Implementation {
                conduit_protocol::Implementation::new(#name, #version)
            }

            /// Builds a [`conduit_server::Router`] with every `#[tool]`,
            /// `#[prompt]`, and `#[resource]`-tagged method in this impl
            /// registered. Fails only if two tagged methods share a name
            /// (`conduit_server::ServerError::DuplicateRegistration`).
            pub fn into_router(self: &::std::sync::Arc<Self>) -> conduit_server::ServerResult<conduit_server::Router> {
                let mut config = conduit_server::ServerConfig::new(Self::server_identity());
                #instructions

                let validator = ::std::sync::Arc::new(conduit_server::JsonSchemaValidator::new());
                let tools = conduit_server::ToolRegistry::new(validator);
                let prompts = conduit_server::PromptRegistry::new();
                let resources = conduit_server::ResourceRegistry::new();

                #( tools.register(Self::#descriptor_fns(), self.#handler_fns())?; )*
                #( prompts.register(Self::#prompt_descriptor_fns(), self.#prompt_handler_fns())?; )*
                #( resources.register(Self::#resource_descriptor_fns(), self.#resource_handler_fns())?; )*

                Ok(conduit_server::Router::new(config, tools, prompts, resources))
            }
        }
    };

    TokenStream::from(expanded)
}

fn self_ty_name(self_ty: &syn::Type) -> String {
    if let syn::Type::Path(p) = self_ty {
        if let Some(seg) = p.path.segments.last() {
            return seg.ident.to_string();
        }
    }
    "conduit-server".to_string()
}
