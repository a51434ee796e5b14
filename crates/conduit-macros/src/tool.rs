//! `#[tool]`: binds a method into a `conduit_server::registry::tool`
//! descriptor + handler pair, deriving the input JSON Schema from the
//! method's own non-context parameters via `schemars`.
//!
//! Grounded on the donor's `tool.rs::generate_tool_impl` (keep the original
//! method, emit sibling `__*_descriptor`/`__*_handler` functions next to it)
//! generalized to this workspace's `ToolHandlerFn` closure shape
//! (`Fn(Value, HandlerContext) -> Pin<Box<dyn Future<Output =
//! ServerResult<CallToolResult>>>>`) instead of the donor's
//! `CallToolRequest`/`RequestContext` pair.

use crate::attrs::ToolAttrs;
use crate::signature;
use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{parse_macro_input, ImplItemFn};

pub fn generate_tool_impl(args: TokenStream, input: TokenStream) -> TokenStream {
    let method = parse_macro_input!(input as ImplItemFn);
    let attrs = match syn::parse::<ToolAttrs>(args) {
        Ok(attrs) => attrs,
        Err(err) => return err.to_compile_error().into(),
    };
    expand_tool(&attrs, method).unwrap_or_else(|err| err.to_compile_error()).into()
}

pub fn expand_tool(attrs: &ToolAttrs, method: ImplItemFn) -> syn::Result<proc_macro2::TokenStream> {
    let fn_name = &method.sig.ident;
    let tool_name = fn_name.to_string();
    let description = &attrs.description;
    let title = match &attrs.title {
        Some(t) => quote! { Some(#t.to_string()) },
        None => quote! { None },
    };

    let info = signature::analyze(&method.sig)?;
    let struct_name = syn::Ident::new(&format!("__ConduitToolArgs_{fn_name}"), Span::call_site());

    let field_idents: Vec<_> = info.args.iter().map(|a| &a.ident).collect();
    let field_types: Vec<_> = info.args.iter().map(|a| &a.ty).collect();

    let args_struct = quote! {
        #[derive(::serde::Deserialize, ::schemars::JsonSchema)]
        #[allow(non_camel_case_types)]
        struct #struct_name {
            #( #field_idents: #field_types, )*
        }
    };

    let destructure = if info.args.is_empty() {
        quote! { let #struct_name {} = #struct_name {}; }
    } else {
        quote! {
            let #struct_name { #( #field_idents ),* } = ::serde_json::from_value(args)
                .map_err(|e| conduit_server::ServerError::Handler(
                    conduit_core::Error::invalid_params(format!("invalid arguments for tool '{}': {e}", #tool_name))
                ))?;
        }
    };

    let descriptor_fn = syn::Ident::new(&format!("__conduit_tool_{fn_name}_descriptor"), Span::call_site());
    let handler_fn = syn::Ident::new(&format!("__conduit_tool_{fn_name}_handler"), Span::call_site());

    let ctx_arg = match &info.context_binding {
        Some(ident) => quote! { #ident, },
        None => quote! {},
    };
    let call_args = field_idents.iter();

    Ok(quote! {
        #method

        #[doc(hidden)]
        #[allow(non_snake_case)]
        fn #descriptor_fn() -> conduit_protocol::ToolDescriptor {
            #args_struct
            let schema = ::schemars::schema_for!(#struct_name);
            conduit_protocol::ToolDescriptor {
                name: #tool_name.to_string(),
                title: #title,
                description: Some(#description.to_string()),
                input_schema: ::serde_json::to_value(&schema).expect("tool input schema always serializes"),
                output_schema: None,
            }
        }

        #[doc(hidden)]
        #[allow(non_snake_case)]
        fn #handler_fn(self: &::std::sync::Arc<Self>) -> conduit_server::registry::tool::ToolHandlerFn {
            let this = ::std::sync::Arc::clone(self);
            ::std::sync::Arc::new(move |args: ::serde_json::Value, ctx: conduit_server::HandlerContext| {
                let this = ::std::sync::Arc::clone(&this);
                Box::pin(async move {
                    #args_struct
                    #destructure
                    let result = this.#fn_name(#ctx_arg #( #call_args ),*).await
                        .map_err(conduit_server::ServerError::Handler)?;
                    let value = ::serde_json::to_value(&result)
                        .map_err(|e| conduit_server::ServerError::Handler(conduit_core::Error::internal(e.to_string())))?;
                    let text = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
                    Ok(conduit_protocol::tools::CallToolResult::text(text).with_structured_content(value))
                })
            })
        }
    })
}
