//! Procedural macros that bind a typed function into a conduit-server
//! registry entry with a `schemars`-derived JSON Schema: `#[tool]`,
//! `#[prompt]`, `#[resource]`, and `#[server]`.
//!
//! `#[tool]`/`#[prompt]`/`#[resource]` may be used standalone on a method
//! (producing sibling `__conduit_*_descriptor`/`__conduit_*_handler`
//! functions next to it), but are most often nested inside a `#[server]`
//! impl block, which scans for them itself and assembles a ready
//! [`conduit_server::Router`] via a generated `into_router` method.
//!
//! ```ignore
//! use conduit_macros::server;
//! use conduit_server::HandlerContext;
//! use std::sync::Arc;
//!
//! #[derive(Clone)]
//! struct Calculator;
//!
//! #[server(name = "calculator", version = "1.0.0")]
//! impl Calculator {
//!     #[tool("Add two numbers")]
//!     async fn add(&self, a: i32, b: i32) -> conduit_core::Result<i32> {
//!         Ok(a + b)
//!     }
//! }
//!
//! let router = Arc::new(Calculator).into_router().unwrap();
//! ```

use proc_macro::TokenStream;

mod attrs;
mod prompt;
mod resource;
mod server;
mod signature;
mod tool;

/// Marks an `impl` block as a conduit server: collects every
/// `#[tool]`/`#[prompt]`/`#[resource]`-tagged method inside it and emits an
/// `into_router` constructor.
#[proc_macro_attribute]
pub fn server(args: TokenStream, input: TokenStream) -> TokenStream {
    match syn::parse::<syn::ItemImpl>(input) {
        Ok(item_impl) => server::generate_server_impl(args, item_impl),
        Err(_) => syn::Error::new(
            proc_macro2::Span::call_site(),
            "#[server] can only be applied to an impl block",
        )
        .to_compile_error()
        .into(),
    }
}

/// Marks a method as a tool handler, deriving its input JSON Schema from
/// the method's own non-context parameters.
#[proc_macro_attribute]
pub fn tool(args: TokenStream, input: TokenStream) -> TokenStream {
    tool::generate_tool_impl(args, input)
}

/// Marks a method as a prompt handler. Non-context parameters become
/// required string `PromptArgument`s.
#[proc_macro_attribute]
pub fn prompt(args: TokenStream, input: TokenStream) -> TokenStream {
    prompt::generate_prompt_impl(args, input)
}

/// Marks a method as a resource handler for a single, non-templated URI.
#[proc_macro_attribute]
pub fn resource(args: TokenStream, input: TokenStream) -> TokenStream {
    resource::generate_resource_impl(args, input)
}
